//! Range-driven refresh of the chart artifacts for one alias
//!
//! The controller publishes the selected [`DateRange`] on a watch channel.
//! Three workers subscribe to it (time series, referrers, user agents); each
//! one fetches its own dataset, transforms it and replaces only its own
//! output slice. A newer range cancels the in-flight fetch of an older one,
//! and a result that still completes for a superseded range is discarded.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::analytics::{
    aggregate_agents, aggregate_referrers, build_timeline, rank_with, DailyVisitRecord, DateRange,
    RankedEntry, RefererCount, SeriesPoint, TieBreak, TimeHist, UserAgentClassifier,
    UserAgentCount,
};
use crate::source::{SourceResult, StatKind, StatsSource};

/// Knobs shared by every controller of a dashboard
#[derive(Clone, Default)]
pub struct ControllerOptions {
    pub classifier: UserAgentClassifier,
    pub tie_break: TieBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RangeSelection {
    generation: u64,
    range: DateRange,
}

/// Derived state produced by one worker for one range selection
///
/// Generation 0 means nothing has been loaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice<T> {
    pub generation: u64,
    pub range: DateRange,
    pub data: T,
}

impl<T: Default> Slice<T> {
    fn pending(range: DateRange) -> Self {
        Self {
            generation: 0,
            range,
            data: T::default(),
        }
    }
}

/// Browser and OS rankings, both built from the user-agent dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentRankings {
    pub browsers: Vec<RankedEntry>,
    pub devices: Vec<RankedEntry>,
}

/// Everything the charts need for an alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub alias: String,
    pub range: DateRange,
    /// True while at least one dataset still reflects an older range
    pub pending: bool,
    pub timeline: Vec<SeriesPoint>,
    pub referrers: Vec<RankedEntry>,
    pub browsers: Vec<RankedEntry>,
    pub devices: Vec<RankedEntry>,
}

pub struct StatsController {
    alias: String,
    selection: watch::Sender<RangeSelection>,
    timeline: watch::Receiver<Slice<Vec<SeriesPoint>>>,
    referrers: watch::Receiver<Slice<Vec<RankedEntry>>>,
    agents: watch::Receiver<Slice<AgentRankings>>,
    workers: Vec<JoinHandle<()>>,
}

impl StatsController {
    /// Start the three dataset workers and load `range`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        alias: impl Into<String>,
        source: Arc<dyn StatsSource>,
        options: ControllerOptions,
        range: DateRange,
    ) -> Self {
        let alias = alias.into();
        info!("Starting stats controller for '{}' ({})", alias, range);

        let (selection, _) = watch::channel(RangeSelection {
            generation: 1,
            range,
        });
        let (timeline_tx, timeline) = watch::channel(Slice::pending(range));
        let (referrers_tx, referrers) = watch::channel(Slice::pending(range));
        let (agents_tx, agents) = watch::channel(Slice::pending(range));

        let tie_break = options.tie_break;

        let timeline_worker = {
            let source = Arc::clone(&source);
            let alias = alias.clone();
            Worker::new(StatKind::Time, alias.clone(), selection.subscribe(), timeline_tx).run(
                move |range| {
                    let source = Arc::clone(&source);
                    let alias = alias.clone();
                    async move {
                        source
                            .time_series(&alias, range)
                            .await
                            .map(|rows| timeline_from_rows(range, &rows))
                    }
                },
            )
        };

        let referrers_worker = {
            let source = Arc::clone(&source);
            let alias = alias.clone();
            Worker::new(StatKind::Referer, alias.clone(), selection.subscribe(), referrers_tx)
                .run(move |range| {
                    let source = Arc::clone(&source);
                    let alias = alias.clone();
                    async move {
                        source
                            .referrers(&alias, range)
                            .await
                            .map(|rows| referrer_ranking(&rows, tie_break))
                    }
                })
        };

        let agents_worker = {
            let alias = alias.clone();
            let classifier = options.classifier.clone();
            Worker::new(StatKind::Ua, alias.clone(), selection.subscribe(), agents_tx).run(
                move |range| {
                    let source = Arc::clone(&source);
                    let alias = alias.clone();
                    let classifier = classifier.clone();
                    async move {
                        source
                            .user_agents(&alias, range)
                            .await
                            .map(|rows| agent_rankings(&rows, &classifier, tie_break))
                    }
                },
            )
        };

        Self {
            alias,
            selection,
            timeline,
            referrers,
            agents,
            workers: vec![
                tokio::spawn(timeline_worker),
                tokio::spawn(referrers_worker),
                tokio::spawn(agents_worker),
            ],
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn range(&self) -> DateRange {
        self.selection.borrow().range
    }

    /// Replace the selected range and refresh every dataset
    pub fn set_range(&self, range: DateRange) {
        self.selection.send_modify(|selection| {
            selection.generation += 1;
            selection.range = range;
        });
        info!("Stats range for '{}' changed to {}", self.alias, range);
    }

    /// Current artifacts, each from its most recently completed fetch
    pub fn snapshot(&self) -> StatsSnapshot {
        let current = *self.selection.borrow();
        let timeline = self.timeline.borrow().clone();
        let referrers = self.referrers.borrow().clone();
        let agents = self.agents.borrow().clone();

        let pending = [timeline.generation, referrers.generation, agents.generation]
            .iter()
            .any(|generation| *generation != current.generation);

        StatsSnapshot {
            alias: self.alias.clone(),
            range: current.range,
            pending,
            timeline: timeline.data,
            referrers: referrers.data,
            browsers: agents.data.browsers,
            devices: agents.data.devices,
        }
    }

    /// Wait until all datasets have caught up with the range selected at
    /// call time, then take a snapshot
    pub async fn settled(&self) -> StatsSnapshot {
        let generation = self.selection.borrow().generation;

        let mut timeline = self.timeline.clone();
        let mut referrers = self.referrers.clone();
        let mut agents = self.agents.clone();

        // An error means the worker is gone; nothing more will arrive
        let (timeline_ok, referrers_ok, agents_ok) = tokio::join!(
            async { timeline.wait_for(|slice| slice.generation >= generation).await.is_ok() },
            async { referrers.wait_for(|slice| slice.generation >= generation).await.is_ok() },
            async { agents.wait_for(|slice| slice.generation >= generation).await.is_ok() },
        );
        if !(timeline_ok && referrers_ok && agents_ok) {
            warn!("Stats workers for '{}' stopped before settling", self.alias);
        }

        self.snapshot()
    }

    pub fn timeline_updates(&self) -> watch::Receiver<Slice<Vec<SeriesPoint>>> {
        self.timeline.clone()
    }

    pub fn referrer_updates(&self) -> watch::Receiver<Slice<Vec<RankedEntry>>> {
        self.referrers.clone()
    }

    pub fn agent_updates(&self) -> watch::Receiver<Slice<AgentRankings>> {
        self.agents.clone()
    }

    /// Stop the workers; the last loaded artifacts stay readable
    pub fn shutdown(&self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

impl Drop for StatsController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Fetch→transform loop for one dataset
struct Worker<T> {
    kind: StatKind,
    alias: String,
    selection: watch::Receiver<RangeSelection>,
    slice: watch::Sender<Slice<T>>,
}

impl<T> Worker<T>
where
    T: Default + Send + Sync + 'static,
{
    fn new(
        kind: StatKind,
        alias: String,
        selection: watch::Receiver<RangeSelection>,
        slice: watch::Sender<Slice<T>>,
    ) -> Self {
        Self {
            kind,
            alias,
            selection,
            slice,
        }
    }

    async fn run<F, Fut>(mut self, pipeline: F)
    where
        F: Fn(DateRange) -> Fut + Send,
        Fut: Future<Output = SourceResult<T>> + Send,
    {
        loop {
            let current = *self.selection.borrow_and_update();

            let outcome = tokio::select! {
                biased;
                changed = self.selection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    debug!("{} fetch for '{}' ({}) superseded", self.kind, self.alias, current.range);
                    continue;
                }
                outcome = pipeline(current.range) => outcome,
            };

            if self.selection.borrow().generation != current.generation {
                debug!(
                    "Discarding stale {} response for '{}' ({})",
                    self.kind, self.alias, current.range
                );
                continue;
            }

            let data = outcome.unwrap_or_else(|e| {
                warn!(
                    "Failed to fetch {} stats for '{}' ({}): {}",
                    self.kind, self.alias, current.range, e
                );
                T::default()
            });

            self.slice.send_replace(Slice {
                generation: current.generation,
                range: current.range,
                data,
            });

            if self.selection.changed().await.is_err() {
                break;
            }
        }

        debug!("{} worker for '{}' stopped", self.kind, self.alias);
    }
}

pub fn timeline_from_rows(range: DateRange, rows: &[TimeHist]) -> Vec<SeriesPoint> {
    let records: Vec<DailyVisitRecord> = rows.iter().filter_map(TimeHist::to_record).collect();
    if records.len() < rows.len() {
        debug!(
            "Skipped {} time rows with unreadable timestamps",
            rows.len() - records.len()
        );
    }
    build_timeline(&range, &records)
}

pub fn referrer_ranking(rows: &[RefererCount], tie_break: TieBreak) -> Vec<RankedEntry> {
    rank_with(aggregate_referrers(rows), tie_break)
}

pub fn agent_rankings(
    rows: &[UserAgentCount],
    classifier: &UserAgentClassifier,
    tie_break: TieBreak,
) -> AgentRankings {
    let breakdown = aggregate_agents(rows, classifier);
    AgentRankings {
        browsers: rank_with(breakdown.browsers, tie_break),
        devices: rank_with(breakdown.devices, tie_break),
    }
}
