//! Merge-by-key aggregation of per-category counts

use std::collections::HashMap;
use tracing::trace;

use crate::analytics::agent::{Classification, UserAgentClassifier};
use crate::analytics::models::{RefererCount, UserAgentCount};

/// Label shown for visits without a referrer
pub const DIRECT: &str = "Direct";

/// Key → count map that remembers first-insertion order
///
/// Insertion order is what ranking falls back to for equal counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl CategoryCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` to `key`, creating the entry at the end if needed
    ///
    /// Totals saturate at `u64::MAX`.
    pub fn add(&mut self, key: &str, count: u64) {
        match self.index.get(key) {
            Some(&slot) => {
                let total = &mut self.entries[slot].1;
                *total = total.saturating_add(count);
            }
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), count));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.index.get(key).map(|&slot| self.entries[slot].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |sum, (_, count)| sum.saturating_add(*count))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(key, count)| (key.as_str(), *count))
    }

    pub fn into_entries(self) -> Vec<(String, u64)> {
        self.entries
    }
}

impl<K: AsRef<str>> FromIterator<(K, u64)> for CategoryCounts {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        let mut counts = Self::new();
        for (key, count) in iter {
            counts.add(key.as_ref(), count);
        }
        counts
    }
}

/// Sums counts per effective key, with optional key renaming
#[derive(Debug, Clone, Default)]
pub struct CategoryAggregator {
    remap: HashMap<String, String>,
}

impl CategoryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count records keyed `from` under `to` instead
    pub fn with_remap(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.remap.insert(from.into(), to.into());
        self
    }

    /// Referrer aggregation: unknown (and empty) referrers count as direct visits
    pub fn referrers() -> Self {
        Self::new()
            .with_remap("unknown", DIRECT)
            .with_remap("", DIRECT)
    }

    pub fn effective_key<'a>(&'a self, key: &'a str) -> &'a str {
        self.remap.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Fold `records` into one map
    ///
    /// `key_fn` returns the raw key and count of a record, or `None` to
    /// drop it.
    pub fn aggregate<'r, R, F>(&self, records: &'r [R], mut key_fn: F) -> CategoryCounts
    where
        F: FnMut(&'r R) -> Option<(&'r str, u64)>,
    {
        let mut counts = CategoryCounts::new();
        for record in records {
            if let Some((key, count)) = key_fn(record) {
                counts.add(self.effective_key(key), count);
            }
        }
        counts
    }
}

pub fn aggregate_referrers(records: &[RefererCount]) -> CategoryCounts {
    CategoryAggregator::referrers().aggregate(records, |r| Some((r.referer.as_str(), r.count)))
}

/// Browser and OS family totals from one user-agent dataset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentBreakdown {
    pub browsers: CategoryCounts,
    pub devices: CategoryCounts,
}

/// Classify each user agent once and sum into browser and OS totals
///
/// Excluded agents are dropped entirely; their counts do not move into
/// "Others".
pub fn aggregate_agents(
    records: &[UserAgentCount],
    classifier: &UserAgentClassifier,
) -> AgentBreakdown {
    let mut breakdown = AgentBreakdown::default();

    for record in records {
        match classifier.classify(&record.ua) {
            Classification::Excluded => {
                trace!("Excluding user agent '{}' ({} visits)", record.ua, record.count);
            }
            Classification::Agent(agent) => {
                breakdown.browsers.add(&agent.browser, record.count);
                breakdown.devices.add(&agent.os, record.count);
            }
        }
    }

    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn referer(referer: &str, count: u64) -> RefererCount {
        RefererCount {
            referer: referer.to_string(),
            count,
        }
    }

    fn ua(ua: &str, count: u64) -> UserAgentCount {
        UserAgentCount {
            ua: ua.to_string(),
            count,
        }
    }

    const CHROME_A: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";
    const CHROME_B: &str = "Mozilla/5.0 (Linux; Android 12) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.104 Mobile Safari/537.36";

    #[test]
    fn test_counts_keep_insertion_order() {
        let counts: CategoryCounts = [("b", 1), ("a", 2), ("b", 3)].into_iter().collect();
        let entries: Vec<_> = counts.iter().collect();
        assert_eq!(entries, vec![("b", 4), ("a", 2)]);
    }

    #[test]
    fn test_referrers_remap_unknown_to_direct() {
        let counts = aggregate_referrers(&[
            referer("unknown", 5),
            referer("https://a.com", 3),
            referer("unknown", 2),
        ]);

        assert_eq!(counts.len(), 2);
        assert_eq!(counts.get(DIRECT), Some(7));
        assert_eq!(counts.get("https://a.com"), Some(3));
        assert_eq!(counts.get("unknown"), None);
    }

    #[test]
    fn test_empty_referrer_counts_as_direct() {
        let counts = aggregate_referrers(&[referer("", 1), referer("unknown", 1)]);
        assert_eq!(counts.get(DIRECT), Some(2));
    }

    #[test]
    fn test_collision_sum_is_order_independent() {
        let forward = aggregate_referrers(&[referer("x", 4), referer("y", 1), referer("x", 9)]);
        let backward = aggregate_referrers(&[referer("x", 9), referer("y", 1), referer("x", 4)]);

        assert_eq!(forward.get("x"), Some(13));
        assert_eq!(backward.get("x"), Some(13));
        assert_eq!(forward.total(), backward.total());
    }

    #[test]
    fn test_colliding_counts_saturate_instead_of_overflowing() {
        let counts = aggregate_referrers(&[
            referer("https://x.com", u64::MAX),
            referer("https://x.com", 1),
        ]);
        assert_eq!(counts.get("https://x.com"), Some(u64::MAX));

        let counts =
            aggregate_referrers(&[referer("https://x.com", u64::MAX), referer("unknown", 1)]);
        assert_eq!(counts.total(), u64::MAX);
    }

    #[test]
    fn test_key_fn_can_filter() {
        let records = [referer("https://a.com", 3), referer("https://b.com", 4)];
        let counts = CategoryAggregator::new().aggregate(&records, |r| {
            r.referer
                .ends_with("b.com")
                .then(|| (r.referer.as_str(), r.count))
        });

        assert_eq!(counts.len(), 1);
        assert_eq!(counts.get("https://b.com"), Some(4));
    }

    #[test]
    fn test_agents_merge_by_family() {
        let breakdown = aggregate_agents(
            &[ua(CHROME_A, 2), ua(CHROME_B, 5)],
            &UserAgentClassifier::default(),
        );

        assert_eq!(breakdown.browsers.get("Chrome"), Some(7));
        assert_eq!(breakdown.browsers.len(), 1);
        assert_eq!(breakdown.devices.get("Windows 10"), Some(2));
        assert_eq!(breakdown.devices.get("Android"), Some(5));
    }

    #[test]
    fn test_excluded_agents_contribute_nothing() {
        let breakdown = aggregate_agents(
            &[
                ua(CHROME_A, 2),
                ua("Googlebot/2.1", 40),
                ua("Unknown", 9),
                ua("curl/7.68.0", 1),
            ],
            &UserAgentClassifier::default(),
        );

        assert_eq!(breakdown.browsers.total(), 3);
        assert_eq!(breakdown.devices.total(), 3);
        assert_eq!(breakdown.browsers.get("Others"), Some(1));
    }
}
