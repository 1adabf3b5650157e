//! Visit analytics aggregation
//!
//! Turns the raw per-day, per-referrer and per-user-agent counts returned by
//! the shortener backend into chart-ready data: dense daily PV/UV series,
//! merged category totals and descending rankings.

pub mod agent;
pub mod category;
pub mod models;
pub mod ranking;
pub mod timeline;

pub use agent::{AgentParser, Classification, ClassifiedAgent, UserAgentClassifier, WootheeAgentParser};
pub use category::{aggregate_agents, aggregate_referrers, AgentBreakdown, CategoryAggregator, CategoryCounts};
pub use models::{
    day_of, parse_day, DailyVisitRecord, DateRange, RangeError, RankedEntry, RefererCount,
    SeriesCategory, SeriesPoint, TimeHist, UserAgentCount,
};
pub use ranking::{rank, rank_with, TieBreak};
pub use timeline::{build_timeline, BucketedSeries};
