use async_trait::async_trait;
use thiserror::Error;

use crate::analytics::{DateRange, RefererCount, TimeHist, UserAgentCount};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("stats request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("stats endpoint returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed stats response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid stats endpoint '{0}'")]
    Endpoint(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Dataset selector of the backend stats query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    Time,
    Referer,
    Ua,
}

impl StatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatKind::Time => "time",
            StatKind::Referer => "referer",
            StatKind::Ua => "ua",
        }
    }
}

impl std::fmt::Display for StatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only access to the raw visit statistics of an alias
///
/// An absent dataset is an empty list, never an error.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Per-day PV/UV rows between `range.start` and `range.end`
    async fn time_series(&self, alias: &str, range: DateRange) -> SourceResult<Vec<TimeHist>>;

    /// Visit counts per referrer
    async fn referrers(&self, alias: &str, range: DateRange) -> SourceResult<Vec<RefererCount>>;

    /// Visit counts per raw user-agent string
    async fn user_agents(&self, alias: &str, range: DateRange)
        -> SourceResult<Vec<UserAgentCount>>;
}
