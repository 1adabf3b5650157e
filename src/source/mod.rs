pub mod http;
pub mod trait_def;

pub use http::HttpStatsSource;
pub use trait_def::{SourceError, SourceResult, StatKind, StatsSource};
