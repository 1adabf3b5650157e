use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::analytics::TieBreak;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_server: ServerConfig,
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Backend endpoint answering `?mode=stats` queries
    pub endpoint: String,
    /// Length of the default trailing range, in days
    #[serde(default = "StatsConfig::default_range_days")]
    pub range_days: u32,
    #[serde(default)]
    pub tie_break: TieBreak,
    /// Upper bound on aliases with a running controller
    #[serde(default = "StatsConfig::default_max_controllers")]
    pub max_controllers: u64,
    /// Seconds without a request before an alias's controller is stopped
    #[serde(default = "StatsConfig::default_controller_idle_secs")]
    pub controller_idle_secs: u64,
}

impl StatsConfig {
    pub const DEFAULT_ENDPOINT: &'static str = "http://localhost:9123/s/";
    /// Longest default range accepted, about ten years
    pub const MAX_RANGE_DAYS: u32 = 3660;

    const fn default_range_days() -> u32 {
        30
    }

    const fn default_max_controllers() -> u64 {
        1000
    }

    const fn default_controller_idle_secs() -> u64 {
        600
    }
}

/// Validate a `STATS_RANGE_DAYS` value
fn parse_range_days(value: Option<&str>) -> anyhow::Result<u32> {
    let Some(value) = value else {
        return Ok(StatsConfig::default_range_days());
    };

    let days = value
        .trim()
        .parse::<u32>()
        .context("STATS_RANGE_DAYS must be a non-negative number of days")?;
    if days > StatsConfig::MAX_RANGE_DAYS {
        anyhow::bail!(
            "STATS_RANGE_DAYS must be at most {} (got {})",
            StatsConfig::MAX_RANGE_DAYS,
            days
        );
    }
    Ok(days)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8081".to_string())
            .parse::<u16>()
            .context("API_PORT must be a valid port number")?;

        let endpoint = std::env::var("STATS_ENDPOINT")
            .unwrap_or_else(|_| StatsConfig::DEFAULT_ENDPOINT.to_string());

        let range_days = parse_range_days(std::env::var("STATS_RANGE_DAYS").ok().as_deref())
            .context("invalid default stats range")?;

        let max_controllers = match std::env::var("STATS_MAX_CONTROLLERS") {
            Ok(v) => v
                .parse::<u64>()
                .context("STATS_MAX_CONTROLLERS must be a positive number")?,
            Err(_) => StatsConfig::default_max_controllers(),
        };

        let controller_idle_secs = match std::env::var("STATS_CONTROLLER_IDLE_SECS") {
            Ok(v) => v
                .parse::<u64>()
                .context("STATS_CONTROLLER_IDLE_SECS must be a number of seconds")?,
            Err(_) => StatsConfig::default_controller_idle_secs(),
        };

        let tie_break = std::env::var("RANKING_TIE_BREAK")
            .unwrap_or_else(|_| "insertion".to_string())
            .to_lowercase();

        let tie_break = match tie_break.as_str() {
            "insertion" => TieBreak::Insertion,
            "name" => TieBreak::Name,
            other => {
                tracing::warn!(
                    "Unknown RANKING_TIE_BREAK '{other}', falling back to 'insertion'. Supported values: insertion, name"
                );
                TieBreak::Insertion
            }
        };

        Ok(Config {
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            stats: StatsConfig {
                endpoint,
                range_days,
                tie_break,
                max_controllers,
                controller_idle_secs,
            },
        })
    }
}
