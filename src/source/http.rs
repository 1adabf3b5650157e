use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::analytics::models::DAY_FORMAT;
use crate::analytics::{DateRange, RefererCount, TimeHist, UserAgentCount};
use crate::source::{SourceError, SourceResult, StatKind, StatsSource};

/// Stats source backed by the shortener's `?mode=stats` HTTP endpoint
#[derive(Clone)]
pub struct HttpStatsSource {
    endpoint: Url,
    client: Client,
}

impl HttpStatsSource {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|_| SourceError::Endpoint(endpoint.to_string()))
            .context("failed to parse STATS_ENDPOINT")?;

        let client = Client::builder()
            .user_agent(concat!("redir-stats/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client for the stats endpoint")?;

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build the query URL for one dataset
    pub fn query_url(&self, kind: StatKind, alias: &str, range: DateRange) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("mode", "stats")
            .append_pair("a", alias)
            .append_pair("stat", kind.as_str())
            .append_pair("t0", &range.start.format(DAY_FORMAT).to_string())
            .append_pair("t1", &range.end.format(DAY_FORMAT).to_string());
        url
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        kind: StatKind,
        alias: &str,
        range: DateRange,
    ) -> SourceResult<Vec<T>> {
        let url = self.query_url(kind, alias, range);
        debug!("Fetching {} stats for '{}' ({})", kind, alias, range);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        // The backend answers `null` when there is nothing to report
        let rows: Option<Vec<T>> = serde_json::from_slice(&body)?;
        Ok(rows.unwrap_or_default())
    }
}

#[async_trait]
impl StatsSource for HttpStatsSource {
    async fn time_series(&self, alias: &str, range: DateRange) -> SourceResult<Vec<TimeHist>> {
        self.fetch(StatKind::Time, alias, range).await
    }

    async fn referrers(&self, alias: &str, range: DateRange) -> SourceResult<Vec<RefererCount>> {
        self.fetch(StatKind::Referer, alias, range).await
    }

    async fn user_agents(
        &self,
        alias: &str,
        range: DateRange,
    ) -> SourceResult<Vec<UserAgentCount>> {
        self.fetch(StatKind::Ua, alias, range).await
    }
}
