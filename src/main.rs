use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use redir_stats::analytics::UserAgentClassifier;
use redir_stats::api::{self, AppState};
use redir_stats::config::Config;
use redir_stats::controller::ControllerOptions;
use redir_stats::source::{HttpStatsSource, StatsSource};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize the stats backend client
    let http_source = HttpStatsSource::new(&config.stats.endpoint)?;
    info!("Reading stats from {}", http_source.endpoint());
    let source: Arc<dyn StatsSource> = Arc::new(http_source);

    let options = ControllerOptions {
        classifier: UserAgentClassifier::default(),
        tie_break: config.stats.tie_break,
    };
    let state = Arc::new(AppState::with_limits(
        source,
        options,
        config.stats.range_days,
        config.stats.max_controllers,
        Duration::from_secs(config.stats.controller_idle_secs),
    ));
    info!(
        "Keeping up to {} stats controllers, stopped after {}s idle",
        config.stats.max_controllers, config.stats.controller_idle_secs
    );
    let api_router = api::create_api_router(state);

    // Start API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 Stats API listening on http://{}", api_addr);
    info!("   - Chart data available at http://{}/api/stats/{{alias}}", api_addr);

    axum::serve(api_listener, api_router).await?;

    Ok(())
}
