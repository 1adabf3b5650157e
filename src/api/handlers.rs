use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Local;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::analytics::DateRange;
use crate::controller::{ControllerOptions, StatsController, StatsSnapshot};
use crate::source::StatsSource;

/// Controllers kept alive when no limit is configured
pub const DEFAULT_MAX_CONTROLLERS: u64 = 1000;
/// Idle time after which an alias's controller is stopped
pub const DEFAULT_CONTROLLER_IDLE: Duration = Duration::from_secs(600);

pub struct AppState {
    pub source: Arc<dyn StatsSource>,
    pub options: ControllerOptions,
    /// Length of the range selected for an alias on first view
    pub range_days: u32,
    /// Running controllers by alias. An evicted controller stops its
    /// workers once the last request holding it finishes.
    controllers: Cache<String, Arc<StatsController>>,
}

impl AppState {
    pub fn new(source: Arc<dyn StatsSource>, options: ControllerOptions, range_days: u32) -> Self {
        Self::with_limits(
            source,
            options,
            range_days,
            DEFAULT_MAX_CONTROLLERS,
            DEFAULT_CONTROLLER_IDLE,
        )
    }

    pub fn with_limits(
        source: Arc<dyn StatsSource>,
        options: ControllerOptions,
        range_days: u32,
        max_controllers: u64,
        idle: Duration,
    ) -> Self {
        let controllers = Cache::builder()
            .max_capacity(max_controllers)
            .time_to_idle(idle)
            .build();

        Self {
            source,
            options,
            range_days,
            controllers,
        }
    }

    /// Controller for `alias`, started on the default range if not running yet
    pub async fn controller(&self, alias: &str) -> Arc<StatsController> {
        self.controllers
            .get_with(alias.to_string(), async {
                let range = DateRange::trailing(self.range_days, Local::now().date_naive());
                Arc::new(StatsController::spawn(
                    alias,
                    Arc::clone(&self.source),
                    self.options.clone(),
                    range,
                ))
            })
            .await
    }

    /// Number of controllers currently kept, after pending evictions ran
    pub async fn running_controllers(&self) -> u64 {
        self.controllers.run_pending_tasks().await;
        self.controllers.entry_count()
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    /// Block until every dataset reflects the current range
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Deserialize)]
pub struct RangeRequest {
    pub start: String,
    pub end: String,
}

/// Get the chart artifacts of an alias
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(alias): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Json<StatsSnapshot> {
    let controller = state.controller(&alias).await;
    let snapshot = if query.wait {
        controller.settled().await
    } else {
        controller.snapshot()
    };
    Json(snapshot)
}

/// Select a new date range for an alias
pub async fn set_range(
    State(state): State<Arc<AppState>>,
    Path(alias): Path<String>,
    Json(payload): Json<RangeRequest>,
) -> Result<(StatusCode, Json<DateRange>), (StatusCode, Json<ErrorResponse>)> {
    let range = DateRange::parse(&payload.start, &payload.end).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    state.controller(&alias).await.set_range(range);
    Ok((StatusCode::ACCEPTED, Json(range)))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
