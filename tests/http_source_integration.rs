//! HTTP stats source integration tests
//!
//! A local axum server stands in for the shortener backend's `?mode=stats`
//! endpoint.

use axum::{extract::Query, http::StatusCode, routing::get, Router};
use redir_stats::analytics::DateRange;
use redir_stats::source::{HttpStatsSource, SourceError, StatsSource};
use std::collections::HashMap;

async fn stats_endpoint(Query(params): Query<HashMap<String, String>>) -> (StatusCode, String) {
    if params.get("mode").map(String::as_str) != Some("stats") {
        return (StatusCode::BAD_REQUEST, "missing mode".to_string());
    }

    let alias = params.get("a").cloned().unwrap_or_default();
    match alias.as_str() {
        "broken" => return (StatusCode::INTERNAL_SERVER_ERROR, "oops".to_string()),
        "garbage" => return (StatusCode::OK, "<html>".to_string()),
        "empty" => return (StatusCode::OK, "null".to_string()),
        _ => {}
    }

    let t0 = params.get("t0").cloned().unwrap_or_default();
    let body = match params.get("stat").map(String::as_str) {
        Some("time") => format!(r#"[{{"time": "{t0}T10:00:00Z", "pv": 4, "uv": 1}}]"#),
        Some("referer") => {
            r#"[{"referer": "unknown", "count": 5}, {"referer": "https://a.com", "count": 3}]"#
                .to_string()
        }
        Some("ua") => r#"[{"ua": "curl/7.68.0", "count": 2}, {"count": 1}]"#.to_string(),
        _ => return (StatusCode::BAD_REQUEST, "unknown stat".to_string()),
    };
    (StatusCode::OK, body)
}

/// Start the stub backend and return its stats endpoint URL
async fn start_backend() -> String {
    let app = Router::new().route("/s/", get(stats_endpoint));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/s/", addr)
}

fn range() -> DateRange {
    DateRange::parse("2021-01-01", "2021-01-31").unwrap()
}

#[tokio::test]
async fn test_fetches_all_datasets() {
    let endpoint = start_backend().await;
    let source = HttpStatsSource::new(&endpoint).unwrap();

    let time = source.time_series("changkun", range()).await.unwrap();
    assert_eq!(time.len(), 1);
    assert_eq!(time[0].time, "2021-01-01T10:00:00Z");
    assert_eq!(time[0].pv, 4);

    let referrers = source.referrers("changkun", range()).await.unwrap();
    assert_eq!(referrers.len(), 2);
    assert_eq!(referrers[0].referer, "unknown");
    assert_eq!(referrers[1].count, 3);

    let agents = source.user_agents("changkun", range()).await.unwrap();
    assert_eq!(agents.len(), 2);
    assert_eq!(agents[1].ua, "");
    assert_eq!(agents[1].count, 1);
}

#[tokio::test]
async fn test_null_response_is_empty() {
    let endpoint = start_backend().await;
    let source = HttpStatsSource::new(&endpoint).unwrap();

    assert!(source.time_series("empty", range()).await.unwrap().is_empty());
    assert!(source.referrers("empty", range()).await.unwrap().is_empty());
    assert!(source.user_agents("empty", range()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let endpoint = start_backend().await;
    let source = HttpStatsSource::new(&endpoint).unwrap();

    match source.referrers("broken", range()).await {
        Err(SourceError::Status(status)) => assert_eq!(status.as_u16(), 500),
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_reported() {
    let endpoint = start_backend().await;
    let source = HttpStatsSource::new(&endpoint).unwrap();

    assert!(matches!(
        source.user_agents("garbage", range()).await,
        Err(SourceError::Decode(_))
    ));
}

#[tokio::test]
async fn test_unreachable_backend_is_reported() {
    // Bind then drop a listener to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source = HttpStatsSource::new(&format!("http://{}/s/", addr)).unwrap();
    assert!(matches!(
        source.time_series("changkun", range()).await,
        Err(SourceError::Request(_))
    ));
}
