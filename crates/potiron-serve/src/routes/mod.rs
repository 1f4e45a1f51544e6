//! API route definitions.

mod dashboard;
mod evolution;
mod health;

use std::sync::Arc;

use axum::Router;
use axum::http::header;
use axum::middleware;
use axum::response::Response;
use axum::routing::get;
use chrono::NaiveDate;
use potiron_core::Session;
use potiron_core::key::parse_day;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the complete API router.
///
/// # Route Structure
///
/// - `GET /health` - Health check
/// - `GET /api/v1/meta` - Sensor name, version and latest day
/// - `GET /api/v1/fields` - Known fields with their dashboard flag
/// - `GET /api/v1/top` - Top values of every enabled field for a day
/// - `GET /api/v1/evolution/{date}/{field}/{key}` - History of one value
/// - `GET /api/v1/custom` - History of a value typed in by the user
pub fn router(state: AppState) -> Router {
    let public = Router::new().route("/health", get(health::health_check));

    let api_v1 = Router::new()
        .route("/meta", get(dashboard::meta))
        .route("/fields", get(dashboard::fields))
        .route("/top", get(dashboard::top))
        .route("/evolution/{date}/{field}/{key}", get(evolution::evolution))
        .route("/custom", get(evolution::custom))
        .layer(middleware::map_response(add_cache_headers));

    Router::new()
        .merge(public)
        .nest("/api/v1", api_v1)
        .with_state(state)
}

/// Add cache headers to successful API responses.
///
/// New sensor data lands at most once per processed capture, so clients may
/// reuse responses for a minute.
async fn add_cache_headers(response: Response) -> Response {
    if response.status().is_success() {
        let (mut parts, body) = response.into_parts();
        parts.headers.insert(
            header::CACHE_CONTROL,
            "public, max-age=60, stale-while-revalidate=300"
                .parse()
                .expect("valid header value"),
        );
        Response::from_parts(parts, body)
    } else {
        response
    }
}

/// Run a store query on the blocking thread pool.
async fn blocking<T, F>(state: &AppState, query: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Session) -> Result<T, ApiError> + Send + 'static,
{
    let session = Arc::clone(&state.session);
    tokio::task::spawn_blocking(move || query(&session))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("store query task failed: {e}")))?
}

/// The requested day, or the latest day with data when the request has no
/// usable date.
fn resolve_day(session: &Session, requested: Option<&str>) -> Result<NaiveDate, ApiError> {
    if let Some(raw) = requested.map(str::trim).filter(|raw| !raw.is_empty()) {
        match parse_day(raw) {
            Ok(day) => return Ok(day),
            Err(e) => tracing::warn!(date = %raw, error = %e, "invalid date, using latest day"),
        }
    }
    session
        .latest_day()?
        .ok_or_else(|| ApiError::NotFound("no day with data".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use potiron_core::key::{DAYS, ENABLED_FIELDS, FIELDS};
    use potiron_core::{MemoryStore, ScoreStore};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::state::Config;

    fn config() -> Config {
        Config {
            bind_addr: "127.0.0.1:0".to_string(),
            redis_url: "redis://localhost".to_string(),
            sensor_name: "src".to_string(),
            version: "test".to_string(),
            coverage: 3,
            short_coverage: 2,
            metrics_port: 0,
        }
    }

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new()
            .with_scores("src:20240116:dport", &[("443", 7.0)])
            .with_scores(
                "src:20240117:dport",
                &[("80", 50.0), ("443", 30.0), ("22", 20.0), ("25", 1.0)],
            )
            .with_scores("src:20240117:sport", &[("1024", 3.0)]);
        store
            .add_to_set(DAYS, "20240116")
            .add_to_set(DAYS, "20240117")
            .add_to_set(FIELDS, "dport")
            .add_to_set(FIELDS, "sport")
            .add_to_set(ENABLED_FIELDS, "dport");
        store
            .set_hash_field("TR:dport", "80", "http")
            .set_hash_field("RT:dport", "http", "80");
        store.set_string("DS:dport", "Destination port");
        store
    }

    fn app_with(store: MemoryStore) -> Router {
        let store: Arc<dyn ScoreStore> = Arc::new(store);
        router(AppState::with_store(config(), store).unwrap())
    }

    fn app() -> Router {
        app_with(store())
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_is_public() {
        let (status, body) = get(app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn api_responses_carry_cache_headers() {
        let response = app()
            .oneshot(Request::builder().uri("/api/v1/meta").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=60, stale-while-revalidate=300"
        );
    }

    #[tokio::test]
    async fn meta_reports_latest_day() {
        let (status, body) = get(app(), "/api/v1/meta").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sensor_name"], "src");
        assert_eq!(body["version"], "test");
        assert_eq!(body["latest_day"], "2024-01-17");
    }

    #[tokio::test]
    async fn fields_flag_enabled_ones() {
        let (status, body) = get(app(), "/api/v1/fields").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!([
                {"name": "dport", "enabled": true},
                {"name": "sport", "enabled": false}
            ])
        );
    }

    #[tokio::test]
    async fn top_lists_enabled_fields_only() {
        let (status, body) = get(app(), "/api/v1/top?date=2024-01-17").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["day"], "2024-01-17");

        let fields = body["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 1);
        let dport = &fields[0];
        assert_eq!(dport["name"], "dport");
        assert_eq!(dport["description"], "Destination port");
        let keys: Vec<_> = dport["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["key"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, ["http", "443", "22", "25"]);
        assert_eq!(dport["legend"], serde_json::json!(["http", "443", "22"]));

        let evolution = dport["evolution"].as_array().unwrap();
        assert_eq!(evolution.len(), 3);
        assert_eq!(evolution[1]["scores"], serde_json::json!([0.0, 7.0, 0.0]));
        assert_eq!(evolution[2]["scores"], serde_json::json!([50.0, 30.0, 20.0]));
    }

    #[tokio::test]
    async fn top_falls_back_to_latest_day() {
        for uri in ["/api/v1/top", "/api/v1/top?date=yesterday", "/api/v1/top?date="] {
            let (status, body) = get(app(), uri).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(body["day"], "2024-01-17", "{uri}");
        }
    }

    #[tokio::test]
    async fn top_without_any_day_is_not_found() {
        let (status, body) = get(app_with(MemoryStore::new()), "/api/v1/top").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn evolution_translates_label_back() {
        let (status, body) = get(app(), "/api/v1/evolution/20240117/dport/http").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["member"], "80");
        assert_eq!(body["key"], "http");
        let history = body["history"].as_array().unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0]["day"], "2024-01-14");
        assert_eq!(history[3]["score"], 50.0);
        assert_eq!(history[2]["score"], 0.0);
    }

    #[tokio::test]
    async fn evolution_rejects_invalid_field() {
        let (status, body) = get(app(), "/api/v1/evolution/2024-01-17/a:b/80").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn invalid_field_never_served_from_cache() {
        let app = app();
        let (status, _) = get(app.clone(), "/api/v1/evolution/20240117/dport/a:b").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get(app, "/api/v1/evolution/20240117/dport:a/b").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn custom_requires_fieldname() {
        let (status, _) = get(app(), "/api/v1/custom?field=443").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn custom_rejects_unknown_field() {
        let (status, _) = get(app(), "/api/v1/custom?fieldname=ttl&field=64").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn custom_uses_latest_day_by_default() {
        let (status, body) = get(app(), "/api/v1/custom?fieldname=dport&field=443").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["day"], "2024-01-17");
        let scores: Vec<f64> = body["history"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["score"].as_f64().unwrap())
            .collect();
        assert_eq!(scores, [0.0, 0.0, 7.0, 30.0]);
    }
}
