use crate::infra::AppState;
use axum::body::Body;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use risk_intake::intake::{intake_router, IntakeOrchestrator, ReadinessState};
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub(crate) fn with_intake_routes(orchestrator: Arc<IntakeOrchestrator>) -> axum::Router {
    intake_router(orchestrator)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .fallback(static_asset)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    match state.readiness.current() {
        ReadinessState::Ready(context) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "features": context.table.len(),
                "since": context.since,
            })),
        ),
        ReadinessState::Loading => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "loading" })),
        ),
        ReadinessState::Failed(reason) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "failed", "reason": reason })),
        ),
    }
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Serves the questionnaire front end from the configured directory.
pub(crate) async fn static_asset(Extension(state): Extension<AppState>, uri: Uri) -> Response {
    let Some(root) = state.static_dir.as_deref() else {
        return not_found();
    };
    let Some(path) = resolve_asset(root, uri.path()) else {
        return not_found();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                Body::from(bytes),
            )
                .into_response()
        }
        Err(err) => {
            debug!(path = %path.display(), error = %err, "static asset unavailable");
            not_found()
        }
    }
}

/// Maps a request path under `root`, refusing anything that climbs out of it.
fn resolve_asset(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    let relative = if relative.is_empty() || relative.ends_with('/') {
        format!("{relative}index.html")
    } else {
        relative.to_string()
    };

    let mut resolved = root.to_path_buf();
    for component in Path::new(&relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Request;
    use chrono::Utc;
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
    use risk_intake::intake::{
        readiness_channel, FieldCatalog, MappingTable, ReadinessPublisher, ReadyContext,
        ScoringError,
    };
    use tower::ServiceExt;

    fn metrics_handle() -> Arc<PrometheusHandle> {
        Arc::new(PrometheusBuilder::new().build_recorder().handle())
    }

    fn app(static_dir: Option<PathBuf>) -> (ReadinessPublisher, axum::Router) {
        let (publisher, readiness) = readiness_channel();
        let orchestrator = Arc::new(IntakeOrchestrator::new(
            Arc::new(FieldCatalog::standard()),
            readiness.clone(),
        ));
        let state = AppState {
            readiness,
            metrics: metrics_handle(),
            static_dir,
        };
        (
            publisher,
            with_intake_routes(orchestrator).layer(Extension(state)),
        )
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).expect("request builds")
    }

    async fn read_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let (_publisher, router) = app(None);
        let response = router.oneshot(get("/health")).await.expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_follows_startup_state() {
        let (publisher, router) = app(None);

        let response = router
            .clone()
            .oneshot(get("/ready"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(read_json(response).await["status"], "loading");

        publisher
            .transition(ReadinessState::Ready(Arc::new(ReadyContext {
                table: Arc::new(
                    MappingTable::from_slice(
                        br#"{"feature_order": ["Sex"], "mappings": {"Sex": {"male": 0}}}"#,
                    )
                    .expect("table"),
                ),
                scorer: Arc::new(|_: &[f64]| -> Result<f64, ScoringError> { Ok(0.5) }),
                since: Utc::now(),
            })))
            .expect("ready");

        let response = router.oneshot(get("/ready")).await.expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await;
        assert_eq!(payload["status"], "ready");
        assert_eq!(payload["features"], 1);
    }

    #[tokio::test]
    async fn ready_reports_failure_reason() {
        let (publisher, router) = app(None);
        publisher
            .transition(ReadinessState::Failed("mapping table unavailable".to_string()))
            .expect("failed");

        let response = router.oneshot(get("/ready")).await.expect("route executes");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let payload = read_json(response).await;
        assert_eq!(payload["status"], "failed");
        assert_eq!(payload["reason"], "mapping table unavailable");
    }

    #[tokio::test]
    async fn serves_static_index_with_guessed_type() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("index.html"), "<h1>intake</h1>").expect("write index");
        let (_publisher, router) = app(Some(dir.path().to_path_buf()));

        let response = router.oneshot(get("/")).await.expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html"
        );
    }

    #[tokio::test]
    async fn static_assets_are_absent_without_a_directory() {
        let (_publisher, router) = app(None);
        let response = router
            .oneshot(get("/index.html"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn resolve_asset_refuses_parent_components() {
        let root = Path::new("/srv/public");
        assert_eq!(
            resolve_asset(root, "/css/site.css"),
            Some(PathBuf::from("/srv/public/css/site.css"))
        );
        assert_eq!(
            resolve_asset(root, "/"),
            Some(PathBuf::from("/srv/public/index.html"))
        );
        assert_eq!(resolve_asset(root, "/../secrets.json"), None);
    }
}
