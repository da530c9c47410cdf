use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::encoder::EncodingError;
use super::fields::FieldDescriptor;
use super::orchestrator::{IntakeError, IntakeOrchestrator};
use super::progress::form_progress;
use super::readiness::ReadinessState;
use super::ui::{TracingControl, TracingRenderer};

/// Raw answers keyed by form field id.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnswerSubmission {
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct FieldView {
    id: String,
    feature: String,
    label: String,
    /// Accepted answers, available once the mapping table is loaded.
    options: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct StepView {
    number: u8,
    label: &'static str,
    fields: Vec<FieldView>,
}

/// Router exposing the questionnaire definition, step progress and prediction.
///
/// Every request shares the one orchestrator and its busy flag, so predictions
/// are serialized across clients: a `POST /api/v1/predict` that arrives while
/// another is being scored gets `409 Conflict` with kind `busy` and may retry.
pub fn intake_router(orchestrator: Arc<IntakeOrchestrator>) -> Router {
    Router::new()
        .route("/api/v1/form", get(form_handler))
        .route("/api/v1/form/progress", post(progress_handler))
        .route("/api/v1/predict", post(predict_handler))
        .with_state(orchestrator)
}

pub(crate) async fn form_handler(State(orchestrator): State<Arc<IntakeOrchestrator>>) -> Response {
    let readiness = orchestrator.readiness();
    let table = match &readiness {
        ReadinessState::Ready(context) => Some(context.table.clone()),
        _ => None,
    };
    let catalog = orchestrator.catalog();

    let field_view = |field: &FieldDescriptor| FieldView {
        id: field.id.to_string(),
        feature: field.feature.to_string(),
        label: field.label.clone(),
        options: table.as_ref().and_then(|table| {
            table
                .options_for(&field.feature)
                .map(|options| options.into_iter().map(str::to_string).collect())
        }),
    };

    let steps: Vec<StepView> = catalog
        .steps()
        .into_iter()
        .map(|step| StepView {
            number: step.number(),
            label: step.label(),
            fields: catalog
                .fields_for_step(step)
                .into_iter()
                .map(field_view)
                .collect(),
        })
        .collect();

    let payload = json!({
        "readiness": readiness.label(),
        "steps": steps,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn progress_handler(
    State(orchestrator): State<Arc<IntakeOrchestrator>>,
    Json(submission): Json<AnswerSubmission>,
) -> Response {
    let progress = form_progress(&submission.answers, orchestrator.catalog());
    (StatusCode::OK, Json(progress)).into_response()
}

pub(crate) async fn predict_handler(
    State(orchestrator): State<Arc<IntakeOrchestrator>>,
    Json(submission): Json<AnswerSubmission>,
) -> Response {
    match orchestrator.submit(&submission.answers, &TracingRenderer, &TracingControl) {
        Ok(result) => {
            let payload = json!({
                "probability": result.probability(),
                "percentage": result.percentage_label(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(&orchestrator, &error),
    }
}

fn error_response(orchestrator: &IntakeOrchestrator, error: &IntakeError) -> Response {
    let status = error.status_code();

    let mut payload = json!({
        "error": error.to_string(),
        "kind": error.kind(),
    });
    match error {
        IntakeError::Validation(failure) => {
            payload["field"] = json!(failure.field);
            payload["label"] = json!(orchestrator.catalog().label_for(&failure.field));
        }
        IntakeError::Encoding(EncodingError::UnmappedValue { feature, value }) => {
            payload["feature"] = json!(feature);
            payload["value"] = json!(value);
        }
        IntakeError::NotReady { permanent, .. } => {
            payload["permanent"] = json!(permanent);
        }
        _ => {}
    }

    (status, Json(payload)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::fields::FieldCatalog;
    use crate::intake::mapping::MappingTable;
    use crate::intake::readiness::{readiness_channel, ReadyContext};
    use crate::intake::scoring::ScoringError;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use chrono::Utc;
    use serde_json::Value;
    use tower::ServiceExt;

    const TABLE: &[u8] = br#"{
        "feature_order": ["Age_rank", "Sex"],
        "mappings": {
            "Age_rank": {"18-29": 0, "30-44": 1},
            "Sex": {"female": 0, "male": 1}
        }
    }"#;

    fn small_catalog() -> Arc<FieldCatalog> {
        let fields = FieldCatalog::standard()
            .fields()
            .iter()
            .filter(|field| matches!(field.id.as_str(), "age_rank" | "sex"))
            .cloned()
            .collect();
        Arc::new(FieldCatalog::new(fields).expect("catalog"))
    }

    fn ready_orchestrator(output: f64) -> Arc<IntakeOrchestrator> {
        let (publisher, handle) = readiness_channel();
        publisher
            .transition(ReadinessState::Ready(Arc::new(ReadyContext {
                table: Arc::new(MappingTable::from_slice(TABLE).expect("table")),
                scorer: Arc::new(move |_: &[f64]| -> Result<f64, ScoringError> { Ok(output) }),
                since: Utc::now(),
            })))
            .expect("ready");
        Arc::new(IntakeOrchestrator::new(small_catalog(), handle))
    }

    async fn read_json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    #[tokio::test]
    async fn predict_route_returns_percentage() {
        let router = intake_router(ready_orchestrator(0.42));

        let response = router
            .oneshot(post_json(
                "/api/v1/predict",
                json!({"answers": {"age_rank": "30-44", "sex": "female"}}),
            ))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json_body(response).await;
        assert_eq!(payload["percentage"], "42.0%");
        assert_eq!(payload["probability"], 0.42);
    }

    #[tokio::test]
    async fn predict_handler_names_the_missing_field() {
        let response = predict_handler(
            State(ready_orchestrator(0.5)),
            Json(AnswerSubmission {
                answers: BTreeMap::from([("age_rank".to_string(), "30-44".to_string())]),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let payload = read_json_body(response).await;
        assert_eq!(payload["kind"], "validation_failure");
        assert_eq!(payload["field"], "sex");
        assert_eq!(payload["label"], "Sex");
    }

    #[tokio::test]
    async fn predict_handler_rejects_unknown_answer() {
        let response = predict_handler(
            State(ready_orchestrator(0.5)),
            Json(AnswerSubmission {
                answers: BTreeMap::from([
                    ("age_rank".to_string(), "90+".to_string()),
                    ("sex".to_string(), "male".to_string()),
                ]),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let payload = read_json_body(response).await;
        assert_eq!(payload["kind"], "unmapped_value");
        assert_eq!(payload["value"], "90+");
    }

    #[tokio::test]
    async fn predict_is_unavailable_while_loading() {
        let (_publisher, handle) = readiness_channel();
        let orchestrator = Arc::new(IntakeOrchestrator::new(small_catalog(), handle));

        let response = intake_router(orchestrator)
            .oneshot(post_json("/api/v1/predict", json!({"answers": {}})))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let payload = read_json_body(response).await;
        assert_eq!(payload["permanent"], false);
    }

    #[tokio::test]
    async fn form_route_lists_steps_with_options() {
        let response = intake_router(ready_orchestrator(0.5))
            .oneshot(
                Request::get("/api/v1/form")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json_body(response).await;
        assert_eq!(payload["readiness"], "ready");
        let first = &payload["steps"][0];
        assert_eq!(first["number"], 1);
        assert_eq!(first["fields"][0]["id"], "age_rank");
        assert_eq!(first["fields"][0]["options"], json!(["18-29", "30-44"]));
    }

    #[tokio::test]
    async fn progress_route_reports_completed_steps() {
        let response = intake_router(ready_orchestrator(0.5))
            .oneshot(post_json(
                "/api/v1/form/progress",
                json!({"answers": {"age_rank": "18-29", "sex": "male"}}),
            ))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json_body(response).await;
        assert_eq!(payload["active_through"], 1);
        assert_eq!(payload["steps"][0]["complete"], true);
    }
}
