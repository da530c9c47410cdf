use metrics_exporter_prometheus::PrometheusHandle;
use risk_intake::config::IntakeConfig;
use risk_intake::intake::{
    readiness_channel, source_from_location, Bootstrap, FieldCatalog, IntakeError,
    IntakeOrchestrator, LogisticScorer, PredictionResult, ReadinessHandle, ResultRenderer,
    ScorerSlot,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: ReadinessHandle,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) static_dir: Option<PathBuf>,
}

/// Orchestrator plus a handle for observing startup.
pub(crate) struct IntakeRuntime {
    pub(crate) orchestrator: Arc<IntakeOrchestrator>,
    pub(crate) readiness: ReadinessHandle,
}

/// Kicks off the one-shot startup in the background: the model file is
/// loaded into the scorer slot while the mapping table is fetched. Callers
/// get a runtime immediately; predictions are refused until it settles.
pub(crate) fn start_intake(config: &IntakeConfig) -> IntakeRuntime {
    let catalog = Arc::new(FieldCatalog::standard());
    let (publisher, readiness) = readiness_channel();
    let slot = ScorerSlot::new();

    let model_path = config.model_path.clone();
    let installer = slot.clone();
    tokio::spawn(async move {
        match LogisticScorer::from_path(&model_path).await {
            Ok(scorer) => {
                info!(path = %model_path.display(), arity = scorer.arity(), "scoring model loaded");
                if installer.install(Arc::new(scorer)).is_err() {
                    error!("scoring model installed twice; keeping the first");
                }
            }
            Err(err) => error!(error = %err, "scoring model failed to load"),
        }
    });

    let bootstrap = Bootstrap::new(
        source_from_location(&config.mappings_source),
        slot,
        config.wait_policy,
        catalog.clone(),
    );
    tokio::spawn(bootstrap.run(publisher));

    IntakeRuntime {
        orchestrator: Arc::new(IntakeOrchestrator::new(catalog, readiness.clone())),
        readiness,
    }
}

/// Writes results for a terminal user.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ConsoleRenderer;

impl ResultRenderer for ConsoleRenderer {
    fn publish(&self, result: &PredictionResult) {
        println!("Predicted risk: {}", result.percentage_label());
    }

    fn report_error(&self, error: &IntakeError) {
        eprintln!("prediction failed ({}): {error}", error.kind());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use risk_intake::intake::{ReadinessState, WaitPolicy};
    use std::time::Duration;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).expect("write fixture");
        path
    }

    fn config(mappings: PathBuf, model: PathBuf) -> IntakeConfig {
        IntakeConfig {
            mappings_source: mappings.display().to_string(),
            model_path: model,
            wait_policy: WaitPolicy {
                max_attempts: 40,
                interval: Duration::from_millis(5),
            },
            static_dir: None,
        }
    }

    #[tokio::test]
    async fn start_intake_becomes_ready_with_both_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mappings = write(
            &dir,
            "mappings.json",
            r#"{"feature_order": ["Sex"], "mappings": {"Sex": {"male": 0, "female": 1}}}"#,
        );
        let model = write(&dir, "model.json", r#"{"intercept": 0.0, "coefficients": [1.0]}"#);

        let mut runtime = start_intake(&config(mappings, model));
        assert!(runtime.readiness.settled().await.is_ready());
        assert!(runtime.orchestrator.readiness().is_ready());
    }

    #[tokio::test]
    async fn start_intake_fails_when_model_is_missing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mappings = write(
            &dir,
            "mappings.json",
            r#"{"feature_order": ["Sex"], "mappings": {"Sex": {"male": 0}}}"#,
        );

        let mut runtime = start_intake(&config(mappings, dir.path().join("model.json")));
        match runtime.readiness.settled().await {
            ReadinessState::Failed(reason) => assert!(reason.contains("40 attempts")),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
