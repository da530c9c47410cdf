use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::fields::FieldCatalog;
use super::mapping::MappingTable;
use super::scoring::{wait_for_scorer, ScorerSlot, ScoringFunction, WaitPolicy};
use super::source::{load_table, MappingSource};

/// Everything a prediction needs once startup has resolved.
pub struct ReadyContext {
    pub table: Arc<MappingTable>,
    pub scorer: Arc<dyn ScoringFunction>,
    pub since: DateTime<Utc>,
}

impl fmt::Debug for ReadyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyContext")
            .field("features", &self.table.len())
            .field("since", &self.since)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum ReadinessState {
    Loading,
    Ready(Arc<ReadyContext>),
    Failed(String),
}

impl ReadinessState {
    pub fn label(&self) -> &'static str {
        match self {
            ReadinessState::Loading => "loading",
            ReadinessState::Ready(_) => "ready",
            ReadinessState::Failed(_) => "failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessState::Ready(_))
    }

    /// Startup resolves once: `Loading` may move to `Ready` or `Failed`, and
    /// both of those are terminal until the process restarts.
    pub fn permits(&self, next: &ReadinessState) -> bool {
        matches!(
            (self, next),
            (ReadinessState::Loading, ReadinessState::Ready(_))
                | (ReadinessState::Loading, ReadinessState::Failed(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("readiness cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub to: &'static str,
}

/// Write side of the readiness channel, held by the startup task.
#[derive(Debug)]
pub struct ReadinessPublisher {
    tx: watch::Sender<ReadinessState>,
}

/// Read side of the readiness channel. Cheap to clone and query.
#[derive(Debug, Clone)]
pub struct ReadinessHandle {
    rx: watch::Receiver<ReadinessState>,
}

pub fn readiness_channel() -> (ReadinessPublisher, ReadinessHandle) {
    let (tx, rx) = watch::channel(ReadinessState::Loading);
    (ReadinessPublisher { tx }, ReadinessHandle { rx })
}

impl ReadinessPublisher {
    pub fn transition(&self, next: ReadinessState) -> Result<(), InvalidTransition> {
        let from = self.tx.borrow().label();
        let to = next.label();

        let applied = self.tx.send_if_modified(|state| {
            if state.permits(&next) {
                *state = next;
                true
            } else {
                false
            }
        });

        if applied {
            Ok(())
        } else {
            Err(InvalidTransition { from, to })
        }
    }

    pub fn subscribe(&self) -> ReadinessHandle {
        ReadinessHandle {
            rx: self.tx.subscribe(),
        }
    }
}

impl ReadinessHandle {
    pub fn current(&self) -> ReadinessState {
        self.rx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.rx.borrow().is_ready()
    }

    /// Resolves once startup leaves `Loading`.
    pub async fn settled(&mut self) -> ReadinessState {
        let settled = self
            .rx
            .wait_for(|state| !matches!(state, ReadinessState::Loading))
            .await
            .map(|state| state.clone());

        match settled {
            Ok(state) => state,
            Err(_) => self.current(),
        }
    }
}

/// Startup task: one fetch of the mapping table and one bounded wait for the
/// scorer, after which readiness is final.
pub struct Bootstrap {
    source: Box<dyn MappingSource>,
    slot: ScorerSlot,
    policy: WaitPolicy,
    catalog: Arc<FieldCatalog>,
}

impl Bootstrap {
    pub fn new(
        source: Box<dyn MappingSource>,
        slot: ScorerSlot,
        policy: WaitPolicy,
        catalog: Arc<FieldCatalog>,
    ) -> Self {
        Self {
            source,
            slot,
            policy,
            catalog,
        }
    }

    pub async fn run(self, publisher: ReadinessPublisher) -> ReadinessState {
        let Bootstrap {
            source,
            slot,
            policy,
            catalog,
        } = self;

        info!(source = %source.describe(), max_attempts = policy.max_attempts, "loading prediction prerequisites");
        let next = match load_table(source.as_ref()).await {
            Err(err) => {
                error!(error = %err, "mapping table unavailable");
                ReadinessState::Failed(format!("mapping table unavailable: {err}"))
            }
            Ok(table) => match wait_for_scorer(&slot, &policy).await {
                Err(err) => {
                    error!(error = %err, "scoring function unavailable");
                    ReadinessState::Failed(err.to_string())
                }
                Ok(scorer) => {
                    report_schema_drift(&table, &catalog);
                    info!(features = table.len(), "prediction prerequisites ready");
                    ReadinessState::Ready(Arc::new(ReadyContext {
                        table: Arc::new(table),
                        scorer,
                        since: Utc::now(),
                    }))
                }
            },
        };

        if let Err(err) = publisher.transition(next.clone()) {
            warn!(error = %err, "readiness already resolved; keeping previous state");
            return publisher.subscribe().current();
        }
        next
    }
}

fn report_schema_drift(table: &MappingTable, catalog: &FieldCatalog) {
    let audit = table.audit(catalog);
    if audit.is_clean() {
        return;
    }

    for feature in &audit.missing_mappings {
        warn!(%feature, "ordered feature has no encodings; predictions will fail");
    }
    for feature in &audit.uncovered_features {
        warn!(%feature, "ordered feature is not collected by any form field");
    }
    for feature in &audit.unordered_fields {
        warn!(%feature, "form field feeds a feature the table does not order");
    }
}
