//! Questionnaire intake and risk prediction.
//!
//! Answers flow through a fixed pipeline: capture a snapshot of the form,
//! validate that every question is answered, encode the answers through the
//! mapping table, score the vector and publish a probability. The pipeline is
//! gated on a one-shot startup that loads the mapping table and waits for a
//! scoring function.

pub mod encoder;
pub mod fields;
pub mod mapping;
pub mod orchestrator;
pub mod predictor;
pub mod progress;
pub mod readiness;
pub mod router;
pub mod scoring;
pub mod snapshot;
pub mod source;
pub mod ui;
pub mod validator;

pub use encoder::{encode, EncodedVector, EncodingError};
pub use fields::{
    CatalogError, FeatureName, FieldCatalog, FieldDescriptor, FieldId, FormStep,
};
pub use mapping::{MappingTable, MappingTableError, SchemaAudit, ValueCodes};
pub use orchestrator::{IntakeError, IntakeOrchestrator, Stage};
pub use predictor::{predict, PredictionError, PredictionResult};
pub use progress::{form_progress, FormProgress, StepProgress};
pub use readiness::{
    readiness_channel, Bootstrap, InvalidTransition, ReadinessHandle, ReadinessPublisher,
    ReadinessState, ReadyContext,
};
pub use router::{intake_router, AnswerSubmission};
pub use scoring::{
    wait_for_scorer, LogisticScorer, ModelLoadError, ScorerAlreadyInstalled, ScorerSlot,
    ScorerUnavailable, ScoringError, ScoringFunction, WaitPolicy,
};
pub use snapshot::FormSnapshot;
pub use source::{
    load_table, source_from_location, FileMappingSource, HttpMappingSource, MappingFetchError,
    MappingLoadError, MappingSource, StaticMappingSource,
};
pub use ui::{FormReader, ResultRenderer, TracingControl, TracingRenderer, TriggerControl};
pub use validator::{validate, ValidationFailure};
