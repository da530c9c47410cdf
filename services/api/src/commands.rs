use crate::infra::{start_intake, ConsoleRenderer};
use clap::Args;
use risk_intake::config::{AppConfig, IntakeConfig};
use risk_intake::error::AppError;
use risk_intake::intake::{
    load_table, source_from_location, FieldCatalog, IntakeOrchestrator, ReadinessState,
    TracingControl, TracingRenderer,
};
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::path::PathBuf;

/// Overrides shared by every command that touches the prediction pipeline.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct IntakeArgs {
    /// Mapping table location (path or http(s) URL)
    #[arg(long)]
    pub(crate) mappings: Option<String>,
    /// Logistic model definition (JSON)
    #[arg(long)]
    pub(crate) model: Option<PathBuf>,
}

impl IntakeArgs {
    pub(crate) fn apply(self, config: &mut IntakeConfig) {
        if let Some(mappings) = self.mappings {
            config.mappings_source = mappings;
        }
        if let Some(model) = self.model {
            config.model_path = model;
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct PredictArgs {
    /// JSON object mapping field ids to answers
    #[arg(long)]
    pub(crate) answers: PathBuf,
    #[command(flatten)]
    pub(crate) intake: IntakeArgs,
}

#[derive(Args, Debug)]
pub(crate) struct BatchArgs {
    /// CSV whose header row names field ids, one respondent per row
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Write results here instead of stdout
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    #[command(flatten)]
    pub(crate) intake: IntakeArgs,
}

#[derive(Args, Debug, Default)]
pub(crate) struct FieldsArgs {
    /// Also list accepted answers from this mapping table
    #[arg(long)]
    pub(crate) mappings: Option<String>,
}

pub(crate) async fn run_predict(args: PredictArgs) -> Result<(), AppError> {
    let PredictArgs { answers, intake } = args;

    let raw = tokio::fs::read(&answers).await?;
    let answers: BTreeMap<String, String> = serde_json::from_slice(&raw).map_err(|err| {
        AppError::Input(format!(
            "{} must be a JSON object of field ids to answers ({err})",
            answers.display()
        ))
    })?;

    let orchestrator = ready_orchestrator(intake).await?;
    orchestrator.submit(&answers, &ConsoleRenderer, &TracingControl)?;
    Ok(())
}

pub(crate) async fn run_batch(args: BatchArgs) -> Result<(), AppError> {
    let BatchArgs {
        csv,
        output,
        intake,
    } = args;

    let orchestrator = ready_orchestrator(intake).await?;
    let input = std::fs::File::open(&csv)?;

    let summary = match output {
        Some(path) => score_rows(&orchestrator, input, std::fs::File::create(path)?)?,
        None => score_rows(&orchestrator, input, std::io::stdout().lock())?,
    };

    eprintln!(
        "Scored {} of {} rows ({} rejected)",
        summary.scored,
        summary.total(),
        summary.rejected
    );
    Ok(())
}

pub(crate) async fn run_fields(args: FieldsArgs) -> Result<(), AppError> {
    let catalog = FieldCatalog::standard();
    let table = match args.mappings {
        Some(location) => Some(load_table(source_from_location(&location).as_ref()).await?),
        None => None,
    };

    for step in catalog.steps() {
        println!("Step {}: {}", step.number(), step.label());
        for field in catalog.fields_for_step(step) {
            let options = table
                .as_ref()
                .and_then(|table| table.options_for(&field.feature))
                .map(|options| format!(" [{}]", options.join(", ")))
                .unwrap_or_default();
            println!("  - {} ({}) -> {}{}", field.id, field.label, field.feature, options);
        }
    }

    if let Some(table) = &table {
        let audit = table.audit(&catalog);
        if !audit.is_clean() {
            println!("\nSchema drift");
            for feature in &audit.missing_mappings {
                println!("  - {feature}: ordered but has no encodings");
            }
            for feature in &audit.uncovered_features {
                println!("  - {feature}: ordered but not collected by any field");
            }
            for feature in &audit.unordered_fields {
                println!("  - {feature}: collected but never scored");
            }
        }
    }

    Ok(())
}

async fn ready_orchestrator(
    intake: IntakeArgs,
) -> Result<std::sync::Arc<IntakeOrchestrator>, AppError> {
    let mut config = AppConfig::load()?;
    intake.apply(&mut config.intake);

    let mut runtime = start_intake(&config.intake);
    match runtime.readiness.settled().await {
        ReadinessState::Ready(_) => Ok(runtime.orchestrator),
        ReadinessState::Failed(reason) => Err(AppError::Input(format!(
            "prediction prerequisites unavailable: {reason}"
        ))),
        ReadinessState::Loading => Err(AppError::Input(
            "prediction prerequisites never finished loading".to_string(),
        )),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BatchSummary {
    pub(crate) scored: usize,
    pub(crate) rejected: usize,
}

impl BatchSummary {
    pub(crate) fn total(&self) -> usize {
        self.scored + self.rejected
    }
}

/// Scores every row of `input` and writes the original columns followed by
/// `probability`, `percentage` and `error`. Rejected rows are kept with the
/// error filled in.
pub(crate) fn score_rows<R: Read, W: Write>(
    orchestrator: &IntakeOrchestrator,
    input: R,
    output: W,
) -> Result<BatchSummary, AppError> {
    let mut reader = csv::Reader::from_reader(input);
    let mut writer = csv::Writer::from_writer(output);

    let headers = reader.headers().map_err(csv_error)?.clone();
    let mut header_row: Vec<&str> = headers.iter().collect();
    header_row.extend(["probability", "percentage", "error"]);
    writer.write_record(&header_row).map_err(csv_error)?;

    let mut summary = BatchSummary::default();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let answers: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(id, value)| (id.trim().to_string(), value.trim().to_string()))
            .collect();

        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        match orchestrator.submit(&answers, &TracingRenderer, &TracingControl) {
            Ok(result) => {
                summary.scored += 1;
                row.push(format!("{:.6}", result.probability()));
                row.push(result.percentage_label());
                row.push(String::new());
            }
            Err(err) => {
                summary.rejected += 1;
                row.push(String::new());
                row.push(String::new());
                row.push(err.to_string());
            }
        }
        writer.write_record(&row).map_err(csv_error)?;
    }

    writer.flush()?;
    Ok(summary)
}

fn csv_error(err: csv::Error) -> AppError {
    AppError::Io(err.into())
}
