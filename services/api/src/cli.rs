use crate::commands::{
    run_batch, run_fields, run_predict, BatchArgs, FieldsArgs, IntakeArgs, PredictArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use risk_intake::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Risk Intake",
    about = "Serve the risk questionnaire or score answers from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score a single set of answers read from a JSON file
    Predict(PredictArgs),
    /// Score every row of a CSV export
    Batch(BatchArgs),
    /// List questionnaire fields grouped by step
    Fields(FieldsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Serve front-end assets from this directory
    #[arg(long)]
    pub(crate) static_dir: Option<PathBuf>,
    #[command(flatten)]
    pub(crate) intake: IntakeArgs,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Predict(args) => run_predict(args).await,
        Command::Batch(args) => run_batch(args).await,
        Command::Fields(args) => run_fields(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["risk-intake-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn batch_accepts_intake_overrides() {
        let cli = Cli::try_parse_from([
            "risk-intake-api",
            "batch",
            "--csv",
            "answers.csv",
            "--mappings",
            "https://cdn.example.org/mappings.json",
        ])
        .expect("parses");

        match cli.command {
            Some(Command::Batch(args)) => {
                assert_eq!(args.csv, PathBuf::from("answers.csv"));
                assert_eq!(
                    args.intake.mappings.as_deref(),
                    Some("https://cdn.example.org/mappings.json")
                );
                assert!(args.output.is_none());
            }
            other => panic!("expected batch, got {other:?}"),
        }
    }
}
