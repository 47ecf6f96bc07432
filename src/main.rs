use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod align;
mod config;
mod error;
mod features;
mod form;
mod inference;
mod model;
mod models;
mod pipeline;
mod report;
mod risk;
mod schema;
mod table;

use config::Settings;
use error::PipelineError;
use form::StudentForm;
use pipeline::Predictor;

#[derive(Parser)]
#[command(name = "dropout-predictor", version)]
#[command(about = "Student dropout risk prediction from academic and socio-economic data", long_about = None)]
struct Cli {
    /// Trained model artifact (JSON)
    #[arg(long, global = true, env = "DROPOUT_MODEL")]
    model: Option<PathBuf>,
    /// Ordered feature list the model was trained on (JSON array)
    #[arg(long, global = true, env = "DROPOUT_FEATURES")]
    features: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the outcome of a single student
    Predict {
        /// JSON object of field values; unspecified fields keep form defaults
        #[arg(long)]
        record: Option<PathBuf>,
        /// Override one field, e.g. --set Debtor=1
        #[arg(long = "set", value_name = "NAME=VALUE")]
        assignments: Vec<String>,
    },
    /// Predict every row of a CSV file
    Batch {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "student_predictions_results.csv")]
        out: PathBuf,
        /// Also write a markdown report
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Rank features by the model's importance scores
    Importance {
        #[arg(long, default_value = "feature_importance.csv")]
        out: PathBuf,
        #[arg(long, default_value_t = 15)]
        top: usize,
    },
    /// Write an empty batch input file with the expected columns
    Template {
        #[arg(long, default_value = "student_data_template.csv")]
        out: PathBuf,
    },
}

fn fail(err: PipelineError) -> anyhow::Error {
    anyhow::anyhow!("{}: {err}", err.kind())
}

fn main() -> anyhow::Result<()> {
    config::init_logging();
    let cli = Cli::parse();
    let settings = Settings::new(cli.model, cli.features);
    let predictor = Predictor::load(&settings).map_err(fail)?;

    match cli.command {
        Commands::Predict {
            record,
            assignments,
        } => {
            let mut form = match record {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    StudentForm::from_json(&raw).map_err(fail)?
                }
                None => StudentForm::default(),
            };
            for assignment in &assignments {
                form.apply(assignment).map_err(fail)?;
            }
            form.validate().map_err(fail)?;

            let prediction = predictor.predict_record(form.to_record()).map_err(fail)?;
            println!(
                "Predicted status: {} {}",
                prediction.status.marker(),
                prediction.status
            );
            if !prediction.status.is_known() {
                println!("Model label: {}", prediction.label);
            }
            println!("Confidence: {:.2}%", prediction.confidence * 100.0);
            println!();
            print!("{}", report::probability_chart(&prediction));
        }
        Commands::Batch {
            csv,
            out,
            report: report_path,
            limit,
        } => {
            let input = table::read_table(&csv)?;
            let outcome = predictor.predict_batch(&input).map_err(fail)?;
            table::write_table(&outcome.results, &out)?;

            println!("Predicted {} students from {}.", outcome.summary.total, csv.display());
            print!("{}", report::summary_lines(&outcome.summary));
            println!("Results written to {}.", out.display());

            if let Some(path) = report_path {
                let importance = predictor.feature_importance().map_err(fail)?;
                let source = csv.display().to_string();
                let text = report::build_report(&report::ReportInput {
                    run_id: outcome.run_id,
                    generated_at: chrono::Utc::now(),
                    source: &source,
                    summary: &outcome.summary,
                    predictions: &outcome.predictions,
                    importance: importance.as_deref(),
                    limit,
                });
                std::fs::write(&path, text)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Report written to {}.", path.display());
            }
        }
        Commands::Importance { out, top } => match predictor.feature_importance().map_err(fail)? {
            Some(ranked) => {
                println!("Top {} features ({}):", top.min(ranked.len()), predictor.model_name());
                print!("{}", report::importance_chart(&ranked, top));
                table::write_table(&pipeline::importance_table(&ranked), &out)?;
                println!("Feature importance written to {}.", out.display());
            }
            None => {
                println!("The model does not support feature importance analysis.");
            }
        },
        Commands::Template { out } => {
            table::write_table(&predictor.template(), &out)?;
            println!(
                "Template with {} columns written to {}.",
                predictor.schema().len(),
                out.display()
            );
        }
    }

    Ok(())
}
