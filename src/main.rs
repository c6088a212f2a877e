//! Rolling-origin classifier evaluation CLI.
//!
//! # Usage
//!
//! ```bash
//! # Evaluate every configured model on every partition
//! rolling-eval run --config config/eval.toml --progress
//!
//! # List the model instances the grid expands to
//! rolling-eval grid --config config/eval.toml
//!
//! # Show the train/test windows
//! rolling-eval windows --config config/eval.toml
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rolling_eval::{ModelFactory, PipelineConfig, PipelineRunner};

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "rolling-eval")]
#[command(about = "Rolling-origin evaluation of binary classifiers on time-sliced data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit and score every model on every partition
    Run {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Show a progress bar per partition
        #[arg(long)]
        progress: bool,
    },

    /// Print the model signatures the grid expands to
    Grid {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print the cut years and test years
    Windows {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn load_config(path: &PathBuf) -> Result<PipelineConfig> {
    PipelineConfig::from_file(path)
        .with_context(|| format!("Failed to load config {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rolling_eval=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, progress } => {
            let config = load_config(&config)?;
            let runner = PipelineRunner::new(config).with_progress(progress);
            let report = runner.run().context("Evaluation failed")?;

            println!("\n{}", SEPARATOR);
            println!("Wrote {} tables", report.tables.len());
            for partition in &report.summary.partitions {
                let best = partition
                    .best
                    .as_ref()
                    .map(|b| format!("{} ({:.4})", b.signature, b.value))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {:>2}  cut {}  test {}-{}  best {}",
                    partition.index, partition.cut_year, partition.test_start, partition.test_end, best
                );
            }
            println!("Summary: {}", report.summary_path.display());
            println!("{}", SEPARATOR);
        }
        Commands::Grid { config } => {
            let config = load_config(&config)?;
            let model_config = config.model_config()?;
            let signatures = ModelFactory::with_defaults()
                .signatures(&model_config)
                .context("Failed to expand model grid")?;
            for signature in &signatures {
                println!("{}", signature);
            }
            println!("{} model instances", signatures.len());
        }
        Commands::Windows { config } => {
            let config = load_config(&config)?;
            let windows: Vec<_> = config.time.windows().collect();
            for window in &windows {
                println!(
                    "  {:>2}  train <= {}  test {}-{}",
                    window.index, window.cut_year, window.test_start, window.test_end
                );
            }
            println!("{} partitions", windows.len());
        }
    }

    Ok(())
}
