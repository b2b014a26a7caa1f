//! Command-line interface definitions and config overrides

use super::schema::TrainSpec;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Fine-tune a causal LM to analyze phishing emails
#[derive(Parser)]
#[command(name = "anzuelo", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print extra detail
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Print nothing but errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a synthetic phishing/legitimate email dataset
    Generate(GenerateArgs),
    /// Train from a YAML config
    Train(TrainArgs),
    /// Validate a YAML config
    Validate(ValidateArgs),
    /// Show a resolved config
    Info(InfoArgs),
}

#[derive(clap::Args)]
pub struct GenerateArgs {
    /// Number of records to generate
    #[arg(long, default_value_t = 1000)]
    pub count: usize,

    /// Fraction of phishing records
    #[arg(long, default_value_t = 0.5)]
    pub phishing_ratio: f64,

    /// Output directory for the JSONL splits
    #[arg(long, default_value = "data/synthetic")]
    pub out: PathBuf,

    /// Seed for reproducible generation
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(clap::Args)]
pub struct TrainArgs {
    /// Path to the YAML config
    pub config: PathBuf,

    /// Override the number of training steps
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Override the learning rate
    #[arg(long)]
    pub lr: Option<f32>,

    /// Override the checkpoint output directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Validate and print the resolved config without training
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args)]
pub struct ValidateArgs {
    /// Path to the YAML config
    pub config: PathBuf,

    /// Print a configuration summary after validation
    #[arg(long)]
    pub detailed: bool,
}

#[derive(clap::Args)]
pub struct InfoArgs {
    /// Path to the YAML config
    pub config: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

/// Apply command-line overrides on top of a loaded spec
pub fn apply_overrides(spec: &mut TrainSpec, args: &TrainArgs) {
    if let Some(max_steps) = args.max_steps {
        spec.training.max_steps = max_steps;
    }
    if let Some(lr) = args.lr {
        spec.optimizer.lr = lr;
    }
    if let Some(output_dir) = &args.output_dir {
        spec.training.output_dir = output_dir.clone();
    }
}
