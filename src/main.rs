//! Anzuelo CLI
//!
//! Single-command entry point for the anzuelo library.
//!
//! # Usage
//!
//! ```bash
//! # Generate a synthetic dataset
//! anzuelo generate --count 1000 --phishing-ratio 0.5 --out data/synthetic
//!
//! # Train from config
//! anzuelo train config.yaml
//!
//! # Train with overrides
//! anzuelo train config.yaml --max-steps 100 --lr 0.0001
//!
//! # Validate config
//! anzuelo validate config.yaml --detailed
//!
//! # Show config info
//! anzuelo info config.yaml --format yaml
//! ```
//!
//! In a multi-process run, the `LOCAL_RANK` environment variable selects
//! the primary rank; only rank 0 logs metrics and writes checkpoints.

use anzuelo::config::{
    apply_overrides, load_config, Cli, Command, GenerateArgs, InfoArgs, OutputFormat, TrainArgs,
    ValidateArgs,
};
use anzuelo::data::{write_splits, SyntheticGenerator};
use anzuelo::train::{run_training, NullSink, StdoutSink};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        LogLevel::Quiet
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Normal
    };

    let result = match cli.command {
        Command::Generate(args) => run_generate(args, log_level),
        Command::Train(args) => run_train(args, log_level),
        Command::Validate(args) => run_validate(args, log_level),
        Command::Info(args) => run_info(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

fn log(level: LogLevel, required: LogLevel, msg: &str) {
    if level != LogLevel::Quiet && (level == required || required == LogLevel::Normal) {
        println!("{msg}");
    }
}

/// Primary-rank capability from the process environment
fn is_primary_rank() -> bool {
    local_rank() == 0
}

fn local_rank() -> usize {
    std::env::var("LOCAL_RANK")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn run_generate(args: GenerateArgs, level: LogLevel) -> Result<(), String> {
    if !(0.0..=1.0).contains(&args.phishing_ratio) {
        return Err(format!(
            "phishing ratio {} must be between 0 and 1",
            args.phishing_ratio
        ));
    }

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Generating {} records ({}% phishing) into {}",
            args.count,
            (args.phishing_ratio * 100.0).round(),
            args.out.display()
        ),
    );

    let mut generator = match args.seed {
        Some(seed) => SyntheticGenerator::with_seed(seed),
        None => SyntheticGenerator::new(),
    };
    let records = generator.generate(args.count, args.phishing_ratio);

    let summary =
        write_splits(records, &args.out).map_err(|e| format!("Generation error: {e}"))?;

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Wrote {} train / {} val / {} test examples",
            summary.train, summary.val, summary.test
        ),
    );
    Ok(())
}

fn run_train(args: TrainArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Anzuelo: training from {}", args.config.display()),
    );

    let mut spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    apply_overrides(&mut spec, &args);

    if args.dry_run {
        log(
            level,
            LogLevel::Normal,
            "Dry run - config validated successfully",
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("  Model: {}", spec.model.path.display()),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!(
                "  LoRA: rank={}, alpha={}, targets={:?}",
                spec.lora.rank, spec.lora.alpha, spec.lora.target_modules
            ),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!(
                "  Steps: {} (accumulation {})",
                spec.training.max_steps, spec.training.gradient_accumulation_steps
            ),
        );
        return Ok(());
    }

    let is_primary = is_primary_rank();
    let result = if level == LogLevel::Quiet || !is_primary {
        run_training(&spec, is_primary, &mut NullSink)
    } else {
        run_training(&spec, is_primary, &mut StdoutSink)
    }
    .map_err(|e| format!("Training error: {e}"))?;

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Training complete: {} steps, {} optimizer updates, final loss {:.4}",
            result.steps, result.optimizer_updates, result.final_loss
        ),
    );
    for checkpoint in &result.checkpoints {
        log(
            level,
            LogLevel::Verbose,
            &format!("  checkpoint: {}", checkpoint.display()),
        );
    }
    Ok(())
}

fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Validating config: {}", args.config.display()),
    );

    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;

    log(level, LogLevel::Normal, "Configuration is valid");

    if args.detailed {
        println!();
        println!("Configuration Summary:");
        println!("  Model path: {}", spec.model.path.display());
        println!();
        println!("  Training data: {}", spec.data.train.display());
        if let Some(val) = &spec.data.val {
            println!("  Validation data: {}", val.display());
        }
        if let Some(cache) = &spec.data.cache_dir {
            println!("  Cache dir: {}", cache.display());
        }
        println!("  Batch size: {}", spec.data.batch_size);
        println!("  Max length: {}", spec.data.max_length);
        println!();
        println!("  Learning rate: {}", spec.optimizer.lr);
        println!("  Weight decay: {}", spec.optimizer.weight_decay);
        println!();
        println!("  Max steps: {}", spec.training.max_steps);
        println!("  Warmup steps: {}", spec.training.warmup_steps);
        println!(
            "  Gradient accumulation: {}",
            spec.training.gradient_accumulation_steps
        );
        if let Some(clip) = spec.training.max_grad_norm {
            println!("  Gradient clipping: {clip}");
        }
        println!("  Output dir: {}", spec.training.output_dir.display());
        println!();
        println!("  LoRA:");
        println!("    Rank: {}", spec.lora.rank);
        println!("    Alpha: {}", spec.lora.alpha);
        if spec.lora.dropout > 0.0 {
            println!("    Dropout: {}", spec.lora.dropout);
        }
        println!("    Targets: {:?}", spec.lora.target_modules);

        if let Some(quant) = &spec.quantize {
            println!();
            println!("  Quantization: {}-bit", quant.bits);
        }
    }

    Ok(())
}

fn run_info(args: InfoArgs) -> Result<(), String> {
    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;

    match args.format {
        OutputFormat::Text => {
            println!("Model: {}", spec.model.path.display());
            println!("Train data: {}", spec.data.train.display());
            println!("Learning rate: {}", spec.optimizer.lr);
            println!("Max steps: {}", spec.training.max_steps);
            println!("LoRA rank: {}", spec.lora.rank);
            if spec.quantize.is_some() {
                println!("Quantization: enabled");
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&spec)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&spec)
                .map_err(|e| format!("YAML serialization error: {e}"))?;
            println!("{yaml}");
        }
    }

    Ok(())
}
