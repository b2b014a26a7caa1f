//! Training loop, batch sampling and metric sinks

mod metrics;
mod sampler;
mod trainer;

pub use metrics::{MemorySink, MetricRecord, MetricsSink, NullSink, StdoutSink};
pub use sampler::BatchSampler;
pub use trainer::{TrainResult, Trainer, TrainerConfig};

use crate::config::TrainSpec;
use crate::data::PhishingDataset;
use crate::model::{AdapterLm, LoraConfig};
use crate::optim::AdamW;
use crate::Result;

/// Run a full training job from a validated spec
///
/// Loads the model and datasets, builds the optimizer and trainer, and
/// drives the loop. `is_primary` gates every I/O side effect; non-primary
/// ranks in a multi-process run execute the same compute silently.
pub fn run_training(
    spec: &TrainSpec,
    is_primary: bool,
    sink: &mut dyn MetricsSink,
) -> Result<TrainResult> {
    let lora = LoraConfig {
        rank: spec.lora.rank,
        alpha: spec.lora.alpha,
        dropout: spec.lora.dropout,
        target_modules: spec.lora.target_modules.clone(),
    };
    let quant_bits = spec.quantize.as_ref().map(|q| q.bits);

    let model = AdapterLm::load(&spec.model.path, lora, quant_bits, spec.training.seed)?;

    let cache_dir = spec.data.cache_dir.as_deref();
    let (train_set, train_report) = PhishingDataset::load(
        std::slice::from_ref(&spec.data.train),
        model.tokenizer(),
        spec.data.max_length,
        cache_dir,
    )?;
    if is_primary && train_report.dropped > 0 {
        eprintln!(
            "dropped {} of {} training records",
            train_report.dropped,
            train_report.dropped + train_report.loaded
        );
    }

    let eval_set = match &spec.data.val {
        Some(val_path) => {
            let (eval_set, _) = PhishingDataset::load(
                std::slice::from_ref(val_path),
                model.tokenizer(),
                spec.data.max_length,
                cache_dir,
            )?;
            Some(eval_set)
        }
        None => None,
    };

    let optimizer = AdamW::new(
        spec.optimizer.lr,
        spec.optimizer.beta1,
        spec.optimizer.beta2,
        spec.optimizer.epsilon,
        spec.optimizer.weight_decay,
    );

    let config = TrainerConfig {
        max_steps: spec.training.max_steps,
        gradient_accumulation_steps: spec.training.gradient_accumulation_steps,
        warmup_steps: spec.training.warmup_steps,
        max_grad_norm: spec.training.max_grad_norm,
        logging_steps: spec.training.logging_steps,
        eval_steps: spec.training.eval_steps,
        save_steps: spec.training.save_steps,
        batch_size: spec.data.batch_size,
        eval_batch_size: spec.data.eval_batch_size,
        output_dir: spec.training.output_dir.clone(),
        seed: spec.training.seed,
    };

    let mut trainer = Trainer::new(model, Box::new(optimizer), config, is_primary);
    trainer.train(&train_set, eval_set.as_ref(), sink)
}
