//! Step-driven training loop
//!
//! Drives exactly `max_steps` iterations over the training set with
//! gradient accumulation, periodic evaluation and checkpointing. All I/O
//! side effects (metric logging, progress lines, checkpoint writes) are
//! gated on the explicitly passed primary-rank capability; non-primary
//! ranks run the same compute and skip the I/O.

use super::metrics::MetricsSink;
use super::sampler::BatchSampler;
use crate::data::PhishingDataset;
use crate::model::CausalLm;
use crate::optim::{clip_grad_norm, LinearWarmupDecay, LrScheduler, Optimizer};
use crate::{Error, Result, Tensor};
use std::path::PathBuf;

/// Training loop configuration
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Total training steps (one batch each)
    pub max_steps: usize,
    /// Gradient accumulation steps (1 = no accumulation)
    pub gradient_accumulation_steps: usize,
    /// Linear warmup steps for the learning-rate schedule
    pub warmup_steps: usize,
    /// Maximum gradient norm for clipping (None = no clipping)
    pub max_grad_norm: Option<f32>,
    /// Print a progress line every N steps (0 = never)
    pub logging_steps: usize,
    /// Evaluate every N steps (0 = never)
    pub eval_steps: usize,
    /// Save a checkpoint every N steps (0 = never)
    pub save_steps: usize,
    /// Training batch size
    pub batch_size: usize,
    /// Evaluation batch size
    pub eval_batch_size: usize,
    /// Directory receiving `checkpoint-<step>` subdirectories
    pub output_dir: PathBuf,
    /// Seed for batch sampling
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            gradient_accumulation_steps: 4,
            warmup_steps: 100,
            max_grad_norm: Some(1.0),
            logging_steps: 10,
            eval_steps: 100,
            save_steps: 1000,
            batch_size: 1,
            eval_batch_size: 2,
            output_dir: PathBuf::from("outputs"),
            seed: 42,
        }
    }
}

/// Result of a training run
#[derive(Debug, Clone)]
pub struct TrainResult {
    /// Steps executed (always `max_steps`)
    pub steps: usize,
    /// Optimizer updates applied
    pub optimizer_updates: usize,
    /// Learning-rate schedule advances
    pub scheduler_advances: usize,
    /// Loss of the final step
    pub final_loss: f32,
    /// Mean loss over all steps
    pub mean_loss: f32,
    /// Checkpoint directories written, in order
    pub checkpoints: Vec<PathBuf>,
}

/// Orchestrates the training loop over a [`CausalLm`]
pub struct Trainer<M: CausalLm> {
    model: M,
    optimizer: Box<dyn Optimizer>,
    scheduler: LinearWarmupDecay,
    config: TrainerConfig,
    /// Handles shared with the model's adapter tensors
    params: Vec<Tensor>,
    is_primary: bool,
}

impl<M: CausalLm> Trainer<M> {
    /// Create a trainer
    ///
    /// The learning-rate schedule warms up over `warmup_steps` and decays
    /// linearly to zero at `max_steps`, starting from the optimizer's
    /// configured learning rate.
    pub fn new(
        model: M,
        optimizer: Box<dyn Optimizer>,
        config: TrainerConfig,
        is_primary: bool,
    ) -> Self {
        let scheduler =
            LinearWarmupDecay::new(optimizer.lr(), config.warmup_steps, config.max_steps);
        let params = model.trainable_params();

        Self {
            model,
            optimizer,
            scheduler,
            config,
            params,
            is_primary,
        }
    }

    /// Borrow the wrapped model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Consume the trainer and return the model
    pub fn into_model(self) -> M {
        self.model
    }

    /// Run exactly `max_steps` training iterations
    pub fn train(
        &mut self,
        train_set: &PhishingDataset,
        eval_set: Option<&PhishingDataset>,
        sink: &mut dyn MetricsSink,
    ) -> Result<TrainResult> {
        if train_set.is_empty() {
            return Err(Error::Data("training dataset is empty".to_string()));
        }

        let accum = self.config.gradient_accumulation_steps.max(1);
        let loss_scale = 1.0 / accum as f32;
        let max_steps = self.config.max_steps;

        let mut sampler = BatchSampler::new(train_set.len(), self.config.batch_size, self.config.seed);

        self.model.set_training(true);

        let mut optimizer_updates = 0;
        let mut checkpoints = Vec::new();
        let mut final_loss = 0.0;
        let mut loss_total = 0.0;

        for step in 0..max_steps {
            let batch = sampler.next_batch(train_set);
            let loss = self.model.forward_backward(&batch, loss_scale)?;
            final_loss = loss;
            loss_total += loss;

            if (step + 1) % accum == 0 {
                if let Some(max_norm) = self.config.max_grad_norm {
                    clip_grad_norm(&self.params, max_norm);
                }
                self.scheduler.step();
                self.optimizer.set_lr(self.scheduler.get_lr());
                self.optimizer.step(&mut self.params);
                self.optimizer.zero_grad(&mut self.params);
                optimizer_updates += 1;
            }

            if self.is_primary {
                sink.log(
                    &[
                        ("loss", f64::from(loss)),
                        ("learning_rate", f64::from(self.optimizer.lr())),
                    ],
                    step,
                );

                if self.config.logging_steps > 0 && (step + 1) % self.config.logging_steps == 0 {
                    println!(
                        "step {}/{}: loss={:.4}, lr={:.6}",
                        step + 1,
                        max_steps,
                        loss,
                        self.optimizer.lr()
                    );
                }
            }

            if self.config.eval_steps > 0 && (step + 1) % self.config.eval_steps == 0 {
                if let Some(eval_set) = eval_set {
                    let eval_loss = self.evaluate(eval_set)?;
                    if self.is_primary {
                        sink.log(&[("eval_loss", f64::from(eval_loss))], step);
                    }
                }
            }

            if self.config.save_steps > 0
                && (step + 1) % self.config.save_steps == 0
                && self.is_primary
            {
                let dir = self.config.output_dir.join(format!("checkpoint-{}", step + 1));
                self.model.save_adapter(&dir)?;
                if self.config.logging_steps > 0 {
                    println!("saved checkpoint to {}", dir.display());
                }
                checkpoints.push(dir);
            }
        }

        Ok(TrainResult {
            steps: max_steps,
            optimizer_updates,
            scheduler_advances: self.scheduler.steps_taken(),
            final_loss,
            mean_loss: loss_total / max_steps.max(1) as f32,
            checkpoints,
        })
    }

    /// Mean loss over the evaluation set in no-gradient mode
    pub fn evaluate(&mut self, eval_set: &PhishingDataset) -> Result<f32> {
        self.model.set_training(false);

        let mut total = 0.0;
        let mut batches = 0;
        for chunk in eval_set.examples().chunks(self.config.eval_batch_size.max(1)) {
            total += self.model.evaluate_loss(chunk)?;
            batches += 1;
        }

        self.model.set_training(true);

        Ok(if batches > 0 { total / batches as f32 } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{EncodedExample, IGNORE_INDEX};
    use crate::model::CausalLm;
    use crate::optim::AdamW;
    use crate::train::{MemorySink, NullSink};
    use approx::assert_abs_diff_eq;
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;

    struct StubLm {
        param: Tensor,
        forward_calls: Rc<RefCell<usize>>,
        eval_calls: Rc<RefCell<usize>>,
        training: bool,
    }

    impl StubLm {
        fn new() -> Self {
            Self {
                param: Tensor::from_vec(vec![1.0], true),
                forward_calls: Rc::new(RefCell::new(0)),
                eval_calls: Rc::new(RefCell::new(0)),
                training: true,
            }
        }
    }

    impl CausalLm for StubLm {
        fn forward_backward(&mut self, _batch: &[EncodedExample], loss_scale: f32) -> Result<f32> {
            *self.forward_calls.borrow_mut() += 1;
            self.param.accumulate_grad(&ndarray::arr1(&[loss_scale]));
            Ok(1.0)
        }

        fn evaluate_loss(&mut self, _batch: &[EncodedExample]) -> Result<f32> {
            assert!(!self.training, "evaluation must run in eval mode");
            *self.eval_calls.borrow_mut() += 1;
            Ok(0.5)
        }

        fn trainable_params(&self) -> Vec<Tensor> {
            vec![self.param.clone()]
        }

        fn set_training(&mut self, training: bool) {
            self.training = training;
        }

        fn save_adapter(&self, dir: &Path) -> Result<()> {
            std::fs::create_dir_all(dir)?;
            std::fs::write(dir.join("adapter_config.json"), "{}")?;
            Ok(())
        }
    }

    fn dataset_of(n: usize) -> PhishingDataset {
        let examples = (0..n)
            .map(|i| EncodedExample {
                input_ids: vec![i as u32, i as u32],
                attention_mask: vec![1, 1],
                labels: vec![IGNORE_INDEX, i as i64],
            })
            .collect();
        PhishingDataset::from_examples(examples)
    }

    fn config(dir: &Path) -> TrainerConfig {
        TrainerConfig {
            max_steps: 4,
            gradient_accumulation_steps: 2,
            warmup_steps: 0,
            max_grad_norm: Some(1.0),
            logging_steps: 0,
            eval_steps: 0,
            save_steps: 0,
            batch_size: 2,
            eval_batch_size: 2,
            output_dir: dir.to_path_buf(),
            seed: 42,
        }
    }

    #[test]
    fn test_accumulation_gives_exact_update_counts() {
        let dir = tempfile::tempdir().unwrap();
        let model = StubLm::new();
        let forward_calls = model.forward_calls.clone();

        let mut trainer = Trainer::new(
            model,
            Box::new(AdamW::default_params(0.1)),
            config(dir.path()),
            true,
        );

        let result = trainer
            .train(&dataset_of(4), None, &mut NullSink)
            .unwrap();

        // max_steps=4, accumulation=2: exactly 2 optimizer updates and 2
        // scheduler advances
        assert_eq!(result.steps, 4);
        assert_eq!(result.optimizer_updates, 2);
        assert_eq!(result.scheduler_advances, 2);
        assert_eq!(*forward_calls.borrow(), 4);
        assert_abs_diff_eq!(result.final_loss, 1.0);
        assert_abs_diff_eq!(result.mean_loss, 1.0);
    }

    #[test]
    fn test_checkpoints_written_at_save_steps() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.save_steps = 2;

        let mut trainer = Trainer::new(
            StubLm::new(),
            Box::new(AdamW::default_params(0.1)),
            cfg,
            true,
        );

        let result = trainer
            .train(&dataset_of(4), None, &mut NullSink)
            .unwrap();

        assert_eq!(result.checkpoints.len(), 2);
        assert!(dir.path().join("checkpoint-2").is_dir());
        assert!(dir.path().join("checkpoint-4").is_dir());
        assert!(!dir.path().join("checkpoint-1").exists());
        assert!(!dir.path().join("checkpoint-3").exists());
    }

    #[test]
    fn test_evaluation_runs_on_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.eval_steps = 2;

        let model = StubLm::new();
        let eval_calls = model.eval_calls.clone();

        let mut trainer = Trainer::new(model, Box::new(AdamW::default_params(0.1)), cfg, true);

        let mut sink = MemorySink::new();
        trainer
            .train(&dataset_of(4), Some(&dataset_of(2)), &mut sink)
            .unwrap();

        // Eval dataset of 2 with eval_batch_size 2 is one batch per pass,
        // at steps 2 and 4
        assert_eq!(*eval_calls.borrow(), 2);
        assert_eq!(sink.values_of("eval_loss"), vec![0.5, 0.5]);
    }

    #[test]
    fn test_metrics_logged_every_step() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = Trainer::new(
            StubLm::new(),
            Box::new(AdamW::default_params(0.1)),
            config(dir.path()),
            true,
        );

        let mut sink = MemorySink::new();
        trainer.train(&dataset_of(4), None, &mut sink).unwrap();

        assert_eq!(sink.values_of("loss").len(), 4);
        assert_eq!(sink.values_of("learning_rate").len(), 4);
    }

    #[test]
    fn test_non_primary_rank_skips_io_but_computes() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.save_steps = 2;

        let model = StubLm::new();
        let forward_calls = model.forward_calls.clone();

        let mut trainer = Trainer::new(model, Box::new(AdamW::default_params(0.1)), cfg, false);

        let mut sink = MemorySink::new();
        let result = trainer.train(&dataset_of(4), None, &mut sink).unwrap();

        // Same compute as the primary rank
        assert_eq!(*forward_calls.borrow(), 4);
        assert_eq!(result.optimizer_updates, 2);

        // No logging, no checkpoints
        assert!(sink.records().is_empty());
        assert!(result.checkpoints.is_empty());
        assert!(!dir.path().join("checkpoint-2").exists());
    }

    #[test]
    fn test_empty_training_set_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = Trainer::new(
            StubLm::new(),
            Box::new(AdamW::default_params(0.1)),
            config(dir.path()),
            true,
        );

        let result = trainer.train(
            &PhishingDataset::from_examples(vec![]),
            None,
            &mut NullSink,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_optimizer_updates_shared_params() {
        let dir = tempfile::tempdir().unwrap();
        let model = StubLm::new();
        let param = model.param.clone();

        let mut trainer = Trainer::new(
            model,
            Box::new(AdamW::default_params(0.1)),
            config(dir.path()),
            true,
        );

        trainer
            .train(&dataset_of(4), None, &mut NullSink)
            .unwrap();

        // Two AdamW steps must have moved the parameter
        assert!(param.data()[0] < 1.0);
    }
}
