//! YAML schema for declarative training configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete training specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainSpec {
    /// Model configuration
    pub model: ModelRef,

    /// Data configuration
    pub data: DataConfig,

    /// Optimizer configuration
    #[serde(default)]
    pub optimizer: OptimSpec,

    /// LoRA adapter configuration
    #[serde(default)]
    pub lora: LoraSpec,

    /// Optional quantized loading of the base weights
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantize: Option<QuantSpec>,

    /// Training hyperparameters
    #[serde(default)]
    pub training: TrainingParams,
}

/// Base model directory (holds `model.safetensors` and `tokenizer.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRef {
    pub path: PathBuf,
}

/// Data locations and encoding options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Training data (line-delimited JSON)
    pub train: PathBuf,

    /// Optional validation data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<PathBuf>,

    /// Directory for cached encoded examples (None = no caching)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Training batch size
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Evaluation batch size
    #[serde(default = "default_eval_batch_size")]
    pub eval_batch_size: usize,

    /// Fixed token length per example (pad/truncate)
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

/// AdamW hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimSpec {
    #[serde(default = "default_lr")]
    pub lr: f32,

    #[serde(default = "default_weight_decay")]
    pub weight_decay: f32,

    #[serde(default = "default_beta1")]
    pub beta1: f32,

    #[serde(default = "default_beta2")]
    pub beta2: f32,

    #[serde(default = "default_epsilon")]
    pub epsilon: f32,
}

impl Default for OptimSpec {
    fn default() -> Self {
        Self {
            lr: default_lr(),
            weight_decay: default_weight_decay(),
            beta1: default_beta1(),
            beta2: default_beta2(),
            epsilon: default_epsilon(),
        }
    }
}

/// LoRA adapter options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoraSpec {
    /// Rank of the low-rank decomposition
    #[serde(default = "default_lora_rank")]
    pub rank: usize,

    /// Scaling factor (effective scale is alpha / rank)
    #[serde(default = "default_lora_alpha")]
    pub alpha: f32,

    /// Dropout on the adapter path during training
    #[serde(default = "default_lora_dropout")]
    pub dropout: f32,

    /// Target module names
    #[serde(default = "default_target_modules")]
    pub target_modules: Vec<String>,
}

impl Default for LoraSpec {
    fn default() -> Self {
        Self {
            rank: default_lora_rank(),
            alpha: default_lora_alpha(),
            dropout: default_lora_dropout(),
            target_modules: default_target_modules(),
        }
    }
}

/// Quantized base-weight loading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantSpec {
    /// Quantization bits (4 or 8)
    pub bits: u8,
}

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingParams {
    /// Total training steps
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Linear warmup steps
    #[serde(default = "default_warmup_steps")]
    pub warmup_steps: usize,

    /// Gradient accumulation steps (1 = no accumulation)
    #[serde(default = "default_accumulation")]
    pub gradient_accumulation_steps: usize,

    /// Gradient clipping threshold (None = no clipping)
    #[serde(default = "default_max_grad_norm", skip_serializing_if = "Option::is_none")]
    pub max_grad_norm: Option<f32>,

    /// Progress line every N steps
    #[serde(default = "default_logging_steps")]
    pub logging_steps: usize,

    /// Evaluate every N steps (0 = never)
    #[serde(default = "default_eval_steps")]
    pub eval_steps: usize,

    /// Checkpoint every N steps (0 = never)
    #[serde(default = "default_save_steps")]
    pub save_steps: usize,

    /// Directory receiving `checkpoint-<step>` subdirectories
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Run seed (sampling, adapter init)
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            warmup_steps: default_warmup_steps(),
            gradient_accumulation_steps: default_accumulation(),
            max_grad_norm: default_max_grad_norm(),
            logging_steps: default_logging_steps(),
            eval_steps: default_eval_steps(),
            save_steps: default_save_steps(),
            output_dir: default_output_dir(),
            seed: default_seed(),
        }
    }
}

fn default_batch_size() -> usize {
    1
}

fn default_eval_batch_size() -> usize {
    2
}

fn default_max_length() -> usize {
    512
}

fn default_lr() -> f32 {
    2e-5
}

fn default_weight_decay() -> f32 {
    0.01
}

fn default_beta1() -> f32 {
    0.9
}

fn default_beta2() -> f32 {
    0.999
}

fn default_epsilon() -> f32 {
    1e-8
}

fn default_lora_rank() -> usize {
    64
}

fn default_lora_alpha() -> f32 {
    32.0
}

fn default_lora_dropout() -> f32 {
    0.05
}

fn default_target_modules() -> Vec<String> {
    vec!["q_proj".to_string(), "v_proj".to_string()]
}

fn default_max_steps() -> usize {
    1000
}

fn default_warmup_steps() -> usize {
    100
}

fn default_accumulation() -> usize {
    4
}

fn default_max_grad_norm() -> Option<f32> {
    Some(1.0)
}

fn default_logging_steps() -> usize {
    10
}

fn default_eval_steps() -> usize {
    100
}

fn default_save_steps() -> usize {
    1000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_seed() -> u64 {
    42
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let yaml = r#"
model:
  path: models/tinyllama

data:
  train: data/synthetic/train.jsonl
"#;

        let spec: TrainSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.model.path, PathBuf::from("models/tinyllama"));
        assert_eq!(spec.data.batch_size, 1);
        assert_eq!(spec.data.max_length, 512);
        assert_eq!(spec.optimizer.lr, 2e-5);
        assert_eq!(spec.lora.rank, 64);
        assert_eq!(spec.lora.target_modules, vec!["q_proj", "v_proj"]);
        assert_eq!(spec.training.max_steps, 1000);
        assert!(spec.quantize.is_none());
    }

    #[test]
    fn test_deserialize_full_config() {
        let yaml = r#"
model:
  path: models/tinyllama

data:
  train: data/train.jsonl
  val: data/val.jsonl
  cache_dir: outputs/cache
  batch_size: 4
  eval_batch_size: 8
  max_length: 1024

optimizer:
  lr: 0.0001
  weight_decay: 0.05

lora:
  rank: 16
  alpha: 16
  dropout: 0.1
  target_modules: [q_proj, k_proj, v_proj, o_proj]

quantize:
  bits: 4

training:
  max_steps: 200
  warmup_steps: 20
  gradient_accumulation_steps: 2
  max_grad_norm: 0.5
  eval_steps: 50
  save_steps: 100
  output_dir: outputs/run-1
  seed: 7
"#;

        let spec: TrainSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.data.val, Some(PathBuf::from("data/val.jsonl")));
        assert_eq!(spec.data.max_length, 1024);
        assert_eq!(spec.optimizer.lr, 1e-4);
        assert_eq!(spec.lora.rank, 16);
        assert_eq!(spec.lora.target_modules.len(), 4);
        assert_eq!(spec.quantize.as_ref().unwrap().bits, 4);
        assert_eq!(spec.training.max_steps, 200);
        assert_eq!(spec.training.max_grad_norm, Some(0.5));
        assert_eq!(spec.training.seed, 7);
    }

    #[test]
    fn test_default_training_params() {
        let params = TrainingParams::default();
        assert_eq!(params.max_steps, 1000);
        assert_eq!(params.warmup_steps, 100);
        assert_eq!(params.gradient_accumulation_steps, 4);
        assert_eq!(params.max_grad_norm, Some(1.0));
        assert_eq!(params.save_steps, 1000);
        assert_eq!(params.output_dir, PathBuf::from("outputs"));
    }

    #[test]
    fn test_spec_serializes_back_to_yaml() {
        let yaml = r#"
model:
  path: m

data:
  train: t.jsonl
"#;
        let spec: TrainSpec = serde_yaml::from_str(yaml).unwrap();
        let rendered = serde_yaml::to_string(&spec).unwrap();
        assert!(rendered.contains("max_steps"));

        let back: TrainSpec = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(back.training.max_steps, spec.training.max_steps);
    }
}
