//! Configuration validation

use super::schema::TrainSpec;

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Model path does not exist: {0}")]
    ModelPathNotFound(String),

    #[error("Training data path does not exist: {0}")]
    TrainDataNotFound(String),

    #[error("Validation data path does not exist: {0}")]
    ValDataNotFound(String),

    #[error("Invalid learning rate: {0} (must be > 0.0)")]
    InvalidLearningRate(f32),

    #[error("Invalid batch size: {0} (must be > 0)")]
    InvalidBatchSize(usize),

    #[error("Invalid max_length: {0} (must be > 0)")]
    InvalidMaxLength(usize),

    #[error("Invalid max_steps: {0} (must be > 0)")]
    InvalidMaxSteps(usize),

    #[error("Invalid gradient accumulation steps: {0} (must be > 0)")]
    InvalidAccumulation(usize),

    #[error("Invalid LoRA rank: {0} (must be > 0)")]
    InvalidLoraRank(usize),

    #[error("Invalid LoRA dropout: {0} (must be in [0, 1))")]
    InvalidLoraDropout(f32),

    #[error("No LoRA target modules configured")]
    EmptyTargetModules,

    #[error("Invalid quantization bits: {0} (must be 4 or 8)")]
    InvalidQuantBits(u8),

    #[error("Invalid gradient clip value: {0} (must be > 0.0)")]
    InvalidGradClip(f32),
}

/// Validate a training specification
///
/// Checks that file paths exist and numeric options are in range. A
/// failing check aborts the run before any model or data is touched.
pub fn validate_config(spec: &TrainSpec) -> Result<(), ValidationError> {
    // Path checks are skipped under test where the files may not exist
    #[cfg(not(test))]
    {
        if !spec.model.path.exists() {
            return Err(ValidationError::ModelPathNotFound(
                spec.model.path.display().to_string(),
            ));
        }

        if !spec.data.train.exists() {
            return Err(ValidationError::TrainDataNotFound(
                spec.data.train.display().to_string(),
            ));
        }

        if let Some(val_path) = &spec.data.val {
            if !val_path.exists() {
                return Err(ValidationError::ValDataNotFound(
                    val_path.display().to_string(),
                ));
            }
        }
    }

    if spec.data.batch_size == 0 {
        return Err(ValidationError::InvalidBatchSize(spec.data.batch_size));
    }

    if spec.data.eval_batch_size == 0 {
        return Err(ValidationError::InvalidBatchSize(spec.data.eval_batch_size));
    }

    if spec.data.max_length == 0 {
        return Err(ValidationError::InvalidMaxLength(spec.data.max_length));
    }

    if spec.optimizer.lr <= 0.0 {
        return Err(ValidationError::InvalidLearningRate(spec.optimizer.lr));
    }

    if spec.training.max_steps == 0 {
        return Err(ValidationError::InvalidMaxSteps(spec.training.max_steps));
    }

    if spec.training.gradient_accumulation_steps == 0 {
        return Err(ValidationError::InvalidAccumulation(
            spec.training.gradient_accumulation_steps,
        ));
    }

    if let Some(grad_clip) = spec.training.max_grad_norm {
        if grad_clip <= 0.0 {
            return Err(ValidationError::InvalidGradClip(grad_clip));
        }
    }

    if spec.lora.rank == 0 {
        return Err(ValidationError::InvalidLoraRank(spec.lora.rank));
    }

    if !(0.0..1.0).contains(&spec.lora.dropout) {
        return Err(ValidationError::InvalidLoraDropout(spec.lora.dropout));
    }

    if spec.lora.target_modules.is_empty() {
        return Err(ValidationError::EmptyTargetModules);
    }

    if let Some(quant) = &spec.quantize {
        if quant.bits != 4 && quant.bits != 8 {
            return Err(ValidationError::InvalidQuantBits(quant.bits));
        }
    }

    Ok(())
}
