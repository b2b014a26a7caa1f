//! Adapter-only checkpoint save/load
//!
//! A checkpoint directory contains `adapter_model.safetensors` with the
//! adapter weights and `adapter_config.json` with the LoRA configuration.
//! Directories are append-only across a run: `checkpoint-<step>` is never
//! overwritten or pruned by the trainer.

use crate::model::LoraConfig;
use crate::{Error, Result};
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;
use std::collections::HashMap;
use std::path::Path;

/// Adapter weights file inside a checkpoint directory
pub const ADAPTER_WEIGHTS_FILE: &str = "adapter_model.safetensors";

/// Adapter configuration file inside a checkpoint directory
pub const ADAPTER_CONFIG_FILE: &str = "adapter_config.json";

/// One named adapter weight
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterTensor {
    /// Tensor name, e.g. `model.layers.0.q_proj.lora_a`
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// The full adapter state of a model
#[derive(Debug, Clone)]
pub struct AdapterCheckpoint {
    pub config: LoraConfig,
    pub tensors: Vec<AdapterTensor>,
}

/// Save an adapter checkpoint into `dir`, creating it if needed
pub fn save_adapter(dir: &Path, checkpoint: &AdapterCheckpoint) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    // Collect byte buffers first so the TensorViews can borrow them
    let tensor_data: Vec<(String, Vec<u8>, Vec<usize>)> = checkpoint
        .tensors
        .iter()
        .map(|tensor| {
            let bytes: Vec<u8> = bytemuck::cast_slice(&tensor.data).to_vec();
            (tensor.name.clone(), bytes, tensor.shape.clone())
        })
        .collect();

    let views: Vec<(&str, TensorView<'_>)> = tensor_data
        .iter()
        .map(|(name, bytes, shape)| {
            let view = TensorView::new(Dtype::F32, shape.clone(), bytes)
                .expect("adapter tensor shape matches its byte length");
            (name.as_str(), view)
        })
        .collect();

    let mut metadata = HashMap::new();
    metadata.insert("format".to_string(), "anzuelo.adapter".to_string());
    metadata.insert("rank".to_string(), checkpoint.config.rank.to_string());
    metadata.insert("alpha".to_string(), checkpoint.config.alpha.to_string());

    let bytes = safetensors::serialize(views, &Some(metadata))
        .map_err(|e| Error::Serialization(format!("adapter serialization failed: {e}")))?;
    std::fs::write(dir.join(ADAPTER_WEIGHTS_FILE), bytes)?;

    let config_json = serde_json::to_string_pretty(&checkpoint.config)
        .map_err(|e| Error::Serialization(format!("adapter config serialization failed: {e}")))?;
    std::fs::write(dir.join(ADAPTER_CONFIG_FILE), config_json)?;

    Ok(())
}

/// Load an adapter checkpoint from `dir`
pub fn load_adapter(dir: &Path) -> Result<AdapterCheckpoint> {
    let config_raw = std::fs::read_to_string(dir.join(ADAPTER_CONFIG_FILE))?;
    let config: LoraConfig = serde_json::from_str(&config_raw)
        .map_err(|e| Error::Serialization(format!("invalid adapter config: {e}")))?;

    let data = std::fs::read(dir.join(ADAPTER_WEIGHTS_FILE))?;
    let safetensors = SafeTensors::deserialize(&data)
        .map_err(|e| Error::Serialization(format!("invalid adapter weights: {e}")))?;

    let mut tensors = Vec::new();
    for name in safetensors.names() {
        let view = safetensors
            .tensor(name)
            .map_err(|e| Error::Serialization(format!("cannot read tensor {name}: {e}")))?;
        if view.dtype() != Dtype::F32 {
            return Err(Error::Serialization(format!(
                "adapter tensor {name} has dtype {:?}, expected F32",
                view.dtype()
            )));
        }
        // Byte-wise f32 decode; the safetensors buffer offset carries no
        // alignment guarantee
        let data: Vec<f32> = view
            .data()
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        tensors.push(AdapterTensor {
            name: name.to_string(),
            shape: view.shape().to_vec(),
            data,
        });
    }
    tensors.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(AdapterCheckpoint { config, tensors })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_checkpoint() -> AdapterCheckpoint {
        AdapterCheckpoint {
            config: LoraConfig::new(2, 4.0).target_modules(&["q_proj"]),
            tensors: vec![
                AdapterTensor {
                    name: "q_proj.lora_a".to_string(),
                    shape: vec![2, 3],
                    data: vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
                },
                AdapterTensor {
                    name: "q_proj.lora_b".to_string(),
                    shape: vec![3, 2],
                    data: vec![0.0; 6],
                },
            ],
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = sample_checkpoint();

        save_adapter(dir.path(), &checkpoint).unwrap();
        assert!(dir.path().join(ADAPTER_WEIGHTS_FILE).exists());
        assert!(dir.path().join(ADAPTER_CONFIG_FILE).exists());

        let loaded = load_adapter(dir.path()).unwrap();
        assert_eq!(loaded.config.rank, 2);
        assert_eq!(loaded.tensors, checkpoint.tensors);
    }

    #[test]
    fn test_save_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("outputs").join("checkpoint-100");

        save_adapter(&nested, &sample_checkpoint()).unwrap();
        assert!(nested.join(ADAPTER_WEIGHTS_FILE).exists());
    }

    #[test]
    fn test_load_missing_directory_fails() {
        let result = load_adapter(Path::new("/nonexistent/checkpoint-1"));
        assert!(result.is_err());
    }

    #[test]
    fn test_metadata_carries_rank_and_alpha() {
        let dir = tempfile::tempdir().unwrap();
        save_adapter(dir.path(), &sample_checkpoint()).unwrap();

        let data = std::fs::read(dir.path().join(ADAPTER_WEIGHTS_FILE)).unwrap();
        let (_, header) = SafeTensors::read_metadata(&data).unwrap();
        let metadata = header.metadata().as_ref().unwrap();
        assert_eq!(metadata.get("rank").unwrap(), "2");
        assert_eq!(metadata.get("alpha").unwrap(), "4");
    }
}
