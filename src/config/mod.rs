//! Declarative YAML configuration
//!
//! # Example
//!
//! ```yaml
//! model:
//!   path: models/tinyllama
//!
//! data:
//!   train: data/synthetic/train.jsonl
//!   val: data/synthetic/val.jsonl
//!   cache_dir: outputs/cache
//!
//! lora:
//!   rank: 64
//!   alpha: 32
//!   target_modules: [q_proj, v_proj]
//!
//! training:
//!   max_steps: 1000
//!   gradient_accumulation_steps: 4
//! ```

mod cli;
mod schema;
mod validate;

pub use cli::{
    apply_overrides, Cli, Command, GenerateArgs, InfoArgs, OutputFormat, TrainArgs, ValidateArgs,
};
pub use schema::{DataConfig, LoraSpec, ModelRef, OptimSpec, QuantSpec, TrainSpec, TrainingParams};
pub use validate::{validate_config, ValidationError};

use crate::{Error, Result};
use std::path::Path;

/// Load and validate a training spec from a YAML file
pub fn load_config(config_path: &Path) -> Result<TrainSpec> {
    let yaml_content = std::fs::read_to_string(config_path).map_err(|e| {
        Error::Config(format!(
            "failed to read config file {}: {e}",
            config_path.display()
        ))
    })?;

    let spec: TrainSpec = serde_yaml::from_str(&yaml_content)
        .map_err(|e| Error::Config(format!("failed to parse YAML config: {e}")))?;

    validate_config(&spec).map_err(|e| Error::Config(format!("invalid config: {e}")))?;

    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_config() {
        let yaml = r#"
model:
  path: models/tinyllama

data:
  train: data/train.jsonl
  batch_size: 2
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let spec = load_config(temp_file.path()).unwrap();
        assert_eq!(spec.data.batch_size, 2);
    }

    #[test]
    fn test_load_invalid_config() {
        let yaml = r#"
model:
  path: models/tinyllama

data:
  train: data/train.jsonl
  batch_size: 0
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_malformed_yaml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"this is not valid yaml: [}").unwrap();

        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_config(Path::new("/nonexistent/config.yaml")).is_err());
    }
}
