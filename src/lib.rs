//! # Anzuelo: Phishing-Email Fine-Tuning
//!
//! Anzuelo fine-tunes a causal language model with LoRA adapters to
//! classify and explain phishing emails. It ships a synthetic data
//! generator, a tokenizing dataset with per-file caching, a model wrapper
//! that attaches low-rank adapters to frozen base weights, and a
//! step-driven training loop with gradient accumulation, periodic
//! evaluation, checkpointing and metric logging.
//!
//! ## Architecture
//!
//! - **data**: synthetic email generation, JSONL records, tokenization,
//!   prompt-masked example encoding
//! - **model**: LoRA adapters, quantized base loading, the `AdapterLm`
//!   wrapper over frozen safetensors weights
//! - **optim**: AdamW, gradient clipping, linear warmup/decay schedule
//! - **train**: trainer, batch sampler, metric sinks
//! - **config**: declarative YAML configuration and CLI overrides
//! - **io**: adapter-only checkpoint save/load

pub mod config;
pub mod data;
pub mod io;
pub mod model;
pub mod optim;
pub mod train;

pub mod error;
pub mod tensor;

// Re-export commonly used types
pub use error::{Error, Result};
pub use tensor::Tensor;
