//! Model: LoRA adapters over frozen base weights
//!
//! The trainable surface of a model is its adapter tensors; the base
//! weights stay frozen. [`CausalLm`] is the seam the training loop drives,
//! so the loop can be exercised against a stub in tests.

mod lora;
mod quantize;
mod wrapper;

pub use lora::{LoraConfig, LoraLayer};
pub use quantize::fake_quantize;
pub use wrapper::{AdapterLm, CausalLm};
