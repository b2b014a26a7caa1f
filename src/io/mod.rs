//! Adapter checkpoint I/O
//!
//! Checkpoints hold only the adapter weights, never the frozen base model.

mod adapter;

pub use adapter::{
    load_adapter, save_adapter, AdapterCheckpoint, AdapterTensor, ADAPTER_CONFIG_FILE,
    ADAPTER_WEIGHTS_FILE,
};
