//! Optimization: AdamW, gradient clipping, learning-rate schedule

mod adamw;
mod clip;
mod optimizer;
mod scheduler;

pub use adamw::AdamW;
pub use clip::clip_grad_norm;
pub use optimizer::Optimizer;
pub use scheduler::{LinearWarmupDecay, LrScheduler};
