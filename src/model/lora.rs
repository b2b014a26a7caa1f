//! LoRA (Low-Rank Adaptation) configuration and layer
//!
//! For a frozen weight matrix W ∈ ℝ^(d_out × d_in), LoRA adds trainable
//! low-rank matrices A ∈ ℝ^(r × d_in) and B ∈ ℝ^(d_out × r):
//!
//! y = W@x + scale · B@(A@x),   scale = alpha / r
//!
//! B starts at zero so the adapted layer initially equals the frozen one.

use crate::Tensor;
use ndarray::{Array1, ArrayView2};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for LoRA adapter targeting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoraConfig {
    /// Rank of the low-rank decomposition
    pub rank: usize,
    /// Scaling parameter (effective scale is alpha / rank)
    pub alpha: f32,
    /// Dropout probability on the adapter path during training
    pub dropout: f32,
    /// Target module names (e.g. "q_proj", "v_proj")
    pub target_modules: Vec<String>,
}

impl LoraConfig {
    /// Create a configuration with no targets
    pub fn new(rank: usize, alpha: f32) -> Self {
        Self {
            rank,
            alpha,
            dropout: 0.0,
            target_modules: Vec::new(),
        }
    }

    /// Set adapter dropout
    pub fn with_dropout(mut self, dropout: f32) -> Self {
        self.dropout = dropout;
        self
    }

    /// Target specific modules by name
    pub fn target_modules(mut self, modules: &[&str]) -> Self {
        self.target_modules = modules.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Check whether a base tensor should receive an adapter
    ///
    /// A tensor named `model.layers.0.self_attn.q_proj.weight` matches the
    /// target `q_proj`.
    pub fn should_apply(&self, tensor_name: &str) -> bool {
        let module = tensor_name.strip_suffix(".weight").unwrap_or(tensor_name);
        self.target_modules
            .iter()
            .any(|target| module == target || module.ends_with(&format!(".{target}")))
    }
}

impl Default for LoraConfig {
    /// Defaults match the reference fine-tuning recipe: rank 64, alpha 32,
    /// dropout 0.05, adapters on the query and value projections
    fn default() -> Self {
        Self::new(64, 32.0)
            .with_dropout(0.05)
            .target_modules(&["q_proj", "v_proj"])
    }
}

/// Intermediate state of one adapted forward pass, kept for the backward
pub struct LoraActivation {
    /// Layer input
    pub input: Array1<f32>,
    /// Adapter activation A@x after dropout
    pub adapter: Array1<f32>,
    /// Dropout mask applied to the adapter activation (None in eval mode)
    pub mask: Option<Array1<f32>>,
}

/// A frozen linear projection with a trainable low-rank adapter
pub struct LoraLayer {
    name: String,
    /// Frozen base weight stored flat, row-major [d_out * d_in]
    base: Tensor,
    /// Adapter matrix A stored flat [rank * d_in] - downprojection
    lora_a: Tensor,
    /// Adapter matrix B stored flat [d_out * rank] - upprojection
    lora_b: Tensor,
    d_out: usize,
    d_in: usize,
    rank: usize,
    scale: f32,
    dropout: f32,
}

impl LoraLayer {
    /// Create an adapted layer over a frozen base weight
    ///
    /// A is initialized with small Gaussian noise, B with zeros, so that
    /// the adapter contributes nothing at initialization.
    pub fn new(
        name: impl Into<String>,
        base: Vec<f32>,
        d_out: usize,
        d_in: usize,
        config: &LoraConfig,
        rng: &mut StdRng,
    ) -> Self {
        assert_eq!(
            base.len(),
            d_out * d_in,
            "Base weight size must match d_out * d_in"
        );

        let lora_a_data: Vec<f32> = (0..config.rank * d_in)
            .map(|_| gaussian(rng) * 0.01)
            .collect();

        Self {
            name: name.into(),
            base: Tensor::from_vec(base, false),
            lora_a: Tensor::from_vec(lora_a_data, true),
            lora_b: Tensor::zeros(d_out * config.rank, true),
            d_out,
            d_in,
            rank: config.rank,
            scale: config.alpha / config.rank as f32,
            dropout: config.dropout,
        }
    }

    /// Module name this layer adapts
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output dimension
    pub fn d_out(&self) -> usize {
        self.d_out
    }

    /// Input dimension
    pub fn d_in(&self) -> usize {
        self.d_in
    }

    /// Adapter rank
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Trainable adapter tensors (A, B)
    pub fn trainable_params(&self) -> Vec<Tensor> {
        vec![self.lora_a.clone(), self.lora_b.clone()]
    }

    /// Adapter matrix A handle
    pub fn lora_a(&self) -> &Tensor {
        &self.lora_a
    }

    /// Adapter matrix B handle
    pub fn lora_b(&self) -> &Tensor {
        &self.lora_b
    }

    /// Forward pass: y = W@x + scale * B@(A@x)
    ///
    /// In training mode with dropout configured, the adapter activation is
    /// randomly zeroed with inverted scaling; the mask is retained in the
    /// returned activation so the backward pass sees the same path.
    pub fn forward(
        &self,
        x: &Array1<f32>,
        training: bool,
        rng: &mut StdRng,
    ) -> (Array1<f32>, LoraActivation) {
        assert_eq!(x.len(), self.d_in, "Input size must match d_in");

        let base_data = self.base.data();
        let base = view2(&base_data, self.d_out, self.d_in);
        let a_data = self.lora_a.data();
        let a = view2(&a_data, self.rank, self.d_in);
        let b_data = self.lora_b.data();
        let b = view2(&b_data, self.d_out, self.rank);

        let mut adapter = a.dot(x);

        let mask = if training && self.dropout > 0.0 {
            let keep = 1.0 - self.dropout;
            let mask: Array1<f32> = (0..self.rank)
                .map(|_| {
                    if rng.random::<f32>() < keep {
                        1.0 / keep
                    } else {
                        0.0
                    }
                })
                .collect();
            adapter = &adapter * &mask;
            Some(mask)
        } else {
            None
        };

        let y = base.dot(x) + b.dot(&adapter) * self.scale;

        (
            y,
            LoraActivation {
                input: x.clone(),
                adapter,
                mask,
            },
        )
    }

    /// Backward pass for one position
    ///
    /// Accumulates adapter gradients from `grad_output` and returns the
    /// gradient with respect to the layer input. The frozen base weight
    /// receives no gradient.
    pub fn backward(&self, activation: &LoraActivation, grad_output: &Array1<f32>) -> Array1<f32> {
        let base_data = self.base.data();
        let base = view2(&base_data, self.d_out, self.d_in);
        let a_data = self.lora_a.data();
        let a = view2(&a_data, self.rank, self.d_in);
        let b_data = self.lora_b.data();
        let b = view2(&b_data, self.d_out, self.rank);

        // dL/dB = scale * g ⊗ adapter
        let mut grad_b = Array1::zeros(self.d_out * self.rank);
        for i in 0..self.d_out {
            let g = grad_output[i] * self.scale;
            for r in 0..self.rank {
                grad_b[i * self.rank + r] = g * activation.adapter[r];
            }
        }

        // dL/d(adapter) = scale * Bᵀ g, chained through the dropout mask
        let mut grad_adapter = b.t().dot(grad_output) * self.scale;
        if let Some(mask) = &activation.mask {
            grad_adapter = &grad_adapter * mask;
        }

        // dL/dA = grad_adapter ⊗ x
        let mut grad_a = Array1::zeros(self.rank * self.d_in);
        for r in 0..self.rank {
            let g = grad_adapter[r];
            for j in 0..self.d_in {
                grad_a[r * self.d_in + j] = g * activation.input[j];
            }
        }

        self.lora_b.accumulate_grad(&grad_b);
        self.lora_a.accumulate_grad(&grad_a);

        // dL/dx = Wᵀ g + Aᵀ grad_adapter
        base.t().dot(grad_output) + a.t().dot(&grad_adapter)
    }
}

fn view2(data: &Array1<f32>, rows: usize, cols: usize) -> ArrayView2<'_, f32> {
    ArrayView2::from_shape((rows, cols), data.as_slice().expect("contiguous tensor data"))
        .expect("tensor shape mismatch")
}

/// Standard normal sample via Box-Muller
fn gaussian(rng: &mut StdRng) -> f32 {
    let u1: f64 = rng.random::<f64>().max(1e-10);
    let u2: f64 = rng.random::<f64>();
    ((-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()) as f32
}
