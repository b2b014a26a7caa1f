//! Model wrapper: frozen base weights with LoRA adapters
//!
//! [`AdapterLm`] owns the pretrained weights, the tokenizer and the
//! adapter layers. The frozen parts come from `model.safetensors` in the
//! model directory; only the adapter tensors are trainable, and only they
//! are written to checkpoints.
//!
//! The forward computation embeds the previous token, passes the hidden
//! state through the adapted projection stack and scores it against the
//! output head with softmax cross-entropy. Gradients for the adapter
//! matrices are computed analytically and accumulated into the shared
//! parameter tensors.

use crate::data::{EncodedExample, LmTokenizer, IGNORE_INDEX};
use crate::io::{load_adapter, save_adapter, AdapterCheckpoint, AdapterTensor};
use crate::model::lora::{LoraConfig, LoraLayer};
use crate::model::quantize::fake_quantize;
use crate::{Error, Result, Tensor};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use safetensors::tensor::Dtype;
use safetensors::SafeTensors;
use std::path::Path;

/// Base weights file inside a model directory
pub const MODEL_WEIGHTS_FILE: &str = "model.safetensors";

/// Tokenizer file inside a model directory
pub const MODEL_TOKENIZER_FILE: &str = "tokenizer.json";

/// The seam the training loop drives
///
/// A causal LM computes a masked-label loss over encoded batches and
/// exposes its trainable parameters. Implemented by [`AdapterLm`] and by
/// stubs in trainer tests.
pub trait CausalLm {
    /// One forward/backward pass; gradients are scaled by `loss_scale`
    /// and accumulated. Returns the unscaled mean loss over supervised
    /// positions.
    fn forward_backward(&mut self, batch: &[EncodedExample], loss_scale: f32) -> Result<f32>;

    /// Forward-only mean loss, leaving gradients untouched
    fn evaluate_loss(&mut self, batch: &[EncodedExample]) -> Result<f32>;

    /// Handles to the trainable parameter tensors
    fn trainable_params(&self) -> Vec<Tensor>;

    /// Toggle training mode (enables adapter dropout)
    fn set_training(&mut self, training: bool);

    /// Persist adapter weights under `dir`
    fn save_adapter(&self, dir: &Path) -> Result<()>;
}

/// Causal LM with LoRA adapters over frozen safetensors weights
pub struct AdapterLm {
    tokenizer: LmTokenizer,
    /// Frozen token embedding [vocab, hidden]
    embed: Array2<f32>,
    /// Frozen output head [vocab, hidden] (tied to `embed` when the
    /// checkpoint carries no `lm_head.weight`)
    head: Array2<f32>,
    /// Adapted projections in deterministic (name-sorted) order
    layers: Vec<LoraLayer>,
    config: LoraConfig,
    training: bool,
    rng: StdRng,
}

impl AdapterLm {
    /// Load base weights and tokenizer from a model directory and attach
    /// adapters to every target module
    ///
    /// Fails fast on a missing directory, missing mandatory tensors,
    /// target modules that match nothing, non-square target projections
    /// and unsupported quantization settings.
    pub fn load(
        model_dir: &Path,
        config: LoraConfig,
        quant_bits: Option<u8>,
        seed: u64,
    ) -> Result<Self> {
        let weights_path = model_dir.join(MODEL_WEIGHTS_FILE);
        let data = std::fs::read(&weights_path).map_err(|e| {
            Error::ModelLoad(format!("cannot read '{}': {e}", weights_path.display()))
        })?;
        let tensors = SafeTensors::deserialize(&data)
            .map_err(|e| Error::ModelLoad(format!("invalid safetensors file: {e}")))?;

        let mut names: Vec<&str> = tensors.names().into_iter().map(String::as_str).collect();
        names.sort_unstable();

        let embed_name = names
            .iter()
            .find(|n| n.ends_with("embed_tokens.weight"))
            .copied()
            .ok_or_else(|| Error::ModelLoad("missing embed_tokens.weight".to_string()))?;
        let embed = read_matrix(&tensors, embed_name, quant_bits)?;
        let hidden = embed.ncols();

        let head = match names.iter().find(|n| n.ends_with("lm_head.weight")).copied() {
            Some(head_name) => {
                let head = read_matrix(&tensors, head_name, quant_bits)?;
                if head.dim() != embed.dim() {
                    return Err(Error::ModelLoad(format!(
                        "lm_head shape {:?} does not match embedding shape {:?}",
                        head.dim(),
                        embed.dim()
                    )));
                }
                head
            }
            // Weight tying
            None => embed.clone(),
        };

        let tokenizer = LmTokenizer::from_file(&model_dir.join(MODEL_TOKENIZER_FILE))?;
        if tokenizer.vocab_size() > embed.nrows() {
            return Err(Error::ModelLoad(format!(
                "tokenizer vocabulary ({}) exceeds embedding rows ({})",
                tokenizer.vocab_size(),
                embed.nrows()
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut layers = Vec::new();
        for name in &names {
            if !config.should_apply(name) {
                continue;
            }
            let matrix = read_matrix(&tensors, name, quant_bits)?;
            let (d_out, d_in) = matrix.dim();
            if d_out != hidden || d_in != hidden {
                return Err(Error::IncompatibleTargets(format!(
                    "{name} has shape [{d_out}, {d_in}], expected [{hidden}, {hidden}]"
                )));
            }
            let module = name.strip_suffix(".weight").unwrap_or(name);
            let (flat, _) = matrix.into_raw_vec_and_offset();
            layers.push(LoraLayer::new(module, flat, d_out, d_in, &config, &mut rng));
        }

        if layers.is_empty() {
            return Err(Error::IncompatibleTargets(format!(
                "targets {:?} matched none of {} base tensors",
                config.target_modules,
                names.len()
            )));
        }

        Ok(Self {
            tokenizer,
            embed,
            head,
            layers,
            config,
            training: true,
            rng,
        })
    }

    /// The tokenizer loaded alongside the base weights
    pub fn tokenizer(&self) -> &LmTokenizer {
        &self.tokenizer
    }

    /// Number of adapted projections
    pub fn num_adapted_layers(&self) -> usize {
        self.layers.len()
    }

    /// Hidden dimension of the base model
    pub fn hidden_size(&self) -> usize {
        self.embed.ncols()
    }

    /// Load adapter weights from a checkpoint directory into this model
    pub fn load_adapter(&mut self, dir: &Path) -> Result<()> {
        let checkpoint = load_adapter(dir)?;
        if checkpoint.config.rank != self.config.rank {
            return Err(Error::ModelLoad(format!(
                "checkpoint rank {} does not match model rank {}",
                checkpoint.config.rank, self.config.rank
            )));
        }

        for layer in &self.layers {
            let a = find_tensor(&checkpoint, &format!("{}.lora_a", layer.name()))?;
            let b = find_tensor(&checkpoint, &format!("{}.lora_b", layer.name()))?;
            copy_into(layer.lora_a(), a)?;
            copy_into(layer.lora_b(), b)?;
        }

        Ok(())
    }

    /// Count the supervised positions in one example
    fn supervised_positions(example: &EncodedExample) -> usize {
        (1..example.input_ids.len())
            .filter(|&t| example.labels[t] != IGNORE_INDEX && example.attention_mask[t] == 1)
            .count()
    }

    /// Run one example; with `grad_scale` set, accumulate scaled adapter
    /// gradients. Returns the summed position loss.
    fn process_example(
        &mut self,
        example: &EncodedExample,
        grad_scale: Option<f32>,
    ) -> Result<f32> {
        let mut loss_sum = 0.0;

        for t in 1..example.input_ids.len() {
            if example.labels[t] == IGNORE_INDEX || example.attention_mask[t] == 0 {
                continue;
            }

            let prev = example.input_ids[t - 1] as usize;
            let label = example.labels[t] as usize;
            if prev >= self.embed.nrows() || label >= self.head.nrows() {
                return Err(Error::Data(format!(
                    "token id out of range for model vocabulary ({})",
                    self.embed.nrows()
                )));
            }

            let mut h: Array1<f32> = self.embed.row(prev).to_owned();
            let mut activations = Vec::with_capacity(self.layers.len());
            for layer in &self.layers {
                let (next, activation) = layer.forward(&h, self.training, &mut self.rng);
                activations.push(activation);
                h = next;
            }

            let logits = self.head.dot(&h);
            let probs = softmax(&logits);
            loss_sum += -(probs[label] + 1e-10).ln();

            if let Some(scale) = grad_scale {
                // d(CE)/d(logits) = probs - one_hot(label)
                let mut grad_logits = probs;
                grad_logits[label] -= 1.0;
                grad_logits *= scale;

                let mut grad_h = self.head.t().dot(&grad_logits);
                for (layer, activation) in self.layers.iter().zip(&activations).rev() {
                    grad_h = layer.backward(activation, &grad_h);
                }
            }
        }

        Ok(loss_sum)
    }

    fn batch_loss(&mut self, batch: &[EncodedExample], grad_scale: Option<f32>) -> Result<f32> {
        let total: usize = batch.iter().map(Self::supervised_positions).sum();
        if total == 0 {
            return Ok(0.0);
        }

        let position_scale = grad_scale.map(|scale| scale / total as f32);

        let mut loss_sum = 0.0;
        for example in batch {
            loss_sum += self.process_example(example, position_scale)?;
        }

        Ok(loss_sum / total as f32)
    }
}

impl CausalLm for AdapterLm {
    fn forward_backward(&mut self, batch: &[EncodedExample], loss_scale: f32) -> Result<f32> {
        self.batch_loss(batch, Some(loss_scale))
    }

    fn evaluate_loss(&mut self, batch: &[EncodedExample]) -> Result<f32> {
        self.batch_loss(batch, None)
    }

    fn trainable_params(&self) -> Vec<Tensor> {
        self.layers
            .iter()
            .flat_map(|layer| layer.trainable_params())
            .collect()
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn save_adapter(&self, dir: &Path) -> Result<()> {
        let mut tensors = Vec::with_capacity(self.layers.len() * 2);
        for layer in &self.layers {
            tensors.push(AdapterTensor {
                name: format!("{}.lora_a", layer.name()),
                shape: vec![layer.rank(), layer.d_in()],
                data: layer.lora_a().to_vec(),
            });
            tensors.push(AdapterTensor {
                name: format!("{}.lora_b", layer.name()),
                shape: vec![layer.d_out(), layer.rank()],
                data: layer.lora_b().to_vec(),
            });
        }

        save_adapter(
            dir,
            &AdapterCheckpoint {
                config: self.config.clone(),
                tensors,
            },
        )
    }
}

/// Numerically stable softmax
fn softmax(x: &Array1<f32>) -> Array1<f32> {
    let max = x.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_x: Array1<f32> = x.mapv(|v| (v - max).exp());
    let sum: f32 = exp_x.sum();
    exp_x / sum
}

/// Read a 2-D f32 tensor, optionally fake-quantizing it
fn read_matrix(tensors: &SafeTensors, name: &str, quant_bits: Option<u8>) -> Result<Array2<f32>> {
    let view = tensors
        .tensor(name)
        .map_err(|e| Error::ModelLoad(format!("cannot read tensor {name}: {e}")))?;

    if view.dtype() != Dtype::F32 {
        return Err(Error::ModelLoad(format!(
            "tensor {name} has dtype {:?}, expected F32",
            view.dtype()
        )));
    }

    let shape = view.shape();
    if shape.len() != 2 {
        return Err(Error::ModelLoad(format!(
            "tensor {name} has {} dimensions, expected 2",
            shape.len()
        )));
    }

    // Byte-wise f32 decode; the safetensors buffer offset carries no
    // alignment guarantee
    let mut data: Vec<f32> = view
        .data()
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if let Some(bits) = quant_bits {
        fake_quantize(&mut data, bits)?;
    }

    Array2::from_shape_vec((shape[0], shape[1]), data)
        .map_err(|e| Error::ModelLoad(format!("tensor {name} shape mismatch: {e}")))
}

fn find_tensor<'a>(checkpoint: &'a AdapterCheckpoint, name: &str) -> Result<&'a AdapterTensor> {
    checkpoint
        .tensors
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| Error::ModelLoad(format!("checkpoint is missing adapter tensor {name}")))
}

fn copy_into(param: &Tensor, tensor: &AdapterTensor) -> Result<()> {
    if param.len() != tensor.data.len() {
        return Err(Error::ModelLoad(format!(
            "adapter tensor {} has {} values, expected {}",
            tensor.name,
            tensor.data.len(),
            param.len()
        )));
    }
    *param.data_mut() = Array1::from(tensor.data.clone());
    Ok(())
}
