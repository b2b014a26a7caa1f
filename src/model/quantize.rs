//! Fake quantization for quantized base-weight loading
//!
//! Quantizes weights to a low-bit integer grid and immediately
//! dequantizes them, so the rest of the pipeline keeps operating on f32
//! while seeing the precision loss a quantized deployment would have.

use crate::{Error, Result};

/// Symmetric fake quantization in place
///
/// Maps each value onto a `bits`-wide signed integer grid scaled by the
/// tensor's absolute maximum, then back to f32. Only 4 and 8 bits are
/// supported; anything else fails fast.
pub fn fake_quantize(weights: &mut [f32], bits: u8) -> Result<()> {
    if bits != 4 && bits != 8 {
        return Err(Error::InvalidParameter(format!(
            "unsupported quantization bits: {bits} (use 4 or 8)"
        )));
    }

    let max_abs = weights.iter().fold(0.0f32, |acc, &w| acc.max(w.abs()));
    if max_abs == 0.0 {
        return Ok(());
    }

    let qmax = ((1i32 << (bits - 1)) - 1) as f32;
    let scale = max_abs / qmax;

    for w in weights.iter_mut() {
        let q = (*w / scale).round().clamp(-qmax, qmax);
        *w = q * scale;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rejects_unsupported_bits() {
        let mut weights = vec![1.0, -1.0];
        assert!(fake_quantize(&mut weights, 16).is_err());
        assert!(fake_quantize(&mut weights, 0).is_err());
        assert!(fake_quantize(&mut weights, 4).is_ok());
        assert!(fake_quantize(&mut weights, 8).is_ok());
    }

    #[test]
    fn test_error_bounded_by_half_step() {
        let original: Vec<f32> = (-10..=10).map(|i| i as f32 * 0.137).collect();
        let mut quantized = original.clone();
        fake_quantize(&mut quantized, 8).unwrap();

        let max_abs = original.iter().fold(0.0f32, |a, &w| a.max(w.abs()));
        let step = max_abs / 127.0;
        for (o, q) in original.iter().zip(&quantized) {
            assert!((o - q).abs() <= step / 2.0 + 1e-6);
        }
    }

    #[test]
    fn test_extremes_survive_quantization() {
        let mut weights = vec![-2.0, 0.0, 2.0];
        fake_quantize(&mut weights, 8).unwrap();
        assert_abs_diff_eq!(weights[0], -2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(weights[1], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(weights[2], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_four_bit_is_coarser_than_eight() {
        let original: Vec<f32> = (0..16).map(|i| (i as f32 * 0.618).sin()).collect();

        let mut q4 = original.clone();
        fake_quantize(&mut q4, 4).unwrap();
        let mut q8 = original.clone();
        fake_quantize(&mut q8, 8).unwrap();

        let err = |q: &[f32]| -> f32 {
            original
                .iter()
                .zip(q)
                .map(|(o, v)| (o - v).abs())
                .sum::<f32>()
        };
        assert!(err(&q4) >= err(&q8));
    }

    #[test]
    fn test_all_zero_tensor_is_untouched() {
        let mut weights = vec![0.0; 8];
        fake_quantize(&mut weights, 4).unwrap();
        assert!(weights.iter().all(|&w| w == 0.0));
    }
}
