//! Batch sampling for the training loop
//!
//! Walks a shuffled permutation of the dataset and reshuffles at each
//! epoch boundary, so every example is visited once per epoch and batch
//! composition varies between epochs.

use crate::data::{EncodedExample, PhishingDataset};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Epoch-cycling batch sampler
pub struct BatchSampler {
    order: Vec<usize>,
    cursor: usize,
    batch_size: usize,
    rng: StdRng,
}

impl BatchSampler {
    /// Create a sampler over `len` examples
    pub fn new(len: usize, batch_size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut rng);

        Self {
            order,
            cursor: 0,
            batch_size: batch_size.max(1),
            rng,
        }
    }

    /// Draw the next batch of examples, wrapping (and reshuffling) at the
    /// epoch boundary
    pub fn next_batch(&mut self, dataset: &PhishingDataset) -> Vec<EncodedExample> {
        let mut batch = Vec::with_capacity(self.batch_size);
        if self.order.is_empty() {
            return batch;
        }
        for _ in 0..self.batch_size {
            if self.cursor == self.order.len() {
                self.order.shuffle(&mut self.rng);
                self.cursor = 0;
            }
            if let Some(example) = dataset.get(self.order[self.cursor]) {
                batch.push(example.clone());
            }
            self.cursor += 1;
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::IGNORE_INDEX;

    fn dataset_of(n: usize) -> PhishingDataset {
        let examples = (0..n)
            .map(|i| EncodedExample {
                input_ids: vec![i as u32, i as u32],
                attention_mask: vec![1, 1],
                labels: vec![IGNORE_INDEX, i as i64],
            })
            .collect();
        PhishingDataset::from_examples(examples)
    }

    #[test]
    fn test_epoch_covers_every_example_once() {
        let dataset = dataset_of(6);
        let mut sampler = BatchSampler::new(dataset.len(), 2, 42);

        let mut seen: Vec<u32> = Vec::new();
        for _ in 0..3 {
            for example in sampler.next_batch(&dataset) {
                seen.push(example.input_ids[0]);
            }
        }

        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_wraps_past_epoch_boundary() {
        let dataset = dataset_of(3);
        let mut sampler = BatchSampler::new(dataset.len(), 2, 0);

        // 4 batches of 2 over 3 examples: 8 draws, wrapping twice
        let mut count = 0;
        for _ in 0..4 {
            count += sampler.next_batch(&dataset).len();
        }
        assert_eq!(count, 8);
    }

    #[test]
    fn test_seeded_order_is_deterministic() {
        let dataset = dataset_of(8);
        let mut a = BatchSampler::new(dataset.len(), 3, 5);
        let mut b = BatchSampler::new(dataset.len(), 3, 5);

        for _ in 0..5 {
            let batch_a: Vec<u32> = a
                .next_batch(&dataset)
                .iter()
                .map(|e| e.input_ids[0])
                .collect();
            let batch_b: Vec<u32> = b
                .next_batch(&dataset)
                .iter()
                .map(|e| e.input_ids[0])
                .collect();
            assert_eq!(batch_a, batch_b);
        }
    }
}
