//! Learning rate schedulers

/// Learning rate scheduler trait
pub trait LrScheduler {
    /// Get the current learning rate
    fn get_lr(&self) -> f32;

    /// Step the scheduler (called after each optimizer update)
    fn step(&mut self);
}

/// Linear warmup followed by linear decay to zero
///
/// The learning rate ramps from 0 to `base_lr` over `warmup_steps`, then
/// decays linearly so that it reaches 0 at `total_steps`.
///
/// Formula:
/// - warmup:  lr_t = base_lr * t / warmup_steps
/// - decay:   lr_t = base_lr * (total_steps - t) / (total_steps - warmup_steps)
pub struct LinearWarmupDecay {
    base_lr: f32,
    warmup_steps: usize,
    total_steps: usize,
    current_step: usize,
}

impl LinearWarmupDecay {
    /// Create a new warmup/decay scheduler
    ///
    /// # Arguments
    /// * `base_lr` - Peak learning rate reached at the end of warmup
    /// * `warmup_steps` - Number of warmup steps (0 = start at base_lr)
    /// * `total_steps` - Step at which the learning rate reaches zero
    pub fn new(base_lr: f32, warmup_steps: usize, total_steps: usize) -> Self {
        Self {
            base_lr,
            warmup_steps,
            total_steps,
            current_step: 0,
        }
    }

    /// Number of scheduler advances so far
    pub fn steps_taken(&self) -> usize {
        self.current_step
    }
}

impl LrScheduler for LinearWarmupDecay {
    fn get_lr(&self) -> f32 {
        let t = self.current_step;

        if self.warmup_steps > 0 && t < self.warmup_steps {
            return self.base_lr * t as f32 / self.warmup_steps as f32;
        }

        if t >= self.total_steps {
            return 0.0;
        }

        let decay_span = (self.total_steps - self.warmup_steps).max(1);
        self.base_lr * (self.total_steps - t) as f32 / decay_span as f32
    }

    fn step(&mut self) {
        self.current_step += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_warmup_ramp() {
        let mut scheduler = LinearWarmupDecay::new(1.0, 10, 100);

        // At step 0, lr is 0
        assert_abs_diff_eq!(scheduler.get_lr(), 0.0, epsilon = 1e-6);

        for _ in 0..5 {
            scheduler.step();
        }
        // Halfway through warmup
        assert_abs_diff_eq!(scheduler.get_lr(), 0.5, epsilon = 1e-6);

        for _ in 0..5 {
            scheduler.step();
        }
        // End of warmup: peak lr
        assert_abs_diff_eq!(scheduler.get_lr(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_linear_decay_to_zero() {
        let mut scheduler = LinearWarmupDecay::new(1.0, 0, 10);

        assert_abs_diff_eq!(scheduler.get_lr(), 1.0, epsilon = 1e-6);

        for _ in 0..5 {
            scheduler.step();
        }
        assert_abs_diff_eq!(scheduler.get_lr(), 0.5, epsilon = 1e-6);

        for _ in 0..5 {
            scheduler.step();
        }
        assert_abs_diff_eq!(scheduler.get_lr(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_stays_zero_past_total() {
        let mut scheduler = LinearWarmupDecay::new(1.0, 0, 5);
        for _ in 0..20 {
            scheduler.step();
        }
        assert_abs_diff_eq!(scheduler.get_lr(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_decay_decreases_monotonically_after_warmup() {
        let mut scheduler = LinearWarmupDecay::new(1.0, 10, 100);
        for _ in 0..10 {
            scheduler.step();
        }

        let mut prev_lr = scheduler.get_lr();
        for _ in 10..100 {
            scheduler.step();
            let lr = scheduler.get_lr();
            assert!(
                lr <= prev_lr,
                "Learning rate should decrease after warmup: prev={}, current={}",
                prev_lr,
                lr
            );
            prev_lr = lr;
        }
    }

    #[test]
    fn test_zero_warmup_starts_at_base() {
        let scheduler = LinearWarmupDecay::new(0.01, 0, 100);
        assert_abs_diff_eq!(scheduler.get_lr(), 0.01, epsilon = 1e-8);
    }

    #[test]
    fn test_steps_taken() {
        let mut scheduler = LinearWarmupDecay::new(1.0, 0, 10);
        assert_eq!(scheduler.steps_taken(), 0);
        scheduler.step();
        scheduler.step();
        assert_eq!(scheduler.steps_taken(), 2);
    }
}
