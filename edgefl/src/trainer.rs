//! Local training capability. The controller only needs "do a unit of work, tell me
//! the accuracy"; the default implementation is a tiny two-feature logistic classifier.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait Trainer: Send {
    /// Starts a fresh model (and dataset) for a new round.
    fn reset(&mut self);

    /// Runs one training unit and returns the accuracy after it, in `[0, 1]`.
    fn step(&mut self) -> f64;

    /// Accuracy of the current model without training.
    fn accuracy(&self) -> f64;
}

pub const DEFAULT_SAMPLES: usize = 200;
pub const DEFAULT_EPOCHS_PER_STEP: usize = 600;
pub const DEFAULT_LEARNING_RATE: f64 = 0.7;

/// Logistic regression on `(x1, x2)` points in the unit square labelled `x1 + x2 > 1`.
///
/// There is no bias term, so the learned boundary passes through the origin and
/// can never separate the classes perfectly.
pub struct LogisticTrainer {
    rng: StdRng,
    samples: usize,
    epochs_per_step: usize,
    lr: f64,
    data: Vec<([f64; 2], f64)>,
    w: [f64; 2],
}

impl LogisticTrainer {
    pub fn new(seed: u64) -> Self {
        Self::with_params(
            seed,
            DEFAULT_SAMPLES,
            DEFAULT_EPOCHS_PER_STEP,
            DEFAULT_LEARNING_RATE,
        )
    }

    pub fn with_params(seed: u64, samples: usize, epochs_per_step: usize, lr: f64) -> Self {
        let mut t = Self {
            rng: StdRng::seed_from_u64(seed),
            samples: samples.max(1),
            epochs_per_step: epochs_per_step.max(1),
            lr,
            data: Vec::new(),
            w: [0.0; 2],
        };
        t.reset();
        t
    }

    pub fn from_entropy() -> Self {
        Self::new(rand::rng().random())
    }

    pub fn weights(&self) -> [f64; 2] {
        self.w
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Trainer for LogisticTrainer {
    fn reset(&mut self) {
        let rng = &mut self.rng;
        self.data = (0..self.samples)
            .map(|_| {
                let x = [rng.random::<f64>(), rng.random::<f64>()];
                let label = if x[0] + x[1] > 1.0 { 1.0 } else { 0.0 };
                (x, label)
            })
            .collect();
        self.w = [0.0; 2];
    }

    fn step(&mut self) -> f64 {
        for _ in 0..self.epochs_per_step {
            for (x, t) in &self.data {
                let p = sigmoid(self.w[0] * x[0] + self.w[1] * x[1]);
                let g = p - t;
                self.w[0] -= self.lr * g * x[0];
                self.w[1] -= self.lr * g * x[1];
            }
        }
        self.accuracy()
    }

    fn accuracy(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let correct = self
            .data
            .iter()
            .filter(|(x, t)| {
                let predicted = self.w[0] * x[0] + self.w[1] * x[1] > 0.0;
                predicted == (*t > 0.5)
            })
            .count();
        correct as f64 / self.data.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrained_model_predicts_all_negative() {
        let t = LogisticTrainer::new(7);
        let negatives = t.data.iter().filter(|(_, y)| *y == 0.0).count();
        let expected = negatives as f64 / t.data.len() as f64;
        assert_eq!(t.accuracy(), expected);
        assert_eq!(t.weights(), [0.0, 0.0]);
    }

    #[test]
    fn step_stays_in_unit_interval() {
        let mut t = LogisticTrainer::with_params(11, 50, 20, DEFAULT_LEARNING_RATE);
        for _ in 0..3 {
            let acc = t.step();
            assert!((0.0..=1.0).contains(&acc), "accuracy {acc}");
        }
    }

    #[test]
    fn same_seed_same_trajectory() {
        let mut a = LogisticTrainer::with_params(3, 40, 10, 0.5);
        let mut b = LogisticTrainer::with_params(3, 40, 10, 0.5);
        assert_eq!(a.step(), b.step());
        assert_eq!(a.weights(), b.weights());
    }

    #[test]
    fn reset_clears_weights() {
        let mut t = LogisticTrainer::with_params(5, 40, 10, 0.5);
        t.step();
        assert_ne!(t.weights(), [0.0, 0.0]);
        t.reset();
        assert_eq!(t.weights(), [0.0, 0.0]);
    }
}
