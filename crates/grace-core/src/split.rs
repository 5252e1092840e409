//! Train / validation / test node splits for linear evaluation.

use crate::{Error, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// How labelled nodes are divided for the linear probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Planetoid-style: a fixed number of training nodes per class, then
    /// `num_val` validation and `num_test` test nodes from the rest.
    PerClass {
        train_per_class: usize,
        num_val: usize,
        num_test: usize,
    },
    /// Random fractions of all nodes; whatever remains is the test set.
    Ratio { train: f32, val: f32 },
}

impl Default for SplitStrategy {
    fn default() -> Self {
        Self::PerClass {
            train_per_class: 20,
            num_val: 500,
            num_test: 1000,
        }
    }
}

/// Disjoint node index sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSplit {
    pub train: Vec<u32>,
    pub val: Vec<u32>,
    pub test: Vec<u32>,
}

impl NodeSplit {
    /// Draw a split over nodes labelled by `labels`.
    pub fn new(strategy: SplitStrategy, labels: &[u32], num_classes: usize, seed: u64) -> Result<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut order: Vec<u32> = (0..labels.len() as u32).collect();
        order.shuffle(&mut rng);

        let split = match strategy {
            SplitStrategy::PerClass {
                train_per_class,
                num_val,
                num_test,
            } => Self::per_class(&order, labels, num_classes, train_per_class, num_val, num_test),
            SplitStrategy::Ratio { train, val } => Self::ratio(&order, train, val)?,
        };

        if split.train.is_empty() || split.test.is_empty() {
            return Err(Error::InvalidSplit(format!(
                "{} train / {} test nodes from {} labelled nodes",
                split.train.len(),
                split.test.len(),
                labels.len()
            )));
        }
        Ok(split)
    }

    fn per_class(
        order: &[u32],
        labels: &[u32],
        num_classes: usize,
        train_per_class: usize,
        num_val: usize,
        num_test: usize,
    ) -> Self {
        let mut taken = vec![0usize; num_classes];
        let mut train = Vec::with_capacity(train_per_class * num_classes);
        let mut rest = Vec::with_capacity(order.len());
        for &node in order {
            let class = labels[node as usize] as usize;
            if taken[class] < train_per_class {
                taken[class] += 1;
                train.push(node);
            } else {
                rest.push(node);
            }
        }

        let n_test = num_test.min(rest.len());
        let n_val = num_val.min(rest.len() - n_test);
        if n_val < num_val || n_test < num_test {
            tracing::warn!(
                requested_val = num_val,
                requested_test = num_test,
                val = n_val,
                test = n_test,
                "not enough nodes for the requested split, shrinking"
            );
        }
        let val = rest[..n_val].to_vec();
        let test = rest[n_val..n_val + n_test].to_vec();
        Self { train, val, test }
    }

    fn ratio(order: &[u32], train: f32, val: f32) -> Result<Self> {
        crate::augment::check_rate("train ratio", train)?;
        crate::augment::check_rate("val ratio", val)?;
        if train + val >= 1.0 {
            return Err(Error::InvalidSplit(format!(
                "train ({}) + val ({}) leaves no test nodes",
                train, val
            )));
        }
        let n = order.len();
        let n_train = (train * n as f32).round() as usize;
        let n_val = ((val * n as f32).round() as usize).min(n - n_train);
        Ok(Self {
            train: order[..n_train].to_vec(),
            val: order[n_train..n_train + n_val].to_vec(),
            test: order[n_train + n_val..].to_vec(),
        })
    }
}
