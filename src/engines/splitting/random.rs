use super::base::DataSplitter;
use super::types::SplitDataset;
use crate::config::validate_train_ratio;
use crate::error::ValsplitError;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Assigns each row to training independently with probability `train_ratio`.
///
/// Partition sizes follow the ratio in expectation only. With a seed the
/// assignment is reproducible across calls.
pub struct RandomSplitter {
    train_ratio: f64,
    seed: Option<u64>,
}

impl RandomSplitter {
    pub fn new(train_ratio: f64, seed: Option<u64>) -> Result<Self, ValsplitError> {
        validate_train_ratio(train_ratio)?;
        Ok(Self { train_ratio, seed })
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

impl DataSplitter for RandomSplitter {
    fn split(&self, data: &DataFrame) -> Result<SplitDataset, ValsplitError> {
        let mut rng = self.rng();
        let assignment: Vec<bool> = (0..data.height())
            .map(|_| rng.gen_bool(self.train_ratio))
            .collect();
        let mask = BooleanChunked::from_slice("train".into(), &assignment);

        let train = data.filter(&mask)?;
        let validation = data.filter(&!&mask)?;

        Ok(SplitDataset { train, validation })
    }

    fn train_ratio(&self) -> f64 {
        self.train_ratio
    }
}
