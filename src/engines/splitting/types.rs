use polars::prelude::*;

/// Disjoint, exhaustive training/validation partitions of one dataset
#[derive(Debug, Clone)]
pub struct SplitDataset {
    pub train: DataFrame,
    pub validation: DataFrame,
}

impl SplitDataset {
    pub fn train_rows(&self) -> usize {
        self.train.height()
    }

    pub fn validation_rows(&self) -> usize {
        self.validation.height()
    }

    /// Hands out both partitions so each can be dropped as soon as it is done
    pub fn into_parts(self) -> (DataFrame, DataFrame) {
        (self.train, self.validation)
    }
}
