use super::types::SplitDataset;
use crate::error::ValsplitError;
use polars::prelude::*;

pub trait DataSplitter: Send + Sync {
    /// Split data into a training and a validation partition
    fn split(&self, data: &DataFrame) -> Result<SplitDataset, ValsplitError>;

    /// Expected fraction of rows assigned to training
    fn train_ratio(&self) -> f64;
}
