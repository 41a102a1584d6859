use super::traits::ConfigSection;
use crate::error::ValsplitError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TRAIN_RATIO: f64 = 0.75;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub train_ratio: f64,
    pub seed: Option<u64>,
    pub collect_sub_models: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: DEFAULT_TRAIN_RATIO,
            seed: None,
            collect_sub_models: false,
        }
    }
}

impl ConfigSection for SplitConfig {
    fn section_name() -> &'static str {
        "split"
    }

    fn validate(&self) -> Result<(), ValsplitError> {
        validate_train_ratio(self.train_ratio)
    }
}

/// The ratio is an open interval: both partitions must be able to receive rows.
pub fn validate_train_ratio(ratio: f64) -> Result<(), ValsplitError> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(ValsplitError::Configuration(format!(
            "Train ratio must be strictly between 0 and 1, got {}",
            ratio
        )));
    }
    Ok(())
}
