use super::traits::ConfigSection;
use crate::error::ValsplitError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub overwrite: bool,
    pub pretty: bool,
    pub persist_sub_models: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            pretty: true,
            persist_sub_models: false,
        }
    }
}

impl ConfigSection for PersistenceConfig {
    fn section_name() -> &'static str {
        "persistence"
    }

    fn validate(&self) -> Result<(), ValsplitError> {
        Ok(())
    }
}
