use super::{persistence::PersistenceConfig, split::SplitConfig, traits::ConfigSection};
use crate::error::ValsplitError;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Prefix of environment variables overriding file settings,
/// e.g. `VALSPLIT__SPLIT__TRAIN_RATIO=0.6`
pub const ENV_PREFIX: &str = "VALSPLIT";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub split: SplitConfig,
    pub persistence: PersistenceConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ValsplitError> {
        self.split.validate()?;
        self.persistence.validate()?;
        if self.persistence.persist_sub_models && !self.split.collect_sub_models {
            return Err(ValsplitError::Configuration(format!(
                "{}.persist_sub_models requires {}.collect_sub_models",
                PersistenceConfig::section_name(),
                SplitConfig::section_name()
            )));
        }
        Ok(())
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Loads a TOML or JSON file (format from the extension), layered under
    /// `VALSPLIT__*` environment overrides
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ValsplitError> {
        let builder = Config::builder().add_source(File::from(path.as_ref()));
        self.load(builder)
    }

    pub fn load_from_str(&self, contents: &str, format: FileFormat) -> Result<(), ValsplitError> {
        let builder = Config::builder().add_source(File::from_str(contents, format));
        self.load(builder)
    }

    fn load(
        &self,
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<(), ValsplitError> {
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ValsplitError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| ValsplitError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        log::debug!("Loaded configuration: {:?}", config);

        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ValsplitError> {
        let config = self.get();
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| ValsplitError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| ValsplitError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies `f` to a copy and commits it only if the result validates
    pub fn update<F>(&self, f: F) -> Result<(), ValsplitError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let mut candidate = config.clone();
        f(&mut candidate);
        candidate.validate()?;
        *config = candidate;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_partial_toml_keeps_defaults() {
        let manager = ConfigManager::new();
        manager
            .load_from_str("[split]\ntrain_ratio = 0.6\nseed = 7\n", FileFormat::Toml)
            .unwrap();

        let config = manager.get();
        assert_eq!(config.split.train_ratio, 0.6);
        assert_eq!(config.split.seed, Some(7));
        assert!(config.persistence.pretty);
    }

    #[test]
    fn test_load_rejects_invalid_ratio() {
        let manager = ConfigManager::new();
        let err = manager
            .load_from_str("[split]\ntrain_ratio = 1.0\n", FileFormat::Toml)
            .unwrap_err();
        assert!(matches!(err, ValsplitError::Configuration(_)));
        assert_eq!(manager.get(), AppConfig::default());
    }

    #[test]
    fn test_sub_model_persistence_requires_collection() {
        let config = AppConfig {
            persistence: PersistenceConfig {
                persist_sub_models: true,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_update_is_atomic() {
        let manager = ConfigManager::new();
        assert!(manager.update(|c| c.split.train_ratio = 0.0).is_err());
        assert_eq!(manager.get().split.train_ratio, 0.75);

        manager.update(|c| c.split.train_ratio = 0.9).unwrap();
        assert_eq!(manager.get().split.train_ratio, 0.9);
    }

    #[test]
    fn test_save_then_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("valsplit.toml");

        let manager = ConfigManager::new();
        manager
            .update(|c| {
                c.split.seed = Some(11);
                c.persistence.overwrite = true;
            })
            .unwrap();
        manager.save_to_file(&path).unwrap();

        let reloaded = ConfigManager::new();
        reloaded.load_from_file(&path).unwrap();
        assert_eq!(reloaded.get(), manager.get());
    }
}
