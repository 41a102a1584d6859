use crate::components::linear::{LinearRegression, LinearRegressionModel};
use crate::components::regression::RegressionEvaluator;
use crate::components::traits::{Estimator, Evaluator, Model};
use crate::engines::validation::{TrainValidationSplit, TrainValidationSplitModel};
use crate::error::{Result, ValsplitError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::metadata::read_metadata;

pub type EstimatorLoader = fn(&Path, &LoaderRegistry) -> Result<Arc<dyn Estimator>>;
pub type EvaluatorLoader = fn(&Path, &LoaderRegistry) -> Result<Arc<dyn Evaluator>>;
pub type ModelLoader = fn(&Path, &LoaderRegistry) -> Result<Box<dyn Model>>;

/// Maps implementation identities to loaders.
///
/// External components register their own loader under the identity they
/// write into metadata. Loading reads the identity recorded at a path and
/// hands the path to the matching loader.
pub struct LoaderRegistry {
    estimators: HashMap<String, EstimatorLoader>,
    evaluators: HashMap<String, EvaluatorLoader>,
    models: HashMap<String, ModelLoader>,
}

impl LoaderRegistry {
    /// Registry preloaded with every component shipped by this crate
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        registry
    }

    pub fn empty() -> Self {
        Self {
            estimators: HashMap::new(),
            evaluators: HashMap::new(),
            models: HashMap::new(),
        }
    }

    pub fn register_estimator(&mut self, identity: &str, loader: EstimatorLoader) {
        self.estimators.insert(identity.to_string(), loader);
    }

    pub fn register_evaluator(&mut self, identity: &str, loader: EvaluatorLoader) {
        self.evaluators.insert(identity.to_string(), loader);
    }

    pub fn register_model(&mut self, identity: &str, loader: ModelLoader) {
        self.models.insert(identity.to_string(), loader);
    }

    pub fn load_estimator(&self, path: &Path) -> Result<Arc<dyn Estimator>> {
        let identity = read_metadata(path)?.class;
        let loader = self
            .estimators
            .get(&identity)
            .ok_or_else(|| unknown("estimator", &identity, path))?;
        loader(path, self)
    }

    pub fn load_evaluator(&self, path: &Path) -> Result<Arc<dyn Evaluator>> {
        let identity = read_metadata(path)?.class;
        let loader = self
            .evaluators
            .get(&identity)
            .ok_or_else(|| unknown("evaluator", &identity, path))?;
        loader(path, self)
    }

    pub fn load_model(&self, path: &Path) -> Result<Box<dyn Model>> {
        let identity = read_metadata(path)?.class;
        let loader = self
            .models
            .get(&identity)
            .ok_or_else(|| unknown("model", &identity, path))?;
        loader(path, self)
    }

    pub fn knows(&self, identity: &str) -> bool {
        self.estimators.contains_key(identity)
            || self.evaluators.contains_key(identity)
            || self.models.contains_key(identity)
    }

    fn register_builtins(&mut self) {
        self.register_estimator(TrainValidationSplit::IDENTITY, |path, registry| {
            Ok(Arc::new(TrainValidationSplit::load(path, registry)?))
        });
        self.register_estimator(LinearRegression::IDENTITY, |path, _| {
            Ok(Arc::new(LinearRegression::load(path)?))
        });
        self.register_evaluator(RegressionEvaluator::IDENTITY, |path, _| {
            Ok(Arc::new(RegressionEvaluator::load(path)?))
        });
        self.register_model(TrainValidationSplitModel::IDENTITY, |path, registry| {
            Ok(Box::new(TrainValidationSplitModel::load(path, registry)?))
        });
        self.register_model(LinearRegressionModel::IDENTITY, |path, _| {
            Ok(Box::new(LinearRegressionModel::load(path)?))
        });
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn unknown(role: &str, identity: &str, path: &Path) -> ValsplitError {
    ValsplitError::persistence_read(format!(
        "no {} loader registered for class {} (at {})",
        role,
        identity,
        path.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = LoaderRegistry::new();
        assert!(registry.knows(TrainValidationSplit::IDENTITY));
        assert!(registry.knows(TrainValidationSplitModel::IDENTITY));
        assert!(registry.knows(LinearRegression::IDENTITY));
        assert!(registry.knows(LinearRegressionModel::IDENTITY));
        assert!(registry.knows(RegressionEvaluator::IDENTITY));
    }

    #[test]
    fn test_empty_registry_knows_nothing() {
        let registry = LoaderRegistry::empty();
        assert!(!registry.knows(LinearRegression::IDENTITY));
    }

    #[test]
    fn test_unknown_identity_is_read_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let model = LinearRegressionModel::new("lr_1", 2.0, 1.0, crate::types::ParamMap::new());
        crate::persistence::save(&model, dir.path(), &Default::default()).unwrap();

        let err = LoaderRegistry::empty()
            .load_model(dir.path())
            .err()
            .unwrap();
        assert!(matches!(err, ValsplitError::PersistenceRead(_)));
    }
}
