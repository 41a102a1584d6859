use crate::components::traits::{Estimator, Evaluator};
use crate::config::validate_train_ratio;
use crate::error::{Result, ValsplitError};
use crate::persistence::{
    read_metadata, require_finite_params, require_persistable, save_nested, LoaderRegistry,
    Metadata, SaveOptions,
};
use crate::types::{ParamGrid, ParamMap};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;

const ESTIMATOR_DIR: &str = "estimator";
const EVALUATOR_DIR: &str = "evaluator";

/// `{class, uid}` reference to a component saved in a sub-directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ComponentDescriptor {
    class: String,
    uid: String,
}

/// Immutable configuration shared by the pipeline and its fitted artifact
#[derive(Clone)]
pub struct ValidatorParams {
    pub estimator: Arc<dyn Estimator>,
    pub evaluator: Arc<dyn Evaluator>,
    pub param_grid: ParamGrid,
    pub train_ratio: f64,
    pub seed: Option<u64>,
    pub collect_sub_models: bool,
}

impl ValidatorParams {
    /// Checks run at fit time
    pub fn validate(&self) -> Result<()> {
        validate_train_ratio(self.train_ratio)?;
        if self.param_grid.is_empty() {
            return Err(ValsplitError::configuration(
                "Param grid must contain at least one candidate",
            ));
        }
        Ok(())
    }

    /// Forwards `extra` to the estimator and evaluator and applies the
    /// `trainRatio`, `seed` and `collectSubModels` keys to these params
    pub fn copy(&self, extra: &ParamMap) -> Self {
        Self {
            estimator: self.estimator.copy(extra),
            evaluator: self.evaluator.copy(extra),
            param_grid: self.param_grid.clone(),
            train_ratio: extra.get_f64("trainRatio").unwrap_or(self.train_ratio),
            seed: extra.get_i64("seed").and_then(seed_from_param).or(self.seed),
            collect_sub_models: extra
                .get_bool("collectSubModels")
                .unwrap_or(self.collect_sub_models),
        }
    }

    /// Checks the grid, the estimator and the evaluator, and anything they
    /// reference, can be saved
    pub fn ensure_persistable(&self, options: &SaveOptions) -> Result<()> {
        for (index, params) in self.param_grid.iter().enumerate() {
            require_finite_params(params, &format!("candidate {}", index))?;
        }
        require_persistable(self.estimator.as_persistable(), "estimator", self.estimator.uid())?
            .ensure_persistable(options)?;
        require_persistable(self.evaluator.as_persistable(), "evaluator", self.evaluator.uid())?
            .ensure_persistable(options)?;
        Ok(())
    }

    /// Saves estimator and evaluator beneath `path` and returns the `paramMap`
    /// describing these params
    pub fn save_components(&self, path: &Path, options: &SaveOptions) -> Result<Map<String, Value>> {
        let estimator =
            require_persistable(self.estimator.as_persistable(), "estimator", self.estimator.uid())?;
        let evaluator =
            require_persistable(self.evaluator.as_persistable(), "evaluator", self.evaluator.uid())?;

        save_nested(estimator, path, ESTIMATOR_DIR, options)?;
        save_nested(evaluator, path, EVALUATOR_DIR, options)?;

        let mut params = Map::new();
        params.insert(
            "estimator".to_string(),
            serde_json::to_value(ComponentDescriptor {
                class: estimator.identity().to_string(),
                uid: self.estimator.uid().to_string(),
            })?,
        );
        params.insert(
            "evaluator".to_string(),
            serde_json::to_value(ComponentDescriptor {
                class: evaluator.identity().to_string(),
                uid: self.evaluator.uid().to_string(),
            })?,
        );
        params.insert(
            "estimatorParamMaps".to_string(),
            serde_json::to_value(&self.param_grid)?,
        );
        params.insert("trainRatio".to_string(), json!(self.train_ratio));
        params.insert("seed".to_string(), json!(self.seed));
        params.insert("collectSubModels".to_string(), json!(self.collect_sub_models));
        Ok(params)
    }

    pub fn load(path: &Path, metadata: &Metadata, registry: &LoaderRegistry) -> Result<Self> {
        let estimator_ref: ComponentDescriptor = metadata.param("estimator")?;
        let evaluator_ref: ComponentDescriptor = metadata.param("evaluator")?;
        let param_grid: ParamGrid = metadata.param("estimatorParamMaps")?;
        let train_ratio: f64 = metadata.param("trainRatio")?;
        validate_train_ratio(train_ratio)
            .map_err(|e| ValsplitError::persistence_read(format!("{}: {}", metadata.class, e)))?;
        let seed: Option<u64> = metadata.optional_param("seed")?;
        let collect_sub_models: bool = metadata
            .optional_param("collectSubModels")?
            .unwrap_or(false);

        let estimator_dir = path.join(ESTIMATOR_DIR);
        check_descriptor(&estimator_dir, &estimator_ref)?;
        let estimator = registry.load_estimator(&estimator_dir)?;

        let evaluator_dir = path.join(EVALUATOR_DIR);
        check_descriptor(&evaluator_dir, &evaluator_ref)?;
        let evaluator = registry.load_evaluator(&evaluator_dir)?;

        Ok(Self {
            estimator,
            evaluator,
            param_grid,
            train_ratio,
            seed,
            collect_sub_models,
        })
    }
}

/// Seeds are unsigned; a negative `seed` param is ignored
fn seed_from_param(seed: i64) -> Option<u64> {
    match u64::try_from(seed) {
        Ok(seed) => Some(seed),
        Err(_) => {
            log::warn!("Ignoring negative seed {}", seed);
            None
        }
    }
}

fn check_descriptor(dir: &Path, expected: &ComponentDescriptor) -> Result<()> {
    let recorded = read_metadata(dir)?;
    if recorded.class != expected.class || recorded.uid != expected.uid {
        return Err(ValsplitError::persistence_read(format!(
            "{} holds {} {} but the parent references {} {}",
            dir.display(),
            recorded.class,
            recorded.uid,
            expected.class,
            expected.uid
        )));
    }
    Ok(())
}
