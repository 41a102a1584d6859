use super::params::ValidatorParams;
use crate::components::traits::{Estimator, Evaluator, Model};
use crate::engines::selection::select_best;
use crate::error::{Result, ValsplitError};
use crate::persistence::{
    self, read_metadata_expecting, require_persistable, save_nested, write_metadata,
    LoaderRegistry, Metadata, Persistable, SaveOptions,
};
use crate::types::{ParamMap, SelectionResult};
use polars::prelude::*;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;

const BEST_MODEL_DIR: &str = "bestModel";
const SUB_MODELS_DIR: &str = "subModels";

const NAN: &str = "NaN";
const INFINITY: &str = "Infinity";
const NEG_INFINITY: &str = "-Infinity";

/// JSON numbers cannot hold non-finite scores, so those are written as strings
fn encode_metric(metric: f64) -> Value {
    if metric.is_nan() {
        json!(NAN)
    } else if metric == f64::INFINITY {
        json!(INFINITY)
    } else if metric == f64::NEG_INFINITY {
        json!(NEG_INFINITY)
    } else {
        json!(metric)
    }
}

fn decode_metric(value: &Value) -> Result<f64> {
    let metric = match value {
        Value::Number(n) => n.as_f64(),
        Value::Null => Some(f64::NAN),
        Value::String(s) if s == NAN => Some(f64::NAN),
        Value::String(s) if s == INFINITY => Some(f64::INFINITY),
        Value::String(s) if s == NEG_INFINITY => Some(f64::NEG_INFINITY),
        _ => None,
    };
    metric.ok_or_else(|| {
        ValsplitError::persistence_read(format!("invalid validation metric {}", value))
    })
}

/// Result of [`TrainValidationSplit::fit`](super::TrainValidationSplit::fit):
/// the winner refitted on the full dataset plus every candidate's score.
pub struct TrainValidationSplitModel {
    uid: String,
    best_model: Box<dyn Model>,
    validation_metrics: Vec<f64>,
    selection: SelectionResult,
    params: ValidatorParams,
    sub_models: Option<Vec<Box<dyn Model>>>,
}

impl TrainValidationSplitModel {
    pub const IDENTITY: &'static str = "valsplit.TrainValidationSplitModel";

    pub(crate) fn new(
        uid: String,
        best_model: Box<dyn Model>,
        validation_metrics: Vec<f64>,
        selection: SelectionResult,
        params: ValidatorParams,
        sub_models: Option<Vec<Box<dyn Model>>>,
    ) -> Self {
        Self {
            uid,
            best_model,
            validation_metrics,
            selection,
            params,
            sub_models,
        }
    }

    /// Same uid as the pipeline that produced this model
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn best_model(&self) -> &dyn Model {
        self.best_model.as_ref()
    }

    /// One score per candidate, in param grid order
    pub fn validation_metrics(&self) -> &[f64] {
        &self.validation_metrics
    }

    pub fn selection(&self) -> SelectionResult {
        self.selection
    }

    pub fn best_params(&self) -> &ParamMap {
        &self.params.param_grid[self.selection.best_index]
    }

    pub fn train_ratio(&self) -> f64 {
        self.params.train_ratio
    }

    pub fn seed(&self) -> Option<u64> {
        self.params.seed
    }

    pub fn estimator(&self) -> &Arc<dyn Estimator> {
        &self.params.estimator
    }

    pub fn evaluator(&self) -> &Arc<dyn Evaluator> {
        &self.params.evaluator
    }

    pub fn param_grid(&self) -> &[ParamMap] {
        &self.params.param_grid
    }

    /// Every candidate model fitted on the training partition, if collected
    pub fn sub_models(&self) -> Option<&[Box<dyn Model>]> {
        self.sub_models.as_deref()
    }

    pub fn transform(&self, dataset: &DataFrame) -> Result<DataFrame> {
        Ok(self.best_model.transform(dataset)?)
    }

    pub fn copy(&self, extra: &ParamMap) -> Self {
        Self {
            uid: self.uid.clone(),
            best_model: self.best_model.copy(extra),
            validation_metrics: self.validation_metrics.clone(),
            selection: self.selection,
            params: self.params.copy(extra),
            sub_models: self
                .sub_models
                .as_ref()
                .map(|models| models.iter().map(|m| m.copy(extra)).collect()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_with(path, &SaveOptions::default())
    }

    pub fn save_with(&self, path: impl AsRef<Path>, options: &SaveOptions) -> Result<()> {
        persistence::save(self, path.as_ref(), options)
    }

    pub fn load(path: impl AsRef<Path>, registry: &LoaderRegistry) -> Result<Self> {
        let path = path.as_ref();
        let metadata = read_metadata_expecting(path, Self::IDENTITY)?;
        let params = ValidatorParams::load(path, &metadata, registry)?;

        let stored: Vec<Value> = metadata.require_extra("validationMetrics")?;
        let validation_metrics = stored
            .iter()
            .map(decode_metric)
            .collect::<Result<Vec<f64>>>()?;
        if validation_metrics.len() != params.param_grid.len() {
            return Err(ValsplitError::persistence_read(format!(
                "{} has {} validation metrics for {} candidates",
                metadata.uid,
                validation_metrics.len(),
                params.param_grid.len()
            )));
        }
        let selection = select_best(&validation_metrics, params.evaluator.is_larger_better())
            .map_err(|e| ValsplitError::persistence_read(e.to_string()))?;

        let best_model_dir = path.join(BEST_MODEL_DIR);
        if !best_model_dir.is_dir() {
            return Err(ValsplitError::persistence_read(format!(
                "missing best model at {}",
                best_model_dir.display()
            )));
        }
        let best_model = registry.load_model(&best_model_dir)?;

        let sub_models = if metadata.extra_field("persistSubModels")?.unwrap_or(false) {
            let dir = path.join(SUB_MODELS_DIR);
            let models = (0..params.param_grid.len())
                .map(|i| registry.load_model(&dir.join(i.to_string())))
                .collect::<Result<Vec<_>>>()?;
            Some(models)
        } else {
            None
        };

        Ok(Self {
            uid: metadata.uid,
            best_model,
            validation_metrics,
            selection,
            params,
            sub_models,
        })
    }
}

impl Model for TrainValidationSplitModel {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn transform(&self, dataset: &DataFrame) -> anyhow::Result<DataFrame> {
        self.best_model.transform(dataset)
    }

    fn copy(&self, extra: &ParamMap) -> Box<dyn Model> {
        Box::new(TrainValidationSplitModel::copy(self, extra))
    }

    fn as_persistable(&self) -> Option<&dyn Persistable> {
        Some(self)
    }
}

impl Persistable for TrainValidationSplitModel {
    fn identity(&self) -> &'static str {
        Self::IDENTITY
    }

    fn ensure_persistable(&self, options: &SaveOptions) -> Result<()> {
        let nested = options.nested();
        self.params.ensure_persistable(&nested)?;
        require_persistable(self.best_model.as_persistable(), "best model", self.best_model.uid())?
            .ensure_persistable(&nested)?;

        if options.persist_sub_models {
            let models = self.sub_models.as_ref().ok_or_else(|| {
                ValsplitError::persistence_write(
                    "sub-models can only be persisted when they were collected during fit",
                )
            })?;
            for model in models {
                require_persistable(model.as_persistable(), "sub-model", model.uid())?
                    .ensure_persistable(&nested)?;
            }
        }
        Ok(())
    }

    fn save_to(&self, path: &Path, options: &SaveOptions) -> Result<()> {
        let nested = options.nested();
        let param_map = self.params.save_components(path, &nested)?;

        let best_model =
            require_persistable(self.best_model.as_persistable(), "best model", self.best_model.uid())?;
        save_nested(best_model, path, BEST_MODEL_DIR, &nested)?;

        let persist_sub_models = options.persist_sub_models && self.sub_models.is_some();
        if let (true, Some(models)) = (persist_sub_models, &self.sub_models) {
            let dir = path.join(SUB_MODELS_DIR);
            for (i, model) in models.iter().enumerate() {
                let model = require_persistable(model.as_persistable(), "sub-model", model.uid())?;
                save_nested(model, &dir, &i.to_string(), &nested)?;
            }
        }

        let metrics: Vec<Value> = self
            .validation_metrics
            .iter()
            .map(|m| encode_metric(*m))
            .collect();
        let mut extra = Map::new();
        extra.insert("validationMetrics".to_string(), json!(metrics));
        extra.insert("persistSubModels".to_string(), json!(persist_sub_models));

        let metadata = Metadata::new(Self::IDENTITY, &self.uid, param_map).with_extra(extra);
        write_metadata(path, &metadata, options)
    }
}
