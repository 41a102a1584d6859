use super::model::TrainValidationSplitModel;
use super::params::ValidatorParams;
use crate::components::traits::{Estimator, Evaluator, Model};
use crate::config::{SplitConfig, DEFAULT_TRAIN_RATIO};
use crate::engines::evaluation::CandidateEvaluator;
use crate::engines::progress::{LoggingObserver, ValidationObserver};
use crate::engines::refit::refit_best;
use crate::engines::selection::select_best;
use crate::engines::splitting::{DataSplitter, RandomSplitter};
use crate::error::{Result, ValsplitError};
use crate::persistence::{
    self, read_metadata_expecting, write_metadata, LoaderRegistry, Metadata, Persistable,
    SaveOptions,
};
use crate::types::{random_uid, ParamGrid, ParamMap};
use polars::prelude::*;
use std::path::Path;
use std::sync::Arc;

/// Single-split hyperparameter validation.
///
/// `fit` splits the dataset once, scores every candidate of the param grid on
/// the held-out rows, and refits the winner on the whole dataset.
pub struct TrainValidationSplit {
    uid: String,
    params: ValidatorParams,
    observer: Arc<dyn ValidationObserver>,
}

/// Entry point mirroring `configure(estimator, evaluator, paramGrid, trainRatio)`
pub fn configure(
    estimator: Arc<dyn Estimator>,
    evaluator: Arc<dyn Evaluator>,
    param_grid: ParamGrid,
    train_ratio: f64,
) -> Result<TrainValidationSplit> {
    TrainValidationSplit::builder()
        .estimator(estimator)
        .evaluator(evaluator)
        .param_grid(param_grid)
        .train_ratio(train_ratio)
        .build()
}

impl TrainValidationSplit {
    pub const IDENTITY: &'static str = "valsplit.TrainValidationSplit";

    pub fn builder() -> TrainValidationSplitBuilder {
        TrainValidationSplitBuilder::default()
    }

    pub fn uid(&self) -> &str {
        &self.uid
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

    pub fn train_ratio(&self) -> f64 {
        self.params.train_ratio
    }

    pub fn seed(&self) -> Option<u64> {
        self.params.seed
    }

    pub fn collect_sub_models(&self) -> bool {
        self.params.collect_sub_models
    }

    pub fn with_observer(mut self, observer: Arc<dyn ValidationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn fit(&self, dataset: &DataFrame) -> Result<TrainValidationSplitModel> {
        self.params.validate()?;
        let params = &self.params;
        let grid = &params.param_grid;
        log::info!(
            "{} evaluating {} candidates on {} rows (train ratio {})",
            self.uid,
            grid.len(),
            dataset.height(),
            params.train_ratio
        );

        let split = RandomSplitter::new(params.train_ratio, params.seed)?.split(dataset)?;
        self.observer.on_split(split.train_rows(), split.validation_rows());

        let scores = CandidateEvaluator::new(
            params.estimator.as_ref(),
            params.evaluator.as_ref(),
            self.observer.as_ref(),
        )
        .evaluate(split, grid, params.collect_sub_models)?;

        let selection = select_best(&scores.metrics, params.evaluator.is_larger_better())?;
        let best_params = &grid[selection.best_index];
        self.observer.on_selection(&selection, best_params);

        let best_model = refit_best(params.estimator.as_ref(), dataset, best_params)?;

        Ok(TrainValidationSplitModel::new(
            self.uid.clone(),
            best_model,
            scores.metrics,
            selection,
            params.clone(),
            scores.models,
        ))
    }

    /// Copy with `extra` forwarded to the estimator and evaluator.
    /// The copy keeps this uid and observer.
    pub fn copy(&self, extra: &ParamMap) -> Self {
        Self {
            uid: self.uid.clone(),
            params: self.params.copy(extra),
            observer: Arc::clone(&self.observer),
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
        Ok(Self {
            uid: metadata.uid,
            params,
            observer: Arc::new(LoggingObserver),
        })
    }
}

impl Estimator for TrainValidationSplit {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn fit(&self, dataset: &DataFrame, params: &ParamMap) -> anyhow::Result<Box<dyn Model>> {
        let model = if params.is_empty() {
            TrainValidationSplit::fit(self, dataset)?
        } else {
            TrainValidationSplit::fit(&TrainValidationSplit::copy(self, params), dataset)?
        };
        Ok(Box::new(model))
    }

    fn copy(&self, extra: &ParamMap) -> Arc<dyn Estimator> {
        Arc::new(TrainValidationSplit::copy(self, extra))
    }

    fn as_persistable(&self) -> Option<&dyn Persistable> {
        Some(self)
    }
}

impl Persistable for TrainValidationSplit {
    fn identity(&self) -> &'static str {
        Self::IDENTITY
    }

    fn ensure_persistable(&self, options: &SaveOptions) -> Result<()> {
        self.params.ensure_persistable(options)
    }

    fn save_to(&self, path: &Path, options: &SaveOptions) -> Result<()> {
        let param_map = self.params.save_components(path, options)?;
        write_metadata(path, &Metadata::new(Self::IDENTITY, &self.uid, param_map), options)
    }
}

#[derive(Default)]
pub struct TrainValidationSplitBuilder {
    uid: Option<String>,
    estimator: Option<Arc<dyn Estimator>>,
    evaluator: Option<Arc<dyn Evaluator>>,
    param_grid: Option<ParamGrid>,
    train_ratio: Option<f64>,
    seed: Option<u64>,
    collect_sub_models: bool,
    observer: Option<Arc<dyn ValidationObserver>>,
}

impl TrainValidationSplitBuilder {
    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn estimator(mut self, estimator: Arc<dyn Estimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn param_grid(mut self, param_grid: ParamGrid) -> Self {
        self.param_grid = Some(param_grid);
        self
    }

    pub fn train_ratio(mut self, train_ratio: f64) -> Self {
        self.train_ratio = Some(train_ratio);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn collect_sub_models(mut self, collect: bool) -> Self {
        self.collect_sub_models = collect;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ValidationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Takes ratio, seed and sub-model collection from a config section
    pub fn config(mut self, config: &SplitConfig) -> Self {
        self.train_ratio = Some(config.train_ratio);
        self.seed = config.seed;
        self.collect_sub_models = config.collect_sub_models;
        self
    }

    /// Fails on a missing component or a ratio outside (0, 1).
    /// An empty grid is accepted here and rejected by `fit`.
    pub fn build(self) -> Result<TrainValidationSplit> {
        let estimator = self
            .estimator
            .ok_or_else(|| ValsplitError::configuration("Estimator is required"))?;
        let evaluator = self
            .evaluator
            .ok_or_else(|| ValsplitError::configuration("Evaluator is required"))?;
        let param_grid = self
            .param_grid
            .ok_or_else(|| ValsplitError::configuration("Param grid is required"))?;
        let train_ratio = self.train_ratio.unwrap_or(DEFAULT_TRAIN_RATIO);
        crate::config::validate_train_ratio(train_ratio)?;

        Ok(TrainValidationSplit {
            uid: self.uid.unwrap_or_else(|| random_uid("tvs")),
            params: ValidatorParams {
                estimator,
                evaluator,
                param_grid,
                train_ratio,
                seed: self.seed,
                collect_sub_models: self.collect_sub_models,
            },
            observer: self.observer.unwrap_or_else(|| Arc::new(LoggingObserver)),
        })
    }
}
