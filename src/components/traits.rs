use crate::persistence::Persistable;
use crate::types::ParamMap;
use anyhow::Result;
use polars::prelude::*;
use std::sync::Arc;

/// A trainable model family
pub trait Estimator: Send + Sync {
    fn uid(&self) -> &str;

    /// Fit one model using `params` on top of this estimator's own params
    fn fit(&self, dataset: &DataFrame, params: &ParamMap) -> Result<Box<dyn Model>>;

    /// Fit one model per candidate, returned in candidate order.
    /// Implementations may parallelise internally.
    fn fit_many(&self, dataset: &DataFrame, grid: &[ParamMap]) -> Result<Vec<Box<dyn Model>>> {
        grid.iter().map(|params| self.fit(dataset, params)).collect()
    }

    fn copy(&self, extra: &ParamMap) -> Arc<dyn Estimator>;

    fn as_persistable(&self) -> Option<&dyn Persistable> {
        None
    }
}

/// A scoring function over a transformed dataset
pub trait Evaluator: Send + Sync {
    fn uid(&self) -> &str;

    fn evaluate(&self, predictions: &DataFrame) -> Result<f64>;

    /// Metric direction used when selecting the best candidate
    fn is_larger_better(&self) -> bool {
        true
    }

    fn copy(&self, extra: &ParamMap) -> Arc<dyn Evaluator>;

    fn as_persistable(&self) -> Option<&dyn Persistable> {
        None
    }
}

/// A fitted transformer
pub trait Model: Send + Sync {
    fn uid(&self) -> &str;

    fn transform(&self, dataset: &DataFrame) -> Result<DataFrame>;

    /// Transform with `extra` params applied to a copy of this model
    fn transform_with(&self, dataset: &DataFrame, extra: &ParamMap) -> Result<DataFrame> {
        if extra.is_empty() {
            self.transform(dataset)
        } else {
            self.copy(extra).transform(dataset)
        }
    }

    fn copy(&self, extra: &ParamMap) -> Box<dyn Model>;

    fn as_persistable(&self) -> Option<&dyn Persistable> {
        None
    }
}
