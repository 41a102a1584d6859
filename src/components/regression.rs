use super::traits::Evaluator;
use super::{f64_column, paired};
use crate::persistence::{
    read_metadata_expecting, require_finite_params, write_metadata, Metadata, Persistable,
    SaveOptions,
};
use crate::types::{random_uid, ParamMap};
use anyhow::{bail, Result};
use polars::prelude::*;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegressionMetric {
    Rmse,
    Mse,
    Mae,
    R2,
}

impl RegressionMetric {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "rmse" => Some(Self::Rmse),
            "mse" => Some(Self::Mse),
            "mae" => Some(Self::Mae),
            "r2" => Some(Self::R2),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rmse => "rmse",
            Self::Mse => "mse",
            Self::Mae => "mae",
            Self::R2 => "r2",
        }
    }

    pub fn is_larger_better(&self) -> bool {
        matches!(self, Self::R2)
    }

    fn compute(&self, rows: &[(f64, f64)]) -> f64 {
        let n = rows.len() as f64;
        let sse: f64 = rows.iter().map(|(y, p)| (y - p).powi(2)).sum();
        match self {
            Self::Mse => sse / n,
            Self::Rmse => (sse / n).sqrt(),
            Self::Mae => rows.iter().map(|(y, p)| (y - p).abs()).sum::<f64>() / n,
            Self::R2 => {
                let mean = rows.iter().map(|(y, _)| y).sum::<f64>() / n;
                let sst: f64 = rows.iter().map(|(y, _)| (y - mean).powi(2)).sum();
                if sst == 0.0 {
                    if sse == 0.0 { 1.0 } else { 0.0 }
                } else {
                    1.0 - sse / sst
                }
            }
        }
    }
}

fn default_params() -> ParamMap {
    ParamMap::new()
        .with("metricName", "rmse")
        .with("labelCol", "label")
        .with("predictionCol", "prediction")
}

/// Scores a prediction column against a label column
pub struct RegressionEvaluator {
    uid: String,
    params: ParamMap,
}

impl RegressionEvaluator {
    pub const IDENTITY: &'static str = "valsplit.RegressionEvaluator";

    pub fn new() -> Self {
        Self::with_uid(random_uid("regEval"))
    }

    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            params: default_params(),
        }
    }

    pub fn with_metric(self, metric: RegressionMetric) -> Self {
        self.with_params(&ParamMap::new().with("metricName", metric.name()))
    }

    pub fn with_params(mut self, params: &ParamMap) -> Self {
        self.params = self.params.merged(params);
        self
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    /// Configured metric, if the `metricName` param names a known one
    pub fn metric(&self) -> Option<RegressionMetric> {
        self.params.get_str("metricName").and_then(RegressionMetric::parse)
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let metadata = read_metadata_expecting(path, Self::IDENTITY)?;
        let params: ParamMap = metadata.params_as()?;
        Ok(Self::with_uid(metadata.uid).with_params(&params))
    }

    fn column_name(&self, name: &str) -> Result<&str> {
        match self.params.get_str(name) {
            Some(v) => Ok(v),
            None => bail!("param '{}' must be a string", name),
        }
    }
}

impl Default for RegressionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for RegressionEvaluator {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn evaluate(&self, predictions: &DataFrame) -> Result<f64> {
        let Some(metric) = self.metric() else {
            bail!("unknown metricName {:?}", self.params.get("metricName"));
        };
        let labels = f64_column(predictions, self.column_name("labelCol")?)?;
        let predicted = f64_column(predictions, self.column_name("predictionCol")?)?;
        let rows = paired(&labels, &predicted);
        if rows.is_empty() {
            bail!("cannot evaluate {} on a dataset with no complete rows", metric.name());
        }
        Ok(metric.compute(&rows))
    }

    fn is_larger_better(&self) -> bool {
        self.metric().map(|m| m.is_larger_better()).unwrap_or(false)
    }

    fn copy(&self, extra: &ParamMap) -> Arc<dyn Evaluator> {
        Arc::new(Self::with_uid(self.uid.clone()).with_params(&self.params.merged(extra)))
    }

    fn as_persistable(&self) -> Option<&dyn Persistable> {
        Some(self)
    }
}

impl Persistable for RegressionEvaluator {
    fn identity(&self) -> &'static str {
        Self::IDENTITY
    }

    fn ensure_persistable(&self, _options: &SaveOptions) -> crate::Result<()> {
        require_finite_params(&self.params, &self.uid)
    }

    fn save_to(&self, path: &Path, options: &SaveOptions) -> crate::Result<()> {
        let params = serde_json::to_value(&self.params)?;
        let params = params.as_object().cloned().unwrap_or_default();
        write_metadata(path, &Metadata::new(Self::IDENTITY, &self.uid, params), options)
    }
}
