use super::traits::{Estimator, Model};
use super::{f64_column, paired};
use crate::persistence::{
    read_metadata_expecting, require_finite, require_finite_params, write_metadata, Metadata,
    Persistable, SaveOptions,
};
use crate::types::{random_uid, ParamMap};
use anyhow::{bail, Result};
use polars::prelude::*;
use rayon::prelude::*;
use serde_json::{json, Map};
use std::path::Path;
use std::sync::Arc;

fn default_params() -> ParamMap {
    ParamMap::new()
        .with("featuresCol", "features")
        .with("labelCol", "label")
        .with("predictionCol", "prediction")
        .with("regParam", 0.0)
        .with("fitIntercept", true)
}

/// Typed view of the params a linear regression understands
#[derive(Debug, Clone, PartialEq)]
struct LinearSettings {
    features_col: String,
    label_col: String,
    prediction_col: String,
    reg_param: f64,
    fit_intercept: bool,
}

impl LinearSettings {
    fn resolve(params: &ParamMap) -> Result<Self> {
        let text = |name: &str| -> Result<String> {
            match params.get_str(name) {
                Some(v) => Ok(v.to_string()),
                None => bail!("param '{}' must be a string", name),
            }
        };
        let reg_param = match params.get_f64("regParam") {
            Some(v) if v >= 0.0 => v,
            Some(v) => bail!("regParam must be non-negative, got {}", v),
            None => bail!("param 'regParam' must be numeric"),
        };
        let fit_intercept = match params.get_bool("fitIntercept") {
            Some(v) => v,
            None => bail!("param 'fitIntercept' must be a bool"),
        };

        Ok(Self {
            features_col: text("featuresCol")?,
            label_col: text("labelCol")?,
            prediction_col: text("predictionCol")?,
            reg_param,
            fit_intercept,
        })
    }
}

/// Ridge regression of one numeric label column on one numeric feature column
pub struct LinearRegression {
    uid: String,
    params: ParamMap,
}

impl LinearRegression {
    pub const IDENTITY: &'static str = "valsplit.LinearRegression";

    pub fn new() -> Self {
        Self::with_uid(random_uid("linReg"))
    }

    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            params: default_params(),
        }
    }

    pub fn with_params(mut self, params: &ParamMap) -> Self {
        self.params = self.params.merged(params);
        self
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let metadata = read_metadata_expecting(path, Self::IDENTITY)?;
        let params: ParamMap = metadata.params_as()?;
        Ok(Self::with_uid(metadata.uid).with_params(&params))
    }

    fn train(&self, dataset: &DataFrame, extra: &ParamMap) -> Result<LinearRegressionModel> {
        let params = self.params.merged(extra);
        let settings = LinearSettings::resolve(&params)?;

        let x = f64_column(dataset, &settings.features_col)?;
        let y = f64_column(dataset, &settings.label_col)?;
        let rows = paired(&x, &y);
        if rows.is_empty() {
            bail!("cannot fit {} on a dataset with no complete rows", self.uid);
        }

        let n = rows.len() as f64;
        let (x_mean, y_mean) = if settings.fit_intercept {
            (
                rows.iter().map(|(x, _)| x).sum::<f64>() / n,
                rows.iter().map(|(_, y)| y).sum::<f64>() / n,
            )
        } else {
            (0.0, 0.0)
        };

        let sxx: f64 = rows.iter().map(|(x, _)| (x - x_mean).powi(2)).sum();
        let sxy: f64 = rows.iter().map(|(x, y)| (x - x_mean) * (y - y_mean)).sum();
        let denominator = sxx + settings.reg_param * n;
        let coefficient = if denominator > 0.0 { sxy / denominator } else { 0.0 };
        let intercept = y_mean - coefficient * x_mean;

        log::trace!(
            "{} fitted on {} rows: coefficient={:.6}, intercept={:.6}",
            self.uid,
            rows.len(),
            coefficient,
            intercept
        );

        Ok(LinearRegressionModel::new(
            self.uid.clone(),
            coefficient,
            intercept,
            params,
        ))
    }
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for LinearRegression {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn fit(&self, dataset: &DataFrame, params: &ParamMap) -> Result<Box<dyn Model>> {
        Ok(Box::new(self.train(dataset, params)?))
    }

    fn fit_many(&self, dataset: &DataFrame, grid: &[ParamMap]) -> Result<Vec<Box<dyn Model>>> {
        grid.par_iter()
            .map(|params| self.fit(dataset, params))
            .collect()
    }

    fn copy(&self, extra: &ParamMap) -> Arc<dyn Estimator> {
        Arc::new(Self::with_uid(self.uid.clone()).with_params(&self.params.merged(extra)))
    }

    fn as_persistable(&self) -> Option<&dyn Persistable> {
        Some(self)
    }
}

impl Persistable for LinearRegression {
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

/// Fitted `prediction = coefficient * feature + intercept`
#[derive(Debug, Clone)]
pub struct LinearRegressionModel {
    uid: String,
    coefficient: f64,
    intercept: f64,
    params: ParamMap,
}

impl LinearRegressionModel {
    pub const IDENTITY: &'static str = "valsplit.LinearRegressionModel";

    pub fn new(uid: impl Into<String>, coefficient: f64, intercept: f64, params: ParamMap) -> Self {
        Self {
            uid: uid.into(),
            coefficient,
            intercept,
            params: default_params().merged(&params),
        }
    }

    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let metadata = read_metadata_expecting(path, Self::IDENTITY)?;
        let params: ParamMap = metadata.params_as()?;
        let coefficient: f64 = metadata.require_extra("coefficient")?;
        let intercept: f64 = metadata.require_extra("intercept")?;
        Ok(Self::new(metadata.uid, coefficient, intercept, params))
    }
}

impl Model for LinearRegressionModel {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn transform(&self, dataset: &DataFrame) -> Result<DataFrame> {
        let settings = LinearSettings::resolve(&self.params)?;
        let x = f64_column(dataset, &settings.features_col)?;
        let predictions: Vec<Option<f64>> = x
            .iter()
            .map(|v| v.map(|v| self.coefficient * v + self.intercept))
            .collect();

        let mut out = dataset.clone();
        out.with_column(Series::new(
            settings.prediction_col.as_str().into(),
            predictions,
        ))?;
        Ok(out)
    }

    fn copy(&self, extra: &ParamMap) -> Box<dyn Model> {
        Box::new(Self::new(
            self.uid.clone(),
            self.coefficient,
            self.intercept,
            self.params.merged(extra),
        ))
    }

    fn as_persistable(&self) -> Option<&dyn Persistable> {
        Some(self)
    }
}

impl Persistable for LinearRegressionModel {
    fn identity(&self) -> &'static str {
        Self::IDENTITY
    }

    fn ensure_persistable(&self, _options: &SaveOptions) -> crate::Result<()> {
        require_finite_params(&self.params, &self.uid)?;
        require_finite(self.coefficient, "coefficient", &self.uid)?;
        require_finite(self.intercept, "intercept", &self.uid)
    }

    fn save_to(&self, path: &Path, options: &SaveOptions) -> crate::Result<()> {
        let params = serde_json::to_value(&self.params)?;
        let params = params.as_object().cloned().unwrap_or_default();
        let mut extra = Map::new();
        extra.insert("coefficient".to_string(), json!(self.coefficient));
        extra.insert("intercept".to_string(), json!(self.intercept));
        let metadata = Metadata::new(Self::IDENTITY, &self.uid, params).with_extra(extra);
        write_metadata(path, &metadata, options)
    }
}
