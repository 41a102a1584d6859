pub mod linear;
pub mod regression;
pub mod traits;

pub use linear::{LinearRegression, LinearRegressionModel};
pub use regression::{RegressionEvaluator, RegressionMetric};
pub use traits::{Estimator, Evaluator, Model};

use polars::prelude::*;

/// Reads a numeric column as f64, keeping nulls
pub(crate) fn f64_column(df: &DataFrame, name: &str) -> anyhow::Result<Vec<Option<f64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

/// Pairs two equally long columns, dropping rows where either side is null
pub(crate) fn paired(a: &[Option<f64>], b: &[Option<f64>]) -> Vec<(f64, f64)> {
    a.iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect()
}
