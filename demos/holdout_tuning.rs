//! Tunes the regularisation of a linear regression on a single holdout split,
//! saves the fitted artifact and loads it back.
//!
//! Run with `RUST_LOG=info cargo run --example holdout_tuning`.

use polars::prelude::*;
use std::sync::Arc;
use valsplit::components::{LinearRegression, RegressionEvaluator, RegressionMetric};
use valsplit::config::ConfigManager;
use valsplit::{LoaderRegistry, ParamGridBuilder, SaveOptions, TrainValidationSplit, TrainValidationSplitModel};

const SETTINGS: &str = r#"
[split]
train_ratio = 0.8
seed = 2024

[persistence]
overwrite = true
"#;

fn synthetic(rows: usize) -> PolarsResult<DataFrame> {
    let x: Vec<f64> = (0..rows).map(|i| i as f64 * 0.05).collect();
    let y: Vec<f64> = x
        .iter()
        .enumerate()
        .map(|(i, x)| 1.7 * x + 4.0 + ((i * 7919) % 13) as f64 * 0.02 - 0.12)
        .collect();
    df!("features" => x, "label" => y)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let workdir = tempfile::tempdir()?;
    let settings_path = workdir.path().join("valsplit.toml");
    std::fs::write(&settings_path, SETTINGS)?;

    let manager = ConfigManager::new();
    manager.load_from_file(&settings_path)?;
    let settings = manager.get();

    let data = synthetic(1_000)?;
    let grid = ParamGridBuilder::new()
        .add_grid("regParam", [0.0, 0.01, 0.1, 1.0])
        .add_grid("fitIntercept", [true, false])
        .build();

    let tvs = TrainValidationSplit::builder()
        .estimator(Arc::new(LinearRegression::new()))
        .evaluator(Arc::new(
            RegressionEvaluator::new().with_metric(RegressionMetric::Rmse),
        ))
        .param_grid(grid)
        .config(&settings.split)
        .build()?;

    let model = tvs.fit(&data)?;
    for (params, metric) in model.param_grid().iter().zip(model.validation_metrics()) {
        println!("{:<45} rmse={:.5}", params.to_string(), metric);
    }
    println!("best: {}", model.best_params());

    let artifact = workdir.path().join("model");
    model.save_with(&artifact, &SaveOptions::from(&settings.persistence))?;
    let restored = TrainValidationSplitModel::load(&artifact, &LoaderRegistry::new())?;

    let predictions = restored.transform(&data.head(Some(5)))?;
    println!("{}", predictions);
    Ok(())
}
