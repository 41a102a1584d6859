use anyhow::Result as AnyResult;
use polars::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use valsplit::components::{LinearRegression, LinearRegressionModel, RegressionEvaluator};
use valsplit::persistence::{
    read_metadata, read_metadata_expecting, write_metadata, Metadata, Persistable,
};
use valsplit::{
    configure, Estimator, Evaluator, LoaderRegistry, Model, ParamGridBuilder, ParamMap,
    SaveOptions, TrainValidationSplit, TrainValidationSplitModel, ValsplitError,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn data() -> DataFrame {
    let x: Vec<f64> = (0..200).map(|i| i as f64 / 4.0).collect();
    let y: Vec<f64> = x
        .iter()
        .enumerate()
        .map(|(i, x)| 0.5 * x - 3.0 + if i % 3 == 0 { 0.1 } else { -0.05 })
        .collect();
    df!("features" => x, "label" => y).unwrap()
}

fn pipeline(collect_sub_models: bool) -> TrainValidationSplit {
    TrainValidationSplit::builder()
        .uid("tvs_roundtrip")
        .estimator(Arc::new(LinearRegression::with_uid("linReg_roundtrip")))
        .evaluator(Arc::new(RegressionEvaluator::with_uid("regEval_roundtrip")))
        .param_grid(ParamGridBuilder::new().add_grid("regParam", [0.0, 2.0]).build())
        .train_ratio(0.6)
        .seed(17)
        .collect_sub_models(collect_sub_models)
        .build()
        .unwrap()
}

fn metadata_json(dir: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(dir.join("metadata")).unwrap()).unwrap()
}

/// An estimator with no persistence support
struct Ephemeral;

impl Estimator for Ephemeral {
    fn uid(&self) -> &str {
        "ephemeral"
    }

    fn fit(&self, dataset: &DataFrame, params: &ParamMap) -> AnyResult<Box<dyn Model>> {
        LinearRegression::with_uid("inner").fit(dataset, params)
    }

    fn copy(&self, _extra: &ParamMap) -> Arc<dyn Estimator> {
        Arc::new(Ephemeral)
    }
}

#[test]
fn test_model_round_trip() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let model = pipeline(false).fit(&data()).unwrap();
    model.save(dir.path()).unwrap();

    let loaded = TrainValidationSplitModel::load(dir.path(), &LoaderRegistry::new()).unwrap();
    assert_eq!(loaded.uid(), "tvs_roundtrip");
    assert_eq!(loaded.train_ratio(), 0.6);
    assert_eq!(loaded.seed(), Some(17));
    assert_eq!(loaded.validation_metrics(), model.validation_metrics());
    assert_eq!(loaded.selection(), model.selection());
    assert_eq!(loaded.best_params(), model.best_params());
    assert_eq!(loaded.param_grid(), model.param_grid());
    assert_eq!(loaded.estimator().uid(), "linReg_roundtrip");
    assert_eq!(loaded.evaluator().uid(), "regEval_roundtrip");
    assert_eq!(loaded.best_model().uid(), model.best_model().uid());

    let expected = model.transform(&data()).unwrap();
    let actual = loaded.transform(&data()).unwrap();
    assert!(expected.equals_missing(&actual));
}

#[test]
fn test_model_layout_on_disk() {
    init_logging();
    let dir = TempDir::new().unwrap();
    pipeline(false).fit(&data()).unwrap().save(dir.path()).unwrap();

    for sub in ["metadata", "estimator/metadata", "evaluator/metadata", "bestModel/metadata"] {
        assert!(dir.path().join(sub).is_file(), "missing {}", sub);
    }
    assert!(!dir.path().join("subModels").exists());

    let doc = metadata_json(dir.path());
    assert_eq!(doc["class"], TrainValidationSplitModel::IDENTITY);
    assert_eq!(doc["uid"], "tvs_roundtrip");
    assert_eq!(doc["paramMap"]["trainRatio"], 0.6);
    assert_eq!(doc["paramMap"]["estimator"]["class"], LinearRegression::IDENTITY);
    assert_eq!(doc["paramMap"]["estimatorParamMaps"].as_array().unwrap().len(), 2);
    assert_eq!(doc["validationMetrics"].as_array().unwrap().len(), 2);
}

#[test]
fn test_pipeline_round_trip() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let tvs = pipeline(true);
    tvs.save(dir.path()).unwrap();

    let loaded = TrainValidationSplit::load(dir.path(), &LoaderRegistry::new()).unwrap();
    assert_eq!(loaded.uid(), tvs.uid());
    assert_eq!(loaded.train_ratio(), 0.6);
    assert_eq!(loaded.seed(), Some(17));
    assert!(loaded.collect_sub_models());
    assert_eq!(loaded.param_grid(), tvs.param_grid());

    let original = tvs.fit(&data()).unwrap();
    let reloaded = loaded.fit(&data()).unwrap();
    assert_eq!(original.validation_metrics(), reloaded.validation_metrics());
}

#[test]
fn test_altered_class_is_read_error() {
    init_logging();
    let dir = TempDir::new().unwrap();
    pipeline(false).fit(&data()).unwrap().save(dir.path()).unwrap();

    let mut metadata = read_metadata(dir.path()).unwrap();
    metadata.class = "valsplit.SomethingElse".to_string();
    write_metadata(dir.path(), &metadata, &SaveOptions::default()).unwrap();

    let err = TrainValidationSplitModel::load(dir.path(), &LoaderRegistry::new())
        .err()
        .unwrap();
    assert!(matches!(err, ValsplitError::PersistenceRead(_)));
}

#[test]
fn test_loading_pipeline_from_model_dir_fails() {
    init_logging();
    let dir = TempDir::new().unwrap();
    pipeline(false).fit(&data()).unwrap().save(dir.path()).unwrap();

    let err = TrainValidationSplit::load(dir.path(), &LoaderRegistry::new())
        .err()
        .unwrap();
    assert!(matches!(err, ValsplitError::PersistenceRead(_)));
}

#[test]
fn test_missing_best_model_is_read_error() {
    init_logging();
    let dir = TempDir::new().unwrap();
    pipeline(false).fit(&data()).unwrap().save(dir.path()).unwrap();
    fs::remove_dir_all(dir.path().join("bestModel")).unwrap();

    let err = TrainValidationSplitModel::load(dir.path(), &LoaderRegistry::new())
        .err()
        .unwrap();
    assert!(matches!(err, ValsplitError::PersistenceRead(_)));
}

#[test]
fn test_mismatched_estimator_reference_is_read_error() {
    init_logging();
    let dir = TempDir::new().unwrap();
    pipeline(false).save(dir.path()).unwrap();

    let estimator_dir = dir.path().join("estimator");
    let mut metadata = read_metadata(&estimator_dir).unwrap();
    metadata.uid = "linReg_other".to_string();
    write_metadata(&estimator_dir, &metadata, &SaveOptions::default()).unwrap();

    let err = TrainValidationSplit::load(dir.path(), &LoaderRegistry::new())
        .err()
        .unwrap();
    assert!(matches!(err, ValsplitError::PersistenceRead(_)));
}

#[test]
fn test_metric_count_mismatch_is_read_error() {
    init_logging();
    let dir = TempDir::new().unwrap();
    pipeline(false).fit(&data()).unwrap().save(dir.path()).unwrap();

    let mut metadata = read_metadata(dir.path()).unwrap();
    metadata
        .extra
        .insert("validationMetrics".to_string(), serde_json::json!([1.0]));
    write_metadata(dir.path(), &metadata, &SaveOptions::default()).unwrap();

    let err = TrainValidationSplitModel::load(dir.path(), &LoaderRegistry::new())
        .err()
        .unwrap();
    assert!(matches!(err, ValsplitError::PersistenceRead(_)));
}

#[test]
fn test_non_persistable_estimator_is_write_error() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("artifact");
    let tvs = configure(
        Arc::new(Ephemeral),
        Arc::new(RegressionEvaluator::new()),
        ParamGridBuilder::new().add_grid("regParam", [0.0]).build(),
        0.75,
    )
    .unwrap();

    let err = tvs.save(&target).err().unwrap();
    assert!(matches!(err, ValsplitError::PersistenceWrite(_)));
    assert!(!target.exists());

    let model = tvs.fit(&data()).unwrap();
    let err = model.save(&target).err().unwrap();
    assert!(matches!(err, ValsplitError::PersistenceWrite(_)));
    assert!(!target.exists());
}

#[test]
fn test_existing_target_requires_overwrite() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let model = pipeline(false).fit(&data()).unwrap();
    model.save(dir.path()).unwrap();

    let err = model.save(dir.path()).err().unwrap();
    assert!(matches!(err, ValsplitError::PersistenceWrite(_)));

    fs::write(dir.path().join("stale"), "left over").unwrap();
    model
        .save_with(dir.path(), &SaveOptions::default().overwrite())
        .unwrap();
    assert!(!dir.path().join("stale").exists());
    TrainValidationSplitModel::load(dir.path(), &LoaderRegistry::new()).unwrap();
}

#[test]
fn test_sub_models_round_trip() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let model = pipeline(true).fit(&data()).unwrap();
    model
        .save_with(dir.path(), &SaveOptions::default().with_sub_models())
        .unwrap();

    assert!(dir.path().join("subModels/0/metadata").is_file());
    assert!(dir.path().join("subModels/1/metadata").is_file());

    let loaded = TrainValidationSplitModel::load(dir.path(), &LoaderRegistry::new()).unwrap();
    let sub_models = loaded.sub_models().unwrap();
    assert_eq!(sub_models.len(), 2);

    let original = model.sub_models().unwrap();
    for (a, b) in original.iter().zip(sub_models) {
        let expected = a.transform(&data()).unwrap();
        let actual = b.transform(&data()).unwrap();
        assert!(expected.equals_missing(&actual));
    }
}

#[test]
fn test_sub_models_not_collected_cannot_be_persisted() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("artifact");
    let model = pipeline(false).fit(&data()).unwrap();

    let err = model
        .save_with(&target, &SaveOptions::default().with_sub_models())
        .err()
        .unwrap();
    assert!(matches!(err, ValsplitError::PersistenceWrite(_)));
    assert!(!target.exists());
}

#[test]
fn test_nested_pipeline_round_trip() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let inner = configure(
        Arc::new(LinearRegression::new()),
        Arc::new(RegressionEvaluator::new()),
        ParamGridBuilder::new().add_grid("regParam", [0.0, 1.0]).build(),
        0.7,
    )
    .unwrap();
    let outer = configure(
        Arc::new(inner),
        Arc::new(RegressionEvaluator::new()),
        vec![ParamMap::new()],
        0.8,
    )
    .unwrap();

    let model = outer.fit(&data()).unwrap();
    model.save(dir.path()).unwrap();
    assert!(dir.path().join("estimator/estimator/metadata").is_file());
    assert!(dir.path().join("bestModel/bestModel/metadata").is_file());

    let loaded = TrainValidationSplitModel::load(dir.path(), &LoaderRegistry::new()).unwrap();
    assert_eq!(loaded.estimator().uid(), outer.estimator().uid());
    let expected = model.transform(&data()).unwrap();
    let actual = loaded.transform(&data()).unwrap();
    assert!(expected.equals_missing(&actual));
}

/// Externally defined model persisted under its own identity
struct Shifted {
    offset: f64,
}

impl Shifted {
    const IDENTITY: &'static str = "external.Shifted";

    fn load(path: &Path) -> valsplit::Result<Self> {
        let metadata = read_metadata(path)?;
        let offset: f64 = metadata.param("offset")?;
        Ok(Shifted { offset })
    }
}

impl Model for Shifted {
    fn uid(&self) -> &str {
        "shifted"
    }

    fn transform(&self, dataset: &DataFrame) -> AnyResult<DataFrame> {
        let mut out = dataset.clone();
        let shifted = dataset.column("features")?.as_materialized_series() + self.offset;
        out.with_column(shifted.with_name("prediction".into()))?;
        Ok(out)
    }

    fn copy(&self, _extra: &ParamMap) -> Box<dyn Model> {
        Box::new(Shifted {
            offset: self.offset,
        })
    }

    fn as_persistable(&self) -> Option<&dyn Persistable> {
        Some(self)
    }
}

impl Persistable for Shifted {
    fn identity(&self) -> &'static str {
        Self::IDENTITY
    }

    fn save_to(&self, path: &Path, options: &SaveOptions) -> valsplit::Result<()> {
        let mut params = serde_json::Map::new();
        params.insert("offset".to_string(), serde_json::json!(self.offset));
        write_metadata(path, &Metadata::new(Self::IDENTITY, "shifted", params), options)
    }
}

#[test]
fn test_registered_external_loader() {
    init_logging();
    let dir = TempDir::new().unwrap();
    valsplit::persistence::save(&Shifted { offset: 1.5 }, dir.path(), &SaveOptions::default())
        .unwrap();

    let err = LoaderRegistry::new().load_model(dir.path()).err().unwrap();
    assert!(matches!(err, ValsplitError::PersistenceRead(_)));

    let mut registry = LoaderRegistry::new();
    registry.register_model(Shifted::IDENTITY, |path, _| Ok(Box::new(Shifted::load(path)?)));
    let loaded = registry.load_model(dir.path()).unwrap();
    let out = loaded.transform(&data()).unwrap();
    let first = out
        .column("prediction")
        .unwrap()
        .as_materialized_series()
        .f64()
        .unwrap()
        .get(0);
    assert_eq!(first, Some(1.5));
}

#[test]
fn test_linear_model_metadata_is_plain_json() {
    let dir = TempDir::new().unwrap();
    let model = LinearRegressionModel::new("lr_json", 1.0, 0.0, ParamMap::new());
    valsplit::persistence::save(&model, dir.path(), &SaveOptions::default()).unwrap();

    let doc = metadata_json(dir.path());
    assert_eq!(doc["class"], LinearRegressionModel::IDENTITY);
    assert_eq!(doc["coefficient"], 1.0);
    assert!(doc["timestamp"].as_i64().unwrap() > 0);
}

#[test]
fn test_non_finite_grid_value_is_write_error() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("artifact");
    let tvs = configure(
        Arc::new(LinearRegression::new()),
        Arc::new(RegressionEvaluator::new()),
        ParamGridBuilder::new()
            .add_grid("regParam", [0.0, f64::INFINITY])
            .build(),
        0.75,
    )
    .unwrap();

    let err = tvs.save(&target).err().unwrap();
    assert!(matches!(err, ValsplitError::PersistenceWrite(_)));
    assert!(!target.exists());

    let model = tvs.fit(&data()).unwrap();
    let err = model.save(&target).err().unwrap();
    assert!(matches!(err, ValsplitError::PersistenceWrite(_)));
    assert!(!target.exists());
}

/// Scores a near-perfect fit as infinitely good, anything else by its rmse
struct ThresholdEvaluator {
    uid: String,
    rmse: RegressionEvaluator,
}

impl ThresholdEvaluator {
    const IDENTITY: &'static str = "external.ThresholdEvaluator";

    fn with_uid(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            rmse: RegressionEvaluator::new(),
        }
    }

    fn load(path: &Path) -> valsplit::Result<Self> {
        let metadata = read_metadata_expecting(path, Self::IDENTITY)?;
        Ok(Self::with_uid(&metadata.uid))
    }
}

impl Evaluator for ThresholdEvaluator {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn evaluate(&self, predictions: &DataFrame) -> AnyResult<f64> {
        let rmse = self.rmse.evaluate(predictions)?;
        Ok(if rmse < 1.0 { f64::INFINITY } else { rmse })
    }

    fn is_larger_better(&self) -> bool {
        true
    }

    fn copy(&self, _extra: &ParamMap) -> Arc<dyn Evaluator> {
        Arc::new(Self::with_uid(&self.uid))
    }

    fn as_persistable(&self) -> Option<&dyn Persistable> {
        Some(self)
    }
}

impl Persistable for ThresholdEvaluator {
    fn identity(&self) -> &'static str {
        Self::IDENTITY
    }

    fn save_to(&self, path: &Path, options: &SaveOptions) -> valsplit::Result<()> {
        let metadata = Metadata::new(Self::IDENTITY, &self.uid, serde_json::Map::new());
        write_metadata(path, &metadata, options)
    }
}

#[test]
fn test_infinite_metric_keeps_winner_after_load() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let tvs = TrainValidationSplit::builder()
        .estimator(Arc::new(LinearRegression::new()))
        .evaluator(Arc::new(ThresholdEvaluator::with_uid("threshold")))
        .param_grid(ParamGridBuilder::new().add_grid("regParam", [0.0, 1e6]).build())
        .train_ratio(0.6)
        .seed(5)
        .build()
        .unwrap();

    let model = tvs.fit(&data()).unwrap();
    assert_eq!(model.validation_metrics()[0], f64::INFINITY);
    assert!(model.validation_metrics()[1].is_finite());
    assert_eq!(model.selection().best_index, 0);
    model.save(dir.path()).unwrap();

    let mut registry = LoaderRegistry::new();
    registry.register_evaluator(ThresholdEvaluator::IDENTITY, |path, _| {
        Ok(Arc::new(ThresholdEvaluator::load(path)?))
    });
    let loaded = TrainValidationSplitModel::load(dir.path(), &registry).unwrap();
    assert_eq!(loaded.validation_metrics(), model.validation_metrics());
    assert_eq!(loaded.selection(), model.selection());
    assert_eq!(loaded.best_params(), model.best_params());
}
