use crate::components::traits::{Estimator, Evaluator, Model};
use crate::engines::progress::ValidationObserver;
use crate::engines::splitting::SplitDataset;
use crate::error::{Result, ValsplitError};
use crate::types::ParamMap;

/// Index-aligned outcome of scoring every candidate
pub struct CandidateScores {
    pub metrics: Vec<f64>,
    /// Every candidate model, kept only when requested
    pub models: Option<Vec<Box<dyn Model>>>,
}

/// Fits one model per candidate on the training partition and scores each
/// on the validation partition.
///
/// The evaluator is shared across candidates as given. Only the model's
/// transform receives the candidate's params.
pub struct CandidateEvaluator<'a> {
    estimator: &'a dyn Estimator,
    evaluator: &'a dyn Evaluator,
    observer: &'a dyn ValidationObserver,
}

impl<'a> CandidateEvaluator<'a> {
    pub fn new(
        estimator: &'a dyn Estimator,
        evaluator: &'a dyn Evaluator,
        observer: &'a dyn ValidationObserver,
    ) -> Self {
        Self {
            estimator,
            evaluator,
            observer,
        }
    }

    /// Consumes the split: the training partition is dropped once every model
    /// is fitted, the validation partition once every model is scored.
    pub fn evaluate(
        &self,
        split: SplitDataset,
        grid: &[ParamMap],
        keep_models: bool,
    ) -> Result<CandidateScores> {
        let (train, validation) = split.into_parts();

        let models = self.estimator.fit_many(&train, grid)?;
        drop(train);

        if models.len() != grid.len() {
            return Err(ValsplitError::Execution(anyhow::anyhow!(
                "estimator {} returned {} models for {} candidates",
                self.estimator.uid(),
                models.len(),
                grid.len()
            )));
        }

        let mut metrics = Vec::with_capacity(grid.len());
        for (index, (model, params)) in models.iter().zip(grid).enumerate() {
            let predictions = model.transform_with(&validation, params)?;
            let metric = self.evaluator.evaluate(&predictions)?;
            self.observer.on_candidate_scored(index, metric, params);
            metrics.push(metric);
        }
        drop(validation);

        self.observer.on_scoring_complete(&metrics);

        Ok(CandidateScores {
            metrics,
            models: keep_models.then_some(models),
        })
    }
}
