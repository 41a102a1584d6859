use crate::components::traits::{Estimator, Model};
use crate::error::Result;
use crate::types::ParamMap;
use polars::prelude::*;

/// Retrains the winning params on the complete dataset.
///
/// The model fitted during selection only saw the training partition and is
/// not reused for the final artifact.
pub fn refit_best(
    estimator: &dyn Estimator,
    dataset: &DataFrame,
    best_params: &ParamMap,
) -> Result<Box<dyn Model>> {
    log::debug!(
        "Refitting {} on all {} rows with {}",
        estimator.uid(),
        dataset.height(),
        best_params
    );
    Ok(estimator.fit(dataset, best_params)?)
}
