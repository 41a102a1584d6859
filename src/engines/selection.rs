use crate::error::ValsplitError;
use crate::types::SelectionResult;

/// Picks the best score in index order.
///
/// The first index reaching the extremum wins. NaN never beats a number.
pub fn select_best(
    metrics: &[f64],
    is_larger_better: bool,
) -> Result<SelectionResult, ValsplitError> {
    let (&first, rest) = metrics.split_first().ok_or_else(|| {
        ValsplitError::Configuration("cannot select from an empty metric vector".to_string())
    })?;

    let mut best = SelectionResult {
        best_index: 0,
        best_metric: first,
    };

    for (offset, &metric) in rest.iter().enumerate() {
        let improves = if best.best_metric.is_nan() {
            !metric.is_nan()
        } else if is_larger_better {
            metric > best.best_metric
        } else {
            metric < best.best_metric
        };
        if improves {
            best = SelectionResult {
                best_index: offset + 1,
                best_metric: metric,
            };
        }
    }

    Ok(best)
}
