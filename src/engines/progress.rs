use crate::types::{ParamMap, SelectionResult};
use std::sync::mpsc::Sender;

/// Receives diagnostic events from a validation run.
///
/// Observers see events in run order and cannot influence the run.
pub trait ValidationObserver: Send + Sync {
    fn on_split(&self, _train_rows: usize, _validation_rows: usize) {}
    fn on_candidate_scored(&self, _index: usize, _metric: f64, _params: &ParamMap) {}
    fn on_scoring_complete(&self, _metrics: &[f64]) {}
    fn on_selection(&self, _selection: &SelectionResult, _params: &ParamMap) {}
}

/// Writes every event through the `log` facade
pub struct LoggingObserver;

impl ValidationObserver for LoggingObserver {
    fn on_split(&self, train_rows: usize, validation_rows: usize) {
        log::debug!(
            "Split dataset into {} training and {} validation rows",
            train_rows,
            validation_rows
        );
    }

    fn on_candidate_scored(&self, index: usize, metric: f64, params: &ParamMap) {
        log::debug!("Got metric {} for candidate {} trained with {}", metric, index, params);
    }

    fn on_scoring_complete(&self, metrics: &[f64]) {
        log::info!("Train validation split metrics: {:?}", metrics);
    }

    fn on_selection(&self, selection: &SelectionResult, params: &ParamMap) {
        log::info!("Best set of parameters: {}", params);
        log::info!(
            "Best train validation split metric: {} (candidate {})",
            selection.best_metric,
            selection.best_index
        );
    }
}

/// Ignores every event
pub struct SilentObserver;

impl ValidationObserver for SilentObserver {}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationEvent {
    Split { train_rows: usize, validation_rows: usize },
    CandidateScored { index: usize, metric: f64, params: ParamMap },
    ScoringComplete { metrics: Vec<f64> },
    Selected { selection: SelectionResult, params: ParamMap },
}

/// Forwards events over a channel. Send failures are dropped.
pub struct ChannelObserver {
    sender: Sender<ValidationEvent>,
}

impl ChannelObserver {
    pub fn new(sender: Sender<ValidationEvent>) -> Self {
        Self { sender }
    }
}

impl ValidationObserver for ChannelObserver {
    fn on_split(&self, train_rows: usize, validation_rows: usize) {
        let _ = self.sender.send(ValidationEvent::Split {
            train_rows,
            validation_rows,
        });
    }

    fn on_candidate_scored(&self, index: usize, metric: f64, params: &ParamMap) {
        let _ = self.sender.send(ValidationEvent::CandidateScored {
            index,
            metric,
            params: params.clone(),
        });
    }

    fn on_scoring_complete(&self, metrics: &[f64]) {
        let _ = self.sender.send(ValidationEvent::ScoringComplete {
            metrics: metrics.to_vec(),
        });
    }

    fn on_selection(&self, selection: &SelectionResult, params: &ParamMap) {
        let _ = self.sender.send(ValidationEvent::Selected {
            selection: *selection,
            params: params.clone(),
        });
    }
}
