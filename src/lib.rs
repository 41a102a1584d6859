//! Hyperparameter selection by a single train/validation split.
//!
//! A [`TrainValidationSplit`] randomly partitions a dataset once, fits one
//! model per candidate param map on the training rows, scores each on the
//! validation rows and refits the best candidate on the whole dataset. The
//! resulting [`TrainValidationSplitModel`] and the unfitted pipeline can both
//! be saved to a directory and loaded back through a [`LoaderRegistry`].

pub mod components;
pub mod config;
pub mod engines;
pub mod error;
pub mod persistence;
pub mod types;

pub use components::{Estimator, Evaluator, Model};
pub use engines::validation::{
    configure, TrainValidationSplit, TrainValidationSplitBuilder, TrainValidationSplitModel,
};
pub use error::{Result, ValsplitError};
pub use persistence::{LoaderRegistry, SaveOptions};
pub use types::{ParamGrid, ParamGridBuilder, ParamMap, ParamValue, SelectionResult};
