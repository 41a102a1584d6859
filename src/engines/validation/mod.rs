pub mod model;
pub mod params;
pub mod train_validation;

pub use model::TrainValidationSplitModel;
pub use params::ValidatorParams;
pub use train_validation::{configure, TrainValidationSplit, TrainValidationSplitBuilder};
