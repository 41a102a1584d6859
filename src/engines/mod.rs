pub mod evaluation;
pub mod progress;
pub mod refit;
pub mod selection;
pub mod splitting;
pub mod validation;
