pub mod base;
pub mod random;
pub mod types;

pub use base::DataSplitter;
pub use random::RandomSplitter;
pub use types::SplitDataset;
