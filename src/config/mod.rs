pub mod manager;
pub mod persistence;
pub mod split;
pub mod traits;

pub use manager::{AppConfig, ConfigManager};
pub use persistence::PersistenceConfig;
pub use split::{validate_train_ratio, SplitConfig, DEFAULT_TRAIN_RATIO};
pub use traits::ConfigSection;
