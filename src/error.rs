use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValsplitError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failure raised by an estimator, evaluator or model while fitting,
    /// scoring or refitting. The collaborator's error is passed through as is.
    #[error(transparent)]
    Execution(#[from] anyhow::Error),

    #[error("Persistence write error: {0}")]
    PersistenceWrite(String),

    #[error("Persistence read error: {0}")]
    PersistenceRead(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ValsplitError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn persistence_write(msg: impl Into<String>) -> Self {
        Self::PersistenceWrite(msg.into())
    }

    pub fn persistence_read(msg: impl Into<String>) -> Self {
        Self::PersistenceRead(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ValsplitError>;
