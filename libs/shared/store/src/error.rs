use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Optimistic transaction conflict")]
    VersionConflict,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}
