//! Engine error types

use stackform_core::ResourceKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error(transparent)]
    Core(#[from] stackform_core::CoreError),

    #[error("provider API error: {0}")]
    Api(String),

    #[error("provider call timed out after {0}ms")]
    Timeout(u64),

    #[error("unresolved reference: {referrer} slot '{slot}' needs output '{output}' of {target}")]
    UnresolvedReference {
        referrer: ResourceKey,
        target: ResourceKey,
        slot: String,
        output: String,
    },

    #[error("state file error: {0}")]
    State(String),

    #[error("state file failed integrity check: {0}")]
    StateCorruption(String),

    #[error("secret sink error: {0}")]
    Secret(String),

    #[error("incomplete state: {0}")]
    IncompleteState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
