use thiserror::Error;

use crate::model::ResourceKey;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid template: {0}")]
    Validation(String),

    #[error("resource {referrer} references unknown resource {target} (slot '{slot}')")]
    DanglingReference {
        referrer: ResourceKey,
        target: ResourceKey,
        slot: String,
    },

    #[error("circular dependency detected: {}", path.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> "))]
    CircularDependency { path: Vec<ResourceKey> },
}

pub type Result<T> = std::result::Result<T, CoreError>;
