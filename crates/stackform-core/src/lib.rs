//! stackform core
//!
//! Resource model, fixed template, and dependency graph for the stackform
//! provisioner. This crate is pure data + ordering logic: nothing here talks
//! to a provider or touches durable state.

pub mod error;
pub mod graph;
pub mod model;
pub mod template;

// Re-exports
pub use error::{CoreError, Result};
pub use graph::DependencyGraph;
pub use model::{Reference, ResourceKey, ResourceKind, ResourceSpec};
