//! Resource model
//!
//! Typed descriptions of the resource kinds stackform manages and the
//! reference relationships between them. Specs are built once from the
//! template and are read-only afterwards.

mod resource;

pub use resource::*;
