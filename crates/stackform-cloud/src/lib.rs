//! Stackform provisioning engine
//!
//! Turns the declarative resource model from `stackform-core` into provider
//! calls: diff desired resources against durable state, execute the
//! resulting plan as a dependency-ordered task graph, and persist every
//! outcome.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 stackform CLI                    │
//! │         (plan / apply / destroy / show)          │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               stackform-cloud                    │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │   Planner    │  │   Executor   │             │
//! │  └──────────────┘  └──────────────┘             │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │  StateStore  │  │ trait Provider│            │
//! │  └──────────────┘  └──────────────┘             │
//! └───────────────────────┬─────────────────────────┘
//!                         │
//!                 ┌───────▼───────┐
//!                 │ stackform-sim │
//!                 └───────────────┘
//! ```

pub mod action;
pub mod error;
pub mod executor;
pub mod output;
pub mod plan;
pub mod provider;
pub mod secret;
pub mod state;

// Re-exports
pub use action::{Action, ActionResult, ApplyResult, AttributeDiff, Outcome, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use executor::{CancelHandle, Executor, ExecutorOptions};
pub use plan::Planner;
pub use provider::{Attributes, Provider};
pub use secret::SecretMaterial;
pub use state::{ResourceState, ResourceStatus, StateStore};
