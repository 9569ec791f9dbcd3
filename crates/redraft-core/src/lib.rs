//! redraft-core: fork a published document, edit it privately, merge it back.
//!
//! The [`fork::ForkEngine`] holds every business rule. It talks to a
//! [`store::DocumentStore`] and a [`status::StatusRegistry`] handed to it at
//! construction and reports each step to a [`events::ForkObserver`].
//! [`workflow::WorkflowTrigger`] and [`api::Endpoints`] are the editor-facing
//! layers on top.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod fork;
pub mod lock;
pub mod model;
pub mod status;
pub mod store;
pub mod workflow;

// Conventions
//
// - Errors: typed `thiserror` enums at the engine and store seams,
//   `anyhow::Result` with context for config and filesystem plumbing.
// - Logging: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub use error::{ErrorCode, ForkError};
pub use fork::{ForkEngine, ForkOptions, RetireMode};
pub use model::{Document, DocumentId, FieldMap};
pub use status::{StatusKey, StatusRegistry};
pub use store::{DocumentStore, StoreError, StoreOptions};
