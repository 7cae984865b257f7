//! Core domain for the Remedia interaction pipeline.
//!
//! # Module Structure
//!
//! - `message`: conversation turn types (roles, input kinds, media refs)
//! - `store`: the append-only conversation log with patch-by-id reconcile
//! - `composition`: the unsent draft and its media exclusivity rules
//! - `media`: the ephemeral blob registry and capture artifacts
//! - `assistant`: the gateway trait the orchestrator sends through
//! - `event`: pipeline events published toward the rendering layer
//! - `config`: TOML + environment configuration
//! - `error`: the shared error type

pub mod assistant;
pub mod composition;
pub mod config;
pub mod error;
pub mod event;
pub mod media;
pub mod message;
pub mod store;

// Re-export common error type
pub use error::{DeviceKind, RemediaError, Result};
