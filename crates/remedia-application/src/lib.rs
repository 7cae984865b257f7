//! Application layer for Remedia.
//!
//! This crate provides use case implementations that coordinate the domain
//! layer (composer, store, media registry) with the device controllers and
//! the assistant gateway: the send/reconcile exchange, capture-to-draft
//! flows, and history synchronization.

pub mod capture;
pub mod history;
pub mod orchestrator;

pub use capture::CaptureUseCase;
pub use history::HistoryUseCase;
pub use orchestrator::{ChatOrchestrator, ExchangeOutcome};
