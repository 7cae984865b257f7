//! HTTP interaction layer for the Remedia assistant service.
//!
//! # Module Structure
//!
//! - `client`: the reqwest gateway (multipart send, history, clear)
//! - `dto`: wire DTOs and their degrade-don't-fail domain conversions

pub mod client;
mod dto;

pub use client::AssistantClient;
