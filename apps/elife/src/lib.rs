//! # E-Life Library
//!
//! Exposes the HTTP API and CLI commands for testing and integration.
//!
//! The binary dispatches to these modules from `main.rs`.

pub mod api;
pub mod cli;

// Re-export elife_core for convenience
pub use elife_core;
