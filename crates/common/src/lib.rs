//! Gymkhana Common Utilities
//!
//! Shared infrastructure for all Gymkhana crates:
//! - Error types, failure reports, and result aliases
//! - Pacing and clock helpers for playback and export
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
