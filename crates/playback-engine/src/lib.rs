//! Gymkhana Playback Engine
//!
//! Interactive side of a comparison session.
//!
//! - [`session::Session`] owns the primary and shadow sources plus sync state
//! - [`controller::PlaybackController`] tracks the position and renders
//!   composited frames
//! - [`driver::run_playback`] paces ticks on tokio
//! - [`analyzer::Analyzer`] is the facade a host drives, including exports

pub mod analyzer;
pub mod controller;
pub mod driver;
pub mod session;

pub use analyzer::Analyzer;
pub use controller::{PlaybackController, PlaybackState, RenderedFrame};
pub use driver::{run_playback, PlaybackExit};
pub use session::Session;
