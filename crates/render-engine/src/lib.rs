//! Gymkhana Render Engine
//!
//! Shadow compositing and the background export pipeline.
//!
//! # Export Pipeline
//!
//! ```text
//! primary.mp4 ──► read f ─────────────────────────┐
//!                                                 ├── blend(opacity) ──► encode ──► output.mp4
//! shadow.mp4 ───► read start2 + (f - start1) ──► resize
//!                   (out of range / unreadable: primary frame only)
//! ```
//!
//! Export runs on its own worker thread with its own decoder handles and
//! reports through a queue that the caller drains.

pub mod compositor;
pub mod export;

pub use compositor::{blend, composite};
pub use export::*;
