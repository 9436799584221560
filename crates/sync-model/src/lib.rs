//! Gymkhana Sync Model
//!
//! Defines the core data contracts shared by playback and export:
//! - **Metadata:** What a loaded source reports (fps, frame count, size)
//! - **Sync:** User-controlled offset, shadow opacity, and playback speed
//! - **Timeline:** Pure mapping from a timeline position to frame indices
//! - **Range:** Validated export time ranges and quick presets
//!
//! Nothing in this crate performs I/O.

pub mod metadata;
pub mod range;
pub mod sync;
pub mod timeline;

pub use metadata::*;
pub use range::*;
pub use sync::*;
pub use timeline::*;
