//! Gymkhana Media
//!
//! Frame-level access to video files and video outputs.
//!
//! # Seams
//!
//! ```text
//!                 ┌──────────────┐  open_source   ┌─────────────┐
//! MediaBackend ───┤ FfmpegBackend├───────────────►│ VideoSource │ read_frame(i) -> Frame (RGB24)
//!                 │ Synthetic    │  create_sink   ├─────────────┤
//!                 └──────────────┘───────────────►│ FrameSink   │ write_frame / finish / abort
//!                                                 └─────────────┘
//! ```
//!
//! The ffmpeg backend drives the system `ffprobe`/`ffmpeg` binaries over
//! raw pipes. The synthetic backend generates deterministic test patterns
//! and records written frames in memory.

pub mod backend;
pub mod ffmpeg;
pub mod frame;
pub mod sink;
pub mod source;
pub mod synthetic;

pub use backend::MediaBackend;
pub use ffmpeg::FfmpegBackend;
pub use frame::Frame;
pub use sink::{FrameSink, OutputFormat, SinkConfig};
pub use source::VideoSource;
pub use synthetic::{SyntheticBackend, SyntheticVideo};
