//! Media backend abstraction.

use std::path::Path;

use gymkhana_common::error::GymkhanaResult;

use crate::sink::{FrameSink, SinkConfig};
use crate::source::VideoSource;

/// Opens sources and creates sinks.
///
/// Shared between the interactive session and the export worker, so every
/// method takes `&self`. Each call returns an independent handle.
pub trait MediaBackend: Send + Sync {
    /// Open `path` for frame access. Fails with `CannotOpen`.
    fn open_source(&self, path: &Path) -> GymkhanaResult<Box<dyn VideoSource>>;

    /// Create an output file. Fails with `SinkCreationFailed`.
    fn create_sink(&self, config: &SinkConfig) -> GymkhanaResult<Box<dyn FrameSink>>;

    /// Check whether the backend can run on this system.
    fn is_available(&self) -> bool;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
