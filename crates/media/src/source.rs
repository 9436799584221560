//! Random-access video sources.

use gymkhana_common::error::GymkhanaResult;
use gymkhana_sync_model::metadata::SourceMetadata;

use crate::frame::Frame;

/// A decodable handle to one media file.
///
/// Implementations keep a read cursor, so a handle must not be shared
/// between two activities that seek independently. Open a second handle
/// instead.
pub trait VideoSource: Send {
    /// What the container reported when the source was opened.
    fn metadata(&self) -> &SourceMetadata;

    /// Decode exactly one frame at `index`.
    ///
    /// Callers clamp the index; out-of-range indices fail with
    /// `DecodeFailed`. Reads in any order must return the requested frame.
    fn read_frame(&mut self, index: u64) -> GymkhanaResult<Frame>;

    /// Release the decoder. Safe to call more than once.
    fn close(&mut self);

    /// Whether `close` has not been called yet.
    fn is_open(&self) -> bool;
}
