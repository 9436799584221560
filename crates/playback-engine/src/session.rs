//! The open comparison: two source slots plus sync state.

use std::path::Path;
use std::sync::Arc;

use gymkhana_common::error::GymkhanaResult;
use gymkhana_media::backend::MediaBackend;
use gymkhana_media::source::VideoSource;
use gymkhana_sync_model::metadata::{Slot, SourceMetadata};
use gymkhana_sync_model::sync::SyncState;

/// Owns the primary and shadow sources of one comparison.
///
/// A slot is replaced only after the new file opened successfully, so a
/// failed load leaves the previous source in place.
pub struct Session {
    backend: Arc<dyn MediaBackend>,
    primary: Option<Box<dyn VideoSource>>,
    shadow: Option<Box<dyn VideoSource>>,
    sync: SyncState,
}

impl Session {
    /// Open an empty session.
    pub fn open(backend: Arc<dyn MediaBackend>) -> Self {
        tracing::debug!(backend = backend.name(), "Session opened");
        Self {
            backend,
            primary: None,
            shadow: None,
            sync: SyncState::default(),
        }
    }

    pub fn with_sync(mut self, sync: SyncState) -> Self {
        self.sync = sync;
        self
    }

    pub fn backend(&self) -> &Arc<dyn MediaBackend> {
        &self.backend
    }

    /// Open `path` into `slot`, releasing whatever the slot held.
    pub fn load(&mut self, slot: Slot, path: &Path) -> GymkhanaResult<SourceMetadata> {
        let source = self.backend.open_source(path).map_err(|err| {
            tracing::warn!(
                slot = %slot,
                path = %path.display(),
                error = %err,
                "Failed to load video"
            );
            err
        })?;
        let metadata = source.metadata().clone();

        let entry = self.slot_mut(slot);
        if let Some(mut previous) = entry.take() {
            previous.close();
        }
        *entry = Some(source);

        tracing::info!(
            slot = %slot,
            path = %path.display(),
            fps = metadata.fps,
            frames = metadata.total_frames,
            playable = metadata.is_playable(),
            "Video loaded"
        );
        Ok(metadata)
    }

    pub fn metadata(&self, slot: Slot) -> Option<&SourceMetadata> {
        self.slot_ref(slot).as_ref().map(|s| s.metadata())
    }

    pub fn source_mut(&mut self, slot: Slot) -> Option<&mut (dyn VideoSource + 'static)> {
        self.slot_mut(slot).as_deref_mut()
    }

    pub fn is_loaded(&self, slot: Slot) -> bool {
        self.slot_ref(slot).is_some()
    }

    /// Both slots hold a source.
    pub fn is_ready(&self) -> bool {
        self.primary.is_some() && self.shadow.is_some()
    }

    pub fn sync(&self) -> &SyncState {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut SyncState {
        &mut self.sync
    }

    /// Release both sources. Safe to call repeatedly.
    pub fn close(&mut self) {
        for slot in [Slot::Primary, Slot::Shadow] {
            if let Some(mut source) = self.slot_mut(slot).take() {
                source.close();
                tracing::debug!(slot = %slot, "Released video");
            }
        }
    }

    fn slot_ref(&self, slot: Slot) -> &Option<Box<dyn VideoSource>> {
        match slot {
            Slot::Primary => &self.primary,
            Slot::Shadow => &self.shadow,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<Box<dyn VideoSource>> {
        match slot {
            Slot::Primary => &mut self.primary,
            Slot::Shadow => &mut self.shadow,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
