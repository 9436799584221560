//! User-controlled synchronization state.

use std::fmt;

use gymkhana_common::error::{GymkhanaError, GymkhanaResult};
use serde::{Deserialize, Serialize};

/// Smallest accepted sync offset, in seconds.
pub const OFFSET_MIN_SECS: f64 = -60.0;
/// Largest accepted sync offset, in seconds.
pub const OFFSET_MAX_SECS: f64 = 60.0;
/// Offset increment offered by hosts.
pub const OFFSET_STEP_SECS: f64 = 0.1;

/// Offset and shadow opacity shared by every render and export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    offset_secs: f64,
    opacity: f64,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            offset_secs: 0.0,
            opacity: 0.5,
        }
    }
}

impl SyncState {
    /// Build a state, clamping both values into their documented bounds.
    pub fn new(offset_secs: f64, opacity: f64) -> GymkhanaResult<Self> {
        let mut state = Self::default();
        state.set_offset(offset_secs)?;
        state.set_opacity(opacity)?;
        Ok(state)
    }

    /// Signed shift of the shadow timeline relative to the primary.
    pub fn offset_secs(&self) -> f64 {
        self.offset_secs
    }

    /// Shadow blend weight in `[0.0, 1.0]`.
    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Set the offset, clamped to `[-60, 60]`. Returns the applied value.
    pub fn set_offset(&mut self, offset_secs: f64) -> GymkhanaResult<f64> {
        if !offset_secs.is_finite() {
            return Err(GymkhanaError::invalid_value(format!(
                "sync offset must be a finite number of seconds, got {offset_secs}"
            )));
        }
        self.offset_secs = offset_secs.clamp(OFFSET_MIN_SECS, OFFSET_MAX_SECS);
        Ok(self.offset_secs)
    }

    /// Set the opacity, clamped to `[0, 1]`. Returns the applied value.
    pub fn set_opacity(&mut self, opacity: f64) -> GymkhanaResult<f64> {
        if opacity.is_nan() {
            return Err(GymkhanaError::invalid_value("shadow opacity must be a number"));
        }
        self.opacity = opacity.clamp(0.0, 1.0);
        Ok(self.opacity)
    }
}

/// Playback speed multipliers a host may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackSpeed {
    Quarter,
    Half,
    #[default]
    Normal,
    OneAndHalf,
    Double,
}

impl PlaybackSpeed {
    pub const ALL: [PlaybackSpeed; 5] = [
        PlaybackSpeed::Quarter,
        PlaybackSpeed::Half,
        PlaybackSpeed::Normal,
        PlaybackSpeed::OneAndHalf,
        PlaybackSpeed::Double,
    ];

    pub fn multiplier(&self) -> f64 {
        match self {
            PlaybackSpeed::Quarter => 0.25,
            PlaybackSpeed::Half => 0.5,
            PlaybackSpeed::Normal => 1.0,
            PlaybackSpeed::OneAndHalf => 1.5,
            PlaybackSpeed::Double => 2.0,
        }
    }

    /// Map a raw multiplier onto the enumerated set.
    pub fn from_multiplier(multiplier: f64) -> GymkhanaResult<Self> {
        Self::ALL
            .into_iter()
            .find(|speed| (speed.multiplier() - multiplier).abs() < 1e-9)
            .ok_or_else(|| {
                GymkhanaError::invalid_value(format!(
                    "unsupported playback speed {multiplier}; expected one of 0.25, 0.5, 1.0, 1.5, 2.0"
                ))
            })
    }
}

impl fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.multiplier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_is_clamped() {
        let mut state = SyncState::default();
        assert_eq!(state.set_offset(75.0).unwrap(), 60.0);
        assert_eq!(state.set_offset(-61.0).unwrap(), -60.0);
        assert_eq!(state.set_offset(1.3).unwrap(), 1.3);
        assert_eq!(state.offset_secs(), 1.3);
    }

    #[test]
    fn test_non_finite_offset_is_rejected_and_previous_kept() {
        let mut state = SyncState::default();
        state.set_offset(2.0).unwrap();
        assert!(state.set_offset(f64::NAN).is_err());
        assert!(state.set_offset(f64::INFINITY).is_err());
        assert_eq!(state.offset_secs(), 2.0);
    }

    #[test]
    fn test_opacity_is_clamped() {
        let mut state = SyncState::default();
        assert_eq!(state.set_opacity(-0.2).unwrap(), 0.0);
        assert_eq!(state.set_opacity(1.7).unwrap(), 1.0);
        assert!(state.set_opacity(f64::NAN).is_err());
        assert_eq!(state.opacity(), 1.0);
    }

    #[test]
    fn test_speed_set() {
        assert_eq!(
            PlaybackSpeed::from_multiplier(1.5).unwrap(),
            PlaybackSpeed::OneAndHalf
        );
        assert_eq!(PlaybackSpeed::from_multiplier(0.25).unwrap().multiplier(), 0.25);
        assert!(PlaybackSpeed::from_multiplier(3.0).is_err());
        assert_eq!(PlaybackSpeed::default(), PlaybackSpeed::Normal);
        assert_eq!(PlaybackSpeed::Double.to_string(), "2x");
    }
}
