//! Cached device state, refreshed by the poll pass and read by the entity
//! layer through brief lock-and-snapshot accesses.

use crate::protocol;
use crate::types::{Capabilities, PowerState};
use std::collections::BTreeMap;

/// Initial maximum volume, replaced once the receiver reports `MVMAX`
pub const DEFAULT_VOLUME_MAX: u32 = 60;

#[derive(Debug, Clone)]
pub struct DeviceState {
    /// Display name, replaced by the configured network name once read
    pub name: String,
    pub power: PowerState,
    /// Current volume in device units, within `0..=volume_max`
    pub volume: u32,
    pub volume_max: u32,
    pub muted: bool,
    /// Device code of the active source (e.g. `TUNER`), empty until polled
    pub source_code: String,
    /// Now-playing text, or the active source's display name outside media
    /// modes
    pub now_playing: String,
    /// Display name -> device code
    pub sources: BTreeMap<String, String>,
    /// The source table is read from the receiver once per instance lifetime
    pub sources_initialized: bool,
}

impl DeviceState {
    pub fn new(name: String) -> Self {
        Self {
            name,
            power: PowerState::Unknown,
            volume: 0,
            volume_max: DEFAULT_VOLUME_MAX,
            muted: false,
            source_code: String::new(),
            now_playing: String::new(),
            sources: protocol::default_sources(),
            sources_initialized: false,
        }
    }

    /// Volume as a fraction of the learned maximum, clamped to `0.0..=1.0`
    pub fn volume_fraction(&self) -> f32 {
        if self.volume_max == 0 {
            return 0.0;
        }
        (self.volume as f32 / self.volume_max as f32).clamp(0.0, 1.0)
    }

    /// Display name of the active source, if it is in the source table
    pub fn source_display_name(&self) -> Option<&str> {
        self.sources
            .iter()
            .find(|(_, code)| **code == self.source_code)
            .map(|(name, _)| name.as_str())
    }

    /// Sorted display names of all available sources
    pub fn source_names(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    /// Device code for a display name
    pub fn code_for(&self, display_name: &str) -> Option<&str> {
        self.sources.get(display_name).map(String::as_str)
    }

    /// Whether the active source is a media mode
    pub fn is_media_mode(&self) -> bool {
        protocol::is_media_mode(&self.source_code)
    }

    /// Supported operations given the active source
    pub fn capabilities(&self) -> Capabilities {
        if self.is_media_mode() {
            Capabilities::BASE | Capabilities::MEDIA
        } else {
            Capabilities::BASE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_fraction_clamped() {
        let mut state = DeviceState::new("Test".to_string());
        assert_eq!(state.volume_fraction(), 0.0);

        state.volume = 30;
        assert!((state.volume_fraction() - 0.5).abs() < f32::EPSILON);

        state.volume_max = 80;
        state.volume = 80;
        assert_eq!(state.volume_fraction(), 1.0);

        // A volume above the learned max never yields a fraction above 1
        state.volume = 99;
        assert_eq!(state.volume_fraction(), 1.0);

        state.volume_max = 0;
        assert_eq!(state.volume_fraction(), 0.0);
    }

    #[test]
    fn source_lookups() {
        let mut state = DeviceState::new("Test".to_string());
        state.source_code = "TUNER".to_string();
        assert_eq!(state.source_display_name(), Some("Tuner"));
        assert_eq!(state.code_for("TV"), Some("TV"));
        assert_eq!(state.code_for("Nope"), None);

        let names = state.source_names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted, "display names are sorted");
    }

    #[test]
    fn capabilities_follow_active_source() {
        let mut state = DeviceState::new("Test".to_string());
        state.source_code = "TV".to_string();
        assert!(!state.capabilities().contains(Capabilities::PLAY));

        state.source_code = "NET/USB".to_string();
        assert!(state.capabilities().contains(Capabilities::PLAY));
        assert!(state.capabilities().contains(Capabilities::BASE));
    }
}
