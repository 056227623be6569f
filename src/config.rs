// Engine configuration
//
// Stored as RON or JSON depending on the file extension. Every field has a
// default, so a partial file only overrides what it names.

use crate::error::{SequencerError, SequencerResult};
use crate::sampler::SampleDescriptor;
use crate::sequencer::input::KeyBindings;
use crate::sequencer::notation::{MAX_DIVISION, MAX_TRACKS};
use crate::sequencer::transport::{DEFAULT_BPM, DEFAULT_DIVISION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR_NAME: &str = "step108";
const CONFIG_FILE_NAME: &str = "config.ron";

/// Named set of default samples, one per track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kit {
    pub name: String,
    pub samples: Vec<SampleDescriptor>,
}

impl Default for Kit {
    fn default() -> Self {
        Self {
            name: "808".to_string(),
            samples: vec![
                SampleDescriptor::new("samples/808/kick.wav", 0.9),
                SampleDescriptor::new("samples/808/clap.wav", 0.95),
                SampleDescriptor::new("samples/808/hi-hat.wav", 0.75),
                SampleDescriptor::new("samples/808/snare.wav", 0.95),
                SampleDescriptor::new("samples/808/tom.wav", 0.95),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub bpm: u32,
    pub division: u32,
    /// Record taps into the grid
    pub recording: bool,
    pub metronome: bool,
    /// Delay between backend ready and the first tick
    pub startup_grace_ms: u64,
    pub transport_offset_ms: u64,
    /// Gain given to custom samples when the caller does not pick one
    pub custom_sample_gain: f32,
    /// Capacity of the event ring buffer
    pub event_capacity: usize,
    pub kit: Kit,
    pub keys: KeyBindings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            division: DEFAULT_DIVISION as u32,
            recording: true,
            metronome: false,
            startup_grace_ms: 500,
            transport_offset_ms: 100,
            custom_sample_gain: 0.9,
            event_capacity: 256,
            kit: Kit::default(),
            keys: KeyBindings::default(),
        }
    }
}

impl EngineConfig {
    /// `<config dir>/step108/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults if absent
    pub fn load_or_default() -> SequencerResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> SequencerResult<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            ron::from_str(&content)?
        };

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> SequencerResult<()> {
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> SequencerResult<()> {
        if self.bpm == 0 {
            return Err(SequencerError::InvalidBpm(self.bpm.to_string()));
        }
        if self.division == 0 || self.division as usize > MAX_DIVISION {
            return Err(SequencerError::InvalidDivision(self.division));
        }

        let tracks = self.kit.samples.len();
        if tracks == 0 || tracks > MAX_TRACKS {
            return Err(SequencerError::InvalidConfig(format!(
                "kit '{}' has {} samples, expected 1 to {}",
                self.kit.name, tracks, MAX_TRACKS
            )));
        }
        for (track, sample) in self.kit.samples.iter().enumerate() {
            if !is_valid_gain(sample.gain) {
                return Err(SequencerError::InvalidConfig(format!(
                    "gain {} of track {} is outside (0, 1]",
                    sample.gain, track
                )));
            }
        }
        if !is_valid_gain(self.custom_sample_gain) {
            return Err(SequencerError::InvalidConfig(format!(
                "custom sample gain {} is outside (0, 1]",
                self.custom_sample_gain
            )));
        }
        if self.event_capacity == 0 {
            return Err(SequencerError::InvalidConfig(
                "event capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn track_count(&self) -> usize {
        self.kit.samples.len()
    }

    /// Total delay before the loop starts once the backend is ready
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms + self.transport_offset_ms)
    }
}

pub fn is_valid_gain(gain: f32) -> bool {
    gain > 0.0 && gain <= 1.0
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.bpm, 108);
        assert_eq!(config.division, 16);
        assert!(config.recording);
        assert!(!config.metronome);
        assert_eq!(config.track_count(), 5);
        assert_eq!(config.startup_delay(), Duration::from_millis(600));
        assert!(config.validate().is_ok());

        let gains: Vec<f32> = config.kit.samples.iter().map(|s| s.gain).collect();
        assert_eq!(gains, vec![0.9, 0.95, 0.75, 0.95, 0.95]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.division = 27;
        assert!(matches!(config.validate(), Err(SequencerError::InvalidDivision(27))));

        let mut config = EngineConfig::default();
        config.bpm = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.kit.samples.clear();
        assert!(matches!(config.validate(), Err(SequencerError::InvalidConfig(_))));

        let mut config = EngineConfig::default();
        config.kit.samples[2].gain = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ron_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ron");

        let mut config = EngineConfig::default();
        config.bpm = 132;
        config.metronome = true;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = EngineConfig::default();
        config.division = 12;
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"division\": 12"));
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.ron");
        std::fs::write(&path, "(bpm: 90)").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.bpm, 90);
        assert_eq!(config.division, 16);
        assert_eq!(config.kit, Kit::default());
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.ron");
        std::fs::write(&path, "(division: 40)").unwrap();

        assert!(matches!(
            EngineConfig::load(&path),
            Err(SequencerError::InvalidDivision(40))
        ));
    }
}
