use crate::error::{SequencerError, SequencerResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a sample comes from and how loud it plays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDescriptor {
    /// Opaque locator (file path, URL, blob id...)
    pub source: String,
    /// Playback gain in (0, 1]
    pub gain: f32,
}

impl SampleDescriptor {
    pub fn new(source: impl Into<String>, gain: f32) -> Self {
        Self {
            source: source.into(),
            gain,
        }
    }

    pub fn has_source(&self) -> bool {
        !self.source.is_empty()
    }
}

/// Resolved sample set handed to the audio backend on rebuild
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    pub generation: u64,
    /// One slot per track; `None` when the track has nothing to play
    pub slots: Vec<Option<SampleDescriptor>>,
}

impl PlaybackConfig {
    pub fn slot(&self, track: usize) -> Option<&SampleDescriptor> {
        self.slots.get(track).and_then(|s| s.as_ref())
    }
}

/// Per-track sample resolution: immutable defaults plus session overrides
///
/// Overrides never take effect on their own. `rebuild()` stages a new
/// playback configuration and `activate()` swaps it in once the backend
/// reports the samples as loaded, so the previous configuration keeps
/// serving playback in the meantime.
#[derive(Debug, Clone)]
pub struct SampleBank {
    defaults: Vec<SampleDescriptor>,
    overrides: HashMap<usize, SampleDescriptor>,
    active: PlaybackConfig,
    staged: Option<PlaybackConfig>,
    next_generation: u64,
}

impl SampleBank {
    /// Create a bank; the track count is the number of defaults
    pub fn new(defaults: Vec<SampleDescriptor>) -> Self {
        let track_count = defaults.len();
        Self {
            defaults,
            overrides: HashMap::new(),
            active: PlaybackConfig {
                generation: 0,
                slots: vec![None; track_count],
            },
            staged: None,
            next_generation: 1,
        }
    }

    pub fn track_count(&self) -> usize {
        self.defaults.len()
    }

    fn check_track(&self, track: usize) -> SequencerResult<()> {
        if track < self.defaults.len() {
            Ok(())
        } else {
            Err(SequencerError::InvalidTrack {
                track,
                tracks: self.defaults.len(),
            })
        }
    }

    /// Default descriptor for a track
    pub fn default_for(&self, track: usize) -> SequencerResult<&SampleDescriptor> {
        self.check_track(track)?;
        Ok(&self.defaults[track])
    }

    /// Override if it has a source, otherwise the default
    pub fn resolve(&self, track: usize) -> SequencerResult<SampleDescriptor> {
        self.check_track(track)?;

        let descriptor = match self.overrides.get(&track) {
            Some(custom) if custom.has_source() => custom,
            _ => &self.defaults[track],
        };

        if descriptor.has_source() {
            Ok(descriptor.clone())
        } else {
            Err(SequencerError::SampleResolutionMiss(track))
        }
    }

    /// Replace the override for a track (takes effect after the next rebuild)
    pub fn set_override(&mut self, track: usize, descriptor: SampleDescriptor) -> SequencerResult<()> {
        self.check_track(track)?;
        self.overrides.insert(track, descriptor);
        Ok(())
    }

    pub fn override_for(&self, track: usize) -> Option<&SampleDescriptor> {
        self.overrides.get(&track)
    }

    pub fn has_overrides(&self) -> bool {
        !self.overrides.is_empty()
    }

    /// Drop every override, reverting all tracks to their defaults
    pub fn clear_overrides(&mut self) {
        self.overrides.clear();
    }

    /// Resolve every track into a new staged configuration
    pub fn rebuild(&mut self) -> PlaybackConfig {
        let slots = (0..self.defaults.len())
            .map(|track| self.resolve(track).ok())
            .collect();

        let config = PlaybackConfig {
            generation: self.next_generation,
            slots,
        };
        self.next_generation += 1;
        self.staged = Some(config.clone());
        config
    }

    /// Promote the staged configuration if it matches `generation`
    ///
    /// Returns false for stale or unknown generations.
    pub fn activate(&mut self, generation: u64) -> bool {
        match self.staged.take() {
            Some(staged) if staged.generation == generation => {
                self.active = staged;
                true
            }
            other => {
                self.staged = other;
                false
            }
        }
    }

    /// Whether a rebuild is waiting for the backend
    pub fn is_rebuilding(&self) -> bool {
        self.staged.is_some()
    }

    /// Descriptor currently used for playback
    pub fn active(&self, track: usize) -> Option<&SampleDescriptor> {
        self.active.slot(track)
    }

    pub fn active_config(&self) -> &PlaybackConfig {
        &self.active
    }
}
