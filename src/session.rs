// Session persistence - tempo, division, metronome and the grid notation
// Custom samples are not persisted.

use crate::audio::backend::AudioBackend;
use crate::error::{SequencerError, SequencerResult};
use crate::sequencer::engine::Sequencer;
use crate::sequencer::notation::DecodeReport;
use crate::sequencer::transport::validate_division;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub bpm: u32,
    pub division: u32,
    pub metronome: bool,
    pub notation: String,
}

impl Session {
    /// Snapshot of a running sequencer
    pub fn capture<B: AudioBackend>(sequencer: &Sequencer<B>) -> Self {
        Self {
            bpm: sequencer.bpm(),
            division: sequencer.division() as u32,
            metronome: sequencer.is_metronome_enabled(),
            notation: sequencer.save_sequence(),
        }
    }

    /// Restore onto a sequencer
    ///
    /// Tempo and division are validated first; if either is rejected nothing
    /// else is touched.
    pub fn apply<B: AudioBackend>(
        &self,
        sequencer: &mut Sequencer<B>,
    ) -> SequencerResult<DecodeReport> {
        validate_division(self.division)?;
        if self.bpm == 0 {
            return Err(SequencerError::InvalidBpm(self.bpm.to_string()));
        }

        if sequencer.division() != self.division as usize {
            sequencer.set_division(self.division)?;
        }
        sequencer.set_bpm(self.bpm)?;
        sequencer.set_metronome(self.metronome);
        Ok(sequencer.load_sequence(&self.notation))
    }

    pub fn save(&self, path: &Path) -> SequencerResult<()> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, content)?;
        log::info!("Session saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> SequencerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&content)?)
    }
}
