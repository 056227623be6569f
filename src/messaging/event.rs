// Events emitted by the sequencer engine

use crate::messaging::notification::Notification;
use crate::sequencer::recorder::HitId;

/// Everything a renderer needs to follow playback and grid changes
#[derive(Debug, Clone, PartialEq)]
pub enum SequencerEvent {
    /// The playhead reached `step` at backend time `time` (seconds)
    StepAdvanced { step: usize, time: f64 },
    /// At least one sample sounded on this step
    StepPlayed { step: usize },
    /// A track sample was triggered (scheduled or live)
    SamplePlayed { track: usize },

    HitAdded {
        step: usize,
        track: usize,
        division: usize,
        id: HitId,
    },
    HitRemoved {
        step: usize,
        track: usize,
        division: usize,
        id: HitId,
    },
    SequenceChanged,
    /// Current grid in compact notation, for sharing or persistence
    SequenceSaved { notation: String },
    SequenceCleared,

    PlaybackStarted,
    PlaybackStopped,
    RecordingStarted,
    RecordingStopped,
    MetronomeToggled { enabled: bool },
    BpmChanged { bpm: u32 },
    DivisionChanged { division: usize },

    /// Override stored; audible after the next rebuild
    CustomSampleLoaded { track: usize },
    /// The backend finished loading a sample set
    SamplesLoaded { generation: u64 },

    Diagnostic(Notification),
}

impl SequencerEvent {
    /// High-frequency playback events, skipped by quiet observers
    pub fn is_playback_tick(&self) -> bool {
        matches!(
            self,
            SequencerEvent::StepAdvanced { .. }
                | SequencerEvent::StepPlayed { .. }
                | SequencerEvent::SamplePlayed { .. }
        )
    }
}
