// Audio backend seam - clock and sample player driven by the sequencer

use crate::sampler::PlaybackConfig;
use crate::sequencer::metronome::ClickType;
use std::time::Duration;

/// One step boundary reported by the backend clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Backend time of the boundary, in seconds
    pub time: f64,
    pub step: usize,
}

/// Out-of-band notifications from a backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendSignal {
    /// Output device is open; the loop may be started
    Ready,
    /// Every slot of a sample set has been decoded
    SamplesLoaded { generation: u64 },
    /// One slot failed to load and will stay silent
    SampleLoadFailed { track: usize, message: String },
    /// Stream error reported by the device
    StreamError(String),
}

/// What the sequencer needs from an audio clock and sample player
///
/// Every call is fire-and-forget. Ticks and `BackendSignal`s travel back to
/// the engine through whatever channel the backend provides.
pub trait AudioBackend {
    /// Start looping the steps after `delay`, beginning at step 0
    fn start_loop(&mut self, delay: Duration);

    fn stop_loop(&mut self);

    fn set_bpm(&mut self, bpm: u32);

    fn set_division(&mut self, division: usize);

    /// Fraction of the loop already played, in `[0, 1)`
    fn loop_progress(&self) -> f64;

    /// Start loading a sample set; completion is signalled with its generation
    fn load_samples(&mut self, config: &PlaybackConfig);

    /// Play a track sample at backend time `at`, or immediately
    fn play_sample(&mut self, track: usize, gain: f32, at: Option<f64>);

    fn play_click(&mut self, click: ClickType, at: f64);
}
