// ManualBackend - Synchronous stand-in for a real audio device
//
// Records every call and lets the caller decide what the clock reports.
// Used by tests and benchmarks to drive the engine tick by tick.

use crate::audio::backend::AudioBackend;
use crate::sampler::PlaybackConfig;
use crate::sequencer::metronome::ClickType;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    StartLoop(Duration),
    StopLoop,
    SetBpm(u32),
    SetDivision(usize),
    LoadSamples(u64),
    PlaySample {
        track: usize,
        gain: f32,
        at: Option<f64>,
    },
    PlayClick {
        click: ClickType,
        at: f64,
    },
}

#[derive(Debug, Default)]
pub struct ManualBackend {
    calls: Vec<BackendCall>,
    progress: f64,
    running: bool,
    bpm: Option<u32>,
    division: Option<usize>,
    loaded: Vec<PlaybackConfig>,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value returned by the next `loop_progress()` calls
    pub fn set_progress(&mut self, progress: f64) {
        self.progress = progress;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn bpm(&self) -> Option<u32> {
        self.bpm
    }

    pub fn division(&self) -> Option<usize> {
        self.division
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    /// Sample sets handed over for loading, oldest first
    pub fn loaded(&self) -> &[PlaybackConfig] {
        &self.loaded
    }

    pub fn last_generation(&self) -> Option<u64> {
        self.loaded.last().map(|c| c.generation)
    }

    /// (track, scheduled time) of every sample played so far
    pub fn played_samples(&self) -> Vec<(usize, Option<f64>)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::PlaySample { track, at, .. } => Some((*track, *at)),
                _ => None,
            })
            .collect()
    }

    pub fn clicks(&self) -> Vec<(ClickType, f64)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::PlayClick { click, at } => Some((*click, *at)),
                _ => None,
            })
            .collect()
    }
}

impl AudioBackend for ManualBackend {
    fn start_loop(&mut self, delay: Duration) {
        self.running = true;
        self.calls.push(BackendCall::StartLoop(delay));
    }

    fn stop_loop(&mut self) {
        self.running = false;
        self.calls.push(BackendCall::StopLoop);
    }

    fn set_bpm(&mut self, bpm: u32) {
        self.bpm = Some(bpm);
        self.calls.push(BackendCall::SetBpm(bpm));
    }

    fn set_division(&mut self, division: usize) {
        self.division = Some(division);
        self.calls.push(BackendCall::SetDivision(division));
    }

    fn loop_progress(&self) -> f64 {
        self.progress
    }

    fn load_samples(&mut self, config: &PlaybackConfig) {
        self.loaded.push(config.clone());
        self.calls.push(BackendCall::LoadSamples(config.generation));
    }

    fn play_sample(&mut self, track: usize, gain: f32, at: Option<f64>) {
        self.calls.push(BackendCall::PlaySample { track, gain, at });
    }

    fn play_click(&mut self, click: ClickType, at: f64) {
        self.calls.push(BackendCall::PlayClick { click, at });
    }
}
