// Transport - Play state, tempo and per-tick bookkeeping
// The clock itself lives in the audio backend; this only mirrors it.

use crate::error::{SequencerError, SequencerResult};
use crate::sequencer::notation::MAX_DIVISION;

pub const DEFAULT_BPM: u32 = 108;
pub const DEFAULT_DIVISION: usize = 16;

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    /// Waiting for the backend to acknowledge it is ready
    Starting,
    Running,
}

impl TransportState {
    pub fn is_running(&self) -> bool {
        matches!(self, TransportState::Running)
    }
}

/// Transport controller
///
/// Tracks the play state and the last tick seen. `step_duration` is the
/// distance between the two most recent ticks and only serves as a progress
/// estimate for renderers.
#[derive(Debug, Clone)]
pub struct Transport {
    state: TransportState,
    bpm: u32,
    division: usize,
    current_step: Option<usize>,
    step_start_time: f64,
    step_duration: f64,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(DEFAULT_BPM, DEFAULT_DIVISION)
    }
}

impl Transport {
    pub fn new(bpm: u32, division: usize) -> Self {
        Self {
            state: TransportState::Stopped,
            bpm,
            division,
            current_step: None,
            step_start_time: 0.0,
            step_duration: 0.0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn division(&self) -> usize {
        self.division
    }

    /// Last step reported by the clock, `None` before the first tick
    pub fn current_step(&self) -> Option<usize> {
        self.current_step
    }

    pub fn step_start_time(&self) -> f64 {
        self.step_start_time
    }

    pub fn step_duration(&self) -> f64 {
        self.step_duration
    }

    /// Set tempo; zero is rejected and the previous value kept
    pub fn set_bpm(&mut self, bpm: u32) -> SequencerResult<()> {
        if bpm == 0 {
            return Err(SequencerError::InvalidBpm(bpm.to_string()));
        }
        self.bpm = bpm;
        Ok(())
    }

    /// Set division, in `1..=26`
    pub fn set_division(&mut self, division: u32) -> SequencerResult<()> {
        let division = validate_division(division)?;
        self.division = division;
        self.current_step = None;
        Ok(())
    }

    /// Stopped -> Starting
    pub fn begin_start(&mut self) -> bool {
        if self.state == TransportState::Stopped {
            self.state = TransportState::Starting;
            true
        } else {
            false
        }
    }

    /// Starting -> Running, once the backend is ready
    pub fn mark_ready(&mut self) -> bool {
        if self.state == TransportState::Starting {
            self.state = TransportState::Running;
            true
        } else {
            false
        }
    }

    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
    }

    /// Stopped -> Running without the startup handshake
    pub fn resume(&mut self) -> bool {
        if self.state == TransportState::Stopped {
            self.state = TransportState::Running;
            true
        } else {
            false
        }
    }

    /// Store a clock tick; returns false if the tick must be ignored
    pub fn record_tick(&mut self, time: f64, step: usize) -> bool {
        if !self.is_running() || step >= self.division {
            return false;
        }

        if self.current_step.is_some() {
            self.step_duration = time - self.step_start_time;
        }
        self.current_step = Some(step);
        self.step_start_time = time;
        true
    }
}

/// Parse tempo text as typed by a user
pub fn parse_bpm(input: &str) -> SequencerResult<u32> {
    let trimmed = input.trim();
    match trimmed.parse::<u32>() {
        Ok(bpm) if bpm > 0 => Ok(bpm),
        _ => Err(SequencerError::InvalidBpm(trimmed.to_string())),
    }
}

pub fn validate_division(division: u32) -> SequencerResult<usize> {
    if division == 0 || division as usize > MAX_DIVISION {
        return Err(SequencerError::InvalidDivision(division));
    }
    Ok(division as usize)
}
