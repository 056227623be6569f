// Recorder - Quantizes live taps onto the step grid

use crate::sequencer::grid::CellState;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for recorded hits
pub type HitId = u64;

/// Global hit ID generator (atomic for thread-safety)
static NEXT_HIT_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a unique hit ID
pub fn generate_hit_id() -> HitId {
    NEXT_HIT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Where a tap lands on the grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantized {
    pub step: usize,
    /// True when the tap came just before its step boundary
    pub pending: bool,
    /// Fractional step position of the tap
    pub position: f64,
}

impl Quantized {
    pub fn cell_state(&self) -> CellState {
        if self.pending {
            CellState::Pending
        } else {
            CellState::Committed
        }
    }
}

/// Snap a loop progress value to the nearest step
///
/// `loop_progress` is the fraction of the loop already played, in `[0, 1)`.
/// A tap rounded up to a step the playhead has not reached yet is pending:
/// it must not sound until the playhead comes around to it. A tap rounded
/// past the last step wraps to step 0 and is compared against 0, so it is
/// committed right away.
pub fn quantize(loop_progress: f64, division: usize) -> Quantized {
    let fraction = if loop_progress.is_finite() {
        loop_progress.rem_euclid(1.0)
    } else {
        0.0
    };
    let position = division as f64 * fraction;

    let mut step = position.round() as usize;
    if step >= division {
        step = 0;
    }

    Quantized {
        step,
        pending: position < step as f64,
        position,
    }
}

/// Recording switch
#[derive(Debug, Clone)]
pub struct Recorder {
    recording: bool,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Recorder {
    pub fn new(recording: bool) -> Self {
        Self { recording }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Returns true if the state changed
    pub fn start(&mut self) -> bool {
        let changed = !self.recording;
        self.recording = true;
        changed
    }

    /// Returns true if the state changed
    pub fn stop(&mut self) -> bool {
        let changed = self.recording;
        self.recording = false;
        changed
    }
}
