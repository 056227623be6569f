// Grid - The track × step matrix of hits
// One row per track, one column per step of the loop

use crate::error::{SequencerError, SequencerResult};
use crate::sequencer::notation::{self, DecodeReport};

/// State of a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellState {
    #[default]
    Empty,
    /// Sounds whenever the playhead reaches the step
    Committed,
    /// Recorded ahead of the playhead; promoted on the next tick of its step
    Pending,
}

impl CellState {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellState::Empty)
    }

    pub fn is_hit(&self) -> bool {
        !self.is_empty()
    }
}

/// Fixed-size `tracks × division` matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    tracks: usize,
    division: usize,
    cells: Vec<Vec<CellState>>,
}

impl Grid {
    /// Create an empty grid
    pub fn new(tracks: usize, division: usize) -> Self {
        Self {
            tracks,
            division,
            cells: vec![vec![CellState::Empty; division]; tracks],
        }
    }

    pub fn tracks(&self) -> usize {
        self.tracks
    }

    pub fn division(&self) -> usize {
        self.division
    }

    fn check(&self, track: usize, step: usize) -> SequencerResult<()> {
        if track >= self.tracks {
            return Err(SequencerError::InvalidTrack {
                track,
                tracks: self.tracks,
            });
        }
        if step >= self.division {
            return Err(SequencerError::InvalidStep {
                step,
                division: self.division,
            });
        }
        Ok(())
    }

    pub fn get(&self, track: usize, step: usize) -> SequencerResult<CellState> {
        self.check(track, step)?;
        Ok(self.cells[track][step])
    }

    /// Fill an empty cell
    ///
    /// Returns true if the cell changed. A cell that already holds a hit is
    /// left as is: the first hit per step and track wins.
    pub fn set(&mut self, track: usize, step: usize, state: CellState) -> SequencerResult<bool> {
        self.check(track, step)?;

        let cell = &mut self.cells[track][step];
        if cell.is_hit() || state.is_empty() {
            return Ok(false);
        }
        *cell = state;
        Ok(true)
    }

    /// Empty a cell; returns true if it held a hit
    pub fn clear(&mut self, track: usize, step: usize) -> SequencerResult<bool> {
        self.check(track, step)?;

        let cell = &mut self.cells[track][step];
        if cell.is_empty() {
            return Ok(false);
        }
        *cell = CellState::Empty;
        Ok(true)
    }

    pub fn clear_all(&mut self) {
        for row in self.cells.iter_mut() {
            row.fill(CellState::Empty);
        }
    }

    /// Turn every pending cell of a column into a committed one
    ///
    /// Returns the number of promoted cells. Out-of-range steps are ignored.
    pub fn promote_pending(&mut self, step: usize) -> usize {
        if step >= self.division {
            return 0;
        }

        let mut promoted = 0;
        for row in self.cells.iter_mut() {
            if row[step] == CellState::Pending {
                row[step] = CellState::Committed;
                promoted += 1;
            }
        }
        promoted
    }

    /// Cell states of every track at one step
    pub fn column(&self, step: usize) -> SequencerResult<Vec<CellState>> {
        if step >= self.division {
            return Err(SequencerError::InvalidStep {
                step,
                division: self.division,
            });
        }
        Ok(self.cells.iter().map(|row| row[step]).collect())
    }

    /// Tracks with a hit at `step`, ascending
    pub fn tracks_at(&self, step: usize) -> Vec<usize> {
        if step >= self.division {
            return Vec::new();
        }
        (0..self.tracks)
            .filter(|&track| self.cells[track][step].is_hit())
            .collect()
    }

    /// All (track, step) pairs holding a hit, ordered by step then track
    pub fn hits(&self) -> Vec<(usize, usize)> {
        (0..self.division)
            .flat_map(|step| self.tracks_at(step).into_iter().map(move |t| (t, step)))
            .collect()
    }

    pub fn hit_count(&self) -> usize {
        self.cells
            .iter()
            .map(|row| row.iter().filter(|c| c.is_hit()).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.hit_count() == 0
    }

    /// Encode to the compact step/track notation
    pub fn serialize(&self) -> String {
        notation::encode(self)
    }

    /// Replace the grid contents with a decoded sequence
    ///
    /// Malformed and out-of-range tokens are skipped and listed in the report.
    pub fn deserialize(&mut self, input: &str) -> DecodeReport {
        let report = notation::decode(input, self.tracks, self.division);

        self.clear_all();
        for &(track, step) in &report.hits {
            // decode() already range-checked every hit
            let placed = self.set(track, step, CellState::Committed);
            debug_assert!(placed.is_ok(), "decoded hit ({}, {}) out of range", track, step);
        }
        report
    }
}
