// HitHistory - Bounded undo stack of recorded hits

use crate::audio::backend::AudioBackend;
use crate::error::SequencerResult;
use crate::messaging::event::SequencerEvent;
use crate::sequencer::engine::Sequencer;
use crate::sequencer::recorder::HitId;
use std::collections::VecDeque;

/// Default maximum number of hits to keep in history
const DEFAULT_MAX_HISTORY: usize = 100;

/// Everything needed to take a hit back out of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRecord {
    pub step: usize,
    pub track: usize,
    pub division: usize,
    pub id: HitId,
}

/// Hits in the order they were added, most recent at the back
///
/// When the limit is reached, the oldest record is dropped.
#[derive(Debug)]
pub struct HitHistory {
    undo_stack: VecDeque<HitRecord>,
    max_history: usize,
}

impl Default for HitHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl HitHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_HISTORY)
    }

    pub fn with_capacity(max_history: usize) -> Self {
        Self {
            undo_stack: VecDeque::with_capacity(max_history),
            max_history: max_history.max(1),
        }
    }

    pub fn push(&mut self, record: HitRecord) {
        self.undo_stack.push_back(record);
        if self.undo_stack.len() > self.max_history {
            self.undo_stack.pop_front();
        }
    }

    /// Follow the engine's event stream
    pub fn observe(&mut self, event: &SequencerEvent) {
        match *event {
            SequencerEvent::HitAdded {
                step,
                track,
                division,
                id,
            } => self.push(HitRecord {
                step,
                track,
                division,
                id,
            }),
            SequencerEvent::HitRemoved { id, .. } => self.forget(id),
            SequencerEvent::SequenceCleared => self.clear(),
            _ => {}
        }
    }

    /// Pop the most recent hit
    pub fn undo(&mut self) -> Option<HitRecord> {
        self.undo_stack.pop_back()
    }

    /// Undo the most recent hit on `sequencer`
    ///
    /// Returns the record that was removed, `None` if the history is empty.
    pub fn undo_on<B: AudioBackend>(
        &mut self,
        sequencer: &mut Sequencer<B>,
    ) -> SequencerResult<Option<HitRecord>> {
        let Some(record) = self.undo() else {
            return Ok(None);
        };
        sequencer.remove_hit(record.step, record.track, record.division, record.id)?;
        Ok(Some(record))
    }

    /// Drop a record after its hit was removed some other way
    pub fn forget(&mut self, id: HitId) {
        self.undo_stack.retain(|r| r.id != id);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
    }
}
