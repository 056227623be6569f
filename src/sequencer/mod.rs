// Sequencer module
// Step grid, transport, recording and the engine tying them together

pub mod engine;
pub mod grid;
pub mod input;
pub mod metronome;
pub mod notation;
pub mod recorder;
pub mod transport;

pub use engine::Sequencer;
pub use grid::{CellState, Grid};
pub use input::{Key, KeyBindings, KeyState, UiAction};
pub use metronome::{ClickType, Metronome, MetronomeSound, click_for_step};
pub use notation::DecodeReport;
pub use recorder::{HitId, Quantized, Recorder, generate_hit_id, quantize};
pub use transport::{Transport, TransportState};
