// Undo history for recorded hits
//
// The engine itself keeps no history. `HitHistory` follows the event stream,
// remembers every hit that was added and hands the most recent one back on
// undo so it can be passed to `Sequencer::remove_hit`.

pub mod history;

pub use history::{HitHistory, HitRecord};
