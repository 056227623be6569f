// step108 - Step sequencer engine: library exports for the binary, tests and benchmarks

pub mod audio;
pub mod command;
pub mod config;
pub mod error;
pub mod messaging;
pub mod sampler;
pub mod sequencer;
pub mod session;

// Re-export commonly used types for convenience
pub use audio::{AudioBackend, BackendSignal, CpalBackend, ManualBackend, Tick};
pub use command::{HitHistory, HitRecord};
pub use config::{EngineConfig, Kit};
pub use error::{SequencerError, SequencerResult};
pub use messaging::{SequencerEvent, create_event_channel};
pub use sampler::{PlaybackConfig, SampleBank, SampleDescriptor};
pub use sequencer::{CellState, ClickType, Grid, Key, Sequencer, TransportState, UiAction};
pub use session::Session;
