// Audio - Backend seam plus the bundled cpal and manual backends

pub mod backend;
pub mod clock;
pub mod engine;
pub mod manual;
pub mod mixer;
pub mod parameters;

pub use backend::{AudioBackend, BackendSignal, Tick};
pub use engine::{AudioError, BackendEvents, CpalBackend};
pub use manual::{BackendCall, ManualBackend};
