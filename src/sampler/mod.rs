pub mod bank;
pub mod loader;

pub use bank::{PlaybackConfig, SampleBank, SampleDescriptor};
pub use loader::{LoaderError, SampleBuffer, load_sample};
