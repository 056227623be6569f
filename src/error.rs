// Error types for the sequencer engine
//
// Nothing in the engine is fatal: every variant describes an operation that
// was rejected without touching grid, transport or sample bank state.

/// Result alias used across the crate
pub type SequencerResult<T> = Result<T, SequencerError>;

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("Invalid track index {track} (track count is {tracks})")]
    InvalidTrack { track: usize, tracks: usize },

    #[error("Invalid step index {step} (division is {division})")]
    InvalidStep { step: usize, division: usize },

    #[error("Malformed sequence token '{token}': {reason}")]
    MalformedSerializedToken { token: String, reason: String },

    #[error("No sample available for track {0}")]
    SampleResolutionMiss(usize),

    #[error("Audio backend is not ready")]
    BackendNotReady,

    #[error("Invalid BPM value '{0}'")]
    InvalidBpm(String),

    #[error("Invalid division {0} (must be between 1 and 26)")]
    InvalidDivision(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),

    #[error("RON parse error: {0}")]
    RonSpanned(#[from] ron::error::SpannedError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SequencerError::InvalidTrack {
            track: 7,
            tracks: 5,
        };
        assert_eq!(err.to_string(), "Invalid track index 7 (track count is 5)");

        let err = SequencerError::InvalidStep {
            step: 25,
            division: 10,
        };
        assert_eq!(err.to_string(), "Invalid step index 25 (division is 10)");

        let err = SequencerError::InvalidBpm("abc".to_string());
        assert_eq!(err.to_string(), "Invalid BPM value 'abc'");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SequencerError = io.into();
        assert!(matches!(err, SequencerError::Io(_)));
    }
}
