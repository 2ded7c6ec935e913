/// Error taxonomy for the mastering engine. Most variants are masked at a
/// chunk boundary rather than propagated — see each call site's handling.
/// Only `UnknownPreset` and genuine programming-bug panics are meant to
/// escape all the way to the host.
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no fingerprint available for track {track_id}")]
    FingerprintUnavailable { track_id: String },

    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    #[error("numerical instability in stage {stage}")]
    NumericalInstability { stage: String },

    #[error("cache I/O failure: {0}")]
    CacheIoFailure(String),

    #[error("processing timeout for track {track_id} chunk {chunk_index}")]
    ProcessingTimeout { track_id: String, chunk_index: u64 },

    #[error("audio source failure: {0}")]
    AudioSourceFailure(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_preset_message_names_the_preset() {
        let err = CoreError::UnknownPreset("lofi".to_string());
        assert!(err.to_string().contains("lofi"));
    }
}
