use thiserror::Error;

/// A broken timeline invariant found by the validator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineViolation {
    #[error("timeline is empty")]
    Empty,

    #[error("segment {index} has non-positive duration {duration:.3}s")]
    NonPositiveDuration { index: usize, duration: f64 },

    #[error("segment {index} starts at {start:.3}s before segment {prev} starts at {prev_start:.3}s")]
    Unordered {
        index: usize,
        prev: usize,
        start: f64,
        prev_start: f64,
    },

    #[error("gap of {gap:.3}s between segment {index} and the one before it")]
    Gap { index: usize, gap: f64 },

    #[error("overlap of {overlap:.3}s between segment {index} and the one before it")]
    Overlap { index: usize, overlap: f64 },

    #[error("segments {index} and {next} are both silence")]
    AdjacentSilence { index: usize, next: usize },

    #[error("invalid segment {index}: {reason}")]
    InvalidSegment { index: usize, reason: String },
}

#[derive(Error, Debug)]
pub enum DubError {
    #[error("Timeline defect: {0}")]
    Defect(String),

    #[error("Timeline violation: {0}")]
    Timeline(#[from] TimelineViolation),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Transcoding failed: {0}")]
    Transcoding(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl DubError {
    /// Defects signal upstream timestamp corruption and must never be patched over.
    pub fn is_defect(&self) -> bool {
        matches!(self, DubError::Defect(_) | DubError::Timeline(_))
    }
}

pub type Result<T> = std::result::Result<T, DubError>;
