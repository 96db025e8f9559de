pub mod chunked;
pub mod whisper;

pub use chunked::ChunkedTranscriber;
pub use whisper::WhisperClient;

use crate::error::Result;
use crate::timeline::TranscriptSegment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Speech recognizer output for one audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<Transcript>;
    fn name(&self) -> &'static str;
}

/// Extend the last segment to the true end of the audio.
///
/// Recognizers stop the final segment at the last word; the timeline has to run
/// to the end of the recording. A final segment that already starts past the
/// audio length is given ten seconds instead.
pub fn repair_final_end(segments: &mut [TranscriptSegment], audio_length: f64) {
    if let Some(last) = segments.last_mut() {
        last.end = if last.start < audio_length {
            audio_length
        } else {
            last.start + 10.0
        };
    }
}
