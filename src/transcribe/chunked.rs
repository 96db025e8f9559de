use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::info;

use crate::audio::track::wav_duration;
use crate::audio::{create_chunks, detect_silence, plan_chunks, ChunkConfig};
use crate::config::SilenceConfig;
use crate::error::{DubError, Result};
use crate::timeline::TranscriptSegment;

use super::{Transcriber, Transcript};

/// Splits audio longer than the upload limit at detected silences and sends the
/// pieces one after another, shifting timestamps back onto the full recording.
pub struct ChunkedTranscriber {
    inner: Arc<dyn Transcriber>,
    chunking: ChunkConfig,
    silence: SilenceConfig,
}

impl ChunkedTranscriber {
    pub fn new(inner: Arc<dyn Transcriber>) -> Self {
        Self {
            inner,
            chunking: ChunkConfig::default(),
            silence: SilenceConfig::default(),
        }
    }

    pub fn with_chunk_config(mut self, chunking: ChunkConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_silence_config(mut self, silence: SilenceConfig) -> Self {
        self.silence = silence;
        self
    }
}

/// Append `chunk` to `merged`, shifting its timestamps by `offset`.
fn merge_offset(merged: &mut Transcript, chunk: Transcript, offset: f64) {
    merged
        .segments
        .extend(chunk.segments.into_iter().map(|s| {
            TranscriptSegment::new(s.start + offset, s.end + offset, s.text)
        }));
    if merged.language.is_none() {
        merged.language = chunk.language;
    }
}

#[async_trait]
impl Transcriber for ChunkedTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<Transcript> {
        let total = wav_duration(audio)?;
        if total <= self.chunking.max_duration.as_secs_f64() {
            return self.inner.transcribe(audio).await;
        }

        let silences = detect_silence(audio, &self.silence)?;
        let ranges = plan_chunks(total, &silences, &self.chunking);
        let dir = TempDir::new()?;
        let chunks = create_chunks(audio, &ranges, dir.path())?;

        info!(
            "Transcribing {:.1}s of audio in {} chunks with {}",
            total,
            chunks.len(),
            self.inner.name()
        );

        let mut merged = Transcript {
            segments: Vec::new(),
            language: None,
            duration: Some(total),
        };
        for chunk in &chunks {
            let transcript = self.inner.transcribe(&chunk.path).await.map_err(|e| {
                DubError::Transcription(format!(
                    "chunk {} ({:.1}s to {:.1}s): {e}",
                    chunk.index, chunk.start, chunk.end
                ))
            })?;
            merge_offset(&mut merged, transcript, chunk.start);
        }

        Ok(merged)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
