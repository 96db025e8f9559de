use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{DubError, Result};
use crate::timeline::SilenceInterval;

use super::ffmpeg::extract_audio_segment;

/// A time range of the source audio, written to its own file for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub path: PathBuf,
}

impl AudioChunk {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Configuration for splitting audio that exceeds the recognizer's upload limit.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Longest chunk sent in one request.
    pub max_duration: Duration,
    /// Chunks are not cut shorter than this when looking for a silence to split at.
    pub min_duration: Duration,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        // 16 kHz mono 16-bit WAV stays below 25 MB for 10 minutes.
        Self {
            max_duration: Duration::from_secs(600),
            min_duration: Duration::from_secs(300),
        }
    }
}

/// Plan chunk boundaries, cutting in the middle of a silence where one is available
/// so no word is split between two requests.
pub fn plan_chunks(
    total_duration: f64,
    silences: &[SilenceInterval],
    config: &ChunkConfig,
) -> Vec<(f64, f64)> {
    let max = config.max_duration.as_secs_f64();
    let min = config.min_duration.as_secs_f64().min(max);

    let mut chunks = Vec::new();
    let mut current = 0.0;

    while total_duration - current > max {
        let limit = current + max;
        let cut = silences
            .iter()
            .map(|s| s.midpoint())
            .filter(|&m| m > current + min && m < limit)
            .last()
            .unwrap_or(limit);

        chunks.push((current, cut));
        current = cut;
    }

    if total_duration > current {
        chunks.push((current, total_duration));
    }

    chunks
}

/// Write each planned range of `source` to `output_dir`.
pub fn create_chunks(
    source: &Path,
    ranges: &[(f64, f64)],
    output_dir: &Path,
) -> Result<Vec<AudioChunk>> {
    if !source.exists() {
        return Err(DubError::FileNotFound(source.display().to_string()));
    }

    std::fs::create_dir_all(output_dir)?;

    info!(
        "Creating {} audio chunks in {}",
        ranges.len(),
        output_dir.display()
    );

    let mut chunks = Vec::with_capacity(ranges.len());
    for (index, &(start, end)) in ranges.iter().enumerate() {
        let path = output_dir.join(format!("chunk_{:04}.wav", index));
        debug!("Creating chunk {}: {:.2}s to {:.2}s", index, start, end);
        extract_audio_segment(source, &path, start, end)?;
        chunks.push(AudioChunk {
            index,
            start,
            end,
            path,
        });
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max: u64, min: u64) -> ChunkConfig {
        ChunkConfig {
            max_duration: Duration::from_secs(max),
            min_duration: Duration::from_secs(min),
        }
    }

    #[test]
    fn test_short_audio_is_one_chunk() {
        let chunks = plan_chunks(120.0, &[], &ChunkConfig::default());
        assert_eq!(chunks, vec![(0.0, 120.0)]);
    }

    #[test]
    fn test_fixed_cuts_without_silence() {
        let chunks = plan_chunks(100.0, &[], &config(30, 10));
        assert_eq!(
            chunks,
            vec![(0.0, 30.0), (30.0, 60.0), (60.0, 90.0), (90.0, 100.0)]
        );
    }

    #[test]
    fn test_cuts_at_last_silence_before_limit() {
        let silences = vec![
            SilenceInterval::new(5.0, 7.0),
            SilenceInterval::new(20.0, 22.0),
            SilenceInterval::new(28.0, 29.0),
            SilenceInterval::new(40.0, 42.0),
        ];
        let chunks = plan_chunks(60.0, &silences, &config(30, 10));

        // 6.0 falls inside the minimum chunk length, 28.5 is the last candidate.
        assert_eq!(chunks[0], (0.0, 28.5));
        assert_eq!(chunks[1], (28.5, 41.0));
        assert_eq!(chunks[2], (41.0, 60.0));
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_create_chunks_missing_source() {
        let result = create_chunks(
            Path::new("/nonexistent/audio.wav"),
            &[(0.0, 1.0)],
            Path::new("/tmp"),
        );
        assert!(matches!(result, Err(DubError::FileNotFound(_))));
    }
}
