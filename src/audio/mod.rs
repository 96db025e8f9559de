pub mod chunk;
pub mod ffmpeg;
pub mod silence;
pub mod stitch;
pub mod tempo;
pub mod track;

pub use chunk::{create_chunks, plan_chunks, AudioChunk, ChunkConfig};
pub use ffmpeg::{
    burn_subtitles, check_ffmpeg, check_ffprobe, embed_subtitles, extract_audio,
    extract_audio_segment, mux_audio_video, probe_duration, strip_audio,
};
pub use silence::{detect_silence, detect_silence_in_track};
pub use stitch::{AudioStitcher, RenderOutput};
pub use tempo::{atempo_chain, fit_to_duration, AtempoStretcher, LinearStretcher, TimeStretcher};
pub use track::AudioTrack;

use std::time::Duration;

/// Metadata about an audio file.
#[derive(Debug, Clone)]
pub struct AudioMetadata {
    pub duration: Duration,
    pub sample_rate: u32,
    pub channels: u16,
}
