use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{DubError, Result};

use super::AudioMetadata;

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg() -> Result<()> {
    check_tool("ffmpeg")
}

/// Check if FFprobe is installed and accessible.
pub fn check_ffprobe() -> Result<()> {
    check_tool("ffprobe")
}

fn check_tool(tool: &str) -> Result<()> {
    let output = Command::new(tool).arg("-version").output().map_err(|e| {
        DubError::Transcoding(format!(
            "{tool} not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
        ))
    })?;

    if !output.status.success() {
        return Err(DubError::Transcoding(format!("{tool} check failed")));
    }

    debug!("{} is available", tool);
    Ok(())
}

fn require_input(input: &Path) -> Result<()> {
    if !input.exists() {
        return Err(DubError::FileNotFound(input.display().to_string()));
    }
    Ok(())
}

/// Run an ffmpeg invocation quietly, turning a non-zero exit into a transcoding error.
fn run_ffmpeg(mut command: Command, what: &str) -> Result<()> {
    command.args(["-hide_banner", "-loglevel", "error"]);
    debug!("Running {:?}", command);

    let output = command
        .output()
        .map_err(|e| DubError::Transcoding(format!("Failed to run FFmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DubError::Transcoding(format!(
            "FFmpeg {what} failed: {}",
            stderr.trim()
        )));
    }
    Ok(())
}

fn ffmpeg() -> Command {
    let mut command = Command::new("ffmpeg");
    command.arg("-y");
    command
}

/// Get media duration in seconds using FFprobe.
pub fn probe_duration(input: &Path) -> Result<f64> {
    require_input(input)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .output()
        .map_err(|e| DubError::Transcoding(format!("Failed to run FFprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DubError::Transcoding(format!("FFprobe failed: {stderr}")));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_duration(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    let seconds: f64 = trimmed.parse().map_err(|e| {
        DubError::Transcoding(format!("Failed to parse duration '{trimmed}': {e}"))
    })?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(DubError::Transcoding(format!(
            "FFprobe reported invalid duration '{trimmed}'"
        )));
    }
    Ok(seconds)
}

/// Extract the audio stream of a video as 16-bit PCM WAV.
pub fn extract_audio(
    input: &Path,
    output: &Path,
    sample_rate: u32,
    channels: u16,
) -> Result<AudioMetadata> {
    require_input(input)?;
    info!("Extracting audio from {}", input.display());

    let duration = probe_duration(input)?;

    let mut command = ffmpeg();
    command
        .arg("-i")
        .arg(input)
        .args(["-vn", "-acodec", "pcm_s16le", "-ar"])
        .arg(sample_rate.to_string())
        .arg("-ac")
        .arg(channels.to_string())
        .arg(output);
    run_ffmpeg(command, "audio extraction")?;

    if !output.exists() {
        return Err(DubError::Transcoding(
            "Output file was not created".to_string(),
        ));
    }

    info!("Audio extracted to {}", output.display());

    Ok(AudioMetadata {
        duration: Duration::from_secs_f64(duration),
        sample_rate,
        channels,
    })
}

/// Extract `[start, end)` of an audio file as mono 16 kHz WAV.
pub fn extract_audio_segment(input: &Path, output: &Path, start: f64, end: f64) -> Result<()> {
    require_input(input)?;

    let duration = end - start;
    if duration <= 0.0 {
        return Err(DubError::Transcoding(
            "Segment duration is zero".to_string(),
        ));
    }

    debug!("Extracting segment: start={:.3}, duration={:.3}", start, duration);

    let mut command = ffmpeg();
    command
        .arg("-ss")
        .arg(format!("{start:.3}"))
        .arg("-t")
        .arg(format!("{duration:.3}"))
        .arg("-i")
        .arg(input)
        .args(["-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1"])
        .arg(output);
    run_ffmpeg(command, "segment extraction")
}

/// Copy the video stream without audio.
pub fn strip_audio(video: &Path, output: &Path) -> Result<()> {
    require_input(video)?;

    let mut command = ffmpeg();
    command
        .arg("-i")
        .arg(video)
        .args(["-vcodec", "copy", "-an"])
        .arg(output);
    run_ffmpeg(command, "audio removal")?;

    info!("Silent video written to {}", output.display());
    Ok(())
}

/// Combine a video stream with a new audio track.
pub fn mux_audio_video(video: &Path, audio: &Path, output: &Path) -> Result<()> {
    require_input(video)?;
    require_input(audio)?;

    let mut command = ffmpeg();
    command
        .arg("-i")
        .arg(video)
        .arg("-i")
        .arg(audio)
        .args([
            "-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy", "-c:a", "aac", "-b:a", "192k",
        ])
        .arg(output);
    run_ffmpeg(command, "mux")?;

    info!("Muxed {} into {}", audio.display(), output.display());
    Ok(())
}

/// Add subtitles as a selectable `mov_text` track tagged with `language` (ISO 639-2).
pub fn embed_subtitles(video: &Path, subtitles: &Path, language: &str, output: &Path) -> Result<()> {
    require_input(video)?;
    require_input(subtitles)?;

    let mut command = ffmpeg();
    command
        .arg("-i")
        .arg(video)
        .arg("-i")
        .arg(subtitles)
        .args(["-map", "0", "-map", "1", "-c", "copy", "-c:s", "mov_text"])
        .arg("-metadata:s:s:0")
        .arg(format!("language={language}"))
        .arg(output);
    run_ffmpeg(command, "subtitle embedding")?;

    info!("Embedded {} into {}", subtitles.display(), output.display());
    Ok(())
}

/// Render subtitles into the picture.
pub fn burn_subtitles(video: &Path, subtitles: &Path, output: &Path) -> Result<()> {
    require_input(video)?;
    require_input(subtitles)?;

    let mut command = ffmpeg();
    command
        .arg("-i")
        .arg(video)
        .arg("-vf")
        .arg(format!("subtitles={}", subtitles.display()))
        .arg(output);
    run_ffmpeg(command, "subtitle burn-in")
}
