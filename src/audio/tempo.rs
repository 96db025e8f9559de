use std::process::Command;

use tempfile::TempDir;
use tracing::debug;

use crate::error::{DubError, Result};

use super::track::AudioTrack;

/// Changes playback speed by a scalar factor; `factor > 1` shortens the track.
pub trait TimeStretcher: Send + Sync {
    fn stretch(&self, track: &AudioTrack, factor: f64) -> Result<AudioTrack>;

    fn name(&self) -> &'static str;
}

/// Stretch `clip` so it lasts `target` seconds.
pub fn fit_to_duration(
    stretcher: &dyn TimeStretcher,
    clip: &AudioTrack,
    target: f64,
) -> Result<AudioTrack> {
    if target <= 0.0 || target.is_nan() {
        return Err(DubError::Defect(format!(
            "cannot fit audio to non-positive duration {target:.3}s"
        )));
    }
    if clip.is_empty() {
        debug!("Empty clip, substituting {:.2}s of silence", target);
        return Ok(AudioTrack::silent(target, clip.sample_rate(), clip.channels()));
    }

    let factor = clip.duration() / target;
    debug!(
        "Fitting {:.2}s clip to {:.2}s (tempo {:.4}) with {}",
        clip.duration(),
        target,
        factor,
        stretcher.name()
    );
    stretcher.stretch(clip, factor)
}

/// Pure resampling stretch. Changes pitch along with tempo but hits the target
/// frame count exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearStretcher;

impl TimeStretcher for LinearStretcher {
    fn stretch(&self, track: &AudioTrack, factor: f64) -> Result<AudioTrack> {
        if factor <= 0.0 || !factor.is_finite() {
            return Err(DubError::Defect(format!("invalid tempo factor {factor}")));
        }
        let target_frames = (track.frames() as f64 / factor).round() as usize;
        Ok(track.resample_to_frames(target_frames))
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

/// Pitch-preserving stretch through FFmpeg's `atempo` filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtempoStretcher;

/// Split `factor` into `atempo` stages that each stay within [0.5, 2.0].
pub fn atempo_chain(factor: f64) -> Vec<f64> {
    let mut stages = Vec::new();
    let mut remaining = factor;
    while remaining > 2.0 {
        stages.push(2.0);
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        stages.push(0.5);
        remaining /= 0.5;
    }
    stages.push(remaining);
    stages
}

fn atempo_filter(factor: f64) -> String {
    atempo_chain(factor)
        .iter()
        .map(|f| format!("atempo={f:.6}"))
        .collect::<Vec<_>>()
        .join(",")
}

impl TimeStretcher for AtempoStretcher {
    fn stretch(&self, track: &AudioTrack, factor: f64) -> Result<AudioTrack> {
        if factor <= 0.0 || !factor.is_finite() {
            return Err(DubError::Defect(format!("invalid tempo factor {factor}")));
        }

        let dir = TempDir::new()?;
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        track.write_wav(&input)?;

        let filter = atempo_filter(factor);
        debug!("Running ffmpeg with -filter:a {}", filter);

        let result = Command::new("ffmpeg")
            .args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
            .arg(&input)
            .args(["-filter:a", &filter])
            .arg(&output)
            .output()
            .map_err(|e| DubError::Transcoding(format!("Failed to run FFmpeg: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(DubError::Transcoding(format!(
                "FFmpeg atempo failed: {stderr}"
            )));
        }

        AudioTrack::read_wav(&output)
    }

    fn name(&self) -> &'static str {
        "ffmpeg atempo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atempo_chain_in_range() {
        assert_eq!(atempo_chain(1.25), vec![1.25]);
        assert_eq!(atempo_chain(5.0), vec![2.0, 2.0, 1.25]);
        assert_eq!(atempo_chain(0.2), vec![0.5, 0.5, 0.8]);
    }

    #[test]
    fn test_atempo_chain_product() {
        for factor in [0.1, 0.37, 0.5, 1.0, 2.0, 3.3, 17.0] {
            let product: f64 = atempo_chain(factor).iter().product();
            assert!((product - factor).abs() < 1e-9, "factor {factor}");
            assert!(atempo_chain(factor)
                .iter()
                .all(|f| (0.5..=2.0).contains(f)));
        }
    }

    #[test]
    fn test_atempo_filter_string() {
        assert_eq!(atempo_filter(4.0), "atempo=2.000000,atempo=2.000000");
    }

    #[test]
    fn test_linear_fit_hits_target() {
        let clip = AudioTrack::new(vec![500; 22050 * 3], 22050, 1);
        let fitted = fit_to_duration(&LinearStretcher, &clip, 2.0).unwrap();
        assert_eq!(fitted.frames(), 44100);
        assert_eq!(fitted.duration(), 2.0);

        let slowed = fit_to_duration(&LinearStretcher, &clip, 4.5).unwrap();
        assert_eq!(slowed.duration(), 4.5);
    }

    #[test]
    fn test_fit_rejects_non_positive_target() {
        let clip = AudioTrack::new(vec![1; 100], 100, 1);
        assert!(fit_to_duration(&LinearStretcher, &clip, 0.0).is_err());
    }

    #[test]
    fn test_fit_empty_clip_is_silence() {
        let clip = AudioTrack::empty(1000, 1);
        let fitted = fit_to_duration(&LinearStretcher, &clip, 1.5).unwrap();
        assert_eq!(fitted.frames(), 1500);
    }
}
