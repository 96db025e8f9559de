use std::path::Path;

use tracing::{debug, info};

use crate::config::SilenceConfig;
use crate::error::Result;
use crate::timeline::SilenceInterval;

use super::track::AudioTrack;

/// Loudness of a sample window relative to full scale, in dB.
fn frame_dbfs(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return f64::NEG_INFINITY;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64;
            v * v
        })
        .sum();
    let rms = (sum_squares / samples.len() as f64).sqrt();
    if rms == 0.0 {
        return f64::NEG_INFINITY;
    }
    20.0 * (rms / 32768.0).log10()
}

/// Detect silence in a WAV file.
pub fn detect_silence(audio_path: &Path, config: &SilenceConfig) -> Result<Vec<SilenceInterval>> {
    let track = AudioTrack::read_wav(audio_path)?;
    info!(
        "Scanning {} for silence: {} Hz, {} channels, {:.1}s",
        audio_path.display(),
        track.sample_rate(),
        track.channels(),
        track.duration()
    );
    Ok(detect_silence_in_track(&track, config))
}

/// Find every stretch quieter than `threshold_dbfs` lasting at least `min_duration`.
pub fn detect_silence_in_track(track: &AudioTrack, config: &SilenceConfig) -> Vec<SilenceInterval> {
    let frame_len =
        ((config.frame_ms as u64 * track.sample_rate() as u64) / 1000).max(1) as usize;
    let samples_per_frame = frame_len * track.channels() as usize;

    let silent: Vec<bool> = track
        .samples()
        .chunks(samples_per_frame)
        .map(|frame| frame_dbfs(frame) < config.threshold_dbfs)
        .collect();

    let frame_secs = frame_len as f64 / track.sample_rate() as f64;
    let intervals = frames_to_silences(&silent, frame_secs, track.duration(), config.min_duration);

    debug!(
        "{} of {} frames silent, {} intervals of at least {:.2}s",
        silent.iter().filter(|&&s| s).count(),
        silent.len(),
        intervals.len(),
        config.min_duration
    );

    intervals
}

fn frames_to_silences(
    silent: &[bool],
    frame_secs: f64,
    total_secs: f64,
    min_duration: f64,
) -> Vec<SilenceInterval> {
    let mut intervals = Vec::new();
    let mut run_start: Option<usize> = None;

    let close = |start: usize, end: usize, intervals: &mut Vec<SilenceInterval>| {
        let start_secs = start as f64 * frame_secs;
        let end_secs = (end as f64 * frame_secs).min(total_secs);
        if end_secs - start_secs >= min_duration {
            intervals.push(SilenceInterval::new(start_secs, end_secs));
        }
    };

    for (i, &is_silent) in silent.iter().enumerate() {
        match (is_silent, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                close(start, i, &mut intervals);
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        close(start, silent.len(), &mut intervals);
    }

    intervals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_dbfs() {
        assert_eq!(frame_dbfs(&[0; 100]), f64::NEG_INFINITY);
        let full = frame_dbfs(&[i16::MIN; 100]);
        assert!(full.abs() < 1e-9);
        let quiet = frame_dbfs(&[10; 100]);
        assert!(quiet < -50.0);
    }

    #[test]
    fn test_frames_to_silences() {
        let frames = [true, true, true, false, true, false, true, true];
        let intervals = frames_to_silences(&frames, 0.5, 4.0, 1.0);
        assert_eq!(
            intervals,
            vec![SilenceInterval::new(0.0, 1.5), SilenceInterval::new(3.0, 4.0)]
        );
    }

    #[test]
    fn test_detects_silence_between_speech() {
        let rate = 1000;
        let mut samples = vec![8000i16; rate];
        samples.extend(vec![0i16; 2 * rate]);
        samples.extend(vec![8000i16; rate]);
        let track = AudioTrack::new(samples, rate as u32, 1);

        let intervals = detect_silence_in_track(&track, &SilenceConfig::default());
        assert_eq!(intervals.len(), 1);
        assert!((intervals[0].start - 1.0).abs() < 1e-9);
        assert!((intervals[0].end - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_pause_is_ignored() {
        let rate = 1000;
        let mut samples = vec![8000i16; rate];
        samples.extend(vec![0i16; rate / 2]);
        samples.extend(vec![8000i16; rate]);
        let track = AudioTrack::new(samples, rate as u32, 1);

        assert!(detect_silence_in_track(&track, &SilenceConfig::default()).is_empty());
    }
}
