//! Rendering a reconciled timeline into one speech track.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::StitchConfig;
use crate::error::{DubError, Result};
use crate::synth::SpeechSynthesizer;
use crate::timeline::{check_drift, Drift, ReconciledSegment, SegmentKind};

use super::tempo::{fit_to_duration, TimeStretcher};
use super::track::AudioTrack;

/// A rendered lecture track and every drift observed while building it.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub track: AudioTrack,
    pub drifts: Vec<Drift>,
}

impl RenderOutput {
    pub fn max_drift(&self) -> f64 {
        self.drifts
            .iter()
            .map(|d| d.delta().abs())
            .fold(0.0, f64::max)
    }
}

/// Turns reconciled segments into audio, one segment at a time and in order.
///
/// Every append is butt-joined with no crossfade so the track length follows
/// the timeline exactly. Segments are never rendered concurrently: each append
/// depends on the length of the track built so far.
pub struct AudioStitcher {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    stretcher: Arc<dyn TimeStretcher>,
    config: StitchConfig,
    partial_dir: Option<PathBuf>,
}

impl AudioStitcher {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        stretcher: Arc<dyn TimeStretcher>,
        config: StitchConfig,
    ) -> Self {
        Self {
            synthesizer,
            stretcher,
            config,
            partial_dir: None,
        }
    }

    /// Where to leave the track built so far when a render aborts.
    pub fn with_partial_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.partial_dir = Some(dir.into());
        self
    }

    pub fn partial_path(&self, lecture_id: &str) -> Option<PathBuf> {
        self.partial_dir
            .as_ref()
            .map(|dir| dir.join(format!("{lecture_id}.partial.wav")))
    }

    pub async fn render(
        &self,
        lecture_id: &str,
        segments: &[ReconciledSegment],
        use_accelerator: bool,
    ) -> Result<RenderOutput> {
        let mut track = AudioTrack::empty(self.config.sample_rate, self.config.channels);
        let mut drifts = Vec::new();

        // The track starts where the timeline starts.
        let origin = segments.first().map(|s| s.start).unwrap_or(0.0);

        info!(
            "{}: rendering {} segments with {} and {}",
            lecture_id,
            segments.len(),
            self.synthesizer.name(),
            self.stretcher.name()
        );

        for (index, segment) in segments.iter().enumerate() {
            if let Err(e) = self
                .render_segment(lecture_id, index, segment, &mut track, use_accelerator)
                .await
            {
                self.save_partial(lecture_id, &track);
                return Err(e);
            }

            let expected = segment.end - origin;
            if let Some(drift) = check_drift(
                index,
                expected,
                track.duration(),
                self.config.drift_tolerance,
            ) {
                warn!(
                    "{}: drift at segment {}: expected {:.3}s, actual {:.3}s ({:+.3}s)",
                    lecture_id,
                    index,
                    drift.expected,
                    drift.actual,
                    drift.delta()
                );
                drifts.push(drift);
            }
        }

        info!(
            "{}: rendered {:.2}s of audio, {} drift warnings",
            lecture_id,
            track.duration(),
            drifts.len()
        );

        Ok(RenderOutput { track, drifts })
    }

    async fn render_segment(
        &self,
        lecture_id: &str,
        index: usize,
        segment: &ReconciledSegment,
        track: &mut AudioTrack,
        use_accelerator: bool,
    ) -> Result<()> {
        if segment.duration <= 0.0 {
            return Err(DubError::Defect(format!(
                "segment {index} has non-positive duration {:.3}s",
                segment.duration
            )));
        }

        let text = segment.text.trim();
        match segment.kind {
            SegmentKind::Silence => {
                debug!("{}: segment {} silence {:.2}s", lecture_id, index, segment.duration);
                track.append_silence(segment.duration);
            }
            SegmentKind::Text if text.is_empty() => {
                track.append_silence(segment.duration);
            }
            SegmentKind::Text => {
                debug!(
                    "{}: segment {} speech {:.2}s: {}",
                    lecture_id, index, segment.duration, text
                );
                let clip = self.synthesizer.synthesize(text, use_accelerator).await?;
                let fitted = fit_to_duration(self.stretcher.as_ref(), &clip, segment.duration)?;
                track.append(&fitted)?;
            }
        }
        Ok(())
    }

    fn save_partial(&self, lecture_id: &str, track: &AudioTrack) {
        let Some(path) = self.partial_path(lecture_id) else {
            return;
        };
        match track.write_wav(&path) {
            Ok(()) => warn!(
                "{}: render aborted, partial track ({:.2}s) left at {}",
                lecture_id,
                track.duration(),
                path.display()
            ),
            Err(e) => warn!("{}: could not write partial track: {}", lecture_id, e),
        }
    }

    /// Stretch the whole track by `length / reference_duration` so it lasts
    /// exactly `reference_duration`.
    pub fn conform(&self, track: &AudioTrack, reference_duration: f64) -> Result<AudioTrack> {
        if reference_duration <= 0.0 || !reference_duration.is_finite() {
            return Err(DubError::Defect(format!(
                "cannot conform to reference duration {reference_duration:.3}s"
            )));
        }
        if track.is_empty() {
            return Ok(AudioTrack::silent(
                reference_duration,
                track.sample_rate(),
                track.channels(),
            ));
        }

        let speed = track.duration() / reference_duration;
        info!(
            "Conforming {:.2}s track to {:.2}s (speed {:.4})",
            track.duration(),
            reference_duration,
            speed
        );

        let mut conformed = self.stretcher.stretch(track, speed)?;
        // Stretchers may be off by a few frames.
        conformed.set_duration(reference_duration);
        Ok(conformed)
    }
}
