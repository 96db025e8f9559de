//! Timing reconciliation between speech recognition output and detected silence.
//!
//! A transcript and a set of amplitude-derived silences go in; a gapless sequence
//! of speak/silence instructions comes out.

pub mod reconcile;
pub mod silence;
pub mod validate;

pub use reconcile::{
    finalize, merge_adjacent_silence, placement, reconcile, Placement, SegmentReconciler,
    Transition,
};
pub use silence::{BoundaryPosition, SilenceIndex, TaggedSilence};
pub use validate::{
    check_drift, validate_coverage, validate_timeline, validate_transcript, Drift,
};

use serde::{Deserialize, Serialize};

/// A timestamped unit of recognized (and possibly translated) speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// An amplitude-derived range judged to contain no speech.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceInterval {
    pub start: f64,
    pub end: f64,
}

impl SilenceInterval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Text,
    Silence,
}

/// One speak or silence instruction in the reconciled timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledSegment {
    pub kind: SegmentKind,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

impl ReconciledSegment {
    pub fn text(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Text,
            start,
            end,
            duration: end - start,
            text: text.into(),
        }
    }

    pub fn silence(start: f64, end: f64) -> Self {
        Self {
            kind: SegmentKind::Silence,
            start,
            end,
            duration: end - start,
            text: String::new(),
        }
    }

    pub fn is_silence(&self) -> bool {
        self.kind == SegmentKind::Silence
    }

    pub fn is_text(&self) -> bool {
        self.kind == SegmentKind::Text
    }

    /// Recompute `duration` after `start` or `end` moved.
    pub fn refresh_duration(&mut self) {
        self.duration = self.end - self.start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_compute_duration() {
        let text = ReconciledSegment::text(1.0, 3.5, "hello");
        assert!(text.is_text());
        assert_eq!(text.duration, 2.5);

        let silence = ReconciledSegment::silence(3.5, 4.0);
        assert!(silence.is_silence());
        assert!(silence.text.is_empty());
        assert_eq!(silence.duration, 0.5);
    }

    #[test]
    fn test_silence_interval_midpoint() {
        let s = SilenceInterval::new(2.0, 4.0);
        assert_eq!(s.midpoint(), 3.0);
        assert_eq!(s.duration(), 2.0);
    }

    #[test]
    fn test_serialized_silence_omits_text() {
        let json = serde_json::to_string(&ReconciledSegment::silence(0.0, 1.0)).unwrap();
        assert!(json.contains("\"kind\":\"silence\""));
        assert!(!json.contains("\"text\""));

        let back: ReconciledSegment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ReconciledSegment::silence(0.0, 1.0));
    }
}
