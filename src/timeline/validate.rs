//! Invariant checks shared by reconciliation and rendering.

use serde::Serialize;

use crate::error::{Result, TimelineViolation};

use super::{ReconciledSegment, TranscriptSegment};

/// Boundaries closer than this are considered equal.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Check transcript input: finite, non-negative, positive-length segments ordered by start.
pub fn validate_transcript(segments: &[TranscriptSegment]) -> Result<()> {
    for (index, segment) in segments.iter().enumerate() {
        if !segment.start.is_finite() || !segment.end.is_finite() {
            return Err(TimelineViolation::InvalidSegment {
                index,
                reason: "timestamp is not finite".to_string(),
            }
            .into());
        }
        if segment.start < 0.0 {
            return Err(TimelineViolation::InvalidSegment {
                index,
                reason: format!("negative start {:.3}s", segment.start),
            }
            .into());
        }
        if segment.end <= segment.start {
            return Err(TimelineViolation::NonPositiveDuration {
                index,
                duration: segment.end - segment.start,
            }
            .into());
        }
        if index > 0 && segment.start < segments[index - 1].start {
            return Err(TimelineViolation::Unordered {
                index,
                prev: index - 1,
                start: segment.start,
                prev_start: segments[index - 1].start,
            }
            .into());
        }
    }
    Ok(())
}

/// Check a reconciled sequence: non-empty, positive durations, ordered, gapless,
/// and no two silences in a row.
pub fn validate_timeline(entries: &[ReconciledSegment]) -> Result<()> {
    if entries.is_empty() {
        return Err(TimelineViolation::Empty.into());
    }

    for (index, entry) in entries.iter().enumerate() {
        let duration = entry.end - entry.start;
        if duration <= 0.0 || entry.duration <= 0.0 || duration.is_nan() {
            return Err(TimelineViolation::NonPositiveDuration {
                index,
                duration: duration.min(entry.duration),
            }
            .into());
        }

        if index == 0 {
            continue;
        }
        let prev = &entries[index - 1];

        if entry.start < prev.start {
            return Err(TimelineViolation::Unordered {
                index,
                prev: index - 1,
                start: entry.start,
                prev_start: prev.start,
            }
            .into());
        }

        let gap = entry.start - prev.end;
        if gap > BOUNDARY_EPSILON {
            return Err(TimelineViolation::Gap { index, gap }.into());
        }
        if gap < -BOUNDARY_EPSILON {
            return Err(TimelineViolation::Overlap {
                index,
                overlap: -gap,
            }
            .into());
        }

        if prev.is_silence() && entry.is_silence() {
            return Err(TimelineViolation::AdjacentSilence {
                index: index - 1,
                next: index,
            }
            .into());
        }
    }

    Ok(())
}

/// Check that a reconciled sequence spans exactly the transcript it came from.
pub fn validate_coverage(
    entries: &[ReconciledSegment],
    transcript: &[TranscriptSegment],
) -> Result<()> {
    let (Some(first), Some(last)) = (entries.first(), entries.last()) else {
        return Err(TimelineViolation::Empty.into());
    };
    let (Some(t_first), Some(t_last)) = (transcript.first(), transcript.last()) else {
        return Err(TimelineViolation::Empty.into());
    };

    let lead = first.start - t_first.start;
    if lead.abs() > BOUNDARY_EPSILON {
        return Err(TimelineViolation::Gap {
            index: 0,
            gap: lead,
        }
        .into());
    }
    let tail = t_last.end - last.end;
    if tail.abs() > BOUNDARY_EPSILON {
        return Err(TimelineViolation::Gap {
            index: entries.len() - 1,
            gap: tail,
        }
        .into());
    }
    Ok(())
}

/// Observed deviation between rendered and expected track length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Drift {
    /// Position of the segment after which the drift was measured.
    pub index: usize,
    pub expected: f64,
    pub actual: f64,
}

impl Drift {
    /// Positive when the rendered track runs long.
    pub fn delta(&self) -> f64 {
        self.actual - self.expected
    }
}

/// Report drift when `actual` deviates from `expected` by more than `tolerance`.
pub fn check_drift(index: usize, expected: f64, actual: f64, tolerance: f64) -> Option<Drift> {
    if (actual - expected).abs() > tolerance {
        Some(Drift {
            index,
            expected,
            actual,
        })
    } else {
        None
    }
}
