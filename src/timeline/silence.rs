use std::collections::VecDeque;

use tracing::debug;

use crate::error::{DubError, Result};

use super::SilenceInterval;

/// Which boundary of a query window a matched silence belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryPosition {
    /// Leading pause, attributed before the spoken text.
    Start,
    /// Trailing pause, carved out of the end of the spoken text.
    End,
}

/// A silence handed out by [`SilenceIndex::take_window`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaggedSilence {
    pub interval: SilenceInterval,
    pub position: BoundaryPosition,
}

/// Ordered silences of one audio track, consumed front to back.
///
/// Every interval leaves the index exactly once: either it is returned by a
/// window query (ownership passes to the caller) or it is discarded because a
/// later window already moved past its start. Queries must move forward in time.
#[derive(Debug, Clone, Default)]
pub struct SilenceIndex {
    pending: VecDeque<SilenceInterval>,
    cursor: Option<f64>,
    matched: usize,
    discarded: usize,
}

impl SilenceIndex {
    pub fn new(mut intervals: Vec<SilenceInterval>) -> Self {
        let before = intervals.len();
        intervals.retain(|s| s.end > s.start);
        if intervals.len() != before {
            debug!(
                "Dropped {} empty silence intervals",
                before - intervals.len()
            );
        }
        intervals.sort_by(|a, b| a.start.total_cmp(&b.start));

        Self {
            pending: intervals.into(),
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Intervals not yet matched or discarded.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of intervals handed out so far.
    pub fn matched(&self) -> usize {
        self.matched
    }

    /// Number of intervals skipped because a query passed them.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Remove and return every interval whose start lies in `[start, end]`,
    /// tagged with the window boundary it belongs to.
    ///
    /// Intervals starting before `start` are dropped. A window starting before
    /// the previous one is a defect.
    pub fn take_window(&mut self, start: f64, end: f64) -> Result<Vec<TaggedSilence>> {
        if let Some(cursor) = self.cursor {
            if start < cursor {
                return Err(DubError::Defect(format!(
                    "silence query moved backward: window starts at {start:.3}s after a window at {cursor:.3}s"
                )));
            }
        }
        self.cursor = Some(start);

        while let Some(front) = self.pending.front() {
            if front.start >= start {
                break;
            }
            self.pending.pop_front();
            self.discarded += 1;
        }

        let mut taken = Vec::new();
        while let Some(front) = self.pending.front() {
            if front.start > end {
                break;
            }
            let interval = *front;
            self.pending.pop_front();
            taken.push(TaggedSilence {
                interval,
                position: tag(&interval, start, end),
            });
        }

        self.matched += taken.len();
        Ok(taken)
    }
}

fn tag(interval: &SilenceInterval, start: f64, end: f64) -> BoundaryPosition {
    if interval.end > end {
        return BoundaryPosition::End;
    }
    let mid = interval.midpoint();
    if mid - start < end - mid {
        BoundaryPosition::Start
    } else {
        BoundaryPosition::End
    }
}
