//! Lecture-level concurrency. Each lecture is processed start to finish by one
//! task with its own silence index and output track; only whole lectures run in
//! parallel.

use crate::error::DubError;
use crate::pipeline::{caption_lecture, dub_lecture, CaptionResult, LectureContext, LectureResult};
use crate::workspace::lecture_id;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    Dub,
    Caption,
}

#[derive(Debug)]
pub enum LectureOutcome {
    Dubbed(Box<LectureResult>),
    Captioned(CaptionResult),
    Failed {
        lecture: String,
        error: String,
        defect: bool,
    },
    /// Not started because the run was interrupted.
    Skipped { lecture: String },
}

impl LectureOutcome {
    pub fn lecture(&self) -> &str {
        match self {
            LectureOutcome::Dubbed(r) => &r.lecture,
            LectureOutcome::Captioned(r) => &r.lecture,
            LectureOutcome::Failed { lecture, .. } | LectureOutcome::Skipped { lecture } => lecture,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LectureOutcome::Dubbed(_) | LectureOutcome::Captioned(_))
    }

    fn failed(lecture: String, e: &DubError) -> Self {
        LectureOutcome::Failed {
            lecture,
            error: e.to_string(),
            defect: e.is_defect(),
        }
    }
}

#[derive(Debug)]
pub struct BatchReport {
    /// In input order.
    pub outcomes: Vec<LectureOutcome>,
    pub total_time: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, LectureOutcome::Failed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, LectureOutcome::Skipped { .. }))
            .count()
    }
}

/// Runs many lectures with bounded concurrency. A failed lecture is recorded and
/// the rest keep going.
pub struct BatchRunner {
    ctx: Arc<LectureContext>,
    mode: BatchMode,
    concurrency: usize,
    cancelled: Arc<AtomicBool>,
    show_progress: bool,
}

impl BatchRunner {
    pub fn new(ctx: Arc<LectureContext>, mode: BatchMode) -> Self {
        let concurrency = ctx.config.concurrency.max(1);
        let show_progress = ctx.show_progress;
        Self {
            ctx,
            mode,
            concurrency,
            cancelled: Arc::new(AtomicBool::new(false)),
            show_progress,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Once set, lectures that have not started are skipped. Running lectures
    /// always finish.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn run(&self, videos: Vec<PathBuf>) -> BatchReport {
        let start_time = Instant::now();
        let total = videos.len();

        info!(
            "Processing {} lectures with concurrency {}",
            total, self.concurrency
        );

        let progress_bar = if self.show_progress && total > 1 {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} lectures ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut futures = FuturesUnordered::new();

        for (index, video) in videos.into_iter().enumerate() {
            let sem = semaphore.clone();
            let ctx = self.ctx.clone();
            let cancelled = self.cancelled.clone();
            let mode = self.mode;
            let lecture = lecture_id(&video);
            let fallback = lecture.clone();

            let handle = tokio::spawn(async move {
                let _permit = match sem.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return LectureOutcome::Skipped { lecture },
                };

                if cancelled.load(Ordering::Relaxed) {
                    debug!("{}: skipped after interrupt", lecture);
                    return LectureOutcome::Skipped { lecture };
                }

                match mode {
                    BatchMode::Dub => match dub_lecture(&video, &ctx).await {
                        Ok(result) => LectureOutcome::Dubbed(Box::new(result)),
                        Err(e) => LectureOutcome::failed(lecture, &e),
                    },
                    BatchMode::Caption => match caption_lecture(&video, &ctx).await {
                        Ok(result) => LectureOutcome::Captioned(result),
                        Err(e) => LectureOutcome::failed(lecture, &e),
                    },
                }
            });

            futures.push(async move {
                let outcome = handle.await.unwrap_or_else(|e| LectureOutcome::Failed {
                    lecture: fallback,
                    error: format!("task panicked: {e}"),
                    defect: false,
                });
                (index, outcome)
            });
        }

        let mut results: Vec<(usize, LectureOutcome)> = Vec::with_capacity(total);
        while let Some((index, outcome)) = futures.next().await {
            match &outcome {
                LectureOutcome::Failed { lecture, error, defect } => {
                    if *defect {
                        error!("{}: timeline defect, lecture aborted: {}", lecture, error);
                    } else {
                        warn!("{}: failed: {}", lecture, error);
                    }
                }
                LectureOutcome::Skipped { lecture } => warn!("{}: skipped", lecture),
                other => info!("{}: done", other.lecture()),
            }
            if let Some(ref pb) = progress_bar {
                pb.inc(1);
            }
            results.push((index, outcome));
        }

        if let Some(pb) = progress_bar {
            pb.finish_with_message("Batch complete");
        }

        results.sort_by_key(|(index, _)| *index);
        let report = BatchReport {
            outcomes: results.into_iter().map(|(_, o)| o).collect(),
            total_time: start_time.elapsed(),
        };

        info!(
            "Batch complete: {} succeeded, {} failed, {} skipped in {:.1}s",
            report.succeeded(),
            report.failed(),
            report.skipped(),
            report.total_time.as_secs_f64()
        );

        report
    }
}
