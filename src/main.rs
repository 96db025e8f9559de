use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lecdub::batch::{BatchMode, BatchRunner, LectureOutcome};
use lecdub::config::{Config, SynthesizerKind, Task};
use lecdub::pipeline::{print_summary, reconcile_file, LectureContext};
use lecdub::synth::create_synthesizer;
use lecdub::transcribe::{ChunkedTranscriber, Transcriber, WhisperClient};
use lecdub::workspace::Workspace;
use lecdub::{AtempoStretcher, LinearStretcher, TimeStretcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "webm", "avi", "m4v"];

#[derive(Parser)]
#[command(name = "lecdub")]
#[command(version, about = "Dub recorded lectures into English")]
#[command(long_about = "Transcribe and translate lecture videos, realign the translated speech to the original pauses, synthesize it, and mux it back with subtitles.")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Dub lecture videos with synthesized translated speech
    Dub(BatchArgs),
    /// Add subtitles to lecture videos without dubbing
    Caption(BatchArgs),
    /// Reconcile a cached transcript and print the timeline as JSON
    Reconcile {
        /// Transcript JSON (a cached transcript or a list of segments)
        transcript: PathBuf,

        /// WAV audio to detect silence in and to take the true length from
        #[arg(short, long)]
        audio: Option<PathBuf>,

        /// Longest merged text segment in seconds (0 disables the cap)
        #[arg(long)]
        max_duration: Option<f64>,
    },
}

#[derive(Args)]
struct BatchArgs {
    /// Lecture videos, or directories containing them
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Working directory for intermediate and output files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Number of lectures processed at once
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Ignore cached transcripts and timelines (results are still cached)
    #[arg(long)]
    no_cache: bool,

    /// Speech synthesizer: coqui, openai
    #[arg(short, long)]
    synthesizer: Option<String>,

    /// Recognizer task: translate, transcribe
    #[arg(short, long)]
    task: Option<String>,

    /// Longest merged text segment in seconds (0 disables the cap)
    #[arg(long)]
    max_duration: Option<f64>,

    /// Run synthesis without GPU acceleration
    #[arg(long)]
    cpu: bool,

    /// Stretch speech by resampling instead of ffmpeg atempo
    #[arg(long)]
    linear_stretch: bool,

    /// Render subtitles into the picture instead of a selectable track
    #[arg(long)]
    burn_subtitles: bool,

    /// ISO 639-2 language tag for the subtitle track
    #[arg(long, default_value = "eng")]
    subtitle_language: String,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn apply_max_duration(config: &mut Config, max_duration: Option<f64>) {
    if let Some(max) = max_duration {
        config.reconcile.max_duration = if max > 0.0 { Some(max) } else { None };
    }
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Expand directories into the videos they contain, sorted by name.
fn collect_videos(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut videos = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("Failed to read {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_video(p))
                .collect();
            found.sort();
            if found.is_empty() {
                warn!("No videos found in {}", input.display());
            }
            videos.extend(found);
        } else if input.exists() {
            videos.push(input.clone());
        } else {
            anyhow::bail!("Input file not found: {}", input.display());
        }
    }
    Ok(videos)
}

async fn run_batch(mode: BatchMode, args: BatchArgs, show_progress: bool) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;

    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(ref kind) = args.synthesizer {
        config.synthesizer = kind
            .parse::<SynthesizerKind>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(ref task) = args.task {
        config.task = task.parse::<Task>().map_err(|e| anyhow::anyhow!(e))?;
    }
    if args.cpu {
        config.use_accelerator = false;
    }
    apply_max_duration(&mut config, args.max_duration);

    config
        .validate(true)
        .context("Configuration validation failed")?;

    let videos = collect_videos(&args.inputs)?;
    if videos.is_empty() {
        anyhow::bail!("No lecture videos to process");
    }

    let api_key = config.openai_api_key.clone().unwrap_or_default();
    let whisper = WhisperClient::new(api_key)
        .with_model(config.whisper_model.clone())
        .with_task(config.task);
    let transcriber: Arc<dyn Transcriber> = Arc::new(
        ChunkedTranscriber::new(Arc::new(whisper)).with_silence_config(config.silence.clone()),
    );
    let synthesizer = create_synthesizer(&config)?;
    let stretcher: Arc<dyn TimeStretcher> = if args.linear_stretch {
        Arc::new(LinearStretcher)
    } else {
        Arc::new(AtempoStretcher)
    };

    info!("Data dir:    {}", config.data_dir.display());
    info!("Lectures:    {}", videos.len());
    info!("Task:        {}", config.task);
    if mode == BatchMode::Dub {
        info!("Synthesizer: {}", config.synthesizer);
    }

    let workspace = Workspace::new(config.data_dir.clone());
    workspace.create_dirs()?;

    let ctx = LectureContext::new(config, workspace, transcriber, synthesizer)
        .with_stretcher(stretcher)
        .with_read_cache(!args.no_cache)
        .with_progress(show_progress)
        .with_subtitle_language(args.subtitle_language)
        .with_burn_subtitles(args.burn_subtitles);

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    ctrlc::set_handler(move || {
        if !flag.swap(true, Ordering::SeqCst) {
            eprintln!("\nInterrupted: finishing running lectures, no new ones will start");
        }
    })
    .context("Failed to install Ctrl+C handler")?;

    let report = BatchRunner::new(Arc::new(ctx), mode)
        .with_cancel_flag(cancelled)
        .with_progress(show_progress)
        .run(videos)
        .await;

    for outcome in &report.outcomes {
        match outcome {
            LectureOutcome::Dubbed(result) => print_summary(result),
            LectureOutcome::Captioned(result) => println!(
                "  {}: {} captions -> {}",
                result.lecture,
                result.entries,
                result.subtitled_video.display()
            ),
            LectureOutcome::Failed { lecture, error, .. } => {
                println!("  {}: FAILED: {}", lecture, error)
            }
            LectureOutcome::Skipped { lecture } => println!("  {}: skipped", lecture),
        }
    }

    if report.failed() > 0 {
        anyhow::bail!(
            "{} of {} lectures failed",
            report.failed(),
            report.outcomes.len()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);
    let show_progress = !cli.no_progress;

    match cli.command {
        Command::Dub(args) => run_batch(BatchMode::Dub, args, show_progress).await,
        Command::Caption(args) => run_batch(BatchMode::Caption, args, show_progress).await,
        Command::Reconcile {
            transcript,
            audio,
            max_duration,
        } => {
            let mut config = Config::load().context("Failed to load configuration")?;
            apply_max_duration(&mut config, max_duration);
            config
                .validate(false)
                .context("Configuration validation failed")?;

            let entries = reconcile_file(&transcript, audio.as_deref(), &config)
                .with_context(|| format!("Failed to reconcile {}", transcript.display()))?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_max_duration() {
        let mut config = Config::default();
        apply_max_duration(&mut config, Some(0.0));
        assert_eq!(config.reconcile.max_duration, None);
        apply_max_duration(&mut config, Some(12.5));
        assert_eq!(config.reconcile.max_duration, Some(12.5));
        apply_max_duration(&mut config, None);
        assert_eq!(config.reconcile.max_duration, Some(12.5));
    }

    #[test]
    fn test_collect_videos() {
        let dir = TempDir::new().unwrap();
        for name in ["b.mp4", "a.MKV", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let videos = collect_videos(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = videos
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.MKV", "b.mp4"]);

        assert!(collect_videos(&[dir.path().join("missing.mp4")]).is_err());
    }
}
