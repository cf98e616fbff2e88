use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use engine::script::{resolve_voice, Script};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod browser;
mod config;
mod error;
mod jobs;
mod media;
mod tts;

use browser::HttpBrowserSession;
use config::Config;
use error::{JobError, Stage};
use jobs::{JobManager, JobType, Pipeline};
use media::FfmpegEncoder;
use tts::HttpSynthesizer;

#[derive(Parser)]
#[command(name = "scenecast", version, about = "Turn a scene script into a narrated screen recording")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize narration, record the browser and merge the result
    Run(JobArgs),
    /// Synthesize and measure narration only
    Audio(JobArgs),
    /// Record the browser against previously synthesized narration
    Record(JobArgs),
    /// Merge an existing recording with its narration
    Merge(JobArgs),
    /// Parse and validate a script, printing it back normalized
    Check {
        script: PathBuf,
    },
}

#[derive(Args, Clone)]
struct JobArgs {
    /// Scene script (.yaml, .yml or .json)
    script: PathBuf,

    /// Final video path
    #[arg(short, long, default_value = "output/demo.mp4")]
    output: PathBuf,

    /// Directory for manifests and intermediate tracks
    #[arg(long, env = "SCENECAST_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Directory for narration clips
    #[arg(long, env = "SCENECAST_AUDIO_DIR")]
    audio_dir: Option<PathBuf>,

    /// Voice name or preset, overriding the script
    #[arg(long)]
    voice: Option<String>,

    #[arg(long)]
    headless: bool,

    /// Keep narration clips and rendered tracks after merging
    #[arg(long)]
    keep_artifacts: bool,

    /// What to do when the video outlasts its narration: truncate or pad_audio
    #[arg(long)]
    overflow: Option<String>,

    /// Per-action timeout in seconds
    #[arg(long)]
    action_timeout: Option<f64>,

    #[arg(long)]
    action_retries: Option<u32>,
}

impl JobArgs {
    fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        config.output_path = self.output.clone();
        let parent = self.output.parent().map(PathBuf::from).unwrap_or_default();
        config.work_dir = self.work_dir.clone().unwrap_or_else(|| parent.join("work"));
        config.audio_dir = self.audio_dir.clone().unwrap_or_else(|| parent.join("audio"));
        if let Some(voice) = &self.voice {
            config.voice_override = Some(voice.clone());
        }
        if self.headless {
            config.headless = true;
        }
        if self.keep_artifacts {
            config.keep_artifacts = true;
        }
        if let Some(policy) = &self.overflow {
            config.overflow = config::parse_overflow(policy)?;
        }
        if let Some(secs) = self.action_timeout {
            config.action_timeout = Duration::from_secs_f64(secs.max(0.1));
        }
        if let Some(retries) = self.action_retries {
            config.action_retries = retries;
        }
        Ok(())
    }
}

fn load_script(path: &Path) -> Result<Script, JobError> {
    Script::from_file(path)
        .with_context(|| format!("Failed to load script {:?}", path))
        .map_err(|e| JobError::new(Stage::Parse, e))
}

async fn run_job(job_type: JobType, args: JobArgs) -> Result<(), JobError> {
    let mut config = Config::from_env().map_err(|e| JobError::new(Stage::Parse, e))?;
    args.apply(&mut config)
        .map_err(|e| JobError::new(Stage::Parse, e))?;

    let mut script = load_script(&args.script)?;
    if let Some(voice) = &config.voice_override {
        script.project.voice = resolve_voice(voice);
    }
    info!(
        "Loaded '{}': {} scene(s), {} narrated",
        script.project.name,
        script.scenes.len(),
        script.narrated_scenes().count()
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            on_signal.cancel();
        }
    });

    let synth = HttpSynthesizer::new(&config.tts_url).map_err(|e| JobError::new(Stage::Audio, e))?;
    let encoder = FfmpegEncoder::new(config.ffmpeg.clone(), config.ffprobe.clone());
    let session = matches!(job_type, JobType::Run | JobType::Record)
        .then(|| HttpBrowserSession::new(&config.driver_url));

    let jobs = Arc::new(JobManager::new());
    let mut events = jobs.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!("Job {} -> {:?}", event.job_id, event.status);
        }
    });

    let pipeline = Pipeline::new(config, jobs, Arc::new(synth), Arc::new(encoder), cancel);
    let report = pipeline.execute(job_type, &mut script, session).await?;

    if let Some(recording) = &report.recording {
        for line in recording.summary() {
            info!("{}", line);
        }
        let failed = recording.timeline.scenes_with_failures();
        if !failed.is_empty() {
            warn!("Scenes with failed actions: {}", failed.join(", "));
        }
    }
    if let Some(output) = &report.output {
        println!("{}", output.video_path.display());
        println!("{}", output.subtitle_path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => run_job(JobType::Run, args).await,
        Command::Audio(args) => run_job(JobType::Audio, args).await,
        Command::Record(args) => run_job(JobType::Record, args).await,
        Command::Merge(args) => run_job(JobType::Merge, args).await,
        Command::Check { script } => load_script(&script).and_then(|script| {
            let yaml = script
                .to_yaml()
                .map_err(|e| JobError::new(Stage::Parse, e))?;
            print!("{}", yaml);
            Ok(())
        }),
    };

    if let Err(e) = result {
        if e.is_cancelled() {
            error!("Cancelled during the {} stage", e.stage);
        } else {
            error!("{}", e);
        }
        for path in &e.retained {
            info!("Kept {:?}", path);
        }
        std::process::exit(1);
    }
}
