use anyhow::{Context, Result};
use engine::merge::{MergePolicy, OverflowPolicy};
use engine::timeline::secs_to_ticks;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_TTS_URL: &str = "http://127.0.0.1:8002";
const DEFAULT_DRIVER_URL: &str = "http://127.0.0.1:8003";

/// Everything a job needs besides its script. Built once in `main` and
/// passed by reference into every stage; nothing reads the environment
/// after that.
#[derive(Debug, Clone)]
pub struct Config {
    /// Final video path; the subtitle file sits next to it.
    pub output_path: PathBuf,
    /// Intermediate artifacts: manifests, recording, rendered tracks.
    pub work_dir: PathBuf,
    pub audio_dir: PathBuf,
    pub tts_url: String,
    pub driver_url: String,
    pub voice_override: Option<String>,
    pub headless: bool,
    pub max_concurrent_synthesis: usize,
    /// Re-synthesize fixed-length scenes at a faster rate when they overrun.
    pub fit_voice_rate: bool,
    pub action_timeout: Duration,
    pub action_retries: u32,
    pub recording_margin: Duration,
    /// `None` means one frame at the project frame rate.
    pub merge_tolerance: Option<Duration>,
    pub overflow: OverflowPolicy,
    pub keep_artifacts: bool,
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output_path: PathBuf::from("output/demo.mp4"),
            work_dir: PathBuf::from("output/work"),
            audio_dir: PathBuf::from("output/audio"),
            tts_url: DEFAULT_TTS_URL.to_string(),
            driver_url: DEFAULT_DRIVER_URL.to_string(),
            voice_override: None,
            headless: false,
            max_concurrent_synthesis: 4,
            fit_voice_rate: true,
            action_timeout: Duration::from_secs(10),
            action_retries: 2,
            recording_margin: Duration::from_secs(30),
            merge_tolerance: None,
            overflow: OverflowPolicy::Truncate,
            keep_artifacts: false,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {}: {:?}", name, raw)),
        _ => Ok(None),
    }
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl Config {
    /// Defaults overridden by `SCENECAST_*` environment variables.
    pub fn from_env() -> Result<Config> {
        let mut config = Config::default();

        if let Some(dir) = env_parse::<PathBuf>("SCENECAST_WORK_DIR")? {
            config.work_dir = dir;
        }
        if let Some(dir) = env_parse::<PathBuf>("SCENECAST_AUDIO_DIR")? {
            config.audio_dir = dir;
        }
        if let Ok(url) = std::env::var("SCENECAST_TTS_URL") {
            config.tts_url = url;
        }
        if let Ok(url) = std::env::var("SCENECAST_DRIVER_URL") {
            config.driver_url = url;
        }
        if let Some(n) = env_parse::<usize>("SCENECAST_MAX_CONCURRENT_SYNTHESIS")? {
            config.max_concurrent_synthesis = n.max(1);
        }
        if let Some(secs) = env_parse::<f64>("SCENECAST_ACTION_TIMEOUT")? {
            config.action_timeout = Duration::from_secs_f64(secs.max(0.1));
        }
        if let Some(n) = env_parse::<u32>("SCENECAST_ACTION_RETRIES")? {
            config.action_retries = n;
        }
        if let Some(secs) = env_parse::<f64>("SCENECAST_RECORDING_MARGIN")? {
            config.recording_margin = Duration::from_secs_f64(secs.max(0.0));
        }
        if let Some(secs) = env_parse::<f64>("SCENECAST_MERGE_TOLERANCE")? {
            config.merge_tolerance = Some(Duration::from_secs_f64(secs.max(0.0)));
        }
        if let Ok(policy) = std::env::var("SCENECAST_OVERFLOW") {
            config.overflow = parse_overflow(&policy)?;
        }
        if let Some(keep) = env_bool("SCENECAST_KEEP_ARTIFACTS") {
            config.keep_artifacts = keep;
        }
        if let Some(fit) = env_bool("SCENECAST_FIT_VOICE_RATE") {
            config.fit_voice_rate = fit;
        }
        if let Ok(bin) = std::env::var("SCENECAST_FFMPEG") {
            config.ffmpeg = bin;
        }
        if let Ok(bin) = std::env::var("SCENECAST_FFPROBE") {
            config.ffprobe = bin;
        }

        Ok(config)
    }

    pub fn clips_manifest_path(&self) -> PathBuf {
        self.work_dir.join("clips.json")
    }

    pub fn timeline_manifest_path(&self) -> PathBuf {
        self.work_dir.join("timeline.json")
    }

    pub fn recording_dir(&self) -> PathBuf {
        self.work_dir.join("recording")
    }

    pub fn subtitle_path(&self) -> PathBuf {
        self.output_path.with_extension("srt")
    }

    pub fn video_track_path(&self) -> PathBuf {
        self.work_dir.join("video_track.mp4")
    }

    pub fn audio_track_path(&self) -> PathBuf {
        self.work_dir.join("audio_track.wav")
    }

    pub fn merge_policy(&self, fps: u32) -> MergePolicy {
        let mut policy = MergePolicy::new(fps);
        policy.overflow = self.overflow;
        if let Some(tolerance) = self.merge_tolerance {
            policy.tolerance_ticks = secs_to_ticks(tolerance.as_secs_f64());
        }
        policy
    }
}

pub fn parse_overflow(raw: &str) -> Result<OverflowPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "truncate" => Ok(OverflowPolicy::Truncate),
        "pad" | "pad_audio" | "pad-audio" => Ok(OverflowPolicy::PadAudio),
        other => anyhow::bail!("unknown overflow policy '{}', expected truncate or pad_audio", other),
    }
}
