use anyhow::{Context, Result};
use async_trait::async_trait;
use engine::render::RenderCommand;
use engine::timeline::secs_to_ticks;
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use super::{Encoder, MediaInfo};

#[derive(Debug, Clone, Deserialize)]
struct ProbeOutput {
    format: Option<FormatInfo>,
    #[serde(default)]
    streams: Vec<StreamInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    duration: Option<String>,
}

fn parse_probe(stdout: &[u8]) -> Result<MediaInfo> {
    let probe: ProbeOutput =
        serde_json::from_slice(stdout).context("Failed to parse ffprobe JSON output")?;

    let has_video = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("video"));

    // Container duration first; WebM recordings often only carry it per stream.
    let duration_secs = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or_else(|| probe.streams.iter().find_map(|s| s.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(MediaInfo {
        duration_ticks: secs_to_ticks(duration_secs),
        has_video,
    })
}

/// Shells out to the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        FfmpegEncoder {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn run(&self, command: &RenderCommand) -> Result<()> {
        if let Some(parent) = command.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!("ffmpeg {}", command.ffmpeg_args.join(" "));

        let output = Command::new(&self.ffmpeg)
            .args(&command.ffmpeg_args)
            .output()
            .await
            .context("Failed to execute ffmpeg. Make sure FFmpeg is installed.")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(8).collect();
            anyhow::bail!(
                "ffmpeg failed writing {:?}: {}",
                command.output_path,
                tail.into_iter().rev().collect::<Vec<_>>().join("\n")
            );
        }
        Ok(())
    }

    async fn probe(&self, media_path: &Path) -> Result<MediaInfo> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration:stream=codec_type,duration",
                "-of",
                "json",
            ])
            .arg(media_path)
            .output()
            .await
            .context("Failed to execute ffprobe. Make sure FFmpeg is installed.")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffprobe failed on {:?}: {}", media_path, stderr.trim());
        }

        parse_probe(&output.stdout)
    }
}
