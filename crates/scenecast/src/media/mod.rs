pub mod ffmpeg;

use anyhow::Result;
use async_trait::async_trait;
use engine::render::RenderCommand;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use ffmpeg::FfmpegEncoder;

/// What the pipeline needs to know about a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration_ticks: i64,
    pub has_video: bool,
}

/// Runs the render commands the merge stage plans and measures media.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn run(&self, command: &RenderCommand) -> Result<()>;

    async fn probe(&self, path: &Path) -> Result<MediaInfo>;

    /// Duration of a media file in ticks.
    async fn probe_duration(&self, path: &Path) -> Result<i64> {
        Ok(self.probe(path).await?.duration_ticks)
    }
}
