use anyhow::{Context, Result};
use engine::manifest::{ClipManifest, TimelineManifest};
use engine::merge::{plan_merge, Correction, CorrectionKind};
use engine::render::{audio_track_command, mux_command, video_track_command};
use engine::script::Script;
use engine::subtitle::to_srt;
use engine::timeline::{frame_ticks, ticks_to_secs};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::media::Encoder;

#[derive(Debug, Clone, Serialize)]
pub struct MergeOutput {
    pub video_path: PathBuf,
    pub subtitle_path: PathBuf,
    pub duration_ticks: i64,
    pub corrections: Vec<Correction>,
}

fn describe(correction: &Correction) -> String {
    let secs = ticks_to_secs(correction.ticks);
    match correction.kind {
        CorrectionKind::HoldFinalFrame => format!("holding last frame for {:.3}s", secs),
        CorrectionKind::TruncateVideo => format!("cutting {:.3}s of video", secs),
        CorrectionKind::PadAudioSilence => format!("padding {:.3}s of silence", secs),
        CorrectionKind::WidenToOneFrame => format!("widening by {:.3}s to one frame", secs),
        CorrectionKind::DropEmptyScene => "dropping empty unnarrated scene".to_string(),
    }
}

/// `out.mp4` -> `out.partial.mp4`, so a failed run never leaves a
/// plausible-looking output behind.
fn partial_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("mp4");
    path.with_file_name(format!("{}.partial.{}", stem, ext))
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove {:?}: {}", path, e);
        }
    }
}

/// Plan, render and mux. Nothing is written to the output path unless every
/// step succeeds.
pub async fn merge(
    encoder: &dyn Encoder,
    config: &Config,
    script: &Script,
    recording: &TimelineManifest,
    clips: &ClipManifest,
) -> Result<MergeOutput> {
    let policy = config.merge_policy(script.project.fps);
    let plan = plan_merge(script, &recording.timeline, &clips.by_scene(), &policy)?;

    let source = encoder
        .probe(&recording.video_path)
        .await
        .with_context(|| format!("Failed to read the recording {:?}", recording.video_path))?;
    if !source.has_video {
        anyhow::bail!("The recording {:?} has no video stream", recording.video_path);
    }
    let recorded_until = plan.segments.iter().map(|s| s.source_end_ticks).max().unwrap_or(0);
    if source.duration_ticks + frame_ticks(script.project.fps) < recorded_until {
        warn!(
            "Recording runs {:.3}s but scenes reach {:.3}s; the last frame fills the gap",
            ticks_to_secs(source.duration_ticks),
            ticks_to_secs(recorded_until)
        );
    }

    for correction in &plan.corrections {
        warn!("Scene {}: {}", correction.scene_id, describe(correction));
    }
    info!(
        "Merging {} segment(s), {:.2}s total",
        plan.segments.len(),
        ticks_to_secs(plan.total_ticks)
    );

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", config.work_dir))?;
    if let Some(parent) = config.output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let video_track = config.video_track_path();
    let audio_track = config.audio_track_path();
    let partial = partial_path(&config.output_path);

    let rendered = async {
        encoder
            .run(&video_track_command(&plan, &script.project, &recording.video_path, video_track.clone()))
            .await
            .context("Rendering the video track failed")?;
        encoder
            .run(&audio_track_command(&plan, audio_track.clone()))
            .await
            .context("Rendering the narration track failed")?;
        encoder
            .run(&mux_command(&video_track, &audio_track, partial.clone()))
            .await
            .context("Muxing the final video failed")?;
        anyhow::Ok(())
    }
    .await;

    // Tracks are kept on failure.
    if let Err(e) = rendered {
        remove_quietly(&partial).await;
        return Err(e);
    }

    tokio::fs::rename(&partial, &config.output_path)
        .await
        .with_context(|| format!("Failed to move the result to {:?}", config.output_path))?;

    let subtitle_path = config.subtitle_path();
    let subtitle_partial = partial_path(&subtitle_path);
    tokio::fs::write(&subtitle_partial, to_srt(&plan.cues)).await?;
    tokio::fs::rename(&subtitle_partial, &subtitle_path).await?;

    match encoder.probe_duration(&config.output_path).await {
        Ok(actual) if (actual - plan.total_ticks).abs() > frame_ticks(script.project.fps) => warn!(
            "Output runs {:.3}s, planned {:.3}s",
            ticks_to_secs(actual),
            ticks_to_secs(plan.total_ticks)
        ),
        Ok(_) => {}
        Err(e) => warn!("Could not verify output duration: {:#}", e),
    }

    if !config.keep_artifacts {
        remove_quietly(&video_track).await;
        remove_quietly(&audio_track).await;
        for clip in &clips.clips {
            remove_quietly(&clip.path).await;
        }
    }

    info!("Wrote {:?} and {:?}", config.output_path, subtitle_path);
    Ok(MergeOutput {
        video_path: config.output_path.clone(),
        subtitle_path,
        duration_ticks: plan.total_ticks,
        corrections: plan.corrections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::media::MediaInfo;
    use engine::error::MergeError;
    use engine::merge::AudioClip;
    use engine::render::RenderCommand;
    use engine::script::ScriptFormat;
    use engine::timeline::{secs_to_ticks, Timeline};
    use std::sync::Mutex;

    /// Touches every output so later steps find their inputs.
    #[derive(Default)]
    struct TouchEncoder {
        outputs: Mutex<Vec<PathBuf>>,
        fail_mux: bool,
        no_video: bool,
        duration: i64,
    }

    #[async_trait]
    impl Encoder for TouchEncoder {
        async fn run(&self, command: &RenderCommand) -> anyhow::Result<()> {
            let is_mux = command.ffmpeg_args.iter().any(|a| a == "+faststart");
            if is_mux && self.fail_mux {
                tokio::fs::write(&command.output_path, b"half").await?;
                anyhow::bail!("ffmpeg exited with 1");
            }
            tokio::fs::write(&command.output_path, b"media").await?;
            self.outputs.lock().unwrap().push(command.output_path.clone());
            Ok(())
        }

        async fn probe(&self, _path: &Path) -> anyhow::Result<MediaInfo> {
            Ok(MediaInfo {
                duration_ticks: self.duration,
                has_video: !self.no_video,
            })
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        config: Config,
        script: Script,
        recording: TimelineManifest,
        clips: ClipManifest,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_path: dir.path().join("out/demo.mp4"),
            work_dir: dir.path().join("work"),
            audio_dir: dir.path().join("audio"),
            ..Config::default()
        };
        std::fs::create_dir_all(&config.audio_dir).unwrap();
        let clip_path = config.audio_dir.join("welcome.mp3");
        std::fs::write(&clip_path, b"mp3").unwrap();

        let mut script = Script::parse_str(
            "scenes:\n  - id: welcome\n    narration: Welcome to the tour\n  - id: pause\n    duration: 1\n",
            ScriptFormat::Yaml,
        )
        .unwrap();
        let clips = ClipManifest::new(
            "2026-01-01T00:00:00Z".to_string(),
            vec![AudioClip {
                scene_id: "welcome".to_string(),
                path: clip_path,
                duration_ticks: secs_to_ticks(2.4),
            }],
        );
        let mut timeline = Timeline::build(&mut script, &clips.durations()).unwrap();
        timeline.entries[0].record_actual(secs_to_ticks(0.5), secs_to_ticks(2.5));
        timeline.entries[1].record_actual(secs_to_ticks(2.5), secs_to_ticks(3.5));
        let recording = TimelineManifest::new(
            "2026-01-01T00:00:00Z".to_string(),
            dir.path().join("recording.webm"),
            timeline,
        );
        Fixture {
            _dir: dir,
            config,
            script,
            recording,
            clips,
        }
    }

    #[tokio::test]
    async fn writes_video_and_subtitles_then_cleans_up() {
        let f = fixture();
        let encoder = TouchEncoder {
            duration: secs_to_ticks(3.4),
            ..TouchEncoder::default()
        };

        let out = merge(&encoder, &f.config, &f.script, &f.recording, &f.clips)
            .await
            .unwrap();
        assert_eq!(out.duration_ticks, secs_to_ticks(3.4));
        assert!(f.config.output_path.exists());
        assert!(!partial_path(&f.config.output_path).exists());

        let srt = std::fs::read_to_string(&out.subtitle_path).unwrap();
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:02,400\nWelcome to the tour"));

        assert_eq!(out.corrections.len(), 1);
        assert_eq!(out.corrections[0].kind, CorrectionKind::HoldFinalFrame);
        assert!(!f.clips.clips[0].path.exists());
        assert!(!f.config.video_track_path().exists());
        assert!(!f.config.audio_track_path().exists());
    }

    #[tokio::test]
    async fn mismatched_timeline_writes_nothing() {
        let mut f = fixture();
        f.recording.timeline.entries.pop();
        let encoder = TouchEncoder::default();

        let err = merge(&encoder, &f.config, &f.script, &f.recording, &f.clips)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MergeError>(),
            Some(MergeError::EntryCountMismatch { expected: 2, recorded: 1 })
        ));
        assert!(encoder.outputs.lock().unwrap().is_empty());
        assert!(!f.config.output_path.exists());
        assert!(f.clips.clips[0].path.exists());
    }

    #[tokio::test]
    async fn failed_mux_leaves_no_output() {
        let f = fixture();
        let encoder = TouchEncoder {
            fail_mux: true,
            ..TouchEncoder::default()
        };

        assert!(merge(&encoder, &f.config, &f.script, &f.recording, &f.clips).await.is_err());
        assert!(!f.config.output_path.exists());
        assert!(!partial_path(&f.config.output_path).exists());
        assert!(!f.config.subtitle_path().exists());
        assert!(f.config.video_track_path().exists());
        assert!(f.config.audio_track_path().exists());
        assert!(f.clips.clips[0].path.exists());
    }

    #[tokio::test]
    async fn recording_without_video_is_refused_before_rendering() {
        let f = fixture();
        let encoder = TouchEncoder {
            no_video: true,
            ..TouchEncoder::default()
        };

        let err = merge(&encoder, &f.config, &f.script, &f.recording, &f.clips)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no video stream"));
        assert!(encoder.outputs.lock().unwrap().is_empty());
        assert!(!f.config.output_path.exists());
    }

    #[test]
    fn partial_name_keeps_extension() {
        assert_eq!(
            partial_path(Path::new("out/demo.mp4")),
            PathBuf::from("out/demo.partial.mp4")
        );
    }
}
