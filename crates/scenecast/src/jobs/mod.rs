pub mod merge;
pub mod narrate;
pub mod record;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use engine::manifest::{ClipManifest, TimelineManifest};
use engine::script::Script;
use engine::timeline::Timeline;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::browser::{BrowserSession, SessionSettings};
use crate::config::Config;
use crate::error::{JobError, Stage};
use crate::media::Encoder;
use crate::tts::Synthesizer;
use merge::MergeOutput;
use narrate::NarrationResolver;
use record::{recording_budget, RecordSettings, Recorder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Narration, recording and merge in one go.
    Run,
    Audio,
    Record,
    Merge,
}

impl JobType {
    fn stages(self) -> &'static [Stage] {
        match self {
            JobType::Run => &[Stage::Audio, Stage::Record, Stage::Merge],
            JobType::Audio => &[Stage::Audio],
            JobType::Record => &[Stage::Record],
            JobType::Merge => &[Stage::Merge],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running { stage: Stage },
    Completed,
    Failed { stage: Stage, message: String },
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Broadcast on every status change.
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub at: DateTime<Utc>,
}

pub struct JobManager {
    jobs: Mutex<HashMap<Uuid, Job>>,
    events: broadcast::Sender<JobEvent>,
}

impl JobManager {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        JobManager {
            jobs: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn create_job(&self, job_type: JobType) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        self.jobs.lock().unwrap().insert(
            id,
            Job {
                id,
                job_type,
                status: JobStatus::Pending,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn get_job(&self, id: Uuid) -> Option<Job> {
        self.jobs.lock().unwrap().get(&id).cloned()
    }

    pub fn update_job_status(&self, id: Uuid, status: JobStatus) {
        let now = Utc::now();
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&id) {
            job.status = status.clone();
            job.updated_at = now;
        }
        // No subscribers is fine.
        let _ = self.events.send(JobEvent {
            job_id: id,
            status,
            at: now,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

/// What a finished job produced.
#[derive(Debug, Default)]
pub struct JobReport {
    pub clips: Option<ClipManifest>,
    pub recording: Option<TimelineManifest>,
    pub output: Option<MergeOutput>,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Write JSON next to its final name, then rename over it.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("Failed to write {:?}", tmp))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {:?}", path))
}

/// Runs the stages of a job against shared collaborators.
pub struct Pipeline {
    config: Config,
    jobs: Arc<JobManager>,
    synth: Arc<dyn Synthesizer>,
    encoder: Arc<dyn Encoder>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        config: Config,
        jobs: Arc<JobManager>,
        synth: Arc<dyn Synthesizer>,
        encoder: Arc<dyn Encoder>,
        cancel: CancellationToken,
    ) -> Self {
        Pipeline {
            config,
            jobs,
            synth,
            encoder,
            cancel,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every stage of `job_type`. Stages that are not run read their
    /// inputs from the manifests a previous invocation left in the work dir.
    pub async fn execute<S: BrowserSession>(
        &self,
        job_type: JobType,
        script: &mut Script,
        session: Option<S>,
    ) -> Result<JobReport, JobError> {
        let job_id = self.jobs.create_job(job_type);
        info!("Job {} ({:?}) started for '{}'", job_id, job_type, script.project.name);

        let result = self.run_stages(job_id, job_type, script, session).await;
        match &result {
            Ok(_) => self.jobs.update_job_status(job_id, JobStatus::Completed),
            Err(e) if e.is_cancelled() => self.jobs.update_job_status(job_id, JobStatus::Cancelled),
            Err(e) => self.jobs.update_job_status(
                job_id,
                JobStatus::Failed {
                    stage: e.stage,
                    message: format!("{:#}", e.source),
                },
            ),
        }
        result
    }

    async fn run_stages<S: BrowserSession>(
        &self,
        job_id: Uuid,
        job_type: JobType,
        script: &mut Script,
        mut session: Option<S>,
    ) -> Result<JobReport, JobError> {
        let mut report = JobReport::default();

        for &stage in job_type.stages() {
            self.jobs.update_job_status(job_id, JobStatus::Running { stage });
            match stage {
                Stage::Audio => {
                    report.clips = Some(self.audio(script).await?);
                }
                Stage::Record => {
                    let clips = match report.clips.take() {
                        Some(clips) => clips,
                        None => self.load_clips(Stage::Record).await?,
                    };
                    let session = session.take().ok_or_else(|| {
                        JobError::new(Stage::Record, anyhow::anyhow!("no browser session available"))
                    })?;
                    report.recording = Some(self.record(script, &clips, session).await?);
                    report.clips = Some(clips);
                }
                Stage::Merge => {
                    let clips = match report.clips.take() {
                        Some(clips) => clips,
                        None => self.load_clips(Stage::Merge).await?,
                    };
                    let recording = match report.recording.take() {
                        Some(recording) => recording,
                        None => read_json(&self.config.timeline_manifest_path())
                            .await
                            .map_err(|e| JobError::new(Stage::Merge, e))?,
                    };
                    report.output = Some(self.merge(script, &recording, &clips).await?);
                    report.clips = Some(clips);
                    report.recording = Some(recording);
                }
                Stage::Parse => {}
            }
        }
        Ok(report)
    }

    async fn load_clips(&self, stage: Stage) -> Result<ClipManifest, JobError> {
        read_json(&self.config.clips_manifest_path())
            .await
            .map_err(|e| JobError::new(stage, e.context("run the audio stage first")))
    }

    pub async fn audio(&self, script: &Script) -> Result<ClipManifest, JobError> {
        let resolver = NarrationResolver::new(
            self.synth.clone(),
            self.encoder.clone(),
            self.config.audio_dir.clone(),
            self.config.max_concurrent_synthesis,
            self.config.fit_voice_rate,
        );
        let clips = resolver
            .resolve(script, &self.cancel)
            .await
            .map_err(|e| JobError::new(Stage::Audio, e).retaining([self.config.audio_dir.clone()]))?;

        let manifest = ClipManifest::new(now(), clips);
        write_json(&self.config.clips_manifest_path(), &manifest)
            .await
            .map_err(|e| JobError::new(Stage::Audio, e))?;
        info!("Narration ready: {} clip(s)", manifest.clips.len());
        Ok(manifest)
    }

    pub async fn record<S: BrowserSession>(
        &self,
        script: &mut Script,
        clips: &ClipManifest,
        session: S,
    ) -> Result<TimelineManifest, JobError> {
        let mut timeline = Timeline::build(script, &clips.durations())
            .map_err(|e| JobError::new(Stage::Record, e))?;
        for entry in &timeline.entries {
            if let Some(hint) = &entry.pacing {
                warn!(
                    "Scene {} needs at least {:.2}s for its actions but is planned for {:.2}s",
                    entry.scene_id,
                    engine::timeline::ticks_to_secs(hint.min_feasible_ticks),
                    engine::timeline::ticks_to_secs(hint.planned_ticks)
                );
            }
        }

        let settings = RecordSettings {
            session: SessionSettings {
                resolution: script.project.resolution,
                fps: script.project.fps,
                headless: self.config.headless,
                record_dir: self.config.recording_dir(),
            },
            action_timeout: self.config.action_timeout,
            action_retries: self.config.action_retries,
            margin: self.config.recording_margin,
        };
        let budget = recording_budget(script, &timeline, &settings);
        let manifest_path = self.config.timeline_manifest_path();

        let mut recorder = Recorder::new(session, settings);
        match recorder.record(script, &mut timeline, budget, &self.cancel).await {
            Ok(video) => {
                let manifest = TimelineManifest::new(now(), video, timeline);
                write_json(&manifest_path, &manifest)
                    .await
                    .map_err(|e| JobError::new(Stage::Record, e))?;
                let failed = manifest.timeline.scenes_with_failures();
                if !failed.is_empty() {
                    warn!("Recorded with failed actions in: {}", failed.join(", "));
                }
                Ok(manifest)
            }
            Err(e) => {
                let video = recorder
                    .partial_video()
                    .cloned()
                    .unwrap_or_else(|| self.config.recording_dir());
                let mut manifest = TimelineManifest::new(now(), video.clone(), timeline);
                manifest.aborted = true;
                if let Err(write_err) = write_json(&manifest_path, &manifest).await {
                    warn!("Could not save the partial timeline: {:#}", write_err);
                }
                Err(JobError::new(Stage::Record, e).retaining([
                    self.config.clips_manifest_path(),
                    manifest_path,
                    video,
                ]))
            }
        }
    }

    pub async fn merge(
        &self,
        script: &Script,
        recording: &TimelineManifest,
        clips: &ClipManifest,
    ) -> Result<MergeOutput, JobError> {
        if recording.aborted {
            return Err(JobError::new(
                Stage::Merge,
                anyhow::anyhow!("the recording was aborted; record again before merging"),
            ));
        }
        merge::merge(self.encoder.as_ref(), &self.config, script, recording, clips)
            .await
            .map_err(|e| {
                JobError::new(Stage::Merge, e).retaining([
                    self.config.clips_manifest_path(),
                    self.config.timeline_manifest_path(),
                    recording.video_path.clone(),
                    self.config.video_track_path(),
                    self.config.audio_track_path(),
                ])
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ActionError, RecordingError, SynthesisError};
    use crate::media::MediaInfo;
    use crate::tts::SpeechRequest;
    use async_trait::async_trait;
    use bytes::Bytes;
    use engine::render::RenderCommand;
    use engine::script::{Action, ScriptFormat};
    use engine::timeline::secs_to_ticks;
    use std::path::PathBuf;
    use std::time::Duration;

    struct EchoSynth;

    #[async_trait]
    impl Synthesizer for EchoSynth {
        async fn synthesize(&self, request: &SpeechRequest) -> Result<Bytes, SynthesisError> {
            Ok(Bytes::from(request.text.clone().into_bytes()))
        }
    }

    /// One byte of audio lasts 10ms; every render just touches its output.
    struct FakeEncoder;

    #[async_trait]
    impl Encoder for FakeEncoder {
        async fn run(&self, command: &RenderCommand) -> anyhow::Result<()> {
            tokio::fs::write(&command.output_path, b"media").await?;
            Ok(())
        }

        async fn probe(&self, path: &Path) -> anyhow::Result<MediaInfo> {
            let len = tokio::fs::metadata(path).await?.len();
            Ok(MediaInfo {
                duration_ticks: secs_to_ticks(len as f64 * 0.01),
                has_video: path.extension().is_some_and(|ext| ext == "webm" || ext == "mp4"),
            })
        }
    }

    /// Renders tracks but fails the final mux.
    struct FailingMux;

    #[async_trait]
    impl Encoder for FailingMux {
        async fn run(&self, command: &RenderCommand) -> anyhow::Result<()> {
            if command.ffmpeg_args.iter().any(|a| a == "+faststart") {
                anyhow::bail!("ffmpeg exited with 1");
            }
            FakeEncoder.run(command).await
        }

        async fn probe(&self, path: &Path) -> anyhow::Result<MediaInfo> {
            FakeEncoder.probe(path).await
        }
    }

    struct QuietSession {
        dir: PathBuf,
        fail_start: bool,
    }

    #[async_trait]
    impl BrowserSession for QuietSession {
        async fn start(&mut self, _settings: &SessionSettings) -> Result<(), RecordingError> {
            if self.fail_start {
                return Err(RecordingError::Start("no browser".to_string()));
            }
            Ok(())
        }

        async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<(), ActionError> {
            Ok(())
        }

        async fn perform(&mut self, _action: &Action, _timeout: Duration) -> Result<(), ActionError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<PathBuf, RecordingError> {
            let path = self.dir.join("recording.webm");
            tokio::fs::write(&path, b"webm").await.map_err(|e| RecordingError::Finalize(e.to_string()))?;
            Ok(path)
        }
    }

    fn pipeline(dir: &Path) -> (Pipeline, Arc<JobManager>) {
        let config = Config {
            output_path: dir.join("out/demo.mp4"),
            work_dir: dir.join("work"),
            audio_dir: dir.join("audio"),
            ..Config::default()
        };
        let jobs = Arc::new(JobManager::new());
        let pipeline = Pipeline::new(
            config,
            jobs.clone(),
            Arc::new(EchoSynth),
            Arc::new(FakeEncoder),
            CancellationToken::new(),
        );
        (pipeline, jobs)
    }

    fn script() -> Script {
        Script::parse_str(
            "project:\n  name: Tour\nscenes:\n  - id: hello\n    url: https://example.com\n    narration: Hello\n  - id: rest\n    duration: 0.05\n",
            ScriptFormat::Yaml,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn full_run_produces_video_subtitles_and_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, jobs) = pipeline(dir.path());
        let mut events = jobs.subscribe();
        let mut s = script();

        let session = QuietSession {
            dir: dir.path().to_path_buf(),
            fail_start: false,
        };
        let report = pipeline.execute(JobType::Run, &mut s, Some(session)).await.unwrap();

        let output = report.output.unwrap();
        assert!(output.video_path.exists());
        assert!(output.subtitle_path.exists());
        assert!(pipeline.config().timeline_manifest_path().exists());
        assert_eq!(s.scenes[0].resolved_duration, Some(secs_to_ticks(0.05)));

        let recording: TimelineManifest = read_json(&pipeline.config().timeline_manifest_path()).await.unwrap();
        assert!(recording.timeline.is_fully_recorded());
        assert!(!recording.aborted);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(seen.first().map(|e| &e.status), Some(&JobStatus::Running { stage: Stage::Audio }));
        assert_eq!(seen.last().map(|e| &e.status), Some(&JobStatus::Completed));

        let job = jobs.get_job(seen[0].job_id).unwrap();
        assert_eq!(job.job_type, JobType::Run);
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn failed_recording_keeps_clips_and_marks_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, jobs) = pipeline(dir.path());
        let mut events = jobs.subscribe();
        let mut s = script();

        let session = QuietSession {
            dir: dir.path().to_path_buf(),
            fail_start: true,
        };
        let err = pipeline.execute(JobType::Run, &mut s, Some(session)).await.unwrap_err();
        assert_eq!(err.stage, Stage::Record);
        assert!(err.retained.contains(&pipeline.config().clips_manifest_path()));
        assert!(!pipeline.config().output_path.exists());

        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event.status);
        }
        assert!(matches!(last, Some(JobStatus::Failed { stage: Stage::Record, .. })));
    }

    #[tokio::test]
    async fn stages_resume_from_saved_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _jobs) = pipeline(dir.path());
        let mut s = script();

        pipeline
            .execute::<QuietSession>(JobType::Audio, &mut s, None)
            .await
            .unwrap();
        let session = QuietSession {
            dir: dir.path().to_path_buf(),
            fail_start: false,
        };
        pipeline.execute(JobType::Record, &mut s, Some(session)).await.unwrap();
        let report = pipeline
            .execute::<QuietSession>(JobType::Merge, &mut s, None)
            .await
            .unwrap();
        assert!(report.output.unwrap().video_path.exists());
    }

    #[tokio::test]
    async fn merge_without_manifests_fails_in_merge_stage() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _jobs) = pipeline(dir.path());
        let mut s = script();
        let err = pipeline
            .execute::<QuietSession>(JobType::Merge, &mut s, None)
            .await
            .unwrap_err();
        assert_eq!(err.stage, Stage::Merge);
    }

    #[tokio::test]
    async fn failed_merge_keeps_rendered_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, jobs) = pipeline(dir.path());
        let mut s = script();
        let session = QuietSession {
            dir: dir.path().to_path_buf(),
            fail_start: false,
        };
        pipeline
            .execute(JobType::Audio, &mut s, None::<QuietSession>)
            .await
            .unwrap();
        pipeline.execute(JobType::Record, &mut s, Some(session)).await.unwrap();

        let failing = Pipeline::new(
            pipeline.config().clone(),
            jobs,
            Arc::new(EchoSynth),
            Arc::new(FailingMux),
            CancellationToken::new(),
        );
        let err = failing
            .execute::<QuietSession>(JobType::Merge, &mut s, None)
            .await
            .unwrap_err();
        assert_eq!(err.stage, Stage::Merge);
        let config = pipeline.config();
        assert!(config.video_track_path().exists());
        assert!(err.retained.contains(&config.video_track_path()));
        assert!(err.retained.contains(&config.audio_track_path()));
        assert!(err.retained.contains(&config.clips_manifest_path()));
        assert!(!config.output_path.exists());
    }
}
