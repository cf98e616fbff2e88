use engine::merge::AudioClip;
use engine::pacing::fit_voice_rate;
use engine::script::{DurationPolicy, Script};
use engine::timeline::{secs_to_ticks, ticks_to_secs};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{NarrationError, SynthesisError, SynthesisFailures};
use crate::media::Encoder;
use crate::tts::{cache_key, SpeechRequest, Synthesizer};

/// Produces one measured clip per narrated scene, reusing cached clips.
pub struct NarrationResolver {
    inner: Arc<Inner>,
    max_concurrent: usize,
}

struct Inner {
    synth: Arc<dyn Synthesizer>,
    encoder: Arc<dyn Encoder>,
    audio_dir: PathBuf,
    fit_voice_rate: bool,
}

struct SceneJob {
    request: SpeechRequest,
    /// Declared length of a fixed-duration scene.
    target_ticks: Option<i64>,
}

impl NarrationResolver {
    pub fn new(
        synth: Arc<dyn Synthesizer>,
        encoder: Arc<dyn Encoder>,
        audio_dir: PathBuf,
        max_concurrent: usize,
        fit_voice_rate: bool,
    ) -> Self {
        NarrationResolver {
            inner: Arc::new(Inner {
                synth,
                encoder,
                audio_dir,
                fit_voice_rate,
            }),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Every narrated scene is attempted even when others fail; failures are
    /// reported together.
    pub async fn resolve(
        &self,
        script: &Script,
        cancel: &CancellationToken,
    ) -> Result<Vec<AudioClip>, NarrationError> {
        tokio::fs::create_dir_all(&self.inner.audio_dir)
            .await
            .map_err(|e| {
                SynthesisFailures {
                    failures: vec![SynthesisError::Storage {
                        scene: String::new(),
                        message: format!("cannot create {:?}: {}", self.inner.audio_dir, e),
                    }],
                }
            })?;

        // Clips are written here first and renamed into the audio dir once
        // complete; the whole directory goes away when resolution ends.
        let staging = self.inner.audio_dir.join(format!(".staging-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&staging).await.map_err(|e| SynthesisFailures {
            failures: vec![SynthesisError::Storage {
                scene: String::new(),
                message: format!("cannot create {:?}: {}", staging, e),
            }],
        })?;

        let limit = Arc::new(Semaphore::new(self.max_concurrent));
        let mut scene_ids = Vec::new();
        let mut tasks = JoinSet::new();

        for scene in script.narrated_scenes() {
            let job = SceneJob {
                request: SpeechRequest {
                    scene_id: scene.id.clone(),
                    text: scene.narration.trim().to_string(),
                    voice: script.voice_for(scene),
                    rate: script.project.voice_rate.clone(),
                },
                target_ticks: match scene.duration {
                    DurationPolicy::Fixed(secs) => Some(secs_to_ticks(secs)),
                    DurationPolicy::Auto => None,
                },
            };
            let inner = self.inner.clone();
            let limit = limit.clone();
            let staging = staging.clone();
            scene_ids.push(scene.id.clone());
            tasks.spawn(async move {
                let scene_id = job.request.scene_id.clone();
                let result = match limit.acquire_owned().await {
                    Ok(_permit) => inner.resolve_scene(job, &staging).await,
                    Err(e) => Err(SynthesisError::Storage {
                        scene: scene_id.clone(),
                        message: e.to_string(),
                    }),
                };
                (scene_id, result)
            });
        }

        info!("Resolving narration for {} scene(s)", scene_ids.len());

        let mut outcomes = HashMap::new();
        let cancelled = loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok((scene_id, result))) => {
                        outcomes.insert(scene_id, result);
                    }
                    Some(Err(e)) => warn!("Synthesis task failed: {}", e),
                    None => break false,
                },
                _ = cancel.cancelled() => break true,
            }
        };

        if cancelled {
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
            remove_staging(&staging).await;
            return Err(NarrationError::Cancelled);
        }
        remove_staging(&staging).await;

        let mut clips = Vec::new();
        let mut failures = Vec::new();
        for scene_id in scene_ids {
            match outcomes.remove(&scene_id) {
                Some(Ok(clip)) => clips.push(clip),
                Some(Err(e)) => failures.push(e),
                None => failures.push(SynthesisError::Storage {
                    scene: scene_id,
                    message: "synthesis task did not finish".to_string(),
                }),
            }
        }

        if failures.is_empty() {
            Ok(clips)
        } else {
            Err(SynthesisFailures { failures }.into())
        }
    }
}

impl Inner {
    async fn resolve_scene(&self, job: SceneJob, staging: &Path) -> Result<AudioClip, SynthesisError> {
        let clip = self.clip_at_rate(&job.request, staging).await?;

        let Some(target) = job.target_ticks else {
            return Ok(clip);
        };
        if clip.duration_ticks <= target || !self.fit_voice_rate {
            return Ok(clip);
        }
        let Some(rate) = fit_voice_rate(&job.request.rate, clip.duration_ticks, target) else {
            return Ok(clip);
        };

        info!(
            "Scene {} narration runs {:.2}s over its {:.2}s window, retrying at {}",
            job.request.scene_id,
            ticks_to_secs(clip.duration_ticks - target),
            ticks_to_secs(target),
            rate
        );
        let faster = SpeechRequest {
            rate,
            ..job.request.clone()
        };
        match self.clip_at_rate(&faster, staging).await {
            Ok(refit) => Ok(refit),
            Err(e) => {
                warn!("Keeping original narration for {}: {}", job.request.scene_id, e);
                Ok(clip)
            }
        }
    }

    async fn clip_at_rate(
        &self,
        request: &SpeechRequest,
        staging: &Path,
    ) -> Result<AudioClip, SynthesisError> {
        let scene = request.scene_id.clone();
        let storage = |message: String| SynthesisError::Storage {
            scene: scene.clone(),
            message,
        };

        let key = cache_key(&request.voice, &request.rate, &request.text);
        let name = format!("{}-{}.mp3", request.scene_id, key);
        let path = self.audio_dir.join(&name);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            match self.encoder.probe_duration(&path).await {
                Ok(ticks) if ticks > 0 => {
                    debug!("Reusing cached narration {:?}", path);
                    return Ok(AudioClip {
                        scene_id: request.scene_id.clone(),
                        path,
                        duration_ticks: ticks,
                    });
                }
                _ => {
                    warn!("Discarding unreadable cached clip {:?}", path);
                    let _ = tokio::fs::remove_file(&path).await;
                }
            }
        }

        let audio = self.synth.synthesize(request).await?;
        if audio.is_empty() {
            return Err(SynthesisError::EmptyClip(request.scene_id.clone()));
        }

        let partial = staging.join(format!("{}.part", name));
        tokio::fs::write(&partial, &audio)
            .await
            .map_err(|e| storage(format!("write {:?}: {}", partial, e)))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| storage(format!("rename {:?}: {}", partial, e)))?;

        let ticks = match self.encoder.probe_duration(&path).await {
            Ok(ticks) => ticks,
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(storage(format!("measure {:?}: {:#}", path, e)));
            }
        };
        if ticks <= 0 {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(SynthesisError::EmptyClip(request.scene_id.clone()));
        }

        debug!(
            "Synthesized {} ({:.2}s) to {:?}",
            request.scene_id,
            ticks_to_secs(ticks),
            path
        );
        Ok(AudioClip {
            scene_id: request.scene_id.clone(),
            path,
            duration_ticks: ticks,
        })
    }
}

async fn remove_staging(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove {:?}: {}", dir, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaInfo;
    use async_trait::async_trait;
    use bytes::Bytes;
    use engine::render::RenderCommand;
    use engine::script::ScriptFormat;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Writes the text itself as "audio"; one byte lasts 0.1s.
    struct FakeSynth {
        calls: AtomicUsize,
        rates: Mutex<Vec<String>>,
        failing: HashSet<String>,
        delay: Duration,
        /// Scenes that wait out `delay`; all of them when empty.
        slow: HashSet<String>,
    }

    impl FakeSynth {
        fn new() -> Self {
            FakeSynth {
                calls: AtomicUsize::new(0),
                rates: Mutex::new(Vec::new()),
                failing: HashSet::new(),
                delay: Duration::ZERO,
                slow: HashSet::new(),
            }
        }
    }

    #[async_trait]
    impl Synthesizer for FakeSynth {
        async fn synthesize(&self, request: &SpeechRequest) -> Result<Bytes, SynthesisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rates.lock().unwrap().push(request.rate.clone());
            if self.slow.is_empty() || self.slow.contains(&request.scene_id) {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.contains(&request.scene_id) {
                return Err(SynthesisError::Backend {
                    scene: request.scene_id.clone(),
                    status: 500,
                    message: "voice unavailable".to_string(),
                });
            }
            // Faster rates produce proportionally shorter clips.
            let pct: usize = request.rate.trim_matches(|c| c == '+' || c == '%').parse().unwrap_or(0);
            let len = request.text.len() * 100 / (100 + pct);
            Ok(Bytes::from(vec![b'a'; len]))
        }
    }

    struct SizeEncoder;

    #[async_trait]
    impl Encoder for SizeEncoder {
        async fn run(&self, _command: &RenderCommand) -> anyhow::Result<()> {
            Ok(())
        }

        async fn probe(&self, path: &Path) -> anyhow::Result<MediaInfo> {
            let len = tokio::fs::metadata(path).await?.len();
            Ok(MediaInfo {
                duration_ticks: secs_to_ticks(len as f64 * 0.1),
                has_video: false,
            })
        }
    }

    fn script(yaml: &str) -> Script {
        Script::parse_str(yaml, ScriptFormat::Yaml).unwrap()
    }

    fn resolver(synth: Arc<FakeSynth>, dir: &Path) -> NarrationResolver {
        NarrationResolver::new(synth, Arc::new(SizeEncoder), dir.to_path_buf(), 2, true)
    }

    #[tokio::test]
    async fn measures_clips_and_reuses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let s = script(
            "scenes:\n  - id: intro\n    narration: Welcome here\n  - id: quiet\n    duration: 2\n  - id: tour\n    narration: Look around\n",
        );
        let synth = Arc::new(FakeSynth::new());

        let clips = resolver(synth.clone(), dir.path())
            .resolve(&s, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(clips.len(), 2);
        let intro = clips.iter().find(|c| c.scene_id == "intro").unwrap();
        assert_eq!(intro.duration_ticks, secs_to_ticks(1.2));
        assert!(intro.path.exists());
        assert_eq!(synth.calls.load(Ordering::SeqCst), 2);

        let again = resolver(synth.clone(), dir.path())
            .resolve(&s, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(synth.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reports_every_failed_scene() {
        let dir = tempfile::tempdir().unwrap();
        let s = script(
            "scenes:\n  - id: a\n    narration: One\n  - id: b\n    narration: Two\n  - id: c\n    narration: Three\n",
        );
        let mut synth = FakeSynth::new();
        synth.failing = HashSet::from(["a".to_string(), "c".to_string()]);
        let synth = Arc::new(synth);

        let err = resolver(synth.clone(), dir.path())
            .resolve(&s, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            NarrationError::Failed(f) => {
                let mut scenes: Vec<&str> = f.failures.iter().map(|e| e.scene()).collect();
                scenes.sort();
                assert_eq!(scenes, vec!["a", "c"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(synth.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fixed_scene_is_resynthesized_faster_when_it_overruns() {
        let dir = tempfile::tempdir().unwrap();
        // 60 bytes = 6.0s of narration for a 5s window.
        let text = "x".repeat(60);
        let s = script(&format!(
            "scenes:\n  - id: a\n    narration: {}\n    duration: 5\n",
            text
        ));
        let synth = Arc::new(FakeSynth::new());

        let clips = resolver(synth.clone(), dir.path())
            .resolve(&s, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(*synth.rates.lock().unwrap(), vec!["+0%".to_string(), "+20%".to_string()]);
        assert_eq!(clips[0].duration_ticks, secs_to_ticks(5.0));
    }

    #[tokio::test]
    async fn cancellation_stops_pending_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let s = script("scenes:\n  - id: a\n    narration: One\n  - id: b\n    narration: Two\n");
        let mut synth = FakeSynth::new();
        synth.delay = Duration::from_secs(30);
        let synth = Arc::new(synth);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = resolver(synth, dir.path()).resolve(&s, &cancel).await.unwrap_err();
        assert!(matches!(err, NarrationError::Cancelled));
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn cancellation_keeps_finished_clips_and_no_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let s = script("scenes:\n  - id: a\n    narration: One\n  - id: b\n    narration: Two\n");
        let mut synth = FakeSynth::new();
        synth.delay = Duration::from_secs(30);
        synth.slow = HashSet::from(["b".to_string()]);
        let synth = Arc::new(synth);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let err = resolver(synth, dir.path()).resolve(&s, &cancel).await.unwrap_err();
        assert!(matches!(err, NarrationError::Cancelled));

        let entries: Vec<PathBuf> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_file());
        let name = entries[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("a-") && name.ends_with(".mp3"));
    }
}
