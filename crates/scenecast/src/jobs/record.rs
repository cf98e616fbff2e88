use engine::pacing::action_floor_ticks;
use engine::script::{Action, Script, WaitDuration};
use engine::timeline::{secs_to_ticks, ticks_to_secs, ActionFailure, Timeline};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::browser::{BrowserSession, SessionSettings};
use crate::error::{ActionError, RecordingError};

const RETRY_PAUSE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct RecordSettings {
    pub session: SessionSettings,
    pub action_timeout: Duration,
    pub action_retries: u32,
    pub margin: Duration,
}

impl RecordSettings {
    fn attempts(&self) -> u32 {
        self.action_retries + 1
    }
}

fn ticks_duration(ticks: i64) -> Duration {
    Duration::from_secs_f64(ticks_to_secs(ticks).max(0.0))
}

/// Longest a single browser step may take on one attempt: the configured
/// timeout plus the step's own expected duration.
fn step_limit(settings: &RecordSettings, floor_ticks: i64) -> Duration {
    settings.action_timeout + ticks_duration(floor_ticks)
}

/// Upper bound on wall-clock recording time: every planned window and
/// explicit wait, plus every browser step timing out on every attempt, plus
/// the margin.
pub fn recording_budget(script: &Script, timeline: &Timeline, settings: &RecordSettings) -> Duration {
    let worst_step = |floor_ticks| (step_limit(settings, floor_ticks) + RETRY_PAUSE) * settings.attempts();
    let mut budget = settings.margin;
    for (scene, entry) in script.scenes.iter().zip(&timeline.entries) {
        budget += ticks_duration(entry.planned_duration());
        if scene.url.is_some() {
            budget += worst_step(0);
        }
        for action in &scene.actions {
            budget += match action {
                Action::Wait {
                    duration: WaitDuration::Seconds(secs),
                } => Duration::from_secs_f64(secs.max(0.0)),
                Action::Wait {
                    duration: WaitDuration::Auto,
                } => Duration::ZERO,
                other => worst_step(action_floor_ticks(other)),
            };
        }
    }
    budget
}

/// Targets with a fragment are always navigated so the page moves to the
/// anchor; otherwise a URL already open is not loaded again.
fn same_page(current: Option<&str>, target: &str) -> bool {
    if target.contains('#') {
        return false;
    }
    let base = |url: &str| url.split('#').next().unwrap_or(url).trim_end_matches('/').to_string();
    current.is_some_and(|c| base(c) == base(target))
}

enum Step<'a> {
    Navigate(&'a str),
    Perform(&'a Action),
}

/// Plays a script in one browser session while timing every scene.
pub struct Recorder<S: BrowserSession> {
    session: S,
    settings: RecordSettings,
    partial_video: Option<PathBuf>,
}

impl<S: BrowserSession> Recorder<S> {
    pub fn new(session: S, settings: RecordSettings) -> Self {
        Recorder {
            session,
            settings,
            partial_video: None,
        }
    }

    /// Whatever the browser had recorded when a failed recording was closed.
    pub fn partial_video(&self) -> Option<&PathBuf> {
        self.partial_video.as_ref()
    }

    /// Record every scene in order, filling in actual windows on `timeline`.
    /// The session is closed on every path out of here.
    pub async fn record(
        &mut self,
        script: &Script,
        timeline: &mut Timeline,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, RecordingError> {
        // Offsets count from the start request; browser start-up is lead-in.
        let clock = Instant::now();
        self.session.start(&self.settings.session).await?;
        info!(
            "Recording {} scene(s), budget {:.0}s",
            script.scenes.len(),
            budget.as_secs_f64()
        );

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(RecordingError::Cancelled),
            played = tokio::time::timeout(budget, self.play(script, timeline, clock)) => match played {
                Ok(result) => result,
                Err(_) => Err(RecordingError::Timeout(budget)),
            },
        };

        let closed = self.session.close().await;
        match (outcome, closed) {
            (Ok(()), Ok(video)) => Ok(video),
            (Ok(()), Err(e)) => Err(e),
            (Err(e), Ok(video)) => {
                self.partial_video = Some(video);
                Err(e)
            }
            (Err(e), Err(close_err)) => {
                warn!("Browser session did not close cleanly: {}", close_err);
                Err(e)
            }
        }
    }

    async fn play(
        &mut self,
        script: &Script,
        timeline: &mut Timeline,
        clock: Instant,
    ) -> Result<(), RecordingError> {
        let ticks_since = |at: Instant| secs_to_ticks(at.duration_since(clock).as_secs_f64());
        let mut current_url: Option<String> = None;

        for (scene, entry) in script.scenes.iter().zip(timeline.entries.iter_mut()) {
            let started = Instant::now();
            let window = ticks_duration(entry.planned_duration());
            let deadline = started + window;

            if let Some(url) = &scene.url {
                if !same_page(current_url.as_deref(), url) {
                    match self.run_step(Step::Navigate(url), 0).await? {
                        Ok(()) => current_url = Some(url.clone()),
                        Err((error, attempts)) => {
                            warn!("Scene {}: navigation to {} failed: {}", scene.id, url, error);
                            entry.action_failures.push(ActionFailure {
                                index: None,
                                kind: "navigate".to_string(),
                                attempts,
                                message: error.to_string(),
                            });
                        }
                    }
                }
            }

            for (index, action) in scene.actions.iter().enumerate() {
                let step = match action {
                    Action::Wait { duration } => {
                        match duration {
                            WaitDuration::Seconds(secs) => {
                                tokio::time::sleep(Duration::from_secs_f64(secs.max(0.0))).await
                            }
                            WaitDuration::Auto => tokio::time::sleep_until(deadline).await,
                        }
                        continue;
                    }
                    Action::Goto { url } => Step::Navigate(url),
                    other => Step::Perform(other),
                };

                match self.run_step(step, action_floor_ticks(action)).await? {
                    Ok(()) => {
                        if let Action::Goto { url } = action {
                            current_url = Some(url.clone());
                        }
                    }
                    Err((error, attempts)) => {
                        warn!(
                            "Scene {}: {} action #{} gave up after {} attempt(s): {}",
                            scene.id,
                            action.kind(),
                            index,
                            attempts,
                            error
                        );
                        entry.action_failures.push(ActionFailure {
                            index: Some(index),
                            kind: action.kind().to_string(),
                            attempts,
                            message: error.to_string(),
                        });
                    }
                }
            }

            tokio::time::sleep_until(deadline).await;
            let finished = Instant::now();
            entry.record_actual(ticks_since(started), ticks_since(finished));

            let overrun = finished.duration_since(deadline);
            if overrun > Duration::from_millis(100) {
                info!(
                    "Scene {} ran {:.2}s past its planned window",
                    scene.id,
                    overrun.as_secs_f64()
                );
            }
        }
        Ok(())
    }

    /// Outer error: the session is gone. Inner error: this step gave up.
    async fn run_step(
        &mut self,
        step: Step<'_>,
        floor_ticks: i64,
    ) -> Result<Result<(), (ActionError, u32)>, RecordingError> {
        let limit = step_limit(&self.settings, floor_ticks);
        let attempts = self.settings.attempts();
        let mut last_error = ActionError::Timeout(limit);

        for attempt in 1..=attempts {
            let call = async {
                match &step {
                    Step::Navigate(url) => self.session.navigate(url, limit).await,
                    Step::Perform(action) => self.session.perform(action, limit).await,
                }
            };
            let result = match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(ActionError::Timeout(limit)),
            };

            match result {
                Ok(()) => return Ok(Ok(())),
                Err(ActionError::SessionLost(message)) => {
                    return Err(RecordingError::Crashed(message));
                }
                Err(e) => {
                    if attempt < attempts {
                        tokio::time::sleep(RETRY_PAUSE).await;
                    }
                    last_error = e;
                }
            }
        }
        Ok(Err((last_error, attempts)))
    }
}
