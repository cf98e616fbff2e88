use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// One scene's narration could not be produced.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("scene {scene}: TTS backend unreachable: {message}")]
    Unreachable { scene: String, message: String },

    #[error("scene {scene}: TTS backend returned {status}: {message}")]
    Backend {
        scene: String,
        status: u16,
        message: String,
    },

    #[error("scene {0}: TTS backend returned an empty clip")]
    EmptyClip(String),

    #[error("scene {scene}: could not store or measure clip: {message}")]
    Storage { scene: String, message: String },
}

impl SynthesisError {
    pub fn scene(&self) -> &str {
        match self {
            SynthesisError::Unreachable { scene, .. }
            | SynthesisError::Backend { scene, .. }
            | SynthesisError::Storage { scene, .. } => scene,
            SynthesisError::EmptyClip(scene) => scene,
        }
    }
}

/// Every scene that failed, collected after all scenes were attempted.
#[derive(Debug, Error, Clone, PartialEq)]
pub struct SynthesisFailures {
    pub failures: Vec<SynthesisError>,
}

impl fmt::Display for SynthesisFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} scene(s) failed narration synthesis", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {}", failure)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum NarrationError {
    #[error(transparent)]
    Failed(#[from] SynthesisFailures),

    #[error("narration synthesis cancelled")]
    Cancelled,
}

/// A single browser action failed. Retried, then recorded on the scene.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    #[error("element not found: {0}")]
    NotFound(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("driver rejected action: {0}")]
    Rejected(String),

    /// The browser itself is gone; not retried.
    #[error("browser session lost: {0}")]
    SessionLost(String),
}

/// The recording as a whole failed.
#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("browser session could not start: {0}")]
    Start(String),

    #[error("browser session crashed: {0}")]
    Crashed(String),

    #[error("recording cancelled")]
    Cancelled,

    #[error("recording exceeded its budget of {0:?}")]
    Timeout(Duration),

    #[error("recording could not be finalized: {0}")]
    Finalize(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parse,
    Audio,
    Record,
    Merge,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Parse => "parse",
            Stage::Audio => "audio",
            Stage::Record => "record",
            Stage::Merge => "merge",
        };
        f.write_str(name)
    }
}

/// A pipeline stage failed. Artifacts produced so far are left in place.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source:#}")]
pub struct JobError {
    pub stage: Stage,
    #[source]
    pub source: anyhow::Error,
    pub retained: Vec<PathBuf>,
}

impl JobError {
    pub fn new(stage: Stage, source: impl Into<anyhow::Error>) -> Self {
        JobError {
            stage,
            source: source.into(),
            retained: Vec::new(),
        }
    }

    pub fn retaining(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.retained.extend(paths.into_iter().filter(|p| p.exists()));
        self
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.source.downcast_ref::<RecordingError>(),
            Some(RecordingError::Cancelled)
        ) || matches!(
            self.source.downcast_ref::<NarrationError>(),
            Some(NarrationError::Cancelled)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_list_every_scene() {
        let err = SynthesisFailures {
            failures: vec![
                SynthesisError::EmptyClip("intro".to_string()),
                SynthesisError::Unreachable {
                    scene: "outro".to_string(),
                    message: "connection refused".to_string(),
                },
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("2 scene(s)"));
        assert!(text.contains("intro"));
        assert!(text.contains("outro"));
        assert_eq!(err.failures[1].scene(), "outro");
    }

    #[test]
    fn job_error_names_the_stage() {
        let err = JobError::new(Stage::Record, RecordingError::Cancelled);
        assert_eq!(err.to_string(), "record stage failed: recording cancelled");
        assert!(err.is_cancelled());
    }
}
