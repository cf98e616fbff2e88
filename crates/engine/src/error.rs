use thiserror::Error;

/// A script that cannot be turned into a [`crate::script::Script`].
///
/// Raised before any collaborator is contacted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScriptError {
    #[error("could not parse script: {0}")]
    Syntax(String),

    #[error("scene {scene}: action #{index} has unknown type '{kind}'")]
    UnknownAction {
        scene: String,
        index: usize,
        kind: String,
    },

    #[error("scene {scene}: action #{index} ({kind}) is missing required parameter '{param}'")]
    MissingParam {
        scene: String,
        index: usize,
        kind: &'static str,
        param: &'static str,
    },

    #[error("scene {scene}: action #{index} ({kind}) parameter '{param}' must be {expected}")]
    WrongType {
        scene: String,
        index: usize,
        kind: &'static str,
        param: &'static str,
        expected: &'static str,
    },

    #[error("duplicate scene id '{0}'")]
    DuplicateScene(String),

    #[error("scene has an empty id (position {0})")]
    EmptySceneId(usize),

    #[error("scene {0}: duration is auto but narration is empty")]
    AmbiguousDuration(String),

    #[error("scene {scene}: invalid duration {value}")]
    InvalidDuration { scene: String, value: String },

    #[error("invalid project setting: {0}")]
    InvalidProject(String),
}

/// Failure to place scenes on the planned timeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimelineError {
    #[error("scene {0}: duration is auto but no audio clip was resolved")]
    MissingClip(String),

    #[error("scene {scene}: audio clip has non-positive duration {seconds}s")]
    EmptyClip { scene: String, seconds: f64 },
}

/// Structural problems that make a merge impossible. Never recovered.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MergeError {
    #[error("recording has {recorded} timeline entries but the script has {expected} scenes")]
    EntryCountMismatch { expected: usize, recorded: usize },

    #[error("timeline entry #{index} is for scene '{found}', expected '{expected}'")]
    SceneOrderMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("scene {0} has no recorded start/end")]
    MissingActual(String),

    #[error("scene {scene}: recorded interval is reversed ({start} > {end} ticks)")]
    ReversedInterval { scene: String, start: i64, end: i64 },

    #[error("scene {0} has narration but no audio clip")]
    MissingClip(String),

    #[error("scene {scene}: duration mismatch of {delta_seconds:.3}s exceeds the hard limit")]
    Unrecoverable { scene: String, delta_seconds: f64 },

    #[error("merge produced no output segments")]
    Empty,
}

impl From<serde_json::Error> for ScriptError {
    fn from(err: serde_json::Error) -> Self {
        ScriptError::Syntax(err.to_string())
    }
}

impl From<serde_yaml::Error> for ScriptError {
    fn from(err: serde_yaml::Error) -> Self {
        ScriptError::Syntax(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_the_scene() {
        let err = ScriptError::DuplicateScene("intro".to_string());
        assert!(err.to_string().contains("intro"));

        let err = MergeError::EntryCountMismatch {
            expected: 3,
            recorded: 2,
        };
        assert!(err.to_string().contains("2 timeline entries"));
    }
}
