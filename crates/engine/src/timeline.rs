use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::TimelineError;
use crate::pacing::{min_feasible_ticks, PacingHint};
use crate::script::{DurationPolicy, Script};

/// One tick per audio sample at 48 kHz.
pub const TICKS_PER_SECOND: i64 = 48000;

pub fn secs_to_ticks(secs: f64) -> i64 {
    (secs * TICKS_PER_SECOND as f64).round() as i64
}

pub fn ticks_to_secs(ticks: i64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

/// Length of one video frame at `fps`, rounded to the nearest tick.
pub fn frame_ticks(fps: u32) -> i64 {
    (TICKS_PER_SECOND as f64 / fps.max(1) as f64).round() as i64
}

/// A browser action that kept failing after its retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionFailure {
    /// Position in the scene's action list; `None` for the scene navigation.
    pub index: Option<usize>,
    pub kind: String,
    pub attempts: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub scene_id: String,
    pub planned_start_ticks: i64,
    pub planned_end_ticks: i64,
    #[serde(default)]
    pub actual_start_ticks: Option<i64>,
    #[serde(default)]
    pub actual_end_ticks: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacing: Option<PacingHint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_failures: Vec<ActionFailure>,
}

impl TimelineEntry {
    pub fn planned_duration(&self) -> i64 {
        self.planned_end_ticks - self.planned_start_ticks
    }

    pub fn actual_duration(&self) -> Option<i64> {
        match (self.actual_start_ticks, self.actual_end_ticks) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    pub fn record_actual(&mut self, start_ticks: i64, end_ticks: i64) {
        self.actual_start_ticks = Some(start_ticks);
        self.actual_end_ticks = Some(end_ticks);
    }
}

/// Planned (and later actual) placement of every scene, in script order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
}

impl Timeline {
    /// Lay scenes end to end starting at zero.
    ///
    /// `clip_ticks` maps scene id to the measured narration length. Auto
    /// scenes take that length; fixed scenes take their declared length.
    /// Every scene's `resolved_duration` is filled in.
    pub fn build(
        script: &mut Script,
        clip_ticks: &HashMap<String, i64>,
    ) -> Result<Timeline, TimelineError> {
        let mut entries = Vec::with_capacity(script.scenes.len());
        let mut cursor = 0i64;

        for scene in script.scenes.iter_mut() {
            let duration = match scene.duration {
                DurationPolicy::Fixed(secs) => secs_to_ticks(secs),
                DurationPolicy::Auto => {
                    let ticks = *clip_ticks
                        .get(&scene.id)
                        .ok_or_else(|| TimelineError::MissingClip(scene.id.clone()))?;
                    if ticks <= 0 {
                        return Err(TimelineError::EmptyClip {
                            scene: scene.id.clone(),
                            seconds: ticks_to_secs(ticks),
                        });
                    }
                    ticks
                }
            };
            scene.resolved_duration = Some(duration);

            let floor = min_feasible_ticks(scene);
            let pacing = (floor > duration).then(|| PacingHint {
                planned_ticks: duration,
                min_feasible_ticks: floor,
                overrun_ticks: floor - duration,
            });

            entries.push(TimelineEntry {
                scene_id: scene.id.clone(),
                planned_start_ticks: cursor,
                planned_end_ticks: cursor + duration,
                actual_start_ticks: None,
                actual_end_ticks: None,
                pacing,
                action_failures: Vec::new(),
            });
            cursor += duration;
        }

        Ok(Timeline { entries })
    }

    pub fn total_planned_ticks(&self) -> i64 {
        self.entries.last().map(|e| e.planned_end_ticks).unwrap_or(0)
    }

    pub fn entry(&self, scene_id: &str) -> Option<&TimelineEntry> {
        self.entries.iter().find(|e| e.scene_id == scene_id)
    }

    pub fn entry_mut(&mut self, scene_id: &str) -> Option<&mut TimelineEntry> {
        self.entries.iter_mut().find(|e| e.scene_id == scene_id)
    }

    /// Scenes that had at least one action give up during recording.
    pub fn scenes_with_failures(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| !e.action_failures.is_empty())
            .map(|e| e.scene_id.as_str())
            .collect()
    }

    pub fn is_fully_recorded(&self) -> bool {
        self.entries.iter().all(|e| e.actual_duration().is_some())
    }
}
