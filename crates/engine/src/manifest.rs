//! Intermediate artifacts written between stages so each stage can run on its
//! own: `clips.json` after narration, `timeline.json` after recording.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::merge::AudioClip;
use crate::timeline::{ticks_to_secs, Timeline};

pub const MANIFEST_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipManifest {
    pub version: u16,
    pub created_at: String,
    pub clips: Vec<AudioClip>,
}

impl ClipManifest {
    pub fn new(created_at: String, mut clips: Vec<AudioClip>) -> Self {
        clips.sort_by(|a, b| a.scene_id.cmp(&b.scene_id));
        ClipManifest {
            version: MANIFEST_VERSION,
            created_at,
            clips,
        }
    }

    pub fn by_scene(&self) -> HashMap<String, AudioClip> {
        self.clips
            .iter()
            .map(|c| (c.scene_id.clone(), c.clone()))
            .collect()
    }

    pub fn durations(&self) -> HashMap<String, i64> {
        self.clips
            .iter()
            .map(|c| (c.scene_id.clone(), c.duration_ticks))
            .collect()
    }
}

/// Planned vs. actual timing of every scene plus the recording it refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineManifest {
    pub version: u16,
    pub created_at: String,
    pub video_path: PathBuf,
    /// Recording time before the first scene started (page load, login).
    pub lead_in_ticks: i64,
    pub timeline: Timeline,
    #[serde(default)]
    pub aborted: bool,
}

impl TimelineManifest {
    pub fn new(created_at: String, video_path: PathBuf, timeline: Timeline) -> Self {
        let lead_in_ticks = timeline
            .entries
            .first()
            .and_then(|e| e.actual_start_ticks)
            .unwrap_or(0);
        TimelineManifest {
            version: MANIFEST_VERSION,
            created_at,
            video_path,
            lead_in_ticks,
            timeline,
            aborted: false,
        }
    }

    /// One line per scene: planned and actual windows in seconds, drift, and
    /// failed actions.
    pub fn summary(&self) -> Vec<String> {
        self.timeline
            .entries
            .iter()
            .map(|e| {
                let planned = format!(
                    "{:.2}-{:.2}",
                    ticks_to_secs(e.planned_start_ticks),
                    ticks_to_secs(e.planned_end_ticks)
                );
                let actual = match (e.actual_start_ticks, e.actual_end_ticks) {
                    (Some(s), Some(end)) => format!(
                        "{:.2}-{:.2} (drift {:+.2}s)",
                        ticks_to_secs(s),
                        ticks_to_secs(end),
                        ticks_to_secs((end - s) - e.planned_duration())
                    ),
                    _ => "not recorded".to_string(),
                };
                let mut line = format!("{}: planned {} actual {}", e.scene_id, planned, actual);
                if !e.action_failures.is_empty() {
                    line.push_str(&format!(", {} failed action(s)", e.action_failures.len()));
                }
                line
            })
            .collect()
    }
}
