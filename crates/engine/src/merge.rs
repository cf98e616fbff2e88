//! Reconcile recorded scene intervals with narration clip lengths.
//!
//! Produces a [`MergePlan`]: which slice of the continuous recording each
//! scene uses, how long to freeze its last frame, how much silence to add to
//! its audio, and where it lands on the final timeline. Rendering the plan is
//! left to [`crate::render`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::MergeError;
use crate::script::Script;
use crate::subtitle::Cue;
use crate::timeline::{frame_ticks, secs_to_ticks, Timeline};

/// What to do when a scene's video runs longer than its narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the trailing frames.
    #[default]
    Truncate,
    /// Keep every frame and extend the audio with silence.
    PadAudio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergePolicy {
    pub overflow: OverflowPolicy,
    /// Differences up to this size are absorbed without a logged correction.
    pub tolerance_ticks: i64,
    /// Differences beyond this size fail the merge.
    pub max_correction_ticks: i64,
    pub fps: u32,
}

impl MergePolicy {
    pub fn new(fps: u32) -> Self {
        MergePolicy {
            overflow: OverflowPolicy::default(),
            tolerance_ticks: frame_ticks(fps),
            max_correction_ticks: secs_to_ticks(600.0),
            fps,
        }
    }
}

/// A narration clip on disk with its measured length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    pub scene_id: String,
    pub path: PathBuf,
    pub duration_ticks: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionKind {
    HoldFinalFrame,
    TruncateVideo,
    PadAudioSilence,
    WidenToOneFrame,
    DropEmptyScene,
}

/// An adjustment larger than the tolerance, reported for logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub scene_id: String,
    pub kind: CorrectionKind,
    pub ticks: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPlan {
    pub scene_id: String,
    /// Slice of the recording, in recording ticks.
    pub source_start_ticks: i64,
    pub source_end_ticks: i64,
    /// Freeze of the slice's last frame appended after it.
    pub hold_ticks: i64,
    /// Position on the final timeline.
    pub output_start_ticks: i64,
    pub output_end_ticks: i64,
    pub audio: Option<AudioClip>,
    /// Silence after the clip, or the whole audio for scenes without one.
    pub silence_ticks: i64,
}

impl SegmentPlan {
    pub fn source_ticks(&self) -> i64 {
        self.source_end_ticks - self.source_start_ticks
    }

    pub fn output_ticks(&self) -> i64 {
        self.output_end_ticks - self.output_start_ticks
    }

    pub fn video_ticks(&self) -> i64 {
        self.source_ticks() + self.hold_ticks
    }

    pub fn audio_ticks(&self) -> i64 {
        self.audio.as_ref().map(|c| c.duration_ticks).unwrap_or(0) + self.silence_ticks
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergePlan {
    pub segments: Vec<SegmentPlan>,
    pub cues: Vec<Cue>,
    pub corrections: Vec<Correction>,
    pub total_ticks: i64,
}

fn round_up(ticks: i64, frame: i64) -> i64 {
    (ticks + frame - 1) / frame * frame
}

/// Build the merge plan. Pure: identical inputs give an identical plan.
///
/// Every segment starts and ends on a frame boundary of `policy.fps`.
pub fn plan_merge(
    script: &Script,
    timeline: &Timeline,
    clips: &HashMap<String, AudioClip>,
    policy: &MergePolicy,
) -> Result<MergePlan, MergeError> {
    if timeline.entries.len() != script.scenes.len() {
        return Err(MergeError::EntryCountMismatch {
            expected: script.scenes.len(),
            recorded: timeline.entries.len(),
        });
    }

    let frame = frame_ticks(policy.fps);
    let mut segments = Vec::with_capacity(script.scenes.len());
    let mut cues = Vec::new();
    let mut corrections = Vec::new();
    let mut cursor = 0i64;

    for (index, (scene, entry)) in script.scenes.iter().zip(&timeline.entries).enumerate() {
        if scene.id != entry.scene_id {
            return Err(MergeError::SceneOrderMismatch {
                index,
                expected: scene.id.clone(),
                found: entry.scene_id.clone(),
            });
        }
        let (start, end) = match (entry.actual_start_ticks, entry.actual_end_ticks) {
            (Some(s), Some(e)) => (s, e),
            _ => return Err(MergeError::MissingActual(scene.id.clone())),
        };
        if end < start {
            return Err(MergeError::ReversedInterval {
                scene: scene.id.clone(),
                start,
                end,
            });
        }

        let mut correct = |kind, ticks| {
            corrections.push(Correction {
                scene_id: scene.id.clone(),
                kind,
                ticks,
            })
        };

        let mut source_end = end;
        let mut video = end - start;

        if !scene.is_narrated() && video == 0 {
            correct(CorrectionKind::DropEmptyScene, 0);
            continue;
        }
        if video < frame {
            correct(CorrectionKind::WidenToOneFrame, frame - video);
            source_end = start + frame;
            video = frame;
        }

        let (hold, audio) = if scene.is_narrated() {
            let clip = clips
                .get(&scene.id)
                .ok_or_else(|| MergeError::MissingClip(scene.id.clone()))?;
            let spoken = clip.duration_ticks;
            let delta = spoken - video;
            if delta.abs() > policy.max_correction_ticks {
                return Err(MergeError::Unrecoverable {
                    scene: scene.id.clone(),
                    delta_seconds: crate::timeline::ticks_to_secs(delta),
                });
            }

            if delta >= 0 {
                if delta > policy.tolerance_ticks {
                    correct(CorrectionKind::HoldFinalFrame, delta);
                }
                (delta, Some(clip.clone()))
            } else {
                let excess = -delta;
                if excess <= policy.tolerance_ticks || policy.overflow == OverflowPolicy::Truncate {
                    if excess > policy.tolerance_ticks {
                        correct(CorrectionKind::TruncateVideo, excess);
                    }
                    source_end = start + spoken.max(frame);
                    (0, Some(clip.clone()))
                } else {
                    correct(CorrectionKind::PadAudioSilence, excess);
                    (0, Some(clip.clone()))
                }
            }
        } else {
            (0, None)
        };

        // Snap to whole frames: the slice ends on a frame boundary and the
        // hold absorbs the remainder, rounded up. Silence fills the audio
        // out to the same length.
        let source = source_end - start;
        let aligned_source = source - source % frame;
        let aligned_hold = round_up(source - aligned_source + hold, frame);
        let length = aligned_source + aligned_hold;
        let spoken = audio.as_ref().map(|c| c.duration_ticks).unwrap_or(0);

        let segment = SegmentPlan {
            scene_id: scene.id.clone(),
            source_start_ticks: start,
            source_end_ticks: start + aligned_source,
            hold_ticks: aligned_hold,
            output_start_ticks: cursor,
            output_end_ticks: cursor + length,
            audio,
            silence_ticks: length - spoken,
        };
        debug_assert_eq!(segment.video_ticks(), segment.audio_ticks());

        if scene.is_narrated() {
            cues.push(Cue {
                start_ticks: segment.output_start_ticks,
                end_ticks: segment.output_end_ticks,
                text: scene.narration.clone(),
            });
        }
        cursor = segment.output_end_ticks;
        segments.push(segment);
    }

    if segments.is_empty() {
        return Err(MergeError::Empty);
    }

    Ok(MergePlan {
        segments,
        cues,
        corrections,
        total_ticks: cursor,
    })
}
