use serde::{Deserialize, Serialize};

use crate::timeline::TICKS_PER_SECOND;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    pub start_ticks: i64,
    pub end_ticks: i64,
    pub text: String,
}

/// `HH:MM:SS,mmm`, rounded to the nearest millisecond.
pub fn format_srt_timestamp(ticks: i64) -> String {
    let millis = (ticks.max(0) * 1000 + TICKS_PER_SECOND / 2) / TICKS_PER_SECOND;
    let h = millis / 3_600_000;
    let m = (millis % 3_600_000) / 60_000;
    let s = (millis % 60_000) / 1000;
    let ms = millis % 1000;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// Cue text as it may appear inside a SubRip block. Blank lines would end
/// the block early, so they are dropped.
fn block_text(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render cues as SubRip: numbered blocks separated by blank lines.
pub fn to_srt(cues: &[Cue]) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_srt_timestamp(cue.start_ticks),
            format_srt_timestamp(cue.end_ticks),
            block_text(&cue.text)
        ));
    }
    out
}

/// True when cues are ordered by strictly increasing start and never overlap.
pub fn cues_are_ordered(cues: &[Cue]) -> bool {
    cues.iter().all(|c| c.end_ticks > c.start_ticks)
        && cues
            .windows(2)
            .all(|w| w[1].start_ticks > w[0].start_ticks && w[1].start_ticks >= w[0].end_ticks)
}
