//! Lower-bound estimates for how long a scene's actions take to play out.

use serde::{Deserialize, Serialize};

use crate::script::{Action, Scene, WaitDuration};
use crate::timeline::secs_to_ticks;

const NAVIGATION_FLOOR_SECS: f64 = 1.0;

/// Recorded when a scene's actions cannot fit in its planned window.
/// The merge step decides what to do about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingHint {
    pub planned_ticks: i64,
    pub min_feasible_ticks: i64,
    pub overrun_ticks: i64,
}

/// Minimum time an action occupies, not counting retries.
pub fn action_floor_ticks(action: &Action) -> i64 {
    match action {
        Action::Scroll { .. } => secs_to_ticks(0.5),
        Action::ScrollToText { .. } => secs_to_ticks(0.8),
        Action::Click { .. } => secs_to_ticks(0.5),
        Action::Fill { .. } => secs_to_ticks(0.3),
        Action::Wait { duration } => match duration {
            WaitDuration::Seconds(secs) => secs_to_ticks(*secs),
            WaitDuration::Auto => 0,
        },
        Action::Goto { .. } => secs_to_ticks(1.0),
        Action::ScrollIframe { positions, interval } => {
            secs_to_ticks(positions.len() as f64 * interval)
        }
    }
}

pub fn min_feasible_ticks(scene: &Scene) -> i64 {
    let navigation = if scene.url.is_some() {
        secs_to_ticks(NAVIGATION_FLOOR_SECS)
    } else {
        0
    };
    navigation + scene.actions.iter().map(action_floor_ticks).sum::<i64>()
}

const MAX_RATE_PERCENT: i64 = 50;

/// Faster speaking rate (`"+N%"`) that should bring a `spoken`-long clip
/// down to `target`, starting from `base`. `None` when the clip already fits
/// or `base` is already at the cap.
pub fn fit_voice_rate(base: &str, spoken_ticks: i64, target_ticks: i64) -> Option<String> {
    if target_ticks <= 0 || spoken_ticks <= target_ticks {
        return None;
    }
    let base_pct: i64 = base
        .trim()
        .trim_end_matches('%')
        .trim_start_matches('+')
        .parse()
        .unwrap_or(0);
    let needed = ((spoken_ticks - target_ticks) * 100 + target_ticks - 1) / target_ticks;
    let pct = (base_pct + needed).min(MAX_RATE_PERCENT);
    (pct > base_pct).then(|| format!("{:+}%", pct))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{ClickTarget, DurationPolicy};

    #[test]
    fn voice_rate_speeds_up_to_fit() {
        assert_eq!(fit_voice_rate("+0%", secs_to_ticks(5.5), secs_to_ticks(5.0)), Some("+10%".to_string()));
        assert_eq!(fit_voice_rate("+20%", secs_to_ticks(6.0), secs_to_ticks(5.0)), Some("+40%".to_string()));
        assert_eq!(fit_voice_rate("+0%", secs_to_ticks(20.0), secs_to_ticks(5.0)), Some("+50%".to_string()));
        assert_eq!(fit_voice_rate("+50%", secs_to_ticks(20.0), secs_to_ticks(5.0)), None);
        assert_eq!(fit_voice_rate("+0%", secs_to_ticks(4.0), secs_to_ticks(5.0)), None);
    }

    #[test]
    fn floor_sums_waits_navigation_and_interactions() {
        let scene = Scene {
            id: "a".to_string(),
            url: Some("https://example.com".to_string()),
            narration: "Hi".to_string(),
            voice: None,
            actions: vec![
                Action::Wait {
                    duration: WaitDuration::Seconds(2.0),
                },
                Action::Click {
                    target: ClickTarget::Selector("#a".to_string()),
                    timeout_ms: 3000,
                },
                Action::Wait {
                    duration: WaitDuration::Auto,
                },
                Action::ScrollIframe {
                    positions: vec![100.0, 200.0],
                    interval: 1.0,
                },
            ],
            duration: DurationPolicy::Auto,
            resolved_duration: None,
        };
        assert_eq!(min_feasible_ticks(&scene), secs_to_ticks(1.0 + 2.0 + 0.5 + 2.0));
    }
}
