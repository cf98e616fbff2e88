//! Scene script model.
//!
//! A script is a `project` header plus an ordered list of `scenes`. Each
//! scene carries narration, an optional URL to open first, and a list of
//! browser actions. Parsing is pure: the same text always yields the same
//! [`Script`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

use crate::error::ScriptError;

pub const DEFAULT_VOICE: &str = "zh-CN-XiaoxiaoNeural";
pub const DEFAULT_CLICK_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_IFRAME_POSITIONS: [f64; 3] = [300.0, 600.0, 900.0];
pub const DEFAULT_IFRAME_INTERVAL: f64 = 1.5;
/// Upper bound for any length given in seconds: scene durations, waits and
/// iframe intervals.
pub const MAX_SECONDS: f64 = 86_400.0;

/// Short aliases accepted wherever a voice identifier is expected.
const VOICE_PRESETS: &[(&str, &str)] = &[
    ("zh-CN-female", "zh-CN-XiaoxiaoNeural"),
    ("zh-CN-male", "zh-CN-YunxiNeural"),
    ("zh-TW-female", "zh-TW-HsiaoChenNeural"),
    ("zh-TW-male", "zh-TW-YunJheNeural"),
    ("en-US-female", "en-US-JennyNeural"),
    ("en-US-male", "en-US-GuyNeural"),
    ("ja-JP-female", "ja-JP-NanamiNeural"),
    ("ja-JP-male", "ja-JP-KeitaNeural"),
];

/// Expand a preset alias to a full voice id. Unknown names pass through.
pub fn resolve_voice(name: &str) -> String {
    VOICE_PRESETS
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, voice)| voice.to_string())
        .unwrap_or_else(|| name.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptFormat {
    Yaml,
    Json,
}

impl ScriptFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Some(ScriptFormat::Yaml),
            Some("json") => Some(ScriptFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub resolution: Resolution,
    pub fps: u32,
    pub voice: String,
    pub voice_rate: String,
    pub bitrate: String,
}

impl Default for Project {
    fn default() -> Self {
        Project {
            name: "Demo Video".to_string(),
            resolution: Resolution {
                width: 1440,
                height: 900,
            },
            fps: 30,
            voice: DEFAULT_VOICE.to_string(),
            voice_rate: "+0%".to_string(),
            bitrate: "8000k".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DurationPolicy {
    /// Scene length follows the narration clip.
    Auto,
    /// Scene length in seconds.
    Fixed(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaitDuration {
    Seconds(f64),
    /// Hold until the scene's planned window is used up.
    Auto,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickTarget {
    Selector(String),
    Text(String),
}

/// One browser interaction. Closed set: every consumer matches exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Scroll { y: f64, smooth: bool },
    ScrollToText { text: String, offset: f64 },
    Click { target: ClickTarget, timeout_ms: u64 },
    Fill { selector: String, value: String },
    Wait { duration: WaitDuration },
    Goto { url: String },
    ScrollIframe { positions: Vec<f64>, interval: f64 },
}

impl Action {
    pub const KINDS: [&'static str; 7] = [
        "scroll",
        "scroll_to_text",
        "click",
        "fill",
        "wait",
        "goto",
        "scroll_iframe",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Scroll { .. } => "scroll",
            Action::ScrollToText { .. } => "scroll_to_text",
            Action::Click { .. } => "click",
            Action::Fill { .. } => "fill",
            Action::Wait { .. } => "wait",
            Action::Goto { .. } => "goto",
            Action::ScrollIframe { .. } => "scroll_iframe",
        }
    }

    /// Wire form: the `{type: ..., params...}` object the script uses.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::from(self.kind()));
        match self {
            Action::Scroll { y, smooth } => {
                map.insert("y".to_string(), Value::from(*y));
                map.insert("smooth".to_string(), Value::from(*smooth));
            }
            Action::ScrollToText { text, offset } => {
                map.insert("text".to_string(), Value::from(text.clone()));
                map.insert("offset".to_string(), Value::from(*offset));
            }
            Action::Click { target, timeout_ms } => {
                match target {
                    ClickTarget::Selector(s) => map.insert("selector".to_string(), Value::from(s.clone())),
                    ClickTarget::Text(t) => map.insert("text".to_string(), Value::from(t.clone())),
                };
                map.insert("timeout".to_string(), Value::from(*timeout_ms));
            }
            Action::Fill { selector, value } => {
                map.insert("selector".to_string(), Value::from(selector.clone()));
                map.insert("value".to_string(), Value::from(value.clone()));
            }
            Action::Wait { duration } => {
                let v = match duration {
                    WaitDuration::Seconds(s) => Value::from(*s),
                    WaitDuration::Auto => Value::from("auto"),
                };
                map.insert("duration".to_string(), v);
            }
            Action::Goto { url } => {
                map.insert("url".to_string(), Value::from(url.clone()));
            }
            Action::ScrollIframe { positions, interval } => {
                map.insert("positions".to_string(), Value::from(positions.clone()));
                map.insert("interval".to_string(), Value::from(*interval));
            }
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub id: String,
    pub url: Option<String>,
    pub narration: String,
    pub voice: Option<String>,
    pub actions: Vec<Action>,
    pub duration: DurationPolicy,
    /// Set by the timeline builder, in ticks.
    pub resolved_duration: Option<i64>,
}

impl Scene {
    pub fn is_narrated(&self) -> bool {
        !self.narration.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub project: Project,
    pub scenes: Vec<Scene>,
}

// Loose shapes deserialized first, then checked field by field so errors can
// name the scene, action index and parameter.

#[derive(Deserialize)]
struct RawScript {
    #[serde(default)]
    project: Option<RawProject>,
    #[serde(default)]
    scenes: Vec<RawScene>,
}

#[derive(Deserialize, Default)]
struct RawProject {
    name: Option<String>,
    resolution: Option<[i64; 2]>,
    fps: Option<i64>,
    voice: Option<String>,
    voice_rate: Option<String>,
    bitrate: Option<String>,
}

#[derive(Deserialize)]
struct RawScene {
    id: String,
    #[serde(default)]
    narration: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    voice: Option<String>,
    #[serde(default)]
    actions: Vec<Map<String, Value>>,
    #[serde(default)]
    duration: Option<Value>,
}

impl Script {
    /// Read and parse a script file, picking the format from its extension.
    pub fn from_file(path: &Path) -> Result<Script, ScriptError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScriptError::Syntax(format!("{}: {}", path.display(), e)))?;
        match ScriptFormat::from_path(path) {
            Some(format) => Script::parse_str(&text, format),
            None => Script::parse_str(&text, ScriptFormat::Yaml)
                .or_else(|_| Script::parse_str(&text, ScriptFormat::Json)),
        }
    }

    pub fn parse_str(text: &str, format: ScriptFormat) -> Result<Script, ScriptError> {
        let value: Value = match format {
            ScriptFormat::Yaml => serde_yaml::from_str(text)?,
            ScriptFormat::Json => serde_json::from_str(text)?,
        };
        let raw: RawScript = serde_json::from_value(value)?;
        Script::from_raw(raw)
    }

    fn from_raw(raw: RawScript) -> Result<Script, ScriptError> {
        let project = build_project(raw.project.unwrap_or_default())?;

        let mut seen = HashSet::new();
        let mut scenes = Vec::with_capacity(raw.scenes.len());
        for (pos, raw_scene) in raw.scenes.into_iter().enumerate() {
            if raw_scene.id.trim().is_empty() {
                return Err(ScriptError::EmptySceneId(pos));
            }
            if !seen.insert(raw_scene.id.clone()) {
                return Err(ScriptError::DuplicateScene(raw_scene.id));
            }
            scenes.push(build_scene(raw_scene)?);
        }

        Ok(Script { project, scenes })
    }

    pub fn scene(&self, id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    /// Voice for a scene: its own override, else the project voice.
    pub fn voice_for(&self, scene: &Scene) -> String {
        resolve_voice(scene.voice.as_deref().unwrap_or(&self.project.voice))
    }

    pub fn narrated_scenes(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.iter().filter(|s| s.is_narrated())
    }

    /// Serialize back into the YAML shape accepted by [`Script::parse_str`].
    pub fn to_yaml(&self) -> Result<String, ScriptError> {
        let p = &self.project;
        let project = serde_json::json!({
            "name": p.name,
            "resolution": [p.resolution.width, p.resolution.height],
            "fps": p.fps,
            "voice": p.voice,
            "voice_rate": p.voice_rate,
            "bitrate": p.bitrate,
        });
        let scenes: Vec<Value> = self
            .scenes
            .iter()
            .map(|s| {
                let mut map = Map::new();
                map.insert("id".to_string(), Value::from(s.id.clone()));
                map.insert("narration".to_string(), Value::from(s.narration.clone()));
                if let Some(url) = &s.url {
                    map.insert("url".to_string(), Value::from(url.clone()));
                }
                if let Some(voice) = &s.voice {
                    map.insert("voice".to_string(), Value::from(voice.clone()));
                }
                map.insert(
                    "actions".to_string(),
                    Value::Array(s.actions.iter().map(Action::to_value).collect()),
                );
                let duration = match s.duration {
                    DurationPolicy::Auto => Value::from("auto"),
                    DurationPolicy::Fixed(secs) => Value::from(secs),
                };
                map.insert("duration".to_string(), duration);
                Value::Object(map)
            })
            .collect();

        Ok(serde_yaml::to_string(&serde_json::json!({
            "project": project,
            "scenes": scenes,
        }))?)
    }
}

fn build_project(raw: RawProject) -> Result<Project, ScriptError> {
    let mut project = Project::default();
    if let Some(name) = raw.name {
        project.name = name;
    }
    if let Some([w, h]) = raw.resolution {
        if w <= 0 || h <= 0 {
            return Err(ScriptError::InvalidProject(format!(
                "resolution must be positive, got {}x{}",
                w, h
            )));
        }
        project.resolution = Resolution {
            width: w as u32,
            height: h as u32,
        };
    }
    if let Some(fps) = raw.fps {
        if fps <= 0 {
            return Err(ScriptError::InvalidProject(format!(
                "fps must be positive, got {}",
                fps
            )));
        }
        project.fps = fps as u32;
    }
    if let Some(voice) = raw.voice {
        project.voice = voice;
    }
    if let Some(rate) = raw.voice_rate {
        project.voice_rate = rate;
    }
    if let Some(bitrate) = raw.bitrate {
        project.bitrate = bitrate;
    }
    Ok(project)
}

fn build_scene(raw: RawScene) -> Result<Scene, ScriptError> {
    let narration = raw.narration.unwrap_or_default();

    let duration = match &raw.duration {
        None | Some(Value::Null) => DurationPolicy::Auto,
        Some(Value::String(s)) if s == "auto" => DurationPolicy::Auto,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(secs) if secs > 0.0 && secs <= MAX_SECONDS => DurationPolicy::Fixed(secs),
            _ => {
                return Err(ScriptError::InvalidDuration {
                    scene: raw.id,
                    value: n.to_string(),
                })
            }
        },
        Some(other) => {
            return Err(ScriptError::InvalidDuration {
                scene: raw.id,
                value: other.to_string(),
            })
        }
    };

    if duration == DurationPolicy::Auto && narration.trim().is_empty() {
        return Err(ScriptError::AmbiguousDuration(raw.id));
    }

    let actions = raw
        .actions
        .iter()
        .enumerate()
        .map(|(index, params)| build_action(&raw.id, index, params))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Scene {
        id: raw.id,
        url: raw.url.filter(|u| !u.trim().is_empty()),
        narration,
        voice: raw.voice,
        actions,
        duration,
        resolved_duration: None,
    })
}

/// Typed access to one action's parameter map.
struct Params<'a> {
    scene: &'a str,
    index: usize,
    kind: &'static str,
    map: &'a Map<String, Value>,
}

impl<'a> Params<'a> {
    fn missing(&self, param: &'static str) -> ScriptError {
        ScriptError::MissingParam {
            scene: self.scene.to_string(),
            index: self.index,
            kind: self.kind,
            param,
        }
    }

    fn wrong(&self, param: &'static str, expected: &'static str) -> ScriptError {
        ScriptError::WrongType {
            scene: self.scene.to_string(),
            index: self.index,
            kind: self.kind,
            param,
            expected,
        }
    }

    fn opt_f64(&self, param: &'static str) -> Result<Option<f64>, ScriptError> {
        match self.map.get(param) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| self.wrong(param, "a number")),
        }
    }

    fn f64(&self, param: &'static str) -> Result<f64, ScriptError> {
        self.opt_f64(param)?.ok_or_else(|| self.missing(param))
    }

    fn opt_str(&self, param: &'static str) -> Result<Option<String>, ScriptError> {
        match self.map.get(param) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.wrong(param, "a string")),
        }
    }

    fn str(&self, param: &'static str) -> Result<String, ScriptError> {
        self.opt_str(param)?.ok_or_else(|| self.missing(param))
    }

    fn opt_bool(&self, param: &'static str) -> Result<Option<bool>, ScriptError> {
        match self.map.get(param) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(self.wrong(param, "a boolean")),
        }
    }
}

fn build_action(scene: &str, index: usize, map: &Map<String, Value>) -> Result<Action, ScriptError> {
    let tag = match map.get("type") {
        Some(Value::String(t)) => t.as_str(),
        Some(other) => {
            return Err(ScriptError::UnknownAction {
                scene: scene.to_string(),
                index,
                kind: other.to_string(),
            })
        }
        None => {
            return Err(ScriptError::MissingParam {
                scene: scene.to_string(),
                index,
                kind: "action",
                param: "type",
            })
        }
    };
    let kind = Action::KINDS
        .iter()
        .copied()
        .find(|k| *k == tag)
        .ok_or_else(|| ScriptError::UnknownAction {
            scene: scene.to_string(),
            index,
            kind: tag.to_string(),
        })?;
    let p = Params {
        scene,
        index,
        kind,
        map,
    };

    let action = match kind {
        "scroll" => Action::Scroll {
            y: p.f64("y")?,
            smooth: p.opt_bool("smooth")?.unwrap_or(false),
        },
        "scroll_to_text" => Action::ScrollToText {
            text: p.str("text")?,
            offset: p.opt_f64("offset")?.unwrap_or(0.0),
        },
        "click" => {
            let target = match (p.opt_str("selector")?, p.opt_str("text")?) {
                (Some(sel), None) if !sel.is_empty() => ClickTarget::Selector(sel),
                (None, Some(text)) if !text.is_empty() => ClickTarget::Text(text),
                (Some(_), Some(_)) => return Err(p.wrong("selector", "given without 'text'")),
                _ => return Err(p.missing("selector")),
            };
            let timeout_ms = match p.opt_f64("timeout")? {
                Some(ms) if ms > 0.0 => ms as u64,
                Some(_) => return Err(p.wrong("timeout", "a positive number of milliseconds")),
                None => DEFAULT_CLICK_TIMEOUT_MS,
            };
            Action::Click { target, timeout_ms }
        }
        "fill" => Action::Fill {
            selector: p.str("selector")?,
            value: p.str("value")?,
        },
        "wait" => {
            let duration = match map.get("duration") {
                None | Some(Value::Null) => return Err(p.missing("duration")),
                Some(Value::String(s)) if s == "auto" => WaitDuration::Auto,
                Some(v) => match v.as_f64() {
                    Some(secs) if (0.0..=MAX_SECONDS).contains(&secs) => WaitDuration::Seconds(secs),
                    _ => return Err(p.wrong("duration", "a number of seconds up to a day, or \"auto\"")),
                },
            };
            Action::Wait { duration }
        }
        "goto" => Action::Goto { url: p.str("url")? },
        "scroll_iframe" => {
            let positions = match map.get("positions") {
                None | Some(Value::Null) => DEFAULT_IFRAME_POSITIONS.to_vec(),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|v| v.as_f64().ok_or_else(|| p.wrong("positions", "a list of numbers")))
                    .collect::<Result<Vec<_>, _>>()?,
                Some(_) => return Err(p.wrong("positions", "a list of numbers")),
            };
            let interval = p.opt_f64("interval")?.unwrap_or(DEFAULT_IFRAME_INTERVAL);
            if !(0.0..=MAX_SECONDS).contains(&interval) {
                return Err(p.wrong("interval", "a number of seconds up to a day"));
            }
            Action::ScrollIframe { positions, interval }
        }
        _ => unreachable!("kind comes from Action::KINDS"),
    };
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
project:
  name: Tour
  resolution: [1280, 720]
  fps: 25
  voice: en-US-female
scenes:
  - id: intro
    url: https://example.com
    narration: "Welcome."
    actions:
      - type: wait
        duration: 1
  - id: pricing
    narration: "Here are the plans."
    duration: auto
    actions:
      - type: scroll_to_text
        text: Pricing
        offset: 80
      - type: click
        text: Monthly
  - id: outro
    duration: 3
    actions:
      - type: scroll
        y: 0
        smooth: true
"#;

    #[test]
    fn parses_yaml_script() {
        let script = Script::parse_str(SAMPLE, ScriptFormat::Yaml).unwrap();
        assert_eq!(script.project.name, "Tour");
        assert_eq!(script.project.resolution, Resolution { width: 1280, height: 720 });
        assert_eq!(script.project.fps, 25);
        assert_eq!(script.scenes.len(), 3);
        assert_eq!(script.scenes[0].duration, DurationPolicy::Auto);
        assert_eq!(script.scenes[2].duration, DurationPolicy::Fixed(3.0));
        assert!(!script.scenes[2].is_narrated());
        assert_eq!(
            script.scenes[1].actions[1],
            Action::Click {
                target: ClickTarget::Text("Monthly".to_string()),
                timeout_ms: DEFAULT_CLICK_TIMEOUT_MS
            }
        );
        assert_eq!(script.voice_for(&script.scenes[0]), "en-US-JennyNeural");
    }

    #[test]
    fn json_and_yaml_parse_identically() {
        let json = r#"{"scenes":[{"id":"a","narration":"Hi","actions":[{"type":"goto","url":"https://x.dev"}]}]}"#;
        let yaml = "scenes:\n  - id: a\n    narration: Hi\n    actions:\n      - type: goto\n        url: https://x.dev\n";
        let a = Script::parse_str(json, ScriptFormat::Json).unwrap();
        let b = Script::parse_str(yaml, ScriptFormat::Yaml).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.project, Project::default());
    }

    #[test]
    fn unknown_action_is_rejected() {
        let yaml = "scenes:\n  - id: a\n    narration: Hi\n    actions:\n      - type: hover\n        selector: '#x'\n";
        let err = Script::parse_str(yaml, ScriptFormat::Yaml).unwrap_err();
        assert!(matches!(err, ScriptError::UnknownAction { ref kind, .. } if kind == "hover"));
    }

    #[test]
    fn duplicate_scene_ids_are_rejected() {
        let yaml = "scenes:\n  - id: a\n    narration: One\n  - id: a\n    narration: Two\n";
        let err = Script::parse_str(yaml, ScriptFormat::Yaml).unwrap_err();
        assert_eq!(err, ScriptError::DuplicateScene("a".to_string()));
    }

    #[test]
    fn missing_and_mistyped_params_are_rejected() {
        let yaml = "scenes:\n  - id: a\n    narration: Hi\n    actions:\n      - type: fill\n        selector: '#q'\n";
        let err = Script::parse_str(yaml, ScriptFormat::Yaml).unwrap_err();
        assert!(matches!(err, ScriptError::MissingParam { param: "value", .. }));

        let yaml = "scenes:\n  - id: a\n    narration: Hi\n    actions:\n      - type: scroll\n        y: lots\n";
        let err = Script::parse_str(yaml, ScriptFormat::Yaml).unwrap_err();
        assert!(matches!(err, ScriptError::WrongType { param: "y", .. }));

        let yaml = "scenes:\n  - id: a\n    narration: Hi\n    actions:\n      - type: click\n";
        let err = Script::parse_str(yaml, ScriptFormat::Yaml).unwrap_err();
        assert!(matches!(err, ScriptError::MissingParam { param: "selector", .. }));
    }

    #[test]
    fn auto_duration_without_narration_is_ambiguous() {
        let yaml = "scenes:\n  - id: silent\n    actions: []\n";
        let err = Script::parse_str(yaml, ScriptFormat::Yaml).unwrap_err();
        assert_eq!(err, ScriptError::AmbiguousDuration("silent".to_string()));
    }

    #[test]
    fn oversized_lengths_are_rejected() {
        let json = r#"{"scenes": [{"id": "long", "duration": 1e300}]}"#;
        assert!(matches!(
            Script::parse_str(json, ScriptFormat::Json),
            Err(ScriptError::InvalidDuration { scene, .. }) if scene == "long"
        ));

        let json = r#"{"scenes": [{"id": "a", "duration": 5, "actions": [{"type": "wait", "duration": 1e300}]}]}"#;
        assert!(matches!(
            Script::parse_str(json, ScriptFormat::Json),
            Err(ScriptError::WrongType { param: "duration", .. })
        ));

        let yaml = "scenes:\n  - id: a\n    duration: 86400\n";
        assert!(Script::parse_str(yaml, ScriptFormat::Yaml).is_ok());
    }

    #[test]
    fn non_positive_project_settings_are_rejected() {
        let yaml = "project:\n  fps: 0\nscenes: []\n";
        assert!(matches!(
            Script::parse_str(yaml, ScriptFormat::Yaml),
            Err(ScriptError::InvalidProject(_))
        ));
        let yaml = "project:\n  resolution: [0, 720]\nscenes: []\n";
        assert!(matches!(
            Script::parse_str(yaml, ScriptFormat::Yaml),
            Err(ScriptError::InvalidProject(_))
        ));
    }

    #[test]
    fn yaml_export_parses_back_to_the_same_script() {
        let script = Script::parse_str(SAMPLE, ScriptFormat::Yaml).unwrap();
        let again = Script::parse_str(&script.to_yaml().unwrap(), ScriptFormat::Yaml).unwrap();
        assert_eq!(script, again);
    }

    #[test]
    fn scroll_iframe_defaults() {
        let yaml = "scenes:\n  - id: a\n    duration: 5\n    actions:\n      - type: scroll_iframe\n";
        let script = Script::parse_str(yaml, ScriptFormat::Yaml).unwrap();
        assert_eq!(
            script.scenes[0].actions[0],
            Action::ScrollIframe {
                positions: DEFAULT_IFRAME_POSITIONS.to_vec(),
                interval: DEFAULT_IFRAME_INTERVAL
            }
        );
    }
}
