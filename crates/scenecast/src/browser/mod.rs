use async_trait::async_trait;
use engine::script::{Action, Resolution};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ActionError, RecordingError};

/// How the browser window is opened and recorded.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub resolution: Resolution,
    pub fps: u32,
    pub headless: bool,
    pub record_dir: PathBuf,
}

/// One recorded browser. The recording runs from `start` until `close`,
/// which returns the finished video file.
#[async_trait]
pub trait BrowserSession: Send {
    async fn start(&mut self, settings: &SessionSettings) -> Result<(), RecordingError>;

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), ActionError>;

    async fn perform(&mut self, action: &Action, timeout: Duration) -> Result<(), ActionError>;

    async fn close(&mut self) -> Result<PathBuf, RecordingError>;
}

#[derive(Deserialize)]
struct StartResponse {
    session_id: String,
}

#[derive(Deserialize)]
struct CloseResponse {
    video_path: PathBuf,
}

/// Drives a browser automation sidecar over HTTP.
pub struct HttpBrowserSession {
    client: reqwest::Client,
    base_url: String,
    session_id: Option<String>,
}

impl HttpBrowserSession {
    pub fn new(base_url: &str) -> Self {
        HttpBrowserSession {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session_id: None,
        }
    }

    fn session_url(&self, path: &str) -> Result<String, ActionError> {
        match &self.session_id {
            Some(id) => Ok(format!("{}/sessions/{}/{}", self.base_url, id, path)),
            None => Err(ActionError::SessionLost("session not started".to_string())),
        }
    }

    async fn send_step(
        &self,
        path: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<(), ActionError> {
        let url = self.session_url(path)?;
        let response = self
            .client
            .post(&url)
            .timeout(timeout + Duration::from_secs(2))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ActionError::Timeout(timeout)
                } else {
                    ActionError::SessionLost(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(action_error(status.as_u16(), path, message, timeout))
    }
}

fn action_error(status: u16, path: &str, message: String, timeout: Duration) -> ActionError {
    match status {
        404 => ActionError::NotFound(message),
        408 | 504 => ActionError::Timeout(timeout),
        410 => ActionError::SessionLost(message),
        _ if path == "navigate" => ActionError::Navigation(message),
        _ => ActionError::Rejected(format!("{}: {}", status, message)),
    }
}

#[async_trait]
impl BrowserSession for HttpBrowserSession {
    async fn start(&mut self, settings: &SessionSettings) -> Result<(), RecordingError> {
        let response = self
            .client
            .post(format!("{}/sessions", self.base_url))
            .json(&serde_json::json!({
                "width": settings.resolution.width,
                "height": settings.resolution.height,
                "fps": settings.fps,
                "headless": settings.headless,
                "record_dir": settings.record_dir,
            }))
            .send()
            .await
            .map_err(|e| RecordingError::Start(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RecordingError::Start(format!("{} - {}", status, error_text)));
        }
        let started: StartResponse = response
            .json()
            .await
            .map_err(|e| RecordingError::Start(format!("invalid response: {}", e)))?;
        self.session_id = Some(started.session_id);
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), ActionError> {
        self.send_step(
            "navigate",
            serde_json::json!({ "url": url, "timeout_ms": timeout.as_millis() as u64 }),
            timeout,
        )
        .await
    }

    async fn perform(&mut self, action: &Action, timeout: Duration) -> Result<(), ActionError> {
        self.send_step(
            "actions",
            serde_json::json!({ "action": action.to_value(), "timeout_ms": timeout.as_millis() as u64 }),
            timeout,
        )
        .await
    }

    async fn close(&mut self) -> Result<PathBuf, RecordingError> {
        let url = self
            .session_url("close")
            .map_err(|e| RecordingError::Finalize(e.to_string()))?;
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| RecordingError::Finalize(e.to_string()))?;
        self.session_id = None;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RecordingError::Finalize(format!("{} - {}", status, error_text)));
        }
        let closed: CloseResponse = response
            .json()
            .await
            .map_err(|e| RecordingError::Finalize(format!("invalid response: {}", e)))?;
        Ok(closed.video_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_statuses_map_to_action_errors() {
        let t = Duration::from_secs(3);
        assert!(matches!(action_error(404, "actions", "no #go".into(), t), ActionError::NotFound(_)));
        assert_eq!(action_error(504, "actions", String::new(), t), ActionError::Timeout(t));
        assert!(matches!(action_error(410, "actions", "gone".into(), t), ActionError::SessionLost(_)));
        assert!(matches!(action_error(500, "navigate", "dns".into(), t), ActionError::Navigation(_)));
        assert!(matches!(action_error(422, "actions", "bad".into(), t), ActionError::Rejected(_)));
    }

    #[tokio::test]
    async fn steps_before_start_report_a_lost_session() {
        let mut session = HttpBrowserSession::new("http://127.0.0.1:9");
        let err = session.navigate("https://example.com", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ActionError::SessionLost(_)));
    }
}
