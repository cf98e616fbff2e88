use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::error::SynthesisError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Text to speak for one scene.
#[derive(Debug, Clone, Serialize)]
pub struct SpeechRequest {
    #[serde(skip)]
    pub scene_id: String,
    pub text: String,
    pub voice: String,
    pub rate: String,
}

/// A text-to-speech backend. Returns encoded MP3 bytes.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Bytes, SynthesisError>;
}

/// Clip cache key: changes whenever voice, rate or text changes.
pub fn cache_key(voice: &str, rate: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(voice.as_bytes());
    hasher.update(b"|");
    hasher.update(rate.as_bytes());
    hasher.update(b"|");
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())[..12].to_string()
}

/// Talks to a speech sidecar over HTTP: `POST {base}/synthesize`.
pub struct HttpSynthesizer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSynthesizer {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(HttpSynthesizer {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Bytes, SynthesisError> {
        let unreachable = |e: reqwest::Error| SynthesisError::Unreachable {
            scene: request.scene_id.clone(),
            message: e.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/synthesize", self.base_url))
            .json(&serde_json::json!({
                "text": request.text,
                "voice": request.voice,
                "rate": request.rate,
                "format": "mp3",
            }))
            .send()
            .await
            .map_err(unreachable)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SynthesisError::Backend {
                scene: request.scene_id.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let audio = response.bytes().await.map_err(unreachable)?;
        if audio.is_empty() {
            return Err(SynthesisError::EmptyClip(request.scene_id.clone()));
        }
        Ok(audio)
    }
}
