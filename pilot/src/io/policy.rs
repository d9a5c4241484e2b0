//! Synchronous boundary to the external decision policy.
//!
//! The [`PolicyClient`] trait decouples the loop from the inference backend.
//! Each `decide` call performs exactly one request; retry policy belongs to
//! the tick driver, which holds no partial state across attempts.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// One fully composed policy request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRequest {
    pub system: String,
    pub user: String,
    /// Camera frame first, then the rendered depth map when present.
    pub images: Vec<PathBuf>,
}

/// Abstraction over decision-policy backends.
pub trait PolicyClient {
    /// Submit the request and return the raw reply text.
    fn decide(&self, request: &PolicyRequest) -> Result<String>;
}

/// Chat client for an Ollama-compatible endpoint.
pub struct OllamaPolicy {
    endpoint: String,
    model: String,
    http: reqwest::blocking::Client,
}

impl OllamaPolicy {
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("build policy http client")?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            http,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl PolicyClient for OllamaPolicy {
    #[instrument(skip_all, fields(model = %self.model, images = request.images.len()))]
    fn decide(&self, request: &PolicyRequest) -> Result<String> {
        let images = request
            .images
            .iter()
            .map(|path| {
                let bytes = fs::read(path)
                    .with_context(|| format!("read observation image {}", path.display()))?;
                Ok(BASE64.encode(bytes))
            })
            .collect::<Result<Vec<_>>>()?;

        let payload = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system.clone(),
                    images: Vec::new(),
                },
                ChatMessage {
                    role: "user",
                    content: request.user.clone(),
                    images,
                },
            ],
            stream: false,
        };

        info!("submitting policy request");
        let response = self
            .http
            .post(format!("{}/api/chat", self.endpoint))
            .json(&payload)
            .send()
            .context("send policy request")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("policy endpoint returned {status}"));
        }
        let parsed: ChatResponse = response.json().context("parse policy response")?;
        debug!(reply_bytes = parsed.message.content.len(), "policy replied");
        Ok(parsed.message.content)
    }
}
