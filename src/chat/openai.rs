//! OpenAI-compatible chat completions
//!
//! Sends the request to `{base}/chat/completions` and returns the first
//! choice's content. Round-trip time is reported to the tuner.

use super::{ChatBackend, CompletionRequest};
use crate::config::{Config, OPENAI_KEY_ENV};
use crate::error::{JazminError, JazminResult};
use crate::optimizer::Optimizer;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the first choice's text out of a response body
fn parse_completion(body: &str) -> JazminResult<String> {
    let resp: CompletionResponse = serde_json::from_str(body)?;
    let text = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(JazminError::Chat("response had no content".to_string()));
    }
    Ok(text)
}

/// Handles the chat API
#[derive(Clone)]
pub struct OpenAiChat {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    timeout: Duration,
    optimizer: Option<Arc<Optimizer>>,
}

impl OpenAiChat {
    /// Create new chat client from config
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.openai_url.trim_end_matches('/').to_string(),
            model: config.openai_model.clone(),
            api_key: config.openai_api_key.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
            optimizer: None,
        }
    }

    pub fn with_optimizer(mut self, optimizer: Arc<Optimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }
        body
    }
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    async fn complete(&self, request: CompletionRequest) -> JazminResult<String> {
        if self.api_key.is_empty() {
            return Err(JazminError::Config(format!("{} is not set", OPENAI_KEY_ENV)));
        }

        let started = Instant::now();
        let response = self
            .client
            .post(format!("{}/chat/completions", self.url))
            .bearer_auth(&self.api_key)
            .json(&self.build_body(&request))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let body_text = response.text().await?;

        if let Some(opt) = &self.optimizer {
            opt.report_network_rtt(started.elapsed().as_secs_f64() * 1000.0);
        }

        if !status.is_success() {
            warn!("❌ Chat API Error ({}): {}", status, body_text);
            return Err(JazminError::Chat(format!("HTTP {}", status)));
        }

        debug!("🧠 Chat raw body: {}", body_text);
        parse_completion(&body_text)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
