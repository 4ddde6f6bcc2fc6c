//! Chat completions
//!
//! [`ChatBackend`] is the seam to the cloud language model. [`Conversation`]
//! keeps the rolling history for the user-facing dialogue; the ignored and
//! login reactions use [`one_shot`] requests with their own prompts.

use crate::error::{JazminError, JazminResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub mod openai;
pub mod prompts;

/// Messages kept after the system prompt before the oldest are dropped
const MAX_HISTORY: usize = 24;

/// Shown when the chat API fails during a normal reply
pub const REPLY_FALLBACK: &str = "Sorry, I couldn't process that.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            messages,
            temperature,
            max_tokens,
            stop: Vec::new(),
        }
    }

    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop.push(stop.into());
        self
    }
}

/// Trait for chat completion providers
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Return the assistant's text for the request, trimmed
    async fn complete(&self, request: CompletionRequest) -> JazminResult<String>;

    /// Get the backend name
    fn name(&self) -> &str;
}

/// Single request with a dedicated system prompt and no history
pub async fn one_shot(
    backend: &dyn ChatBackend,
    system: impl Into<String>,
    user: impl Into<String>,
    temperature: f32,
    max_tokens: u32,
) -> JazminResult<String> {
    let request = CompletionRequest::new(
        vec![ChatMessage::system(system), ChatMessage::user(user)],
        temperature,
        max_tokens,
    );
    backend.complete(request).await
}

/// Rolling dialogue with Jazmin's persona
pub struct Conversation {
    backend: Arc<dyn ChatBackend>,
    user_name: String,
    history: Mutex<Vec<ChatMessage>>,
}

impl Conversation {
    pub fn new(backend: Arc<dyn ChatBackend>, user_name: impl Into<String>) -> Self {
        Self {
            backend,
            user_name: user_name.into(),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Ask for a reply to `user_text`. History is only extended on success.
    pub async fn reply(&self, user_text: &str) -> JazminResult<String> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(JazminError::Chat("empty user message".to_string()));
        }

        let mut history = self.history.lock().await;
        if history.is_empty() {
            history.push(ChatMessage::system(prompts::persona(&self.user_name)));
        }

        let mut messages = history.clone();
        messages.push(ChatMessage::user(user_text));
        messages.push(ChatMessage::system(prompts::COMPLETE_SENTENCE));

        let request = CompletionRequest::new(messages, 0.7, 30).with_stop("\n");
        let reply = self.backend.complete(request).await?;

        history.push(ChatMessage::user(user_text));
        history.push(ChatMessage::assistant(reply.clone()));
        if history.len() > MAX_HISTORY + 1 {
            let excess = history.len() - (MAX_HISTORY + 1);
            history.drain(1..=excess);
        }
        debug!("💬 History now {} messages", history.len());
        Ok(reply)
    }

    /// Reply, or the canned apology when the API fails
    pub async fn reply_or_fallback(&self, user_text: &str) -> String {
        match self.reply(user_text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("❌ Chat reply failed: {}", e);
                REPLY_FALLBACK.to_string()
            }
        }
    }

    pub async fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct EchoBackend {
        requests: StdMutex<Vec<CompletionRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn complete(&self, request: CompletionRequest) -> JazminResult<String> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(JazminError::Chat("boom".to_string()));
            }
            let last_user = request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(format!("You said {}.", last_user))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn backend(fail: bool) -> Arc<EchoBackend> {
        Arc::new(EchoBackend {
            requests: StdMutex::new(Vec::new()),
            fail,
        })
    }

    #[tokio::test]
    async fn test_reply_seeds_persona_and_keeps_history() {
        let echo = backend(false);
        let convo = Conversation::new(echo.clone(), "Sam");

        let reply = convo.reply("hello").await.unwrap();
        assert_eq!(reply, "You said hello.");

        let history = convo.history().await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, Role::System);
        assert!(history[0].content.contains("Sam"));

        let requests = echo.requests.lock().unwrap();
        let sent = &requests[0];
        assert_eq!(sent.max_tokens, 30);
        assert_eq!(sent.stop, vec!["\n".to_string()]);
        assert_eq!(sent.messages.last().unwrap().content, prompts::COMPLETE_SENTENCE);
    }

    #[tokio::test]
    async fn test_failed_reply_leaves_history_untouched() {
        let convo = Conversation::new(backend(true), "Sam");
        assert!(convo.reply("hello").await.is_err());
        assert_eq!(convo.history().await.len(), 1);
        assert_eq!(convo.reply_or_fallback("hello").await, REPLY_FALLBACK);
    }

    #[tokio::test]
    async fn test_history_is_capped() {
        let convo = Conversation::new(backend(false), "Sam");
        for i in 0..40 {
            convo.reply(&format!("message {}", i)).await.unwrap();
        }
        let history = convo.history().await;
        assert_eq!(history.len(), MAX_HISTORY + 1);
        assert_eq!(history[0].role, Role::System);
        assert_eq!(history.last().unwrap().content, "You said message 39.");
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let echo = backend(false);
        let convo = Conversation::new(echo.clone(), "Sam");
        assert!(convo.reply("   ").await.is_err());
        assert!(echo.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
