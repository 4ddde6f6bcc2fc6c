//! Mock chat backend for testing
//!
//! Answers with a fixed line, fails, or hangs, and records every request.

use async_trait::async_trait;
use jazmin::chat::{ChatBackend, CompletionRequest, Role};
use jazmin::error::{JazminError, JazminResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum ChatBehaviour {
    Reply(String),
    /// Prefix the last user message with "You said: "
    Echo,
    Fail,
    /// Sleep this long, then reply
    Slow(Duration, String),
}

#[derive(Debug)]
pub struct MockChat {
    pub behaviour: Mutex<ChatBehaviour>,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockChat {
    pub fn new(behaviour: ChatBehaviour) -> Self {
        Self {
            behaviour: Mutex::new(behaviour),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(ChatBehaviour::Reply(text.to_string()))
    }

    pub fn failing() -> Self {
        Self::new(ChatBehaviour::Fail)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatBackend for MockChat {
    async fn complete(&self, request: CompletionRequest) -> JazminResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        let behaviour = self.behaviour.lock().unwrap().clone();
        match behaviour {
            ChatBehaviour::Reply(text) => Ok(text),
            ChatBehaviour::Echo => {
                let last_user = request
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                Ok(format!("You said: {}", last_user))
            }
            ChatBehaviour::Fail => Err(JazminError::Chat("mock failure".to_string())),
            ChatBehaviour::Slow(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
