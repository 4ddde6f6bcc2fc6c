//! What Jazmin does when she is ignored
//!
//! The first two stages show and speak an annoyed line, then erase it a while
//! later. The final stage says goodbye and shuts the process down after a
//! fixed grace period, whether or not the chat API answers.

use crate::chat::{one_shot, prompts, ChatBackend};
use crate::config::Config;
use crate::escalation::{EscalationHandler, IgnoreStage};
use crate::net;
use crate::output::OutputArea;
use crate::tts::Speaker;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

pub const NO_INTERNET: &str = "I don't have internet!";
pub const FAREWELL_FALLBACK: &str = "I'm done. Bye.";

/// Ends the process. Swapped out in tests.
pub trait Terminate: Send + Sync {
    fn terminate(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

impl Terminate for ProcessExit {
    fn terminate(&self) {
        info!("👋 Shutting down");
        std::process::exit(0);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReactionTiming {
    /// From entering the final stage to termination
    pub grace: Duration,
    /// From showing the fallback farewell to termination
    pub failure_exit: Duration,
    /// Window after which an annoyed line is erased
    pub erase_after: (Duration, Duration),
}

impl ReactionTiming {
    pub fn from_config(config: &Config) -> Self {
        let s = &config.escalation;
        let (lo, hi) = if s.erase_after_min_secs <= s.erase_after_max_secs {
            (s.erase_after_min_secs, s.erase_after_max_secs)
        } else {
            (s.erase_after_max_secs, s.erase_after_min_secs)
        };
        Self {
            grace: Duration::from_secs(s.grace_secs),
            failure_exit: Duration::from_secs(s.failure_exit_secs),
            erase_after: (Duration::from_secs(lo), Duration::from_secs(hi)),
        }
    }

    fn erase_delay(&self) -> Duration {
        let (lo, hi) = self.erase_after;
        Duration::from_millis(rand::thread_rng().gen_range(lo.as_millis() as u64..=hi.as_millis() as u64))
    }
}

pub struct IgnoredReactions {
    chat: Arc<dyn ChatBackend>,
    speaker: Arc<Speaker>,
    output: Arc<OutputArea>,
    user_name: String,
    connectivity_probe: Option<String>,
    timing: ReactionTiming,
    terminator: Arc<dyn Terminate>,
}

impl IgnoredReactions {
    pub fn new(
        chat: Arc<dyn ChatBackend>,
        speaker: Arc<Speaker>,
        output: Arc<OutputArea>,
        user_name: impl Into<String>,
        terminator: Arc<dyn Terminate>,
    ) -> Self {
        Self {
            chat,
            speaker,
            output,
            user_name: user_name.into(),
            connectivity_probe: None,
            timing: ReactionTiming::from_config(&Config::default()),
            terminator,
        }
    }

    pub fn with_probe(mut self, probe: Option<String>) -> Self {
        self.connectivity_probe = probe;
        self
    }

    pub fn with_timing(mut self, timing: ReactionTiming) -> Self {
        self.timing = timing;
        self
    }

    async fn annoyed(&self, stage: IgnoreStage) {
        if !self.output.is_blank() {
            info!("🤐 Output not empty, skipping '{}' reaction", stage);
            return;
        }

        if stage == IgnoreStage::Idle1 && !net::is_online(self.connectivity_probe.as_deref()).await {
            self.output.type_out(NO_INTERNET).await;
            return;
        }

        let Some(prompt) = prompts::ignored(stage, &self.user_name) else {
            return;
        };

        match one_shot(
            self.chat.as_ref(),
            prompt.system,
            prompt.user,
            prompt.temperature,
            prompt.max_tokens,
        )
        .await
        {
            Ok(line) => {
                info!("😒 Jazmin ({}): {}", stage, line);
                self.speaker.speak_detached(line.clone());
                if self.output.type_out(&line).await {
                    self.output.erase_after(self.timing.erase_delay());
                }
            }
            Err(e) => warn!("❌ Ignored reaction for '{}' failed: {}", stage, e),
        }
    }

    async fn farewell(&self) {
        let deadline = Instant::now() + self.timing.grace;

        let Some(prompt) = prompts::ignored(IgnoreStage::Terminated, &self.user_name) else {
            self.terminator.terminate();
            return;
        };

        let request = one_shot(
            self.chat.as_ref(),
            prompt.system,
            prompt.user,
            prompt.temperature,
            prompt.max_tokens,
        );

        match tokio::time::timeout_at(deadline, request).await {
            Ok(Ok(line)) => {
                info!("😤 Jazmin's final words: {}", line);
                self.speaker.speak_detached(line.clone());
                let _ = tokio::time::timeout_at(deadline, self.output.type_out(&line)).await;
                tokio::time::sleep_until(deadline).await;
            }
            Ok(Err(e)) => {
                warn!("❌ Final reaction failed: {}", e);
                self.output.show(FAREWELL_FALLBACK);
                let exit_at = (Instant::now() + self.timing.failure_exit).min(deadline);
                tokio::time::sleep_until(exit_at).await;
            }
            Err(_) => {
                warn!("⏱️ Final reaction timed out");
                self.output.show(FAREWELL_FALLBACK);
            }
        }

        self.terminator.terminate();
    }
}

#[async_trait]
impl EscalationHandler for IgnoredReactions {
    async fn on_stage(&self, stage: IgnoreStage) {
        match stage {
            IgnoreStage::Idle0 => {}
            IgnoreStage::Idle1 | IgnoreStage::Idle2 => self.annoyed(stage).await,
            IgnoreStage::Terminated => self.farewell().await,
        }
    }
}
