//! Signed-in session runtime
//!
//! [`Jazmin`] owns the pieces a signed-in session needs and turns each
//! submitted line into a reply, a fallback, or a command.

use crate::chat::{ChatBackend, Conversation};
use crate::config::Config;
use crate::escalation::{DelayPolicy, EscalationTimer, IgnoreStage};
use crate::optimizer::Optimizer;
use crate::output::OutputArea;
use crate::reactions::{IgnoredReactions, ReactionTiming, Terminate};
use crate::session::{self, ActivityClock};
use crate::tts::Speaker;
use rand::Rng;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, Lines};
use tracing::{info, warn};

/// How long a reply stays before it is erased
const REPLY_LINGER: Duration = Duration::from_secs(8);
/// Window after which a fallback reply is erased
const FALLBACK_LINGER: (u64, u64) = (4000, 6000);
/// Longest wait for the goodbye line to finish playing
const GOODBYE_TIMEOUT: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Mute,
    Unmute,
    Summary,
    Export(PathBuf),
    Flag(String, bool),
    Param(String, f64),
    Quit,
    Help,
}

pub const HELP: &str =
    "/mute  /unmute  /summary  /export <file.csv>  /flag <name> on|off  /param <name> <value>  /quit";

/// Parse a slash command. Unknown commands are `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let rest = line.strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let cmd = parts.next()?.to_lowercase();
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

    match (cmd.as_str(), arg) {
        ("mute", _) => Some(Command::Mute),
        ("unmute", _) => Some(Command::Unmute),
        ("summary", _) => Some(Command::Summary),
        ("export", Some(path)) => Some(Command::Export(PathBuf::from(path))),
        ("flag", Some(arg)) => {
            let (name, value) = arg.split_once(char::is_whitespace)?;
            let on = match value.trim() {
                "on" | "true" | "1" => true,
                "off" | "false" | "0" => false,
                _ => return None,
            };
            Some(Command::Flag(name.to_string(), on))
        }
        ("param", Some(arg)) => {
            let (name, value) = arg.split_once(char::is_whitespace)?;
            let value = value.trim().parse().ok()?;
            Some(Command::Param(name.to_string(), value))
        }
        ("quit" | "exit", _) => Some(Command::Quit),
        ("help", _) => Some(Command::Help),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome {
    Replied(String),
    Fallback(&'static str),
    /// Text for the terminal, not for Jazmin's output area
    Notice(String),
    Quit,
}

pub struct Jazmin {
    user_name: String,
    speaker: Arc<Speaker>,
    output: Arc<OutputArea>,
    conversation: Conversation,
    escalation: EscalationTimer,
    activity: Arc<ActivityClock>,
    optimizer: Arc<Optimizer>,
    terminator: Arc<dyn Terminate>,
}

impl Jazmin {
    pub fn new(
        config: &Config,
        user_name: impl Into<String>,
        chat: Arc<dyn ChatBackend>,
        speaker: Arc<Speaker>,
        output: Arc<OutputArea>,
        optimizer: Arc<Optimizer>,
        terminator: Arc<dyn Terminate>,
    ) -> Self {
        let user_name = user_name.into();

        let reactions = IgnoredReactions::new(
            Arc::clone(&chat),
            Arc::clone(&speaker),
            Arc::clone(&output),
            user_name.clone(),
            Arc::clone(&terminator),
        )
        .with_probe(config.connectivity_probe.clone())
        .with_timing(ReactionTiming::from_config(config));

        let escalation = EscalationTimer::new(
            Arc::new(reactions),
            DelayPolicy::from(&config.escalation),
        );

        Self {
            conversation: Conversation::new(chat, user_name.clone()),
            user_name,
            speaker,
            output,
            escalation,
            activity: Arc::new(ActivityClock::new()),
            optimizer,
            terminator,
        }
    }

    pub fn speaker(&self) -> Arc<Speaker> {
        Arc::clone(&self.speaker)
    }

    pub fn activity(&self) -> Arc<ActivityClock> {
        Arc::clone(&self.activity)
    }

    pub fn escalation(&self) -> &EscalationTimer {
        &self.escalation
    }

    pub fn stage(&self) -> IgnoreStage {
        self.escalation.stage()
    }

    /// Record an interaction and restart the ignore countdown
    fn interacted(&self) {
        self.activity.touch();
        let name_spoken = self.output.contains_word(&self.user_name);
        self.escalation.reset(name_spoken);
    }

    /// Greet by name and arm the ignore countdown
    pub async fn greet(&self) {
        let line = session::greeting(&self.user_name);
        info!("👋 {}", line);
        self.speaker.speak_detached(line.clone());
        self.output.type_out(&line).await;
        self.interacted();
    }

    pub async fn handle_line(&self, line: &str) -> InputOutcome {
        self.interacted();

        let text = session::limit_input(line.trim());
        if text.is_empty() {
            return InputOutcome::Fallback(self.fallback().await);
        }

        if let Some(cmd) = parse_command(text) {
            return self.run_command(cmd);
        }

        info!("📝 {}: {}", self.user_name, text);
        self.output.clear();
        let reply = self.conversation.reply_or_fallback(text).await;
        info!("💬 Jazmin: {}", reply);

        self.speaker.speak_detached(reply.clone());
        if self.output.type_out(&reply).await {
            self.output.erase_after(REPLY_LINGER);
        }
        InputOutcome::Replied(reply)
    }

    /// Canned reply for input that could not be made out
    pub async fn fallback(&self) -> &'static str {
        let (line, linger) = {
            let mut rng = rand::thread_rng();
            (
                session::pick_fallback(&mut rng),
                Duration::from_millis(rng.gen_range(FALLBACK_LINGER.0..=FALLBACK_LINGER.1)),
            )
        };
        info!("🤷 Fallback: {}", line);

        self.speaker.speak_detached(line);
        if self.output.type_out(line).await {
            self.output.erase_after(linger);
        }
        self.interacted();
        line
    }

    fn run_command(&self, cmd: Command) -> InputOutcome {
        match cmd {
            Command::Mute => {
                self.speaker.set_muted(true);
                InputOutcome::Notice("🔇 Muted".to_string())
            }
            Command::Unmute => {
                self.speaker.set_muted(false);
                InputOutcome::Notice("🔊 Unmuted".to_string())
            }
            Command::Summary => {
                let summary = self.optimizer.summary();
                let text = serde_json::to_string_pretty(&summary)
                    .unwrap_or_else(|e| format!("summary unavailable: {}", e));
                InputOutcome::Notice(text)
            }
            Command::Export(path) => match self.optimizer.export_metrics_csv(&path) {
                Ok(()) => InputOutcome::Notice(format!("📁 Metrics written to {}", path.display())),
                Err(e) => {
                    warn!("❌ Metrics export failed: {}", e);
                    InputOutcome::Notice(format!("❌ Export failed: {}", e))
                }
            },
            Command::Flag(name, on) => match self.optimizer.set_flag(&name, on) {
                Ok(()) => InputOutcome::Notice(format!("🎚️ {} = {}", name, on)),
                Err(e) => InputOutcome::Notice(format!("❌ {}", e)),
            },
            Command::Param(name, value) => match self.optimizer.set_param(&name, value) {
                Ok(()) => InputOutcome::Notice(format!("🎚️ {} = {}", name, value)),
                Err(e) => InputOutcome::Notice(format!("❌ {}", e)),
            },
            Command::Help => InputOutcome::Notice(HELP.to_string()),
            Command::Quit => InputOutcome::Quit,
        }
    }

    /// Feed submitted lines in until the user quits, input closes or
    /// `shutdown` resolves. `shutdown` stays watched while a reply is in flight.
    pub async fn run<R, F>(&self, lines: &mut Lines<R>, shutdown: F) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = &mut shutdown => break,
            };
            let Some(line) = line else {
                info!("📭 Input closed");
                break;
            };

            let outcome = tokio::select! {
                outcome = self.handle_line(&line) => outcome,
                _ = &mut shutdown => {
                    info!("🛑 Interrupted while replying");
                    break;
                }
            };
            match outcome {
                InputOutcome::Quit => break,
                InputOutcome::Notice(text) => println!("{}", text),
                InputOutcome::Replied(_) | InputOutcome::Fallback(_) => {}
            }
        }
        Ok(())
    }

    /// Say goodbye and end the process
    pub async fn goodbye(&self) {
        self.escalation.cancel();
        let line = session::pick_goodbye(&mut rand::thread_rng());
        info!("👋 {}", line);

        self.output.show(line);
        if tokio::time::timeout(GOODBYE_TIMEOUT, self.speaker.speak(line))
            .await
            .is_err()
        {
            warn!("⏱️ Goodbye speech timed out");
        }
        self.optimizer.stop_background_sampling();
        self.terminator.terminate();
    }
}
