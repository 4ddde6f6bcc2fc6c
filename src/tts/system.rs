//! Local fallback engines
//!
//! [`SystemEngine`] shells out to whichever speech command is installed.
//! [`SilentEngine`] only logs.

use super::TtsEngine;
use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

/// Tried in order. `spd-say` returns immediately unless told to wait.
const COMMANDS: &[(&str, &[&str])] = &[("spd-say", &["--wait"]), ("espeak-ng", &[]), ("espeak", &[])];

#[derive(Debug, Default)]
pub struct SystemEngine;

impl SystemEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TtsEngine for SystemEngine {
    async fn speak(&self, text: &str) -> Result<()> {
        for (program, args) in COMMANDS {
            match Command::new(program).args(*args).arg(text).status().await {
                Ok(status) if status.success() => return Ok(()),
                Ok(status) => debug!("🗣️ {} exited with {}", program, status),
                Err(e) => debug!("🗣️ {} unavailable: {}", program, e),
            }
        }

        let tried: Vec<&str> = COMMANDS.iter().map(|(p, _)| *p).collect();
        bail!("No system TTS command worked (tried {})", tried.join(", "))
    }

    fn name(&self) -> &str {
        "system"
    }
}

#[derive(Debug, Default)]
pub struct SilentEngine;

#[async_trait]
impl TtsEngine for SilentEngine {
    async fn speak(&self, text: &str) -> Result<()> {
        info!("🤐 (silent) {}", text);
        Ok(())
    }

    fn name(&self) -> &str {
        "silent"
    }
}
