//! Typed output area
//!
//! Jazmin "types" her lines one character at a time and later erases them
//! from the end. Every new write bumps a generation counter so stale typing
//! or erasing tasks stop touching the text.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug)]
pub struct OutputArea {
    text: Mutex<String>,
    generation: AtomicU64,
    char_delay: Duration,
    erase_delay: Duration,
    echo: bool,
}

impl OutputArea {
    pub fn new(char_delay: Duration, erase_delay: Duration) -> Self {
        Self {
            text: Mutex::new(String::new()),
            generation: AtomicU64::new(0),
            char_delay,
            erase_delay,
            echo: false,
        }
    }

    /// Mirror typed text to stdout
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    fn buf(&self) -> MutexGuard<'_, String> {
        self.text.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn echo_str(&self, s: &str) {
        if self.echo {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(s.as_bytes());
            let _ = out.flush();
        }
    }

    pub fn text(&self) -> String {
        self.buf().clone()
    }

    pub fn is_blank(&self) -> bool {
        self.buf().trim().is_empty()
    }

    /// Case-insensitive substring check
    pub fn contains_word(&self, word: &str) -> bool {
        let word = word.trim();
        !word.is_empty() && self.buf().to_lowercase().contains(&word.to_lowercase())
    }

    /// Empty the area and cancel in-flight typing or erasing
    pub fn clear(&self) {
        self.bump();
        self.buf().clear();
    }

    /// Replace the text at once
    pub fn show(&self, text: &str) {
        self.bump();
        *self.buf() = text.to_string();
        self.echo_str(&format!("\n💬 Jazmin: {}\n", text));
    }

    /// Clear, then type `text` one character at a time. Returns false if a
    /// newer write interrupted it.
    pub async fn type_out(&self, text: &str) -> bool {
        let gen = self.bump();
        self.buf().clear();
        self.echo_str("\n💬 Jazmin: ");

        for ch in text.chars() {
            if self.current() != gen {
                self.echo_str("\n");
                return false;
            }
            self.buf().push(ch);
            self.echo_str(ch.encode_utf8(&mut [0u8; 4]));
            tokio::time::sleep(self.char_delay).await;
        }
        self.echo_str("\n");
        true
    }

    /// Remove characters from the end until empty
    pub async fn erase_slowly(&self) {
        self.erase_from(self.current()).await;
    }

    async fn erase_from(&self, gen: u64) {
        loop {
            if self.current() != gen {
                return;
            }
            if self.buf().pop().is_none() {
                break;
            }
            tokio::time::sleep(self.erase_delay).await;
        }
        debug!("🧽 Output area erased");
    }

    /// Erase slowly after `delay`, unless something new was written meanwhile
    pub fn erase_after(self: &Arc<Self>, delay: Duration) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let gen = self.current();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.erase_from(gen).await;
        })
    }
}
