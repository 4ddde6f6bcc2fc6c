//! TTS (Text-to-Speech) Module
//!
//! Provides a unified interface for the speech backends and the [`Speaker`]
//! that serialises playback and honours mute.

use crate::audio::SoundEngine;
use crate::config::Config;
use crate::optimizer::Optimizer;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub mod system;
pub mod voicemaker;

/// Trait for TTS engines
#[async_trait]
pub trait TtsEngine: Send + Sync + std::fmt::Debug {
    /// Speak the given text, returning once playback has finished
    async fn speak(&self, text: &str) -> Result<()>;

    /// Get the engine name
    fn name(&self) -> &str;

    /// Cut off whatever is playing right now
    fn stop(&self) {}
}

/// Factory to create the configured TTS engine
pub fn create_engine(config: &Config, sound_engine: Option<SoundEngine>) -> Arc<dyn TtsEngine> {
    info!("🛠️ Creating TTS engine: {}", config.tts_engine);
    let engine: Arc<dyn TtsEngine> = match config.tts_engine.as_str() {
        "voicemaker" if config.voicemaker_api_key.is_empty() => {
            warn!(
                "  - Voicemaker selected but {} is not set, falling back to System",
                crate::config::VOICEMAKER_KEY_ENV
            );
            Arc::new(system::SystemEngine::new())
        }
        "voicemaker" => {
            info!("  - Using Voicemaker TTS (Voice: {})", config.voice_id);
            let mut engine = voicemaker::VoicemakerEngine::new(config);
            if let Some(se) = sound_engine {
                engine.set_sound_engine(se);
            }
            Arc::new(engine)
        }
        "system" => {
            info!("  - Using System TTS Fallback");
            Arc::new(system::SystemEngine::new())
        }
        "silent" | "none" => {
            info!("  - Speech disabled");
            Arc::new(system::SilentEngine)
        }
        _ => {
            warn!(
                "  - Unknown engine '{}', falling back to System",
                config.tts_engine
            );
            Arc::new(system::SystemEngine::new())
        }
    };
    info!("✅ TTS engine '{}' initialized", engine.name());
    engine
}

/// Clears the busy flag even when the speaking task is cancelled
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Front door for everything Jazmin says out loud.
///
/// One utterance plays at a time; later calls wait for the playback lock.
#[derive(Debug)]
pub struct Speaker {
    engine: Arc<dyn TtsEngine>,
    playback: Mutex<()>,
    muted: AtomicBool,
    speaking: AtomicBool,
    optimizer: Option<Arc<Optimizer>>,
}

impl Speaker {
    pub fn new(engine: Arc<dyn TtsEngine>) -> Self {
        Self {
            engine,
            playback: Mutex::new(()),
            muted: AtomicBool::new(false),
            speaking: AtomicBool::new(false),
            optimizer: None,
        }
    }

    /// Report each utterance's latency to the tuner as `audio.latency_ms`
    pub fn with_optimizer(mut self, optimizer: Arc<Optimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
        if muted {
            self.engine.stop();
        }
        info!("{} Audio {}", if muted { "🔇" } else { "🔊" }, if muted { "muted" } else { "unmuted" });
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    /// Whether an utterance is currently being synthesized or played
    pub fn is_busy(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Speak and wait for playback. Muted speech is skipped, not queued.
    pub async fn speak(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        if self.is_muted() {
            debug!("🔇 Muted, skipping playback of '{}'", text);
            return Ok(());
        }

        let _lock = self.playback.lock().await;
        self.speaking.store(true, Ordering::SeqCst);
        let _busy = BusyGuard(&self.speaking);

        let started = Instant::now();
        self.engine.speak(text).await?;
        if let Some(opt) = &self.optimizer {
            opt.measure_audio_latency(started.elapsed().as_secs_f64() * 1000.0);
        }
        Ok(())
    }

    /// Fire-and-forget speech; failures are logged
    pub fn speak_detached(self: &Arc<Self>, text: impl Into<String>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let text = text.into();
        tokio::spawn(async move {
            if let Err(e) = this.speak(&text).await {
                warn!("❌ Speech failed for '{}': {}", text, e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::metrics::AUDIO_LATENCY;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct SlowTts {
        spoken: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TtsEngine for SlowTts {
        async fn speak(&self, text: &str) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(2)).await;
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_speaker_serialises_and_reports_busy() {
        let tts = Arc::new(SlowTts::default());
        let speaker = Arc::new(Speaker::new(tts.clone()));

        let first = speaker.speak_detached("one");
        let second = speaker.speak_detached("two");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(speaker.is_busy());

        first.await.unwrap();
        second.await.unwrap();
        assert!(!speaker.is_busy());
        assert_eq!(tts.spoken.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_muted_speaker_skips_engine() {
        let tts = Arc::new(SlowTts::default());
        let speaker = Speaker::new(tts.clone());
        speaker.set_muted(true);
        speaker.speak("quiet").await.unwrap();
        assert!(tts.spoken.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_speaker_reports_latency() {
        let optimizer = Arc::new(Optimizer::default());
        let speaker = Speaker::new(Arc::new(SlowTts::default())).with_optimizer(optimizer.clone());
        assert!(optimizer.latest(AUDIO_LATENCY).is_none());

        speaker.speak("hello").await.unwrap();
        assert!(optimizer.latest(AUDIO_LATENCY).is_some());

        speaker.set_muted(true);
        optimizer.reset_metrics();
        speaker.speak("quiet").await.unwrap();
        assert!(optimizer.latest(AUDIO_LATENCY).is_none());
    }

    #[test]
    fn test_factory_falls_back_without_key() {
        let mut config = Config::default();
        config.voicemaker_api_key.clear();
        let engine = create_engine(&config, None);
        assert_eq!(engine.name(), "system");

        config.tts_engine = "silent".to_string();
        assert_eq!(create_engine(&config, None).name(), "silent");
    }
}
