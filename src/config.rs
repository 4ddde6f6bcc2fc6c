use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the chat API key
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable holding the Voicemaker API key
pub const VOICEMAKER_KEY_ENV: &str = "VOICEMAKER_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Chat
    pub openai_url: String,
    pub openai_model: String,
    #[serde(skip)]
    pub openai_api_key: String,

    // Speech
    pub tts_engine: String,
    pub voicemaker_url: String,
    pub voice_id: String,
    pub language_code: String,
    pub sample_rate: u32,
    #[serde(skip)]
    pub voicemaker_api_key: String,
    pub start_muted: bool,

    // Output area
    pub char_delay_ms: u64,
    pub erase_delay_ms: u64,

    // Network
    pub connectivity_probe: Option<String>,
    pub request_timeout_secs: u64,

    // Behaviour
    pub escalation: EscalationSettings,
    pub ambience: AmbienceSettings,

    // Tuner
    pub optimizer_tick_secs: u64,
    pub optimizer_config_path: Option<String>,

    // Meta
    pub log_level: String,
}

/// Timer windows for the ignored-escalation chain (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationSettings {
    pub first_min_secs: u64,
    pub first_max_secs: u64,
    pub name_spoken_secs: u64,
    pub second_min_secs: u64,
    pub second_max_secs: u64,
    pub final_secs: u64,
    pub grace_secs: u64,
    pub failure_exit_secs: u64,
    pub erase_after_min_secs: u64,
    pub erase_after_max_secs: u64,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        Self {
            first_min_secs: 20,
            first_max_secs: 40,
            name_spoken_secs: 20,
            second_min_secs: 20,
            second_max_secs: 40,
            final_secs: 60,
            grace_secs: 10,
            failure_exit_secs: 2,
            erase_after_min_secs: 15,
            erase_after_max_secs: 25,
        }
    }
}

/// Ambient mood loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbienceSettings {
    pub enabled: bool,
    pub poll_min_secs: u64,
    pub poll_max_secs: u64,
    pub active_window_secs: u64,
}

impl Default for AmbienceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_min_secs: 8,
            poll_max_secs: 18,
            active_window_secs: 80,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4".to_string(),
            openai_api_key: String::new(),
            tts_engine: "voicemaker".to_string(),
            voicemaker_url: "https://developer.voicemaker.in/voice/api".to_string(),
            voice_id: "proplus-Aurora".to_string(),
            language_code: "en-US".to_string(),
            sample_rate: 48000,
            voicemaker_api_key: String::new(),
            start_muted: false,
            char_delay_ms: 50,
            erase_delay_ms: 40,
            connectivity_probe: Some("8.8.8.8:53".to_string()),
            request_timeout_secs: 15,
            escalation: EscalationSettings::default(),
            ambience: AmbienceSettings::default(),
            optimizer_tick_secs: 30,
            optimizer_config_path: None,
            log_level: "INFO".to_string(),
        }
    }
}

impl Config {
    /// Load config from the default location, or create the default one
    pub fn load() -> Result<Self> {
        let path = config_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            let config = Self::default();
            if let Err(e) = config.save_to(&path) {
                tracing::warn!("⚠️ Could not write default config to {:?}: {}", path, e);
            }
            config
        };
        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific file, degrading to defaults when it is corrupt
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                let backup_path = path.with_extension("json.corrupt");
                let _ = std::fs::rename(path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Pull API keys from the environment. Keys are never written to disk.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(OPENAI_KEY_ENV) {
            self.openai_api_key = key;
        }
        if let Ok(key) = std::env::var(VOICEMAKER_KEY_ENV) {
            self.voicemaker_api_key = key;
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jazmin")
        .join("config.json")
}
