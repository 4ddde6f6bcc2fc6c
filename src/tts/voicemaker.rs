//! Voicemaker cloud TTS backend
//!
//! Posts the text to the synthesis endpoint, downloads the returned mp3 and
//! plays it through the [`SoundEngine`].

use super::TtsEngine;
use crate::audio::SoundEngine;
use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SynthesisRequest<'a> {
    engine: &'a str,
    voice_id: &'a str,
    language_code: &'a str,
    text: &'a str,
    output_format: &'a str,
    sample_rate: String,
}

#[derive(Debug, Deserialize)]
struct SynthesisResponse {
    #[serde(default)]
    success: bool,
    path: Option<String>,
    message: Option<String>,
}

/// Extract the audio URL from a synthesis response body
fn parse_synthesis_response(body: &str) -> Result<String> {
    let resp: SynthesisResponse =
        serde_json::from_str(body).context("Voicemaker returned invalid JSON")?;
    if !resp.success {
        anyhow::bail!(
            "Voicemaker API error: {}",
            resp.message.unwrap_or_else(|| body.to_string())
        );
    }
    resp.path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Voicemaker response had no audio path"))
}

#[derive(Debug)]
pub struct VoicemakerEngine {
    client: reqwest::Client,
    url: String,
    api_key: String,
    voice_id: String,
    language_code: String,
    sample_rate: u32,
    timeout: Duration,
    sound_engine: Option<SoundEngine>,
}

impl VoicemakerEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.voicemaker_url.clone(),
            api_key: config.voicemaker_api_key.clone(),
            voice_id: config.voice_id.clone(),
            language_code: config.language_code.clone(),
            sample_rate: config.sample_rate,
            timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
            sound_engine: None,
        }
    }

    pub fn set_sound_engine(&mut self, engine: SoundEngine) {
        self.sound_engine = Some(engine);
    }

    /// Synthesize `text` into a temporary mp3 file
    pub async fn synthesize(&self, text: &str) -> Result<PathBuf> {
        let request = SynthesisRequest {
            engine: "neural",
            voice_id: &self.voice_id,
            language_code: &self.language_code,
            text,
            output_format: "mp3",
            sample_rate: self.sample_rate.to_string(),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("Voicemaker API error ({}): {}", status, body);
        }
        let audio_url = parse_synthesis_response(&body)?;
        debug!("🎧 Voicemaker audio at {}", audio_url);

        let strategy = ExponentialBackoff::from_millis(2).factor(100).map(jitter).take(3);
        let client = self.client.clone();
        let timeout = self.timeout;
        let audio = Retry::spawn(strategy, move || {
            let client = client.clone();
            let url = audio_url.clone();
            async move {
                client
                    .get(&url)
                    .timeout(timeout)
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await
            }
        })
        .await
        .context("Failed to download synthesized audio")?;

        let path = std::env::temp_dir().join(format!(
            "jazmin_speech_{}_{}.mp3",
            chrono::Utc::now().timestamp_millis(),
            rand::random::<u32>()
        ));
        tokio::fs::write(&path, &audio).await?;

        Ok(path)
    }
}

#[async_trait]
impl TtsEngine for VoicemakerEngine {
    async fn speak(&self, text: &str) -> Result<()> {
        info!("📢 Voicemaker speaking: '{}'", text);

        let clip_path = self.synthesize(text).await?;
        let sound_engine = self.sound_engine.clone();
        let play_path = clip_path.clone();

        // Playback blocks until the clip ends
        let played = tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(engine) = &sound_engine {
                let took = engine.play_file_sync(&play_path)?;
                debug!("✅ Speech clip played in {:?}", took);
                Ok(())
            } else {
                debug!("📢 Playing speech via direct rodio fallback");
                let (_stream, stream_handle) = rodio::OutputStream::try_default()?;
                let file = std::fs::File::open(&play_path)?;
                let source = rodio::Decoder::new(std::io::BufReader::new(file))?;
                let sink = rodio::Sink::try_new(&stream_handle)?;
                sink.append(source);
                sink.sleep_until_end();
                Ok(())
            }
        })
        .await
        .map_err(|e| anyhow::anyhow!("Task join error: {}", e));

        if let Err(e) = tokio::fs::remove_file(&clip_path).await {
            warn!("⚠️ Couldn't delete {:?}: {}", clip_path, e);
        }

        played??;
        Ok(())
    }

    fn name(&self) -> &str {
        "voicemaker"
    }

    fn stop(&self) {
        if let Some(engine) = &self.sound_engine {
            if let Err(e) = engine.stop() {
                warn!("⚠️ Couldn't stop playback: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_pascal_case_fields() {
        let request = SynthesisRequest {
            engine: "neural",
            voice_id: "proplus-Aurora",
            language_code: "en-US",
            text: "Hi",
            output_format: "mp3",
            sample_rate: "48000".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["Engine"], "neural");
        assert_eq!(json["VoiceId"], "proplus-Aurora");
        assert_eq!(json["LanguageCode"], "en-US");
        assert_eq!(json["Text"], "Hi");
        assert_eq!(json["OutputFormat"], "mp3");
        assert_eq!(json["SampleRate"], "48000");
    }

    #[test]
    fn test_parse_success_response() {
        let url = parse_synthesis_response(r#"{"success":true,"path":"https://cdn/x.mp3"}"#)
            .expect("should parse");
        assert_eq!(url, "https://cdn/x.mp3");
    }

    #[test]
    fn test_parse_failure_responses() {
        let err = parse_synthesis_response(r#"{"success":false,"message":"Invalid key"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Invalid key"));

        assert!(parse_synthesis_response(r#"{"success":true}"#).is_err());
        assert!(parse_synthesis_response("<html>").is_err());
    }
}
