//! Tuner flags and parameters with JSON persistence

use crate::error::{JazminError, JazminResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::warn;

/// Feature toggles for the tuner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub enable_adaptive_tuning: bool,
    pub enable_predictive_scaling: bool,
    pub enable_metric_smoothing: bool,
    pub enable_background_sampling: bool,
    pub enable_experimental_kernel: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_adaptive_tuning: true,
            enable_predictive_scaling: true,
            enable_metric_smoothing: true,
            enable_background_sampling: false,
            enable_experimental_kernel: false,
        }
    }
}

impl FeatureFlags {
    fn slot(&mut self, name: &str) -> Option<&mut bool> {
        match name {
            "enable_adaptive_tuning" => Some(&mut self.enable_adaptive_tuning),
            "enable_predictive_scaling" => Some(&mut self.enable_predictive_scaling),
            "enable_metric_smoothing" => Some(&mut self.enable_metric_smoothing),
            "enable_background_sampling" => Some(&mut self.enable_background_sampling),
            "enable_experimental_kernel" => Some(&mut self.enable_experimental_kernel),
            _ => None,
        }
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        match name {
            "enable_adaptive_tuning" => Some(self.enable_adaptive_tuning),
            "enable_predictive_scaling" => Some(self.enable_predictive_scaling),
            "enable_metric_smoothing" => Some(self.enable_metric_smoothing),
            "enable_background_sampling" => Some(self.enable_background_sampling),
            "enable_experimental_kernel" => Some(self.enable_experimental_kernel),
            _ => None,
        }
    }

    pub fn set(&mut self, name: &str, value: bool) -> JazminResult<()> {
        let slot = self
            .slot(name)
            .ok_or_else(|| JazminError::Config(format!("unknown flag '{}'", name)))?;
        *slot = value;
        Ok(())
    }
}

/// Baseline performance parameters for audio, display and scheduling.
/// Serialized with their dotted names.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningParams {
    #[serde(rename = "audio.buffer_ms")]
    pub audio_buffer_ms: f64,
    #[serde(rename = "audio.max_latency_ms")]
    pub audio_max_latency_ms: f64,
    #[serde(rename = "gui.target_fps")]
    pub gui_target_fps: u32,
    #[serde(rename = "speech.max_concurrent_prompts")]
    pub speech_max_concurrent_prompts: u32,
    #[serde(rename = "network.timeout_s")]
    pub network_timeout_s: f64,
    #[serde(rename = "scheduler.quantum_ms")]
    pub scheduler_quantum_ms: f64,
}

impl Default for TuningParams {
    fn default() -> Self {
        Self {
            audio_buffer_ms: 160.0,
            audio_max_latency_ms: 250.0,
            gui_target_fps: 60,
            speech_max_concurrent_prompts: 1,
            network_timeout_s: 4.5,
            scheduler_quantum_ms: 8.0,
        }
    }
}

impl TuningParams {
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "audio.buffer_ms" => Some(self.audio_buffer_ms),
            "audio.max_latency_ms" => Some(self.audio_max_latency_ms),
            "gui.target_fps" => Some(self.gui_target_fps as f64),
            "speech.max_concurrent_prompts" => Some(self.speech_max_concurrent_prompts as f64),
            "network.timeout_s" => Some(self.network_timeout_s),
            "scheduler.quantum_ms" => Some(self.scheduler_quantum_ms),
            _ => None,
        }
    }

    pub fn set(&mut self, name: &str, value: f64) -> JazminResult<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(JazminError::Config(format!(
                "invalid value {} for '{}'",
                value, name
            )));
        }
        match name {
            "audio.buffer_ms" => self.audio_buffer_ms = value,
            "audio.max_latency_ms" => self.audio_max_latency_ms = value,
            "gui.target_fps" => self.gui_target_fps = value.round() as u32,
            "speech.max_concurrent_prompts" => {
                self.speech_max_concurrent_prompts = value.round() as u32
            }
            "network.timeout_s" => self.network_timeout_s = value,
            "scheduler.quantum_ms" => self.scheduler_quantum_ms = value,
            _ => {
                return Err(JazminError::Config(format!("unknown param '{}'", name)));
            }
        }
        Ok(())
    }
}

impl fmt::Display for TuningParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "buf={:.1}ms fps={} q={:.2} to={:.2}",
            self.audio_buffer_ms, self.gui_target_fps, self.scheduler_quantum_ms, self.network_timeout_s
        )
    }
}

/// Runtime flags and params plus profile metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub flags: FeatureFlags,
    pub params: TuningParams,
    /// e.g. "default", "laptop", "desktop", "low-power"
    pub profile: String,
    pub revision: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            flags: FeatureFlags::default(),
            params: TuningParams::default(),
            profile: "default".to_string(),
            revision: 1,
        }
    }
}

impl OptimizerConfig {
    /// Load from JSON, merging over defaults. Any failure yields the defaults.
    pub fn from_file(path: &Path) -> Self {
        match Self::try_from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("⚠️ [Optimizer] config load failed for {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    fn try_from_file(path: &Path) -> JazminResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_merges_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("opt.json");
        std::fs::write(
            &path,
            r#"{"flags":{"enable_background_sampling":true},"params":{"gui.target_fps":72},"profile":"laptop","revision":3}"#,
        )
        .expect("write");

        let cfg = OptimizerConfig::from_file(&path);
        assert_eq!(cfg.profile, "laptop");
        assert_eq!(cfg.revision, 3);
        assert!(cfg.flags.enable_background_sampling);
        assert!(cfg.flags.enable_adaptive_tuning);
        assert_eq!(cfg.params.gui_target_fps, 72);
        assert_eq!(cfg.params.audio_buffer_ms, 160.0);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let cfg = OptimizerConfig::from_file(Path::new("/nonexistent/jazmin/opt.json"));
        assert_eq!(cfg, OptimizerConfig::default());
    }

    #[test]
    fn test_param_access_by_name() {
        let mut params = TuningParams::default();
        params.set("network.timeout_s", 3.0).expect("set");
        assert_eq!(params.get("network.timeout_s"), Some(3.0));
        assert!(params.set("network.nope", 1.0).is_err());
        assert!(params.set("audio.buffer_ms", f64::NAN).is_err());
        assert_eq!(params.get("nope"), None);
    }

    #[test]
    fn test_flag_access_by_name() {
        let mut flags = FeatureFlags::default();
        flags.set("enable_adaptive_tuning", false).expect("set");
        assert_eq!(flags.get("enable_adaptive_tuning"), Some(false));
        assert!(flags.set("enable_warp_drive", true).is_err());
    }

    #[test]
    fn test_params_display() {
        let line = TuningParams::default().to_string();
        assert_eq!(line, "buf=160.0ms fps=60 q=8.00 to=4.50");
    }
}
