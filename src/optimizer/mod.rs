//! Adaptive Runtime Tuner
//!
//! Keeps recent latency samples and nudges a handful of runtime parameters
//! within fixed safe ranges. Recommendations are logged; nothing applies them
//! back to the audio or chat paths.

pub mod metrics;
pub mod settings;

pub use metrics::{MetricStore, AUDIO_LATENCY, GUI_FRAME_TIME, NET_RTT};
pub use settings::{FeatureFlags, OptimizerConfig, TuningParams};

use crate::error::JazminResult;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub const BUFFER_RANGE_MS: (f64, f64) = (80.0, 240.0);
pub const FPS_RANGE: (f64, f64) = (45.0, 75.0);
pub const CONCURRENT_RANGE: (f64, f64) = (1.0, 2.0);

const FRAME_BUDGET_MS: f64 = 16.7;
const SMOOTHING_ALPHA: f64 = 0.25;

/// Synthetic probe scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchmarkScores {
    pub audio_engine: f64,
    pub gui_responsiveness: f64,
    pub speech_latency: f64,
}

impl fmt::Display for BenchmarkScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "audio={:.1} gui={:.1} speech={:.1}",
            self.audio_engine, self.gui_responsiveness, self.speech_latency
        )
    }
}

/// Resource allocation recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScalingPlan {
    pub cpu_alloc: String,
    pub memory_alloc: String,
    pub gpu_alloc: String,
}

impl ScalingPlan {
    fn auto() -> Self {
        Self {
            cpu_alloc: "auto".to_string(),
            memory_alloc: "auto".to_string(),
            gpu_alloc: "auto".to_string(),
        }
    }
}

/// Compact state dump returned by [`Optimizer::summary`]
#[derive(Debug, Clone, Serialize)]
pub struct OptimizerSummary {
    pub profile: String,
    pub revision: u32,
    pub flags: FeatureFlags,
    pub params: TuningParams,
    pub latest: BTreeMap<String, f64>,
}

/// Host limits used to cap scaling plans
#[derive(Debug, Clone, Copy)]
struct HostLimits {
    cores: usize,
    memory_gb: u64,
}

impl HostLimits {
    fn probe() -> Self {
        let mut sys = sysinfo::System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();
        Self {
            cores: sys.cpus().len(),
            memory_gb: sys.total_memory() / (1024 * 1024 * 1024),
        }
    }
}

fn snap_line(snap: &BTreeMap<String, f64>) -> String {
    let mut parts = Vec::new();
    if let Some(ft) = snap.get(GUI_FRAME_TIME) {
        parts.push(format!("ft={:.2}ms", ft));
    }
    if let Some(rtt) = snap.get(NET_RTT) {
        parts.push(format!("rtt={:.0}ms", rtt));
    }
    if let Some(al) = snap.get(AUDIO_LATENCY) {
        parts.push(format!("aud={:.1}ms", al));
    }
    parts.join(" ")
}

/// Owns the metric store, the tuner config and the optional sampler task
#[derive(Debug)]
pub struct Optimizer {
    config: RwLock<OptimizerConfig>,
    metrics: Mutex<MetricStore>,
    sampler: Mutex<Option<JoinHandle<()>>>,
    phase_seed: f64,
    host: HostLimits,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self::with_store(config, MetricStore::default())
    }

    pub fn with_store(config: OptimizerConfig, metrics: MetricStore) -> Self {
        Self {
            config: RwLock::new(config),
            metrics: Mutex::new(metrics),
            sampler: Mutex::new(None),
            phase_seed: rand::thread_rng().gen_range(1_000.0..10_000.0),
            host: HostLimits::probe(),
        }
    }

    /// Build from an optional JSON config file and a profile name
    pub fn load(profile: &str, config_path: Option<&Path>) -> Self {
        let mut cfg = config_path
            .map(OptimizerConfig::from_file)
            .unwrap_or_default();
        if !profile.is_empty() {
            cfg.profile = profile.to_string();
        }
        Self::new(cfg)
    }

    // Poisoned locks only mean a panicking writer; the data is still plain values.
    fn cfg(&self) -> RwLockReadGuard<'_, OptimizerConfig> {
        self.config.read().unwrap_or_else(|e| e.into_inner())
    }

    fn cfg_mut(&self) -> RwLockWriteGuard<'_, OptimizerConfig> {
        self.config.write().unwrap_or_else(|e| e.into_inner())
    }

    fn store(&self) -> MutexGuard<'_, MetricStore> {
        self.metrics.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> OptimizerConfig {
        self.cfg().clone()
    }

    pub fn params(&self) -> TuningParams {
        self.cfg().params
    }

    /// Nudge params from smoothed metrics, clamped to safe ranges
    pub fn adaptive_pipeline_tune(&self, params: &TuningParams) -> TuningParams {
        self.adaptive_pipeline_tune_with(params, &mut rand::thread_rng())
    }

    pub fn adaptive_pipeline_tune_with<R: Rng>(
        &self,
        params: &TuningParams,
        rng: &mut R,
    ) -> TuningParams {
        let flags = self.cfg().flags.clone();
        if !flags.enable_adaptive_tuning {
            info!("🎛️ [Tune] disabled");
            return *params;
        }

        let started = Instant::now();
        let (frame_time, audio_latency) = {
            let store = self.store();
            if flags.enable_metric_smoothing {
                (
                    store.ema(GUI_FRAME_TIME, SMOOTHING_ALPHA, FRAME_BUDGET_MS),
                    store.ema(AUDIO_LATENCY, SMOOTHING_ALPHA, 120.0),
                )
            } else {
                (
                    store.latest(GUI_FRAME_TIME, FRAME_BUDGET_MS),
                    store.latest(AUDIO_LATENCY, 120.0),
                )
            }
        };

        let mut tuned = *params;

        tuned.audio_buffer_ms = (params.audio_buffer_ms * rng.gen_range(0.97..=1.03))
            .clamp(BUFFER_RANGE_MS.0, BUFFER_RANGE_MS.1);

        let frame_scale = 1.0 / (frame_time / FRAME_BUDGET_MS).max(0.5);
        tuned.gui_target_fps = (params.gui_target_fps as f64 * frame_scale)
            .clamp(FPS_RANGE.0, FPS_RANGE.1)
            .round() as u32;

        tuned.speech_max_concurrent_prompts = (params.speech_max_concurrent_prompts as f64
            * (120.0 / audio_latency.max(60.0)))
        .clamp(CONCURRENT_RANGE.0, CONCURRENT_RANGE.1) as u32;

        tuned.network_timeout_s = jitter_param(params.network_timeout_s, rng);
        tuned.scheduler_quantum_ms = jitter_param(params.scheduler_quantum_ms, rng);

        info!("🎛️ [Tune] {}", tuned);
        debug!("⏱️ [Adaptive] took {:.1}ms", started.elapsed().as_secs_f64() * 1000.0);
        tuned
    }

    /// Run synthetic probes and record one sample per series
    pub fn benchmark_subsystems(&self) -> BenchmarkScores {
        let mut rng = rand::thread_rng();
        let scores = BenchmarkScores {
            audio_engine: round2(rng.gen_range(85.0..99.0)),
            gui_responsiveness: round2(rng.gen_range(80.0..98.0)),
            speech_latency: round2(rng.gen_range(90.0..99.0)),
        };

        {
            let mut store = self.store();
            store.push(GUI_FRAME_TIME, 1000.0 / rng.gen_range(55.0..70.0));
            store.push(AUDIO_LATENCY, rng.gen_range(90.0..160.0));
            store.push(NET_RTT, rng.gen_range(20.0..120.0));
        }
        info!("📊 [Bench] {}", scores);
        scores
    }

    /// Recommend CPU/memory/GPU allocation from a daily cycle, capped by the host
    pub fn predictive_scaling(&self, forecast_hours: u32) -> ScalingPlan {
        if !self.cfg().flags.enable_predictive_scaling {
            return ScalingPlan::auto();
        }

        let now_hours = chrono::Utc::now().timestamp() as f64 / 3600.0;
        let phi = ((now_hours + forecast_hours as f64) % 24.0) / 24.0;
        let bias = 0.75 + 0.25 * (2.0 * std::f64::consts::PI * phi + self.phase_seed).sin();

        let mut cpu = ((6.0 * bias).round() as usize).max(2);
        let mut mem = ((12.0 * bias).round() as u64).max(4);
        if self.host.cores > 0 {
            cpu = cpu.min(self.host.cores.max(2));
        }
        if self.host.memory_gb > 0 {
            mem = mem.min(self.host.memory_gb.max(4));
        }
        let gpu = if bias < 0.85 { 1 } else { 2 };

        info!("🔮 [Predict{}h] cpu={} mem={} gpu={}", forecast_hours, cpu, mem, gpu);
        ScalingPlan {
            cpu_alloc: format!("{} cores", cpu),
            memory_alloc: format!("{} GB", mem),
            gpu_alloc: format!("{} units", gpu),
        }
    }

    pub fn set_flag(&self, name: &str, value: bool) -> JazminResult<()> {
        self.cfg_mut().flags.set(name, value)?;
        info!("🚩 [Flags] {}={}", name, value);
        Ok(())
    }

    pub fn set_param(&self, name: &str, value: f64) -> JazminResult<()> {
        self.cfg_mut().params.set(name, value)?;
        info!("🔧 [Params] {}={}", name, value);
        Ok(())
    }

    pub fn get_param(&self, name: &str) -> Option<f64> {
        self.cfg().params.get(name)
    }

    /// Replace the current config from a JSON file
    pub fn import_config(&self, path: &Path) {
        let cfg = OptimizerConfig::from_file(path);
        info!("📥 [Config] loaded:{} rev={}", cfg.profile, cfg.revision);
        *self.cfg_mut() = cfg;
    }

    pub fn reset_metrics(&self) {
        self.store().reset();
        info!("🧹 [Metrics] reset");
    }

    pub fn export_metrics_csv(&self, path: &Path) -> JazminResult<()> {
        self.store().export_csv(path)?;
        info!("💾 [Metrics] csv->{:?}", path);
        Ok(())
    }

    pub fn measure_audio_latency(&self, ms: f64) {
        self.store().push(AUDIO_LATENCY, ms);
        debug!("📏 [Measure] aud={:.1}ms", ms);
    }

    pub fn measure_gui_frame_time(&self, ms: f64) {
        self.store().push(GUI_FRAME_TIME, ms);
        debug!("📏 [Measure] ft={:.2}ms", ms);
    }

    pub fn report_network_rtt(&self, ms: f64) {
        self.store().push(NET_RTT, ms);
        debug!("📏 [Measure] rtt={:.0}ms", ms);
    }

    pub fn latest(&self, name: &str) -> Option<f64> {
        self.store().snapshot().get(name).copied()
    }

    pub fn summary(&self) -> OptimizerSummary {
        let latest = self.store().snapshot();
        let cfg = self.cfg();
        info!(
            "🧾 [Summary] {} rev={} {}",
            cfg.profile,
            cfg.revision,
            snap_line(&latest)
        );
        OptimizerSummary {
            profile: cfg.profile.clone(),
            revision: cfg.revision,
            flags: cfg.flags.clone(),
            params: cfg.params,
            latest,
        }
    }

    /// Start the synthetic sampler if the flag allows it. Returns whether a
    /// sampler is running afterwards.
    pub fn start_background_sampling(self: &Arc<Self>, interval: Duration) -> bool {
        if !self.cfg().flags.enable_background_sampling {
            info!("🛰️ [Sampler] disabled");
            return false;
        }

        let mut slot = self.sampler.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            info!("🛰️ [Sampler] already running");
            return true;
        }

        let this = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            info!("🛰️ [Sampler] start");
            loop {
                {
                    let mut rng = rand::thread_rng();
                    let mut store = this.store();
                    store.push(GUI_FRAME_TIME, 1000.0 / rng.gen_range(50.0..72.0));
                    store.push(AUDIO_LATENCY, rng.gen_range(95.0..155.0));
                    store.push(NET_RTT, rng.gen_range(18.0..140.0));
                }
                tokio::time::sleep(interval).await;
            }
        }));
        true
    }

    pub fn stop_background_sampling(&self) {
        let mut slot = self.sampler.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
            info!("🛰️ [Sampler] stop");
        }
    }

    /// Session start hook: benchmark and emit telemetry
    pub fn on_session_start(&self) -> BenchmarkScores {
        let scores = self.benchmark_subsystems();
        self.emit_telemetry("session_start");
        info!("🚀 [Start] {}", scores);
        scores
    }

    /// Idle hook: compute a recommendation from the current params
    pub fn on_idle_tick(&self) -> TuningParams {
        let params = self.params();
        let tuned = self.adaptive_pipeline_tune(&params);
        let snap = self.store().snapshot();
        self.emit_telemetry("idle_tick");
        info!("⏲️ [Tick] {} tuned={}", snap_line(&snap), tuned);
        tuned
    }

    fn emit_telemetry(&self, event: &str) {
        debug!("📡 [Telemetry] emit {}", event);
    }
}

impl Drop for Optimizer {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.sampler.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

fn jitter_param<R: Rng>(base: f64, rng: &mut R) -> f64 {
    let hi = (base * 1.5).max(0.5);
    let v = (base * rng.gen_range(0.95..=1.05)).clamp(0.5, hi);
    (v * 1000.0).round() / 1000.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
