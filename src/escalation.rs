//! Ignored-escalation state machine
//!
//! Every user interaction re-arms a chain of three countdowns. Each expiry
//! moves the stage forward (`Idle0 → Idle1 → Idle2 → Terminated`), fires the
//! handler for the new stage and arms the next countdown.
//!
//! Only one chain is ever live: every arm bumps a generation counter and
//! aborts the previous task, and a task that wakes up with a stale
//! generation does nothing.

use crate::config::EscalationSettings;
use async_trait::async_trait;
use rand::Rng;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoreStage {
    Idle0,
    Idle1,
    Idle2,
    Terminated,
}

impl IgnoreStage {
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Idle0 => Some(Self::Idle1),
            Self::Idle1 => Some(Self::Idle2),
            Self::Idle2 => Some(Self::Terminated),
            Self::Terminated => None,
        }
    }

    /// Number of consecutive ignores this stage represents
    pub fn level(self) -> u8 {
        match self {
            Self::Idle0 => 0,
            Self::Idle1 => 1,
            Self::Idle2 => 2,
            Self::Terminated => 3,
        }
    }
}

impl fmt::Display for IgnoreStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle0 => "idle",
            Self::Idle1 => "ignored once",
            Self::Idle2 => "ignored twice",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Countdown windows per stage
#[derive(Debug, Clone, PartialEq)]
pub struct DelayPolicy {
    pub first: (Duration, Duration),
    pub name_spoken: Duration,
    pub second: (Duration, Duration),
    pub final_delay: Duration,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self::from(&EscalationSettings::default())
    }
}

impl From<&EscalationSettings> for DelayPolicy {
    fn from(s: &EscalationSettings) -> Self {
        let secs = Duration::from_secs;
        Self {
            first: ordered(secs(s.first_min_secs), secs(s.first_max_secs)),
            name_spoken: secs(s.name_spoken_secs),
            second: ordered(secs(s.second_min_secs), secs(s.second_max_secs)),
            final_delay: secs(s.final_secs),
        }
    }
}

fn ordered(a: Duration, b: Duration) -> (Duration, Duration) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Uniform draw from `range`, in whole seconds when both ends are whole seconds
fn sample_between<R: Rng>(range: (Duration, Duration), rng: &mut R) -> Duration {
    let (lo, hi) = (range.0.as_millis() as u64, range.1.as_millis() as u64);
    if lo % 1000 == 0 && hi % 1000 == 0 {
        Duration::from_secs(rng.gen_range(lo / 1000..=hi / 1000))
    } else {
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

impl DelayPolicy {
    /// Same window for every stage
    pub fn fixed(delay: Duration) -> Self {
        Self {
            first: (delay, delay),
            name_spoken: delay,
            second: (delay, delay),
            final_delay: delay,
        }
    }

    /// Countdown before `target` is entered
    pub fn delay_for<R: Rng>(&self, target: IgnoreStage, name_spoken: bool, rng: &mut R) -> Duration {
        match target {
            IgnoreStage::Idle0 => Duration::ZERO,
            IgnoreStage::Idle1 if name_spoken => self.name_spoken,
            IgnoreStage::Idle1 => sample_between(self.first, rng),
            IgnoreStage::Idle2 => sample_between(self.second, rng),
            IgnoreStage::Terminated => self.final_delay,
        }
    }
}

/// Reaction to entering a stage
#[async_trait]
pub trait EscalationHandler: Send + Sync {
    async fn on_stage(&self, stage: IgnoreStage);
}

#[derive(Debug)]
struct TimerState {
    stage: IgnoreStage,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

struct Inner {
    handler: Arc<dyn EscalationHandler>,
    policy: DelayPolicy,
    state: Mutex<TimerState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn spawn_countdown(
        self: &Arc<Self>,
        generation: u64,
        target: IgnoreStage,
        delay: Duration,
    ) -> JoinHandle<()> {
        debug!("⏳ Arming '{}' in {:?}", target, delay);
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire(generation, target);
        })
    }

    fn fire(self: &Arc<Self>, generation: u64, target: IgnoreStage) {
        let mut state = self.lock();
        if state.generation != generation {
            debug!("⏭️ Stale countdown for '{}' ignored", target);
            return;
        }

        state.stage = target;
        state.pending = target.next().map(|next| {
            let delay = self
                .policy
                .delay_for(next, false, &mut rand::thread_rng());
            self.spawn_countdown(generation, next, delay)
        });
        drop(state);

        info!("😤 Ignored timeout: {}", target);
        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move {
            handler.on_stage(target).await;
        });
    }
}

/// Owner of the single live countdown chain
#[derive(Clone)]
pub struct EscalationTimer {
    inner: Arc<Inner>,
}

impl fmt::Debug for EscalationTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EscalationTimer")
            .field("stage", &self.stage())
            .field("armed", &self.armed())
            .finish()
    }
}

impl EscalationTimer {
    pub fn new(handler: Arc<dyn EscalationHandler>, policy: DelayPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                handler,
                policy,
                state: Mutex::new(TimerState {
                    stage: IgnoreStage::Idle0,
                    generation: 0,
                    pending: None,
                }),
            }),
        }
    }

    /// User interaction: drop any pending countdown and start over from `Idle0`.
    ///
    /// `name_spoken` tightens the first window when the output area already
    /// addresses the user by name. Once terminated, resets are ignored.
    pub fn reset(&self, name_spoken: bool) {
        let mut state = self.inner.lock();
        if state.stage == IgnoreStage::Terminated {
            debug!("🛑 Already terminated, reset ignored");
            return;
        }

        state.generation += 1;
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        state.stage = IgnoreStage::Idle0;

        let delay = self
            .inner
            .policy
            .delay_for(IgnoreStage::Idle1, name_spoken, &mut rand::thread_rng());
        let generation = state.generation;
        state.pending = Some(
            self.inner
                .spawn_countdown(generation, IgnoreStage::Idle1, delay),
        );
    }

    /// Disarm without re-arming
    pub fn cancel(&self) {
        let mut state = self.inner.lock();
        state.generation += 1;
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        if state.stage != IgnoreStage::Terminated {
            state.stage = IgnoreStage::Idle0;
        }
    }

    pub fn stage(&self) -> IgnoreStage {
        self.inner.lock().stage
    }

    /// Whether a countdown is pending
    pub fn armed(&self) -> bool {
        self.inner
            .lock()
            .pending
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Bumped on every reset or cancel
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_stage_order() {
        assert_eq!(IgnoreStage::Idle0.next(), Some(IgnoreStage::Idle1));
        assert_eq!(IgnoreStage::Idle2.next(), Some(IgnoreStage::Terminated));
        assert_eq!(IgnoreStage::Terminated.next(), None);
        assert_eq!(IgnoreStage::Terminated.level(), 3);
    }

    #[test]
    fn test_default_windows() {
        let policy = DelayPolicy::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let first = policy.delay_for(IgnoreStage::Idle1, false, &mut rng);
            assert!((20..=40).contains(&first.as_secs()));
            assert_eq!(first.subsec_nanos(), 0);
            let second = policy.delay_for(IgnoreStage::Idle2, false, &mut rng);
            assert!((20..=40).contains(&second.as_secs()));
        }
        assert_eq!(
            policy.delay_for(IgnoreStage::Idle1, true, &mut rng),
            Duration::from_secs(20)
        );
        assert_eq!(
            policy.delay_for(IgnoreStage::Terminated, false, &mut rng),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_sub_second_windows_are_kept() {
        let policy = DelayPolicy::fixed(Duration::from_millis(500));
        let mut rng = StdRng::seed_from_u64(8);
        for stage in [IgnoreStage::Idle1, IgnoreStage::Idle2, IgnoreStage::Terminated] {
            assert_eq!(
                policy.delay_for(stage, false, &mut rng),
                Duration::from_millis(500)
            );
        }

        let mixed = DelayPolicy {
            first: (Duration::from_millis(1500), Duration::from_millis(2500)),
            ..DelayPolicy::default()
        };
        for _ in 0..100 {
            let d = mixed.delay_for(IgnoreStage::Idle1, false, &mut rng);
            assert!(d >= Duration::from_millis(1500) && d <= Duration::from_millis(2500));
        }
    }

    #[test]
    fn test_inverted_settings_are_ordered() {
        let settings = EscalationSettings {
            first_min_secs: 40,
            first_max_secs: 20,
            ..EscalationSettings::default()
        };
        let policy = DelayPolicy::from(&settings);
        assert_eq!(policy.first, (Duration::from_secs(20), Duration::from_secs(40)));
    }
}
