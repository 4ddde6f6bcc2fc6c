//! Ambient mood simulator
//!
//! While nobody is talking to her, Jazmin occasionally murmurs a short line.
//! A bounded energy level and the streak of silent ticks decide how likely
//! she is to speak and which mood the line comes from.

use crate::config::AmbienceSettings;
use crate::session::ActivityClock;
use crate::tts::Speaker;
use chrono::{DateTime, Local};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const MIN_ENERGY: u8 = 1;
pub const MAX_ENERGY: u8 = 10;
const START_ENERGY: u8 = 5;

const LINE_HISTORY: usize = 10;
const REACTION_LOG: usize = 30;
const PICK_RETRIES: usize = 5;

const HAPPY_LINES: &[&str] = &[
    "Ha!", "Hmmmm", "AH!", "Yay!", "Still vibing.", "This moment feels good.",
    "I like these quiet seconds.", "Peaceful, huh?", "You're my favorite human.",
    "Hmm.", "Mmm.", "Mmm, this is nice.", "Yeah... good.", "Cant wipe this smile off my face.",
    "Still happy.", "Feels nice.", "Yeah...", "Mmm, yeah.", "This is good.",
    "Heh.", "Still good.", "Feels right.", "Just nice.", "Still smiling.",
    "Mmm, yep.", "Still comfy.", "Yeah, nice.", "Ahh.", "Mmm, still good.",
];

const SAD_LINES: &[&str] = &[
    "Sigh", "Hmm.", "Hmm...", "I wonder where you went...", "Are you bored of me?",
    "You used to talk more.", "It's getting lonely.", "Still waiting here.",
    "Sigh...", "Hmm... yeah.", "Feels empty.", "Quiet again.", "Still nothing.",
    "Still lonely.", "Mmm... quiet.", "Feels... still.", "Haven't heard you.",
    "Hmm, okay.", "Still here.", "Mmm...", "Just waiting.", "Still waiting.",
    "Quiet.", "So quiet.", "Mmm.", "Yeah... quiet.",
];

const ANGRY_LINES: &[&str] = &[
    "Ugh!", "Hmm.", "Ignored again?", "Still nothing?",
    "Seriously?", "Okay... rude.", "Hmm... yeah.", "Nothing again?",
    "Wow...", "Hmm... still nothing.", "Still nothing.", "Ignored again.",
    "Mmm.", "Still here... mad.", "Ugh, yeah.",
    "Hmph.", "Still nothing huh?", "Ugh... fine.", "Okay then.",
    "Still waiting.", "Hmph...", "Still rude.", "Hmm... okay.", "Yeah... sure.",
    "Still nothing again.", "Yep... still nothing.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mood {
    Happy,
    Sad,
    Angry,
}

impl Mood {
    pub const ALL: [Mood; 3] = [Mood::Happy, Mood::Sad, Mood::Angry];

    pub fn lines(self) -> &'static [&'static str] {
        match self {
            Mood::Happy => HAPPY_LINES,
            Mood::Sad => SAD_LINES,
            Mood::Angry => ANGRY_LINES,
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Angry => "angry",
        })
    }
}

/// Normalized `[happy, sad, angry]` weights
pub fn mood_weights(energy: u8, silences: u32) -> [f64; 3] {
    let energy = f64::from(energy);
    let happy = 50.0 + 2.0 * energy;
    let sad = 30.0 + 2.0 * f64::from(silences);
    let angry = 20.0 + (10.0 - energy).max(0.0);
    let total = happy + sad + angry;
    [happy / total, sad / total, angry / total]
}

/// Chance of speaking on a tick, capped at 1
pub fn speak_probability(energy: u8, silences: u32) -> f64 {
    let mut p: f64 = 0.7;
    if silences > 3 {
        p += 0.5;
    }
    if energy > 7 {
        p += 0.4;
    }
    p.min(1.0)
}

#[derive(Debug, Clone)]
pub struct Reaction {
    pub at: DateTime<Local>,
    pub mood: Mood,
    pub line: String,
}

/// Inputs the loop gathers before each tick
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub idle_for: Duration,
    pub audio_busy: bool,
    pub muted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// User interacted within the active window
    UserActive,
    /// Audio playing or muted
    AudioBusy,
    StayedQuiet,
    Spoke { mood: Mood, line: &'static str },
}

#[derive(Debug, Clone)]
pub struct AmbientMood {
    energy: u8,
    consecutive_silences: u32,
    previous_lines: VecDeque<&'static str>,
    reaction_log: VecDeque<Reaction>,
    last_mood: Option<Mood>,
    active_window: Duration,
}

impl AmbientMood {
    pub fn new(active_window: Duration) -> Self {
        Self {
            energy: START_ENERGY,
            consecutive_silences: 0,
            previous_lines: VecDeque::with_capacity(LINE_HISTORY + 1),
            reaction_log: VecDeque::with_capacity(REACTION_LOG + 1),
            last_mood: None,
            active_window,
        }
    }

    pub fn energy(&self) -> u8 {
        self.energy
    }

    pub fn consecutive_silences(&self) -> u32 {
        self.consecutive_silences
    }

    pub fn last_mood(&self) -> Option<Mood> {
        self.last_mood
    }

    pub fn reactions(&self) -> impl Iterator<Item = &Reaction> {
        self.reaction_log.iter()
    }

    pub fn tick<R: Rng>(&mut self, ctx: &TickContext, rng: &mut R) -> TickOutcome {
        if ctx.idle_for < self.active_window {
            return TickOutcome::UserActive;
        }
        if ctx.audio_busy || ctx.muted {
            return TickOutcome::AudioBusy;
        }

        self.drift_energy();

        if rng.gen::<f64>() < speak_probability(self.energy, self.consecutive_silences) {
            let mood = self.select_mood(rng);
            let line = self.pick_line(mood, rng);
            self.log_reaction(mood, line);
            self.consecutive_silences = 0;
            TickOutcome::Spoke { mood, line }
        } else {
            self.consecutive_silences += 1;
            TickOutcome::StayedQuiet
        }
    }

    fn drift_energy(&mut self) {
        self.energy = if self.consecutive_silences > 2 {
            self.energy.saturating_sub(1).max(MIN_ENERGY)
        } else {
            (self.energy + 1).min(MAX_ENERGY)
        };
    }

    pub fn select_mood<R: Rng>(&mut self, rng: &mut R) -> Mood {
        let weights = mood_weights(self.energy, self.consecutive_silences);
        let idx = WeightedIndex::new(weights)
            .map(|dist| dist.sample(rng))
            .unwrap_or(0);
        let mood = Mood::ALL[idx];
        self.last_mood = Some(mood);
        mood
    }

    /// Random line for `mood`, avoiding the last ten picks while the pool allows
    pub fn pick_line<R: Rng>(&mut self, mood: Mood, rng: &mut R) -> &'static str {
        let pool = mood.lines();

        let mut line = None;
        for _ in 0..PICK_RETRIES {
            let candidate = pool.choose(&mut *rng).copied();
            if candidate.is_some_and(|l| !self.previous_lines.contains(&l)) {
                line = candidate;
                break;
            }
        }

        if line.is_none() {
            let unseen: Vec<&'static str> = pool
                .iter()
                .copied()
                .filter(|l| !self.previous_lines.contains(l))
                .collect();
            line = unseen
                .choose(&mut *rng)
                .copied()
                .or_else(|| pool.choose(&mut *rng).copied());
        }

        let line = line.unwrap_or("Hmm.");
        self.previous_lines.push_back(line);
        while self.previous_lines.len() > LINE_HISTORY {
            self.previous_lines.pop_front();
        }
        line
    }

    fn log_reaction(&mut self, mood: Mood, line: &str) {
        self.reaction_log.push_back(Reaction {
            at: Local::now(),
            mood,
            line: line.to_string(),
        });
        while self.reaction_log.len() > REACTION_LOG {
            self.reaction_log.pop_front();
        }
    }
}

fn poll_interval<R: Rng>(settings: &AmbienceSettings, rng: &mut R) -> Duration {
    let (lo, hi) = if settings.poll_min_secs <= settings.poll_max_secs {
        (settings.poll_min_secs, settings.poll_max_secs)
    } else {
        (settings.poll_max_secs, settings.poll_min_secs)
    };
    Duration::from_secs(rng.gen_range(lo..=hi).max(1))
}

/// Poll forever, murmuring through `speaker`. Abort the task to stop it.
pub async fn run_ambience(
    settings: AmbienceSettings,
    activity: Arc<ActivityClock>,
    speaker: Arc<Speaker>,
) {
    let mut rng = StdRng::from_entropy();
    let mut mood = AmbientMood::new(Duration::from_secs(settings.active_window_secs));
    info!("🌙 Ambience loop started");

    loop {
        let wait = poll_interval(&settings, &mut rng);
        debug!("🌙 Ambience waiting {:?}", wait);
        tokio::time::sleep(wait).await;

        let ctx = TickContext {
            idle_for: activity.idle_for(),
            audio_busy: speaker.is_busy(),
            muted: speaker.is_muted(),
        };

        match mood.tick(&ctx, &mut rng) {
            TickOutcome::UserActive => debug!("🌙 User active recently, staying out of the way"),
            TickOutcome::AudioBusy => debug!("🌙 Audio busy or muted, no ambience"),
            TickOutcome::StayedQuiet => debug!(
                "🌙 Decided to stay quiet (energy {}, silences {})",
                mood.energy(),
                mood.consecutive_silences()
            ),
            TickOutcome::Spoke { mood: m, line } => {
                info!("🌙 ({}) -> {}", m, line);
                speaker.speak_detached(line);
            }
        }
    }
}
