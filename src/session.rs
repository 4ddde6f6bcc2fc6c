//! User identity and activity
//!
//! Name entry rules, the canned lines around sign-in and sign-off, the
//! activity clock the ambience loop reads, and the sign-in nag.

use crate::chat::{one_shot, prompts, ChatBackend};
use crate::error::{JazminError, JazminResult};
use crate::tts::Speaker;
use lazy_static::lazy_static;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 9;
pub const MAX_INPUT_CHARS: usize = 133;
const HARD_CUT_CHARS: usize = 115;

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[A-Za-z]{3,9}$").expect("name pattern is valid");
}

/// Replies for input Jazmin could not make out
pub const FALLBACK_REPLIES: &[&str] = &[
    "Sorry, I didn't catch that.",
    "Come again?",
    "Did you say something?",
    "You're gonna have to speak up.",
    "That went in one ear and out... nowhere.",
    "Was that English I couldn't hear you?",
    "My ears are on strike I couldn't hear you.",
    "All I heard was static.",
    "I'm pretending I didn't hear that.",
    "Try again I couldn't hear you.",
    "I'm not fluent in mumble.",
    "Hmm? Did you even say anything?",
];

pub const GOODBYE_LINES: &[&str] = &[
    "Later.",
    "Goodbye.",
    "See you next time.",
    "Shutting down.",
    "Peace out.",
];

/// Check a submitted name and return it with the first letter capitalized
pub fn validate_name(raw: &str) -> JazminResult<String> {
    let name = raw.trim();
    if name.len() < MIN_NAME_LEN || name.len() > MAX_NAME_LEN {
        return Err(JazminError::InvalidName(format!(
            "'{}' must be {}-{} letters",
            name, MIN_NAME_LEN, MAX_NAME_LEN
        )));
    }
    if !NAME_RE.is_match(name) {
        return Err(JazminError::InvalidName(format!(
            "'{}' may only contain letters",
            name
        )));
    }
    Ok(capitalize(name))
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// OS login name, if any
pub fn os_login() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Shown while booting, before a name is entered
pub fn wait_message(login: &str) -> String {
    if login.chars().any(|c| c.is_ascii_digit()) {
        "Hello, give me just one second.".to_string()
    } else {
        format!("Hello {}", login)
    }
}

pub fn greeting(name: &str) -> String {
    format!("Hey {}, how are you?", name)
}

/// First name to use in the sign-in nag. Logins with digits are not names.
pub fn nag_name(login: Option<&str>) -> Option<String> {
    login
        .filter(|l| !l.chars().any(|c| c.is_ascii_digit()))
        .and_then(|l| l.split(|c: char| !c.is_alphabetic()).next())
        .filter(|first| !first.is_empty())
        .map(capitalize)
}

/// Trim over-long input back to a word boundary: the third-to-last space in
/// the first `MAX_INPUT_CHARS`, or a hard cut when there are fewer spaces.
pub fn limit_input(text: &str) -> &str {
    if text.chars().count() <= MAX_INPUT_CHARS {
        return text;
    }
    let spaces: Vec<usize> = text
        .chars()
        .take(MAX_INPUT_CHARS)
        .enumerate()
        .filter(|(_, c)| *c == ' ')
        .map(|(i, _)| i)
        .collect();

    let keep = if spaces.len() >= 3 {
        spaces[spaces.len() - 3] + 1
    } else {
        HARD_CUT_CHARS
    };
    match text.char_indices().nth(keep) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

pub fn pick_fallback<R: Rng>(rng: &mut R) -> &'static str {
    FALLBACK_REPLIES.choose(rng).copied().unwrap_or("Come again?")
}

pub fn pick_goodbye<R: Rng>(rng: &mut R) -> &'static str {
    GOODBYE_LINES.choose(rng).copied().unwrap_or("Goodbye.")
}

/// Time of the last user interaction
#[derive(Debug)]
pub struct ActivityClock {
    last: Mutex<Instant>,
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(Instant::now()),
        }
    }

    pub fn touch(&self) {
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NagTiming {
    pub first: (Duration, Duration),
    pub follow_up: (Duration, Duration),
}

impl Default for NagTiming {
    fn default() -> Self {
        Self {
            first: (Duration::from_millis(6800), Duration::from_millis(7000)),
            follow_up: (Duration::from_millis(2400), Duration::from_millis(3600)),
        }
    }
}

fn between(range: (Duration, Duration)) -> Duration {
    let (lo, hi) = (range.0.as_millis() as u64, range.1.as_millis() as u64);
    Duration::from_millis(rand::thread_rng().gen_range(lo.min(hi)..=hi.max(lo)))
}

/// Sign-in reminder spoken while no name has been entered
#[derive(Debug)]
pub struct LoginNag {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl LoginNag {
    pub fn schedule(
        chat: Arc<dyn ChatBackend>,
        speaker: Arc<Speaker>,
        login: Option<String>,
        timing: NagTiming,
    ) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let task = tokio::spawn(async move {
            tokio::time::sleep(between(timing.first)).await;
            if flag.load(Ordering::SeqCst) {
                return;
            }

            let (line, system) = prompts::login_nag(nag_name(login.as_deref()).as_deref());
            let spoken = match one_shot(chat.as_ref(), system, line.clone(), 0.7, 30).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("❌ Sign-in nag request failed: {}", e);
                    line
                }
            };
            if flag.load(Ordering::SeqCst) {
                return;
            }
            info!("🙄 Nagging for sign-in: {}", spoken);
            if let Err(e) = speaker.speak(&spoken).await {
                warn!("❌ Sign-in nag speech failed: {}", e);
            }

            tokio::time::sleep(between(timing.follow_up)).await;
            while speaker.is_busy() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            if flag.load(Ordering::SeqCst) {
                debug!("🙄 Signed in before the follow-up");
                return;
            }
            if let Err(e) = speaker.speak(prompts::LOGIN_FOLLOW_UP).await {
                warn!("❌ Sign-in follow-up speech failed: {}", e);
            }
        });

        Self { cancelled, task }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for LoginNag {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("sam").unwrap(), "Sam");
        assert_eq!(validate_name("  alexandra ").unwrap(), "Alexandra");
        assert_eq!(validate_name("mcKay").unwrap(), "McKay");
    }

    #[test]
    fn test_validate_name_rejects() {
        for bad in ["", "al", "alexandrina", "r2d2", "ann marie", "zoë"] {
            assert!(
                matches!(validate_name(bad), Err(JazminError::InvalidName(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_wait_message() {
        assert_eq!(wait_message("sam"), "Hello sam");
        assert_eq!(wait_message("user1234"), "Hello, give me just one second.");
    }

    #[test]
    fn test_nag_name() {
        assert_eq!(nag_name(Some("sam.smith")).as_deref(), Some("Sam"));
        assert_eq!(nag_name(Some("user42")), None);
        assert_eq!(nag_name(None), None);
    }

    #[test]
    fn test_limit_input() {
        assert_eq!(limit_input("short line"), "short line");

        let words = "word ".repeat(40);
        let limited = limit_input(&words);
        assert!(limited.chars().count() <= MAX_INPUT_CHARS);
        assert!(limited.ends_with(' '));

        let blob = "x".repeat(200);
        assert_eq!(limit_input(&blob).len(), HARD_CUT_CHARS);
    }

    #[test]
    fn test_greeting_and_canned_lines() {
        assert_eq!(greeting("Sam"), "Hey Sam, how are you?");
        let mut rng = StdRng::seed_from_u64(11);
        assert!(FALLBACK_REPLIES.contains(&pick_fallback(&mut rng)));
        assert!(GOODBYE_LINES.contains(&pick_goodbye(&mut rng)));
        assert_eq!(FALLBACK_REPLIES.len(), 12);
        assert_eq!(GOODBYE_LINES.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_clock() {
        let clock = ActivityClock::new();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(clock.idle_for() >= Duration::from_secs(30));
        clock.touch();
        assert!(clock.idle_for() < Duration::from_secs(1));
    }
}
