#![allow(dead_code)]

pub mod mock_chat;
pub mod mock_tts;

pub use mock_chat::{ChatBehaviour, MockChat};
pub use mock_tts::MockTts;

use jazmin::app::Jazmin;
use jazmin::config::Config;
use jazmin::optimizer::Optimizer;
use jazmin::output::OutputArea;
use jazmin::reactions::Terminate;
use jazmin::tts::Speaker;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Records termination requests instead of exiting
#[derive(Debug, Default)]
pub struct RecordingExit {
    pub calls: Mutex<Vec<Instant>>,
}

impl RecordingExit {
    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn first(&self) -> Option<Instant> {
        self.calls.lock().unwrap().first().copied()
    }
}

impl Terminate for RecordingExit {
    fn terminate(&self) {
        self.calls.lock().unwrap().push(Instant::now());
    }
}

/// Config with no network probe, for tests
pub fn test_config() -> Config {
    Config {
        connectivity_probe: None,
        ..Config::default()
    }
}

pub fn output() -> Arc<OutputArea> {
    Arc::new(OutputArea::new(
        Duration::from_millis(50),
        Duration::from_millis(40),
    ))
}

/// Everything a test needs to drive a signed-in session
pub struct Harness {
    pub jazmin: Jazmin,
    pub tts: Arc<MockTts>,
    pub chat: Arc<MockChat>,
    pub exit: Arc<RecordingExit>,
    pub output: Arc<OutputArea>,
    pub optimizer: Arc<Optimizer>,
}

impl Harness {
    pub fn new(config: &Config, chat: MockChat) -> Self {
        let tts = Arc::new(MockTts::new());
        let chat = Arc::new(chat);
        let exit = Arc::new(RecordingExit::default());
        let output = output();
        let optimizer = Arc::new(Optimizer::default());
        let speaker = Arc::new(Speaker::new(tts.clone()).with_optimizer(optimizer.clone()));

        let jazmin = Jazmin::new(
            config,
            "Sam",
            chat.clone(),
            speaker,
            output.clone(),
            optimizer.clone(),
            exit.clone(),
        );

        Self {
            jazmin,
            tts,
            chat,
            exit,
            output,
            optimizer,
        }
    }
}
