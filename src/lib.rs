//! Jazmin Library
//!
//! Core modules for the Jazmin virtual personality: chat, speech, the
//! ignored-escalation timers, ambient murmurs and the adaptive tuner.

pub mod ambience;
pub mod app;
pub mod audio;
pub mod chat;
pub mod config;
pub mod error;
pub mod escalation;
pub mod net;
pub mod optimizer;
pub mod output;
pub mod reactions;
pub mod session;
pub mod tts;
