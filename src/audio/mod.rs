//! Audio playback
//!
//! Synthesized speech arrives as files; the [`SoundEngine`] plays them on a
//! dedicated thread.

pub mod engine;

pub use engine::SoundEngine;
