//! Operation DQ tactical audio player.
//!
//! Each [`TacticalAudioPlayer`] binds one audio asset to a playback state
//! machine, a lazily built frequency analyser and an audio-reactive
//! waveform, and renders its transport through egui.

pub mod audio;
pub mod briefing;
pub mod config;
pub mod graphics;
pub mod player;
pub mod ui;

pub use audio::{AudioSource, PlaybackController, PlaybackState, PlaybackStatus};
pub use config::{MissionConfig, PlayerConfig};
pub use player::TacticalAudioPlayer;
