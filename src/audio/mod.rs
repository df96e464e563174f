pub mod controller;
pub mod error;
pub mod fft;
pub mod loader;
pub mod media;
pub mod rodio_media;
pub mod sampler;

pub use controller::PlaybackController;
pub use error::{ErrorKind, MediaError, MediaResult, SamplerError, SamplerResult};
pub use media::{MediaElement, MediaEvent, SignalTap};
pub use rodio_media::RodioMediaElement;
pub use sampler::{AnalysisContext, ContextFactory, FftContext, FrequencySampler};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One playable asset bound to a player for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    path: PathBuf,
    title: String,
}

impl AudioSource {
    pub fn new(path: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// File name offered by the download fallback: `<title>.<ext>`.
    pub fn download_name(&self) -> String {
        let ext = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("wav");
        format!("{}.{}", self.title, ext)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Error(ErrorKind),
}

impl PlaybackStatus {
    pub fn is_playing(self) -> bool {
        self == Self::Playing
    }
}

/// Snapshot of a controller's playback state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    /// Seconds; never exceeds `duration` once that is known.
    pub current_time: f64,
    /// Seconds; 0 while unknown.
    pub duration: f64,
    pub error_reason: Option<ErrorKind>,
    /// Percentage of the asset buffered, 0-100.
    pub loading_progress: f32,
}

impl PlaybackState {
    pub fn duration_known(&self) -> bool {
        self.duration > 0.0
    }

    /// Fraction of the asset played, 0 while the duration is unknown.
    pub fn progress(&self) -> f64 {
        if self.duration_known() {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn remaining(&self) -> f64 {
        (self.duration - self.current_time).max(0.0)
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Idle,
            current_time: 0.0,
            duration: 0.0,
            error_reason: None,
            loading_progress: 0.0,
        }
    }
}

/// Normalized frequency magnitudes, each in `[0, 1]`.
///
/// Empty whenever no real analysis data is available.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrequencySnapshot {
    bins: Vec<f32>,
}

impl FrequencySnapshot {
    pub fn new(bins: Vec<f32>) -> Self {
        Self {
            bins: bins.into_iter().map(|b| b.clamp(0.0, 1.0)).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}
