//! Error taxonomy for the tactical audio player.
//!
//! Every failure is caught where it occurs and folded into
//! [`PlaybackState`](super::PlaybackState) or the sampler's degraded flag.
//! Nothing here is meant to reach the top of the event loop.

use thiserror::Error;

/// Kinds of failure the player distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The in-flight load was cancelled before it finished.
    LoadAborted,
    /// The asset byte stream could not be read.
    NetworkError,
    /// The asset was readable but its audio data could not be decoded.
    DecodeError,
    /// No demuxer or codec is available for the asset.
    FormatUnsupported,
    /// The native play request was rejected.
    PlaybackBlocked,
    /// The analysis graph could not be built or read.
    AnalysisGraphFailure,
}

impl ErrorKind {
    /// No retry will help; the user needs the download fallback.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::DecodeError | Self::FormatUnsupported)
    }

    /// A later `play()` reloads the asset from scratch.
    pub fn needs_reload(self) -> bool {
        matches!(self, Self::LoadAborted | Self::NetworkError)
    }

    /// A later user-initiated `play()` may succeed.
    pub fn is_recoverable(self) -> bool {
        !self.is_terminal()
    }

    pub fn user_message(self) -> &'static str {
        match self {
            Self::LoadAborted => "Audio loading was aborted",
            Self::NetworkError => "Network error loading audio",
            Self::DecodeError => "Audio file format is not compatible with this player",
            Self::FormatUnsupported => "Audio format is not supported by this player",
            Self::PlaybackBlocked => "Failed to play audio. Please try again.",
            Self::AnalysisGraphFailure => "Visualizer running on synthetic signal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.user_message())
    }
}

/// Failure reported by a [`MediaElement`](super::MediaElement).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct MediaError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl MediaError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn blocked(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::PlaybackBlocked, detail)
    }
}

/// Failure while building or reading the analysis graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplerError {
    #[error("Failed to create analysis context: {0}")]
    ContextUnavailable(String),

    #[error("Failed to resume analysis context: {0}")]
    ResumeRejected(String),

    #[error("Media element is already connected to an analysis graph")]
    AlreadyConnected,

    #[error("Analysis context is closed")]
    ContextClosed,

    #[error("Failed to read frequency data: {0}")]
    ReadFailed(String),
}

impl SamplerError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::AnalysisGraphFailure
    }
}

pub type MediaResult<T> = Result<T, MediaError>;
pub type SamplerResult<T> = Result<T, SamplerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_and_retryable_kinds() {
        assert!(ErrorKind::DecodeError.is_terminal());
        assert!(ErrorKind::FormatUnsupported.is_terminal());
        assert!(!ErrorKind::NetworkError.is_terminal());

        assert!(ErrorKind::LoadAborted.needs_reload());
        assert!(ErrorKind::NetworkError.needs_reload());
        assert!(!ErrorKind::PlaybackBlocked.needs_reload());
        assert!(ErrorKind::PlaybackBlocked.is_recoverable());
    }

    #[test]
    fn test_media_error_display_includes_detail() {
        let err = MediaError::new(ErrorKind::NetworkError, "connection reset");
        assert_eq!(err.to_string(), "Network error loading audio: connection reset");
    }
}
