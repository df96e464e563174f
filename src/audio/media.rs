use super::error::{MediaError, MediaResult, SamplerResult};

/// Lifecycle notifications from a media element, in arrival order.
///
/// Platforms disagree on which of the loading events first carries a
/// usable duration, so the controller treats all of them (plus
/// `TimeUpdate`) as chances to resolve it.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadStart,
    /// Seconds of audio buffered so far.
    Progress { buffered: f64 },
    LoadedMetadata,
    LoadedData,
    CanPlay,
    CanPlayThrough,
    TimeUpdate,
    Waiting,
    Suspend,
    Ended,
    Error(MediaError),
}

impl MediaEvent {
    pub fn may_carry_duration(&self) -> bool {
        matches!(
            self,
            Self::LoadedMetadata
                | Self::LoadedData
                | Self::CanPlay
                | Self::CanPlayThrough
                | Self::TimeUpdate
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadStart => "loadstart",
            Self::Progress { .. } => "progress",
            Self::LoadedMetadata => "loadedmetadata",
            Self::LoadedData => "loadeddata",
            Self::CanPlay => "canplay",
            Self::CanPlayThrough => "canplaythrough",
            Self::TimeUpdate => "timeupdate",
            Self::Waiting => "waiting",
            Self::Suspend => "suspend",
            Self::Ended => "ended",
            Self::Error(_) => "error",
        }
    }
}

/// The native playback primitive a controller drives.
///
/// Loading is asynchronous: implementations start fetching on [`load`]
/// and report progress through [`poll_event`], which the owner drains
/// once per UI tick.
///
/// [`load`]: MediaElement::load
/// [`poll_event`]: MediaElement::poll_event
pub trait MediaElement {
    /// Start (or restart) loading the bound asset. Supersedes any load in flight.
    fn load(&mut self);

    /// Cancel any load in flight and release playback resources.
    fn abort(&mut self);

    /// Request playback. May be rejected by the platform.
    fn play(&mut self) -> MediaResult<()>;

    fn pause(&mut self);

    fn seek(&mut self, seconds: f64) -> MediaResult<()>;

    fn current_time(&self) -> f64;

    /// Total length in seconds; NaN or infinite while unknown.
    fn duration(&self) -> f64;

    fn poll_event(&mut self) -> Option<MediaEvent>;

    /// Tap the element's output for analysis. Only one tap may exist per element.
    fn signal_tap(&mut self) -> SamplerResult<Box<dyn SignalTap>>;
}

/// Live mono signal flowing out of a media element.
pub trait SignalTap {
    /// Fill `out` with the samples immediately preceding the playhead.
    /// Returns `false` when nothing is flowing yet; `out` is then zeroed.
    fn read_window(&self, out: &mut [f32]) -> bool;
}

/// A duration is usable only once it is finite, non-NaN and positive.
pub fn is_known_duration(seconds: f64) -> bool {
    seconds.is_finite() && seconds > 0.0
}
