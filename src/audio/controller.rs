use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::error::ErrorKind;
use super::media::{is_known_duration, MediaElement, MediaEvent};
use super::sampler::FrequencySampler;
use super::{AudioSource, FrequencySnapshot, PlaybackState, PlaybackStatus};

/// How long a load may sit in `Loading` before the player is enabled anyway.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

const TRANSITION_HISTORY: usize = 32;

/// A status change, oldest first in [`PlaybackController::take_transitions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: PlaybackStatus,
    pub to: PlaybackStatus,
}

/// Single source of truth for the playback status of one audio source.
///
/// The controller never blocks on the media element. Lifecycle events are
/// drained by [`update`](Self::update) once per UI tick; user commands act
/// immediately and leave any follow-up to those events.
pub struct PlaybackController<M: MediaElement> {
    source: AudioSource,
    media: M,
    sampler: FrequencySampler,
    state: PlaybackState,

    /// Set once the first usable duration has been accepted.
    duration_resolved: bool,
    /// Start playback as soon as a reload resolves.
    pending_play: bool,
    autoplay_due: bool,
    disposed: bool,

    load_started: Instant,
    load_timeout: Duration,
    transitions: VecDeque<Transition>,
}

impl<M: MediaElement> PlaybackController<M> {
    /// Bind `source` to `media` and start loading it.
    pub fn new(source: AudioSource, mut media: M, sampler: FrequencySampler) -> Self {
        info!("Loading {:?} from {:?}", source.title(), source.path());
        media.load();

        Self {
            source,
            media,
            sampler,
            state: PlaybackState::default(),
            duration_resolved: false,
            pending_play: false,
            autoplay_due: false,
            disposed: false,
            load_started: Instant::now(),
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            transitions: VecDeque::new(),
        }
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn source(&self) -> &AudioSource {
        &self.source
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.status
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Latest spectrum of the audio this controller is playing.
    pub fn sample(&mut self) -> FrequencySnapshot {
        self.sampler.sample(self.state.status.is_playing())
    }

    /// The analysis graph failed and the waveform is running on synthetic motion.
    pub fn visualizer_degraded(&self) -> bool {
        self.sampler.failure().is_some()
    }

    /// Status changes since the last call.
    pub fn take_transitions(&mut self) -> Vec<Transition> {
        self.transitions.drain(..).collect()
    }

    /// Drain lifecycle events, apply the load timeout and start any playback
    /// a reload was waiting for.
    pub async fn update(&mut self, now: Instant) {
        if self.disposed {
            return;
        }

        while let Some(event) = self.media.poll_event() {
            self.handle_event(event);
            if self.disposed {
                return;
            }
        }

        self.check_load_timeout(now);

        if std::mem::take(&mut self.autoplay_due) {
            self.play().await;
        }
    }

    fn handle_event(&mut self, event: MediaEvent) {
        let name = event.name();
        if event.may_carry_duration() {
            self.resolve_duration(name);
        }

        match event {
            MediaEvent::LoadStart => {
                if self.state.status == PlaybackStatus::Idle {
                    self.load_started = Instant::now();
                    self.set_status(PlaybackStatus::Loading);
                }
            }
            MediaEvent::Progress { buffered } => self.update_loading_progress(buffered),
            MediaEvent::TimeUpdate => {
                let time = self.media.current_time();
                self.state.current_time = self.clamp_time(time);
            }
            MediaEvent::Ended => self.complete(),
            MediaEvent::Error(err) => {
                warn!("Media error for {:?}: {}", self.source.title(), err);
                self.fail(err.kind);
            }
            MediaEvent::Waiting | MediaEvent::Suspend => {
                debug!("{} for {:?}", name, self.source.title());
            }
            MediaEvent::LoadedMetadata
            | MediaEvent::LoadedData
            | MediaEvent::CanPlay
            | MediaEvent::CanPlayThrough => {}
        }
    }

    /// Accept the first usable duration the media reports; later ones are ignored.
    fn resolve_duration(&mut self, trigger: &str) {
        let first = !self.duration_resolved;
        if first {
            let duration = self.media.duration();
            if !is_known_duration(duration) {
                return;
            }
            info!(
                "Duration of {:?} resolved on {}: {:.2}s",
                self.source.title(),
                trigger,
                duration
            );
            self.duration_resolved = true;
            self.state.duration = duration;
            self.state.current_time = self.clamp_time(self.state.current_time);
        }

        let advance = match self.state.status {
            PlaybackStatus::Idle | PlaybackStatus::Loading => true,
            PlaybackStatus::Error(kind) => first && kind.needs_reload(),
            _ => false,
        };
        if !advance {
            return;
        }

        self.state.error_reason = None;
        self.state.loading_progress = 100.0;
        self.set_status(PlaybackStatus::Ready);
        if std::mem::take(&mut self.pending_play) {
            self.autoplay_due = true;
        }
    }

    fn update_loading_progress(&mut self, buffered: f64) {
        let duration = if self.state.duration_known() {
            self.state.duration
        } else {
            self.media.duration()
        };
        if !is_known_duration(duration) {
            return;
        }
        self.state.loading_progress = ((buffered / duration * 100.0) as f32).clamp(0.0, 100.0);
    }

    fn check_load_timeout(&mut self, now: Instant) {
        if self.state.status != PlaybackStatus::Loading {
            return;
        }
        if now.saturating_duration_since(self.load_started) < self.load_timeout {
            return;
        }

        warn!(
            "{:?} still loading after {:?}; enabling playback with unknown duration",
            self.source.title(),
            self.load_timeout
        );
        self.set_status(PlaybackStatus::Ready);
        if std::mem::take(&mut self.pending_play) {
            self.autoplay_due = true;
        }
    }

    fn complete(&mut self) {
        if !matches!(
            self.state.status,
            PlaybackStatus::Ready | PlaybackStatus::Playing | PlaybackStatus::Paused
        ) {
            return;
        }

        self.set_status(PlaybackStatus::Ended);
        self.state.current_time = 0.0;
        if let Err(err) = self.media.seek(0.0) {
            warn!("Failed to rewind {:?}: {}", self.source.title(), err);
        }
        self.set_status(PlaybackStatus::Paused);
    }

    fn fail(&mut self, kind: ErrorKind) {
        self.pending_play = false;
        self.autoplay_due = false;
        self.state.error_reason = Some(kind);
        self.set_status(PlaybackStatus::Error(kind));
    }

    fn set_status(&mut self, status: PlaybackStatus) {
        let from = self.state.status;
        if from == status {
            return;
        }
        debug!("{:?}: {:?} -> {:?}", self.source.title(), from, status);
        self.state.status = status;

        if self.transitions.len() == TRANSITION_HISTORY {
            self.transitions.pop_front();
        }
        self.transitions.push_back(Transition { from, to: status });
    }

    fn clamp_time(&self, seconds: f64) -> f64 {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        if self.state.duration_known() {
            seconds.min(self.state.duration)
        } else {
            seconds
        }
    }

    /// Start or resume playback.
    ///
    /// The first call builds the analysis graph; every call resumes a
    /// suspended analysis context before asking the media to play.
    pub async fn play(&mut self) {
        if self.disposed {
            return;
        }

        match self.state.status {
            PlaybackStatus::Ready | PlaybackStatus::Paused | PlaybackStatus::Ended => {}
            PlaybackStatus::Error(kind) if kind.needs_reload() => {
                info!("Reloading {:?} after {:?}", self.source.title(), kind);
                self.reload();
                return;
            }
            // A blocked play request keeps its asset, so retrying skips loading
            PlaybackStatus::Error(kind) if kind.is_recoverable() => {}
            PlaybackStatus::Error(kind) => {
                debug!("Ignoring play for {:?}: {:?} is terminal", self.source.title(), kind);
                return;
            }
            PlaybackStatus::Idle | PlaybackStatus::Loading | PlaybackStatus::Playing => return,
        }

        self.sampler.initialize(&mut self.media).await;
        self.sampler.resume().await;

        match self.media.play() {
            Ok(()) => {
                self.state.error_reason = None;
                self.set_status(PlaybackStatus::Playing);
            }
            Err(err) => {
                warn!("Failed to play {:?}: {}", self.source.title(), err);
                self.fail(ErrorKind::PlaybackBlocked);
            }
        }
    }

    fn reload(&mut self) {
        self.media.load();
        self.load_started = Instant::now();
        self.state.loading_progress = 0.0;
        self.pending_play = true;
        self.set_status(PlaybackStatus::Loading);
    }

    pub fn pause(&mut self) {
        if self.disposed || self.state.status != PlaybackStatus::Playing {
            return;
        }
        self.media.pause();
        self.state.current_time = self.clamp_time(self.media.current_time());
        self.set_status(PlaybackStatus::Paused);
    }

    pub async fn toggle(&mut self) {
        if self.state.status.is_playing() {
            self.pause();
        } else {
            self.play().await;
        }
    }

    /// Move the playhead to `seconds`, clamped to the asset. Ignored until
    /// the duration is known.
    pub fn seek(&mut self, seconds: f64) {
        if self.disposed || !self.state.duration_known() {
            return;
        }
        let target = self.clamp_time(seconds);
        self.state.current_time = target;
        if let Err(err) = self.media.seek(target) {
            warn!("Failed to seek {:?} to {:.2}s: {}", self.source.title(), target, err);
        }
    }

    pub fn skip(&mut self, delta: f64) {
        self.seek(self.state.current_time + delta);
    }

    /// Tear down: later events and commands become no-ops.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.pending_play = false;
        self.autoplay_due = false;
        self.media.pause();
        self.media.abort();
        self.sampler.close();
        info!("Disposed player for {:?}", self.source.title());
    }

    pub fn can_play(&self) -> bool {
        if self.disposed {
            return false;
        }
        match self.state.status {
            PlaybackStatus::Ready
            | PlaybackStatus::Playing
            | PlaybackStatus::Paused
            | PlaybackStatus::Ended => true,
            PlaybackStatus::Error(kind) => kind.is_recoverable(),
            PlaybackStatus::Idle | PlaybackStatus::Loading => false,
        }
    }

    /// Scrubbing and skipping need a known duration outside of a load.
    pub fn can_seek(&self) -> bool {
        !self.disposed
            && self.state.duration_known()
            && self.state.status != PlaybackStatus::Loading
    }

    pub fn button_title(&self) -> String {
        match self.state.status {
            PlaybackStatus::Error(_) => "Audio failed to load".to_string(),
            PlaybackStatus::Ready
            | PlaybackStatus::Playing
            | PlaybackStatus::Paused
            | PlaybackStatus::Ended => "Play/Pause".to_string(),
            PlaybackStatus::Idle | PlaybackStatus::Loading => {
                if self.state.loading_progress > 0.0 {
                    format!("Loading... {}%", self.state.loading_progress.round() as u32)
                } else {
                    "Loading...".to_string()
                }
            }
        }
    }

    pub fn error_message(&self) -> Option<&'static str> {
        self.state.error_reason.map(ErrorKind::user_message)
    }

    /// Terminal format errors leave downloading as the only way to listen.
    pub fn offers_download(&self) -> bool {
        self.state.error_reason.map_or(false, ErrorKind::is_terminal)
    }

    /// Copy the asset into `dir` as `<title>.<ext>`.
    pub fn download_to(&self, dir: &Path) -> Result<PathBuf> {
        let target = dir.join(self.source.download_name());
        std::fs::copy(self.source.path(), &target).with_context(|| {
            format!("Failed to copy {:?} to {:?}", self.source.path(), target)
        })?;
        info!("Saved {:?} to {:?}", self.source.title(), target);
        Ok(target)
    }

    #[cfg(test)]
    pub(crate) fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }
}

impl<M: MediaElement> Drop for PlaybackController<M> {
    fn drop(&mut self) {
        self.dispose();
    }
}
