use log::{error, info};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::audio::{
    AudioSource, FftContext, FrequencySampler, MediaElement, PlaybackController, PlaybackStatus,
    RodioMediaElement,
};
use crate::config::PlayerConfig;
use crate::graphics::{AnimationFrames, FrameId, RenderFrame, Theme, WaveformRenderer};
use crate::ui::transport::{TransportCommand, TransportModel};

/// One self-contained player: controller, analysis, waveform and transport.
///
/// Players never share mutable state; several can be mounted side by side.
pub struct TacticalAudioPlayer<M: MediaElement = RodioMediaElement> {
    controller: PlaybackController<M>,
    renderer: WaveformRenderer<AnimationFrames>,
    download_dir: PathBuf,
    notice: Option<String>,
}

impl TacticalAudioPlayer<RodioMediaElement> {
    pub fn open(
        config: &PlayerConfig,
        frames: AnimationFrames,
        load_timeout: Duration,
        download_dir: PathBuf,
    ) -> Self {
        let source = config.audio_source();
        let media = RodioMediaElement::new(source.path());
        let sampler = FrequencySampler::new(FftContext::factory());

        let mut player = Self::new(source, media, sampler, frames, config.theme);
        player.controller = player.controller.with_load_timeout(load_timeout);
        player.download_dir = download_dir;
        player
    }
}

impl<M: MediaElement> TacticalAudioPlayer<M> {
    pub fn new(
        source: AudioSource,
        media: M,
        sampler: FrequencySampler,
        frames: AnimationFrames,
        theme: Theme,
    ) -> Self {
        Self {
            controller: PlaybackController::new(source, media, sampler),
            renderer: WaveformRenderer::new(frames, theme),
            download_dir: PathBuf::from("."),
            notice: None,
        }
    }

    pub fn controller(&self) -> &PlaybackController<M> {
        &self.controller
    }

    pub fn title(&self) -> &str {
        self.controller.source().title()
    }

    pub fn theme(&self) -> Theme {
        self.renderer.theme()
    }

    pub fn transport(&self) -> TransportModel {
        TransportModel::from_controller(&self.controller)
    }

    /// Result of the last download, for the status line.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn has_pending_frame(&self) -> bool {
        self.renderer.has_pending_frame()
    }

    /// Loading or playing, so its media needs polling every tick.
    pub fn is_busy(&self) -> bool {
        !self.controller.is_disposed()
            && matches!(
                self.controller.status(),
                PlaybackStatus::Idle | PlaybackStatus::Loading | PlaybackStatus::Playing
            )
    }

    /// Drain media events. Returns whether anything visible changed.
    pub async fn update(&mut self, now: Instant) -> bool {
        let before = self.controller.state().clone();
        self.controller.update(now).await;
        self.reconcile();
        *self.controller.state() != before
    }

    pub async fn apply(&mut self, command: TransportCommand) {
        match command {
            TransportCommand::TogglePlay => self.controller.toggle().await,
            TransportCommand::Skip(delta) => {
                self.controller.skip(delta);
                self.renderer.invalidate();
            }
            TransportCommand::Seek(seconds) => {
                self.controller.seek(seconds);
                self.renderer.invalidate();
            }
            TransportCommand::Download => {
                self.notice = Some(match self.controller.download_to(&self.download_dir) {
                    Ok(path) => format!("Saved to {}", path.display()),
                    Err(err) => {
                        error!("Download failed: {:#}", err);
                        format!("Download failed: {}", err)
                    }
                });
            }
        }
        self.reconcile();
    }

    /// Align the animation loop with the controller after any change.
    fn reconcile(&mut self) {
        for transition in self.controller.take_transitions() {
            if transition.to == PlaybackStatus::Paused {
                self.renderer.invalidate();
            }
            if transition.to == PlaybackStatus::Playing {
                info!("{:?} playing", self.title());
            }
        }
        self.renderer.sync(self.controller.status());
    }

    /// Canvas contents for this redraw, recomputed when a frame is due.
    pub fn frame(&mut self, fired: &[FrameId], width: f32, height: f32) -> Option<&RenderFrame> {
        if self.renderer.frame_due(fired, width, height) {
            let snapshot = self.controller.sample();
            self.renderer
                .draw(self.controller.state(), &snapshot, width, height);
        }
        self.renderer.frame()
    }

    pub fn dispose(&mut self) {
        self.renderer.stop();
        self.controller.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::controller::tests::FakeMedia;
    use crate::audio::sampler::tests::{broken_read_factory, failing_factory};
    use crate::audio::MediaEvent;
    use crate::graphics::waveform::BarSource;

    fn player(frames: &AnimationFrames, sampler: FrequencySampler) -> TacticalAudioPlayer<FakeMedia> {
        let mut player = TacticalAudioPlayer::new(
            AudioSource::new("briefing.mp3", "Mission Briefing"),
            FakeMedia::new(),
            sampler,
            frames.clone(),
            Theme::Steel,
        );
        player.controller.media_mut().duration = 60.0;
        player.controller.media_mut().push(MediaEvent::CanPlay);
        assert!(pollster::block_on(player.update(Instant::now())));
        player
    }

    #[test]
    fn test_animation_only_while_playing() {
        let frames = AnimationFrames::new();
        let mut player = player(&frames, FrequencySampler::new(FftContext::factory()));
        assert!(!frames.has_pending());

        // mount draw
        assert!(player.frame(&frames.fire(), 300.0, 60.0).is_some());
        assert!(!frames.has_pending());

        pollster::block_on(player.apply(TransportCommand::TogglePlay));
        assert!(frames.has_pending());

        let fired = frames.fire();
        let frame = player.frame(&fired, 300.0, 60.0).cloned();
        assert!(frame.map_or(false, |f| f.spectrum_bars().count() == 32));
        assert_eq!(frames.pending_count(), 1);

        pollster::block_on(player.apply(TransportCommand::TogglePlay));
        assert!(!frames.has_pending());
        assert!(!player.has_pending_frame());
    }

    #[test]
    fn test_seek_redraws_once_while_paused() {
        let frames = AnimationFrames::new();
        let mut player = player(&frames, FrequencySampler::new(FftContext::factory()));
        player.frame(&[], 300.0, 60.0);

        pollster::block_on(player.apply(TransportCommand::Seek(30.0)));
        let marker = player.frame(&[], 300.0, 60.0).map_or(0.0, |f| f.marker.x);
        assert!((marker - 150.0).abs() < 1e-3);
        assert!(!frames.has_pending());

        pollster::block_on(player.apply(TransportCommand::Skip(-10.0)));
        let marker = player.frame(&[], 300.0, 60.0).map_or(0.0, |f| f.marker.x);
        assert!((marker - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_degraded_sampler_animates_synthetic_bars() {
        let frames = AnimationFrames::new();
        let mut player = player(&frames, FrequencySampler::new(failing_factory()));
        pollster::block_on(player.apply(TransportCommand::TogglePlay));
        assert!(player.transport().synthetic);

        let first = player.frame(&frames.fire(), 300.0, 60.0).cloned();

        player.controller.media_mut().time = 2.5;
        player.controller.media_mut().push(MediaEvent::TimeUpdate);
        pollster::block_on(player.update(Instant::now()));
        let second = player.frame(&frames.fire(), 300.0, 60.0).cloned();

        let (Some(first), Some(second)) = (first, second) else {
            panic!("frames were not drawn");
        };
        assert!(second.bars.iter().all(|b| b.source == BarSource::Synthetic));
        assert_ne!(first.bars, second.bars);
    }

    #[test]
    fn test_read_failure_falls_back_to_synthetic_bars() {
        let frames = AnimationFrames::new();
        let mut player = player(&frames, FrequencySampler::new(broken_read_factory()));
        pollster::block_on(player.apply(TransportCommand::TogglePlay));
        assert!(!player.transport().synthetic);

        let first = player.frame(&frames.fire(), 300.0, 60.0).cloned();
        assert!(player.transport().synthetic);
        assert_eq!(player.controller().status(), PlaybackStatus::Playing);

        player.controller.media_mut().time = 1.5;
        player.controller.media_mut().push(MediaEvent::TimeUpdate);
        pollster::block_on(player.update(Instant::now()));
        let second = player.frame(&frames.fire(), 300.0, 60.0).cloned();

        let (Some(first), Some(second)) = (first, second) else {
            panic!("frames were not drawn");
        };
        assert_eq!(first.spectrum_bars().count(), 0);
        assert!(second.bars.iter().all(|b| b.source == BarSource::Synthetic));
        assert_ne!(first.bars, second.bars);
    }

    #[test]
    fn test_players_are_isolated() {
        let frames = AnimationFrames::new();
        let mut a = player(&frames, FrequencySampler::new(FftContext::factory()));
        let b = player(&frames, FrequencySampler::new(FftContext::factory()));

        pollster::block_on(a.apply(TransportCommand::TogglePlay));
        assert_eq!(a.controller().status(), PlaybackStatus::Playing);
        assert_eq!(b.controller().status(), PlaybackStatus::Ready);
        assert_eq!(b.controller().media().taps, 0);
        assert_eq!(frames.pending_count(), 1);
    }

    #[test]
    fn test_busy_only_while_loading_or_playing() {
        let frames = AnimationFrames::new();
        let mut loading = TacticalAudioPlayer::new(
            AudioSource::new("intel.wav", "Intel"),
            FakeMedia::new(),
            FrequencySampler::new(FftContext::factory()),
            frames.clone(),
            Theme::Steel,
        );
        pollster::block_on(loading.update(Instant::now()));
        assert!(loading.is_busy());

        let mut player = player(&frames, FrequencySampler::new(FftContext::factory()));
        assert!(!player.is_busy());
        pollster::block_on(player.apply(TransportCommand::TogglePlay));
        assert!(player.is_busy());
        pollster::block_on(player.apply(TransportCommand::TogglePlay));
        assert!(!player.is_busy());

        pollster::block_on(player.apply(TransportCommand::TogglePlay));
        player.dispose();
        assert!(!player.is_busy());
    }

    #[test]
    fn test_dispose_cancels_frames() {
        let frames = AnimationFrames::new();
        let mut player = player(&frames, FrequencySampler::new(FftContext::factory()));
        pollster::block_on(player.apply(TransportCommand::TogglePlay));
        player.dispose();
        assert!(!frames.has_pending());
        assert!(player.controller().media().aborted);
    }

    #[test]
    fn test_download_notice() {
        let frames = AnimationFrames::new();
        let mut player = player(&frames, FrequencySampler::new(FftContext::factory()));
        player.download_dir = PathBuf::from("/nonexistent/dq");
        pollster::block_on(player.apply(TransportCommand::Download));
        assert!(player.notice().map_or(false, |n| n.starts_with("Download failed")));
    }
}
