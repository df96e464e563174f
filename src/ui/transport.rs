use crate::audio::{MediaElement, PlaybackController, PlaybackStatus};

pub const SKIP_SECONDS: f64 = 10.0;

/// User intent from the transport controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportCommand {
    TogglePlay,
    Skip(f64),
    Seek(f64),
    Download,
}

/// `M:SS`, with anything non-finite shown as `0:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Seek target for a click `x` pixels into a control `width` pixels wide.
pub fn scrub_target(x: f32, width: f32, duration: f64) -> Option<f64> {
    if width <= 0.0 || !(duration.is_finite() && duration > 0.0) {
        return None;
    }
    let fraction = (x / width).clamp(0.0, 1.0) as f64;
    Some(fraction * duration)
}

/// Everything the transport widgets show, read off a controller.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportModel {
    pub title: String,
    pub elapsed: String,
    pub total: String,
    pub remaining: String,
    pub progress: f32,
    pub duration: f64,
    pub playing: bool,
    pub loading: bool,
    pub loading_progress: f32,
    pub can_play: bool,
    pub can_seek: bool,
    pub button_title: String,
    pub error: Option<&'static str>,
    pub offers_download: bool,
    pub synthetic: bool,
}

impl TransportModel {
    pub fn from_controller<M: MediaElement>(controller: &PlaybackController<M>) -> Self {
        let state = controller.state();
        Self {
            title: controller.source().title().to_string(),
            elapsed: format_time(state.current_time),
            total: format_time(state.duration),
            remaining: format!("-{}", format_time(state.remaining())),
            progress: state.progress() as f32,
            duration: state.duration,
            playing: state.status.is_playing(),
            loading: matches!(state.status, PlaybackStatus::Idle | PlaybackStatus::Loading),
            loading_progress: state.loading_progress,
            can_play: controller.can_play(),
            can_seek: controller.can_seek(),
            button_title: controller.button_title(),
            error: controller.error_message(),
            offers_download: controller.offers_download(),
            synthetic: controller.visualizer_degraded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::controller::tests::FakeMedia;
    use crate::audio::{AudioSource, FftContext, FrequencySampler, MediaEvent};
    use std::time::Instant;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(125.4), "2:05");
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(59.99), "0:59");
        assert_eq!(format_time(3600.0), "60:00");
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(f64::INFINITY), "0:00");
    }

    #[test]
    fn test_scrub_target_clamps() {
        assert_eq!(scrub_target(50.0, 200.0, 120.0), Some(30.0));
        assert_eq!(scrub_target(-10.0, 200.0, 120.0), Some(0.0));
        assert_eq!(scrub_target(500.0, 200.0, 120.0), Some(120.0));
        assert_eq!(scrub_target(50.0, 200.0, f64::NAN), None);
        assert_eq!(scrub_target(50.0, 0.0, 120.0), None);
    }

    #[test]
    fn test_model_tracks_controller() {
        let mut controller = PlaybackController::new(
            AudioSource::new("briefing.mp3", "Mission Briefing"),
            FakeMedia::new(),
            FrequencySampler::new(FftContext::factory()),
        );
        pollster::block_on(controller.update(Instant::now()));

        let loading = TransportModel::from_controller(&controller);
        assert!(loading.loading);
        assert!(!loading.can_play);
        assert!(!loading.can_seek);
        assert_eq!(loading.total, "0:00");

        controller.media_mut().duration = 125.4;
        controller.media_mut().push(MediaEvent::LoadedMetadata);
        pollster::block_on(controller.update(Instant::now()));
        controller.seek(5.0);

        let ready = TransportModel::from_controller(&controller);
        assert!(ready.can_play && ready.can_seek);
        assert_eq!(ready.elapsed, "0:05");
        assert_eq!(ready.total, "2:05");
        assert_eq!(ready.remaining, "-2:00");
        assert_eq!(ready.button_title, "Play/Pause");
        assert_eq!(ready.error, None);
    }
}
