//! Audio-reactive bar chart with a played/unplayed split.
//!
//! Frame computation is pure: [`compute_frame`] turns a playback state and
//! a spectrum snapshot into geometry. [`WaveformRenderer`] decides *when*
//! to compute, keeping at most one animation frame requested and only
//! while the player is playing.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::frames::{FrameId, FrameScheduler};
use crate::audio::{FrequencySnapshot, PlaybackState, PlaybackStatus};

pub const TOTAL_BARS: usize = 60;
/// At most this many centre bars show real spectrum data.
pub const MAX_SPECTRUM_BARS: usize = 32;

const HEIGHT_SCALE: f32 = 0.7;
const MIN_BAR_HEIGHT: f32 = 5.0;
const BAR_GAP: f32 = 2.0;

pub const BACKGROUND_ALPHA: f32 = 0.8;
const UNPLAYED_ALPHA: f32 = 0.2;
const SYNTHETIC_PLAYED_ALPHA: f32 = 0.6;
const MARKER_WIDTH: f32 = 2.0;
const MARKER_GLOW: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Steel,
    Phosphor,
}

impl Theme {
    pub fn accent(self) -> [u8; 3] {
        match self {
            Self::Steel => [0x9c, 0xa3, 0xaf],
            Self::Phosphor => [0x00, 0xff, 0x41],
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "steel" => Ok(Self::Steel),
            "phosphor" => Ok(Self::Phosphor),
            other => Err(format!("unknown theme '{}' (expected steel or phosphor)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarSource {
    Spectrum,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub amplitude: f32,
    pub alpha: f32,
    pub glow: f32,
    pub played: bool,
    pub source: BarSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressMarker {
    pub x: f32,
    pub width: f32,
    pub glow: f32,
}

/// Geometry of one drawn frame, in canvas-local pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub width: f32,
    pub height: f32,
    pub accent: [u8; 3],
    pub marker: ProgressMarker,
    pub bars: Vec<Bar>,
}

impl RenderFrame {
    pub fn spectrum_bars(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter().filter(|b| b.source == BarSource::Spectrum)
    }
}

/// Animated filler amplitude for bar `index` at playback time `t`.
pub fn synthetic_amplitude(t: f64, index: usize) -> f32 {
    let i = index as f64;
    let wave = (t * 2.0 + i * 0.5).sin() * 0.3
        + (t * 3.0 + i * 0.8).sin() * 0.2
        + (t * 5.0 + i * 1.2).sin() * 0.1;
    (wave.abs() * 0.3) as f32
}

pub fn compute_frame(
    state: &PlaybackState,
    snapshot: &FrequencySnapshot,
    width: f32,
    height: f32,
    theme: Theme,
) -> RenderFrame {
    let playing = state.status.is_playing();
    let progress = state.progress() as f32;
    let bar_width = width / TOTAL_BARS as f32;
    let center_y = height / 2.0;

    let spectrum_bars = if playing {
        snapshot.len().min(MAX_SPECTRUM_BARS)
    } else {
        0
    };
    let start = (TOTAL_BARS - spectrum_bars) / 2;
    let bins = snapshot.bins();

    let bars = (0..TOTAL_BARS)
        .map(|i| {
            let (amplitude, source) = if (start..start + spectrum_bars).contains(&i) {
                (bins[i - start], BarSource::Spectrum)
            } else {
                (synthetic_amplitude(state.current_time, i), BarSource::Synthetic)
            };

            let bar_height = amplitude * height * HEIGHT_SCALE + MIN_BAR_HEIGHT;
            let played = i as f32 / TOTAL_BARS as f32 <= progress;
            let (alpha, glow) = match (played, source) {
                (true, BarSource::Spectrum) => {
                    let alpha = if amplitude > 0.3 { 0.8 } else { 0.5 + amplitude * 0.3 };
                    (alpha, if amplitude > 0.5 { 4.0 } else { 2.0 })
                }
                (true, BarSource::Synthetic) => (SYNTHETIC_PLAYED_ALPHA, 1.0),
                (false, _) => (UNPLAYED_ALPHA, 0.0),
            };

            Bar {
                x: i as f32 * bar_width,
                y: center_y - bar_height / 2.0,
                width: (bar_width - BAR_GAP).max(0.0),
                height: bar_height,
                amplitude,
                alpha,
                glow,
                played,
                source,
            }
        })
        .collect();

    RenderFrame {
        width,
        height,
        accent: theme.accent(),
        marker: ProgressMarker {
            x: progress * width,
            width: MARKER_WIDTH,
            glow: MARKER_GLOW,
        },
        bars,
    }
}

/// Owns the animation loop of one player's waveform canvas.
///
/// The last computed frame is retained as the canvas contents and repainted
/// as-is until the next animation tick or one-off redraw.
pub struct WaveformRenderer<S: FrameScheduler> {
    scheduler: S,
    theme: Theme,
    pending: Option<FrameId>,
    dirty: bool,
    frame: Option<RenderFrame>,
}

impl<S: FrameScheduler> WaveformRenderer<S> {
    pub fn new(scheduler: S, theme: Theme) -> Self {
        Self {
            scheduler,
            theme,
            pending: None,
            // first draw happens at mount
            dirty: true,
            frame: None,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn has_pending_frame(&self) -> bool {
        self.pending.is_some()
    }

    /// Schedule a single redraw outside the animation loop.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Keep a frame requested while playing, and none otherwise.
    pub fn sync(&mut self, status: PlaybackStatus) {
        if status.is_playing() {
            if self.pending.is_none() {
                self.pending = Some(self.scheduler.request_frame());
            }
        } else {
            self.stop();
        }
    }

    /// Whether a draw is due: our animation frame fired, a one-off redraw
    /// was asked for, or the canvas changed size.
    pub fn frame_due(&mut self, fired: &[FrameId], width: f32, height: f32) -> bool {
        if let Some(id) = self.pending {
            if fired.contains(&id) {
                self.pending = None;
                return true;
            }
        }
        let resized = self
            .frame
            .as_ref()
            .map_or(true, |f| f.width != width || f.height != height);
        self.dirty || resized
    }

    pub fn draw(
        &mut self,
        state: &PlaybackState,
        snapshot: &FrequencySnapshot,
        width: f32,
        height: f32,
    ) -> &RenderFrame {
        self.dirty = false;
        if state.status.is_playing() && self.pending.is_none() {
            self.pending = Some(self.scheduler.request_frame());
        }
        self.frame
            .insert(compute_frame(state, snapshot, width, height, self.theme))
    }

    /// Canvas contents as of the last draw.
    pub fn frame(&self) -> Option<&RenderFrame> {
        self.frame.as_ref()
    }

    pub fn stop(&mut self) {
        if let Some(id) = self.pending.take() {
            self.scheduler.cancel_frame(id);
        }
    }
}

impl<S: FrameScheduler> Drop for WaveformRenderer<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::frames::AnimationFrames;

    fn playing_at(current_time: f64, duration: f64) -> PlaybackState {
        PlaybackState {
            status: PlaybackStatus::Playing,
            current_time,
            duration,
            ..PlaybackState::default()
        }
    }

    #[test]
    fn test_synthetic_frame_without_spectrum() {
        let state = playing_at(0.0, 0.0);
        let frame = compute_frame(&state, &FrequencySnapshot::empty(), 600.0, 100.0, Theme::Steel);

        assert_eq!(frame.bars.len(), TOTAL_BARS);
        assert_eq!(frame.spectrum_bars().count(), 0);
        assert_eq!(frame.marker.x, 0.0);
        for bar in &frame.bars {
            assert!(bar.height >= MIN_BAR_HEIGHT);
            assert!((bar.width - 8.0).abs() < 1e-4);
        }
        // progress 0 still counts bar 0 as played
        assert!(frame.bars[0].played);
        assert!(!frame.bars[1].played);
    }

    #[test]
    fn test_spectrum_window_is_centred() {
        let state = playing_at(10.0, 100.0);

        let full = FrequencySnapshot::new(vec![0.9; 64]);
        let frame = compute_frame(&state, &full, 600.0, 100.0, Theme::Steel);
        let indices: Vec<usize> = frame
            .bars
            .iter()
            .enumerate()
            .filter(|(_, b)| b.source == BarSource::Spectrum)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(indices, (14..46).collect::<Vec<_>>());

        let short = FrequencySnapshot::new(vec![0.9; 10]);
        let frame = compute_frame(&state, &short, 600.0, 100.0, Theme::Steel);
        assert_eq!(frame.spectrum_bars().count(), 10);
        assert_eq!(frame.bars[25].source, BarSource::Spectrum);
        assert_eq!(frame.bars[24].source, BarSource::Synthetic);
    }

    #[test]
    fn test_spectrum_ignored_unless_playing() {
        let state = PlaybackState {
            status: PlaybackStatus::Paused,
            ..playing_at(10.0, 100.0)
        };
        let frame = compute_frame(&state, &FrequencySnapshot::new(vec![1.0; 64]), 600.0, 100.0, Theme::Steel);
        assert_eq!(frame.spectrum_bars().count(), 0);
    }

    #[test]
    fn test_bar_height_and_intensity() {
        let state = playing_at(100.0, 100.0);
        let mut bins = vec![0.2; 32];
        bins[0] = 0.9;
        let frame = compute_frame(&state, &FrequencySnapshot::new(bins), 600.0, 100.0, Theme::Steel);

        let loud = &frame.bars[14];
        assert!((loud.height - (0.9 * 100.0 * 0.7 + 5.0)).abs() < 1e-4);
        assert!((loud.y - (50.0 - loud.height / 2.0)).abs() < 1e-4);
        assert_eq!((loud.alpha, loud.glow), (0.8, 4.0));

        let quiet = &frame.bars[15];
        assert!((quiet.alpha - 0.56).abs() < 1e-6);
        assert_eq!(quiet.glow, 2.0);

        let synthetic = &frame.bars[0];
        assert_eq!((synthetic.alpha, synthetic.glow), (0.6, 1.0));
    }

    #[test]
    fn test_unplayed_bars_are_dimmed() {
        let state = playing_at(50.0, 100.0);
        let frame = compute_frame(&state, &FrequencySnapshot::empty(), 600.0, 100.0, Theme::Phosphor);

        assert_eq!(frame.marker.x, 300.0);
        assert!(frame.bars[30].played);
        let tail = &frame.bars[31];
        assert!(!tail.played);
        assert_eq!((tail.alpha, tail.glow), (0.2, 0.0));
        assert_eq!(frame.accent, [0x00, 0xff, 0x41]);
    }

    #[test]
    fn test_synthetic_motion_varies_over_time() {
        let a = compute_frame(&playing_at(1.0, 10.0), &FrequencySnapshot::empty(), 600.0, 100.0, Theme::Steel);
        let b = compute_frame(&playing_at(1.5, 10.0), &FrequencySnapshot::empty(), 600.0, 100.0, Theme::Steel);
        assert!(a.bars.iter().zip(&b.bars).any(|(x, y)| x.height != y.height));
        assert!(a.bars.iter().all(|bar| bar.amplitude <= 0.18));
    }

    #[test]
    fn test_no_frame_pending_unless_playing() {
        let frames = AnimationFrames::new();
        let mut renderer = WaveformRenderer::new(frames.clone(), Theme::Steel);

        for status in [
            PlaybackStatus::Idle,
            PlaybackStatus::Loading,
            PlaybackStatus::Ready,
            PlaybackStatus::Paused,
            PlaybackStatus::Ended,
        ] {
            renderer.sync(status);
            assert!(!renderer.has_pending_frame());
            assert!(!frames.has_pending());
        }

        renderer.sync(PlaybackStatus::Playing);
        renderer.sync(PlaybackStatus::Playing);
        assert_eq!(frames.pending_count(), 1);

        renderer.sync(PlaybackStatus::Paused);
        assert!(!frames.has_pending());
    }

    #[test]
    fn test_draw_while_playing_requests_next_frame() {
        let frames = AnimationFrames::new();
        let mut renderer = WaveformRenderer::new(frames.clone(), Theme::Steel);
        let state = playing_at(1.0, 10.0);

        // mount redraw
        assert!(renderer.frame_due(&[], 600.0, 100.0));
        renderer.draw(&state, &FrequencySnapshot::empty(), 600.0, 100.0);
        assert!(!renderer.frame_due(&[], 600.0, 100.0));

        let fired = frames.fire();
        assert_eq!(fired.len(), 1);
        assert!(renderer.frame_due(&fired, 600.0, 100.0));
        renderer.draw(&state, &FrequencySnapshot::empty(), 600.0, 100.0);
        assert!(frames.has_pending());
    }

    #[test]
    fn test_one_off_redraw_when_stopped() {
        let frames = AnimationFrames::new();
        let mut renderer = WaveformRenderer::new(frames.clone(), Theme::Steel);
        let paused = PlaybackState {
            status: PlaybackStatus::Paused,
            ..playing_at(3.0, 10.0)
        };
        renderer.draw(&paused, &FrequencySnapshot::empty(), 600.0, 100.0);

        renderer.invalidate();
        assert!(renderer.frame_due(&[], 600.0, 100.0));
        renderer.draw(&paused, &FrequencySnapshot::empty(), 600.0, 100.0);
        assert!(!frames.has_pending());
        let marker = renderer.frame().map_or(0.0, |f| f.marker.x);
        assert!((marker - 180.0).abs() < 1e-3);

        // a resized canvas is redrawn too
        assert!(renderer.frame_due(&[], 300.0, 100.0));
    }

    #[test]
    fn test_drop_cancels_pending_frame() {
        let frames = AnimationFrames::new();
        {
            let mut renderer = WaveformRenderer::new(frames.clone(), Theme::Steel);
            renderer.sync(PlaybackStatus::Playing);
            assert!(frames.has_pending());
        }
        assert!(!frames.has_pending());
    }

    #[test]
    fn test_theme_parsing() {
        assert_eq!("Phosphor".parse::<Theme>(), Ok(Theme::Phosphor));
        assert!("amber".parse::<Theme>().is_err());
        assert_eq!(Theme::default().accent(), [0x9c, 0xa3, 0xaf]);
    }
}
