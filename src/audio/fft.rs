use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::error::SamplerResult;
use super::media::SignalTap;

/// Lower edge of the magnitude range mapped to 0.0.
pub const MIN_DECIBELS: f32 = -100.0;
/// Upper edge of the magnitude range mapped to 1.0.
pub const MAX_DECIBELS: f32 = -30.0;

/// Frequency analysis node reading from a [`SignalTap`].
///
/// Mirrors the behaviour of a browser analyser node: Blackman window,
/// magnitude spectrum scaled by `1/N`, exponential smoothing across reads,
/// then decibels mapped linearly into `[0, 1]`.
pub struct FftAnalyser {
    tap: Box<dyn SignalTap>,
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothing: f32,

    time_domain: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl FftAnalyser {
    pub fn new(tap: Box<dyn SignalTap>, fft_size: usize, smoothing: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            tap,
            fft_size,
            fft,
            window: Self::blackman_window(fft_size),
            smoothing: smoothing.clamp(0.0, 1.0),
            time_domain: vec![0.0; fft_size],
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; fft_size / 2],
        }
    }

    fn blackman_window(size: usize) -> Vec<f32> {
        let alpha = 0.16;
        let a0 = 0.5 * (1.0 - alpha);
        let a1 = 0.5;
        let a2 = 0.5 * alpha;

        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
                a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
            })
            .collect()
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Read the current spectrum into `out`, one normalized value per bin.
    pub fn frequency_data(&mut self, out: &mut [f32]) -> SamplerResult<()> {
        self.tap.read_window(&mut self.time_domain);

        for ((slot, &sample), &w) in self
            .buffer
            .iter_mut()
            .zip(self.time_domain.iter())
            .zip(self.window.iter())
        {
            *slot = Complex::new(sample * w, 0.0);
        }

        self.fft.process(&mut self.buffer);

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(self.buffer.iter()) {
            let magnitude = bin.norm() * scale;
            let next = tau * *smoothed + (1.0 - tau) * magnitude;
            // NaN/inf would stick forever through the smoothing feedback
            *smoothed = if next.is_finite() { next } else { 0.0 };
        }

        for (slot, &magnitude) in out.iter_mut().zip(self.smoothed.iter()) {
            *slot = Self::normalize_magnitude(magnitude);
        }
        Ok(())
    }

    fn normalize_magnitude(magnitude: f32) -> f32 {
        if magnitude <= 0.0 {
            return 0.0;
        }
        let db = 20.0 * magnitude.log10();
        ((db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SineTap {
        frequency: f32,
        sample_rate: u32,
        amplitude: f32,
    }

    impl SignalTap for SineTap {
        fn read_window(&self, out: &mut [f32]) -> bool {
            for (i, slot) in out.iter_mut().enumerate() {
                let t = i as f32 / self.sample_rate as f32;
                *slot = self.amplitude * (std::f32::consts::TAU * self.frequency * t).sin();
            }
            true
        }
    }

    struct SilentTap;

    impl SignalTap for SilentTap {
        fn read_window(&self, out: &mut [f32]) -> bool {
            out.fill(0.0);
            false
        }
    }

    #[test]
    fn test_silence_maps_to_zero() {
        let mut analyser = FftAnalyser::new(Box::new(SilentTap), 128, 0.8);
        let mut bins = vec![1.0; analyser.frequency_bin_count()];
        analyser.frequency_data(&mut bins).unwrap();
        assert_eq!(bins.len(), 64);
        assert!(bins.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_tone_peaks_at_its_bin() {
        // 128-point transform at 12.8kHz gives 100Hz bins; 1kHz lands in bin 10
        let tap = SineTap {
            frequency: 1_000.0,
            sample_rate: 12_800,
            amplitude: 0.01,
        };
        let mut analyser = FftAnalyser::new(Box::new(tap), 128, 0.0);
        let mut bins = vec![0.0; 64];
        analyser.frequency_data(&mut bins).unwrap();

        let peak = bins
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        assert_eq!(peak.0, 10);
        assert!(bins.iter().all(|&b| (0.0..=1.0).contains(&b)));
    }

    #[test]
    fn test_smoothing_ramps_toward_signal() {
        let tap = SineTap {
            frequency: 1_000.0,
            sample_rate: 12_800,
            amplitude: 0.01,
        };
        let mut analyser = FftAnalyser::new(Box::new(tap), 128, 0.8);
        let mut first = vec![0.0; 64];
        let mut later = vec![0.0; 64];

        analyser.frequency_data(&mut first).unwrap();
        for _ in 0..20 {
            analyser.frequency_data(&mut later).unwrap();
        }
        assert!(later[10] > first[10]);
    }

    #[test]
    fn test_blackman_window_shape() {
        let window = FftAnalyser::blackman_window(128);
        assert!(window[0].abs() < 1e-6);
        assert!((window[64] - 1.0).abs() < 1e-4);
    }
}
