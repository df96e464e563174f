use anyhow::{bail, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use operation_dq::audio::controller::DEFAULT_LOAD_TIMEOUT;
use operation_dq::audio::loader::codec_support;
use operation_dq::audio::{FftContext, FrequencySampler, PlaybackStatus, RodioMediaElement};
use operation_dq::config::PlayerConfig;
use operation_dq::ui::format_time;
use operation_dq::PlaybackController;

const POLL: Duration = Duration::from_millis(50);
const SPECTRUM_COLUMNS: usize = 32;
const SPECTRUM_ROWS: usize = 8;

#[derive(Parser)]
#[command(name = "dq-audio-probe")]
#[command(about = "Load an audio asset headlessly and report how the player sees it")]
struct Args {
    /// Audio file to probe (WAV, MP3, M4A, OGG, FLAC)
    #[arg()]
    input_file: PathBuf,

    /// Seconds of playback to sample
    #[arg(short, long, default_value = "3")]
    seconds: f64,

    /// Seek here before playing
    #[arg(long)]
    seek: Option<f64>,

    /// Give up waiting for a duration after this many seconds
    #[arg(long, default_value = "5")]
    load_timeout: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("=== CODECS ===");
    for (name, supported) in codec_support() {
        println!("{:>5}: {}", name, if supported { "yes" } else { "no" });
    }

    let source = PlayerConfig::from_path(&args.input_file).audio_source();
    info!("Probing {:?} ({})", source.title(), source.path().display());

    let load_timeout = Duration::try_from_secs_f64(args.load_timeout.max(0.1))
        .unwrap_or(DEFAULT_LOAD_TIMEOUT);
    let media = RodioMediaElement::new(source.path());
    let sampler = FrequencySampler::new(FftContext::factory());
    let mut controller = PlaybackController::new(source, media, sampler)
        .with_load_timeout(load_timeout);

    let loading_since = Instant::now();
    loop {
        controller.update(Instant::now()).await;
        for transition in controller.take_transitions() {
            println!("{:?} -> {:?}", transition.from, transition.to);
        }
        match controller.status() {
            PlaybackStatus::Idle | PlaybackStatus::Loading => {}
            PlaybackStatus::Error(kind) if !controller.can_play() => {
                bail!("{}", kind.user_message());
            }
            _ => break,
        }
        if loading_since.elapsed() > load_timeout.saturating_mul(2) {
            bail!("Gave up waiting for the asset to load");
        }
        tokio::time::sleep(POLL).await;
    }

    let state = controller.state();
    println!("=== ASSET ===");
    println!("Status:   {:?}", state.status);
    println!(
        "Duration: {} ({:.2}s)",
        format_time(state.duration),
        state.duration
    );
    println!("Loaded in {:.0} ms", loading_since.elapsed().as_secs_f64() * 1000.0);

    if let Some(seconds) = args.seek {
        controller.seek(seconds);
        println!("Seeked to {}", format_time(controller.state().current_time));
    }

    controller.play().await;
    let sampled_for = Duration::try_from_secs_f64(args.seconds.max(0.0)).unwrap_or_default();
    let started = Instant::now();
    let mut peak = vec![0.0f32; SPECTRUM_COLUMNS];
    while started.elapsed() < sampled_for {
        controller.update(Instant::now()).await;
        if !controller.status().is_playing() {
            break;
        }
        let snapshot = controller.sample();
        for (slot, value) in peak.iter_mut().zip(snapshot.bins()) {
            *slot = slot.max(*value);
        }
        tokio::time::sleep(POLL).await;
    }
    for transition in controller.take_transitions() {
        println!("{:?} -> {:?}", transition.from, transition.to);
    }

    println!("=== SPECTRUM PEAKS ===");
    if controller.visualizer_degraded() {
        println!("Analysis unavailable; the player would show synthetic motion.");
    } else {
        print_spectrum(&peak);
    }
    println!(
        "Stopped at {} of {}",
        format_time(controller.state().current_time),
        format_time(controller.state().duration)
    );

    controller.dispose();
    Ok(())
}

fn print_spectrum(peaks: &[f32]) {
    for row in (0..SPECTRUM_ROWS).rev() {
        let threshold = row as f32 / SPECTRUM_ROWS as f32;
        let line: String = peaks
            .iter()
            .map(|&p| if p > threshold { '#' } else { ' ' })
            .collect();
        println!("|{}|", line);
    }
    println!("+{}+", "-".repeat(peaks.len()));
}
