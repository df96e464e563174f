use crossbeam_channel::Sender;
use log::{debug, info, warn};
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{
    DecoderOptions, CODEC_TYPE_AAC, CODEC_TYPE_FLAC, CODEC_TYPE_MP3, CODEC_TYPE_NULL,
    CODEC_TYPE_PCM_S16LE, CODEC_TYPE_VORBIS,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::error::{ErrorKind, MediaError, MediaResult};

/// Emit a progress update every this many decoded packets.
const PROGRESS_PACKET_INTERVAL: usize = 64;

/// Fully decoded asset, interleaved.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Interleaved samples from `seconds` to the end.
    pub fn samples_from(&self, seconds: f64) -> &[f32] {
        let frame = ((seconds.max(0.0) * self.sample_rate as f64) as usize).min(self.frames());
        &self.samples[frame * self.channels as usize..]
    }

    /// Mono downmix of the `out.len()` frames ending at `seconds`.
    /// Frames before the start of the asset are zero.
    pub fn mono_window_ending_at(&self, seconds: f64, out: &mut [f32]) {
        let channels = self.channels.max(1) as usize;
        let end = ((seconds.max(0.0) * self.sample_rate as f64) as usize).min(self.frames());
        let len = out.len();

        for (i, slot) in out.iter_mut().enumerate() {
            // i == len - 1 is the frame just before the playhead
            let back = len - i;
            *slot = if back <= end {
                let frame = end - back;
                let start = frame * channels;
                self.samples[start..start + channels].iter().sum::<f32>() / channels as f32
            } else {
                0.0
            };
        }
    }
}

#[derive(Debug)]
pub(crate) enum LoaderMessage {
    Started,
    Metadata { duration: Option<f64> },
    Progress { buffered: f64 },
    Decoded(DecodedAudio),
    Failed(MediaError),
}

/// A loader message tagged with the load it belongs to, so the element can
/// drop anything sent by a load it has since superseded.
#[derive(Debug)]
pub(crate) struct LoaderUpdate {
    pub generation: u64,
    pub message: LoaderMessage,
}

/// Background decode of one asset.
pub(crate) struct AssetLoader {
    path: PathBuf,
    generation: u64,
    sender: Sender<LoaderUpdate>,
    abort: Arc<AtomicBool>,
}

impl AssetLoader {
    pub fn new(
        path: PathBuf,
        generation: u64,
        sender: Sender<LoaderUpdate>,
        abort: Arc<AtomicBool>,
    ) -> Self {
        Self {
            path,
            generation,
            sender,
            abort,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("dq-loader-{}", self.generation))
            .spawn(move || self.run())
    }

    fn run(self) {
        self.send(LoaderMessage::Started);

        match self.decode() {
            Ok(audio) => {
                info!(
                    "Decoded {:?} ({}Hz, {} channels, {:.2}s)",
                    self.path,
                    audio.sample_rate,
                    audio.channels,
                    audio.duration()
                );
                self.send(LoaderMessage::Decoded(audio));
            }
            Err(err) => {
                if err.kind != ErrorKind::LoadAborted {
                    warn!("Failed to load {:?}: {}", self.path, err);
                }
                self.send(LoaderMessage::Failed(err));
            }
        }
    }

    fn send(&self, message: LoaderMessage) {
        if self
            .sender
            .send(LoaderUpdate {
                generation: self.generation,
                message,
            })
            .is_err()
        {
            debug!("Loader {} outlived its media element", self.generation);
        }
    }

    fn aborted(&self) -> MediaResult<()> {
        if self.abort.load(Ordering::Relaxed) {
            return Err(MediaError::new(ErrorKind::LoadAborted, "load cancelled"));
        }
        Ok(())
    }

    fn decode(&self) -> MediaResult<DecodedAudio> {
        let file = File::open(&self.path)
            .map_err(|e| MediaError::new(ErrorKind::NetworkError, e.to_string()))?;
        let stream = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = self.path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(classify)?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| MediaError::new(ErrorKind::FormatUnsupported, "no audio track"))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| MediaError::new(ErrorKind::FormatUnsupported, "unknown sample rate"))?;
        let declared = params
            .n_frames
            .map(|frames| frames as f64 / sample_rate as f64);
        self.send(LoaderMessage::Metadata { duration: declared });

        let mut decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(classify)?;

        let mut samples = Vec::new();
        let mut channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);
        let mut packets = 0usize;

        loop {
            self.aborted()?;

            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(classify(e)),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    channels = spec.channels.count() as u16;
                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buffer.samples());
                }
                Err(SymphoniaError::DecodeError(msg)) => {
                    // Corrupt packets are skipped, the same way players conceal them
                    warn!("Skipping undecodable packet in {:?}: {}", self.path, msg);
                    continue;
                }
                Err(e) => return Err(classify(e)),
            }

            packets += 1;
            if packets % PROGRESS_PACKET_INTERVAL == 0 && channels > 0 {
                let buffered = (samples.len() / channels as usize) as f64 / sample_rate as f64;
                self.send(LoaderMessage::Progress { buffered });
            }
        }

        if samples.is_empty() || channels == 0 {
            return Err(MediaError::new(ErrorKind::DecodeError, "asset contains no audio frames"));
        }

        Ok(DecodedAudio {
            samples,
            channels,
            sample_rate,
        })
    }
}

fn classify(err: SymphoniaError) -> MediaError {
    match err {
        SymphoniaError::IoError(e) => MediaError::new(ErrorKind::NetworkError, e.to_string()),
        SymphoniaError::Unsupported(what) => MediaError::new(ErrorKind::FormatUnsupported, what),
        SymphoniaError::DecodeError(what) => MediaError::new(ErrorKind::DecodeError, what),
        other => MediaError::new(ErrorKind::DecodeError, other.to_string()),
    }
}

/// Codecs compiled into this build, keyed by the container people know them by.
pub fn codec_support() -> Vec<(&'static str, bool)> {
    let codecs = symphonia::default::get_codecs();
    [
        ("wav", CODEC_TYPE_PCM_S16LE),
        ("mp3", CODEC_TYPE_MP3),
        ("m4a", CODEC_TYPE_AAC),
        ("ogg", CODEC_TYPE_VORBIS),
        ("flac", CODEC_TYPE_FLAC),
    ]
    .into_iter()
    .map(|(name, codec)| (name, codecs.get_codec(codec).is_some()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo(frames: &[(f32, f32)], sample_rate: u32) -> DecodedAudio {
        DecodedAudio {
            samples: frames.iter().flat_map(|&(l, r)| [l, r]).collect(),
            channels: 2,
            sample_rate,
        }
    }

    #[test]
    fn test_duration_from_frames() {
        let audio = stereo(&[(0.0, 0.0); 441], 441);
        assert_eq!(audio.frames(), 441);
        assert!((audio.duration() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mono_window_pads_before_start() {
        let audio = stereo(&[(1.0, 0.0), (0.5, 0.5), (0.0, -1.0)], 1);
        let mut out = [9.0; 4];

        // Playhead after the second frame
        audio.mono_window_ending_at(2.0, &mut out);
        assert_eq!(out, [0.0, 0.0, 0.5, 0.5]);
    }

    #[test]
    fn test_samples_from_clamps_past_end() {
        let audio = stereo(&[(0.1, 0.2), (0.3, 0.4)], 1);
        assert_eq!(audio.samples_from(1.0), &[0.3, 0.4]);
        assert!(audio.samples_from(10.0).is_empty());
        assert_eq!(audio.samples_from(-3.0).len(), 4);
    }

    #[test]
    fn test_wav_codec_is_compiled_in() {
        let support = codec_support();
        assert!(support.contains(&("wav", true)));
    }
}
