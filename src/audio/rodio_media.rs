use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::error::{ErrorKind, MediaError, MediaResult, SamplerError, SamplerResult};
use super::loader::{AssetLoader, DecodedAudio, LoaderMessage, LoaderUpdate};
use super::media::{is_known_duration, MediaElement, MediaEvent, SignalTap};

/// Minimum playhead movement between two `TimeUpdate` events.
const TIME_UPDATE_INTERVAL: f64 = 1.0 / 60.0;

/// Wall-clock playback position.
#[derive(Debug, Default)]
pub struct Playhead {
    offset: Cell<f64>,
    started: Cell<Option<Instant>>,
}

impl Playhead {
    pub fn position(&self) -> f64 {
        let running = self
            .started
            .get()
            .map_or(0.0, |start| start.elapsed().as_secs_f64());
        self.offset.get() + running
    }

    pub fn is_running(&self) -> bool {
        self.started.get().is_some()
    }

    pub fn start(&self) {
        if self.started.get().is_none() {
            self.started.set(Some(Instant::now()));
        }
    }

    pub fn stop(&self) {
        self.offset.set(self.position());
        self.started.set(None);
    }

    pub fn set(&self, seconds: f64) {
        self.offset.set(seconds);
        if self.started.get().is_some() {
            self.started.set(Some(Instant::now()));
        }
    }
}

type SharedAudio = Rc<RefCell<Option<Arc<DecodedAudio>>>>;

/// Media element backed by a symphonia loader thread and a rodio sink.
///
/// The asset is decoded fully into memory; the output device is opened
/// lazily on the first `play()` so constructing a player never touches it.
pub struct RodioMediaElement {
    path: PathBuf,
    generation: u64,
    updates_tx: Sender<LoaderUpdate>,
    updates_rx: Receiver<LoaderUpdate>,
    abort: Arc<AtomicBool>,
    pending: VecDeque<MediaEvent>,

    audio: SharedAudio,
    declared_duration: Option<f64>,
    playhead: Rc<Playhead>,
    last_reported: f64,

    sink: Option<Sink>,
    output: Option<(OutputStream, OutputStreamHandle)>,
    wants_play: bool,
    tapped: bool,
}

impl RodioMediaElement {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (updates_tx, updates_rx) = crossbeam_channel::unbounded();

        Self {
            path: path.into(),
            generation: 0,
            updates_tx,
            updates_rx,
            abort: Arc::new(AtomicBool::new(false)),
            pending: VecDeque::new(),
            audio: Rc::new(RefCell::new(None)),
            declared_duration: None,
            playhead: Rc::new(Playhead::default()),
            last_reported: 0.0,
            sink: None,
            output: None,
            wants_play: false,
            tapped: false,
        }
    }

    fn decoded(&self) -> Option<Arc<DecodedAudio>> {
        self.audio.borrow().clone()
    }

    fn ensure_output(&mut self) -> MediaResult<&OutputStreamHandle> {
        if self.output.is_none() {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| MediaError::blocked(format!("no audio output: {e}")))?;
            info!("Opened audio output for {:?}", self.path);
            self.output = Some((stream, handle));
        }

        match &self.output {
            Some((_, handle)) => Ok(handle),
            None => Err(MediaError::blocked("audio output unavailable")),
        }
    }

    /// Start the sink at the playhead, reusing a paused sink when possible.
    fn start_output(&mut self) -> MediaResult<()> {
        let Some(audio) = self.decoded() else {
            self.wants_play = true;
            return Ok(());
        };

        if let Some(sink) = &self.sink {
            if sink.is_paused() && !sink.empty() {
                sink.play();
                self.playhead.start();
                self.wants_play = false;
                return Ok(());
            }
        }

        let position = self.playhead.position();
        let handle = self.ensure_output()?;
        let sink = Sink::try_new(handle)
            .map_err(|e| MediaError::blocked(format!("failed to open sink: {e}")))?;
        sink.append(SamplesBuffer::new(
            audio.channels,
            audio.sample_rate,
            audio.samples_from(position).to_vec(),
        ));
        sink.play();

        self.sink = Some(sink);
        self.playhead.start();
        self.wants_play = false;
        Ok(())
    }

    fn drain_loader(&mut self) {
        while let Ok(update) = self.updates_rx.try_recv() {
            if update.generation != self.generation {
                debug!("Dropping stale loader message from load {}", update.generation);
                continue;
            }

            match update.message {
                LoaderMessage::Started => self.pending.push_back(MediaEvent::LoadStart),
                LoaderMessage::Metadata { duration } => {
                    self.declared_duration = duration;
                    self.pending.push_back(MediaEvent::LoadedMetadata);
                }
                LoaderMessage::Progress { buffered } => {
                    self.pending.push_back(MediaEvent::Progress { buffered });
                }
                LoaderMessage::Decoded(audio) => {
                    let buffered = audio.duration();
                    *self.audio.borrow_mut() = Some(Arc::new(audio));
                    self.pending.extend([
                        MediaEvent::Progress { buffered },
                        MediaEvent::LoadedData,
                        MediaEvent::CanPlay,
                        MediaEvent::CanPlayThrough,
                    ]);

                    if self.wants_play {
                        if let Err(err) = self.start_output() {
                            self.pending.push_back(MediaEvent::Error(err));
                        }
                    }
                }
                LoaderMessage::Failed(err) => self.pending.push_back(MediaEvent::Error(err)),
            }
        }
    }

    fn observe_playhead(&mut self) {
        if !self.playhead.is_running() {
            return;
        }

        let position = self.playhead.position();
        let duration = self.duration();
        if is_known_duration(duration) && position >= duration {
            self.sink = None;
            self.playhead.stop();
            self.playhead.set(duration);
            self.last_reported = duration;
            self.pending.extend([MediaEvent::TimeUpdate, MediaEvent::Ended]);
            return;
        }

        if (position - self.last_reported).abs() >= TIME_UPDATE_INTERVAL {
            self.last_reported = position;
            self.pending.push_back(MediaEvent::TimeUpdate);
        }
    }
}

impl MediaElement for RodioMediaElement {
    fn load(&mut self) {
        self.abort.store(true, Ordering::Relaxed);
        self.abort = Arc::new(AtomicBool::new(false));
        self.generation += 1;

        self.pending.clear();
        self.sink = None;
        self.wants_play = false;
        self.declared_duration = None;
        *self.audio.borrow_mut() = None;
        self.playhead.stop();
        self.playhead.set(0.0);
        self.last_reported = 0.0;

        let loader = AssetLoader::new(
            self.path.clone(),
            self.generation,
            self.updates_tx.clone(),
            Arc::clone(&self.abort),
        );
        if let Err(e) = loader.spawn() {
            warn!("Failed to start loader for {:?}: {}", self.path, e);
            self.pending.push_back(MediaEvent::Error(MediaError::new(
                ErrorKind::LoadAborted,
                e.to_string(),
            )));
        }
    }

    fn abort(&mut self) {
        self.abort.store(true, Ordering::Relaxed);
        self.wants_play = false;
        self.sink = None;
        self.output = None;
        self.playhead.stop();
        self.pending.clear();
    }

    fn play(&mut self) -> MediaResult<()> {
        self.ensure_output()?;
        self.start_output()
    }

    fn pause(&mut self) {
        self.wants_play = false;
        if let Some(sink) = &self.sink {
            sink.pause();
        }
        self.playhead.stop();
    }

    fn seek(&mut self, seconds: f64) -> MediaResult<()> {
        let duration = self.duration();
        let target = if is_known_duration(duration) {
            seconds.clamp(0.0, duration)
        } else {
            seconds.max(0.0)
        };

        self.playhead.set(target);
        self.last_reported = target;

        // A sink only plays forward, so any seek rebuilds it from the new offset
        let was_playing = self.sink.is_some() && self.playhead.is_running();
        self.sink = None;
        if was_playing {
            self.playhead.stop();
            self.start_output()?;
        }
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.playhead.position()
    }

    fn duration(&self) -> f64 {
        if let Some(audio) = self.audio.borrow().as_ref() {
            return audio.duration();
        }
        self.declared_duration.unwrap_or(f64::NAN)
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        if self.pending.is_empty() {
            self.drain_loader();
            self.observe_playhead();
        }
        self.pending.pop_front()
    }

    fn signal_tap(&mut self) -> SamplerResult<Box<dyn SignalTap>> {
        if self.tapped {
            return Err(SamplerError::AlreadyConnected);
        }
        self.tapped = true;

        Ok(Box::new(RodioSignalTap {
            audio: Rc::clone(&self.audio),
            playhead: Rc::clone(&self.playhead),
        }))
    }
}

impl Drop for RodioMediaElement {
    fn drop(&mut self) {
        self.abort.store(true, Ordering::Relaxed);
    }
}

struct RodioSignalTap {
    audio: SharedAudio,
    playhead: Rc<Playhead>,
}

impl SignalTap for RodioSignalTap {
    fn read_window(&self, out: &mut [f32]) -> bool {
        let audio = self.audio.borrow();
        match audio.as_ref() {
            Some(audio) if self.playhead.is_running() => {
                audio.mono_window_ending_at(self.playhead.position(), out);
                true
            }
            _ => {
                out.fill(0.0);
                false
            }
        }
    }
}
