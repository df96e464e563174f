use async_trait::async_trait;
use log::{debug, info, warn};

use super::error::{ErrorKind, SamplerError, SamplerResult};
use super::fft::FftAnalyser;
use super::media::{MediaElement, SignalTap};
use super::FrequencySnapshot;

/// Transform size of the analyser. Tuned for the 60-bar waveform's density.
pub const FFT_SIZE: usize = 128;
/// Smoothing time constant applied between successive reads.
pub const SMOOTHING: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// Frequency analysis node created by an [`AnalysisContext`].
pub trait Analyser {
    fn frequency_bin_count(&self) -> usize;

    fn frequency_data(&mut self, out: &mut [f32]) -> SamplerResult<()>;
}

impl Analyser for FftAnalyser {
    fn frequency_bin_count(&self) -> usize {
        FftAnalyser::frequency_bin_count(self)
    }

    fn frequency_data(&mut self, out: &mut [f32]) -> SamplerResult<()> {
        FftAnalyser::frequency_data(self, out)
    }
}

/// Per-player audio processing context.
///
/// Contexts start suspended and must be resumed from a user-initiated
/// path before analysis data flows.
#[async_trait(?Send)]
pub trait AnalysisContext {
    fn state(&self) -> ContextState;

    async fn resume(&mut self) -> SamplerResult<()>;

    fn create_analyser(
        &mut self,
        tap: Box<dyn SignalTap>,
        fft_size: usize,
        smoothing: f32,
    ) -> SamplerResult<Box<dyn Analyser>>;

    fn close(&mut self);
}

/// Builds a fresh context the first time a player needs one.
pub type ContextFactory = Box<dyn Fn() -> SamplerResult<Box<dyn AnalysisContext>>>;

/// In-process context running analysers on the CPU.
#[derive(Debug)]
pub struct FftContext {
    state: ContextState,
}

impl FftContext {
    pub fn new() -> Self {
        Self {
            state: ContextState::Suspended,
        }
    }

    pub fn factory() -> ContextFactory {
        Box::new(|| Ok(Box::new(FftContext::new()) as Box<dyn AnalysisContext>))
    }
}

impl Default for FftContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl AnalysisContext for FftContext {
    fn state(&self) -> ContextState {
        self.state
    }

    async fn resume(&mut self) -> SamplerResult<()> {
        match self.state {
            ContextState::Closed => Err(SamplerError::ContextClosed),
            _ => {
                self.state = ContextState::Running;
                Ok(())
            }
        }
    }

    fn create_analyser(
        &mut self,
        tap: Box<dyn SignalTap>,
        fft_size: usize,
        smoothing: f32,
    ) -> SamplerResult<Box<dyn Analyser>> {
        if self.state == ContextState::Closed {
            return Err(SamplerError::ContextClosed);
        }
        Ok(Box::new(FftAnalyser::new(tap, fft_size, smoothing)))
    }

    fn close(&mut self) {
        self.state = ContextState::Closed;
    }
}

/// Produces normalized magnitude spectra of one player's audio.
///
/// The analysis graph is built lazily on the first `initialize` call and
/// never retried; any failure leaves the sampler degraded, in which case
/// `sample` keeps returning empty snapshots and the waveform falls back to
/// synthetic motion.
pub struct FrequencySampler {
    factory: ContextFactory,
    context: Option<Box<dyn AnalysisContext>>,
    analyser: Option<Box<dyn Analyser>>,
    attempted: bool,
    failure: Option<SamplerError>,
    bins: Vec<f32>,
}

impl FrequencySampler {
    pub fn new(factory: ContextFactory) -> Self {
        Self {
            factory,
            context: None,
            analyser: None,
            attempted: false,
            failure: None,
            bins: Vec::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.attempted
    }

    pub fn is_connected(&self) -> bool {
        self.analyser.is_some()
    }

    pub fn failure(&self) -> Option<ErrorKind> {
        self.failure.as_ref().map(SamplerError::kind)
    }

    pub fn context_state(&self) -> Option<ContextState> {
        self.context.as_ref().map(|ctx| ctx.state())
    }

    /// Build the analysis graph for `media`. Runs once; later calls are no-ops.
    pub async fn initialize(&mut self, media: &mut dyn MediaElement) {
        if self.attempted {
            return;
        }
        self.attempted = true;

        match self.connect(media).await {
            Ok(()) => info!("Analysis graph connected ({} bins)", self.bins.len()),
            Err(err) => self.degrade(err),
        }
    }

    async fn connect(&mut self, media: &mut dyn MediaElement) -> SamplerResult<()> {
        let mut context = (self.factory)()?;
        if context.state() == ContextState::Suspended {
            context.resume().await?;
        }

        let tap = media.signal_tap()?;
        let analyser = context.create_analyser(tap, FFT_SIZE, SMOOTHING)?;

        self.bins = vec![0.0; analyser.frequency_bin_count()];
        self.analyser = Some(analyser);
        self.context = Some(context);
        Ok(())
    }

    /// Resume a suspended context. Rejections are logged, not propagated.
    pub async fn resume(&mut self) {
        let Some(context) = self.context.as_mut() else {
            return;
        };
        if context.state() != ContextState::Suspended {
            return;
        }

        match context.resume().await {
            Ok(()) => debug!("Analysis context resumed"),
            Err(err) => warn!("Analysis context refused to resume: {}", err),
        }
    }

    /// Latest spectrum, or an empty snapshot when there is nothing real to show.
    pub fn sample(&mut self, playing: bool) -> FrequencySnapshot {
        if !playing {
            return FrequencySnapshot::empty();
        }
        let Some(analyser) = self.analyser.as_mut() else {
            return FrequencySnapshot::empty();
        };

        match analyser.frequency_data(&mut self.bins) {
            Ok(()) => FrequencySnapshot::new(self.bins.clone()),
            Err(err) => {
                self.degrade(err);
                FrequencySnapshot::empty()
            }
        }
    }

    pub fn close(&mut self) {
        self.analyser = None;
        if let Some(mut context) = self.context.take() {
            context.close();
            debug!("Analysis context closed");
        }
    }

    fn degrade(&mut self, err: SamplerError) {
        warn!("Falling back to synthetic waveform: {}", err);
        self.analyser = None;
        if let Some(mut context) = self.context.take() {
            context.close();
        }
        self.failure = Some(err);
    }
}
