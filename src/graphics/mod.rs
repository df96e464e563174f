pub mod canvas;
pub mod engine;
pub mod frames;
pub mod waveform;

pub use canvas::{paint, Canvas, EguiCanvas};
pub use engine::{FrameTarget, GraphicsEngine};
pub use frames::{AnimationFrames, FrameId, FrameScheduler};
pub use waveform::{compute_frame, RenderFrame, Theme, WaveformRenderer};
