//! Core library for the scopeviz audio visualiser.
//!
//! A background capture thread fills shared sample stores; a single-threaded
//! frame loop analyzes them, drives spectrum and oscilloscope renderers at a
//! fixed cadence, and reloads the configuration on request. Windowing and GL
//! are kept behind the [`Surface`] and [`Canvas`] traits.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod surface;
pub mod timeline;

pub use analysis::{AnalysisContext, AnalysisView, Analyzer};
pub use audio::{
    open_source, AudioMode, CaptureDriver, CaptureSource, CaptureTarget, FifoSource, SampleStore,
    ToneSource,
};
pub use config::{Config, ConfigStore};
pub use error::{Result, VizError};
pub use pipeline::Pipeline;
pub use render::{
    reconcile, Canvas, OscilloscopeRenderer, Reconfigurable, RendererSet, SpectrumRenderer,
};
pub use surface::{HeadlessSurface, Key, Surface, SurfaceEvent};
pub use timeline::{
    window_title, FrameHandler, FrameScheduler, LoopStats, ReloadHandle, ReloadTrigger,
};
