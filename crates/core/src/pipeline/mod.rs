//! Wires the capture layout to sample stores, analyzers and renderers, and
//! defines the per-frame update order.

use crate::{
    analysis::{AnalysisView, Analyzer},
    audio::{AudioMode, CaptureDriver, CaptureSource, CaptureTarget, SampleStore},
    config::Config,
    render::{Canvas, OscilloscopeRenderer, RendererSet, SampleView, SpectrumRenderer},
    timeline::FrameHandler,
    Result, VizError,
};

/// Stores and analyzers for one of the two fixed pipeline shapes.
#[derive(Debug)]
enum Channels {
    Mono {
        store: SampleStore,
        analyzer: Analyzer,
    },
    Stereo {
        left: SampleStore,
        right: SampleStore,
        left_analyzer: Analyzer,
        right_analyzer: Analyzer,
    },
}

impl Channels {
    fn new(mode: AudioMode, config: &Config) -> Self {
        let size = config.buffer_size();
        match mode {
            AudioMode::Mono => Self::Mono {
                store: SampleStore::new(size),
                analyzer: Analyzer::new(config.fft.size),
            },
            AudioMode::Stereo => Self::Stereo {
                left: SampleStore::new(size),
                right: SampleStore::new(size),
                left_analyzer: Analyzer::new(config.fft.size),
                right_analyzer: Analyzer::new(config.fft.size),
            },
        }
    }

    fn target(&self) -> CaptureTarget {
        match self {
            Self::Mono { store, .. } => CaptureTarget::Mono(store.clone()),
            Self::Stereo { left, right, .. } => CaptureTarget::Stereo {
                left: left.clone(),
                right: right.clone(),
            },
        }
    }

    fn resize(&mut self, config: &Config) {
        let size = config.buffer_size();
        match self {
            Self::Mono { store, analyzer } => {
                store.resize(size);
                analyzer.resize(config.fft.size);
            }
            Self::Stereo {
                left,
                right,
                left_analyzer,
                right_analyzer,
            } => {
                left.resize(size);
                right.resize(size);
                left_analyzer.resize(config.fft.size);
                right_analyzer.resize(config.fft.size);
            }
        }
    }
}

/// Owner of everything a frame needs: stores, analyzers, live renderers and
/// the capture thread feeding the stores.
#[derive(Debug)]
pub struct Pipeline {
    mode: AudioMode,
    channels: Channels,
    renderers: RendererSet,
    capture: Option<CaptureDriver>,
}

impl Pipeline {
    /// Builds the pipeline shape for `mode` and its initial renderers, without
    /// a capture thread. Stores can be fed through [`Pipeline::stores`].
    pub fn new(mode: AudioMode, config: &Config) -> Result<Self> {
        let mut renderers = RendererSet::new();
        renderers.reconcile(config)?;
        Ok(Self {
            mode,
            channels: Channels::new(mode, config),
            renderers,
            capture: None,
        })
    }

    /// Builds the pipeline for the configured capture mode and starts
    /// capturing from `source`.
    pub fn start(config: &Config, source: Box<dyn CaptureSource>) -> Result<Self> {
        let mode = AudioMode::from_stereo(config.input.stereo);
        let mut pipeline = Self::new(mode, config)?;
        pipeline.capture = Some(CaptureDriver::start(source, pipeline.channels.target())?);
        Ok(pipeline)
    }

    pub fn mode(&self) -> AudioMode {
        self.mode
    }

    /// Handles to the sample stores: one for mono, left then right for stereo.
    pub fn stores(&self) -> Vec<SampleStore> {
        match self.channels.target() {
            CaptureTarget::Mono(store) => vec![store],
            CaptureTarget::Stereo { left, right } => vec![left, right],
        }
    }

    pub fn spectra(&self) -> &[SpectrumRenderer] {
        self.renderers.spectra()
    }

    pub fn oscilloscopes(&self) -> &[OscilloscopeRenderer] {
        self.renderers.oscilloscopes()
    }

    /// Stops the capture thread and reports how it ended.
    pub fn shutdown(mut self) -> Result<()> {
        match self.capture.take() {
            Some(driver) => driver.stop(),
            None => Ok(()),
        }
    }

    /// Fails once the capture thread has died, returning its error.
    fn check_capture(&mut self) -> Result<()> {
        let stopped = self
            .capture
            .as_ref()
            .is_some_and(|driver| !driver.is_running());
        if !stopped {
            return Ok(());
        }
        match self.capture.take() {
            Some(driver) => {
                driver.stop()?;
                Err(VizError::capture("capture thread exited"))
            }
            None => Ok(()),
        }
    }
}

impl FrameHandler for Pipeline {
    fn on_reload(&mut self, config: &Config) -> Result<()> {
        self.channels.resize(config);
        self.renderers.reconcile(config)
    }

    fn draw(&mut self, canvas: &mut dyn Canvas) -> Result<()> {
        self.check_capture()?;

        let (spectra, oscilloscopes) = self.renderers.parts_mut();
        match &mut self.channels {
            Channels::Mono { store, analyzer } => {
                let context = analyzer.compute(store)?;
                render_frame(
                    AnalysisView::Mono(context),
                    SampleView::Mono(store),
                    spectra,
                    oscilloscopes,
                    canvas,
                );
            }
            Channels::Stereo {
                left,
                right,
                left_analyzer,
                right_analyzer,
            } => {
                let analysis = AnalysisView::Stereo {
                    left: left_analyzer.compute(left)?,
                    right: right_analyzer.compute(right)?,
                };
                render_frame(
                    analysis,
                    SampleView::Stereo { left, right },
                    spectra,
                    oscilloscopes,
                    canvas,
                );
            }
        }
        Ok(())
    }
}

/// Fixed frame order: analysis is already done; oscilloscopes take their
/// samples, spectra update and draw, then oscilloscopes draw.
fn render_frame(
    analysis: AnalysisView<'_>,
    samples: SampleView<'_>,
    spectra: &mut [SpectrumRenderer],
    oscilloscopes: &mut [OscilloscopeRenderer],
    canvas: &mut dyn Canvas,
) {
    for scope in oscilloscopes.iter_mut() {
        scope.update_from_buffer(&samples);
    }
    for spectrum in spectra.iter_mut() {
        spectrum.update_from_analysis(&analysis);
        spectrum.draw(canvas);
    }
    for scope in oscilloscopes.iter() {
        scope.draw(canvas);
    }
}
