//! Renderer objects and the reconciler that keeps them aligned with the
//! active configuration.

mod oscilloscope;
mod spectrum;

pub use oscilloscope::OscilloscopeRenderer;
pub use spectrum::SpectrumRenderer;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    audio::SampleStore,
    config::{Channel, Color, Config, Rect},
    Result,
};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Process-unique id handed to every renderer when it is built.
fn next_instance() -> u64 {
    NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed)
}

/// Drawing primitives a renderer may emit. Implemented by surfaces.
pub trait Canvas {
    /// Fills `rect` with a vertical gradient from `bottom` to `top`.
    fn fill_rect(&mut self, rect: Rect, top: Color, bottom: Color);

    /// Strokes a connected line through `points` (normalized device coords).
    fn polyline(&mut self, points: &[[f32; 2]], color: Color, thickness: f32);
}

/// Renderer that can be built from a config record and its list position, and
/// later reconfigured in place.
pub trait Reconfigurable: Sized {
    type Config;

    fn build(config: &Self::Config, index: usize) -> Result<Self>;

    /// Applies a new config without rebuilding the object. Must only touch
    /// rendering parameters.
    fn configure(&mut self, config: &Self::Config) -> Result<()>;
}

/// Converges `live` to `configs` by position.
///
/// Instances at indices shared by both lists are reconfigured in place, so
/// their identity survives any config change. Missing instances are built at
/// the tail and surplus ones are dropped from the tail. Matching is purely
/// index-aligned: reordering configs moves settings between instances rather
/// than moving instances.
pub fn reconcile<R: Reconfigurable>(configs: &[R::Config], live: &mut Vec<R>) -> Result<()> {
    for (index, config) in configs.iter().enumerate() {
        match live.get_mut(index) {
            Some(renderer) => renderer.configure(config)?,
            None => live.push(R::build(config, index)?),
        }
    }
    live.truncate(configs.len());
    Ok(())
}

/// Per-frame sample inputs for the active capture layout.
#[derive(Debug, Clone, Copy)]
pub enum SampleView<'frame> {
    Mono(&'frame SampleStore),
    Stereo {
        left: &'frame SampleStore,
        right: &'frame SampleStore,
    },
}

impl<'frame> SampleView<'frame> {
    /// Store for `channel`; single-channel mode ignores the selection.
    pub fn channel(&self, channel: Channel) -> &'frame SampleStore {
        match (*self, channel) {
            (Self::Mono(store), _) => store,
            (Self::Stereo { left, .. }, Channel::Left) => left,
            (Self::Stereo { right, .. }, Channel::Right) => right,
        }
    }
}

/// Live renderers of every category, in config order.
#[derive(Debug, Default)]
pub struct RendererSet {
    spectra: Vec<SpectrumRenderer>,
    oscilloscopes: Vec<OscilloscopeRenderer>,
}

impl RendererSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the reconciler for every renderer category.
    pub fn reconcile(&mut self, config: &Config) -> Result<()> {
        reconcile(&config.spectra, &mut self.spectra)?;
        reconcile(&config.oscilloscopes, &mut self.oscilloscopes)?;

        let history = config.oscilloscope_samples();
        for scope in &mut self.oscilloscopes {
            scope.set_history(history);
        }
        tracing::debug!(
            spectra = self.spectra.len(),
            oscilloscopes = self.oscilloscopes.len(),
            "renderers reconciled"
        );
        Ok(())
    }

    pub fn spectra(&self) -> &[SpectrumRenderer] {
        &self.spectra
    }

    pub fn oscilloscopes(&self) -> &[OscilloscopeRenderer] {
        &self.oscilloscopes
    }

    pub(crate) fn parts_mut(
        &mut self,
    ) -> (&mut [SpectrumRenderer], &mut [OscilloscopeRenderer]) {
        (&mut self.spectra, &mut self.oscilloscopes)
    }
}
