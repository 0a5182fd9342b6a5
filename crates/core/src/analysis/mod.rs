use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{audio::SampleStore, config::Channel, Result};

/// Frequency-domain view of the newest `fft_size` samples of one store.
///
/// Recomputed every frame and lent out by shared reference, so every renderer
/// within a frame sees the same data and nothing holds on to it afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisContext {
    fft_size: usize,
    /// Normalized magnitude per bin; a full-scale sine peaks near 1.0.
    magnitudes: Vec<f32>,
}

impl AnalysisContext {
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Magnitude of bin `index`, 0.0 past the last bin.
    pub fn magnitude(&self, index: usize) -> f32 {
        self.magnitudes.get(index).copied().unwrap_or(0.0)
    }

    /// Bin with the largest magnitude.
    pub fn peak_bin(&self) -> Option<usize> {
        self.magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(index, _)| index)
    }
}

/// Per-frame analysis results for the active capture layout.
#[derive(Debug, Clone, Copy)]
pub enum AnalysisView<'frame> {
    Mono(&'frame AnalysisContext),
    Stereo {
        left: &'frame AnalysisContext,
        right: &'frame AnalysisContext,
    },
}

impl<'frame> AnalysisView<'frame> {
    /// Context for `channel`; single-channel mode ignores the selection.
    pub fn channel(&self, channel: Channel) -> &'frame AnalysisContext {
        match (*self, channel) {
            (Self::Mono(context), _) => context,
            (Self::Stereo { left, .. }, Channel::Left) => left,
            (Self::Stereo { right, .. }, Channel::Right) => right,
        }
    }
}

/// Windowed real FFT over the tail of a [`SampleStore`].
pub struct Analyzer {
    planner: RealFftPlanner<f32>,
    plan: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    samples: Vec<i16>,
    input: Vec<f32>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    context: AnalysisContext,
}

impl Analyzer {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::new();
        let plan = planner.plan_fft_forward(fft_size);
        let mut analyzer = Self {
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            window: hann_window(fft_size),
            samples: Vec::with_capacity(fft_size),
            context: AnalysisContext::default(),
            planner,
            plan,
        };
        analyzer.reset_context();
        analyzer
    }

    pub fn fft_size(&self) -> usize {
        self.plan.len()
    }

    /// Re-plans for a new FFT size. A no-op when the size is unchanged.
    pub fn resize(&mut self, fft_size: usize) {
        if fft_size == self.fft_size() {
            return;
        }
        self.plan = self.planner.plan_fft_forward(fft_size);
        self.scratch = self.plan.make_scratch_vec();
        self.spectrum = self.plan.make_output_vec();
        self.input = self.plan.make_input_vec();
        self.window = hann_window(fft_size);
        self.reset_context();
        tracing::debug!(fft_size, "analysis resized");
    }

    /// Analyzes the newest samples of `store`. Missing history is treated as
    /// silence preceding the available samples.
    pub fn compute(&mut self, store: &SampleStore) -> Result<&AnalysisContext> {
        let size = self.fft_size();
        store.latest(size, &mut self.samples);

        let padding = size - self.samples.len();
        self.input[..padding].fill(0.0);
        for (i, sample) in self.samples.iter().enumerate() {
            let index = padding + i;
            self.input[index] = f32::from(*sample) / f32::from(i16::MAX) * self.window[index];
        }

        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)?;

        let scale = 2.0 / size as f32;
        for (magnitude, bin) in self.context.magnitudes.iter_mut().zip(&self.spectrum) {
            *magnitude = bin.norm() * scale;
        }
        Ok(&self.context)
    }

    /// Result of the last [`Analyzer::compute`].
    pub fn context(&self) -> &AnalysisContext {
        &self.context
    }

    fn reset_context(&mut self) {
        self.context = AnalysisContext {
            fft_size: self.fft_size(),
            magnitudes: vec![0.0; self.spectrum.len()],
        };
    }
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer")
            .field("fft_size", &self.fft_size())
            .field("bins", &self.context.magnitudes.len())
            .finish()
    }
}

/// Periodic Hann window with unit gain compensation.
fn hann_window(len: usize) -> Vec<f32> {
    (0..len).map(|index| 2.0 * hann_value(index, len)).collect()
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / len as f32).cos()
}
