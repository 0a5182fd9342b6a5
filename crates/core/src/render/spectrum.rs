use crate::{
    analysis::AnalysisView,
    config::{Rect, SpectrumConfig},
    render::{next_instance, Canvas, Reconfigurable},
    Result,
};

/// Floor applied before converting magnitudes to decibels.
const MIN_MAGNITUDE: f32 = 1e-9;

/// Bar graph over a window of FFT bins.
#[derive(Debug, Clone)]
pub struct SpectrumRenderer {
    instance: u64,
    index: usize,
    config: SpectrumConfig,
    /// Normalized bar heights in `[0, 1]`, one per shown bin.
    bars: Vec<f32>,
}

impl SpectrumRenderer {
    /// Id assigned at build time; stays the same across reconfiguration.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    pub fn bars(&self) -> &[f32] {
        &self.bars
    }

    /// Recomputes bar heights from this frame's analysis.
    pub fn update_from_analysis(&mut self, analysis: &AnalysisView<'_>) {
        let context = analysis.channel(self.config.channel);
        let config = &self.config;
        let first = config.data_offset.max(1) as f32;
        let range = config.max_db - config.min_db;

        for (i, bar) in self.bars.iter_mut().enumerate() {
            let bin = config.data_offset.saturating_add(i);
            let db = 20.0 * context.magnitude(bin).max(MIN_MAGNITUDE).log10();
            let octaves = (bin.max(1) as f32 / first).log2().max(0.0);
            let corrected = db + octaves * config.slope_db_per_octave;
            *bar = ((corrected - config.min_db) / range).clamp(0.0, 1.0);
        }
    }

    pub fn draw(&self, canvas: &mut dyn Canvas) {
        let area = self.config.position;
        let slot = area.width / self.bars.len().max(1) as f32;
        let fill = slot * self.config.bar_width.clamp(0.0, 1.0);
        let inset = (slot - fill) * 0.5;

        for (i, height) in self.bars.iter().enumerate() {
            let rect = Rect {
                x: area.x + slot * i as f32 + inset,
                y: area.y,
                width: fill,
                height: area.height * height,
            };
            canvas.fill_rect(rect, self.config.top_color, self.config.bottom_color);
        }
    }
}

impl Reconfigurable for SpectrumRenderer {
    type Config = SpectrumConfig;

    fn build(config: &SpectrumConfig, index: usize) -> Result<Self> {
        let instance = next_instance();
        tracing::debug!(instance, index, bars = config.output_size, "building spectrum");
        Ok(Self {
            instance,
            index,
            config: config.clone(),
            bars: vec![0.0; config.output_size],
        })
    }

    fn configure(&mut self, config: &SpectrumConfig) -> Result<()> {
        self.bars.resize(config.output_size, 0.0);
        self.config = config.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::Analyzer, audio::SampleStore, config::Channel, render::tests::RecordingCanvas,
    };

    fn renderer(config: SpectrumConfig) -> SpectrumRenderer {
        SpectrumRenderer::build(&config, 0).unwrap()
    }

    fn tone_store(bin: usize, fft_size: usize) -> SampleStore {
        let store = SampleStore::new(fft_size);
        let samples: Vec<i16> = (0..fft_size)
            .map(|n| {
                let phase = std::f32::consts::TAU * bin as f32 * n as f32 / fft_size as f32;
                (phase.sin() * 16_000.0) as i16
            })
            .collect();
        store.write(&samples);
        store
    }

    #[test]
    fn silence_draws_empty_bars() {
        let mut spectrum = renderer(SpectrumConfig {
            output_size: 8,
            ..SpectrumConfig::default()
        });
        let mut analyzer = Analyzer::new(64);
        let context = analyzer.compute(&SampleStore::new(64)).unwrap();
        spectrum.update_from_analysis(&AnalysisView::Mono(context));

        assert!(spectrum.bars().iter().all(|h| *h == 0.0));
    }

    #[test]
    fn tone_raises_its_bar() {
        let mut spectrum = renderer(SpectrumConfig {
            output_size: 16,
            slope_db_per_octave: 0.0,
            ..SpectrumConfig::default()
        });
        let mut analyzer = Analyzer::new(128);
        let store = tone_store(5, 128);
        let context = analyzer.compute(&store).unwrap();
        spectrum.update_from_analysis(&AnalysisView::Mono(context));

        let bars = spectrum.bars();
        let loudest = bars
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(loudest, Some(5));
        assert!(bars[5] > 0.85);
    }

    #[test]
    fn offset_past_the_last_bin_reads_silence() {
        let mut spectrum = renderer(SpectrumConfig {
            data_offset: usize::MAX - 1,
            output_size: 4,
            ..SpectrumConfig::default()
        });
        let mut analyzer = Analyzer::new(128);
        let store = tone_store(5, 128);
        let context = analyzer.compute(&store).unwrap();
        spectrum.update_from_analysis(&AnalysisView::Mono(context));

        assert!(spectrum.bars().iter().all(|h| *h == 0.0));
    }

    #[test]
    fn reads_configured_channel_in_stereo() {
        let mut spectrum = renderer(SpectrumConfig {
            channel: Channel::Right,
            output_size: 16,
            ..SpectrumConfig::default()
        });
        let mut left = Analyzer::new(64);
        let mut right = Analyzer::new(64);
        let silent = SampleStore::new(64);
        let loud = tone_store(3, 64);

        let view = AnalysisView::Stereo {
            left: left.compute(&silent).unwrap(),
            right: right.compute(&loud).unwrap(),
        };
        spectrum.update_from_analysis(&view);
        assert!(spectrum.bars()[3] > 0.5);
    }

    #[test]
    fn draws_one_rect_per_bar_inside_its_area() {
        let spectrum = renderer(SpectrumConfig {
            output_size: 4,
            bar_width: 0.5,
            position: Rect {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
            },
            ..SpectrumConfig::default()
        });
        let mut canvas = RecordingCanvas::default();
        spectrum.draw(&mut canvas);

        assert_eq!(canvas.rects.len(), 4);
        assert!((canvas.rects[0].x - 0.0625).abs() < 1e-6);
        assert!((canvas.rects[0].width - 0.125).abs() < 1e-6);
        assert!(canvas.rects.iter().all(|r| r.x + r.width <= 1.0));
    }

    #[test]
    fn configure_resizes_bars_in_place() {
        let mut spectrum = renderer(SpectrumConfig::default());
        spectrum.configure(&SpectrumConfig {
            output_size: 3,
            ..SpectrumConfig::default()
        })
        .unwrap();
        assert_eq!(spectrum.index(), 0);
        assert_eq!(spectrum.bars().len(), 3);
    }
}
