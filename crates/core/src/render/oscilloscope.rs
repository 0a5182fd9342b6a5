use crate::{
    config::OscilloscopeConfig,
    render::{next_instance, Canvas, Reconfigurable, SampleView},
    Result,
};

/// Time-domain trace of the newest samples of one channel.
#[derive(Debug, Clone)]
pub struct OscilloscopeRenderer {
    instance: u64,
    index: usize,
    config: OscilloscopeConfig,
    /// Samples shown per trace; 0 shows the whole store.
    history: usize,
    samples: Vec<i16>,
    vertices: Vec<[f32; 2]>,
}

impl OscilloscopeRenderer {
    /// Id assigned at build time; stays the same across reconfiguration.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn config(&self) -> &OscilloscopeConfig {
        &self.config
    }

    pub fn vertices(&self) -> &[[f32; 2]] {
        &self.vertices
    }

    pub(crate) fn set_history(&mut self, samples: usize) {
        self.history = samples;
    }

    /// Copies the configured channel's newest samples into trace vertices.
    pub fn update_from_buffer(&mut self, samples: &SampleView<'_>) {
        let store = samples.channel(self.config.channel);
        if self.history == 0 {
            store.snapshot(&mut self.samples);
        } else {
            store.latest(self.history, &mut self.samples);
        }

        let area = self.config.position;
        let center = area.y + area.height * 0.5;
        let half = area.height * 0.5;
        let step = if self.samples.len() > 1 {
            area.width / (self.samples.len() - 1) as f32
        } else {
            0.0
        };

        self.vertices.clear();
        self.vertices.extend(self.samples.iter().enumerate().map(|(i, sample)| {
            let level = (f32::from(*sample) / f32::from(i16::MAX) * self.config.scale)
                .clamp(-1.0, 1.0);
            [area.x + step * i as f32, center + level * half]
        }));
    }

    pub fn draw(&self, canvas: &mut dyn Canvas) {
        if self.vertices.len() < 2 {
            return;
        }
        canvas.polyline(&self.vertices, self.config.color, self.config.thickness);
    }
}

impl Reconfigurable for OscilloscopeRenderer {
    type Config = OscilloscopeConfig;

    fn build(config: &OscilloscopeConfig, index: usize) -> Result<Self> {
        let instance = next_instance();
        tracing::debug!(instance, index, channel = ?config.channel, "building oscilloscope");
        Ok(Self {
            instance,
            index,
            config: config.clone(),
            history: 0,
            samples: Vec::new(),
            vertices: Vec::new(),
        })
    }

    fn configure(&mut self, config: &OscilloscopeConfig) -> Result<()> {
        self.config = config.clone();
        Ok(())
    }
}
