use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Result, VizError};

const CONFIG_DIR_NAME: &str = "scopeviz";
const CONFIG_FILE_NAME: &str = "config.json";
const MIN_FFT_SIZE: usize = 16;
const MAX_FFT_SIZE: usize = 1 << 20;
/// Upper bound on samples held per store, about six minutes at 44.1 kHz.
const MAX_BUFFER_SIZE: usize = 1 << 24;

/// Top-level configuration snapshot. Replaced wholesale on every reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub fps: u32,
    /// Oscilloscope history in milliseconds.
    pub duration_ms: f32,
    pub fft: FftConfig,
    pub window: WindowConfig,
    pub background: Color,
    pub spectra: Vec<SpectrumConfig>,
    pub oscilloscopes: Vec<OscilloscopeConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            fps: 60,
            duration_ms: 50.0,
            fft: FftConfig::default(),
            window: WindowConfig::default(),
            background: Color::BLACK,
            spectra: vec![SpectrumConfig::default()],
            oscilloscopes: Vec::new(),
        }
    }
}

impl Config {
    /// Parses and validates a snapshot from JSON text. `origin` is only used
    /// for error messages.
    pub fn from_json_str(text: &str, origin: &Path) -> Result<Self> {
        let config: Config = serde_json::from_str(text).map_err(|source| VizError::Json {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            VizError::msg(format!("failed to read config `{}`: {err}", path.display()))
        })?;
        Self::from_json_str(&text, path)
    }

    /// Number of samples every sample store holds: enough for one FFT window
    /// and for the oscilloscope history, whichever is larger.
    pub fn buffer_size(&self) -> usize {
        self.oscilloscope_samples().max(self.fft.size)
    }

    /// Samples covered by an oscilloscope trace.
    pub fn oscilloscope_samples(&self) -> usize {
        (self.duration_ms.max(0.0) * self.input.sample_rate as f32 / 1000.0) as usize
    }

    /// Width of one FFT bin in Hz.
    pub fn frequency_resolution(&self) -> f32 {
        self.input.sample_rate as f32 / self.fft.size as f32
    }

    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(VizError::invalid_config("fps must be greater than zero"));
        }
        if self.input.sample_rate == 0 {
            return Err(VizError::invalid_config("input.sample_rate must be greater than zero"));
        }
        if !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft.size)
            || !self.fft.size.is_power_of_two()
        {
            return Err(VizError::invalid_config(format!(
                "fft.size must be a power of two in {MIN_FFT_SIZE}..={MAX_FFT_SIZE}, got {}",
                self.fft.size
            )));
        }
        if !self.duration_ms.is_finite() || self.duration_ms < 0.0 {
            return Err(VizError::invalid_config("duration_ms must be a non-negative number"));
        }
        let history = f64::from(self.duration_ms) * f64::from(self.input.sample_rate) / 1000.0;
        if history > MAX_BUFFER_SIZE as f64 {
            return Err(VizError::invalid_config(format!(
                "duration_ms {} at {} Hz needs {history:.0} samples, limit is {MAX_BUFFER_SIZE}",
                self.duration_ms, self.input.sample_rate
            )));
        }

        let bins = self.fft.size / 2 + 1;
        for (index, spectrum) in self.spectra.iter().enumerate() {
            if spectrum.output_size == 0 {
                return Err(VizError::invalid_config(format!(
                    "spectra[{index}].output_size must be greater than zero"
                )));
            }
            let end = spectrum.data_offset.checked_add(spectrum.output_size);
            if end.map_or(true, |end| end > bins) {
                return Err(VizError::invalid_config(format!(
                    "spectra[{index}] reads {} bins from offset {} but fft.size {} \
                     only yields {bins}",
                    spectrum.output_size,
                    spectrum.data_offset,
                    self.fft.size
                )));
            }
            if spectrum.max_db <= spectrum.min_db {
                return Err(VizError::invalid_config(format!(
                    "spectra[{index}].max_db must be above min_db"
                )));
            }
            spectrum.top_color.validate(&format!("spectra[{index}].top_color"))?;
            spectrum.bottom_color.validate(&format!("spectra[{index}].bottom_color"))?;
        }
        for (index, scope) in self.oscilloscopes.iter().enumerate() {
            scope.color.validate(&format!("oscilloscopes[{index}].color"))?;
        }
        self.background.validate("background")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    /// Raw interleaved i16 PCM read from a file or named pipe.
    Fifo,
    /// Built-in sine generator, paced to real time.
    Tone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub source: InputSource,
    pub file: PathBuf,
    pub sample_rate: u32,
    pub stereo: bool,
    pub tone_frequency: f32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            source: InputSource::Fifo,
            file: PathBuf::from("/tmp/mpd.fifo"),
            sample_rate: 44_100,
            stereo: false,
            tone_frequency: 440.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FftConfig {
    pub size: usize,
}

impl Default for FftConfig {
    fn default() -> Self {
        Self { size: 4096 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    /// Multisample count requested from the window system.
    pub antialias: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            antialias: 4,
        }
    }
}

/// Audio channel a renderer reads from in dual-channel mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Left,
    Right,
}

/// RGBA color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub [f32; 4]);

impl Color {
    pub const BLACK: Color = Color([0.0, 0.0, 0.0, 1.0]);

    fn validate(&self, field: &str) -> Result<()> {
        if self.0.iter().all(|c| (0.0..=1.0).contains(c)) {
            Ok(())
        } else {
            Err(VizError::invalid_config(format!(
                "{field} components must lie in [0, 1], got {:?}",
                self.0
            )))
        }
    }
}

/// Placement in normalized device coordinates, origin at the bottom left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for Rect {
    fn default() -> Self {
        Self {
            x: -1.0,
            y: -1.0,
            width: 2.0,
            height: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    pub channel: Channel,
    pub position: Rect,
    /// Number of bars, one per FFT bin.
    pub output_size: usize,
    /// First FFT bin shown.
    pub data_offset: usize,
    pub min_db: f32,
    pub max_db: f32,
    /// Gain added per octave above the first shown bin, flattening pink noise.
    pub slope_db_per_octave: f32,
    /// Fraction of each bar slot that is filled.
    pub bar_width: f32,
    pub top_color: Color,
    pub bottom_color: Color,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            channel: Channel::Left,
            position: Rect::default(),
            output_size: 100,
            data_offset: 0,
            min_db: -80.0,
            max_db: 0.0,
            slope_db_per_octave: 3.0,
            bar_width: 0.75,
            top_color: Color([0.96, 0.36, 0.12, 0.9]),
            bottom_color: Color([0.12, 0.36, 0.96, 0.9]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscilloscopeConfig {
    pub channel: Channel,
    pub position: Rect,
    pub scale: f32,
    pub thickness: f32,
    pub color: Color,
}

impl Default for OscilloscopeConfig {
    fn default() -> Self {
        Self {
            channel: Channel::Left,
            position: Rect::default(),
            scale: 1.0,
            thickness: 1.0,
            color: Color([0.9, 0.9, 0.9, 1.0]),
        }
    }
}

/// Where a [`ConfigStore`] reads its snapshot from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfigOrigin {
    /// Explicit path from the command line; must exist.
    Explicit(PathBuf),
    /// Per-user default location; built-in defaults apply while it is absent.
    Default(Option<PathBuf>),
    /// Snapshot supplied in memory; reloads keep it unchanged.
    Memory,
}

/// Owner of the process-wide [`Config`] snapshot.
#[derive(Debug)]
pub struct ConfigStore {
    origin: ConfigOrigin,
    current: Config,
}

impl ConfigStore {
    /// Resolves `path` (empty selects the default location) and loads the
    /// initial snapshot.
    pub fn open(path: &str) -> Result<Self> {
        let origin = if path.is_empty() {
            ConfigOrigin::Default(default_config_path())
        } else {
            ConfigOrigin::Explicit(PathBuf::from(path))
        };
        let current = read_origin(&origin)?.unwrap_or_default();
        Ok(Self { origin, current })
    }

    /// Creates a store around an in-memory snapshot with no backing file.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            origin: ConfigOrigin::Memory,
            current: config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.current
    }

    /// The file backing the snapshot, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.origin {
            ConfigOrigin::Explicit(path) => Some(path),
            ConfigOrigin::Default(path) => path.as_deref(),
            ConfigOrigin::Memory => None,
        }
    }

    /// Replaces the snapshot from its source. The new snapshot is fully parsed
    /// and validated before the old one is dropped, so a failed reload leaves
    /// the current contents untouched.
    pub fn reload(&mut self) -> Result<&Config> {
        if let Some(next) = read_origin(&self.origin)? {
            self.current = next;
        }
        Ok(&self.current)
    }
}

fn read_origin(origin: &ConfigOrigin) -> Result<Option<Config>> {
    match origin {
        ConfigOrigin::Explicit(path) => Config::load(path).map(Some),
        ConfigOrigin::Default(Some(path)) if path.exists() => Config::load(path).map(Some),
        ConfigOrigin::Default(_) => Ok(Some(Config::default())),
        ConfigOrigin::Memory => Ok(None),
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
