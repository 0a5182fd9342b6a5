use std::{
    f32::consts::TAU,
    fs::File,
    io::{BufReader, ErrorKind, Read},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use crate::{
    config::{InputConfig, InputSource},
    Result, VizError,
};

/// Frames read from a source per capture iteration. Must stay even so that
/// stereo blocks split cleanly.
pub const BLOCK_SIZE: usize = 220;

/// Blocking producer of PCM blocks driven by the capture thread.
///
/// Both reads block until exactly one block is filled. A returned error is
/// fatal to the capture thread.
pub trait CaptureSource: Send {
    /// Frames delivered by every read.
    fn block_size(&self) -> usize;

    fn read(&mut self, block: &mut [i16]) -> Result<()>;

    fn read_stereo(&mut self, left: &mut [i16], right: &mut [i16]) -> Result<()>;
}

/// Builds the source selected by the configuration.
pub fn open_source(input: &InputConfig) -> Result<Box<dyn CaptureSource>> {
    match input.source {
        InputSource::Fifo => Ok(Box::new(FifoSource::open(&input.file, BLOCK_SIZE)?)),
        InputSource::Tone => Ok(Box::new(ToneSource::new(
            input.tone_frequency,
            input.sample_rate,
            BLOCK_SIZE,
        ))),
    }
}

/// Interleaved little-endian i16 PCM from a file or named pipe, e.g. an MPD
/// FIFO output.
#[derive(Debug)]
pub struct FifoSource {
    path: PathBuf,
    reader: BufReader<File>,
    block_size: usize,
    raw: Vec<u8>,
}

impl FifoSource {
    /// Opening a FIFO blocks until a writer connects.
    pub fn open(path: &Path, block_size: usize) -> Result<Self> {
        let file = File::open(path).map_err(|err| {
            VizError::capture(format!("cannot open `{}`: {err}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), block_size, "opened fifo source");
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            block_size,
            raw: Vec::new(),
        })
    }

    fn fill(&mut self, samples: usize) -> Result<()> {
        self.raw.resize(samples * 2, 0);
        self.reader.read_exact(&mut self.raw).map_err(|err| match err.kind() {
            ErrorKind::UnexpectedEof => {
                VizError::capture(format!("source `{}` closed", self.path.display()))
            }
            _ => VizError::capture(format!("reading `{}`: {err}", self.path.display())),
        })
    }

    fn decoded(&self) -> impl Iterator<Item = i16> + '_ {
        self.raw
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }
}

impl CaptureSource for FifoSource {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read(&mut self, block: &mut [i16]) -> Result<()> {
        self.fill(block.len())?;
        for (slot, sample) in block.iter_mut().zip(self.decoded()) {
            *slot = sample;
        }
        Ok(())
    }

    fn read_stereo(&mut self, left: &mut [i16], right: &mut [i16]) -> Result<()> {
        let frames = left.len().min(right.len());
        self.fill(frames * 2)?;
        let mut decoded = self.decoded();
        for i in 0..frames {
            left[i] = decoded.next().unwrap_or_default();
            right[i] = decoded.next().unwrap_or_default();
        }
        Ok(())
    }
}

/// Sine generator that sleeps one block duration per read so that it feeds
/// the store at the same rate a real device would.
#[derive(Debug)]
pub struct ToneSource {
    frequency: f32,
    sample_rate: u32,
    block_size: usize,
    phase: f32,
    amplitude: f32,
    paced: bool,
    next_block: Option<Instant>,
}

impl ToneSource {
    pub fn new(frequency: f32, sample_rate: u32, block_size: usize) -> Self {
        Self {
            frequency,
            sample_rate: sample_rate.max(1),
            block_size,
            phase: 0.0,
            amplitude: 0.5,
            paced: true,
            next_block: None,
        }
    }

    /// Disables real-time pacing; reads return as fast as they are called.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / f64::from(self.sample_rate))
    }

    fn pace(&mut self) {
        if !self.paced {
            return;
        }
        let now = Instant::now();
        let deadline = self.next_block.unwrap_or(now) + self.block_duration();
        std::thread::sleep(deadline.saturating_duration_since(now));
        self.next_block = Some(deadline);
    }

    fn next_phase(&mut self) -> f32 {
        let phase = self.phase;
        self.phase = (self.phase + TAU * self.frequency / self.sample_rate as f32) % TAU;
        phase
    }

    fn level(&self, value: f32) -> i16 {
        (value * self.amplitude * f32::from(i16::MAX)) as i16
    }
}

impl CaptureSource for ToneSource {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read(&mut self, block: &mut [i16]) -> Result<()> {
        self.pace();
        for slot in block.iter_mut() {
            let phase = self.next_phase();
            *slot = self.level(phase.sin());
        }
        Ok(())
    }

    fn read_stereo(&mut self, left: &mut [i16], right: &mut [i16]) -> Result<()> {
        self.pace();
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let phase = self.next_phase();
            *l = self.level(phase.sin());
            *r = self.level(phase.cos());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm_file(name: &str, samples: &[i16]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("scopeviz-{name}-{}.pcm", std::process::id()));
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn fifo_reads_mono_blocks_until_closed() {
        let path = pcm_file("mono", &[1, -2, 3, -4]);
        let mut source = FifoSource::open(&path, 2).unwrap();
        let mut block = [0_i16; 2];

        source.read(&mut block).unwrap();
        assert_eq!(block, [1, -2]);
        source.read(&mut block).unwrap();
        assert_eq!(block, [3, -4]);

        let err = source.read(&mut block).unwrap_err();
        assert!(format!("{err}").contains("closed"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn fifo_deinterleaves_stereo_frames() {
        let path = pcm_file("stereo", &[1, 10, 2, 20, 3, 30]);
        let mut source = FifoSource::open(&path, 3).unwrap();
        let (mut left, mut right) = ([0_i16; 3], [0_i16; 3]);

        source.read_stereo(&mut left, &mut right).unwrap();
        assert_eq!(left, [1, 2, 3]);
        assert_eq!(right, [10, 20, 30]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_fifo_is_a_capture_error() {
        let err = FifoSource::open(Path::new("/no/such/fifo"), BLOCK_SIZE).unwrap_err();
        assert!(matches!(err, VizError::Capture(_)));
    }

    #[test]
    fn tone_stays_within_amplitude() {
        let mut source = ToneSource::new(1_000.0, 48_000, 64).unpaced().with_amplitude(0.25);
        let mut block = [0_i16; 64];
        source.read(&mut block).unwrap();

        let limit = (0.25 * f32::from(i16::MAX)) as i16 + 1;
        assert!(block.iter().all(|s| s.abs() <= limit));
        assert!(block.iter().any(|&s| s != 0));
    }

    #[test]
    fn paced_tone_takes_a_block_duration() {
        // 480 frames at 48 kHz is 10 ms per block.
        let mut source = ToneSource::new(440.0, 48_000, 480);
        let mut block = [0_i16; 480];
        let started = Instant::now();
        for _ in 0..3 {
            source.read(&mut block).unwrap();
        }
        assert!(started.elapsed() >= Duration::from_millis(25));
    }
}
