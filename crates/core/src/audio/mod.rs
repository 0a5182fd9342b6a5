//! Audio capture: the shared sample ring, the sources that fill it, and the
//! background driver connecting the two.

mod source;
mod store;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

pub use source::{open_source, CaptureSource, FifoSource, ToneSource, BLOCK_SIZE};
pub use store::SampleStore;

use crate::{Result, VizError};

/// Capture layout selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    /// One store fed from a single channel.
    Mono,
    /// Separate left and right stores fed from interleaved frames.
    Stereo,
}

impl AudioMode {
    pub fn from_stereo(stereo: bool) -> Self {
        if stereo {
            Self::Stereo
        } else {
            Self::Mono
        }
    }
}

/// Stores a [`CaptureDriver`] writes into.
#[derive(Debug, Clone)]
pub enum CaptureTarget {
    Mono(SampleStore),
    Stereo {
        left: SampleStore,
        right: SampleStore,
    },
}

impl CaptureTarget {
    pub fn mode(&self) -> AudioMode {
        match self {
            Self::Mono(_) => AudioMode::Mono,
            Self::Stereo { .. } => AudioMode::Stereo,
        }
    }
}

/// Background thread that pulls blocks from a [`CaptureSource`] into the
/// target stores until stopped.
///
/// Cancellation is cooperative: the stop flag is checked once per block, so
/// [`CaptureDriver::stop`] returns after at most one in-flight read. There is
/// no backpressure; a slow reader simply sees overwritten samples.
#[derive(Debug)]
pub struct CaptureDriver {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl CaptureDriver {
    pub fn start(source: Box<dyn CaptureSource>, target: CaptureTarget) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let mode = target.mode();

        let handle = thread::Builder::new()
            .name("scopeviz-capture".to_string())
            .spawn(move || {
                let outcome = capture_loop(source, &target, &flag);
                flag.store(false, Ordering::Release);
                if let Err(err) = &outcome {
                    tracing::error!(error = %err, "capture thread stopped");
                }
                outcome
            })?;

        tracing::info!(?mode, "capture started");
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// False once the thread has exited, either because of a stop request or
    /// because the source failed.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self
                .handle
                .as_ref()
                .map(|handle| !handle.is_finished())
                .unwrap_or(false)
    }

    /// Requests termination, waits for the thread to exit and returns the
    /// source failure that ended it, if any.
    pub fn stop(mut self) -> Result<()> {
        self.join()
    }

    fn join(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let outcome = handle
            .join()
            .map_err(|_| VizError::capture("capture thread panicked"))?;
        tracing::info!("capture stopped");
        outcome
    }
}

impl Drop for CaptureDriver {
    fn drop(&mut self) {
        let _ = self.join();
    }
}

fn capture_loop(
    mut source: Box<dyn CaptureSource>,
    target: &CaptureTarget,
    running: &AtomicBool,
) -> Result<()> {
    let block_size = source.block_size();
    let mut left = vec![0_i16; block_size];
    let mut right = vec![0_i16; block_size];

    while running.load(Ordering::Acquire) {
        match target {
            CaptureTarget::Mono(store) => {
                source.read(&mut left)?;
                store.write(&left);
            }
            CaptureTarget::Stereo {
                left: left_store,
                right: right_store,
            } => {
                source.read_stereo(&mut left, &mut right)?;
                left_store.write(&left);
                right_store.write(&right);
            }
        }
    }
    Ok(())
}
