//! Fixed-cadence frame loop.

mod reload;

use std::time::{Duration, Instant};

pub use reload::{ReloadHandle, ReloadTrigger};

use crate::{
    config::{Config, ConfigStore},
    render::Canvas,
    surface::{Surface, SurfaceEvent},
    Result,
};

/// Subtracted from every frame budget to absorb wake-up latency of the sleep.
pub const PACING_CORRECTION: Duration = Duration::from_micros(100);

/// Work the scheduler drives every frame.
pub trait FrameHandler {
    /// Called after a new config snapshot was loaded. Must resize sample
    /// stores and reconcile every renderer category.
    fn on_reload(&mut self, config: &Config) -> Result<()>;

    /// Analysis, renderer updates and draws for one frame.
    fn draw(&mut self, canvas: &mut dyn Canvas) -> Result<()>;
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub reloads: u64,
    /// Frames whose work outlasted their budget. No frame is ever skipped;
    /// the next one simply starts late.
    pub overruns: u64,
}

/// Single-threaded loop: reload check, draw, present, events, pacing sleep.
#[derive(Debug)]
pub struct FrameScheduler {
    trigger: ReloadTrigger,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            trigger: ReloadTrigger::new(),
        }
    }

    /// Handle for producers that request a reload (signals, key presses).
    pub fn reload_handle(&self) -> ReloadHandle {
        self.trigger.handle()
    }

    /// Runs frames until the surface asks to close. Errors from reloading,
    /// drawing or presenting end the loop immediately and are returned as is.
    pub fn run<S, H>(
        &mut self,
        config: &mut ConfigStore,
        surface: &mut S,
        handler: &mut H,
    ) -> Result<LoopStats>
    where
        S: Surface,
        H: FrameHandler,
    {
        let mut stats = LoopStats::default();
        loop {
            if self.trigger.take() {
                tracing::info!("reloading config");
                let snapshot = config.reload()?;
                surface.set_title(&window_title(snapshot));
                surface.set_clear_color(snapshot.background);
                handler.on_reload(snapshot)?;
                stats.reloads += 1;
            }

            let deadline = frame_deadline(Instant::now(), config.config().fps, PACING_CORRECTION);

            surface.clear();
            handler.draw(&mut *surface)?;
            surface.present()?;
            for event in surface.poll_events() {
                self.dispatch(event, surface);
            }

            if !sleep_until(deadline) {
                stats.overruns += 1;
            }
            stats.frames += 1;

            if surface.should_close() {
                break;
            }
        }

        tracing::info!(
            frames = stats.frames,
            reloads = stats.reloads,
            overruns = stats.overruns,
            "frame loop finished"
        );
        Ok(stats)
    }

    fn dispatch<S: Surface>(&self, event: SurfaceEvent, surface: &mut S) {
        match event {
            SurfaceEvent::KeyPressed(key) if key.is_reload() => self.trigger.handle().request(),
            SurfaceEvent::KeyPressed(_) => {}
            SurfaceEvent::Resized { width, height } => {
                tracing::debug!(width, height, "viewport resized");
                surface.set_viewport(width, height);
            }
            SurfaceEvent::CloseRequested => surface.request_close(),
        }
    }
}

/// Deadline of a frame that starts at `start`: one frame budget at `fps`
/// minus the pacing correction.
pub fn frame_deadline(start: Instant, fps: u32, correction: Duration) -> Instant {
    let budget = Duration::from_micros(1_000_000 / u64::from(fps.max(1)));
    start + budget.saturating_sub(correction)
}

/// Sleeps until `deadline`. Returns false without sleeping when the deadline
/// already passed.
fn sleep_until(deadline: Instant) -> bool {
    let now = Instant::now();
    if now >= deadline {
        return false;
    }
    std::thread::sleep(deadline - now);
    true
}

/// Window title describing what is on screen.
pub fn window_title(config: &Config) -> String {
    let mut title = String::from("scopeviz:");
    if let Some(spectrum) = config.spectra.first() {
        let resolution = config.frequency_resolution();
        title.push_str(&format!(
            " Spectrum (f_st={:.1}Hz, \u{394}f={:.1}Hz)",
            spectrum.data_offset as f32 * resolution,
            spectrum.output_size as f32 * resolution
        ));
    }
    if !config.oscilloscopes.is_empty() {
        title.push_str(&format!(" Oscilloscope (dur={}ms)", config.duration_ms));
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{OscilloscopeConfig, SpectrumConfig, WindowConfig},
        surface::{HeadlessSurface, Key},
    };

    /// Handler that records calls and can sleep or fail on demand.
    #[derive(Default)]
    struct Recorder {
        draws: u64,
        reloads: Vec<u64>,
        draw_time: Duration,
        fail_on_draw: Option<u64>,
        request_reload_on: Vec<u64>,
        handle: Option<ReloadHandle>,
    }

    impl FrameHandler for Recorder {
        fn on_reload(&mut self, _config: &Config) -> Result<()> {
            self.reloads.push(self.draws);
            Ok(())
        }

        fn draw(&mut self, _canvas: &mut dyn Canvas) -> Result<()> {
            if self.fail_on_draw == Some(self.draws) {
                return Err("draw failed".into());
            }
            if self.request_reload_on.contains(&self.draws) {
                if let Some(handle) = &self.handle {
                    handle.request();
                    handle.request();
                }
            }
            std::thread::sleep(self.draw_time);
            self.draws += 1;
            Ok(())
        }
    }

    fn setup(frames: u64, fps: u32) -> (ConfigStore, HeadlessSurface) {
        let config = Config {
            fps,
            ..Config::default()
        };
        let store = ConfigStore::from_config(config).unwrap();
        let surface = HeadlessSurface::open(&WindowConfig::default(), "test")
            .unwrap()
            .with_frame_limit(frames);
        (store, surface)
    }

    #[test]
    fn runs_until_surface_closes() {
        let (mut config, mut surface) = setup(5, 1_000);
        let mut handler = Recorder::default();

        let stats = FrameScheduler::new()
            .run(&mut config, &mut surface, &mut handler)
            .unwrap();
        assert_eq!(stats.frames, 5);
        assert_eq!(handler.draws, 5);
        assert_eq!(surface.frames_presented(), 5);
    }

    #[test]
    fn pending_reload_runs_before_the_first_draw() {
        let (mut config, mut surface) = setup(2, 1_000);
        let mut scheduler = FrameScheduler::new();
        scheduler.reload_handle().request();
        scheduler.reload_handle().request();
        let mut handler = Recorder::default();

        let stats = scheduler.run(&mut config, &mut surface, &mut handler).unwrap();
        assert_eq!(stats.reloads, 1);
        assert_eq!(handler.reloads, vec![0]);
    }

    #[test]
    fn request_during_a_frame_reloads_on_the_next() {
        let (mut config, mut surface) = setup(4, 1_000);
        let mut scheduler = FrameScheduler::new();
        let mut handler = Recorder {
            request_reload_on: vec![1],
            handle: Some(scheduler.reload_handle()),
            ..Recorder::default()
        };

        let stats = scheduler.run(&mut config, &mut surface, &mut handler).unwrap();
        assert_eq!(stats.reloads, 1);
        // Requested while drawing frame 1, so reloaded before frame 2 draws.
        assert_eq!(handler.reloads, vec![2]);
    }

    #[test]
    fn reload_key_and_events_are_dispatched() {
        let (mut config, mut surface) = setup(10, 1_000);
        surface.script(1, SurfaceEvent::KeyPressed(Key::Char('r')));
        surface.script(1, SurfaceEvent::Resized { width: 640, height: 480 });
        surface.script(3, SurfaceEvent::CloseRequested);
        let mut handler = Recorder::default();

        let stats = FrameScheduler::new()
            .run(&mut config, &mut surface, &mut handler)
            .unwrap();
        assert_eq!(stats.frames, 3);
        assert_eq!(handler.reloads, vec![1]);
        assert_eq!(surface.viewport(), (640, 480));
    }

    #[test]
    fn reload_updates_title_and_clear_color() {
        let (mut config, mut surface) = setup(1, 1_000);
        let mut scheduler = FrameScheduler::new();
        scheduler.reload_handle().request();

        scheduler
            .run(&mut config, &mut surface, &mut Recorder::default())
            .unwrap();
        assert_eq!(surface.title(), window_title(config.config()));
        assert_eq!(surface.clear_color(), config.config().background);
    }

    #[test]
    fn draw_errors_end_the_loop() {
        let (mut config, mut surface) = setup(10, 1_000);
        let mut handler = Recorder {
            fail_on_draw: Some(2),
            ..Recorder::default()
        };

        let err = FrameScheduler::new()
            .run(&mut config, &mut surface, &mut handler)
            .unwrap_err();
        assert!(format!("{err}").contains("draw failed"));
        assert_eq!(surface.frames_presented(), 2);
    }

    #[test]
    fn cheap_frames_are_paced_to_the_budget() {
        let frames = 20;
        let (mut config, mut surface) = setup(frames, 100);
        let mut handler = Recorder {
            draw_time: Duration::from_millis(1),
            ..Recorder::default()
        };

        let started = Instant::now();
        let stats = FrameScheduler::new()
            .run(&mut config, &mut surface, &mut handler)
            .unwrap();
        let period = started.elapsed() / frames as u32;

        assert_eq!(stats.frames, frames);
        assert!(period >= Duration::from_micros(9_800), "period {period:?}");
        assert!(period < Duration::from_millis(15), "period {period:?}");
    }

    #[test]
    fn slow_frames_are_never_skipped() {
        let frames = 5;
        let (mut config, mut surface) = setup(frames, 200);
        let mut handler = Recorder {
            draw_time: Duration::from_millis(12),
            ..Recorder::default()
        };

        let started = Instant::now();
        let stats = FrameScheduler::new()
            .run(&mut config, &mut surface, &mut handler)
            .unwrap();

        assert_eq!(stats.frames, frames);
        assert_eq!(stats.overruns, frames);
        assert!(started.elapsed() >= Duration::from_millis(12) * frames as u32);
    }

    #[test]
    fn deadline_subtracts_correction() {
        let start = Instant::now();
        let deadline = frame_deadline(start, 60, PACING_CORRECTION);
        assert_eq!(deadline - start, Duration::from_micros(16_666 - 100));
    }

    #[test]
    fn title_lists_visible_renderers() {
        let mut config = Config {
            spectra: vec![SpectrumConfig {
                data_offset: 2,
                output_size: 10,
                ..SpectrumConfig::default()
            }],
            oscilloscopes: vec![OscilloscopeConfig::default()],
            ..Config::default()
        };
        config.input.sample_rate = 4096;
        config.fft.size = 4096;

        assert_eq!(
            window_title(&config),
            "scopeviz: Spectrum (f_st=2.0Hz, \u{394}f=10.0Hz) Oscilloscope (dur=50ms)"
        );

        config.spectra.clear();
        config.oscilloscopes.clear();
        assert_eq!(window_title(&config), "scopeviz:");
    }
}
