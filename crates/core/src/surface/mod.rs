//! Window-system facade. The frame scheduler only talks to a [`Surface`];
//! GL contexts and real windows live behind implementations of it.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    config::{Color, Rect, WindowConfig},
    render::Canvas,
    Result, VizError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Other,
}

impl Key {
    /// The key bound to a configuration reload.
    pub fn is_reload(self) -> bool {
        matches!(self, Key::Char('r') | Key::Char('R'))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    KeyPressed(Key),
    Resized { width: u32, height: u32 },
    CloseRequested,
}

/// A window with a drawable back buffer.
pub trait Surface: Canvas {
    /// Clears the back buffer to the current clear color.
    fn clear(&mut self);

    /// Swaps the back buffer onto the screen.
    fn present(&mut self) -> Result<()>;

    /// Drains window-system events that arrived since the last call.
    fn poll_events(&mut self) -> Vec<SurfaceEvent>;

    fn should_close(&self) -> bool;

    fn request_close(&mut self);

    fn set_title(&mut self, title: &str);

    fn set_clear_color(&mut self, color: Color);

    fn set_viewport(&mut self, width: u32, height: u32);
}

/// Primitive counts for one presented frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub rects: usize,
    pub lines: usize,
}

/// Surface without a window. Draw calls are counted, events can be scripted
/// per frame, and closing is driven by a frame limit or a shared flag that
/// signal handlers may set.
#[derive(Debug)]
pub struct HeadlessSurface {
    title: String,
    viewport: (u32, u32),
    clear_color: Color,
    pending: FrameStats,
    last_frame: FrameStats,
    frames: u64,
    frame_limit: Option<u64>,
    close_requested: bool,
    close_flag: Arc<AtomicBool>,
    scripted: VecDeque<(u64, SurfaceEvent)>,
}

impl HeadlessSurface {
    pub fn open(window: &WindowConfig, title: &str) -> Result<Self> {
        if window.width == 0 || window.height == 0 {
            return Err(VizError::Surface(format!(
                "cannot create a {}x{} window",
                window.width, window.height
            )));
        }
        tracing::debug!(
            width = window.width,
            height = window.height,
            samples = window.antialias,
            "opened headless surface"
        );
        Ok(Self {
            title: title.to_string(),
            viewport: (window.width, window.height),
            clear_color: Color::BLACK,
            pending: FrameStats::default(),
            last_frame: FrameStats::default(),
            frames: 0,
            frame_limit: None,
            close_requested: false,
            close_flag: Arc::new(AtomicBool::new(false)),
            scripted: VecDeque::new(),
        })
    }

    /// Closes the surface once `frames` frames have been presented.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Delivers `event` from the first poll after `frame` frames were
    /// presented. Events must be scripted in frame order.
    pub fn script(&mut self, frame: u64, event: SurfaceEvent) {
        self.scripted.push_back((frame, event));
    }

    /// Flag that closes the surface when set, e.g. from a signal handler.
    pub fn close_flag(&self) -> Arc<AtomicBool> {
        self.close_flag.clone()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    pub fn last_frame(&self) -> FrameStats {
        self.last_frame
    }
}

impl Canvas for HeadlessSurface {
    fn fill_rect(&mut self, _rect: Rect, _top: Color, _bottom: Color) {
        self.pending.rects += 1;
    }

    fn polyline(&mut self, points: &[[f32; 2]], _color: Color, _thickness: f32) {
        if points.len() >= 2 {
            self.pending.lines += 1;
        }
    }
}

impl Surface for HeadlessSurface {
    fn clear(&mut self) {
        self.pending = FrameStats::default();
    }

    fn present(&mut self) -> Result<()> {
        self.last_frame = std::mem::take(&mut self.pending);
        self.frames += 1;
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<SurfaceEvent> {
        let mut events = Vec::new();
        while let Some((frame, _)) = self.scripted.front() {
            if *frame > self.frames {
                break;
            }
            if let Some((_, event)) = self.scripted.pop_front() {
                events.push(event);
            }
        }
        events
    }

    fn should_close(&self) -> bool {
        self.close_requested
            || self.close_flag.load(Ordering::Relaxed)
            || self.frame_limit.is_some_and(|limit| self.frames >= limit)
    }

    fn request_close(&mut self) {
        self.close_requested = true;
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> HeadlessSurface {
        HeadlessSurface::open(&WindowConfig::default(), "test").unwrap()
    }

    #[test]
    fn rejects_empty_window() {
        let window = WindowConfig {
            width: 0,
            ..WindowConfig::default()
        };
        assert!(matches!(
            HeadlessSurface::open(&window, "test"),
            Err(VizError::Surface(_))
        ));
    }

    #[test]
    fn counts_primitives_per_frame() {
        let mut surface = surface();
        surface.clear();
        surface.fill_rect(Rect::default(), Color::BLACK, Color::BLACK);
        surface.polyline(&[[0.0, 0.0], [1.0, 1.0]], Color::BLACK, 1.0);
        surface.polyline(&[[0.0, 0.0]], Color::BLACK, 1.0);
        surface.present().unwrap();

        assert_eq!(surface.last_frame(), FrameStats { rects: 1, lines: 1 });
        assert_eq!(surface.frames_presented(), 1);
    }

    #[test]
    fn scripted_events_arrive_at_their_frame() {
        let mut surface = surface();
        surface.script(0, SurfaceEvent::KeyPressed(Key::Char('r')));
        surface.script(2, SurfaceEvent::CloseRequested);

        assert_eq!(surface.poll_events().len(), 1);
        surface.present().unwrap();
        assert!(surface.poll_events().is_empty());
        surface.present().unwrap();
        assert_eq!(surface.poll_events(), vec![SurfaceEvent::CloseRequested]);
    }

    #[test]
    fn closes_on_limit_or_flag() {
        let mut surface = surface().with_frame_limit(1);
        assert!(!surface.should_close());
        surface.present().unwrap();
        assert!(surface.should_close());

        let surface = HeadlessSurface::open(&WindowConfig::default(), "test").unwrap();
        surface.close_flag().store(true, Ordering::Relaxed);
        assert!(surface.should_close());
    }

    #[test]
    fn reload_key_matches_either_case() {
        assert!(Key::Char('r').is_reload());
        assert!(Key::Char('R').is_reload());
        assert!(!Key::Char('q').is_reload());
    }
}
