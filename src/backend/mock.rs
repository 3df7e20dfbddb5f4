//! In-memory desktop for tests
//!
//! `MockDesktop` implements the window, input and capture traits over one
//! shared state, so moving the pointer through [`InputBackend`] is visible
//! through [`WindowBackend::pointer_position`] and focusing a window flips
//! the `active` flags reported by `list_windows`.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};

use super::{Capabilities, Point, ScreenSize, WindowBackend};
use crate::core::window::{Geometry, PlatformWindowId, WindowHandle};
use crate::input::{InputBackend, KeyChord, MouseButton};
use crate::ocr::{TextFragment, TextRecognizer};
use crate::screenshot::capture::{ScreenCapturer, ScreenImage};

/// Everything the mock has been asked to do
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockEvents {
    pub clicks: Vec<(Point, MouseButton)>,
    pub drags: Vec<(Point, Point, Duration)>,
    pub typed: Vec<String>,
    pub keys: Vec<KeyChord>,
    pub focused: Vec<PlatformWindowId>,
    pub captures: usize,
}

#[derive(Debug)]
struct MockState {
    windows: Vec<WindowHandle>,
    pointer: Point,
    events: MockEvents,
}

#[derive(Debug)]
pub struct MockDesktop {
    state: Mutex<MockState>,
    screen: ScreenSize,
    capabilities: Capabilities,
    frame: RgbaImage,
}

impl MockDesktop {
    /// A 1280x720 screen with "Terminal" (active) and "Untitled - Notepad"
    pub fn new() -> Self {
        let windows = vec![
            mock_window(1, "Terminal", Some(Geometry::new(0, 0, 640, 360)), true),
            mock_window(2, "Untitled - Notepad", Some(Geometry::new(100, 200, 400, 300)), false),
        ];
        Self::with_windows(windows)
    }

    pub fn with_windows(windows: Vec<WindowHandle>) -> Self {
        let screen = ScreenSize {
            width: 1280,
            height: 720,
        };
        Self {
            state: Mutex::new(MockState {
                windows,
                pointer: Point { x: 0, y: 0 },
                events: MockEvents::default(),
            }),
            screen,
            capabilities: Capabilities {
                window_activation: true,
                window_bounds: true,
                pointer_query: true,
            },
            frame: RgbaImage::from_fn(screen.width, screen.height, |x, y| {
                Rgba([(x % 256) as u8, (y % 256) as u8, 64, 255])
            }),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Replace the captured frame; the screen size follows the frame
    pub fn with_frame(mut self, frame: RgbaImage) -> Self {
        self.screen = ScreenSize {
            width: frame.width(),
            height: frame.height(),
        };
        self.frame = frame;
        self
    }

    pub fn events(&self) -> MockEvents {
        self.lock().events.clone()
    }

    pub fn pointer(&self) -> Point {
        self.lock().pointer
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the state from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockDesktop {
    fn default() -> Self {
        Self::new()
    }
}

pub fn mock_window(id: u32, title: &str, bounds: Option<Geometry>, active: bool) -> WindowHandle {
    WindowHandle {
        id: PlatformWindowId::X11(id),
        title: title.to_string(),
        class: String::new(),
        bounds,
        active,
    }
}

#[async_trait]
impl WindowBackend for MockDesktop {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn list_windows(&self) -> anyhow::Result<Vec<WindowHandle>> {
        Ok(self.lock().windows.clone())
    }

    async fn focus_window(&self, id: &PlatformWindowId) -> anyhow::Result<()> {
        let mut state = self.lock();
        if !state.windows.iter().any(|w| &w.id == id) {
            anyhow::bail!("no such window {:?}", id);
        }
        for window in state.windows.iter_mut() {
            window.active = &window.id == id;
        }
        state.events.focused.push(id.clone());
        Ok(())
    }

    async fn screen_size(&self) -> anyhow::Result<ScreenSize> {
        Ok(self.screen)
    }

    async fn pointer_position(&self) -> anyhow::Result<Point> {
        Ok(self.lock().pointer)
    }
}

#[async_trait]
impl InputBackend for MockDesktop {
    async fn move_to(&self, x: i32, y: i32) -> anyhow::Result<()> {
        self.lock().pointer = Point { x, y };
        Ok(())
    }

    async fn click(&self, x: i32, y: i32, button: MouseButton) -> anyhow::Result<()> {
        let mut state = self.lock();
        state.pointer = Point { x, y };
        state.events.clicks.push((Point { x, y }, button));
        Ok(())
    }

    async fn drag(&self, from: Point, to: Point, duration: Duration) -> anyhow::Result<()> {
        let mut state = self.lock();
        state.pointer = to;
        state.events.drags.push((from, to, duration));
        Ok(())
    }

    async fn type_text(&self, text: &str) -> anyhow::Result<()> {
        self.lock().events.typed.push(text.to_string());
        Ok(())
    }

    async fn press_key(&self, chord: &KeyChord) -> anyhow::Result<()> {
        self.lock().events.keys.push(chord.clone());
        Ok(())
    }
}

#[async_trait]
impl ScreenCapturer for MockDesktop {
    async fn capture_screen(&self) -> anyhow::Result<ScreenImage> {
        self.lock().events.captures += 1;
        Ok(ScreenImage {
            image: self.frame.clone(),
            origin: Point { x: 0, y: 0 },
        })
    }
}

/// Recognizer that returns the same fragments for every image
#[derive(Debug, Default)]
pub struct MockRecognizer {
    fragments: Vec<TextFragment>,
    calls: Mutex<Vec<(u32, u32)>>,
}

impl MockRecognizer {
    pub fn new(fragments: Vec<TextFragment>) -> Self {
        Self {
            fragments,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Dimensions of every image recognised so far
    pub fn calls(&self) -> Vec<(u32, u32)> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl TextRecognizer for MockRecognizer {
    async fn recognize(&self, image: &RgbaImage) -> anyhow::Result<Vec<TextFragment>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(image.dimensions());
        Ok(self.fragments.clone())
    }
}
