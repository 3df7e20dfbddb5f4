//! Desktop operations behind every tool
//!
//! `Desktop` owns the injected backends and validates arguments before
//! forwarding. Calls are serialized: the screen and input devices belong to
//! one operation at a time.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::backend::{self, Point, ScreenSize, WindowBackend};
use crate::core::config::Config;
use crate::core::errors::{DesktopError, DesktopResult, Limitation};
use crate::core::window::{WindowHandle, WindowMatch, active_window, find_window};
use crate::input::{InputBackend, KeyChord, MouseButton, Ydotool};
use crate::ocr::TesseractCli;
use crate::screenshot::capture::XcapCapturer;
use crate::screenshot::compress::CompressionPolicy;
use crate::screenshot::{ScreenshotRequest, ScreenshotResult, ScreenshotService};

/// Longest drag a caller may request
pub const MAX_DRAG_SECONDS: f64 = 10.0;

/// Outcome of `activate_window`
#[derive(Debug, Clone, Serialize)]
pub struct Activation {
    pub window: WindowMatch,
    pub already_active: bool,
    pub limitations: Vec<Limitation>,
}

pub struct Desktop {
    windows: Arc<dyn WindowBackend>,
    input: Arc<dyn InputBackend>,
    screenshots: ScreenshotService,
    busy: Mutex<()>,
}

impl Desktop {
    pub fn new(
        windows: Arc<dyn WindowBackend>,
        input: Arc<dyn InputBackend>,
        screenshots: ScreenshotService,
    ) -> Self {
        Self {
            windows,
            input,
            screenshots,
            busy: Mutex::new(()),
        }
    }

    /// Wire up the X11/KWin, ydotool, xcap and tesseract backends
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let windows = backend::create_backend().await?;
        let input: Arc<dyn InputBackend> = Arc::new(Ydotool::new(config.ydotool.clone()));
        let screenshots = ScreenshotService::new(
            windows.clone(),
            Arc::new(XcapCapturer),
            Arc::new(TesseractCli::new(config.tesseract.clone(), config.ocr_lang.clone())),
            CompressionPolicy {
                max_bytes: config.max_bytes,
                scale_percent: config.scale_step,
                min_dimension: config.min_dimension,
            },
            config.downloads_dir.clone(),
        );

        Ok(Self::new(windows, input, screenshots))
    }

    async fn check_on_screen(&self, name: &str, x: i32, y: i32) -> DesktopResult<()> {
        let screen = self.windows.screen_size().await?;
        if !screen.contains(x, y) {
            return Err(DesktopError::invalid(
                name,
                format!(
                    "({x}, {y}) is outside the {}x{} screen",
                    screen.width, screen.height
                ),
            ));
        }
        Ok(())
    }

    pub async fn click(&self, x: i32, y: i32, button: MouseButton) -> DesktopResult<()> {
        let _guard = self.busy.lock().await;
        self.check_on_screen("x/y", x, y).await?;
        self.input.click(x, y, button).await?;
        tracing::info!(x, y, ?button, "Clicked");
        Ok(())
    }

    pub async fn move_mouse(&self, x: i32, y: i32) -> DesktopResult<()> {
        let _guard = self.busy.lock().await;
        self.check_on_screen("x/y", x, y).await?;
        self.input.move_to(x, y).await?;
        Ok(())
    }

    pub async fn drag_mouse(&self, from: Point, to: Point, duration_secs: f64) -> DesktopResult<()> {
        if !(0.0..=MAX_DRAG_SECONDS).contains(&duration_secs) {
            return Err(DesktopError::invalid(
                "duration",
                format!("{duration_secs} is outside 0-{MAX_DRAG_SECONDS} seconds"),
            ));
        }

        let _guard = self.busy.lock().await;
        self.check_on_screen("from_x/from_y", from.x, from.y).await?;
        self.check_on_screen("to_x/to_y", to.x, to.y).await?;

        tracing::debug!(?from, ?to, duration_secs, "Starting drag");
        self.input
            .drag(from, to, Duration::from_secs_f64(duration_secs))
            .await?;
        tracing::debug!("Drag completed");
        Ok(())
    }

    pub async fn type_text(&self, text: &str) -> DesktopResult<()> {
        let _guard = self.busy.lock().await;
        self.input.type_text(text).await?;
        Ok(())
    }

    pub async fn press_key(&self, key: &str) -> DesktopResult<KeyChord> {
        let chord = KeyChord::parse(key)?;
        let _guard = self.busy.lock().await;
        self.input.press_key(&chord).await?;
        Ok(chord)
    }

    pub async fn screen_size(&self) -> DesktopResult<ScreenSize> {
        Ok(self.windows.screen_size().await?)
    }

    pub async fn mouse_position(&self) -> DesktopResult<Point> {
        if !self.windows.capabilities().pointer_query {
            return Err(DesktopError::Unsupported {
                capability: "pointer_query".to_string(),
            });
        }
        Ok(self.windows.pointer_position().await?)
    }

    pub async fn list_windows(&self) -> DesktopResult<Vec<WindowHandle>> {
        let mut windows = self.windows.list_windows().await?;
        // Skip untitled helper windows, as the listing is meant for humans and agents
        windows.retain(|w| !w.title.is_empty());
        tracing::info!(count = windows.len(), "Listed windows");
        Ok(windows)
    }

    pub async fn active_window(&self) -> DesktopResult<Option<WindowHandle>> {
        let windows = self.windows.list_windows().await?;
        Ok(active_window(&windows).cloned())
    }

    pub async fn activate_window(
        &self,
        pattern: &str,
        use_regex: bool,
        threshold: u8,
    ) -> DesktopResult<Activation> {
        let _guard = self.busy.lock().await;

        let windows = self.windows.list_windows().await?;
        let best = find_window(&windows, pattern, use_regex, threshold)?
            .into_iter()
            .next()
            .ok_or_else(|| DesktopError::NotFound {
                pattern: pattern.to_string(),
            })?;

        if best.window.active {
            return Ok(Activation {
                window: best,
                already_active: true,
                limitations: Vec::new(),
            });
        }

        if !self.windows.capabilities().window_activation {
            return Ok(Activation {
                window: best,
                already_active: false,
                limitations: vec![Limitation::new(
                    "window_activation",
                    "the window manager does not support activating windows",
                )],
            });
        }

        self.windows.focus_window(&best.window.id).await?;
        tracing::info!(title = %best.window.title, "Activated window");

        Ok(Activation {
            window: best,
            already_active: false,
            limitations: Vec::new(),
        })
    }

    pub async fn take_screenshot(&self, request: &ScreenshotRequest) -> DesktopResult<ScreenshotResult> {
        let _guard = self.busy.lock().await;
        self.screenshots.take_screenshot(request).await
    }
}
