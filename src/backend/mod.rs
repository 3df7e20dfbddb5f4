//! Window backend abstraction
//!
//! This module provides a platform-agnostic interface for window enumeration,
//! activation and display queries, with an X11 implementation and a KWin
//! variant for KDE Plasma on Wayland.

mod kwin;
pub mod mock;
mod x11;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::core::window::{PlatformWindowId, WindowHandle};

/// Size of the whole virtual screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// What the backend can do on this platform
///
/// Callers consult this instead of branching on the OS or session type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Windows can be brought to the foreground
    pub window_activation: bool,
    /// Windows report screen-space bounds
    pub window_bounds: bool,
    /// The pointer position can be queried
    pub pointer_query: bool,
}

/// Trait for window backend implementations
#[async_trait]
pub trait WindowBackend: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// List all windows, in enumeration order, with at most one active
    async fn list_windows(&self) -> anyhow::Result<Vec<WindowHandle>>;

    /// Bring a window to the foreground
    async fn focus_window(&self, id: &PlatformWindowId) -> anyhow::Result<()>;

    async fn screen_size(&self) -> anyhow::Result<ScreenSize>;

    async fn pointer_position(&self) -> anyhow::Result<Point>;
}

/// Create the appropriate backend for the current environment
pub async fn create_backend() -> anyhow::Result<Arc<dyn WindowBackend>> {
    let Some(display_name) = std::env::var("DISPLAY").ok() else {
        anyhow::bail!("No display server detected. Set DISPLAY for X11 or XWayland.");
    };

    let x11: Arc<dyn WindowBackend> = Arc::new(x11::X11Backend::new()?);

    if is_kde_wayland() {
        match kwin::KWinBackend::new(x11.clone()).await {
            Ok(backend) => {
                tracing::info!("Using KWin backend over XWayland (DISPLAY={})", display_name);
                return Ok(Arc::new(backend));
            }
            Err(e) => {
                tracing::warn!("KWin D-Bus unavailable, using plain X11: {}", e);
            }
        }
    }

    tracing::info!("Using X11 backend (DISPLAY={})", display_name);
    Ok(x11)
}

fn is_kde_wayland() -> bool {
    let wayland = std::env::var_os("WAYLAND_DISPLAY").is_some();
    let kde = std::env::var("XDG_CURRENT_DESKTOP")
        .map(|d| d.split(':').any(|part| part.eq_ignore_ascii_case("kde")))
        .unwrap_or(false);
    wayland && kde
}
