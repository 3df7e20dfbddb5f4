//! Screenshot pipeline
//!
//! Window lookup, capture, compression, optional OCR and optional saving to
//! the downloads directory, as one linear pass per request.

pub mod capture;
pub mod compress;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::backend::WindowBackend;
use crate::core::errors::{DesktopError, DesktopResult, Limitation};
use crate::core::window::{Geometry, WindowHandle, WindowMatch, active_window, find_window};
use crate::ocr::{TextFragment, TextRecognizer, extract_text};
use capture::ScreenCapturer;
use compress::{CompressionPolicy, EncodedImage};

/// Parameters of a single screenshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotRequest {
    /// Capture only the best-matching window; `None` captures the whole screen
    pub title_pattern: Option<String>,
    pub use_regex: bool,
    /// Minimum fuzzy score (0-100)
    pub threshold: u8,
    pub with_ocr: bool,
    pub ocr_scale_percent: u32,
    pub save_to_downloads: bool,
}

impl Default for ScreenshotRequest {
    fn default() -> Self {
        Self {
            title_pattern: None,
            use_regex: false,
            threshold: 60,
            with_ocr: false,
            ocr_scale_percent: 100,
            save_to_downloads: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScreenshotResult {
    #[serde(skip)]
    pub image: EncodedImage,
    /// Screen area the image covers, before any downscaling
    pub region: Geometry,
    pub window: Option<WindowMatch>,
    /// OCR lines in absolute screen coordinates
    pub fragments: Option<Vec<TextFragment>>,
    pub saved_path: Option<PathBuf>,
    pub limitations: Vec<Limitation>,
}

pub struct ScreenshotService {
    windows: Arc<dyn WindowBackend>,
    capturer: Arc<dyn ScreenCapturer>,
    recognizer: Arc<dyn TextRecognizer>,
    policy: CompressionPolicy,
    downloads_dir: PathBuf,
    /// Wait after activating the target window
    activate_settle: Duration,
    /// Wait after restoring the previous window
    restore_settle: Duration,
}

impl ScreenshotService {
    pub fn new(
        windows: Arc<dyn WindowBackend>,
        capturer: Arc<dyn ScreenCapturer>,
        recognizer: Arc<dyn TextRecognizer>,
        policy: CompressionPolicy,
        downloads_dir: PathBuf,
    ) -> Self {
        Self {
            windows,
            capturer,
            recognizer,
            policy,
            downloads_dir,
            activate_settle: Duration::from_millis(500),
            restore_settle: Duration::from_millis(200),
        }
    }

    pub fn with_settle_delays(mut self, activate: Duration, restore: Duration) -> Self {
        self.activate_settle = activate;
        self.restore_settle = restore;
        self
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    pub async fn take_screenshot(&self, request: &ScreenshotRequest) -> DesktopResult<ScreenshotResult> {
        if request.threshold > 100 {
            return Err(DesktopError::invalid(
                "threshold",
                format!("{} is outside 0-100", request.threshold),
            ));
        }
        if request.with_ocr && !(1..=crate::ocr::MAX_OCR_SCALE_PERCENT).contains(&request.ocr_scale_percent) {
            return Err(DesktopError::invalid(
                "scale_percent_for_ocr",
                format!(
                    "{} is outside 1-{}",
                    request.ocr_scale_percent,
                    crate::ocr::MAX_OCR_SCALE_PERCENT
                ),
            ));
        }

        let mut limitations = Vec::new();

        let (window, capture) = match request.title_pattern.as_deref() {
            Some(pattern) => {
                let windows = self.windows.list_windows().await?;
                let best = find_window(&windows, pattern, request.use_regex, request.threshold)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| DesktopError::NotFound {
                        pattern: pattern.to_string(),
                    })?;

                tracing::info!(title = %best.window.title, score = best.score, "Capturing window");
                let capture = self
                    .capture_window(&best.window, active_window(&windows), &mut limitations)
                    .await?;
                (Some(best), capture)
            }
            None => {
                tracing::info!("Capturing entire screen");
                (None, capture::capture(self.capturer.as_ref(), None).await?)
            }
        };
        let capture::Capture {
            image: pixels,
            region,
            limitations: capture_limitations,
        } = capture;
        limitations.extend(capture_limitations);

        let policy = self.policy;
        let (pixels, encoded) = tokio::task::spawn_blocking(move || {
            let encoded = compress::compress(&pixels, &policy);
            (pixels, encoded)
        })
        .await
        .map_err(anyhow::Error::from)?;
        let image = encoded?;

        tracing::info!(
            bytes = image.png.len(),
            "Screenshot encoded at {}x{} (scale {:.2})",
            image.width,
            image.height,
            image.scale
        );

        let fragments = if request.with_ocr {
            let fragments: Vec<TextFragment> = extract_text(self.recognizer.as_ref(), &pixels, request.ocr_scale_percent)
                .await?
                .into_iter()
                .map(|f| f.translate(region.x, region.y))
                .collect();
            Some(fragments)
        } else {
            None
        };

        let saved_path = if request.save_to_downloads {
            Some(save_png(&self.downloads_dir, &image.png).await?)
        } else {
            None
        };

        Ok(ScreenshotResult {
            image,
            region,
            window,
            fragments,
            saved_path,
            limitations,
        })
    }

    /// Bring `target` forward, grab its region, then give focus back
    async fn capture_window(
        &self,
        target: &WindowHandle,
        previous: Option<&WindowHandle>,
        limitations: &mut Vec<Limitation>,
    ) -> DesktopResult<capture::Capture> {
        let capabilities = self.windows.capabilities();

        let bounds = if capabilities.window_bounds { target.bounds } else { None };
        if bounds.is_none() {
            limitations.push(Limitation::new(
                "window_bounds",
                "window position is unavailable; captured the full screen instead",
            ));
        }

        let mut activated = false;
        if !target.active {
            if capabilities.window_activation {
                match self.windows.focus_window(&target.id).await {
                    Ok(()) => {
                        activated = true;
                        tokio::time::sleep(self.activate_settle).await;
                    }
                    Err(e) => {
                        tracing::warn!("Could not activate '{}': {}", target.title, e);
                        limitations.push(Limitation::new("window_activation", e.to_string()));
                    }
                }
            } else {
                limitations.push(Limitation::new(
                    "window_activation",
                    "window cannot be raised; overlapping windows may be visible",
                ));
            }
        }

        let capture = capture::capture(self.capturer.as_ref(), bounds).await;

        if activated {
            if let Some(previous) = previous.filter(|p| p.id != target.id) {
                match self.windows.focus_window(&previous.id).await {
                    Ok(()) => tokio::time::sleep(self.restore_settle).await,
                    Err(e) => tracing::warn!("Could not restore '{}': {}", previous.title, e),
                }
            }
        }

        capture
    }
}

/// Write `png` under `dir` with a unique `screenshot_<timestamp>_<id>.png` name
pub async fn save_png(dir: &Path, png: &[u8]) -> DesktopResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let id = uuid::Uuid::new_v4().simple().to_string();
    let path = dir.join(format!("screenshot_{}_{}.png", timestamp, &id[..8]));

    // create_new refuses to clobber an existing file
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await?;
    file.write_all(png).await?;
    file.flush().await?;

    tracing::info!("Saved screenshot to {}", path.display());
    Ok(path)
}
