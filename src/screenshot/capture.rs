//! Screen capture using xcap
//!
//! xcap handles the per-monitor grabs; this module stitches monitors into one
//! virtual-screen image and crops window regions out of it.

use async_trait::async_trait;
use image::RgbaImage;

use crate::backend::Point;
use crate::core::errors::{DesktopResult, Limitation};
use crate::core::window::Geometry;

/// The whole virtual screen and where its top-left corner sits
#[derive(Debug, Clone)]
pub struct ScreenImage {
    pub image: RgbaImage,
    pub origin: Point,
}

/// Source of full-screen frames
#[async_trait]
pub trait ScreenCapturer: Send + Sync {
    async fn capture_screen(&self) -> anyhow::Result<ScreenImage>;
}

/// A captured raster plus the screen region it covers
#[derive(Debug, Clone)]
pub struct Capture {
    pub image: RgbaImage,
    /// Absolute screen coordinates of the captured area
    pub region: Geometry,
    pub limitations: Vec<Limitation>,
}

/// Capture the full screen, or the part of it covered by `bounds`
///
/// Bounds that are empty or lie entirely off-screen degrade to a full-screen
/// capture with a `window_bounds` limitation. Partially visible bounds are
/// clipped.
pub async fn capture(capturer: &dyn ScreenCapturer, bounds: Option<Geometry>) -> DesktopResult<Capture> {
    let screen = capturer.capture_screen().await?;
    Ok(crop_to_bounds(screen, bounds))
}

fn crop_to_bounds(screen: ScreenImage, bounds: Option<Geometry>) -> Capture {
    let full_region = Geometry::new(
        screen.origin.x,
        screen.origin.y,
        screen.image.width(),
        screen.image.height(),
    );

    let Some(bounds) = bounds else {
        return Capture {
            image: screen.image,
            region: full_region,
            limitations: Vec::new(),
        };
    };

    match intersect(full_region, bounds) {
        Some(region) => {
            let image = image::imageops::crop_imm(
                &screen.image,
                (region.x - full_region.x) as u32,
                (region.y - full_region.y) as u32,
                region.width,
                region.height,
            )
            .to_image();
            Capture {
                image,
                region,
                limitations: Vec::new(),
            }
        }
        None => {
            tracing::warn!(?bounds, "Window bounds are off-screen, capturing full screen");
            Capture {
                image: screen.image,
                region: full_region,
                limitations: vec![Limitation::new(
                    "window_bounds",
                    "window lies outside the visible screen; captured the full screen instead",
                )],
            }
        }
    }
}

fn intersect(a: Geometry, b: Geometry) -> Option<Geometry> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let left = a.x.max(b.x);
    let top = a.y.max(b.y);
    let right = (a.x as i64 + a.width as i64).min(b.x as i64 + b.width as i64);
    let bottom = (a.y as i64 + a.height as i64).min(b.y as i64 + b.height as i64);

    if right <= left as i64 || bottom <= top as i64 {
        return None;
    }
    Some(Geometry::new(
        left,
        top,
        (right - left as i64) as u32,
        (bottom - top as i64) as u32,
    ))
}

/// [`ScreenCapturer`] backed by xcap monitor grabs
#[derive(Debug, Default)]
pub struct XcapCapturer;

#[async_trait]
impl ScreenCapturer for XcapCapturer {
    async fn capture_screen(&self) -> anyhow::Result<ScreenImage> {
        // xcap is not async, so we run it in a blocking task
        tokio::task::spawn_blocking(capture_virtual_screen).await?
    }
}

fn capture_virtual_screen() -> anyhow::Result<ScreenImage> {
    let mut shots = Vec::new();
    for monitor in xcap::Monitor::all()? {
        let x = monitor.x()?;
        let y = monitor.y()?;
        let image = monitor.capture_image()?;
        shots.push((Point { x, y }, image));
    }

    let screen = stitch(shots).ok_or_else(|| anyhow::anyhow!("No monitors found"))?;
    tracing::debug!(
        "Captured virtual screen {}x{} at ({}, {})",
        screen.image.width(),
        screen.image.height(),
        screen.origin.x,
        screen.origin.y
    );
    Ok(screen)
}

/// Composite per-monitor images onto one canvas at their desktop offsets
fn stitch(mut shots: Vec<(Point, RgbaImage)>) -> Option<ScreenImage> {
    if shots.len() <= 1 {
        return shots.pop().map(|(origin, image)| ScreenImage { image, origin });
    }

    let min_x = shots.iter().map(|(p, _)| p.x).min()?;
    let min_y = shots.iter().map(|(p, _)| p.y).min()?;
    let max_x = shots.iter().map(|(p, img)| p.x as i64 + img.width() as i64).max()?;
    let max_y = shots.iter().map(|(p, img)| p.y as i64 + img.height() as i64).max()?;

    let mut canvas = RgbaImage::new((max_x - min_x as i64) as u32, (max_y - min_y as i64) as u32);
    for (origin, image) in &shots {
        image::imageops::replace(
            &mut canvas,
            image,
            (origin.x - min_x) as i64,
            (origin.y - min_y) as i64,
        );
    }

    Some(ScreenImage {
        image: canvas,
        origin: Point { x: min_x, y: min_y },
    })
}
