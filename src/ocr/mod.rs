//! Text extraction over screenshots
//!
//! Recognition itself is delegated to a [`TextRecognizer`]; this module owns
//! the caller-facing contract: optional rescaling before recognition and
//! mapping boxes back into the coordinate space of the image passed in.

mod tesseract;

use async_trait::async_trait;
use image::RgbaImage;
use image::imageops::FilterType;
use serde::Serialize;

use crate::core::errors::{DesktopError, DesktopResult};
use crate::core::window::Geometry;
pub use tesseract::TesseractCli;

pub const MAX_OCR_SCALE_PERCENT: u32 = 200;

/// A recognised piece of text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextFragment {
    pub text: String,
    pub bounds: Geometry,
    /// 0.0 - 1.0
    pub confidence: f32,
}

impl TextFragment {
    pub fn translate(mut self, dx: i32, dy: i32) -> Self {
        self.bounds.x += dx;
        self.bounds.y += dy;
        self
    }
}

#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Boxes are in `image`'s own pixel coordinates. No text is an empty vec.
    async fn recognize(&self, image: &RgbaImage) -> anyhow::Result<Vec<TextFragment>>;
}

/// Run OCR on `image`, optionally rescaled to `scale_percent` first
///
/// Lower percentages trade accuracy for speed. Returned boxes are always in
/// `image`'s coordinates regardless of the scale used for recognition.
pub async fn extract_text(
    recognizer: &dyn TextRecognizer,
    image: &RgbaImage,
    scale_percent: u32,
) -> DesktopResult<Vec<TextFragment>> {
    if !(1..=MAX_OCR_SCALE_PERCENT).contains(&scale_percent) {
        return Err(DesktopError::invalid(
            "scale_percent_for_ocr",
            format!("{scale_percent} is outside 1-{MAX_OCR_SCALE_PERCENT}"),
        ));
    }

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Ok(Vec::new());
    }

    if scale_percent == 100 {
        let fragments = recognizer.recognize(image).await?;
        tracing::debug!(fragments = fragments.len(), "OCR complete");
        return Ok(fragments);
    }

    let scaled_width = ((width as u64 * scale_percent as u64) / 100).max(1) as u32;
    let scaled_height = ((height as u64 * scale_percent as u64) / 100).max(1) as u32;
    let resized = image::imageops::resize(image, scaled_width, scaled_height, FilterType::Triangle);

    let fx = width as f64 / scaled_width as f64;
    let fy = height as f64 / scaled_height as f64;

    let fragments: Vec<TextFragment> = recognizer
        .recognize(&resized)
        .await?
        .into_iter()
        .map(|f| TextFragment {
            bounds: rescale_box(f.bounds, fx, fy, width, height),
            ..f
        })
        .collect();

    tracing::debug!(
        fragments = fragments.len(),
        scale_percent,
        "OCR complete on {}x{} rescale",
        scaled_width,
        scaled_height
    );
    Ok(fragments)
}

/// Scale a box by per-axis factors, clamped inside a `width` x `height` image
fn rescale_box(b: Geometry, fx: f64, fy: f64, width: u32, height: u32) -> Geometry {
    let x = ((b.x.max(0) as f64 * fx).round() as u32).min(width.saturating_sub(1));
    let y = ((b.y.max(0) as f64 * fy).round() as u32).min(height.saturating_sub(1));
    let w = ((b.width as f64 * fx).round() as u32).clamp(1, width - x);
    let h = ((b.height as f64 * fy).round() as u32).clamp(1, height - y);
    Geometry::new(x as i32, y as i32, w, h)
}
