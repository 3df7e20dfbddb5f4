//! Fitting screenshots into the response budget
//!
//! Images are PNG-encoded at native resolution first; while the encoding is
//! over budget both dimensions shrink by a fixed percentage and the image is
//! re-encoded from the original pixels. The loop stops with
//! [`DesktopError::SizeExceeded`] instead of ever shrinking below the floor.

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::imageops::FilterType as ResizeFilter;
use image::{ImageEncoder, RgbaImage};

use crate::core::config::{DEFAULT_MAX_BYTES, DEFAULT_MIN_DIMENSION, DEFAULT_SCALE_STEP};
use crate::core::errors::{DesktopError, DesktopResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPolicy {
    /// Largest acceptable encoded size in bytes
    pub max_bytes: usize,
    /// Percentage applied to both dimensions on each step (1-99)
    pub scale_percent: u32,
    /// The shorter side never drops below this many pixels
    pub min_dimension: u32,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            scale_percent: DEFAULT_SCALE_STEP,
            min_dimension: DEFAULT_MIN_DIMENSION,
        }
    }
}

/// A PNG-encoded screenshot that fits the budget
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Final width divided by the captured width
    pub scale: f64,
}

/// Encode as PNG with best compression
///
/// Screen captures are opaque, so the alpha channel is dropped.
pub fn encode_png(image: &RgbaImage) -> DesktopResult<Vec<u8>> {
    let (width, height) = image.dimensions();
    let rgb: Vec<u8> = image.pixels().flat_map(|p| [p[0], p[1], p[2]]).collect();

    let mut output = Vec::new();
    PngEncoder::new_with_quality(&mut output, CompressionType::Best, FilterType::Adaptive)
        .write_image(&rgb, width, height, image::ExtendedColorType::Rgb8)?;

    Ok(output)
}

pub fn compress(image: &RgbaImage, policy: &CompressionPolicy) -> DesktopResult<EncodedImage> {
    if !(1..=99).contains(&policy.scale_percent) {
        return Err(DesktopError::invalid(
            "scale_percent",
            format!("{} is outside 1-99", policy.scale_percent),
        ));
    }

    let (original_width, original_height) = image.dimensions();
    if original_width == 0 || original_height == 0 {
        return Err(DesktopError::invalid("image", "has no pixels"));
    }

    let (mut width, mut height) = (original_width, original_height);
    let mut png = encode_png(image)?;

    while png.len() > policy.max_bytes {
        let (next_width, next_height) = scaled(width, height, policy.scale_percent);

        if next_width.min(next_height) < policy.min_dimension || (next_width, next_height) == (width, height) {
            tracing::warn!(
                bytes = png.len(),
                max_bytes = policy.max_bytes,
                width,
                height,
                "Screenshot still over budget at minimum resolution"
            );
            return Err(DesktopError::SizeExceeded {
                bytes: png.len(),
                max_bytes: policy.max_bytes,
                width,
                height,
            });
        }

        tracing::debug!(
            bytes = png.len(),
            "Downscaling {}x{} -> {}x{}",
            width,
            height,
            next_width,
            next_height
        );

        let resized = image::imageops::resize(image, next_width, next_height, ResizeFilter::Lanczos3);
        png = encode_png(&resized)?;
        (width, height) = (next_width, next_height);
    }

    Ok(EncodedImage {
        png,
        width,
        height,
        scale: width as f64 / original_width as f64,
    })
}

fn scaled(width: u32, height: u32, percent: u32) -> (u32, u32) {
    let scale = |v: u32| ((v as u64 * percent as u64) / 100).max(1) as u32;
    (scale(width), scale(height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Deterministic noise that PNG cannot compress
    fn noise(width: u32, height: u32) -> RgbaImage {
        let mut state: u32 = 0x9E37_79B9;
        RgbaImage::from_fn(width, height, |_, _| {
            let mut next = || {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            };
            Rgba([next(), next(), next(), 255])
        })
    }

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 128, 255]))
    }

    #[test]
    fn test_small_image_kept_at_native_size() {
        let encoded = compress(&gradient(100, 80), &CompressionPolicy::default()).unwrap();
        assert_eq!((encoded.width, encoded.height), (100, 80));
        assert_eq!(encoded.scale, 1.0);
        assert!(encoded.png.len() <= DEFAULT_MAX_BYTES);
        assert!(encoded.png.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn test_downscales_until_under_budget() {
        let policy = CompressionPolicy {
            max_bytes: 300_000,
            ..CompressionPolicy::default()
        };
        let encoded = compress(&noise(512, 512), &policy).unwrap();
        assert_eq!((encoded.width, encoded.height), (256, 256));
        assert_eq!(encoded.scale, 0.5);
        assert!(encoded.png.len() <= policy.max_bytes);
    }

    #[test]
    fn test_fails_at_floor_instead_of_returning_oversized() {
        let policy = CompressionPolicy {
            max_bytes: 1_000,
            scale_percent: 50,
            min_dimension: 64,
        };
        match compress(&noise(256, 256), &policy) {
            Err(DesktopError::SizeExceeded {
                bytes,
                max_bytes,
                width,
                height,
            }) => {
                assert_eq!((width, height), (64, 64));
                assert_eq!(max_bytes, 1_000);
                assert!(bytes > max_bytes);
            }
            other => panic!("expected SizeExceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_deterministic() {
        let policy = CompressionPolicy {
            max_bytes: 100_000,
            ..CompressionPolicy::default()
        };
        let image = noise(300, 200);
        let a = compress(&image, &policy).unwrap();
        let b = compress(&image, &policy).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_bad_step() {
        let policy = CompressionPolicy {
            scale_percent: 100,
            ..CompressionPolicy::default()
        };
        assert_eq!(compress(&gradient(10, 10), &policy).unwrap_err().kind(), "invalid_argument");
    }

    #[test]
    fn test_scaled_never_reaches_zero() {
        assert_eq!(scaled(3, 1, 10), (1, 1));
        assert_eq!(scaled(1920, 1080, 50), (960, 540));
    }
}
