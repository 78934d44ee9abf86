//! Pure Rust image backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::image_dimensions` (header only, no full decode) |
//! | Decode (JPEG, PNG, GIF, WebP) | `image` crate |
//! | Downscale | `DynamicImage::thumbnail` |
//! | Blur | `DynamicImage::blur` |
//! | Encode | PNG when the source has alpha, JPEG otherwise |
//! | `data:` URI | `base64` standard alphabet |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::PreviewParams;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn backend_error(path: &Path, action: &str, err: ImageError) -> BackendError {
    match err {
        ImageError::IoError(e) => BackendError::Io(e),
        other => BackendError::ProcessingFailed(format!(
            "Failed to {action} {}: {other}",
            path.display()
        )),
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| backend_error(path, "decode", e))
}

/// Encode `img` into a `data:` URI.
fn to_data_uri(img: &DynamicImage, params: &PreviewParams) -> Result<String, ImageError> {
    let mut buf = Vec::new();
    let mime = if img.color().has_alpha() {
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        "image/png"
    } else {
        let quality = u8::try_from(params.quality.value()).unwrap_or(100);
        let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        "image/jpeg"
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(&buf);
    Ok(format!("data:{mime};base64,{encoded}"))
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) =
            image::image_dimensions(path).map_err(|e| backend_error(path, "identify", e))?;
        Ok(Dimensions { width, height })
    }

    fn encode_preview(&self, path: &Path, params: &PreviewParams) -> Result<String, BackendError> {
        let img = load_image(path)?;
        let edge = params.width.max(1);
        let mut preview = img.thumbnail(edge, edge);
        if params.blur_sigma > 0.0 {
            preview = preview.blur(params.blur_sigma);
        }
        to_data_uri(&preview, params).map_err(|e| backend_error(path, "encode preview of", e))
    }
}
