//! Parameter types for preview encoding.
//!
//! - [`Quality`]: lossy encoding quality (1-100, default 60), clamped on construction.
//! - [`PreviewParams`]: long-edge size, blur strength and quality of an inline preview.

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(60)
    }
}

/// Parameters for a placeholder preview.
///
/// - `width`: size of the longer edge in pixels; previews are stretched by
///   the browser, so a handful of pixels is enough
/// - `blur_sigma`: Gaussian blur applied after downscaling (0 = none)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewParams {
    pub width: u32,
    pub blur_sigma: f32,
    pub quality: Quality,
}

impl Default for PreviewParams {
    fn default() -> Self {
        Self {
            width: 10,
            blur_sigma: 1.0,
            quality: Quality::default(),
        }
    }
}
