//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;

/// Vertical padding that reserves the image's aspect ratio in a container.
///
/// `(height / width) * 100` with four decimals and a `%` suffix, e.g.
/// 200x100 → `"50.0000%"`. Returns `None` for a zero width.
pub fn aspect_padding(dims: Dimensions) -> Option<String> {
    if dims.width == 0 {
        return None;
    }
    let ratio = dims.height as f64 / dims.width as f64 * 100.0;
    Some(format!("{ratio:.4}%"))
}

/// Configured widths that apply to an image `original_width` pixels wide.
///
/// Widths strictly smaller than the original are kept in configured order.
/// The sentinel `1` ("the original size") is always kept.
pub fn candidate_sizes(configured: &[u32], original_width: u32) -> Vec<u32> {
    configured
        .iter()
        .copied()
        .filter(|&size| size == 1 || size < original_width)
        .collect()
}
