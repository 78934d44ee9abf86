//! Shared test utilities.
//!
//! Provides image fixtures written on the fly and lookup helpers that panic
//! with a clear message on miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_png(&tmp.path().join("a.png"), 200, 100);
//!
//! let doc = Document::parse(r#"<p><img src="a.png"></p>"#);
//! let img = select_one(&doc, "p > img");
//! assert_eq!(attr_values(&doc, "img", "src"), vec!["a.png"]);
//! ```

use crate::document::{Document, DocumentModel, NodeId};

// =========================================================================
// Image fixtures
// =========================================================================

/// Write an opaque RGB gradient PNG.
#[cfg(feature = "imaging")]
pub fn write_png(path: &std::path::Path, width: u32, height: u32) {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    img.save(path).unwrap();
}

/// Write a PNG with a transparent half.
#[cfg(feature = "imaging")]
pub fn write_rgba_png(path: &std::path::Path, width: u32, height: u32) {
    let img = image::RgbaImage::from_fn(width, height, |x, _| {
        let alpha = if x < width / 2 { 0 } else { 255 };
        image::Rgba([200, 100, 50, alpha])
    });
    img.save(path).unwrap();
}

// =========================================================================
// Document lookups
// =========================================================================

/// The single element matching `selector`. Panics on zero or several matches.
pub fn select_one(doc: &Document, selector: &str) -> NodeId {
    let found = doc.select(selector).unwrap();
    match found.as_slice() {
        [one] => *one,
        _ => panic!(
            "expected one match for '{selector}', found {}. Document: {}",
            found.len(),
            doc.serialize()
        ),
    }
}

/// Values of `attr` on every element matching `selector`, in document order.
/// Elements without the attribute are left out.
pub fn attr_values(doc: &Document, selector: &str, attr: &str) -> Vec<String> {
    doc.select(selector)
        .unwrap()
        .into_iter()
        .filter_map(|id| doc.attr(id, attr).map(str::to_string))
        .collect()
}
