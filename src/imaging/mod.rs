//! Image probing and preview encoding.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Preview** | `thumbnail` + `blur`, JPEG or PNG, base64 `data:` URI |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing preview encoding
//! - **Backend**: [`ImageBackend`] trait + `RustBackend`
//!
//! Transformers receive the backend as `Option<Arc<dyn ImageBackend>>`. When
//! the crate is built without the `imaging` feature there is no backend and
//! [`default_backend`] returns `None`; transformers that need pixels then
//! leave the document untouched.

pub mod backend;
mod calculations;
mod params;
#[cfg(feature = "imaging")]
pub mod rust_backend;

use std::sync::Arc;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{aspect_padding, candidate_sizes};
pub use params::{PreviewParams, Quality};
#[cfg(feature = "imaging")]
pub use rust_backend::RustBackend;

/// The backend compiled into this build, if any.
#[cfg(feature = "imaging")]
pub fn default_backend() -> Option<Arc<dyn ImageBackend>> {
    Some(Arc::new(RustBackend::new()))
}

/// The backend compiled into this build, if any.
#[cfg(not(feature = "imaging"))]
pub fn default_backend() -> Option<Arc<dyn ImageBackend>> {
    None
}
