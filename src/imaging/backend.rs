//! Image capability trait and shared types.
//!
//! The [`ImageBackend`] trait covers the two operations the transformers need
//! from the outside world: probing pixel dimensions and encoding a tiny
//! inline preview. Everything about pixels lives behind it, so transformer
//! logic is testable against the in-memory mock below.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), compiled in with the
//! `imaging` feature.

use super::params::PreviewParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Dimension probing and preview encoding.
///
/// Implementations are shared across rayon workers, hence `Send + Sync`.
pub trait ImageBackend: Send + Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Encode a tiny blurred preview of the image as a `data:` URI.
    fn encode_preview(&self, path: &Path, params: &PreviewParams) -> Result<String, BackendError>;
}
