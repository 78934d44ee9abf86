//! Document transformers.
//!
//! A [`Transformer`] mutates a loaded document in place and reports a
//! [`TransformSummary`]. Transformers are composed by
//! [`Pipeline`](crate::pipeline::Pipeline) and run strictly one after the
//! other against the same document, so each one sees every mutation made by
//! the ones before it.
//!
//! ## Failure model
//!
//! | Failure | Effect |
//! |---|---|
//! | Missing or empty configuration | constructor returns [`TransformError`] |
//! | Invalid selector | `transform` returns [`TransformError`], the pipeline aborts the document |
//! | Image backend not compiled in | transformer does nothing for the document |
//! | One element's file missing or unreadable | element left untouched, [`Skipped`] entry |
//!
//! ## Per-element work
//!
//! Both transformers follow the same scatter/gather shape: collect jobs from
//! the document (read only), run the I/O for every job on the rayon pool,
//! then apply the mutations sequentially in document order. The document is
//! never touched from more than one thread.

pub mod lqip;
pub mod srcset;

pub use lqip::{LQIP_STYLES, LqipOptions, LqipTransformer};
pub use srcset::{SrcsetMode, SrcsetOptions, SrcsetTransformer};

use crate::document::{DocumentError, DocumentModel};
use crate::naming::strip_query;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("no widths supplied")]
    EmptySizes,
    #[error("no formats supplied")]
    EmptyFormats,
    #[error("missing required parameter `base`")]
    MissingBase,
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Context shared by every transformer for one document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransformerExtras {
    /// Directory of the source document; relative image paths resolve here.
    pub dirname: PathBuf,
}

impl TransformerExtras {
    pub fn new(dirname: impl Into<PathBuf>) -> Self {
        Self {
            dirname: dirname.into(),
        }
    }
}

/// An element a transformer matched but left unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// The attribute value that identified the element (usually `src`).
    pub source: String,
    pub reason: String,
}

/// What one transformer did to one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSummary {
    pub transformer: &'static str,
    /// Elements matched by the transformer's query.
    pub matched: usize,
    /// Elements actually rewritten.
    pub rewritten: usize,
    pub skipped: Vec<Skipped>,
}

impl TransformSummary {
    pub fn new(transformer: &'static str, matched: usize) -> Self {
        Self {
            transformer,
            matched,
            rewritten: 0,
            skipped: Vec::new(),
        }
    }

    pub(crate) fn skip(&mut self, source: impl Into<String>, reason: impl ToString) {
        self.skipped.push(Skipped {
            source: source.into(),
            reason: reason.to_string(),
        });
    }
}

/// One step of the pipeline.
///
/// Implementations hold only immutable configuration, so a single instance
/// can process many documents concurrently.
pub trait Transformer: Send + Sync {
    /// Short name used in diagnostics and config (`"srcset"`, `"lqip"`).
    fn name(&self) -> &'static str;

    /// Mutate `doc` in place.
    ///
    /// Per-element failures are recorded in the summary; only whole-transformer
    /// problems are returned as errors.
    fn transform(
        &self,
        doc: &mut dyn DocumentModel,
        extras: &TransformerExtras,
    ) -> Result<TransformSummary, TransformError>;
}

/// Filesystem path of an image URL relative to `base`.
///
/// Site-root URLs (`/img/a.png`) are joined below `base` like relative ones;
/// query strings and fragments are dropped.
pub(crate) fn resolve_source(base: &Path, src: &str) -> PathBuf {
    base.join(strip_query(src).trim_start_matches('/'))
}
