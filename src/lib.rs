//! # picture-pipe
//!
//! Rewrites HTML documents as they pass through a build step. Each document
//! is parsed into a mutable tree, run through an ordered list of
//! transformers, and serialized back:
//!
//! - **srcset**: `<img>` becomes `<picture>` with one `<source>` per format,
//!   each listing the pre-generated size variants that fit the original.
//! - **lqip**: images are wrapped in a container that reserves their aspect
//!   ratio and shows a tiny blurred preview until the real image has loaded.
//!
//! # Architecture
//!
//! ```text
//! Unit (path + bytes)
//!   → document::Document::parse
//!   → transform::Transformer × N        (pipeline order, same tree)
//!   → DocumentModel::serialize
//! ```
//!
//! Transformers only see the [`document::DocumentModel`] trait and an
//! optional [`imaging::ImageBackend`]. Both are narrow seams: tests run the
//! transformers against real parsed documents and an in-memory backend.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`document`] | Mutable HTML5 tree (html5ever via `scraper`): selectors, attributes, clone/insert/replace, serialization |
//! | [`naming`] | Variant filename and `srcset` descriptor micro-syntax |
//! | [`imaging`] | Dimension probing and preview encoding behind [`imaging::ImageBackend`] |
//! | [`transform`] | The [`transform::Transformer`] contract and the srcset and lqip transformers |
//! | [`pipeline`] | Ordered composition, file units, parallel processing, progress events |
//! | [`config`] | `picture-pipe.toml` loading, merging, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Pure-Rust Imaging, Optional
//!
//! Dimension probing and preview encoding use the `image` crate and are
//! compiled in with the default `imaging` feature. Without it
//! [`imaging::default_backend`] returns `None` and the transformers that need
//! pixels leave documents untouched instead of failing. The capability is
//! decided once, when the pipeline is built.
//!
//! ## Scatter/Gather Per Transformer
//!
//! Per-element I/O (probing, encoding) runs on the rayon pool, but the
//! document is only ever mutated from one thread, after all I/O for the
//! transformer has finished, in document order. Output order therefore
//! follows the document and the configuration, never completion order.
//!
//! ## Browser-Grade Parsing
//!
//! Documents are parsed with html5ever's tree builder, not a tag scanner.
//! Script and style bodies are raw text, so markup inside a JavaScript
//! string is never matched or rewritten, and malformed input is repaired the
//! way a browser repairs it instead of losing content.
//!
//! ## Failures Stay Local
//!
//! A missing or unreadable image leaves its element unmodified and is
//! reported in the [`transform::TransformSummary`]. Only whole-transformer
//! problems (bad configuration, invalid selector) fail a document, and a
//! failed document (including one that cannot be read or written) never
//! affects the others.

pub mod config;
pub mod document;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_helpers;
