//! Responsive-image rewriting.
//!
//! Turns an `<img>` into a `<picture>` with one `<source>` per configured
//! format, each listing the configured widths that fit the original image:
//!
//! ```text
//! <img src="photo.jpg">                      (800px wide, widths [1, 400], formats [webp, jpg])
//!
//! <picture>
//!   <source type="image/webp" srcset="photo.webp 800w, photo@400w.webp 400w">
//!   <source srcset="photo.jpg 800w, photo@400w.jpg 400w">
//!   <img src="photo.jpg">
//! </picture>
//! ```
//!
//! The variants themselves are produced elsewhere; only their names are
//! derived here (see [`naming`](crate::naming)).
//!
//! Two entry points exist and behave differently on purpose:
//!
//! - [`SrcsetTransformer::rewrite_src`] upgrades plain `img[src]` elements.
//!   The original width is probed from the file and the `<img>` is moved into
//!   the new `<picture>`.
//! - [`SrcsetTransformer::augment_srcset`] reads the width from an existing
//!   single-candidate `srcset` (`"photo.jpg 800w"`), gives the element a
//!   `src`, and inserts the `<picture>` (holding a copy) right after it. The
//!   original element stays where it was.

use super::{TransformError, TransformSummary, Transformer, TransformerExtras, resolve_source};
use crate::document::{DocumentModel, NodeId};
use crate::imaging::{Dimensions, ImageBackend, candidate_sizes};
use crate::naming::{
    DescriptorUnit, is_external, original_filename, parse_descriptor, split_extension,
    strip_query, variant_filename,
};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

/// Options shared by both modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcsetOptions {
    /// Target widths; `1` stands for the original width.
    pub width: Vec<u32>,
    /// Target formats, one `<source>` each.
    pub format: Vec<String>,
    pub prefix: String,
    pub postfix: String,
    /// Directory that site-root `src` values (`/img/a.png`) resolve against.
    /// Relative values always resolve against the document's directory.
    pub root: Option<PathBuf>,
}

impl Default for SrcsetOptions {
    fn default() -> Self {
        Self {
            width: Vec::new(),
            format: Vec::new(),
            prefix: "@".to_string(),
            postfix: "w".to_string(),
            root: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrcsetMode {
    /// `img[src]`, width probed from the file, element moved into `<picture>`.
    RewriteSrc,
    /// `img[srcset]`, width read from the descriptor, element kept in place.
    AugmentSrcset,
}

impl SrcsetMode {
    fn selector(self) -> &'static str {
        match self {
            SrcsetMode::RewriteSrc => "img[src]",
            SrcsetMode::AugmentSrcset => "img[srcset]",
        }
    }
}

pub struct SrcsetTransformer {
    options: SrcsetOptions,
    mode: SrcsetMode,
    backend: Option<Arc<dyn ImageBackend>>,
}

/// An image about to be wrapped: the URL, its size and the descriptor unit.
struct Original<'a> {
    url: &'a str,
    size: u32,
    unit: DescriptorUnit,
}

impl SrcsetTransformer {
    /// Upgrade plain `<img src>` elements, probing widths through `backend`.
    ///
    /// Without a backend every element is skipped.
    pub fn rewrite_src(
        options: SrcsetOptions,
        backend: Option<Arc<dyn ImageBackend>>,
    ) -> Result<Self, TransformError> {
        Self::with_mode(options, SrcsetMode::RewriteSrc, backend)
    }

    /// Augment `<img srcset="url 800w">` elements with a `<picture>` sibling.
    pub fn augment_srcset(options: SrcsetOptions) -> Result<Self, TransformError> {
        Self::with_mode(options, SrcsetMode::AugmentSrcset, None)
    }

    fn with_mode(
        options: SrcsetOptions,
        mode: SrcsetMode,
        backend: Option<Arc<dyn ImageBackend>>,
    ) -> Result<Self, TransformError> {
        if options.width.is_empty() {
            return Err(TransformError::EmptySizes);
        }
        if options.format.is_empty() {
            return Err(TransformError::EmptyFormats);
        }
        Ok(Self {
            options,
            mode,
            backend,
        })
    }

    pub fn mode(&self) -> SrcsetMode {
        self.mode
    }

    pub fn options(&self) -> &SrcsetOptions {
        &self.options
    }

    /// `srcset` value for one format.
    fn srcset_value(&self, original: &Original<'_>, format: &str) -> String {
        let name = split_extension(strip_query(original.url));
        let unit = original.unit.as_char();
        candidate_sizes(&self.options.width, original.size)
            .into_iter()
            .map(|size| {
                if size == 1 {
                    let url = original_filename(name.filename, format);
                    format!("{url} {}{unit}", original.size)
                } else {
                    let url = variant_filename(
                        name.filename,
                        &self.options.prefix,
                        size,
                        &self.options.postfix,
                        format,
                    );
                    format!("{url} {size}{unit}")
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// A detached `<picture>` holding one `<source>` per format, in order.
    fn build_picture(&self, doc: &mut dyn DocumentModel, original: &Original<'_>) -> NodeId {
        let extension = split_extension(strip_query(original.url)).extension;
        let picture = doc.create_element("picture");
        for format in &self.options.format {
            let source = doc.create_element("source");
            if format != extension {
                doc.set_attr(source, "type", &format!("image/{format}"));
            }
            doc.set_attr(source, "srcset", &self.srcset_value(original, format));
            doc.append_child(picture, source);
        }
        picture
    }

    fn transform_src(
        &self,
        doc: &mut dyn DocumentModel,
        extras: &TransformerExtras,
    ) -> Result<TransformSummary, TransformError> {
        let nodes = doc.select(self.mode.selector())?;
        let mut summary = TransformSummary::new(self.name(), nodes.len());

        let mut jobs: Vec<(NodeId, String, PathBuf)> = Vec::new();
        for node in nodes {
            let src = doc.attr(node, "src").unwrap_or_default().to_string();
            if src.is_empty() {
                summary.skip(src, "empty src");
            } else if is_external(&src) {
                summary.skip(src, "external source");
            } else {
                let base = match &self.options.root {
                    Some(root) if src.starts_with('/') => root.as_path(),
                    _ => extras.dirname.as_path(),
                };
                let path = resolve_source(base, &src);
                jobs.push((node, src, path));
            }
        }

        let Some(backend) = &self.backend else {
            for (_, src, _) in jobs {
                summary.skip(src, "no image backend available");
            }
            return Ok(summary);
        };

        let probes: Vec<_> = jobs
            .par_iter()
            .map(|(_, _, path)| backend.identify(path))
            .collect();

        for ((node, src, _), probe) in jobs.into_iter().zip(probes) {
            match probe {
                Ok(Dimensions { width, .. }) => {
                    let original = Original {
                        url: &src,
                        size: width,
                        unit: DescriptorUnit::Width,
                    };
                    let picture = self.build_picture(doc, &original);
                    doc.set_attr(node, "src", &src);
                    doc.insert_after(node, picture);
                    doc.append_child(picture, node);
                    summary.rewritten += 1;
                }
                Err(e) => summary.skip(src, e),
            }
        }
        Ok(summary)
    }

    fn transform_srcset(
        &self,
        doc: &mut dyn DocumentModel,
    ) -> Result<TransformSummary, TransformError> {
        let nodes = doc.select(self.mode.selector())?;
        let mut summary = TransformSummary::new(self.name(), nodes.len());

        for node in nodes {
            let value = doc.attr(node, "srcset").unwrap_or_default().to_string();
            let descriptor = match parse_descriptor(&value) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    summary.skip(value, e);
                    continue;
                }
            };
            let original = Original {
                url: &descriptor.url,
                size: descriptor.size,
                unit: descriptor.unit,
            };
            doc.set_attr(node, "src", &descriptor.url);
            let picture = self.build_picture(doc, &original);
            let copy = doc.deep_clone(node);
            doc.append_child(picture, copy);
            doc.insert_after(node, picture);
            summary.rewritten += 1;
        }
        Ok(summary)
    }
}

impl Transformer for SrcsetTransformer {
    fn name(&self) -> &'static str {
        match self.mode {
            SrcsetMode::RewriteSrc => "srcset",
            SrcsetMode::AugmentSrcset => "srcset-augment",
        }
    }

    fn transform(
        &self,
        doc: &mut dyn DocumentModel,
        extras: &TransformerExtras,
    ) -> Result<TransformSummary, TransformError> {
        match self.mode {
            SrcsetMode::RewriteSrc => self.transform_src(doc, extras),
            SrcsetMode::AugmentSrcset => self.transform_srcset(doc),
        }
    }
}
