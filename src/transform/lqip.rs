//! Low-quality image placeholders.
//!
//! Each matched image is wrapped in a `<div>` that reserves the image's
//! aspect ratio and shows a tiny blurred preview as its background until the
//! real image has loaded:
//!
//! ```text
//! <img src="a.png" class="hero">
//!
//! <div style="padding-top: 50.0000%; background-image: url(data:image/jpeg;base64,...);"
//!      class="lqip blur hero">
//!   <img src="a.png" class="" onload="this.parentElement.classList.remove('blur')">
//! </div>
//! ```
//!
//! Previews and dimensions come from the [`ImageBackend`]. Without one the
//! transformer leaves every element alone; only the optional stylesheet is
//! still injected.

use super::{TransformError, TransformSummary, Transformer, TransformerExtras, resolve_source};
use crate::document::{DocumentModel, NodeId, parse_selector};
use crate::imaging::{
    BackendError, Dimensions, ImageBackend, PreviewParams, Quality, aspect_padding,
};
use crate::naming::is_external;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

/// Stylesheet that pairs with the generated wrappers.
pub const LQIP_STYLES: &str = "\
.lqip { position: relative; height: 0; overflow: hidden; \
background-size: cover; background-position: center; background-repeat: no-repeat; } \
.lqip > img { position: absolute; top: 0; left: 0; width: 100%; height: 100%; \
transition: opacity 0.3s ease-in; } \
.lqip.blur > img { opacity: 0; } \
.lqip.blur { filter: blur(8px); }";

const ONLOAD: &str = "this.parentElement.classList.remove('blur')";

#[derive(Debug, Clone, PartialEq)]
pub struct LqipOptions {
    /// Directory image URLs resolve against. Required.
    pub base: Option<PathBuf>,
    /// Elements to wrap.
    pub query: String,
    /// Append [`LQIP_STYLES`] to the document's `<head>`.
    pub add_styles: bool,
    pub preview_width: u32,
    pub quality: Quality,
}

impl Default for LqipOptions {
    fn default() -> Self {
        Self {
            base: None,
            query: "img[src]".to_string(),
            add_styles: false,
            preview_width: PreviewParams::default().width,
            quality: Quality::default(),
        }
    }
}

pub struct LqipTransformer {
    base: PathBuf,
    query: String,
    add_styles: bool,
    preview: PreviewParams,
    backend: Option<Arc<dyn ImageBackend>>,
}

/// Everything needed to wrap one element.
struct Placeholder {
    data_uri: String,
    dimensions: Dimensions,
}

impl LqipTransformer {
    /// Fails when `base` is missing or the query does not parse.
    ///
    /// `backend` is the single capability check: `None` turns the transformer
    /// into a no-op for element rewriting.
    pub fn new(
        options: LqipOptions,
        backend: Option<Arc<dyn ImageBackend>>,
    ) -> Result<Self, TransformError> {
        let base = match options.base {
            Some(base) if !base.as_os_str().is_empty() => base,
            _ => return Err(TransformError::MissingBase),
        };
        parse_selector(&options.query)?;
        Ok(Self {
            base,
            query: options.query,
            add_styles: options.add_styles,
            preview: PreviewParams {
                width: options.preview_width,
                quality: options.quality,
                ..PreviewParams::default()
            },
            backend,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    fn inject_styles(&self, doc: &mut dyn DocumentModel) -> Result<(), TransformError> {
        if let Some(&head) = doc.select("head")?.first() {
            let style = doc.create_element("style");
            let css = doc.create_text(LQIP_STYLES);
            doc.append_child(style, css);
            doc.append_child(head, style);
        }
        Ok(())
    }

    fn wrap(&self, doc: &mut dyn DocumentModel, node: NodeId, data_uri: &str, padding: &str) {
        let wrapper = doc.create_element("div");
        doc.set_style(wrapper, "padding-top", padding);
        doc.set_style(wrapper, "background-image", &format!("url({data_uri})"));
        let mut classes = vec!["lqip".to_string(), "blur".to_string()];
        classes.extend(doc.classes(node));
        doc.set_classes(wrapper, &classes);

        let clone = doc.deep_clone(node);
        doc.set_attr(clone, "onload", ONLOAD);
        doc.set_attr(clone, "class", "");
        doc.append_child(wrapper, clone);
        doc.replace_with(node, wrapper);
    }
}

impl Transformer for LqipTransformer {
    fn name(&self) -> &'static str {
        "lqip"
    }

    fn transform(
        &self,
        doc: &mut dyn DocumentModel,
        _extras: &TransformerExtras,
    ) -> Result<TransformSummary, TransformError> {
        if self.add_styles {
            self.inject_styles(doc)?;
        }
        let Some(backend) = &self.backend else {
            return Ok(TransformSummary::new(self.name(), 0));
        };

        let nodes = doc.select(&self.query)?;
        let mut summary = TransformSummary::new(self.name(), nodes.len());

        let mut jobs: Vec<(NodeId, String, PathBuf)> = Vec::new();
        for node in nodes {
            match doc.attr(node, "src") {
                None | Some("") => {
                    let tag = doc.tag_name(node).unwrap_or_default();
                    summary.skip(format!("<{tag}>"), "no src attribute");
                }
                Some(src) if is_external(src) => summary.skip(src, "external source"),
                Some(src) => {
                    let path = resolve_source(&self.base, src);
                    jobs.push((node, src.to_string(), path));
                }
            }
        }

        let placeholders: Vec<Result<Placeholder, BackendError>> = jobs
            .par_iter()
            .map(|(_, _, path)| {
                let (data_uri, dimensions) = rayon::join(
                    || backend.encode_preview(path, &self.preview),
                    || backend.identify(path),
                );
                Ok(Placeholder {
                    data_uri: data_uri?,
                    dimensions: dimensions?,
                })
            })
            .collect();

        for ((node, src, _), placeholder) in jobs.into_iter().zip(placeholders) {
            let placeholder = match placeholder {
                Ok(placeholder) => placeholder,
                Err(e) => {
                    summary.skip(src, e);
                    continue;
                }
            };
            let Some(padding) = aspect_padding(placeholder.dimensions) else {
                summary.skip(src, "image has zero width");
                continue;
            };
            self.wrap(doc, node, &placeholder.data_uri, &padding);
            summary.rewritten += 1;
        }
        Ok(summary)
    }
}
