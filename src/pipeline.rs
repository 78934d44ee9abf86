//! Pipeline driver.
//!
//! A [`Pipeline`] is an ordered list of [`Transformer`]s. For each document
//! it parses the HTML once, runs every transformer against the same tree in
//! the configured order, and serializes the result:
//!
//! ```text
//! Unit (path + bytes)
//!   → Document::parse
//!   → transformer 1 → transformer 2 → ...   (sequential, same tree)
//!   → serialize → Unit (path + new bytes)
//! ```
//!
//! The first transformer error aborts the document: the remaining
//! transformers are not run and no output is produced for that unit. Other
//! units are unaffected.
//!
//! ## Parallel Processing
//!
//! Units are independent and are processed in parallel using
//! [rayon](https://docs.rs/rayon). Results come back in input order; progress
//! is reported as [`PipelineEvent`]s on an optional channel as each unit
//! finishes.

use crate::config::{PipelineConfig, TransformKind};
use crate::document::{Document, DocumentModel};
use crate::imaging::ImageBackend;
use crate::transform::{
    LqipTransformer, SrcsetTransformer, TransformError, TransformSummary, Transformer,
    TransformerExtras,
};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{transformer} failed: {source}")]
    Transform {
        transformer: &'static str,
        #[source]
        source: TransformError,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A unit that could not be processed.
#[derive(Error, Debug)]
#[error("{}: {source}", .path.display())]
pub struct UnitError {
    pub path: PathBuf,
    #[source]
    pub source: PipelineError,
}

/// Payload of a [`Unit`].
#[derive(Clone, PartialEq, Eq)]
pub enum Contents {
    /// No payload (e.g. a directory entry).
    Null,
    /// Payload is streamed elsewhere and not available as bytes.
    Stream,
    Buffer(Vec<u8>),
}

impl fmt::Debug for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contents::Null => f.write_str("Null"),
            Contents::Stream => f.write_str("Stream"),
            Contents::Buffer(bytes) => write!(f, "Buffer({} bytes)", bytes.len()),
        }
    }
}

/// A file-like unit flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub path: PathBuf,
    pub contents: Contents,
}

impl Unit {
    pub fn new(path: impl Into<PathBuf>, contents: Contents) -> Self {
        Self {
            path: path.into(),
            contents,
        }
    }

    /// Unit holding `bytes`.
    pub fn buffer(path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(path, Contents::Buffer(bytes.into()))
    }

    /// Read a file into a buffered unit.
    pub fn read(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let bytes = std::fs::read(&path)?;
        Ok(Self::buffer(path, bytes))
    }

    /// Directory of the unit's path, used as transformer context.
    pub fn dirname(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new(""))
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.contents {
            Contents::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Progress reported by [`Pipeline::process_units`].
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// All transformers ran; one summary per transformer, in pipeline order.
    UnitProcessed {
        path: PathBuf,
        summaries: Vec<TransformSummary>,
    },
    /// The unit had no buffer and was passed on unchanged.
    UnitPassedThrough { path: PathBuf },
    UnitFailed { path: PathBuf, error: String },
}

/// Ordered composition of transformers.
#[derive(Default)]
pub struct Pipeline {
    transformers: Vec<Box<dyn Transformer>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transformer.
    pub fn pipe(mut self, transformer: impl Transformer + 'static) -> Self {
        self.transformers.push(Box::new(transformer));
        self
    }

    pub fn push(&mut self, transformer: Box<dyn Transformer>) {
        self.transformers.push(transformer);
    }

    /// Build the transformers listed in `config.pipeline`, in order.
    ///
    /// `backend` is handed to every transformer that needs image access.
    pub fn from_config(
        config: &PipelineConfig,
        backend: Option<Arc<dyn ImageBackend>>,
    ) -> Result<Self, TransformError> {
        let mut pipeline = Self::new();
        for kind in &config.pipeline {
            let transformer: Box<dyn Transformer> = match kind {
                TransformKind::Srcset => Box::new(SrcsetTransformer::rewrite_src(
                    config.srcset.to_options(),
                    backend.clone(),
                )?),
                TransformKind::SrcsetAugment => Box::new(SrcsetTransformer::augment_srcset(
                    config.srcset.to_options(),
                )?),
                TransformKind::Lqip => Box::new(LqipTransformer::new(
                    config.lqip.to_options(),
                    backend.clone(),
                )?),
            };
            pipeline.push(transformer);
        }
        Ok(pipeline)
    }

    /// Names of the transformers, in run order.
    pub fn steps(&self) -> Vec<&'static str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Run every transformer against `doc`, in order.
    ///
    /// Stops at the first transformer error; mutations made by earlier
    /// transformers stay in `doc`.
    pub fn run(
        &self,
        doc: &mut dyn DocumentModel,
        extras: &TransformerExtras,
    ) -> Result<Vec<TransformSummary>, PipelineError> {
        let mut summaries = Vec::with_capacity(self.transformers.len());
        for transformer in &self.transformers {
            let summary = transformer.transform(doc, extras).map_err(|source| {
                PipelineError::Transform {
                    transformer: transformer.name(),
                    source,
                }
            })?;
            summaries.push(summary);
        }
        Ok(summaries)
    }

    /// Parse `html`, run the pipeline, and serialize the result.
    ///
    /// A document no transformer edited is returned as given, byte for byte.
    pub fn process_html(
        &self,
        html: &str,
        extras: &TransformerExtras,
    ) -> Result<(String, Vec<TransformSummary>), PipelineError> {
        let mut doc = Document::parse(html);
        let summaries = self.run(&mut doc, extras)?;
        let output = if doc.is_modified() {
            doc.serialize()
        } else {
            html.to_string()
        };
        Ok((output, summaries))
    }

    /// Process one unit. Units without a buffer pass through unchanged.
    pub fn process_unit(&self, unit: Unit) -> Result<Unit, UnitError> {
        self.process_unit_inner(unit).map(|(unit, _)| unit)
    }

    fn process_unit_inner(
        &self,
        unit: Unit,
    ) -> Result<(Unit, Option<Vec<TransformSummary>>), UnitError> {
        let Some(bytes) = unit.bytes() else {
            return Ok((unit, None));
        };
        let (output, summaries) = {
            let html = String::from_utf8_lossy(bytes);
            let extras = TransformerExtras::new(unit.dirname());
            self.process_html(&html, &extras)
                .map_err(|source| UnitError {
                    path: unit.path.clone(),
                    source,
                })?
        };
        Ok((
            Unit::buffer(unit.path, output.into_bytes()),
            Some(summaries),
        ))
    }

    /// Process independent units in parallel.
    ///
    /// Returns one result per input, in input order. A failed unit does not
    /// affect the others.
    pub fn process_units(
        &self,
        units: Vec<Unit>,
        events: Option<Sender<PipelineEvent>>,
    ) -> Vec<Result<Unit, UnitError>> {
        units
            .into_par_iter()
            .map_with(events, |events, unit| {
                let path = unit.path.clone();
                let result = self.process_unit_inner(unit);
                if let Some(tx) = events {
                    let outcome = result.as_ref().map(|(_, summaries)| summaries.as_ref());
                    tx.send(unit_event(path, outcome)).ok();
                }
                result.map(|(unit, _)| unit)
            })
            .collect()
    }

    /// Read, process and write HTML files in parallel.
    ///
    /// Each `(source, target)` pair is handled on its own: a file that cannot
    /// be read, processed or written is reported as failed and the others
    /// carry on. Returns one result per pair, in input order, holding the
    /// written target.
    pub fn rewrite_files(
        &self,
        files: &[(PathBuf, PathBuf)],
        events: Option<Sender<PipelineEvent>>,
    ) -> Vec<Result<PathBuf, UnitError>> {
        files
            .par_iter()
            .map_with(events, |events, (source, target)| {
                let result = self.rewrite_file(source, target);
                if let Some(tx) = events {
                    let outcome = result.as_ref().map(Some);
                    tx.send(unit_event(source.clone(), outcome)).ok();
                }
                result.map(|_| target.clone())
            })
            .collect()
    }

    fn rewrite_file(
        &self,
        source: &Path,
        target: &Path,
    ) -> Result<Vec<TransformSummary>, UnitError> {
        let io_error = |e: std::io::Error| UnitError {
            path: source.to_path_buf(),
            source: PipelineError::Io(e),
        };
        let unit = Unit::read(source).map_err(io_error)?;
        let (unit, summaries) = self.process_unit_inner(unit)?;
        if let Some(bytes) = unit.bytes() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(io_error)?;
            }
            std::fs::write(target, bytes).map_err(io_error)?;
        }
        Ok(summaries.unwrap_or_default())
    }
}

fn unit_event(
    path: PathBuf,
    outcome: Result<Option<&Vec<TransformSummary>>, &UnitError>,
) -> PipelineEvent {
    match outcome {
        Ok(Some(summaries)) => PipelineEvent::UnitProcessed {
            path,
            summaries: summaries.clone(),
        },
        Ok(None) => PipelineEvent::UnitPassedThrough { path },
        Err(e) => PipelineEvent::UnitFailed {
            path,
            error: e.source.to_string(),
        },
    }
}
