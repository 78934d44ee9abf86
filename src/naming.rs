//! Filename and descriptor micro-syntax shared by the transformers.
//!
//! Responsive variants live next to the original image and follow one
//! naming pattern, so a `src` value is enough to derive every variant URL:
//!
//! - `img/photo.jpg` → filename `img/photo`, extension `jpg`
//! - width 400, prefix `@`, postfix `w`, format `webp` → `img/photo@400w.webp`
//! - the original size in another format → `img/photo.webp`
//!
//! Query strings and fragments are not part of a name ([`strip_query`]).
//!
//! Existing `srcset` attributes are read through [`parse_descriptor`], which
//! accepts exactly one `"<url> <number><unit>"` candidate.

use thiserror::Error;

/// Result of splitting a URL or path into filename and extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitName<'a> {
    /// Everything before the final extension (directories included).
    pub filename: &'a str,
    /// Extension without the dot. Empty when the last segment has none.
    pub extension: &'a str,
}

/// Split `path` at the last `.` of its final segment.
///
/// - `"img/photo.jpg"` → (`"img/photo"`, `"jpg"`)
/// - `"photo.min.png"` → (`"photo.min"`, `"png"`)
/// - `"./img/photo"` → (`"./img/photo"`, `""`)
/// - `"v1.2/photo"` → (`"v1.2/photo"`, `""`)
pub fn split_extension(path: &str) -> SplitName<'_> {
    let segment_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[segment_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = segment_start + dot;
            SplitName {
                filename: &path[..dot],
                extension: &path[dot + 1..],
            }
        }
        _ => SplitName {
            filename: path,
            extension: "",
        },
    }
}

/// Compose a size-qualified variant name: `{filename}{prefix}{width}{postfix}.{format}`.
pub fn variant_filename(
    filename: &str,
    prefix: &str,
    width: u32,
    postfix: &str,
    format: &str,
) -> String {
    format!("{filename}{prefix}{width}{postfix}.{format}")
}

/// Name of the full-size variant in another format: `{filename}.{format}`.
pub fn original_filename(filename: &str, format: &str) -> String {
    format!("{filename}.{format}")
}

/// Dimension a descriptor's number refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorUnit {
    Width,
    Height,
}

impl DescriptorUnit {
    pub fn as_char(self) -> char {
        match self {
            DescriptorUnit::Width => 'w',
            DescriptorUnit::Height => 'h',
        }
    }
}

/// A single parsed `"<url> <number><unit>"` candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub url: String,
    pub size: u32,
    pub unit: DescriptorUnit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("expected a single candidate, found {0}")]
    MultipleCandidates(usize),
    #[error("missing size descriptor in {0:?}")]
    MissingDescriptor(String),
    #[error("invalid size {0:?}")]
    InvalidSize(String),
    #[error("invalid unit {0:?}, expected 'w' or 'h'")]
    InvalidUnit(char),
}

/// Parse a single-candidate `srcset` value such as `"photo.jpg 800w"`.
///
/// - `"photo.jpg 800w"` → url `photo.jpg`, size 800, unit width
/// - `"photo.jpg 600h"` → url `photo.jpg`, size 600, unit height
/// - `"photo.jpg 800x"` → [`DescriptorError::InvalidUnit`]
/// - `"photo.jpg"` → [`DescriptorError::MissingDescriptor`]
pub fn parse_descriptor(value: &str) -> Result<Descriptor, DescriptorError> {
    let candidates = value.split(',').filter(|c| !c.trim().is_empty()).count();
    if candidates > 1 {
        return Err(DescriptorError::MultipleCandidates(candidates));
    }

    let mut parts = value.split_whitespace();
    let url = parts
        .next()
        .ok_or_else(|| DescriptorError::MissingDescriptor(value.to_string()))?;
    let descriptor = parts
        .next()
        .ok_or_else(|| DescriptorError::MissingDescriptor(value.to_string()))?;
    if parts.next().is_some() {
        return Err(DescriptorError::MissingDescriptor(value.to_string()));
    }

    // Non-empty: it came out of split_whitespace.
    let unit_char = descriptor.chars().next_back().unwrap_or_default();
    let unit = match unit_char {
        'w' => DescriptorUnit::Width,
        'h' => DescriptorUnit::Height,
        other => return Err(DescriptorError::InvalidUnit(other)),
    };
    let number = &descriptor[..descriptor.len() - unit_char.len_utf8()];
    let size = number
        .parse::<u32>()
        .map_err(|_| DescriptorError::InvalidSize(number.to_string()))?;

    Ok(Descriptor {
        url: url.to_string(),
        size,
        unit,
    })
}

/// True for sources that are not files next to the document.
pub fn is_external(src: &str) -> bool {
    src.starts_with("http://")
        || src.starts_with("https://")
        || src.starts_with("//")
        || src.starts_with("data:")
}

/// The path part of a URL, without `?query` or `#fragment`.
///
/// Variant names and file lookups are derived from this part only:
/// `photo.jpg?v=1.2` names `photo@400w.webp` and reads `photo.jpg`.
pub fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}
