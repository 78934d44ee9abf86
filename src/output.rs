//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Rewrite
//!
//! One block per document, printed as each document finishes:
//!
//! ```text
//! public/index.html
//!     srcset: 3 of 4 rewritten
//!         skipped https://cdn.example.com/logo.png: external source
//!     lqip: 3 of 3 rewritten
//! public/feed.xml (passed through)
//! public/broken.html FAILED: lqip failed: missing required parameter `base`
//!
//! Rewrote 1 document, 1 failed
//! ```
//!
//! ## Check
//!
//! ```text
//! Pipeline
//! 001 srcset
//! 002 lqip
//! ```
//!
//! # Architecture
//!
//! Each block has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::pipeline::PipelineEvent;
use crate::transform::TransformSummary;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Lines for one transformer's summary, nested under its document.
pub fn format_summary(summary: &TransformSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "{}{}: {} of {} rewritten",
        indent(1),
        summary.transformer,
        summary.rewritten,
        summary.matched
    )];
    for skipped in &summary.skipped {
        lines.push(format!(
            "{}skipped {}: {}",
            indent(2),
            skipped.source,
            skipped.reason
        ));
    }
    lines
}

/// Format a pipeline event as display lines.
pub fn format_pipeline_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::UnitProcessed { path, summaries } => {
            let mut lines = vec![path.display().to_string()];
            for summary in summaries {
                lines.extend(format_summary(summary));
            }
            lines
        }
        PipelineEvent::UnitPassedThrough { path } => {
            vec![format!("{} (passed through)", path.display())]
        }
        PipelineEvent::UnitFailed { path, error } => {
            vec![format!("{} FAILED: {}", path.display(), error)]
        }
    }
}

/// Final line of a rewrite run.
pub fn format_rewrite_totals(rewritten: usize, failed: usize) -> String {
    if failed == 0 {
        format!("Rewrote {}", plural(rewritten, "document"))
    } else {
        format!("Rewrote {}, {} failed", plural(rewritten, "document"), failed)
    }
}

/// Pipeline steps in run order, for `check`.
pub fn format_pipeline_steps(steps: &[&str]) -> Vec<String> {
    let mut lines = vec!["Pipeline".to_string()];
    if steps.is_empty() {
        lines.push(format!("{}(empty: documents are passed through unchanged)", indent(1)));
    }
    for (i, step) in steps.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), step));
    }
    lines
}

pub fn print_pipeline_event(event: &PipelineEvent) {
    for line in format_pipeline_event(event) {
        println!("{}", line);
    }
}

pub fn print_pipeline_steps(steps: &[&str]) {
    for line in format_pipeline_steps(steps) {
        println!("{}", line);
    }
}
