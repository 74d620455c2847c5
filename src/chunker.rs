//! Splits file content into prompt-sized units on line boundaries.
//!
//! Units are lossless: concatenating unit texts in order reconstructs the
//! file byte-for-byte, and line ranges are contiguous with no gaps or
//! overlap. Line numbers are 1-based and file-absolute.

use std::sync::Arc;

use tracing::debug;

use crate::discovery::ScanTarget;
use crate::error::{Result, ScanError};

/// One analyzable piece of a file.
#[derive(Debug, Clone)]
pub struct CodeUnit {
    pub target: Arc<ScanTarget>,
    pub text: String,
    /// First line of this unit in the file, 1-based.
    pub start_line: usize,
    /// Last line of this unit in the file, inclusive.
    pub end_line: usize,
    /// Position of this unit within the file's unit sequence, 0-based.
    pub index: usize,
}

impl CodeUnit {
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    /// Warning scope for this unit, `path#unit-N`.
    pub fn scope(&self) -> String {
        format!("{}#unit-{}", self.target.path.display(), self.index)
    }
}

/// Splits `content` into units of at most `max_unit_bytes`, never breaking
/// inside a line. A single line over the budget becomes its own unit.
pub fn chunk_content(
    target: &Arc<ScanTarget>,
    content: &str,
    max_unit_bytes: usize,
) -> Vec<CodeUnit> {
    let line_total = content.split_inclusive('\n').count().max(1);

    if content.len() <= max_unit_bytes {
        return vec![CodeUnit {
            target: Arc::clone(target),
            text: content.to_string(),
            start_line: 1,
            end_line: line_total,
            index: 0,
        }];
    }

    let mut units = Vec::new();
    let mut buf = String::new();
    let mut start_line = 1;
    let mut line_no = 0;

    for line in content.split_inclusive('\n') {
        line_no += 1;
        if !buf.is_empty() && buf.len() + line.len() > max_unit_bytes {
            units.push(CodeUnit {
                target: Arc::clone(target),
                text: std::mem::take(&mut buf),
                start_line,
                end_line: line_no - 1,
                index: units.len(),
            });
            start_line = line_no;
        }
        buf.push_str(line);
    }
    if !buf.is_empty() {
        units.push(CodeUnit {
            target: Arc::clone(target),
            text: buf,
            start_line,
            end_line: line_no,
            index: units.len(),
        });
    }

    debug!(
        path = %target.path.display(),
        units = units.len(),
        bytes = content.len(),
        "chunked file"
    );
    units
}

/// Reads and chunks a file, decoding as UTF-8.
pub fn chunk_file(target: &Arc<ScanTarget>, max_unit_bytes: usize) -> Result<Vec<CodeUnit>> {
    let bytes = std::fs::read(&target.path).map_err(|source| ScanError::Io {
        path: target.path.display().to_string(),
        source,
    })?;
    let content = String::from_utf8(bytes)
        .map_err(|_| ScanError::Decode(target.path.display().to_string()))?;
    Ok(chunk_content(target, &content, max_unit_bytes))
}
