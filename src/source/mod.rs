//! Input readers.
//!
//! A [`SourceReader`] turns one source file into raw candidate records.
//! Shape problems inside a file (a line that does not match, a short CSV
//! row, bad JSON) become malformed raw records; only an unreadable file
//! is an error. Every format reads its file as UTF-8 text first, so a
//! file that is not valid UTF-8 is unreadable whatever its format.

mod chars;
mod delimited;
mod json;
pub mod labels;
mod lines;
mod words;

pub use labels::{find_label_file, load_labels};

use crate::error::{BatchError, BatchResult};
use crate::models::RawRecord;
use crate::pipeline::SourceFormat;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Reader compiled from a [`SourceFormat`].
#[derive(Debug, Clone)]
pub enum SourceReader {
    Lines(Regex),
    Csv(u8),
    Json,
    Words,
    Chars,
}

impl SourceReader {
    pub fn new(format: &SourceFormat) -> BatchResult<Self> {
        match format {
            SourceFormat::Lines { pattern } => Regex::new(pattern)
                .map(SourceReader::Lines)
                .map_err(|e| BatchError::InvalidPipeline(format!("bad line pattern: {}", e))),
            SourceFormat::Csv { delimiter } => {
                if !delimiter.is_ascii() {
                    return Err(BatchError::InvalidPipeline(format!(
                        "delimiter '{}' is not a single-byte character",
                        delimiter
                    )));
                }
                Ok(SourceReader::Csv(*delimiter as u8))
            }
            SourceFormat::Json => Ok(SourceReader::Json),
            SourceFormat::Words => Ok(SourceReader::Words),
            SourceFormat::Chars => Ok(SourceReader::Chars),
        }
    }

    /// Read every candidate record of a source, in file order.
    pub fn read(&self, path: &Path) -> BatchResult<Vec<RawRecord>> {
        let name = path.display().to_string();

        let records = match self {
            SourceReader::Csv(delimiter) => {
                delimited::read_rows(&read_text(path)?, path, &name, *delimiter)?
            }
            SourceReader::Lines(pattern) => lines::parse_lines(&read_text(path)?, &name, pattern),
            SourceReader::Json => json::parse_documents(&read_text(path)?, &name),
            SourceReader::Words => words::tokenize(&read_text(path)?, &name),
            SourceReader::Chars => chars::characters(&read_text(path)?, &name),
        };

        debug!("Read {} candidate records from {}", records.len(), name);
        Ok(records)
    }
}

fn read_text(path: &Path) -> BatchResult<String> {
    let bytes = fs::read(path).map_err(|e| BatchError::source(path, e))?;
    String::from_utf8(bytes).map_err(|_| BatchError::source(path, "file is not valid UTF-8 text"))
}
