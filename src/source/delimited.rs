//! Delimited text with a header row.

use crate::error::{BatchError, BatchResult};
use crate::models::{Origin, RawRecord};
use std::collections::BTreeMap;
use std::path::Path;

/// Rows of an already decoded source file.
pub(super) fn read_rows(
    text: &str,
    path: &Path,
    source: &str,
    delimiter: u8,
) -> BatchResult<Vec<RawRecord>> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    parse_rows(reader, source).map_err(|e| BatchError::source(path, e))
}

/// Header errors are fatal for the source; row errors become malformed records.
fn parse_rows<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    source: &str,
) -> Result<Vec<RawRecord>, csv::Error> {
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header line
        let fallback_line = idx + 2;

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_line);
                records.push(RawRecord::malformed(
                    Origin::new(source, line),
                    format!("CSV parse error: {}", e),
                ));
                continue;
            }
        };

        let line = row
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(fallback_line);
        let origin = Origin::new(source, line);

        if row.len() != headers.len() {
            records.push(RawRecord::malformed(
                origin,
                format!("expected {} columns, found {}", headers.len(), row.len()),
            ));
            continue;
        }

        let fields: BTreeMap<String, String> = headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        records.push(RawRecord::fields(origin, fields));
    }

    Ok(records)
}
