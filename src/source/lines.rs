//! Pattern-matched line records.

use crate::models::{Origin, RawRecord};
use regex::Regex;
use std::collections::BTreeMap;

/// One raw record per line; fields are the named captures.
///
/// Blank lines count as malformed records.
pub(super) fn parse_lines(text: &str, source: &str, pattern: &Regex) -> Vec<RawRecord> {
    let names: Vec<&str> = pattern.capture_names().flatten().collect();

    text.lines()
        .enumerate()
        .map(|(idx, line)| {
            let origin = Origin::new(source, idx + 1);
            if line.trim().is_empty() {
                return RawRecord::malformed(origin, "blank line");
            }
            match pattern.captures(line.trim()) {
                Some(caps) => {
                    let fields: BTreeMap<String, String> = names
                        .iter()
                        .filter_map(|name| {
                            caps.name(name)
                                .map(|m| (name.to_string(), m.as_str().to_string()))
                        })
                        .collect();
                    RawRecord::fields(origin, fields)
                }
                None => RawRecord::malformed(origin, "line does not match the expected pattern"),
            }
        })
        .collect()
}
