//! Character tokens of free text.

use crate::models::{Origin, RawRecord};
use crate::pipeline::presets::CHAR_FIELD;
use std::collections::BTreeMap;

/// One record per letter or digit, case preserved. Everything else is
/// not a candidate.
pub(super) fn characters(text: &str, source: &str) -> Vec<RawRecord> {
    text.lines()
        .enumerate()
        .flat_map(|(idx, line)| {
            line.chars()
                .filter(|c| c.is_alphanumeric())
                .map(move |c| {
                    let mut fields = BTreeMap::new();
                    fields.insert(CHAR_FIELD.to_string(), c.to_string());
                    RawRecord::fields(Origin::new(source, idx + 1), fields)
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawBody;

    fn chars_of(records: &[RawRecord]) -> String {
        records
            .iter()
            .map(|r| match &r.body {
                RawBody::Fields(f) => f[CHAR_FIELD].clone(),
                other => panic!("unexpected {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_characters() {
        let records = characters("Ab, 1!\n\n  é-b", "t.txt");
        assert_eq!(chars_of(&records), "Ab1éb");
        assert_eq!(records[0].origin.line, 1);
        assert_eq!(records[3].origin.line, 3);
    }

    #[test]
    fn test_no_alphanumerics() {
        assert!(characters(" -- !? \n", "t.txt").is_empty());
    }
}
