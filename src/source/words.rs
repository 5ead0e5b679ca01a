//! Word tokens of free text.

use crate::models::{Origin, RawRecord};
use crate::pipeline::presets::WORD_FIELD;
use std::collections::BTreeMap;

/// Lowercased whitespace tokens with surrounding punctuation trimmed.
///
/// Every whitespace-separated token is a candidate, so the record total is
/// the word count of the text. Tokens without letters or digits are
/// malformed.
pub(super) fn tokenize(text: &str, source: &str) -> Vec<RawRecord> {
    let mut records = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        for token in line.split_whitespace() {
            let origin = Origin::new(source, idx + 1);
            let word = normalize(token);
            if word.is_empty() {
                records.push(RawRecord::malformed(
                    origin,
                    format!("token '{}' has no letters or digits", token),
                ));
                continue;
            }
            let mut fields = BTreeMap::new();
            fields.insert(WORD_FIELD.to_string(), word);
            records.push(RawRecord::fields(origin, fields));
        }
    }

    records
}

fn normalize(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawBody;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Hello,"), "hello");
        assert_eq!(normalize("\"Rust's\""), "rust's");
        assert_eq!(normalize("--"), "");
    }

    #[test]
    fn test_tokenize() {
        let text = "The cat.\n\n  -- the DOG!";
        let records = tokenize(text, "t.txt");

        // One candidate per whitespace token
        assert_eq!(records.len(), text.split_whitespace().count());

        let words: Vec<String> = records
            .iter()
            .filter_map(|r| match &r.body {
                RawBody::Fields(f) => Some(f[WORD_FIELD].clone()),
                RawBody::Malformed(_) => None,
            })
            .collect();
        assert_eq!(words, vec!["the", "cat", "the", "dog"]);
        assert!(matches!(records[2].body, RawBody::Malformed(_)));
        assert_eq!(records[2].origin.line, 3);
    }
}
