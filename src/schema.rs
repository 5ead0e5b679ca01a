//! Record schema and validation.
//!
//! A [`Schema`] turns a [`RawRecord`] into a typed [`Record`] or a
//! [`Rejected`] marker. Invalid input is data: validation never fails
//! the batch.

use crate::error::{BatchError, BatchResult};
use crate::models::{RawBody, RawRecord, Record, RejectReason, Rejected, Value};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Expected type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Integer,
    Float,
    Date,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "text"),
            FieldType::Integer => write!(f, "integer"),
            FieldType::Float => write!(f, "number"),
            FieldType::Date => write!(f, "date"),
        }
    }
}

/// Declaration of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,

    #[serde(rename = "type", default)]
    pub kind: FieldType,

    /// Inclusive lower bound for numeric fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Inclusive upper bound for numeric fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(default = "default_required")]
    pub required: bool,

    /// chrono format string for date fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
}

fn default_required() -> bool {
    true
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Self {
            name: name.into(),
            kind,
            min: None,
            max: None,
            required: true,
            date_format: None,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Date)
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn at_least(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Coerce trimmed text into this field's type and check its range.
    fn coerce(&self, text: &str) -> Result<Value, RejectReason> {
        let mismatch = || RejectReason::TypeMismatch {
            field: self.name.clone(),
            expected: self.kind.to_string(),
            found: text.to_string(),
        };

        let value = match self.kind {
            FieldType::Text => Value::Text(text.to_string()),
            FieldType::Integer => Value::Integer(text.parse::<i64>().map_err(|_| mismatch())?),
            FieldType::Float => {
                let v = text.parse::<f64>().map_err(|_| mismatch())?;
                if !v.is_finite() {
                    return Err(mismatch());
                }
                Value::Float(v)
            }
            FieldType::Date => {
                let format = self.date_format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
                Value::Date(NaiveDate::parse_from_str(text, format).map_err(|_| mismatch())?)
            }
        };

        if let Some(v) = value.as_f64() {
            let below = self.min.is_some_and(|min| v < min);
            let above = self.max.is_some_and(|max| v > max);
            if below || above {
                return Err(RejectReason::OutOfRange {
                    field: self.name.clone(),
                    value: v,
                    min: self.min,
                    max: self.max,
                });
            }
        }

        Ok(value)
    }
}

/// Ordered set of field declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check the declarations themselves.
    pub fn validate(&self) -> BatchResult<()> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(BatchError::InvalidPipeline(
                    "schema field with empty name".to_string(),
                ));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(BatchError::InvalidPipeline(format!(
                    "schema field '{}' declared twice",
                    field.name
                )));
            }
            if let (Some(min), Some(max)) = (field.min, field.max) {
                if min > max {
                    return Err(BatchError::InvalidPipeline(format!(
                        "schema field '{}' has min {} above max {}",
                        field.name, min, max
                    )));
                }
            }
        }
        Ok(())
    }

    /// Apply the schema to a raw record.
    ///
    /// Fields not declared in the schema are dropped. Optional fields that
    /// are absent or blank are left out of the record.
    pub fn parse_record(&self, raw: &RawRecord) -> Result<Record, Rejected> {
        let reject = |reason| Rejected::new(raw.origin.clone(), reason);

        let input = match &raw.body {
            RawBody::Fields(fields) => fields,
            RawBody::Malformed(reason) => {
                return Err(reject(RejectReason::Malformed {
                    reason: reason.clone(),
                }))
            }
        };

        let mut fields = BTreeMap::new();
        for spec in &self.fields {
            let text = input.get(&spec.name).map(|s| s.trim()).unwrap_or("");
            if text.is_empty() {
                if spec.required {
                    return Err(reject(RejectReason::MissingField {
                        field: spec.name.clone(),
                    }));
                }
                continue;
            }
            let value = spec.coerce(text).map_err(reject)?;
            fields.insert(spec.name.clone(), value);
        }

        Ok(Record::new(raw.origin.clone(), fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Origin;

    fn review_schema() -> Schema {
        Schema::new(vec![
            FieldSpec::text("ProductID"),
            FieldSpec::date("ReviewDate"),
            FieldSpec::integer("ReviewRating").range(1.0, 5.0),
            FieldSpec::text("ReviewText").optional(),
        ])
    }

    fn raw(pairs: &[(&str, &str)]) -> RawRecord {
        let fields = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RawRecord::fields(Origin::new("reviews.txt", 1), fields)
    }

    #[test]
    fn test_valid_record() {
        let record = review_schema()
            .parse_record(&raw(&[
                ("ProductID", "P100"),
                ("ReviewDate", "2024-05-01"),
                ("ReviewRating", " 4 "),
                ("ReviewText", "Great"),
                ("CustomerID", "C1"),
            ]))
            .unwrap();

        assert_eq!(record.get("ReviewRating"), Some(&Value::Integer(4)));
        assert_eq!(
            record.get("ReviewDate").and_then(Value::as_date),
            NaiveDate::from_ymd_opt(2024, 5, 1)
        );
        // Undeclared fields are dropped
        assert!(record.get("CustomerID").is_none());
    }

    #[test]
    fn test_rating_out_of_range() {
        let rejected = review_schema()
            .parse_record(&raw(&[
                ("ProductID", "P100"),
                ("ReviewDate", "2024-05-01"),
                ("ReviewRating", "6"),
            ]))
            .unwrap_err();

        assert!(matches!(
            rejected.reason,
            RejectReason::OutOfRange { ref field, value, .. } if field == "ReviewRating" && value == 6.0
        ));
    }

    #[test]
    fn test_missing_required_field() {
        let rejected = review_schema()
            .parse_record(&raw(&[("ReviewDate", "2024-05-01"), ("ReviewRating", "3")]))
            .unwrap_err();

        assert_eq!(
            rejected.reason,
            RejectReason::MissingField {
                field: "ProductID".into()
            }
        );
    }

    #[test]
    fn test_optional_field_absent() {
        let record = review_schema()
            .parse_record(&raw(&[
                ("ProductID", "P1"),
                ("ReviewDate", "2024-05-01"),
                ("ReviewRating", "5"),
                ("ReviewText", "   "),
            ]))
            .unwrap();
        assert!(record.get("ReviewText").is_none());
    }

    #[test]
    fn test_type_mismatch() {
        let rejected = review_schema()
            .parse_record(&raw(&[
                ("ProductID", "P1"),
                ("ReviewDate", "01/05/2024"),
                ("ReviewRating", "5"),
            ]))
            .unwrap_err();
        assert!(matches!(rejected.reason, RejectReason::TypeMismatch { ref field, .. } if field == "ReviewDate"));

        let schema = Schema::new(vec![FieldSpec::float("x")]);
        assert!(schema.parse_record(&raw(&[("x", "NaN")])).is_err());
        assert!(schema.parse_record(&raw(&[("x", "abc")])).is_err());
    }

    #[test]
    fn test_malformed_raw_record() {
        let raw = RawRecord::malformed(Origin::new("x.txt", 7), "line does not match pattern");
        let rejected = review_schema().parse_record(&raw).unwrap_err();
        assert_eq!(rejected.origin.line, 7);
        assert!(matches!(rejected.reason, RejectReason::Malformed { .. }));
    }

    #[test]
    fn test_schema_validation() {
        assert!(review_schema().validate().is_ok());

        let dup = Schema::new(vec![FieldSpec::text("a"), FieldSpec::integer("a")]);
        assert!(dup.validate().is_err());

        let inverted = Schema::new(vec![FieldSpec::integer("a").range(5.0, 1.0)]);
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_parse_schema_from_toml() {
        let schema: Schema = toml::from_str(
            r#"
[[fields]]
name = "Rating"
type = "integer"
min = 1
max = 5

[[fields]]
name = "Note"
required = false
"#,
        )
        .unwrap();

        assert_eq!(schema.fields[0].kind, FieldType::Integer);
        assert_eq!(schema.fields[0].max, Some(5.0));
        assert_eq!(schema.fields[1].kind, FieldType::Text);
        assert!(!schema.fields[1].required);
    }
}
