//! Data models for the batch aggregator.
//!
//! This module contains the core data structures shared by the readers,
//! the aggregator and the report generators: records and their values,
//! rejection markers, summary entries and the final report.

use crate::bookings::Train;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl Value {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Date(_) | Value::Text(_) => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Where a record came from: source file and 1-based position in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub source: String,
    pub line: usize,
}

impl Origin {
    pub fn new(source: impl Into<String>, line: usize) -> Self {
        Self {
            source: source.into(),
            line,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.line)
    }
}

/// Body of a raw record as produced by a reader.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBody {
    /// Field name to untyped text.
    Fields(BTreeMap<String, String>),
    /// The input unit could not be split into fields at all.
    Malformed(String),
}

/// One candidate record before schema validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub origin: Origin,
    pub body: RawBody,
}

impl RawRecord {
    pub fn fields(origin: Origin, fields: BTreeMap<String, String>) -> Self {
        Self {
            origin,
            body: RawBody::Fields(fields),
        }
    }

    pub fn malformed(origin: Origin, reason: impl Into<String>) -> Self {
        Self {
            origin,
            body: RawBody::Malformed(reason.into()),
        }
    }
}

/// A validated record. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    origin: Origin,
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(origin: Origin, fields: BTreeMap<String, Value>) -> Self {
        Self { origin, fields }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Returns a copy of this record with one extra field.
    pub fn with_field(&self, name: impl Into<String>, value: Value) -> Self {
        let mut fields = self.fields.clone();
        fields.insert(name.into(), value);
        Self {
            origin: self.origin.clone(),
            fields,
        }
    }
}

/// Why a candidate record was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// The input unit had the wrong shape.
    Malformed { reason: String },
    /// A required field is absent or empty.
    MissingField { field: String },
    /// Type coercion failed.
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },
    /// A numeric value is outside its declared range.
    OutOfRange {
        field: String,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// A referenced entity (e.g. a train) does not exist.
    UnknownReference { field: String, value: String },
    /// The record is valid but cannot be honoured (e.g. not enough seats).
    Unavailable { reason: String },
}

impl RejectReason {
    /// Short tag of the reason, used to break down invalid counts.
    pub fn kind(&self) -> &'static str {
        match self {
            RejectReason::Malformed { .. } => "malformed",
            RejectReason::MissingField { .. } => "missing_field",
            RejectReason::TypeMismatch { .. } => "type_mismatch",
            RejectReason::OutOfRange { .. } => "out_of_range",
            RejectReason::UnknownReference { .. } => "unknown_reference",
            RejectReason::Unavailable { .. } => "unavailable",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Malformed { reason } => write!(f, "malformed record: {}", reason),
            RejectReason::MissingField { field } => write!(f, "missing field '{}'", field),
            RejectReason::TypeMismatch {
                field,
                expected,
                found,
            } => write!(f, "field '{}' expected {}, found '{}'", field, expected, found),
            RejectReason::OutOfRange {
                field,
                value,
                min,
                max,
            } => {
                let bound = |b: &Option<f64>| b.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
                write!(
                    f,
                    "field '{}' value {} outside [{}, {}]",
                    field,
                    value,
                    bound(min),
                    bound(max)
                )
            }
            RejectReason::UnknownReference { field, value } => {
                write!(f, "unknown {} '{}'", field, value)
            }
            RejectReason::Unavailable { reason } => write!(f, "{}", reason),
        }
    }
}

/// Marker for a candidate record that failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejected {
    pub origin: Origin,
    pub reason: RejectReason,
}

impl Rejected {
    pub fn new(origin: Origin, reason: RejectReason) -> Self {
        Self { origin, reason }
    }
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.origin, self.reason)
    }
}

/// Sort direction of a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Descending,
    Ascending,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::Descending => Direction::Ascending,
            Direction::Ascending => Direction::Descending,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Descending => write!(f, "highest"),
            Direction::Ascending => write!(f, "lowest"),
        }
    }
}

/// One named measure value of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureValue {
    pub name: String,
    pub value: f64,
}

/// Summary of one group: its key and the statistics computed for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// Group key.
    pub key: String,
    /// Display label from a lookup table, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Value of the ranking measure.
    pub statistic: f64,
    /// All measures in declaration order.
    pub measures: Vec<MeasureValue>,
}

impl SummaryEntry {
    pub fn measure(&self, name: &str) -> Option<f64> {
        self.measures
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value)
    }
}

/// An ordered, possibly truncated view of the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    /// Name of the measure the entries are ordered by.
    pub measure: String,
    pub direction: Direction,
    /// Truncation size; `None` keeps every group.
    pub limit: Option<usize>,
    pub entries: Vec<SummaryEntry>,
}

/// Record counters of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
}

impl RecordCounts {
    pub fn record_valid(&mut self) {
        self.total += 1;
        self.valid += 1;
    }

    pub fn record_invalid(&mut self) {
        self.total += 1;
        self.invalid += 1;
    }

    /// Share of invalid records, 0 when nothing was read.
    pub fn invalid_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.invalid as f64 / self.total as f64
        }
    }
}

/// Metadata about the batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Name of the pipeline (dataset preset or custom name).
    pub pipeline: String,
    /// Noun for the groups in prose ("products", "countries").
    pub group_label: String,
    /// Name of the group key ("Product ID").
    pub key: String,
    /// Noun for the records in prose ("words").
    #[serde(default = "crate::pipeline::default_record_label")]
    pub record_label: String,
    /// Generation time; omitted for reproducible output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    /// Sources that were read.
    pub sources: Vec<String>,
    /// Sources that were skipped as unreadable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_sources: Vec<String>,
}

/// The complete batch report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub counts: RecordCounts,
    /// Measure names in declaration order.
    pub measures: Vec<String>,
    pub ranking: Ranking,
    /// Opposite end of the ranking, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lowest: Option<Ranking>,
    /// Every group in first-seen order, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<SummaryEntry>>,
    /// Invalid records per rejection kind.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rejection_breakdown: BTreeMap<String, usize>,
    /// Bounded sample of rejected records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<Rejected>,
    /// Seat inventory after booking, for the bookings dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Vec<Train>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_as_f64() {
        assert_eq!(Value::Integer(4).as_f64(), Some(4.0));
        assert_eq!(Value::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::Text("4".into()).as_f64(), None);
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(Value::Date(date).as_f64(), None);
        assert_eq!(Value::Date(date).to_string(), "2024-03-01");
    }

    #[test]
    fn test_record_with_field_leaves_original() {
        let mut fields = BTreeMap::new();
        fields.insert("Train ID".to_string(), Value::Text("T1".into()));
        let record = Record::new(Origin::new("p.csv", 2), fields);

        let enriched = record.with_field("Total Fare", Value::Integer(250));
        assert_eq!(enriched.get_f64("Total Fare"), Some(250.0));
        assert!(record.get("Total Fare").is_none());
        assert_eq!(enriched.origin(), record.origin());
    }

    #[test]
    fn test_reject_reason_display() {
        let reason = RejectReason::OutOfRange {
            field: "ReviewRating".into(),
            value: 6.0,
            min: Some(1.0),
            max: Some(5.0),
        };
        assert_eq!(reason.to_string(), "field 'ReviewRating' value 6 outside [1, 5]");

        let rejected = Rejected::new(
            Origin::new("a.txt", 3),
            RejectReason::MissingField {
                field: "ProductID".into(),
            },
        );
        assert_eq!(rejected.to_string(), "a.txt:3: missing field 'ProductID'");
    }

    #[test]
    fn test_record_counts() {
        let mut counts = RecordCounts::default();
        assert_eq!(counts.invalid_ratio(), 0.0);
        counts.record_valid();
        counts.record_valid();
        counts.record_invalid();
        counts.record_valid();
        assert_eq!(counts.total, 4);
        assert_eq!(counts.valid + counts.invalid, counts.total);
        assert_eq!(counts.invalid_ratio(), 0.25);
    }

    #[test]
    fn test_direction_reversed() {
        assert_eq!(Direction::Descending.reversed(), Direction::Ascending);
        assert_eq!(Direction::Ascending.reversed(), Direction::Descending);
    }
}
