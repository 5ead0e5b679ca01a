//! Declarative batch pipelines.
//!
//! A [`Pipeline`] says how to read a dataset, which fields a valid record
//! has, what to group by and which statistics to compute and rank. The
//! built-in datasets live in [`presets`]; custom pipelines are read from
//! the `[pipeline]` table of the configuration file.

pub mod presets;

pub use presets::{preset, DatasetKind};

use crate::error::{BatchError, BatchResult};
use crate::models::{Direction, Record};
use crate::schema::{FieldType, Schema};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Separator between the parts of a composite group key.
pub const KEY_SEPARATOR: &str = " / ";

/// Layout of the input files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceFormat {
    /// One record per line, fields taken from the named capture groups.
    Lines { pattern: String },
    /// Delimited text with a header row.
    Csv {
        #[serde(default = "default_delimiter")]
        delimiter: char,
    },
    /// JSON documents: an object is one record, an array holds many.
    Json,
    /// Free text; every word is a record with a single `word` field.
    Words,
    /// Free text; every letter or digit is a record with a single `char` field.
    Chars,
}

fn default_delimiter() -> char {
    ','
}

/// How a record contributes a number to a measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ValueExpr {
    Field { field: String },
    /// `field - minus[0] - minus[1] ...`
    Difference { field: String, minus: Vec<String> },
    Product { fields: Vec<String> },
    Mean { fields: Vec<String> },
    Constant { value: f64 },
}

impl ValueExpr {
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field { field: name.into() }
    }

    /// Evaluate against a record. `None` when a referenced field is
    /// absent or not numeric.
    pub fn evaluate(&self, record: &Record) -> Option<f64> {
        match self {
            ValueExpr::Field { field } => record.get_f64(field),
            ValueExpr::Difference { field, minus } => {
                let mut value = record.get_f64(field)?;
                for name in minus {
                    value -= record.get_f64(name)?;
                }
                Some(value)
            }
            ValueExpr::Product { fields } => fields
                .iter()
                .try_fold(1.0, |acc, name| record.get_f64(name).map(|v| acc * v)),
            ValueExpr::Mean { fields } => {
                if fields.is_empty() {
                    return None;
                }
                let sum = fields
                    .iter()
                    .try_fold(0.0, |acc, name| record.get_f64(name).map(|v| acc + v))?;
                Some(sum / fields.len() as f64)
            }
            ValueExpr::Constant { value } => Some(*value),
        }
    }

    pub fn referenced_fields(&self) -> Vec<&str> {
        match self {
            ValueExpr::Field { field } => vec![field.as_str()],
            ValueExpr::Difference { field, minus } => std::iter::once(field.as_str())
                .chain(minus.iter().map(String::as_str))
                .collect(),
            ValueExpr::Product { fields } | ValueExpr::Mean { fields } => {
                fields.iter().map(String::as_str).collect()
            }
            ValueExpr::Constant { .. } => Vec::new(),
        }
    }
}

/// Aggregate function applied to a group's contributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Sum,
    Mean,
    Count,
    Min,
    Max,
    /// Total per calendar month, then the mean of those totals.
    MonthlyMean,
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::Sum => write!(f, "sum"),
            Statistic::Mean => write!(f, "mean"),
            Statistic::Count => write!(f, "count"),
            Statistic::Min => write!(f, "min"),
            Statistic::Max => write!(f, "max"),
            Statistic::MonthlyMean => write!(f, "monthly mean"),
        }
    }
}

/// A named statistic computed per group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    pub value: ValueExpr,
    pub statistic: Statistic,
    /// Date field that buckets contributions for `monthly_mean`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_field: Option<String>,
}

impl Measure {
    pub fn new(name: impl Into<String>, value: ValueExpr, statistic: Statistic) -> Self {
        Self {
            name: name.into(),
            value,
            statistic,
            month_field: None,
        }
    }

    pub fn monthly(mut self, date_field: impl Into<String>) -> Self {
        self.statistic = Statistic::MonthlyMean;
        self.month_field = Some(date_field.into());
        self
    }
}

/// Lookup table that attaches display names to group keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelTable {
    /// File name looked up in the input directories when no path is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub key_column: String,
    pub label_column: String,
}

/// Full description of one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,

    pub format: SourceFormat,

    /// File extensions picked up from input directories.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// File names skipped in input directories.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Walk input directories recursively.
    #[serde(default)]
    pub recursive: bool,

    #[serde(default)]
    pub schema: Schema,

    /// Fields forming the group key.
    pub key: Vec<String>,

    pub measures: Vec<Measure>,

    /// Measure used for ranking; the first measure when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank_by: Option<String>,

    /// Ranking size; every group when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<usize>,

    #[serde(default)]
    pub direction: Direction,

    /// Also report the opposite end of the ranking.
    #[serde(default)]
    pub include_lowest: bool,

    /// Include every group in the report.
    #[serde(default)]
    pub include_groups: bool,

    /// Plural noun for one group, used in prose.
    #[serde(default = "default_group_label")]
    pub group_label: String,

    /// Plural noun for one record ("reviews", "words").
    #[serde(default = "default_record_label")]
    pub record_label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelTable>,
}

fn default_group_label() -> String {
    "groups".to_string()
}

pub(crate) fn default_record_label() -> String {
    "records".to_string()
}

impl Pipeline {
    /// Validate a pipeline whose records carry only schema fields.
    pub fn validate(&self) -> BatchResult<()> {
        self.validate_with(&[])
    }

    /// Validate a pipeline; `provided` names numeric fields added to
    /// records after schema validation (by a record hook).
    pub fn validate_with(&self, provided: &[&str]) -> BatchResult<()> {
        let invalid = |msg: String| Err(BatchError::InvalidPipeline(msg));

        self.schema.validate()?;

        if self.key.is_empty() {
            return invalid(format!("pipeline '{}' has no key fields", self.name));
        }
        for key in &self.key {
            match self.schema.field(key) {
                Some(spec) if spec.required => {}
                Some(_) => return invalid(format!("key field '{}' must be required", key)),
                None => return invalid(format!("key field '{}' is not in the schema", key)),
            }
        }

        if self.measures.is_empty() {
            return invalid(format!("pipeline '{}' has no measures", self.name));
        }

        let mut names = HashSet::new();
        for measure in &self.measures {
            if !names.insert(measure.name.as_str()) {
                return invalid(format!("measure '{}' declared twice", measure.name));
            }

            for field in measure.value.referenced_fields() {
                if provided.contains(&field) {
                    continue;
                }
                match self.schema.field(field).map(|f| f.kind) {
                    Some(FieldType::Integer | FieldType::Float) => {}
                    Some(kind) => {
                        return invalid(format!(
                            "measure '{}' uses {} field '{}'",
                            measure.name, kind, field
                        ))
                    }
                    None => {
                        return invalid(format!(
                            "measure '{}' uses unknown field '{}'",
                            measure.name, field
                        ))
                    }
                }
            }

            if measure.statistic == Statistic::MonthlyMean {
                let Some(ref month_field) = measure.month_field else {
                    return invalid(format!(
                        "measure '{}' needs a month_field for monthly_mean",
                        measure.name
                    ));
                };
                match self.schema.field(month_field) {
                    Some(spec) if spec.kind == FieldType::Date && spec.required => {}
                    _ => {
                        return invalid(format!(
                            "month_field '{}' must be a required date field",
                            month_field
                        ))
                    }
                }
            }
        }

        if let Some(ref rank_by) = self.rank_by {
            if !names.contains(rank_by.as_str()) {
                return invalid(format!("rank_by '{}' is not a measure", rank_by));
            }
        }

        if self.top == Some(0) {
            return invalid("top must be at least 1".to_string());
        }

        if let SourceFormat::Lines { ref pattern } = self.format {
            regex::Regex::new(pattern)
                .map_err(|e| BatchError::InvalidPipeline(format!("bad line pattern: {}", e)))?;
        }

        Ok(())
    }

    /// Index of the ranking measure.
    pub fn rank_index(&self) -> usize {
        self.rank_by
            .as_ref()
            .and_then(|name| self.measures.iter().position(|m| &m.name == name))
            .unwrap_or(0)
    }

    pub fn rank_measure_name(&self) -> &str {
        self.measures
            .get(self.rank_index())
            .map(|m| m.name.as_str())
            .unwrap_or("")
    }

    /// Group key of a record, `None` if a key field is missing.
    pub fn group_key(&self, record: &Record) -> Option<String> {
        let parts = self
            .key
            .iter()
            .map(|field| record.get(field).map(|v| v.to_string()))
            .collect::<Option<Vec<_>>>()?;
        Some(parts.join(KEY_SEPARATOR))
    }

    /// Human name of the key, e.g. "Product ID".
    pub fn key_label(&self) -> String {
        self.key.join(KEY_SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Origin, Value};
    use crate::schema::FieldSpec;
    use std::collections::BTreeMap;

    fn record(pairs: Vec<(&str, Value)>) -> Record {
        let fields: BTreeMap<String, Value> =
            pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        Record::new(Origin::new("t", 1), fields)
    }

    fn minimal_pipeline() -> Pipeline {
        Pipeline {
            name: "test".into(),
            format: SourceFormat::Csv { delimiter: ',' },
            extensions: vec!["csv".into()],
            exclude: Vec::new(),
            recursive: false,
            schema: Schema::new(vec![
                FieldSpec::text("region"),
                FieldSpec::text("store"),
                FieldSpec::integer("units"),
                FieldSpec::date("day"),
            ]),
            key: vec!["region".into()],
            measures: vec![Measure::new("units", ValueExpr::field("units"), Statistic::Sum)],
            rank_by: None,
            top: Some(3),
            direction: Direction::Descending,
            include_lowest: false,
            include_groups: false,
            group_label: "regions".into(),
            record_label: "sales".into(),
            labels: None,
        }
    }

    #[test]
    fn test_value_expressions() {
        let r = record(vec![
            ("a", Value::Integer(10)),
            ("b", Value::Integer(3)),
            ("c", Value::Float(2.0)),
            ("t", Value::Text("x".into())),
        ]);

        assert_eq!(ValueExpr::field("a").evaluate(&r), Some(10.0));
        let diff = ValueExpr::Difference {
            field: "a".into(),
            minus: vec!["b".into(), "c".into()],
        };
        assert_eq!(diff.evaluate(&r), Some(5.0));
        let product = ValueExpr::Product {
            fields: vec!["b".into(), "c".into()],
        };
        assert_eq!(product.evaluate(&r), Some(6.0));
        let mean = ValueExpr::Mean {
            fields: vec!["a".into(), "c".into()],
        };
        assert_eq!(mean.evaluate(&r), Some(6.0));
        assert_eq!(ValueExpr::Constant { value: 1.0 }.evaluate(&r), Some(1.0));

        assert_eq!(ValueExpr::field("t").evaluate(&r), None);
        assert_eq!(ValueExpr::field("missing").evaluate(&r), None);
    }

    #[test]
    fn test_composite_group_key() {
        let mut pipeline = minimal_pipeline();
        pipeline.key = vec!["region".into(), "store".into()];
        let r = record(vec![
            ("region", Value::Text("North".into())),
            ("store", Value::Text("S1".into())),
        ]);
        assert_eq!(pipeline.group_key(&r).as_deref(), Some("North / S1"));
        assert_eq!(pipeline.key_label(), "region / store");

        let partial = record(vec![("region", Value::Text("North".into()))]);
        assert_eq!(pipeline.group_key(&partial), None);
    }

    #[test]
    fn test_validate_ok() {
        assert!(minimal_pipeline().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_definitions() {
        let mut p = minimal_pipeline();
        p.key = vec!["nope".into()];
        assert!(p.validate().is_err());

        let mut p = minimal_pipeline();
        p.measures = vec![Measure::new("m", ValueExpr::field("store"), Statistic::Sum)];
        assert!(p.validate().is_err());

        let mut p = minimal_pipeline();
        p.rank_by = Some("other".into());
        assert!(p.validate().is_err());

        let mut p = minimal_pipeline();
        p.measures.push(Measure::new("units", ValueExpr::field("units"), Statistic::Mean));
        assert!(p.validate().is_err());

        let mut p = minimal_pipeline();
        p.measures = vec![Measure::new("m", ValueExpr::field("units"), Statistic::MonthlyMean)];
        assert!(p.validate().is_err());
        p.measures = vec![Measure::new("m", ValueExpr::field("units"), Statistic::Sum).monthly("day")];
        assert!(p.validate().is_ok());

        let mut p = minimal_pipeline();
        p.format = SourceFormat::Lines {
            pattern: "(?P<region>[".into(),
        };
        assert!(p.validate().is_err());

        let mut p = minimal_pipeline();
        p.top = Some(0);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_validate_with_provided_fields() {
        let mut p = minimal_pipeline();
        p.measures = vec![Measure::new(
            "revenue",
            ValueExpr::Product {
                fields: vec!["units".into(), "price".into()],
            },
            Statistic::Sum,
        )];
        assert!(p.validate().is_err());
        assert!(p.validate_with(&["price"]).is_ok());
    }

    #[test]
    fn test_rank_measure() {
        let mut p = minimal_pipeline();
        p.measures
            .push(Measure::new("avg_units", ValueExpr::field("units"), Statistic::Mean));
        assert_eq!(p.rank_measure_name(), "units");
        p.rank_by = Some("avg_units".into());
        assert_eq!(p.rank_index(), 1);
        assert_eq!(p.rank_measure_name(), "avg_units");
    }

    #[test]
    fn test_parse_pipeline_from_toml() {
        let pipeline: Pipeline = toml::from_str(
            r#"
name = "orders"
key = ["customer"]
top = 2
direction = "ascending"

[format]
kind = "csv"
delimiter = ";"

[[schema.fields]]
name = "customer"

[[schema.fields]]
name = "amount"
type = "float"
min = 0

[[measures]]
name = "spent"
statistic = "sum"
value = { op = "field", field = "amount" }
"#,
        )
        .unwrap();

        assert_eq!(pipeline.format, SourceFormat::Csv { delimiter: ';' });
        assert_eq!(pipeline.direction, Direction::Ascending);
        assert_eq!(pipeline.group_label, "groups");
        assert!(pipeline.validate().is_ok());
    }
}
