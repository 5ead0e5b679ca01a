//! Built-in dataset pipelines.

use super::{LabelTable, Measure, Pipeline, SourceFormat, Statistic, ValueExpr};
use crate::models::Direction;
use crate::schema::{FieldSpec, Schema};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Line layout of a product review.
pub const REVIEW_PATTERN: &str = r#"^CustomerID: (?P<CustomerID>[A-Z0-9]+), ProductID: (?P<ProductID>[A-Z0-9]+), ReviewDate: (?P<ReviewDate>\d{4}-\d{2}-\d{2}), ReviewRating: (?P<ReviewRating>\d), ReviewText: "(?P<ReviewText>.+)""#;

/// Name of the field produced by the word reader.
pub const WORD_FIELD: &str = "word";

/// Name of the field produced by the character reader.
pub const CHAR_FIELD: &str = "char";

/// Dataset selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// Product review lines, ranked by average rating
    Reviews,
    /// Sales ledgers, ranked by total quantity sold
    Sales,
    /// COVID-19 country snapshots, ranked by confirmed cases
    Covid,
    /// Student grade sheets, ranked by average grade
    Grades,
    /// Train passenger bookings, ranked by revenue
    Bookings,
    /// Free text, ranked by word frequency
    Words,
    /// Free text, letters and digits by frequency
    Chars,
    /// Pipeline from the [pipeline] table of the config file
    Custom,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatasetKind::Reviews => "reviews",
            DatasetKind::Sales => "sales",
            DatasetKind::Covid => "covid",
            DatasetKind::Grades => "grades",
            DatasetKind::Bookings => "bookings",
            DatasetKind::Words => "words",
            DatasetKind::Chars => "chars",
            DatasetKind::Custom => "custom",
        };
        write!(f, "{}", name)
    }
}

/// Built-in pipeline for a dataset; `None` for [`DatasetKind::Custom`].
pub fn preset(kind: DatasetKind) -> Option<Pipeline> {
    match kind {
        DatasetKind::Reviews => Some(reviews()),
        DatasetKind::Sales => Some(sales()),
        DatasetKind::Covid => Some(covid()),
        DatasetKind::Grades => Some(grades()),
        DatasetKind::Bookings => Some(bookings()),
        DatasetKind::Words => Some(words()),
        DatasetKind::Chars => Some(chars()),
        DatasetKind::Custom => None,
    }
}

fn base(name: &str, format: SourceFormat, extensions: &[&str], group_label: &str) -> Pipeline {
    Pipeline {
        name: name.to_string(),
        format,
        extensions: extensions.iter().map(|e| e.to_string()).collect(),
        exclude: Vec::new(),
        recursive: false,
        schema: Schema::default(),
        key: Vec::new(),
        measures: Vec::new(),
        rank_by: None,
        top: None,
        direction: Direction::Descending,
        include_lowest: false,
        include_groups: false,
        group_label: group_label.to_string(),
        record_label: super::default_record_label(),
        labels: None,
    }
}

fn csv() -> SourceFormat {
    SourceFormat::Csv { delimiter: ',' }
}

fn reviews() -> Pipeline {
    Pipeline {
        schema: Schema::new(vec![
            FieldSpec::text("CustomerID"),
            FieldSpec::text("ProductID"),
            FieldSpec::date("ReviewDate"),
            FieldSpec::integer("ReviewRating").range(1.0, 5.0),
            FieldSpec::text("ReviewText"),
        ]),
        key: vec!["ProductID".into()],
        measures: vec![
            Measure::new(
                "average_rating",
                ValueExpr::field("ReviewRating"),
                Statistic::Mean,
            ),
            Measure::new(
                "reviews",
                ValueExpr::Constant { value: 1.0 },
                Statistic::Count,
            ),
        ],
        top: Some(3),
        ..base(
            "reviews",
            SourceFormat::Lines {
                pattern: REVIEW_PATTERN.to_string(),
            },
            &["txt"],
            "products",
        )
    }
}

fn sales() -> Pipeline {
    Pipeline {
        exclude: vec!["product_names.csv".into()],
        schema: Schema::new(vec![
            FieldSpec::text("Product ID"),
            FieldSpec::date("Date"),
            FieldSpec::integer("Quantity sold").at_least(0.0),
        ]),
        key: vec!["Product ID".into()],
        measures: vec![
            Measure::new(
                "total_quantity_sold",
                ValueExpr::field("Quantity sold"),
                Statistic::Sum,
            ),
            Measure::new(
                "average_sold_per_month",
                ValueExpr::field("Quantity sold"),
                Statistic::Sum,
            )
            .monthly("Date"),
        ],
        top: Some(5),
        labels: Some(LabelTable {
            file: Some("product_names.csv".into()),
            key_column: "Product ID".into(),
            label_column: "Product Name".into(),
        }),
        ..base("sales", csv(), &["csv"], "products")
    }
}

fn covid() -> Pipeline {
    let confirmed = "confirmed_cases.total";
    let deaths = "deaths.total";
    let recovered = "recovered.total";

    Pipeline {
        recursive: true,
        schema: Schema::new(vec![
            FieldSpec::text("country"),
            FieldSpec::integer(confirmed).at_least(0.0),
            FieldSpec::integer(deaths).at_least(0.0),
            FieldSpec::integer(recovered).at_least(0.0),
        ]),
        key: vec!["country".into()],
        measures: vec![
            Measure::new("total_confirmed", ValueExpr::field(confirmed), Statistic::Sum),
            Measure::new("total_deaths", ValueExpr::field(deaths), Statistic::Sum),
            Measure::new("total_recovered", ValueExpr::field(recovered), Statistic::Sum),
            Measure::new(
                "total_active",
                ValueExpr::Difference {
                    field: confirmed.into(),
                    minus: vec![deaths.into(), recovered.into()],
                },
                Statistic::Sum,
            ),
        ],
        top: Some(5),
        include_lowest: true,
        include_groups: true,
        ..base("covid", SourceFormat::Json, &["json"], "countries")
    }
}

fn grades() -> Pipeline {
    let subjects = ["Maths", "Science", "English"];

    let mut fields = vec![FieldSpec::text("Name")];
    fields.extend(subjects.iter().map(|s| FieldSpec::integer(*s).at_least(0.0)));

    Pipeline {
        schema: Schema::new(fields),
        key: vec!["Name".into()],
        measures: vec![Measure::new(
            "average",
            ValueExpr::Mean {
                fields: subjects.iter().map(|s| s.to_string()).collect(),
            },
            Statistic::Mean,
        )],
        ..base("grades", csv(), &["csv"], "students")
    }
}

fn bookings() -> Pipeline {
    use crate::bookings::{FARE_FIELD, TICKETS_FIELD, TRAIN_FIELD};

    Pipeline {
        schema: Schema::new(vec![
            FieldSpec::text("Passenger Name"),
            FieldSpec::text(TRAIN_FIELD),
            FieldSpec::integer(TICKETS_FIELD).at_least(1.0),
        ]),
        key: vec![TRAIN_FIELD.into()],
        measures: vec![
            Measure::new(
                "total_revenue",
                ValueExpr::Product {
                    fields: vec![TICKETS_FIELD.into(), FARE_FIELD.into()],
                },
                Statistic::Sum,
            ),
            Measure::new(
                "tickets_sold",
                ValueExpr::field(TICKETS_FIELD),
                Statistic::Sum,
            ),
        ],
        ..base("bookings", csv(), &["csv"], "trains")
    }
}

fn words() -> Pipeline {
    Pipeline {
        schema: Schema::new(vec![FieldSpec::text(WORD_FIELD)]),
        key: vec![WORD_FIELD.into()],
        measures: vec![Measure::new(
            "occurrences",
            ValueExpr::Constant { value: 1.0 },
            Statistic::Count,
        )],
        top: Some(10),
        record_label: "words".into(),
        ..base("words", SourceFormat::Words, &["txt", "md"], "words")
    }
}

fn chars() -> Pipeline {
    Pipeline {
        schema: Schema::new(vec![FieldSpec::text(CHAR_FIELD)]),
        key: vec![CHAR_FIELD.into()],
        measures: vec![Measure::new(
            "occurrences",
            ValueExpr::Constant { value: 1.0 },
            Statistic::Count,
        )],
        record_label: "characters".into(),
        ..base("chars", SourceFormat::Chars, &["txt", "md"], "characters")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookings::FARE_FIELD;
    use clap::ValueEnum;
    use regex::Regex;

    #[test]
    fn test_every_preset_is_valid() {
        for kind in DatasetKind::value_variants() {
            let Some(pipeline) = preset(*kind) else {
                assert_eq!(*kind, DatasetKind::Custom);
                continue;
            };
            let provided: &[&str] = if *kind == DatasetKind::Bookings {
                &[FARE_FIELD]
            } else {
                &[]
            };
            assert!(
                pipeline.validate_with(provided).is_ok(),
                "preset {} failed validation",
                kind
            );
            assert_eq!(pipeline.name, kind.to_string());
        }
    }

    #[test]
    fn test_review_pattern() {
        let re = Regex::new(REVIEW_PATTERN).unwrap();
        let caps = re
            .captures(r#"CustomerID: C123, ProductID: P456, ReviewDate: 2024-01-15, ReviewRating: 4, ReviewText: "Works, mostly""#)
            .unwrap();
        assert_eq!(&caps["ProductID"], "P456");
        assert_eq!(&caps["ReviewRating"], "4");
        assert_eq!(&caps["ReviewText"], "Works, mostly");

        assert!(re
            .captures("CustomerID: c1, ProductID: P1, ReviewDate: 2024-01-15, ReviewRating: 4, ReviewText: \"x\"")
            .is_none());
        assert!(re
            .captures("CustomerID: C1, ProductID: P1, ReviewDate: 2024-01-15, ReviewRating: 10, ReviewText: \"x\"")
            .is_none());
    }

    #[test]
    fn test_preset_defaults() {
        let reviews = preset(DatasetKind::Reviews).unwrap();
        assert_eq!(reviews.top, Some(3));
        assert_eq!(reviews.rank_measure_name(), "average_rating");

        let covid = preset(DatasetKind::Covid).unwrap();
        assert!(covid.recursive);
        assert!(covid.include_lowest);
        assert_eq!(covid.measures.len(), 4);

        let grades = preset(DatasetKind::Grades).unwrap();
        assert_eq!(grades.top, None);

        let sales = preset(DatasetKind::Sales).unwrap();
        assert!(sales.exclude.contains(&"product_names.csv".to_string()));
        assert_eq!(sales.measures[1].statistic, Statistic::MonthlyMean);

        let words = preset(DatasetKind::Words).unwrap();
        assert_eq!(words.record_label, "words");

        let chars = preset(DatasetKind::Chars).unwrap();
        assert_eq!(chars.format, SourceFormat::Chars);
        assert_eq!(chars.top, None);
        assert_eq!(chars.key, vec![CHAR_FIELD.to_string()]);
        assert_eq!(grades.record_label, "records");
    }
}
