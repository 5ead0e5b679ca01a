//! Statistic functions over group contributions.

use crate::pipeline::Statistic;
use std::collections::BTreeMap;

/// Calendar month as (year, month).
pub type Month = (i32, u32);

/// One record's contribution to a measure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    pub value: f64,
    pub month: Option<Month>,
}

impl Contribution {
    pub fn new(value: f64) -> Self {
        Self { value, month: None }
    }

    pub fn in_month(value: f64, month: Month) -> Self {
        Self {
            value,
            month: Some(month),
        }
    }
}

impl Statistic {
    /// Apply the statistic. Empty input yields 0.
    pub fn apply(&self, contributions: &[Contribution]) -> f64 {
        if contributions.is_empty() {
            return 0.0;
        }

        let values = contributions.iter().map(|c| c.value);
        match self {
            Statistic::Sum => values.sum(),
            Statistic::Mean => values.sum::<f64>() / contributions.len() as f64,
            Statistic::Count => contributions.len() as f64,
            Statistic::Min => values.fold(f64::INFINITY, f64::min),
            Statistic::Max => values.fold(f64::NEG_INFINITY, f64::max),
            Statistic::MonthlyMean => {
                let mut per_month: BTreeMap<Option<Month>, f64> = BTreeMap::new();
                for c in contributions {
                    *per_month.entry(c.month).or_default() += c.value;
                }
                per_month.values().sum::<f64>() / per_month.len() as f64
            }
        }
    }
}
