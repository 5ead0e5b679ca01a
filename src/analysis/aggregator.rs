//! Record aggregation and ranking.
//!
//! This module groups validated records by key, computes per-group
//! statistics and ranks the resulting summary. [`BatchAggregator`] drives
//! a whole batch: it validates raw records, keeps the counters and
//! collects rejections.

use super::statistics::Contribution;
use crate::models::{
    Direction, MeasureValue, RawRecord, Ranking, Record, RecordCounts, Rejected, Report,
    ReportMetadata, SummaryEntry,
};
use crate::pipeline::Pipeline;
use chrono::Datelike;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

/// Post-validation step applied to every valid record.
///
/// A hook may enrich the record (returning a new one) or reject it.
pub trait RecordHook {
    fn apply(&mut self, record: Record) -> Result<Record, Rejected>;
}

/// Contributions of one group, one list per measure.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    contributions: Vec<Vec<Contribution>>,
}

impl Accumulator {
    fn new(measures: usize) -> Self {
        Self {
            contributions: vec![Vec::new(); measures],
        }
    }

    /// Contributions to the measure at `index`, in arrival order.
    pub fn measure(&self, index: usize) -> &[Contribution] {
        self.contributions
            .get(index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Group accumulators in first-seen key order.
#[derive(Debug, Clone, Default)]
pub struct Groups {
    index: HashMap<String, usize>,
    entries: Vec<(String, Accumulator)>,
}

impl Groups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[allow(dead_code)] // Lookup accessor; the batch only reads groups via summarize
    pub fn get(&self, key: &str) -> Option<&Accumulator> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    #[allow(dead_code)] // Lookup accessor; the batch only reads groups via summarize
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Add a record's contributions to its group.
    ///
    /// Returns `false` if the record has no group key.
    pub fn add(&mut self, pipeline: &Pipeline, record: &Record) -> bool {
        let Some(key) = pipeline.group_key(record) else {
            return false;
        };

        let slot = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                let i = self.entries.len();
                self.index.insert(key.clone(), i);
                self.entries
                    .push((key, Accumulator::new(pipeline.measures.len())));
                i
            }
        };

        let accumulator = &mut self.entries[slot].1;
        for (i, measure) in pipeline.measures.iter().enumerate() {
            let Some(value) = measure.value.evaluate(record) else {
                continue;
            };
            let month = measure
                .month_field
                .as_deref()
                .and_then(|field| record.get(field))
                .and_then(|v| v.as_date())
                .map(|d| (d.year(), d.month()));
            let contribution = match month {
                Some(month) => Contribution::in_month(value, month),
                None => Contribution::new(value),
            };
            accumulator.contributions[i].push(contribution);
        }

        true
    }
}

/// Group records by the pipeline key in a single pass.
#[allow(dead_code)] // Standalone grouping; BatchAggregator groups while validating
pub fn aggregate<'a, I>(pipeline: &Pipeline, records: I) -> Groups
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut groups = Groups::new();
    for record in records {
        groups.add(pipeline, record);
    }
    groups
}

/// Compute every measure once per group, keeping first-seen order.
pub fn summarize(pipeline: &Pipeline, groups: Groups) -> Vec<SummaryEntry> {
    let rank_index = pipeline.rank_index();

    groups
        .entries
        .into_iter()
        .map(|(key, accumulator)| {
            let measures: Vec<MeasureValue> = pipeline
                .measures
                .iter()
                .enumerate()
                .map(|(i, measure)| MeasureValue {
                    name: measure.name.clone(),
                    value: measure.statistic.apply(accumulator.measure(i)),
                })
                .collect();
            let statistic = measures.get(rank_index).map(|m| m.value).unwrap_or(0.0);

            SummaryEntry {
                key,
                label: None,
                statistic,
                measures,
            }
        })
        .collect()
}

/// Stable sort by statistic, then keep the first `n` entries.
///
/// Ties keep their order in `summary`.
pub fn rank(summary: &[SummaryEntry], n: Option<usize>, direction: Direction) -> Vec<SummaryEntry> {
    let mut ranked = summary.to_vec();
    match direction {
        Direction::Descending => ranked.sort_by(|a, b| b.statistic.total_cmp(&a.statistic)),
        Direction::Ascending => ranked.sort_by(|a, b| a.statistic.total_cmp(&b.statistic)),
    }
    if let Some(n) = n {
        ranked.truncate(n);
    }
    ranked
}

/// Attach display labels to summary entries by key.
pub fn apply_labels(summary: &mut [SummaryEntry], labels: &HashMap<String, String>) {
    for entry in summary.iter_mut() {
        entry.label = labels.get(&entry.key).cloned();
    }
}

/// Result of a finished batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub counts: RecordCounts,
    /// Every group in first-seen order.
    pub summary: Vec<SummaryEntry>,
    pub rejections: Vec<Rejected>,
    pub rejection_breakdown: BTreeMap<String, usize>,
}

impl BatchOutcome {
    pub fn ranking(&self, pipeline: &Pipeline) -> Ranking {
        self.ranking_in(pipeline, pipeline.direction)
    }

    /// The opposite end of [`Self::ranking`].
    pub fn lowest(&self, pipeline: &Pipeline) -> Ranking {
        self.ranking_in(pipeline, pipeline.direction.reversed())
    }

    fn ranking_in(&self, pipeline: &Pipeline, direction: Direction) -> Ranking {
        Ranking {
            measure: pipeline.rank_measure_name().to_string(),
            direction,
            limit: pipeline.top,
            entries: rank(&self.summary, pipeline.top, direction),
        }
    }

    /// Assemble the report; counters and rankings always travel together.
    pub fn into_report(self, pipeline: &Pipeline, metadata: ReportMetadata) -> Report {
        let ranking = self.ranking(pipeline);
        let lowest = pipeline.include_lowest.then(|| self.lowest(pipeline));

        Report {
            metadata,
            counts: self.counts,
            measures: pipeline.measures.iter().map(|m| m.name.clone()).collect(),
            ranking,
            lowest,
            groups: pipeline.include_groups.then_some(self.summary),
            rejection_breakdown: self.rejection_breakdown,
            rejections: self.rejections,
            inventory: None,
        }
    }
}

/// Drives one batch: validation, optional hook, grouping, counting.
pub struct BatchAggregator<'a> {
    pipeline: &'a Pipeline,
    hook: Option<&'a mut dyn RecordHook>,
    groups: Groups,
    counts: RecordCounts,
    rejections: Vec<Rejected>,
    rejection_breakdown: BTreeMap<String, usize>,
    max_rejections: usize,
}

impl<'a> BatchAggregator<'a> {
    pub fn new(pipeline: &'a Pipeline) -> Self {
        Self {
            pipeline,
            hook: None,
            groups: Groups::new(),
            counts: RecordCounts::default(),
            rejections: Vec::new(),
            rejection_breakdown: BTreeMap::new(),
            max_rejections: 20,
        }
    }

    pub fn with_hook(mut self, hook: &'a mut dyn RecordHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// How many rejections to keep as a sample.
    pub fn with_max_rejections(mut self, max: usize) -> Self {
        self.max_rejections = max;
        self
    }

    pub fn counts(&self) -> RecordCounts {
        self.counts
    }

    /// Validate one raw record and fold it into its group.
    pub fn push(&mut self, raw: &RawRecord) {
        let validated = self.pipeline.schema.parse_record(raw).and_then(|record| {
            match self.hook.as_mut() {
                Some(hook) => hook.apply(record),
                None => Ok(record),
            }
        });

        match validated {
            Ok(record) => {
                if self.groups.add(self.pipeline, &record) {
                    self.counts.record_valid();
                } else {
                    // Key fields are required by pipeline validation
                    debug!("{}: record without group key", record.origin());
                    self.counts.record_invalid();
                }
            }
            Err(rejected) => {
                trace!("Rejected {}", rejected);
                self.counts.record_invalid();
                *self
                    .rejection_breakdown
                    .entry(rejected.reason.kind().to_string())
                    .or_insert(0) += 1;
                if self.rejections.len() < self.max_rejections {
                    self.rejections.push(rejected);
                }
            }
        }
    }

    pub fn extend<I>(&mut self, raws: I)
    where
        I: IntoIterator<Item = RawRecord>,
    {
        for raw in raws {
            self.push(&raw);
        }
    }

    pub fn finish(self) -> BatchOutcome {
        debug!(
            "Batch finished: {} groups from {} valid records",
            self.groups.len(),
            self.counts.valid
        );
        BatchOutcome {
            counts: self.counts,
            summary: summarize(self.pipeline, self.groups),
            rejections: self.rejections,
            rejection_breakdown: self.rejection_breakdown,
        }
    }
}
