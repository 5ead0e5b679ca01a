//! Report generation.
//!
//! This module renders a [`Report`] as plain text, Markdown, JSON or CSV.
//! Rendering is deterministic: the same report always yields the same
//! output.

use crate::bookings::Train;
use crate::cli::OutputFormat;
use crate::models::{RecordCounts, Ranking, Rejected, Report, ReportMetadata, SummaryEntry};
use anyhow::Result;
use std::collections::BTreeMap;

/// Render a report in the requested format.
pub fn render(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(generate_text_report(report)),
        OutputFormat::Markdown => Ok(generate_markdown_report(report)),
        OutputFormat::Json => generate_json_report(report),
        OutputFormat::Csv => generate_csv_report(report),
    }
}

/// Whole numbers print without decimals, everything else with two.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Heading of a ranking, e.g. "Top 3 products with highest average_rating".
pub fn ranking_title(ranking: &Ranking, group_label: &str) -> String {
    match ranking.limit {
        Some(n) => format!(
            "Top {} {} with {} {}",
            n, group_label, ranking.direction, ranking.measure
        ),
        None => format!(
            "All {} by {}, {} first",
            group_label, ranking.measure, ranking.direction
        ),
    }
}

/// Header of the train inventory table.
const INVENTORY_COLUMNS: [&str; 6] = [
    "Train ID",
    "Train Name",
    "Source Station",
    "Destination Station",
    "Total Seats",
    "Available Seats",
];

fn inventory_cells(train: &Train) -> [String; 6] {
    [
        train.id.clone(),
        train.name.clone(),
        train.source_station.clone(),
        train.destination_station.clone(),
        train.total_seats.to_string(),
        train.available_seats.to_string(),
    ]
}

/// Markdown table cells must not contain a bare `|`.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn entry_name(entry: &SummaryEntry) -> String {
    match entry.label {
        Some(ref label) => format!("{} ({})", entry.key, label),
        None => entry.key.clone(),
    }
}

fn measure_list(entry: &SummaryEntry) -> String {
    entry
        .measures
        .iter()
        .map(|m| format!("{} {}", m.name, format_number(m.value)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Generate the plain-text summary.
pub fn generate_text_report(report: &Report) -> String {
    let mut output = String::new();
    let counts = &report.counts;

    let noun = &report.metadata.record_label;

    output.push_str(&format!("Total {} processed: {}\n", noun, counts.total));
    output.push_str(&format!("Total valid {}: {}\n", noun, counts.valid));
    output.push_str(&format!("Total invalid {}: {}\n", noun, counts.invalid));

    let rankings = std::iter::once(&report.ranking).chain(report.lowest.as_ref());
    for ranking in rankings {
        output.push('\n');
        output.push_str(&ranking_title(ranking, &report.metadata.group_label));
        output.push_str(":\n");

        if ranking.entries.is_empty() {
            output.push_str("  (none)\n");
        }
        for (i, entry) in ranking.entries.iter().enumerate() {
            output.push_str(&format!(
                "{}. {}: {}\n",
                i + 1,
                entry_name(entry),
                measure_list(entry)
            ));
        }
    }

    if !report.rejection_breakdown.is_empty() {
        output.push_str("\nInvalid records by reason:\n");
        for (kind, count) in &report.rejection_breakdown {
            output.push_str(&format!("- {}: {}\n", kind, count));
        }
    }

    if let Some(ref trains) = report.inventory {
        output.push_str("\nTrain inventory after booking:\n");
        output.push_str(&INVENTORY_COLUMNS.join(" | "));
        output.push('\n');
        for train in trains {
            output.push_str(&inventory_cells(train).join(" | "));
            output.push('\n');
        }
    }

    output
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# TallyRank Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_counts_section(&report.counts, &report.rejection_breakdown));

    output.push_str(&generate_ranking_section(report, &report.ranking));
    if let Some(ref lowest) = report.lowest {
        output.push_str(&generate_ranking_section(report, lowest));
    }

    if let Some(ref groups) = report.groups {
        output.push_str(&generate_groups_section(report, groups));
    }

    if let Some(ref trains) = report.inventory {
        output.push_str(&generate_inventory_section(trains));
    }

    output.push_str(&generate_rejections_section(&report.rejections));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Dataset:** {}\n", metadata.pipeline));
    section.push_str(&format!("- **Grouped By:** `{}`\n", metadata.key));
    if let Some(generated_at) = metadata.generated_at {
        section.push_str(&format!(
            "- **Generated:** {}\n",
            generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    section.push_str(&format!("- **Sources Read:** {}\n", metadata.sources.len()));
    for source in &metadata.sources {
        section.push_str(&format!("  - `{}`\n", source));
    }
    if !metadata.skipped_sources.is_empty() {
        section.push_str(&format!(
            "- **Sources Skipped:** {}\n",
            metadata.skipped_sources.len()
        ));
        for source in &metadata.skipped_sources {
            section.push_str(&format!("  - `{}`\n", source));
        }
    }
    section.push('\n');

    section
}

/// Generate the record counts section.
fn generate_counts_section(counts: &RecordCounts, breakdown: &BTreeMap<String, usize>) -> String {
    let mut section = String::new();

    section.push_str("## Records\n\n");
    section.push_str("| Total | Valid | Invalid | Invalid Share |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {:.1}% |\n\n",
        counts.total,
        counts.valid,
        counts.invalid,
        counts.invalid_ratio() * 100.0
    ));

    if !breakdown.is_empty() {
        section.push_str("### Invalid Records by Reason\n\n");
        section.push_str("| Reason | Count |\n");
        section.push_str("|:---|:---:|\n");

        let mut kinds: Vec<_> = breakdown.iter().collect();
        kinds.sort_by_key(|(_, count)| std::cmp::Reverse(**count));

        for (kind, count) in kinds {
            section.push_str(&format!("| {} | {} |\n", kind, count));
        }
        section.push('\n');
    }

    section
}

fn table_header(report: &Report, with_rank: bool) -> String {
    let mut header = String::from("|");
    let mut rule = String::from("|");
    if with_rank {
        header.push_str(" # |");
        rule.push_str(":---:|");
    }
    header.push_str(&format!(" {} |", escape_cell(&report.metadata.key)));
    rule.push_str(":---|");
    for name in &report.measures {
        header.push_str(&format!(" {} |", escape_cell(name)));
        rule.push_str("---:|");
    }
    format!("{}\n{}\n", header, rule)
}

fn table_row(entry: &SummaryEntry, rank: Option<usize>) -> String {
    let mut row = String::from("|");
    if let Some(rank) = rank {
        row.push_str(&format!(" {} |", rank));
    }
    row.push_str(&format!(" {} |", escape_cell(&entry_name(entry))));
    for measure in &entry.measures {
        row.push_str(&format!(" {} |", format_number(measure.value)));
    }
    row.push('\n');
    row
}

/// Generate one ranking table.
fn generate_ranking_section(report: &Report, ranking: &Ranking) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "## {}\n\n",
        ranking_title(ranking, &report.metadata.group_label)
    ));

    if ranking.entries.is_empty() {
        section.push_str("No valid records were found.\n\n");
        return section;
    }

    section.push_str(&table_header(report, true));
    for (i, entry) in ranking.entries.iter().enumerate() {
        section.push_str(&table_row(entry, Some(i + 1)));
    }
    section.push('\n');

    section
}

/// Generate the full group table.
fn generate_groups_section(report: &Report, groups: &[SummaryEntry]) -> String {
    let mut section = String::new();

    section.push_str(&format!("## All {}\n\n", report.metadata.group_label));
    if groups.is_empty() {
        section.push_str("No groups.\n\n");
        return section;
    }

    section.push_str(&table_header(report, false));
    for entry in groups {
        section.push_str(&table_row(entry, None));
    }
    section.push('\n');

    section
}

/// Generate the post-booking seat inventory table.
fn generate_inventory_section(trains: &[Train]) -> String {
    let mut section = String::new();

    section.push_str("## Train Inventory\n\n");
    section.push_str(&format!("| {} |\n", INVENTORY_COLUMNS.join(" | ")));
    section.push_str("|:---|:---|:---|:---|---:|---:|\n");
    for train in trains {
        let cells: Vec<String> = inventory_cells(train)
            .iter()
            .map(|c| escape_cell(c))
            .collect();
        section.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    section.push('\n');

    section
}

/// Generate the sample of rejected records.
fn generate_rejections_section(rejections: &[Rejected]) -> String {
    if rejections.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Rejected Records (sample)\n\n");
    for rejected in rejections {
        section.push_str(&format!(
            "- `{}`: {}\n",
            rejected.origin, rejected.reason
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by TallyRank v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate the ranked entries as CSV.
pub fn generate_csv_report(report: &Report) -> Result<String> {
    let has_labels = report.ranking.entries.iter().any(|e| e.label.is_some());

    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![report.metadata.key.clone()];
    if has_labels {
        header.push("label".to_string());
    }
    header.extend(report.measures.iter().cloned());
    writer.write_record(&header)?;

    for entry in &report.ranking.entries {
        let mut row = vec![entry.key.clone()];
        if has_labels {
            row.push(entry.label.clone().unwrap_or_default());
        }
        row.extend(entry.measures.iter().map(|m| format_number(m.value)));
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(String::from_utf8(bytes)?)
}
