//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::pipeline::DatasetKind;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// TallyRank - validate, aggregate and rank record batches
///
/// Reads text, CSV or JSON sources, validates every record against the
/// dataset schema, groups valid records by key and writes a ranked
/// summary together with valid/invalid counts.
///
/// Examples:
///   tallyrank --dataset reviews --input reviews/
///   tallyrank --dataset sales --input sales/ --labels sales/product_names.csv
///   tallyrank --dataset covid --input covid/ --format json --lowest
///   tallyrank --dataset bookings --input passengers.csv --inventory trains.csv
///   tallyrank --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Dataset preset to process
    ///
    /// `custom` reads the pipeline from the [pipeline] section of the
    /// configuration file.
    #[arg(
        short,
        long,
        value_name = "DATASET",
        required_unless_present = "init_config"
    )]
    pub dataset: Option<DatasetKind>,

    /// Input files or directories
    #[arg(short, long, value_name = "PATH", num_args = 1.., required_unless_present = "init_config")]
    pub input: Vec<PathBuf>,

    /// Output file path for the report
    ///
    /// Defaults to tallyrank_report.<ext> for the chosen format.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (text, markdown, json, csv)
    #[arg(short, long, value_name = "FORMAT", env = "TALLYRANK_FORMAT")]
    pub format: Option<OutputFormat>,

    /// Number of groups to keep in the ranking
    #[arg(short = 'n', long, value_name = "N", conflicts_with = "all")]
    pub top: Option<usize>,

    /// Keep every group in the ranking
    #[arg(long)]
    pub all: bool,

    /// Rank lowest values first
    #[arg(long)]
    pub ascending: bool,

    /// Also report the opposite end of the ranking
    #[arg(long)]
    pub lowest: bool,

    /// Include the full table of groups in the report
    #[arg(long)]
    pub groups: bool,

    /// Label file mapping group keys to display names
    #[arg(long, value_name = "FILE")]
    pub labels: Option<PathBuf>,

    /// Train inventory CSV for the bookings dataset
    #[arg(long, value_name = "FILE")]
    pub inventory: Option<PathBuf>,

    /// Write the updated seat inventory back to its file
    #[arg(long, requires = "inventory")]
    pub update_inventory: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .tallyrank.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Keep the previous report as <output>.bak
    #[arg(long)]
    pub backup: bool,

    /// Exit with code 2 when any record is invalid
    #[arg(long)]
    pub fail_on_invalid: bool,

    /// Skip unreadable sources instead of aborting
    #[arg(long)]
    pub skip_unavailable: bool,

    /// Leave the generation time out of the report
    #[arg(long)]
    pub no_timestamp: bool,

    /// Dry run: list the sources that would be read and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .tallyrank.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain-text summary (default)
    #[default]
    Text,
    /// Markdown format
    Markdown,
    /// JSON format
    Json,
    /// CSV of the ranked entries
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }

    /// Report file name used when no output path is configured.
    pub fn default_file_name(&self) -> String {
        format!("tallyrank_report.{}", self.extension())
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.dataset.is_none() {
            return Err("A dataset is required (--dataset)".to_string());
        }

        if self.input.is_empty() {
            return Err("At least one input path is required (--input)".to_string());
        }

        if self.top == Some(0) {
            return Err("Top must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.inventory.is_some() && self.dataset != Some(DatasetKind::Bookings) {
            return Err("--inventory only applies to the bookings dataset".to_string());
        }
        if self.dataset == Some(DatasetKind::Bookings) && self.inventory.is_none() {
            return Err("The bookings dataset requires --inventory".to_string());
        }

        if let Some(ref inventory) = self.inventory {
            if !inventory.is_file() {
                return Err(format!(
                    "Inventory file does not exist: {}",
                    inventory.display()
                ));
            }
        }

        if let Some(ref labels) = self.labels {
            if !labels.is_file() {
                return Err(format!("Label file does not exist: {}", labels.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
