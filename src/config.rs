//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.tallyrank.toml` files.

use crate::cli::{Args, OutputFormat};
use crate::pipeline::{preset, DatasetKind, Pipeline};
use crate::models::Direction;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".tallyrank.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Ranking overrides.
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Source discovery settings.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Pipeline used by `--dataset custom`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Pipeline>,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Report path; `tallyrank_report.<ext>` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Ranking settings. Unset values keep the dataset defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Number of groups to keep.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<usize>,

    /// Keep every group; wins over `top`.
    #[serde(default)]
    pub all: bool,

    /// Highest values first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descending: Option<bool>,

    /// Also report the opposite end of the ranking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_lowest: Option<bool>,
}

/// Source discovery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Skip unreadable sources instead of aborting the batch.
    #[serde(default)]
    pub skip_unavailable: bool,

    /// Extra file names skipped in input directories.
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Replaces the dataset's file extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the table of every group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_groups: Option<bool>,

    /// Stamp the report with its generation time.
    #[serde(default = "default_true")]
    pub include_timestamp: bool,

    /// Number of rejected records listed in the report.
    #[serde(default = "default_max_rejections")]
    pub max_rejections: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_groups: None,
            include_timestamp: true,
            max_rejections: default_max_rejections(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_rejections() -> usize {
    20
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }

        if args.all {
            self.ranking.all = true;
            self.ranking.top = None;
        } else if let Some(top) = args.top {
            self.ranking.all = false;
            self.ranking.top = Some(top);
        }

        // Flags always override
        if args.ascending {
            self.ranking.descending = Some(false);
        }
        if args.lowest {
            self.ranking.include_lowest = Some(true);
        }
        if args.groups {
            self.report.include_groups = Some(true);
        }
        if args.skip_unavailable {
            self.sources.skip_unavailable = true;
        }
        if args.no_timestamp {
            self.report.include_timestamp = false;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Overlay the ranking, source and report settings on a pipeline.
    pub fn apply_to(&self, pipeline: &mut Pipeline) {
        if self.ranking.all {
            pipeline.top = None;
        } else if let Some(top) = self.ranking.top {
            pipeline.top = Some(top);
        }
        if let Some(descending) = self.ranking.descending {
            pipeline.direction = if descending {
                Direction::Descending
            } else {
                Direction::Ascending
            };
        }
        if let Some(include_lowest) = self.ranking.include_lowest {
            pipeline.include_lowest = include_lowest;
        }
        if let Some(include_groups) = self.report.include_groups {
            pipeline.include_groups = include_groups;
        }

        if let Some(ref extensions) = self.sources.extensions {
            pipeline.extensions = extensions.clone();
        }
        for exclude in &self.sources.excludes {
            if !pipeline.exclude.contains(exclude) {
                pipeline.exclude.push(exclude.clone());
            }
        }
    }

    /// The pipeline for a dataset with this configuration applied.
    pub fn resolve_pipeline(&self, dataset: DatasetKind) -> Result<Pipeline> {
        let mut pipeline = match preset(dataset) {
            Some(pipeline) => pipeline,
            None => match self.pipeline {
                Some(ref pipeline) => pipeline.clone(),
                None => bail!(
                    "--dataset custom needs a [pipeline] section in {} or --config",
                    CONFIG_FILE
                ),
            },
        };

        self.apply_to(&mut pipeline);
        Ok(pipeline)
    }

    /// Where the report is written.
    pub fn output_path(&self) -> PathBuf {
        match self.general.output {
            Some(ref output) => PathBuf::from(output),
            None => PathBuf::from(self.general.format.default_file_name()),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["tallyrank", "--dataset", "reviews", "--input", "reviews"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.format, OutputFormat::Text);
        assert!(config.report.include_timestamp);
        assert_eq!(config.report.max_rejections, 20);
        assert!(config.pipeline.is_none());
        assert_eq!(config.output_path(), PathBuf::from("tallyrank_report.txt"));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "out/summary.md"
format = "markdown"
verbose = true

[ranking]
top = 7
descending = false

[sources]
skip_unavailable = true
excludes = ["notes.txt"]

[report]
include_timestamp = false
max_rejections = 5
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.format, OutputFormat::Markdown);
        assert!(config.general.verbose);
        assert_eq!(config.ranking.top, Some(7));
        assert_eq!(config.ranking.descending, Some(false));
        assert!(config.sources.skip_unavailable);
        assert!(!config.report.include_timestamp);
        assert_eq!(config.report.max_rejections, 5);
        assert_eq!(config.output_path(), PathBuf::from("out/summary.md"));
    }

    #[test]
    fn test_apply_to_preset() {
        let config: Config = toml::from_str(
            r#"
[ranking]
top = 2
descending = false
include_lowest = true

[sources]
excludes = ["draft.txt"]
"#,
        )
        .unwrap();

        let pipeline = config.resolve_pipeline(DatasetKind::Reviews).unwrap();
        assert_eq!(pipeline.top, Some(2));
        assert_eq!(pipeline.direction, Direction::Ascending);
        assert!(pipeline.include_lowest);
        assert!(pipeline.exclude.contains(&"draft.txt".to_string()));

        // Unset values keep the dataset defaults
        let pipeline = Config::default()
            .resolve_pipeline(DatasetKind::Reviews)
            .unwrap();
        assert_eq!(pipeline.top, Some(3));
        assert_eq!(pipeline.direction, Direction::Descending);
    }

    #[test]
    fn test_merge_with_args() {
        let mut config: Config = toml::from_str("[ranking]\ntop = 7\n").unwrap();
        config.merge_with_args(&args(&["--top", "2", "--format", "json", "--no-timestamp"]));
        assert_eq!(config.ranking.top, Some(2));
        assert_eq!(config.general.format, OutputFormat::Json);
        assert!(!config.report.include_timestamp);
        assert_eq!(config.output_path(), PathBuf::from("tallyrank_report.json"));

        let mut config = Config::default();
        config.merge_with_args(&args(&["--all", "--ascending", "--groups"]));
        let pipeline = config.resolve_pipeline(DatasetKind::Reviews).unwrap();
        assert_eq!(pipeline.top, None);
        assert_eq!(pipeline.direction, Direction::Ascending);
        assert!(pipeline.include_groups);
    }

    #[test]
    fn test_custom_pipeline() {
        assert!(Config::default()
            .resolve_pipeline(DatasetKind::Custom)
            .is_err());

        let config: Config = toml::from_str(
            r#"
[pipeline]
name = "scores"
format = { kind = "csv" }
extensions = ["csv"]
key = ["team"]
group_label = "teams"

[[pipeline.schema.fields]]
name = "team"

[[pipeline.schema.fields]]
name = "points"
type = "integer"
min = 0

[[pipeline.measures]]
name = "total_points"
value = { op = "field", field = "points" }
statistic = "sum"
"#,
        )
        .unwrap();

        let pipeline = config.resolve_pipeline(DatasetKind::Custom).unwrap();
        assert_eq!(pipeline.name, "scores");
        assert_eq!(pipeline.rank_measure_name(), "total_points");
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[report]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.report.max_rejections, 20);
    }
}
