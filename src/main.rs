//! TallyRank - batch record aggregation and ranking
//!
//! A CLI tool that validates text, CSV and JSON records against a dataset
//! schema, groups the valid ones by key and writes a ranked summary.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, unreadable source, unwritable output, etc.)
//!   2 - Invalid records found with --fail-on-invalid

mod analysis;
mod bookings;
mod cli;
mod config;
mod error;
mod models;
mod pipeline;
mod report;
mod scanner;
mod schema;
mod source;

use analysis::BatchAggregator;
use anyhow::{bail, Context, Result};
use bookings::{Inventory, FARE_FIELD};
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::ReportMetadata;
use pipeline::{DatasetKind, Pipeline};
use scanner::{FileScanner, ScanConfig, ScanOutcome, SourceFile};
use source::SourceReader;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("TallyRank v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_batch(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Batch failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .tallyrank.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize output, ranking, sources, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one batch end to end. Returns exit code (0 or 2).
fn run_batch(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let dataset = args.dataset.context("A dataset is required (--dataset)")?;
    let pipeline = config.resolve_pipeline(dataset)?;

    let provided: &[&str] = if dataset == DatasetKind::Bookings {
        &[FARE_FIELD]
    } else {
        &[]
    };
    pipeline
        .validate_with(provided)
        .with_context(|| format!("Invalid pipeline '{}'", pipeline.name))?;

    let output_path = config.output_path();
    let labels_path = resolve_labels_path(&args, &pipeline);

    // Never read our own output or side files as records
    let mut scan_config = ScanConfig::from(&pipeline);
    scan_config.skip_paths.push(output_path.clone());
    scan_config.skip_paths.extend(labels_path.iter().cloned());
    scan_config.skip_paths.extend(args.inventory.iter().cloned());
    scan_config.skip_unavailable = config.sources.skip_unavailable;

    println!("🔍 Scanning {} input path(s)...", args.input.len());
    let ScanOutcome { files, skipped } = FileScanner::new(scan_config).scan(&args.input)?;

    // Handle --dry-run: list sources and exit
    if args.dry_run {
        return handle_dry_run(&pipeline, &files);
    }

    let labels = match (labels_path, pipeline.labels.as_ref()) {
        (Some(path), Some(table)) => {
            info!("Loading labels from: {}", path.display());
            source::load_labels(&path, table)?
        }
        (Some(path), None) => bail!(
            "Dataset '{}' has no label table; cannot use {}",
            pipeline.name,
            path.display()
        ),
        (None, _) => HashMap::new(),
    };

    let mut inventory = match args.inventory {
        Some(ref path) => {
            let inventory = Inventory::load(path)?;
            info!(
                "Loaded {} trains from {}",
                inventory.trains().len(),
                path.display()
            );
            Some(inventory)
        }
        None => None,
    };

    let reader = SourceReader::new(&pipeline.format)?;

    println!(
        "📊 Processing {} source file(s) for dataset '{}'...",
        files.len(),
        pipeline.name
    );

    let progress_bar = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        pb
    };

    let mut batch =
        BatchAggregator::new(&pipeline).with_max_rejections(config.report.max_rejections);
    if let Some(ref mut inventory) = inventory {
        batch = batch.with_hook(inventory);
    }

    let mut sources = Vec::new();
    let mut skipped_sources: Vec<String> =
        skipped.iter().map(|p| p.display().to_string()).collect();

    for file in &files {
        let name = file.display_name();
        progress_bar.set_message(name.clone());

        match reader.read(&file.path) {
            Ok(raws) => {
                debug!("{}: {} raw records", name, raws.len());
                batch.extend(raws);
                sources.push(name);
            }
            Err(e) if config.sources.skip_unavailable && e.is_source_error() => {
                warn!("Skipping source: {}", e);
                skipped_sources.push(name);
            }
            Err(e) => {
                progress_bar.abandon();
                return Err(e.into());
            }
        }

        progress_bar.inc(1);
    }
    progress_bar.finish_and_clear();

    let mut outcome = batch.finish();
    if !labels.is_empty() {
        analysis::apply_labels(&mut outcome.summary, &labels);
    }

    let metadata = ReportMetadata {
        pipeline: pipeline.name.clone(),
        group_label: pipeline.group_label.clone(),
        key: pipeline.key_label(),
        record_label: pipeline.record_label.clone(),
        generated_at: config.report.include_timestamp.then(Utc::now),
        sources,
        skipped_sources,
    };
    let mut report = outcome.into_report(&pipeline, metadata);
    report.inventory = inventory.as_ref().map(|i| i.trains().to_vec());

    // Generate and save the report
    println!("\n📝 Generating report...");
    let content = report::render(&report, config.general.format)?;
    report::write_atomic(&output_path, content.as_bytes(), args.backup)?;

    if args.update_inventory {
        if let (Some(path), Some(inventory)) = (&args.inventory, &inventory) {
            report::write_atomic(path, &inventory.to_csv()?, args.backup)?;
            let (confirmed, declined) = inventory.tally();
            println!(
                "🚆 Inventory updated: {} booking(s) confirmed, {} declined",
                confirmed, declined
            );
        }
    }

    let duration = start_time.elapsed().as_secs_f64();
    let counts = report.counts;

    // Print summary
    println!("\n📊 Batch Summary:");
    println!("   Records processed: {}", counts.total);
    println!(
        "   - ✅ Valid: {} | ❌ Invalid: {}",
        counts.valid, counts.invalid
    );
    if !report.metadata.skipped_sources.is_empty() {
        println!(
            "   ⚠️  Skipped sources: {}",
            report.metadata.skipped_sources.len()
        );
    }
    if let Some(first) = report.ranking.entries.first() {
        println!(
            "   🏆 First by {}: {} ({})",
            report.ranking.measure,
            first.key,
            report::format_number(first.statistic)
        );
    }
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Batch complete! Report saved to: {}",
        output_path.display()
    );

    if args.fail_on_invalid && counts.invalid > 0 {
        eprintln!(
            "\n⛔ {} invalid record(s) found. Failing (exit code 2).",
            counts.invalid
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: print the sources that would be read, exit.
fn handle_dry_run(pipeline: &Pipeline, files: &[SourceFile]) -> Result<i32> {
    println!(
        "\n🔍 Dry run: dataset '{}' (no records read)...\n",
        pipeline.name
    );

    if files.is_empty() {
        println!("   No matching source files found.");
    } else {
        println!("   Found {} files that would be read:\n", files.len());
        for file in files {
            println!("     📄 {} ({} bytes)", file.display_name(), file.size);
        }
        println!("\n   Total: {} files", files.len());
    }

    println!("\n✅ Dry run complete. No report was written.");
    Ok(0)
}

/// Label file from --labels, or the dataset's default file in an input directory.
fn resolve_labels_path(args: &Args, pipeline: &Pipeline) -> Option<PathBuf> {
    if let Some(ref path) = args.labels {
        return Some(path.clone());
    }

    let table = pipeline.labels.as_ref()?;
    let found = source::find_label_file(&args.input, table);
    if let Some(ref path) = found {
        info!("Using label file: {}", path.display());
    }
    found
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
