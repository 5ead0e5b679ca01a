//! Source discovery.
//!
//! This module resolves the input paths given on the command line into
//! the ordered list of files a batch reads, respecting the pipeline's
//! extensions and excludes.

use crate::error::{BatchError, BatchResult};
use crate::pipeline::Pipeline;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Configuration for source scanning.
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// File extensions to include (e.g., ["csv"]), compared case-insensitively
    pub extensions: Vec<String>,
    /// File or directory names to skip
    pub excludes: Vec<String>,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Files never treated as sources (output, lookup tables)
    pub skip_paths: Vec<PathBuf>,
    /// Skip unreadable directory entries instead of failing
    pub skip_unavailable: bool,
}

impl From<&Pipeline> for ScanConfig {
    fn from(pipeline: &Pipeline) -> Self {
        Self {
            extensions: pipeline.extensions.clone(),
            excludes: pipeline.exclude.clone(),
            recursive: pipeline.recursive,
            skip_paths: Vec::new(),
            skip_unavailable: false,
        }
    }
}

/// A discovered source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl SourceFile {
    pub fn display_name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Files found by a scan, plus the paths that could not be walked.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub files: Vec<SourceFile>,
    pub skipped: Vec<PathBuf>,
}

/// Scanner for discovering source files.
pub struct FileScanner {
    config: ScanConfig,
    skip: HashSet<PathBuf>,
}

impl FileScanner {
    /// Create a new file scanner.
    pub fn new(config: ScanConfig) -> Self {
        let skip = config.skip_paths.iter().map(|p| normalize(p)).collect();
        Self { config, skip }
    }

    /// Resolve every input into source files.
    ///
    /// Explicit files are taken as given. Directories contribute their
    /// matching files sorted by name. Missing inputs are an error; the
    /// same file reached twice is read once. With `skip_unavailable`, an
    /// entry that cannot be read inside a directory is recorded in
    /// `skipped` and the walk goes on.
    pub fn scan(&self, inputs: &[PathBuf]) -> BatchResult<ScanOutcome> {
        let mut outcome = ScanOutcome::default();
        let mut seen = HashSet::new();

        for input in inputs {
            let metadata = fs::metadata(input).map_err(|e| BatchError::source(input, e))?;

            if metadata.is_file() {
                self.push(input, metadata.len(), &mut outcome.files, &mut seen);
            } else if metadata.is_dir() {
                self.walk_dir(input, &mut outcome, &mut seen)?;
            } else {
                return Err(BatchError::source(input, "not a regular file or directory"));
            }
        }

        debug!(
            "Scanned {} source files ({} skipped)",
            outcome.files.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Check if a file inside an input directory is a source.
    pub fn matches(&self, path: &Path) -> bool {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if self.is_excluded(name) {
                return false;
            }
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.config
            .extensions
            .iter()
            .any(|wanted| wanted.eq_ignore_ascii_case(ext))
    }

    /// Check if a name matches exclusion patterns.
    fn is_excluded(&self, name: &str) -> bool {
        // Hidden files
        if name.starts_with('.') {
            return true;
        }

        self.config.excludes.iter().any(|pattern| name == pattern)
    }

    fn push(
        &self,
        path: &Path,
        size: u64,
        files: &mut Vec<SourceFile>,
        seen: &mut HashSet<PathBuf>,
    ) {
        let normalized = normalize(path);
        if self.skip.contains(&normalized) {
            debug!("Skipping reserved path {}", path.display());
            return;
        }
        if seen.insert(normalized) {
            files.push(SourceFile {
                path: path.to_path_buf(),
                size,
            });
        }
    }

    fn walk_dir(
        &self,
        dir: &Path,
        outcome: &mut ScanOutcome,
        seen: &mut HashSet<PathBuf>,
    ) -> BatchResult<()> {
        let max_depth = if self.config.recursive { usize::MAX } else { 1 };

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| !self.is_excluded(name))
                    .unwrap_or(true)
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(dir).to_path_buf();
                    if !self.config.skip_unavailable {
                        return Err(BatchError::source(&path, e));
                    }
                    warn!("Skipping unreadable path {}: {}", path.display(), e);
                    outcome.skipped.push(path);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            self.push(entry.path(), size, &mut outcome.files, seen);
        }

        Ok(())
    }
}

/// Absolute, symlink-free form of a path, also for files that do not
/// exist yet (such as the output report).
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match (fs::canonicalize(parent), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}
