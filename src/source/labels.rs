//! Display-name lookup tables.

use crate::error::{BatchError, BatchResult};
use crate::pipeline::LabelTable;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Load a key → label map from a CSV file.
///
/// Later rows win over earlier rows with the same key.
pub fn load_labels(path: &Path, table: &LabelTable) -> BatchResult<HashMap<String, String>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| BatchError::source(path, e))?;

    let headers = reader
        .headers()
        .map_err(|e| BatchError::source(path, e))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| BatchError::source(path, format!("missing column '{}'", name)))
    };
    let key_idx = column(&table.key_column)?;
    let label_idx = column(&table.label_column)?;

    let mut labels = HashMap::new();
    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping label row in {}: {}", path.display(), e);
                continue;
            }
        };
        if let (Some(key), Some(label)) = (row.get(key_idx), row.get(label_idx)) {
            if !key.is_empty() {
                labels.insert(key.to_string(), label.to_string());
            }
        }
    }

    debug!("Loaded {} labels from {}", labels.len(), path.display());
    Ok(labels)
}

/// Look for the table's default file in the input directories.
pub fn find_label_file(inputs: &[PathBuf], table: &LabelTable) -> Option<PathBuf> {
    let file = table.file.as_deref()?;
    inputs
        .iter()
        .filter(|p| p.is_dir())
        .map(|dir| dir.join(file))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn table() -> LabelTable {
        LabelTable {
            file: Some("product_names.csv".into()),
            key_column: "Product ID".into(),
            label_column: "Product Name".into(),
        }
    }

    #[test]
    fn test_load_labels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("product_names.csv");
        fs::write(&path, "Product ID,Product Name\nP1,Kettle\nP2, Toaster \n,Orphan\n").unwrap();

        let labels = load_labels(&path, &table()).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["P1"], "Kettle");
        assert_eq!(labels["P2"], "Toaster");
    }

    #[test]
    fn test_missing_label_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("names.csv");
        fs::write(&path, "Product ID,Name\nP1,Kettle\n").unwrap();

        let err = load_labels(&path, &table()).unwrap_err();
        assert!(err.to_string().contains("Product Name"));
    }

    #[test]
    fn test_find_label_file() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![dir.path().to_path_buf()];
        assert_eq!(find_label_file(&inputs, &table()), None);

        fs::write(dir.path().join("product_names.csv"), "Product ID,Product Name\n").unwrap();
        assert_eq!(
            find_label_file(&inputs, &table()),
            Some(dir.path().join("product_names.csv"))
        );
    }
}
