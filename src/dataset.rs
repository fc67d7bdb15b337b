//! ACI-Bench split loading.
//!
//! A split file is a JSON object whose `data` key holds the records:
//! `{"data": [{"src": "<dialogue>", "tgt": "<note>", "file": "<id>"}, ...]}`.

use crate::config::Config;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One benchmark entry
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub dialogue: String,
    pub reference: String,
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
struct SplitFile {
    data: Vec<RawRecord>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    src: String,
    tgt: String,
    #[serde(default)]
    file: Option<String>,
}

/// Path of a split's file under the data directory
pub fn split_path(data_dir: &Path, split: &str, config: &Config) -> Result<PathBuf> {
    let file_name = config.split_file(split)?;
    Ok(data_dir.join(&config.data_subdir).join(file_name))
}

/// Load a split in file order, keeping at most `max_samples` records
/// (`Some(0)` keeps them all)
pub fn load_split(
    data_dir: &Path,
    split: &str,
    config: &Config,
    max_samples: Option<usize>,
) -> Result<Vec<Sample>> {
    let path = split_path(data_dir, split, config)?;
    if !path.exists() {
        anyhow::bail!("Data file not found: {}", path.display());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read data file: {}", path.display()))?;
    let split_file: SplitFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse data file: {}", path.display()))?;

    let mut samples: Vec<Sample> = split_file
        .data
        .into_iter()
        .enumerate()
        .map(|(i, record)| Sample {
            dialogue: record.src,
            reference: record.tgt,
            identifier: record.file.unwrap_or_else(|| format!("sample_{}", i)),
        })
        .collect();

    // a cap of 0 means no cap
    if let Some(max) = max_samples.filter(|&max| max > 0) {
        samples.truncate(max);
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::{TempDir, tempdir};

    fn write_split(records: serde_json::Value) -> TempDir {
        let dir = tempdir().unwrap();
        let split_dir = dir.path().join("challenge_data_json");
        std::fs::create_dir_all(&split_dir).unwrap();
        std::fs::write(
            split_dir.join("valid.json"),
            serde_json::to_string(&json!({ "data": records })).unwrap(),
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_load_split_in_order() {
        let dir = write_split(json!([
            {"src": "[doctor] hi", "tgt": "CHIEF COMPLAINT: cough", "file": "D2N001"},
            {"src": "[doctor] hello", "tgt": "CHIEF COMPLAINT: fever"},
        ]));

        let samples = load_split(dir.path(), "valid", &Config::default(), None).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].identifier, "D2N001");
        assert_eq!(samples[0].dialogue, "[doctor] hi");
        assert_eq!(samples[1].identifier, "sample_1");
        assert_eq!(samples[1].reference, "CHIEF COMPLAINT: fever");
    }

    #[test]
    fn test_max_samples_truncates() {
        let records: Vec<_> = (0..5)
            .map(|i| json!({"src": format!("dialogue {}", i), "tgt": "note"}))
            .collect();
        let dir = write_split(json!(records));

        let samples = load_split(dir.path(), "valid", &Config::default(), Some(3)).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[2].dialogue, "dialogue 2");

        let all = load_split(dir.path(), "valid", &Config::default(), Some(50)).unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn test_zero_max_samples_keeps_all() {
        let records: Vec<_> = (0..4)
            .map(|i| json!({"src": format!("dialogue {}", i), "tgt": "note"}))
            .collect();
        let dir = write_split(json!(records));

        let samples = load_split(dir.path(), "valid", &Config::default(), Some(0)).unwrap();
        assert_eq!(samples.len(), 4);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_split(dir.path(), "test1", &Config::default(), None).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Data file not found"));
        assert!(message.contains("clinicalnlp_taskB_test1.json"));
    }

    #[test]
    fn test_unknown_split() {
        let dir = tempdir().unwrap();
        let err = load_split(dir.path(), "test9", &Config::default(), None).unwrap_err();
        assert!(err.to_string().contains("Unknown data split"));
    }

    #[test]
    fn test_malformed_record() {
        let dir = write_split(json!([{"src": "dialogue only"}]));
        let result = load_split(dir.path(), "valid", &Config::default(), None);
        assert!(result.is_err());
    }
}
