//! JSON-file corpus.
//!
//! The file holds the corpus algorithm and every registered record:
//!
//! ```json
//! { "algorithm": "dct32", "records": [ { "id": "...", ... } ] }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use artmark_core::{FingerprintCorpus, FingerprintRecord, HashAlgorithm};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Serialize, Deserialize)]
struct CorpusFile {
    algorithm: HashAlgorithm,
    #[serde(default)]
    records: Vec<FingerprintRecord>,
}

/// Corpus persisted as a single JSON document.
#[derive(Debug)]
pub struct JsonFileCorpus {
    path: PathBuf,
    algorithm: HashAlgorithm,
    records: Vec<FingerprintRecord>,
}

impl JsonFileCorpus {
    /// Load an existing corpus file.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;
        let file: CorpusFile = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse corpus file: {}", path.display()))?;

        debug!(
            path = %path.display(),
            algorithm = %file.algorithm,
            records = file.records.len(),
            "Loaded corpus"
        );

        Ok(Self {
            path: path.to_path_buf(),
            algorithm: file.algorithm,
            records: file.records,
        })
    }

    /// Load the corpus, or start an empty one if the file does not exist yet.
    pub fn open_or_create(path: &Path, algorithm: HashAlgorithm) -> Result<Self> {
        if path.exists() {
            return Self::open(path);
        }
        info!(path = %path.display(), %algorithm, "Starting new corpus");
        Ok(Self {
            path: path.to_path_buf(),
            algorithm,
            records: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_slice(&self) -> &[FingerprintRecord] {
        &self.records
    }

    /// Append a record. Ids must be unique.
    pub fn insert(&mut self, record: FingerprintRecord) -> Result<()> {
        if self.records.iter().any(|r| r.id == record.id) {
            bail!("Record {} already exists in the corpus", record.id);
        }
        self.records.push(record);
        Ok(())
    }

    /// Write the corpus back, replacing the file in one step.
    pub fn save(&self) -> Result<()> {
        let file = CorpusFile {
            algorithm: self.algorithm,
            records: self.records.clone(),
        };
        let json = serde_json::to_vec_pretty(&file).context("Failed to serialize corpus")?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write corpus file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to write corpus file: {}", self.path.display()))?;

        info!(path = %self.path.display(), records = self.records.len(), "Corpus saved");
        Ok(())
    }
}

impl FingerprintCorpus for JsonFileCorpus {
    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn records(&self) -> artmark_core::Result<Vec<FingerprintRecord>> {
        Ok(self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_save_and_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("corpus.json");

        let mut corpus = JsonFileCorpus::open_or_create(&path, HashAlgorithm::Average8).unwrap();
        assert!(corpus.records_slice().is_empty());
        corpus
            .insert(FingerprintRecord::new("a1", "owner").with_title("Dawn"))
            .unwrap();
        corpus.save().unwrap();

        let reopened = JsonFileCorpus::open(&path).unwrap();
        assert_eq!(reopened.algorithm(), HashAlgorithm::Average8);
        assert_eq!(reopened.records().unwrap().len(), 1);
        assert_eq!(reopened.records_slice()[0].title.as_deref(), Some("Dawn"));
        assert!(!temp.path().join("corpus.json.tmp").exists());
    }

    #[test]
    fn test_duplicate_id() {
        let temp = TempDir::new().unwrap();
        let mut corpus =
            JsonFileCorpus::open_or_create(&temp.path().join("c.json"), HashAlgorithm::Dct32)
                .unwrap();
        corpus.insert(FingerprintRecord::new("a1", "o")).unwrap();
        let err = corpus.insert(FingerprintRecord::new("a1", "o")).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_open_missing_and_malformed() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.json");
        let err = JsonFileCorpus::open(&missing).unwrap_err();
        assert!(err.to_string().contains("Failed to read corpus file"));

        let malformed = temp.path().join("bad.json");
        std::fs::write(&malformed, b"{ not json").unwrap();
        let err = JsonFileCorpus::open(&malformed).unwrap_err();
        assert!(err.to_string().contains("Failed to parse corpus file"));
    }

    #[test]
    fn test_reads_hand_written_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("corpus.json");
        std::fs::write(
            &path,
            r#"{"algorithm":"dct32","records":[{"id":"r1","owner_id":"o1","perceptual_hash":"0123456789abcdef","created_at":"2024-05-01T12:00:00Z"}]}"#,
        )
        .unwrap();

        let corpus = JsonFileCorpus::open(&path).unwrap();
        assert_eq!(corpus.algorithm(), HashAlgorithm::Dct32);
        assert_eq!(
            corpus.records_slice()[0].perceptual_hash.as_deref(),
            Some("0123456789abcdef")
        );
    }
}
