//! Registered-artwork storage seen by the matcher.
//!
//! A corpus holds records fingerprinted with one [`HashAlgorithm`]. Querying
//! it with a hash of another algorithm is refused rather than producing
//! meaningless distances.

use crate::error::{ArtmarkError, Result};
use crate::fingerprint::perceptual::HashAlgorithm;
use crate::matcher::FingerprintRecord;

/// Read access to registered fingerprints.
pub trait FingerprintCorpus: Send + Sync {
    /// Algorithm every stored perceptual hash was produced with.
    fn algorithm(&self) -> HashAlgorithm;

    /// Snapshot of all records, in insertion order.
    fn records(&self) -> Result<Vec<FingerprintRecord>>;
}

/// Fail with `IncomparableFingerprint` unless `corpus` uses `algorithm`.
pub fn ensure_algorithm<C: FingerprintCorpus + ?Sized>(
    corpus: &C,
    algorithm: HashAlgorithm,
) -> Result<()> {
    if corpus.algorithm() != algorithm {
        return Err(ArtmarkError::IncomparableFingerprint(format!(
            "corpus holds {} hashes, query is {}",
            corpus.algorithm().version_tag(),
            algorithm.version_tag()
        )));
    }
    Ok(())
}

/// In-memory corpus for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryCorpus {
    algorithm: HashAlgorithm,
    records: Vec<FingerprintRecord>,
}

impl MemoryCorpus {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            records: Vec::new(),
        }
    }

    pub fn with_records(algorithm: HashAlgorithm, records: Vec<FingerprintRecord>) -> Self {
        Self { algorithm, records }
    }

    /// Append a record. Ids must be unique.
    pub fn insert(&mut self, record: FingerprintRecord) -> Result<()> {
        if self.records.iter().any(|r| r.id == record.id) {
            return Err(ArtmarkError::Corpus(format!(
                "record {} already exists",
                record.id
            )));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&FingerprintRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FingerprintCorpus for MemoryCorpus {
    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn records(&self) -> Result<Vec<FingerprintRecord>> {
        Ok(self.records.clone())
    }
}
