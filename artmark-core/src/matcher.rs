//! Corpus matching by perceptual hash.
//!
//! A query hash is compared against every stored record and the single best
//! record is chosen under a two-tier threshold policy:
//!
//! - **strict**: distance ≤ 10, always admitted
//! - **moderate**: distance ≤ 15, admitted only when the confidence
//!   `1 - distance / 64` exceeds 0.7
//!
//! Smaller distances win; ties keep the record seen first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::corpus::{ensure_algorithm, FingerprintCorpus};
use crate::error::Result;
use crate::fingerprint::perceptual::PerceptualHash;

/// Default Hamming distance for a strict match.
pub const STRICT_THRESHOLD: u32 = 10;

/// Default Hamming distance for a moderate match.
pub const MODERATE_THRESHOLD: u32 = 15;

/// Confidence a moderate match must exceed.
pub const MIN_MODERATE_CONFIDENCE: f64 = 0.7;

/// A registered artwork as kept by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub id: String,
    /// Owner (artist) reference
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Perceptual hash as persisted (hex); legacy rows may lack it
    #[serde(default)]
    pub perceptual_hash: Option<String>,
    /// SHA-256 hex digest of the uploaded bytes
    #[serde(default)]
    pub content_digest: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FingerprintRecord {
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            title: None,
            perceptual_hash: None,
            content_digest: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_perceptual_hash(mut self, hash: &PerceptualHash) -> Self {
        self.perceptual_hash = Some(hash.to_hex());
        self
    }

    pub fn with_content_digest(mut self, digest: impl Into<String>) -> Self {
        self.content_digest = Some(digest.into());
        self
    }
}

/// Which threshold admitted a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Strict,
    Moderate,
}

/// Thresholds for [`SimilarityMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchPolicy {
    pub strict_threshold: u32,
    pub moderate_threshold: u32,
    pub min_moderate_confidence: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            strict_threshold: STRICT_THRESHOLD,
            moderate_threshold: MODERATE_THRESHOLD,
            min_moderate_confidence: MIN_MODERATE_CONFIDENCE,
        }
    }
}

impl MatchPolicy {
    /// Tier a candidate qualifies for, if any.
    pub fn admit(&self, distance: u32, confidence: f64) -> Option<MatchTier> {
        if distance <= self.strict_threshold {
            Some(MatchTier::Strict)
        } else if distance <= self.moderate_threshold
            && confidence > self.min_moderate_confidence
        {
            Some(MatchTier::Moderate)
        } else {
            None
        }
    }
}

/// Best corpus match for a query hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub record: FingerprintRecord,
    pub distance: u32,
    /// `1 - distance / bit_size`, in `[0, 1]`
    pub confidence: f64,
    pub tier: MatchTier,
}

/// Finds the closest registered artwork for a perceptual hash.
#[derive(Debug, Clone, Default)]
pub struct SimilarityMatcher {
    policy: MatchPolicy,
}

impl SimilarityMatcher {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Scan `records` and return the best admissible match.
    ///
    /// Records without a hash are skipped silently. Records whose hash is
    /// unreadable or of a different length are skipped with a warning.
    #[instrument(level = "debug", skip_all, fields(query = %query, records = records.len()))]
    pub fn find_similar(
        &self,
        query: &PerceptualHash,
        records: &[FingerprintRecord],
    ) -> Option<MatchResult> {
        let mut best: Option<(usize, u32, f64, MatchTier)> = None;

        for (idx, record) in records.iter().enumerate() {
            let Some(stored_hex) = record.perceptual_hash.as_deref() else {
                continue;
            };

            let stored = match PerceptualHash::from_hex(stored_hex, query.algorithm) {
                Ok(hash) => hash,
                Err(e) => {
                    warn!(record_id = %record.id, error = %e, "Skipping record with unreadable hash");
                    continue;
                }
            };

            let distance = match query.hamming_distance(&stored) {
                Ok(distance) => distance,
                Err(e) => {
                    warn!(record_id = %record.id, error = %e, "Skipping incomparable record");
                    continue;
                }
            };

            let confidence = query.confidence(distance);
            let Some(tier) = self.policy.admit(distance, confidence) else {
                continue;
            };

            let improves = best.map_or(true, |(_, best_distance, _, _)| distance < best_distance);
            if improves {
                best = Some((idx, distance, confidence, tier));
            }
        }

        let (idx, distance, confidence, tier) = best?;
        debug!(record_id = %records[idx].id, distance, confidence, ?tier, "Matched record");

        Some(MatchResult {
            record: records[idx].clone(),
            distance,
            confidence,
            tier,
        })
    }

    /// Query a corpus. Fails if the corpus was built with another algorithm.
    pub fn query_corpus<C: FingerprintCorpus + ?Sized>(
        &self,
        query: &PerceptualHash,
        corpus: &C,
    ) -> Result<Option<MatchResult>> {
        ensure_algorithm(corpus, query.algorithm)?;
        let records = corpus.records()?;
        Ok(self.find_similar(query, &records))
    }
}

/// Best match in `corpus` under the default [`MatchPolicy`].
pub fn find_similar_artwork<C: FingerprintCorpus + ?Sized>(
    query: &PerceptualHash,
    corpus: &C,
) -> Result<Option<MatchResult>> {
    SimilarityMatcher::default().query_corpus(query, corpus)
}

/// SHA-256 of the raw upload, lowercase hex.
///
/// Matches the file hash stored by the web upload flow, so imported records
/// can be found by [`find_exact_duplicate`].
pub fn content_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// First record whose stored content digest equals `digest`.
pub fn find_exact_duplicate<'a>(
    digest: &str,
    records: &'a [FingerprintRecord],
) -> Option<&'a FingerprintRecord> {
    records.iter().find(|record| {
        record
            .content_digest
            .as_deref()
            .is_some_and(|stored| stored.eq_ignore_ascii_case(digest))
    })
}
