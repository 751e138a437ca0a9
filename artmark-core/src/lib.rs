//! Artmark Core - perceptual fingerprinting and forgery-risk scoring
//!
//! This crate computes compact fingerprints of artwork images, finds the
//! closest registered artwork for an upload, and grades how likely a suspect
//! image is to be a copy of an original.
//!
//! # Features
//!
//! - 64-bit DCT perceptual hash, robust to re-encoding, resizing and
//!   brightness shifts
//! - Keypoint, histogram and colour-moment features for forgery grading
//! - Two-tier (strict / moderate) corpus matching
//! - Exact-duplicate lookup by SHA-256 content digest
//! - Optional `rayon` parallelism for descriptor construction
//!
//! # Example
//!
//! ```no_run
//! use artmark_core::{
//!     compare_forgery_risk, find_similar_artwork, FeatureExtractor, FingerprintRecord,
//!     MemoryCorpus, PerceptualHasher,
//! };
//!
//! # fn example(original: &[u8], upload: &[u8]) -> artmark_core::Result<()> {
//! let hasher = PerceptualHasher::default();
//!
//! // Register the original
//! let mut corpus = MemoryCorpus::new(hasher.algorithm());
//! let hash = hasher.hash_bytes(original)?;
//! corpus.insert(FingerprintRecord::new("artwork-1", "artist-1").with_perceptual_hash(&hash))?;
//!
//! // Look an upload up
//! if let Some(found) = find_similar_artwork(&hasher.hash_bytes(upload)?, &corpus)? {
//!     println!("matches {} ({:.0}%)", found.record.id, found.confidence * 100.0);
//! }
//!
//! // Grade it against the original
//! let extractor = FeatureExtractor::default();
//! let risk = compare_forgery_risk(&extractor.extract_bytes(original)?, &extractor.extract_bytes(upload)?);
//! println!("{}: {}", risk.classification, risk.rationale);
//! # Ok(())
//! # }
//! ```

pub mod corpus;
pub mod error;
pub mod fingerprint;
pub mod luma;
pub mod matcher;
pub mod risk;
pub mod sampler;

// Re-export main types for convenience
pub use corpus::{ensure_algorithm, FingerprintCorpus, MemoryCorpus};
pub use error::{ArtmarkError, Result};
pub use fingerprint::{
    extract_features, generate_perceptual_hash, hamming_distance, hamming_distance_hex,
    ColorMoment, FeatureExtractor, FeatureSet, HashAlgorithm, Keypoint, PerceptualHash,
    PerceptualHasher,
};
pub use matcher::{
    content_digest, find_exact_duplicate, find_similar_artwork, FingerprintRecord, MatchPolicy,
    MatchResult, MatchTier, SimilarityMatcher, MODERATE_THRESHOLD, STRICT_THRESHOLD,
};
pub use risk::{
    assess_with_weights, compare_forgery_risk, ForgeryClass, RiskAssessment, RiskWeights,
    SimilaritySignals,
};
pub use sampler::{CodecSampler, ImageSampler, PixelGrid};
