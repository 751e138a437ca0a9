//! Image fingerprints.
//!
//! # Components
//!
//! - **Perceptual hashing**: a 64-bit fingerprint that stays close for
//!   visually similar images, used to look artworks up in a corpus.
//! - **Feature extraction**: keypoints, descriptors and global statistics,
//!   used to grade how far a suspect copy has drifted from an original.

pub mod features;
pub mod perceptual;

pub use features::{
    extract_features, ColorMoment, FeatureExtractor, FeatureSet, Keypoint, FEATURE_SAMPLE_SIZE,
};
pub use perceptual::{
    generate_perceptual_hash, hamming_distance, hamming_distance_hex, HashAlgorithm,
    PerceptualHash, PerceptualHasher, HASH_BITS, PERCEPTUAL_HASH_SIZE,
};
