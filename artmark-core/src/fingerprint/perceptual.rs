//! Perceptual hashing for artwork images.
//!
//! A perceptual hash is a 64-bit fingerprint that stays close (in Hamming
//! distance) for visually similar images, so re-encoded, resized or slightly
//! recoloured uploads can still be recognised.
//!
//! # Algorithms
//!
//! - [`HashAlgorithm::Dct32`] (production, `dct32-v1`): the image is resampled
//!   to 32×32, converted to luma, and the 8×8 block of lowest-frequency DCT
//!   coefficients is thresholded against the median of its 63 AC terms.
//! - [`HashAlgorithm::Average8`] (`ahash8-v1`): the image is resampled to 8×8
//!   and each luma value is thresholded against the mean of all 64.
//!
//! The two variants assign different meanings to each bit. A hash carries the
//! algorithm that produced it and comparing hashes of different algorithms is
//! an [`ArtmarkError::IncomparableFingerprint`], as is comparing hashes of
//! different bit lengths.
//!
//! # Usage
//!
//! ```no_run
//! use artmark_core::fingerprint::{HashAlgorithm, PerceptualHasher};
//!
//! let image_data = std::fs::read("image.jpg").unwrap();
//! let hasher = PerceptualHasher::new(HashAlgorithm::Dct32);
//! let hash1 = hasher.hash_bytes(&image_data).unwrap();
//!
//! // Compare two hashes
//! let image_data2 = std::fs::read("image2.jpg").unwrap();
//! let hash2 = hasher.hash_bytes(&image_data2).unwrap();
//! let distance = hash1.hamming_distance(&hash2).unwrap();
//! let similar = distance <= 10; // Threshold for similarity
//! ```

use std::f64::consts::{FRAC_1_SQRT_2, PI};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ArtmarkError, Result};
use crate::luma::{to_grayscale, LumaImage};
use crate::matcher::STRICT_THRESHOLD;
use crate::sampler::{CodecSampler, ImageSampler, PixelGrid};

/// Fixed hash size in bytes (64 bits = 8 bytes).
pub const PERCEPTUAL_HASH_SIZE: usize = 8;

/// Fixed hash size in bits.
pub const HASH_BITS: u32 = (PERCEPTUAL_HASH_SIZE * 8) as u32;

/// Side of the DCT coefficient block kept for the hash.
const DCT_BLOCK: usize = 8;

/// Perceptual hash algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// 32×32 DCT hash. This is the production algorithm.
    #[default]
    Dct32,
    /// 8×8 average hash. Faster, less tolerant of edits.
    Average8,
}

impl HashAlgorithm {
    /// Versioned identifier persisted alongside a corpus.
    pub fn version_tag(&self) -> &'static str {
        match self {
            Self::Dct32 => "dct32-v1",
            Self::Average8 => "ahash8-v1",
        }
    }

    /// Side of the square the image is resampled to before hashing.
    pub fn sample_size(&self) -> u32 {
        match self {
            Self::Dct32 => 32,
            Self::Average8 => 8,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dct32 => write!(f, "dct32"),
            Self::Average8 => write!(f, "average8"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = ArtmarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dct32" | "dct32-v1" => Ok(Self::Dct32),
            "average8" | "ahash8-v1" => Ok(Self::Average8),
            other => Err(ArtmarkError::InvalidInput(format!(
                "unknown hash algorithm: {other}"
            ))),
        }
    }
}

/// Computed perceptual hash with metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceptualHash {
    /// The hash bytes, most significant bit first (exactly 8 bytes when
    /// produced by this crate; stored legacy hashes may differ).
    /// Serialized as lowercase hex.
    #[serde(with = "hex_bytes")]
    pub hash: Vec<u8>,
    /// Algorithm used to compute the hash
    pub algorithm: HashAlgorithm,
    /// Hash size in bits
    pub bit_size: u32,
}

impl PerceptualHash {
    /// Create a new perceptual hash from fixed-size bytes.
    pub fn new(hash: [u8; PERCEPTUAL_HASH_SIZE], algorithm: HashAlgorithm) -> Self {
        Self {
            hash: hash.to_vec(),
            algorithm,
            bit_size: HASH_BITS,
        }
    }

    /// Create from a packed 64-bit value (bit 0 of the fingerprint is the MSB).
    pub fn from_bits(bits: u64, algorithm: HashAlgorithm) -> Self {
        Self::new(bits.to_be_bytes(), algorithm)
    }

    /// Create from variable-size bytes (for stored legacy hashes).
    pub fn from_bytes(hash: Vec<u8>, algorithm: HashAlgorithm) -> Self {
        let bit_size = (hash.len() * 8) as u32;
        Self {
            hash,
            algorithm,
            bit_size,
        }
    }

    /// The packed 64-bit value, if this is a standard-size hash.
    pub fn bits(&self) -> Option<u64> {
        let bytes: [u8; PERCEPTUAL_HASH_SIZE] = self.hash.as_slice().try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }

    /// Compute the Hamming distance between two perceptual hashes.
    ///
    /// # Returns
    ///
    /// - `Ok(distance)` if both hashes use the same algorithm and bit size
    /// - `Err(IncomparableFingerprint)` otherwise
    pub fn hamming_distance(&self, other: &Self) -> Result<u32> {
        if self.algorithm != other.algorithm {
            return Err(ArtmarkError::IncomparableFingerprint(format!(
                "{} hash vs {} hash",
                self.algorithm, other.algorithm
            )));
        }
        hamming_distance(&self.hash, &other.hash)
    }

    /// Map a distance to a confidence in `[0, 1]`: `1 - distance / bit_size`.
    pub fn confidence(&self, distance: u32) -> f64 {
        if self.bit_size == 0 {
            return 0.0;
        }
        (1.0 - distance as f64 / self.bit_size as f64).clamp(0.0, 1.0)
    }

    /// Check if two images are similar based on Hamming distance threshold.
    ///
    /// # Arguments
    ///
    /// * `other` - The other hash to compare against
    /// * `threshold` - Maximum Hamming distance to consider similar (default: 10)
    ///
    /// # Returns
    ///
    /// `true` if the hashes are within the threshold distance
    pub fn is_similar(&self, other: &Self, threshold: Option<u32>) -> Result<bool> {
        let threshold = threshold.unwrap_or(STRICT_THRESHOLD);
        let distance = self.hamming_distance(other)?;
        Ok(distance <= threshold)
    }

    /// Get the hash as a lowercase hexadecimal string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.hash)
    }

    /// Create a perceptual hash from a hexadecimal string.
    pub fn from_hex(hex_str: &str, algorithm: HashAlgorithm) -> Result<Self> {
        if hex_str.is_empty() {
            return Err(ArtmarkError::InvalidHash("empty hash string".into()));
        }
        let hash = hex::decode(hex_str)
            .map_err(|e| ArtmarkError::InvalidHash(format!("Invalid hex string: {}", e)))?;
        Ok(Self::from_bytes(hash, algorithm))
    }

    /// Check if this hash has the standard size (8 bytes).
    pub fn is_standard_size(&self) -> bool {
        self.hash.len() == PERCEPTUAL_HASH_SIZE
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Perceptual hasher configuration and computation.
#[derive(Debug, Clone, Default)]
pub struct PerceptualHasher {
    algorithm: HashAlgorithm,
}

impl PerceptualHasher {
    /// Create a new perceptual hasher with the specified algorithm.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Compute perceptual hash from raw image bytes.
    ///
    /// Supports JPEG, PNG, GIF, and WebP formats.
    pub fn hash_bytes(&self, image_data: &[u8]) -> Result<PerceptualHash> {
        self.hash_bytes_with(&CodecSampler::new(), image_data)
    }

    /// Compute perceptual hash from raw image bytes using a custom sampler.
    pub fn hash_bytes_with<S: ImageSampler + ?Sized>(
        &self,
        sampler: &S,
        image_data: &[u8],
    ) -> Result<PerceptualHash> {
        let size = self.algorithm.sample_size();
        let grid = sampler.decode(image_data, size, size)?;
        self.hash_grid(&grid)
    }

    /// Compute perceptual hash from a pixel grid of any size.
    #[instrument(level = "debug", skip_all, fields(algorithm = %self.algorithm))]
    pub fn hash_grid(&self, grid: &PixelGrid) -> Result<PerceptualHash> {
        let size = self.algorithm.sample_size();
        let sample = grid.resample(size, size)?;
        let gray = to_grayscale(&sample);

        let bits = match self.algorithm {
            HashAlgorithm::Dct32 => dct_hash(&gray),
            HashAlgorithm::Average8 => average_hash(&gray),
        };

        let hash = PerceptualHash::from_bits(bits, self.algorithm);
        debug!(
            width = grid.width(),
            height = grid.height(),
            hash = %hash,
            "Computed perceptual hash"
        );
        Ok(hash)
    }

    /// Get the algorithm used by this hasher.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

/// Compute the production perceptual hash ([`HashAlgorithm::Dct32`]) of a grid.
pub fn generate_perceptual_hash(grid: &PixelGrid) -> Result<PerceptualHash> {
    PerceptualHasher::default().hash_grid(grid)
}

/// Compute Hamming distance between two perceptual hash byte arrays.
///
/// # Returns
///
/// The number of differing bits, or `IncomparableFingerprint` if the arrays
/// differ in length or are empty.
pub fn hamming_distance(hash1: &[u8], hash2: &[u8]) -> Result<u32> {
    if hash1.is_empty() || hash2.is_empty() {
        return Err(ArtmarkError::IncomparableFingerprint(
            "Cannot compare empty hashes".into(),
        ));
    }
    if hash1.len() != hash2.len() {
        return Err(ArtmarkError::IncomparableFingerprint(format!(
            "{}-bit hash vs {}-bit hash",
            hash1.len() * 8,
            hash2.len() * 8
        )));
    }

    Ok(hash1
        .iter()
        .zip(hash2.iter())
        .map(|(a, b)| (a ^ b).count_ones())
        .sum())
}

/// Hamming distance between two stored hex hashes.
pub fn hamming_distance_hex(hex1: &str, hex2: &str) -> Result<u32> {
    if hex1.len() != hex2.len() {
        return Err(ArtmarkError::IncomparableFingerprint(format!(
            "{}-digit hash vs {}-digit hash",
            hex1.len(),
            hex2.len()
        )));
    }
    let a = hex::decode(hex1)
        .map_err(|e| ArtmarkError::InvalidHash(format!("Invalid hex string: {}", e)))?;
    let b = hex::decode(hex2)
        .map_err(|e| ArtmarkError::InvalidHash(format!("Invalid hex string: {}", e)))?;
    hamming_distance(&a, &b)
}

/// Pack bits into a u64, first bit in the most significant position.
pub(crate) fn pack_bits(bits: impl IntoIterator<Item = bool>) -> u64 {
    bits.into_iter()
        .take(HASH_BITS as usize)
        .fold(0u64, |acc, bit| (acc << 1) | bit as u64)
}

/// 8×8 low-frequency DCT block of a square luma image, flattened with `u`
/// (the column frequency) outer.
fn dct_coefficients(gray: &LumaImage) -> [f64; DCT_BLOCK * DCT_BLOCK] {
    let n = gray.width();
    let cosines: Vec<Vec<f64>> = (0..DCT_BLOCK)
        .map(|k| {
            (0..n)
                .map(|x| (((2 * x + 1) * k) as f64 * PI / (2 * n) as f64).cos())
                .collect()
        })
        .collect();

    let mut coeffs = [0.0; DCT_BLOCK * DCT_BLOCK];
    for u in 0..DCT_BLOCK {
        for v in 0..DCT_BLOCK {
            let mut sum = 0.0;
            for x in 0..n {
                for y in 0..n {
                    sum += gray.get(x as isize, y as isize) * cosines[u][x] * cosines[v][y];
                }
            }
            let cu = if u == 0 { FRAC_1_SQRT_2 } else { 1.0 };
            let cv = if v == 0 { FRAC_1_SQRT_2 } else { 1.0 };
            coeffs[u * DCT_BLOCK + v] = cu * cv * sum / 4.0;
        }
    }
    coeffs
}

fn dct_hash(gray: &LumaImage) -> u64 {
    let coeffs = dct_coefficients(gray);

    // Median of the AC terms; the DC term is still thresholded below.
    let mut ac = coeffs[1..].to_vec();
    ac.sort_by(f64::total_cmp);
    let median = ac[ac.len() / 2];

    pack_bits(coeffs.iter().map(|&c| c > median))
}

fn average_hash(gray: &LumaImage) -> u64 {
    let pixels = gray.as_slice();
    let mean = pixels.iter().sum::<f64>() / pixels.len() as f64;
    pack_bits(pixels.iter().map(|&p| p > mean))
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}
