//! Rich image features for forgery-risk scoring.
//!
//! Where the perceptual hash answers "is this the same picture?", a
//! [`FeatureSet`] keeps enough local and global structure to grade *how* a
//! suspect copy differs from an original: keypoints with gradient
//! descriptors, luma and edge histograms, coarse colour moments and two
//! focus scalars.
//!
//! Extraction is a set of independent folds over an immutable [`PixelGrid`];
//! nothing is shared between invocations. With the `rayon` feature,
//! descriptors are built in parallel, collected in keypoint order.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::fingerprint::perceptual::pack_bits;
use crate::luma::{
    central_gradient, gaussian_pyramid, luma_at, sobel_gradient, to_grayscale, LumaImage,
};
use crate::sampler::{CodecSampler, ImageSampler, PixelGrid, CHANNELS};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Side of the square uploads are resampled to before extraction.
pub const FEATURE_SAMPLE_SIZE: u32 = 512;

/// Keypoints kept per image, in (octave, y, x) scan order.
pub const MAX_KEYPOINTS: usize = 200;

/// Pyramid depth used for keypoint detection.
pub const PYRAMID_LEVELS: usize = 3;

pub const HISTOGRAM_BINS: usize = 256;
pub const EDGE_BINS: usize = 32;
pub const COLOR_REGIONS: usize = 9;

const SCAN_STRIDE: usize = 4;
const EXTREMUM_THRESHOLD: f64 = 10.0;
const ORIENTATION_RADIUS: isize = 5;
const DESCRIPTOR_RADIUS: isize = 16;
const FEATURE_HASH_DESCRIPTORS: usize = 10;
const BLUR_DIFF_THRESHOLD: f64 = 10.0;

/// A locally distinctive location, in level-0 pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: u32,
    pub y: u32,
    /// `2^octave` of the pyramid level the keypoint was found on
    pub scale: f64,
    /// Dominant gradient direction in radians
    pub orientation: f64,
}

/// Mean colour of one byte-range region, each channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ColorMoment {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// Features of one image. Computed once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub keypoints: Vec<Keypoint>,
    /// One gradient-magnitude vector per keypoint (length varies at borders)
    pub descriptors: Vec<Vec<f64>>,
    /// 256-bin luma histogram, peak bin = 1.0
    pub histogram: Vec<f64>,
    /// 32-bin edge-magnitude histogram, bins sum to 1.0
    pub edge_histogram: Vec<f64>,
    pub color_moments: Vec<ColorMoment>,
    /// Mean absolute luma step between raster-order neighbours
    pub sharpness: f64,
    /// Fraction of sampled pixel pairs with a luma step below 10
    pub blur: f64,
    /// Coarse 64-bit summary of the first descriptors
    #[serde(with = "hex_u64")]
    pub feature_hash: u64,
}

impl FeatureSet {
    /// Feature hash as 16 lowercase hex digits.
    pub fn feature_hash_hex(&self) -> String {
        format!("{:016x}", self.feature_hash)
    }
}

/// Decodes uploads to a fixed square and extracts a [`FeatureSet`].
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    sample_size: u32,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FEATURE_SAMPLE_SIZE)
    }
}

impl FeatureExtractor {
    pub fn new(sample_size: u32) -> Self {
        Self { sample_size }
    }

    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    /// Decode raw image bytes and extract features.
    pub fn extract_bytes(&self, image_data: &[u8]) -> Result<FeatureSet> {
        self.extract_bytes_with(&CodecSampler::new(), image_data)
    }

    /// Decode with a custom sampler and extract features.
    pub fn extract_bytes_with<S: ImageSampler + ?Sized>(
        &self,
        sampler: &S,
        image_data: &[u8],
    ) -> Result<FeatureSet> {
        let grid = sampler.decode(image_data, self.sample_size, self.sample_size)?;
        Ok(extract_features(&grid))
    }
}

/// Extract features from a grid at its own resolution.
#[instrument(level = "debug", skip_all, fields(width = grid.width(), height = grid.height()))]
pub fn extract_features(grid: &PixelGrid) -> FeatureSet {
    let gray = to_grayscale(grid);
    let pyramid = gaussian_pyramid(&gray, PYRAMID_LEVELS);
    let keypoints = detect_keypoints(&pyramid);
    let descriptors = compute_descriptors(&gray, &keypoints);
    let rgba = grid.as_rgba();

    let features = FeatureSet {
        feature_hash: feature_hash(&descriptors),
        keypoints,
        descriptors,
        histogram: luma_histogram(&gray),
        edge_histogram: edge_histogram(&gray),
        color_moments: color_moments(rgba),
        sharpness: sharpness(rgba),
        blur: blur(rgba),
    };

    debug!(
        keypoints = features.keypoints.len(),
        sharpness = features.sharpness,
        blur = features.blur,
        feature_hash = %features.feature_hash_hex(),
        "Extracted features"
    );
    features
}

fn scan_positions(level: &LumaImage) -> impl Iterator<Item = (isize, isize)> {
    let (width, height) = (level.width(), level.height());
    (1..height.saturating_sub(1))
        .step_by(SCAN_STRIDE)
        .flat_map(move |y| {
            (1..width.saturating_sub(1))
                .step_by(SCAN_STRIDE)
                .map(move |x| (x as isize, y as isize))
        })
}

fn detect_keypoints(pyramid: &[LumaImage]) -> Vec<Keypoint> {
    pyramid
        .iter()
        .enumerate()
        .flat_map(|(octave, level)| {
            let scale = 1u32 << octave;
            scan_positions(level)
                .filter(move |&(x, y)| is_extremum(level, x, y))
                .map(move |(x, y)| Keypoint {
                    x: x as u32 * scale,
                    y: y as u32 * scale,
                    scale: scale as f64,
                    orientation: orientation(level, x, y),
                })
        })
        .take(MAX_KEYPOINTS)
        .collect()
}

/// Strict maximum or minimum over the 8-neighbourhood, with enough contrast.
fn is_extremum(level: &LumaImage, x: isize, y: isize) -> bool {
    let center = level.get(x, y);
    let mut is_max = true;
    let mut is_min = true;

    for dy in -1..=1 {
        for dx in -1..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let value = level.get(x + dx, y + dy);
            if value >= center {
                is_max = false;
            }
            if value <= center {
                is_min = false;
            }
        }
    }

    (is_max || is_min) && center.abs() > EXTREMUM_THRESHOLD
}

fn orientation(level: &LumaImage, x: isize, y: isize) -> f64 {
    let (width, height) = (level.width() as isize, level.height() as isize);
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;

    for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
        for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
            let (px, py) = (x + dx, y + dy);
            if px > 0 && px < width - 1 && py > 0 && py < height - 1 {
                let (gx, gy) = central_gradient(level, px, py);
                let magnitude = (gx * gx + gy * gy).sqrt();
                let angle = gy.atan2(gx);
                sum_x += magnitude * angle.cos();
                sum_y += magnitude * angle.sin();
            }
        }
    }

    sum_y.atan2(sum_x)
}

fn compute_descriptors(gray: &LumaImage, keypoints: &[Keypoint]) -> Vec<Vec<f64>> {
    #[cfg(feature = "rayon")]
    let iter = keypoints.par_iter();
    #[cfg(not(feature = "rayon"))]
    let iter = keypoints.iter();

    iter.map(|kp| descriptor(gray, kp)).collect()
}

fn descriptor(gray: &LumaImage, kp: &Keypoint) -> Vec<f64> {
    let (width, height) = (gray.width() as isize, gray.height() as isize);
    let (cx, cy) = (kp.x as isize, kp.y as isize);
    let side = (2 * DESCRIPTOR_RADIUS + 1) as usize;
    let mut values = Vec::with_capacity(side * side);

    for dy in -DESCRIPTOR_RADIUS..=DESCRIPTOR_RADIUS {
        for dx in -DESCRIPTOR_RADIUS..=DESCRIPTOR_RADIUS {
            let (px, py) = (cx + dx, cy + dy);
            if px > 0 && px < width && py > 0 && py < height {
                let (gx, gy) = central_gradient(gray, px, py);
                values.push((gx * gx + gy * gy).sqrt());
            }
        }
    }
    values
}

/// Each of the first descriptors thresholded at its own mean, concatenated,
/// cut or zero-padded to 64 bits.
fn feature_hash(descriptors: &[Vec<f64>]) -> u64 {
    let bits = descriptors
        .iter()
        .take(FEATURE_HASH_DESCRIPTORS)
        .filter(|d| !d.is_empty())
        .flat_map(|d| {
            let mean = d.iter().sum::<f64>() / d.len() as f64;
            d.iter().map(move |&v| v > mean)
        });
    pack_bits(bits.chain(std::iter::repeat(false)))
}

fn luma_histogram(gray: &LumaImage) -> Vec<f64> {
    let counts = gray
        .as_slice()
        .iter()
        .fold(vec![0u32; HISTOGRAM_BINS], |mut bins, &l| {
            bins[(l.floor() as usize).min(HISTOGRAM_BINS - 1)] += 1;
            bins
        });

    let max = counts.iter().copied().max().unwrap_or(0);
    counts
        .into_iter()
        .map(|c| if max == 0 { 0.0 } else { c as f64 / max as f64 })
        .collect()
}

fn edge_histogram(gray: &LumaImage) -> Vec<f64> {
    let (width, height) = (gray.width(), gray.height());
    let magnitudes: Vec<f64> = (1..height.saturating_sub(1))
        .step_by(2)
        .flat_map(|y| {
            (1..width.saturating_sub(1))
                .step_by(2)
                .map(move |x| (x as isize, y as isize))
        })
        .map(|(x, y)| {
            let (gx, gy) = sobel_gradient(gray, x, y);
            (gx * gx + gy * gy).sqrt()
        })
        .collect();

    if magnitudes.is_empty() {
        return vec![0.0; EDGE_BINS];
    }

    let max = magnitudes.iter().copied().fold(0.0, f64::max);
    let counts = magnitudes
        .iter()
        .fold(vec![0u32; EDGE_BINS], |mut bins, &m| {
            // A flat image has no edges at all: everything lands in bin 0.
            let bin = if max > 0.0 {
                ((m / max * EDGE_BINS as f64).floor() as usize).min(EDGE_BINS - 1)
            } else {
                0
            };
            bins[bin] += 1;
            bins
        });

    let total = magnitudes.len() as f64;
    counts.into_iter().map(|c| c as f64 / total).collect()
}

/// Mean r/g/b over 9 contiguous byte ranges of the RGBA buffer.
///
/// Regions are byte ranges of `len / 16 / 9` pixels, not spatial tiles, and
/// a range start need not be pixel aligned.
fn color_moments(rgba: &[u8]) -> Vec<ColorMoment> {
    let len = rgba.len();
    let region_size = len as f64 / 16.0 / COLOR_REGIONS as f64;
    let channel = |i: usize| rgba.get(i).copied().unwrap_or(0) as f64;

    (0..COLOR_REGIONS)
        .map(|region| {
            let start = (region as f64 * region_size * CHANNELS as f64).floor() as usize;
            let end = ((start as f64 + region_size * CHANNELS as f64).floor() as usize).min(len);

            let (sum, count) = (start..end).step_by(CHANNELS).fold(
                ([0.0f64; 3], 0usize),
                |(mut sum, count), i| {
                    sum[0] += channel(i);
                    sum[1] += channel(i + 1);
                    sum[2] += channel(i + 2);
                    (sum, count + 1)
                },
            );

            if count == 0 {
                return ColorMoment::default();
            }
            let n = count as f64;
            ColorMoment {
                r: sum[0] / n / 255.0,
                g: sum[1] / n / 255.0,
                b: sum[2] / n / 255.0,
            }
        })
        .collect()
}

fn sharpness(rgba: &[u8]) -> f64 {
    let pixels = rgba.len() / CHANNELS;
    if pixels == 0 {
        return 0.0;
    }
    let total: f64 = (0..rgba.len().saturating_sub(CHANNELS))
        .step_by(CHANNELS)
        .map(|i| (luma_at(rgba, i) - luma_at(rgba, i + CHANNELS)).abs())
        .sum();
    total / pixels as f64
}

fn blur(rgba: &[u8]) -> f64 {
    let (flat, pairs) = (0..rgba.len().saturating_sub(2 * CHANNELS))
        .step_by(2 * CHANNELS)
        .fold((0usize, 0usize), |(flat, pairs), i| {
            let diff = (luma_at(rgba, i) - luma_at(rgba, i + CHANNELS)).abs();
            (flat + (diff < BLUR_DIFF_THRESHOLD) as usize, pairs + 1)
        });

    if pairs == 0 {
        0.0
    } else {
        flat as f64 / pairs as f64
    }
}

mod hex_u64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value:016x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let text = String::deserialize(deserializer)?;
        u64::from_str_radix(&text, 16).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(width: u32, height: u32, value: u8) -> PixelGrid {
        PixelGrid::from_fn(width, height, |_, _| [value, value, value, 255]).unwrap()
    }

    /// Bright dots on every keypoint scan position of level 0.
    fn dotted(width: u32, height: u32) -> PixelGrid {
        PixelGrid::from_fn(width, height, |x, y| {
            if x % 4 == 1 && y % 4 == 1 {
                [220, 220, 220, 255]
            } else {
                [40, 40, 40, 255]
            }
        })
        .unwrap()
    }

    #[test]
    fn test_flat_image_features() {
        let features = extract_features(&flat(32, 32, 100));

        assert!(features.keypoints.is_empty());
        assert!(features.descriptors.is_empty());
        assert_eq!(features.feature_hash, 0);
        assert_eq!(features.feature_hash_hex(), "0000000000000000");

        assert_eq!(features.histogram.len(), HISTOGRAM_BINS);
        let peak = features
            .histogram
            .iter()
            .filter(|&&v| v == 1.0)
            .count();
        assert_eq!(peak, 1);
        assert_eq!(features.histogram.iter().sum::<f64>(), 1.0);

        assert_eq!(features.edge_histogram.len(), EDGE_BINS);
        assert_eq!(features.edge_histogram[0], 1.0);

        assert_eq!(features.sharpness, 0.0);
        assert_eq!(features.blur, 1.0);

        assert_eq!(features.color_moments.len(), COLOR_REGIONS);
        for moment in &features.color_moments {
            assert!((moment.r - 100.0 / 255.0).abs() < 1e-12);
            assert!((moment.g - 100.0 / 255.0).abs() < 1e-12);
            assert!((moment.b - 100.0 / 255.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_histogram_peak_is_one() {
        let grid = PixelGrid::from_fn(10, 10, |x, _| {
            let v = if x < 7 { 10 } else { 200 };
            [v, v, v, 255]
        })
        .unwrap();
        let features = extract_features(&grid);
        let max = features.histogram.iter().copied().fold(0.0, f64::max);
        assert_eq!(max, 1.0);
        // 70 dark pixels vs 30 bright ones
        let bright = features.histogram[199..=200].iter().copied().fold(0.0, f64::max);
        assert!((bright - 30.0 / 70.0).abs() < 1e-12);
    }

    #[test]
    fn test_keypoints_capped_in_scan_order() {
        let features = extract_features(&dotted(128, 128));

        assert_eq!(features.keypoints.len(), MAX_KEYPOINTS);
        assert_eq!(features.descriptors.len(), MAX_KEYPOINTS);

        // 32 scan positions per row on level 0
        assert_eq!((features.keypoints[0].x, features.keypoints[0].y), (1, 1));
        assert_eq!((features.keypoints[1].x, features.keypoints[1].y), (5, 1));
        assert_eq!((features.keypoints[32].x, features.keypoints[32].y), (1, 5));
        assert_eq!(
            (features.keypoints[199].x, features.keypoints[199].y),
            (29, 25)
        );
        assert!(features.keypoints.iter().all(|kp| kp.scale == 1.0));
    }

    #[test]
    fn test_keypoint_on_upper_octave_maps_to_level_zero() {
        // A 2x2 bright block only becomes a scanned extremum on level 1
        let grid = PixelGrid::from_fn(16, 16, |x, y| {
            if (2..4).contains(&x) && (2..4).contains(&y) {
                [250, 250, 250, 255]
            } else {
                [50, 50, 50, 255]
            }
        })
        .unwrap();
        let features = extract_features(&grid);

        assert_eq!(features.keypoints.len(), 1);
        let kp = features.keypoints[0];
        assert_eq!((kp.x, kp.y), (2, 2));
        assert_eq!(kp.scale, 2.0);
    }

    #[test]
    fn test_dark_extremum_below_threshold_is_ignored() {
        // A dark pit of value 5 in a flat field of 8: |5| <= 10
        let grid = PixelGrid::from_fn(12, 12, |x, y| {
            let v = if x == 5 && y == 5 { 5 } else { 8 };
            [v, v, v, 255]
        })
        .unwrap();
        assert!(extract_features(&grid).keypoints.is_empty());
    }

    #[test]
    fn test_descriptor_clipped_at_border() {
        let features = extract_features(&dotted(128, 128));
        // Keypoint (1, 1): px and py range over 1..=17
        assert_eq!(features.descriptors[0].len(), 17 * 17);
        // Keypoint (17, 17) is a full interior patch
        let interior = features
            .keypoints
            .iter()
            .position(|kp| kp.x == 17 && kp.y == 17)
            .unwrap();
        assert_eq!(features.descriptors[interior].len(), 33 * 33);
    }

    #[test]
    fn test_feature_hash_bits() {
        // Two descriptors: [0, 2] (mean 1 → 01) and [5, 1, 0] (mean 2 → 100)
        let descriptors = vec![vec![0.0, 2.0], vec![5.0, 1.0, 0.0]];
        let hash = feature_hash(&descriptors);
        assert_eq!(hash, 0b01100 << 59);
    }

    #[test]
    fn test_feature_hash_truncates_to_64_bits() {
        let descriptors = vec![vec![0.0, 1.0]; 40]; // 80 bits of 01
        assert_eq!(feature_hash(&descriptors), 0x5555_5555_5555_5555);
    }

    #[test]
    fn test_feature_hash_uses_first_ten_descriptors() {
        let mut descriptors = vec![vec![0.0, 1.0, 0.0]; 10];
        descriptors.push(vec![1.0, 0.0, 0.0]);
        let hash = feature_hash(&descriptors);
        // 30 bits of 010 followed by zero padding
        let expected = pack_bits(
            (0..30)
                .map(|i| i % 3 == 1)
                .chain(std::iter::repeat(false)),
        );
        assert_eq!(hash, expected);
    }

    #[test]
    fn test_edge_histogram_normalized_by_sample_count() {
        let features = extract_features(&dotted(64, 64));
        let total: f64 = features.edge_histogram.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_color_moments_use_byte_ranges() {
        // 12x12 → 576 bytes → region size 4 pixels: region k covers pixels 4k..4k+3
        let grid = PixelGrid::from_fn(12, 12, |x, y| [(y * 12 + x) as u8, 0, 255, 255]).unwrap();
        let moments = color_moments(grid.as_rgba());
        assert_eq!(moments.len(), COLOR_REGIONS);
        assert!((moments[0].r - 1.5 / 255.0).abs() < 1e-12);
        assert!((moments[8].r - 33.5 / 255.0).abs() < 1e-12);
        assert_eq!(moments[3].g, 0.0);
        assert_eq!(moments[3].b, 1.0);
    }

    #[test]
    fn test_color_moments_tiny_image() {
        let moments = color_moments(flat(1, 1, 200).as_rgba());
        assert_eq!(moments, vec![ColorMoment::default(); COLOR_REGIONS]);
    }

    #[test]
    fn test_sharpness_and_blur() {
        // white, black
        let grid = PixelGrid::from_fn(2, 1, |x, _| {
            let v = if x == 0 { 255 } else { 0 };
            [v, v, v, 255]
        })
        .unwrap();
        assert!((sharpness(grid.as_rgba()) - 127.5).abs() < 1e-9);
        // Only 2 pixels: no sampled pair
        assert_eq!(blur(grid.as_rgba()), 0.0);

        // 4 pixels: one sampled pair (0, 1), identical
        assert_eq!(blur(flat(4, 1, 80).as_rgba()), 1.0);
    }

    #[test]
    fn test_blur_counts_small_steps() {
        // Pairs (0,1) and (2,3) are sampled; (0,1) differs by 5, (2,3) by 50
        let values = [100u8, 105, 0, 50, 0, 0];
        let grid = PixelGrid::from_fn(6, 1, |x, _| {
            let v = values[x as usize];
            [v, v, v, 255]
        })
        .unwrap();
        assert_eq!(blur(grid.as_rgba()), 0.5);
    }

    /// Runs the parallel path under `--features rayon`.
    #[test]
    fn test_descriptors_follow_keypoint_order() {
        let gray = to_grayscale(&dotted(96, 80));
        let pyramid = gaussian_pyramid(&gray, PYRAMID_LEVELS);
        let keypoints = detect_keypoints(&pyramid);
        assert!(keypoints.len() > 1);

        let sequential: Vec<Vec<f64>> = keypoints.iter().map(|kp| descriptor(&gray, kp)).collect();
        assert_eq!(compute_descriptors(&gray, &keypoints), sequential);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_parallel_extraction_matches_keypoint_cap() {
        let grid = dotted(128, 128);
        let gray = to_grayscale(&grid);
        let features = extract_features(&grid);
        assert_eq!(features.keypoints.len(), MAX_KEYPOINTS);
        for (kp, desc) in features.keypoints.iter().zip(&features.descriptors) {
            assert_eq!(desc, &descriptor(&gray, kp));
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let grid = dotted(64, 48);
        assert_eq!(extract_features(&grid), extract_features(&grid));
    }

    #[test]
    fn test_feature_set_json_roundtrip_keeps_hex_hash() {
        let features = extract_features(&dotted(32, 32));
        let json = serde_json::to_string(&features).unwrap();
        assert!(json.contains(&format!("\"feature_hash\":\"{}\"", features.feature_hash_hex())));
        let restored: FeatureSet = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.feature_hash, features.feature_hash);
        assert_eq!(restored.keypoints.len(), features.keypoints.len());
    }

    #[test]
    fn test_extract_bytes_rejects_garbage() {
        assert!(FeatureExtractor::default().extract_bytes(b"nope").is_err());
    }
}
