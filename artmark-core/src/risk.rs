//! Forgery-risk scoring between an original and a suspect [`FeatureSet`].
//!
//! Six similarity signals are combined into one weighted score in `[0, 1]`,
//! which is then banded into a [`ForgeryClass`]. A high score means the
//! suspect is close to the original, i.e. a likely copy.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::fingerprint::features::{ColorMoment, FeatureSet};

/// Descriptors of the first image probed against the second.
const MAX_PROBED_DESCRIPTORS: usize = 50;

/// Euclidean distance under which two descriptors match.
const DESCRIPTOR_MATCH_DISTANCE: f64 = 100.0;

/// Sharpness difference that saturates the sharpness term.
const SHARPNESS_SCALE: f64 = 100.0;

/// Per-signal comparison of two feature sets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilaritySignals {
    pub descriptor_similarity: f64,
    pub histogram_similarity: f64,
    pub edge_similarity: f64,
    pub color_moment_similarity: f64,
    /// Absolute blur difference
    pub blur_delta: f64,
    /// Absolute sharpness difference
    pub sharpness_delta: f64,
}

impl SimilaritySignals {
    pub fn between(original: &FeatureSet, suspect: &FeatureSet) -> Self {
        Self {
            descriptor_similarity: descriptor_similarity(
                &original.descriptors,
                &suspect.descriptors,
            ),
            histogram_similarity: cosine_similarity(&original.histogram, &suspect.histogram),
            edge_similarity: cosine_similarity(
                &original.edge_histogram,
                &suspect.edge_histogram,
            ),
            color_moment_similarity: color_moment_similarity(
                &original.color_moments,
                &suspect.color_moments,
            ),
            blur_delta: (original.blur - suspect.blur).abs(),
            sharpness_delta: (original.sharpness - suspect.sharpness).abs(),
        }
    }
}

/// Weights of each signal in the final score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub descriptors: f64,
    pub histogram: f64,
    pub edges: f64,
    pub color_moments: f64,
    pub blur: f64,
    pub sharpness: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            descriptors: 0.35,
            histogram: 0.20,
            edges: 0.20,
            color_moments: 0.10,
            blur: 0.10,
            sharpness: 0.05,
        }
    }
}

impl RiskWeights {
    /// Weighted sum of the signals, clamped to `[0, 1]`.
    pub fn combine(&self, signals: &SimilaritySignals) -> f64 {
        let score = self.descriptors * signals.descriptor_similarity
            + self.histogram * signals.histogram_similarity
            + self.edges * signals.edge_similarity
            + self.color_moments * signals.color_moment_similarity
            + self.blur * (1.0 - signals.blur_delta)
            + self.sharpness * (1.0 - (signals.sharpness_delta / SHARPNESS_SCALE).min(1.0));
        score.clamp(0.0, 1.0)
    }
}

/// Risk band of a suspect copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForgeryClass {
    ExactCopy,
    ScreenshotResized,
    ColorGraded,
    HeavilyModified,
    DerivativeWork,
    Original,
}

impl ForgeryClass {
    /// Band a risk score; every bound is exclusive.
    pub fn from_score(score: f64) -> Self {
        if score > 0.92 {
            Self::ExactCopy
        } else if score > 0.85 {
            Self::ScreenshotResized
        } else if score > 0.78 {
            Self::ColorGraded
        } else if score > 0.70 {
            Self::HeavilyModified
        } else if score > 0.60 {
            Self::DerivativeWork
        } else {
            Self::Original
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ExactCopy => "Exact Copy",
            Self::ScreenshotResized => "Screenshot/Resized",
            Self::ColorGraded => "Color-Graded/Edited",
            Self::HeavilyModified => "Heavily Modified",
            Self::DerivativeWork => "Derivative Work",
            Self::Original => "Original",
        }
    }

    pub fn rationale(&self) -> &'static str {
        match self {
            Self::ExactCopy => {
                "This appears to be an exact or near-exact duplicate of the original artwork."
            }
            Self::ScreenshotResized => {
                "This appears to be a screenshot or resized version of the original artwork."
            }
            Self::ColorGraded => {
                "This artwork appears to have color adjustments or minor edits applied."
            }
            Self::HeavilyModified => {
                "This artwork shows significant modifications but shares structural similarities."
            }
            Self::DerivativeWork => "This may be based on the original but has substantial changes.",
            Self::Original => "No forgery detected",
        }
    }

    /// Whether the band indicates some form of copying.
    pub fn is_forgery(&self) -> bool {
        !matches!(self, Self::Original)
    }
}

impl fmt::Display for ForgeryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of comparing a suspect against an original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Weighted similarity in `[0, 1]`
    pub risk_score: f64,
    pub classification: ForgeryClass,
    pub rationale: String,
    pub signals: SimilaritySignals,
}

/// Compare two feature sets with the calibrated [`RiskWeights`].
pub fn compare_forgery_risk(original: &FeatureSet, suspect: &FeatureSet) -> RiskAssessment {
    assess_with_weights(original, suspect, &RiskWeights::default())
}

/// Compare two feature sets with custom weights.
#[instrument(level = "debug", skip_all)]
pub fn assess_with_weights(
    original: &FeatureSet,
    suspect: &FeatureSet,
    weights: &RiskWeights,
) -> RiskAssessment {
    let signals = SimilaritySignals::between(original, suspect);
    let risk_score = weights.combine(&signals);
    let classification = ForgeryClass::from_score(risk_score);

    debug!(
        risk_score,
        classification = %classification,
        descriptors = signals.descriptor_similarity,
        histogram = signals.histogram_similarity,
        edges = signals.edge_similarity,
        "Assessed forgery risk"
    );

    RiskAssessment {
        risk_score,
        classification,
        rationale: classification.rationale().to_string(),
        signals,
    }
}

/// Fraction of probed descriptors of `a` with a close partner in `b`.
///
/// Two keypoint-free images (flat or smooth artwork) agree completely; one
/// empty side against a non-empty one shares nothing.
fn descriptor_similarity(a: &[Vec<f64>], b: &[Vec<f64>]) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }

    let matches = a
        .iter()
        .take(MAX_PROBED_DESCRIPTORS)
        .filter(|da| {
            let nearest = b
                .iter()
                .map(|db| euclidean_prefix(da, db))
                .fold(f64::INFINITY, f64::min);
            nearest < DESCRIPTOR_MATCH_DISTANCE
        })
        .count();

    let denominator = a.len().min(b.len()).min(MAX_PROBED_DESCRIPTORS);
    (matches as f64 / denominator as f64).clamp(0.0, 1.0)
}

/// Euclidean distance over the common prefix of two vectors.
fn euclidean_prefix(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0, 0.0, 0.0), |(dot, na, nb), (x, y)| {
        (dot + x * y, na + x * x, nb + y * y)
    });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn color_moment_similarity(a: &[ColorMoment], b: &[ColorMoment]) -> f64 {
    let regions = a.len().min(b.len());
    if regions == 0 {
        return 0.0;
    }

    let total: f64 = a
        .iter()
        .zip(b)
        .map(|(ma, mb)| {
            let diff = (ma.r - mb.r).abs() + (ma.g - mb.g).abs() + (ma.b - mb.b).abs();
            1.0 - diff / 3.0
        })
        .sum();
    total / regions as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(value: f64) -> SimilaritySignals {
        SimilaritySignals {
            descriptor_similarity: value,
            histogram_similarity: value,
            edge_similarity: value,
            color_moment_similarity: value,
            blur_delta: 1.0 - value,
            sharpness_delta: (1.0 - value) * SHARPNESS_SCALE,
        }
    }

    fn feature_set(descriptors: Vec<Vec<f64>>) -> FeatureSet {
        FeatureSet {
            keypoints: Vec::new(),
            descriptors,
            histogram: vec![1.0, 0.5, 0.0],
            edge_histogram: vec![0.5, 0.5],
            color_moments: vec![ColorMoment { r: 0.2, g: 0.4, b: 0.6 }; 9],
            sharpness: 12.0,
            blur: 0.4,
            feature_hash: 0,
        }
    }

    #[test]
    fn test_band_boundaries() {
        assert_eq!(ForgeryClass::from_score(1.0), ForgeryClass::ExactCopy);
        assert_eq!(ForgeryClass::from_score(0.93), ForgeryClass::ExactCopy);
        assert_eq!(ForgeryClass::from_score(0.92), ForgeryClass::ScreenshotResized);
        assert_eq!(ForgeryClass::from_score(0.85), ForgeryClass::ColorGraded);
        assert_eq!(ForgeryClass::from_score(0.78), ForgeryClass::HeavilyModified);
        assert_eq!(ForgeryClass::from_score(0.70), ForgeryClass::DerivativeWork);
        assert_eq!(ForgeryClass::from_score(0.60), ForgeryClass::Original);
        assert_eq!(ForgeryClass::from_score(0.0), ForgeryClass::Original);
    }

    #[test]
    fn test_bands_are_ordered_and_exhaustive() {
        let order = [
            ForgeryClass::Original,
            ForgeryClass::DerivativeWork,
            ForgeryClass::HeavilyModified,
            ForgeryClass::ColorGraded,
            ForgeryClass::ScreenshotResized,
            ForgeryClass::ExactCopy,
        ];
        let rank = |c: ForgeryClass| order.iter().position(|&o| o == c).unwrap();

        let mut previous = 0;
        for step in 0..=1000 {
            let class = ForgeryClass::from_score(step as f64 / 1000.0);
            let current = rank(class);
            assert!(current >= previous, "band went down at {step}");
            previous = current;
        }
        assert_eq!(previous, order.len() - 1);
    }

    #[test]
    fn test_labels_and_rationales() {
        assert_eq!(ForgeryClass::ExactCopy.to_string(), "Exact Copy");
        assert_eq!(ForgeryClass::ColorGraded.label(), "Color-Graded/Edited");
        assert_eq!(ForgeryClass::Original.rationale(), "No forgery detected");
        assert!(!ForgeryClass::Original.is_forgery());
        assert!(ForgeryClass::DerivativeWork.is_forgery());
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = RiskWeights::default();
        let sum = w.descriptors + w.histogram + w.edges + w.color_moments + w.blur + w.sharpness;
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((w.combine(&signals(1.0)) - 1.0).abs() < 1e-12);
        assert_eq!(w.combine(&signals(0.0)), 0.0);
    }

    #[test]
    fn test_risk_is_monotonic_in_each_signal() {
        let weights = RiskWeights::default();
        let base = signals(0.5);
        let base_score = weights.combine(&base);

        let raised = [
            SimilaritySignals { descriptor_similarity: 0.9, ..base },
            SimilaritySignals { histogram_similarity: 0.9, ..base },
            SimilaritySignals { edge_similarity: 0.9, ..base },
            SimilaritySignals { color_moment_similarity: 0.9, ..base },
            SimilaritySignals { blur_delta: 0.1, ..base },
            SimilaritySignals { sharpness_delta: 10.0, ..base },
        ];
        for s in raised {
            assert!(weights.combine(&s) > base_score, "{s:?}");
        }

        // Beyond 100 the sharpness term is saturated
        let a = SimilaritySignals { sharpness_delta: 150.0, ..base };
        let b = SimilaritySignals { sharpness_delta: 400.0, ..base };
        assert_eq!(weights.combine(&a), weights.combine(&b));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_color_moment_similarity() {
        let a = vec![ColorMoment { r: 0.0, g: 0.0, b: 0.0 }; 2];
        let b = vec![
            ColorMoment { r: 0.3, g: 0.3, b: 0.3 },
            ColorMoment { r: 0.0, g: 0.0, b: 0.0 },
        ];
        assert!((color_moment_similarity(&a, &b) - 0.85).abs() < 1e-12);
        assert_eq!(color_moment_similarity(&a, &[]), 0.0);
    }

    #[test]
    fn test_descriptor_similarity() {
        let a = vec![vec![0.0, 0.0], vec![500.0, 500.0]];
        let b = vec![vec![10.0, 10.0], vec![1000.0, 0.0, 7.0]];
        // Only [0, 0] has a partner closer than 100
        assert_eq!(descriptor_similarity(&a, &b), 0.5);
        assert_eq!(descriptor_similarity(&a, &[]), 0.0);
        assert_eq!(descriptor_similarity(&[], &b), 0.0);
    }

    #[test]
    fn test_descriptor_similarity_without_keypoints() {
        assert_eq!(descriptor_similarity(&[], &[]), 1.0);

        let set = feature_set(Vec::new());
        let assessment = compare_forgery_risk(&set, &set);
        assert_eq!(assessment.signals.descriptor_similarity, 1.0);
        assert_eq!(assessment.classification, ForgeryClass::ExactCopy);
    }

    #[test]
    fn test_descriptor_similarity_caps_denominator() {
        let many = vec![vec![1.0, 2.0, 3.0]; 120];
        assert_eq!(descriptor_similarity(&many, &many), 1.0);

        // 60 descriptors against 3: denominator is 3, result clamps to 1
        let few = vec![vec![1.0, 2.0, 3.0]; 3];
        assert_eq!(descriptor_similarity(&many[..60], &few), 1.0);
    }

    #[test]
    fn test_identical_sets_are_exact_copy() {
        let set = feature_set(vec![vec![3.0, 4.0]; 5]);
        let assessment = compare_forgery_risk(&set, &set);
        assert!((assessment.risk_score - 1.0).abs() < 1e-9);
        assert_eq!(assessment.classification, ForgeryClass::ExactCopy);
        assert_eq!(assessment.rationale, ForgeryClass::ExactCopy.rationale());
        assert_eq!(assessment.signals.blur_delta, 0.0);
    }

    #[test]
    fn test_unrelated_sets_score_low() {
        let original = feature_set(vec![vec![0.0; 10]; 5]);
        let suspect = FeatureSet {
            descriptors: vec![vec![900.0; 10]; 5],
            histogram: vec![0.0, 0.0, 1.0],
            edge_histogram: vec![1.0, 0.0],
            color_moments: vec![ColorMoment { r: 1.0, g: 0.0, b: 0.0 }; 9],
            sharpness: 140.0,
            blur: 1.0,
            ..feature_set(Vec::new())
        };
        let assessment = compare_forgery_risk(&original, &suspect);
        assert!(assessment.risk_score < 0.6, "{}", assessment.risk_score);
        assert_eq!(assessment.classification, ForgeryClass::Original);
    }
}
