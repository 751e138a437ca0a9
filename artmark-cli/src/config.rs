//! CLI configuration
//!
//! Handles loading configuration from environment variables with sensible defaults.
//! Command-line flags take precedence over anything set here.

use std::path::PathBuf;

use artmark_core::fingerprint::FEATURE_SAMPLE_SIZE;
use artmark_core::{HashAlgorithm, MatchPolicy};

/// Default corpus file, relative to the working directory.
pub const DEFAULT_CORPUS_PATH: &str = "artmark-corpus.json";

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Corpus file (default: artmark-corpus.json)
    pub corpus_path: PathBuf,
    /// Hash algorithm for new corpora and `hash` (default: dct32)
    pub hash_algorithm: HashAlgorithm,
    /// Side of the square images are resampled to for features (default: 512)
    pub feature_size: u32,
    /// Matcher thresholds (default: 10 / 15 / 0.7)
    pub match_policy: MatchPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from(DEFAULT_CORPUS_PATH),
            hash_algorithm: HashAlgorithm::default(),
            feature_size: FEATURE_SAMPLE_SIZE,
            match_policy: MatchPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    ///
    /// Missing or unparseable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let corpus_path = lookup("ARTMARK_CORPUS")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.corpus_path);

        let hash_algorithm = lookup("ARTMARK_HASH_ALGORITHM")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.hash_algorithm);

        let feature_size = lookup("ARTMARK_FEATURE_SIZE")
            .and_then(|v| v.parse().ok())
            .filter(|&size: &u32| size > 0)
            .unwrap_or(defaults.feature_size);

        let strict_threshold = lookup("ARTMARK_STRICT_THRESHOLD")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.match_policy.strict_threshold);

        let moderate_threshold = lookup("ARTMARK_MODERATE_THRESHOLD")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.match_policy.moderate_threshold);

        let min_moderate_confidence = lookup("ARTMARK_MIN_CONFIDENCE")
            .and_then(|v| v.parse().ok())
            .filter(|c: &f64| (0.0..=1.0).contains(c))
            .unwrap_or(defaults.match_policy.min_moderate_confidence);

        Self {
            corpus_path,
            hash_algorithm,
            feature_size,
            match_policy: MatchPolicy {
                strict_threshold,
                moderate_threshold,
                min_moderate_confidence,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.corpus_path, PathBuf::from("artmark-corpus.json"));
        assert_eq!(config.hash_algorithm, HashAlgorithm::Dct32);
        assert_eq!(config.feature_size, 512);
        assert_eq!(config.match_policy, MatchPolicy::default());
    }

    #[test]
    fn test_reads_values() {
        let config = Config::from_lookup(lookup(&[
            ("ARTMARK_CORPUS", "/tmp/corpus.json"),
            ("ARTMARK_HASH_ALGORITHM", "average8"),
            ("ARTMARK_FEATURE_SIZE", "256"),
            ("ARTMARK_STRICT_THRESHOLD", "8"),
            ("ARTMARK_MODERATE_THRESHOLD", "12"),
            ("ARTMARK_MIN_CONFIDENCE", "0.75"),
        ]));
        assert_eq!(config.corpus_path, PathBuf::from("/tmp/corpus.json"));
        assert_eq!(config.hash_algorithm, HashAlgorithm::Average8);
        assert_eq!(config.feature_size, 256);
        assert_eq!(config.match_policy.strict_threshold, 8);
        assert_eq!(config.match_policy.moderate_threshold, 12);
        assert_eq!(config.match_policy.min_moderate_confidence, 0.75);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("ARTMARK_CORPUS", "  "),
            ("ARTMARK_HASH_ALGORITHM", "md5"),
            ("ARTMARK_FEATURE_SIZE", "0"),
            ("ARTMARK_STRICT_THRESHOLD", "-3"),
            ("ARTMARK_MIN_CONFIDENCE", "1.5"),
        ]));
        assert_eq!(config.corpus_path, PathBuf::from(DEFAULT_CORPUS_PATH));
        assert_eq!(config.hash_algorithm, HashAlgorithm::Dct32);
        assert_eq!(config.feature_size, FEATURE_SAMPLE_SIZE);
        assert_eq!(config.match_policy, MatchPolicy::default());
    }
}
