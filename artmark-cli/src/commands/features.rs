//! Features command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use artmark_core::FeatureExtractor;
use colored::Colorize;

use super::Output;
use crate::config::Config;
use crate::utils::{print_json, read_file};

/// Execute the features command.
pub fn execute(file: &Path, config: &Config, output: Output) -> Result<()> {
    let content = read_file(file)?;

    let features = FeatureExtractor::new(config.feature_size)
        .extract_bytes(&content)
        .with_context(|| format!("Failed to extract features from {}", file.display()))?;

    if output.json() {
        return print_json(&features);
    }

    if output.text() {
        let side = config.feature_size;
        println!();
        println!("   {} {}x{}", "Sampled at:".dimmed(), side, side);
        println!("   {} {}", "Keypoints:".dimmed(), features.keypoints.len());
        println!("   {} {}", "Feature hash:".dimmed(), features.feature_hash_hex());
        println!("   {} {:.3}", "Sharpness:".dimmed(), features.sharpness);
        println!("   {} {:.3}", "Blur:".dimmed(), features.blur);
    }
    Ok(())
}
