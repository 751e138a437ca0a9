//! Compare command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use artmark_core::{compare_forgery_risk, FeatureExtractor, ForgeryClass};
use colored::{ColoredString, Colorize};
use tracing::info;

use super::Output;
use crate::config::Config;
use crate::utils::{percent, print_json, read_file};

/// Execute the compare command.
pub fn execute(original: &Path, suspect: &Path, config: &Config, output: Output) -> Result<()> {
    let extractor = FeatureExtractor::new(config.feature_size);

    let original_features = extractor
        .extract_bytes(&read_file(original)?)
        .with_context(|| format!("Failed to extract features from {}", original.display()))?;
    let suspect_features = extractor
        .extract_bytes(&read_file(suspect)?)
        .with_context(|| format!("Failed to extract features from {}", suspect.display()))?;

    let assessment = compare_forgery_risk(&original_features, &suspect_features);
    info!(
        risk_score = assessment.risk_score,
        classification = %assessment.classification,
        "Compared images"
    );

    if output.json() {
        return print_json(&assessment);
    }

    if output.text() {
        let paint = |s: &str| -> ColoredString {
            match assessment.classification {
                ForgeryClass::Original => s.green(),
                ForgeryClass::DerivativeWork | ForgeryClass::HeavilyModified => s.yellow(),
                _ => s.red(),
            }
        };
        let signals = &assessment.signals;

        println!();
        println!("{}", paint("╔════════════════════════════════════════╗"));
        println!(
            "{}",
            paint(&format!("║{:^40}║", assessment.classification.label().to_uppercase())).bold()
        );
        println!("{}", paint("╚════════════════════════════════════════╝"));
        println!();
        println!("   {} {}", "Risk score:".dimmed(), percent(assessment.risk_score));
        println!("   {} {}", "Assessment:".dimmed(), assessment.rationale);
        println!();
        println!("   {} {}", "Descriptors:".dimmed(), percent(signals.descriptor_similarity));
        println!("   {} {}", "Histogram:".dimmed(), percent(signals.histogram_similarity));
        println!("   {} {}", "Edges:".dimmed(), percent(signals.edge_similarity));
        println!("   {} {}", "Colour:".dimmed(), percent(signals.color_moment_similarity));
        println!("   {} {:.3}", "Blur delta:".dimmed(), signals.blur_delta);
        println!("   {} {:.3}", "Sharpness delta:".dimmed(), signals.sharpness_delta);
    }
    Ok(())
}
