//! Verify command implementation.

use std::path::Path;

use anyhow::{bail, Context, Result};
use artmark_core::{
    content_digest, find_exact_duplicate, FingerprintCorpus, MatchResult, MatchTier,
    PerceptualHasher, SimilarityMatcher,
};
use colored::Colorize;
use serde::Serialize;
use tracing::{error, info};

use super::Output;
use crate::config::Config;
use crate::corpus::JsonFileCorpus;
use crate::utils::{format_timestamp, percent, print_json, read_file};

#[derive(Serialize)]
struct VerifyReport<'a> {
    file: String,
    perceptual_hash: String,
    /// Byte-identical to the matched record's upload
    exact: bool,
    #[serde(rename = "match")]
    found: Option<&'a MatchResult>,
}

/// Execute the verify command.
pub fn execute(file: &Path, corpus_path: &Path, config: &Config, output: Output) -> Result<()> {
    let content = read_file(file)?;
    let corpus = JsonFileCorpus::open(corpus_path)?;

    let hash = PerceptualHasher::new(corpus.algorithm())
        .hash_bytes(&content)
        .with_context(|| format!("Failed to fingerprint {}", file.display()))?;

    let found = SimilarityMatcher::new(config.match_policy)
        .query_corpus(&hash, &corpus)
        .context("Failed to query corpus")?;

    let digest = content_digest(&content);
    let exact = found.as_ref().is_some_and(|m| {
        find_exact_duplicate(&digest, std::slice::from_ref(&m.record)).is_some()
    });

    if output.json() {
        print_json(&VerifyReport {
            file: file.display().to_string(),
            perceptual_hash: hash.to_hex(),
            exact,
            found: found.as_ref(),
        })?;
    }

    let Some(found) = found else {
        error!(hash = %hash, "No matching record");
        if output.text() {
            println!();
            println!("{}", "╔════════════════════════════════════════╗".yellow());
            println!(
                "{}",
                "║              NO MATCH                  ║".yellow().bold()
            );
            println!("{}", "╚════════════════════════════════════════╝".yellow());
            println!();
            println!(
                "   No provenance record found. This artwork may be altered or unverified."
            );
            println!("   {} {}", "Perceptual hash:".dimmed(), hash.to_hex());
        }
        bail!("Verification failed: no record matches {}", file.display());
    };

    info!(
        record_id = %found.record.id,
        distance = found.distance,
        confidence = found.confidence,
        "Verification successful"
    );

    if output.text() {
        println!();
        println!("{}", "╔════════════════════════════════════════╗".green());
        println!(
            "{}",
            "║              VERIFIED                  ║".green().bold()
        );
        println!("{}", "╚════════════════════════════════════════╝".green());
        println!();
        println!(
            "   This artwork matches a verified record by {} with {} confidence.",
            found.record.owner_id,
            percent(found.confidence)
        );
        println!();
        println!("   {} {}", "Record:".dimmed(), found.record.id);
        if let Some(title) = &found.record.title {
            println!("   {} {}", "Title:".dimmed(), title);
        }
        let tier = match found.tier {
            MatchTier::Strict => "strict",
            MatchTier::Moderate => "moderate",
        };
        println!(
            "   {} {} ({} match)",
            "Distance:".dimmed(),
            found.distance,
            tier
        );
        if exact {
            println!("   {} {}", "Content:".dimmed(), "Identical to registered upload".green());
        }
        println!(
            "   {} {}",
            "Registered:".dimmed(),
            format_timestamp(&found.record.created_at)
        );
    }
    Ok(())
}
