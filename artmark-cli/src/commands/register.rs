//! Register command implementation.

use std::path::Path;

use anyhow::{bail, Context, Result};
use artmark_core::{
    content_digest, find_exact_duplicate, FingerprintCorpus, FingerprintRecord, PerceptualHasher,
    SimilarityMatcher,
};
use colored::Colorize;
use tracing::{info, warn};

use super::Output;
use crate::config::Config;
use crate::corpus::JsonFileCorpus;
use crate::utils::{print_json, read_file};

/// What to register.
pub struct Registration {
    pub id: String,
    pub owner: String,
    pub title: Option<String>,
    /// Skip the duplicate checks
    pub force: bool,
}

/// Execute the register command.
pub fn execute(
    file: &Path,
    corpus_path: &Path,
    request: Registration,
    config: &Config,
    output: Output,
) -> Result<()> {
    let content = read_file(file)?;
    let mut corpus = JsonFileCorpus::open_or_create(corpus_path, config.hash_algorithm)?;

    let hash = PerceptualHasher::new(corpus.algorithm())
        .hash_bytes(&content)
        .with_context(|| format!("Failed to fingerprint {}", file.display()))?;
    let digest = content_digest(&content);

    if request.force {
        warn!("Skipping duplicate checks");
    } else {
        if let Some(existing) = find_exact_duplicate(&digest, corpus.records_slice()) {
            bail!(
                "Duplicate artwork: identical upload already registered as {}",
                existing.id
            );
        }
        let similar = SimilarityMatcher::new(config.match_policy)
            .query_corpus(&hash, &corpus)
            .context("Failed to query corpus")?;
        if let Some(found) = similar {
            bail!(
                "Duplicate artwork: matches {} by {} (distance {})",
                found.record.id,
                found.record.owner_id,
                found.distance
            );
        }
    }

    let mut record = FingerprintRecord::new(request.id, request.owner)
        .with_perceptual_hash(&hash)
        .with_content_digest(digest);
    if let Some(title) = request.title {
        record = record.with_title(title);
    }

    corpus.insert(record.clone())?;
    corpus.save()?;
    info!(record_id = %record.id, hash = %hash, "Registered artwork");

    if output.json() {
        return print_json(&record);
    }

    if output.text() {
        println!();
        println!("{}", "Artwork registered!".green().bold());
        println!();
        println!("   {} {}", "Record:".dimmed(), record.id);
        println!("   {} {}", "Owner:".dimmed(), record.owner_id);
        println!("   {} {}", "Perceptual hash:".dimmed(), hash.to_hex());
        println!("   {} {}", "Corpus:".dimmed(), corpus.path().display());
    }
    Ok(())
}
