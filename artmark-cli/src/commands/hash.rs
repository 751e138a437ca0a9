//! Hash command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use artmark_core::{content_digest, HashAlgorithm, PerceptualHasher};
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

use super::Output;
use crate::utils::{print_json, read_file};

#[derive(Serialize)]
struct HashReport<'a> {
    file: String,
    algorithm: HashAlgorithm,
    version: &'a str,
    perceptual_hash: String,
    content_digest: String,
}

/// Execute the hash command.
pub fn execute(file: &Path, algorithm: HashAlgorithm, output: Output) -> Result<()> {
    let content = read_file(file)?;

    let hash = PerceptualHasher::new(algorithm)
        .hash_bytes(&content)
        .with_context(|| format!("Failed to fingerprint {}", file.display()))?;
    let digest = content_digest(&content);
    debug!(hash = %hash, digest = %digest, "Hashed file");

    if output.json() {
        return print_json(&HashReport {
            file: file.display().to_string(),
            algorithm,
            version: algorithm.version_tag(),
            perceptual_hash: hash.to_hex(),
            content_digest: digest,
        });
    }

    if output.text() {
        println!();
        println!("   {} {}", "Perceptual hash:".dimmed(), hash.to_hex().bold());
        println!("   {} {}", "Algorithm:".dimmed(), algorithm.version_tag());
        println!("   {} {}", "Content digest:".dimmed(), digest);
    }
    Ok(())
}
