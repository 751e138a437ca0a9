//! Example demonstrating fingerprinting tracing instrumentation.
//!
//! Run with: cargo run -p artmark-core --example fingerprint_tracing

use artmark_core::{
    compare_forgery_risk, extract_features, generate_perceptual_hash, PixelGrid,
};
use tracing_subscriber::{fmt, EnvFilter};

fn artwork(shift: u8) -> artmark_core::Result<PixelGrid> {
    PixelGrid::from_fn(256, 256, |x, y| {
        let dot = if x % 16 == 1 && y % 16 == 1 { 60 } else { 0 };
        [
            (40 + x * 110 / 255 + dot) as u8 + shift,
            (40 + y * 110 / 255 + dot) as u8 + shift,
            90 + shift,
            255,
        ]
    })
}

fn main() {
    // Initialize tracing subscriber with debug level
    fmt()
        .with_env_filter(EnvFilter::new("artmark_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== Fingerprint Tracing Demo ===\n");

    let (original, graded) = match (artwork(0), artwork(20)) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Failed to build images: {}", e);
            return;
        }
    };

    match generate_perceptual_hash(&original) {
        Ok(hash) => println!("\nPerceptual hash: {}\n", hash),
        Err(e) => {
            eprintln!("Failed to hash: {}", e);
            return;
        }
    }

    let risk = compare_forgery_risk(&extract_features(&original), &extract_features(&graded));
    println!("\nRisk:   {:.3}", risk.risk_score);
    println!("Class:  {}", risk.classification);
    println!("Reason: {}", risk.rationale);
}
