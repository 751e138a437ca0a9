//! Artmark CLI - artwork fingerprinting and forgery checks.

use std::path::PathBuf;

use anyhow::Result;
use artmark_core::HashAlgorithm;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;
mod corpus;
mod exit_codes;
mod utils;

use config::Config;
use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  65  Data error (invalid image, duplicate artwork, no matching record)
  66  Input file or corpus cannot be read
  74  Corpus file cannot be written";

#[derive(Parser)]
#[command(name = "artmark")]
#[command(author, version, about = "Artwork fingerprinting and forgery detection", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Suppress decorated output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the perceptual hash and content digest of an image
    Hash {
        /// Path to the image
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Hash algorithm (dct32 or average8)
        #[arg(short, long)]
        algorithm: Option<HashAlgorithm>,
    },

    /// Extract forgery-detection features from an image
    Features {
        /// Path to the image
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Score how likely SUSPECT is a copy of ORIGINAL
    Compare {
        /// Path to the original artwork
        #[arg(value_name = "ORIGINAL")]
        original: PathBuf,

        /// Path to the suspected copy
        #[arg(value_name = "SUSPECT")]
        suspect: PathBuf,
    },

    /// Look an image up in the corpus
    Verify {
        /// Path to the image
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Corpus file (defaults to $ARTMARK_CORPUS or artmark-corpus.json)
        #[arg(long, value_name = "CORPUS")]
        corpus: Option<PathBuf>,
    },

    /// Register an image in the corpus
    Register {
        /// Path to the image
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Unique artwork id
        #[arg(long)]
        id: String,

        /// Owner (artist) reference
        #[arg(long)]
        owner: String,

        /// Artwork title
        #[arg(long)]
        title: Option<String>,

        /// Corpus file (defaults to $ARTMARK_CORPUS or artmark-corpus.json)
        #[arg(long, value_name = "CORPUS")]
        corpus: Option<PathBuf>,

        /// Register even if the image duplicates an existing record
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("artmark_core=debug,artmark=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env();
    let output = commands::Output {
        format: cli.format,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Hash { file, algorithm } => {
            commands::hash::execute(&file, algorithm.unwrap_or(config.hash_algorithm), output)
        }
        Commands::Features { file } => commands::features::execute(&file, &config, output),
        Commands::Compare { original, suspect } => {
            commands::compare::execute(&original, &suspect, &config, output)
        }
        Commands::Verify { file, corpus } => {
            let corpus = corpus.unwrap_or_else(|| config.corpus_path.clone());
            commands::verify::execute(&file, &corpus, &config, output)
        }
        Commands::Register {
            file,
            id,
            owner,
            title,
            corpus,
            force,
        } => {
            let request = commands::register::Registration {
                id,
                owner,
                title,
                force,
            };
            let corpus = corpus.unwrap_or_else(|| config.corpus_path.clone());
            commands::register::execute(&file, &corpus, request, &config, output)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit = match run(cli) {
        Ok(()) => ExitCode::success(),
        Err(e) => ExitCode::from_anyhow(&e),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
