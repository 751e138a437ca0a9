use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtmarkError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Incomparable fingerprints: {0}")]
    IncomparableFingerprint(String),

    #[error("Degenerate image: {width}x{height}")]
    DegenerateInput { width: u32, height: u32 },

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Corpus error: {0}")]
    Corpus(String),
}

pub type Result<T> = std::result::Result<T, ArtmarkError>;
