//! Subcommand implementations.

pub mod compare;
pub mod features;
pub mod hash;
pub mod register;
pub mod verify;

use crate::OutputFormat;

/// How a command should report its result.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl Output {
    pub fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Decorated text output is wanted.
    pub fn text(&self) -> bool {
        !self.json() && !self.quiet
    }
}
