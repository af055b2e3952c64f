//! Fatal run errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that abort a run before or while streaming the input.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid expression \"{expression}\"")]
    InvalidExpression { expression: String },

    #[error("Expression \"{expression}\" likely invalid. See tool tips, syntax and examples.")]
    ExpressionSyntax { expression: String, reason: String },

    #[error("Cannot open input file {}", path.display())]
    OpenInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create output file {}", path.display())]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read input file {}", path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write output file {}", path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for run operations.
pub type RunResult<T> = Result<T, Error>;
