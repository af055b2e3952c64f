//! Run configuration built from the command line metadata.

use std::path::PathBuf;

use thiserror::Error;

const METADATA_HINT: &str = "regenerate the dataset metadata (auto-detect) to correct it.  \
                             This tool can only be used with tab-delimited data.";

/// Configuration errors, detected before any file is opened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing or invalid 'columns' metadata value ({raw:?}), {}", METADATA_HINT)]
    InvalidColumnCount { raw: String },

    #[error("Missing or invalid 'column_types' metadata value, {}", METADATA_HINT)]
    MissingColumnTypes,

    #[error(
        "The 'columns' metadata setting ({column_count}) does not conform to the 'column_types' \
         metadata setting ({type_count} types), {}",
        METADATA_HINT
    )]
    SchemaMismatch {
        column_count: usize,
        type_count: usize,
    },

    #[error("Unsupported type '{name}' for column c{column} in the 'column_types' metadata setting, {}", METADATA_HINT)]
    UnknownColumnType { column: usize, name: String },
}

/// Everything a run needs, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Raw expression text, placeholders not yet unescaped
    pub expression: String,
    pub round_result: bool,
    pub column_count: usize,
    pub column_types: Vec<String>,
    pub avoid_scientific_notation: bool,
}

impl RunConfig {
    /// Validate the column metadata and assemble a run configuration.
    ///
    /// The column count must be an integer of at least 2 and the column type
    /// list must be present; whether the two agree is checked when the
    /// binding is built.
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        expression: impl Into<String>,
        round_result: bool,
        columns: &str,
        column_types: &str,
        avoid_scientific_notation: bool,
    ) -> Result<Self, ConfigError> {
        let column_count = parse_column_count(columns)?;
        let column_types = parse_column_types(column_types)?;

        Ok(Self {
            input: input.into(),
            output: output.into(),
            expression: expression.into(),
            round_result,
            column_count,
            column_types,
            avoid_scientific_notation,
        })
    }
}

/// Tabular data has at least two columns
pub fn parse_column_count(raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(count) if count >= 2 => Ok(count),
        _ => Err(ConfigError::InvalidColumnCount {
            raw: raw.to_string(),
        }),
    }
}

/// Split the comma-separated type list; entries are trimmed
pub fn parse_column_types(raw: &str) -> Result<Vec<String>, ConfigError> {
    if raw.trim().is_empty() {
        return Err(ConfigError::MissingColumnTypes);
    }
    Ok(raw.split(',').map(|name| name.trim().to_string()).collect())
}
