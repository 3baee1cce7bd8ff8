//! Domain error types.

/// Top-level error type for laddersim.
#[derive(Debug, thiserror::Error)]
pub enum LadderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("missing column '{column}' in {file}")]
    MissingColumn { file: String, column: String },

    #[error("{file} has {found} columns, expected at least {expected}")]
    ColumnCount {
        file: String,
        found: usize,
        expected: usize,
    },

    #[error("entry price must be positive and finite, got {price}")]
    InvalidPrice { price: f64 },

    #[error("liquidation price undefined at ladder step {step}: {reason}")]
    DegenerateLiquidation { step: usize, reason: String },

    #[error("no price samples for month {month}")]
    EmptyMonth { month: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("output file already exists: {path}")]
    FileExists { path: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LadderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        LadderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&LadderError> for std::process::ExitCode {
    fn from(err: &LadderError) -> Self {
        let code: u8 = match err {
            LadderError::Io(_) | LadderError::FileExists { .. } => 1,
            LadderError::ConfigParse { .. }
            | LadderError::ConfigMissing { .. }
            | LadderError::ConfigInvalid { .. }
            | LadderError::InvalidPrice { .. }
            | LadderError::DegenerateLiquidation { .. } => 2,
            LadderError::MissingColumn { .. }
            | LadderError::ColumnCount { .. }
            | LadderError::Data { .. }
            | LadderError::Csv(_) => 3,
            LadderError::EmptyMonth { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
