use thiserror::Error;

/// Failures scoped to a single store or pipeline request. None of them leave
/// the store in a modified state.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("theme '{0}' not found")]
    ThemeNotFound(String),

    #[error("no theme selected")]
    NoThemeSelected,

    #[error("column '{column}' is missing from {context}")]
    MissingColumn { column: String, context: String },

    #[error("unknown indicator '{0}'")]
    UnknownIndicator(String),

    #[error("no {0} selected, please choose at least one")]
    EmptySelection(&'static str),

    #[error("select at least one numeric indicator")]
    NoNumericIndicator,

    #[error("{chart} needs at least {needed} numeric indicators, got {got}")]
    NotEnoughIndicators {
        chart: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("invalid {kind} '{value}'")]
    InvalidChoice { kind: &'static str, value: String },

    #[error("export failed: {0}")]
    Export(#[from] csv::Error),

    #[error("export failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = PortalError> = std::result::Result<T, E>;
