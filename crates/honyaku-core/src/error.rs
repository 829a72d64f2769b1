use thiserror::Error;

#[derive(Debug, Error)]
pub enum HonyakuError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl HonyakuError {
    /// Short error code string used in startup diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            HonyakuError::Config(_) => "CONFIG_ERROR",
            HonyakuError::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
        }
    }
}

pub type Result<T> = std::result::Result<T, HonyakuError>;
