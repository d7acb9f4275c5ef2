use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Timed out after {timeout_ms}ms waiting for {selector}")]
    Timeout { selector: String, timeout_ms: u64 },

    #[error("Persistence error: {path}: {message}")]
    Persistence { path: String, message: String },

    #[error("Notifier error: {notifier}: {message}")]
    Notifier { notifier: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors that must stop the run rather than degrade a single row or code.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Config(_) | AppError::Validation(_))
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
