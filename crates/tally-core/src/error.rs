//! Error types for Tally

use thiserror::Error;

/// Failures that abort a single analysis request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The document could not be turned into text
    #[error("document text extraction failed: {0}")]
    DocumentText(String),

    /// The AI reply was empty or not a JSON object
    #[error("malformed AI response: {0}")]
    MalformedResponse(String),

    /// The AI reply parsed but income, expenses or summary is missing
    #[error("invalid analysis structure: {0}")]
    InvalidStructure(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Coarse error classes used at the API boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller-correctable (missing document or account label)
    Input,
    /// Operator-correctable (missing credential or endpoint)
    Configuration,
    /// Request-fatal extraction or normalization failure
    Extraction,
    /// The AI capability or the store reported a failure
    Upstream,
    /// Anything else
    Internal,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Input(_) => ErrorCategory::Input,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Extraction(_) => ErrorCategory::Extraction,
            Self::Upstream(_) | Self::Database(_) | Self::Pool(_) | Self::Http(_) => {
                ErrorCategory::Upstream
            }
            Self::Encryption(_) | Self::Io(_) | Self::Json(_) | Self::InvalidData(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Shorthand for a malformed AI response
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Extraction(ExtractionError::MalformedResponse(msg.into()))
    }

    /// Shorthand for an incomplete normalized structure
    pub fn invalid_structure(msg: impl Into<String>) -> Self {
        Self::Extraction(ExtractionError::InvalidStructure(msg.into()))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            Error::Input("no file".into()).category(),
            ErrorCategory::Input
        );
        assert_eq!(
            Error::Configuration("no key".into()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(Error::malformed("x").category(), ErrorCategory::Extraction);
        assert_eq!(
            Error::Upstream("503".into()).category(),
            ErrorCategory::Upstream
        );
        assert_eq!(
            Error::Database(rusqlite::Error::InvalidQuery).category(),
            ErrorCategory::Upstream
        );
        assert_eq!(
            Error::InvalidData("bad".into()).category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_extraction_display() {
        let err = Error::invalid_structure("missing summary");
        assert_eq!(
            err.to_string(),
            "Extraction error: invalid analysis structure: missing summary"
        );
    }
}
