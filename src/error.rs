//! Error handling for the hostscope scanner
//!
//! Only configuration, I/O and output problems surface as errors. Probe-level
//! failures (refused, reset, timed out) are ordinary [`ProbeOutcome`] values and
//! collaborator failures degrade to partial records, so neither ever reaches
//! this type on the scanning path.
//!
//! [`ProbeOutcome`]: crate::network::ProbeOutcome

use thiserror::Error;

/// Main error type for scanning operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Port range error: {0}")]
    PortRangeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("Collaborator failure: {0}")]
    CollaboratorError(String),
}

impl ScanError {
    /// Configuration-class errors abort before any network activity begins.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScanError::InvalidTarget(_) | ScanError::PortRangeError(_) | ScanError::ConfigError(_)
        )
    }

    /// Collaborator and network errors are recovered by degrading the record.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ScanError::NetworkError(_) | ScanError::CollaboratorError(_))
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::OutputError(err.to_string())
    }
}

impl From<csv::Error> for ScanError {
    fn from(err: csv::Error) -> Self {
        ScanError::OutputError(err.to_string())
    }
}

impl From<toml::de::Error> for ScanError {
    fn from(err: toml::de::Error) -> Self {
        ScanError::ConfigError(format!("Failed to parse TOML: {}", err))
    }
}
