//! Error types for SPN conversion

use thiserror::Error;

/// Errors that can occur while loading definitions or reassembling data
#[derive(Debug, Error)]
pub enum ConvError {
    /// SPN not found in store
    #[error("unknown SPN: {0}")]
    UnknownSpn(u32),

    /// PGN not found in store
    #[error("unknown PGN: {0}")]
    UnknownPgn(u32),

    /// Invalid SPN string format
    #[error("invalid SPN format: {0}")]
    InvalidSpnFormat(String),

    /// Definition is internally inconsistent
    #[error("invalid definition for SPN {spn}: {reason}")]
    InvalidDefinition { spn: u32, reason: String },

    /// Transport data frame cannot belong to the message being assembled
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// YAML parsing error
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for conversion operations
pub type ConvResult<T> = Result<T, ConvError>;

/// Parse an SPN identifier
///
/// Accepts formats: "190", "SPN 190", "spn190"
pub fn parse_spn(s: &str) -> ConvResult<u32> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("SPN")
        .or_else(|| trimmed.strip_prefix("spn"))
        .unwrap_or(trimmed)
        .trim();
    match digits.parse::<u32>() {
        // SPNs are 19 bits
        Ok(spn) if spn < (1 << 19) => Ok(spn),
        _ => Err(ConvError::InvalidSpnFormat(s.to_string())),
    }
}
