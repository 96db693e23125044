//! Error types for connectivity mask operations

use thiserror::Error;

/// Result type alias for mask operations
pub type Result<T> = std::result::Result<T, MaskError>;

/// Errors that can occur while generating, parsing, or storing masks
#[derive(Debug, Error)]
pub enum MaskError {
    /// Flat sample sequence does not split evenly into rows
    #[error("Shape mismatch: {total} samples do not partition into {groups} equal rows")]
    ShapeMismatch {
        /// Number of samples drawn
        total: usize,
        /// Requested number of rows
        groups: usize,
    },

    /// Layer parameters out of range
    #[error("Invalid layer: {reason}")]
    InvalidLayer {
        /// Reason for failure
        reason: String,
    },

    /// Mask text is malformed
    #[error("Mask parse error at line {line}: {reason}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// Reason for failure
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl MaskError {
    /// Create an invalid layer error
    pub fn invalid_layer(reason: impl Into<String>) -> Self {
        Self::InvalidLayer {
            reason: reason.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }
}
