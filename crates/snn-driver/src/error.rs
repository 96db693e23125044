//! Error types for protocol and reference-model operations

use crate::protocol::Phase;
use thiserror::Error;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, SnnError>;

/// Errors that can occur while driving the chip or evaluating the model
#[derive(Debug, Error)]
pub enum SnnError {
    /// Vector widths disagree with each other or with the configured width
    #[error("Invalid width: expected {expected} bits, got {actual}")]
    InvalidWidth {
        /// Width required
        expected: usize,
        /// Width supplied
        actual: usize,
    },

    /// A parameter is out of range
    #[error("Invalid parameter: {reason}")]
    InvalidParameter {
        /// Reason for failure
        reason: String,
    },

    /// Device did not respond within the cycle budget
    #[error("Protocol timeout in {phase} at cycle {cycle}: no response within {budget} cycles")]
    ProtocolTimeout {
        /// Phase that timed out
        phase: Phase,
        /// Global cycle index of detection
        cycle: u64,
        /// Cycles allowed
        budget: u32,
    },

    /// Fewer output samples captured than execute cycles requested
    #[error("Short capture in {phase} at cycle {cycle}: expected {expected} samples, got {actual}")]
    ShortCapture {
        /// Phase that captured
        phase: Phase,
        /// Global cycle index of detection
        cycle: u64,
        /// Samples requested
        expected: usize,
        /// Samples captured
        actual: usize,
    },

    /// A frame sequence breaks the bus timing contract
    #[error("Protocol violation in {phase} at cycle {cycle}: {reason}")]
    ProtocolViolation {
        /// Phase being driven
        phase: Phase,
        /// Global cycle index of detection
        cycle: u64,
        /// What was violated
        reason: String,
    },

    /// Captured output disagrees with the reference model
    #[error("Output mismatch at execute cycle {cycle}, neuron {neuron}: expected spike={expected}, got spike={actual}")]
    OutputMismatch {
        /// Execute cycle index
        cycle: usize,
        /// Neuron index
        neuron: usize,
        /// Reference model spike
        expected: bool,
        /// Captured spike
        actual: bool,
    },

    /// Scenario configuration could not be loaded
    #[error("Configuration error: {reason}")]
    Config {
        /// Reason for failure
        reason: String,
    },

    /// Mask generation or parsing failed
    #[error("Mask error: {source}")]
    Mask {
        /// Underlying mask error
        #[from]
        source: snn_masks::MaskError,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl SnnError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
        }
    }

    /// Create a protocol violation error
    pub fn violation(phase: Phase, cycle: u64, reason: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            phase,
            cycle,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Check two widths agree
    ///
    /// # Errors
    ///
    /// Returns `InvalidWidth` when they differ.
    pub fn check_width(expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::InvalidWidth { expected, actual })
        }
    }
}

impl From<toml::de::Error> for SnnError {
    fn from(e: toml::de::Error) -> Self {
        Self::config(e.to_string())
    }
}
