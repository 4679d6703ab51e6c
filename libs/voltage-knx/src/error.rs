//! KNX Stack Error Types
//!
//! Core error types for the TP-UART stack. Frame validity is not an error
//! (see [`crate::telegram::TelegramValidity`]); reception failures and send
//! outcomes are reported as events.

use thiserror::Error;

/// Result type for voltage-knx operations
pub type Result<T> = std::result::Result<T, KnxError>;

/// KNX stack errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KnxError {
    /// The transceiver did not answer the reset request
    #[error("TP-UART reset failed after {attempts} attempts")]
    ResetFailed { attempts: u32 },

    /// Operation only allowed while the transceiver is in its init state
    #[error("TP-UART not in init state")]
    NotInitState,

    /// Transmission refused, TX is not idle
    #[error("TP-UART transmitter busy or not initialized")]
    TxNotAvailable,

    /// Device not started or stopped
    #[error("Device not started")]
    NotStarted,

    /// Unknown communication object index
    #[error("Communication object not found: {0}")]
    ObjectNotFound(usize),

    /// Value width does not match the object's data length
    #[error("Length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Value cannot be represented by the datapoint encoding
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// Datapoint payload could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Datapoint type not handled by this stack
    #[error("Unsupported datapoint type: {0}")]
    UnsupportedDpt(String),

    /// Malformed group or individual address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serial link errors
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for KnxError {
    fn from(err: std::io::Error) -> Self {
        KnxError::Io(err.to_string())
    }
}

impl From<figment::Error> for KnxError {
    fn from(err: figment::Error) -> Self {
        KnxError::Config(err.to_string())
    }
}

#[cfg(feature = "serial")]
impl From<tokio_serial::Error> for KnxError {
    fn from(err: tokio_serial::Error) -> Self {
        KnxError::Io(err.to_string())
    }
}

// Helper methods for creating errors
impl KnxError {
    pub fn out_of_range(msg: impl Into<String>) -> Self {
        KnxError::OutOfRange(msg.into())
    }

    pub fn invalid_data(msg: impl Into<String>) -> Self {
        KnxError::InvalidData(msg.into())
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        KnxError::InvalidAddress(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        KnxError::Config(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        KnxError::Io(msg.into())
    }

    /// Check if the error is fatal to device bring-up
    pub fn is_fatal(&self) -> bool {
        matches!(self, KnxError::ResetFailed { .. } | KnxError::Io(_))
    }
}
