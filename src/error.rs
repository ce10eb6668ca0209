//! Error types for EepStore
//!
//! Provides a unified error type for all store operations, split into
//! recoverable outcomes (reported to the caller, store stays usable) and
//! unrecoverable ones (store halts, see [`StoreError::is_recoverable`]).

use thiserror::Error;

use crate::table::RecordName;
use crate::transport::TransportError;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for EepStore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Transport timed out at address {address:#06x}")]
    TransportTimeout { address: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal access fell outside the device; halts the store
    #[error("Access of {len} bytes at {address} is outside the device")]
    OutOfBounds { address: u32, len: usize },

    // -------------------------------------------------------------------------
    // Directory Errors
    // -------------------------------------------------------------------------
    #[error("Directory full: at most {max} records")]
    TooManyRecords { max: usize },

    #[error("No free gap of {requested} bytes on the device")]
    OutOfSpace { requested: u32 },

    #[error("Header for record {0} not found on the device")]
    HeaderNotFound(RecordName),

    #[error("Corrupt directory: {0}")]
    CorruptDirectory(String),

    /// A directory slot failed to encode or decode; halts the store
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Unknown record: {0}")]
    UnknownRecord(RecordName),

    #[error("Record {0} has no live buffer bound")]
    NotBound(RecordName),

    #[error("A resumable write to address {active} is still in progress")]
    WriteInProgress { active: u32 },

    #[error("Invalid record name: {0:?}")]
    InvalidName(String),

    #[error("Record of {size} bytes does not fit the device")]
    RecordTooLarge { size: usize },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Halt Latch
    // -------------------------------------------------------------------------
    #[error("Store halted after an unrecoverable error")]
    Halted,
}

impl StoreError {
    /// Whether the store may keep serving requests after this error.
    ///
    /// Everything else leaves the directory or the device in an unknown
    /// state, and the store refuses further work once it has seen one.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::UnknownRecord(_)
                | StoreError::NotBound(_)
                | StoreError::WriteInProgress { .. }
                | StoreError::InvalidName(_)
                | StoreError::RecordTooLarge { .. }
        )
    }
}

impl From<TransportError> for StoreError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { address } => StoreError::TransportTimeout { address },
            other => StoreError::Transport(other.to_string()),
        }
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
