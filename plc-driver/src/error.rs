//! Error types for the PLC driver.

use plc_protocol::ProtocolError;
use thiserror::Error;

/// Failures of the byte transport underneath the line discipline.
#[derive(Error, Debug)]
pub enum TransportError {
    /// No transport is attached to the line discipline.
    #[error("no transport bound")]
    NotBound,

    /// A transport is already attached; unbind it first.
    #[error("a transport is already bound")]
    AlreadyBound,

    /// Low-level I/O failure while writing.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure opening or configuring the serial port.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Errors surfaced to users of [`PlcHandle`](crate::PlcHandle) and the CLI.
#[derive(Error, Debug)]
pub enum PlcError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A frame or a requested value was rejected.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration values are inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The session has been closed and no longer accepts requests.
    #[error("PLC session closed")]
    SessionClosed,
}

/// Result type for driver operations.
pub type PlcResult<T> = Result<T, PlcError>;
