//! Error types for PLC frame handling.

use thiserror::Error;

/// Errors raised while validating, decoding or building PLC frames.
///
/// Every variant means the frame is rejected as a whole; nothing derived from
/// it is applied to the status snapshot or command buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Frame is shorter than its type requires.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    /// Frame does not start with `@` or end with `*`.
    #[error("frame is not delimited by '@' ... '*'")]
    Delimiter,

    /// Frame does not echo the header of the request it answers.
    #[error("header mismatch: expected {expected:?}, got {actual:?}")]
    HeaderMismatch { expected: String, actual: String },

    /// Stored FCS does not match the XOR of the frame content.
    #[error("checksum mismatch: stored {stored:02X}, computed {computed:02X}")]
    Checksum { stored: u8, computed: u8 },

    /// The FCS field itself is not two hex digits.
    #[error("checksum field is not hex")]
    ChecksumField,

    /// The controller answered with a non-zero end code.
    #[error("controller end code {0:02X}")]
    EndCode(u8),

    /// A byte in a numeric or flag field is not a valid digit.
    #[error("invalid digit {byte:#04x} at offset {offset}")]
    InvalidDigit { offset: usize, byte: u8 },

    /// A decoded or requested value lies outside the field's legal range.
    #[error("{field} value {value} outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Check `value` against an inclusive range for the named field.
pub(crate) fn check_range(
    field: &'static str,
    value: i64,
    min: i64,
    max: i64,
) -> ProtocolResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ProtocolError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
