//! Frame shapes, fixed headers and inbound validation.
//!
//! The controller speaks a host-link style protocol: every frame starts with
//! `@`, carries a unit number and a two-letter header code, and ends with a
//! two-digit FCS followed by `*` CR.
//!
//! ```text
//! status request   @00RD 0000 0017 FCS *\r                 17 bytes
//! status response  @00RD 00 <68 data chars> FCS *\r        79 bytes
//! command          @00WD 0100 <44 data chars> FCS *\r      57 bytes
//! command ack      @00WD 00 FCS *\r                        11 bytes
//! ```

use crate::checksum::{stored_and_computed, update_fcs};
use crate::digits::{read_hex, write_hex};
use crate::error::{ProtocolError, ProtocolResult};

/// Start delimiter.
pub const START: u8 = b'@';

/// End delimiter.
pub const END: u8 = b'*';

/// Terminator appended to every transmitted frame.
pub const TERMINATOR: [u8; 2] = [END, b'\r'];

/// Header of status requests and the prefix their responses must echo.
pub const STATUS_HEADER: &[u8; 5] = b"@00RD";

/// Header of command frames and the prefix their acknowledgements must echo.
pub const COMMAND_HEADER: &[u8; 5] = b"@00WD";

/// First data-memory word read by a status request.
pub const STATUS_WORD_ADDRESS: &[u8; 4] = b"0000";

/// Number of words read by a status request (17 words of 4 chars = 68 chars).
pub const STATUS_WORD_COUNT: &[u8; 4] = b"0017";

/// First data-memory word written by a command frame.
pub const COMMAND_WORD_ADDRESS: &[u8; 4] = b"0100";

/// Offset of the end-code field in responses.
pub const END_CODE_OFFSET: usize = 5;

/// Width of the end-code field.
pub const END_CODE_LEN: usize = 2;

/// Status request length including terminator.
pub const STATUS_REQUEST_LEN: usize = 17;

/// Status response length including terminator.
pub const STATUS_RESPONSE_LEN: usize = 79;

/// Command frame length including terminator.
pub const COMMAND_LEN: usize = 57;

/// Command acknowledgement length including terminator.
pub const COMMAND_ACK_LEN: usize = 11;

/// Inbound frame types and the request each one answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Answer to a status request.
    StatusResponse,
    /// Answer to a command frame.
    CommandAck,
}

impl FrameKind {
    /// Header the frame must echo.
    pub fn header(self) -> &'static [u8; 5] {
        match self {
            FrameKind::StatusResponse => STATUS_HEADER,
            FrameKind::CommandAck => COMMAND_HEADER,
        }
    }

    /// Minimum length as delivered by the assembler (terminator CR excluded).
    pub fn min_len(self) -> usize {
        match self {
            FrameKind::StatusResponse => STATUS_RESPONSE_LEN - 1,
            FrameKind::CommandAck => COMMAND_ACK_LEN - 1,
        }
    }
}

/// Build the fixed status request frame.
pub fn status_request() -> [u8; STATUS_REQUEST_LEN] {
    let mut frame = [b'0'; STATUS_REQUEST_LEN];
    frame[..5].copy_from_slice(STATUS_HEADER);
    frame[5..9].copy_from_slice(STATUS_WORD_ADDRESS);
    frame[9..13].copy_from_slice(STATUS_WORD_COUNT);
    frame[STATUS_REQUEST_LEN - 2..].copy_from_slice(&TERMINATOR);
    update_fcs(&mut frame);
    frame
}

/// Build the acknowledgement a controller sends for a command.
pub fn command_ack(end_code: u8) -> [u8; COMMAND_ACK_LEN] {
    let mut frame = [b'0'; COMMAND_ACK_LEN];
    frame[..5].copy_from_slice(COMMAND_HEADER);
    write_hex(
        &mut frame[END_CODE_OFFSET..END_CODE_OFFSET + END_CODE_LEN],
        end_code.into(),
    );
    frame[COMMAND_ACK_LEN - 2..].copy_from_slice(&TERMINATOR);
    update_fcs(&mut frame);
    frame
}

/// Validate an inbound frame of the given kind.
///
/// Checks, in order: minimum length, delimiters, echoed header, FCS and, on
/// the command-ack path, a zero end code. A frame that fails any check must
/// not be applied.
pub fn validate(frame: &[u8], kind: FrameKind) -> ProtocolResult<()> {
    let body = match frame.split_last() {
        Some((b'\r', rest)) => rest,
        _ => frame,
    };

    if body.len() < kind.min_len() {
        return Err(ProtocolError::TooShort {
            expected: kind.min_len(),
            actual: body.len(),
        });
    }

    if body[0] != START || body[body.len() - 1] != END {
        return Err(ProtocolError::Delimiter);
    }

    let header = kind.header();
    if !body.starts_with(header) {
        return Err(ProtocolError::HeaderMismatch {
            expected: String::from_utf8_lossy(header).into_owned(),
            actual: String::from_utf8_lossy(&body[..header.len()]).into_owned(),
        });
    }

    let (stored, computed) = stored_and_computed(body).ok_or(ProtocolError::ChecksumField)?;
    if stored != computed {
        return Err(ProtocolError::Checksum { stored, computed });
    }

    if kind == FrameKind::CommandAck {
        let end_code = read_hex(body, END_CODE_OFFSET, END_CODE_LEN)? as u8;
        if end_code != 0 {
            return Err(ProtocolError::EndCode(end_code));
        }
    }

    Ok(())
}

/// Outbound frame types, as seen from the controller side of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    StatusRequest,
    Command,
}

/// Classify and validate a frame sent by the host.
pub fn validate_request(frame: &[u8]) -> ProtocolResult<RequestKind> {
    let body = match frame.split_last() {
        Some((b'\r', rest)) => rest,
        _ => frame,
    };
    if body.len() < STATUS_HEADER.len() + TERMINATOR.len() - 1 {
        return Err(ProtocolError::TooShort {
            expected: STATUS_REQUEST_LEN - 1,
            actual: body.len(),
        });
    }
    if body.starts_with(COMMAND_HEADER) {
        validate_command(frame)?;
        return Ok(RequestKind::Command);
    }
    if !body.starts_with(STATUS_HEADER) {
        return Err(ProtocolError::HeaderMismatch {
            expected: String::from_utf8_lossy(STATUS_HEADER).into_owned(),
            actual: String::from_utf8_lossy(&body[..STATUS_HEADER.len()]).into_owned(),
        });
    }
    if body.len() != STATUS_REQUEST_LEN - 1 {
        return Err(ProtocolError::TooShort {
            expected: STATUS_REQUEST_LEN - 1,
            actual: body.len(),
        });
    }
    check_body(body)?;
    Ok(RequestKind::StatusRequest)
}

/// Validate a full command frame: length, delimiters, header, word address, FCS.
pub fn validate_command(frame: &[u8]) -> ProtocolResult<()> {
    let body = match frame.split_last() {
        Some((b'\r', rest)) => rest,
        _ => frame,
    };
    if body.len() < COMMAND_LEN - 1 {
        return Err(ProtocolError::TooShort {
            expected: COMMAND_LEN - 1,
            actual: body.len(),
        });
    }
    let mut header = COMMAND_HEADER.to_vec();
    header.extend_from_slice(COMMAND_WORD_ADDRESS);
    if !body.starts_with(&header) {
        return Err(ProtocolError::HeaderMismatch {
            expected: String::from_utf8_lossy(&header).into_owned(),
            actual: String::from_utf8_lossy(&body[..header.len()]).into_owned(),
        });
    }
    check_body(body)
}

fn check_body(body: &[u8]) -> ProtocolResult<()> {
    if body[0] != START || body[body.len() - 1] != END {
        return Err(ProtocolError::Delimiter);
    }
    let (stored, computed) = stored_and_computed(body).ok_or(ProtocolError::ChecksumField)?;
    if stored != computed {
        return Err(ProtocolError::Checksum { stored, computed });
    }
    Ok(())
}

/// Offset of the FCS in a full-length frame of `len` bytes (CR included).
#[cfg(test)]
pub(crate) const fn fcs_offset_for(len: usize) -> usize {
    len - TERMINATOR.len() - crate::checksum::FCS_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_request_layout() {
        let frame = status_request();
        assert_eq!(&frame[..13], b"@00RD00000017");
        assert_eq!(&frame[15..], b"*\r");
        assert!(crate::check_fcs(&frame));
    }

    #[test]
    fn test_ack_validates() {
        let ack = command_ack(0);
        assert_eq!(ack.len(), COMMAND_ACK_LEN);
        assert_eq!(validate(&ack, FrameKind::CommandAck), Ok(()));
        // As delivered by the assembler, without CR
        assert_eq!(validate(&ack[..ack.len() - 1], FrameKind::CommandAck), Ok(()));
    }

    #[test]
    fn test_ack_nonzero_end_code_rejected() {
        let ack = command_ack(0x13);
        assert_eq!(
            validate(&ack, FrameKind::CommandAck),
            Err(ProtocolError::EndCode(0x13))
        );
    }

    #[test]
    fn test_ack_is_not_a_status_response() {
        let ack = command_ack(0);
        assert!(matches!(
            validate(&ack, FrameKind::StatusResponse),
            Err(ProtocolError::TooShort { .. })
        ));
    }

    #[test]
    fn test_header_echo_checked() {
        let mut ack = command_ack(0);
        ack[3] = b'R';
        update_fcs(&mut ack);
        assert!(matches!(
            validate(&ack, FrameKind::CommandAck),
            Err(ProtocolError::HeaderMismatch { .. })
        ));
    }

    #[test]
    fn test_checksum_checked() {
        let mut ack = command_ack(0);
        ack[7] = if ack[7] == b'0' { b'1' } else { b'0' };
        assert!(matches!(
            validate(&ack, FrameKind::CommandAck),
            Err(ProtocolError::Checksum { .. })
        ));
    }

    #[test]
    fn test_request_classification() {
        assert_eq!(
            validate_request(&status_request()),
            Ok(RequestKind::StatusRequest)
        );
        assert!(validate_request(&command_ack(0)).is_err());

        let mut request = status_request();
        request[12] = b'8';
        assert!(matches!(
            validate_request(&request),
            Err(ProtocolError::Checksum { .. })
        ));
    }

    #[test]
    fn test_missing_delimiter() {
        let mut ack = command_ack(0);
        ack[9] = b'#';
        assert_eq!(
            validate(&ack, FrameKind::CommandAck),
            Err(ProtocolError::Delimiter)
        );
    }
}
