//! ASCII digit helpers shared by the status and command translators.
//!
//! Multi-digit numeric fields are decimal place-value, flag fields are hex.

use crate::error::ProtocolError;

/// A byte that is not a digit of the expected radix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidDigit {
    /// Index of the offending byte within the parsed slice
    pub index: usize,
    /// The offending byte
    pub byte: u8,
}

/// Uppercase ASCII hex digit for the low nibble of `n`.
pub fn hex_digit(n: u8) -> u8 {
    b"0123456789ABCDEF"[(n & 0x0F) as usize]
}

/// Parse ASCII hex digits (either case) into a value.
pub fn parse_hex(chars: &[u8]) -> Result<u32, InvalidDigit> {
    chars.iter().enumerate().try_fold(0u32, |acc, (index, &byte)| {
        let nibble = (byte as char)
            .to_digit(16)
            .ok_or(InvalidDigit { index, byte })?;
        Ok((acc << 4) | nibble)
    })
}

/// Parse ASCII decimal digits into a value.
pub fn parse_decimal(chars: &[u8]) -> Result<u32, InvalidDigit> {
    chars.iter().enumerate().try_fold(0u32, |acc, (index, &byte)| {
        if !byte.is_ascii_digit() {
            return Err(InvalidDigit { index, byte });
        }
        Ok(acc * 10 + u32::from(byte - b'0'))
    })
}

/// Write `value` as zero-padded decimal filling all of `out`.
///
/// Digits that do not fit are dropped from the most significant end, so
/// callers range-check before encoding.
pub fn write_decimal(out: &mut [u8], mut value: u32) {
    for slot in out.iter_mut().rev() {
        *slot = b'0' + (value % 10) as u8;
        value /= 10;
    }
}

/// Write `value` as zero-padded uppercase hex filling all of `out`.
pub fn write_hex(out: &mut [u8], mut value: u32) {
    for slot in out.iter_mut().rev() {
        *slot = hex_digit((value & 0x0F) as u8);
        value >>= 4;
    }
}

/// Read a hex field at `offset` of `frame`.
pub(crate) fn read_hex(frame: &[u8], offset: usize, width: usize) -> Result<u32, ProtocolError> {
    let chars = field(frame, offset, width)?;
    parse_hex(chars).map_err(|e| ProtocolError::InvalidDigit {
        offset: offset + e.index,
        byte: e.byte,
    })
}

/// Read a decimal field at `offset` of `frame`.
pub(crate) fn read_decimal(
    frame: &[u8],
    offset: usize,
    width: usize,
) -> Result<u32, ProtocolError> {
    let chars = field(frame, offset, width)?;
    parse_decimal(chars).map_err(|e| ProtocolError::InvalidDigit {
        offset: offset + e.index,
        byte: e.byte,
    })
}

fn field(frame: &[u8], offset: usize, width: usize) -> Result<&[u8], ProtocolError> {
    frame
        .get(offset..offset + width)
        .ok_or(ProtocolError::TooShort {
            expected: offset + width,
            actual: frame.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_is_place_value_not_hex() {
        assert_eq!(parse_decimal(b"3599"), Ok(3599));
        assert_eq!(parse_decimal(b"0010"), Ok(10));
        assert_eq!(parse_hex(b"0010"), Ok(16));
    }

    #[test]
    fn test_decimal_rejects_hex_letters() {
        assert_eq!(
            parse_decimal(b"12A4"),
            Err(InvalidDigit {
                index: 2,
                byte: b'A'
            })
        );
    }

    #[test]
    fn test_hex_accepts_both_cases() {
        assert_eq!(parse_hex(b"fF"), Ok(0xFF));
        assert!(parse_hex(b"G0").is_err());
    }

    #[test]
    fn test_write_decimal_pads() {
        let mut out = [0u8; 4];
        write_decimal(&mut out, 42);
        assert_eq!(&out, b"0042");
    }

    #[test]
    fn test_write_hex_uppercase() {
        let mut out = [0u8; 2];
        write_hex(&mut out, 0x4c);
        assert_eq!(&out, b"4C");
    }

    #[test]
    fn test_read_reports_frame_offset() {
        let frame = b"@00RD00x";
        assert_eq!(
            read_hex(frame, 5, 3),
            Err(ProtocolError::InvalidDigit {
                offset: 7,
                byte: b'x'
            })
        );
        assert!(matches!(
            read_decimal(frame, 6, 4),
            Err(ProtocolError::TooShort {
                expected: 10,
                actual: 8
            })
        ));
    }
}
