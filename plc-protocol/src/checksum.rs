//! Frame check sequence for PLC frames
//!
//! The FCS is the XOR of every byte from the `@` start delimiter up to (not
//! including) the FCS field itself, rendered as two uppercase ASCII hex
//! digits. The FCS is followed by the `*` CR terminator.

use crate::digits::{hex_digit, parse_hex};
use crate::frame::{END, START};

/// Width of the FCS field in characters.
pub const FCS_LEN: usize = 2;

/// XOR every byte of `data` once.
pub fn compute_fcs(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Render an FCS value as two uppercase hex characters.
pub fn fcs_chars(fcs: u8) -> [u8; FCS_LEN] {
    [hex_digit(fcs >> 4), hex_digit(fcs & 0x0F)]
}

/// Locate the FCS field of a frame.
///
/// The frame may or may not carry the trailing CR; in both cases the FCS sits
/// immediately before the `*` end delimiter. Returns the offset of the first
/// FCS character.
pub fn fcs_offset(frame: &[u8]) -> Option<usize> {
    let body = strip_cr(frame);
    if body.len() < 1 + FCS_LEN + 1 || body[0] != START || body[body.len() - 1] != END {
        return None;
    }
    Some(body.len() - 1 - FCS_LEN)
}

/// Verify that a frame's FCS matches its content.
///
/// Returns `false` for anything that does not look like a delimited frame.
pub fn check_fcs(frame: &[u8]) -> bool {
    stored_and_computed(frame).is_some_and(|(stored, computed)| stored == computed)
}

/// The FCS carried by a frame and the value computed over its content.
///
/// `None` when the frame is not delimited or the stored FCS is not uppercase
/// hex. Lowercase digits are refused so that flipping bit 5 of a letter is
/// still detected.
pub fn stored_and_computed(frame: &[u8]) -> Option<(u8, u8)> {
    let offset = fcs_offset(frame)?;
    let field = &frame[offset..offset + FCS_LEN];
    if !field.iter().all(|b| matches!(b, b'0'..=b'9' | b'A'..=b'F')) {
        return None;
    }
    let stored = parse_hex(&frame[offset..offset + FCS_LEN]).ok()? as u8;
    Some((stored, compute_fcs(&frame[..offset])))
}

/// Compute and write the FCS of a frame in place.
///
/// After calling this, [`check_fcs`] returns `true` for the frame.
pub fn update_fcs(frame: &mut [u8]) {
    if let Some(offset) = fcs_offset(frame) {
        let fcs = compute_fcs(&frame[..offset]);
        frame[offset..offset + FCS_LEN].copy_from_slice(&fcs_chars(fcs));
    }
}

fn strip_cr(frame: &[u8]) -> &[u8] {
    match frame.split_last() {
        Some((b'\r', rest)) => rest,
        _ => frame,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fcs_of_status_request() {
        // '@' ^ '0' ^ '0' ^ 'R' ^ 'D' ^ "0000" ^ "0017"
        let body = b"@00RD00000017";
        let expected = b'@' ^ b'R' ^ b'D' ^ b'1' ^ b'7';
        assert_eq!(compute_fcs(body), expected);
    }

    #[test]
    fn test_fcs_xors_every_byte_once() {
        assert_eq!(compute_fcs(&[]), 0);
        assert_eq!(compute_fcs(&[0x5A]), 0x5A);
        assert_eq!(compute_fcs(&[0x5A, 0x5A]), 0);
        assert_eq!(compute_fcs(&[0x01, 0x02, 0x04, 0x08]), 0x0F);
    }

    #[test]
    fn test_fcs_chars_uppercase() {
        assert_eq!(&fcs_chars(0xAB), b"AB");
        assert_eq!(&fcs_chars(0x0F), b"0F");
    }

    #[test]
    fn test_update_then_check() {
        let mut frame = *b"@00WD00??*\r";
        assert!(!check_fcs(&frame));
        update_fcs(&mut frame);
        assert!(check_fcs(&frame));
        // Same frame without CR, as delivered by the assembler
        assert!(check_fcs(&frame[..frame.len() - 1]));
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let mut frame = *b"@00WD00??*\r";
        update_fcs(&mut frame);
        assert_every_flip_rejected(&frame);
    }

    #[test]
    fn test_lowercase_fcs_rejected() {
        // '@' ^ 'Z' = 0x1A
        assert!(check_fcs(b"@Z1A*\r"));
        assert!(!check_fcs(b"@Z1a*\r"));
        assert!(stored_and_computed(b"@Z1a*").is_none());
    }

    #[test]
    fn test_encoded_frames_detect_flips() {
        use crate::command::CommandBuffer;
        use crate::status::StatusSnapshot;

        let mut letters = 0;
        for azimuth in 0..32 {
            let status = StatusSnapshot {
                dome_azimuth: azimuth,
                ..Default::default()
            }
            .encode();
            let mut command = CommandBuffer::default();
            command.set_dome_target(azimuth, false).unwrap();
            let command = command.encode();

            for frame in [&status[..], &command[..]] {
                let offset = fcs_offset(frame).unwrap();
                if frame[offset..offset + FCS_LEN].iter().any(u8::is_ascii_alphabetic) {
                    letters += 1;
                }
                assert_every_flip_rejected(frame);
            }
        }
        assert!(letters > 0);
    }

    /// Flip every bit of every byte, delimiters and FCS included.
    pub(crate) fn assert_every_flip_rejected(frame: &[u8]) {
        assert!(check_fcs(frame));
        for i in 0..frame.len() {
            for bit in 0..8 {
                let mut corrupted = frame.to_vec();
                corrupted[i] ^= 1 << bit;
                assert!(
                    !check_fcs(&corrupted),
                    "flip at byte {i} bit {bit} accepted: {:?}",
                    String::from_utf8_lossy(&corrupted)
                );
            }
        }
    }

    #[test]
    fn test_rejects_undelimited() {
        assert!(!check_fcs(b""));
        assert!(!check_fcs(b"@*"));
        assert!(!check_fcs(b"00WD0000*"));
        assert!(!check_fcs(b"@00WD0000"));
    }
}
