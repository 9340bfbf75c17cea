//! Reassembly of `@`..`*` frames from an arbitrarily chunked byte stream.
//!
//! Serial reads hand over whatever the UART had buffered, so a single frame may
//! arrive over many reads and a single read may carry the tail of one frame and
//! the head of the next. [`FrameAssembler::push`] scans each chunk iteratively:
//!
//! - `@` before `*`: the span `@..=*` is a complete frame.
//! - `*` without a preceding `@`: the bytes up to `*` complete the frame
//!   already in progress.
//! - no `*`: an `@` restarts the receive buffer (discarding any unterminated
//!   partial frame), otherwise the chunk is appended to the frame in progress.
//!
//! # Example
//!
//! ```
//! use plc_protocol::FrameAssembler;
//!
//! let mut assembler = FrameAssembler::new();
//! let mut frames = Vec::new();
//! for chunk in [&b"\r@00WD"[..], b"0050", b"*\r@00"] {
//!     assembler.push(chunk, |frame| frames.push(frame.to_vec()));
//! }
//! assert_eq!(frames, vec![b"@00WD0050*".to_vec()]);
//! ```

use tracing::{trace, warn};

use crate::frame::{END, START};

/// Default receive buffer capacity; comfortably above the longest frame.
pub const DEFAULT_RX_CAPACITY: usize = 128;

/// Byte-stream to frame reassembler with a bounded receive buffer.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
    capacity: usize,
    /// Set once the frame in progress outgrew the buffer; cleared on the next `@`.
    overflowed: bool,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// Create an assembler with [`DEFAULT_RX_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RX_CAPACITY)
    }

    /// Create an assembler whose receive buffer holds at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            overflowed: false,
        }
    }

    /// Receive buffer capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a frame is partially assembled.
    pub fn in_progress(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Drop any partially assembled frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }

    /// Feed a chunk of received bytes.
    ///
    /// `on_frame` is called once for every frame completed by this chunk, in
    /// stream order, before `push` returns. Each frame includes both delimiters.
    /// Returns the number of frames delivered.
    pub fn push<F>(&mut self, chunk: &[u8], mut on_frame: F) -> usize
    where
        F: FnMut(&[u8]),
    {
        let mut rest = chunk;
        let mut delivered = 0;

        loop {
            let end = rest.iter().position(|&b| b == END);
            let start = rest.iter().position(|&b| b == START);

            match (start, end) {
                (Some(s), Some(e)) if s < e => {
                    self.reset();
                    self.append(&rest[s..=e]);
                    delivered += self.complete(&mut on_frame);
                    rest = &rest[e + 1..];
                }
                (_, Some(e)) => {
                    self.append(&rest[..=e]);
                    delivered += self.complete(&mut on_frame);
                    rest = &rest[e + 1..];
                }
                (Some(s), None) => {
                    if self.in_progress() {
                        trace!("Discarding {} byte unterminated frame", self.buffer.len());
                    }
                    self.reset();
                    self.append(&rest[s..]);
                    break;
                }
                (None, None) => {
                    self.append(rest);
                    break;
                }
            }
        }

        delivered
    }

    fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() || self.overflowed {
            return;
        }
        // Bytes outside any frame (e.g. the CR after '*') are not buffered
        if self.buffer.is_empty() && bytes[0] != START {
            trace!("Dropping {} bytes outside a frame", bytes.len());
            return;
        }
        if self.buffer.len() + bytes.len() > self.capacity {
            warn!(
                "Frame exceeds {} byte receive buffer, discarding",
                self.capacity
            );
            self.buffer.clear();
            self.overflowed = true;
            return;
        }
        self.buffer.extend_from_slice(bytes);
    }

    fn complete<F>(&mut self, on_frame: &mut F) -> usize
    where
        F: FnMut(&[u8]),
    {
        let delivered = if self.overflowed || self.buffer.first() != Some(&START) {
            0
        } else {
            trace!("Frame complete: {:?}", String::from_utf8_lossy(&self.buffer));
            on_frame(&self.buffer);
            1
        };
        self.reset();
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::command_ack;

    fn collect(assembler: &mut FrameAssembler, chunks: &[&[u8]]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        for chunk in chunks {
            assembler.push(chunk, |f| frames.push(f.to_vec()));
        }
        frames
    }

    #[test]
    fn test_single_chunk() {
        let ack = command_ack(0);
        let frames = collect(&mut FrameAssembler::new(), &[&ack]);
        assert_eq!(frames, vec![ack[..ack.len() - 1].to_vec()]);
    }

    #[test]
    fn test_byte_by_byte_matches_single_chunk() {
        let ack = command_ack(0);
        let chunks: Vec<&[u8]> = ack.chunks(1).collect();
        let frames = collect(&mut FrameAssembler::new(), &chunks);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], ack[..ack.len() - 1].to_vec());
    }

    #[test]
    fn test_every_split_point() {
        let ack = command_ack(0);
        for split in 0..=ack.len() {
            let (a, b) = ack.split_at(split);
            let frames = collect(&mut FrameAssembler::new(), &[a, b]);
            assert_eq!(frames.len(), 1, "split at {split}");
            assert_eq!(frames[0], ack[..ack.len() - 1].to_vec());
        }
    }

    #[test]
    fn test_two_frames_in_one_chunk() {
        let mut stream = command_ack(0).to_vec();
        stream.extend_from_slice(&command_ack(0));
        let frames = collect(&mut FrameAssembler::new(), &[&stream]);
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_tail_and_head_in_one_chunk() {
        let frames = collect(
            &mut FrameAssembler::new(),
            &[b"@00W", b"D00FF*\r@00R", b"D00AA*"],
        );
        assert_eq!(frames, vec![b"@00WD00FF*".to_vec(), b"@00RD00AA*".to_vec()]);
    }

    #[test]
    fn test_new_start_discards_partial() {
        let frames = collect(&mut FrameAssembler::new(), &[b"@00WD0", b"@00RD", b"11*"]);
        assert_eq!(frames, vec![b"@00RD11*".to_vec()]);
    }

    #[test]
    fn test_stray_end_without_frame_ignored() {
        let frames = collect(&mut FrameAssembler::new(), &[b"\r*", b"xx*"]);
        assert!(frames.is_empty());
    }

    #[test]
    fn test_oversized_frame_discarded() {
        let mut assembler = FrameAssembler::with_capacity(8);
        let frames = collect(&mut assembler, &[b"@0123", b"456789", b"*"]);
        assert!(frames.is_empty());
        assert!(!assembler.in_progress());

        // Recovers on the next start delimiter
        let frames = collect(&mut assembler, &[b"@01*"]);
        assert_eq!(frames, vec![b"@01*".to_vec()]);
    }

    #[test]
    fn test_oversized_single_chunk_frame_discarded() {
        let mut assembler = FrameAssembler::with_capacity(4);
        let frames = collect(&mut assembler, &[b"@0123*@0*"]);
        assert_eq!(frames, vec![b"@0*".to_vec()]);
    }

    #[test]
    fn test_push_returns_count() {
        let mut assembler = FrameAssembler::new();
        assert_eq!(assembler.push(b"@1*@2*@3", |_| {}), 2);
        assert_eq!(assembler.push(b"*", |_| {}), 1);
    }
}
