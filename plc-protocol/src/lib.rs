//! Wire protocol for the dome and instrument PLC.
//!
//! The controller answers two requests over a serial line: a fixed status
//! request, answered with a snapshot of every mechanism, and a command frame
//! carrying the full set of requested states, answered with a short
//! acknowledgement. This crate holds everything that does not need I/O:
//!
//! - [`FrameAssembler`] rebuilds `@`..`*` frames from arbitrary read chunks
//! - [`frame`] builds fixed frames and validates inbound ones
//! - [`StatusSnapshot`] decodes status responses field by field
//! - [`CommandBuffer`] holds and encodes the outgoing command frame
//!
//! The session logic that sequences requests lives in `plc-driver`.

mod assembler;
mod checksum;
pub mod command;
mod digits;
mod error;
pub mod fields;
pub mod frame;
pub mod layout;
mod status;

pub use assembler::{FrameAssembler, DEFAULT_RX_CAPACITY};
pub use checksum::{check_fcs, compute_fcs, fcs_chars, fcs_offset, stored_and_computed, update_fcs};
pub use command::{
    AcqMirrorAction, CommandBuffer, Controlled, DomeMove, FocusMove, OneShot, ShutterAction, Wheel,
    WheelAction,
};
pub use digits::{hex_digit, parse_decimal, parse_hex, write_decimal, write_hex, InvalidDigit};
pub use error::{ProtocolError, ProtocolResult};
pub use fields::*;
pub use frame::{command_ack, status_request, validate, FrameKind, RequestKind};
pub use layout::StatusField;
pub use status::{azimuth_from_ticks, ticks_from_azimuth, StatusSnapshot, DOME_TICKS_MAX};
