//! Named flag sets for every nibble-coded field.
//!
//! Several fields reuse the same bit positions with unrelated meanings (the
//! main shutter and the dropout share the OPEN/CLOSED/MOVING masks, both wheels
//! share INIT/CENTERED/MOVING). Each field still gets its own type so a mask for
//! one field cannot be applied to another by accident. The bit values are what
//! the controller reports and must not be "tidied".

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::{ProtocolError, ProtocolResult};

bitflags! {
    /// Dome rotation status nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DomeStatus: u8 {
        const MOVING_LEFT = 0x1;
        const MOVING_RIGHT = 0x2;
        const GUIDING = 0x4;
    }
}

bitflags! {
    /// Main shutter status nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ShutterStatus: u8 {
        const OPEN = 0x1;
        const CLOSED = 0x2;
        const MOVING = 0x4;
    }
}

bitflags! {
    /// Dropout status nibble. Same bit values as [`ShutterStatus`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DropoutStatus: u8 {
        const OPEN = 0x1;
        const CLOSED = 0x2;
        const MOVING = 0x4;
    }
}

bitflags! {
    /// Aperture or filter wheel status nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct WheelStatus: u8 {
        const INIT = 0x1;
        const CENTERED = 0x2;
        const MOVING = 0x4;
    }
}

bitflags! {
    /// Acquisition mirror status nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AcqMirrorStatus: u8 {
        const VIEW = 0x1;
        const MEASURE = 0x2;
        const MOVING = 0x4;
    }
}

bitflags! {
    /// Instrument shutter status nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct InstrumentShutterStatus: u8 {
        const OPEN = 0x1;
    }
}

bitflags! {
    /// Focuser status byte (two hex digits).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct FocusStatus: u8 {
        const SLOT = 0x01;
        const REF = 0x02;
        const OUT = 0x04;
        const IN = 0x08;
        const MOVING = 0x10;
        const INIT = 0x20;
        const STALL = 0x40;
    }
}

bitflags! {
    /// Critical fault nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CriticalFaults: u8 {
        const POWER_FAIL = 0x1;
        const WATCHDOG_TRIP = 0x2;
    }
}

bitflags! {
    /// Handset paddle bits. The raw byte is what listeners receive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct HandsetBits: u8 {
        const NORTH = 0x01;
        const SOUTH = 0x02;
        const EAST = 0x04;
        const WEST = 0x08;
        const SLEW = 0x10;
        const FOCUS_OUT = 0x20;
        const FOCUS_IN = 0x40;
    }
}

bitflags! {
    /// Dome command nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DomeCommand: u8 {
        const GUIDE = 0x1;
        const MOVE_LEFT = 0x2;
        const MOVE_RIGHT = 0x4;
        const GOTO = 0x8;
    }
}

bitflags! {
    /// Main shutter command nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ShutterCommand: u8 {
        const OPEN = 0x1;
        const CLOSE = 0x2;
    }
}

bitflags! {
    /// Dropout command nibble. Same bit values as [`ShutterCommand`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DropoutCommand: u8 {
        const OPEN = 0x1;
        const CLOSE = 0x2;
    }
}

bitflags! {
    /// Focuser command nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct FocusCommand: u8 {
        const GOTO = 0x1;
        const MOVE_OUT = 0x2;
        const MOVE_IN = 0x4;
        const RESET = 0x8;
    }
}

bitflags! {
    /// Aperture or filter wheel command nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct WheelCommand: u8 {
        const GO = 0x1;
        const INIT = 0x2;
        const RESET = 0x4;
    }
}

bitflags! {
    /// Acquisition mirror command nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AcqMirrorCommand: u8 {
        const VIEW = 0x1;
        const MEASURE = 0x2;
        const RESET = 0x4;
    }
}

bitflags! {
    /// Miscellaneous command nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MiscCommand: u8 {
        const INSTRUMENT_SHUTTER_OPEN = 0x1;
        const WATCHDOG = 0x2;
        const ACQ_DEVICE_RESET = 0x4;
    }
}

/// Photomultiplier high-voltage supply mode.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EhtMode {
    #[default]
    Off,
    Standby,
    On,
}

impl EhtMode {
    /// Wire value of the mode.
    pub fn code(self) -> u8 {
        match self {
            EhtMode::Off => 0,
            EhtMode::Standby => 1,
            EhtMode::On => 2,
        }
    }

    /// Mode for a wire value; anything other than 0..=2 is rejected.
    pub fn from_code(code: u8) -> ProtocolResult<Self> {
        match code {
            0 => Ok(EhtMode::Off),
            1 => Ok(EhtMode::Standby),
            2 => Ok(EhtMode::On),
            other => Err(ProtocolError::OutOfRange {
                field: "eht_mode",
                value: other.into(),
                min: 0,
                max: 2,
            }),
        }
    }
}

/// Sentinel character marking a negative focuser value.
pub const FOCUS_SIGN_NEGATIVE: u8 = b'F';

/// Sentinel character marking a non-negative focuser value.
pub const FOCUS_SIGN_POSITIVE: u8 = b'0';

/// Combine the focuser sign sentinel and magnitude into one signed value.
pub fn focus_from_wire(sign: u8, magnitude: u32, offset: usize) -> ProtocolResult<i16> {
    let magnitude = magnitude as i16;
    match sign {
        FOCUS_SIGN_NEGATIVE => Ok(-magnitude),
        FOCUS_SIGN_POSITIVE => Ok(magnitude),
        byte => Err(ProtocolError::InvalidDigit { offset, byte }),
    }
}

/// Split a signed focuser value into sign sentinel and magnitude.
pub fn focus_to_wire(position: i16) -> (u8, u32) {
    let sign = if position < 0 {
        FOCUS_SIGN_NEGATIVE
    } else {
        FOCUS_SIGN_POSITIVE
    };
    (sign, u32::from(position.unsigned_abs()))
}
