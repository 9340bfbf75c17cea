//! Character offsets of every field in status responses and command frames.

use std::ops::Range;

use strum::{Display, EnumIter};

/// Fields of a status response, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum StatusField {
    DomePosition,
    Dome,
    Shutter,
    Dropout,
    Aperture,
    Filter,
    AcqMirror,
    InstrumentShutter,
    FocusSign,
    FocusPosition,
    Focus,
    Critical,
    Eht,
    Handset,
    ApertureSlot,
    FilterSlot,
    DomeFlopMin,
    DomeFlopMax,
    HaPulses,
    DecPulses,
}

impl StatusField {
    /// Byte range of the field within a status response frame.
    pub fn range(self) -> Range<usize> {
        let (offset, width) = match self {
            StatusField::DomePosition => (7, 4),
            StatusField::Dome => (11, 1),
            StatusField::Shutter => (12, 1),
            StatusField::Dropout => (13, 1),
            StatusField::Aperture => (14, 1),
            StatusField::Filter => (15, 1),
            StatusField::AcqMirror => (16, 1),
            StatusField::InstrumentShutter => (17, 1),
            StatusField::FocusSign => (18, 1),
            StatusField::FocusPosition => (19, 3),
            StatusField::Focus => (22, 2),
            StatusField::Critical => (24, 1),
            StatusField::Eht => (25, 1),
            StatusField::Handset => (26, 2),
            StatusField::ApertureSlot => (28, 1),
            StatusField::FilterSlot => (29, 1),
            StatusField::DomeFlopMin => (30, 4),
            StatusField::DomeFlopMax => (34, 4),
            StatusField::HaPulses => (38, 8),
            StatusField::DecPulses => (46, 8),
        };
        offset..offset + width
    }
}

/// First status data character (after header and end code).
pub const STATUS_DATA_START: usize = 7;

/// Reserved padding at the end of the status data block.
pub const STATUS_RESERVED: Range<usize> = 54..75;

/// Command frame field ranges.
pub mod command {
    use std::ops::Range;

    pub const WORD_ADDRESS: Range<usize> = 5..9;
    pub const DOME_TARGET: Range<usize> = 9..13;
    pub const DOME: usize = 13;
    pub const SHUTTER: usize = 14;
    pub const DROPOUT: usize = 15;
    pub const FOCUS: usize = 16;
    pub const FOCUS_SIGN: usize = 17;
    pub const FOCUS_TARGET: Range<usize> = 18..21;
    pub const APERTURE: usize = 21;
    pub const APERTURE_SLOT: usize = 22;
    pub const FILTER: usize = 23;
    pub const FILTER_SLOT: usize = 24;
    pub const EHT: usize = 25;
    pub const ACQ_MIRROR: usize = 26;
    pub const MISC: usize = 27;
    pub const DOME_FLOP_MIN: Range<usize> = 28..32;
    pub const DOME_FLOP_MAX: Range<usize> = 32..36;
    pub const PADDING: Range<usize> = 36..53;
}
