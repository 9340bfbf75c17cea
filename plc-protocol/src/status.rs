//! Status snapshot decoded from status response frames.
//!
//! The snapshot is built once from the first response of a session and then
//! updated field by field: only fields whose raw characters differ from the
//! previous response are re-decoded and written.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::checksum::update_fcs;
use crate::digits::{read_decimal, read_hex, write_decimal, write_hex};
use crate::error::{check_range, ProtocolResult};
use crate::fields::{
    focus_from_wire, focus_to_wire, AcqMirrorStatus, CriticalFaults, DomeStatus, DropoutStatus,
    EhtMode, FocusStatus, HandsetBits, InstrumentShutterStatus, ShutterStatus, WheelStatus,
};
use crate::frame::{validate, FrameKind, STATUS_HEADER, STATUS_RESPONSE_LEN, TERMINATOR};
use crate::layout::StatusField;

/// Highest dome encoder tick / azimuth value in tenths of a degree.
pub const DOME_TICKS_MAX: u16 = 3599;

/// Convert raw dome encoder ticks to azimuth in tenths of a degree.
///
/// The encoder counts down as azimuth increases.
pub fn azimuth_from_ticks(ticks: u32) -> ProtocolResult<u16> {
    check_range("dome_ticks", ticks.into(), 0, DOME_TICKS_MAX.into())?;
    Ok(DOME_TICKS_MAX - ticks as u16)
}

/// Convert azimuth in tenths of a degree to raw dome encoder ticks.
pub fn ticks_from_azimuth(azimuth: u16) -> u32 {
    u32::from(DOME_TICKS_MAX - azimuth.min(DOME_TICKS_MAX))
}

/// Structured controller state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Dome azimuth in tenths of a degree (0..=3599)
    pub dome_azimuth: u16,
    pub dome: DomeStatus,
    pub shutter: ShutterStatus,
    pub dropout: DropoutStatus,
    pub aperture: WheelStatus,
    pub filter: WheelStatus,
    pub acq_mirror: AcqMirrorStatus,
    pub instrument_shutter: InstrumentShutterStatus,
    /// Signed focuser position
    pub focus_position: i16,
    pub focus: FocusStatus,
    pub critical: CriticalFaults,
    pub eht: EhtMode,
    /// Raw handset byte
    pub handset: u8,
    pub aperture_slot: u8,
    pub filter_slot: u8,
    pub dome_flop_min: u16,
    pub dome_flop_max: u16,
    /// Hour-angle encoder pulse count
    pub ha_pulses: u32,
    /// Declination encoder pulse count
    pub dec_pulses: u32,
}

impl StatusSnapshot {
    /// Validate and fully decode a status response frame.
    pub fn decode(frame: &[u8]) -> ProtocolResult<Self> {
        validate(frame, FrameKind::StatusResponse)?;
        let mut snapshot = Self::default();
        for field in StatusField::iter() {
            snapshot.decode_field(field, frame)?;
        }
        Ok(snapshot)
    }

    /// Apply a new status response on top of this snapshot.
    ///
    /// `previous` is the last frame applied. The new frame is validated and
    /// decoded in full first; on any error the snapshot is left untouched.
    /// Otherwise only fields whose raw characters changed are written, and
    /// those fields are returned in wire order.
    pub fn apply_changes(
        &mut self,
        previous: &[u8],
        frame: &[u8],
    ) -> ProtocolResult<Vec<StatusField>> {
        let fresh = Self::decode(frame)?;
        let changed: Vec<StatusField> = StatusField::iter()
            .filter(|field| previous.get(field.range()) != frame.get(field.range()))
            .collect();
        for &field in &changed {
            self.copy_field(field, &fresh);
        }
        Ok(changed)
    }

    fn decode_field(&mut self, field: StatusField, frame: &[u8]) -> ProtocolResult<()> {
        let range = field.range();
        let hex = |frame: &[u8]| read_hex(frame, range.start, range.len()).map(|v| v as u8);
        let decimal = |frame: &[u8]| read_decimal(frame, range.start, range.len());

        match field {
            StatusField::DomePosition => self.dome_azimuth = azimuth_from_ticks(decimal(frame)?)?,
            StatusField::Dome => self.dome = DomeStatus::from_bits_retain(hex(frame)?),
            StatusField::Shutter => self.shutter = ShutterStatus::from_bits_retain(hex(frame)?),
            StatusField::Dropout => self.dropout = DropoutStatus::from_bits_retain(hex(frame)?),
            StatusField::Aperture => self.aperture = WheelStatus::from_bits_retain(hex(frame)?),
            StatusField::Filter => self.filter = WheelStatus::from_bits_retain(hex(frame)?),
            StatusField::AcqMirror => {
                self.acq_mirror = AcqMirrorStatus::from_bits_retain(hex(frame)?)
            }
            StatusField::InstrumentShutter => {
                self.instrument_shutter = InstrumentShutterStatus::from_bits_retain(hex(frame)?)
            }
            StatusField::FocusSign | StatusField::FocusPosition => {
                let sign_at = StatusField::FocusSign.range().start;
                let magnitude = StatusField::FocusPosition.range();
                let value = read_decimal(frame, magnitude.start, magnitude.len())?;
                self.focus_position = focus_from_wire(frame[sign_at], value, sign_at)?;
            }
            StatusField::Focus => self.focus = FocusStatus::from_bits_retain(hex(frame)?),
            StatusField::Critical => self.critical = CriticalFaults::from_bits_retain(hex(frame)?),
            StatusField::Eht => self.eht = EhtMode::from_code(hex(frame)?)?,
            StatusField::Handset => self.handset = hex(frame)?,
            StatusField::ApertureSlot => self.aperture_slot = decimal(frame)? as u8,
            StatusField::FilterSlot => self.filter_slot = decimal(frame)? as u8,
            StatusField::DomeFlopMin => self.dome_flop_min = decimal(frame)? as u16,
            StatusField::DomeFlopMax => self.dome_flop_max = decimal(frame)? as u16,
            StatusField::HaPulses => self.ha_pulses = decimal(frame)?,
            StatusField::DecPulses => self.dec_pulses = decimal(frame)?,
        }
        Ok(())
    }

    fn copy_field(&mut self, field: StatusField, from: &Self) {
        match field {
            StatusField::DomePosition => self.dome_azimuth = from.dome_azimuth,
            StatusField::Dome => self.dome = from.dome,
            StatusField::Shutter => self.shutter = from.shutter,
            StatusField::Dropout => self.dropout = from.dropout,
            StatusField::Aperture => self.aperture = from.aperture,
            StatusField::Filter => self.filter = from.filter,
            StatusField::AcqMirror => self.acq_mirror = from.acq_mirror,
            StatusField::InstrumentShutter => self.instrument_shutter = from.instrument_shutter,
            StatusField::FocusSign | StatusField::FocusPosition => {
                self.focus_position = from.focus_position
            }
            StatusField::Focus => self.focus = from.focus,
            StatusField::Critical => self.critical = from.critical,
            StatusField::Eht => self.eht = from.eht,
            StatusField::Handset => self.handset = from.handset,
            StatusField::ApertureSlot => self.aperture_slot = from.aperture_slot,
            StatusField::FilterSlot => self.filter_slot = from.filter_slot,
            StatusField::DomeFlopMin => self.dome_flop_min = from.dome_flop_min,
            StatusField::DomeFlopMax => self.dome_flop_max = from.dome_flop_max,
            StatusField::HaPulses => self.ha_pulses = from.ha_pulses,
            StatusField::DecPulses => self.dec_pulses = from.dec_pulses,
        }
    }

    /// Encode the snapshot as the status response a controller would send.
    ///
    /// Values are expected to be in range; oversized decimal values lose their
    /// most significant digits.
    pub fn encode(&self) -> [u8; STATUS_RESPONSE_LEN] {
        let mut frame = [b'0'; STATUS_RESPONSE_LEN];
        frame[..STATUS_HEADER.len()].copy_from_slice(STATUS_HEADER);

        let mut put_hex =
            |field: StatusField, value: u8| write_hex(&mut frame[field.range()], value.into());
        put_hex(StatusField::Dome, self.dome.bits());
        put_hex(StatusField::Shutter, self.shutter.bits());
        put_hex(StatusField::Dropout, self.dropout.bits());
        put_hex(StatusField::Aperture, self.aperture.bits());
        put_hex(StatusField::Filter, self.filter.bits());
        put_hex(StatusField::AcqMirror, self.acq_mirror.bits());
        put_hex(StatusField::InstrumentShutter, self.instrument_shutter.bits());
        put_hex(StatusField::Focus, self.focus.bits());
        put_hex(StatusField::Critical, self.critical.bits());
        put_hex(StatusField::Eht, self.eht.code());
        put_hex(StatusField::Handset, self.handset);

        let mut put_decimal =
            |field: StatusField, value: u32| write_decimal(&mut frame[field.range()], value);
        put_decimal(StatusField::DomePosition, ticks_from_azimuth(self.dome_azimuth));
        put_decimal(StatusField::ApertureSlot, self.aperture_slot.into());
        put_decimal(StatusField::FilterSlot, self.filter_slot.into());
        put_decimal(StatusField::DomeFlopMin, self.dome_flop_min.into());
        put_decimal(StatusField::DomeFlopMax, self.dome_flop_max.into());
        put_decimal(StatusField::HaPulses, self.ha_pulses);
        put_decimal(StatusField::DecPulses, self.dec_pulses);

        let (sign, magnitude) = focus_to_wire(self.focus_position);
        frame[StatusField::FocusSign.range().start] = sign;
        write_decimal(&mut frame[StatusField::FocusPosition.range()], magnitude);

        frame[STATUS_RESPONSE_LEN - TERMINATOR.len()..].copy_from_slice(&TERMINATOR);
        update_fcs(&mut frame);
        frame
    }

    /// Dome azimuth in degrees.
    pub fn azimuth_degrees(&self) -> f64 {
        f64::from(self.dome_azimuth) / 10.0
    }

    /// Handset byte interpreted as paddle bits.
    pub fn handset_bits(&self) -> HandsetBits {
        HandsetBits::from_bits_retain(self.handset)
    }

    /// Whether the controller reports any critical fault.
    pub fn has_critical_fault(&self) -> bool {
        !self.critical.is_empty()
    }
}
