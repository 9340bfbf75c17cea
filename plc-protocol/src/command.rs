//! Outgoing command buffer.
//!
//! The buffer mirrors every settable field of the command frame. It is seeded
//! once from the first status snapshot so the first command sent never
//! contradicts what the hardware is already doing, and is then changed by the
//! mutators below and by the session (clearing one-shot bits once the
//! controller has acted on them).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::checksum::update_fcs;
use crate::digits::{read_decimal, read_hex, write_decimal, write_hex};
use crate::error::{check_range, ProtocolResult};
use crate::fields::{
    focus_from_wire, focus_to_wire, AcqMirrorCommand, AcqMirrorStatus, DomeCommand,
    DropoutCommand, DropoutStatus, EhtMode, FocusCommand, InstrumentShutterStatus, MiscCommand,
    ShutterCommand, ShutterStatus, WheelCommand,
};
use crate::frame::{
    validate_command, COMMAND_HEADER, COMMAND_LEN, COMMAND_WORD_ADDRESS, TERMINATOR,
};
use crate::layout::command as at;
use crate::status::{azimuth_from_ticks, ticks_from_azimuth, StatusSnapshot, DOME_TICKS_MAX};

/// Largest focuser magnitude representable in three digits.
pub const FOCUS_LIMIT: i16 = 999;

/// Highest wheel slot number.
pub const WHEEL_SLOT_MAX: u8 = 9;

/// Largest dome flop constant representable in four digits.
pub const DOME_FLOP_MAX: u16 = 9999;

bitflags! {
    /// Command bits meant to trigger a single action.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OneShot: u8 {
        const FOCUS_RESET = 0x01;
        const APERTURE_INIT = 0x02;
        const APERTURE_RESET = 0x04;
        const FILTER_INIT = 0x08;
        const FILTER_RESET = 0x10;
        const ACQ_MIRROR_RESET = 0x20;
        const ACQ_DEVICE_RESET = 0x40;
    }
}

bitflags! {
    /// Fields a mutator has taken explicit control of.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Controlled: u16 {
        const DOME_TARGET = 0x001;
        const FOCUS_TARGET = 0x002;
        const APERTURE_SLOT = 0x004;
        const FILTER_SLOT = 0x008;
        const EHT = 0x010;
        const ACQ_MIRROR = 0x020;
        const INSTRUMENT_SHUTTER = 0x040;
        const DOME_FLOP = 0x080;
    }
}

/// Main shutter or dropout request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterAction {
    Open,
    Close,
    Stop,
}

/// Manual dome rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomeMove {
    Stop,
    Left,
    Right,
}

/// Manual focuser motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusMove {
    Stop,
    Out,
    In,
}

/// Acquisition mirror request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcqMirrorAction {
    /// Mirror in the beam, feeding the acquisition camera
    View,
    /// Mirror out of the beam, light to the photometer
    Measure,
    Reset,
}

/// Aperture or filter wheel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelAction {
    Goto(u8),
    Init,
    Reset,
}

/// Which wheel a [`WheelAction`] applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    Aperture,
    Filter,
}

/// Structured mirror of the command frame.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandBuffer {
    /// Dome target azimuth in tenths of a degree
    pub dome_target: u16,
    pub dome: DomeCommand,
    pub shutter: ShutterCommand,
    pub dropout: DropoutCommand,
    pub focus: FocusCommand,
    pub focus_target: i16,
    pub aperture: WheelCommand,
    pub aperture_slot: u8,
    pub filter: WheelCommand,
    pub filter_slot: u8,
    pub eht: EhtMode,
    pub acq_mirror: AcqMirrorCommand,
    pub misc: MiscCommand,
    pub dome_flop_min: u16,
    pub dome_flop_max: u16,
    #[serde(skip)]
    controlled: Controlled,
    #[serde(skip)]
    requested: OneShot,
}

impl CommandBuffer {
    /// Encode as a complete command frame, FCS and terminator included.
    pub fn encode(&self) -> [u8; COMMAND_LEN] {
        let mut frame = [b'0'; COMMAND_LEN];
        frame[..COMMAND_HEADER.len()].copy_from_slice(COMMAND_HEADER);
        frame[at::WORD_ADDRESS].copy_from_slice(COMMAND_WORD_ADDRESS);

        write_decimal(&mut frame[at::DOME_TARGET], ticks_from_azimuth(self.dome_target));
        let mut nibble = |offset: usize, bits: u8| write_hex(&mut frame[offset..=offset], bits.into());
        nibble(at::DOME, self.dome.bits());
        nibble(at::SHUTTER, self.shutter.bits());
        nibble(at::DROPOUT, self.dropout.bits());
        nibble(at::FOCUS, self.focus.bits());
        nibble(at::APERTURE, self.aperture.bits());
        nibble(at::FILTER, self.filter.bits());
        nibble(at::EHT, self.eht.code());
        nibble(at::ACQ_MIRROR, self.acq_mirror.bits());
        nibble(at::MISC, self.misc.bits());

        let (sign, magnitude) = focus_to_wire(self.focus_target);
        frame[at::FOCUS_SIGN] = sign;
        write_decimal(&mut frame[at::FOCUS_TARGET], magnitude);
        write_decimal(
            &mut frame[at::APERTURE_SLOT..=at::APERTURE_SLOT],
            self.aperture_slot.into(),
        );
        write_decimal(
            &mut frame[at::FILTER_SLOT..=at::FILTER_SLOT],
            self.filter_slot.into(),
        );
        write_decimal(&mut frame[at::DOME_FLOP_MIN], self.dome_flop_min.into());
        write_decimal(&mut frame[at::DOME_FLOP_MAX], self.dome_flop_max.into());

        frame[COMMAND_LEN - TERMINATOR.len()..].copy_from_slice(&TERMINATOR);
        update_fcs(&mut frame);
        frame
    }

    /// Validate and decode a command frame, as the controller would.
    pub fn decode(frame: &[u8]) -> ProtocolResult<Self> {
        validate_command(frame)?;
        let nibble = |offset: usize| read_hex(frame, offset, 1).map(|v| v as u8);
        let decimal = |range: std::ops::Range<usize>| read_decimal(frame, range.start, range.len());

        let magnitude = decimal(at::FOCUS_TARGET)?;
        let focus_target = focus_from_wire(frame[at::FOCUS_SIGN], magnitude, at::FOCUS_SIGN)?;

        Ok(Self {
            dome_target: azimuth_from_ticks(decimal(at::DOME_TARGET)?)?,
            dome: DomeCommand::from_bits_retain(nibble(at::DOME)?),
            shutter: ShutterCommand::from_bits_retain(nibble(at::SHUTTER)?),
            dropout: DropoutCommand::from_bits_retain(nibble(at::DROPOUT)?),
            focus: FocusCommand::from_bits_retain(nibble(at::FOCUS)?),
            focus_target,
            aperture: WheelCommand::from_bits_retain(nibble(at::APERTURE)?),
            aperture_slot: decimal(at::APERTURE_SLOT..at::APERTURE_SLOT + 1)? as u8,
            filter: WheelCommand::from_bits_retain(nibble(at::FILTER)?),
            filter_slot: decimal(at::FILTER_SLOT..at::FILTER_SLOT + 1)? as u8,
            eht: EhtMode::from_code(nibble(at::EHT)?)?,
            acq_mirror: AcqMirrorCommand::from_bits_retain(nibble(at::ACQ_MIRROR)?),
            misc: MiscCommand::from_bits_retain(nibble(at::MISC)?),
            dome_flop_min: decimal(at::DOME_FLOP_MIN)? as u16,
            dome_flop_max: decimal(at::DOME_FLOP_MAX)? as u16,
            controlled: Controlled::empty(),
            requested: OneShot::empty(),
        })
    }

    /// Copy hardware state into every field no mutator has taken control of.
    pub fn seed_from_status(&mut self, status: &StatusSnapshot) {
        let free = !self.controlled;

        if free.contains(Controlled::DOME_TARGET) {
            self.dome_target = status.dome_azimuth;
        }
        if free.contains(Controlled::FOCUS_TARGET) {
            self.focus_target = status.focus_position;
        }
        if free.contains(Controlled::APERTURE_SLOT) {
            self.aperture_slot = status.aperture_slot;
        }
        if free.contains(Controlled::FILTER_SLOT) {
            self.filter_slot = status.filter_slot;
        }
        if free.contains(Controlled::EHT) {
            self.eht = status.eht;
        }
        if free.contains(Controlled::ACQ_MIRROR) {
            self.acq_mirror.remove(AcqMirrorCommand::VIEW | AcqMirrorCommand::MEASURE);
            if status.acq_mirror.contains(AcqMirrorStatus::VIEW) {
                self.acq_mirror.insert(AcqMirrorCommand::VIEW);
            } else if status.acq_mirror.contains(AcqMirrorStatus::MEASURE) {
                self.acq_mirror.insert(AcqMirrorCommand::MEASURE);
            }
        }
        if free.contains(Controlled::INSTRUMENT_SHUTTER) {
            self.misc.set(
                MiscCommand::INSTRUMENT_SHUTTER_OPEN,
                status
                    .instrument_shutter
                    .contains(InstrumentShutterStatus::OPEN),
            );
        }
        if free.contains(Controlled::DOME_FLOP) {
            self.dome_flop_min = status.dome_flop_min;
            self.dome_flop_max = status.dome_flop_max;
        }
    }

    /// Clear shutter and dropout requests the controller reports as achieved.
    ///
    /// Returns `true` when the buffer changed and should be re-sent.
    pub fn confirm_from_status(&mut self, status: &StatusSnapshot) -> bool {
        let before = (self.shutter, self.dropout);

        if self.shutter.contains(ShutterCommand::OPEN) && status.shutter.contains(ShutterStatus::OPEN)
        {
            self.shutter.remove(ShutterCommand::OPEN);
        }
        if self.shutter.contains(ShutterCommand::CLOSE)
            && status.shutter.contains(ShutterStatus::CLOSED)
        {
            self.shutter.remove(ShutterCommand::CLOSE);
        }
        if self.dropout.contains(DropoutCommand::OPEN) && status.dropout.contains(DropoutStatus::OPEN)
        {
            self.dropout.remove(DropoutCommand::OPEN);
        }
        if self.dropout.contains(DropoutCommand::CLOSE)
            && status.dropout.contains(DropoutStatus::CLOSED)
        {
            self.dropout.remove(DropoutCommand::CLOSE);
        }

        before != (self.shutter, self.dropout)
    }

    /// One-shot bits currently set in the buffer.
    pub fn one_shots(&self) -> OneShot {
        let mut bits = OneShot::empty();
        bits.set(OneShot::FOCUS_RESET, self.focus.contains(FocusCommand::RESET));
        bits.set(OneShot::APERTURE_INIT, self.aperture.contains(WheelCommand::INIT));
        bits.set(OneShot::APERTURE_RESET, self.aperture.contains(WheelCommand::RESET));
        bits.set(OneShot::FILTER_INIT, self.filter.contains(WheelCommand::INIT));
        bits.set(OneShot::FILTER_RESET, self.filter.contains(WheelCommand::RESET));
        bits.set(
            OneShot::ACQ_MIRROR_RESET,
            self.acq_mirror.contains(AcqMirrorCommand::RESET),
        );
        bits.set(
            OneShot::ACQ_DEVICE_RESET,
            self.misc.contains(MiscCommand::ACQ_DEVICE_RESET),
        );
        bits
    }

    /// Clear the given one-shot bits.
    pub fn clear_one_shots(&mut self, bits: OneShot) {
        if bits.contains(OneShot::FOCUS_RESET) {
            self.focus.remove(FocusCommand::RESET);
        }
        if bits.contains(OneShot::APERTURE_INIT) {
            self.aperture.remove(WheelCommand::INIT);
        }
        if bits.contains(OneShot::APERTURE_RESET) {
            self.aperture.remove(WheelCommand::RESET);
        }
        if bits.contains(OneShot::FILTER_INIT) {
            self.filter.remove(WheelCommand::INIT);
        }
        if bits.contains(OneShot::FILTER_RESET) {
            self.filter.remove(WheelCommand::RESET);
        }
        if bits.contains(OneShot::ACQ_MIRROR_RESET) {
            self.acq_mirror.remove(AcqMirrorCommand::RESET);
        }
        if bits.contains(OneShot::ACQ_DEVICE_RESET) {
            self.misc.remove(MiscCommand::ACQ_DEVICE_RESET);
        }
    }

    /// One-shot bits requested by mutators since the last [`take_requested`](Self::take_requested).
    pub fn requested(&self) -> OneShot {
        self.requested
    }

    /// Return and forget the one-shot bits requested so far.
    pub fn take_requested(&mut self) -> OneShot {
        std::mem::take(&mut self.requested)
    }

    /// Fields under explicit control.
    pub fn controlled(&self) -> Controlled {
        self.controlled
    }

    fn request(&mut self, bits: OneShot) {
        self.requested |= bits;
    }

    // ==================== Mutators ====================

    /// Assert or drop the watchdog heartbeat bit.
    pub fn set_watchdog(&mut self, alive: bool) {
        self.misc.set(MiscCommand::WATCHDOG, alive);
    }

    /// Send the dome to an azimuth in tenths of a degree, optionally guiding.
    pub fn set_dome_target(&mut self, azimuth: u16, guide: bool) -> ProtocolResult<()> {
        check_range("dome_azimuth", azimuth.into(), 0, DOME_TICKS_MAX.into())?;
        self.dome_target = azimuth;
        self.dome.remove(DomeCommand::MOVE_LEFT | DomeCommand::MOVE_RIGHT);
        self.dome.insert(DomeCommand::GOTO);
        self.dome.set(DomeCommand::GUIDE, guide);
        self.controlled |= Controlled::DOME_TARGET;
        Ok(())
    }

    /// Rotate the dome by hand, or stop all dome motion.
    pub fn set_dome_move(&mut self, direction: DomeMove) {
        self.dome.remove(DomeCommand::MOVE_LEFT | DomeCommand::MOVE_RIGHT | DomeCommand::GOTO);
        match direction {
            DomeMove::Stop => self.dome.remove(DomeCommand::GUIDE),
            DomeMove::Left => self.dome.insert(DomeCommand::MOVE_LEFT),
            DomeMove::Right => self.dome.insert(DomeCommand::MOVE_RIGHT),
        }
    }

    /// Open, close or stop the main shutter.
    pub fn set_shutter(&mut self, action: ShutterAction) {
        self.shutter = match action {
            ShutterAction::Open => ShutterCommand::OPEN,
            ShutterAction::Close => ShutterCommand::CLOSE,
            ShutterAction::Stop => ShutterCommand::empty(),
        };
    }

    /// Open, close or stop the dropout.
    pub fn set_dropout(&mut self, action: ShutterAction) {
        self.dropout = match action {
            ShutterAction::Open => DropoutCommand::OPEN,
            ShutterAction::Close => DropoutCommand::CLOSE,
            ShutterAction::Stop => DropoutCommand::empty(),
        };
    }

    /// Drive the focuser to an absolute position.
    pub fn set_focus_goto(&mut self, position: i16) -> ProtocolResult<()> {
        check_range(
            "focus_position",
            position.into(),
            (-FOCUS_LIMIT).into(),
            FOCUS_LIMIT.into(),
        )?;
        self.focus_target = position;
        self.focus.remove(FocusCommand::MOVE_OUT | FocusCommand::MOVE_IN);
        self.focus.insert(FocusCommand::GOTO);
        self.controlled |= Controlled::FOCUS_TARGET;
        Ok(())
    }

    /// Move the focuser by hand, or stop it.
    pub fn set_focus_move(&mut self, direction: FocusMove) {
        self.focus.remove(FocusCommand::GOTO | FocusCommand::MOVE_OUT | FocusCommand::MOVE_IN);
        match direction {
            FocusMove::Stop => {}
            FocusMove::Out => self.focus.insert(FocusCommand::MOVE_OUT),
            FocusMove::In => self.focus.insert(FocusCommand::MOVE_IN),
        }
    }

    /// Reset the focuser controller.
    pub fn focus_reset(&mut self) {
        self.focus.insert(FocusCommand::RESET);
        self.request(OneShot::FOCUS_RESET);
    }

    /// Open or close the instrument shutter.
    pub fn set_instrument_shutter(&mut self, open: bool) {
        self.misc.set(MiscCommand::INSTRUMENT_SHUTTER_OPEN, open);
        self.controlled |= Controlled::INSTRUMENT_SHUTTER;
    }

    /// Move the acquisition mirror into or out of the beam, or reset it.
    pub fn set_acq_mirror(&mut self, action: AcqMirrorAction) {
        match action {
            AcqMirrorAction::View => {
                self.acq_mirror.remove(AcqMirrorCommand::MEASURE);
                self.acq_mirror.insert(AcqMirrorCommand::VIEW);
                self.controlled |= Controlled::ACQ_MIRROR;
            }
            AcqMirrorAction::Measure => {
                self.acq_mirror.remove(AcqMirrorCommand::VIEW);
                self.acq_mirror.insert(AcqMirrorCommand::MEASURE);
                self.controlled |= Controlled::ACQ_MIRROR;
            }
            AcqMirrorAction::Reset => {
                self.acq_mirror.insert(AcqMirrorCommand::RESET);
                self.request(OneShot::ACQ_MIRROR_RESET);
            }
        }
    }

    /// Set the photomultiplier high-voltage mode.
    pub fn set_eht(&mut self, mode: EhtMode) {
        self.eht = mode;
        self.controlled |= Controlled::EHT;
    }

    /// Send a wheel to a slot, or initialise/reset it.
    pub fn set_wheel(&mut self, wheel: Wheel, action: WheelAction) -> ProtocolResult<()> {
        if let WheelAction::Goto(slot) = action {
            check_range("wheel_slot", slot.into(), 0, WHEEL_SLOT_MAX.into())?;
        }
        let (bits, slot_field, controlled, init, reset) = match wheel {
            Wheel::Aperture => (
                &mut self.aperture,
                &mut self.aperture_slot,
                Controlled::APERTURE_SLOT,
                OneShot::APERTURE_INIT,
                OneShot::APERTURE_RESET,
            ),
            Wheel::Filter => (
                &mut self.filter,
                &mut self.filter_slot,
                Controlled::FILTER_SLOT,
                OneShot::FILTER_INIT,
                OneShot::FILTER_RESET,
            ),
        };
        match action {
            WheelAction::Goto(slot) => {
                *slot_field = slot;
                bits.insert(WheelCommand::GO);
                self.controlled |= controlled;
            }
            WheelAction::Init => {
                bits.insert(WheelCommand::INIT);
                self.requested |= init;
            }
            WheelAction::Reset => {
                bits.insert(WheelCommand::RESET);
                self.requested |= reset;
            }
        }
        Ok(())
    }

    /// Set the dome flop tuning constants.
    pub fn set_dome_flop(&mut self, min: u16, max: u16) -> ProtocolResult<()> {
        check_range("dome_flop_min", min.into(), 0, DOME_FLOP_MAX.into())?;
        check_range("dome_flop_max", max.into(), 0, DOME_FLOP_MAX.into())?;
        self.dome_flop_min = min;
        self.dome_flop_max = max;
        self.controlled |= Controlled::DOME_FLOP;
        Ok(())
    }

    /// Reset the acquisition device.
    pub fn acq_device_reset(&mut self) {
        self.misc.insert(MiscCommand::ACQ_DEVICE_RESET);
        self.request(OneShot::ACQ_DEVICE_RESET);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::fields::WheelStatus;

    fn status() -> StatusSnapshot {
        StatusSnapshot {
            dome_azimuth: 900,
            focus_position: -42,
            aperture_slot: 2,
            filter_slot: 5,
            eht: EhtMode::On,
            acq_mirror: AcqMirrorStatus::MEASURE,
            instrument_shutter: InstrumentShutterStatus::OPEN,
            dome_flop_min: 10,
            dome_flop_max: 30,
            aperture: WheelStatus::CENTERED,
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_layout() {
        let mut cmd = CommandBuffer::default();
        cmd.seed_from_status(&status());
        let frame = cmd.encode();
        assert_eq!(frame.len(), COMMAND_LEN);
        assert_eq!(&frame[..9], b"@00WD0100");
        // 3599 - 900 raw ticks
        assert_eq!(&frame[9..13], b"2699");
        assert_eq!(&frame[17..21], b"F042");
        assert_eq!(frame[22], b'2');
        assert_eq!(frame[24], b'5');
        assert_eq!(frame[25], b'2');
        assert_eq!(frame[26], b'2');
        assert_eq!(frame[27], b'1');
        assert_eq!(&frame[28..36], b"00100030");
        assert_eq!(&frame[55..], b"*\r");
        assert!(crate::check_fcs(&frame));
    }

    #[test]
    fn test_frame_round_trip() {
        let mut cmd = CommandBuffer::default();
        cmd.seed_from_status(&status());
        cmd.set_shutter(ShutterAction::Open);
        cmd.set_dropout(ShutterAction::Close);
        cmd.set_focus_goto(512).unwrap();
        cmd.set_wheel(Wheel::Filter, WheelAction::Goto(8)).unwrap();
        cmd.set_wheel(Wheel::Aperture, WheelAction::Reset).unwrap();
        cmd.set_watchdog(true);
        cmd.acq_device_reset();

        let frame = cmd.encode();
        let decoded = CommandBuffer::decode(&frame).unwrap();
        assert_eq!(decoded.encode(), frame);
        assert_eq!(decoded.focus_target, 512);
        assert_eq!(decoded.filter_slot, 8);
        assert!(decoded.misc.contains(MiscCommand::WATCHDOG | MiscCommand::ACQ_DEVICE_RESET));
    }

    #[test]
    fn test_seed_respects_explicit_control() {
        let mut cmd = CommandBuffer::default();
        cmd.set_eht(EhtMode::Off);
        cmd.set_instrument_shutter(false);
        cmd.set_wheel(Wheel::Aperture, WheelAction::Goto(7)).unwrap();

        cmd.seed_from_status(&status());

        assert_eq!(cmd.eht, EhtMode::Off);
        assert!(!cmd.misc.contains(MiscCommand::INSTRUMENT_SHUTTER_OPEN));
        assert_eq!(cmd.aperture_slot, 7);
        // Fields nobody touched follow the hardware
        assert_eq!(cmd.filter_slot, 5);
        assert_eq!(cmd.focus_target, -42);
        assert!(cmd.acq_mirror.contains(AcqMirrorCommand::MEASURE));
    }

    #[test]
    fn test_confirm_clears_achieved_shutter_open() {
        let mut cmd = CommandBuffer::default();
        cmd.set_shutter(ShutterAction::Open);
        cmd.set_dropout(ShutterAction::Close);

        let mut hw = StatusSnapshot::default();
        hw.shutter = ShutterStatus::MOVING;
        assert!(!cmd.confirm_from_status(&hw));

        hw.shutter = ShutterStatus::OPEN;
        assert!(cmd.confirm_from_status(&hw));
        assert!(cmd.shutter.is_empty());
        assert!(cmd.dropout.contains(DropoutCommand::CLOSE));

        hw.dropout = DropoutStatus::CLOSED;
        assert!(cmd.confirm_from_status(&hw));
        assert!(cmd.dropout.is_empty());
        assert!(!cmd.confirm_from_status(&hw));
    }

    #[test]
    fn test_one_shot_tracking() {
        let mut cmd = CommandBuffer::default();
        cmd.focus_reset();
        cmd.set_wheel(Wheel::Filter, WheelAction::Init).unwrap();
        cmd.set_acq_mirror(AcqMirrorAction::Reset);

        let expected = OneShot::FOCUS_RESET | OneShot::FILTER_INIT | OneShot::ACQ_MIRROR_RESET;
        assert_eq!(cmd.one_shots(), expected);
        assert_eq!(cmd.take_requested(), expected);
        assert!(cmd.requested().is_empty());

        cmd.clear_one_shots(OneShot::FOCUS_RESET | OneShot::FILTER_INIT);
        assert_eq!(cmd.one_shots(), OneShot::ACQ_MIRROR_RESET);
        assert!(!cmd.focus.contains(FocusCommand::RESET));
    }

    #[test]
    fn test_mutator_range_checks() {
        let mut cmd = CommandBuffer::default();
        assert!(matches!(
            cmd.set_dome_target(3600, false),
            Err(ProtocolError::OutOfRange { .. })
        ));
        assert!(cmd.set_focus_goto(-1000).is_err());
        assert!(cmd.set_wheel(Wheel::Aperture, WheelAction::Goto(10)).is_err());
        assert!(cmd.set_dome_flop(0, 10_000).is_err());
        // Nothing was applied
        assert_eq!(cmd, CommandBuffer::default());
    }

    #[test]
    fn test_dome_move_cancels_goto() {
        let mut cmd = CommandBuffer::default();
        cmd.set_dome_target(1800, true).unwrap();
        assert!(cmd.dome.contains(DomeCommand::GOTO | DomeCommand::GUIDE));
        cmd.set_dome_move(DomeMove::Left);
        assert_eq!(cmd.dome, DomeCommand::MOVE_LEFT | DomeCommand::GUIDE);
        cmd.set_dome_move(DomeMove::Stop);
        assert!(cmd.dome.is_empty());
    }

    #[test]
    fn test_decode_rejects_ack() {
        let ack = crate::frame::command_ack(0);
        assert!(CommandBuffer::decode(&ack).is_err());
    }
}
