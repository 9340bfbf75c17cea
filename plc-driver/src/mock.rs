//! Simulated controller for tests and bench work without hardware.
//!
//! `MockPlc` answers status requests and commands the way the real controller
//! does, applying commanded motion instantly. Replies are written into the
//! raw byte channel in small chunks so the frame assembler sees realistic
//! fragmentation. Switches let tests silence the controller or corrupt its
//! replies.

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use plc_protocol::frame::{validate_request, RequestKind};
use plc_protocol::{
    command_ack, AcqMirrorCommand, AcqMirrorStatus, CommandBuffer, DomeCommand, DomeStatus,
    DropoutCommand, DropoutStatus, FocusCommand, FocusStatus, InstrumentShutterStatus,
    MiscCommand, ShutterCommand, ShutterStatus, StatusSnapshot, WheelCommand, WheelStatus,
};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::TransportError;
use crate::transport::Transport;

/// Default reply chunk size.
const REPLY_CHUNK: usize = 16;

#[derive(Debug, Default)]
struct MockState {
    status: StatusSnapshot,
    commands: Vec<CommandBuffer>,
    status_requests: usize,
    silent: bool,
    corrupt: bool,
    chunk: usize,
}

/// Shared handle to a simulated controller.
#[derive(Debug, Clone)]
pub struct MockPlc {
    inner: Arc<Mutex<MockState>>,
}

impl Default for MockPlc {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlc {
    pub fn new() -> Self {
        Self::with_status(StatusSnapshot::default())
    }

    /// Simulated controller starting from the given hardware state.
    pub fn with_status(status: StatusSnapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                status,
                chunk: REPLY_CHUNK,
                ..Default::default()
            })),
        }
    }

    /// Create a transport wired to this controller and the raw byte stream it replies on.
    pub fn connect(&self) -> (MockTransport, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            MockTransport {
                plc: self.clone(),
                replies: tx,
            },
            rx,
        )
    }

    /// Stop answering.
    pub fn set_silent(&self, silent: bool) {
        self.lock().silent = silent;
    }

    /// Send replies with a broken checksum.
    pub fn set_corrupt(&self, corrupt: bool) {
        self.lock().corrupt = corrupt;
    }

    /// Split replies into chunks of this many bytes.
    pub fn set_chunk_size(&self, chunk: usize) {
        self.lock().chunk = chunk.max(1);
    }

    pub fn set_handset(&self, handset: u8) {
        self.lock().status.handset = handset;
    }

    /// Change the simulated hardware state.
    pub fn update_status(&self, f: impl FnOnce(&mut StatusSnapshot)) {
        f(&mut self.lock().status);
    }

    pub fn status(&self) -> StatusSnapshot {
        self.lock().status.clone()
    }

    /// Every command received so far, decoded.
    pub fn commands(&self) -> Vec<CommandBuffer> {
        self.lock().commands.clone()
    }

    pub fn last_command(&self) -> Option<CommandBuffer> {
        self.lock().commands.last().cloned()
    }

    pub fn status_requests(&self) -> usize {
        self.lock().status_requests
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Process one host frame; returns the reply, if any.
    fn handle(&self, frame: &[u8]) -> Option<Vec<u8>> {
        let mut state = self.lock();
        let reply = match validate_request(frame) {
            Ok(RequestKind::StatusRequest) => {
                state.status_requests += 1;
                state.status.encode().to_vec()
            }
            Ok(RequestKind::Command) => match CommandBuffer::decode(frame) {
                Ok(cmd) => {
                    trace!("Mock PLC command {:?}", cmd);
                    apply_command(&mut state.status, &cmd);
                    state.commands.push(cmd);
                    command_ack(0).to_vec()
                }
                Err(e) => {
                    warn!("Mock PLC rejected command: {}", e);
                    return None;
                }
            },
            Err(e) => {
                warn!("Mock PLC rejected frame: {}", e);
                return None;
            }
        };

        if state.silent {
            debug!("Mock PLC silent, dropping reply");
            return None;
        }
        let mut reply = reply;
        if state.corrupt {
            let at = reply.len() - 4;
            reply[at] = if reply[at] == b'0' { b'1' } else { b'0' };
        }
        Some(reply)
    }

    fn chunk_size(&self) -> usize {
        self.lock().chunk
    }
}

/// Controller behaviour: commanded states take effect immediately.
fn apply_command(status: &mut StatusSnapshot, cmd: &CommandBuffer) {
    if cmd.dome.contains(DomeCommand::GOTO) {
        status.dome_azimuth = cmd.dome_target;
    }
    status.dome = DomeStatus::empty();
    let dome = cmd.dome;
    status.dome.set(DomeStatus::MOVING_LEFT, dome.contains(DomeCommand::MOVE_LEFT));
    status.dome.set(DomeStatus::MOVING_RIGHT, dome.contains(DomeCommand::MOVE_RIGHT));
    status.dome.set(DomeStatus::GUIDING, dome.contains(DomeCommand::GUIDE));

    if cmd.shutter.contains(ShutterCommand::OPEN) {
        status.shutter = ShutterStatus::OPEN;
    } else if cmd.shutter.contains(ShutterCommand::CLOSE) {
        status.shutter = ShutterStatus::CLOSED;
    }
    if cmd.dropout.contains(DropoutCommand::OPEN) {
        status.dropout = DropoutStatus::OPEN;
    } else if cmd.dropout.contains(DropoutCommand::CLOSE) {
        status.dropout = DropoutStatus::CLOSED;
    }

    if cmd.focus.contains(FocusCommand::RESET) {
        status.focus = FocusStatus::INIT;
    }
    if cmd.focus.contains(FocusCommand::GOTO) {
        status.focus_position = cmd.focus_target;
        status.focus.remove(FocusStatus::MOVING);
    } else if cmd.focus.intersects(FocusCommand::MOVE_OUT | FocusCommand::MOVE_IN) {
        status.focus.insert(FocusStatus::MOVING);
    } else {
        status.focus.remove(FocusStatus::MOVING);
    }

    apply_wheel(
        &mut status.aperture,
        &mut status.aperture_slot,
        cmd.aperture,
        cmd.aperture_slot,
    );
    apply_wheel(
        &mut status.filter,
        &mut status.filter_slot,
        cmd.filter,
        cmd.filter_slot,
    );

    if cmd.acq_mirror.contains(AcqMirrorCommand::VIEW) {
        status.acq_mirror = AcqMirrorStatus::VIEW;
    } else if cmd.acq_mirror.contains(AcqMirrorCommand::MEASURE) {
        status.acq_mirror = AcqMirrorStatus::MEASURE;
    }

    status.eht = cmd.eht;
    status.instrument_shutter.set(
        InstrumentShutterStatus::OPEN,
        cmd.misc.contains(MiscCommand::INSTRUMENT_SHUTTER_OPEN),
    );
    status.dome_flop_min = cmd.dome_flop_min;
    status.dome_flop_max = cmd.dome_flop_max;
}

fn apply_wheel(status: &mut WheelStatus, slot: &mut u8, cmd: WheelCommand, target: u8) {
    if cmd.intersects(WheelCommand::INIT | WheelCommand::RESET) {
        *status = WheelStatus::INIT | WheelStatus::CENTERED;
    }
    if cmd.contains(WheelCommand::GO) {
        *slot = target;
        status.insert(WheelStatus::CENTERED);
    }
}

/// Transport half of a [`MockPlc`]; replies arrive on the paired receiver.
#[derive(Debug)]
pub struct MockTransport {
    plc: MockPlc,
    replies: mpsc::UnboundedSender<Bytes>,
}

impl Transport for MockTransport {
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let Some(reply) = self.plc.handle(bytes) else {
            return Ok(());
        };
        for chunk in reply.chunks(self.plc.chunk_size()) {
            self.replies
                .send(Bytes::copy_from_slice(chunk))
                .map_err(|_| {
                    TransportError::Io(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "mock reply channel closed",
                    ))
                })?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plc_protocol::{status_request, EhtMode, FrameAssembler, ShutterAction};

    fn drain(rx: &mut mpsc::UnboundedReceiver<Bytes>) -> Vec<Vec<u8>> {
        let mut assembler = FrameAssembler::new();
        let mut frames = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            assembler.push(&chunk, |f| frames.push(f.to_vec()));
        }
        frames
    }

    #[test]
    fn test_answers_status_request() {
        let plc = MockPlc::with_status(StatusSnapshot {
            dome_azimuth: 1234,
            ..Default::default()
        });
        let (mut transport, mut rx) = plc.connect();
        transport.transmit(&status_request()).unwrap();

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        let status = StatusSnapshot::decode(&frames[0]).unwrap();
        assert_eq!(status.dome_azimuth, 1234);
        assert_eq!(plc.status_requests(), 1);
    }

    #[test]
    fn test_command_applied_and_acked() {
        let plc = MockPlc::new();
        let (mut transport, mut rx) = plc.connect();
        let mut cmd = CommandBuffer::default();
        cmd.set_shutter(ShutterAction::Open);
        cmd.set_eht(EhtMode::Standby);
        transport.transmit(&cmd.encode()).unwrap();

        let frames = drain(&mut rx);
        assert_eq!(frames, vec![command_ack(0)[..10].to_vec()]);
        assert_eq!(plc.status().shutter, ShutterStatus::OPEN);
        assert_eq!(plc.status().eht, EhtMode::Standby);
        assert_eq!(plc.last_command().map(|c| c.encode()), Some(cmd.encode()));
    }

    #[test]
    fn test_silent_and_corrupt() {
        let plc = MockPlc::new();
        let (mut transport, mut rx) = plc.connect();

        plc.set_silent(true);
        transport.transmit(&status_request()).unwrap();
        assert!(drain(&mut rx).is_empty());

        plc.set_silent(false);
        plc.set_corrupt(true);
        transport.transmit(&status_request()).unwrap();
        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert!(StatusSnapshot::decode(&frames[0]).is_err());
    }

    #[test]
    fn test_replies_are_fragmented() {
        let plc = MockPlc::new();
        plc.set_chunk_size(5);
        let (mut transport, mut rx) = plc.connect();
        transport.transmit(&status_request()).unwrap();

        let mut chunks = 0;
        let mut assembler = FrameAssembler::new();
        let mut frames = 0;
        while let Ok(chunk) = rx.try_recv() {
            assert!(chunk.len() <= 5);
            chunks += 1;
            frames += assembler.push(&chunk, |_| {});
        }
        assert_eq!(chunks, 16);
        assert_eq!(frames, 1);
    }

    #[test]
    fn test_garbage_ignored() {
        let plc = MockPlc::new();
        let (mut transport, mut rx) = plc.connect();
        transport.transmit(b"@00XX*\r").unwrap();
        assert!(drain(&mut rx).is_empty());
        assert!(plc.commands().is_empty());
    }
}
