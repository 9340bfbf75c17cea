//! Protocol session state machine.
//!
//! The session alternates status polls and command issuance with at most one
//! request outstanding. It performs no I/O: every input (a frame, a timer
//! expiry, a command request, a transmit failure) returns the list of
//! [`Action`]s the caller must carry out, in order. The driver task executes
//! them against the line discipline and its timers; tests inspect them
//! directly.
//!
//! ```text
//!                 open
//!                  |  status request
//!                  v
//!       +--AwaitInitialStatus--+ timeout: resend request
//!       |  valid status        |
//!       v                      |
//!  AwaitCommandAck <--------+  |
//!       |  ack / failure    |  |
//!       v                   |  |
//!      Idle ---- command ---+  |
//!       |  poll timer          |
//!       v                      |
//!  AwaitStatus --status/failure--> Idle (or AwaitCommandAck if pending)
//! ```

use std::time::Duration;

use plc_protocol::{
    status_request, validate, CommandBuffer, FrameKind, OneShot, ProtocolResult, StatusField,
    StatusSnapshot,
};
use strum::Display;
use tracing::{debug, info, trace, warn};

use crate::config::TimingConfig;
use crate::error::TransportError;

/// Exchange state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    Idle,
    AwaitInitialStatus,
    AwaitStatus,
    AwaitCommandAck,
    Closed,
}

impl SessionState {
    /// Whether a request is outstanding.
    pub fn is_awaiting(self) -> bool {
        matches!(
            self,
            SessionState::AwaitInitialStatus
                | SessionState::AwaitStatus
                | SessionState::AwaitCommandAck
        )
    }
}

/// The three cancellable session timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Timer {
    /// Armed with every request; expiry aborts the exchange
    Response,
    /// Periodic status poll
    StatusPoll,
    /// Periodic unconditional command re-send
    Heartbeat,
}

impl Timer {
    pub const ALL: [Timer; 3] = [Timer::Response, Timer::StatusPoll, Timer::Heartbeat];

    pub fn index(self) -> usize {
        match self {
            Timer::Response => 0,
            Timer::StatusPoll => 1,
            Timer::Heartbeat => 2,
        }
    }
}

/// Notifications for consumers of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A valid status frame was applied.
    StatusUpdated,
    /// The comms-OK flag flipped to the given value.
    CommsChanged(bool),
    /// The raw handset byte changed.
    HandsetChanged { old: u8, new: u8 },
}

/// Side effect requested by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write a frame to the transport.
    Transmit(Vec<u8>),
    /// (Re)start a timer; an armed timer's previous deadline is replaced.
    Arm(Timer, Duration),
    /// Stop a timer if armed.
    Cancel(Timer),
    Notify(SessionEvent),
}

/// One protocol session against one controller.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    command_pending: bool,
    comms_ok: bool,
    /// One-shot bits carried by the command awaiting acknowledgement
    in_flight: OneShot,
    status: StatusSnapshot,
    /// Last applied status frame, for field-level change detection
    raw_status: Vec<u8>,
    command: CommandBuffer,
    timing: TimingConfig,
    actions: Vec<Action>,
}

impl Session {
    /// Open a session: request the initial status.
    pub fn open(timing: TimingConfig) -> (Self, Vec<Action>) {
        let mut session = Self {
            state: SessionState::AwaitInitialStatus,
            command_pending: false,
            comms_ok: false,
            in_flight: OneShot::empty(),
            status: StatusSnapshot::default(),
            raw_status: Vec::new(),
            command: CommandBuffer::default(),
            timing,
            actions: Vec::new(),
        };
        info!("Opening PLC session");
        session.send_status_request();
        session.state = SessionState::AwaitInitialStatus;
        let actions = session.take_actions();
        (session, actions)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> &StatusSnapshot {
        &self.status
    }

    pub fn command(&self) -> &CommandBuffer {
        &self.command
    }

    pub fn comms_ok(&self) -> bool {
        self.comms_ok
    }

    pub fn command_pending(&self) -> bool {
        self.command_pending
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Handle one complete inbound frame.
    pub fn on_frame(&mut self, frame: &[u8]) -> Vec<Action> {
        trace!("RX in {}: {:?}", self.state, String::from_utf8_lossy(frame));
        match self.state {
            SessionState::AwaitInitialStatus => self.initial_status(frame),
            SessionState::AwaitStatus => self.status_response(frame),
            SessionState::AwaitCommandAck => self.command_ack(frame),
            SessionState::Idle | SessionState::Closed => {
                debug!("Ignoring unsolicited frame in {}", self.state);
            }
        }
        self.take_actions()
    }

    /// Handle a timer expiry.
    pub fn on_timer(&mut self, timer: Timer) -> Vec<Action> {
        match (timer, self.state) {
            (_, SessionState::Closed) => {}
            (Timer::Response, SessionState::AwaitInitialStatus) => {
                warn!("No initial status from PLC, retrying");
                self.send_status_request();
                self.state = SessionState::AwaitInitialStatus;
            }
            (Timer::Response, SessionState::AwaitStatus | SessionState::AwaitCommandAck) => {
                self.fail_exchange("response timeout");
            }
            (Timer::Response, SessionState::Idle) => {
                trace!("Stale response timer");
            }
            (Timer::StatusPoll, state) => {
                self.arm(Timer::StatusPoll, self.timing.status_poll());
                if state == SessionState::Idle {
                    self.send_status_request();
                }
            }
            (Timer::Heartbeat, _) => {
                self.arm(Timer::Heartbeat, self.timing.heartbeat());
                self.issue_command();
            }
        }
        self.take_actions()
    }

    /// Apply a mutation to the command buffer and issue it.
    ///
    /// A failed mutation leaves the buffer unchanged and issues nothing.
    pub fn update_command<F>(&mut self, apply: F) -> ProtocolResult<Vec<Action>>
    where
        F: FnOnce(&mut CommandBuffer) -> ProtocolResult<()>,
    {
        let mut next = self.command.clone();
        apply(&mut next)?;
        self.command = next;
        self.issue_command();
        Ok(self.take_actions())
    }

    /// Handle a failed transmit of the frame from the last `Transmit` action.
    pub fn on_transmit_error(&mut self, err: &TransportError) -> Vec<Action> {
        match self.state {
            SessionState::AwaitStatus | SessionState::AwaitCommandAck => {
                self.fail_exchange(&format!("transmit failed: {err}"));
            }
            SessionState::AwaitInitialStatus => {
                // The response timer is armed and resends the request
                warn!("Initial status request not sent: {}", err);
            }
            SessionState::Idle | SessionState::Closed => {}
        }
        self.take_actions()
    }

    /// Close the session: cancel every timer and abandon any outstanding exchange.
    pub fn close(&mut self) -> Vec<Action> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }
        if self.state.is_awaiting() {
            debug!("Abandoning outstanding exchange in {}", self.state);
        }
        for timer in Timer::ALL {
            self.actions.push(Action::Cancel(timer));
        }
        self.state = SessionState::Closed;
        self.command_pending = false;
        info!("PLC session closed");
        self.take_actions()
    }

    // ==================== Transitions ====================

    fn initial_status(&mut self, frame: &[u8]) {
        let status = match StatusSnapshot::decode(frame) {
            Ok(status) => status,
            Err(e) => {
                warn!("Rejected initial status frame: {}", e);
                return;
            }
        };
        self.actions.push(Action::Cancel(Timer::Response));
        self.status = status;
        self.raw_status = frame.to_vec();
        self.command.seed_from_status(&self.status);
        info!(
            "Initial PLC status: dome {:.1} deg, shutter {:?}",
            self.status.azimuth_degrees(),
            self.status.shutter
        );
        self.notify(SessionEvent::StatusUpdated);
        self.arm(Timer::StatusPoll, self.timing.status_poll());
        self.arm(Timer::Heartbeat, self.timing.heartbeat());
        self.send_command();
    }

    fn status_response(&mut self, frame: &[u8]) {
        let old_handset = self.status.handset;
        let changed = match self.status.apply_changes(&self.raw_status, frame) {
            Ok(changed) => changed,
            Err(e) => {
                self.fail_exchange(&format!("invalid status frame: {e}"));
                return;
            }
        };
        self.actions.push(Action::Cancel(Timer::Response));
        self.raw_status = frame.to_vec();
        if !changed.is_empty() {
            debug!("Status fields changed: {:?}", changed);
        }

        if changed.contains(&StatusField::Handset) {
            self.notify(SessionEvent::HandsetChanged {
                old: old_handset,
                new: self.status.handset,
            });
        }
        if self.command.confirm_from_status(&self.status) {
            debug!("Shutter request confirmed by status, re-sending command");
            self.command_pending = true;
        }
        self.notify(SessionEvent::StatusUpdated);
        self.arm(Timer::StatusPoll, self.timing.status_poll());
        self.resolve();
    }

    fn command_ack(&mut self, frame: &[u8]) {
        if let Err(e) = validate(frame, FrameKind::CommandAck) {
            self.fail_exchange(&format!("invalid command ack: {e}"));
            return;
        }
        self.actions.push(Action::Cancel(Timer::Response));

        let repeated = self.command.requested();
        let acknowledged = self.in_flight & !repeated;
        if !acknowledged.is_empty() {
            debug!("Clearing acknowledged one-shot bits {:?}", acknowledged);
        }
        self.command.clear_one_shots(acknowledged);
        self.in_flight = OneShot::empty();

        self.set_comms(true);
        self.arm(Timer::Heartbeat, self.timing.heartbeat());
        self.resolve();
    }

    /// Abort the outstanding exchange.
    fn fail_exchange(&mut self, reason: &str) {
        warn!("PLC exchange failed in {}: {}", self.state, reason);
        self.actions.push(Action::Cancel(Timer::Response));
        self.in_flight = OneShot::empty();
        self.set_comms(false);
        self.resolve();
    }

    /// Finish an exchange: flush a deferred command or go idle.
    fn resolve(&mut self) {
        if self.command_pending {
            self.send_command();
        } else {
            self.state = SessionState::Idle;
        }
    }

    fn issue_command(&mut self) {
        match self.state {
            SessionState::Idle => self.send_command(),
            SessionState::AwaitInitialStatus
            | SessionState::AwaitStatus
            | SessionState::AwaitCommandAck => {
                trace!("Command deferred while in {}", self.state);
                self.command_pending = true;
            }
            SessionState::Closed => {}
        }
    }

    fn send_command(&mut self) {
        self.in_flight = self.command.one_shots();
        self.command.take_requested();
        self.command_pending = false;
        let frame = self.command.encode();
        debug!(
            "Sending command {:?}",
            String::from_utf8_lossy(&frame[..frame.len() - 1])
        );
        self.arm(Timer::Response, self.timing.response_timeout());
        self.actions.push(Action::Transmit(frame.to_vec()));
        self.state = SessionState::AwaitCommandAck;
    }

    fn send_status_request(&mut self) {
        self.arm(Timer::Response, self.timing.response_timeout());
        self.actions.push(Action::Transmit(status_request().to_vec()));
        self.state = SessionState::AwaitStatus;
    }

    fn set_comms(&mut self, ok: bool) {
        if self.comms_ok != ok {
            if ok {
                info!("PLC communications OK");
            } else {
                warn!("PLC communications lost");
            }
            self.comms_ok = ok;
            self.notify(SessionEvent::CommsChanged(ok));
        }
    }

    fn arm(&mut self, timer: Timer, period: Duration) {
        self.actions.push(Action::Arm(timer, period));
    }

    fn notify(&mut self, event: SessionEvent) {
        self.actions.push(Action::Notify(event));
    }

    fn take_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plc_protocol::{
        command_ack, AcqMirrorAction, DropoutCommand, EhtMode, MiscCommand,
        ShutterAction, ShutterCommand, ShutterStatus, Wheel, WheelAction,
    };

    fn transmitted(actions: &[Action]) -> Vec<Vec<u8>> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Transmit(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    fn events(actions: &[Action]) -> Vec<SessionEvent> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Notify(e) => Some(*e),
                _ => None,
            })
            .collect()
    }

    fn is_command(frame: &[u8]) -> bool {
        frame.starts_with(b"@00WD0100")
    }

    fn ack() -> Vec<u8> {
        let frame = command_ack(0);
        frame[..frame.len() - 1].to_vec()
    }

    fn status_frame(status: &StatusSnapshot) -> Vec<u8> {
        status.encode().to_vec()
    }

    /// Session that has received its initial status and had the first command acked.
    fn running() -> Session {
        let (mut session, _) = Session::open(TimingConfig::default());
        session.on_frame(&status_frame(&StatusSnapshot::default()));
        session.on_frame(&ack());
        assert_eq!(session.state(), SessionState::Idle);
        session
    }

    #[test]
    fn test_open_requests_status() {
        let (session, actions) = Session::open(TimingConfig::default());
        assert_eq!(session.state(), SessionState::AwaitInitialStatus);
        assert_eq!(
            actions,
            vec![
                Action::Arm(Timer::Response, Duration::from_secs(5)),
                Action::Transmit(status_request().to_vec()),
            ]
        );
    }

    #[test]
    fn test_initial_status_seeds_and_sends_command() {
        let (mut session, _) = Session::open(TimingConfig::default());
        let hw = StatusSnapshot {
            eht: EhtMode::Standby,
            filter_slot: 4,
            ..Default::default()
        };
        let actions = session.on_frame(&status_frame(&hw));

        assert_eq!(actions[0], Action::Cancel(Timer::Response));
        assert_eq!(events(&actions), vec![SessionEvent::StatusUpdated]);
        assert!(actions.contains(&Action::Arm(Timer::StatusPoll, Duration::from_millis(200))));
        assert!(actions.contains(&Action::Arm(Timer::Heartbeat, Duration::from_secs(60))));

        let sent = transmitted(&actions);
        assert_eq!(sent.len(), 1);
        let cmd = CommandBuffer::decode(&sent[0]).unwrap();
        assert_eq!(cmd.eht, EhtMode::Standby);
        assert_eq!(cmd.filter_slot, 4);
        assert_eq!(session.state(), SessionState::AwaitCommandAck);
        assert!(!session.comms_ok());
    }

    #[test]
    fn test_invalid_initial_status_ignored() {
        let (mut session, _) = Session::open(TimingConfig::default());
        let mut frame = status_frame(&StatusSnapshot::default());
        frame[12] = b'7';
        assert!(session.on_frame(&frame).is_empty());
        assert_eq!(session.state(), SessionState::AwaitInitialStatus);
    }

    #[test]
    fn test_initial_timeout_resends_request() {
        let (mut session, _) = Session::open(TimingConfig::default());
        let actions = session.on_timer(Timer::Response);
        assert_eq!(transmitted(&actions), vec![status_request().to_vec()]);
        assert_eq!(session.state(), SessionState::AwaitInitialStatus);
        assert!(events(&actions).is_empty());
    }

    #[test]
    fn test_first_ack_sets_comms_ok_once() {
        let (mut session, _) = Session::open(TimingConfig::default());
        session.on_frame(&status_frame(&StatusSnapshot::default()));
        let actions = session.on_frame(&ack());
        assert_eq!(events(&actions), vec![SessionEvent::CommsChanged(true)]);
        assert!(session.comms_ok());

        // Second ack does not notify again
        session.update_command(|c| {
            c.set_watchdog(true);
            Ok(())
        })
        .unwrap();
        let actions = session.on_frame(&ack());
        assert!(events(&actions).is_empty());
    }

    #[test]
    fn test_poll_only_when_idle() {
        let mut session = running();
        let actions = session.on_timer(Timer::StatusPoll);
        assert_eq!(transmitted(&actions), vec![status_request().to_vec()]);
        assert_eq!(session.state(), SessionState::AwaitStatus);

        let actions = session.on_timer(Timer::StatusPoll);
        assert!(transmitted(&actions).is_empty());
        assert_eq!(
            actions,
            vec![Action::Arm(Timer::StatusPoll, Duration::from_millis(200))]
        );
    }

    #[test]
    fn test_command_mid_exchange_sent_once_after_resolve() {
        let mut session = running();
        session.on_timer(Timer::StatusPoll);

        let actions = session
            .update_command(|c| {
                c.set_shutter(ShutterAction::Open);
                Ok(())
            })
            .unwrap();
        assert!(transmitted(&actions).is_empty());
        assert!(session.command_pending());

        // A second request while still outstanding coalesces
        session
            .update_command(|c| {
                c.set_dropout(ShutterAction::Close);
                Ok(())
            })
            .unwrap();

        let actions = session.on_frame(&status_frame(&StatusSnapshot::default()));
        let sent = transmitted(&actions);
        assert_eq!(sent.len(), 1);
        assert!(is_command(&sent[0]));
        let cmd = CommandBuffer::decode(&sent[0]).unwrap();
        assert_eq!(cmd.shutter, ShutterCommand::OPEN);
        assert_eq!(cmd.dropout, DropoutCommand::CLOSE);
        assert!(!session.command_pending());
        assert_eq!(session.state(), SessionState::AwaitCommandAck);
    }

    #[test]
    fn test_pending_command_flushed_after_timeout() {
        let mut session = running();
        session.on_timer(Timer::StatusPoll);
        session.update_command(|c| c.set_focus_goto(100)).unwrap();

        let actions = session.on_timer(Timer::Response);
        let sent = transmitted(&actions);
        assert_eq!(sent.len(), 1);
        assert!(is_command(&sent[0]));
        assert_eq!(events(&actions), vec![SessionEvent::CommsChanged(false)]);
    }

    #[test]
    fn test_at_most_one_request_outstanding() {
        let mut session = running();
        let mut outstanding = 0;
        let inputs: Vec<Box<dyn Fn(&mut Session) -> Vec<Action>>> = vec![
            Box::new(|s: &mut Session| s.on_timer(Timer::StatusPoll)),
            Box::new(|s: &mut Session| s.on_timer(Timer::Heartbeat)),
            Box::new(|s: &mut Session| {
                s.update_command(|c| c.set_dome_target(100, false)).unwrap()
            }),
            Box::new(|s: &mut Session| s.on_timer(Timer::StatusPoll)),
        ];
        for input in &inputs {
            outstanding += transmitted(&input(&mut session)).len();
            assert!(outstanding <= 1);
        }
    }

    #[test]
    fn test_timeout_flips_comms_once() {
        let mut session = running();
        assert!(session.comms_ok());

        session.on_timer(Timer::StatusPoll);
        let actions = session.on_timer(Timer::Response);
        assert_eq!(events(&actions), vec![SessionEvent::CommsChanged(false)]);
        assert_eq!(session.state(), SessionState::Idle);

        session.on_timer(Timer::StatusPoll);
        let actions = session.on_timer(Timer::Response);
        assert!(events(&actions).is_empty());
        assert!(!session.comms_ok());
    }

    #[test]
    fn test_bad_checksum_status_fails_exchange_without_applying() {
        let mut session = running();
        session.on_timer(Timer::StatusPoll);
        let mut hw = StatusSnapshot::default();
        hw.filter_slot = 6;
        let mut frame = status_frame(&hw);
        frame[75] = if frame[75] == b'0' { b'1' } else { b'0' };

        let actions = session.on_frame(&frame);
        assert_eq!(events(&actions), vec![SessionEvent::CommsChanged(false)]);
        assert_eq!(session.status().filter_slot, 0);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_nonzero_end_code_ack_rejected() {
        let mut session = running();
        session.on_timer(Timer::Heartbeat);
        let bad = command_ack(0x10);
        let actions = session.on_frame(&bad[..bad.len() - 1]);
        assert_eq!(events(&actions), vec![SessionEvent::CommsChanged(false)]);
    }

    #[test]
    fn test_shutter_open_auto_cleared_and_resent() {
        let mut session = running();
        session
            .update_command(|c| {
                c.set_shutter(ShutterAction::Open);
                Ok(())
            })
            .unwrap();
        session.on_frame(&ack());

        session.on_timer(Timer::StatusPoll);
        let hw = StatusSnapshot {
            shutter: ShutterStatus::OPEN,
            ..Default::default()
        };
        let actions = session.on_frame(&status_frame(&hw));
        let sent = transmitted(&actions);
        assert_eq!(sent.len(), 1);
        let cmd = CommandBuffer::decode(&sent[0]).unwrap();
        assert!(!cmd.shutter.contains(ShutterCommand::OPEN));
    }

    #[test]
    fn test_one_shot_cleared_on_ack() {
        let mut session = running();
        let actions = session
            .update_command(|c| {
                c.acq_device_reset();
                Ok(())
            })
            .unwrap();
        let sent = CommandBuffer::decode(&transmitted(&actions)[0]).unwrap();
        assert!(sent.misc.contains(MiscCommand::ACQ_DEVICE_RESET));

        session.on_frame(&ack());
        assert!(!session
            .command()
            .misc
            .contains(MiscCommand::ACQ_DEVICE_RESET));
    }

    #[test]
    fn test_one_shot_repeated_in_flight_survives_ack() {
        let mut session = running();
        session
            .update_command(|c| c.set_wheel(Wheel::Filter, WheelAction::Reset))
            .unwrap();
        // Requested again before the ack arrives
        session
            .update_command(|c| c.set_wheel(Wheel::Filter, WheelAction::Reset))
            .unwrap();

        let actions = session.on_frame(&ack());
        assert!(session.command().one_shots().contains(OneShot::FILTER_RESET));
        let sent = transmitted(&actions);
        assert_eq!(sent.len(), 1);

        session.on_frame(&ack());
        assert!(session.command().one_shots().is_empty());
    }

    #[test]
    fn test_handset_change_notified() {
        let mut session = running();
        session.on_timer(Timer::StatusPoll);
        let hw = StatusSnapshot {
            handset: 0x14,
            ..Default::default()
        };
        let actions = session.on_frame(&status_frame(&hw));
        assert!(events(&actions).contains(&SessionEvent::HandsetChanged { old: 0, new: 0x14 }));

        session.on_timer(Timer::StatusPoll);
        let actions = session.on_frame(&status_frame(&hw));
        assert_eq!(events(&actions), vec![SessionEvent::StatusUpdated]);
    }

    #[test]
    fn test_rejected_mutation_issues_nothing() {
        let mut session = running();
        let before = session.command().clone();
        assert!(session.update_command(|c| c.set_focus_goto(2000)).is_err());
        assert_eq!(session.command(), &before);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_command_before_initial_status_survives_seeding() {
        let (mut session, _) = Session::open(TimingConfig::default());
        session
            .update_command(|c| {
                c.set_acq_mirror(AcqMirrorAction::Measure);
                c.set_eht(EhtMode::On);
                Ok(())
            })
            .unwrap();
        assert!(session.command_pending());

        let actions = session.on_frame(&status_frame(&StatusSnapshot::default()));
        let sent = transmitted(&actions);
        assert_eq!(sent.len(), 1);
        let cmd = CommandBuffer::decode(&sent[0]).unwrap();
        assert_eq!(cmd.eht, EhtMode::On);
        assert!(!session.command_pending());
    }

    #[test]
    fn test_transmit_error_fails_exchange() {
        let mut session = running();
        session.on_timer(Timer::StatusPoll);
        let actions = session.on_transmit_error(&TransportError::NotBound);
        assert_eq!(events(&actions), vec![SessionEvent::CommsChanged(false)]);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_close_cancels_timers_and_goes_inert() {
        let mut session = running();
        let actions = session.close();
        assert_eq!(
            actions,
            Timer::ALL.iter().map(|t| Action::Cancel(*t)).collect::<Vec<_>>()
        );
        assert!(session.on_timer(Timer::StatusPoll).is_empty());
        assert!(session.on_timer(Timer::Heartbeat).is_empty());
        assert!(session.on_frame(&ack()).is_empty());
        assert!(session.close().is_empty());
    }

    #[test]
    fn test_unsolicited_frame_in_idle_ignored() {
        let mut session = running();
        let frame = status_frame(&StatusSnapshot::default());
        assert!(session.on_frame(&frame).is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }
}
