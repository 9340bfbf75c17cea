//! Consumer surface of a running PLC session.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bitflags::bitflags;
use bytes::Bytes;
use plc_protocol::{
    AcqMirrorAction, CommandBuffer, DomeMove, EhtMode, FocusMove, ProtocolResult, ShutterAction,
    StatusSnapshot, Wheel, WheelAction,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::info;

use crate::config::{PlcConfig, SafeSlots};
use crate::discipline::LineDiscipline;
use crate::driver::{Driver, Request, Shared};
use crate::error::{PlcError, PlcResult};
use crate::mock::MockPlc;
use crate::session::Session;
use crate::transport::{SerialTransport, Transport};

bitflags! {
    /// Readiness reported by [`PlcHandle::wait_event`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PlcEvents: u8 {
        /// A new status snapshot is available
        const STATUS_AVAILABLE = 0x1;
        /// The comms-OK flag changed
        const COMMS_CHANGED = 0x2;
        /// The session has closed
        const CLOSED = 0x4;
    }
}

/// Cloneable handle to one PLC session.
///
/// All clones share the session; it closes when [`close`](Self::close) is
/// called or the last clone is dropped. Mutators resolve once the driver has
/// applied the change to the command buffer, not when the controller
/// acknowledges it.
#[derive(Clone)]
pub struct PlcHandle {
    requests: mpsc::UnboundedSender<Request>,
    shared: Arc<Shared>,
    status: watch::Receiver<StatusSnapshot>,
    safe_slots: SafeSlots,
}

impl PlcHandle {
    /// Start a session over `transport`, reading replies from `raw`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        config: &PlcConfig,
        transport: Box<dyn Transport>,
        raw: mpsc::UnboundedReceiver<Bytes>,
    ) -> PlcResult<Self> {
        config.validate()?;

        let mut discipline = LineDiscipline::new(config.rx_capacity);
        discipline.bind_transport(transport)?;

        let (requests, request_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(StatusSnapshot::default());
        let shared = Arc::new(Shared::default());

        let (session, opening) = Session::open(config.timing);
        let driver = Driver::new(
            session,
            discipline,
            raw,
            request_rx,
            shared.clone(),
            status_tx,
        );
        tokio::spawn(driver.run(opening));

        Ok(Self {
            requests,
            shared,
            status,
            safe_slots: config.safe_slots,
        })
    }

    /// Open the configured serial port and start a session on it.
    pub fn open_serial(config: &PlcConfig) -> PlcResult<Self> {
        let (transport, raw) = SerialTransport::open(&config.serial)?;
        info!("PLC session on {}", config.serial.port);
        Self::open(config, Box::new(transport), raw)
    }

    /// Start a session against a simulated controller.
    pub fn open_mock(config: &PlcConfig, plc: &MockPlc) -> PlcResult<Self> {
        let (transport, raw) = plc.connect();
        Self::open(config, Box::new(transport), raw)
    }

    // ==================== Status ====================

    /// Latest status snapshot.
    pub fn get_status(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    /// Receiver notified on every applied status frame.
    pub fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    pub fn comms_ok(&self) -> bool {
        self.shared.comms_ok.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Whether a status frame arrived since the last call. Clears the flag.
    pub fn take_status_available(&self) -> bool {
        self.shared.status_available.swap(false, Ordering::SeqCst)
    }

    /// Whether comms-OK changed since the last call. Clears the flag.
    pub fn take_comms_changed(&self) -> bool {
        self.shared.comms_changed.swap(false, Ordering::SeqCst)
    }

    /// Readiness without clearing anything.
    pub fn pending_events(&self) -> PlcEvents {
        let mut events = PlcEvents::empty();
        events.set(
            PlcEvents::STATUS_AVAILABLE,
            self.shared.status_available.load(Ordering::SeqCst),
        );
        events.set(
            PlcEvents::COMMS_CHANGED,
            self.shared.comms_changed.load(Ordering::SeqCst),
        );
        events.set(PlcEvents::CLOSED, self.is_closed());
        events
    }

    /// Wait until at least one event is pending and return the pending set.
    ///
    /// Nothing is cleared; use the `take_*` methods to consume the edges.
    pub async fn wait_event(&self) -> PlcEvents {
        self.wait_until(|h| !h.pending_events().is_empty()).await;
        self.pending_events()
    }

    /// Register the handset listener, replacing any previous one.
    ///
    /// Called from the driver task with `(old, new)` raw handset bytes.
    pub fn register_handset_listener<F>(&self, listener: F)
    where
        F: Fn(u8, u8) + Send + Sync + 'static,
    {
        self.shared.set_listener(Arc::new(listener));
    }

    /// Close the session for every handle and wait for the driver to stop.
    pub async fn close(&self) {
        // Already gone if the send fails
        let _ = self.requests.send(Request::Close);
        self.wait_until(|h| h.is_closed()).await;
    }

    async fn wait_until(&self, ready: impl Fn(&Self) -> bool) {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if ready(self) {
                return;
            }
            if self.requests.is_closed() && !self.is_closed() {
                // Driver gone without publishing; nothing will wake us
                return;
            }
            notified.await;
        }
    }

    // ==================== Command mutators ====================

    async fn command<F>(&self, apply: F) -> PlcResult<()>
    where
        F: FnOnce(&mut CommandBuffer) -> ProtocolResult<()> + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Command {
                apply: Box::new(apply),
                reply,
            })
            .map_err(|_| PlcError::SessionClosed)?;
        response.await.map_err(|_| PlcError::SessionClosed)?
    }

    /// Assert or drop the watchdog heartbeat bit.
    pub async fn set_watchdog(&self, alive: bool) -> PlcResult<()> {
        self.command(move |c| {
            c.set_watchdog(alive);
            Ok(())
        })
        .await
    }

    /// Send the dome to `azimuth` tenths of a degree.
    pub async fn set_dome_target(&self, azimuth: u16, guide: bool) -> PlcResult<()> {
        self.command(move |c| c.set_dome_target(azimuth, guide)).await
    }

    pub async fn set_dome_move(&self, direction: DomeMove) -> PlcResult<()> {
        self.command(move |c| {
            c.set_dome_move(direction);
            Ok(())
        })
        .await
    }

    pub async fn set_shutter(&self, action: ShutterAction) -> PlcResult<()> {
        self.command(move |c| {
            c.set_shutter(action);
            Ok(())
        })
        .await
    }

    pub async fn set_dropout(&self, action: ShutterAction) -> PlcResult<()> {
        self.command(move |c| {
            c.set_dropout(action);
            Ok(())
        })
        .await
    }

    pub async fn set_focus_goto(&self, position: i16) -> PlcResult<()> {
        self.command(move |c| c.set_focus_goto(position)).await
    }

    pub async fn set_focus_move(&self, direction: FocusMove) -> PlcResult<()> {
        self.command(move |c| {
            c.set_focus_move(direction);
            Ok(())
        })
        .await
    }

    pub async fn focus_reset(&self) -> PlcResult<()> {
        self.command(|c| {
            c.focus_reset();
            Ok(())
        })
        .await
    }

    pub async fn set_instrument_shutter(&self, open: bool) -> PlcResult<()> {
        self.command(move |c| {
            c.set_instrument_shutter(open);
            Ok(())
        })
        .await
    }

    pub async fn set_acq_mirror(&self, action: AcqMirrorAction) -> PlcResult<()> {
        self.command(move |c| {
            c.set_acq_mirror(action);
            Ok(())
        })
        .await
    }

    pub async fn set_eht(&self, mode: EhtMode) -> PlcResult<()> {
        self.command(move |c| {
            c.set_eht(mode);
            Ok(())
        })
        .await
    }

    pub async fn set_wheel(&self, wheel: Wheel, action: WheelAction) -> PlcResult<()> {
        self.command(move |c| c.set_wheel(wheel, action)).await
    }

    pub async fn set_dome_flop(&self, min: u16, max: u16) -> PlcResult<()> {
        self.command(move |c| c.set_dome_flop(min, max)).await
    }

    /// Reset the acquisition device, its mirror and both wheels in one command.
    pub async fn reset_acquisition_device(&self) -> PlcResult<()> {
        self.command(|c| {
            c.acq_device_reset();
            c.set_acq_mirror(AcqMirrorAction::Reset);
            c.set_wheel(Wheel::Aperture, WheelAction::Reset)?;
            c.set_wheel(Wheel::Filter, WheelAction::Reset)
        })
        .await
    }

    /// Close the instrument shutter, park both wheels on their safe slots and
    /// put the acquisition mirror in the beam, in one command.
    pub async fn close_instrument_shutter_safe(&self) -> PlcResult<()> {
        let safe = self.safe_slots;
        self.command(move |c| {
            c.set_instrument_shutter(false);
            c.set_wheel(Wheel::Aperture, WheelAction::Goto(safe.aperture))?;
            c.set_wheel(Wheel::Filter, WheelAction::Goto(safe.filter))?;
            c.set_acq_mirror(AcqMirrorAction::View);
            Ok(())
        })
        .await
    }
}
