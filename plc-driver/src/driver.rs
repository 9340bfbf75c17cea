//! Driver task: runs a [`Session`] against a live line discipline.
//!
//! One tokio task owns the session, the line discipline and the three timer
//! deadlines, so every transition is applied atomically with respect to the
//! others. It selects, in priority order, over:
//!
//! - complete frames from the registered frame handler
//! - raw byte chunks from the transport reader
//! - requests from [`PlcHandle`](crate::PlcHandle)s
//! - the earliest armed timer deadline

use std::collections::VecDeque;
use std::future::pending;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use plc_protocol::{CommandBuffer, ProtocolResult, StatusSnapshot};
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::discipline::LineDiscipline;
use crate::error::{PlcError, PlcResult};
use crate::session::{Action, Session, SessionEvent, Timer};

/// Mutation of the command buffer requested by a handle.
pub(crate) type CommandFn = Box<dyn FnOnce(&mut CommandBuffer) -> ProtocolResult<()> + Send>;

/// Callback receiving `(old, new)` raw handset bytes.
pub type HandsetListener = Arc<dyn Fn(u8, u8) + Send + Sync>;

pub(crate) enum Request {
    Command {
        apply: CommandFn,
        reply: oneshot::Sender<PlcResult<()>>,
    },
    Close,
}

/// State shared between the driver task and every handle.
#[derive(Default)]
pub(crate) struct Shared {
    pub status_available: AtomicBool,
    pub comms_changed: AtomicBool,
    pub comms_ok: AtomicBool,
    pub closed: AtomicBool,
    pub notify: Notify,
    handset_listener: Mutex<Option<HandsetListener>>,
}

impl Shared {
    pub fn listener(&self) -> Option<HandsetListener> {
        self.handset_listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_listener(&self, listener: HandsetListener) {
        *self
            .handset_listener
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(listener);
    }
}

pub(crate) struct Driver {
    session: Session,
    discipline: LineDiscipline,
    frames: mpsc::UnboundedReceiver<Bytes>,
    raw: Option<mpsc::UnboundedReceiver<Bytes>>,
    requests: mpsc::UnboundedReceiver<Request>,
    deadlines: [Option<Instant>; 3],
    shared: Arc<Shared>,
    status_tx: watch::Sender<StatusSnapshot>,
}

impl Driver {
    pub(crate) fn new(
        session: Session,
        mut discipline: LineDiscipline,
        raw: mpsc::UnboundedReceiver<Bytes>,
        requests: mpsc::UnboundedReceiver<Request>,
        shared: Arc<Shared>,
        status_tx: watch::Sender<StatusSnapshot>,
    ) -> Self {
        let (frame_tx, frames) = mpsc::unbounded_channel::<Bytes>();
        discipline.register_handler(Box::new(frame_tx));
        Self {
            session,
            discipline,
            frames,
            raw: Some(raw),
            requests,
            deadlines: [None; 3],
            shared,
            status_tx,
        }
    }

    /// Execute the session's opening actions, then serve until closed.
    pub(crate) async fn run(mut self, opening: Vec<Action>) {
        self.execute(opening);

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                biased;
                Some(frame) = self.frames.recv() => {
                    let actions = self.session.on_frame(&frame);
                    self.execute(actions);
                }
                chunk = recv_raw(&mut self.raw) => match chunk {
                    Some(chunk) => {
                        self.discipline.receive(&chunk);
                    }
                    None => {
                        warn!("Transport byte stream closed, unbinding transport");
                        self.raw = None;
                        self.discipline.unbind_transport();
                    }
                },
                request = self.requests.recv() => match request {
                    Some(Request::Command { apply, reply }) => {
                        let result = match self.session.update_command(apply) {
                            Ok(actions) => {
                                self.execute(actions);
                                Ok(())
                            }
                            Err(e) => {
                                debug!("Rejected command request: {}", e);
                                Err(PlcError::from(e))
                            }
                        };
                        // The caller may have stopped waiting
                        let _ = reply.send(result);
                    }
                    Some(Request::Close) => {
                        info!("Close requested");
                        break;
                    }
                    None => {
                        info!("Last PLC handle dropped");
                        break;
                    }
                },
                () = sleep_until_opt(deadline) => self.fire_due_timers(),
            }
        }

        self.shutdown();
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.iter().flatten().min().copied()
    }

    fn fire_due_timers(&mut self) {
        let now = Instant::now();
        for timer in Timer::ALL {
            let slot = timer.index();
            if matches!(self.deadlines[slot], Some(at) if at <= now) {
                self.deadlines[slot] = None;
                let actions = self.session.on_timer(timer);
                self.execute(actions);
            }
        }
    }

    fn execute(&mut self, actions: Vec<Action>) {
        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Transmit(frame) => {
                    if let Err(e) = self.discipline.transmit(&frame) {
                        warn!("Transmit failed: {}", e);
                        queue.extend(self.session.on_transmit_error(&e));
                    }
                }
                Action::Arm(timer, period) => {
                    self.deadlines[timer.index()] = Some(Instant::now() + period);
                }
                Action::Cancel(timer) => {
                    self.deadlines[timer.index()] = None;
                }
                Action::Notify(event) => self.publish(event),
            }
        }
    }

    fn publish(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::StatusUpdated => {
                self.status_tx.send_replace(self.session.status().clone());
                self.shared.status_available.store(true, Ordering::SeqCst);
            }
            SessionEvent::CommsChanged(ok) => {
                self.shared.comms_ok.store(ok, Ordering::SeqCst);
                self.shared.comms_changed.store(true, Ordering::SeqCst);
            }
            SessionEvent::HandsetChanged { old, new } => {
                debug!("Handset {:02X} -> {:02X}", old, new);
                // Called unlocked; the listener may re-register itself
                if let Some(listener) = self.shared.listener() {
                    listener(old, new);
                }
            }
        }
        self.shared.notify.notify_waiters();
    }

    fn shutdown(&mut self) {
        let actions = self.session.close();
        self.execute(actions);
        self.discipline.unregister_handler();
        self.discipline.unbind_transport();
        self.shared.closed.store(true, Ordering::SeqCst);
        self.requests.close();
        self.shared.notify.notify_waiters();
    }
}

async fn recv_raw(raw: &mut Option<mpsc::UnboundedReceiver<Bytes>>) -> Option<Bytes> {
    match raw {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}
