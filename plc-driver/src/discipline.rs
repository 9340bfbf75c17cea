//! Line discipline: binds one transport and one frame handler to an assembler.

use bytes::Bytes;
use plc_protocol::FrameAssembler;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::transport::Transport;

/// Receiver of complete frames.
pub trait FrameSink: Send {
    /// Called once per complete `@`..`*` frame, in arrival order.
    fn on_frame(&mut self, frame: &[u8]);
}

impl FrameSink for mpsc::UnboundedSender<Bytes> {
    fn on_frame(&mut self, frame: &[u8]) {
        if self.send(Bytes::copy_from_slice(frame)).is_err() {
            trace!("Frame receiver gone, dropping frame");
        }
    }
}

/// Frame assembler plus at most one bound transport and one registered handler.
pub struct LineDiscipline {
    assembler: FrameAssembler,
    transport: Option<Box<dyn Transport>>,
    sink: Option<Box<dyn FrameSink>>,
}

impl LineDiscipline {
    pub fn new(rx_capacity: usize) -> Self {
        Self {
            assembler: FrameAssembler::with_capacity(rx_capacity),
            transport: None,
            sink: None,
        }
    }

    /// Attach a transport. Fails if one is already bound.
    pub fn bind_transport(&mut self, transport: Box<dyn Transport>) -> Result<(), TransportError> {
        if self.transport.is_some() {
            return Err(TransportError::AlreadyBound);
        }
        debug!("Bound transport {}", transport.name());
        self.transport = Some(transport);
        Ok(())
    }

    /// Detach and return the bound transport, dropping any partial frame.
    pub fn unbind_transport(&mut self) -> Option<Box<dyn Transport>> {
        self.assembler.reset();
        let transport = self.transport.take();
        if let Some(t) = &transport {
            debug!("Unbound transport {}", t.name());
        }
        transport
    }

    pub fn is_bound(&self) -> bool {
        self.transport.is_some()
    }

    /// Register the frame handler, replacing any previous one.
    pub fn register_handler(&mut self, sink: Box<dyn FrameSink>) {
        if self.sink.is_some() {
            debug!("Replacing registered frame handler");
        }
        self.sink = Some(sink);
    }

    /// Remove the frame handler. Frames completed afterwards are dropped.
    pub fn unregister_handler(&mut self) -> Option<Box<dyn FrameSink>> {
        self.sink.take()
    }

    /// Feed raw bytes from the transport.
    ///
    /// Every frame completed by `chunk` reaches the handler before this
    /// returns. Returns the number of frames completed.
    pub fn receive(&mut self, chunk: &[u8]) -> usize {
        let sink = &mut self.sink;
        self.assembler.push(chunk, |frame| match sink.as_mut() {
            Some(sink) => sink.on_frame(frame),
            None => trace!("No frame handler registered, dropping frame"),
        })
    }

    /// Write a frame to the bound transport.
    pub fn transmit(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let transport = self.transport.as_mut().ok_or(TransportError::NotBound)?;
        trace!("TX {:?}", String::from_utf8_lossy(bytes));
        transport.transmit(bytes)
    }
}
