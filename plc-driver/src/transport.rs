//! Byte transports the line discipline can be bound to.
//!
//! Writing is synchronous and non-blocking in practice (a 57 byte command fits
//! in the UART FIFO). Reading happens on a dedicated thread that forwards raw
//! chunks, exactly as the UART delivered them, over an unbounded channel.

use std::io::{ErrorKind, Read, Write};
use std::thread;

use bytes::Bytes;
use serialport::{DataBits, SerialPort, StopBits};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::error::TransportError;

/// Outbound half of a byte link to the controller.
pub trait Transport: Send {
    /// Write one complete frame.
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "transport"
    }
}

/// Serial port transport.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialTransport {
    /// Open the configured port and start the reader thread.
    ///
    /// Returns the transport and the channel the reader forwards received
    /// chunks into. The reader exits when the port fails or the receiver is
    /// dropped; the channel then closes.
    pub fn open(
        config: &SerialConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Bytes>), TransportError> {
        let data_bits = match config.data_bits {
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        };
        let stop_bits = match config.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        };

        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(data_bits)
            .parity(config.parity.into())
            .stop_bits(stop_bits)
            .timeout(config.read_timeout())
            .open()?;

        info!(
            "Opened {} at {} baud, {} data bits, {} parity, {} stop bits",
            config.port, config.baud_rate, config.data_bits, config.parity, config.stop_bits
        );

        let reader_port = port.try_clone()?;
        let (tx, rx) = mpsc::unbounded_channel();
        // Detached; exits once the receiver is dropped
        thread::Builder::new()
            .name(format!("plc-rx {}", config.port))
            .spawn(move || read_loop(reader_port, tx))?;

        Ok((
            Self {
                port,
                name: config.port.clone(),
            },
            rx,
        ))
    }
}

impl Transport for SerialTransport {
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn read_loop(mut port: Box<dyn SerialPort>, tx: mpsc::UnboundedSender<Bytes>) {
    let mut buf = [0u8; 256];
    loop {
        if tx.is_closed() {
            debug!("Receiver dropped, stopping serial reader");
            return;
        }
        match port.read(&mut buf) {
            Ok(0) => continue,
            Ok(n) => {
                if tx.send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::Interrupted => {
                continue
            }
            Err(e) => {
                warn!("Serial read failed, stopping reader: {}", e);
                return;
            }
        }
    }
}
