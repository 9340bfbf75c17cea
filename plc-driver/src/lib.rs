//! Serial control layer for the telescope dome and instrument PLC.
//!
//! A [`PlcHandle`] owns one protocol session: it polls the controller for
//! status, sends the command buffer whenever it changes (and on a heartbeat),
//! and exposes the decoded state to any number of cloned handles.
//!
//! ```no_run
//! use plc_driver::{PlcConfig, PlcHandle};
//! use plc_protocol::ShutterAction;
//!
//! # async fn demo() -> plc_driver::PlcResult<()> {
//! let plc = PlcHandle::open_serial(&PlcConfig::default())?;
//! plc.set_shutter(ShutterAction::Open).await?;
//! loop {
//!     plc.wait_event().await;
//!     if plc.take_status_available() {
//!         println!("dome at {:.1} deg", plc.get_status().azimuth_degrees());
//!     }
//! }
//! # }
//! ```
//!
//! The layers underneath are usable on their own: [`Session`] is a sans-IO
//! state machine, [`LineDiscipline`] binds a [`Transport`] and a frame handler
//! to the frame assembler, and [`MockPlc`] simulates the controller.

pub mod config;
mod discipline;
mod driver;
mod error;
mod handle;
pub mod mock;
pub mod session;
pub mod transport;

pub use config::{Parity, PlcConfig, SafeSlots, SerialConfig, TimingConfig};
pub use discipline::{FrameSink, LineDiscipline};
pub use driver::HandsetListener;
pub use error::{PlcError, PlcResult, TransportError};
pub use handle::{PlcEvents, PlcHandle};
pub use mock::{MockPlc, MockTransport};
pub use session::{Action, Session, SessionEvent, SessionState, Timer};
pub use transport::{SerialTransport, Transport};
