//! Command-line tool for the dome/instrument PLC.
//!
//! Subcommands:
//! - `status`: print one decoded status snapshot
//! - `monitor`: stream status changes, comms changes and handset events
//! - `dome`, `shutter`, `dropout`, `focus`, `aperture`, `filter`, `eht`,
//!   `acqmir`, `instrument-shutter`, `watchdog`: set one command field
//! - `reset-acq`: reset the acquisition device
//! - `safe`: close the instrument shutter and park the wheels
//!
//! `--mock` runs everything against the built-in simulated controller.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use plc_driver::{MockPlc, PlcConfig, PlcEvents, PlcHandle};
use plc_protocol::{
    AcqMirrorAction, DomeMove, EhtMode, FocusMove, HandsetBits, ShutterAction, StatusSnapshot,
    Wheel, WheelAction,
};
use tracing::info;

/// Dome/instrument PLC control tool
#[derive(Parser, Debug)]
#[command(name = "plc_tool")]
#[command(about = "Query and command the telescope dome/instrument PLC")]
#[command(version)]
struct Args {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serial port (overrides the configuration file)
    #[arg(long, global = true)]
    port: Option<String>,

    /// Baud rate (overrides the configuration file)
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Talk to a simulated controller instead of the serial port
    #[arg(long, global = true)]
    mock: bool,

    /// Seconds to wait for the controller to answer
    #[arg(long, global = true, default_value = "10")]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current status
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stream status and comms changes
    Monitor {
        /// Stop after this many status updates (0 = run forever)
        #[arg(short, long, default_value = "0")]
        count: u64,
    },

    /// Move the dome
    Dome {
        #[command(subcommand)]
        action: DomeAction,
    },

    /// Open, close or stop the main shutter
    Shutter { action: OpenClose },

    /// Open, close or stop the dropout
    Dropout { action: OpenClose },

    /// Move the focuser
    Focus {
        #[command(subcommand)]
        action: FocusAction,
    },

    /// Aperture wheel: go to a slot, or initialise/reset
    Aperture(WheelArgs),

    /// Filter wheel: go to a slot, or initialise/reset
    Filter(WheelArgs),

    /// Set the photomultiplier high-voltage mode (off, standby, on)
    Eht { mode: EhtMode },

    /// Acquisition mirror
    Acqmir { action: MirrorArg },

    /// Open or close the instrument shutter
    InstrumentShutter { state: OpenShut },

    /// Assert or drop the watchdog heartbeat bit
    Watchdog { state: OnOff },

    /// Reset the acquisition device, mirror and wheels
    ResetAcq,

    /// Close the instrument shutter, park wheels on safe slots, mirror to view
    Safe,
}

#[derive(Subcommand, Debug)]
enum DomeAction {
    /// Go to an azimuth in degrees
    Goto {
        azimuth: f64,
        /// Keep guiding after arrival
        #[arg(long)]
        guide: bool,
    },
    Left,
    Right,
    Stop,
}

#[derive(Subcommand, Debug)]
enum FocusAction {
    /// Go to an absolute position
    Goto {
        #[arg(allow_negative_numbers = true)]
        position: i16,
    },
    Out,
    In,
    Stop,
    Reset,
}

#[derive(clap::Args, Debug)]
struct WheelArgs {
    /// Target slot
    slot: Option<u8>,

    /// Initialise the wheel
    #[arg(long, conflicts_with_all = ["slot", "reset"])]
    init: bool,

    /// Reset the wheel controller
    #[arg(long, conflicts_with = "slot")]
    reset: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OpenClose {
    Open,
    Close,
    Stop,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MirrorArg {
    View,
    Measure,
    Reset,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OpenShut {
    Open,
    Close,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OnOff {
    On,
    Off,
}

impl From<OpenClose> for ShutterAction {
    fn from(action: OpenClose) -> Self {
        match action {
            OpenClose::Open => ShutterAction::Open,
            OpenClose::Close => ShutterAction::Close,
            OpenClose::Stop => ShutterAction::Stop,
        }
    }
}

impl WheelArgs {
    fn action(&self) -> Result<WheelAction> {
        match (self.slot, self.init, self.reset) {
            (Some(slot), false, false) => Ok(WheelAction::Goto(slot)),
            (None, true, false) => Ok(WheelAction::Init),
            (None, false, true) => Ok(WheelAction::Reset),
            _ => bail!("Give exactly one of a slot, --init or --reset"),
        }
    }
}

fn load_config(args: &Args) -> Result<PlcConfig> {
    let mut config = match &args.config {
        Some(path) => PlcConfig::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => PlcConfig::default(),
    };
    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    config.validate()?;
    Ok(config)
}

/// Wait until the first command has been acknowledged.
async fn wait_for_comms(plc: &PlcHandle, timeout: Duration) -> Result<()> {
    tokio::time::timeout(timeout, async {
        while !plc.comms_ok() {
            let events = plc.wait_event().await;
            if events.contains(PlcEvents::CLOSED) {
                break;
            }
            plc.take_status_available();
            plc.take_comms_changed();
        }
    })
    .await
    .context("No response from PLC")?;
    if !plc.comms_ok() {
        bail!("PLC session closed before communications were established");
    }
    Ok(())
}

/// Wait for the next status frame after now.
async fn next_status(plc: &PlcHandle, timeout: Duration) -> Result<StatusSnapshot> {
    let mut rx = plc.subscribe_status();
    rx.borrow_and_update();
    tokio::time::timeout(timeout, rx.changed())
        .await
        .context("Timed out waiting for status")?
        .context("PLC session closed")?;
    let status = rx.borrow().clone();
    Ok(status)
}

fn print_status(status: &StatusSnapshot) {
    println!("Dome azimuth:       {:.1} deg ({:?})", status.azimuth_degrees(), status.dome);
    println!("Shutter:            {:?}", status.shutter);
    println!("Dropout:            {:?}", status.dropout);
    println!(
        "Aperture wheel:     slot {} ({:?})",
        status.aperture_slot, status.aperture
    );
    println!(
        "Filter wheel:       slot {} ({:?})",
        status.filter_slot, status.filter
    );
    println!("Acquisition mirror: {:?}", status.acq_mirror);
    println!("Instrument shutter: {:?}", status.instrument_shutter);
    println!(
        "Focus:              {} ({:?})",
        status.focus_position, status.focus
    );
    println!("EHT:                {}", status.eht);
    println!("Handset:            {:?}", status.handset_bits());
    println!(
        "Dome flop:          {}..{}",
        status.dome_flop_min, status.dome_flop_max
    );
    println!(
        "Encoders:           HA {} Dec {}",
        status.ha_pulses, status.dec_pulses
    );
    if status.has_critical_fault() {
        println!("CRITICAL:           {:?}", status.critical);
    }
}

async fn cmd_monitor(plc: &PlcHandle, count: u64) -> Result<()> {
    plc.register_handset_listener(|old, new| {
        println!(
            "Handset {:?} -> {:?}",
            HandsetBits::from_bits_retain(old),
            HandsetBits::from_bits_retain(new)
        );
    });

    let mut seen = 0u64;
    let mut last = plc.get_status();
    loop {
        let events = plc.wait_event().await;
        if events.contains(PlcEvents::CLOSED) {
            bail!("PLC session closed");
        }
        if plc.take_comms_changed() {
            println!("Comms OK: {}", plc.comms_ok());
        }
        if plc.take_status_available() {
            let status = plc.get_status();
            if status != last {
                print_status(&status);
                println!();
                last = status;
            }
            seen += 1;
            if count > 0 && seen >= count {
                return Ok(());
            }
        }
    }
}

async fn run_command(plc: &PlcHandle, command: &Command) -> Result<()> {
    match command {
        Command::Status { .. } | Command::Monitor { .. } => {
            bail!("{command:?} does not send a command")
        }
        Command::Dome { action } => match action {
            DomeAction::Goto { azimuth, guide } => {
                if !(0.0..360.0).contains(azimuth) {
                    bail!("Azimuth must be in 0..360 degrees");
                }
                let tenths = (azimuth * 10.0).round() as u16 % 3600;
                plc.set_dome_target(tenths, *guide).await?
            }
            DomeAction::Left => plc.set_dome_move(DomeMove::Left).await?,
            DomeAction::Right => plc.set_dome_move(DomeMove::Right).await?,
            DomeAction::Stop => plc.set_dome_move(DomeMove::Stop).await?,
        },
        Command::Shutter { action } => plc.set_shutter((*action).into()).await?,
        Command::Dropout { action } => plc.set_dropout((*action).into()).await?,
        Command::Focus { action } => match action {
            FocusAction::Goto { position } => plc.set_focus_goto(*position).await?,
            FocusAction::Out => plc.set_focus_move(FocusMove::Out).await?,
            FocusAction::In => plc.set_focus_move(FocusMove::In).await?,
            FocusAction::Stop => plc.set_focus_move(FocusMove::Stop).await?,
            FocusAction::Reset => plc.focus_reset().await?,
        },
        Command::Aperture(wheel) => plc.set_wheel(Wheel::Aperture, wheel.action()?).await?,
        Command::Filter(wheel) => plc.set_wheel(Wheel::Filter, wheel.action()?).await?,
        Command::Eht { mode } => plc.set_eht(*mode).await?,
        Command::Acqmir { action } => {
            let action = match action {
                MirrorArg::View => AcqMirrorAction::View,
                MirrorArg::Measure => AcqMirrorAction::Measure,
                MirrorArg::Reset => AcqMirrorAction::Reset,
            };
            plc.set_acq_mirror(action).await?
        }
        Command::InstrumentShutter { state } => {
            plc.set_instrument_shutter(matches!(state, OpenShut::Open))
                .await?
        }
        Command::Watchdog { state } => plc.set_watchdog(matches!(state, OnOff::On)).await?,
        Command::ResetAcq => plc.reset_acquisition_device().await?,
        Command::Safe => plc.close_instrument_shutter_safe().await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let timeout = Duration::from_secs(args.timeout);

    let plc = if args.mock {
        info!("Using simulated PLC");
        PlcHandle::open_mock(&config, &MockPlc::new())?
    } else {
        PlcHandle::open_serial(&config)
            .with_context(|| format!("Failed to open {}", config.serial.port))?
    };

    wait_for_comms(&plc, timeout).await?;

    match &args.command {
        Command::Status { json } => {
            let status = next_status(&plc, timeout).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
        Command::Monitor { count } => cmd_monitor(&plc, *count).await?,
        command => {
            run_command(&plc, command).await?;
            // One command exchange plus the following status poll
            let status = next_status(&plc, timeout).await?;
            next_status(&plc, timeout).await?;
            info!("Command sent, comms OK: {}", plc.comms_ok());
            print_status(&status);
        }
    }

    plc.close().await;
    Ok(())
}
