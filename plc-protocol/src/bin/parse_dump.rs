use std::env;
use std::fs::File;
use std::io::{BufWriter, Read, Write};

use anyhow::{bail, Context, Result};
use plc_protocol::frame::{validate_request, COMMAND_HEADER};
use plc_protocol::{
    validate, CommandBuffer, FrameAssembler, FrameKind, ProtocolError, StatusSnapshot,
};

/// One frame pulled out of the capture.
enum Record {
    Status(Box<StatusSnapshot>),
    Ack,
    Command(Box<CommandBuffer>),
    StatusRequest,
    Rejected(String, ProtocolError),
}

fn classify(frame: &[u8]) -> Record {
    let text = String::from_utf8_lossy(frame).into_owned();
    if frame.starts_with(b"@00RD00") && frame.len() > 20 {
        return match StatusSnapshot::decode(frame) {
            Ok(status) => Record::Status(Box::new(status)),
            Err(e) => Record::Rejected(text, e),
        };
    }
    if frame.starts_with(b"@00RD") {
        return match validate_request(frame) {
            Ok(_) => Record::StatusRequest,
            Err(e) => Record::Rejected(text, e),
        };
    }
    if frame.starts_with(COMMAND_HEADER) && frame.len() > 20 {
        return match CommandBuffer::decode(frame) {
            Ok(cmd) => Record::Command(Box::new(cmd)),
            Err(e) => Record::Rejected(text, e),
        };
    }
    match validate(frame, FrameKind::CommandAck) {
        Ok(()) => Record::Ack,
        Err(e) => Record::Rejected(text, e),
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("Usage: {} <capture_file> <output_csv>", args[0]);
    }

    let path = &args[1];
    let output_path = &args[2];

    let mut data = Vec::new();
    File::open(path)
        .with_context(|| format!("Failed to open {path}"))?
        .read_to_end(&mut data)
        .with_context(|| format!("Failed to read {path}"))?;

    println!("Read {} bytes from {}", data.len(), path);

    let mut records = Vec::new();
    let mut assembler = FrameAssembler::with_capacity(data.len().max(1));
    assembler.push(&data, |frame| records.push(classify(frame)));

    let count = |pred: fn(&Record) -> bool| records.iter().filter(|r| pred(r)).count();
    println!(
        "Frames: {} status, {} status requests, {} commands, {} acks, {} rejected",
        count(|r| matches!(r, Record::Status(_))),
        count(|r| matches!(r, Record::StatusRequest)),
        count(|r| matches!(r, Record::Command(_))),
        count(|r| matches!(r, Record::Ack)),
        count(|r| matches!(r, Record::Rejected(..))),
    );

    let file = File::create(output_path)
        .with_context(|| format!("Failed to create {output_path}"))?;
    let mut out = BufWriter::new(file);

    writeln!(
        out,
        "index,kind,dome_azimuth,dome,shutter,dropout,aperture,filter,acq_mirror,\
         instrument_shutter,focus_position,focus,critical,eht,handset,aperture_slot,\
         filter_slot,ha_pulses,dec_pulses,detail"
    )?;

    for (index, record) in records.iter().enumerate() {
        match record {
            Record::Status(s) => writeln!(
                out,
                "{index},status,{},{:X},{:X},{:X},{:X},{:X},{:X},{:X},{},{:02X},{:X},{},{:02X},{},{},{},{},",
                s.dome_azimuth,
                s.dome.bits(),
                s.shutter.bits(),
                s.dropout.bits(),
                s.aperture.bits(),
                s.filter.bits(),
                s.acq_mirror.bits(),
                s.instrument_shutter.bits(),
                s.focus_position,
                s.focus.bits(),
                s.critical.bits(),
                s.eht,
                s.handset,
                s.aperture_slot,
                s.filter_slot,
                s.ha_pulses,
                s.dec_pulses,
            )?,
            Record::Command(c) => writeln!(
                out,
                "{index},command,{},{:X},{:X},{:X},{:X},{:X},{:X},{:X},{},{:X},,{},,{},{},,,misc={:X}",
                c.dome_target,
                c.dome.bits(),
                c.shutter.bits(),
                c.dropout.bits(),
                c.aperture.bits(),
                c.filter.bits(),
                c.acq_mirror.bits(),
                c.misc.bits() & 0x1,
                c.focus_target,
                c.focus.bits(),
                c.eht,
                c.aperture_slot,
                c.filter_slot,
                c.misc.bits(),
            )?,
            Record::StatusRequest => writeln!(out, "{index},status_request{}", ",".repeat(18))?,
            Record::Ack => writeln!(out, "{index},ack{}", ",".repeat(18))?,
            Record::Rejected(text, e) => writeln!(
                out,
                "{index},rejected{}\"{} ({})\"",
                ",".repeat(18),
                text.replace('"', "'"),
                e
            )?,
        }
    }

    out.flush()?;
    println!("Wrote {} records to {}", records.len(), output_path);

    Ok(())
}
