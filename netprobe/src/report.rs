//! Console report lines.
//!
//! Successes go to stdout, failures to stderr. Each item is written as one
//! line under a single lock so concurrent probes never interleave mid-line.

use std::io::{self, Write};

use log::warn;

use crate::error::ProbeError;
use crate::probes::builtin::network::{HttpProbeResult, ResolutionResult};

/// A probe output that knows its report format.
pub trait Report {
    fn write_report<W: Write>(&self, out: &mut W) -> io::Result<()>;
}

impl Report for ResolutionResult {
    fn write_report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "address: {} family: {}", self.address, self.family.as_u8())
    }
}

impl<T: Report> Report for Vec<T> {
    fn write_report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for item in self {
            item.write_report(out)?;
        }
        Ok(())
    }
}

impl Report for HttpProbeResult {
    fn write_report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "STATUS: {}", self.status_code)
    }
}

pub fn write_error<W: Write>(out: &mut W, err: &ProbeError) -> io::Result<()> {
    writeln!(out, "{err}")
}

/// Print a finished probe's outcome to stdout or stderr.
pub fn emit<T: Report>(probe_name: &str, outcome: &Result<T, ProbeError>) {
    let written = match outcome {
        Ok(output) => output.write_report(&mut io::stdout().lock()),
        Err(err) => write_error(&mut io::stderr().lock(), err),
    };
    if let Err(e) = written {
        warn!("Failed to write {probe_name} report: {e}");
    }
}
