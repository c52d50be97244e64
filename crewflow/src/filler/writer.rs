//! Output gate for the filler.

use super::StopSignal;
use std::io::{self, Write};

/// A writer that refuses to write once its [`StopSignal`] is set.
///
/// Each `write` checks the signal and writes under the signal's gate, so a
/// write either completes before `stop` returns or never happens.
#[derive(Debug)]
pub struct GatedWriter<W> {
    inner: W,
    signal: StopSignal,
}

impl<W: Write> GatedWriter<W> {
    /// Wraps `inner`.
    pub const fn new(inner: W, signal: StopSignal) -> Self {
        Self { inner, signal }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Returns true if `error` came from a stopped [`GatedWriter`].
#[must_use]
pub fn is_stopped(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::BrokenPipe && error.to_string() == STOPPED
}

const STOPPED: &str = "filler stopped";

impl<W: Write> Write for GatedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _gate = self.signal.gate();
        if self.signal.is_stopped() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, STOPPED));
        }
        self.inner.write_all(buf)?;
        self.inner.flush()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _gate = self.signal.gate();
        if self.signal.is_stopped() {
            return Ok(());
        }
        self.inner.flush()
    }
}
