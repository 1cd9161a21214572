//! Standard stream state management.
//!
//! `StdioStream` is the safe Rust model of a write-only C `FILE` bound to
//! one of the two standard output descriptors. It owns its sink, its buffer
//! and the error indicator, and it flushes on drop the way `exit(3)`
//! flushes every open stream.

use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use super::buffer::{BUFSIZ, BufMode, StreamBuffer};
use super::policy::default_mode;

/// The two output streams every process is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StdStream {
    #[serde(rename = "stdout")]
    Output,
    #[serde(rename = "stderr")]
    Error,
}

impl StdStream {
    /// Both streams, in exit-flush order.
    pub const ALL: [StdStream; 2] = [StdStream::Output, StdStream::Error];

    /// Conventional file descriptor number.
    pub const fn fd(self) -> u8 {
        match self {
            StdStream::Output => 1,
            StdStream::Error => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            StdStream::Output => "stdout",
            StdStream::Error => "stderr",
        }
    }
}

impl fmt::Display for StdStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A buffered, write-only model of a standard stream over the sink `W`.
///
/// Failures never escape `fwrite`: it reports how many bytes were accepted
/// and records the failure in the error indicator, as `ferror` would see it.
pub struct StdioStream<W: Write> {
    stream: StdStream,
    sink: W,
    buffer: StreamBuffer,
    error: bool,
}

impl<W: Write> StdioStream<W> {
    /// Create a stream with an explicit buffering mode.
    pub fn new(stream: StdStream, sink: W, mode: BufMode) -> Self {
        Self {
            stream,
            sink,
            buffer: StreamBuffer::new(mode, BUFSIZ),
            error: false,
        }
    }

    /// Create a stream with the C default mode for its destination.
    pub fn with_default_mode(stream: StdStream, sink: W, is_terminal: bool) -> Self {
        Self::new(stream, sink, default_mode(stream, is_terminal))
    }

    pub fn stream(&self) -> StdStream {
        self.stream
    }

    pub fn buf_mode(&self) -> BufMode {
        self.buffer.mode()
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    /// Write `data` through the buffer (fwrite).
    ///
    /// Returns the number of bytes accepted: `data.len()` on success, 0 if
    /// the sink rejected a flush.
    pub fn fwrite(&mut self, data: &[u8]) -> usize {
        let result = self.buffer.write(data);
        if result.flush_needed && deliver(&mut self.sink, &result.flush_data).is_err() {
            self.error = true;
            return 0;
        }
        data.len()
    }

    /// Write a string (fputs).
    pub fn fputs(&mut self, s: &str) -> usize {
        self.fwrite(s.as_bytes())
    }

    /// Hand every pending byte to the sink (fflush).
    ///
    /// Pending bytes are discarded even when delivery fails.
    pub fn fflush(&mut self) -> io::Result<()> {
        let outcome = deliver(&mut self.sink, self.buffer.pending_write_data());
        self.buffer.mark_flushed();
        if outcome.is_err() {
            self.error = true;
        }
        outcome
    }

    /// Bytes accepted but not yet delivered.
    pub fn pending(&self) -> &[u8] {
        self.buffer.pending_write_data()
    }
}

impl<W: Write> Write for StdioStream<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !buf.is_empty() && self.fwrite(buf) == 0 {
            return Err(io::Error::other(format!("{} write failed", self.stream)));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.fflush()
    }
}

impl<W: Write> Drop for StdioStream<W> {
    fn drop(&mut self) {
        let _ = self.fflush();
    }
}

impl<W: Write> fmt::Debug for StdioStream<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdioStream")
            .field("stream", &self.stream)
            .field("mode", &self.buffer.mode())
            .field("pending", &self.buffer.pending_write_data().len())
            .field("error", &self.error)
            .finish()
    }
}

fn deliver<W: Write>(sink: &mut W, bytes: &[u8]) -> io::Result<()> {
    if !bytes.is_empty() {
        sink.write_all(bytes)?;
    }
    sink.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stream_identities() {
        assert_eq!(StdStream::Output.fd(), 1);
        assert_eq!(StdStream::Error.fd(), 2);
        assert_eq!(StdStream::Output.to_string(), "stdout");
        assert_eq!(StdStream::Error.name(), "stderr");
    }

    #[test]
    fn full_buffered_stream_holds_until_flush() {
        let mut s = StdioStream::new(StdStream::Output, Vec::new(), BufMode::Full);
        assert_eq!(s.fputs("stdout\n"), 7);
        assert!(s.get_ref().is_empty());
        assert_eq!(s.pending(), b"stdout\n");
        s.fflush().unwrap();
        assert_eq!(s.get_ref().as_slice(), b"stdout\n");
        assert!(s.pending().is_empty());
    }

    #[test]
    fn line_buffered_stream_delivers_on_newline() {
        let mut s = StdioStream::new(StdStream::Output, Vec::new(), BufMode::Line);
        s.fputs("stdout\n");
        assert_eq!(s.get_ref().as_slice(), b"stdout\n");
    }

    #[test]
    fn default_modes_follow_destination() {
        let out_tty = StdioStream::with_default_mode(StdStream::Output, Vec::new(), true);
        let out_pipe = StdioStream::with_default_mode(StdStream::Output, Vec::new(), false);
        let err_pipe = StdioStream::with_default_mode(StdStream::Error, Vec::new(), false);
        assert_eq!(out_tty.buf_mode(), BufMode::Line);
        assert_eq!(out_pipe.buf_mode(), BufMode::Full);
        assert_eq!(err_pipe.buf_mode(), BufMode::None);
    }

    #[test]
    fn failed_delivery_sets_error_indicator() {
        let mut s = StdioStream::new(StdStream::Error, BrokenPipe, BufMode::None);
        assert_eq!(s.fputs("stderr\n"), 0);
        assert!(s.is_error());
    }

    #[test]
    fn failed_flush_discards_pending_bytes() {
        let mut s = StdioStream::new(StdStream::Output, BrokenPipe, BufMode::Full);
        assert_eq!(s.fputs("stdout\n"), 7);
        assert!(!s.is_error());
        assert!(s.fflush().is_err());
        assert!(s.is_error());
        assert!(s.pending().is_empty());
    }

    #[test]
    fn io_write_reports_rejected_bytes() {
        let mut s = StdioStream::new(StdStream::Output, BrokenPipe, BufMode::Line);
        assert!(s.write_all(b"stdout\n").is_err());
        assert!(s.is_error());

        let mut ok = StdioStream::new(StdStream::Output, Vec::new(), BufMode::Full);
        ok.write_all(b"stdout\n").unwrap();
        assert!(ok.get_ref().is_empty());
        Write::flush(&mut ok).unwrap();
        assert_eq!(ok.get_ref().as_slice(), b"stdout\n");
    }
}
