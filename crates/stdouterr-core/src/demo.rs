//! The demonstration routine: one line to stdout, then one to stderr.

use std::io::Write;

use crate::stdio::StdStream;

pub const STDOUT_TEXT: &str = "stdout\n";
pub const STDERR_TEXT: &str = "stderr\n";

/// The exact bytes the routine writes to `stream`.
pub const fn text_for(stream: StdStream) -> &'static str {
    match stream {
        StdStream::Output => STDOUT_TEXT,
        StdStream::Error => STDERR_TEXT,
    }
}

/// Write [`STDOUT_TEXT`] to `out`, then [`STDERR_TEXT`] to `err`.
///
/// Nothing is checked and nothing is buffered here: each literal goes to
/// its writer in one call, a failure is dropped, and the second write
/// happens regardless.
pub fn run<O: Write, E: Write>(out: &mut O, err: &mut E) {
    let _ = out.write_all(STDOUT_TEXT.as_bytes());
    let _ = err.write_all(STDERR_TEXT.as_bytes());
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    use super::*;
    use crate::stdio::{BufMode, StdioStream};

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_each_literal_once() {
        let mut out = StdioStream::new(StdStream::Output, Vec::new(), BufMode::Line);
        let mut err = StdioStream::new(StdStream::Error, Vec::new(), BufMode::None);
        run(&mut out, &mut err);
        assert_eq!(out.get_ref().as_slice(), b"stdout\n");
        assert_eq!(err.get_ref().as_slice(), b"stderr\n");
    }

    #[test]
    fn failed_stdout_does_not_stop_stderr() {
        let mut out = StdioStream::new(StdStream::Output, Closed, BufMode::Line);
        let mut err = StdioStream::new(StdStream::Error, Vec::new(), BufMode::None);
        run(&mut out, &mut err);
        assert!(out.is_error());
        assert_eq!(err.get_ref().as_slice(), b"stderr\n");
    }

    /// Appends to a log shared by both streams.
    struct Shared(Rc<RefCell<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn plain_writers_receive_lines_in_program_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut out = Shared(Rc::clone(&log));
        let mut err = Shared(Rc::clone(&log));
        run(&mut out, &mut err);
        assert_eq!(log.borrow().as_slice(), b"stdout\nstderr\n");
    }

    #[test]
    fn failed_raw_write_is_ignored() {
        let mut err = Vec::new();
        run(&mut Closed, &mut err);
        assert_eq!(err, b"stderr\n");
    }

    #[test]
    fn text_for_matches_constants() {
        assert_eq!(text_for(StdStream::Output), STDOUT_TEXT);
        assert_eq!(text_for(StdStream::Error), STDERR_TEXT);
    }
}
