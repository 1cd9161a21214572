//! Default buffering policy for the standard streams.
//!
//! ISO C11 7.21.3p7: stderr is never fully buffered; stdin and stdout are
//! fully buffered only when they do not refer to an interactive device.
//! glibc goes further and leaves stderr unbuffered, which is the behavior
//! modelled here.

use super::buffer::BufMode;
use super::stream::StdStream;

/// Buffering mode a freshly started process gives `stream`.
pub fn default_mode(stream: StdStream, is_terminal: bool) -> BufMode {
    match stream {
        StdStream::Error => BufMode::None,
        StdStream::Output if is_terminal => BufMode::Line,
        StdStream::Output => BufMode::Full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_is_unbuffered_everywhere() {
        assert_eq!(default_mode(StdStream::Error, true), BufMode::None);
        assert_eq!(default_mode(StdStream::Error, false), BufMode::None);
    }

    #[test]
    fn stdout_depends_on_terminal() {
        assert_eq!(default_mode(StdStream::Output, true), BufMode::Line);
        assert_eq!(default_mode(StdStream::Output, false), BufMode::Full);
    }
}
