//! Model of C standard I/O output streams.
//!
//! Covers the subset of `<stdio.h>` that decides when output leaves a
//! process: buffered writes to stdout and stderr, the default buffering
//! policy, and the flush that happens at exit. The simulator drives these
//! streams over recording sinks; the binary writes to the real streams.

pub mod buffer;
pub mod policy;
pub mod stream;

pub use buffer::{BUFSIZ, BufMode, StreamBuffer};
pub use policy::default_mode;
pub use stream::{StdStream, StdioStream};
