//! # stdouterr-core
//!
//! The pieces behind the `stdouterr` demonstration: a model of POSIX stdio
//! output buffering, a model of shell output redirection, the two-line
//! routine itself, and a simulator that combines them to predict which
//! bytes reach which destination, in which order.

#![forbid(unsafe_code)]

pub mod demo;
pub mod error;
pub mod interleave;
pub mod redirect;
pub mod stdio;

pub use error::RedirectError;
pub use interleave::{Delivery, Timeline, simulate};
pub use redirect::{Destination, FdTable, OpenFile, Redirection, parse_redirections};
pub use stdio::{BufMode, StdStream, StdioStream};
