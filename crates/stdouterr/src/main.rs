//! Demonstrates how shell redirection order decides what a pipeline sees.
//!
//! Piped into a line timestamper such as `ts`:
//!
//! ```text
//! $ stdouterr | ts
//! stderr
//! Mar 11 21:55:03 stdout
//!
//! $ stdouterr >/dev/null 2>&1 | ts
//!
//! $ stdouterr 2>&1 >/dev/null | ts
//! Mar 11 21:55:38 stderr
//! ```
//!
//! Both lines go straight to the process's standard streams with whatever
//! buffering they carry by default. `stdouterr-harness predict` shows the
//! order a C stdio program (stdout fully buffered on a pipe) would produce.

use std::io;

use stdouterr_core::demo;

fn main() {
    demo::run(&mut io::stdout(), &mut io::stderr());
}
