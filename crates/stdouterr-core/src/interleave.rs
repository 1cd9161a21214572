//! Deterministic model of what each destination receives, and when.
//!
//! The simulator runs the real demo routine against recording sinks. Each
//! stream gets the default buffering mode for wherever the descriptor
//! table routes it, and both streams are flushed after the routine returns
//! in the same order `exit(3)` uses. The resulting timeline is the order in
//! which bytes leave the process, which is what a downstream `ts` or a
//! terminal observes.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use serde::Serialize;

use crate::demo;
use crate::redirect::{Destination, FdTable, OpenFile};
use crate::stdio::{BufMode, StdStream, StdioStream};

/// One chunk of bytes leaving the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    /// Position in the process-wide delivery order, starting at 0.
    pub seq: usize,
    pub stream: StdStream,
    pub destination: Destination,
    /// Id of the open file description the bytes went through.
    pub open: usize,
    /// Byte offset written at, for regular files.
    pub offset: Option<usize>,
    pub bytes: Vec<u8>,
}

impl Delivery {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Everything the process delivered, in order.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub stdout_mode: BufMode,
    pub stderr_mode: BufMode,
    pub deliveries: Vec<Delivery>,
}

impl Timeline {
    pub fn mode(&self, stream: StdStream) -> BufMode {
        match stream {
            StdStream::Output => self.stdout_mode,
            StdStream::Error => self.stderr_mode,
        }
    }

    /// Deliveries that reached `destination`, in order.
    pub fn at<'a>(&'a self, destination: &'a Destination) -> impl Iterator<Item = &'a Delivery> {
        self.deliveries
            .iter()
            .filter(move |d| &d.destination == destination)
    }

    /// Final content of `destination`.
    ///
    /// Pipes and terminals receive every delivery in order. A file is
    /// rebuilt from offsets, so writes through separately opened
    /// descriptions overwrite each other the way they do on disk.
    pub fn bytes_at(&self, destination: &Destination) -> Vec<u8> {
        let mut content = Vec::new();
        for d in self.at(destination) {
            let start = d.offset.unwrap_or(content.len());
            let end = start + d.bytes.len();
            if content.len() < end {
                content.resize(end, 0);
            }
            content[start..end].copy_from_slice(&d.bytes);
        }
        content
    }

    /// Lines as a line-oriented reader of `destination` would see them.
    pub fn lines_at(&self, destination: &Destination) -> Vec<String> {
        String::from_utf8_lossy(&self.bytes_at(destination))
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Human-readable delivery log, one tagged line per output line.
    ///
    /// Output discarded into `/dev/null` is left out.
    pub fn transcript(&self) -> Vec<String> {
        self.deliveries
            .iter()
            .filter(|d| d.destination != Destination::Null)
            .flat_map(|d| {
                d.text()
                    .lines()
                    .map(|line| format!("[{}] {line}", d.destination))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// Sink that appends every write to a shared delivery log.
///
/// A recorder for a closed descriptor rejects every write.
#[derive(Debug, Clone)]
pub struct Recorder {
    stream: StdStream,
    open: Option<OpenFile>,
    log: Rc<RefCell<Vec<Delivery>>>,
}

impl Write for Recorder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(open) = &self.open else {
            return Err(io::Error::other("bad file descriptor"));
        };
        let mut log = self.log.borrow_mut();
        let offset = matches!(open.destination, Destination::File(_)).then(|| {
            if open.append {
                end_of_file(&log, &open.destination)
            } else {
                description_offset(&log, open.id)
            }
        });
        let seq = log.len();
        log.push(Delivery {
            seq,
            stream: self.stream,
            destination: open.destination.clone(),
            open: open.id,
            offset,
            bytes: buf.to_vec(),
        });
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn end_of_file(log: &[Delivery], destination: &Destination) -> usize {
    log.iter()
        .filter(|d| &d.destination == destination)
        .filter_map(|d| d.offset.map(|offset| offset + d.bytes.len()))
        .max()
        .unwrap_or(0)
}

fn description_offset(log: &[Delivery], id: usize) -> usize {
    log.iter()
        .rev()
        .find(|d| d.open == id)
        .and_then(|d| d.offset.map(|offset| offset + d.bytes.len()))
        .unwrap_or(0)
}

/// Run the demo routine under `table` and record what leaves the process.
pub fn simulate(table: &FdTable) -> Timeline {
    simulate_with(table, demo::run)
}

/// Run an arbitrary routine over the two standard streams under `table`.
pub fn simulate_with<F>(table: &FdTable, program: F) -> Timeline
where
    F: FnOnce(&mut StdioStream<Recorder>, &mut StdioStream<Recorder>),
{
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut out = recording_stream(StdStream::Output, table, &log);
    let mut err = recording_stream(StdStream::Error, table, &log);
    let stdout_mode = out.buf_mode();
    let stderr_mode = err.buf_mode();

    program(&mut out, &mut err);

    // exit(3) flushes stdout before stderr.
    drop(out);
    drop(err);

    Timeline {
        stdout_mode,
        stderr_mode,
        deliveries: log.take(),
    }
}

fn recording_stream(
    stream: StdStream,
    table: &FdTable,
    log: &Rc<RefCell<Vec<Delivery>>>,
) -> StdioStream<Recorder> {
    let open = table.route_open(stream).cloned();
    let is_terminal = open
        .as_ref()
        .is_some_and(|open| open.destination.is_terminal());
    let recorder = Recorder {
        stream,
        open,
        log: Rc::clone(log),
    };
    StdioStream::with_default_mode(stream, recorder, is_terminal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redirect::parse_redirections;

    fn run(words: &str) -> Timeline {
        let table = FdTable::resolve(FdTable::piped(), &parse_redirections(words).unwrap()).unwrap();
        simulate(&table)
    }

    #[test]
    fn plain_pipe_shows_stderr_before_stdout() {
        let timeline = run("");
        assert_eq!(timeline.stdout_mode, BufMode::Full);
        assert_eq!(timeline.stderr_mode, BufMode::None);
        assert_eq!(
            timeline.transcript(),
            vec!["[terminal] stderr", "[pipe] stdout"]
        );
        assert_eq!(timeline.deliveries[0].stream, StdStream::Error);
        assert_eq!(timeline.deliveries[1].stream, StdStream::Output);
    }

    #[test]
    fn null_then_dup_delivers_nothing_visible() {
        let timeline = run(">/dev/null 2>&1");
        assert!(timeline.transcript().is_empty());
        assert!(timeline.lines_at(&Destination::Pipe).is_empty());
        assert_eq!(timeline.at(&Destination::Null).count(), 2);
    }

    #[test]
    fn dup_then_null_pipes_only_stderr() {
        let timeline = run("2>&1 >/dev/null");
        assert_eq!(timeline.lines_at(&Destination::Pipe), vec!["stderr"]);
        assert!(timeline.lines_at(&Destination::Terminal).is_empty());
    }

    #[test]
    fn merged_pipe_orders_stderr_first() {
        let timeline = run("2>&1");
        assert_eq!(
            timeline.lines_at(&Destination::Pipe),
            vec!["stderr", "stdout"]
        );
    }

    #[test]
    fn terminal_stdout_is_line_buffered_and_in_program_order() {
        let timeline = simulate(&FdTable::terminal());
        assert_eq!(timeline.mode(StdStream::Output), BufMode::Line);
        assert_eq!(
            timeline.lines_at(&Destination::Terminal),
            vec!["stdout", "stderr"]
        );
    }

    #[test]
    fn file_destination_collects_bytes() {
        let timeline = run(">out.txt");
        assert_eq!(
            timeline.bytes_at(&Destination::File("out.txt".into())),
            b"stdout\n"
        );
    }

    #[test]
    fn shared_description_appends_in_delivery_order() {
        let timeline = run(">both.txt 2>&1");
        assert_eq!(
            timeline.bytes_at(&Destination::File("both.txt".into())),
            b"stderr\nstdout\n"
        );
    }

    #[test]
    fn separate_opens_overwrite_from_offset_zero() {
        // stderr lands first at offset 0; stdout's exit flush rewrites it.
        let timeline = run(">same.txt 2>same.txt");
        assert_eq!(
            timeline.bytes_at(&Destination::File("same.txt".into())),
            b"stdout\n"
        );
        assert!(timeline.deliveries.iter().all(|d| d.offset == Some(0)));
    }

    #[test]
    fn append_opens_write_at_end_of_file() {
        let timeline = run(">>log.txt 2>>log.txt");
        assert_eq!(
            timeline.bytes_at(&Destination::File("log.txt".into())),
            b"stderr\nstdout\n"
        );
    }

    #[test]
    fn closed_stdout_loses_its_line() {
        let timeline = run(">&-");
        assert_eq!(timeline.deliveries.len(), 1);
        assert_eq!(timeline.deliveries[0].stream, StdStream::Error);
    }

    #[test]
    fn custom_program_sees_same_streams() {
        let timeline = simulate_with(&FdTable::piped(), |out, err| {
            err.fputs("first\n");
            out.fputs("second\n");
            out.fflush().unwrap();
            err.fputs("third\n");
        });
        assert_eq!(
            timeline.transcript(),
            vec!["[terminal] first", "[pipe] second", "[terminal] third"]
        );
    }
}
