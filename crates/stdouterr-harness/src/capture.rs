//! Process capture.
//!
//! Runs the demo binary for real. `capture_streams` collects stdout and
//! stderr separately; `capture_scenario` rebuilds the descriptor table a
//! shell would produce for a redirection list and wires the child to it:
//! every descriptor routed to the pipe shares one OS pipe, every
//! descriptor routed to the terminal shares a second one, `/dev/null` is
//! `/dev/null`, and files are opened under the scratch directory, one
//! `File` per `>word` so that only `N>&M` copies share an offset. File
//! words that would resolve outside the scratch directory are refused.
//!
//! Both capture pipes are plain pipes, so the child never sees a terminal.
//! Only per-destination content is comparable against the model; order
//! across streams is not.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::io::{self, PipeReader, PipeWriter, Read};
use std::path::Path;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stdouterr_core::{Destination, FdTable, OpenFile, RedirectError, Redirection, StdStream};

use crate::error::HarnessError;

/// Separately captured standard streams of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCapture {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` if the child was killed by a signal.
    pub exit_code: Option<i32>,
}

impl StreamCapture {
    pub fn bytes(&self, stream: StdStream) -> &[u8] {
        match stream {
            StdStream::Output => &self.stdout,
            StdStream::Error => &self.stderr,
        }
    }
}

/// What each destination received during one scenario run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessCapture {
    pub exit_code: Option<i32>,
    pub pipe: Vec<u8>,
    pub terminal: Vec<u8>,
    /// File contents keyed by the word used in the redirection.
    pub files: BTreeMap<String, Vec<u8>>,
}

impl ProcessCapture {
    /// Bytes captured for `destination`; `/dev/null` is always empty.
    pub fn bytes_at(&self, destination: &Destination) -> &[u8] {
        match destination {
            Destination::Pipe => &self.pipe,
            Destination::Terminal => &self.terminal,
            Destination::Null => &[],
            Destination::File(path) => self.files.get(path).map(Vec::as_slice).unwrap_or(&[]),
        }
    }

    pub fn lines_at(&self, destination: &Destination) -> Vec<String> {
        String::from_utf8_lossy(self.bytes_at(destination))
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Hex SHA-256 of captured bytes.
pub fn digest_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// How to start the binary for a stream capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct Invocation<'a> {
    pub args: &'a [&'a str],
    /// Start the child with an empty environment.
    pub clear_env: bool,
    /// Working directory for the child.
    pub cwd: Option<&'a Path>,
    /// Give the child a stdout pipe whose read end is already closed, so
    /// every write to it fails with `EPIPE`.
    pub broken_stdout: bool,
}

/// Run `binary`, capturing stdout and stderr separately.
pub fn capture_streams(
    binary: &Path,
    invocation: &Invocation<'_>,
) -> Result<StreamCapture, HarnessError> {
    let mut command = Command::new(binary);
    command.args(invocation.args).stdin(Stdio::null());
    if invocation.clear_env {
        command.env_clear();
    }
    if let Some(cwd) = invocation.cwd {
        command.current_dir(cwd);
    }
    if invocation.broken_stdout {
        let (reader, writer) = io::pipe()?;
        drop(reader);
        command.stdout(writer);
    }
    // An explicitly wired stdout is not captured and comes back empty.
    let output = command.output()?;
    Ok(StreamCapture {
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.status.code(),
    })
}

/// Run `binary` as `binary <redirections> | ts` would, minus `ts`.
pub fn capture_scenario(
    binary: &Path,
    redirections: &[Redirection],
    workdir: &Path,
) -> Result<ProcessCapture, HarnessError> {
    for redirection in redirections {
        if let Redirection::Open { target, .. } = redirection
            && target.escapes_directory()
        {
            return Err(RedirectError::EscapesWorkdir {
                word: target.to_string(),
            }
            .into());
        }
    }
    let table = FdTable::resolve(FdTable::piped(), redirections)?;
    std::fs::create_dir_all(workdir)?;

    let (pipe_reader, pipe_writer) = io::pipe()?;
    let (terminal_reader, terminal_writer) = io::pipe()?;
    let mut wiring = Wiring {
        pipe: &pipe_writer,
        terminal: &terminal_writer,
        workdir,
        files: BTreeMap::new(),
        names: BTreeSet::new(),
    };

    let mut command = Command::new(binary);
    command
        .stdin(Stdio::null())
        .stdout(wiring.stdio_for(table.route_open(StdStream::Output))?)
        .stderr(wiring.stdio_for(table.route_open(StdStream::Error))?);
    let mut child = command.spawn()?;

    // Only the child may hold write ends now, or the readers never see EOF.
    let file_names = std::mem::take(&mut wiring.names);
    drop(wiring);
    drop(command);
    drop(pipe_writer);
    drop(terminal_writer);

    let (pipe, terminal) = std::thread::scope(|scope| {
        let pipe = scope.spawn(move || drain(pipe_reader));
        let terminal = drain(terminal_reader);
        let pipe = pipe
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("pipe reader panicked")));
        (pipe, terminal)
    });
    let status = child.wait()?;

    let mut files = BTreeMap::new();
    for name in file_names {
        let content = std::fs::read(workdir.join(&name))?;
        files.insert(name, content);
    }

    Ok(ProcessCapture {
        exit_code: status.code(),
        pipe: pipe?,
        terminal: terminal?,
        files,
    })
}

struct Wiring<'a> {
    pipe: &'a PipeWriter,
    terminal: &'a PipeWriter,
    workdir: &'a Path,
    /// One handle per open file description id.
    files: BTreeMap<usize, File>,
    names: BTreeSet<String>,
}

impl Wiring<'_> {
    fn stdio_for(&mut self, open: Option<&OpenFile>) -> io::Result<Stdio> {
        // A closed descriptor cannot be requested through std; /dev/null
        // is observationally the same for a program that never checks.
        let Some(open) = open else {
            return Ok(Stdio::null());
        };
        Ok(match &open.destination {
            Destination::Pipe => Stdio::from(self.pipe.try_clone()?),
            Destination::Terminal => Stdio::from(self.terminal.try_clone()?),
            Destination::Null => Stdio::null(),
            Destination::File(name) => {
                let file = match self.files.entry(open.id) {
                    Entry::Occupied(entry) => entry.get().try_clone()?,
                    Entry::Vacant(entry) => {
                        let path = self.workdir.join(name);
                        let file = if open.append {
                            OpenOptions::new().create(true).append(true).open(path)?
                        } else {
                            File::create(path)?
                        };
                        self.names.insert(name.clone());
                        entry.insert(file).try_clone()?
                    }
                };
                Stdio::from(file)
            }
        })
    }
}

fn drain(mut reader: PipeReader) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}
