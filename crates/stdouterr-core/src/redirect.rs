//! Shell output redirections and the descriptor table they act on.
//!
//! A POSIX shell processes redirections strictly left to right, and a
//! duplication (`2>&1`) copies whatever the source descriptor points at
//! *at that moment*. That rule is the whole reason `>/dev/null 2>&1` and
//! `2>&1 >/dev/null` behave differently, so `FdTable::apply` follows it
//! exactly.
//!
//! Reference: POSIX.1-2024 XCU 2.7 Redirection

use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::RedirectError;
use crate::stdio::StdStream;

/// Highest descriptor a redirection may name (single-digit, like `sh`).
pub const MAX_FD: u8 = 9;

/// Where an open descriptor leads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum Destination {
    /// The controlling terminal the shell was started from.
    Terminal,
    /// The write end of the pipeline into the downstream filter.
    Pipe,
    /// `/dev/null`.
    Null,
    /// A regular file, by the word used to name it.
    File(String),
}

impl Destination {
    /// Interpret a redirection target word.
    pub fn from_word(word: &str) -> Self {
        match word {
            "/dev/null" => Destination::Null,
            "/dev/tty" => Destination::Terminal,
            _ => Destination::File(word.to_string()),
        }
    }

    /// Whether `isatty(3)` would report true for a descriptor opened here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Destination::Terminal)
    }

    /// Whether this is a file word that resolves outside the directory it
    /// is opened from (absolute, or climbing through `..`).
    pub fn escapes_directory(&self) -> bool {
        let Destination::File(word) = self else {
            return false;
        };
        Path::new(word).components().any(|c| {
            matches!(
                c,
                Component::RootDir | Component::Prefix(_) | Component::ParentDir
            )
        })
    }
}

/// An open file description: what one `open` created and every `dup`
/// of it shares, including the file offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    /// Distinct per `open`; copies made by `N>&M` keep the source's id.
    pub id: usize,
    pub destination: Destination,
    /// Opened with `>>`: every write lands at the current end of file.
    pub append: bool,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Terminal => f.write_str("terminal"),
            Destination::Pipe => f.write_str("pipe"),
            Destination::Null => f.write_str("/dev/null"),
            Destination::File(path) => f.write_str(path),
        }
    }
}

/// One output redirection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Redirection {
    /// `N>word` / `N>>word`
    Open {
        fd: u8,
        target: Destination,
        append: bool,
    },
    /// `N>&M`
    Dup { fd: u8, source: u8 },
    /// `N>&-`
    Close { fd: u8 },
}

impl fmt::Display for Redirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Redirection::Open { fd, target, append } => {
                let op = if *append { ">>" } else { ">" };
                let word = match target {
                    Destination::Terminal => "/dev/tty".to_string(),
                    Destination::Pipe => "|".to_string(),
                    other => other.to_string(),
                };
                write!(f, "{fd}{op}{word}")
            }
            Redirection::Dup { fd, source } => write!(f, "{fd}>&{source}"),
            Redirection::Close { fd } => write!(f, "{fd}>&-"),
        }
    }
}

/// Parse a whitespace-separated list of output redirections.
///
/// Accepts `>word`, `N>word`, `N>>word`, `N>&M` and `N>&-`; the target
/// may also be the following word (`2> /dev/null`). An empty string
/// yields no redirections.
pub fn parse_redirections(input: &str) -> Result<Vec<Redirection>, RedirectError> {
    let mut words = input.split_whitespace();
    let mut parsed = Vec::new();
    while let Some(word) = words.next() {
        parsed.push(parse_word(word, &mut words)?);
    }
    Ok(parsed)
}

fn parse_word<'a>(
    word: &'a str,
    rest: &mut impl Iterator<Item = &'a str>,
) -> Result<Redirection, RedirectError> {
    let digits_end = word
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(word.len());
    let (fd_text, op) = word.split_at(digits_end);
    let Some(after_gt) = op.strip_prefix('>') else {
        return Err(RedirectError::Unsupported(word.to_string()));
    };
    let fd = if fd_text.is_empty() {
        StdStream::Output.fd()
    } else {
        descriptor(fd_text, word)?
    };

    if let Some(after_amp) = after_gt.strip_prefix('&') {
        let target = take_target(after_amp, word, rest)?;
        if target == "-" {
            return Ok(Redirection::Close { fd });
        }
        if !target.bytes().all(|b| b.is_ascii_digit()) {
            // `>&word` is the bash spelling of `&>word`.
            return Err(RedirectError::Unsupported(word.to_string()));
        }
        let source = descriptor(target, word)?;
        return Ok(Redirection::Dup { fd, source });
    }

    let (append, path) = match after_gt.strip_prefix('>') {
        Some(path) => (true, path),
        None => (false, after_gt),
    };
    if path.starts_with(['>', '&', '|']) {
        return Err(RedirectError::Unsupported(word.to_string()));
    }
    let path = take_target(path, word, rest)?;
    Ok(Redirection::Open {
        fd,
        target: Destination::from_word(path),
        append,
    })
}

fn take_target<'a>(
    inline: &'a str,
    word: &str,
    rest: &mut impl Iterator<Item = &'a str>,
) -> Result<&'a str, RedirectError> {
    if !inline.is_empty() {
        return Ok(inline);
    }
    rest.next().ok_or_else(|| RedirectError::EmptyTarget {
        word: word.to_string(),
    })
}

fn descriptor(text: &str, word: &str) -> Result<u8, RedirectError> {
    let fd: u32 = text
        .parse()
        .map_err(|_| RedirectError::Unsupported(word.to_string()))?;
    if fd > u32::from(MAX_FD) {
        return Err(RedirectError::BadDescriptor {
            fd,
            word: word.to_string(),
        });
    }
    Ok(fd as u8)
}

/// The descriptor table a shell builds for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdTable {
    slots: [Option<OpenFile>; MAX_FD as usize + 1],
    next_id: usize,
}

impl FdTable {
    fn with_std(stdout: Destination) -> Self {
        let terminal = OpenFile {
            id: 0,
            destination: Destination::Terminal,
            append: false,
        };
        let mut slots: [Option<OpenFile>; MAX_FD as usize + 1] = Default::default();
        slots[0] = Some(terminal.clone());
        slots[1] = Some(match stdout {
            Destination::Terminal => terminal.clone(),
            destination => OpenFile {
                id: 1,
                destination,
                append: false,
            },
        });
        slots[2] = Some(terminal);
        Self { slots, next_id: 2 }
    }

    /// `program | filter`, typed at a terminal.
    pub fn piped() -> Self {
        Self::with_std(Destination::Pipe)
    }

    /// `program`, typed at a terminal.
    pub fn terminal() -> Self {
        Self::with_std(Destination::Terminal)
    }

    /// Start from `base` and apply `redirections` left to right.
    pub fn resolve(base: FdTable, redirections: &[Redirection]) -> Result<Self, RedirectError> {
        let mut table = base;
        table.apply_all(redirections)?;
        Ok(table)
    }

    pub fn apply(&mut self, redirection: &Redirection) -> Result<(), RedirectError> {
        match redirection {
            Redirection::Open { fd, target, append } => {
                let id = self.next_id;
                self.next_id += 1;
                self.slots[usize::from(*fd)] = Some(OpenFile {
                    id,
                    destination: target.clone(),
                    append: *append,
                });
            }
            Redirection::Dup { fd, source } => {
                let current = self.slots[usize::from(*source)].clone().ok_or_else(|| {
                    RedirectError::BadDescriptor {
                        fd: u32::from(*source),
                        word: redirection.to_string(),
                    }
                })?;
                self.slots[usize::from(*fd)] = Some(current);
            }
            Redirection::Close { fd } => {
                self.slots[usize::from(*fd)] = None;
            }
        }
        Ok(())
    }

    pub fn apply_all(&mut self, redirections: &[Redirection]) -> Result<(), RedirectError> {
        redirections.iter().try_for_each(|r| self.apply(r))
    }

    /// Open file description behind `fd`, or `None` if closed or out of range.
    pub fn open_file(&self, fd: u8) -> Option<&OpenFile> {
        self.slots.get(usize::from(fd)).and_then(Option::as_ref)
    }

    /// Destination of `fd`, or `None` if it is closed or out of range.
    pub fn destination(&self, fd: u8) -> Option<&Destination> {
        self.open_file(fd).map(|open| &open.destination)
    }

    /// Where `stream` ends up after redirection.
    pub fn route(&self, stream: StdStream) -> Option<&Destination> {
        self.destination(stream.fd())
    }

    /// The open file description `stream` writes through.
    pub fn route_open(&self, stream: StdStream) -> Option<&OpenFile> {
        self.open_file(stream.fd())
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::piped()
    }
}
