//! Write-side buffering engine.
//!
//! Models the three POSIX stdio buffering disciplines: fully-buffered
//! (`_IOFBF`), line-buffered (`_IOLBF`) and unbuffered (`_IONBF`).
//!
//! Reference: POSIX.1-2024 setvbuf, ISO C11 7.21.3
//!
//! The buffer only decides *when* bytes leave the process. It never
//! performs I/O itself: every write returns the bytes the caller must hand
//! to the sink right now, and whatever remains is pending until the next
//! flush.

use serde::{Deserialize, Serialize};

/// Default buffer size (POSIX BUFSIZ).
pub const BUFSIZ: usize = 8192;

/// Buffering disciplines of POSIX `_IOFBF`, `_IOLBF` and `_IONBF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufMode {
    /// Fully buffered: bytes leave when the buffer overflows or on flush.
    Full,
    /// Line buffered: bytes leave through each newline.
    Line,
    /// Unbuffered: every write goes straight to the sink.
    None,
}

impl BufMode {
    /// Short name used in transcripts and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            BufMode::Full => "full",
            BufMode::Line => "line",
            BufMode::None => "none",
        }
    }
}

/// Output buffer for one stream.
///
/// Invariant: `pos <= data.len()`; capacity is fixed at creation.
#[derive(Debug)]
pub struct StreamBuffer {
    data: Vec<u8>,
    /// Number of pending bytes at the front of `data`.
    pos: usize,
    mode: BufMode,
}

impl StreamBuffer {
    /// Create a new buffer with the given mode and capacity.
    pub fn new(mode: BufMode, capacity: usize) -> Self {
        Self {
            data: vec![0u8; effective_capacity(mode, capacity)],
            pos: 0,
            mode,
        }
    }

    pub fn mode(&self) -> BufMode {
        self.mode
    }

    /// Buffer a write.
    ///
    /// The caller must hand `flush_data` to the sink when `flush_needed`.
    pub fn write(&mut self, data: &[u8]) -> WriteResult {
        match self.mode {
            BufMode::None => WriteResult {
                buffered: 0,
                flush_needed: !data.is_empty(),
                flush_data: data.to_vec(),
            },
            BufMode::Full => self.write_full(data),
            BufMode::Line => self.write_line(data),
        }
    }

    /// Bytes accepted but not yet handed to the sink.
    pub fn pending_write_data(&self) -> &[u8] {
        &self.data[..self.pos]
    }

    /// Mark the pending bytes as delivered.
    pub fn mark_flushed(&mut self) {
        self.pos = 0;
    }

    fn write_full(&mut self, data: &[u8]) -> WriteResult {
        let remaining = self.data.len() - self.pos;
        if data.len() <= remaining {
            self.data[self.pos..self.pos + data.len()].copy_from_slice(data);
            self.pos += data.len();
            WriteResult {
                buffered: data.len(),
                flush_needed: false,
                flush_data: Vec::new(),
            }
        } else {
            // Overflow: pending bytes and the new data leave together.
            let mut flush = Vec::with_capacity(self.pos + data.len());
            flush.extend_from_slice(&self.data[..self.pos]);
            flush.extend_from_slice(data);
            self.pos = 0;
            WriteResult {
                buffered: 0,
                flush_needed: true,
                flush_data: flush,
            }
        }
    }

    fn write_line(&mut self, data: &[u8]) -> WriteResult {
        let Some(nl_pos) = data.iter().rposition(|&b| b == b'\n') else {
            return self.write_full(data);
        };

        let flush_end = nl_pos + 1;
        let mut flush = Vec::with_capacity(self.pos + flush_end);
        flush.extend_from_slice(&self.data[..self.pos]);
        flush.extend_from_slice(&data[..flush_end]);
        self.pos = 0;

        let remainder = &data[flush_end..];
        if remainder.len() > self.data.len() {
            // Tail without a newline that cannot fit either: send it too.
            flush.extend_from_slice(remainder);
            return WriteResult {
                buffered: 0,
                flush_needed: true,
                flush_data: flush,
            };
        }
        self.data[..remainder.len()].copy_from_slice(remainder);
        self.pos = remainder.len();

        WriteResult {
            buffered: remainder.len(),
            flush_needed: true,
            flush_data: flush,
        }
    }
}

fn effective_capacity(mode: BufMode, requested: usize) -> usize {
    if matches!(mode, BufMode::None) {
        0
    } else {
        requested.max(1)
    }
}

/// Result of a buffered write operation.
#[derive(Debug)]
pub struct WriteResult {
    /// How many bytes of this write were retained in the buffer.
    pub buffered: usize,
    /// Whether the caller must write `flush_data` to the sink now.
    pub flush_needed: bool,
    /// Bytes that must be handed to the sink.
    pub flush_data: Vec<u8>,
}
