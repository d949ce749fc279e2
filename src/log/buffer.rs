// src/log/buffer.rs

//! Append-only line store with bounded range reads.
//!
//! Small logs live in a `Vec<String>`. Once the number of lines reaches the
//! configured in-memory limit, every line is moved into an anonymous temp
//! file and only a byte-offset index stays in memory, so arbitrarily long
//! output does not grow the heap with it.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use super::LogError;

/// Bounds applied to the `limit` of a range read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub min: usize,
    pub max: usize,
}

impl PageLimits {
    /// Bounds with `1 <= min <= max`; an inverted `max` is raised to `min`.
    pub fn normalized(self) -> Self {
        let min = self.min.max(1);
        Self {
            min,
            max: self.max.max(min),
        }
    }

    pub fn clamp(&self, requested: usize) -> usize {
        requested.max(self.min).min(self.max)
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self { min: 10, max: 500 }
    }
}

/// One page of log lines together with the clamped request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogPage {
    pub items: Vec<String>,
    pub offset: usize,
    pub page_size: usize,
    pub count: usize,
}

#[derive(Debug)]
enum Store {
    Memory(Vec<String>),
    Spilled(SpillFile),
    Disposed,
}

/// Line storage backed by a temp file.
///
/// `offsets[i]` is the byte position where line `i` starts; line `i` ends
/// where line `i + 1` starts, or at `end` for the last line.
#[derive(Debug)]
struct SpillFile {
    file: File,
    offsets: Vec<u64>,
    end: u64,
}

impl SpillFile {
    fn create(dir: Option<&PathBuf>) -> io::Result<Self> {
        let file = match dir {
            Some(dir) => tempfile::tempfile_in(dir)?,
            None => tempfile::tempfile()?,
        };
        Ok(Self {
            file,
            offsets: Vec::new(),
            end: 0,
        })
    }

    fn append(&mut self, line: &str) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(self.end))?;
        self.file.write_all(line.as_bytes())?;
        self.offsets.push(self.end);
        self.end += line.len() as u64;
        Ok(())
    }

    fn read(&mut self, start: usize, stop: usize) -> io::Result<Vec<String>> {
        if start >= stop {
            return Ok(Vec::new());
        }

        let from = self.offsets[start];
        let to = self.offsets.get(stop).copied().unwrap_or(self.end);

        let mut bytes = vec![0u8; (to - from) as usize];
        self.file.seek(SeekFrom::Start(from))?;
        self.file.read_exact(&mut bytes)?;

        let mut lines = Vec::with_capacity(stop - start);
        for i in start..stop {
            let a = (self.offsets[i] - from) as usize;
            let b = (self.offsets.get(i + 1).copied().unwrap_or(self.end) - from) as usize;
            let line = std::str::from_utf8(&bytes[a..b])
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            lines.push(line.to_string());
        }
        Ok(lines)
    }
}

/// Append-only, line-oriented log for one run.
///
/// The buffer itself is not synchronised; the owning run entry guards it
/// together with the rest of its state.
#[derive(Debug)]
pub struct LogBuffer {
    store: Store,
    memory_lines: usize,
    spill_dir: Option<PathBuf>,
    limits: PageLimits,
}

impl LogBuffer {
    pub fn new(memory_lines: usize, spill_dir: Option<PathBuf>, limits: PageLimits) -> Self {
        Self {
            store: Store::Memory(Vec::new()),
            memory_lines: memory_lines.max(1),
            spill_dir,
            limits: limits.normalized(),
        }
    }

    /// Number of lines appended so far. Zero once disposed.
    pub fn len(&self) -> usize {
        match &self.store {
            Store::Memory(lines) => lines.len(),
            Store::Spilled(spill) => spill.offsets.len(),
            Store::Disposed => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.store, Store::Disposed)
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self.store, Store::Spilled(_))
    }

    /// Append one line, visible to subsequent reads immediately.
    pub fn append(&mut self, line: impl Into<String>) -> Result<(), LogError> {
        let line = line.into();
        match &mut self.store {
            Store::Memory(lines) => {
                lines.push(line);
                if lines.len() >= self.memory_lines {
                    self.spill()?;
                }
                Ok(())
            }
            Store::Spilled(spill) => Ok(spill.append(&line)?),
            Store::Disposed => Err(LogError::Disposed),
        }
    }

    /// Read up to `limit` lines starting at `offset`.
    ///
    /// `offset` is clamped to `[0, len]` and `limit` to the configured page
    /// bounds; a short buffer simply yields fewer lines.
    pub fn read(&mut self, offset: usize, limit: usize) -> Result<Vec<String>, LogError> {
        Ok(self.page(offset, limit)?.items)
    }

    /// Like [`LogBuffer::read`], but also reports the clamped parameters and
    /// the total line count observed at the time of the read.
    pub fn page(&mut self, offset: usize, limit: usize) -> Result<LogPage, LogError> {
        let page_size = self.limits.clamp(limit);
        let count = self.len();
        let offset = offset.min(count);
        let stop = offset.saturating_add(page_size).min(count);

        let items = match &mut self.store {
            Store::Memory(lines) => lines[offset..stop].to_vec(),
            Store::Spilled(spill) => spill.read(offset, stop)?,
            Store::Disposed => return Err(LogError::Disposed),
        };

        Ok(LogPage {
            items,
            offset,
            page_size,
            count,
        })
    }

    /// Release the underlying storage. Safe to call more than once.
    pub fn dispose(&mut self) {
        let lines = self.len();
        // Dropping the temp file handle removes it from disk.
        self.store = Store::Disposed;
        debug!(lines, "log buffer disposed");
    }

    fn spill(&mut self) -> Result<(), LogError> {
        let Store::Memory(lines) = &mut self.store else {
            return Ok(());
        };

        let mut spill = SpillFile::create(self.spill_dir.as_ref())?;
        for line in lines.iter() {
            spill.append(line)?;
        }
        debug!(lines = spill.offsets.len(), "log buffer spilled to disk");
        self.store = Store::Spilled(spill);
        Ok(())
    }
}
