// src/log/lines.rs

//! Incremental line splitting for character streams.

use std::mem;

/// Coalesces a stream of characters into completed lines.
///
/// Output from an operation arrives in arbitrary chunks, not pre-split
/// lines. The coalescer keeps the pending partial line across calls and
/// tracks how many characters of the terminator have matched so far; a line
/// is only emitted once the whole terminator has been seen. The terminator
/// itself is not part of the emitted line.
///
/// On a mismatch the match falls back along the terminator's prefix table,
/// so terminators that repeat their own start (`"\r\r\n"`) still match.
#[derive(Debug, Clone)]
pub struct LineCoalescer {
    terminator: Vec<char>,
    /// `fallback[i]`: length of the longest proper prefix of
    /// `terminator[..=i]` that is also its suffix.
    fallback: Vec<usize>,
    terminator_len: usize,
    matched: usize,
    pending: String,
}

impl LineCoalescer {
    /// Create a coalescer for the given terminator (e.g. `"\n"`, `"\r\n"`).
    ///
    /// An empty terminator falls back to `"\n"`.
    pub fn new(terminator: &str) -> Self {
        let terminator = if terminator.is_empty() { "\n" } else { terminator };
        let chars: Vec<char> = terminator.chars().collect();
        Self {
            fallback: prefix_table(&chars),
            terminator: chars,
            terminator_len: terminator.len(),
            matched: 0,
            pending: String::new(),
        }
    }

    /// Feed a single character; returns the completed line if this character
    /// finished a terminator match.
    pub fn push(&mut self, c: char) -> Option<String> {
        self.pending.push(c);

        while self.matched > 0 && c != self.terminator[self.matched] {
            self.matched = self.fallback[self.matched - 1];
        }
        if c == self.terminator[self.matched] {
            self.matched += 1;
        }

        if self.matched == self.terminator.len() {
            self.matched = 0;
            let keep = self.pending.len() - self.terminator_len;
            self.pending.truncate(keep);
            return Some(mem::take(&mut self.pending));
        }

        None
    }

    /// Feed a chunk of text, calling `emit` for every completed line.
    pub fn feed(&mut self, chunk: &str, mut emit: impl FnMut(String)) {
        for c in chunk.chars() {
            if let Some(line) = self.push(c) {
                emit(line);
            }
        }
    }

    /// Complete the pending partial line with `tail` and return it.
    ///
    /// Used for explicit "write line" calls, which terminate whatever was
    /// written before them.
    pub fn complete_with(&mut self, tail: &str) -> String {
        self.matched = 0;
        let mut line = mem::take(&mut self.pending);
        line.push_str(tail);
        line
    }

    /// Drain the pending partial line, if any.
    pub fn finish(&mut self) -> Option<String> {
        self.matched = 0;
        if self.pending.is_empty() {
            None
        } else {
            Some(mem::take(&mut self.pending))
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

fn prefix_table(pattern: &[char]) -> Vec<usize> {
    let mut table = vec![0; pattern.len()];
    let mut k = 0;
    for i in 1..pattern.len() {
        while k > 0 && pattern[i] != pattern[k] {
            k = table[k - 1];
        }
        if pattern[i] == pattern[k] {
            k += 1;
        }
        table[i] = k;
    }
    table
}

impl Default for LineCoalescer {
    fn default() -> Self {
        Self::new("\n")
    }
}
