//! Seekable character stream over a pre-loaded text buffer.

use anyhow::{ensure, Result};

use super::diag::Cursor;

pub struct Stream<'a> {
    data: &'a str,
    pos: usize,
}

impl<'a> Stream<'a> {
    pub fn new(data: &'a str) -> Self {
        Self { data, pos: 0 }
    }

    /// Absolute byte offset of the read position.
    #[inline]
    pub fn offset(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Unread remainder of the buffer.
    #[inline]
    pub fn rest(&self) -> &'a str {
        &self.data[self.pos..]
    }

    /// Source text between two absolute offsets.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        self.data.get(start..end).unwrap_or_default()
    }

    pub fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Peeks `count` chars, `None` if fewer are left.
    pub fn peek_n(&self, count: usize) -> Option<&'a str> {
        let rest = self.rest();
        let mut chars = rest.char_indices();

        let end = match chars.nth(count) {
            Some((end, _)) => end,
            None if rest.chars().count() == count => rest.len(),
            None => return None,
        };

        Some(&rest[..end])
    }

    pub fn read_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    pub fn read_n(&mut self, count: usize) -> Option<&'a str> {
        let str = self.peek_n(count)?;
        self.pos += str.len();
        Some(str)
    }

    /// Steps back `offset` bytes.
    pub fn rewind(&mut self, offset: usize) -> Result<()> {
        ensure!(offset <= self.pos, "Unable to rewind {} bytes at offset {}", offset, self.pos);
        self.seek(self.pos - offset)
    }

    /// Moves to absolute `pos` bytes location.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        ensure!(pos <= self.data.len(), "Seek position {} is out of bounds", pos);
        ensure!(self.data.is_char_boundary(pos), "Seek position {} splits a character", pos);

        self.pos = pos;
        Ok(())
    }

    /// Row and column of the read position (0-based), for diagnostics only.
    pub fn cursor(&self) -> Cursor {
        let consumed = &self.data[..self.pos];
        let row = consumed.matches('\n').count();
        let col = match consumed.rfind('\n') {
            Some(line_start) => consumed[line_start + 1..].chars().count(),
            None => consumed.chars().count(),
        };

        Cursor { row, col }
    }
}
