/*
 * buffer.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Busta, a streaming MIME tokenizer.
 *
 * Busta is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Busta is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Busta.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Shared growable octet buffer over the underlying source; one per parse,
//! borrowed by every nested reader.

use std::io::{self, ErrorKind, Read};

use memchr::{memchr, memmem};

/// Growable byte arena fed by an octet source. Scan primitives operate on the
/// window of unconsumed bytes; refilling compacts consumed bytes out and the
/// backing storage doubles whenever a scan needs a larger contiguous window.
pub struct SharedBuffer<R> {
    source: R,
    storage: Vec<u8>,
    pos: usize,
    limit: usize,
    source_eof: bool,
    offset: u64,
}

impl<R: Read> SharedBuffer<R> {
    pub const DEFAULT_CAPACITY: usize = 4096;

    pub fn new(source: R) -> Self {
        Self::with_capacity(source, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(source: R, capacity: usize) -> Self {
        Self {
            source,
            storage: vec![0; capacity.max(64)],
            pos: 0,
            limit: 0,
            source_eof: false,
            offset: 0,
        }
    }

    /// Number of buffered, unconsumed bytes.
    pub fn available(&self) -> usize {
        self.limit - self.pos
    }

    /// The unconsumed window. Indices used with the scan primitives are
    /// relative to this slice and invalidated by [`fill`](Self::fill).
    pub fn window(&self) -> &[u8] {
        &self.storage[self.pos..self.limit]
    }

    /// True once the source has reported end of stream. Buffered bytes may
    /// still remain.
    pub fn source_eof(&self) -> bool {
        self.source_eof
    }

    /// True when the source is exhausted and every buffered byte is consumed.
    pub fn at_end(&self) -> bool {
        self.source_eof && self.pos == self.limit
    }

    /// Absolute stream offset of the first unconsumed byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn byte_at(&self, index: usize) -> Option<u8> {
        self.window().get(index).copied()
    }

    /// Compacts consumed bytes out and reads more from the source. Returns
    /// the number of bytes read; 0 means end of source. Window-relative
    /// indices obtained before the call are invalid afterwards.
    pub fn fill(&mut self) -> io::Result<usize> {
        if self.source_eof {
            return Ok(0);
        }
        if self.pos > 0 {
            self.storage.copy_within(self.pos..self.limit, 0);
            self.limit -= self.pos;
            self.pos = 0;
        }
        if self.limit == self.storage.len() {
            let grown = self.storage.len() * 2;
            self.storage.resize(grown, 0);
        }
        loop {
            match self.source.read(&mut self.storage[self.limit..]) {
                Ok(0) => {
                    self.source_eof = true;
                    return Ok(0);
                }
                Ok(n) => {
                    self.limit += n;
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Grows the backing storage so a contiguous window of at least `n` bytes
    /// can be buffered. Unconsumed content is preserved.
    pub fn ensure_capacity(&mut self, n: usize) {
        if n > self.storage.len() {
            let grown = n.max(self.storage.len() * 2);
            self.storage.resize(grown, 0);
        }
    }

    /// First occurrence of `byte` in the window at or after `from`, without
    /// refilling.
    pub fn index_of(&self, byte: u8, from: usize) -> Option<usize> {
        let w = self.window();
        if from >= w.len() {
            return None;
        }
        memchr(byte, &w[from..]).map(|i| from + i)
    }

    /// First occurrence of `pattern` in the window at or after `from`,
    /// without refilling.
    pub fn find(&self, pattern: &[u8], from: usize) -> Option<usize> {
        let w = self.window();
        if pattern.is_empty() || from >= w.len() {
            return None;
        }
        memmem::find(&w[from..], pattern).map(|i| from + i)
    }

    /// Discards up to `n` buffered bytes; returns the number discarded.
    pub fn skip(&mut self, n: usize) -> usize {
        let n = n.min(self.available());
        self.pos += n;
        self.offset += n as u64;
        n
    }

    /// Copies buffered bytes into `out`, consuming them. Never refills.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.available());
        out[..n].copy_from_slice(&self.storage[self.pos..self.pos + n]);
        self.pos += n;
        self.offset += n as u64;
        n
    }
}
