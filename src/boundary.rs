/*
 * boundary.rs
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

//! Boundary-delimited sub-stream reader (RFC 2046). Reads a view of the
//! shared buffer that ends at the next delimiter line of its own boundary or
//! of any enclosing one.

use std::io::Read;

use memchr::memchr;

use crate::buffer::SharedBuffer;
use crate::error::MimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundaryState {
    /// Still delivering content; the delimiter has not been seen.
    Scanning,
    /// Positioned at the start of the (unconsumed) delimiter line.
    AtBoundary,
    /// Nothing further to deliver for this view.
    Exhausted,
}

/// Result of scanning a window for one boundary pattern.
enum Hit {
    /// A delimiter line starts at this window index (its leading CRLF, when
    /// present, sits just before the index).
    Confirmed(usize),
    /// A candidate at this index runs into the end of the window; more input
    /// is needed to accept or reject it.
    Undecided(usize),
    None,
}

/// Locates the first position in `window` where `pattern` opens a delimiter
/// line: the match must sit at a line start and be followed by end of input,
/// whitespace, a line terminator, or the closing `--`.
fn scan_pattern(window: &[u8], pattern: &[u8], at_line_start: bool, eof: bool) -> Hit {
    let mut from = 0;
    while let Some(rel) = memchr::memmem::find(&window[from..], pattern) {
        let i = from + rel;
        from = i + 1;
        let pos_ok = if i == 0 {
            at_line_start
        } else {
            window[i - 1] == b'\n'
        };
        if !pos_ok {
            continue;
        }
        let after = i + pattern.len();
        if after == window.len() {
            return if eof { Hit::Confirmed(i) } else { Hit::Undecided(i) };
        }
        match window[after] {
            b' ' | b'\t' | b'\r' | b'\n' => return Hit::Confirmed(i),
            b'-' => {
                if after + 1 == window.len() {
                    // a lone dash at end of stream is ordinary content
                    if !eof {
                        return Hit::Undecided(i);
                    }
                } else if window[after + 1] == b'-' {
                    return Hit::Confirmed(i);
                }
            }
            _ => {}
        }
    }
    Hit::None
}

/// Streams the content of one boundary-delimited view. Holds only pattern
/// and position state; every call borrows the parse's [`SharedBuffer`], and
/// `outer` carries the delimiter patterns of all enclosing views so that a
/// missing delimiter never lets a part read past its ancestors.
#[derive(Debug)]
pub(crate) struct BoundaryReader {
    pattern: Vec<u8>,
    state: BoundaryState,
    last_part: bool,
    eof_no_boundary: bool,
    at_line_start: bool,
}

impl BoundaryReader {
    pub fn new(boundary: &str) -> Self {
        let mut pattern = Vec::with_capacity(boundary.len() + 2);
        pattern.extend_from_slice(b"--");
        pattern.extend_from_slice(boundary.as_bytes());
        Self {
            pattern,
            state: BoundaryState::Scanning,
            last_part: false,
            eof_no_boundary: false,
            at_line_start: true,
        }
    }

    /// Fresh view over the same boundary, for the next sibling part.
    pub fn renew(&self) -> Self {
        Self {
            pattern: self.pattern.clone(),
            state: BoundaryState::Scanning,
            last_part: false,
            eof_no_boundary: false,
            at_line_start: true,
        }
    }

    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    /// True once the closing delimiter (`--boundary--`) has been consumed,
    /// or the view ran out of input without one.
    pub fn is_last_part(&self) -> bool {
        self.last_part || self.eof_no_boundary
    }

    /// True when the view ended on end of input or an enclosing delimiter
    /// rather than its own.
    pub fn fell_off_end(&self) -> bool {
        self.eof_no_boundary
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == BoundaryState::Exhausted
    }

    /// Decides how many buffered bytes can be delivered as view content
    /// without consuming them, refilling as needed. Returns 0 exactly when
    /// the view has ended (state leaves `Scanning`).
    fn plan<R: Read>(
        &mut self,
        buf: &mut SharedBuffer<R>,
        outer: &[&[u8]],
        strict: bool,
    ) -> Result<usize, MimeError> {
        loop {
            match self.state {
                BoundaryState::Scanning => {}
                _ => return Ok(0),
            }
            let window = buf.window();
            let eof = buf.source_eof();

            // earliest hit across own and enclosing patterns wins
            let mut confirmed: Option<(usize, bool)> = None;
            let mut undecided: Option<usize> = None;
            let mut max_len = self.pattern.len();
            let own: &[u8] = &self.pattern;
            for (pat, is_own) in std::iter::once((own, true))
                .chain(outer.iter().map(|p| (*p, false)))
            {
                max_len = max_len.max(pat.len());
                match scan_pattern(window, pat, self.at_line_start, eof) {
                    Hit::Confirmed(p) => {
                        if confirmed.map_or(true, |(q, _)| p < q) {
                            confirmed = Some((p, is_own));
                        }
                    }
                    Hit::Undecided(p) => {
                        if undecided.map_or(true, |q| p < q) {
                            undecided = Some(p);
                        }
                    }
                    Hit::None => {}
                }
            }

            match (confirmed, undecided) {
                (Some((p, is_own)), u) if u.map_or(true, |q| p < q) => {
                    // the terminator preceding the delimiter belongs to it
                    let trim = if p >= 2 && window[p - 1] == b'\n' && window[p - 2] == b'\r' {
                        2
                    } else if p >= 1 && window[p - 1] == b'\n' {
                        1
                    } else {
                        0
                    };
                    let content = p - trim;
                    if content > 0 {
                        return Ok(content);
                    }
                    if is_own {
                        self.state = BoundaryState::AtBoundary;
                    } else {
                        // an enclosing delimiter ends this view; leave it
                        // unconsumed for the ancestor
                        self.state = BoundaryState::Exhausted;
                        self.eof_no_boundary = true;
                        if strict {
                            return Err(MimeError::Structural {
                                message: "part not terminated by its boundary".to_string(),
                                offset: buf.offset(),
                            });
                        }
                    }
                    return Ok(0);
                }
                (_, Some(p)) => {
                    // candidate runs off the window edge; deliver what is
                    // certainly content and refill
                    let safe = p.saturating_sub(2);
                    if safe > 0 {
                        return Ok(safe);
                    }
                    buf.fill()?;
                }
                (_, None) => {
                    if eof {
                        let remaining = buf.available();
                        if remaining > 0 {
                            return Ok(remaining);
                        }
                        self.state = BoundaryState::Exhausted;
                        self.eof_no_boundary = true;
                        if strict {
                            return Err(MimeError::Structural {
                                message: "stream ended before closing boundary".to_string(),
                                offset: buf.offset(),
                            });
                        }
                        return Ok(0);
                    }
                    // keep enough held back that a delimiter split across the
                    // refill is never delivered as content
                    let holdback = max_len + 2;
                    if buf.available() > holdback {
                        return Ok(buf.available() - holdback);
                    }
                    buf.fill()?;
                }
            }
        }
    }

    /// Reads view content into `out`. Returns 0 at view end: own delimiter
    /// reached (left unconsumed), enclosing delimiter reached, or end of
    /// input.
    pub fn read<R: Read>(
        &mut self,
        buf: &mut SharedBuffer<R>,
        outer: &[&[u8]],
        out: &mut [u8],
        strict: bool,
    ) -> Result<usize, MimeError> {
        if out.is_empty() {
            return Ok(0);
        }
        let planned = self.plan(buf, outer, strict)?;
        if planned == 0 {
            return Ok(0);
        }
        let take = planned.min(out.len());
        let n = buf.read(&mut out[..take]);
        if n > 0 {
            self.at_line_start = out[n - 1] == b'\n';
        }
        Ok(n)
    }

    /// Appends one line of view content to `dst`, terminator included.
    /// Returns true when a terminator was read; false means the view ended
    /// mid-line, or `dst` grew past `max_len` (caller's limit handling).
    pub fn read_line<R: Read>(
        &mut self,
        buf: &mut SharedBuffer<R>,
        outer: &[&[u8]],
        dst: &mut Vec<u8>,
        max_len: usize,
        strict: bool,
    ) -> Result<bool, MimeError> {
        loop {
            let planned = self.plan(buf, outer, strict)?;
            if planned == 0 {
                return Ok(false);
            }
            let window = buf.window();
            match memchr(b'\n', &window[..planned]) {
                Some(i) => {
                    dst.extend_from_slice(&window[..=i]);
                    buf.skip(i + 1);
                    self.at_line_start = true;
                    return Ok(true);
                }
                None => {
                    let room = max_len.saturating_sub(dst.len()).max(1);
                    let take = planned.min(room);
                    dst.extend_from_slice(&window[..take]);
                    self.at_line_start = window[take - 1] == b'\n';
                    buf.skip(take);
                    if dst.len() >= max_len {
                        return Ok(false);
                    }
                }
            }
        }
    }

    /// Consumes the delimiter line the view stopped at, including a closing
    /// `--` and everything through the line terminator. Unread view content
    /// ahead of the delimiter is drained first. No-op when the view fell off
    /// the end of its input.
    pub fn skip_boundary_line<R: Read>(
        &mut self,
        buf: &mut SharedBuffer<R>,
        outer: &[&[u8]],
        strict: bool,
    ) -> Result<(), MimeError> {
        let mut sink = [0u8; 512];
        while self.state == BoundaryState::Scanning {
            if self.read(buf, outer, &mut sink, strict)? == 0 {
                break;
            }
        }
        if self.state != BoundaryState::AtBoundary {
            return Ok(());
        }
        let window = buf.window();
        let trim = if window.starts_with(b"\r\n") {
            2
        } else if window.starts_with(b"\n") {
            1
        } else {
            0
        };
        buf.skip(trim + self.pattern.len());
        while buf.available() < 2 && !buf.source_eof() {
            buf.fill()?;
        }
        let window = buf.window();
        if window.starts_with(b"--") {
            self.last_part = true;
            buf.skip(2);
        }
        // transport padding and the terminator itself
        loop {
            match buf.index_of(b'\n', 0) {
                Some(i) => {
                    buf.skip(i + 1);
                    break;
                }
                None => {
                    let n = buf.available();
                    buf.skip(n);
                    if buf.fill()? == 0 {
                        break;
                    }
                }
            }
        }
        self.state = BoundaryState::Exhausted;
        self.at_line_start = true;
        Ok(())
    }

    /// Peeks whether the view begins directly at the delimiter line, i.e.
    /// the multipart has no preamble. Consumes nothing.
    pub fn starts_at_boundary<R: Read>(
        &self,
        buf: &mut SharedBuffer<R>,
    ) -> Result<bool, MimeError> {
        loop {
            match scan_pattern(buf.window(), &self.pattern, true, buf.source_eof()) {
                Hit::Confirmed(0) => return Ok(true),
                Hit::Undecided(0) => {
                    buf.fill()?;
                }
                Hit::Confirmed(_) | Hit::Undecided(_) => return Ok(false),
                Hit::None => {
                    if !buf.source_eof() && buf.available() < self.pattern.len() + 4 {
                        buf.fill()?;
                    } else {
                        return Ok(false);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// Reads at most one byte per call, to exercise refill paths.
    struct Drip(Vec<u8>, usize);
    impl Read for Drip {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            if self.1 >= self.0.len() || out.is_empty() {
                return Ok(0);
            }
            out[0] = self.0[self.1];
            self.1 += 1;
            Ok(1)
        }
    }

    fn drain(
        r: &mut BoundaryReader,
        buf: &mut SharedBuffer<impl Read>,
        outer: &[&[u8]],
    ) -> Vec<u8> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 7];
        loop {
            let n = r.read(buf, outer, &mut chunk, false).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        out
    }

    fn buffer(data: &str) -> SharedBuffer<Cursor<Vec<u8>>> {
        SharedBuffer::new(Cursor::new(data.as_bytes().to_vec()))
    }

    #[test]
    fn content_stops_before_boundary() {
        let mut buf = buffer("hello world\r\n--frontier\r\nnext part");
        let mut r = BoundaryReader::new("frontier");
        assert_eq!(drain(&mut r, &mut buf, &[]), b"hello world");
        assert!(!r.is_last_part());
        assert!(!r.fell_off_end());
        r.skip_boundary_line(&mut buf, &[], false).unwrap();
        assert_eq!(buf.window(), b"next part");
    }

    #[test]
    fn closing_delimiter_detected() {
        let mut buf = buffer("body\r\n--frontier--\r\nepilogue");
        let mut r = BoundaryReader::new("frontier");
        assert_eq!(drain(&mut r, &mut buf, &[]), b"body");
        r.skip_boundary_line(&mut buf, &[], false).unwrap();
        assert!(r.is_last_part());
        assert_eq!(buf.window(), b"epilogue");
    }

    #[test]
    fn delimiter_must_start_a_line() {
        let mut buf = buffer("text --frontier more\r\n--frontier\r\n");
        let mut r = BoundaryReader::new("frontier");
        assert_eq!(drain(&mut r, &mut buf, &[]), b"text --frontier more");
    }

    #[test]
    fn candidate_with_longer_token_is_content() {
        // "--frontierX" does not delimit for boundary "frontier"
        let mut buf = buffer("--frontierX\r\n--frontier\r\n");
        let mut r = BoundaryReader::new("frontier");
        assert_eq!(drain(&mut r, &mut buf, &[]), b"--frontierX");
    }

    #[test]
    fn lone_trailing_dash_is_content() {
        let mut buf = buffer("x\r\n--frontier-");
        let mut r = BoundaryReader::new("frontier");
        assert_eq!(drain(&mut r, &mut buf, &[]), b"x\r\n--frontier-");
        assert!(r.fell_off_end());
    }

    #[test]
    fn trailing_whitespace_after_delimiter_accepted() {
        let mut buf = buffer("a\r\n--frontier  \t\r\nb");
        let mut r = BoundaryReader::new("frontier");
        assert_eq!(drain(&mut r, &mut buf, &[]), b"a");
        r.skip_boundary_line(&mut buf, &[], false).unwrap();
        assert_eq!(buf.window(), b"b");
    }

    #[test]
    fn bare_cr_is_content_bare_lf_delimits() {
        let mut buf = buffer("a\rb\n--frontier\r\nc");
        let mut r = BoundaryReader::new("frontier");
        assert_eq!(drain(&mut r, &mut buf, &[]), b"a\rb");
    }

    #[test]
    fn boundary_at_view_start() {
        let mut buf = buffer("--frontier\r\nfirst");
        buf.fill().unwrap();
        let mut r = BoundaryReader::new("frontier");
        assert!(r.starts_at_boundary(&mut buf).unwrap());
        assert_eq!(drain(&mut r, &mut buf, &[]), b"");
        r.skip_boundary_line(&mut buf, &[], false).unwrap();
        assert_eq!(buf.window(), b"first");
    }

    #[test]
    fn preamble_means_not_at_boundary() {
        let mut buf = buffer("preamble\r\n--frontier\r\n");
        buf.fill().unwrap();
        let r = BoundaryReader::new("frontier");
        assert!(!r.starts_at_boundary(&mut buf).unwrap());
    }

    #[test]
    fn eof_without_delimiter_is_lenient_content() {
        let mut buf = buffer("no terminator here");
        let mut r = BoundaryReader::new("frontier");
        assert_eq!(drain(&mut r, &mut buf, &[]), b"no terminator here");
        assert!(r.fell_off_end());
        assert!(r.is_last_part());
    }

    #[test]
    fn eof_without_delimiter_strict_fails() {
        let mut buf = buffer("no terminator here");
        let mut r = BoundaryReader::new("frontier");
        let mut out = [0u8; 64];
        let mut collected = Vec::new();
        let err = loop {
            match r.read(&mut buf, &[], &mut out, true) {
                Ok(0) => panic!("expected a strict failure at end of input"),
                Ok(n) => collected.extend_from_slice(&out[..n]),
                Err(e) => break e,
            }
        };
        assert_eq!(collected, b"no terminator here");
        assert!(matches!(err, MimeError::Structural { .. }));
    }

    #[test]
    fn enclosing_delimiter_ends_view() {
        let mut buf = buffer("inner text\r\n--outer\r\nnext");
        let mut r = BoundaryReader::new("inner");
        let outer = BoundaryReader::new("outer");
        assert_eq!(
            drain(&mut r, &mut buf, &[outer.pattern()]),
            b"inner text"
        );
        assert!(r.fell_off_end());
        // the enclosing delimiter is left for the ancestor to consume
        assert_eq!(buf.window(), b"\r\n--outer\r\nnext");
    }

    #[test]
    fn delimiter_split_across_refills() {
        let data = b"abcdef\r\n--frontier\r\nrest".to_vec();
        let mut buf = SharedBuffer::with_capacity(Drip(data, 0), 64);
        let mut r = BoundaryReader::new("frontier");
        assert_eq!(drain(&mut r, &mut buf, &[]), b"abcdef");
        r.skip_boundary_line(&mut buf, &[], false).unwrap();
        assert!(!r.is_last_part());
    }

    #[test]
    fn read_line_stops_at_terminator() {
        let mut buf = buffer("one\r\ntwo\r\n--frontier\r\n");
        let mut r = BoundaryReader::new("frontier");
        let mut line = Vec::new();
        assert!(r.read_line(&mut buf, &[], &mut line, 1000, false).unwrap());
        assert_eq!(line, b"one\r\n");
        // the CRLF before the delimiter belongs to the boundary line, so the
        // last line of the view arrives without a terminator
        line.clear();
        assert!(!r.read_line(&mut buf, &[], &mut line, 1000, false).unwrap());
        assert_eq!(line, b"two");
        line.clear();
        assert!(!r.read_line(&mut buf, &[], &mut line, 1000, false).unwrap());
        assert!(line.is_empty());
    }

    #[test]
    fn renewed_reader_reads_next_part() {
        let mut buf = buffer("--b\r\none\r\n--b\r\ntwo\r\n--b--\r\n");
        let mut r = BoundaryReader::new("b");
        r.skip_boundary_line(&mut buf, &[], false).unwrap();
        let mut part = r.renew();
        assert_eq!(drain(&mut part, &mut buf, &[]), b"one");
        part.skip_boundary_line(&mut buf, &[], false).unwrap();
        let mut part2 = part.renew();
        assert_eq!(drain(&mut part2, &mut buf, &[]), b"two");
        part2.skip_boundary_line(&mut buf, &[], false).unwrap();
        assert!(part2.is_last_part());
    }
}
