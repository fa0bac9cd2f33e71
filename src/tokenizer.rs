/*
 * tokenizer.rs
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

//! Pull tokenizer: the per-entity state machine over the shared buffer and a
//! stack of nesting contexts.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use memchr::memchr;
use tracing::{debug, warn};

use crate::base64;
use crate::boundary::BoundaryReader;
use crate::buffer::SharedBuffer;
use crate::config::{DecodeMonitor, MimeConfig, RecursionMode};
use crate::descriptor::{BodyDescriptor, EntityKind};
use crate::error::MimeError;
use crate::field::RawField;
use crate::quoted_printable;

/// One token of the entity grammar. `Field` carries its header field; byte
/// payloads (`Body`, `Preamble`, `Epilogue`, `Raw`) are pulled separately
/// through [`MimeTokenizer::read_body`] before requesting the next event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeEvent {
    StartMessage,
    StartHeader,
    Field(RawField),
    EndHeader,
    /// Bytes before the first boundary of a multipart; read via `read_body`.
    Preamble,
    StartMultipart,
    StartBodyPart,
    EndBodyPart,
    /// Bytes after the closing boundary of a multipart; read via `read_body`.
    Epilogue,
    EndMultipart,
    /// A discrete entity body; read via `read_body` / `read_body_decoded`.
    Body,
    /// The entire entity, headers included, unparsed; read via `read_body`.
    Raw,
    EndMessage,
    EndOfStream,
}

/// Cloneable cooperative-cancellation flag. Once stopped, the tokenizer
/// consumes no further input and drains to a balanced event sequence.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntityState {
    Start,
    Header,
    Fields,
    BodyDecision,
    Preamble,
    PartLoop,
    MultipartEnd,
    End,
}

/// Which byte view, if any, the caller may currently be draining.
#[derive(Debug, Clone, Copy)]
enum ActiveView {
    None,
    /// Preamble: read through the top context's multipart reader.
    Segment,
    /// Body, epilogue or raw entity: read through the innermost bounded view.
    Entity,
}

/// One stack frame per nesting level.
struct ParseContext {
    depth: usize,
    is_message: bool,
    state: EntityState,
    descriptor: BodyDescriptor,
    /// Bounds this entity's own view. None means the view runs to end of
    /// input (the root, or a message sharing its enclosing part's view).
    bound: Option<BoundaryReader>,
    /// When this entity is a multipart: the reader positioned at or before
    /// the delimiter line that starts the next part.
    mp_reader: Option<BoundaryReader>,
    headless: bool,
    synthetic: Option<RawField>,
    preamble_absent: bool,
    header_count: usize,
    header_bytes: usize,
    limit_warned: bool,
}

impl ParseContext {
    fn message(depth: usize) -> Self {
        Self {
            depth,
            is_message: true,
            state: EntityState::Start,
            descriptor: BodyDescriptor::new(false),
            bound: None,
            mp_reader: None,
            headless: false,
            synthetic: None,
            preamble_absent: false,
            header_count: 0,
            header_bytes: 0,
            limit_warned: false,
        }
    }

    fn part(depth: usize, parent_is_digest: bool, bound: BoundaryReader) -> Self {
        Self {
            depth,
            is_message: false,
            state: EntityState::Start,
            descriptor: BodyDescriptor::new(parent_is_digest),
            bound: Some(bound),
            mp_reader: None,
            headless: false,
            synthetic: None,
            preamble_absent: false,
            header_count: 0,
            header_bytes: 0,
            limit_warned: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Codec {
    Base64,
    QuotedPrintable,
}

/// Carry buffers for [`MimeTokenizer::read_body_decoded`]: raw view bytes the
/// decoder has not consumed yet, and decoded bytes not yet delivered to the
/// caller (the decoder emits whole quanta; the caller's buffer may be smaller).
#[derive(Default)]
struct DecodeCarry {
    src: Vec<u8>,
    pos: usize,
    eos: bool,
    ready: Vec<u8>,
}

/// Streaming MIME tokenizer. Call [`next`](Self::next) until
/// [`MimeEvent::EndOfStream`]; between events carrying a byte view, pull the
/// bytes with [`read_body`](Self::read_body). A view left undrained is
/// skipped when the next event is requested.
pub struct MimeTokenizer<R: Read> {
    buf: SharedBuffer<R>,
    config: MimeConfig,
    monitor: DecodeMonitor,
    stack: Vec<ParseContext>,
    stop: StopHandle,
    finished: bool,
    active: ActiveView,
    line_carry: Option<Vec<u8>>,
    dec: DecodeCarry,
}

impl<R: Read> MimeTokenizer<R> {
    pub fn new(source: R, config: MimeConfig) -> Self {
        Self::with_stop(source, config, StopHandle::default())
    }

    /// Builds a tokenizer sharing an externally held stop flag.
    pub fn with_stop(source: R, config: MimeConfig, stop: StopHandle) -> Self {
        let monitor = config.monitor();
        let mut root = ParseContext::message(0);
        if let Some(ct) = config.headless_content_type.clone() {
            root.headless = true;
            root.synthetic = Some(RawField::synthetic("Content-Type", &ct));
        }
        Self {
            buf: SharedBuffer::new(source),
            config,
            monitor,
            stack: vec![root],
            stop,
            finished: false,
            active: ActiveView::None,
            line_carry: None,
            dec: DecodeCarry::default(),
        }
    }

    /// A clone of the cancellation flag, usable from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Requests cooperative cancellation; checked between state transitions.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Descriptor of the entity the machine is currently inside. Populated
    /// from `EndHeader` onwards; meaningful alongside `Body`, `StartMultipart`
    /// and the part events.
    pub fn descriptor(&self) -> Option<&BodyDescriptor> {
        self.stack.last().map(|c| &c.descriptor)
    }

    /// Advances to the next event.
    pub fn next(&mut self) -> Result<MimeEvent, MimeError> {
        if self.finished {
            return Ok(MimeEvent::EndOfStream);
        }
        self.finish_current_view()?;
        loop {
            let cancelled = self.stop.is_stopped();
            let state = match self.stack.last() {
                Some(ctx) => ctx.state,
                None => {
                    self.finished = true;
                    return Ok(MimeEvent::EndOfStream);
                }
            };
            let top = self.stack.len() - 1;
            match state {
                EntityState::Start => {
                    self.stack[top].state = EntityState::Header;
                    return Ok(if self.stack[top].is_message {
                        MimeEvent::StartMessage
                    } else {
                        MimeEvent::StartBodyPart
                    });
                }
                EntityState::Header => {
                    if cancelled {
                        self.stack[top].state = EntityState::End;
                        continue;
                    }
                    if matches!(self.config.recursion_mode, RecursionMode::Raw) {
                        self.stack[top].state = EntityState::End;
                        self.active = ActiveView::Entity;
                        self.dec = DecodeCarry::default();
                        return Ok(MimeEvent::Raw);
                    }
                    self.stack[top].state = EntityState::Fields;
                    return Ok(MimeEvent::StartHeader);
                }
                EntityState::Fields => {
                    if cancelled {
                        self.stack[top].descriptor.finalize();
                        self.stack[top].state = EntityState::BodyDecision;
                        return Ok(MimeEvent::EndHeader);
                    }
                    if self.stack[top].headless {
                        match self.stack[top].synthetic.take() {
                            Some(mut f) => {
                                self.stack[top].descriptor.add_field(&mut f);
                                return Ok(MimeEvent::Field(f));
                            }
                            None => {
                                self.stack[top].descriptor.finalize();
                                self.stack[top].state = EntityState::BodyDecision;
                                return Ok(MimeEvent::EndHeader);
                            }
                        }
                    }
                    if let Some(event) = self.next_field_event()? {
                        return Ok(event);
                    }
                }
                EntityState::BodyDecision => {
                    if cancelled {
                        self.stack[top].state = EntityState::End;
                        continue;
                    }
                    if let Some(event) = self.decide_body()? {
                        return Ok(event);
                    }
                }
                EntityState::Preamble => {
                    self.stack[top].state = EntityState::PartLoop;
                    if cancelled || self.stack[top].preamble_absent {
                        continue;
                    }
                    self.active = ActiveView::Segment;
                    return Ok(MimeEvent::Preamble);
                }
                EntityState::PartLoop => {
                    if cancelled {
                        self.stack[top].state = EntityState::MultipartEnd;
                        continue;
                    }
                    let (last, fell_off) = self.multipart_advance()?;
                    if last {
                        self.stack[top].state = EntityState::MultipartEnd;
                        if fell_off {
                            // input ran out; there is no epilogue view
                            continue;
                        }
                        self.active = ActiveView::Entity;
                        return Ok(MimeEvent::Epilogue);
                    }
                    let parent_is_digest =
                        self.stack[top].descriptor.mime_type() == "multipart/digest";
                    let depth = self.stack[top].depth + 1;
                    let child_bound = match self.stack[top].mp_reader.as_ref() {
                        Some(r) => r.renew(),
                        None => {
                            self.stack[top].state = EntityState::MultipartEnd;
                            continue;
                        }
                    };
                    self.stack
                        .push(ParseContext::part(depth, parent_is_digest, child_bound));
                }
                EntityState::MultipartEnd => {
                    self.stack[top].state = EntityState::End;
                    return Ok(MimeEvent::EndMultipart);
                }
                EntityState::End => match self.stack.pop() {
                    Some(ctx) => {
                        if ctx.is_message {
                            return Ok(MimeEvent::EndMessage);
                        }
                        // the part's view reader, now past the delimiter
                        // scan, takes over as the parent's walking reader
                        if let Some(parent) = self.stack.last_mut() {
                            parent.mp_reader = ctx.bound;
                        }
                        return Ok(MimeEvent::EndBodyPart);
                    }
                    None => {
                        self.finished = true;
                        return Ok(MimeEvent::EndOfStream);
                    }
                },
            }
        }
    }

    /// Reads raw bytes of the current view (body, preamble, epilogue or raw
    /// entity). Returns 0 at the end of the view.
    pub fn read_body(&mut self, out: &mut [u8]) -> Result<usize, MimeError> {
        self.view_read(out)
    }

    /// Reads the current body view with its Content-Transfer-Encoding
    /// applied. Unknown or identity encodings pass bytes through unchanged.
    pub fn read_body_decoded(&mut self, out: &mut [u8]) -> Result<usize, MimeError> {
        if out.is_empty() {
            return Ok(0);
        }
        let encoding = match self.stack.last() {
            Some(ctx) => ctx.descriptor.transfer_encoding().to_ascii_lowercase(),
            None => return Ok(0),
        };
        let codec = match encoding.as_str() {
            "base64" => Codec::Base64,
            "quoted-printable" => Codec::QuotedPrintable,
            _ => return self.read_body(out),
        };
        loop {
            if !self.dec.ready.is_empty() {
                let n = out.len().min(self.dec.ready.len());
                out[..n].copy_from_slice(&self.dec.ready[..n]);
                self.dec.ready.drain(..n);
                return Ok(n);
            }
            if self.dec.pos > 0 {
                self.dec.src.drain(..self.dec.pos);
                self.dec.pos = 0;
            }
            let mut dst = [0u8; 4096];
            let max = dst.len();
            let mut dst_pos = 0;
            match codec {
                Codec::Base64 => {
                    base64::decode(
                        &self.dec.src,
                        &mut self.dec.pos,
                        &mut dst,
                        &mut dst_pos,
                        max,
                        self.dec.eos,
                    );
                }
                Codec::QuotedPrintable => {
                    quoted_printable::decode(
                        &self.dec.src,
                        &mut self.dec.pos,
                        &mut dst,
                        &mut dst_pos,
                        max,
                        self.dec.eos,
                        &self.monitor,
                    )?;
                }
            }
            if dst_pos > 0 {
                self.dec.ready.extend_from_slice(&dst[..dst_pos]);
                continue;
            }
            if self.dec.eos {
                return Ok(0);
            }
            let mut chunk = [0u8; 4096];
            let n = self.view_read(&mut chunk)?;
            if n == 0 {
                self.dec.eos = true;
            } else {
                self.dec.src.extend_from_slice(&chunk[..n]);
            }
        }
    }

    /// Drains whatever is left of the view the caller stopped reading.
    fn finish_current_view(&mut self) -> Result<(), MimeError> {
        if matches!(self.active, ActiveView::None) {
            return Ok(());
        }
        if !self.stop.is_stopped() {
            let mut sink = [0u8; 1024];
            while self.view_read(&mut sink)? > 0 {}
        }
        self.active = ActiveView::None;
        self.dec = DecodeCarry::default();
        Ok(())
    }

    fn view_read(&mut self, out: &mut [u8]) -> Result<usize, MimeError> {
        if self.stop.is_stopped() || self.stack.is_empty() {
            return Ok(0);
        }
        let strict = self.config.strict;
        match self.active {
            ActiveView::None => Ok(0),
            ActiveView::Segment => {
                let top = self.stack.len() - 1;
                let (below, tops) = self.stack.split_at_mut(top);
                let ParseContext {
                    bound, mp_reader, ..
                } = &mut tops[0];
                let mut outer = collect_patterns(below);
                if let Some(b) = bound.as_ref() {
                    outer.push(b.pattern());
                }
                match mp_reader.as_mut() {
                    Some(reader) => reader.read(&mut self.buf, &outer, out, strict),
                    None => Ok(0),
                }
            }
            ActiveView::Entity => match self.stack.iter().rposition(|c| c.bound.is_some()) {
                None => self.root_read(out),
                Some(i) => {
                    let (below, rest) = self.stack.split_at_mut(i);
                    let outer = collect_patterns(below);
                    match rest[0].bound.as_mut() {
                        Some(reader) => reader.read(&mut self.buf, &outer, out, strict),
                        None => Ok(0),
                    }
                }
            },
        }
    }

    /// Reads one physical line of the current entity's view into `dst`,
    /// bounded by the innermost enclosing boundary.
    fn entity_read_line(&mut self, dst: &mut Vec<u8>, max_len: usize) -> Result<bool, MimeError> {
        if self.stop.is_stopped() {
            return Ok(false);
        }
        let strict = self.config.strict;
        match self.stack.iter().rposition(|c| c.bound.is_some()) {
            None => self.root_read_line(dst, max_len),
            Some(i) => {
                let (below, rest) = self.stack.split_at_mut(i);
                let outer = collect_patterns(below);
                match rest[0].bound.as_mut() {
                    Some(reader) => reader.read_line(&mut self.buf, &outer, dst, max_len, strict),
                    None => Ok(false),
                }
            }
        }
    }

    fn root_read(&mut self, out: &mut [u8]) -> Result<usize, MimeError> {
        if self.buf.available() == 0 && self.buf.fill()? == 0 {
            return Ok(0);
        }
        Ok(self.buf.read(out))
    }

    fn root_read_line(&mut self, dst: &mut Vec<u8>, max_len: usize) -> Result<bool, MimeError> {
        loop {
            if self.buf.available() == 0 && self.buf.fill()? == 0 {
                return Ok(false);
            }
            let window = self.buf.window();
            match memchr(b'\n', window) {
                Some(i) => {
                    dst.extend_from_slice(&window[..=i]);
                    self.buf.skip(i + 1);
                    return Ok(true);
                }
                None => {
                    let room = max_len.saturating_sub(dst.len()).max(1);
                    let take = window.len().min(room);
                    dst.extend_from_slice(&window[..take]);
                    self.buf.skip(take);
                    if dst.len() >= max_len {
                        return Ok(false);
                    }
                }
            }
        }
    }

    /// Fields state: produce the next Field event, or EndHeader when the
    /// header section ends. `Ok(None)` means a field was dropped over a
    /// limit and the caller should loop.
    fn next_field_event(&mut self) -> Result<Option<MimeEvent>, MimeError> {
        match self.read_field()? {
            None => {
                let top = self.stack.len() - 1;
                self.stack[top].descriptor.finalize();
                self.stack[top].state = EntityState::BodyDecision;
                Ok(Some(MimeEvent::EndHeader))
            }
            Some(mut f) => {
                let top = self.stack.len() - 1;
                self.stack[top].header_count += 1;
                self.stack[top].header_bytes += f.raw().len();
                let over_count = self.stack[top].header_count > self.config.max_header_count;
                let over_bytes = self.stack[top].header_bytes > self.config.max_header_len;
                if over_count || over_bytes {
                    if self.config.strict {
                        return Err(MimeError::HeaderLimit {
                            what: if over_count {
                                "header count"
                            } else {
                                "header size"
                            },
                            limit: if over_count {
                                self.config.max_header_count
                            } else {
                                self.config.max_header_len
                            },
                            offset: self.buf.offset(),
                        });
                    }
                    if !self.stack[top].limit_warned {
                        warn!(
                            count = self.stack[top].header_count,
                            bytes = self.stack[top].header_bytes,
                            "header section exceeds configured limit, dropping further fields"
                        );
                        self.stack[top].limit_warned = true;
                    }
                    return Ok(None);
                }
                self.stack[top].descriptor.add_field(&mut f);
                Ok(Some(MimeEvent::Field(f)))
            }
        }
    }

    /// Assembles one (possibly folded) header field from the entity view.
    /// `Ok(None)` marks the end of the header section.
    fn read_field(&mut self) -> Result<Option<RawField>, MimeError> {
        let max_line = self.config.max_line_len;
        loop {
            let mut raw = match self.line_carry.take() {
                Some(line) => line,
                None => {
                    let mut line = Vec::new();
                    let eol = self.entity_read_line(&mut line, max_line)?;
                    if line.len() >= max_line {
                        if !eol {
                            self.overlong_line()?;
                        } else if self.config.strict {
                            return Err(MimeError::LineLimit {
                                limit: max_line,
                                offset: self.buf.offset(),
                            });
                        }
                    } else if !eol {
                        if line.is_empty() {
                            // view ended cleanly before a blank line
                            return Ok(None);
                        }
                        if self.config.strict {
                            return Err(MimeError::Structural {
                                message: "end of stream in header".to_string(),
                                offset: self.buf.offset(),
                            });
                        }
                        warn!("header section not terminated by a blank line");
                    }
                    line
                }
            };
            if is_blank_line(&raw) {
                return Ok(None);
            }
            // absorb folded continuation lines; the first non-continuation
            // line is carried over to the next call
            loop {
                let mut next = Vec::new();
                let eol = self.entity_read_line(&mut next, max_line)?;
                if next.len() >= max_line {
                    if !eol {
                        self.overlong_line()?;
                    } else if self.config.strict {
                        return Err(MimeError::LineLimit {
                            limit: max_line,
                            offset: self.buf.offset(),
                        });
                    }
                }
                if next.first().map_or(false, |&b| b == b' ' || b == b'\t') {
                    raw.extend_from_slice(&next);
                    if !eol {
                        break;
                    }
                } else {
                    if !next.is_empty() {
                        self.line_carry = Some(next);
                    }
                    break;
                }
            }
            strip_terminator(&mut raw);
            match RawField::parse(raw) {
                Some(f) => return Ok(Some(f)),
                None => {
                    debug!("dropping header line without a field split");
                }
            }
        }
    }

    /// A physical line hit `max_line_len`: fail in strict mode, otherwise
    /// truncate and discard the remainder of the line.
    fn overlong_line(&mut self) -> Result<(), MimeError> {
        if self.config.strict {
            return Err(MimeError::LineLimit {
                limit: self.config.max_line_len,
                offset: self.buf.offset(),
            });
        }
        warn!(
            limit = self.config.max_line_len,
            "header line exceeds configured length, truncating"
        );
        let mut rest = Vec::new();
        loop {
            rest.clear();
            let eol = self.entity_read_line(&mut rest, 4096)?;
            if eol || rest.is_empty() {
                return Ok(());
            }
        }
    }

    /// BodyDecision state: emit Body, start a multipart, or push a nested
    /// message. `Ok(None)` means a frame was pushed and the caller loops.
    fn decide_body(&mut self) -> Result<Option<MimeEvent>, MimeError> {
        let top = self.stack.len() - 1;
        let mut kind = self.stack[top].descriptor.kind();
        match self.config.recursion_mode {
            RecursionMode::Flat if kind == EntityKind::Multipart => kind = EntityKind::Discrete,
            RecursionMode::NoRecurse if kind == EntityKind::Message => {
                kind = EntityKind::Discrete
            }
            _ => {}
        }
        if matches!(kind, EntityKind::Multipart | EntityKind::Message)
            && self.stack[top].depth + 1 > self.config.max_depth
        {
            if self.config.strict {
                return Err(MimeError::MaxDepth {
                    limit: self.config.max_depth,
                });
            }
            warn!(
                limit = self.config.max_depth,
                "nesting depth limit reached, surfacing entity as opaque body"
            );
            kind = EntityKind::Discrete;
        }
        match kind {
            EntityKind::Discrete => {
                self.stack[top].state = EntityState::End;
                self.active = ActiveView::Entity;
                self.dec = DecodeCarry::default();
                Ok(Some(MimeEvent::Body))
            }
            EntityKind::Message => {
                self.stack[top].state = EntityState::End;
                let depth = self.stack[top].depth + 1;
                self.stack.push(ParseContext::message(depth));
                Ok(None)
            }
            EntityKind::Multipart => {
                let boundary = match self.stack[top].descriptor.boundary() {
                    Some(b) => b.to_string(),
                    None => {
                        // finalize() degrades boundary-less multiparts, so
                        // this kind cannot lack one; treat as opaque anyway
                        self.stack[top].state = EntityState::End;
                        self.active = ActiveView::Entity;
                        self.dec = DecodeCarry::default();
                        return Ok(Some(MimeEvent::Body));
                    }
                };
                let reader = BoundaryReader::new(&boundary);
                let absent = reader.starts_at_boundary(&mut self.buf)?;
                self.stack[top].mp_reader = Some(reader);
                self.stack[top].preamble_absent = absent;
                self.stack[top].state = EntityState::Preamble;
                Ok(Some(MimeEvent::StartMultipart))
            }
        }
    }

    /// Consumes the delimiter line the previous view stopped at. Returns
    /// (last_part, fell_off_end).
    fn multipart_advance(&mut self) -> Result<(bool, bool), MimeError> {
        let strict = self.config.strict;
        let top = self.stack.len() - 1;
        let (below, tops) = self.stack.split_at_mut(top);
        let ParseContext {
            bound, mp_reader, ..
        } = &mut tops[0];
        let mut outer = collect_patterns(below);
        if let Some(b) = bound.as_ref() {
            outer.push(b.pattern());
        }
        match mp_reader.as_mut() {
            Some(reader) => {
                reader.skip_boundary_line(&mut self.buf, &outer, strict)?;
                Ok((reader.is_last_part(), reader.fell_off_end()))
            }
            None => Ok((true, true)),
        }
    }
}

fn collect_patterns(contexts: &[ParseContext]) -> Vec<&[u8]> {
    contexts
        .iter()
        .filter_map(|c| c.bound.as_ref().map(|b| b.pattern()))
        .collect()
}

fn is_blank_line(line: &[u8]) -> bool {
    line.is_empty() || line == b"\n" || line == b"\r\n"
}

/// Removes the final CRLF or LF; embedded fold terminators stay.
fn strip_terminator(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tokenizer(data: &str) -> MimeTokenizer<Cursor<Vec<u8>>> {
        MimeTokenizer::new(Cursor::new(data.as_bytes().to_vec()), MimeConfig::default())
    }

    fn read_view(tok: &mut MimeTokenizer<Cursor<Vec<u8>>>) -> Vec<u8> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 16];
        loop {
            let n = tok.read_body(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        out
    }

    #[test]
    fn empty_input_event_sequence() {
        let mut tok = tokenizer("");
        let mut events = Vec::new();
        loop {
            let e = tok.next().unwrap();
            let done = e == MimeEvent::EndOfStream;
            events.push(e);
            if done {
                break;
            }
        }
        assert_eq!(
            events,
            vec![
                MimeEvent::StartMessage,
                MimeEvent::StartHeader,
                MimeEvent::EndHeader,
                MimeEvent::Body,
                MimeEvent::EndMessage,
                MimeEvent::EndOfStream,
            ]
        );
    }

    #[test]
    fn simple_message_body() {
        let mut tok = tokenizer("Subject: test\r\n\r\nhello body");
        assert_eq!(tok.next().unwrap(), MimeEvent::StartMessage);
        assert_eq!(tok.next().unwrap(), MimeEvent::StartHeader);
        match tok.next().unwrap() {
            MimeEvent::Field(f) => {
                assert_eq!(f.name(), "Subject");
                assert_eq!(f.body(), "test");
            }
            other => panic!("expected field, got {:?}", other),
        }
        assert_eq!(tok.next().unwrap(), MimeEvent::EndHeader);
        assert_eq!(tok.next().unwrap(), MimeEvent::Body);
        assert_eq!(read_view(&mut tok), b"hello body");
        assert_eq!(tok.next().unwrap(), MimeEvent::EndMessage);
        assert_eq!(tok.next().unwrap(), MimeEvent::EndOfStream);
        // terminal event repeats
        assert_eq!(tok.next().unwrap(), MimeEvent::EndOfStream);
    }

    #[test]
    fn folded_field_raw_and_unfolded() {
        let mut tok = tokenizer("Subject: one\r\n two\r\nX-Next: y\r\n\r\n");
        tok.next().unwrap();
        tok.next().unwrap();
        match tok.next().unwrap() {
            MimeEvent::Field(f) => {
                assert_eq!(f.body(), "one two");
                assert_eq!(f.raw(), b"Subject: one\r\n two");
            }
            other => panic!("expected field, got {:?}", other),
        }
        match tok.next().unwrap() {
            MimeEvent::Field(f) => assert_eq!(f.name(), "X-Next"),
            other => panic!("expected field, got {:?}", other),
        }
        assert_eq!(tok.next().unwrap(), MimeEvent::EndHeader);
    }

    #[test]
    fn unsplittable_line_dropped_silently() {
        let mut tok = tokenizer("garbage without colon\r\nSubject: ok\r\n\r\n");
        tok.next().unwrap();
        tok.next().unwrap();
        match tok.next().unwrap() {
            MimeEvent::Field(f) => assert_eq!(f.name(), "Subject"),
            other => panic!("expected field, got {:?}", other),
        }
    }

    #[test]
    fn headless_mode_queues_synthetic_field() {
        let config =
            MimeConfig::default().with_headless_content_type("text/plain; charset=utf-8");
        let mut tok =
            MimeTokenizer::new(Cursor::new(b"raw body only".to_vec()), config);
        assert_eq!(tok.next().unwrap(), MimeEvent::StartMessage);
        assert_eq!(tok.next().unwrap(), MimeEvent::StartHeader);
        match tok.next().unwrap() {
            MimeEvent::Field(f) => assert!(f.is("Content-Type")),
            other => panic!("expected field, got {:?}", other),
        }
        assert_eq!(tok.next().unwrap(), MimeEvent::EndHeader);
        assert_eq!(tok.next().unwrap(), MimeEvent::Body);
        assert_eq!(read_view(&mut tok), b"raw body only");
        assert_eq!(
            tok.descriptor().map(|d| d.charset().map(str::to_string)),
            Some(Some("utf-8".to_string()))
        );
    }

    #[test]
    fn raw_mode_surfaces_whole_entity() {
        let data = "Subject: x\r\n\r\nbody";
        let config = MimeConfig::default().with_recursion_mode(RecursionMode::Raw);
        let mut tok = MimeTokenizer::new(Cursor::new(data.as_bytes().to_vec()), config);
        assert_eq!(tok.next().unwrap(), MimeEvent::StartMessage);
        assert_eq!(tok.next().unwrap(), MimeEvent::Raw);
        assert_eq!(read_view(&mut tok), data.as_bytes());
        assert_eq!(tok.next().unwrap(), MimeEvent::EndMessage);
        assert_eq!(tok.next().unwrap(), MimeEvent::EndOfStream);
    }

    #[test]
    fn undrained_body_skipped_on_next() {
        let mut tok = tokenizer("A: b\r\n\r\nsome body content");
        while tok.next().unwrap() != MimeEvent::Body {}
        // do not read the body at all
        assert_eq!(tok.next().unwrap(), MimeEvent::EndMessage);
        assert_eq!(tok.next().unwrap(), MimeEvent::EndOfStream);
    }

    #[test]
    fn base64_body_decoding() {
        let data = "Content-Transfer-Encoding: base64\r\n\r\nSGVsbG8sIHdvcmxkLg==";
        let mut tok = tokenizer(data);
        while tok.next().unwrap() != MimeEvent::Body {}
        let mut out = Vec::new();
        let mut chunk = [0u8; 5];
        loop {
            let n = tok.read_body_decoded(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, b"Hello, world.");
    }

    #[test]
    fn base64_decoding_with_chunks_smaller_than_a_quantum() {
        // "AAAA" decodes to three zero bytes; a 2-byte output buffer must
        // still deliver all of them
        let data = "Content-Transfer-Encoding: base64\r\n\r\nAAAA";
        let mut tok = tokenizer(data);
        while tok.next().unwrap() != MimeEvent::Body {}
        let mut out = Vec::new();
        let mut chunk = [0u8; 2];
        loop {
            let n = tok.read_body_decoded(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, [0u8, 0, 0]);
    }

    #[test]
    fn quoted_printable_body_decoding() {
        let data = "Content-Transfer-Encoding: quoted-printable\r\n\r\ncaf=C3=A9=\r\n noir";
        let mut tok = tokenizer(data);
        while tok.next().unwrap() != MimeEvent::Body {}
        let mut out = Vec::new();
        let mut chunk = [0u8; 4];
        loop {
            let n = tok.read_body_decoded(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, "café noir".as_bytes());
    }

    #[test]
    fn strict_mode_rejects_unterminated_header() {
        let mut tok = MimeTokenizer::new(
            Cursor::new(b"Subject: cut off".to_vec()),
            MimeConfig::strict(),
        );
        tok.next().unwrap();
        tok.next().unwrap();
        let err = tok.next();
        assert!(matches!(err, Err(MimeError::Structural { .. })));
    }

    #[test]
    fn strict_mode_line_limit() {
        let mut config = MimeConfig::strict();
        config.max_line_len = 20;
        let data = format!("X-Long: {}\r\n\r\n", "y".repeat(100));
        let mut tok = MimeTokenizer::new(Cursor::new(data.into_bytes()), config);
        tok.next().unwrap();
        tok.next().unwrap();
        assert!(matches!(tok.next(), Err(MimeError::LineLimit { .. })));
    }

    #[test]
    fn strict_mode_line_limit_on_continuation_line() {
        let mut config = MimeConfig::strict();
        config.max_line_len = 20;
        let data = format!("X-Long: ok\r\n {}\r\n\r\n", "y".repeat(40));
        let mut tok = MimeTokenizer::new(Cursor::new(data.into_bytes()), config);
        tok.next().unwrap();
        tok.next().unwrap();
        assert!(matches!(tok.next(), Err(MimeError::LineLimit { .. })));
    }

    #[test]
    fn lenient_header_count_limit_drops_fields() {
        let mut config = MimeConfig::default();
        config.max_header_count = 2;
        let data = "A: 1\r\nB: 2\r\nC: 3\r\nD: 4\r\n\r\n";
        let mut tok = MimeTokenizer::new(Cursor::new(data.as_bytes().to_vec()), config);
        let mut fields = 0;
        loop {
            match tok.next().unwrap() {
                MimeEvent::Field(_) => fields += 1,
                MimeEvent::EndHeader => break,
                _ => {}
            }
        }
        assert_eq!(fields, 2);
    }
}
