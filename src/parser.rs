/*
 * parser.rs
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

//! Push facade: drives the pull tokenizer to end of stream and dispatches
//! one handler callback per event.

use std::io::Read;

use crate::config::MimeConfig;
use crate::error::MimeError;
use crate::handler::MimeHandler;
use crate::tokenizer::{MimeEvent, MimeTokenizer, StopHandle};

const CHUNK_LEN: usize = 4096;

/// Drives a [`MimeTokenizer`] and pushes its events into a [`MimeHandler`].
/// Reusable across sequential parses; each call to [`parse`](Self::parse)
/// builds a fresh tokenizer over the given source.
pub struct MimeStreamParser {
    config: MimeConfig,
    stop: StopHandle,
    decode_body: bool,
}

impl MimeStreamParser {
    pub fn new(config: MimeConfig) -> Self {
        Self {
            config,
            stop: StopHandle::new(),
            decode_body: false,
        }
    }

    /// When enabled, body chunks are delivered with the entity's
    /// Content-Transfer-Encoding already decoded.
    pub fn set_content_decoding(&mut self, decode: bool) {
        self.decode_body = decode;
    }

    /// The cancellation flag for the parse in progress (or the next one).
    /// Stopping keeps the callback sequence balanced: every open `start_*`
    /// still receives its `end_*`, but no further input is consumed.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Parses one message from `source`, dispatching events to `handler`
    /// until end of stream. A handler error aborts and propagates.
    pub fn parse<R: Read, H: MimeHandler>(
        &self,
        source: R,
        handler: &mut H,
    ) -> Result<(), MimeError> {
        self.stop.reset();
        let mut tok = MimeTokenizer::with_stop(source, self.config.clone(), self.stop.clone());
        let mut chunk = [0u8; CHUNK_LEN];
        loop {
            match tok.next()? {
                MimeEvent::StartMessage => handler.start_message()?,
                MimeEvent::StartHeader => handler.start_header()?,
                MimeEvent::Field(f) => handler.field(&f)?,
                MimeEvent::EndHeader => handler.end_header()?,
                MimeEvent::Preamble => loop {
                    let n = tok.read_body(&mut chunk)?;
                    if n == 0 {
                        break;
                    }
                    handler.preamble_chunk(&chunk[..n])?;
                },
                MimeEvent::StartMultipart => {
                    if let Some(d) = tok.descriptor() {
                        handler.start_multipart(d)?;
                    }
                }
                MimeEvent::StartBodyPart => handler.start_body_part()?,
                MimeEvent::EndBodyPart => handler.end_body_part()?,
                MimeEvent::Epilogue => loop {
                    let n = tok.read_body(&mut chunk)?;
                    if n == 0 {
                        break;
                    }
                    handler.epilogue_chunk(&chunk[..n])?;
                },
                MimeEvent::EndMultipart => handler.end_multipart()?,
                MimeEvent::Body => {
                    if let Some(d) = tok.descriptor() {
                        handler.body(d)?;
                    }
                    loop {
                        let n = if self.decode_body {
                            tok.read_body_decoded(&mut chunk)?
                        } else {
                            tok.read_body(&mut chunk)?
                        };
                        if n == 0 {
                            break;
                        }
                        handler.body_chunk(&chunk[..n])?;
                    }
                }
                MimeEvent::Raw => loop {
                    let n = tok.read_body(&mut chunk)?;
                    if n == 0 {
                        break;
                    }
                    handler.raw_chunk(&chunk[..n])?;
                },
                MimeEvent::EndMessage => handler.end_message()?,
                MimeEvent::EndOfStream => {
                    handler.end_of_stream()?;
                    return Ok(());
                }
            }
        }
    }
}

impl Default for MimeStreamParser {
    fn default() -> Self {
        Self::new(MimeConfig::default())
    }
}
