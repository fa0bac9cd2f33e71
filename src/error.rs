/*
 * error.rs
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

//! Tokenizer error taxonomy: I/O, structural, configured limits, strict decode.

use thiserror::Error;

/// Errors surfaced by the tokenizer and the event facade.
///
/// Field-value failures are not represented here; they are attached to the
/// offending [`RawField`](crate::field::RawField) and never abort tokenization.
#[derive(Debug, Error)]
pub enum MimeError {
    /// Unrecoverable I/O failure on the underlying octet source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed message structure (strict mode only; lenient mode degrades).
    #[error("{message} (offset {offset})")]
    Structural { message: String, offset: u64 },

    /// A physical header line exceeded the configured maximum length.
    #[error("header line exceeds {limit} bytes (offset {offset})")]
    LineLimit { limit: usize, offset: u64 },

    /// The header section exceeded a configured count or size limit.
    #[error("header section exceeds configured {what} limit of {limit} (offset {offset})")]
    HeaderLimit {
        what: &'static str,
        limit: usize,
        offset: u64,
    },

    /// Entity nesting went past the configured maximum depth.
    #[error("nesting depth exceeds {limit}")]
    MaxDepth { limit: usize },

    /// Malformed encoded content escalated by a strict decode monitor.
    #[error("malformed {what}: {detail}")]
    Decode { what: &'static str, detail: String },

    /// A handler refused further events.
    #[error("aborted by handler: {0}")]
    Aborted(String),
}
