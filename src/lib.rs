/*
 * lib.rs
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

//! Streaming MIME tokenizer (RFC 822/2045/2046): pull event API over a
//! shared octet buffer, boundary sub-stream views, incremental content
//! decoders and a push handler facade.

mod base64;
mod boundary;
mod buffer;
mod config;
mod descriptor;
mod error;
mod field;
mod handler;
mod parser;
mod quoted_printable;
mod rfc2047;
mod tokenizer;
mod utils;

pub use buffer::SharedBuffer;
pub use config::{DecodeMonitor, MimeConfig, RecursionMode};
pub use descriptor::{BodyDescriptor, EntityKind};
pub use error::MimeError;
pub use field::RawField;
pub use handler::MimeHandler;
pub use parser::MimeStreamParser;
pub use rfc2047::decode_encoded_words;
pub use tokenizer::{MimeEvent, MimeTokenizer, StopHandle};
pub use utils::{
    fold, is_boundary_char, is_token, is_token_char, is_valid_boundary, unfold,
    unique_boundary, unique_message_id,
};

pub mod codec {
    //! RFC 2045 content-transfer-encoding codecs, usable standalone.
    pub use crate::base64::{decode_all as base64_decode, encode as base64_encode};
    pub use crate::quoted_printable::{
        decode_all as quoted_printable_decode, encode as quoted_printable_encode,
    };
}
