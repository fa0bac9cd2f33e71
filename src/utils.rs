/*
 * utils.rs
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

//! RFC 2045/2046 lexical helpers, header folding, unique token generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default fold column for header text.
pub const FOLD_WIDTH: usize = 76;

/// Checks if a byte is valid in an RFC 2045 token.
#[inline]
pub fn is_token_char(c: u8) -> bool {
    matches!(c,
        b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' |
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
        b'^' | b'_' | b'`' | b'{' | b'|' | b'}' | b'~'
    )
}

/// Checks if the string is a valid RFC 2045 token (1+ token chars).
pub fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_token_char)
}

/// Checks if a byte is valid in a MIME boundary (RFC 2046).
#[inline]
pub fn is_boundary_char(c: u8) -> bool {
    matches!(c,
        b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' |
        b'\'' | b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' |
        b'/' | b':' | b'=' | b'?' | b' '
    )
}

/// Validates a MIME boundary token: 1-70 chars from the boundary set, not
/// ending in a space (RFC 2046).
pub fn is_valid_boundary(boundary: &str) -> bool {
    let b = boundary.as_bytes();
    (1..=70).contains(&b.len())
        && b.iter().copied().all(is_boundary_char)
        && !b.ends_with(b" ")
}

/// Removes all folding line terminators from header text. Idempotent:
/// `unfold(fold(s, w)) == unfold(s)` for any fold width.
pub fn unfold(s: &str) -> String {
    if !s.contains(['\r', '\n']) {
        return s.to_string();
    }
    s.chars().filter(|&c| c != '\r' && c != '\n').collect()
}

/// Folds header text so that no line exceeds [`FOLD_WIDTH`] characters,
/// inserting CRLF before existing whitespace only. `used` is the number of
/// characters already on the first line (the field name and colon).
pub fn fold(s: &str, used: usize) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / FOLD_WIDTH * 2 + 2);
    let mut line_len = used;
    let mut last_ws: Option<usize> = None;
    for c in s.chars() {
        if c == ' ' || c == '\t' {
            last_ws = Some(out.len());
        }
        out.push(c);
        line_len += 1;
        if line_len > FOLD_WIDTH {
            if let Some(i) = last_ws {
                out.insert_str(i, "\r\n");
                line_len = out.len() - (i + 2);
                last_ws = None;
            }
        }
    }
    out
}

// Process-wide; see unique_boundary and unique_message_id.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_id() -> u64 {
    ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Builds a boundary token that cannot collide with one generated earlier in
/// this process. Valid per [`is_valid_boundary`].
pub fn unique_boundary() -> String {
    format!("=_{:x}.{:x}", next_id(), epoch_millis())
}

/// Builds a unique message-id for the given host (RFC 5322 msg-id syntax).
pub fn unique_message_id(hostname: &str) -> String {
    let host = if hostname.is_empty() {
        "localhost"
    } else {
        hostname
    };
    format!("<busta.{:x}.{:x}@{}>", next_id(), epoch_millis(), host)
}
