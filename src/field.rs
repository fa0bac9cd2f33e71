/*
 * field.rs
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

//! A single header field, keeping both the raw folded octets and the
//! unfolded name/body split.

use crate::config::DecodeMonitor;
use crate::error::MimeError;
use crate::rfc2047;
use crate::utils;

/// One header field. `raw` holds the field exactly as read, folding included,
/// without the final line terminator; `name` and `body` are the unfolded
/// split around the first colon, interpreting octets as Latin-1 so no input
/// is ever lost to a charset error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    raw: Vec<u8>,
    name: String,
    body: String,
    invalid: Option<String>,
}

impl RawField {
    /// Splits a raw (possibly folded) field into name and body. Returns
    /// `None` when there is no colon or the name contains a byte outside the
    /// printable US-ASCII field-name set; such lines are not header fields.
    pub fn parse(raw: Vec<u8>) -> Option<RawField> {
        let colon = memchr::memchr(b':', &raw)?;
        let mut name_end = colon;
        // trailing whitespace between the name and the colon is tolerated
        while name_end > 0 && (raw[name_end - 1] == b' ' || raw[name_end - 1] == b'\t') {
            name_end -= 1;
        }
        if name_end == 0 {
            return None;
        }
        let name_bytes = &raw[..name_end];
        if !name_bytes.iter().all(|&b| (33..=126).contains(&b) && b != b':') {
            return None;
        }
        let name = String::from_utf8_lossy(name_bytes).into_owned();
        let body_raw: String = raw[colon + 1..].iter().map(|&b| b as char).collect();
        let body = utils::unfold(&body_raw).trim().to_string();
        Some(RawField {
            raw,
            name,
            body,
            invalid: None,
        })
    }

    /// Builds a field that was not read from the stream, e.g. the implied
    /// Content-Type of a headless entity.
    pub fn synthetic(name: &str, body: &str) -> RawField {
        RawField {
            raw: format!("{}: {}", name, body).into_bytes(),
            name: name.to_string(),
            body: body.to_string(),
            invalid: None,
        }
    }

    /// The field exactly as it appeared on the wire, folding preserved,
    /// without the final CRLF.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unfolded, trimmed field body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Field body with RFC 2047 encoded words expanded.
    pub fn decoded_body(
        &self,
        fallback_charset: Option<&str>,
        monitor: &DecodeMonitor,
    ) -> Result<String, MimeError> {
        rfc2047::decode_encoded_words(&self.body, fallback_charset, monitor)
    }

    /// Why the field body failed structured parsing, if it did. The field is
    /// still delivered; this only records the defect.
    pub fn invalid(&self) -> Option<&str> {
        self.invalid.as_deref()
    }

    pub(crate) fn mark_invalid(&mut self, reason: String) {
        self.invalid = Some(reason);
    }

    /// Case-insensitive name match.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple() {
        let f = RawField::parse(b"Subject: hello".to_vec()).unwrap();
        assert_eq!(f.name(), "Subject");
        assert_eq!(f.body(), "hello");
        assert!(f.invalid().is_none());
    }

    #[test]
    fn parse_folded_body_unfolds() {
        let f = RawField::parse(b"Subject: one\r\n two".to_vec()).unwrap();
        assert_eq!(f.body(), "one two");
        assert_eq!(f.raw(), b"Subject: one\r\n two");
    }

    #[test]
    fn name_whitespace_before_colon_trimmed() {
        let f = RawField::parse(b"Subject : x".to_vec()).unwrap();
        assert_eq!(f.name(), "Subject");
    }

    #[test]
    fn unsplittable_lines_rejected() {
        assert!(RawField::parse(b"no colon here".to_vec()).is_none());
        assert!(RawField::parse(b": empty name".to_vec()).is_none());
        assert!(RawField::parse(b"bad name: x".to_vec()).is_none());
        assert!(RawField::parse(b"\x01ctl: x".to_vec()).is_none());
    }

    #[test]
    fn latin1_body_preserved() {
        let f = RawField::parse(b"X-Note: caf\xe9".to_vec()).unwrap();
        assert_eq!(f.body(), "café");
    }

    #[test]
    fn decoded_body_expands_words() {
        let f = RawField::parse(b"Subject: =?UTF-8?B?SGVsbG8=?=".to_vec()).unwrap();
        let decoded = f.decoded_body(None, &DecodeMonitor::Silent).unwrap();
        assert_eq!(decoded, "Hello");
    }

    #[test]
    fn synthetic_field() {
        let f = RawField::synthetic("Content-Type", "text/plain");
        assert!(f.is("content-type"));
        assert_eq!(f.body(), "text/plain");
        assert_eq!(f.raw(), b"Content-Type: text/plain");
    }
}
