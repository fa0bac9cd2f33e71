/*
 * descriptor.rs
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

//! Entity body metadata accumulated from header fields: content type,
//! boundary, transfer encoding, charset.

use crate::field::RawField;
use crate::utils::{is_token, is_valid_boundary};

/// How an entity's body is structured, derived from its media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Leaf content: text, image, application data.
    Discrete,
    /// A container of body parts delimited by a boundary.
    Multipart,
    /// An embedded message/rfc822 entity.
    Message,
}

/// Body metadata for one entity, built up as header fields arrive and frozen
/// when the header ends. For structured fields that repeat, the first
/// occurrence wins; later duplicates are ignored.
#[derive(Debug, Clone)]
pub struct BodyDescriptor {
    media_type: String,
    sub_type: String,
    mime_type: String,
    charset: Option<String>,
    transfer_encoding: String,
    boundary: Option<String>,
    content_disposition: Option<String>,
    content_length: Option<u64>,
    fields: Vec<RawField>,
    parent_is_digest: bool,
    seen_content_type: bool,
    seen_transfer_encoding: bool,
    seen_disposition: bool,
    seen_length: bool,
}

impl BodyDescriptor {
    /// `parent_is_digest` selects the default content type when the entity
    /// carries none: message/rfc822 inside multipart/digest, text/plain
    /// everywhere else (RFC 2046).
    pub fn new(parent_is_digest: bool) -> Self {
        Self {
            media_type: String::new(),
            sub_type: String::new(),
            mime_type: String::new(),
            charset: None,
            transfer_encoding: "7bit".to_string(),
            boundary: None,
            content_disposition: None,
            content_length: None,
            fields: Vec::new(),
            parent_is_digest,
            seen_content_type: false,
            seen_transfer_encoding: false,
            seen_disposition: false,
            seen_length: false,
        }
    }

    /// Folds one header field into the descriptor. The field is retained
    /// verbatim either way; a Content-Type that fails to parse is marked
    /// invalid on the field and the defaults apply at finalize.
    pub fn add_field(&mut self, field: &mut RawField) {
        if field.is("Content-Type") {
            if !self.seen_content_type {
                self.seen_content_type = true;
                if !self.apply_content_type(&field.body().to_string()) {
                    field.mark_invalid(format!("unparseable content type {:?}", field.body()));
                }
            }
        } else if field.is("Content-Transfer-Encoding") {
            if !self.seen_transfer_encoding {
                self.seen_transfer_encoding = true;
                let v = field.body().trim().to_ascii_lowercase();
                if is_token(&v) {
                    self.transfer_encoding = v;
                } else {
                    field.mark_invalid(format!("unparseable transfer encoding {:?}", field.body()));
                }
            }
        } else if field.is("Content-Disposition") {
            if !self.seen_disposition {
                self.seen_disposition = true;
                self.content_disposition = Some(field.body().to_string());
            }
        } else if field.is("Content-Length") {
            if !self.seen_length {
                self.seen_length = true;
                match field.body().trim().parse::<u64>() {
                    Ok(n) => self.content_length = Some(n),
                    Err(_) => {
                        field.mark_invalid(format!("unparseable content length {:?}", field.body()));
                    }
                }
            }
        }
        self.fields.push(field.clone());
    }

    fn apply_content_type(&mut self, value: &str) -> bool {
        let Some((media, sub, params)) = parse_content_type(value) else {
            return false;
        };
        self.media_type = media;
        self.sub_type = sub;
        for (name, value) in params {
            if name.eq_ignore_ascii_case("boundary") {
                if self.boundary.is_none() && is_valid_boundary(&value) {
                    self.boundary = Some(value);
                }
            } else if name.eq_ignore_ascii_case("charset") {
                if self.charset.is_none() && !value.trim().is_empty() {
                    self.charset = Some(value.trim().to_ascii_lowercase());
                }
            }
        }
        true
    }

    /// Freezes the descriptor at end of header. An entity without a usable
    /// content type, including a multipart whose boundary parameter is
    /// missing or invalid, falls back to its context default.
    pub fn finalize(&mut self) {
        let unusable = self.media_type.is_empty()
            || (self.media_type.eq_ignore_ascii_case("multipart") && self.boundary.is_none());
        if unusable {
            if self.parent_is_digest {
                self.media_type = "message".to_string();
                self.sub_type = "rfc822".to_string();
            } else {
                self.media_type = "text".to_string();
                self.sub_type = "plain".to_string();
            }
            self.boundary = None;
        }
        self.mime_type = format!(
            "{}/{}",
            self.media_type.to_ascii_lowercase(),
            self.sub_type.to_ascii_lowercase()
        );
    }

    /// Structural classification; meaningful after [`finalize`](Self::finalize).
    pub fn kind(&self) -> EntityKind {
        if self.media_type.eq_ignore_ascii_case("multipart") {
            EntityKind::Multipart
        } else if self.mime_type == "message/rfc822" {
            EntityKind::Message
        } else {
            EntityKind::Discrete
        }
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    /// Normalized `media/sub` in lower case.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Declared charset, defaulting to us-ascii for textual entities only.
    pub fn charset(&self) -> Option<&str> {
        match self.charset.as_deref() {
            Some(c) => Some(c),
            None if self.media_type.eq_ignore_ascii_case("text") => Some("us-ascii"),
            None => None,
        }
    }

    pub fn transfer_encoding(&self) -> &str {
        &self.transfer_encoding
    }

    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    pub fn content_disposition(&self) -> Option<&str> {
        self.content_disposition.as_deref()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Every header field of the entity, in wire order.
    pub fn fields(&self) -> &[RawField] {
        &self.fields
    }

    /// First field with the given name, case-insensitive.
    pub fn field(&self, name: &str) -> Option<&RawField> {
        self.fields.iter().find(|f| f.is(name))
    }
}

/// Splits a Content-Type value into media type, sub type and parameters.
fn parse_content_type(value: &str) -> Option<(String, String, Vec<(String, String)>)> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let (type_part, params_part) = match value.find(';') {
        Some(i) => {
            let (a, b) = value.split_at(i);
            (a.trim(), b[1..].trim())
        }
        None => (value, ""),
    };
    let slash = type_part.find('/')?;
    let media = type_part[..slash].trim();
    let sub = type_part[slash + 1..].trim();
    if !is_token(media) || !is_token(sub) {
        return None;
    }
    Some((
        media.to_string(),
        sub.to_string(),
        parse_parameter_list(params_part),
    ))
}

/// Walks a semicolon-separated parameter list (`name=value; name="value"`).
/// Malformed runs are skipped, not fatal; whatever parses is kept.
fn parse_parameter_list(params_part: &str) -> Vec<(String, String)> {
    let mut parameters = Vec::new();
    let bytes = params_part.as_bytes();
    let len = bytes.len();
    let mut pos = 0;

    while pos < len {
        while pos < len && (bytes[pos] == b';' || bytes[pos].is_ascii_whitespace()) {
            pos += 1;
        }
        if pos >= len {
            break;
        }
        let Some(eq) = bytes[pos..].iter().position(|&b| b == b'=') else {
            break;
        };
        let eq_abs = pos + eq;
        let name = match std::str::from_utf8(&bytes[pos..eq_abs]) {
            Ok(s) => s.trim(),
            Err(_) => break,
        };
        if !is_token(name) {
            match bytes[pos..].iter().position(|&b| b == b';') {
                Some(semi) => {
                    pos += semi + 1;
                    continue;
                }
                None => break,
            }
        }
        pos = eq_abs + 1;
        let value = if pos < len && bytes[pos] == b'"' {
            pos += 1;
            let mut v = String::new();
            while pos < len {
                let c = bytes[pos];
                if c == b'\\' && pos + 1 < len {
                    v.push(bytes[pos + 1] as char);
                    pos += 2;
                } else if c == b'"' {
                    pos += 1;
                    break;
                } else {
                    v.push(c as char);
                    pos += 1;
                }
            }
            v
        } else {
            let end = bytes[pos..]
                .iter()
                .position(|&b| b == b';')
                .map(|i| pos + i)
                .unwrap_or(len);
            let v = match std::str::from_utf8(&bytes[pos..end]) {
                Ok(s) => s.trim().to_string(),
                Err(_) => String::new(),
            };
            pos = end;
            v
        };
        parameters.push((name.to_string(), value));
    }
    parameters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(fields: &[(&str, &str)]) -> BodyDescriptor {
        let mut d = BodyDescriptor::new(false);
        for (name, body) in fields {
            let mut f = RawField::synthetic(name, body);
            d.add_field(&mut f);
        }
        d.finalize();
        d
    }

    #[test]
    fn defaults_without_content_type() {
        let d = descriptor(&[("Subject", "hi")]);
        assert_eq!(d.mime_type(), "text/plain");
        assert_eq!(d.kind(), EntityKind::Discrete);
        assert_eq!(d.charset(), Some("us-ascii"));
        assert_eq!(d.transfer_encoding(), "7bit");
    }

    #[test]
    fn digest_child_defaults_to_message() {
        let mut d = BodyDescriptor::new(true);
        d.finalize();
        assert_eq!(d.mime_type(), "message/rfc822");
        assert_eq!(d.kind(), EntityKind::Message);
    }

    #[test]
    fn multipart_with_boundary() {
        let d = descriptor(&[(
            "Content-Type",
            "multipart/mixed; boundary=\"simple boundary\"",
        )]);
        assert_eq!(d.mime_type(), "multipart/mixed");
        assert_eq!(d.kind(), EntityKind::Multipart);
        assert_eq!(d.boundary(), Some("simple boundary"));
    }

    #[test]
    fn multipart_without_boundary_degrades() {
        let d = descriptor(&[("Content-Type", "multipart/mixed")]);
        assert_eq!(d.mime_type(), "text/plain");
        assert_eq!(d.kind(), EntityKind::Discrete);
        assert!(d.boundary().is_none());
    }

    #[test]
    fn invalid_boundary_ignored() {
        let d = descriptor(&[(
            "Content-Type",
            "multipart/mixed; boundary=\"ends in space \"",
        )]);
        assert_eq!(d.mime_type(), "text/plain");
    }

    #[test]
    fn charset_and_case_normalization() {
        let d = descriptor(&[("Content-Type", "TEXT/Html; Charset=UTF-8")]);
        assert_eq!(d.mime_type(), "text/html");
        assert_eq!(d.media_type(), "TEXT");
        assert_eq!(d.charset(), Some("utf-8"));
    }

    #[test]
    fn first_occurrence_wins() {
        let d = descriptor(&[
            ("Content-Type", "text/html"),
            ("Content-Type", "image/png"),
            ("Content-Transfer-Encoding", "base64"),
            ("Content-Transfer-Encoding", "7bit"),
        ]);
        assert_eq!(d.mime_type(), "text/html");
        assert_eq!(d.transfer_encoding(), "base64");
        // every occurrence is still retained verbatim
        assert_eq!(
            d.fields().iter().filter(|f| f.is("content-type")).count(),
            2
        );
    }

    #[test]
    fn unparseable_content_type_marks_field() {
        let mut d = BodyDescriptor::new(false);
        let mut f = RawField::synthetic("Content-Type", "not a type");
        d.add_field(&mut f);
        d.finalize();
        assert!(f.invalid().is_some());
        assert_eq!(d.mime_type(), "text/plain");
    }

    #[test]
    fn content_length_parsed() {
        let d = descriptor(&[("Content-Length", "1234")]);
        assert_eq!(d.content_length(), Some(1234));
    }

    #[test]
    fn message_rfc822_detected() {
        let d = descriptor(&[("Content-Type", "message/rfc822")]);
        assert_eq!(d.kind(), EntityKind::Message);
    }

    #[test]
    fn non_content_fields_retained() {
        let d = descriptor(&[("Subject", "x"), ("Content-Type", "text/plain")]);
        assert_eq!(d.fields().len(), 2);
        assert!(d.field("subject").is_some());
        assert!(d.field("missing").is_none());
    }
}
