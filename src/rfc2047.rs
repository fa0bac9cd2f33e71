/*
 * rfc2047.rs
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

//! RFC 2047 encoded-word decoding (e.g. `=?charset?q?text?=`) over already
//! unfolded header text.

use crate::base64;
use crate::config::DecodeMonitor;
use crate::error::MimeError;
use crate::quoted_printable;

/// Expand RFC 2047 encoded words in unfolded header text.
///
/// Whitespace strictly between two successfully decoded adjacent encoded
/// words is elided per the header folding rules; all other separator text is
/// preserved verbatim, as is any encoded word that fails to decode. Unknown
/// charsets are left encoded unless `fallback_charset` names a known one.
///
/// Compatibility quirk, preserved deliberately: an encoded word whose text
/// segment is empty makes the whole call return the empty string, discarding
/// everything decoded so far. The monitor is informed so strict callers can
/// reject such input instead.
pub fn decode_encoded_words(
    text: &str,
    fallback_charset: Option<&str>,
    monitor: &DecodeMonitor,
) -> Result<String, MimeError> {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    let mut prev_decoded = false;

    while pos < bytes.len() {
        let Some(start) = find_marker(bytes, pos) else {
            out.push_str(&text[pos..]);
            break;
        };
        match parse_encoded_word(bytes, start) {
            Some(word) => {
                if word.payload.is_empty() {
                    monitor.report("encoded-word", "empty encoded text segment")?;
                    return Ok(String::new());
                }
                match decode_word(&word, fallback_charset, monitor)? {
                    Some(decoded) => {
                        let sep = &text[pos..start];
                        let elide = prev_decoded
                            && !sep.is_empty()
                            && sep.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'));
                        if !elide {
                            out.push_str(sep);
                        }
                        out.push_str(&decoded);
                        prev_decoded = true;
                    }
                    None => {
                        // leave the separator and the raw word untouched
                        out.push_str(&text[pos..word.end]);
                        prev_decoded = false;
                    }
                }
                pos = word.end;
            }
            None => {
                // "=?" that does not open a well-formed word is ordinary text
                let skip = (start + 2).min(bytes.len());
                out.push_str(&text[pos..skip]);
                prev_decoded = false;
                pos = skip;
            }
        }
    }
    Ok(out)
}

struct EncodedWord<'a> {
    charset: &'a str,
    encoding: u8,
    payload: &'a [u8],
    end: usize,
}

fn find_marker(bytes: &[u8], from: usize) -> Option<usize> {
    memchr::memmem::find(&bytes[from..], b"=?").map(|i| from + i)
}

/// Parse one `=?charset?enc?text?=` run starting at `start` (which points at
/// the opening `=?`).
fn parse_encoded_word(bytes: &[u8], start: usize) -> Option<EncodedWord<'_>> {
    let rest = &bytes[start + 2..];
    let q1 = memchr::memchr(b'?', rest)?;
    if q1 == 0 {
        return None;
    }
    let charset = std::str::from_utf8(&rest[..q1]).ok()?.trim();
    let enc_off = q1 + 1;
    if rest.len() <= enc_off + 1 || rest[enc_off + 1] != b'?' {
        return None;
    }
    let encoding = rest[enc_off].to_ascii_lowercase();
    let payload_off = enc_off + 2;
    let close = memchr::memmem::find(&rest[payload_off..], b"?=")?;
    let payload = &rest[payload_off..payload_off + close];
    Some(EncodedWord {
        charset,
        encoding,
        payload,
        end: start + 2 + payload_off + close + 2,
    })
}

/// Decode one word. `Ok(None)` means "leave the original text in place".
fn decode_word(
    word: &EncodedWord<'_>,
    fallback_charset: Option<&str>,
    monitor: &DecodeMonitor,
) -> Result<Option<String>, MimeError> {
    let raw = match word.encoding {
        b'b' => decode_b(word.payload),
        b'q' => decode_q(word.payload, monitor)?,
        other => {
            monitor.report(
                "encoded-word",
                format!("unknown encoding {:?}", other as char),
            )?;
            return Ok(None);
        }
    };
    match charset_to_string(&raw, word.charset) {
        Some(s) => Ok(Some(s)),
        None => match fallback_charset.and_then(|f| charset_to_string(&raw, f)) {
            Some(s) => Ok(Some(s)),
            None => {
                monitor.report(
                    "encoded-word",
                    format!("unknown charset {:?}", word.charset),
                )?;
                Ok(None)
            }
        },
    }
}

fn decode_b(payload: &[u8]) -> Vec<u8> {
    base64::decode_all(payload)
}

/// Q encoding: `_` means space, the rest is quoted-printable.
fn decode_q(payload: &[u8], monitor: &DecodeMonitor) -> Result<Vec<u8>, MimeError> {
    let mut widened = Vec::with_capacity(payload.len() + 8);
    for &b in payload {
        if b == b'_' {
            widened.extend_from_slice(b"=20");
        } else {
            widened.push(b);
        }
    }
    quoted_printable::decode_all(&widened, monitor)
}

/// Known-charset conversion. The tokenizer does not transcode message bodies;
/// this covers only the charsets a header decoder must understand natively.
fn charset_to_string(bytes: &[u8], charset: &str) -> Option<String> {
    let mut name = charset;
    if let Some(i) = name.find('*') {
        // RFC 2231 language suffix
        name = &name[..i];
    }
    if name.eq_ignore_ascii_case("utf-8") || name.eq_ignore_ascii_case("utf8") {
        Some(String::from_utf8_lossy(bytes).into_owned())
    } else if name.eq_ignore_ascii_case("us-ascii") || name.eq_ignore_ascii_case("ascii") {
        Some(bytes.iter().map(|&b| (b & 0x7f) as char).collect())
    } else if name.eq_ignore_ascii_case("iso-8859-1")
        || name.eq_ignore_ascii_case("iso_8859-1")
        || name.eq_ignore_ascii_case("latin1")
    {
        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(s: &str) -> String {
        decode_encoded_words(s, None, &DecodeMonitor::Silent).unwrap()
    }

    #[test]
    fn decode_b_word() {
        assert_eq!(decode("=?UTF-8?B?SGVsbG8=?="), "Hello");
    }

    #[test]
    fn decode_q_word() {
        assert_eq!(decode("=?UTF-8?Q?Hello_World?="), "Hello World");
        assert_eq!(decode("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn surrounding_text_preserved() {
        assert_eq!(decode("Re: =?UTF-8?B?SGVsbG8=?= there"), "Re: Hello there");
    }

    #[test]
    fn whitespace_between_decoded_words_elided() {
        assert_eq!(
            decode("=?UTF-8?Q?Hello?= =?UTF-8?Q?World?="),
            "HelloWorld"
        );
        assert_eq!(
            decode("=?UTF-8?Q?Hello?= and =?UTF-8?Q?World?="),
            "Hello and World"
        );
    }

    #[test]
    fn whitespace_next_to_failed_word_preserved() {
        assert_eq!(
            decode("=?UTF-8?Q?Hello?= =?x-weird?Q?World?="),
            "Hello =?x-weird?Q?World?="
        );
    }

    #[test]
    fn unknown_charset_left_encoded() {
        assert_eq!(decode("=?x-weird?Q?abc?="), "=?x-weird?Q?abc?=");
    }

    #[test]
    fn fallback_charset_applies() {
        let s = decode_encoded_words("=?x-weird?Q?caf=E9?=", Some("iso-8859-1"), &DecodeMonitor::Silent)
            .unwrap();
        assert_eq!(s, "café");
    }

    #[test]
    fn unknown_encoding_left_alone() {
        assert_eq!(decode("=?UTF-8?X?abc?="), "=?UTF-8?X?abc?=");
    }

    #[test]
    fn empty_text_segment_discards_remainder() {
        // legacy quirk: the whole decode collapses to the empty string
        assert_eq!(decode("before =?UTF-8?Q??= after"), "");
    }

    #[test]
    fn empty_text_segment_strict_fails() {
        let err = decode_encoded_words("x =?UTF-8?Q??=", None, &DecodeMonitor::Strict);
        assert!(matches!(err, Err(MimeError::Decode { .. })));
    }

    #[test]
    fn stray_marker_is_plain_text() {
        assert_eq!(decode("a =? b"), "a =? b");
        assert_eq!(decode("50% =?off"), "50% =?off");
    }

    #[test]
    fn no_markers_fast_path() {
        assert_eq!(decode("plain subject"), "plain subject");
    }
}
