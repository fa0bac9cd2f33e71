/*
 * quoted_printable.rs
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

//! Quoted-printable codec for Content-Transfer-Encoding (RFC 2045):
//! incremental decode with soft-break collapsing, encode with soft wrapping.

use crate::config::DecodeMonitor;
use crate::error::MimeError;

const HEX_DECODE: [i8; 256] = {
    let mut t = [-1i8; 256];
    let mut i = 0u8;
    while i < 10 {
        t[(b'0' + i) as usize] = i as i8;
        i += 1;
    }
    let mut i = 0u8;
    while i < 6 {
        t[(b'A' + i) as usize] = (10 + i) as i8;
        t[(b'a' + i) as usize] = (10 + i) as i8;
        i += 1;
    }
    t
};

const HEX_ENCODE: &[u8; 16] = b"0123456789ABCDEF";

/// Soft-wrap column for encoded output.
const LINE_LEN: usize = 76;

/// Decode quoted-printable from `src` into `dst`. Handles `=XX` escapes,
/// collapses soft line breaks (`=CRLF`, `=LF`) together with any trailing
/// blanks before the break, and passes literal line terminators through as
/// hard breaks. Bytes the decoder cannot yet classify (an escape or blank run
/// cut off at the end of `src`) are left unconsumed unless `end_of_stream`.
/// Malformed escapes are reported to the monitor and, when tolerated, emitted
/// verbatim. Returns the number of bytes consumed from `src`.
pub fn decode(
    src: &[u8],
    src_pos: &mut usize,
    dst: &mut [u8],
    dst_pos: &mut usize,
    max_decode: usize,
    end_of_stream: bool,
    monitor: &DecodeMonitor,
) -> Result<usize, MimeError> {
    let start_src = *src_pos;
    let dst_limit = (*dst_pos + max_decode).min(dst.len());

    while *src_pos < src.len() && *dst_pos < dst_limit {
        let b = src[*src_pos];
        match b {
            b' ' | b'\t' => {
                // blanks are transparent only when followed by a line break
                // (hard, or soft via '='); look ahead to decide
                let run_start = *src_pos;
                let mut j = run_start;
                while j < src.len() && (src[j] == b' ' || src[j] == b'\t') {
                    j += 1;
                }
                let verdict = classify_after_blanks(src, j, end_of_stream);
                match verdict {
                    AfterBlanks::Undecided => break,
                    AfterBlanks::LineBreak => {
                        // trailing blanks before the break are folded away
                        *src_pos = j;
                    }
                    AfterBlanks::Content => {
                        let n = (j - run_start).min(dst_limit - *dst_pos);
                        dst[*dst_pos..*dst_pos + n].copy_from_slice(&src[run_start..run_start + n]);
                        *dst_pos += n;
                        *src_pos += n;
                        if n < j - run_start {
                            // output full
                            break;
                        }
                    }
                }
            }
            b'=' => {
                let remaining = src.len() - *src_pos;
                if remaining >= 3 {
                    let h1 = src[*src_pos + 1];
                    let h2 = src[*src_pos + 2];
                    let v1 = HEX_DECODE[h1 as usize];
                    let v2 = HEX_DECODE[h2 as usize];
                    if v1 >= 0 && v2 >= 0 {
                        dst[*dst_pos] = ((v1 << 4) | v2) as u8;
                        *dst_pos += 1;
                        *src_pos += 3;
                    } else if h1 == b'\r' && h2 == b'\n' {
                        // soft break
                        *src_pos += 3;
                    } else if h1 == b'\n' {
                        *src_pos += 2;
                    } else {
                        monitor.report(
                            "quoted-printable",
                            format!("invalid escape =\\x{:02x}\\x{:02x}", h1, h2),
                        )?;
                        dst[*dst_pos] = b;
                        *dst_pos += 1;
                        *src_pos += 1;
                    }
                } else if remaining == 2 && src[*src_pos + 1] == b'\n' {
                    *src_pos += 2;
                } else if !end_of_stream {
                    // escape cut off at the window edge
                    break;
                } else if remaining == 2 && src[*src_pos + 1] == b'\r' {
                    // "=\r" at end of stream: treat the pair as a soft break
                    *src_pos += 2;
                } else {
                    monitor.report("quoted-printable", "truncated escape at end of stream")?;
                    dst[*dst_pos] = b;
                    *dst_pos += 1;
                    *src_pos += 1;
                }
            }
            _ => {
                dst[*dst_pos] = b;
                *dst_pos += 1;
                *src_pos += 1;
            }
        }
    }
    Ok(*src_pos - start_src)
}

enum AfterBlanks {
    LineBreak,
    Content,
    Undecided,
}

/// What follows a run of blanks ending at `j`: a (possibly soft) line break,
/// ordinary content, or not enough input to tell.
fn classify_after_blanks(src: &[u8], j: usize, end_of_stream: bool) -> AfterBlanks {
    if j == src.len() {
        return if end_of_stream {
            AfterBlanks::Content
        } else {
            AfterBlanks::Undecided
        };
    }
    match src[j] {
        b'\r' | b'\n' => AfterBlanks::LineBreak,
        b'=' => {
            // soft break only when the '=' is followed by a terminator
            if j + 1 == src.len() {
                return if end_of_stream {
                    AfterBlanks::Content
                } else {
                    AfterBlanks::Undecided
                };
            }
            match src[j + 1] {
                b'\n' => AfterBlanks::LineBreak,
                b'\r' => {
                    if j + 2 == src.len() {
                        if end_of_stream {
                            AfterBlanks::LineBreak
                        } else {
                            AfterBlanks::Undecided
                        }
                    } else if src[j + 2] == b'\n' {
                        AfterBlanks::LineBreak
                    } else {
                        AfterBlanks::Content
                    }
                }
                _ => AfterBlanks::Content,
            }
        }
        _ => AfterBlanks::Content,
    }
}

/// Encode to RFC 2045 quoted-printable. Every byte outside the printable
/// ASCII range, `=` itself, CR, LF, and any blank are escaped, so decoding
/// reproduces the input byte for byte; lines are soft-wrapped at 76 columns.
pub fn encode(src: &[u8]) -> String {
    let mut out = String::with_capacity(src.len() * 3 / 2 + 8);
    let mut line = 0;
    for &b in src {
        let literal = (33..=126).contains(&b) && b != b'=';
        let width = if literal { 1 } else { 3 };
        if line + width > LINE_LEN - 1 {
            out.push_str("=\r\n");
            line = 0;
        }
        if literal {
            out.push(b as char);
        } else {
            out.push('=');
            out.push(HEX_ENCODE[(b >> 4) as usize] as char);
            out.push(HEX_ENCODE[(b & 15) as usize] as char);
        }
        line += width;
    }
    out
}

/// Decode a complete in-memory buffer (convenience over the incremental form).
pub fn decode_all(src: &[u8], monitor: &DecodeMonitor) -> Result<Vec<u8>, MimeError> {
    let mut dst = vec![0u8; src.len().max(1)];
    let max = dst.len();
    let mut src_pos = 0;
    let mut dst_pos = 0;
    decode(src, &mut src_pos, &mut dst, &mut dst_pos, max, true, monitor)?;
    dst.truncate(dst_pos);
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lenient(src: &[u8]) -> Vec<u8> {
        decode_all(src, &DecodeMonitor::Silent).unwrap()
    }

    #[test]
    fn decode_escapes() {
        assert_eq!(lenient(b"a=3Db"), b"a=b");
        assert_eq!(lenient(b"caf=C3=A9"), "café".as_bytes());
    }

    #[test]
    fn soft_break_collapses() {
        assert_eq!(lenient(b"foo=\r\nbar"), b"foobar");
        assert_eq!(lenient(b"foo=\nbar"), b"foobar");
    }

    #[test]
    fn hard_break_passes_through() {
        assert_eq!(lenient(b"foo\r\nbar"), b"foo\r\nbar");
    }

    #[test]
    fn trailing_blanks_before_break_fold_away() {
        assert_eq!(lenient(b"foo  \r\nbar"), b"foo\r\nbar");
        assert_eq!(lenient(b"foo \t =\r\nbar"), b"foobar");
        assert_eq!(lenient(b"foo  bar"), b"foo  bar");
    }

    #[test]
    fn malformed_escape_lenient_verbatim() {
        assert_eq!(lenient(b"a=xyb"), b"a=xyb");
        assert_eq!(lenient(b"100%=dress"), b"100%=dress");
    }

    #[test]
    fn malformed_escape_strict_fails() {
        let err = decode_all(b"a=xy", &DecodeMonitor::Strict);
        assert!(matches!(err, Err(MimeError::Decode { .. })));
    }

    #[test]
    fn incomplete_escape_held_back() {
        let mut dst = [0u8; 16];
        let mut src_pos = 0;
        let mut dst_pos = 0;
        decode(b"ab=4", &mut src_pos, &mut dst, &mut dst_pos, 16, false, &DecodeMonitor::Silent)
            .unwrap();
        assert_eq!(src_pos, 2);
        assert_eq!(&dst[..dst_pos], b"ab");
        let mut src_pos2 = 0;
        decode(b"=41", &mut src_pos2, &mut dst, &mut dst_pos, 16, true, &DecodeMonitor::Silent)
            .unwrap();
        assert_eq!(&dst[..dst_pos], b"abA");
    }

    #[test]
    fn round_trip_all_byte_values() {
        let data: Vec<u8> = (0..=255u8).collect();
        assert_eq!(lenient(encode(&data).as_bytes()), data);
    }

    #[test]
    fn round_trip_long_identical_buffer() {
        // straddles the 76-column soft-wrap limit many times over
        let data = vec![b'x'; 500];
        let encoded = encode(&data);
        assert!(encoded.lines().all(|l| l.len() <= LINE_LEN));
        assert_eq!(lenient(encoded.as_bytes()), data);
    }
}
