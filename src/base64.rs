/*
 * base64.rs
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

//! Base64 codec for Content-Transfer-Encoding (RFC 2045), incremental over
//! fixed-size windows.

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Output line length for encoded data (RFC 2045 hard limit is 76).
const LINE_LEN: usize = 76;

const DECODE: [i8; 256] = {
    let mut t = [-1i8; 256];
    let mut i = 0usize;
    while i < 64 {
        t[ALPHABET[i] as usize] = i as i8;
        i += 1;
    }
    t
};

/// Decode base64 from `src` into `dst`. Consumes only bytes whose decoded
/// output fit; the unconsumed remainder (an incomplete quantum, or input that
/// did not fit under `max_decode`) is left for the next call. Whitespace and
/// embedded line breaks are tolerated; other non-alphabet bytes are skipped.
/// With `end_of_stream` the final partial quantum is flushed.
/// Returns the number of bytes consumed from `src`.
pub fn decode(
    src: &[u8],
    src_pos: &mut usize,
    dst: &mut [u8],
    dst_pos: &mut usize,
    max_decode: usize,
    end_of_stream: bool,
) -> usize {
    let start_src = *src_pos;
    let dst_limit = (*dst_pos + max_decode).min(dst.len());
    let mut quantum: u32 = 0;
    let mut bits: u32 = 0;
    // src consumed through the last byte whose output is committed
    let mut committed = *src_pos;

    while *src_pos < src.len() {
        let b = src[*src_pos];
        let v = DECODE[b as usize];
        if v >= 0 {
            quantum = (quantum << 6) | v as u32;
            bits += 6;
            *src_pos += 1;
            if bits == 24 {
                if *dst_pos + 3 > dst_limit {
                    break;
                }
                dst[*dst_pos] = (quantum >> 16) as u8;
                dst[*dst_pos + 1] = (quantum >> 8) as u8;
                dst[*dst_pos + 2] = quantum as u8;
                *dst_pos += 3;
                committed = *src_pos;
                quantum = 0;
                bits = 0;
            }
        } else if b == b'=' {
            // padding terminates the quantum
            if bits >= 8 && *dst_pos >= dst_limit {
                break;
            }
            if bits >= 16 && *dst_pos + 2 > dst_limit {
                break;
            }
            *src_pos += 1;
            if bits >= 8 {
                dst[*dst_pos] = (quantum >> (bits - 8)) as u8;
                *dst_pos += 1;
                if bits >= 16 {
                    dst[*dst_pos] = (quantum >> (bits - 16)) as u8;
                    *dst_pos += 1;
                }
            }
            quantum = 0;
            bits = 0;
            committed = *src_pos;
        } else {
            // whitespace, line breaks, stray bytes
            *src_pos += 1;
            if bits == 0 {
                committed = *src_pos;
            }
        }
    }

    // a full quantum that broke out above for lack of output room is not a
    // partial quantum; it stays unconsumed until there is room for 3 bytes
    if end_of_stream && bits >= 8 && bits < 24 {
        let mut need = 1;
        if bits >= 16 {
            need = 2;
        }
        if *dst_pos + need <= dst_limit {
            dst[*dst_pos] = (quantum >> (bits - 8)) as u8;
            *dst_pos += 1;
            if bits >= 16 {
                dst[*dst_pos] = (quantum >> (bits - 16)) as u8;
                *dst_pos += 1;
            }
            committed = *src_pos;
        }
    }

    *src_pos = committed;
    committed - start_src
}

/// Encode to RFC 2045 base64 with CRLF line wrapping.
pub fn encode(src: &[u8]) -> String {
    let mut out = String::with_capacity(src.len() / 3 * 4 + src.len() / 54 * 2 + 8);
    let mut line = 0;
    let mut push = |out: &mut String, c: u8, line: &mut usize| {
        if *line == LINE_LEN {
            out.push_str("\r\n");
            *line = 0;
        }
        out.push(c as char);
        *line += 1;
    };
    let mut chunks = src.chunks_exact(3);
    for chunk in &mut chunks {
        let q = (chunk[0] as u32) << 16 | (chunk[1] as u32) << 8 | chunk[2] as u32;
        push(&mut out, ALPHABET[(q >> 18) as usize & 63], &mut line);
        push(&mut out, ALPHABET[(q >> 12) as usize & 63], &mut line);
        push(&mut out, ALPHABET[(q >> 6) as usize & 63], &mut line);
        push(&mut out, ALPHABET[q as usize & 63], &mut line);
    }
    let rest = chunks.remainder();
    match rest.len() {
        1 => {
            let q = (rest[0] as u32) << 16;
            push(&mut out, ALPHABET[(q >> 18) as usize & 63], &mut line);
            push(&mut out, ALPHABET[(q >> 12) as usize & 63], &mut line);
            push(&mut out, b'=', &mut line);
            push(&mut out, b'=', &mut line);
        }
        2 => {
            let q = (rest[0] as u32) << 16 | (rest[1] as u32) << 8;
            push(&mut out, ALPHABET[(q >> 18) as usize & 63], &mut line);
            push(&mut out, ALPHABET[(q >> 12) as usize & 63], &mut line);
            push(&mut out, ALPHABET[(q >> 6) as usize & 63], &mut line);
            push(&mut out, b'=', &mut line);
        }
        _ => {}
    }
    out
}

/// Decode a complete in-memory buffer (convenience over the incremental form).
pub fn decode_all(src: &[u8]) -> Vec<u8> {
    let mut dst = vec![0u8; src.len() / 4 * 3 + 3];
    let max = dst.len();
    let mut src_pos = 0;
    let mut dst_pos = 0;
    decode(src, &mut src_pos, &mut dst, &mut dst_pos, max, true);
    dst.truncate(dst_pos);
    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_simple() {
        assert_eq!(decode_all(b"SGVsbG8="), b"Hello");
        assert_eq!(decode_all(b"SGVsbG8sIHdvcmxkLg=="), b"Hello, world.");
    }

    #[test]
    fn decode_tolerates_breaks_and_whitespace() {
        assert_eq!(decode_all(b"SGVs\r\nbG8="), b"Hello");
        assert_eq!(decode_all(b" S G V s b G 8 = "), b"Hello");
    }

    #[test]
    fn decode_incremental_keeps_partial_quantum() {
        let src = b"SGVsbG8=";
        let mut dst = [0u8; 16];
        let mut src_pos = 0;
        let mut dst_pos = 0;
        // feed only 6 chars: one full quantum decodes, two chars held back
        decode(&src[..6], &mut src_pos, &mut dst, &mut dst_pos, 16, false);
        assert_eq!(src_pos, 4);
        assert_eq!(&dst[..dst_pos], b"Hel");
        // feed the rest
        let mut tail = src[src_pos..].to_vec();
        src_pos = 0;
        decode(&tail, &mut src_pos, &mut dst, &mut dst_pos, 16, false);
        assert_eq!(&dst[..dst_pos], b"Hello");
        tail.drain(..src_pos);
        assert!(tail.is_empty());
    }

    #[test]
    fn decode_respects_max_decode() {
        let src = b"SGVsbG8sIHdvcmxkLg==";
        let mut dst = [0u8; 64];
        let mut src_pos = 0;
        let mut dst_pos = 0;
        decode(src, &mut src_pos, &mut dst, &mut dst_pos, 3, true);
        assert_eq!(&dst[..dst_pos], b"Hel");
        decode(src, &mut src_pos, &mut dst, &mut dst_pos, 64, true);
        assert_eq!(&dst[..dst_pos], b"Hello, world.");
    }

    #[test]
    fn full_quantum_held_back_without_output_room() {
        // "AAAA" decodes to three zero bytes; with room for only two, nothing
        // may be consumed or emitted
        let src = b"AAAA";
        let mut dst = [0u8; 8];
        let mut src_pos = 0;
        let mut dst_pos = 0;
        decode(src, &mut src_pos, &mut dst, &mut dst_pos, 2, true);
        assert_eq!(src_pos, 0);
        assert_eq!(dst_pos, 0);
        decode(src, &mut src_pos, &mut dst, &mut dst_pos, 8, true);
        assert_eq!(&dst[..dst_pos], &[0u8, 0, 0]);
    }

    #[test]
    fn round_trip_all_byte_values() {
        let data: Vec<u8> = (0..=255u8).collect();
        assert_eq!(decode_all(encode(&data).as_bytes()), data);
    }

    #[test]
    fn round_trip_long_identical_buffer() {
        let data = vec![0xABu8; 500];
        let encoded = encode(&data);
        assert!(encoded.lines().all(|l| l.len() <= LINE_LEN));
        assert_eq!(decode_all(encoded.as_bytes()), data);
    }

    #[test]
    fn empty_input() {
        assert_eq!(encode(b""), "");
        assert_eq!(decode_all(b""), b"");
    }
}
