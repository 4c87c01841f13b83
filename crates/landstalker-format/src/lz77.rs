//! LZ77 codec used by tileset, tilemap and blockset payloads
//!
//! Control-byte scheme, LSB first: a set flag means one literal byte, a
//! clear flag means a two-byte back-reference of
//! `(distance << 4) | (length - MIN_MATCH)` with a 12-bit distance and
//! a 4-bit length field. A reference with distance 0 terminates the
//! stream, which is why `decompress` can report how many source bytes it
//! consumed. Distance 1 with a long length degenerates to run-length
//! encoding, which is what the tilemap data mostly compresses to.

use crate::error::{CodecError, CodecResult};

const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = MIN_MATCH + 0x0F;
const MAX_DISTANCE: usize = 0x0FFF;

/// Compress `src`, always emitting the end-of-stream reference.
pub fn compress(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() / 2 + 16);
    let mut flags_pos = out.len();
    out.push(0);
    let mut flag_bit = 0u8;
    let mut pos = 0;

    let mut put_flag = |out: &mut Vec<u8>, set: bool, flags_pos: &mut usize, flag_bit: &mut u8| {
        if *flag_bit == 8 {
            *flags_pos = out.len();
            out.push(0);
            *flag_bit = 0;
        }
        if set {
            out[*flags_pos] |= 1 << *flag_bit;
        }
        *flag_bit += 1;
    };

    while pos < src.len() {
        let (distance, length) = longest_match(src, pos);
        if length >= MIN_MATCH {
            put_flag(&mut out, false, &mut flags_pos, &mut flag_bit);
            let token = ((distance as u16) << 4) | (length - MIN_MATCH) as u16;
            out.extend_from_slice(&token.to_be_bytes());
            pos += length;
        } else {
            put_flag(&mut out, true, &mut flags_pos, &mut flag_bit);
            out.push(src[pos]);
            pos += 1;
        }
    }

    // Terminator: a reference with distance 0
    put_flag(&mut out, false, &mut flags_pos, &mut flag_bit);
    out.extend_from_slice(&[0, 0]);
    out
}

fn longest_match(src: &[u8], pos: usize) -> (usize, usize) {
    let mut best = (0usize, 0usize);
    let window_start = pos.saturating_sub(MAX_DISTANCE);
    let max_len = MAX_MATCH.min(src.len() - pos);
    if max_len < MIN_MATCH {
        return best;
    }
    for start in window_start..pos {
        let mut len = 0;
        // Matches may run into the lookahead (distance < length), which
        // the decoder copies byte-at-a-time, so this is legal.
        while len < max_len && src[start + len % (pos - start)] == src[pos + len] {
            len += 1;
        }
        if len > best.1 {
            best = (pos - start, len);
            if len == max_len {
                break;
            }
        }
    }
    best
}

/// Decompress, returning the output and the count of source bytes
/// consumed (the stream is self-terminating, so callers slicing a larger
/// region learn where the next datum begins).
pub fn decompress(src: &[u8]) -> CodecResult<(Vec<u8>, usize)> {
    let mut out = Vec::new();
    let mut pos = 0;
    let mut flags = 0u8;
    let mut flag_bit = 8u8;

    loop {
        if flag_bit == 8 {
            flags = *src
                .get(pos)
                .ok_or_else(|| CodecError::compression("unterminated stream (flags)"))?;
            pos += 1;
            flag_bit = 0;
        }
        let literal = flags & (1 << flag_bit) != 0;
        flag_bit += 1;

        if literal {
            let byte = *src
                .get(pos)
                .ok_or_else(|| CodecError::compression("unterminated stream (literal)"))?;
            pos += 1;
            out.push(byte);
        } else {
            if pos + 2 > src.len() {
                return Err(CodecError::compression("unterminated stream (reference)"));
            }
            let token = u16::from_be_bytes([src[pos], src[pos + 1]]);
            pos += 2;
            let distance = (token >> 4) as usize;
            if distance == 0 {
                return Ok((out, pos));
            }
            let length = (token & 0x0F) as usize + MIN_MATCH;
            if distance > out.len() {
                return Err(CodecError::compression(format!(
                    "reference distance {distance} exceeds output length {}",
                    out.len()
                )));
            }
            for _ in 0..length {
                let byte = out[out.len() - distance];
                out.push(byte);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn round_trip(data: &[u8]) {
        let packed = compress(data);
        let (unpacked, consumed) = decompress(&packed).unwrap();
        assert_eq!(unpacked, data);
        assert_eq!(consumed, packed.len());
    }

    #[test]
    fn test_round_trip_empty() {
        round_trip(&[]);
    }

    #[test]
    fn test_round_trip_literals() {
        round_trip(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_round_trip_runs() {
        let mut data = vec![0u8; 256];
        data.extend_from_slice(&[7; 300]);
        round_trip(&data);
    }

    #[test]
    fn test_round_trip_repeats() {
        let pattern: Vec<u8> = (0u8..32).cycle().take(1000).collect();
        round_trip(&pattern);
    }

    #[test]
    fn test_rle_compresses() {
        let data = vec![0xAA; 4096];
        let packed = compress(&data);
        assert!(packed.len() < data.len() / 4);
    }

    #[test]
    fn test_consumed_stops_at_terminator() {
        let mut packed = compress(&[1, 2, 3]);
        let len = packed.len();
        packed.extend_from_slice(&[0xDE, 0xAD]); // following, unrelated data
        let (unpacked, consumed) = decompress(&packed).unwrap();
        assert_eq!(unpacked, vec![1, 2, 3]);
        assert_eq!(consumed, len);
    }

    #[test]
    fn test_truncated_stream_is_error() {
        let packed = compress(&[1, 2, 3, 4]);
        let err = decompress(&packed[..packed.len() - 1]).unwrap_err();
        assert!(matches!(err, CodecError::Compression { .. }));
    }
}
