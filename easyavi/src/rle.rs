//! Run-length coding of 24-bit BGR scanlines
//!
//! The scheme follows Microsoft RLE8 with every value widened to a BGR triple:
//!
//! | bytes                          | meaning                             |
//! |--------------------------------|-------------------------------------|
//! | `n` (1..=255), `b g r`         | `n` copies of one pixel             |
//! | `0`, `0`                       | end of line                         |
//! | `0`, `1`                       | end of bitmap                       |
//! | `0`, `2`, `dx`, `dy`           | move the cursor (decode only)       |
//! | `0`, `n` (3..=255), pixels     | `n` literal pixels, padded to even  |
//!
//! Rows are stored bottom-up like any DIB. The last row ends with the
//! end-of-bitmap marker instead of end-of-line.

use crate::error::{AviError, Result};

/// Escape byte introducing a control code
pub const ESCAPE: u8 = 0;
/// Control code: end of line
pub const END_OF_LINE: u8 = 0;
/// Control code: end of bitmap
pub const END_OF_BITMAP: u8 = 1;
/// Control code: cursor delta
pub const DELTA: u8 = 2;

/// Longest run or literal a single command can carry
pub const MAX_RUN: usize = 255;

/// Shortest literal that can use an absolute run
const MIN_ABSOLUTE: usize = 3;

const BPP: usize = 3;

#[inline]
fn pixel(row: &[u8], i: usize) -> &[u8] {
    &row[i * BPP..i * BPP + BPP]
}

/// Encode packed bottom-up BGR rows (no row padding).
pub fn encode(bgr: &[u8], width: usize, height: usize) -> Vec<u8> {
    let row_len = width * BPP;
    let mut out = Vec::with_capacity(bgr.len() / 2 + height * 2);

    for (y, row) in bgr.chunks_exact(row_len).take(height).enumerate() {
        encode_row(row, &mut out);
        out.push(ESCAPE);
        out.push(if y + 1 == height {
            END_OF_BITMAP
        } else {
            END_OF_LINE
        });
    }

    out
}

fn encode_row(row: &[u8], out: &mut Vec<u8>) {
    let n = row.len() / BPP;
    let mut i = 0;

    while i < n {
        let run = run_length(row, i, n);
        if run >= 2 {
            out.push(run as u8);
            out.extend_from_slice(pixel(row, i));
            i += run;
            continue;
        }

        // Literal: stop where the next repeat begins
        let start = i;
        let mut end = i + 1;
        while end < n && end - start < MAX_RUN {
            if end + 1 < n && pixel(row, end) == pixel(row, end + 1) {
                break;
            }
            end += 1;
        }
        emit_literal(&row[start * BPP..end * BPP], out);
        i = end;
    }
}

/// Length of the run of identical pixels starting at `start`, capped at MAX_RUN
fn run_length(row: &[u8], start: usize, n: usize) -> usize {
    let first = pixel(row, start);
    let mut len = 1;
    while start + len < n && len < MAX_RUN && pixel(row, start + len) == first {
        len += 1;
    }
    len
}

fn emit_literal(pixels: &[u8], out: &mut Vec<u8>) {
    let count = pixels.len() / BPP;
    if count < MIN_ABSOLUTE {
        // Counts 1 and 2 collide with control codes
        for px in pixels.chunks_exact(BPP) {
            out.push(1);
            out.extend_from_slice(px);
        }
        return;
    }

    out.push(ESCAPE);
    out.push(count as u8);
    out.extend_from_slice(pixels);
    if count % 2 == 1 {
        out.push(0);
    }
}

/// Decode into packed bottom-up BGR rows.
///
/// Pixels skipped by a delta or never written stay black.
pub fn decode(data: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    let row_len = width * BPP;
    let mut out = vec![0u8; row_len * height];
    let (mut x, mut y) = (0usize, 0usize);
    let mut pos = 0;

    let err = |offset: usize, message: &str| AviError::InvalidRle {
        offset,
        message: message.to_string(),
    };

    loop {
        if pos + 2 > data.len() {
            return Err(err(pos, "missing end-of-bitmap marker"));
        }

        let count = data[pos] as usize;
        if count > 0 {
            if pos + 1 + BPP > data.len() {
                return Err(err(pos, "truncated run"));
            }
            if y >= height || x + count > width {
                return Err(err(pos, "run exceeds frame bounds"));
            }
            let value = &data[pos + 1..pos + 1 + BPP];
            let start = y * row_len + x * BPP;
            for px in out[start..start + count * BPP].chunks_exact_mut(BPP) {
                px.copy_from_slice(value);
            }
            x += count;
            pos += 1 + BPP;
            continue;
        }

        let code = data[pos + 1];
        pos += 2;
        match code {
            END_OF_LINE => {
                x = 0;
                y += 1;
            }
            END_OF_BITMAP => return Ok(out),
            DELTA => {
                if pos + 2 > data.len() {
                    return Err(err(pos, "truncated delta"));
                }
                x += data[pos] as usize;
                y += data[pos + 1] as usize;
                pos += 2;
            }
            literal => {
                let literal = literal as usize;
                let len = literal * BPP;
                if pos + len > data.len() {
                    return Err(err(pos, "truncated literal"));
                }
                if y >= height || x + literal > width {
                    return Err(err(pos, "literal exceeds frame bounds"));
                }
                let start = y * row_len + x * BPP;
                out[start..start + len].copy_from_slice(&data[pos..pos + len]);
                x += literal;
                pos += len + literal % 2;
            }
        }
    }
}
