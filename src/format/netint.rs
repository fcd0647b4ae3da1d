// Fixed-width big-endian ("network order") integers.
//
// Signature fields are always 4 bytes. Delta command parameters use the
// narrowest of 1, 2, 4 or 8 bytes that holds the value; the width is
// recorded in the command byte, not in the parameter itself.

use std::io::{self, ErrorKind, Read, Write};

use crate::error::{FormatError, Result};

/// Parameter widths in order of their 2-bit index.
pub const WIDTHS: [usize; 4] = [1, 2, 4, 8];

/// Narrowest width (1, 2, 4 or 8) that holds `v`.
#[inline]
pub fn width_for(v: u64) -> usize {
    if v <= 0xFF {
        1
    } else if v <= 0xFFFF {
        2
    } else if v <= 0xFFFF_FFFF {
        4
    } else {
        8
    }
}

/// Index of `width` in [`WIDTHS`].
#[inline]
pub fn width_index(width: usize) -> u8 {
    match width {
        1 => 0,
        2 => 1,
        4 => 2,
        _ => 3,
    }
}

/// Write `v` as `width` big-endian bytes.
pub fn write_be<W: Write>(w: &mut W, v: u64, width: usize) -> io::Result<()> {
    debug_assert!(WIDTHS.contains(&width));
    debug_assert!(width == 8 || v >> (width * 8) == 0);
    let bytes = v.to_be_bytes();
    w.write_all(&bytes[8 - width..])
}

pub fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_be_bytes())
}

/// Decode a big-endian value from at most 8 bytes.
#[inline]
pub fn decode_be(bytes: &[u8]) -> u64 {
    debug_assert!(bytes.len() <= 8);
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Read until `buf` is full or the source ends; returns the bytes read.
///
/// Unlike `read_exact`, a short read is not an error here, so callers can
/// tell a clean end of stream (0) from a torn record (0 < n < len).
pub fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Fill `buf` exactly; a short source is a truncation of `what`.
pub fn read_exact_or<R: Read>(r: &mut R, buf: &mut [u8], what: &'static str) -> Result<()> {
    if read_full(r, buf)? < buf.len() {
        return Err(FormatError::Truncated(what).into());
    }
    Ok(())
}

/// Read a `width`-byte big-endian parameter.
pub fn read_be<R: Read>(r: &mut R, width: usize, what: &'static str) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_exact_or(r, &mut buf[..width], what)?;
    Ok(decode_be(&buf[..width]))
}

pub fn read_u32<R: Read>(r: &mut R, what: &'static str) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact_or(r, &mut buf, what)?;
    Ok(u32::from_be_bytes(buf))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
