// Delta command model and command-byte table (librsync `prototab`).
//
// Every command starts with one tag byte that fixes the command kind and
// the width of each parameter that follows:
//
//   0x00          END
//   0x01..=0x40   LITERAL, length = tag, no parameter
//   0x41..=0x44   LITERAL, one length parameter of 1/2/4/8 bytes
//   0x45..=0x54   COPY, offset then length, each 1/2/4/8 bytes:
//                 tag = 0x45 + 4 * width_index(offset) + width_index(length)
//   0x55..=0xFF   reserved

use super::netint::{self, WIDTHS};

pub const OP_END: u8 = 0x00;
pub const OP_LITERAL_1: u8 = 0x01;
pub const OP_LITERAL_64: u8 = 0x40;
pub const OP_LITERAL_N1: u8 = 0x41;
pub const OP_LITERAL_N8: u8 = 0x44;
pub const OP_COPY_N1_N1: u8 = 0x45;
pub const OP_COPY_N8_N8: u8 = 0x54;

/// Longest literal whose length fits in the tag byte itself.
pub const MAX_IMMEDIATE_LITERAL: u64 = 64;

/// A decoded delta command.
///
/// Literal payload bytes are not part of the command: the reader hands
/// them out separately so a large literal never has to sit in memory whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Reuse `len` bytes of the basis starting at `offset`.
    Copy { offset: u64, len: u64 },
    /// `len` new bytes follow inline.
    Literal { len: u64 },
    /// Terminal marker.
    End,
}

/// Shape of a command as implied by its tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    End,
    /// Literal whose length is the tag value.
    ImmediateLiteral(u64),
    /// Literal with a length parameter of the given width.
    Literal { len_width: usize },
    Copy { offset_width: usize, len_width: usize },
}

/// Decode a tag byte; `None` for reserved values.
pub fn op_kind(tag: u8) -> Option<OpKind> {
    match tag {
        OP_END => Some(OpKind::End),
        OP_LITERAL_1..=OP_LITERAL_64 => Some(OpKind::ImmediateLiteral(u64::from(tag))),
        OP_LITERAL_N1..=OP_LITERAL_N8 => Some(OpKind::Literal {
            len_width: WIDTHS[(tag - OP_LITERAL_N1) as usize],
        }),
        OP_COPY_N1_N1..=OP_COPY_N8_N8 => {
            let i = (tag - OP_COPY_N1_N1) as usize;
            Some(OpKind::Copy {
                offset_width: WIDTHS[i / 4],
                len_width: WIDTHS[i % 4],
            })
        }
        _ => None,
    }
}

/// Tag byte for a literal of `len` bytes and the width of its length
/// parameter (0 when the length is carried by the tag).
pub fn literal_op(len: u64) -> (u8, usize) {
    debug_assert!(len > 0);
    if len <= MAX_IMMEDIATE_LITERAL {
        (len as u8, 0)
    } else {
        let w = netint::width_for(len);
        (OP_LITERAL_N1 + netint::width_index(w), w)
    }
}

/// Tag byte for a copy plus the offset and length parameter widths.
pub fn copy_op(offset: u64, len: u64) -> (u8, usize, usize) {
    let ow = netint::width_for(offset);
    let lw = netint::width_for(len);
    let tag = OP_COPY_N1_N1 + 4 * netint::width_index(ow) + netint::width_index(lw);
    (tag, ow, lw)
}

impl Command {
    /// Encoded size of the command header (tag + parameters), excluding
    /// literal payload.
    pub fn header_len(&self) -> usize {
        match *self {
            Command::End => 1,
            Command::Literal { len } => 1 + literal_op(len).1,
            Command::Copy { offset, len } => {
                let (_, ow, lw) = copy_op(offset, len);
                1 + ow + lw
            }
        }
    }
}
