// Delta stream codec.
//
// Layout:
//
//   magic  u32 = 0x72730236
//   command*   (see `command` for the tag table)
//   END
//
// The writer always chooses the narrowest parameter widths. The reader
// validates every tag and parameter before any byte reaches the caller.

use std::io::{self, Read, Write};

use super::command::{self, Command, OP_END, OpKind};
use super::netint;
use crate::error::{FormatError, Result};

/// Delta magic (librsync `RS_DELTA_MAGIC`).
pub const DELTA_MAGIC: u32 = 0x7273_0236;

/// Chunk size used when streaming literal payloads.
const LITERAL_CHUNK: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Serializes commands to a delta stream.
pub struct DeltaWriter<W: Write> {
    inner: W,
    bytes_out: u64,
}

impl<W: Write> DeltaWriter<W> {
    /// Start a delta stream, writing the magic immediately.
    pub fn new(mut inner: W) -> io::Result<Self> {
        netint::write_u32(&mut inner, DELTA_MAGIC)?;
        Ok(Self {
            inner,
            bytes_out: 4,
        })
    }

    /// Emit a literal command carrying `data` (must be non-empty).
    pub fn write_literal(&mut self, data: &[u8]) -> io::Result<()> {
        debug_assert!(!data.is_empty());
        let len = data.len() as u64;
        let (tag, width) = command::literal_op(len);
        self.inner.write_all(&[tag])?;
        if width > 0 {
            netint::write_be(&mut self.inner, len, width)?;
        }
        self.inner.write_all(data)?;
        self.bytes_out += 1 + width as u64 + len;
        Ok(())
    }

    /// Emit a copy command.
    pub fn write_copy(&mut self, offset: u64, len: u64) -> io::Result<()> {
        debug_assert!(len > 0);
        let (tag, ow, lw) = command::copy_op(offset, len);
        self.inner.write_all(&[tag])?;
        netint::write_be(&mut self.inner, offset, ow)?;
        netint::write_be(&mut self.inner, len, lw)?;
        self.bytes_out += (1 + ow + lw) as u64;
        Ok(())
    }

    /// Bytes written so far, magic included.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    /// Write the terminal marker and return the sink with the total size.
    pub fn finish(mut self) -> io::Result<(W, u64)> {
        self.inner.write_all(&[OP_END])?;
        self.bytes_out += 1;
        self.inner.flush()?;
        Ok((self.inner, self.bytes_out))
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Parses a delta stream into commands.
///
/// After a [`Command::Literal`] the payload may be pulled with
/// [`copy_literal_to`](Self::copy_literal_to); if the caller asks for the
/// next command instead, the payload is skipped.
///
/// Also usable as an iterator over the commands before END.
pub struct DeltaReader<R: Read> {
    inner: R,
    pending_literal: u64,
    bytes_in: u64,
    done: bool,
}

impl<R: Read> DeltaReader<R> {
    /// Read and check the magic.
    pub fn new(mut inner: R) -> Result<Self> {
        let magic = netint::read_u32(&mut inner, "delta header")?;
        if magic != DELTA_MAGIC {
            return Err(FormatError::BadMagic(magic).into());
        }
        Ok(Self {
            inner,
            pending_literal: 0,
            bytes_in: 4,
            done: false,
        })
    }

    /// Bytes consumed from the delta stream so far.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Whether the terminal marker has been read.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Parse the next command. Returns [`Command::End`] once, and again on
    /// every later call.
    pub fn next_command(&mut self) -> Result<Command> {
        if self.done {
            return Ok(Command::End);
        }
        if self.pending_literal > 0 {
            self.copy_literal_to(&mut io::sink())?;
        }

        let mut tag = [0u8; 1];
        netint::read_exact_or(&mut self.inner, &mut tag, "delta command stream")?;
        self.bytes_in += 1;
        let kind = command::op_kind(tag[0]).ok_or(FormatError::UnknownCommand(tag[0]))?;

        let cmd = match kind {
            OpKind::End => {
                self.done = true;
                Command::End
            }
            OpKind::ImmediateLiteral(len) => Command::Literal { len },
            OpKind::Literal { len_width } => {
                let len = self.param(len_width, "literal length")?;
                if len == 0 {
                    return Err(FormatError::OutOfRange("zero-length literal".into()).into());
                }
                Command::Literal { len }
            }
            OpKind::Copy {
                offset_width,
                len_width,
            } => {
                let offset = self.param(offset_width, "copy offset")?;
                let len = self.param(len_width, "copy length")?;
                if len == 0 {
                    return Err(FormatError::OutOfRange("zero-length copy".into()).into());
                }
                // The basis is addressed with signed 64-bit seeks.
                match offset.checked_add(len) {
                    Some(end) if end <= i64::MAX as u64 => {}
                    _ => {
                        return Err(FormatError::OutOfRange(format!(
                            "copy offset {offset} length {len}"
                        ))
                        .into());
                    }
                }
                Command::Copy { offset, len }
            }
        };

        if let Command::Literal { len } = cmd {
            self.pending_literal = len;
        }
        Ok(cmd)
    }

    fn param(&mut self, width: usize, what: &'static str) -> Result<u64> {
        let v = netint::read_be(&mut self.inner, width, what)?;
        self.bytes_in += width as u64;
        Ok(v)
    }

    /// Stream the payload of the literal just returned into `out`.
    ///
    /// Fails with a truncation error if the delta ends first; bytes already
    /// written to `out` are then part of an invalid result.
    pub fn copy_literal_to<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<u64> {
        let total = self.pending_literal;
        let mut buf = vec![0u8; total.min(LITERAL_CHUNK as u64) as usize];
        while self.pending_literal > 0 {
            let want = self.pending_literal.min(LITERAL_CHUNK as u64) as usize;
            let n = netint::read_full(&mut self.inner, &mut buf[..want])?;
            if n < want {
                self.pending_literal = 0;
                return Err(FormatError::Truncated("literal data").into());
            }
            out.write_all(&buf[..n])?;
            self.pending_literal -= n as u64;
            self.bytes_in += n as u64;
        }
        Ok(total)
    }

    /// Read the payload of the literal just returned into memory.
    pub fn read_literal(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.pending_literal.min(LITERAL_CHUNK as u64) as usize);
        self.copy_literal_to(&mut out)?;
        Ok(out)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Iterator for DeltaReader<R> {
    type Item = Result<Command>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_command() {
            Ok(Command::End) => None,
            Ok(cmd) => Some(Ok(cmd)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
