// Patch application: basis + delta -> new.
//
// Commands are executed strictly in stream order. COPY seeks the basis
// and streams exactly `len` bytes; LITERAL streams its payload straight
// from the delta. Nothing is buffered beyond one I/O chunk, so the output
// may already hold a prefix when an error is returned.

use std::io::{self, Read, Seek, SeekFrom, Write};

use log::{debug, trace};

use super::stats::PatchStats;
use crate::cancel::{self, CancelFlag};
use crate::error::Result;
use crate::format::command::Command;
use crate::format::delta::DeltaReader;

/// Applies deltas against a seekable basis.
///
/// # Example
/// ```
/// use std::io::Cursor;
/// use oxirdiff::delta::Patcher;
///
/// // magic, COPY(offset 2, len 3), END
/// let delta: [u8; 8] = [0x72, 0x73, 0x02, 0x36, 0x45, 0x02, 0x03, 0x00];
/// let mut out = Vec::new();
/// Patcher::new(Cursor::new(b"xxabcxx")).apply(&delta[..], &mut out).unwrap();
/// assert_eq!(out, b"abc");
/// ```
pub struct Patcher<B> {
    basis: B,
    cancel: Option<CancelFlag>,
}

impl<B: Read + Seek> Patcher<B> {
    pub fn new(basis: B) -> Self {
        Self {
            basis,
            cancel: None,
        }
    }

    /// Poll `flag` between commands.
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Read `delta` to its END command, writing the reconstruction to `out`.
    ///
    /// Bytes after END are not read.
    pub fn apply<R: Read, W: Write + ?Sized>(
        &mut self,
        delta: R,
        out: &mut W,
    ) -> Result<PatchStats> {
        let mut reader = DeltaReader::new(delta)?;
        let mut stats = PatchStats::default();

        loop {
            cancel::check(self.cancel.as_ref())?;
            match reader.next_command()? {
                Command::End => break,
                Command::Literal { len } => {
                    trace!("literal {len}");
                    reader.copy_literal_to(out)?;
                    stats.literal_cmds += 1;
                    stats.literal_bytes += len;
                }
                Command::Copy { offset, len } => {
                    trace!("copy {offset}+{len}");
                    self.copy_from_basis(offset, len, out)?;
                    stats.copy_cmds += 1;
                    stats.copy_bytes += len;
                }
            }
        }
        out.flush()?;

        stats.in_bytes = reader.bytes_in();
        stats.out_bytes = stats.literal_bytes + stats.copy_bytes;
        debug!("{stats}");
        Ok(stats)
    }

    fn copy_from_basis<W: Write + ?Sized>(
        &mut self,
        offset: u64,
        len: u64,
        out: &mut W,
    ) -> Result<()> {
        self.basis.seek(SeekFrom::Start(offset))?;
        let copied = io::copy(&mut (&mut self.basis).take(len), out)?;
        if copied < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("basis ended at {} inside copy {offset}+{len}", offset + copied),
            )
            .into());
        }
        Ok(())
    }

    pub fn into_inner(self) -> B {
        self.basis
    }
}

/// Apply `delta` to `basis`, writing the result to `out`.
pub fn apply<B: Read + Seek, R: Read, W: Write + ?Sized>(
    basis: B,
    delta: R,
    out: &mut W,
    cancel: Option<CancelFlag>,
) -> Result<PatchStats> {
    let mut patcher = Patcher::new(basis);
    patcher.cancel = cancel;
    patcher.apply(delta, out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
