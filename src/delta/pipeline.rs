// Command coalescing between the matcher and the delta writer.
//
// The matcher produces one decision per window position. This stage turns
// that stream into compact commands before they hit the wire:
//   - adjacent literal bytes become one literal (split at LITERAL_LIMIT)
//   - a copy that continues the previous copy in the basis extends it
// Counts for DeltaStats are taken here, after coalescing.

use std::io::{self, Write};

use super::stats::DeltaStats;
use crate::format::delta::DeltaWriter;

/// Largest literal command emitted; longer runs are split.
pub const LITERAL_LIMIT: usize = 64 * 1024;

/// Buffers at most one literal run and one copy ahead of the writer.
pub struct CommandCoalescer<W: Write> {
    out: DeltaWriter<W>,
    literal: Vec<u8>,
    copy: Option<(u64, u64)>,
    stats: DeltaStats,
}

impl<W: Write> CommandCoalescer<W> {
    pub fn new(out: DeltaWriter<W>) -> Self {
        Self {
            out,
            literal: Vec::new(),
            copy: None,
            stats: DeltaStats::default(),
        }
    }

    /// Append literal bytes.
    pub fn push_literal(&mut self, mut data: &[u8]) -> io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.flush_copy()?;
        while !data.is_empty() {
            let take = (LITERAL_LIMIT - self.literal.len()).min(data.len());
            self.literal.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.literal.len() == LITERAL_LIMIT {
                self.flush_literal()?;
            }
        }
        Ok(())
    }

    /// Append one literal byte.
    #[inline]
    pub fn push_literal_byte(&mut self, byte: u8) -> io::Result<()> {
        self.push_literal(&[byte])
    }

    /// Append a copy of `len` basis bytes at `offset`.
    pub fn push_copy(&mut self, offset: u64, len: u64) -> io::Result<()> {
        if len == 0 {
            return Ok(());
        }
        self.flush_literal()?;
        if let Some((prev_offset, prev_len)) = self.copy.as_mut()
            && prev_offset.checked_add(*prev_len) == Some(offset)
        {
            *prev_len += len;
            return Ok(());
        }
        self.flush_copy()?;
        self.copy = Some((offset, len));
        Ok(())
    }

    fn flush_literal(&mut self) -> io::Result<()> {
        if self.literal.is_empty() {
            return Ok(());
        }
        self.out.write_literal(&self.literal)?;
        self.stats.literal_cmds += 1;
        self.stats.literal_bytes += self.literal.len() as u64;
        self.literal.clear();
        Ok(())
    }

    fn flush_copy(&mut self) -> io::Result<()> {
        if let Some((offset, len)) = self.copy.take() {
            self.out.write_copy(offset, len)?;
            self.stats.copy_cmds += 1;
            self.stats.copy_bytes += len;
        }
        Ok(())
    }

    /// Flush pending commands, write END and return the sink.
    ///
    /// `in_bytes` and `false_matches` are left for the caller to fill.
    pub fn finish(mut self) -> io::Result<(W, DeltaStats)> {
        self.flush_literal()?;
        self.flush_copy()?;
        let (inner, out_bytes) = self.out.finish()?;
        self.stats.out_bytes = out_bytes;
        Ok((inner, self.stats))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::command::Command;
    use crate::format::delta::DeltaReader;

    fn commands(delta: &[u8]) -> Vec<Command> {
        DeltaReader::new(delta)
            .unwrap()
            .collect::<crate::error::Result<Vec<_>>>()
            .unwrap()
    }

    fn coalescer() -> CommandCoalescer<Vec<u8>> {
        CommandCoalescer::new(DeltaWriter::new(Vec::new()).unwrap())
    }

    #[test]
    fn adjacent_literals_merge() {
        let mut c = coalescer();
        for b in b"hello" {
            c.push_literal_byte(*b).unwrap();
        }
        c.push_literal(b" world").unwrap();
        let (delta, stats) = c.finish().unwrap();
        assert_eq!(commands(&delta), vec![Command::Literal { len: 11 }]);
        assert_eq!(stats.literal_cmds, 1);
        assert_eq!(stats.literal_bytes, 11);
        assert_eq!(stats.out_bytes, delta.len() as u64);
    }

    #[test]
    fn contiguous_copies_merge() {
        let mut c = coalescer();
        c.push_copy(0, 4).unwrap();
        c.push_copy(4, 4).unwrap();
        c.push_copy(8, 2).unwrap();
        c.push_copy(0, 4).unwrap();
        let (delta, stats) = c.finish().unwrap();
        assert_eq!(
            commands(&delta),
            vec![
                Command::Copy { offset: 0, len: 10 },
                Command::Copy { offset: 0, len: 4 },
            ]
        );
        assert_eq!(stats.copy_cmds, 2);
        assert_eq!(stats.copy_bytes, 14);
    }

    #[test]
    fn literal_breaks_copy_run() {
        let mut c = coalescer();
        c.push_copy(0, 4).unwrap();
        c.push_literal(b"x").unwrap();
        c.push_copy(4, 4).unwrap();
        let (delta, _) = c.finish().unwrap();
        assert_eq!(
            commands(&delta),
            vec![
                Command::Copy { offset: 0, len: 4 },
                Command::Literal { len: 1 },
                Command::Copy { offset: 4, len: 4 },
            ]
        );
    }

    #[test]
    fn long_literal_is_split() {
        let mut c = coalescer();
        c.push_literal(&vec![7u8; LITERAL_LIMIT * 2 + 5]).unwrap();
        let (delta, stats) = c.finish().unwrap();
        let lens: Vec<u64> = commands(&delta)
            .into_iter()
            .map(|cmd| match cmd {
                Command::Literal { len } => len,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(lens, vec![LITERAL_LIMIT as u64, LITERAL_LIMIT as u64, 5]);
        assert_eq!(stats.literal_cmds, 3);
    }

    #[test]
    fn nothing_pushed_is_magic_and_end() {
        let (delta, stats) = coalescer().finish().unwrap();
        assert_eq!(delta, [0x72, 0x73, 0x02, 0x36, 0x00]);
        assert_eq!(stats, DeltaStats { out_bytes: 5, ..Default::default() });
    }
}
