// Streaming delta encoder.
//
// Slides a `block_len` window over the new stream one byte at a time:
//
//   1. weak sum of the window (rolled, or recomputed after a match)
//   2. weak hit in the BlockIndex? -> strong sum of the window, truncated
//   3. strong match -> COPY of the whole window, jump past it
//      no match     -> first window byte becomes literal, roll by one
//
// The block after the previous match is tried before the index, so runs
// of repeated basis content stay contiguous and coalesce into one COPY.
//
// The new stream is consumed incrementally. At most `block_len` bytes plus
// one caller chunk are buffered; one byte of lookahead past the window is
// kept until finish() so that the window can always roll.

use std::io::{Read, Write};

use log::debug;

use super::pipeline::CommandCoalescer;
use super::stats::DeltaStats;
use crate::cancel::{self, CancelFlag};
use crate::error::Result;
use crate::format::delta::DeltaWriter;
use crate::format::netint;
use crate::format::signature::Signature;
use crate::hash::rolling::Rollsum;
use crate::hash::strong::MAX_STRONG_LEN;
use crate::hash::table::BlockIndex;

const READ_CHUNK: usize = 64 * 1024;

/// Encodes a new stream against an indexed signature.
pub struct DeltaEncoder<'a, W: Write> {
    index: &'a BlockIndex<'a>,
    sig: &'a Signature,
    block_len: usize,
    strong_len: usize,
    /// Unprocessed new bytes; the window starts at `pos`.
    buf: Vec<u8>,
    pos: usize,
    /// Rolling sum over `buf[pos..pos + sum.len()]`, if one is live.
    sum: Option<Rollsum>,
    /// Block expected to follow the last match.
    next_block: Option<u32>,
    out: CommandCoalescer<W>,
    in_bytes: u64,
    false_matches: u64,
    cancel: Option<CancelFlag>,
}

impl<'a, W: Write> DeltaEncoder<'a, W> {
    /// Start a delta stream on `out`. The magic is written immediately.
    pub fn new(index: &'a BlockIndex<'a>, out: W) -> Result<Self> {
        let sig = index.signature();
        let block_len = sig.block_len() as usize;
        Ok(Self {
            index,
            sig,
            block_len,
            strong_len: sig.strong_len() as usize,
            buf: Vec::with_capacity(block_len.saturating_mul(2).min(1 << 21)),
            pos: 0,
            sum: None,
            next_block: None,
            out: CommandCoalescer::new(DeltaWriter::new(out)?),
            in_bytes: 0,
            false_matches: 0,
            cancel: None,
        })
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Feed the next chunk of the new stream.
    pub fn write_new(&mut self, data: &[u8]) -> Result<()> {
        cancel::check(self.cancel.as_ref())?;
        self.in_bytes += data.len() as u64;
        self.buf.extend_from_slice(data);
        self.process(false)?;
        self.buf.drain(..self.pos);
        self.pos = 0;
        Ok(())
    }

    /// Encode what is left, write END and return the sink.
    pub fn finish(mut self) -> Result<(W, DeltaStats)> {
        self.process(true)?;
        let (inner, mut stats) = self.out.finish()?;
        stats.in_bytes = self.in_bytes;
        stats.false_matches = self.false_matches;
        debug!("{stats}");
        Ok((inner, stats))
    }

    fn process(&mut self, eof: bool) -> Result<()> {
        loop {
            let avail = self.buf.len() - self.pos;
            if avail == 0 || (!eof && avail <= self.block_len) {
                return Ok(());
            }

            let mut sum = match self.sum {
                Some(sum) => sum,
                None => {
                    cancel::check(self.cancel.as_ref())?;
                    let wlen = avail.min(self.block_len);
                    Rollsum::from_window(&self.buf[self.pos..self.pos + wlen])
                }
            };
            let wlen = sum.len();
            let window = &self.buf[self.pos..self.pos + wlen];

            let (found, rejected) = self.find_block(sum.digest(), window);
            self.false_matches += rejected;

            if let Some(index) = found {
                self.out
                    .push_copy(self.sig.basis_offset(index), wlen as u64)?;
                self.next_block = index.checked_add(1);
                self.pos += wlen;
                self.sum = None;
                continue;
            }

            let out = self.buf[self.pos];
            self.out.push_literal_byte(out)?;
            if self.pos + wlen < self.buf.len() {
                sum.rotate(out, self.buf[self.pos + wlen]);
                self.sum = Some(sum);
            } else {
                // Window already reaches the end of the stream: shrink it.
                sum.rollout(out);
                self.sum = (!sum.is_empty()).then_some(sum);
            }
            self.pos += 1;
            self.next_block = None;
        }
    }

    /// Basis block matching `window`, plus the number of weak-sum hits
    /// that failed the strong check.
    fn find_block(&self, weak: u32, window: &[u8]) -> (Option<u32>, u64) {
        if !self.index.contains_weak(weak) {
            return (None, 0);
        }
        let mut strong_buf = [0u8; MAX_STRONG_LEN];
        self.sig
            .variant()
            .digest_into(window, &mut strong_buf[..self.strong_len]);
        let strong = &strong_buf[..self.strong_len];

        if let Some(next) = self.next_block.and_then(|i| self.sig.block(i as usize))
            && next.weak_sum == weak
            && next.strong_sum == strong
        {
            return (Some(next.index), 0);
        }
        let (found, rejected) = self.index.find(weak, strong);
        (found.map(|b| b.index), rejected)
    }
}

/// Read `new` to its end and write the delta against `index` to `out`.
pub fn encode<R: Read, W: Write>(
    index: &BlockIndex<'_>,
    new: &mut R,
    out: W,
    cancel: Option<CancelFlag>,
) -> Result<(W, DeltaStats)> {
    let mut encoder = DeltaEncoder::new(index, out)?;
    encoder.cancel = cancel;
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = netint::read_full(new, &mut buf)?;
        if n == 0 {
            break;
        }
        encoder.write_new(&buf[..n])?;
    }
    encoder.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::signer;
    use crate::error::Error;
    use crate::format::command::Command;
    use crate::format::delta::DeltaReader;
    use crate::hash::config::SignatureOptions;
    use crate::hash::strong::ChecksumVariant;

    fn signature(basis: &[u8], block_len: u32) -> Signature {
        let opts = SignatureOptions::new(block_len, 0, ChecksumVariant::Blake2);
        signer::build(&mut &basis[..], &opts, None).unwrap().0
    }

    fn delta(sig: &Signature, new: &[u8]) -> (Vec<u8>, DeltaStats) {
        let index = BlockIndex::new(sig).unwrap();
        encode(&index, &mut &new[..], Vec::new(), None).unwrap()
    }

    fn commands(delta: &[u8]) -> Vec<Command> {
        DeltaReader::new(delta)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn literal_copy_literal() {
        let sig = signature(b"ABCDEFGH", 4);
        let (d, stats) = delta(&sig, b"XXABCDEFGHYY");
        assert_eq!(
            d,
            [
                0x72, 0x73, 0x02, 0x36, 0x02, b'X', b'X', 0x45, 0x00, 0x08, 0x02, b'Y', b'Y',
                0x00
            ]
        );
        assert_eq!(stats.copy_cmds, 1);
        assert_eq!(stats.copy_bytes, 8);
        assert_eq!(stats.literal_cmds, 2);
        assert_eq!(stats.literal_bytes, 4);
        assert_eq!(stats.in_bytes, 12);
        assert_eq!(stats.out_bytes, 14);
    }

    #[test]
    fn identical_input_is_one_copy() {
        let basis: Vec<u8> = (0..10_000u32).map(|i| (i * 31 % 253) as u8).collect();
        let sig = signature(&basis, 256);
        let (d, _) = delta(&sig, &basis);
        assert_eq!(
            commands(&d),
            vec![Command::Copy {
                offset: 0,
                len: 10_000
            }]
        );
    }

    #[test]
    fn short_tail_block_matches() {
        let sig = signature(b"ABCDEFGHIJ", 4);
        let (d, _) = delta(&sig, b"IJ");
        assert_eq!(commands(&d), vec![Command::Copy { offset: 8, len: 2 }]);
    }

    #[test]
    fn weak_collision_without_strong_match_is_literal() {
        let basis = b"\x01\x00\x02";
        let new = b"\x00\x02\x01";
        assert_eq!(
            Rollsum::from_window(basis).digest(),
            Rollsum::from_window(new).digest()
        );

        for strong_len in [1, 0] {
            let opts = SignatureOptions::new(3, strong_len, ChecksumVariant::Blake2);
            let sig = signer::build(&mut &basis[..], &opts, None).unwrap().0;
            let (d, stats) = delta(&sig, new);
            assert_eq!(commands(&d), vec![Command::Literal { len: 3 }]);
            assert_eq!(stats.false_matches, 1, "strong_len {strong_len}");
            assert_eq!(stats.copy_cmds, 0);

            let mut out = Vec::new();
            crate::delta::patcher::apply(std::io::Cursor::new(basis), &d[..], &mut out, None)
                .unwrap();
            assert_eq!(out, new);
        }
    }

    #[test]
    fn empty_signature_is_all_literal() {
        let sig = signature(b"", 4);
        let (d, stats) = delta(&sig, b"hello");
        assert_eq!(commands(&d), vec![Command::Literal { len: 5 }]);
        assert_eq!(stats.copy_cmds, 0);
    }

    #[test]
    fn empty_new_is_magic_and_end() {
        let sig = signature(b"ABCDEFGH", 4);
        let (d, _) = delta(&sig, b"");
        assert_eq!(d, [0x72, 0x73, 0x02, 0x36, 0x00]);
    }

    #[test]
    fn repeated_blocks_prefer_contiguous() {
        // Blocks 0 and 2 are identical; after matching block 1 the encoder
        // should continue with block 2 rather than jump back to block 0.
        let sig = signature(b"AAAABBBBAAAA", 4);
        let (d, _) = delta(&sig, b"BBBBAAAA");
        assert_eq!(commands(&d), vec![Command::Copy { offset: 4, len: 8 }]);
    }

    #[test]
    fn chunked_feed_matches_whole_feed() {
        let basis: Vec<u8> = (0..5000u32).map(|i| (i * 17 % 241) as u8).collect();
        let mut new = basis.clone();
        new.splice(1000..1010, b"inserted!".iter().copied());
        new.extend_from_slice(b"tail");
        let sig = signature(&basis, 64);
        let index = BlockIndex::new(&sig).unwrap();

        let (whole, _) = encode(&index, &mut &new[..], Vec::new(), None).unwrap();

        let mut enc = DeltaEncoder::new(&index, Vec::new()).unwrap();
        for chunk in new.chunks(7) {
            enc.write_new(chunk).unwrap();
        }
        let (pieces, _) = enc.finish().unwrap();
        assert_eq!(whole, pieces);
    }

    #[test]
    fn deterministic_output() {
        let basis = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let new = b"the quick brown cat jumps over the lazy dog".repeat(20);
        let sig = signature(&basis, 16);
        assert_eq!(delta(&sig, &new).0, delta(&sig, &new).0);
    }

    #[test]
    fn cancelled_encoder_fails() {
        let sig = signature(b"ABCDEFGH", 4);
        let index = BlockIndex::new(&sig).unwrap();
        let flag = CancelFlag::new();
        flag.cancel();
        let err = encode(&index, &mut &b"ABCDEFGH"[..], Vec::new(), Some(flag)).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
