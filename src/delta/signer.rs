// Streaming signature builder.
//
// SignatureBuilder accepts the basis in arbitrary chunks:
//   - bytes are gathered into exactly `block_len`-sized blocks
//   - each full block gets a weak and a (truncated) strong sum
//   - the final short block is summed over its real length in finish()
// Memory use is one block buffer, independent of basis size.

use std::io::{Read, Write};

use log::debug;

use super::stats::SignatureStats;
use crate::cancel::{self, CancelFlag};
use crate::error::Result;
use crate::format::netint;
use crate::format::signature::Signature;
use crate::hash::config::SignatureOptions;
use crate::hash::rolling;
use crate::hash::strong::MAX_STRONG_LEN;

/// Builds a [`Signature`] from a basis stream.
///
/// # Example
/// ```
/// use oxirdiff::delta::SignatureBuilder;
/// use oxirdiff::hash::{ChecksumVariant, SignatureOptions};
///
/// let opts = SignatureOptions::new(4, 0, ChecksumVariant::Blake2);
/// let mut b = SignatureBuilder::new(&opts).unwrap();
/// b.write_basis(b"ABCDEFGH").unwrap();
/// let (sig, stats) = b.finish().unwrap();
/// assert_eq!(sig.len(), 2);
/// assert_eq!(stats.in_bytes, 8);
/// ```
#[derive(Debug)]
pub struct SignatureBuilder {
    sig: Signature,
    block: Vec<u8>,
    block_len: usize,
    in_bytes: u64,
    cancel: Option<CancelFlag>,
}

impl SignatureBuilder {
    /// Fails with a configuration error on invalid options.
    pub fn new(opts: &SignatureOptions) -> Result<Self> {
        let sig = Signature::new(opts)?;
        let block_len = opts.block_len as usize;
        Ok(Self {
            sig,
            block: Vec::with_capacity(block_len.min(1 << 20)),
            block_len,
            in_bytes: 0,
            cancel: None,
        })
    }

    /// Poll `flag` between blocks.
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Feed the next chunk of basis bytes.
    pub fn write_basis(&mut self, mut data: &[u8]) -> Result<()> {
        self.in_bytes += data.len() as u64;
        while !data.is_empty() {
            if self.block.is_empty() && data.len() >= self.block_len {
                // Whole block available in the caller's buffer.
                let (block, rest) = data.split_at(self.block_len);
                self.push(block)?;
                data = rest;
                continue;
            }
            let take = (self.block_len - self.block.len()).min(data.len());
            self.block.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.block.len() == self.block_len {
                let block = std::mem::take(&mut self.block);
                self.push(&block)?;
                self.block = block;
                self.block.clear();
            }
        }
        Ok(())
    }

    fn push(&mut self, block: &[u8]) -> Result<()> {
        cancel::check(self.cancel.as_ref())?;
        let weak = rolling::weak_sum(block);
        let mut strong_buf = [0u8; MAX_STRONG_LEN];
        let strong = &mut strong_buf[..self.sig.strong_len() as usize];
        self.sig.variant().digest_into(block, strong);
        self.sig.push_block(weak, strong)
    }

    /// Sum the trailing partial block and return the signature.
    pub fn finish(mut self) -> Result<(Signature, SignatureStats)> {
        if !self.block.is_empty() {
            let block = std::mem::take(&mut self.block);
            self.push(&block)?;
        }
        let stats = SignatureStats {
            blocks: self.sig.len() as u64,
            in_bytes: self.in_bytes,
            out_bytes: self.sig.encoded_len(),
        };
        debug!("{stats}");
        Ok((self.sig, stats))
    }
}

/// Read `basis` to its end and build its signature.
///
/// All-or-nothing: a read error discards every block summed so far.
pub fn build<R: Read>(
    basis: &mut R,
    opts: &SignatureOptions,
    cancel: Option<CancelFlag>,
) -> Result<(Signature, SignatureStats)> {
    let mut builder = SignatureBuilder::new(opts)?;
    builder.cancel = cancel;
    let mut buf = vec![0u8; (opts.block_len as usize).clamp(4096, 1 << 20)];
    loop {
        let n = netint::read_full(basis, &mut buf)?;
        if n == 0 {
            break;
        }
        builder.write_basis(&buf[..n])?;
    }
    builder.finish()
}

/// Build a signature from `basis` and serialize it to `out`.
///
/// Nothing is written unless the whole basis was read successfully.
pub fn write_signature<R: Read, W: Write>(
    basis: &mut R,
    out: &mut W,
    opts: &SignatureOptions,
    cancel: Option<CancelFlag>,
) -> Result<SignatureStats> {
    let (sig, stats) = build(basis, opts, cancel)?;
    sig.write_to(out)?;
    out.flush()?;
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::hash::strong::ChecksumVariant;
    use std::io;

    fn opts(block_len: u32, strong_len: u32) -> SignatureOptions {
        SignatureOptions::new(block_len, strong_len, ChecksumVariant::Md4)
    }

    #[test]
    fn blocks_cover_basis() {
        let (sig, stats) = build(&mut &b"ABCDEFGHIJ"[..], &opts(4, 0), None).unwrap();
        assert_eq!(sig.len(), 3);
        assert_eq!(stats.blocks, 3);
        assert_eq!(stats.in_bytes, 10);

        let expect: [&[u8]; 3] = [b"ABCD", b"EFGH", b"IJ"];
        for (block, data) in sig.blocks().zip(expect) {
            assert_eq!(block.weak_sum, rolling::weak_sum(data));
            assert_eq!(block.strong_sum, &ChecksumVariant::Md4.digest(data)[..16]);
        }
    }

    #[test]
    fn chunking_does_not_change_result() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
        let (whole, _) = build(&mut &data[..], &opts(64, 8), None).unwrap();

        let mut b = SignatureBuilder::new(&opts(64, 8)).unwrap();
        for chunk in data.chunks(17) {
            b.write_basis(chunk).unwrap();
        }
        let (pieces, _) = b.finish().unwrap();
        assert_eq!(whole, pieces);
    }

    #[test]
    fn empty_basis_has_no_blocks() {
        let (sig, stats) = build(&mut &b""[..], &opts(2048, 0), None).unwrap();
        assert!(sig.is_empty());
        assert_eq!(stats.out_bytes, 12);
    }

    #[test]
    fn strong_len_truncates() {
        let (sig, _) = build(&mut &b"ABCDEFGH"[..], &opts(4, 5), None).unwrap();
        assert_eq!(sig.strong_len(), 5);
        assert_eq!(sig.block(0).unwrap().strong_sum.len(), 5);
    }

    #[test]
    fn invalid_options_rejected() {
        assert!(SignatureBuilder::new(&opts(0, 0)).unwrap_err().is_config());
        assert!(SignatureBuilder::new(&opts(4, 17)).unwrap_err().is_config());
    }

    struct FailingReader(usize);

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0 == 0 {
                return Err(io::Error::other("disk on fire"));
            }
            let n = self.0.min(buf.len());
            buf[..n].fill(b'z');
            self.0 -= n;
            Ok(n)
        }
    }

    #[test]
    fn read_failure_writes_nothing() {
        let mut out = Vec::new();
        let err = write_signature(&mut FailingReader(100), &mut out, &opts(16, 0), None)
            .unwrap_err();
        assert!(err.is_io());
        assert!(out.is_empty());
    }

    #[test]
    fn cancelled_between_blocks() {
        let flag = CancelFlag::new();
        flag.cancel();
        let err = build(&mut &[0u8; 64][..], &opts(16, 0), Some(flag)).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
