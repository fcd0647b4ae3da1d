// Signature model and its binary codec.
//
// Layout (all integers big-endian):
//
//   magic       u32   identifies the strong checksum family
//   block_len   u32
//   strong_len  u32
//   { weak_sum u32, strong_sum [strong_len] } * block count
//
// There is no block count field; it follows from the stream length. The
// final record may describe a basis block shorter than `block_len`, but
// the record itself is always full size.

use std::fmt;
use std::io::{self, Read, Write};

use log::debug;

use super::netint;
use crate::error::{Error, FormatError, Result};
use crate::hash::config::SignatureOptions;
use crate::hash::strong::{ChecksumVariant, MAX_STRONG_LEN};

/// Signature magic for MD4 strong sums (librsync `RS_MD4_SIG_MAGIC`).
pub const SIG_MAGIC_MD4: u32 = 0x7273_0136;

/// Signature magic for BLAKE2 strong sums (librsync `RS_BLAKE2_SIG_MAGIC`).
pub const SIG_MAGIC_BLAKE2: u32 = 0x7273_0137;

/// Encoded header size.
pub const SIG_HEADER_LEN: usize = 12;

pub fn magic_for(variant: ChecksumVariant) -> u32 {
    match variant {
        ChecksumVariant::Md4 => SIG_MAGIC_MD4,
        ChecksumVariant::Blake2 => SIG_MAGIC_BLAKE2,
    }
}

pub fn variant_for(magic: u32) -> Option<ChecksumVariant> {
    match magic {
        SIG_MAGIC_MD4 => Some(ChecksumVariant::Md4),
        SIG_MAGIC_BLAKE2 => Some(ChecksumVariant::Blake2),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Checksums of one basis block, borrowed from its [`Signature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    /// Ordinal position in the basis.
    pub index: u32,
    pub weak_sum: u32,
    /// Strong sum, already truncated to the signature's `strong_len`.
    pub strong_sum: &'a [u8],
}

/// Ordered per-block checksums of one basis version.
///
/// Weak and strong sums live in two flat arrays so a signature of N blocks
/// costs two allocations rather than N.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    variant: ChecksumVariant,
    block_len: u32,
    strong_len: u32,
    weak_sums: Vec<u32>,
    strong_sums: Vec<u8>,
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("variant", &self.variant)
            .field("block_len", &self.block_len)
            .field("strong_len", &self.strong_len)
            .field("blocks", &self.weak_sums.len())
            .finish()
    }
}

impl Signature {
    /// Empty signature for the given options.
    ///
    /// `strong_len == 0` in `opts` resolves to the variant's full digest.
    pub fn new(opts: &SignatureOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self {
            variant: opts.variant,
            block_len: opts.block_len,
            strong_len: opts.effective_strong_len() as u32,
            weak_sums: Vec::new(),
            strong_sums: Vec::new(),
        })
    }

    /// Append the next block's checksums.
    ///
    /// The strong sum must be exactly `strong_len` bytes.
    pub fn push_block(&mut self, weak_sum: u32, strong_sum: &[u8]) -> Result<()> {
        if strong_sum.len() != self.strong_len as usize {
            return Err(Error::config(format!(
                "strong sum of {} bytes does not match signature strong length {}",
                strong_sum.len(),
                self.strong_len
            )));
        }
        if self.weak_sums.len() >= u32::MAX as usize {
            return Err(Error::config("too many blocks for one signature"));
        }
        self.weak_sums.push(weak_sum);
        self.strong_sums.extend_from_slice(strong_sum);
        Ok(())
    }

    pub fn variant(&self) -> ChecksumVariant {
        self.variant
    }

    pub fn magic(&self) -> u32 {
        magic_for(self.variant)
    }

    pub fn block_len(&self) -> u32 {
        self.block_len
    }

    pub fn strong_len(&self) -> u32 {
        self.strong_len
    }

    /// The options this signature was generated with.
    pub fn options(&self) -> SignatureOptions {
        SignatureOptions::new(self.block_len, self.strong_len, self.variant)
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.weak_sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weak_sums.is_empty()
    }

    /// Block `index`, or `None` past the end.
    pub fn block(&self, index: usize) -> Option<Block<'_>> {
        let weak_sum = *self.weak_sums.get(index)?;
        let sl = self.strong_len as usize;
        Some(Block {
            index: index as u32,
            weak_sum,
            strong_sum: &self.strong_sums[index * sl..(index + 1) * sl],
        })
    }

    /// Blocks in basis order.
    pub fn blocks(&self) -> impl ExactSizeIterator<Item = Block<'_>> + '_ {
        let sl = self.strong_len as usize;
        self.weak_sums
            .iter()
            .zip(self.strong_sums.chunks_exact(sl))
            .enumerate()
            .map(|(i, (&weak_sum, strong_sum))| Block {
                index: i as u32,
                weak_sum,
                strong_sum,
            })
    }

    /// Offset of block `index` in the basis.
    #[inline]
    pub fn basis_offset(&self, index: u32) -> u64 {
        u64::from(index) * u64::from(self.block_len)
    }

    /// Check the in-memory fields agree with each other.
    pub fn validate(&self) -> Result<()> {
        self.options().validate()?;
        if self.strong_len == 0 {
            return Err(Error::config("signature strong length is zero"));
        }
        if self.strong_sums.len() != self.weak_sums.len() * self.strong_len as usize {
            return Err(Error::config(
                "signature strong sums do not match block count",
            ));
        }
        Ok(())
    }

    /// Size of the encoded form in bytes.
    pub fn encoded_len(&self) -> u64 {
        SIG_HEADER_LEN as u64 + self.len() as u64 * (4 + u64::from(self.strong_len))
    }

    // -----------------------------------------------------------------------
    // Codec
    // -----------------------------------------------------------------------

    /// Serialize the whole signature; returns bytes written.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<u64> {
        write_header(w, self.variant, self.block_len, self.strong_len)?;
        for block in self.blocks() {
            write_block(w, block.weak_sum, block.strong_sum)?;
        }
        Ok(self.encoded_len())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len() as usize);
        // Writing to a Vec cannot fail.
        let _ = self.write_to(&mut out);
        out
    }

    /// Parse a signature stream to its end.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let (variant, block_len, strong_len) = read_header(r)?;
        let mut sig = Self {
            variant,
            block_len,
            strong_len,
            weak_sums: Vec::new(),
            strong_sums: Vec::new(),
        };

        let record_len = 4 + strong_len as usize;
        let mut record_buf = [0u8; 4 + MAX_STRONG_LEN];
        let record = &mut record_buf[..record_len];
        loop {
            match netint::read_full(r, record)? {
                0 => break,
                n if n < record_len => {
                    return Err(FormatError::Truncated("signature block record").into());
                }
                _ => {}
            }
            let weak = u32::from_be_bytes([record[0], record[1], record[2], record[3]]);
            sig.push_block(weak, &record[4..])?;
        }

        debug!(
            "loaded signature: {} blocks, block_len={}, strong_len={}, {}",
            sig.len(),
            block_len,
            strong_len,
            variant
        );
        Ok(sig)
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self> {
        Self::read_from(&mut bytes)
    }
}

/// Write the 12-byte signature header.
pub fn write_header<W: Write>(
    w: &mut W,
    variant: ChecksumVariant,
    block_len: u32,
    strong_len: u32,
) -> io::Result<()> {
    netint::write_u32(w, magic_for(variant))?;
    netint::write_u32(w, block_len)?;
    netint::write_u32(w, strong_len)
}

/// Write one block record.
pub fn write_block<W: Write>(w: &mut W, weak_sum: u32, strong_sum: &[u8]) -> io::Result<()> {
    netint::write_u32(w, weak_sum)?;
    w.write_all(strong_sum)
}

/// Read and check the signature header.
pub fn read_header<R: Read>(r: &mut R) -> Result<(ChecksumVariant, u32, u32)> {
    let magic = netint::read_u32(r, "signature header")?;
    let variant = variant_for(magic).ok_or(FormatError::BadMagic(magic))?;
    let block_len = netint::read_u32(r, "signature header")?;
    let strong_len = netint::read_u32(r, "signature header")?;

    if block_len == 0 {
        return Err(FormatError::Invalid("signature block length is zero".into()).into());
    }
    if strong_len == 0 || strong_len as usize > variant.digest_len() {
        return Err(FormatError::OutOfRange(format!(
            "strong sum length {strong_len} for {variant} (max {})",
            variant.digest_len()
        ))
        .into());
    }
    Ok((variant, block_len, strong_len))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
