// Signature configuration: block length, strong sum length, checksum family.
//
// Every operation takes its configuration explicitly; there is no
// process-wide default registry.

use super::strong::ChecksumVariant;
use crate::error::{Error, Result};

/// Default block length (librsync `RS_DEFAULT_BLOCK_LEN`).
pub const DEFAULT_BLOCK_LEN: u32 = 2048;

/// Smallest block length picked by [`SignatureOptions::recommended`].
pub const MIN_RECOMMENDED_BLOCK_LEN: u32 = 256;

/// Options controlling signature generation.
///
/// The delta encoder and patcher take no options of their own: the encoder
/// inherits everything from the loaded signature, and the patcher only
/// replays commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureOptions {
    /// Bytes per basis block. Must be non-zero.
    pub block_len: u32,
    /// Bytes of strong sum kept per block; 0 selects the full digest.
    pub strong_len: u32,
    /// Strong checksum family.
    pub variant: ChecksumVariant,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self {
            block_len: DEFAULT_BLOCK_LEN,
            strong_len: 0,
            variant: ChecksumVariant::default(),
        }
    }
}

impl SignatureOptions {
    pub fn new(block_len: u32, strong_len: u32, variant: ChecksumVariant) -> Self {
        Self {
            block_len,
            strong_len,
            variant,
        }
    }

    /// Reject configurations no signature can be built with.
    pub fn validate(&self) -> Result<()> {
        if self.block_len == 0 {
            return Err(Error::config("block length must be positive"));
        }
        let max = self.variant.digest_len();
        if self.strong_len as usize > max {
            return Err(Error::config(format!(
                "strong sum length {} exceeds {} digest length {max}",
                self.strong_len, self.variant
            )));
        }
        Ok(())
    }

    /// Strong sum length actually stored, with 0 resolved to the full digest.
    pub fn effective_strong_len(&self) -> usize {
        match self.strong_len {
            0 => self.variant.digest_len(),
            n => n as usize,
        }
    }

    /// Options sized for a basis of `basis_len` bytes (librsync `rs_sig_args`).
    ///
    /// Blocks grow with the square root of the basis so the block count
    /// stays moderate, and the strong sum is cut to the shortest length that
    /// still keeps accidental matches improbable for that many blocks.
    pub fn recommended(basis_len: u64, variant: ChecksumVariant) -> Self {
        let block_len = if basis_len <= u64::from(MIN_RECOMMENDED_BLOCK_LEN).pow(2) {
            MIN_RECOMMENDED_BLOCK_LEN
        } else {
            let root = basis_len.isqrt() & !127;
            u32::try_from(root).unwrap_or(u32::MAX & !127)
        };
        let blocks = basis_len / u64::from(block_len) + 1;
        let min_strong = 2 + (ln2(basis_len + (1 << 24)) + ln2(blocks) + 7) / 8;
        let strong_len = min_strong.min(variant.digest_len() as u32);
        Self {
            block_len,
            strong_len,
            variant,
        }
    }
}

/// floor(log2(v)), with 0 for 0.
fn ln2(v: u64) -> u32 {
    v.checked_ilog2().unwrap_or(0)
}
