// Strong (cryptographic) block checksums.
//
// Two interchangeable families, selected by the signature magic:
//   - MD4      (16-byte digest, librsync's original format)
//   - BLAKE2b  (32-byte output parameter, librsync 1.0+ default)
//
// Signatures may store a prefix of the digest (`strong_len`); comparison
// always happens on that prefix.

use std::fmt;
use std::str::FromStr;

use blake2::Blake2b;
use digest::Digest;
use digest::consts::U32;

use crate::error::Error;

/// Largest digest any variant produces.
pub const MAX_STRONG_LEN: usize = 32;

/// MD4 digest length.
pub const MD4_SUM_LEN: usize = 16;

/// BLAKE2b digest length as used in signatures.
pub const BLAKE2_SUM_LEN: usize = 32;

type Blake2b256 = Blake2b<U32>;

/// Strong checksum family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChecksumVariant {
    Md4,
    #[default]
    Blake2,
}

impl ChecksumVariant {
    pub const ALL: [ChecksumVariant; 2] = [ChecksumVariant::Md4, ChecksumVariant::Blake2];

    /// Full digest length of this family.
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Md4 => MD4_SUM_LEN,
            Self::Blake2 => BLAKE2_SUM_LEN,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Md4 => "md4",
            Self::Blake2 => "blake2",
        }
    }

    /// Compute the full digest of `data` into a fixed buffer.
    ///
    /// Only the first `digest_len()` bytes of the result are meaningful.
    pub fn digest(self, data: &[u8]) -> [u8; MAX_STRONG_LEN] {
        let mut out = [0u8; MAX_STRONG_LEN];
        match self {
            Self::Md4 => {
                let d = md4::Md4::digest(data);
                out[..MD4_SUM_LEN].copy_from_slice(&d);
            }
            Self::Blake2 => {
                let d = Blake2b256::digest(data);
                out.copy_from_slice(&d);
            }
        }
        out
    }

    /// Digest of `data` truncated to `strong_len` bytes, written to `out`.
    ///
    /// `out.len()` is the truncation length and must not exceed
    /// `digest_len()`.
    pub fn digest_into(self, data: &[u8], out: &mut [u8]) {
        debug_assert!(out.len() <= self.digest_len());
        let full = self.digest(data);
        out.copy_from_slice(&full[..out.len()]);
    }
}

impl fmt::Display for ChecksumVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown names are rejected rather than mapped to a default family.
impl FromStr for ChecksumVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md4" => Ok(Self::Md4),
            "blake2" | "blake2b" => Ok(Self::Blake2),
            other => Err(Error::config(format!(
                "unknown checksum variant '{other}' (expected md4 or blake2)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
