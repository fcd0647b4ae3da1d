// Per-operation statistics (librsync `rs_stats`).

use std::fmt;

/// Statistics from building a signature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignatureStats {
    /// Blocks summarized.
    pub blocks: u64,
    /// Basis bytes read.
    pub in_bytes: u64,
    /// Signature bytes written.
    pub out_bytes: u64,
}

/// Statistics from encoding a delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaStats {
    pub literal_cmds: u64,
    pub literal_bytes: u64,
    pub copy_cmds: u64,
    pub copy_bytes: u64,
    /// Weak-sum hits rejected by the strong sum.
    pub false_matches: u64,
    /// New-stream bytes read.
    pub in_bytes: u64,
    /// Delta bytes written.
    pub out_bytes: u64,
}

/// Statistics from applying a delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchStats {
    pub literal_cmds: u64,
    pub literal_bytes: u64,
    pub copy_cmds: u64,
    pub copy_bytes: u64,
    /// Delta bytes read.
    pub in_bytes: u64,
    /// Reconstructed bytes written.
    pub out_bytes: u64,
}

impl fmt::Display for SignatureStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "signature statistics: blocks={} in={} out={}",
            self.blocks, self.in_bytes, self.out_bytes
        )
    }
}

impl fmt::Display for DeltaStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delta statistics: literal[{} cmds, {} bytes] copy[{} cmds, {} bytes] \
             false_matches={} in={} out={}",
            self.literal_cmds,
            self.literal_bytes,
            self.copy_cmds,
            self.copy_bytes,
            self.false_matches,
            self.in_bytes,
            self.out_bytes
        )
    }
}

impl fmt::Display for PatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "patch statistics: literal[{} cmds, {} bytes] copy[{} cmds, {} bytes] in={} out={}",
            self.literal_cmds,
            self.literal_bytes,
            self.copy_cmds,
            self.copy_bytes,
            self.in_bytes,
            self.out_bytes
        )
    }
}
