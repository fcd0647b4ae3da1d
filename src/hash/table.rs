// Block index: weak checksum -> candidate basis blocks.
//
// Built once from a finished signature, then only read. A hit here is
// just a weak-sum hit; callers confirm with the strong sum before
// trusting it.
//
// Blocks with identical weak *and* strong sums are stored once (the first
// occurrence), so a basis full of repeated content does not turn every
// weak-sum collision into a long chain walk.

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::format::signature::{Block, Signature};

/// Read-only lookup table over a [`Signature`].
///
/// `Sync` once built, so one index can serve matchers on several threads.
pub struct BlockIndex<'a> {
    sig: &'a Signature,
    /// weak sum -> block indices, in basis order.
    buckets: HashMap<u32, Vec<u32>>,
    entries: usize,
}

impl<'a> BlockIndex<'a> {
    /// Index every block of `sig`.
    pub fn new(sig: &'a Signature) -> Result<Self> {
        sig.validate()?;
        let mut buckets: HashMap<u32, Vec<u32>> = HashMap::with_capacity(sig.len());
        let mut seen: HashSet<(u32, &[u8])> = HashSet::with_capacity(sig.len());

        for block in sig.blocks() {
            if seen.insert((block.weak_sum, block.strong_sum)) {
                buckets.entry(block.weak_sum).or_default().push(block.index);
            }
        }
        let entries = seen.len();

        log::debug!(
            "block index: {} blocks, {} entries, {} distinct weak sums",
            sig.len(),
            entries,
            buckets.len()
        );
        Ok(Self {
            sig,
            buckets,
            entries,
        })
    }

    pub fn signature(&self) -> &'a Signature {
        self.sig
    }

    /// Indexed entries (blocks minus exact duplicates).
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Whether any block has this weak sum.
    #[inline]
    pub fn contains_weak(&self, weak_sum: u32) -> bool {
        self.buckets.contains_key(&weak_sum)
    }

    /// Blocks whose weak sum equals `weak_sum`, in basis order.
    pub fn candidates(&self, weak_sum: u32) -> impl Iterator<Item = Block<'a>> + '_ {
        let sig = self.sig;
        self.buckets
            .get(&weak_sum)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(move |&i| sig.block(i as usize))
    }

    /// First candidate whose strong sum equals `strong_sum`.
    ///
    /// `strong_sum` must already be truncated to the signature's length.
    /// The second value counts weak-sum hits rejected along the way.
    pub fn find(&self, weak_sum: u32, strong_sum: &[u8]) -> (Option<Block<'a>>, u64) {
        let mut rejected = 0;
        for block in self.candidates(weak_sum) {
            if block.strong_sum == strong_sum {
                return (Some(block), rejected);
            }
            rejected += 1;
        }
        (None, rejected)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
