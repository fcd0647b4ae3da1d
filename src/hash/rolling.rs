// Rolling weak checksum (librsync `rollsum`).
//
// Two accumulators over the window:
//   s1 = sum of (byte + CHAR_OFFSET)
//   s2 = sum of the running s1 values
// The 32-bit digest packs the low 16 bits of each: (s2 << 16) | s1.
//
// Sliding the window by one byte touches only the outgoing and incoming
// bytes, so advancing costs O(1) regardless of window length.

/// Constant added to every byte before it enters the sums.
pub const CHAR_OFFSET: u32 = 31;

/// Rolling checksum state for one window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rollsum {
    count: usize,
    s1: u32,
    s2: u32,
}

impl Rollsum {
    pub const fn new() -> Self {
        Self {
            count: 0,
            s1: 0,
            s2: 0,
        }
    }

    /// Checksum state freshly computed over `window`.
    pub fn from_window(window: &[u8]) -> Self {
        let mut sum = Self::new();
        sum.update(window);
        sum
    }

    /// Append `buf` to the window.
    pub fn update(&mut self, buf: &[u8]) {
        let mut s1 = self.s1;
        let mut s2 = self.s2;
        for &b in buf {
            s1 = s1.wrapping_add(b as u32);
            s2 = s2.wrapping_add(s1);
        }
        // Fold the per-byte offset in once instead of per iteration.
        let len = buf.len() as u32;
        s1 = s1.wrapping_add(len.wrapping_mul(CHAR_OFFSET));
        s2 = s2.wrapping_add(triangle(buf.len()).wrapping_mul(CHAR_OFFSET));
        self.s1 = s1;
        self.s2 = s2;
        self.count += buf.len();
    }

    /// Slide the window by one byte: drop `out`, append `inb`.
    #[inline(always)]
    pub fn rotate(&mut self, out: u8, inb: u8) {
        self.s1 = self.s1.wrapping_add(inb as u32).wrapping_sub(out as u32);
        self.s2 = self
            .s2
            .wrapping_add(self.s1)
            .wrapping_sub((self.count as u32).wrapping_mul(out as u32 + CHAR_OFFSET));
    }

    /// Append one byte, growing the window.
    #[inline(always)]
    pub fn rollin(&mut self, inb: u8) {
        self.s1 = self.s1.wrapping_add(inb as u32 + CHAR_OFFSET);
        self.s2 = self.s2.wrapping_add(self.s1);
        self.count += 1;
    }

    /// Drop the oldest byte, shrinking the window.
    #[inline(always)]
    pub fn rollout(&mut self, out: u8) {
        let out = out as u32 + CHAR_OFFSET;
        self.s1 = self.s1.wrapping_sub(out);
        self.s2 = self.s2.wrapping_sub((self.count as u32).wrapping_mul(out));
        self.count -= 1;
    }

    /// Number of bytes currently in the window.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The 32-bit weak checksum of the current window.
    #[inline(always)]
    pub fn digest(&self) -> u32 {
        (self.s2 << 16) | (self.s1 & 0xFFFF)
    }
}

/// `n * (n + 1) / 2`, reduced mod 2^32.
#[inline]
fn triangle(n: usize) -> u32 {
    let n = n as u64;
    let t = if n.is_multiple_of(2) {
        (n / 2).wrapping_mul(n.wrapping_add(1))
    } else {
        n.wrapping_mul(n.wrapping_add(1) / 2)
    };
    t as u32
}

/// Weak checksum of a whole block.
pub fn weak_sum(block: &[u8]) -> u32 {
    Rollsum::from_window(block).digest()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Direct per-byte definition, used as the oracle.
    fn naive(window: &[u8]) -> u32 {
        let mut s1: u32 = 0;
        let mut s2: u32 = 0;
        for &b in window {
            s1 = s1.wrapping_add(b as u32 + CHAR_OFFSET);
            s2 = s2.wrapping_add(s1);
        }
        (s2 << 16) | (s1 & 0xFFFF)
    }

    fn sample(len: usize) -> Vec<u8> {
        let mut s = 0x2545_F491u32;
        (0..len)
            .map(|_| {
                s ^= s << 13;
                s ^= s >> 17;
                s ^= s << 5;
                s as u8
            })
            .collect()
    }

    #[test]
    fn empty_window() {
        let r = Rollsum::new();
        assert!(r.is_empty());
        assert_eq!(r.digest(), 0);
        assert_eq!(weak_sum(b""), 0);
    }

    #[test]
    fn update_matches_naive() {
        let long = sample(4096);
        let inputs: [&[u8]; 4] = [b"a", b"hello", b"ABCDEFGH", &long];
        for data in inputs {
            assert_eq!(weak_sum(data), naive(data));
        }
    }

    #[test]
    fn incremental_update_matches_single_update() {
        let data = sample(1000);
        let mut r = Rollsum::new();
        r.update(&data[..3]);
        r.update(&data[3..517]);
        r.update(&data[517..]);
        assert_eq!(r, Rollsum::from_window(&data));
    }

    #[test]
    fn rotate_matches_fresh_window() {
        let data = sample(600);
        let w = 64;
        let mut r = Rollsum::from_window(&data[..w]);
        for pos in 1..=data.len() - w {
            r.rotate(data[pos - 1], data[pos + w - 1]);
            assert_eq!(
                r.digest(),
                weak_sum(&data[pos..pos + w]),
                "mismatch at {pos}"
            );
        }
    }

    #[test]
    fn rollin_and_rollout() {
        let data = sample(100);
        let mut r = Rollsum::new();
        for &b in &data {
            r.rollin(b);
        }
        assert_eq!(r.digest(), weak_sum(&data));

        for i in 0..data.len() {
            r.rollout(data[i]);
            assert_eq!(r.len(), data.len() - i - 1);
            assert_eq!(r.digest(), weak_sum(&data[i + 1..]));
        }
        assert!(r.is_empty());
    }

    #[test]
    fn known_value() {
        // s1 = 97+98+99 + 3*31 = 387, s2 = 128 + 257 + 387 = 772
        assert_eq!(weak_sum(b"abc"), (772 << 16) | 387);
    }
}
