//! `MinHash` sketches over character n-grams.
//!
//! Hashing must be stable across processes because sketches are persisted,
//! so shingles are hashed with 64-bit FNV-1a and permuted with
//! `(a·x + b) mod (2^61 - 1)`.

use std::collections::HashSet;

const MERSENNE_61: u64 = (1 << 61) - 1;
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a.
#[must_use]
pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Lowercased character n-grams of `text`; short strings form one shingle.
#[must_use]
pub fn shingles(text: &str, ngram: usize) -> HashSet<String> {
    let chars: Vec<char> = text.trim().to_lowercase().chars().collect();
    if chars.is_empty() {
        return HashSet::new();
    }
    if chars.len() <= ngram {
        return std::iter::once(chars.into_iter().collect()).collect();
    }
    chars
        .windows(ngram)
        .map(|window| window.iter().collect())
        .collect()
}

/// Fixed family of `num_perm` hash permutations.
#[derive(Debug, Clone)]
pub struct MinHasher {
    ngram: usize,
    permutations: Vec<(u64, u64)>,
}

impl MinHasher {
    #[must_use]
    pub fn new(num_perm: usize, ngram: usize, seed: u64) -> Self {
        let mut state = seed;
        let permutations = (0..num_perm)
            .map(|_| {
                let a = splitmix64(&mut state) % (MERSENNE_61 - 1) + 1;
                let b = splitmix64(&mut state) % MERSENNE_61;
                (a, b)
            })
            .collect();
        Self {
            ngram: ngram.max(1),
            permutations,
        }
    }

    #[must_use]
    pub fn num_perm(&self) -> usize {
        self.permutations.len()
    }

    /// Sketch of `text`. Empty text yields an all-`u64::MAX` sketch.
    #[must_use]
    pub fn sketch(&self, text: &str) -> Vec<u64> {
        let hashes: Vec<u64> = shingles(text, self.ngram)
            .iter()
            .map(|s| fnv1a(s.as_bytes()) % MERSENNE_61)
            .collect();

        self.permutations
            .iter()
            .map(|&(a, b)| {
                hashes
                    .iter()
                    .map(|&x| permute(a, b, x))
                    .min()
                    .unwrap_or(u64::MAX)
            })
            .collect()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn permute(a: u64, b: u64, x: u64) -> u64 {
    ((u128::from(a) * u128::from(x) + u128::from(b)) % u128::from(MERSENNE_61)) as u64
}

/// Estimated Jaccard similarity: the fraction of agreeing positions.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn jaccard(left: &[u64], right: &[u64]) -> f64 {
    if left.is_empty() || left.len() != right.len() {
        return 0.0;
    }
    let equal = left
        .iter()
        .zip(right)
        .filter(|(l, r)| l == r && **l != u64::MAX)
        .count();
    equal as f64 / left.len() as f64
}
