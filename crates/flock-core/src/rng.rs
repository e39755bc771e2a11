//! The model-owned random stream.
//!
//! Every stochastic decision the runtime makes (activation shuffles,
//! empty-cell selection, batch seeding) and every helper offered to agent
//! code draws from one [`RandomSource`]. Identical seeds, parameters and
//! agent code therefore reproduce identical runs on a single thread.
//!
//! The generator is ChaCha8: portable across platforms and fast enough
//! that shuffling thousands of agents per tick is not a bottleneck.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::ConfigError;

/// FNV-1a offset basis for 64-bit.
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x00000100000001B3;
/// Keeps derived seeds non-negative as `i64`.
const SEED_MASK: u64 = i64::MAX as u64;

#[inline]
fn fnv1a_u64(mut hash: u64, v: u64) -> u64 {
    for &b in &v.to_le_bytes() {
        hash = (hash ^ b as u64).wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Deterministic per-run seed for batch sweeps.
///
/// Folds `(master, combination, repetition)` through FNV-1a, so the seed
/// of any run can be recomputed from its indices alone and is unaffected
/// by how runs are distributed over workers.
///
/// The result fits in 63 bits so it survives a signed integer column.
pub fn derive_seed(master: u64, combination: usize, repetition: usize) -> u64 {
    let mut hash = FNV_OFFSET;
    hash = fnv1a_u64(hash, master);
    hash = fnv1a_u64(hash, combination as u64);
    fnv1a_u64(hash, repetition as u64) & SEED_MASK
}

/// Seedable pseudo-random stream owned by a model.
#[derive(Clone, Debug)]
pub struct RandomSource {
    seed: u64,
    rng: ChaCha8Rng,
}

impl RandomSource {
    /// Create a stream from an explicit seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Create a stream from an optional seed.
    ///
    /// Without a seed, one is drawn from the thread-local entropy source
    /// and recorded so the run can still be replayed via [`seed`](Self::seed).
    ///
    /// # Errors
    ///
    /// [`ConfigError::Unseeded`] when `seed` is `None` and `require_seed`
    /// is set.
    pub fn from_option(seed: Option<u64>, require_seed: bool) -> Result<Self, ConfigError> {
        match seed {
            Some(s) => Ok(Self::new(s)),
            None if require_seed => Err(ConfigError::Unseeded),
            None => Ok(Self::new(rand::random::<u64>())),
        }
    }

    /// The seed this stream was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform float in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Uniform float in `[lo, hi)`. Returns `lo` when the range is empty.
    pub fn uniform_range(&mut self, lo: f64, hi: f64) -> f64 {
        if !(hi > lo) {
            return lo;
        }
        lo + (hi - lo) * self.uniform()
    }

    /// Uniform integer in the inclusive range `[lo, hi]`.
    ///
    /// Returns `lo` when `hi <= lo`.
    pub fn int_range(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        self.rng.random_range(lo..=hi)
    }

    /// Uniform index in `[0, n)`, or `None` when `n == 0`.
    pub fn index(&mut self, n: usize) -> Option<usize> {
        if n == 0 {
            None
        } else {
            Some(self.rng.random_range(0..n))
        }
    }

    /// `true` with probability `p` (values outside `[0, 1]` saturate).
    pub fn bernoulli(&mut self, p: f64) -> bool {
        self.uniform() < p
    }

    /// Normally distributed sample (Box–Muller transform).
    pub fn normal(&mut self, mean: f64, sd: f64) -> f64 {
        let u1 = self.uniform().max(1e-300);
        let u2 = self.uniform();
        mean + sd * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Uniform choice from a slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }

    /// Choice weighted by `weight(item)`.
    ///
    /// Returns `None` for an empty slice, or when weights are negative,
    /// non-finite or all zero.
    pub fn choose_weighted<'a, T, F>(&mut self, items: &'a [T], weight: F) -> Option<&'a T>
    where
        F: Fn(&T) -> f64,
    {
        items.choose_weighted(&mut self.rng, weight).ok()
    }

    /// Shuffle a slice in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    /// Sample `k` distinct elements without replacement.
    ///
    /// Returns every element (in random order) when `k >= items.len()`.
    pub fn sample<T: Clone>(&mut self, items: &[T], k: usize) -> Vec<T> {
        let mut out: Vec<T> = items.choose_multiple(&mut self.rng, k).cloned().collect();
        out.shuffle(&mut self.rng);
        out
    }

    /// Raw 64-bit draw, e.g. to seed a child stream.
    pub fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// The underlying generator, for use with `rand` distributions.
    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}
