//! The deterministic pseudo-random source shared by every strategy.
//!
//! Every scheduler owns exactly one [`RandomSource`], seeded once at session
//! creation. All nondeterministic decisions — which strategy picks an
//! operation, which delay a fuzzing strategy injects, and the values returned
//! by `GetNextBoolean`/`GetNextInteger` — are drawn from this single stream,
//! so two scheduler runs with the same seed and the same request sequence
//! are bit-for-bit identical (spec property 6).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A deterministic source of randomness, seeded per session.
///
/// Grounded in `durable_runtime::entropy::Entropy`: production code can swap
/// in any RNG, but the one shipped here (backed by [`StdRng`]) is what every
/// strategy in this crate uses, since reproducibility is the entire point of
/// the scheduler.
pub struct RandomSource {
    seed: u64,
    rng: parking_lot::Mutex<StdRng>,
}

impl RandomSource {
    /// Create a new source seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: parking_lot::Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// The seed this source was constructed with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Reseed the source, e.g. when a new iteration begins but the caller
    /// wants a derived-but-deterministic stream per iteration.
    pub fn reseed(&self, seed: u64) {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
    }

    /// A uniform integer in `[0, n)`. Panics if `n == 0`.
    pub fn next(&self, n: u64) -> u64 {
        assert!(n > 0, "RandomSource::next called with n = 0");
        self.rng.lock().gen_range(0..n)
    }

    /// A uniform integer in `[0, n)` as `usize`, for indexing.
    pub fn next_usize(&self, n: usize) -> usize {
        self.next(n as u64) as usize
    }

    /// A uniform double in `[0, 1)`.
    pub fn next_double(&self) -> f64 {
        self.rng.lock().gen_range(0.0..1.0)
    }

    /// A uniform boolean with the given probability of being `true`.
    pub fn next_bool_with_probability(&self, probability: f64) -> bool {
        self.next_double() < probability
    }

    /// Pick a uniformly random element from a non-empty slice.
    pub fn choose<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }

        Some(&items[self.next_usize(items.len())])
    }
}
