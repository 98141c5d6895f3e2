// Randomness sources for the harmony engine.
//
// Every random decision the engine makes (rank-biased sampling, velocity
// jitter, vowel choice) goes through the `RandomSource` trait defined here.
// Two implementations ship with the crate:
//
// - `ChoirRng`: xoshiro256++ (Blackman & Vigna, 2019) seeded through
//   SplitMix64. Hand-rolled so output is identical on every platform and a
//   seed fully reproduces a harmonization session.
// - `ScriptedSource`: replays a fixed list of unit-interval values, for
//   tests that need to force a particular branch of the sampler.
//
// Randomness here is not cryptographic. The only requirements are
// independence between draws and reproducibility from a seed.

use serde::{Deserialize, Serialize};

/// A source of uniform draws, injected into the engine.
///
/// Implementors only need `next_f64`; the other methods derive from it.
pub trait RandomSource {
    /// A uniform value in [0, 1).
    fn next_f64(&mut self) -> f64;

    /// A uniform value in `[low, high)`.
    fn range_f64(&mut self, low: f64, high: f64) -> f64 {
        low + self.next_f64() * (high - low)
    }

    /// Return `true` with probability `p`.
    ///
    /// `p <= 0.0` always returns false, `p >= 1.0` always returns true.
    fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// A uniform index in `[0, len)`. Returns 0 when `len` is 0.
    fn index_below(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        ((self.next_f64() * len as f64) as usize).min(len - 1)
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_f64(&mut self) -> f64 {
        (**self).next_f64()
    }

    fn index_below(&mut self, len: usize) -> usize {
        (**self).index_below(len)
    }
}

/// Xoshiro256++ generator, the default randomness for an engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChoirRng {
    s: [u64; 4],
}

impl ChoirRng {
    /// Create a generator from a `u64` seed.
    ///
    /// Two generators built from the same seed produce identical streams.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Seed from the system clock. Used when the caller did not ask for a
    /// reproducible session.
    pub fn from_clock() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x5eed);
        Self::new(nanos)
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// A uniform integer in `[0, bound)`, by rejection sampling so small
    /// bounds carry no modulo bias.
    pub fn below_u64(&mut self, bound: u64) -> u64 {
        assert!(bound > 0, "below_u64: bound must be positive");
        if bound.is_power_of_two() {
            return self.next_u64() & (bound - 1);
        }
        let threshold = bound.wrapping_neg() % bound;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return r % bound;
            }
        }
    }
}

impl RandomSource for ChoirRng {
    /// Upper 53 bits of a `u64`, scaled into [0, 1).
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn index_below(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.below_u64(len as u64) as usize
    }
}

/// Replays a fixed sequence of draws, wrapping around at the end.
///
/// Values are clamped into [0, 1) on construction so a script can never
/// push the engine outside the trait's contract.
#[derive(Clone, Debug)]
pub struct ScriptedSource {
    values: Vec<f64>,
    pos: usize,
}

impl ScriptedSource {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        let values: Vec<f64> = values
            .into()
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0 - f64::EPSILON))
            .collect();
        Self { values, pos: 0 }
    }

    /// A source that always returns the same value.
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Number of draws taken so far.
    pub fn draws(&self) -> usize {
        self.pos
    }
}

impl RandomSource for ScriptedSource {
    fn next_f64(&mut self) -> f64 {
        if self.values.is_empty() {
            self.pos += 1;
            return 0.0;
        }
        let v = self.values[self.pos % self.values.len()];
        self.pos += 1;
        v
    }
}

/// SplitMix64, used only to expand a `u64` seed into xoshiro state.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = ChoirRng::new(42);
        let mut b = ChoirRng::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = ChoirRng::new(42);
        let mut b = ChoirRng::new(43);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn unit_draws_stay_in_range() {
        let mut rng = ChoirRng::new(12345);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "f64 out of range: {v}");
        }
    }

    #[test]
    fn range_f64_stays_in_bounds() {
        let mut rng = ChoirRng::new(777);
        for _ in 0..10_000 {
            let v = rng.range_f64(-0.1, 0.1);
            assert!((-0.1..0.1).contains(&v), "range_f64 out of range: {v}");
        }
    }

    #[test]
    fn index_below_covers_every_slot() {
        let mut rng = ChoirRng::new(555);
        let mut seen = [false; 5];
        for _ in 0..10_000 {
            let i = rng.index_below(5);
            assert!(i < 5);
            seen[i] = true;
        }
        assert!(seen.iter().all(|&s| s), "every index should be drawn: {seen:?}");
        assert_eq!(rng.index_below(0), 0);
    }

    #[test]
    fn random_bool_matches_probability() {
        let mut rng = ChoirRng::new(42);
        let n = 10_000;
        let hits = (0..n).filter(|_| rng.random_bool(0.8)).count();
        let pct = hits as f64 / n as f64;
        assert!((0.77..0.83).contains(&pct), "random_bool(0.8) gave {pct}");
    }

    #[test]
    fn random_bool_extremes() {
        let mut rng = ChoirRng::new(42);
        for _ in 0..100 {
            assert!(!rng.random_bool(0.0));
            assert!(rng.random_bool(1.0));
        }
    }

    #[test]
    fn scripted_source_replays_and_wraps() {
        let mut src = ScriptedSource::new(vec![0.1, 0.5, 0.95]);
        let drawn: Vec<f64> = (0..5).map(|_| src.next_f64()).collect();
        assert_eq!(drawn, vec![0.1, 0.5, 0.95, 0.1, 0.5]);
        assert_eq!(src.draws(), 5);
    }

    #[test]
    fn scripted_source_clamps_out_of_range_values() {
        let mut src = ScriptedSource::new(vec![1.5, -2.0]);
        assert!(src.next_f64() < 1.0);
        assert_eq!(src.next_f64(), 0.0);
    }

    #[test]
    fn scripted_index_below_uses_scaled_draw() {
        let mut src = ScriptedSource::constant(0.99);
        assert_eq!(src.index_below(5), 4);
        let mut src = ScriptedSource::constant(0.0);
        assert_eq!(src.index_below(5), 0);
    }

    #[test]
    fn borrowed_source_forwards_draws() {
        let mut rng = ChoirRng::new(9);
        let mut copy = rng.clone();
        let expected = copy.next_f64();
        fn draw<R: RandomSource>(mut src: R) -> f64 {
            src.next_f64()
        }
        assert_eq!(draw(&mut rng), expected);
    }

    #[test]
    fn serialization_roundtrip_continues_stream() {
        let mut rng = ChoirRng::new(42);
        for _ in 0..100 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: ChoirRng = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
