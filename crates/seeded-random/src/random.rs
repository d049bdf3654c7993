//! Sampling helpers over a word generator.
//!
//! Every helper draws from [`Random::real`] or [`Random::integer`], so a
//! sequence of calls consumes a fixed number of words and is reproducible
//! from the generator's seed alone.

use rand::RngCore;

use crate::errors::{RandomError, RandomResult};
use crate::mt::MersenneTwister;

pub struct Random<R: RngCore = MersenneTwister> {
    rng: R,
}

impl Random<MersenneTwister> {
    pub fn from_seed(seed: u32) -> Self {
        Self::new(MersenneTwister::new(seed))
    }
}

impl<R: RngCore> Random<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn rng(&self) -> &R {
        &self.rng
    }

    pub fn into_inner(self) -> R {
        self.rng
    }

    /// Uniform in `[0, 1)` with 53-bit resolution; consumes two words.
    pub fn real(&mut self) -> f64 {
        let a = u64::from(self.rng.next_u32() >> 5);
        let b = u64::from(self.rng.next_u32() >> 6);
        (a as f64 * 67_108_864.0 + b as f64) / 9_007_199_254_740_992.0
    }

    /// Uniform integer in `[min, max]`; bounds may be given in either order.
    pub fn integer(&mut self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let span = (hi as i128 - lo as i128 + 1) as f64;
        let offset = (self.real() * span).floor() as i128;
        (lo as i128 + offset).min(hi as i128) as i64
    }

    /// `true` with probability `p`.
    pub fn bool(&mut self, p: f64) -> bool {
        self.real() < p
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> RandomResult<&'a T> {
        if items.is_empty() {
            return Err(RandomError::EmptyChoices);
        }
        let i = self.integer(0, items.len() as i64 - 1) as usize;
        Ok(&items[i])
    }

    /// Index drawn proportionally to `weights`.
    pub fn weighted_index(&mut self, weights: &[f64]) -> RandomResult<usize> {
        if weights.is_empty() {
            return Err(RandomError::EmptyChoices);
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(RandomError::InvalidWeights);
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(RandomError::InvalidWeights);
        }

        let target = self.real() * total;
        let mut acc = 0.0;
        let mut last_positive = 0;
        for (i, w) in weights.iter().enumerate() {
            if *w > 0.0 {
                last_positive = i;
            }
            acc += w;
            if target < acc {
                return Ok(i);
            }
        }
        // rounding pushed the target past the running sum
        Ok(last_positive)
    }

    pub fn weighted_pick<'a, T>(
        &mut self,
        choices: &'a [(T, f64)],
    ) -> RandomResult<&'a T> {
        let weights: Vec<f64> = choices.iter().map(|(_, w)| *w).collect();
        let i = self.weighted_index(&weights)?;
        Ok(&choices[i].0)
    }

    /// Fisher-Yates, back to front.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.integer(0, i as i64) as usize;
            items.swap(i, j);
        }
    }

    /// Up to `k` distinct elements, in draw order.
    pub fn sample<'a, T>(
        &mut self,
        items: &'a [T],
        k: usize,
    ) -> RandomResult<Vec<&'a T>> {
        if items.is_empty() && k > 0 {
            return Err(RandomError::EmptyChoices);
        }
        let mut indices: Vec<usize> = (0..items.len()).collect();
        let take = k.min(items.len());
        for i in 0..take {
            let j = self.integer(i as i64, indices.len() as i64 - 1) as usize;
            indices.swap(i, j);
        }
        Ok(indices[..take].iter().map(|&i| &items[i]).collect())
    }
}
