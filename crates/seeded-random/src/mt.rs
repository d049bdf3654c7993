use rand::RngCore;
use serde::{Deserialize, Serialize};

const N: usize = 624;
const M: usize = 397;
const MATRIX_A: u32 = 0x9908_b0df;
const UPPER_MASK: u32 = 0x8000_0000;
const LOWER_MASK: u32 = 0x7fff_ffff;

/// Reference default seed of MT19937.
pub const DEFAULT_SEED: u32 = 5489;

/// Where a generator is in its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngPosition {
    pub seed: u32,
    pub use_count: u64,
}

/// MT19937, 32-bit output.
#[derive(Clone)]
pub struct MersenneTwister {
    state: Box<[u32; N]>,
    index: usize,
    seed: u32,
    use_count: u64,
}

impl MersenneTwister {
    pub fn new(seed: u32) -> Self {
        let mut mt = Self {
            state: Box::new([0; N]),
            index: N,
            seed,
            use_count: 0,
        };
        mt.seed(seed);
        mt
    }

    /// Re-initialize the state and reset the use count.
    pub fn seed(&mut self, seed: u32) {
        let state = &mut self.state;
        state[0] = seed;
        for i in 1..N {
            let prev = state[i - 1];
            state[i] = 1_812_433_253u32
                .wrapping_mul(prev ^ (prev >> 30))
                .wrapping_add(i as u32);
        }
        self.index = N;
        self.seed = seed;
        self.use_count = 0;
    }

    /// Generator at the exact position another one reported.
    pub fn replay(seed: u32, use_count: u64) -> Self {
        let mut mt = Self::new(seed);
        mt.discard(use_count);
        mt
    }

    pub fn from_position(position: RngPosition) -> Self {
        Self::replay(position.seed, position.use_count)
    }

    pub fn position(&self) -> RngPosition {
        RngPosition {
            seed: self.seed,
            use_count: self.use_count,
        }
    }

    /// Number of words produced since the last seeding.
    pub fn use_count(&self) -> u64 {
        self.use_count
    }

    pub fn next_u32(&mut self) -> u32 {
        if self.index >= N {
            self.twist();
        }
        let mut y = self.state[self.index];
        self.index += 1;
        self.use_count += 1;

        y ^= y >> 11;
        y ^= (y << 7) & 0x9d2c_5680;
        y ^= (y << 15) & 0xefc6_0000;
        y ^ (y >> 18)
    }

    /// Skip `count` outputs without tempering them.
    pub fn discard(&mut self, mut count: u64) {
        while count > 0 {
            if self.index >= N {
                self.twist();
            }
            let step = ((N - self.index) as u64).min(count);
            self.index += step as usize;
            self.use_count += step;
            count -= step;
        }
    }

    fn twist(&mut self) {
        let state = &mut self.state;
        for i in 0..N {
            let y = (state[i] & UPPER_MASK) | (state[(i + 1) % N] & LOWER_MASK);
            let mut next = state[(i + M) % N] ^ (y >> 1);
            if y & 1 != 0 {
                next ^= MATRIX_A;
            }
            state[i] = next;
        }
        self.index = 0;
    }
}

impl Default for MersenneTwister {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl std::fmt::Debug for MersenneTwister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MersenneTwister")
            .field("seed", &self.seed)
            .field("use_count", &self.use_count)
            .finish()
    }
}

impl RngCore for MersenneTwister {
    fn next_u32(&mut self) -> u32 {
        MersenneTwister::next_u32(self)
    }

    /// High word first.
    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(MersenneTwister::next_u32(self));
        let lo = u64::from(MersenneTwister::next_u32(self));
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(4) {
            let word = MersenneTwister::next_u32(self).to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }
}
