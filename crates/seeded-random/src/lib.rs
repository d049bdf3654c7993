//! Seeded randomness that can be replayed.
//!
//! [`MersenneTwister`] is a plain MT19937 generator that counts how many
//! words it has produced, so any position can be restored later from a
//! `(seed, use_count)` pair. [`Random`] layers sampling helpers on top of any
//! [`rand::RngCore`].

mod errors;
mod mt;
mod random;

pub use errors::{RandomError, RandomResult};
pub use mt::{DEFAULT_SEED, MersenneTwister, RngPosition};
pub use random::Random;
