//! A deterministic, splittable 64-bit generator exposing uniform doubles
//! in `(0, 1]`, as the direct method needs for both the time increment
//! and the reaction selection draw.

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

pub struct Rng(SmallRng);

impl Rng {
    pub fn seed_from_u64(seed: u64) -> Self {
        Rng(SmallRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Rng(SmallRng::from_entropy())
    }

    /// Draws a uniform double in `(0, 1]`.
    ///
    /// `(bits >> 11) * 2^-53` maps the top 53 bits of a `u64` onto
    /// `[0, 1)`; on the rare exact-zero outcome we redraw, which shifts
    /// the range to `(0, 1]` instead of adding a constant bias.
    pub fn next_open01(&mut self) -> f64 {
        loop {
            let bits = self.0.next_u64() >> 11;
            let u = bits as f64 * (1.0 / (1u64 << 53) as f64);
            if u > 0.0 {
                return u;
            }
        }
    }
}
