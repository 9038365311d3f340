// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A minimal random-number seam, modeled on `kernel::hil::rng`.
//!
//! Used for CSMA backoff, Trickle timer jitter, router-selection jitter
//! and backbone registration jitter — none of which need
//! cryptographically secure randomness, only a source a platform can back
//! with a cheap hardware TRNG or LFSR.

/// A source of 32-bit random words.
pub trait Entropy32 {
    fn next_u32(&mut self) -> u32;

    /// A uniform value in `[0, bound)`. `bound` must be nonzero.
    fn next_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.next_u32() % bound
    }
}
