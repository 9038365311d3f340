// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A deterministic xorshift32 PRNG implementing `Entropy32`, so
//! integration tests get reproducible CSMA/Trickle/jitter behavior
//! instead of depending on real hardware entropy.

use ot_hil::rng::Entropy32;

pub struct SimRng {
    state: u32,
}

impl SimRng {
    pub fn new(seed: u32) -> Self {
        SimRng {
            state: if seed == 0 { 0xdead_beef } else { seed },
        }
    }
}

impl Entropy32 for SimRng {
    fn next_u32(&mut self) -> u32 {
        // xorshift32, per Marsaglia 2003.
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }
}
