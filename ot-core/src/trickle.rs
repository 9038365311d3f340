// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The Trickle timer (RFC 6206) driving MLE Advertisement transmission:
//! interval doubling between `Imin` and `Imax`, reset on inconsistency.
//!
//! No teacher counterpart (Tock has no Thread Trickle implementation);
//! written directly from spec.md §4.6's "interval doubling between
//! `Imin=1 s` and `Imax=120 s`, reset on any inconsistency" in the
//! scheduler's own idiom (`Millis`-based, driven by explicit `now`
//! rather than its own background task).

use ot_hil::rng::Entropy32;
use ot_hil::time::Millis;

pub const IMIN_MS: u32 = 1_000;
pub const IMAX_MS: u32 = 120_000;

pub struct Trickle {
    interval_ms: u32,
    interval_start: Millis,
    /// The randomized point within the current interval at which we'd
    /// transmit, unless reset first.
    fire_at: Millis,
}

impl Trickle {
    pub fn new(now: Millis, rng: &mut impl Entropy32) -> Self {
        let mut t = Trickle {
            interval_ms: IMIN_MS,
            interval_start: now,
            fire_at: now,
        };
        t.randomize_fire_point(now, rng);
        t
    }

    fn randomize_fire_point(&mut self, now: Millis, rng: &mut impl Entropy32) {
        self.interval_start = now;
        // Fire somewhere in [I/2, I), as RFC 6206 prescribes.
        let half = self.interval_ms / 2;
        let offset = half + rng.next_below(half.max(1));
        self.fire_at = now.wrapping_add(offset);
    }

    /// Reset to the minimum interval, e.g. on hearing inconsistent
    /// Leader Data or a new router-id allocation.
    pub fn reset(&mut self, now: Millis, rng: &mut impl Entropy32) {
        self.interval_ms = IMIN_MS;
        self.randomize_fire_point(now, rng);
    }

    /// Call once per scheduler tick. Returns `true` exactly once per
    /// interval, when the randomized fire point is reached, and doubles
    /// the interval (clamped at `Imax`) for next time.
    pub fn poll(&mut self, now: Millis, rng: &mut impl Entropy32) -> bool {
        if now.has_elapsed(self.fire_at) {
            self.interval_ms = (self.interval_ms * 2).min(IMAX_MS);
            self.randomize_fire_point(now, rng);
            true
        } else {
            false
        }
    }

    pub fn current_interval_ms(&self) -> u32 {
        self.interval_ms
    }
}
