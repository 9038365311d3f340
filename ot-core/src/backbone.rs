// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The Backbone Agent: Primary Backbone Router (PBBR) election among
//! devices with `backbone_router_enabled` set (spec.md §4.9, Thread
//! 1.2). Optional subsystem; `Instance` only runs it when configured.
//!
//! No teacher counterpart; grounded on spec.md's distillation of
//! `original_source/src/core/backbone_router/bbr_leader.cpp`'s
//! weighting-based election and jittered registration.

use ot_hil::rng::Entropy32;
use ot_hil::time::Millis;

use crate::types::Rloc16;

pub const DEFAULT_REGISTRATION_JITTER_MS: u32 = 5_000;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BackboneState {
    Disabled,
    /// Backbone-capable but not the elected Primary.
    Secondary,
    /// Waiting out the registration jitter before asserting PBBR.
    PendingPrimary { assert_at: Millis },
    Primary,
}

#[derive(Copy, Clone, Debug)]
pub struct Candidate {
    pub rloc16: Rloc16,
    pub weighting: u8,
}

pub struct BackboneAgent {
    pub state: BackboneState,
    pub weighting: u8,
    pub rloc16: Rloc16,
}

impl BackboneAgent {
    pub fn new(weighting: u8, rloc16: Rloc16) -> Self {
        BackboneAgent {
            state: BackboneState::Disabled,
            weighting,
            rloc16,
        }
    }

    pub fn enable(&mut self) {
        if matches!(self.state, BackboneState::Disabled) {
            self.state = BackboneState::Secondary;
        }
    }

    pub fn disable(&mut self) {
        self.state = BackboneState::Disabled;
    }

    /// Re-evaluate PBBR election given the full set of backbone-capable
    /// candidates heard in the partition (including ourselves).
    /// Highest weighting wins; ties broken by lowest RLOC16.
    pub fn evaluate(
        &mut self,
        candidates: &[Candidate],
        now: Millis,
        rng: &mut impl Entropy32,
    ) {
        if matches!(self.state, BackboneState::Disabled) {
            return;
        }
        let winner = candidates
            .iter()
            .copied()
            .max_by(|a, b| {
                (a.weighting, core::cmp::Reverse(a.rloc16.0))
                    .cmp(&(b.weighting, core::cmp::Reverse(b.rloc16.0)))
            });
        let we_win = winner.map(|w| w.rloc16 == self.rloc16).unwrap_or(true);
        match (we_win, self.state) {
            (true, BackboneState::Secondary) => {
                let jitter = rng.next_below(DEFAULT_REGISTRATION_JITTER_MS);
                self.state = BackboneState::PendingPrimary {
                    assert_at: now.wrapping_add(jitter),
                };
            }
            (false, BackboneState::Primary | BackboneState::PendingPrimary { .. }) => {
                self.state = BackboneState::Secondary;
            }
            _ => {}
        }
    }

    /// Call on every scheduler tick; transitions `PendingPrimary` to
    /// `Primary` once the registration jitter has elapsed.
    pub fn tick(&mut self, now: Millis) {
        if let BackboneState::PendingPrimary { assert_at } = self.state {
            if now.has_elapsed(assert_at) {
                self.state = BackboneState::Primary;
            }
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self.state, BackboneState::Primary)
    }
}
