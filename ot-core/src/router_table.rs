// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Leader-side router ID allocation, aging and release (spec.md §4.7).
//!
//! No direct teacher counterpart — Tock's stub Thread support never
//! implemented router management — so this follows spec.md's
//! distillation of `original_source/src/core/thread/
//! router_table.cpp`'s id bitmap/aging logic, in the scheduler's own
//! `Millis`-based idiom.

use crate::types::Rloc16;
use crate::Error;

pub const NUM_ROUTER_IDS: usize = 63;
pub const DEFAULT_ROUTER_TIMEOUT_S: u32 = 100;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SolicitReason {
    BecomingRouter,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum IdState {
    Free,
    Allocated,
    Reserved { until_s: u32 },
}

struct IdSlot {
    state: IdState,
    last_use_s: u32,
}

/// The Leader's view of router-id allocation. Router id 63 is never
/// represented here — it is permanently excluded from allocation.
pub struct RouterIdTable {
    ids: [IdSlot; NUM_ROUTER_IDS],
    pub sequence: u8,
    pub context_id_reuse_delay_s: u32,
}

impl Default for RouterIdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterIdTable {
    pub fn new() -> Self {
        RouterIdTable {
            ids: core::array::from_fn(|_| IdSlot {
                state: IdState::Free,
                last_use_s: 0,
            }),
            sequence: 0,
            context_id_reuse_delay_s: 48 * 60 * 60,
        }
    }

    /// Handle an `AddressSolicit(BecomingRouter, ...)`. `caller_router_id`
    /// is `Some` if the caller already holds a router id (re-solicit
    /// after a brief disconnection), in which case it is simply
    /// reconfirmed rather than replaced.
    pub fn solicit(
        &mut self,
        caller_router_id: Option<u8>,
        now_s: u32,
    ) -> Result<u8, Error> {
        if let Some(id) = caller_router_id {
            if matches!(self.ids[id as usize].state, IdState::Allocated) {
                self.ids[id as usize].last_use_s = now_s;
                return Ok(id);
            }
        }
        let free = self.ids.iter().enumerate().find_map(|(i, slot)| match slot.state {
            IdState::Free => Some(i as u8),
            IdState::Reserved { until_s } if now_s >= until_s => Some(i as u8),
            _ => None,
        });
        let id = free.ok_or(Error::NoRoute)?;
        self.ids[id as usize].state = IdState::Allocated;
        self.ids[id as usize].last_use_s = now_s;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(id)
    }

    pub fn release(&mut self, router_id: u8, now_s: u32) {
        if let Some(slot) = self.ids.get_mut(router_id as usize) {
            slot.state = IdState::Reserved {
                until_s: now_s + self.context_id_reuse_delay_s,
            };
            self.sequence = self.sequence.wrapping_add(1);
        }
    }

    /// Record that an Advertisement was heard from `router_id`, resetting
    /// its aging clock.
    pub fn note_advertisement(&mut self, router_id: u8, now_s: u32) {
        if let Some(slot) = self.ids.get_mut(router_id as usize) {
            if matches!(slot.state, IdState::Allocated) {
                slot.last_use_s = now_s;
            }
        }
    }

    /// A router id is `unreachable` in the local Route64 if no
    /// Advertisement has been heard within `router_timeout_s`.
    pub fn is_unreachable(&self, router_id: u8, now_s: u32, router_timeout_s: u32) -> bool {
        match self.ids.get(router_id as usize) {
            Some(slot) if matches!(slot.state, IdState::Allocated) => {
                now_s.wrapping_sub(slot.last_use_s) >= router_timeout_s
            }
            _ => false,
        }
    }

    /// If a router has been `unreachable` for `router_id_reuse_delay_s`,
    /// the leader frees its id outright.
    pub fn age_out(&mut self, router_timeout_s: u32, reuse_delay_s: u32, now_s: u32) {
        for (i, slot) in self.ids.iter_mut().enumerate() {
            if matches!(slot.state, IdState::Allocated)
                && now_s.wrapping_sub(slot.last_use_s) >= router_timeout_s + reuse_delay_s
            {
                slot.state = IdState::Reserved {
                    until_s: now_s + reuse_delay_s,
                };
                let _ = i;
            }
        }
    }

    pub fn is_allocated(&self, router_id: u8) -> bool {
        matches!(
            self.ids.get(router_id as usize).map(|s| &s.state),
            Some(IdState::Allocated)
        )
    }

    /// The 63-bit router-id-set bitmap for publication in a Route64 TLV.
    pub fn id_set_bitmap(&self) -> u64 {
        let mut bits = 0u64;
        for (i, slot) in self.ids.iter().enumerate() {
            if matches!(slot.state, IdState::Allocated) {
                bits |= 1 << i;
            }
        }
        bits
    }

    pub fn rloc_for(&self, router_id: u8) -> Option<Rloc16> {
        self.is_allocated(router_id)
            .then(|| Rloc16::from_router_id(router_id))
    }
}
