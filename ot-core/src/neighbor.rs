// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The neighbor table: a fixed-capacity arena of link-layer peers (the
//! device's parent, its children, and its router neighbors), addressed
//! by stable [`NeighborIndex`] rather than by pointer — the arena+index
//! model spec.md Design Notes §9 prescribes in place of Tock's
//! `&'static` peer-record convention.
//!
//! Grounded on `capsules/extra/src/net/thread/thread_utils.rs`'s child
//! table bookkeeping and on `original_source/src/core/thread/
//! child_table.cpp`'s/`neighbor_table.cpp`'s combined child+router
//! table, here unified into one arena since both kinds of neighbor
//! share the same link-quality/frame-counter/state-machine bookkeeping.

use crate::types::{DeviceMode, ExtAddr, LinkQuality, Rloc16};

pub const MAX_NEIGHBORS: usize = 32;

/// Per-neighbor attach/link state, independent of whether the neighbor
/// is a child or a router.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum NeighborState {
    /// Link Request/Accept in progress, not yet usable for data.
    LinkRequest,
    /// Parent/Child Request/Response in progress.
    Attaching,
    /// Fully attached and usable for unicast data.
    Valid,
    /// Child has not responded to supervision/polls within the timeout
    /// and is eligible for removal (spec.md §4.6 "Supervision (ADDED)").
    Restored,
    /// Pending removal once in-flight indirect messages drain.
    ChildUpdateRequest,
}

/// A child neighbor, for devices acting as parent.
#[derive(Copy, Clone, Debug)]
pub struct ChildInfo {
    pub timeout_s: u32,
    pub csl_poll_period_ms: Option<u32>,
    /// Milliseconds since this child's last supervision-resetting
    /// contact (data poll, Child Update Response, or any received
    /// frame), compared against `timeout_s * 1000`.
    pub last_heard_ms: u32,
    /// Last supervision message's frame counter, for the
    /// `SupervisionListener` duplicate-detection spec.md describes.
    pub supervision_interval_s: u32,
    pub ms_since_supervision_s: u32,
}

/// A router neighbor, for devices acting as router or leader.
#[derive(Copy, Clone, Debug)]
pub struct RouterInfo {
    pub link_margin: u8,
    pub cost_to_leader: u8,
}

#[derive(Copy, Clone, Debug)]
pub enum NeighborKind {
    Child(ChildInfo),
    Router(RouterInfo),
}

#[derive(Copy, Clone, Debug)]
pub struct NeighborRecord {
    pub ext_addr: ExtAddr,
    pub rloc16: Rloc16,
    pub mode: DeviceMode,
    pub state: NeighborState,
    pub link_quality: LinkQuality,
    pub link_frame_counter: u32,
    pub mle_frame_counter: u32,
    pub kind: NeighborKind,
}

/// A stable handle into the neighbor arena. Invalidated by
/// [`NeighborTable::remove`].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct NeighborIndex(pub u8);

pub struct NeighborTable {
    slots: heapless::Vec<Option<NeighborRecord>, MAX_NEIGHBORS>,
}

impl Default for NeighborTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NeighborTable {
    pub fn new() -> Self {
        let mut slots = heapless::Vec::new();
        for _ in 0..MAX_NEIGHBORS {
            let _ = slots.push(None);
        }
        NeighborTable { slots }
    }

    pub fn insert(&mut self, record: NeighborRecord) -> Option<NeighborIndex> {
        let idx = self.slots.iter().position(|s| s.is_none())?;
        self.slots[idx] = Some(record);
        Some(NeighborIndex(idx as u8))
    }

    pub fn remove(&mut self, idx: NeighborIndex) {
        if let Some(slot) = self.slots.get_mut(idx.0 as usize) {
            *slot = None;
        }
    }

    pub fn get(&self, idx: NeighborIndex) -> Option<&NeighborRecord> {
        self.slots.get(idx.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, idx: NeighborIndex) -> Option<&mut NeighborRecord> {
        self.slots.get_mut(idx.0 as usize)?.as_mut()
    }

    pub fn find_by_ext_addr(&self, ext_addr: ExtAddr) -> Option<NeighborIndex> {
        self.slots.iter().enumerate().find_map(|(i, s)| {
            s.as_ref()
                .filter(|r| r.ext_addr == ext_addr)
                .map(|_| NeighborIndex(i as u8))
        })
    }

    pub fn find_by_rloc16(&self, rloc16: Rloc16) -> Option<NeighborIndex> {
        self.slots.iter().enumerate().find_map(|(i, s)| {
            s.as_ref()
                .filter(|r| r.rloc16 == rloc16)
                .map(|_| NeighborIndex(i as u8))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (NeighborIndex, &NeighborRecord)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|r| (NeighborIndex(i as u8), r)))
    }

    pub fn iter_children(&self) -> impl Iterator<Item = (NeighborIndex, &NeighborRecord, &ChildInfo)> {
        self.iter().filter_map(|(i, r)| match &r.kind {
            NeighborKind::Child(c) => Some((i, r, c)),
            NeighborKind::Router(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.slots.len()
    }
}
