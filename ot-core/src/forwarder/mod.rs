// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The Mesh Forwarder: the send queue, per-child indirect queues, the
//! reassembly set and the resolving queue (spec.md §4.4).
//!
//! No teacher counterpart; the queue-discipline and next-hop-selection
//! logic follow spec.md §4.4 directly, built on this crate's arena
//! (`MessagePool`) and index (`NeighborTable`) primitives rather than
//! the teacher's buffer-ownership-transfer convention.

pub mod fragmentation;

use crate::message::{MessageId, MessagePool};
use crate::neighbor::{NeighborIndex, NeighborKind, NeighborTable};
use crate::types::{Priority, Rloc16};
use crate::Error;

pub use fragmentation::{FragmentHeader, MeshHeader, ReassemblySets};

/// Outbound queues never hold less than this many free message-pool
/// slots in reserve for high-priority (MLE control, supervision)
/// traffic (spec.md §4.4 "Backpressure").
pub const RESERVED_HIGH_PRIORITY_SLOTS: usize = 2;
pub const MAX_INDIRECT_RETRIES: u8 = 3;
pub const MAX_QUEUE_LEN: usize = 32;

/// Where a message is deliverable next.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum NextHop {
    /// We are the destination; deliver to the upper (application) layer.
    Local,
    /// Forward directly to this neighbor.
    Neighbor(NeighborIndex),
    /// Flood via MPL to this multicast scope.
    Multicast,
    /// No cached route; an Address Query must be issued first.
    NeedsResolution,
}

pub struct MeshForwarder {
    send_queue: heapless::Deque<MessageId, MAX_QUEUE_LEN>,
    resolving_queue: heapless::Vec<MessageId, MAX_QUEUE_LEN>,
    pub reassembly: ReassemblySets,
    our_rloc16: Rloc16,
}

impl MeshForwarder {
    pub fn new(our_rloc16: Rloc16) -> Self {
        MeshForwarder {
            send_queue: heapless::Deque::new(),
            resolving_queue: heapless::Vec::new(),
            reassembly: ReassemblySets::new(),
            our_rloc16,
        }
    }

    pub fn set_our_rloc16(&mut self, rloc16: Rloc16) {
        self.our_rloc16 = rloc16;
    }

    /// `send_message`: place `msg` on the send queue, or divert it to a
    /// sleepy child's indirect queue if the destination is one of ours.
    /// Rejects `Priority::Low` sends with `NoBufs` once the pool is down
    /// to the reserved high-priority floor; `Priority::High` is always
    /// admitted if the pool has any space at all.
    pub fn send_message(
        &mut self,
        msg: MessageId,
        priority: Priority,
        pool: &mut MessagePool,
        neighbors: &mut NeighborTable,
    ) -> Result<(), Error> {
        let free = crate::message::POOL_CAPACITY.saturating_sub(pool.len());
        if priority == Priority::Low && free <= RESERVED_HIGH_PRIORITY_SLOTS {
            return Err(Error::NoBufs);
        }
        let destination = pool.meta(msg).ok_or(Error::NotFound)?.destination;
        if let Some(child_idx) = self.sleepy_child_destination(destination, neighbors) {
            return self.enqueue_indirect(msg, child_idx, neighbors, pool);
        }
        self.send_queue.push_back(msg).map_err(|_| Error::NoBufs)
    }

    /// Recognize an RLOC-addressed destination (spec.md §3 EID, Thread
    /// RLOC-based IID) that names one of our own sleepy children,
    /// without a round-trip through the address resolver. A destination
    /// using a non-RLOC (ML-EID/random) IID is not recognized here; the
    /// caller resolves those via the address cache before calling
    /// `send_message`.
    fn sleepy_child_destination(
        &self,
        destination_eid: crate::types::Eid,
        neighbors: &NeighborTable,
    ) -> Option<NeighborIndex> {
        let rloc16 = destination_eid.rloc16_from_iid()?;
        let idx = neighbors.find_by_rloc16(rloc16)?;
        match neighbors.get(idx)?.kind {
            NeighborKind::Child(_) => Some(idx),
            NeighborKind::Router(_) => None,
        }
    }

    /// Tag `msg` as belonging to `child`'s indirect queue (spec.md §4.4
    /// "Indirect transmission") and place it on the shared send queue;
    /// [`Self::pop_indirect_for_child`] and [`Self::has_indirect_pending`]
    /// filter by that tag so each sleepy child is served its own
    /// messages in its own FIFO order, at most one in flight at a time.
    pub fn enqueue_indirect(
        &mut self,
        msg: MessageId,
        child: NeighborIndex,
        neighbors: &mut NeighborTable,
        pool: &mut MessagePool,
    ) -> Result<(), Error> {
        let record = neighbors.get_mut(child).ok_or(Error::NotFound)?;
        match &mut record.kind {
            NeighborKind::Child(_) => {
                pool.meta_mut(msg).ok_or(Error::NotFound)?.pending_child = Some(child);
                self.send_queue.push_back(msg).map_err(|_| Error::NoBufs)
            }
            NeighborKind::Router(_) => Err(Error::InvalidArgs),
        }
    }

    /// Pop the head of `child`'s indirect queue (FIFO among messages
    /// tagged for this child), leaving every other message's order
    /// undisturbed. Called when the child sends a Data Request.
    pub fn pop_indirect_for_child(
        &mut self,
        child: NeighborIndex,
        pool: &MessagePool,
    ) -> Option<MessageId> {
        let mut found = None;
        for _ in 0..self.send_queue.len() {
            let id = self.send_queue.pop_front()?;
            if found.is_none() && pool.meta(id).and_then(|m| m.pending_child) == Some(child) {
                found = Some(id);
            } else {
                let _ = self.send_queue.push_back(id);
            }
        }
        found
    }

    /// Whether `child`'s indirect queue is non-empty, i.e. whether the
    /// frame-pending bit should be set in the next frame the MAC sends
    /// it (spec.md §4.4).
    pub fn has_indirect_pending(&self, child: NeighborIndex, pool: &MessagePool) -> bool {
        self.send_queue
            .iter()
            .any(|&id| pool.meta(id).and_then(|m| m.pending_child) == Some(child))
    }

    /// `resolve_then_send`: park `msg` in the resolving queue; the
    /// caller is expected to have already kicked off an Address Query.
    pub fn resolve_then_send(&mut self, msg: MessageId) -> Result<(), Error> {
        self.resolving_queue.push(msg).map_err(|_| Error::NoBufs)
    }

    /// Release every message waiting on `eid`'s resolution once a Notify
    /// arrives, moving them to the send queue.
    pub fn release_resolved(&mut self, resolved: &[MessageId]) {
        for &id in resolved {
            if let Some(pos) = self.resolving_queue.iter().position(|m| *m == id) {
                self.resolving_queue.swap_remove(pos);
                let _ = self.send_queue.push_back(id);
            }
        }
    }

    /// Drop every message still parked for `ids` on query exhaustion;
    /// returns how many were dropped so the caller can free them from
    /// the pool.
    pub fn drop_unresolved(&mut self, ids: &[MessageId]) -> usize {
        let before = self.resolving_queue.len();
        self.resolving_queue.retain(|id| !ids.contains(id));
        before - self.resolving_queue.len()
    }

    /// Pop the highest-priority message in the queue, oldest first among
    /// equal priorities (spec.md §4.4 "ordered by priority then enqueue
    /// order"; §5 "higher-priority messages overtake lower-priority
    /// ones"). Scans the whole queue rather than popping blindly since
    /// `heapless::Deque` has no arbitrary-position removal, the same
    /// rebuild-in-place technique [`Self::pop_indirect_for_child`] uses.
    pub fn pop_send_queue(&mut self, pool: &MessagePool) -> Option<MessageId> {
        let best_priority = self
            .send_queue
            .iter()
            .filter_map(|&id| pool.meta(id).map(|m| m.priority))
            .max()?;
        let mut found = None;
        for _ in 0..self.send_queue.len() {
            let id = self.send_queue.pop_front()?;
            if found.is_none()
                && pool.meta(id).map(|m| m.priority) == Some(best_priority)
            {
                found = Some(id);
            } else {
                let _ = self.send_queue.push_back(id);
            }
        }
        found
    }

    pub fn send_queue_len(&self) -> usize {
        self.send_queue.len()
    }

    /// Next-hop selection for an IPv6 destination already resolved to
    /// `dest_rloc16` (step (a)/(b) of spec.md §4.4's four-way split;
    /// multicast and unresolved cases are decided by the caller before
    /// reaching here, since they don't need a cached RLOC at all).
    pub fn next_hop(&self, dest_rloc16: Rloc16, neighbors: &NeighborTable) -> NextHop {
        if dest_rloc16 == self.our_rloc16 {
            return NextHop::Local;
        }
        match neighbors.find_by_rloc16(dest_rloc16) {
            Some(idx) => NextHop::Neighbor(idx),
            None => NextHop::NeedsResolution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageMeta;
    use crate::neighbor::{NeighborRecord, NeighborState};
    use crate::types::{DeviceMode, ExtAddr, Ipv6Addr, LinkQuality};

    #[test]
    fn queue_is_fifo() {
        let mut pool = MessagePool::new();
        let mut neighbors = NeighborTable::new();
        let mut forwarder = MeshForwarder::new(Rloc16::from_router_id(1));
        let meta = MessageMeta::new(Priority::Normal, Ipv6Addr::UNSPECIFIED, Ipv6Addr::UNSPECIFIED);
        let a = pool.allocate(&[1], meta).unwrap();
        let b = pool.allocate(&[2], meta).unwrap();
        forwarder.send_message(a, Priority::Normal, &mut pool, &mut neighbors).unwrap();
        forwarder.send_message(b, Priority::Normal, &mut pool, &mut neighbors).unwrap();
        assert_eq!(forwarder.pop_send_queue(&pool), Some(a));
        assert_eq!(forwarder.pop_send_queue(&pool), Some(b));
    }

    #[test]
    fn high_priority_overtakes_queued_low_priority() {
        let mut pool = MessagePool::new();
        let mut neighbors = NeighborTable::new();
        let mut forwarder = MeshForwarder::new(Rloc16::from_router_id(1));
        let low = MessageMeta::new(Priority::Low, Ipv6Addr::UNSPECIFIED, Ipv6Addr::UNSPECIFIED);
        let high = MessageMeta::new(Priority::High, Ipv6Addr::UNSPECIFIED, Ipv6Addr::UNSPECIFIED);
        let a = pool.allocate(&[1], low).unwrap();
        let b = pool.allocate(&[2], low).unwrap();
        let urgent = pool.allocate(&[3], high).unwrap();
        forwarder.send_message(a, Priority::Low, &mut pool, &mut neighbors).unwrap();
        forwarder.send_message(b, Priority::Low, &mut pool, &mut neighbors).unwrap();
        forwarder.send_message(urgent, Priority::High, &mut pool, &mut neighbors).unwrap();
        // High priority overtakes both already-queued Low sends; the two
        // Low sends keep their relative FIFO order behind it.
        assert_eq!(forwarder.pop_send_queue(&pool), Some(urgent));
        assert_eq!(forwarder.pop_send_queue(&pool), Some(a));
        assert_eq!(forwarder.pop_send_queue(&pool), Some(b));
    }

    #[test]
    fn next_hop_resolves_local_and_neighbor() {
        let mut neighbors = NeighborTable::new();
        let our_rloc = Rloc16::from_router_id(1);
        let forwarder = MeshForwarder::new(our_rloc);
        assert_eq!(forwarder.next_hop(our_rloc, &neighbors), NextHop::Local);

        let other = Rloc16::from_router_id(2);
        let idx = neighbors
            .insert(NeighborRecord {
                ext_addr: ExtAddr([2; 8]),
                rloc16: other,
                mode: DeviceMode::empty(),
                state: NeighborState::Valid,
                link_quality: LinkQuality(3),
                link_frame_counter: 0,
                mle_frame_counter: 0,
                kind: NeighborKind::Router(crate::neighbor::RouterInfo {
                    link_margin: 255,
                    cost_to_leader: 1,
                }),
            })
            .unwrap();
        assert_eq!(forwarder.next_hop(other, &neighbors), NextHop::Neighbor(idx));
        assert_eq!(
            forwarder.next_hop(Rloc16::from_router_id(9), &neighbors),
            NextHop::NeedsResolution
        );
    }

    #[test]
    fn resolving_queue_releases_on_notify() {
        let mut pool = MessagePool::new();
        let mut forwarder = MeshForwarder::new(Rloc16::from_router_id(1));
        let meta = MessageMeta::new(Priority::Normal, Ipv6Addr::UNSPECIFIED, Ipv6Addr::UNSPECIFIED);
        let msg = pool.allocate(&[1], meta).unwrap();
        forwarder.resolve_then_send(msg).unwrap();
        assert_eq!(forwarder.send_queue_len(), 0);
        forwarder.release_resolved(&[msg]);
        assert_eq!(forwarder.pop_send_queue(&pool), Some(msg));
    }

    #[test]
    fn indirect_enqueue_rejects_router_neighbor() {
        let mut neighbors = NeighborTable::new();
        let mut pool = MessagePool::new();
        let mut forwarder = MeshForwarder::new(Rloc16::from_router_id(1));
        let meta = MessageMeta::new(Priority::Normal, Ipv6Addr::UNSPECIFIED, Ipv6Addr::UNSPECIFIED);
        let msg = pool.allocate(&[1], meta).unwrap();
        let idx = neighbors
            .insert(NeighborRecord {
                ext_addr: ExtAddr([3; 8]),
                rloc16: Rloc16::from_router_id(2),
                mode: DeviceMode::empty(),
                state: NeighborState::Valid,
                link_quality: LinkQuality(3),
                link_frame_counter: 0,
                mle_frame_counter: 0,
                kind: NeighborKind::Router(crate::neighbor::RouterInfo {
                    link_margin: 255,
                    cost_to_leader: 1,
                }),
            })
            .unwrap();
        assert_eq!(
            forwarder.enqueue_indirect(msg, idx, &mut neighbors, &mut pool),
            Err(Error::InvalidArgs)
        );
    }

    #[test]
    fn indirect_queues_are_isolated_per_child() {
        let mut neighbors = NeighborTable::new();
        let mut pool = MessagePool::new();
        let mut forwarder = MeshForwarder::new(Rloc16::from_router_id(1));
        let meta = MessageMeta::new(Priority::Normal, Ipv6Addr::UNSPECIFIED, Ipv6Addr::UNSPECIFIED);

        let make_child = |neighbors: &mut NeighborTable, ext: u8, child_id: u16| {
            neighbors
                .insert(NeighborRecord {
                    ext_addr: ExtAddr([ext; 8]),
                    rloc16: Rloc16::new(1, child_id),
                    mode: DeviceMode::empty(),
                    state: NeighborState::Valid,
                    link_quality: LinkQuality(3),
                    link_frame_counter: 0,
                    mle_frame_counter: 0,
                    kind: NeighborKind::Child(crate::neighbor::ChildInfo {
                        timeout_s: 240,
                        csl_poll_period_ms: None,
                        last_heard_ms: 0,
                        supervision_interval_s: 129,
                        ms_since_supervision_s: 0,
                    }),
                })
                .unwrap()
        };
        let child_a = make_child(&mut neighbors, 1, 1);
        let child_b = make_child(&mut neighbors, 2, 2);

        let a1 = pool.allocate(&[1], meta).unwrap();
        let b1 = pool.allocate(&[2], meta).unwrap();
        let a2 = pool.allocate(&[3], meta).unwrap();
        forwarder.enqueue_indirect(a1, child_a, &mut neighbors, &mut pool).unwrap();
        forwarder.enqueue_indirect(b1, child_b, &mut neighbors, &mut pool).unwrap();
        forwarder.enqueue_indirect(a2, child_a, &mut neighbors, &mut pool).unwrap();

        assert!(forwarder.has_indirect_pending(child_a, &pool));
        assert!(forwarder.has_indirect_pending(child_b, &pool));

        // Child B polls first: only its own frame comes back, child A's
        // two frames are undisturbed and still in FIFO order.
        assert_eq!(forwarder.pop_indirect_for_child(child_b, &pool), Some(b1));
        assert!(!forwarder.has_indirect_pending(child_b, &pool));
        assert_eq!(forwarder.pop_indirect_for_child(child_a, &pool), Some(a1));
        assert_eq!(forwarder.pop_indirect_for_child(child_a, &pool), Some(a2));
        assert!(!forwarder.has_indirect_pending(child_a, &pool));
    }
}
