// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The message pool: a fixed-capacity arena of IPv6 datagram buffers
//! addressed by a stable [`MessageId`], replacing the teacher's
//! `&'static mut [u8]`-ownership-transfer convention (spec.md Design
//! Notes §9) with index-based borrowing so the pool itself, not a
//! passed-around reference, owns every buffer.
//!
//! Modeled on `capsules/extra/src/net/thread/thread_utils.rs`'s framing
//! helpers and on Tock's general buffer-pool idiom, but the ownership
//! model is the arena+index one spec.md prescribes rather than a single
//! `&'static mut` slab.

use crate::types::{Eid, Priority};
use crate::Error;

pub const MAX_PAYLOAD: usize = 1280;
pub const POOL_CAPACITY: usize = 16;

/// A handle naming a message in the pool. Stable across pool
/// compaction; becomes invalid once [`MessagePool::free`] is called.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct MessageId(pub u16);

/// Per-datagram metadata carried alongside the payload bytes:
/// queue-selection and retry bookkeeping for the mesh forwarder and
/// indirect-transmission queue.
#[derive(Copy, Clone, Debug)]
pub struct MessageMeta {
    pub priority: Priority,
    pub source: Eid,
    pub destination: Eid,
    /// Set once a fragmentation header has been assigned, so repeated
    /// fragment sends reuse the same datagram tag.
    pub datagram_tag: Option<u16>,
    /// Indirect-transmission attempts so far, against
    /// `CHILD_SUPERVISION`/`MAX_INDIRECT_RETRIES`-style caps.
    pub send_attempts: u8,
    /// Set when this message is queued for indirect transmission to a
    /// specific sleepy child, awaiting a data poll.
    pub pending_child: Option<crate::neighbor::NeighborIndex>,
}

impl MessageMeta {
    pub fn new(priority: Priority, source: Eid, destination: Eid) -> Self {
        MessageMeta {
            priority,
            source,
            destination,
            datagram_tag: None,
            send_attempts: 0,
            pending_child: None,
        }
    }
}

struct Slot {
    meta: MessageMeta,
    len: usize,
    buf: [u8; MAX_PAYLOAD],
}

/// A fixed-capacity pool of in-flight IPv6 datagrams.
pub struct MessagePool {
    slots: heapless::Vec<Option<Slot>, POOL_CAPACITY>,
    next_tag: u16,
}

impl Default for MessagePool {
    fn default() -> Self {
        Self::new()
    }
}

impl MessagePool {
    pub fn new() -> Self {
        let mut slots = heapless::Vec::new();
        for _ in 0..POOL_CAPACITY {
            let _ = slots.push(None);
        }
        MessagePool {
            slots,
            next_tag: 0,
        }
    }

    /// Allocate a slot for `payload`, copying it in. Fails with
    /// `Error::NoBufs` if the pool is full or the payload exceeds
    /// [`MAX_PAYLOAD`].
    pub fn allocate(&mut self, payload: &[u8], meta: MessageMeta) -> Result<MessageId, Error> {
        if payload.len() > MAX_PAYLOAD {
            return Err(Error::InvalidArgs);
        }
        let idx = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(Error::NoBufs)?;
        let mut buf = [0u8; MAX_PAYLOAD];
        buf[..payload.len()].copy_from_slice(payload);
        self.slots[idx] = Some(Slot {
            meta,
            len: payload.len(),
            buf,
        });
        Ok(MessageId(idx as u16))
    }

    pub fn free(&mut self, id: MessageId) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            *slot = None;
        }
    }

    pub fn payload(&self, id: MessageId) -> Option<&[u8]> {
        self.slots
            .get(id.0 as usize)?
            .as_ref()
            .map(|s| &s.buf[..s.len])
    }

    pub fn meta(&self, id: MessageId) -> Option<&MessageMeta> {
        self.slots.get(id.0 as usize)?.as_ref().map(|s| &s.meta)
    }

    pub fn meta_mut(&mut self, id: MessageId) -> Option<&mut MessageMeta> {
        self.slots.get_mut(id.0 as usize)?.as_mut().map(|s| &mut s.meta)
    }

    /// Assign (or return the already-assigned) fragmentation datagram
    /// tag for a message.
    pub fn datagram_tag(&mut self, id: MessageId) -> Option<u16> {
        let tag = self.next_tag;
        let meta = self.meta_mut(id)?;
        if let Some(existing) = meta.datagram_tag {
            return Some(existing);
        }
        meta.datagram_tag = Some(tag);
        self.next_tag = self.next_tag.wrapping_add(1);
        Some(tag)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate live message ids, for the forwarder's queue scans.
    pub fn ids(&self) -> impl Iterator<Item = MessageId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.is_some().then_some(MessageId(i as u16)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Ipv6Addr;

    #[test]
    fn allocate_and_read_back() {
        let mut pool = MessagePool::new();
        let meta = MessageMeta::new(
            Priority::Normal,
            Ipv6Addr::UNSPECIFIED,
            Ipv6Addr::UNSPECIFIED,
        );
        let id = pool.allocate(&[1, 2, 3], meta).unwrap();
        assert_eq!(pool.payload(id), Some(&[1u8, 2, 3][..]));
        pool.free(id);
        assert_eq!(pool.payload(id), None);
    }

    #[test]
    fn pool_exhaustion_returns_nobufs() {
        let mut pool = MessagePool::new();
        let meta = MessageMeta::new(
            Priority::Normal,
            Ipv6Addr::UNSPECIFIED,
            Ipv6Addr::UNSPECIFIED,
        );
        for _ in 0..POOL_CAPACITY {
            pool.allocate(&[0], meta).unwrap();
        }
        assert_eq!(pool.allocate(&[0], meta), Err(Error::NoBufs));
    }

    #[test]
    fn datagram_tag_is_stable() {
        let mut pool = MessagePool::new();
        let meta = MessageMeta::new(
            Priority::Normal,
            Ipv6Addr::UNSPECIFIED,
            Ipv6Addr::UNSPECIFIED,
        );
        let id = pool.allocate(&[0], meta).unwrap();
        let tag1 = pool.datagram_tag(id).unwrap();
        let tag2 = pool.datagram_tag(id).unwrap();
        assert_eq!(tag1, tag2);
    }
}
