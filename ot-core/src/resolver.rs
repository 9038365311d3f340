// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The Address Resolver: EID → RLOC16 cache with a CoAP `a/aq`/`a/an`
//! query/notify protocol and exponential-backoff retry (spec.md §4.5).
//!
//! No teacher counterpart; grounded on spec.md's distillation of
//! `original_source/src/core/thread/address_resolver.cpp`'s cache-state
//! machine, expressed with fixed-capacity `heapless` storage.

use ot_hil::time::Millis;

use crate::types::{Eid, Rloc16};
use crate::Error;

pub const CACHE_CAPACITY: usize = 16;
pub const QUERY_INITIAL_RETRY_DELAY_MS: u32 = 4_000;
pub const QUERY_MAX_RETRY_DELAY_MS: u32 = 28_000;
pub const QUERY_MAX_RETRIES: u8 = 3;
/// How long a `Query` entry is held after its retries are exhausted
/// before a fresh resolution attempt is allowed to restart it, to avoid
/// storms of repeated Address Queries for a target that keeps failing
/// to resolve (spec.md §4.5 "stays in `Query` state for a 'hold-off'
/// period").
pub const QUERY_HOLD_OFF_MS: u32 = 60_000;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CacheState {
    Query,
    Cached,
}

#[derive(Copy, Clone, Debug)]
pub struct CacheEntry {
    pub eid: Eid,
    pub state: CacheState,
    pub rloc16: Rloc16,
    pub ml_eid: Eid,
    pub last_trans_time: u32,
    /// Used only by `Cached` entries, for LRU eviction.
    pub last_used: Millis,
    /// Used only by `Query` entries.
    pub retry_count: u8,
    pub next_retry_at: Millis,
    /// Set once retries are exhausted; the entry stays `Query` but
    /// won't restart resolution until `next_retry_at` (reused here as
    /// the hold-off deadline) has passed.
    pub on_hold: bool,
}

pub struct AddressResolver {
    entries: heapless::Vec<CacheEntry, CACHE_CAPACITY>,
}

impl Default for AddressResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressResolver {
    pub fn new() -> Self {
        AddressResolver {
            entries: heapless::Vec::new(),
        }
    }

    pub fn lookup(&self, eid: Eid) -> Option<Rloc16> {
        self.entries
            .iter()
            .find(|e| e.eid == eid && e.state == CacheState::Cached)
            .map(|e| e.rloc16)
    }

    /// Begin (or continue) resolving `eid`: on a fresh miss, inserts a
    /// `Query` entry (evicting an LRU `Cached` entry if the cache is
    /// full; `Query` entries are never evicted) and returns the initial
    /// retry delay to arm a timer for. An entry still in its
    /// post-exhaustion hold-off (spec.md §4.5) refuses to restart and
    /// returns `Error::AddressQuery` until the hold-off deadline passes.
    pub fn start_query(&mut self, eid: Eid, now: Millis) -> Result<u32, Error> {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.eid == eid) {
            if existing.state == CacheState::Query {
                if existing.on_hold {
                    if !now.has_elapsed(existing.next_retry_at) {
                        return Err(Error::AddressQuery);
                    }
                    existing.on_hold = false;
                    existing.retry_count = 0;
                    existing.next_retry_at = now.wrapping_add(QUERY_INITIAL_RETRY_DELAY_MS);
                }
                return Ok(QUERY_INITIAL_RETRY_DELAY_MS);
            }
        }
        if self.entries.is_full() {
            self.evict_lru_cached()?;
        }
        self.entries
            .push(CacheEntry {
                eid,
                state: CacheState::Query,
                rloc16: Rloc16::default(),
                ml_eid: Eid::default(),
                last_trans_time: 0,
                last_used: now,
                retry_count: 0,
                next_retry_at: now.wrapping_add(QUERY_INITIAL_RETRY_DELAY_MS),
                on_hold: false,
            })
            .map_err(|_| Error::NoBufs)?;
        Ok(QUERY_INITIAL_RETRY_DELAY_MS)
    }

    fn evict_lru_cached(&mut self) -> Result<(), Error> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.state == CacheState::Cached)
            .min_by_key(|(_, e)| e.last_used.0)
            .map(|(i, _)| i)
            .ok_or(Error::NoBufs)?;
        self.entries.swap_remove(idx);
        Ok(())
    }

    /// On retry-timer expiry for a still-`Query` entry: either returns
    /// the next (doubled, capped) delay to re-arm, or `None` once
    /// `QUERY_MAX_RETRIES` is exhausted, in which case the caller should
    /// drop its held message. The entry itself is kept in `Query` state
    /// and put on hold for [`QUERY_HOLD_OFF_MS`] rather than removed, to
    /// avoid a fresh Address Query storm against a target that keeps
    /// failing to resolve.
    pub fn retry_or_expire(&mut self, eid: Eid, now: Millis) -> Option<u32> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.eid == eid && e.state == CacheState::Query)?;
        let entry = &mut self.entries[idx];
        if entry.retry_count >= QUERY_MAX_RETRIES {
            entry.on_hold = true;
            entry.next_retry_at = now.wrapping_add(QUERY_HOLD_OFF_MS);
            return None;
        }
        entry.retry_count += 1;
        let delay = (QUERY_INITIAL_RETRY_DELAY_MS << entry.retry_count).min(QUERY_MAX_RETRY_DELAY_MS);
        entry.next_retry_at = now.wrapping_add(delay);
        Some(delay)
    }

    /// Apply an `Address Notify(target, rloc, last-trans-time, ml-eid)`.
    /// If an entry for `target` already exists in any state, the Notify
    /// with the larger `last_trans_time` wins (ties broken toward the
    /// smaller RLOC16), otherwise it is adopted unconditionally.
    pub fn handle_notify(
        &mut self,
        target: Eid,
        rloc16: Rloc16,
        last_trans_time: u32,
        ml_eid: Eid,
        now: Millis,
    ) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.eid == target) {
            let better = last_trans_time > entry.last_trans_time
                || (last_trans_time == entry.last_trans_time && rloc16.0 < entry.rloc16.0);
            if entry.state == CacheState::Cached && !better {
                return;
            }
            entry.state = CacheState::Cached;
            entry.rloc16 = rloc16;
            entry.ml_eid = ml_eid;
            entry.last_trans_time = last_trans_time;
            entry.last_used = now;
        } else if !self.entries.is_full() {
            let _ = self.entries.push(CacheEntry {
                eid: target,
                state: CacheState::Cached,
                rloc16,
                ml_eid,
                last_trans_time,
                last_used: now,
                retry_count: 0,
                next_retry_at: Millis::ZERO,
                on_hold: false,
            });
        }
    }

    /// `Address Error` invalidates any entry caching `eid`.
    pub fn handle_address_error(&mut self, eid: Eid) {
        self.entries.retain(|e| e.eid != eid);
    }

    /// A router was released: invalidate every cache entry pointing at
    /// it (same router id, any child id).
    pub fn invalidate_router(&mut self, router_rloc16: Rloc16) {
        self.entries
            .retain(|e| !(e.state == CacheState::Cached && e.rloc16.same_router(router_rloc16)));
    }

    pub fn touch(&mut self, eid: Eid, now: Millis) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.eid == eid) {
            entry.last_used = now;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eid(b: u8) -> Eid {
        Eid([b; 16])
    }

    #[test]
    fn query_then_notify_caches_entry() {
        let mut resolver = AddressResolver::new();
        resolver.start_query(eid(1), Millis::ZERO).unwrap();
        assert!(resolver.lookup(eid(1)).is_none());
        resolver.handle_notify(eid(1), Rloc16(0x0400), 5, eid(1), Millis::ZERO);
        assert_eq!(resolver.lookup(eid(1)), Some(Rloc16(0x0400)));
    }

    #[test]
    fn later_transaction_time_wins_notify_race() {
        let mut resolver = AddressResolver::new();
        resolver.handle_notify(eid(1), Rloc16(0x0400), 5, eid(1), Millis::ZERO);
        resolver.handle_notify(eid(1), Rloc16(0x0800), 3, eid(1), Millis::ZERO);
        assert_eq!(resolver.lookup(eid(1)), Some(Rloc16(0x0400)));
        resolver.handle_notify(eid(1), Rloc16(0x0800), 10, eid(1), Millis::ZERO);
        assert_eq!(resolver.lookup(eid(1)), Some(Rloc16(0x0800)));
    }

    #[test]
    fn query_entries_are_never_evicted() {
        let mut resolver = AddressResolver::new();
        resolver.start_query(eid(0), Millis::ZERO).unwrap();
        for i in 1..CACHE_CAPACITY as u8 {
            resolver.handle_notify(eid(i), Rloc16(i as u16), 1, eid(i), Millis::new(i as u32));
        }
        // cache now full with 1 Query + (CACHE_CAPACITY - 1) Cached.
        let result = resolver.start_query(eid(200), Millis::new(1000));
        assert!(result.is_ok());
        assert!(resolver
            .entries
            .iter()
            .any(|e| e.eid == eid(0) && e.state == CacheState::Query));
    }

    #[test]
    fn retry_exhaustion_holds_entry_in_query_state() {
        let mut resolver = AddressResolver::new();
        resolver.start_query(eid(1), Millis::ZERO).unwrap();
        for _ in 0..QUERY_MAX_RETRIES {
            assert!(resolver.retry_or_expire(eid(1), Millis::ZERO).is_some());
        }
        assert!(resolver.retry_or_expire(eid(1), Millis::ZERO).is_none());
        assert_eq!(resolver.len(), 1);
        let entry = resolver.entries.iter().find(|e| e.eid == eid(1)).unwrap();
        assert_eq!(entry.state, CacheState::Query);
        assert!(entry.on_hold);
    }

    #[test]
    fn start_query_refuses_restart_during_hold_off() {
        let mut resolver = AddressResolver::new();
        resolver.start_query(eid(1), Millis::ZERO).unwrap();
        for _ in 0..QUERY_MAX_RETRIES {
            resolver.retry_or_expire(eid(1), Millis::ZERO).unwrap();
        }
        resolver.retry_or_expire(eid(1), Millis::ZERO);
        assert!(matches!(
            resolver.start_query(eid(1), Millis::new(1)),
            Err(Error::AddressQuery)
        ));
    }

    #[test]
    fn start_query_restarts_after_hold_off_elapses() {
        let mut resolver = AddressResolver::new();
        resolver.start_query(eid(1), Millis::ZERO).unwrap();
        for _ in 0..QUERY_MAX_RETRIES {
            resolver.retry_or_expire(eid(1), Millis::ZERO).unwrap();
        }
        resolver.retry_or_expire(eid(1), Millis::ZERO);
        let restart_at = Millis::new(QUERY_HOLD_OFF_MS);
        let result = resolver.start_query(eid(1), restart_at);
        assert_eq!(result, Ok(QUERY_INITIAL_RETRY_DELAY_MS));
        let entry = resolver.entries.iter().find(|e| e.eid == eid(1)).unwrap();
        assert!(!entry.on_hold);
        assert_eq!(entry.retry_count, 0);
    }
}
