// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The Network Data Leader: a TLV-keyed table of on-mesh prefixes,
//! external routes and services, split into stable and unstable
//! sections (spec.md §4.8).
//!
//! No teacher counterpart; grounded on spec.md's distillation of
//! `original_source/src/core/thread/network_data_leader.cpp`'s
//! merge-without-duplicates behavior, expressed with `heapless`
//! fixed-capacity storage per this crate's no_std/no-alloc convention.

use crate::types::ExtPanId;
use crate::Error;

pub const MAX_ENTRIES: usize = 32;

bitflags::bitflags! {
    /// Border Router entry flags (spec.md §4.8).
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct BorderRouterFlags: u8 {
        const PREFERRED     = 0b0100_0000;
        const SLAAC         = 0b0010_0000;
        const DHCP          = 0b0001_0000;
        const CONFIGURE     = 0b0000_1000;
        const DEFAULT_ROUTE  = 0b0000_0100;
        const ON_MESH        = 0b0000_0010;
        const STABLE         = 0b0000_0001;
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PrefixEntry {
    pub prefix: [u8; 8],
    pub prefix_len: u8,
    pub rloc16: crate::types::Rloc16,
    pub flags: BorderRouterFlags,
    pub context_id: Option<u8>,
}

#[derive(Default)]
pub struct NetworkDataLeader {
    stable: heapless::Vec<PrefixEntry, MAX_ENTRIES>,
    unstable: heapless::Vec<PrefixEntry, MAX_ENTRIES>,
    pub stable_version: u8,
    pub data_version: u8,
    context_id_reservations: heapless::Vec<(u8, u32), 16>,
    pub context_id_reuse_delay_s: u32,
}

impl NetworkDataLeader {
    pub fn new() -> Self {
        NetworkDataLeader {
            context_id_reuse_delay_s: 48 * 60 * 60,
            ..Default::default()
        }
    }

    pub fn get_stable(&self) -> &[PrefixEntry] {
        &self.stable
    }

    pub fn get_full(&self) -> impl Iterator<Item = &PrefixEntry> {
        self.stable.iter().chain(self.unstable.iter())
    }

    /// Apply a `Server Data Notification`: merge `entries` in without
    /// duplicating an identical `(prefix, rloc16, flags)` tuple.
    /// Applying the same notification twice in a row is a no-op and
    /// leaves both version counters unchanged on the second pass.
    pub fn register_server_data(&mut self, entries: &[PrefixEntry]) -> Result<(), Error> {
        let mut stable_changed = false;
        let mut unstable_changed = false;
        for entry in entries {
            let target = if entry.flags.contains(BorderRouterFlags::STABLE) {
                &mut self.stable
            } else {
                &mut self.unstable
            };
            if target.iter().any(|e| e == entry) {
                continue;
            }
            target.push(*entry).map_err(|_| Error::NoBufs)?;
            if entry.flags.contains(BorderRouterFlags::STABLE) {
                stable_changed = true;
            } else {
                unstable_changed = true;
            }
        }
        if stable_changed {
            self.stable_version = self.stable_version.wrapping_add(1);
        }
        if stable_changed || unstable_changed {
            self.data_version = self.data_version.wrapping_add(1);
        }
        Ok(())
    }

    /// Remove every entry published by `rloc16` (its router released or
    /// its on-mesh prefix withdrawn), reserving any context ids it held.
    pub fn remove_by_rloc(&mut self, rloc16: crate::types::Rloc16, now_s: u32) {
        let mut removed_stable = false;
        let mut released_contexts: heapless::Vec<u8, MAX_ENTRIES> = heapless::Vec::new();

        let mut i = 0;
        while i < self.stable.len() {
            if self.stable[i].rloc16 == rloc16 {
                let entry = self.stable.swap_remove(i);
                if let Some(ctx) = entry.context_id {
                    let _ = released_contexts.push(ctx);
                }
                removed_stable = true;
            } else {
                i += 1;
            }
        }
        let mut i = 0;
        while i < self.unstable.len() {
            if self.unstable[i].rloc16 == rloc16 {
                let entry = self.unstable.swap_remove(i);
                if let Some(ctx) = entry.context_id {
                    let _ = released_contexts.push(ctx);
                }
            } else {
                i += 1;
            }
        }

        for ctx in released_contexts {
            let _ = self
                .context_id_reservations
                .push((ctx, now_s + self.context_id_reuse_delay_s));
        }
        if removed_stable {
            self.stable_version = self.stable_version.wrapping_add(1);
        }
        self.data_version = self.data_version.wrapping_add(1);
    }

    pub fn is_context_id_reserved(&self, context_id: u8, now_s: u32) -> bool {
        self.context_id_reservations
            .iter()
            .any(|(id, until)| *id == context_id && now_s < *until)
    }

    pub fn domain_prefix(&self) -> Option<&PrefixEntry> {
        self.stable
            .iter()
            .chain(self.unstable.iter())
            .find(|e| e.flags.contains(BorderRouterFlags::DEFAULT_ROUTE))
    }
}

/// The Backbone Router service TLV payload a Primary BBR publishes
/// alongside its Domain Prefix (spec.md §4.9).
#[derive(Copy, Clone, Debug)]
pub struct BackboneRouterService {
    pub seq_number: u8,
    pub reregistration_delay_s: u16,
    pub mlr_timeout_s: u32,
}

pub fn ext_pan_id_from_bytes(bytes: [u8; 8]) -> ExtPanId {
    ExtPanId(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rloc16;

    fn entry(rloc: u16, stable: bool) -> PrefixEntry {
        PrefixEntry {
            prefix: [0xfd, 0, 0, 0, 0, 0, 0, 0],
            prefix_len: 64,
            rloc16: Rloc16(rloc),
            flags: if stable {
                BorderRouterFlags::STABLE | BorderRouterFlags::ON_MESH
            } else {
                BorderRouterFlags::ON_MESH
            },
            context_id: None,
        }
    }

    #[test]
    fn duplicate_notification_is_idempotent() {
        let mut leader = NetworkDataLeader::new();
        leader.register_server_data(&[entry(0x0400, true)]).unwrap();
        let (sv, dv) = (leader.stable_version, leader.data_version);
        leader.register_server_data(&[entry(0x0400, true)]).unwrap();
        assert_eq!(leader.stable_version, sv);
        assert_eq!(leader.data_version, dv);
    }

    #[test]
    fn unstable_entries_do_not_bump_stable_version() {
        let mut leader = NetworkDataLeader::new();
        let sv = leader.stable_version;
        leader.register_server_data(&[entry(0x0400, false)]).unwrap();
        assert_eq!(leader.stable_version, sv);
        assert!(leader.data_version > 0);
    }

    #[test]
    fn remove_by_rloc_clears_entries() {
        let mut leader = NetworkDataLeader::new();
        leader.register_server_data(&[entry(0x0400, true)]).unwrap();
        leader.remove_by_rloc(Rloc16(0x0400), 0);
        assert!(leader.get_stable().is_empty());
    }
}
