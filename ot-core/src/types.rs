// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Common wire-level value types shared across the mesh core: addresses,
//! the device mode bitmap, roles and leader data.

use bitflags::bitflags;
use core::fmt;

/// A 16-bit short address: `(router_id << 9) | child_id` per spec.md's
/// resolution of the open question on RLOC16 field widths (9-bit child
/// id, 6-bit router id — not the 10-bit shift some original-source
/// helpers use).
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Default)]
pub struct Rloc16(pub u16);

impl Rloc16 {
    pub const CHILD_ID_BITS: u32 = 9;
    pub const CHILD_ID_MASK: u16 = (1 << Self::CHILD_ID_BITS) - 1;
    /// Router id 63 is reserved and never allocated.
    pub const INVALID_ROUTER_ID: u8 = 63;

    pub fn new(router_id: u8, child_id: u16) -> Self {
        Rloc16(((router_id as u16) << Self::CHILD_ID_BITS) | (child_id & Self::CHILD_ID_MASK))
    }

    pub fn from_router_id(router_id: u8) -> Self {
        Self::new(router_id, 0)
    }

    pub fn router_id(self) -> u8 {
        (self.0 >> Self::CHILD_ID_BITS) as u8
    }

    pub fn child_id(self) -> u16 {
        self.0 & Self::CHILD_ID_MASK
    }

    /// A router's own RLOC16 always has a zero child-id field.
    pub fn is_router_rloc(self) -> bool {
        self.child_id() == 0
    }

    pub fn same_router(self, other: Rloc16) -> bool {
        self.router_id() == other.router_id()
    }
}

impl fmt::Display for Rloc16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// 64-bit IEEE 802.15.4 extended address.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Default)]
pub struct ExtAddr(pub [u8; 8]);

impl ExtAddr {
    /// Derive this device's mesh-local link-local IPv6 IID, per Thread
    /// spec 5.2.2.4 (v1.3.0): the extended address with the
    /// universal/local bit (2nd LSb of the first octet) inverted.
    pub fn to_iid(self) -> [u8; 8] {
        let mut iid = self.0;
        iid[0] ^= 0x02;
        iid
    }

    pub fn from_iid(iid: [u8; 8]) -> Self {
        let mut addr = iid;
        addr[0] ^= 0x02;
        ExtAddr(addr)
    }
}

/// A 16-byte IPv6 address.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Default)]
pub struct Ipv6Addr(pub [u8; 16]);

impl Ipv6Addr {
    pub const UNSPECIFIED: Ipv6Addr = Ipv6Addr([0; 16]);
    pub const REALM_LOCAL_ALL_ROUTERS: Ipv6Addr = Ipv6Addr([
        0xff, 0x03, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x02,
    ]);
    pub const LINK_LOCAL_ALL_NODES: Ipv6Addr = Ipv6Addr([
        0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01,
    ]);

    pub fn link_local_from_ext_addr(ext: ExtAddr) -> Self {
        let mut out = [0u8; 16];
        out[0..8].copy_from_slice(&[0xfe, 0x80, 0, 0, 0, 0, 0, 0]);
        out[8..16].copy_from_slice(&ext.to_iid());
        Ipv6Addr(out)
    }

    pub fn mesh_local_eid(prefix: [u8; 8], iid: [u8; 8]) -> Self {
        let mut out = [0u8; 16];
        out[0..8].copy_from_slice(&prefix);
        out[8..16].copy_from_slice(&iid);
        Ipv6Addr(out)
    }

    pub fn is_multicast(self) -> bool {
        self.0[0] == 0xff
    }

    pub fn iid(self) -> [u8; 8] {
        let mut iid = [0u8; 8];
        iid.copy_from_slice(&self.0[8..16]);
        iid
    }

    /// If this address uses RLOC-based addressing (IID
    /// `0000:00ff:fe00:RLOC16`, Thread spec 5.2.2.3), extract the
    /// RLOC16. Used by the forwarder to recognize a destination that is
    /// already one of our own children without a round-trip through the
    /// address resolver.
    pub fn rloc16_from_iid(self) -> Option<Rloc16> {
        let iid = self.iid();
        if iid[0..6] == [0, 0, 0, 0xff, 0xfe, 0x00] {
            Some(Rloc16(u16::from_be_bytes([iid[6], iid[7]])))
        } else {
            None
        }
    }
}

/// An Endpoint Identifier: a mesh-local IPv6 address naming an end-host,
/// independent of topology.
pub type Eid = Ipv6Addr;

/// 16-bit PAN identifier.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Default)]
pub struct PanId(pub u16);

/// 64-bit Extended PAN ID, a network-wide (not per-device) identifier.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Default)]
pub struct ExtPanId(pub [u8; 8]);

/// Up to 16-byte, UTF-8 network name.
pub type NetworkName = heapless::String<16>;

/// 128-bit Thread network master key.
#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct MasterKey(pub [u8; 16]);

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

bitflags! {
    /// The Mode TLV bitmap (spec.md §3, §4.6): device capability flags
    /// advertised in Parent/Child Request/Update messages.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct DeviceMode: u8 {
        const RX_ON_WHEN_IDLE     = 0b0000_1000;
        const SECURE_DATA_REQUEST = 0b0000_0100;
        const FULL_THREAD_DEVICE  = 0b0000_0010;
        const FULL_NETWORK_DATA   = 0b0000_0001;
    }
}

impl DeviceMode {
    /// An end device is "sleepy" (relies on indirect transmission) when
    /// it does not keep its receiver on when idle.
    pub fn is_sleepy(self) -> bool {
        !self.contains(DeviceMode::RX_ON_WHEN_IDLE)
    }

    pub fn is_full_thread_device(self) -> bool {
        self.contains(DeviceMode::FULL_THREAD_DEVICE)
    }
}

/// Top-level device role (spec.md §4.6).
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum Role {
    #[default]
    Disabled,
    Detached,
    Child,
    Router,
    Leader,
}

impl Role {
    pub fn is_attached(self) -> bool {
        matches!(self, Role::Child | Role::Router | Role::Leader)
    }

    pub fn is_router_or_leader(self) -> bool {
        matches!(self, Role::Router | Role::Leader)
    }

    /// Stable numeric encoding for persistence (spec.md §6 "network-info
    /// ... device role at shutdown").
    pub fn as_u8(self) -> u8 {
        match self {
            Role::Disabled => 0,
            Role::Detached => 1,
            Role::Child => 2,
            Role::Router => 3,
            Role::Leader => 4,
        }
    }

    /// Inverse of [`Self::as_u8`]; an unrecognized value decodes to
    /// `Disabled` rather than failing, matching `init`'s general
    /// best-effort settings restore.
    pub fn from_u8(value: u8) -> Role {
        match value {
            1 => Role::Detached,
            2 => Role::Child,
            3 => Role::Router,
            4 => Role::Leader,
            _ => Role::Disabled,
        }
    }
}

/// Which Parent Responses an attaching device will consider (spec.md
/// §4.6 "Attach filter").
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AttachFilter {
    AnyPartition,
    SamePartition,
    BetterPartition,
}

/// `(partition-id, weighting, data-version, stable-data-version,
/// leader-router-id)`, eventually consistent across a partition via
/// Advertisement propagation.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct LeaderData {
    pub partition_id: u32,
    pub weighting: u8,
    pub data_version: u8,
    pub stable_data_version: u8,
    pub leader_router_id: u8,
}

impl LeaderData {
    /// Partition-comparison order used by leader election and parent
    /// selection: higher weighting wins, ties broken by higher
    /// partition id (spec.md §4.6 "Leader ... elected ... highest
    /// weighting, then lowest router-id, within partition"; across
    /// partitions the tie-break is partition id, per §4.6's merge rule
    /// "partition merge with higher (weighting, partition-id)").
    pub fn is_better_than(self, other: LeaderData) -> bool {
        (self.weighting, self.partition_id) > (other.weighting, other.partition_id)
    }
}

/// Outbound message scheduling class (spec.md §3 Message, §4.4).
#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Debug)]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// Link quality indicator in the range 0..=3 (Thread spec's mapped LQI).
#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Debug, Default)]
pub struct LinkQuality(pub u8);

impl LinkQuality {
    pub fn clamp_new(raw: u8) -> Self {
        LinkQuality(raw.min(3))
    }
}
