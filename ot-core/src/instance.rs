// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `Instance`: the single value owning the whole mesh stack, replacing
//! the teacher's file-static `sInstance`/callback-context pattern
//! (spec.md Design Notes §9 "Global singletons ... the systems-language
//! version should expose an `Instance` value that owns the stack").
//!
//! This is the integration surface spec.md §6 exposes upward to a CLI,
//! NCP, or application: lifecycle, link, Thread and FTD-only accessors,
//! plus a polled change-flags queue in place of the teacher's single
//! registered callback (this crate has no heap-allocated trait object
//! story under `no_std`, and the cooperative scheduler already requires
//! callers to poll rather than block).

use bitflags::bitflags;
use log::{debug, info, warn};

use ot_hil::radio::Radio;
use ot_hil::rng::Entropy32;
use ot_hil::settings::{SettingsKey, SettingsStore, MAX_SETTING_LEN};
use ot_hil::symmetric_encryption::Aes128Ccm;
use ot_hil::time::{Alarm, Millis};

use crate::backbone::BackboneAgent;
use crate::forwarder::MeshForwarder;
use crate::key_manager::KeyManager;
use crate::mac::Mac;
use crate::mle::{Mle, MleAction};
use crate::message::MessagePool;
use crate::neighbor::NeighborTable;
use crate::network_data::NetworkDataLeader;
use crate::resolver::AddressResolver;
use crate::router_table::RouterIdTable;
use crate::scheduler::Scheduler;
use crate::types::{DeviceMode, ExtAddr, ExtPanId, MasterKey, NetworkName, PanId, Rloc16, Role};
use crate::Error;

/// Layout of the `NETWORK_INFO` settings record: master key (16 bytes),
/// role (1 byte), RLOC16 (2 bytes LE), extended address (8 bytes), key
/// sequence (4 bytes LE), MAC frame counter (4 bytes LE), MLE frame
/// counter (4 bytes LE) — the subset of spec.md §6's persisted
/// "network-info" this crate keeps (parent-info/child-info records are
/// not yet written).
const NETWORK_INFO_LEN: usize = 16 + 1 + 2 + 8 + 4 + 4 + 4;

/// Frame counters are persisted this many counts ahead of the value
/// actually in use, so that restoring from a settings record written
/// before an ungraceful restart can never cause a counter value to be
/// reused (spec.md §8 "Frame counter wraparound ... triggers a
/// key-sequence rotation, not silent acceptance of reused counters" —
/// the same non-reuse requirement applies across a restart).
const FRAME_COUNTER_PERSIST_GUARD: u32 = 128;

/// How often `tick_one_second` re-persists `NETWORK_INFO` to pick up
/// frame-counter growth between role changes, bounding flash wear.
const NETWORK_INFO_PERSIST_INTERVAL_S: u32 = 60;

/// Tag for `Instance`'s own 1 Hz housekeeping tasklet, threaded through
/// [`Scheduler`] the way spec.md §4.1 describes a single cooperative
/// event loop driving timers and tasklets; `Mac`'s own sub-second
/// CSMA/ACK timing is driven directly rather than through this table.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum HousekeepingEvent {
    OneSecondTick,
}

const HOUSEKEEPING_TIMER_SLOTS: usize = 4;
const HOUSEKEEPING_TASKLET_SLOTS: usize = 4;

bitflags! {
    /// Change-flags delivered to the application on each
    /// partition-affecting event (spec.md §6 "Events").
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct ChangeFlags: u32 {
        const ROLE_CHANGED      = 1 << 0;
        const NETDATA_UPDATED   = 1 << 1;
        const IP6_ADDRESS_ADDED = 1 << 2;
        const CHILD_ADDED       = 1 << 3;
        const CHILD_REMOVED     = 1 << 4;
        const PARTITION_CHANGED = 1 << 5;
    }
}

pub struct Identity {
    pub ext_addr: ExtAddr,
    pub network_name: NetworkName,
    pub ext_pan_id: ExtPanId,
    pub pan_id: PanId,
    pub master_key: MasterKey,
    pub mesh_local_prefix: [u8; 8],
    pub channel: u8,
}

impl Default for Identity {
    fn default() -> Self {
        Identity {
            ext_addr: ExtAddr::default(),
            network_name: NetworkName::new(),
            ext_pan_id: ExtPanId::default(),
            pan_id: PanId::default(),
            master_key: MasterKey::default(),
            mesh_local_prefix: [0xfd, 0, 0, 0, 0, 0, 0, 0],
            channel: 11,
        }
    }
}

/// Owns every mesh-core subsystem. Generic over the HAL traits exactly
/// the way `capsules-extra`'s Thread driver is generic over its `Mac`
/// and alarm type parameters.
pub struct Instance<R: Radio, C: Aes128Ccm, A: Alarm, G: Entropy32, S: SettingsStore> {
    pub mac: Mac<R>,
    pub ccm: C,
    pub alarm: A,
    pub rng: G,
    pub settings: S,
    pub key_manager: KeyManager,
    pub mle: Mle,
    pub neighbors: NeighborTable,
    pub messages: MessagePool,
    pub forwarder: MeshForwarder,
    pub resolver: AddressResolver,
    pub router_ids: RouterIdTable,
    pub network_data: NetworkDataLeader,
    pub backbone: Option<BackboneAgent>,
    pub identity: Identity,
    scheduler: Scheduler<HousekeepingEvent, HOUSEKEEPING_TIMER_SLOTS, HOUSEKEEPING_TASKLET_SLOTS>,
    pending_events: ChangeFlags,
    enabled: bool,
    seconds_since_persist: u32,
}

impl<R: Radio, C: Aes128Ccm, A: Alarm, G: Entropy32, S: SettingsStore> Instance<R, C, A, G, S> {
    pub fn new(radio: R, ccm: C, alarm: A, rng: G, settings: S, device_mode: DeviceMode) -> Self {
        let now = alarm.now();
        let master_key = MasterKey::default();
        Instance {
            mac: Mac::new(radio),
            ccm,
            alarm,
            rng,
            settings,
            key_manager: KeyManager::new(master_key, now.0),
            mle: Mle::new(device_mode),
            neighbors: NeighborTable::new(),
            messages: MessagePool::new(),
            forwarder: MeshForwarder::new(crate::types::Rloc16::default()),
            resolver: AddressResolver::new(),
            router_ids: RouterIdTable::new(),
            network_data: NetworkDataLeader::new(),
            backbone: None,
            identity: Identity::default(),
            scheduler: Scheduler::new(),
            pending_events: ChangeFlags::empty(),
            enabled: false,
            seconds_since_persist: 0,
        }
    }

    fn raise(&mut self, flags: ChangeFlags) {
        self.pending_events.insert(flags);
    }

    /// Drain and return the accumulated change-flags since the last
    /// call, mirroring the teacher's single-callback-per-event-batch
    /// convention without requiring a registered closure.
    pub fn take_event_flags(&mut self) -> ChangeFlags {
        core::mem::take(&mut self.pending_events)
    }

    fn now(&self) -> Millis {
        self.alarm.now()
    }

    // ---- Lifecycle ----------------------------------------------------

    pub fn init(&mut self) {
        let mut out = [0u8; MAX_SETTING_LEN];
        if let Some(n) = self.settings.get(SettingsKey::NETWORK_INFO, &mut out) {
            if n >= NETWORK_INFO_LEN {
                self.identity.master_key.0.copy_from_slice(&out[0..16]);
                self.mle.role = Role::from_u8(out[16]);
                self.mle.rloc16 = Rloc16(u16::from_le_bytes([out[17], out[18]]));
                self.identity.ext_addr.0.copy_from_slice(&out[19..27]);
                let key_seq = u32::from_le_bytes(out[27..31].try_into().unwrap());
                let mac_counter = u32::from_le_bytes(out[31..35].try_into().unwrap());
                let mle_counter = u32::from_le_bytes(out[35..39].try_into().unwrap());
                self.key_manager = KeyManager::new(self.identity.master_key, self.now().0);
                self.key_manager.set_sequence(key_seq, self.now().0);
                self.key_manager.restore_frame_counters(mac_counter, mle_counter);
            }
        }
        info!("ot-core instance initialized");
    }

    /// Write the current identity, role, RLOC, key sequence and frame
    /// counters to the `NETWORK_INFO` settings record (spec.md §6
    /// persisted state; §8 `factory_reset` + `set_master_key` round-trip
    /// property). Frame counters are written
    /// [`FRAME_COUNTER_PERSIST_GUARD`] counts ahead of the last value
    /// actually used.
    fn save_network_info(&mut self) {
        let mut buf = [0u8; NETWORK_INFO_LEN];
        buf[0..16].copy_from_slice(&self.identity.master_key.0);
        buf[16] = self.mle.role.as_u8();
        buf[17..19].copy_from_slice(&self.mle.rloc16.0.to_le_bytes());
        buf[19..27].copy_from_slice(&self.identity.ext_addr.0);
        buf[27..31].copy_from_slice(&self.key_manager.current_sequence().to_le_bytes());
        buf[31..35].copy_from_slice(
            &self
                .key_manager
                .mac_frame_counter()
                .saturating_add(FRAME_COUNTER_PERSIST_GUARD)
                .to_le_bytes(),
        );
        buf[35..39].copy_from_slice(
            &self
                .key_manager
                .mle_frame_counter()
                .saturating_add(FRAME_COUNTER_PERSIST_GUARD)
                .to_le_bytes(),
        );
        if self.settings.set(SettingsKey::NETWORK_INFO, &buf).is_err() {
            warn!("failed to persist network info");
        }
    }

    pub fn factory_reset(&mut self) {
        self.settings.wipe();
        self.identity = Identity::default();
        self.key_manager = KeyManager::new(self.identity.master_key, self.now().0);
        self.neighbors = NeighborTable::new();
        self.mle = Mle::new(self.mle.device_mode);
        self.enabled = false;
        self.seconds_since_persist = 0;
        warn!("factory reset performed");
    }

    pub fn erase_persistent_info(&mut self) {
        self.settings.delete(SettingsKey::NETWORK_INFO);
        self.settings.delete(SettingsKey::PARENT_INFO);
        self.settings.delete(SettingsKey::CHILD_INFO);
    }

    pub fn reset(&mut self) {
        self.enabled = false;
        self.mle = Mle::new(self.mle.device_mode);
        self.neighbors = NeighborTable::new();
    }

    // ---- Link -----------------------------------------------------------

    pub fn set_channel(&mut self, channel: u8) -> Result<(), Error> {
        if self.enabled {
            return Err(Error::InvalidState);
        }
        self.identity.channel = channel;
        self.mac.set_channel(channel)
    }

    pub fn set_pan_id(&mut self, pan: PanId) {
        self.identity.pan_id = pan;
        self.mac.set_pan_id(pan);
    }

    pub fn set_ext_addr(&mut self, addr: ExtAddr) {
        self.identity.ext_addr = addr;
        self.mac.set_ext_addr(addr);
    }

    pub fn set_promiscuous(&mut self, enabled: bool) {
        self.mac.set_promiscuous(enabled);
    }

    // ---- Thread ----------------------------------------------------------

    /// `set_enabled(true)` begins attaching (`Disabled --start()-->
    /// Detached`, spec.md §4.6); `set_enabled(false)` tears the role
    /// down to `Disabled` without touching persisted credentials.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), Error> {
        if enabled == self.enabled {
            return Ok(());
        }
        self.enabled = enabled;
        if enabled {
            let action = self.mle.start()?;
            self.dispatch_mle_action(action);
            let now = self.now();
            self.scheduler.cancel(HousekeepingEvent::OneSecondTick);
            self.scheduler.arm_in(HousekeepingEvent::OneSecondTick, now, 1000);
            self.raise(ChangeFlags::ROLE_CHANGED);
        } else {
            self.mle.role = Role::Disabled;
            self.scheduler.cancel(HousekeepingEvent::OneSecondTick);
            self.raise(ChangeFlags::ROLE_CHANGED);
        }
        Ok(())
    }

    fn dispatch_mle_action(&mut self, action: MleAction) {
        match action {
            MleAction::SendParentRequest => debug!("sending MLE parent request"),
            MleAction::SendChildIdRequest { parent } => {
                debug!("sending child id request to {:?}", parent.0)
            }
            MleAction::SendAddressSolicit => debug!("sending address solicit"),
            MleAction::SendAddressRelease => debug!("sending address release"),
            MleAction::BecomeLeaderOfNewPartition => {
                info!("forming new singleton partition as leader")
            }
            MleAction::NotifyRoleChanged(role) => {
                info!("role changed to {:?}", role);
                self.raise(ChangeFlags::ROLE_CHANGED);
                self.save_network_info();
            }
        }
    }

    pub fn get_role(&self) -> Role {
        self.mle.role
    }

    pub fn get_child_timeout(&self) -> u32 {
        self.mle.child_timeout_s
    }

    pub fn set_child_timeout(&mut self, timeout_s: u32) {
        self.mle.child_timeout_s = timeout_s;
    }

    pub fn get_network_name(&self) -> &NetworkName {
        &self.identity.network_name
    }

    pub fn set_network_name(&mut self, name: &str) -> Result<(), Error> {
        self.identity.network_name = NetworkName::try_from(name).map_err(|_| Error::InvalidArgs)?;
        Ok(())
    }

    pub fn get_extended_pan_id(&self) -> ExtPanId {
        self.identity.ext_pan_id
    }

    pub fn set_extended_pan_id(&mut self, id: ExtPanId) {
        self.identity.ext_pan_id = id;
    }

    pub fn get_master_key(&self) -> MasterKey {
        self.identity.master_key
    }

    pub fn set_master_key(&mut self, key: MasterKey) {
        self.identity.master_key = key;
        self.key_manager = KeyManager::new(key, self.now().0);
        self.save_network_info();
    }

    pub fn get_mesh_local_prefix(&self) -> [u8; 8] {
        self.identity.mesh_local_prefix
    }

    pub fn set_mesh_local_prefix(&mut self, prefix: [u8; 8]) {
        self.identity.mesh_local_prefix = prefix;
    }

    // ---- FTD-only ---------------------------------------------------------

    pub fn set_router_upgrade_threshold(&mut self, threshold: u8) {
        self.mle.router_upgrade_threshold = threshold;
    }

    pub fn router_upgrade_threshold(&self) -> u8 {
        self.mle.router_upgrade_threshold
    }

    pub fn set_router_downgrade_threshold(&mut self, threshold: u8) {
        self.mle.router_downgrade_threshold = threshold;
    }

    pub fn router_downgrade_threshold(&self) -> u8 {
        self.mle.router_downgrade_threshold
    }

    pub fn set_router_selection_jitter(&mut self, jitter_s: u8) {
        self.mle.router_selection_jitter_s = jitter_s;
    }

    pub fn release_router_id(&mut self, router_id: u8) {
        self.router_ids.release(router_id, self.now().0 / 1000);
    }

    pub fn become_router(&mut self) -> Result<(), Error> {
        match self.mle.upgrade_to_router(1, self.mle.device_mode.is_full_thread_device()) {
            Some(action) => {
                self.dispatch_mle_action(action);
                self.raise(ChangeFlags::ROLE_CHANGED);
                Ok(())
            }
            None => Err(Error::InvalidState),
        }
    }

    pub fn become_leader(&mut self) -> Result<(), Error> {
        self.mle.become_leader()?;
        self.raise(ChangeFlags::ROLE_CHANGED | ChangeFlags::PARTITION_CHANGED);
        Ok(())
    }

    pub fn become_child(&mut self) -> Result<(), Error> {
        if let Some(action) = self.mle.downgrade_to_child(u8::MAX) {
            self.dispatch_mle_action(action);
            self.raise(ChangeFlags::ROLE_CHANGED);
            Ok(())
        } else {
            Err(Error::InvalidState)
        }
    }

    pub fn become_detached(&mut self) {
        self.mle.role = Role::Detached;
        self.raise(ChangeFlags::ROLE_CHANGED);
    }

    pub fn children(&self) -> impl Iterator<Item = crate::neighbor::NeighborIndex> + '_ {
        self.neighbors.iter_children().map(|(idx, _, _)| idx)
    }

    pub fn routers(&self) -> impl Iterator<Item = crate::neighbor::NeighborIndex> + '_ {
        self.neighbors.iter().filter_map(|(idx, rec)| {
            matches!(rec.kind, crate::neighbor::NeighborKind::Router(_)).then_some(idx)
        })
    }

    // ---- Scheduler tick --------------------------------------------------

    /// Run one iteration of the cooperative event loop (spec.md §4.1):
    /// drains `scheduler`'s due timers and tasklets, re-arming the 1 Hz
    /// housekeeping timer and calling [`Self::tick_one_second`] once it
    /// fires. The caller invokes this from its own event loop whenever
    /// work is due; sub-second work (CSMA, ACK timeout) is driven
    /// directly off `Mac` instead of through this table. Returns
    /// whether a timer is still armed, i.e. whether more work remains.
    pub fn run_once(&mut self) -> bool {
        let now = self.now();
        let mut due_housekeeping = false;
        let more = self.scheduler.run_once(now, |sched, event| match event {
            HousekeepingEvent::OneSecondTick => {
                due_housekeeping = true;
                sched.arm_in(HousekeepingEvent::OneSecondTick, now, 1000);
            }
        });
        if due_housekeeping {
            self.tick_one_second();
        }
        more
    }

    /// Drive every 1-second-resolution subsystem: supervision, router-id
    /// aging, reassembly expiry. Called by [`Self::run_once`] once per
    /// second while enabled; exposed directly for callers that want to
    /// drive housekeeping on their own cadence instead.
    pub fn tick_one_second(&mut self) {
        let now = self.now();
        self.forwarder.reassembly.expire(now);
        if matches!(self.mle.role, Role::Child) && self.mle.tick_supervision_listener() {
            warn!("supervision check timed out, forcing child update request");
        }
        if let Some(backbone) = &mut self.backbone {
            backbone.tick(now);
        }
        self.seconds_since_persist = self.seconds_since_persist.saturating_add(1);
        if self.seconds_since_persist >= NETWORK_INFO_PERSIST_INTERVAL_S {
            self.seconds_since_persist = 0;
            self.save_network_info();
        }
    }
}
