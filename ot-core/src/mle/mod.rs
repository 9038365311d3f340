// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The MLE (Mesh Link Establishment) state machine: role transitions,
//! parent selection, Advertisement/Trickle, Child Update and
//! supervision (spec.md §4.6).
//!
//! No teacher counterpart (Tock's Thread support is a wire-format stub
//! with no MLE state machine); the role-transition table and
//! supervision split are grounded directly on spec.md §4.6 and
//! `original_source/src/core/utils/child_supervision.cpp`.

pub mod attach;
pub mod tlv;

use ot_hil::rng::Entropy32;
use ot_hil::time::Millis;

use crate::neighbor::NeighborIndex;
use crate::types::{AttachFilter, DeviceMode, LeaderData, Role, Rloc16};
use crate::Error;

pub use attach::ParentCandidate;

/// Default supervision interval a parent waits, per idle rx-off child,
/// before sending a content-less keep-alive frame.
pub const DEFAULT_SUPERVISION_INTERVAL_S: u32 = 129;
/// Default timeout a child waits for *any* secured frame from its
/// parent before forcing a Child Update Request.
pub const DEFAULT_SUPERVISION_CHECK_TIMEOUT_S: u32 = 190;
pub const MAX_CHILD_UPDATE_FAILURES: u8 = 4;
pub const MAX_ATTACH_ATTEMPTS: u8 = 3;

/// Actions the caller (`Instance`) must take in response to an MLE
/// state transition: sending a message, (re)arming a timer, or
/// notifying the application via the change-flags callback.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MleAction {
    SendParentRequest,
    SendChildIdRequest { parent: NeighborIndex },
    SendAddressSolicit,
    SendAddressRelease,
    BecomeLeaderOfNewPartition,
    NotifyRoleChanged(Role),
}

pub struct ChildUpdateTracker {
    pub consecutive_failures: u8,
}

impl Default for ChildUpdateTracker {
    fn default() -> Self {
        ChildUpdateTracker {
            consecutive_failures: 0,
        }
    }
}

/// Router/Leader-side half of supervision: per-tick bookkeeping lives on
/// each child's [`crate::neighbor::ChildInfo`]; this struct only holds
/// the shared interval configuration.
#[derive(Copy, Clone, Debug)]
pub struct ChildSupervisor {
    pub supervision_interval_s: u32,
}

impl Default for ChildSupervisor {
    fn default() -> Self {
        ChildSupervisor {
            supervision_interval_s: DEFAULT_SUPERVISION_INTERVAL_S,
        }
    }
}

impl ChildSupervisor {
    /// Call once per second per valid rx-off child. Returns `true` if a
    /// content-less supervision frame should be sent now (the child's
    /// timer has reached the interval with an empty indirect queue).
    pub fn tick_child(&self, child: &mut crate::neighbor::ChildInfo, has_pending: bool) -> bool {
        if has_pending {
            child.ms_since_supervision_s = 0;
            return false;
        }
        child.ms_since_supervision_s += 1;
        if child.ms_since_supervision_s >= self.supervision_interval_s {
            child.ms_since_supervision_s = 0;
            true
        } else {
            false
        }
    }

    /// Any frame queued to the child — not just supervision frames —
    /// resets its counter.
    pub fn note_frame_queued(&self, child: &mut crate::neighbor::ChildInfo) {
        child.ms_since_supervision_s = 0;
    }
}

/// Child-side half: a single timer restarted on every secured frame
/// from the current parent.
#[derive(Copy, Clone, Debug)]
pub struct SupervisionListener {
    pub check_timeout_s: u32,
    seconds_since_contact: u32,
}

impl Default for SupervisionListener {
    fn default() -> Self {
        SupervisionListener {
            check_timeout_s: DEFAULT_SUPERVISION_CHECK_TIMEOUT_S,
            seconds_since_contact: 0,
        }
    }
}

impl SupervisionListener {
    pub fn note_secure_frame_from_parent(&mut self) {
        self.seconds_since_contact = 0;
    }

    /// Call once per second. Returns `true` exactly on the tick the
    /// timeout expires, at which point the caller should force a Child
    /// Update Request; the listener restarts itself automatically.
    pub fn tick(&mut self) -> bool {
        self.seconds_since_contact += 1;
        if self.seconds_since_contact >= self.check_timeout_s {
            self.seconds_since_contact = 0;
            true
        } else {
            false
        }
    }
}

pub struct Mle {
    pub role: Role,
    pub device_mode: DeviceMode,
    pub attach_filter: AttachFilter,
    pub leader_data: LeaderData,
    pub rloc16: Rloc16,
    pub parent: Option<NeighborIndex>,
    pub router_id: Option<u8>,
    pub router_upgrade_threshold: u8,
    pub router_downgrade_threshold: u8,
    pub router_selection_jitter_s: u8,
    pub child_timeout_s: u32,
    pub child_update: ChildUpdateTracker,
    pub supervisor: ChildSupervisor,
    pub listener: SupervisionListener,
    attach_attempts: u8,
}

impl Mle {
    pub fn new(device_mode: DeviceMode) -> Self {
        Mle {
            role: Role::Disabled,
            device_mode,
            attach_filter: AttachFilter::AnyPartition,
            leader_data: LeaderData::default(),
            rloc16: Rloc16::default(),
            parent: None,
            router_id: None,
            router_upgrade_threshold: 16,
            router_downgrade_threshold: 23,
            router_selection_jitter_s: 120,
            child_timeout_s: 240,
            child_update: ChildUpdateTracker::default(),
            supervisor: ChildSupervisor::default(),
            listener: SupervisionListener::default(),
            attach_attempts: 0,
        }
    }

    /// `Disabled --start()--> Detached`: begin attaching with restored
    /// credentials.
    pub fn start(&mut self) -> Result<MleAction, Error> {
        if !matches!(self.role, Role::Disabled) {
            return Err(Error::InvalidState);
        }
        self.role = Role::Detached;
        self.attach_attempts = 0;
        Ok(MleAction::SendParentRequest)
    }

    /// Record one failed attach attempt (no Parent Response accepted
    /// before the attach timer expired). Once `MAX_ATTACH_ATTEMPTS` is
    /// reached with an `AnyPartition` filter, the device forms its own
    /// singleton partition as Leader.
    pub fn attach_attempt_failed(&mut self) -> Option<MleAction> {
        if !matches!(self.role, Role::Detached) {
            return None;
        }
        self.attach_attempts += 1;
        if self.attach_attempts >= MAX_ATTACH_ATTEMPTS
            && self.attach_filter == AttachFilter::AnyPartition
        {
            self.become_leader_of_new_partition();
            Some(MleAction::BecomeLeaderOfNewPartition)
        } else {
            Some(MleAction::SendParentRequest)
        }
    }

    fn become_leader_of_new_partition(&mut self) {
        self.role = Role::Leader;
        self.router_id = Some(0);
        self.rloc16 = Rloc16::from_router_id(0);
        self.leader_data.leader_router_id = 0;
        self.child_update = ChildUpdateTracker::default();
    }

    /// `Detached --Parent Response accepted--> Child`.
    pub fn accept_parent(
        &mut self,
        parent: NeighborIndex,
        candidate: &ParentCandidate,
    ) -> Result<MleAction, Error> {
        if !matches!(self.role, Role::Detached) {
            return Err(Error::InvalidState);
        }
        self.parent = Some(parent);
        self.leader_data = candidate.leader_data;
        self.role = Role::Child;
        self.child_update = ChildUpdateTracker::default();
        self.listener.note_secure_frame_from_parent();
        Ok(MleAction::SendChildIdRequest { parent })
    }

    /// `Child --router-upgrade threshold met--> Router`, guarded by
    /// `router_role_enabled`.
    pub fn upgrade_to_router(&mut self, num_routers: u8, role_enabled: bool) -> Option<MleAction> {
        if !matches!(self.role, Role::Child) || !role_enabled {
            return None;
        }
        if num_routers < self.router_upgrade_threshold {
            self.role = Role::Router;
            Some(MleAction::SendAddressSolicit)
        } else {
            None
        }
    }

    pub fn address_solicit_accepted(&mut self, router_id: u8, rloc16: Rloc16) {
        self.router_id = Some(router_id);
        self.rloc16 = rloc16;
    }

    /// `Router upgrade receiving StatusNoAddress --> revert to Child`.
    pub fn address_solicit_rejected(&mut self) {
        if matches!(self.role, Role::Router) {
            self.role = Role::Child;
        }
    }

    /// `Child --parent keep-alive timeout--> Detached`.
    pub fn parent_timeout(&mut self) -> Option<MleAction> {
        if !matches!(self.role, Role::Child) {
            return None;
        }
        self.role = Role::Detached;
        self.parent = None;
        self.attach_attempts = 0;
        Some(MleAction::SendParentRequest)
    }

    /// `Router --router-downgrade threshold met--> Child`.
    pub fn downgrade_to_child(&mut self, num_routers: u8) -> Option<MleAction> {
        if !matches!(self.role, Role::Router) {
            return None;
        }
        if num_routers > self.router_downgrade_threshold {
            self.role = Role::Child;
            self.router_id = None;
            Some(MleAction::SendAddressRelease)
        } else {
            None
        }
    }

    /// `Router --elected leader (highest weighting, then lowest router
    /// id)--> Leader`.
    pub fn become_leader(&mut self) -> Result<(), Error> {
        if !matches!(self.role, Role::Router) {
            return Err(Error::InvalidState);
        }
        self.role = Role::Leader;
        if let Some(id) = self.router_id {
            self.leader_data.leader_router_id = id;
        }
        Ok(())
    }

    /// `Leader --partition merge with higher (weighting, partition-id)
    /// --> Child`: adopt the new partition's leader data.
    pub fn merge_into_better_partition(&mut self, new_leader_data: LeaderData) -> Result<(), Error> {
        if !new_leader_data.is_better_than(self.leader_data) {
            return Err(Error::InvalidArgs);
        }
        self.role = Role::Child;
        self.leader_data = new_leader_data;
        self.router_id = None;
        Ok(())
    }

    /// A Child Update Request was sent and unacknowledged. After
    /// [`MAX_CHILD_UPDATE_FAILURES`] consecutive failures, fall back to
    /// Detached.
    pub fn child_update_failed(&mut self) -> Option<MleAction> {
        if !matches!(self.role, Role::Child) {
            return None;
        }
        self.child_update.consecutive_failures += 1;
        if self.child_update.consecutive_failures >= MAX_CHILD_UPDATE_FAILURES {
            self.role = Role::Detached;
            self.parent = None;
            self.attach_attempts = 0;
            Some(MleAction::SendParentRequest)
        } else {
            None
        }
    }

    pub fn child_update_succeeded(&mut self) {
        self.child_update.consecutive_failures = 0;
        self.listener.note_secure_frame_from_parent();
    }

    /// Call once per second on a Child when the supervision listener's
    /// timeout expires: force a Child Update Request.
    pub fn tick_supervision_listener(&mut self) -> bool {
        if matches!(self.role, Role::Child) {
            self.listener.tick()
        } else {
            false
        }
    }

    pub fn is_sleepy(&self) -> bool {
        self.device_mode.is_sleepy()
    }

    /// Choose a parent, jittered randomly in `[0, Imax)`-style window
    /// used by router-selection jitter before re-announcing candidacy
    /// (spec.md §4.6 scenario 2's `router-selection-jitter`).
    pub fn router_selection_jitter_ms(&self, rng: &mut impl Entropy32) -> u32 {
        rng.next_below(self.router_selection_jitter_s as u32 * 1000)
    }
}

/// Advertisement Trickle-timer deadline computation, shared between
/// Router and Leader roles (spec.md §4.6 "Advertisement").
pub fn should_reset_trickle_on_inconsistency(
    heard: LeaderData,
    ours: LeaderData,
    new_router_allocated: bool,
) -> bool {
    new_router_allocated || heard != ours
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighbor::NeighborIndex;
    use crate::types::ExtAddr;

    fn candidate() -> ParentCandidate {
        ParentCandidate {
            ext_addr: ExtAddr([1; 8]),
            rloc16: Rloc16::from_router_id(1),
            leader_data: LeaderData {
                partition_id: 1,
                weighting: 64,
                data_version: 0,
                stable_data_version: 0,
                leader_router_id: 1,
            },
            router_role_enabled: true,
            link_quality: crate::types::LinkQuality(3),
            path_cost_to_leader: 1,
        }
    }

    #[test]
    fn start_transitions_disabled_to_detached() {
        let mut mle = Mle::new(DeviceMode::RX_ON_WHEN_IDLE);
        assert_eq!(mle.start().unwrap(), MleAction::SendParentRequest);
        assert_eq!(mle.role, Role::Detached);
    }

    #[test]
    fn exhausted_attach_attempts_forms_singleton_partition() {
        let mut mle = Mle::new(DeviceMode::RX_ON_WHEN_IDLE);
        mle.start().unwrap();
        mle.attach_attempt_failed();
        mle.attach_attempt_failed();
        let action = mle.attach_attempt_failed().unwrap();
        assert_eq!(action, MleAction::BecomeLeaderOfNewPartition);
        assert_eq!(mle.role, Role::Leader);
    }

    #[test]
    fn accept_parent_transitions_to_child() {
        let mut mle = Mle::new(DeviceMode::RX_ON_WHEN_IDLE);
        mle.start().unwrap();
        let action = mle.accept_parent(NeighborIndex(0), &candidate()).unwrap();
        assert_eq!(action, MleAction::SendChildIdRequest { parent: NeighborIndex(0) });
        assert_eq!(mle.role, Role::Child);
        assert_eq!(mle.leader_data, candidate().leader_data);
    }

    #[test]
    fn four_failed_child_updates_force_detached() {
        let mut mle = Mle::new(DeviceMode::RX_ON_WHEN_IDLE);
        mle.start().unwrap();
        mle.accept_parent(NeighborIndex(0), &candidate()).unwrap();
        assert!(mle.child_update_failed().is_none());
        assert!(mle.child_update_failed().is_none());
        assert!(mle.child_update_failed().is_none());
        let action = mle.child_update_failed().unwrap();
        assert_eq!(action, MleAction::SendParentRequest);
        assert_eq!(mle.role, Role::Detached);
    }

    #[test]
    fn router_upgrade_requires_role_enabled() {
        let mut mle = Mle::new(DeviceMode::RX_ON_WHEN_IDLE | DeviceMode::FULL_THREAD_DEVICE);
        mle.start().unwrap();
        mle.accept_parent(NeighborIndex(0), &candidate()).unwrap();
        assert!(mle.upgrade_to_router(1, false).is_none());
        let action = mle.upgrade_to_router(1, true).unwrap();
        assert_eq!(action, MleAction::SendAddressSolicit);
        assert_eq!(mle.role, Role::Router);
    }

    #[test]
    fn leader_merges_into_better_partition() {
        let mut mle = Mle::new(DeviceMode::RX_ON_WHEN_IDLE);
        mle.start().unwrap();
        mle.attach_attempt_failed();
        mle.attach_attempt_failed();
        mle.attach_attempt_failed();
        assert_eq!(mle.role, Role::Leader);
        let better = LeaderData {
            partition_id: 0x22222222,
            weighting: 72,
            data_version: 0,
            stable_data_version: 0,
            leader_router_id: 2,
        };
        mle.merge_into_better_partition(better).unwrap();
        assert_eq!(mle.role, Role::Child);
        assert_eq!(mle.leader_data, better);
    }

    #[test]
    fn supervisor_sends_after_interval_with_empty_queue() {
        let supervisor = ChildSupervisor {
            supervision_interval_s: 3,
        };
        let mut child = crate::neighbor::ChildInfo {
            timeout_s: 240,
            csl_poll_period_ms: None,
            last_heard_ms: 0,
            supervision_interval_s: 3,
            ms_since_supervision_s: 0,
        };
        assert!(!supervisor.tick_child(&mut child, false));
        assert!(!supervisor.tick_child(&mut child, false));
        assert!(supervisor.tick_child(&mut child, false));
    }

    #[test]
    fn supervision_listener_forces_child_update_on_expiry() {
        let mut listener = SupervisionListener {
            check_timeout_s: 2,
            seconds_since_contact: 0,
        };
        assert!(!listener.tick());
        assert!(listener.tick());
    }
}
