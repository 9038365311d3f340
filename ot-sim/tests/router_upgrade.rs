// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scenario 2: a Child with only one existing router in its partition
//! upgrades to Router once the upgrade threshold is unmet.

use std::rc::Rc;

use ot_core::types::{DeviceMode, Role};
use ot_sim::{InMemorySettings, Medium, SimInstance, SimRng};

fn new_instance(medium: &Rc<Medium>) -> SimInstance {
    let radio = ot_sim::SoftwareRadio::new(medium.clone());
    let clock = ot_sim::SimClock::new();
    SimInstance::new(
        radio,
        ot_core::crypto::SoftwareAesCcm::new(),
        clock.alarm(),
        SimRng::new(7),
        InMemorySettings::new(),
        DeviceMode::RX_ON_WHEN_IDLE | DeviceMode::FULL_THREAD_DEVICE | DeviceMode::FULL_NETWORK_DATA,
    )
}

#[test]
fn child_upgrades_to_router_below_threshold() {
    let medium = Medium::new();
    let mut device = new_instance(&medium);
    device.mle.router_upgrade_threshold = 16;
    device.set_enabled(true).unwrap();

    let parent_idx = device
        .neighbors
        .insert(ot_core::neighbor::NeighborRecord {
            ext_addr: ot_core::types::ExtAddr([9; 8]),
            rloc16: ot_core::types::Rloc16::from_router_id(1),
            mode: DeviceMode::FULL_THREAD_DEVICE,
            state: ot_core::neighbor::NeighborState::Valid,
            link_quality: ot_core::types::LinkQuality(3),
            link_frame_counter: 0,
            mle_frame_counter: 0,
            kind: ot_core::neighbor::NeighborKind::Router(ot_core::neighbor::RouterInfo {
                link_margin: 255,
                cost_to_leader: 0,
            }),
        })
        .unwrap();
    let candidate = ot_core::mle::ParentCandidate {
        ext_addr: ot_core::types::ExtAddr([9; 8]),
        rloc16: ot_core::types::Rloc16::from_router_id(1),
        leader_data: ot_core::types::LeaderData {
            partition_id: 1,
            weighting: 64,
            data_version: 0,
            stable_data_version: 0,
            leader_router_id: 1,
        },
        router_role_enabled: true,
        link_quality: ot_core::types::LinkQuality(3),
        path_cost_to_leader: 0,
    };
    device.mle.accept_parent(parent_idx, &candidate).unwrap();
    assert_eq!(device.get_role(), Role::Child);

    let leader_data_before = device.mle.leader_data;
    device.become_router().unwrap();

    assert_eq!(device.get_role(), Role::Router);
    assert_eq!(device.mle.leader_data, leader_data_before);
}

#[test]
fn router_upgrade_withheld_at_threshold() {
    let medium = Medium::new();
    let mut device = new_instance(&medium);
    device.mle.router_upgrade_threshold = 1;
    device.set_enabled(true).unwrap();
    let parent_idx = device
        .neighbors
        .insert(ot_core::neighbor::NeighborRecord {
            ext_addr: ot_core::types::ExtAddr([9; 8]),
            rloc16: ot_core::types::Rloc16::from_router_id(1),
            mode: DeviceMode::FULL_THREAD_DEVICE,
            state: ot_core::neighbor::NeighborState::Valid,
            link_quality: ot_core::types::LinkQuality(3),
            link_frame_counter: 0,
            mle_frame_counter: 0,
            kind: ot_core::neighbor::NeighborKind::Router(ot_core::neighbor::RouterInfo {
                link_margin: 255,
                cost_to_leader: 0,
            }),
        })
        .unwrap();
    let candidate = ot_core::mle::ParentCandidate {
        ext_addr: ot_core::types::ExtAddr([9; 8]),
        rloc16: ot_core::types::Rloc16::from_router_id(1),
        leader_data: ot_core::types::LeaderData::default(),
        router_role_enabled: true,
        link_quality: ot_core::types::LinkQuality(3),
        path_cost_to_leader: 0,
    };
    device.mle.accept_parent(parent_idx, &candidate).unwrap();
    assert!(device.become_router().is_err());
    assert_eq!(device.get_role(), Role::Child);
}
