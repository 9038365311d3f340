// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scenario 1: a device with restored credentials attaches to an
//! already-reachable Leader and becomes `Child`.

use std::rc::Rc;

use ot_core::types::{DeviceMode, LeaderData, MasterKey, Role};
use ot_sim::{InMemorySettings, Medium, SimInstance, SimRng};

fn new_instance(medium: &Rc<Medium>, ext: u8) -> SimInstance {
    let radio = ot_sim::SoftwareRadio::new(medium.clone());
    let clock = ot_sim::SimClock::new();
    let mut instance = SimInstance::new(
        radio,
        ot_core::crypto::SoftwareAesCcm::new(),
        clock.alarm(),
        SimRng::new(ext as u32 + 1),
        InMemorySettings::new(),
        DeviceMode::RX_ON_WHEN_IDLE | DeviceMode::FULL_THREAD_DEVICE | DeviceMode::FULL_NETWORK_DATA,
    );
    instance.identity.ext_addr.0 = [ext; 8];
    instance.mac.set_ext_addr(instance.identity.ext_addr);
    instance
}

#[test]
fn attach_as_child_adopts_parent_leader_data() {
    let medium = Medium::new();
    let mut child = new_instance(&medium, 1);
    let master_key = MasterKey([0x42; 16]);
    child.set_master_key(master_key);
    child.set_channel(11).unwrap();

    child.set_enabled(true).unwrap();
    assert_eq!(child.get_role(), Role::Detached);

    let leader_data = LeaderData {
        partition_id: 0x1234_5678,
        weighting: 64,
        data_version: 0,
        stable_data_version: 0,
        leader_router_id: 5,
    };
    let parent_rloc = ot_core::types::Rloc16::from_router_id(5);
    let candidate = ot_core::mle::ParentCandidate {
        ext_addr: ot_core::types::ExtAddr([5; 8]),
        rloc16: parent_rloc,
        leader_data,
        router_role_enabled: true,
        link_quality: ot_core::types::LinkQuality(3),
        path_cost_to_leader: 0,
    };
    let parent_idx = child
        .neighbors
        .insert(ot_core::neighbor::NeighborRecord {
            ext_addr: candidate.ext_addr,
            rloc16: parent_rloc,
            mode: DeviceMode::FULL_THREAD_DEVICE,
            state: ot_core::neighbor::NeighborState::Attaching,
            link_quality: candidate.link_quality,
            link_frame_counter: 0,
            mle_frame_counter: 0,
            kind: ot_core::neighbor::NeighborKind::Router(ot_core::neighbor::RouterInfo {
                link_margin: 255,
                cost_to_leader: 0,
            }),
        })
        .unwrap();
    child.mle.accept_parent(parent_idx, &candidate).unwrap();

    assert_eq!(child.get_role(), Role::Child);
    assert_eq!(child.get_master_key(), master_key);
    assert_eq!(child.mle.leader_data.partition_id, 0x1234_5678);
    assert_eq!(child.mle.parent, Some(parent_idx));
    assert!(child.key_manager.current_sequence() == 0);
    let _ = child.key_manager.next_mac_frame_counter();
    assert!(child.key_manager.next_mac_frame_counter() > 0);
}
