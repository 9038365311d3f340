// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scenario 5: a sleepy (rx-off) child's indirect queue holds frames
//! until the child polls, and the supervisor sends nothing while the
//! queue is non-empty.

use ot_core::message::MessageMeta;
use ot_core::neighbor::{ChildInfo, NeighborKind, NeighborRecord, NeighborState, NeighborTable};
use ot_core::types::{DeviceMode, Eid, ExtAddr, LinkQuality, Priority, Rloc16};

#[test]
fn indirect_queue_holds_frames_until_child_polls() {
    let mut neighbors = NeighborTable::new();
    let mut pool = ot_core::message::MessagePool::new();
    let mut forwarder = ot_core::forwarder::MeshForwarder::new(Rloc16::from_router_id(1));

    let child_idx = neighbors
        .insert(NeighborRecord {
            ext_addr: ExtAddr([3; 8]),
            rloc16: Rloc16::new(1, 1),
            mode: DeviceMode::SECURE_DATA_REQUEST,
            state: NeighborState::Valid,
            link_quality: LinkQuality(3),
            link_frame_counter: 0,
            mle_frame_counter: 0,
            kind: NeighborKind::Child(ChildInfo {
                timeout_s: 240,
                csl_poll_period_ms: None,
                last_heard_ms: 0,
                supervision_interval_s: 129,
                ms_since_supervision_s: 0,
            }),
        })
        .unwrap();

    let meta = MessageMeta::new(Priority::Normal, Eid::default(), Eid::default());
    let frames = [
        pool.allocate(b"one", meta).unwrap(),
        pool.allocate(b"two", meta).unwrap(),
        pool.allocate(b"three", meta).unwrap(),
    ];
    for &id in &frames {
        forwarder
            .enqueue_indirect(id, child_idx, &mut neighbors, &mut pool)
            .unwrap();
    }
    assert_eq!(forwarder.send_queue_len(), 3);
    assert!(forwarder.has_indirect_pending(child_idx, &pool));

    // No supervision frame should be sent while the indirect queue is
    // non-empty: the supervisor's own-timer only fires on an empty queue.
    let supervisor = ot_core::mle::ChildSupervisor {
        supervision_interval_s: 1,
    };
    let child = match &mut neighbors.get_mut(child_idx).unwrap().kind {
        NeighborKind::Child(c) => c,
        NeighborKind::Router(_) => unreachable!(),
    };
    assert!(!supervisor.tick_child(child, true));

    // The parent drains the child's own indirect queue in FIFO order as
    // it polls, one frame per Data Request.
    for &expected in &frames {
        assert_eq!(forwarder.pop_indirect_for_child(child_idx, &pool), Some(expected));
    }
    assert_eq!(forwarder.send_queue_len(), 0);
    assert!(!forwarder.has_indirect_pending(child_idx, &pool));
}
