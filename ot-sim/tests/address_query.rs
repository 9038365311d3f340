// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scenario 4: an Address Query round-trip resolves an EID to an
//! RLOC16, caches it, and releases the message that was waiting on it.

use ot_core::message::MessageMeta;
use ot_core::resolver::AddressResolver;
use ot_core::types::{Eid, Priority, Rloc16};
use ot_hil::time::Millis;

#[test]
fn query_then_notify_releases_held_message() {
    let mut resolver = AddressResolver::new();
    let mut pool = ot_core::message::MessagePool::new();
    let mut forwarder = ot_core::forwarder::MeshForwarder::new(Rloc16::from_router_id(0));

    let target = Eid([
        0xfd, 0xde, 0xad, 0x00, 0xbe, 0xef, 0, 0, 0, 0, 0, 0xff, 0xfe, 0x00, 0x12, 0x34,
    ]);
    let meta = MessageMeta::new(Priority::Normal, Eid::default(), target);
    let msg = pool.allocate(b"payload", meta).unwrap();

    let delay = resolver.start_query(target, Millis::ZERO).unwrap();
    assert!(delay <= 4_000);
    forwarder.resolve_then_send(msg).unwrap();
    assert_eq!(forwarder.send_queue_len(), 0);
    assert!(resolver.lookup(target).is_none());

    let holder_rloc = Rloc16(0x1234);
    resolver.handle_notify(target, holder_rloc, 1, target, Millis::new(50));
    assert_eq!(resolver.lookup(target), Some(holder_rloc));

    forwarder.release_resolved(&[msg]);
    assert_eq!(forwarder.pop_send_queue(&pool), Some(msg));

    let mut neighbors = ot_core::neighbor::NeighborTable::new();
    let holder_idx = neighbors
        .insert(ot_core::neighbor::NeighborRecord {
            ext_addr: ot_core::types::ExtAddr([0x12, 0x34, 0, 0, 0, 0, 0, 0]),
            rloc16: holder_rloc,
            mode: ot_core::types::DeviceMode::FULL_THREAD_DEVICE,
            state: ot_core::neighbor::NeighborState::Valid,
            link_quality: ot_core::types::LinkQuality(3),
            link_frame_counter: 0,
            mle_frame_counter: 0,
            kind: ot_core::neighbor::NeighborKind::Router(ot_core::neighbor::RouterInfo {
                link_margin: 255,
                cost_to_leader: 1,
            }),
        })
        .unwrap();
    let next_hop = forwarder.next_hop(holder_rloc, &neighbors);
    assert_eq!(next_hop, ot_core::forwarder::NextHop::Neighbor(holder_idx));
}
