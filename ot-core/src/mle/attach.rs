// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parent selection: scoring and tie-breaking across collected Parent
//! Responses (spec.md §4.6 "Parent selection").

use crate::types::{AttachFilter, ExtAddr, LeaderData, LinkQuality, Rloc16};

#[derive(Copy, Clone, Debug)]
pub struct ParentCandidate {
    pub ext_addr: ExtAddr,
    pub rloc16: Rloc16,
    pub leader_data: LeaderData,
    pub router_role_enabled: bool,
    pub link_quality: LinkQuality,
    pub path_cost_to_leader: u8,
}

/// Whether `candidate` passes `filter` given our own current partition
/// (`our_partition`, `None` if detached) and current leader data (only
/// meaningful for `BetterPartition`).
pub fn passes_filter(
    candidate: &ParentCandidate,
    filter: AttachFilter,
    our_partition: Option<u32>,
    our_leader_data: Option<LeaderData>,
) -> bool {
    match filter {
        AttachFilter::AnyPartition => true,
        AttachFilter::SamePartition => {
            our_partition == Some(candidate.leader_data.partition_id)
        }
        AttachFilter::BetterPartition => match our_leader_data {
            Some(ours) => candidate.leader_data.is_better_than(ours),
            None => true,
        },
    }
}

/// Total order over candidates per spec.md's five-key tie-break chain,
/// most-preferred first: higher weighting, larger partition-id (only
/// relevant to `BetterPartition` scans, but harmless otherwise since a
/// single scan only ever sees one partition in practice), router-role
/// enabled, higher link quality, lower path cost, then extended address
/// as the final tie-break.
pub fn best_candidate<'a>(candidates: &'a [ParentCandidate]) -> Option<&'a ParentCandidate> {
    candidates.iter().max_by(|a, b| compare(a, b))
}

fn compare(a: &ParentCandidate, b: &ParentCandidate) -> core::cmp::Ordering {
    use core::cmp::Ordering;
    a.leader_data
        .weighting
        .cmp(&b.leader_data.weighting)
        .then_with(|| {
            a.leader_data
                .partition_id
                .cmp(&b.leader_data.partition_id)
        })
        .then_with(|| a.router_role_enabled.cmp(&b.router_role_enabled))
        .then_with(|| a.link_quality.cmp(&b.link_quality))
        .then_with(|| b.path_cost_to_leader.cmp(&a.path_cost_to_leader))
        .then_with(|| b.ext_addr.0.cmp(&a.ext_addr.0))
        .then(Ordering::Equal)
}
