// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! MLE TLV encode/decode (spec.md §6 "MLE on UDP/19788, TLV-encoded").
//!
//! One-byte type, one-byte length (MLE TLVs never exceed 255 bytes in
//! this core's supported scope), raw value — the same shape as every
//! other TLV-based protocol in the pack, but no teacher file implements
//! this exact type table, so the layout follows spec.md §6 directly.

use crate::types::{LeaderData, Rloc16};
use crate::Error;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum TlvType {
    SourceAddress = 0,
    Mode = 1,
    Timeout = 2,
    Challenge = 3,
    Response = 4,
    LinkFrameCounter = 5,
    MleFrameCounter = 8,
    Route64 = 9,
    Address16 = 10,
    LeaderData = 11,
    NetworkData = 12,
    ParentPriority = 13,
    Connectivity = 15,
    Version = 18,
}

impl TlvType {
    fn from_u8(v: u8) -> Option<Self> {
        use TlvType::*;
        Some(match v {
            0 => SourceAddress,
            1 => Mode,
            2 => Timeout,
            3 => Challenge,
            4 => Response,
            5 => LinkFrameCounter,
            8 => MleFrameCounter,
            9 => Route64,
            10 => Address16,
            11 => LeaderData,
            12 => NetworkData,
            13 => ParentPriority,
            15 => Connectivity,
            18 => Version,
            _ => return None,
        })
    }
}

pub const MAX_TLV_VALUE: usize = 64;

/// A decoded TLV's raw value, copied into a fixed-capacity buffer so
/// parsing never borrows the original packet past this function's
/// return (matching the arena-owned buffer convention elsewhere in this
/// crate).
#[derive(Copy, Clone, Debug)]
pub struct RawTlv {
    pub kind: TlvType,
    pub len: u8,
    pub value: [u8; MAX_TLV_VALUE],
}

impl RawTlv {
    pub fn value(&self) -> &[u8] {
        &self.value[..self.len as usize]
    }
}

/// Encode a single TLV (type, length, value) into `out`, returning the
/// number of bytes written.
pub fn encode_tlv(kind: TlvType, value: &[u8], out: &mut [u8]) -> Result<usize, Error> {
    if value.len() > u8::MAX as usize || out.len() < 2 + value.len() {
        return Err(Error::InvalidArgs);
    }
    out[0] = kind as u8;
    out[1] = value.len() as u8;
    out[2..2 + value.len()].copy_from_slice(value);
    Ok(2 + value.len())
}

/// Parse every TLV out of `buf`, invoking `f` for each one. Malformed
/// trailing bytes (fewer than a header, or a length that overruns the
/// buffer) stop parsing but do not return an error: per spec.md §7,
/// "packet parse errors are logged and dropped", not propagated.
pub fn for_each_tlv<'a>(buf: &'a [u8], mut f: impl FnMut(RawTlv)) {
    let mut off = 0;
    while off + 2 <= buf.len() {
        let kind = buf[off];
        let len = buf[off + 1] as usize;
        if off + 2 + len > buf.len() || len > MAX_TLV_VALUE {
            break;
        }
        if let Some(kind) = TlvType::from_u8(kind) {
            let mut value = [0u8; MAX_TLV_VALUE];
            value[..len].copy_from_slice(&buf[off + 2..off + 2 + len]);
            f(RawTlv {
                kind,
                len: len as u8,
                value,
            });
        }
        off += 2 + len;
    }
}

pub fn encode_mode(mode: crate::types::DeviceMode, out: &mut [u8]) -> Result<usize, Error> {
    encode_tlv(TlvType::Mode, &[mode.bits()], out)
}

pub fn encode_source_address(rloc16: Rloc16, out: &mut [u8]) -> Result<usize, Error> {
    encode_tlv(TlvType::SourceAddress, &rloc16.0.to_be_bytes(), out)
}

pub fn encode_leader_data(data: LeaderData, out: &mut [u8]) -> Result<usize, Error> {
    let mut value = [0u8; 8];
    value[0..4].copy_from_slice(&data.partition_id.to_be_bytes());
    value[4] = data.weighting;
    value[5] = data.data_version;
    value[6] = data.stable_data_version;
    value[7] = data.leader_router_id;
    encode_tlv(TlvType::LeaderData, &value, out)
}

pub fn decode_leader_data(tlv: &RawTlv) -> Option<LeaderData> {
    if tlv.kind != TlvType::LeaderData || tlv.len != 8 {
        return None;
    }
    let v = tlv.value();
    Some(LeaderData {
        partition_id: u32::from_be_bytes([v[0], v[1], v[2], v[3]]),
        weighting: v[4],
        data_version: v[5],
        stable_data_version: v[6],
        leader_router_id: v[7],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceMode;

    #[test]
    fn leader_data_round_trips() {
        let data = LeaderData {
            partition_id: 0x1122_3344,
            weighting: 64,
            data_version: 1,
            stable_data_version: 2,
            leader_router_id: 5,
        };
        let mut buf = [0u8; 16];
        let n = encode_leader_data(data, &mut buf).unwrap();
        let mut seen = None;
        for_each_tlv(&buf[..n], |tlv| {
            if let Some(d) = decode_leader_data(&tlv) {
                seen = Some(d);
            }
        });
        assert_eq!(seen, Some(data));
    }

    #[test]
    fn malformed_length_stops_parsing_without_error() {
        let buf = [TlvType::Mode as u8, 0xff];
        let mut count = 0;
        for_each_tlv(&buf, |_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn mode_tlv_round_trips() {
        let mode = DeviceMode::RX_ON_WHEN_IDLE | DeviceMode::FULL_THREAD_DEVICE;
        let mut buf = [0u8; 4];
        let n = encode_mode(mode, &mut buf).unwrap();
        let mut seen = None;
        for_each_tlv(&buf[..n], |tlv| {
            if tlv.kind == TlvType::Mode {
                seen = Some(tlv.value()[0]);
            }
        });
        assert_eq!(seen, Some(mode.bits()));
    }
}
