// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! 6LoWPAN Mesh and Fragment header encode/decode (spec.md §6): `10 V F
//! hops src dst` mesh headers and `11000 dgm_size dgm_tag [dgm_offset]`
//! fragment headers, plus the reassembly set these headers feed.
//!
//! No teacher counterpart (Tock's 6LoWPAN layer targets a different
//! compression profile); written directly against spec.md §4.4/§6.

use ot_hil::time::Millis;

use crate::types::Rloc16;
use crate::Error;

pub const REASSEMBLY_TIMEOUT_MS: u32 = 5_000;
pub const MAX_REASSEMBLY_SETS: usize = 4;
pub const MAX_FRAGMENT_PAYLOAD: usize = 106;

/// The 6LoWPAN Mesh Header: `V`/`F` mark whether source/destination are
/// full 64-bit addresses (`false`) or 16-bit short addresses (`true`).
#[derive(Copy, Clone, Debug)]
pub struct MeshHeader {
    pub hops_left: u8,
    pub src: Rloc16,
    pub dst: Rloc16,
}

impl MeshHeader {
    /// Encoded as short/short addressing (`V=1, F=1`), the only mode
    /// this mesh core emits: every forwarder-visible hop is identified
    /// by RLOC16.
    pub fn encode(&self, out: &mut [u8]) -> Option<usize> {
        if out.len() < 5 {
            return None;
        }
        out[0] = 0b1011_0000 | (self.hops_left & 0x0f);
        out[1..3].copy_from_slice(&self.src.0.to_be_bytes());
        out[3..5].copy_from_slice(&self.dst.0.to_be_bytes());
        Some(5)
    }

    pub fn decode(buf: &[u8]) -> Option<(Self, usize)> {
        if buf.len() < 5 || buf[0] & 0b1100_0000 != 0b1000_0000 {
            return None;
        }
        let hops_left = buf[0] & 0x0f;
        let src = Rloc16(u16::from_be_bytes([buf[1], buf[2]]));
        let dst = Rloc16(u16::from_be_bytes([buf[3], buf[4]]));
        Some((
            MeshHeader {
                hops_left,
                src,
                dst,
            },
            5,
        ))
    }

    pub fn decrement_hops(&mut self) -> Result<(), Error> {
        if self.hops_left == 0 {
            return Err(Error::NoRoute);
        }
        self.hops_left -= 1;
        Ok(())
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum FragmentHeader {
    First { datagram_size: u16, datagram_tag: u16 },
    Subsequent { datagram_size: u16, datagram_tag: u16, datagram_offset: u8 },
}

impl FragmentHeader {
    pub fn encode(&self, out: &mut [u8]) -> Option<usize> {
        match *self {
            FragmentHeader::First {
                datagram_size,
                datagram_tag,
            } => {
                if out.len() < 4 {
                    return None;
                }
                let size_field = datagram_size & 0x07ff;
                out[0] = 0b1100_0000 | ((size_field >> 8) as u8);
                out[1] = (size_field & 0xff) as u8;
                out[2..4].copy_from_slice(&datagram_tag.to_be_bytes());
                Some(4)
            }
            FragmentHeader::Subsequent {
                datagram_size,
                datagram_tag,
                datagram_offset,
            } => {
                if out.len() < 5 {
                    return None;
                }
                let size_field = datagram_size & 0x07ff;
                out[0] = 0b1110_0000 | ((size_field >> 8) as u8);
                out[1] = (size_field & 0xff) as u8;
                out[2..4].copy_from_slice(&datagram_tag.to_be_bytes());
                out[4] = datagram_offset;
                Some(5)
            }
        }
    }

    pub fn decode(buf: &[u8]) -> Option<(Self, usize)> {
        if buf.len() < 4 || buf[0] & 0b1100_0000 != 0b1100_0000 {
            return None;
        }
        let datagram_size = (((buf[0] & 0x1f) as u16) << 8) | buf[1] as u16;
        let datagram_tag = u16::from_be_bytes([buf[2], buf[3]]);
        let is_first = buf[0] & 0b0010_0000 == 0;
        if is_first {
            Some((
                FragmentHeader::First {
                    datagram_size,
                    datagram_tag,
                },
                4,
            ))
        } else {
            if buf.len() < 5 {
                return None;
            }
            Some((
                FragmentHeader::Subsequent {
                    datagram_size,
                    datagram_tag,
                    datagram_offset: buf[4],
                },
                5,
            ))
        }
    }
}

struct ReassemblySet {
    src: Rloc16,
    datagram_tag: u16,
    total_size: u16,
    received: u16,
    buf: [u8; 1280],
    started_at: Millis,
}

/// Tracks in-progress reassembly per `(src, datagram-tag)`, with a
/// fixed-duration timeout after which all accumulated fragments for
/// that key are dropped silently (no partial delivery upstream).
pub struct ReassemblySets {
    sets: heapless::Vec<Option<ReassemblySet>, MAX_REASSEMBLY_SETS>,
}

impl Default for ReassemblySets {
    fn default() -> Self {
        Self::new()
    }
}

impl ReassemblySets {
    pub fn new() -> Self {
        let mut sets = heapless::Vec::new();
        for _ in 0..MAX_REASSEMBLY_SETS {
            let _ = sets.push(None);
        }
        ReassemblySets { sets }
    }

    /// Drop any reassembly set whose timeout has elapsed as of `now`.
    pub fn expire(&mut self, now: Millis) {
        for slot in self.sets.iter_mut() {
            if let Some(set) = slot {
                if now.signed_delta(set.started_at) as u32 >= REASSEMBLY_TIMEOUT_MS {
                    *slot = None;
                }
            }
        }
    }

    /// Feed one fragment in. Returns the complete datagram once the
    /// last fragment arrives, else `None`.
    pub fn accept(
        &mut self,
        src: Rloc16,
        header: FragmentHeader,
        payload: &[u8],
        now: Millis,
    ) -> Result<Option<heapless::Vec<u8, 1280>>, Error> {
        let (datagram_tag, datagram_size, offset_bytes) = match header {
            FragmentHeader::First {
                datagram_size,
                datagram_tag,
            } => (datagram_tag, datagram_size, 0u16),
            FragmentHeader::Subsequent {
                datagram_size,
                datagram_tag,
                datagram_offset,
            } => (datagram_tag, datagram_size, datagram_offset as u16 * 8),
        };

        let idx = self
            .sets
            .iter()
            .position(|s| {
                s.as_ref()
                    .map(|s| s.src == src && s.datagram_tag == datagram_tag)
                    .unwrap_or(false)
            })
            .or_else(|| self.sets.iter().position(|s| s.is_none()));
        let idx = idx.ok_or(Error::NoBufs)?;

        if self.sets[idx].is_none() {
            self.sets[idx] = Some(ReassemblySet {
                src,
                datagram_tag,
                total_size: datagram_size,
                received: 0,
                buf: [0u8; 1280],
                started_at: now,
            });
        }
        let set = self.sets[idx].as_mut().unwrap();
        if (offset_bytes as usize + payload.len()) > set.buf.len() {
            return Err(Error::Parse);
        }
        set.buf[offset_bytes as usize..offset_bytes as usize + payload.len()]
            .copy_from_slice(payload);
        set.received += payload.len() as u16;

        if set.received >= set.total_size {
            let total_size = set.total_size as usize;
            let mut out = heapless::Vec::new();
            let _ = out.extend_from_slice(&set.buf[..total_size]);
            self.sets[idx] = None;
            Ok(Some(out))
        } else {
            Ok(None)
        }
    }
}
