// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The MAC layer: owns the radio, applies frame security, and runs
//! CSMA-CA. Grounded on `capsules/src/ieee802154/mac.rs`'s `MacDevice`
//! CSMA/ACK state machine and `capsules/extra/src/ieee802154/framer.rs`'s
//! security handling, adapted to a synchronous, arena-indexed style.

pub mod frame;

use heapless::Vec;

use ot_hil::radio::{FrameBuf, Radio, RxFrame, MAX_MTU};
use ot_hil::rng::Entropy32;
use ot_hil::symmetric_encryption::Aes128Ccm;
use ot_hil::ErrorCode;

use crate::key_manager::KeyManager;
use crate::types::{ExtAddr, PanId};
use crate::Error;

pub use frame::{AuxSecurityHeader, SecurityLevel};

/// CSMA-CA parameters per spec.md §4.3.
pub const MIN_BE: u8 = 3;
pub const MAX_BE: u8 = 5;
pub const MAX_CSMA_BACKOFFS: u8 = 4;
pub const MAX_FRAME_RETRIES: u8 = 3;
/// 54 symbol periods at 62.5 µs/symbol (2.4 GHz O-QPSK), in milliseconds,
/// rounded up.
pub const ACK_TIMEOUT_MS: u32 = 4;

#[derive(Copy, Clone, Default)]
pub struct MacCounters {
    pub tx_err_cca: u32,
    pub tx_no_ack: u32,
    pub rx_err_sec: u32,
}

/// Result of a single discovered beacon during an active scan.
#[derive(Copy, Clone, Debug)]
pub struct ActiveScanResult {
    pub network_name: heapless::String<16>,
    pub ext_pan_id: [u8; 8],
    pub pan_id: PanId,
    pub ext_addr: ExtAddr,
    pub channel: u8,
    pub rssi: i8,
    pub lqi: u8,
    pub is_joinable: bool,
}

/// A unicast or broadcast outbound frame, pre-aux-header, queued for
/// CSMA/transmission.
pub struct TxRequest {
    pub frame: FrameBuf,
    pub ack_requested: bool,
    pub security: Option<SecurityLevel>,
    pub dest_addr: Option<ExtAddr>,
}

enum TxState {
    Idle,
    Backoff { be: u8, backoffs: u8 },
    AwaitingAck { retries: u8 },
}

/// Owns the radio and drives CSMA-CA/ACK retry for one outbound frame at
/// a time; higher layers (Mesh Forwarder) are responsible for queueing.
pub struct Mac<R: Radio> {
    radio: R,
    counters: MacCounters,
    state: TxState,
    pending: Option<TxRequest>,
}

impl<R: Radio> Mac<R> {
    pub fn new(radio: R) -> Self {
        Mac {
            radio,
            counters: MacCounters::default(),
            state: TxState::Idle,
            pending: None,
        }
    }

    pub fn counters(&self) -> MacCounters {
        self.counters
    }

    pub fn set_channel(&mut self, channel: u8) -> Result<(), Error> {
        Ok(self.radio.set_channel(channel)?)
    }

    pub fn set_pan_id(&mut self, pan: PanId) {
        self.radio.set_pan(pan.0);
    }

    pub fn set_ext_addr(&mut self, addr: ExtAddr) {
        self.radio.set_address_long(addr.0);
    }

    pub fn set_short_addr(&mut self, addr: u16) {
        self.radio.set_address(addr);
    }

    pub fn set_promiscuous(&mut self, enabled: bool) {
        self.radio.set_promiscuous(enabled);
    }

    /// Begin sending `req`: if the channel is busy, arm CSMA backoff and
    /// return `Busy`; the caller retries this call once its scheduler
    /// fires the backoff timer with the returned delay. Returns `Ok(true)`
    /// once the frame has actually been handed to the radio.
    pub fn send(
        &mut self,
        req: TxRequest,
        rng: &mut impl Entropy32,
    ) -> Result<SendOutcome, Error> {
        if !matches!(self.state, TxState::Idle) {
            return Err(Error::Busy);
        }
        if !self.radio.is_clear_channel() {
            let be = MIN_BE;
            let backoffs = 0;
            let delay = backoff_delay(be, rng);
            self.pending = Some(req);
            self.state = TxState::Backoff { be, backoffs };
            return Ok(SendOutcome::Backoff(delay));
        }
        self.transmit_now(req)
    }

    /// Re-attempt a transmission after a CSMA backoff delay elapsed.
    pub fn retry_csma(&mut self, rng: &mut impl Entropy32) -> Result<SendOutcome, Error> {
        let (be, backoffs) = match self.state {
            TxState::Backoff { be, backoffs } => (be, backoffs),
            _ => return Err(Error::InvalidState),
        };
        let req = self.pending.take().ok_or(Error::InvalidState)?;
        if self.radio.is_clear_channel() {
            self.transmit_now(req)
        } else if backoffs + 1 >= MAX_CSMA_BACKOFFS {
            self.state = TxState::Idle;
            self.counters.tx_err_cca += 1;
            Err(Error::ChannelAccess)
        } else {
            let next_be = (be + 1).min(MAX_BE);
            let delay = backoff_delay(next_be, rng);
            self.pending = Some(req);
            self.state = TxState::Backoff {
                be: next_be,
                backoffs: backoffs + 1,
            };
            Ok(SendOutcome::Backoff(delay))
        }
    }

    fn transmit_now(&mut self, req: TxRequest) -> Result<SendOutcome, Error> {
        let ack_requested = req.ack_requested;
        let outcome = self
            .radio
            .transmit(&req.frame, ack_requested)
            .map_err(|e| {
                self.state = TxState::Idle;
                e
            })?;
        if !ack_requested {
            self.state = TxState::Idle;
            return Ok(SendOutcome::Sent);
        }
        if outcome.acked {
            self.state = TxState::Idle;
            Ok(SendOutcome::Sent)
        } else {
            self.pending = Some(req);
            self.state = TxState::AwaitingAck { retries: 0 };
            Ok(SendOutcome::AwaitingAck)
        }
    }

    /// Call when the ACK-timeout timer fires while `AwaitingAck`:
    /// retries the transmission, up to [`MAX_FRAME_RETRIES`].
    pub fn handle_ack_timeout(&mut self) -> Result<SendOutcome, Error> {
        let retries = match self.state {
            TxState::AwaitingAck { retries } => retries,
            _ => return Err(Error::InvalidState),
        };
        if retries + 1 > MAX_FRAME_RETRIES {
            self.state = TxState::Idle;
            self.pending = None;
            self.counters.tx_no_ack += 1;
            return Err(Error::NoAck);
        }
        let req = self.pending.take().ok_or(Error::InvalidState)?;
        let ack_requested = req.ack_requested;
        let outcome = self.radio.transmit(&req.frame, ack_requested)?;
        if outcome.acked {
            self.state = TxState::Idle;
            Ok(SendOutcome::Sent)
        } else {
            self.pending = Some(req);
            self.state = TxState::AwaitingAck {
                retries: retries + 1,
            };
            Ok(SendOutcome::AwaitingAck)
        }
    }

    pub fn receive(&mut self) -> Option<RxFrame> {
        self.radio.receive()
    }

    /// Apply CCM* security to a frame in place: fills the aux header at
    /// `aux_off` and encrypts/authenticates `buf[payload_off..]` using
    /// the Key Manager's current MAC key.
    pub fn secure_frame(
        &self,
        ccm: &mut impl Aes128Ccm,
        key_mgr: &mut KeyManager,
        src_addr: ExtAddr,
        level: SecurityLevel,
        buf: &mut Vec<u8, MAX_MTU>,
        aux_off: usize,
        payload_off: usize,
        payload_len: usize,
    ) -> Result<(), Error> {
        let counter = key_mgr.next_mac_frame_counter();
        let hdr = AuxSecurityHeader {
            level,
            frame_counter: counter,
            key_index: (key_mgr.current_sequence() & 0xff) as u8,
        };
        hdr.encode(&mut buf[aux_off..aux_off + AuxSecurityHeader::ENCODED_LEN])
            .ok_or(Error::InvalidArgs)?;
        ccm.set_key(key_mgr.mac_key())?;
        let nonce = frame::get_ccm_nonce(src_addr, counter, level);
        ccm.set_nonce(&nonce)?;
        let mic_len = level.mic_len();
        let a_data_end = payload_off;
        let (a_data, rest) = buf.split_at_mut(a_data_end);
        ccm.encrypt_in_place(a_data, rest, 0, payload_len, mic_len)?;
        Ok(())
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SendOutcome {
    Sent,
    AwaitingAck,
    /// Backoff in progress; caller should arm a timer for this many ms.
    Backoff(u32),
}

fn backoff_delay(be: u8, rng: &mut impl Entropy32) -> u32 {
    let units: u32 = 1 << be;
    let periods = rng.next_below(units);
    // One 802.15.4 backoff period is 20 symbols = 320 us at 2.4 GHz.
    (periods * 320) / 1000
}
