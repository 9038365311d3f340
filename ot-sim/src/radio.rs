// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A software `Radio` backed by a shared [`Medium`], standing in for a
//! real 802.15.4 transceiver the way a Tock board's QEMU chip stands in
//! for silicon.

use std::rc::Rc;

use ot_hil::radio::{Radio, RxFrame, TxOutcome};
use ot_hil::ErrorCode;

use crate::medium::Medium;

pub struct SoftwareRadio {
    medium: Rc<Medium>,
    id: usize,
    on: bool,
    channel: u8,
    pan: u16,
    short_addr: u16,
    long_addr: [u8; 8],
    promiscuous: bool,
    /// Forces the next `is_clear_channel` check to report busy, for
    /// tests exercising CSMA backoff.
    pub force_busy: bool,
    /// Forces `transmit` to report a missing link-layer ACK.
    pub force_no_ack: bool,
}

impl SoftwareRadio {
    pub fn new(medium: Rc<Medium>) -> Self {
        let id = medium.register();
        SoftwareRadio {
            medium,
            id,
            on: false,
            channel: 11,
            pan: 0xffff,
            short_addr: 0xffff,
            long_addr: [0; 8],
            promiscuous: false,
            force_busy: false,
            force_no_ack: false,
        }
    }
}

impl Radio for SoftwareRadio {
    fn is_on(&self) -> bool {
        self.on
    }

    fn turn_on(&mut self) -> Result<(), ErrorCode> {
        self.on = true;
        self.medium.set_on(self.id, true);
        Ok(())
    }

    fn turn_off(&mut self) -> Result<(), ErrorCode> {
        self.on = false;
        self.medium.set_on(self.id, false);
        Ok(())
    }

    fn channel(&self) -> u8 {
        self.channel
    }

    fn set_channel(&mut self, channel: u8) -> Result<(), ErrorCode> {
        self.channel = channel;
        self.medium.set_channel(self.id, channel);
        Ok(())
    }

    fn pan(&self) -> u16 {
        self.pan
    }

    fn set_pan(&mut self, pan: u16) {
        self.pan = pan;
    }

    fn address(&self) -> u16 {
        self.short_addr
    }

    fn set_address(&mut self, short: u16) {
        self.short_addr = short;
    }

    fn address_long(&self) -> [u8; 8] {
        self.long_addr
    }

    fn set_address_long(&mut self, ext: [u8; 8]) {
        self.long_addr = ext;
    }

    fn set_promiscuous(&mut self, enabled: bool) {
        self.promiscuous = enabled;
    }

    fn is_clear_channel(&mut self) -> bool {
        if self.force_busy {
            self.force_busy = false;
            return false;
        }
        true
    }

    fn transmit(&mut self, frame: &[u8], ack_requested: bool) -> Result<TxOutcome, ErrorCode> {
        if !self.on {
            return Err(ErrorCode::Off);
        }
        self.medium.broadcast(self.id, frame);
        let acked = ack_requested && !self.force_no_ack;
        self.force_no_ack = false;
        Ok(TxOutcome { acked })
    }

    fn receive(&mut self) -> Option<RxFrame> {
        self.medium.poll(self.id)
    }

    fn energy_detect(&mut self, _channel: u8) -> Result<i8, ErrorCode> {
        Ok(-90)
    }
}
