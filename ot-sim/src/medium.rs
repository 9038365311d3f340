// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A broadcast medium shared by every [`crate::radio::SoftwareRadio`] in
//! a test, standing in for real 802.15.4 RF: a transmission on channel
//! `c` is delivered into the inbox of every other registered radio also
//! tuned to `c`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ot_hil::radio::{FrameBuf, RxFrame};

struct Mailbox {
    channel: u8,
    on: bool,
    inbox: VecDeque<RxFrame>,
}

#[derive(Default)]
pub struct Medium {
    mailboxes: RefCell<Vec<Mailbox>>,
}

impl Medium {
    pub fn new() -> Rc<Medium> {
        Rc::new(Medium::default())
    }

    /// Register a new radio on the medium, returning its mailbox id.
    pub fn register(&self) -> usize {
        let mut mailboxes = self.mailboxes.borrow_mut();
        mailboxes.push(Mailbox {
            channel: 11,
            on: false,
            inbox: VecDeque::new(),
        });
        mailboxes.len() - 1
    }

    pub fn set_channel(&self, id: usize, channel: u8) {
        self.mailboxes.borrow_mut()[id].channel = channel;
    }

    pub fn set_on(&self, id: usize, on: bool) {
        self.mailboxes.borrow_mut()[id].on = on;
    }

    /// Deliver `frame` into every other online radio on `sender`'s
    /// channel, each measured with a fixed simulated RSSI/LQI.
    pub fn broadcast(&self, sender: usize, frame: &[u8]) {
        let mut mailboxes = self.mailboxes.borrow_mut();
        let channel = mailboxes[sender].channel;
        let mut buf = FrameBuf::new();
        let _ = buf.extend_from_slice(frame);
        for (id, mailbox) in mailboxes.iter_mut().enumerate() {
            if id == sender || !mailbox.on || mailbox.channel != channel {
                continue;
            }
            mailbox.inbox.push_back(RxFrame {
                frame: buf.clone(),
                rssi: -40,
                lqi: 255,
            });
        }
    }

    pub fn poll(&self, id: usize) -> Option<RxFrame> {
        self.mailboxes.borrow_mut()[id].inbox.pop_front()
    }
}
