// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Key sequence management and replay protection.
//!
//! Grounded on `capsules/extra/src/ieee802154/framer.rs`'s split between
//! frame-level security (MIC, nonce) and key material lookup, but the
//! key *derivation* itself (HMAC-SHA256 over the master key) and the
//! `(seq-1, seq, seq+1)`-window replay logic are specific to spec.md
//! §4.2 and have no teacher counterpart — they follow the Thread 1.3
//! key-derivation function this crate's spec distilled from
//! `original_source/src/core/thread/key_manager.cpp`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::types::MasterKey;
use crate::Error;

type HmacSha256 = Hmac<Sha256>;

/// Minimum time, in milliseconds, that must elapse between automatic
/// key rotations triggered by an incoming frame from the next sequence,
/// guarding against a forged high sequence number forcing rapid churn.
pub const DEFAULT_KEY_SWITCH_GUARD_TIME_MS: u32 = 624 * 60 * 60 * 1000;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AuthResult {
    Accepted,
    Replay,
    UnknownKey,
}

/// One neighbor's replay high-watermark per key sequence it has been
/// observed using, tracked by the caller (neighbor table) and passed
/// into [`KeyManager::authenticate_incoming`]; the key manager itself
/// is neighbor-agnostic and only derives/compares sequence material.
#[derive(Copy, Clone, Debug, Default)]
pub struct ReplayState {
    pub seq: u32,
    pub counter: u32,
}

pub struct KeyManager {
    master_key: MasterKey,
    current_seq: u32,
    mac_key: [u8; 16],
    mle_key: [u8; 16],
    mac_frame_counter: u32,
    mle_frame_counter: u32,
    key_switch_guard_time_ms: u32,
    last_rotation_ms: u32,
}

impl KeyManager {
    pub fn new(master_key: MasterKey, now_ms: u32) -> Self {
        let (mac_key, mle_key) = Self::derive(master_key, 0);
        KeyManager {
            master_key,
            current_seq: 0,
            mac_key,
            mle_key,
            mac_frame_counter: 0,
            mle_frame_counter: 0,
            key_switch_guard_time_ms: DEFAULT_KEY_SWITCH_GUARD_TIME_MS,
            last_rotation_ms: now_ms,
        }
    }

    /// Derive `(mac_key, mle_key)` for `seq`: HMAC-SHA256 over
    /// `master_key` with a 9-byte message `seq.to_le_bytes() ++ b"Thread"`;
    /// the first 16 bytes of the 32-byte MAC become `mac_key`, the
    /// second 16 become `mle_key`. Pure — same inputs always yield the
    /// same keys.
    pub fn derive(master_key: MasterKey, seq: u32) -> ([u8; 16], [u8; 16]) {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&master_key.0)
            .expect("HMAC accepts any key length");
        mac.update(&seq.to_le_bytes());
        mac.update(b"Thread");
        let out = mac.finalize().into_bytes();
        let mut mac_key = [0u8; 16];
        let mut mle_key = [0u8; 16];
        mac_key.copy_from_slice(&out[0..16]);
        mle_key.copy_from_slice(&out[16..32]);
        (mac_key, mle_key)
    }

    pub fn current_sequence(&self) -> u32 {
        self.current_seq
    }

    pub fn mac_key(&self) -> &[u8; 16] {
        &self.mac_key
    }

    pub fn mle_key(&self) -> &[u8; 16] {
        &self.mle_key
    }

    pub fn mac_frame_counter(&self) -> u32 {
        self.mac_frame_counter
    }

    pub fn mle_frame_counter(&self) -> u32 {
        self.mle_frame_counter
    }

    /// Seed both frame counters from a settings-store restore, without
    /// touching the derived keys. Never call this for a live rotation —
    /// only [`Self::set_sequence`]/[`Self::rotate_up`] may reset counters
    /// during normal operation.
    pub fn restore_frame_counters(&mut self, mac_frame_counter: u32, mle_frame_counter: u32) {
        self.mac_frame_counter = mac_frame_counter;
        self.mle_frame_counter = mle_frame_counter;
    }

    pub fn next_mac_frame_counter(&mut self) -> u32 {
        let c = self.mac_frame_counter;
        self.mac_frame_counter = self.mac_frame_counter.wrapping_add(1);
        c
    }

    pub fn next_mle_frame_counter(&mut self) -> u32 {
        let c = self.mle_frame_counter;
        self.mle_frame_counter = self.mle_frame_counter.wrapping_add(1);
        c
    }

    /// Force the active sequence to `n`, re-deriving keys. Frame
    /// counters reset to zero when `n` jumps forward by more than one
    /// (a fresh network attach or an explicit reset), but are preserved
    /// across an ordinary single-step rotation.
    pub fn set_sequence(&mut self, n: u32, now_ms: u32) {
        let jump = n.wrapping_sub(self.current_seq);
        if jump > 1 {
            self.mac_frame_counter = 0;
            self.mle_frame_counter = 0;
        }
        self.current_seq = n;
        let (mac_key, mle_key) = Self::derive(self.master_key, n);
        self.mac_key = mac_key;
        self.mle_key = mle_key;
        self.last_rotation_ms = now_ms;
    }

    pub fn rotate_up(&mut self, now_ms: u32) {
        self.set_sequence(self.current_seq.wrapping_add(1), now_ms);
    }

    fn guard_time_elapsed(&self, now_ms: u32) -> bool {
        now_ms.wrapping_sub(self.last_rotation_ms) >= self.key_switch_guard_time_ms
    }

    /// Validate an incoming frame's `(seq, counter)` against the
    /// current sequence and the caller-supplied replay state for this
    /// neighbor, updating `replay` in place on acceptance. `seq` outside
    /// `{current-1, current, current+1}` is rejected as `UnknownKey`.
    /// A frame at `current+1` triggers a deferred rotation if the guard
    /// time has elapsed since the last rotation; otherwise it is
    /// admitted without rotating (so a single early frame doesn't yet
    /// force local key churn).
    pub fn authenticate_incoming(
        &mut self,
        seq: u32,
        counter: u32,
        replay: &mut ReplayState,
        now_ms: u32,
    ) -> AuthResult {
        let delta = seq.wrapping_sub(self.current_seq) as i32;
        if !(-1..=1).contains(&delta) {
            return AuthResult::UnknownKey;
        }
        if delta == 1 && self.guard_time_elapsed(now_ms) {
            self.rotate_up(now_ms);
        }
        if replay.seq != seq {
            replay.seq = seq;
            replay.counter = counter;
            return AuthResult::Accepted;
        }
        if counter <= replay.counter {
            return AuthResult::Replay;
        }
        replay.counter = counter;
        AuthResult::Accepted
    }
}

impl From<AuthResult> for Result<(), Error> {
    fn from(r: AuthResult) -> Self {
        match r {
            AuthResult::Accepted => Ok(()),
            AuthResult::Replay | AuthResult::UnknownKey => Err(Error::Security),
        }
    }
}
