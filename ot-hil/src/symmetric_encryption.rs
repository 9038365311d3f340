// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! AES-128-CCM* seam, modeled on `kernel::hil::symmetric_encryption::
//! {AES128CCM, CCMClient}` as used by
//! `capsules/extra/src/ieee802154/framer.rs`.
//!
//! The teacher's version is asynchronous (`crypt()` returns immediately
//! and the result arrives later via `CCMClient::crypt_done`) because it
//! targets a DMA-driven hardware AES engine. This crate's mesh core never
//! has more than one CCM operation outstanding at a time and the
//! reference implementation (`ot_core::crypto::SoftwareAesCcm`, backed by
//! the `aes`/`ccm` crates) completes synchronously, so the trait here is
//! synchronous; a platform backed by a real async crypto peripheral can
//! still implement it by blocking internally until its own completion
//! interrupt fires.

use crate::ErrorCode;

/// AES-128-CCM* as specified by IEEE 802.15.4-2015 9.2.2 Annex B: a
/// 16-byte key, a 13-byte nonce, and a caller-chosen MIC length (0, 4, 8
/// or 16 bytes for 802.15.4; Thread/MLE use 4).
pub trait Aes128Ccm {
    fn set_key(&mut self, key: &[u8; 16]) -> Result<(), ErrorCode>;
    fn set_nonce(&mut self, nonce: &[u8; 13]) -> Result<(), ErrorCode>;

    /// Encrypt `buf[m_off..m_off + m_len]` in place and append a
    /// `mic_len`-byte MIC immediately after it. `a_data` is authenticated
    /// but not encrypted (the frame header and any open payload fields).
    /// `buf` must have `mic_len` bytes of spare capacity past `m_off +
    /// m_len`.
    fn encrypt_in_place(
        &mut self,
        a_data: &[u8],
        buf: &mut [u8],
        m_off: usize,
        m_len: usize,
        mic_len: usize,
    ) -> Result<(), ErrorCode>;

    /// Verify and decrypt `buf[m_off..m_off + m_len]` in place, checking
    /// the `mic_len`-byte MIC that follows it. Returns `Err(ErrorCode::
    /// Fail)` on MIC mismatch; `buf` is left unmodified on failure.
    fn decrypt_in_place(
        &mut self,
        a_data: &[u8],
        buf: &mut [u8],
        m_off: usize,
        m_len: usize,
        mic_len: usize,
    ) -> Result<(), ErrorCode>;
}
