// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Software AES-128-CCM*, backed by the RustCrypto `aes`/`ccm` crates.
//!
//! Implements [`ot_hil::symmetric_encryption::Aes128Ccm`] so it can be
//! handed to [`crate::mac::Mac`] on platforms without a hardware crypto
//! accelerator, and by `ot-sim`'s test harness.

use aes::Aes128;
use ccm::{
    aead::{generic_array::GenericArray, AeadInPlace, KeyInit},
    consts::{U13, U4},
    Ccm,
};

use ot_hil::symmetric_encryption::Aes128Ccm;
use ot_hil::ErrorCode;

type Aes128Ccm4 = Ccm<Aes128, U4, U13>;

#[derive(Default)]
pub struct SoftwareAesCcm {
    key: [u8; 16],
    nonce: [u8; 13],
}

impl SoftwareAesCcm {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Aes128Ccm for SoftwareAesCcm {
    fn set_key(&mut self, key: &[u8; 16]) -> Result<(), ErrorCode> {
        self.key = *key;
        Ok(())
    }

    fn set_nonce(&mut self, nonce: &[u8; 13]) -> Result<(), ErrorCode> {
        self.nonce = *nonce;
        Ok(())
    }

    fn encrypt_in_place(
        &mut self,
        a_data: &[u8],
        buf: &mut [u8],
        m_off: usize,
        m_len: usize,
        mic_len: usize,
    ) -> Result<(), ErrorCode> {
        if mic_len != 4 {
            // The reference implementation only wires up the Thread/MLE
            // case (4-byte MIC); other lengths would need a different
            // `Ccm<Aes128, _, _>` monomorphization.
            return Err(ErrorCode::Invalid);
        }
        if buf.len() < m_off + m_len + mic_len {
            return Err(ErrorCode::Size);
        }
        let cipher = Aes128Ccm4::new(GenericArray::from_slice(&self.key));
        let nonce = GenericArray::from_slice(&self.nonce);
        let tag = cipher
            .encrypt_in_place_detached(nonce, a_data, &mut buf[m_off..m_off + m_len])
            .map_err(|_| ErrorCode::Fail)?;
        buf[m_off + m_len..m_off + m_len + mic_len].copy_from_slice(&tag);
        Ok(())
    }

    fn decrypt_in_place(
        &mut self,
        a_data: &[u8],
        buf: &mut [u8],
        m_off: usize,
        m_len: usize,
        mic_len: usize,
    ) -> Result<(), ErrorCode> {
        if mic_len != 4 {
            return Err(ErrorCode::Invalid);
        }
        if buf.len() < m_off + m_len + mic_len {
            return Err(ErrorCode::Size);
        }
        let cipher = Aes128Ccm4::new(GenericArray::from_slice(&self.key));
        let nonce = GenericArray::from_slice(&self.nonce);
        let tag = GenericArray::clone_from_slice(&buf[m_off + m_len..m_off + m_len + mic_len]);
        cipher
            .decrypt_in_place_detached(nonce, a_data, &mut buf[m_off..m_off + m_len], &tag)
            .map_err(|_| ErrorCode::Fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_ccm() -> SoftwareAesCcm {
        let mut ccm = SoftwareAesCcm::new();
        ccm.set_key(&[0x11; 16]).unwrap();
        ccm.set_nonce(&[0x22; 13]).unwrap();
        ccm
    }

    #[test]
    fn round_trips() {
        let mut buf = [0u8; 20];
        buf[0..8].copy_from_slice(b"payload!");
        new_ccm().encrypt_in_place(b"header", &mut buf, 0, 8, 4).unwrap();
        new_ccm().decrypt_in_place(b"header", &mut buf, 0, 8, 4).unwrap();
        assert_eq!(&buf[0..8], b"payload!");
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let mut buf = [0u8; 20];
        buf[0..8].copy_from_slice(b"payload!");
        new_ccm().encrypt_in_place(b"header", &mut buf, 0, 8, 4).unwrap();
        buf[0] ^= 0xff;
        assert!(new_ccm().decrypt_in_place(b"header", &mut buf, 0, 8, 4).is_err());
    }
}
