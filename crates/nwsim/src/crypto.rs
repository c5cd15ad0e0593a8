// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Link-layer crypto primitives.
//!
//! The CCM peripheral and the AAR both funnel through here. Two operating
//! modes exist, selected by the `RealEncryption` command-line switch:
//!
//! * real: AES-CCM with a 4-byte MIC and 13-byte nonce for packets, plain
//!   AES-128 for address resolution.
//! * pass-through: packet payloads are copied unencrypted and the MIC is
//!   all zeros; lengths and layout are identical to the real mode so timing
//!   is unaffected. Address resolution always runs the real AES-128 - a
//!   resolver that cannot resolve would make the mode useless.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use ccm::aead::AeadInPlace;
use ccm::consts::{U13, U4};
use ccm::Ccm;

use crate::{Result, SimError};

/// BLE link layer CCM: AES-128, 4-byte MIC, 13-byte nonce.
type Aes128Ccm = Ccm<Aes128, U4, U13>;

/// Length of the CCM MIC in bytes.
pub const MIC_LEN: usize = 4;

/// Length of the CCM nonce in bytes.
pub const NONCE_LEN: usize = 13;

/// The crypto engine handed to the CCM and AAR models.
pub struct BleCrypt {
    real: bool,
}

impl BleCrypt {
    pub fn new(real_encryption: bool) -> Self {
        Self {
            real: real_encryption,
        }
    }

    /// One AES-128 block encryption; key and data big-endian as the AAR
    /// feeds them.
    pub fn aes128(&self, key_be: &[u8; 16], data_be: &[u8; 16]) -> [u8; 16] {
        let cipher = Aes128::new(GenericArray::from_slice(key_be));
        let mut block = GenericArray::clone_from_slice(data_be);
        cipher.encrypt_block(&mut block);
        block.into()
    }

    /// Encrypt `payload` into `out` and append the MIC.
    ///
    /// `out` must hold `payload.len() + MIC_LEN` bytes. `aad` is the single
    /// masked header byte the link layer authenticates.
    pub fn encrypt_packet(
        &self,
        aad: u8,
        payload: &[u8],
        out: &mut [u8],
        key_be: &[u8; 16],
        nonce: &[u8; NONCE_LEN],
    ) -> Result {
        debug_assert!(out.len() >= payload.len() + MIC_LEN);
        if !self.real {
            out[..payload.len()].copy_from_slice(payload);
            out[payload.len()..payload.len() + MIC_LEN].fill(0);
            return Ok(());
        }
        let cipher = Aes128Ccm::new(GenericArray::from_slice(key_be));
        let mut buf = payload.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(GenericArray::from_slice(nonce), &[aad], &mut buf)
            .map_err(|_| SimError::Internal("CCM encryption failed".into()))?;
        out[..buf.len()].copy_from_slice(&buf);
        out[buf.len()..buf.len() + MIC_LEN].copy_from_slice(&tag);
        Ok(())
    }

    /// Verify-and-decrypt `cipher_and_mic` into `out`.
    ///
    /// Returns `Ok(true)` when the MIC verified, `Ok(false)` otherwise (the
    /// decrypted output is zeroed on MIC failure; firmware is expected to
    /// look at MICSTATUS before touching the payload).
    pub fn decrypt_packet(
        &self,
        aad: u8,
        cipher_and_mic: &[u8],
        out: &mut [u8],
        key_be: &[u8; 16],
        nonce: &[u8; NONCE_LEN],
    ) -> Result<bool> {
        if cipher_and_mic.len() < MIC_LEN {
            return Err(SimError::Internal(
                "CCM decrypt input shorter than the MIC".into(),
            ));
        }
        let payload_len = cipher_and_mic.len() - MIC_LEN;
        debug_assert!(out.len() >= payload_len);
        if !self.real {
            out[..payload_len].copy_from_slice(&cipher_and_mic[..payload_len]);
            return Ok(true);
        }
        let cipher = Aes128Ccm::new(GenericArray::from_slice(key_be));
        let mut buf = cipher_and_mic[..payload_len].to_vec();
        let tag = GenericArray::from_slice(&cipher_and_mic[payload_len..]);
        match cipher.decrypt_in_place_detached(GenericArray::from_slice(nonce), &[aad], &mut buf, tag)
        {
            Ok(()) => {
                out[..payload_len].copy_from_slice(&buf);
                Ok(true)
            }
            Err(_) => {
                out[..payload_len].fill(0);
                Ok(false)
            }
        }
    }
}

/// Build the 13-byte CCM nonce from the link-layer material:
/// 39-bit packet counter (little-endian), direction bit, 8-byte IV.
pub fn ccm_nonce(iv: &[u8; 8], packet_counter: u64, direction: u8) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    let mut ctr = packet_counter;
    for slot in nonce.iter_mut().take(4) {
        *slot = (ctr & 0xFF) as u8;
        ctr >>= 8;
    }
    nonce[4] = ((ctr & 0x7F) as u8) | if direction == 1 { 0x80 } else { 0 };
    nonce[5..].copy_from_slice(iv);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material() -> ([u8; 16], [u8; NONCE_LEN]) {
        let key = [
            0x89, 0x67, 0x45, 0x23, 0x01, 0xEF, 0xCD, 0xAB, 0x89, 0x67, 0x45, 0x23, 0x01, 0xEF,
            0xCD, 0xAB,
        ];
        let nonce = ccm_nonce(&[1, 2, 3, 4, 5, 6, 7, 8], 0x12_3456_7890 & 0x7F_FFFF_FFFF, 1);
        (key, nonce)
    }

    #[test]
    fn nonce_layout() {
        let nonce = ccm_nonce(&[0xAA; 8], 0x7F_FFFF_FFFF, 1);
        assert_eq!(&nonce[0..4], &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(nonce[4], 0x7F | 0x80);
        assert_eq!(&nonce[5..], &[0xAA; 8]);
        let nonce = ccm_nonce(&[0x00; 8], 1, 0);
        assert_eq!(nonce[0], 1);
        assert_eq!(nonce[4], 0);
    }

    #[test]
    fn real_round_trip_and_mic_failure() {
        let (key, nonce) = material();
        let crypt = BleCrypt::new(true);
        let clear = [0x11u8, 0x22, 0x33, 0x44, 0x55];
        let mut wire = [0u8; 5 + MIC_LEN];
        crypt
            .encrypt_packet(0x03, &clear, &mut wire, &key, &nonce)
            .unwrap();
        assert_ne!(&wire[..5], &clear[..]);

        let mut back = [0u8; 5];
        assert!(crypt
            .decrypt_packet(0x03, &wire, &mut back, &key, &nonce)
            .unwrap());
        assert_eq!(back, clear);

        // A single corrupted ciphertext byte must break the MIC.
        wire[2] ^= 0x40;
        assert!(!crypt
            .decrypt_packet(0x03, &wire, &mut back, &key, &nonce)
            .unwrap());
    }

    #[test]
    fn aad_is_authenticated() {
        let (key, nonce) = material();
        let crypt = BleCrypt::new(true);
        let clear = [9u8; 7];
        let mut wire = [0u8; 7 + MIC_LEN];
        crypt
            .encrypt_packet(0x03, &clear, &mut wire, &key, &nonce)
            .unwrap();
        let mut back = [0u8; 7];
        assert!(!crypt
            .decrypt_packet(0x02, &wire, &mut back, &key, &nonce)
            .unwrap());
    }

    #[test]
    fn passthrough_keeps_lengths_and_content() {
        let (key, nonce) = material();
        let crypt = BleCrypt::new(false);
        let clear = [1u8, 2, 3];
        let mut wire = [0u8; 3 + MIC_LEN];
        crypt
            .encrypt_packet(0x03, &clear, &mut wire, &key, &nonce)
            .unwrap();
        assert_eq!(&wire[..3], &clear[..]);
        assert_eq!(&wire[3..], &[0, 0, 0, 0]);
        let mut back = [0u8; 3];
        assert!(crypt
            .decrypt_packet(0x03, &wire, &mut back, &key, &nonce)
            .unwrap());
        assert_eq!(back, clear);
    }

    #[test]
    fn aes128_matches_fips_vector() {
        // FIPS-197 appendix C.1
        let key: [u8; 16] = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f,
        ];
        let plain: [u8; 16] = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ];
        let expect: [u8; 16] = [
            0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
            0xc5, 0x5a,
        ];
        let crypt = BleCrypt::new(true);
        assert_eq!(crypt.aes128(&key, &plain), expect);
    }
}
