// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Symmetric authentication primitives.
//!
//! A device is provisioned with exactly one of HMAC-SHA256 or CMAC-128. The
//! choice is made at build time through the `hmac-auth` / `cmac-auth`
//! features and surfaces as [`ConfiguredAuth`].
//!
//! Tags are always computed over `iv || data`, never over `data` alone.

use aes::Aes128;
use arrayvec::ArrayVec;
use cmac::Cmac;
use hmac::{Hmac, Mac};
use log::warn;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::algorithm::{ALG_CMAC_128, ALG_HMAC_SHA256};
use crate::{Error, Result};

#[cfg(all(feature = "hmac-auth", feature = "cmac-auth"))]
compile_error!("features `hmac-auth` and `cmac-auth` are mutually exclusive");

#[cfg(not(any(feature = "hmac-auth", feature = "cmac-auth")))]
compile_error!("one of the `hmac-auth` or `cmac-auth` features must be enabled");

/// Largest tag any authenticator produces.
pub const MAX_MAC_LEN: usize = 32;

/// An authentication tag.
pub type MacTag = ArrayVec<u8, MAX_MAC_LEN>;

/// A symmetric authentication primitive.
pub trait Authenticator {
    /// Individual algorithm identifier, as found in a Key Reference.
    const ALGORITHM: u16;

    /// Key length in bytes.
    const KEY_LEN: usize;

    /// Computes the tag over `iv || data` under `key`.
    fn authenticate(key: &[u8], iv: &[u8], data: &[u8]) -> Result<MacTag>;
}

/// HMAC-SHA256, 32-byte key and tag.
pub struct HmacSha256;

/// AES-CMAC-128, 16-byte key and tag.
pub struct Cmac128;

fn tag_from_mac<M: Mac>(mut mac: M, iv: &[u8], data: &[u8]) -> Result<MacTag> {
    mac.update(iv);
    mac.update(data);

    let mut tag = MacTag::new();
    tag.try_extend_from_slice(&mac.finalize().into_bytes())
        .map_err(|_| Error::BufferTooSmall)?;

    Ok(tag)
}

impl Authenticator for HmacSha256 {
    const ALGORITHM: u16 = ALG_HMAC_SHA256;
    const KEY_LEN: usize = 32;

    fn authenticate(key: &[u8], iv: &[u8], data: &[u8]) -> Result<MacTag> {
        let mac = <Hmac<Sha256> as Mac>::new_from_slice(key).map_err(Error::InvalidKeyLength)?;
        tag_from_mac(mac, iv, data)
    }
}

impl Authenticator for Cmac128 {
    const ALGORITHM: u16 = ALG_CMAC_128;
    const KEY_LEN: usize = 16;

    fn authenticate(key: &[u8], iv: &[u8], data: &[u8]) -> Result<MacTag> {
        let mac = <Cmac<Aes128> as Mac>::new_from_slice(key).map_err(Error::InvalidKeyLength)?;
        tag_from_mac(mac, iv, data)
    }
}

/// The authenticator this build was configured with.
#[cfg(feature = "hmac-auth")]
pub type ConfiguredAuth = HmacSha256;

/// The authenticator this build was configured with.
#[cfg(feature = "cmac-auth")]
pub type ConfiguredAuth = Cmac128;

/// Constant-time comparison of a computed tag with the expected one.
pub fn verify_tag(computed: &MacTag, expected: &[u8]) -> Result<()> {
    if bool::from(computed.as_slice().ct_eq(expected)) {
        Ok(())
    } else {
        warn!("authentication tag mismatch");
        Err(Error::AuthenticationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 4231, test case 2, split across the IV prefix and the data.
    #[test]
    fn hmac_known_answer() {
        let tag = HmacSha256::authenticate(b"Jefe", b"what do ya want ", b"for nothing?").unwrap();
        let mut expected = [0u8; 32];
        hex::decode_to_slice(
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843",
            &mut expected,
        )
        .unwrap();
        assert_eq!(tag.as_slice(), &expected);
    }

    // RFC 4493, example 2.
    #[test]
    fn cmac_known_answer() {
        let mut key = [0u8; 16];
        let mut message = [0u8; 16];
        let mut expected = [0u8; 16];
        hex::decode_to_slice("2b7e151628aed2a6abf7158809cf4f3c", &mut key).unwrap();
        hex::decode_to_slice("6bc1bee22e409f96e93d7e117393172a", &mut message).unwrap();
        hex::decode_to_slice("070a16b46b4d4144f79bdd9dd04a287c", &mut expected).unwrap();

        let tag = Cmac128::authenticate(&key, &message[..5], &message[5..]).unwrap();
        assert_eq!(tag.as_slice(), &expected);
    }

    #[test]
    fn iv_prefix_is_authenticated() {
        let key = [3u8; 32];
        let with_iv = HmacSha256::authenticate(&key, &[1u8; 16], b"image").unwrap();
        let without_iv = HmacSha256::authenticate(&key, &[], b"image").unwrap();
        assert_ne!(with_iv, without_iv);
    }

    #[test]
    fn verify_tag_is_exact() {
        let tag = Cmac128::authenticate(&[9u8; 16], &[0u8; 16], b"data").unwrap();
        assert!(verify_tag(&tag, &tag).is_ok());

        let mut flipped = tag.clone();
        flipped[0] ^= 1;
        assert!(matches!(
            verify_tag(&tag, &flipped),
            Err(Error::AuthenticationFailed)
        ));
        assert!(matches!(
            verify_tag(&tag, &tag[..8]),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        assert!(matches!(
            Cmac128::authenticate(&[0u8; 7], &[], b""),
            Err(Error::InvalidKeyLength(_))
        ));
    }
}
