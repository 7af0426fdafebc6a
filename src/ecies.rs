// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! ECIES over P-256.
//!
//! The wire format is `ephemeral public key || AES-128-CBC ciphertext ||
//! HMAC-SHA256(ciphertext)`. Keys come from HKDF-SHA256 over the ECDH shared
//! secret, salted with the ephemeral public key.

use hmac::{Hmac, Mac};
use log::warn;
use p256::ecdh::diffie_hellman;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::{
    block::{cbc_decrypt, cbc_encrypt_padded, padded_len, strip_pkcs7, AES_BLOCK_LEN, AES_KEY_LEN},
    ecc::{decode_public_key, make_ecc_keys, EccPrivateKey, EccPublicKey, ECC_PUBLIC_KEY_LEN},
    hal::CryptoHal,
    kdf::kdf_sha256,
    Error, Result,
};

/// ECIES tag length.
pub const ECIES_TAG_LEN: usize = 32;

/// Bytes ECIES adds on top of the padded ciphertext.
pub const ECIES_OVERHEAD: usize = ECC_PUBLIC_KEY_LEN + ECIES_TAG_LEN;

const MAC_KEY_LEN: usize = 32;
const SCHEDULE_LEN: usize = AES_KEY_LEN + AES_BLOCK_LEN + MAC_KEY_LEN;

/// Size of the ECIES encryption of `plaintext_len` bytes.
pub const fn ecies_encrypted_len(plaintext_len: usize) -> usize {
    ECIES_OVERHEAD + padded_len(plaintext_len)
}

/// Output capacity `ecies_decrypt` needs for a `message_len` byte message.
///
/// This is the padded length, the recovered plaintext is up to one block
/// shorter.
pub const fn ecies_max_plaintext_len(message_len: usize) -> usize {
    message_len.saturating_sub(ECIES_OVERHEAD)
}

// AES key, IV and MAC key derived from one shared secret.
struct KeySchedule {
    aes_key: Zeroizing<[u8; AES_KEY_LEN]>,
    iv: [u8; AES_BLOCK_LEN],
    mac_key: Zeroizing<[u8; MAC_KEY_LEN]>,
}

impl KeySchedule {
    fn derive(shared_secret: &[u8], ephemeral_public: &EccPublicKey) -> Result<Self> {
        let mut okm = Zeroizing::new([0u8; SCHEDULE_LEN]);
        kdf_sha256(shared_secret, ephemeral_public, &[b"ECIES"], okm.as_mut())?;

        let (aes_key, rest) = okm.split_at(AES_KEY_LEN);
        let (iv, mac_key) = rest.split_at(AES_BLOCK_LEN);
        let mut schedule = KeySchedule {
            aes_key: Zeroizing::new([0u8; AES_KEY_LEN]),
            iv: [0u8; AES_BLOCK_LEN],
            mac_key: Zeroizing::new([0u8; MAC_KEY_LEN]),
        };
        schedule.aes_key.copy_from_slice(aes_key);
        schedule.iv.copy_from_slice(iv);
        schedule.mac_key.copy_from_slice(mac_key);

        Ok(schedule)
    }

    fn mac(&self) -> Result<Hmac<Sha256>> {
        <Hmac<Sha256> as Mac>::new_from_slice(self.mac_key.as_ref())
            .map_err(Error::InvalidKeyLength)
    }
}

/// Encrypts `msg` to `recipient`.
///
/// `out` must hold [`ecies_encrypted_len`] bytes, checked before anything is
/// written. Returns the message length.
pub fn ecies_encrypt<H: CryptoHal>(
    hal: &mut H,
    msg: &[u8],
    recipient: &EccPublicKey,
    out: &mut [u8],
) -> Result<usize> {
    let total = ecies_encrypted_len(msg.len());
    let out = out.get_mut(..total).ok_or(Error::BufferTooSmall)?;
    let recipient = decode_public_key(recipient)?;

    let ephemeral = make_ecc_keys(hal)?;
    let shared = diffie_hellman(
        ephemeral.private.secret_key()?.to_nonzero_scalar(),
        recipient.as_affine(),
    );
    let schedule = KeySchedule::derive(shared.raw_secret_bytes(), &ephemeral.public)?;

    let (public, rest) = out.split_at_mut(ECC_PUBLIC_KEY_LEN);
    let (body, tag) = rest.split_at_mut(total - ECIES_OVERHEAD);
    public.copy_from_slice(&ephemeral.public);
    cbc_encrypt_padded(&schedule.aes_key, &schedule.iv, msg, body)?;

    let mut mac = schedule.mac()?;
    mac.update(body);
    tag.copy_from_slice(&mac.finalize().into_bytes());

    Ok(total)
}

/// Decrypts an ECIES message addressed to `recipient`.
///
/// The tag is verified in constant time before any decryption. On any
/// failure `out` holds no plaintext. Returns the plaintext length.
pub fn ecies_decrypt(msg: &[u8], recipient: &EccPrivateKey, out: &mut [u8]) -> Result<usize> {
    let body_len = ecies_max_plaintext_len(msg.len());
    if msg.len() < ECIES_OVERHEAD + AES_BLOCK_LEN || body_len % AES_BLOCK_LEN != 0 {
        return Err(Error::InvalidLength);
    }
    let out = out.get_mut(..body_len).ok_or(Error::BufferTooSmall)?;

    let (public, rest) = msg.split_at(ECC_PUBLIC_KEY_LEN);
    let (body, tag) = rest.split_at(body_len);
    let mut ephemeral_public = [0u8; ECC_PUBLIC_KEY_LEN];
    ephemeral_public.copy_from_slice(public);

    let ephemeral = decode_public_key(&ephemeral_public)?;
    let shared = diffie_hellman(
        recipient.secret_key()?.to_nonzero_scalar(),
        ephemeral.as_affine(),
    );
    let schedule = KeySchedule::derive(shared.raw_secret_bytes(), &ephemeral_public)?;

    let mut mac = schedule.mac()?;
    mac.update(body);
    if mac.verify_slice(tag).is_err() {
        warn!("ECIES tag mismatch");
        return Err(Error::AuthenticationFailed);
    }

    cbc_decrypt(&schedule.aes_key, &schedule.iv, body, out)?;
    match strip_pkcs7(out) {
        Ok(plaintext_len) => Ok(plaintext_len),
        Err(e) => {
            out.zeroize();
            Err(e)
        }
    }
}
