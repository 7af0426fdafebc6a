// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! The boundary between the crypto core and whatever executes primitives.
//!
//! A backend either holds keys as software buffers ([`SoftwareHal`]) or keeps
//! them inside a key unit that regenerates them on demand from a Key
//! Reference ([`DeviceBoundHal`]). No backend hands key bytes back across
//! this boundary.

use log::warn;
use sha2::{Digest, Sha256};

use crate::{
    auth::{Authenticator, MacTag},
    block::AES_BLOCK_LEN,
    hash::Sha256Digest,
    key_ref::{BackendKind, KeyReference},
    keys::KeyType,
    Error, Result,
};

mod device;
mod software;

pub use device::{DeviceBoundHal, SESSION_IV_LABEL, UNIQUE_SECRET_LEN};
pub use software::SoftwareHal;

/// Primitive operations the crypto core delegates.
///
/// Every method reports failure through its `Result`; callers propagate it
/// unchanged and never fall back to another backend.
pub trait CryptoHal {
    /// Which kind of Key Reference this backend serves.
    fn kind(&self) -> BackendKind;

    /// Brings the backend up. Must precede every other call.
    fn init(&mut self) -> Result<()>;

    /// Erases any key material the backend holds.
    ///
    /// Safe to call at any time, any number of times.
    fn quiesce(&mut self);

    /// One-time configuration from a Key Reference.
    fn setup(&mut self, key_ref: &KeyReference<'_>) -> Result<()>;

    /// Makes the `key_type` key available to the next keyed primitive.
    ///
    /// The regenerated key never leaves the backend.
    fn regenerate_key(&mut self, device_specific: &[u8], key_type: KeyType) -> Result<()>;

    /// The IV bound to the encryption key of the configured session.
    ///
    /// A streaming decryption chains its first segment from this IV.
    fn session_iv(&mut self) -> Result<[u8; AES_BLOCK_LEN]>;

    /// Raw AES-CBC decryption of whole blocks under the encryption key.
    fn aes_cbc_decrypt(
        &mut self,
        ciphertext: &[u8],
        plaintext: &mut [u8],
        iv: &[u8; AES_BLOCK_LEN],
    ) -> Result<()>;

    /// Tag over `iv || data` under the authentication key, using the
    /// configured authenticator.
    fn authenticate(&mut self, iv: &[u8], data: &[u8]) -> Result<MacTag>;

    /// One-shot SHA-256.
    fn sha256(&mut self, data: &[u8]) -> Result<Sha256Digest> {
        Ok(Sha256::digest(data).into())
    }

    /// Fills `buf` from a cryptographically secure source.
    fn fill_random(&mut self, buf: &mut [u8]) -> Result<()>;
}

// Checks shared by every backend's `setup`.
fn check_setup<A: Authenticator>(kind: BackendKind, key_ref: &KeyReference<'_>) -> Result<()> {
    if key_ref.backend()? != kind {
        warn!("key reference does not target the {:?} backend", kind);
        return Err(Error::BackendMismatch);
    }

    if key_ref.auth_algorithm.individual != A::ALGORITHM {
        warn!(
            "key reference names authentication algorithm {:#06x}, build provides {:#06x}",
            key_ref.auth_algorithm.individual,
            A::ALGORITHM
        );
        return Err(Error::AlgorithmMismatch);
    }

    Ok(())
}
