// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use log::{debug, info};

use crate::{
    auth::{verify_tag, MacTag},
    decrypt::{DecryptPhase, StreamingDecrypt},
    ecc::{make_ecc_keys, EccKeyPair, EccPublicKey},
    ecies::ecies_encrypt,
    hal::CryptoHal,
    hash::{HashContext, HashPhase, SegmentedHash, Sha256Digest},
    key_ref::KeyReference,
    keys::KeyType,
    Result,
};

/// The crypto services of one boot or update session.
///
/// Owns the HAL backend, both segmented hash contexts and the single
/// streaming decrypt session. The backend is quiesced when the services are
/// dropped.
pub struct CryptoServices<H: CryptoHal> {
    hal: H,
    hashes: SegmentedHash,
    decrypt: StreamingDecrypt,
}

impl<H: CryptoHal> CryptoServices<H> {
    /// Brings the backend up and configures it from a Key Reference.
    ///
    /// # Parameters
    /// @hal: The backend executing primitives.
    /// @key_ref: The provisioned Key Reference for this device.
    pub fn initialise(mut hal: H, key_ref: &KeyReference<'_>) -> Result<Self> {
        if let Err(e) = hal.init().and_then(|_| hal.setup(key_ref)) {
            hal.quiesce();
            return Err(e);
        }
        info!("crypto services initialised, {:?} backend", hal.kind());

        Ok(CryptoServices {
            hal,
            hashes: SegmentedHash::new(),
            decrypt: StreamingDecrypt::new(),
        })
    }

    /// See [`SegmentedHash::start`].
    pub fn hash_start(&mut self, context: HashContext, data: &[u8]) -> Result<()> {
        self.hashes.start(context, data)
    }

    /// See [`SegmentedHash::update`].
    pub fn hash_update(
        &mut self,
        context: HashContext,
        data: &[u8],
        is_final: bool,
    ) -> Result<Option<Sha256Digest>> {
        self.hashes.update(context, data, is_final)
    }

    /// Current phase of a hash context.
    pub fn hash_phase(&self, context: HashContext) -> HashPhase {
        self.hashes.phase(context)
    }

    /// See [`StreamingDecrypt::decrypt_initial`].
    pub fn decrypt_initial(
        &mut self,
        key_ref: &KeyReference<'_>,
        ciphertext: &[u8],
        out: &mut [u8],
        is_last: bool,
    ) -> Result<usize> {
        self.decrypt
            .decrypt_initial(&mut self.hal, key_ref, ciphertext, out, is_last)
    }

    /// See [`StreamingDecrypt::decrypt_block`].
    pub fn decrypt_block(
        &mut self,
        key_ref: &KeyReference<'_>,
        ciphertext: &[u8],
        out: &mut [u8],
        is_last: bool,
    ) -> Result<usize> {
        self.decrypt
            .decrypt_block(&mut self.hal, key_ref, ciphertext, out, is_last)
    }

    /// Current phase of the decrypt session.
    pub fn decrypt_phase(&self) -> DecryptPhase {
        self.decrypt.phase()
    }

    /// Tag over `iv || data` under the authentication key named by `key_ref`.
    pub fn authenticate(
        &mut self,
        key_ref: &KeyReference<'_>,
        iv: &[u8],
        data: &[u8],
    ) -> Result<MacTag> {
        self.hal
            .regenerate_key(key_ref.device_specific(), KeyType::Authentication)?;
        self.hal.authenticate(iv, data)
    }

    /// Recomputes the tag over `iv || data` and compares it with `expected`
    /// in constant time.
    pub fn verify_mac(
        &mut self,
        key_ref: &KeyReference<'_>,
        iv: &[u8],
        data: &[u8],
        expected: &[u8],
    ) -> Result<()> {
        let computed = self.authenticate(key_ref, iv, data)?;
        verify_tag(&computed, expected)
    }

    /// One-shot SHA-256 through the backend.
    pub fn sha256(&mut self, data: &[u8]) -> Result<Sha256Digest> {
        self.hal.sha256(data)
    }

    /// Fills `buf` with random bytes. Failure is never masked.
    pub fn random(&mut self, buf: &mut [u8]) -> Result<()> {
        self.hal.fill_random(buf)
    }

    /// See [`make_ecc_keys`].
    pub fn make_ecc_keys(&mut self) -> Result<EccKeyPair> {
        make_ecc_keys(&mut self.hal)
    }

    /// See [`ecies_encrypt`].
    pub fn ecies_encrypt(
        &mut self,
        msg: &[u8],
        recipient: &EccPublicKey,
        out: &mut [u8],
    ) -> Result<usize> {
        ecies_encrypt(&mut self.hal, msg, recipient, out)
    }

    /// Erases every key the backend holds.
    pub fn quiesce(&mut self) {
        self.hal.quiesce();
    }
}

impl<H: CryptoHal> Drop for CryptoServices<H> {
    fn drop(&mut self) {
        self.hal.quiesce();
        debug!("crypto services released");
    }
}
