// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use core::marker::PhantomData;

use log::{debug, warn};
use rand_core::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{check_setup, CryptoHal};
use crate::{
    auth::{Authenticator, ConfiguredAuth, MacTag},
    block::{cbc_decrypt, AES_BLOCK_LEN, AES_KEY_LEN},
    kdf::kdf_sha256,
    key_ref::{BackendKind, KeyReference},
    keys::KeyType,
    Error, Result,
};

/// Length of the device-unique secret.
pub const UNIQUE_SECRET_LEN: usize = 32;

const SLOT_KEY_LEN: usize = 32;

/// Derivation label of the session IV.
pub const SESSION_IV_LABEL: &[u8] = b"SBM_IV";

// A regenerated key. Lives from `regenerate_key` to the next keyed primitive.
struct KeySlot {
    key_type: KeyType,
    key: [u8; SLOT_KEY_LEN],
}

impl Zeroize for KeySlot {
    fn zeroize(&mut self) {
        self.key.zeroize();
    }
}

impl Drop for KeySlot {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for KeySlot {}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum UnitState {
    Off,
    Ready,
    Configured,
}

/// Hardware-delegated backend.
///
/// Models a key unit holding a device-unique secret. Keys are regenerated
/// inside the unit from that secret, the Key Reference payload and the key
/// role, consumed by exactly one primitive, then erased. Neither the secret
/// nor a regenerated key is reachable from outside.
pub struct DeviceBoundHal<R, A = ConfiguredAuth> {
    unique_secret: [u8; UNIQUE_SECRET_LEN],
    rng: R,
    state: UnitState,
    slot: Option<KeySlot>,
    iv: [u8; AES_BLOCK_LEN],

    _pd_a: PhantomData<A>,
}

impl<R, A> Zeroize for DeviceBoundHal<R, A> {
    fn zeroize(&mut self) {
        self.unique_secret.zeroize();
        self.iv.zeroize();
        self.slot = None;
    }
}

impl<R, A> Drop for DeviceBoundHal<R, A> {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl<R, A> ZeroizeOnDrop for DeviceBoundHal<R, A> {}

impl<R: RngCore + CryptoRng, A: Authenticator> DeviceBoundHal<R, A> {
    /// Device-bound backend constructor.
    ///
    /// # Parameters
    /// @unique_secret: The device root of trust the unit derives keys from.
    /// @rng: The random source.
    pub fn new(unique_secret: [u8; UNIQUE_SECRET_LEN], rng: R) -> Self {
        DeviceBoundHal {
            unique_secret,
            rng,
            state: UnitState::Off,
            slot: None,
            iv: [0u8; AES_BLOCK_LEN],
            _pd_a: PhantomData,
        }
    }

    // Hands out the regenerated key for one operation, erasing the slot.
    fn take_key(&mut self, key_type: KeyType) -> Result<KeySlot> {
        match self.slot.take() {
            Some(slot) if slot.key_type == key_type => Ok(slot),
            _ => {
                warn!("no {:?} key regenerated before use", key_type);
                Err(Error::KeyNotLoaded)
            }
        }
    }
}

impl<R: RngCore + CryptoRng, A: Authenticator> CryptoHal for DeviceBoundHal<R, A> {
    fn kind(&self) -> BackendKind {
        BackendKind::DeviceBound
    }

    fn init(&mut self) -> Result<()> {
        if self.state == UnitState::Off {
            self.state = UnitState::Ready;
        }
        Ok(())
    }

    fn quiesce(&mut self) {
        self.slot = None;
        self.iv.zeroize();
        self.state = UnitState::Off;
        debug!("device key unit quiesced");
    }

    fn setup(&mut self, key_ref: &KeyReference<'_>) -> Result<()> {
        if self.state == UnitState::Off {
            return Err(Error::NotInitialised);
        }
        check_setup::<A>(self.kind(), key_ref)?;
        if key_ref.device_specific().is_empty() {
            warn!("device-bound key reference without a payload");
            return Err(Error::InvalidKeyReference);
        }
        kdf_sha256(
            &self.unique_secret,
            key_ref.device_specific(),
            &[b"SBM_Key", SESSION_IV_LABEL],
            &mut self.iv,
        )?;
        self.state = UnitState::Configured;
        debug!("device key unit configured");

        Ok(())
    }

    fn regenerate_key(&mut self, device_specific: &[u8], key_type: KeyType) -> Result<()> {
        if self.state != UnitState::Configured {
            return Err(Error::NotInitialised);
        }

        let mut slot = KeySlot {
            key_type,
            key: [0u8; SLOT_KEY_LEN],
        };
        kdf_sha256(
            &self.unique_secret,
            device_specific,
            &[b"SBM_Key", key_type.as_bytes()],
            &mut slot.key,
        )?;
        self.slot = Some(slot);

        Ok(())
    }

    fn session_iv(&mut self) -> Result<[u8; AES_BLOCK_LEN]> {
        if self.state != UnitState::Configured {
            return Err(Error::NotInitialised);
        }
        Ok(self.iv)
    }

    fn aes_cbc_decrypt(
        &mut self,
        ciphertext: &[u8],
        plaintext: &mut [u8],
        iv: &[u8; AES_BLOCK_LEN],
    ) -> Result<()> {
        let slot = self.take_key(KeyType::Encryption)?;
        let mut aes_key = [0u8; AES_KEY_LEN];
        aes_key.copy_from_slice(&slot.key[..AES_KEY_LEN]);

        let result = cbc_decrypt(&aes_key, iv, ciphertext, plaintext);
        aes_key.zeroize();

        result
    }

    fn authenticate(&mut self, iv: &[u8], data: &[u8]) -> Result<MacTag> {
        let slot = self.take_key(KeyType::Authentication)?;
        A::authenticate(&slot.key[..A::KEY_LEN], iv, data)
    }

    fn fill_random(&mut self, buf: &mut [u8]) -> Result<()> {
        self.rng.try_fill_bytes(buf).map_err(Error::Rng)
    }
}
