// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::block::{AES_BLOCK_LEN, AES_KEY_LEN};
use crate::hal::CryptoHal;
use crate::Result;

/// Authentication key length.
pub const AUTH_KEY_LEN: usize = 32;

/// The two key roles a hardware unit can regenerate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyType {
    /// The image encryption key.
    Encryption,

    /// The image authentication key.
    Authentication,
}

impl KeyType {
    /// Transforms KeyType into a derivation label.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            KeyType::Encryption => b"SBM_Encryption",
            KeyType::Authentication => b"SBM_Authentication",
        }
    }
}

/// Software-held symmetric keys for one encryption/authentication session.
///
/// Erased when dropped.
pub struct SymmetricKeyMaterial {
    aes_key: [u8; AES_KEY_LEN],
    iv: [u8; AES_BLOCK_LEN],
    auth_key: [u8; AUTH_KEY_LEN],
}

impl Zeroize for SymmetricKeyMaterial {
    fn zeroize(&mut self) {
        self.aes_key.zeroize();
        self.iv.zeroize();
        self.auth_key.zeroize();
    }
}

impl Drop for SymmetricKeyMaterial {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for SymmetricKeyMaterial {}

impl SymmetricKeyMaterial {
    /// Key material constructor.
    ///
    /// # Parameters
    /// @aes_key: The AES-128 key.
    /// @iv: The CBC initialization vector.
    /// @auth_key: The HMAC key. CMAC uses its first 16 bytes.
    pub fn new(
        aes_key: [u8; AES_KEY_LEN],
        iv: [u8; AES_BLOCK_LEN],
        auth_key: [u8; AUTH_KEY_LEN],
    ) -> Self {
        SymmetricKeyMaterial {
            aes_key,
            iv,
            auth_key,
        }
    }

    /// Fresh random key material from the HAL random source.
    pub fn generate<H: CryptoHal>(hal: &mut H) -> Result<Self> {
        let mut keys =
            SymmetricKeyMaterial::new([0; AES_KEY_LEN], [0; AES_BLOCK_LEN], [0; AUTH_KEY_LEN]);
        hal.fill_random(&mut keys.aes_key)?;
        hal.fill_random(&mut keys.iv)?;
        hal.fill_random(&mut keys.auth_key)?;

        Ok(keys)
    }

    /// The AES-128 key.
    pub fn aes_key(&self) -> &[u8; AES_KEY_LEN] {
        &self.aes_key
    }

    /// The CBC initialization vector.
    pub fn iv(&self) -> &[u8; AES_BLOCK_LEN] {
        &self.iv
    }

    /// The authentication key.
    pub fn auth_key(&self) -> &[u8; AUTH_KEY_LEN] {
        &self.auth_key
    }
}
