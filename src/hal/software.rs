// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use core::marker::PhantomData;

use log::debug;
use rand_core::{CryptoRng, RngCore};

use super::{check_setup, CryptoHal};
use crate::{
    auth::{Authenticator, ConfiguredAuth, MacTag},
    block::{cbc_decrypt, AES_BLOCK_LEN},
    key_ref::{BackendKind, KeyReference},
    keys::{KeyType, SymmetricKeyMaterial},
    Error, Result,
};

/// Pure-software backend.
///
/// Keys are held as ordinary buffers and erased on [`CryptoHal::quiesce`].
pub struct SoftwareHal<R, A = ConfiguredAuth> {
    keys: Option<SymmetricKeyMaterial>,
    rng: R,
    initialised: bool,
    configured: bool,

    _pd_a: PhantomData<A>,
}

impl<R: RngCore + CryptoRng, A: Authenticator> SoftwareHal<R, A> {
    /// Software backend constructor.
    ///
    /// # Parameters
    /// @keys: The session key material. Owned, and erased on quiesce.
    /// @rng: The random source.
    pub fn new(keys: SymmetricKeyMaterial, rng: R) -> Self {
        SoftwareHal {
            keys: Some(keys),
            rng,
            initialised: false,
            configured: false,
            _pd_a: PhantomData,
        }
    }

    /// Installs key material for a new session, replacing and erasing any
    /// previous one.
    pub fn load_keys(&mut self, keys: SymmetricKeyMaterial) {
        self.keys = Some(keys);
    }

    fn keys(&self) -> Result<&SymmetricKeyMaterial> {
        if !self.configured {
            return Err(Error::NotInitialised);
        }
        self.keys.as_ref().ok_or(Error::KeyNotLoaded)
    }
}

impl<R: RngCore + CryptoRng, A: Authenticator> CryptoHal for SoftwareHal<R, A> {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn init(&mut self) -> Result<()> {
        self.initialised = true;
        Ok(())
    }

    fn quiesce(&mut self) {
        // Dropping the key material erases it.
        self.keys = None;
        self.configured = false;
        self.initialised = false;
        debug!("software backend quiesced");
    }

    fn setup(&mut self, key_ref: &KeyReference<'_>) -> Result<()> {
        if !self.initialised {
            return Err(Error::NotInitialised);
        }
        check_setup::<A>(self.kind(), key_ref)?;
        self.configured = true;

        Ok(())
    }

    fn regenerate_key(&mut self, _device_specific: &[u8], _key_type: KeyType) -> Result<()> {
        // Software keys are resident, there is nothing to regenerate.
        self.keys().map(|_| ())
    }

    fn session_iv(&mut self) -> Result<[u8; AES_BLOCK_LEN]> {
        Ok(*self.keys()?.iv())
    }

    fn aes_cbc_decrypt(
        &mut self,
        ciphertext: &[u8],
        plaintext: &mut [u8],
        iv: &[u8; AES_BLOCK_LEN],
    ) -> Result<()> {
        cbc_decrypt(self.keys()?.aes_key(), iv, ciphertext, plaintext)
    }

    fn authenticate(&mut self, iv: &[u8], data: &[u8]) -> Result<MacTag> {
        let auth_key = self.keys()?.auth_key();
        A::authenticate(&auth_key[..A::KEY_LEN], iv, data)
    }

    fn fill_random(&mut self, buf: &mut [u8]) -> Result<()> {
        self.rng.try_fill_bytes(buf).map_err(Error::Rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Cmac128;
    use crate::block::cbc_encrypt_padded;
    use crate::decrypt::StreamingDecrypt;
    use crate::hal::tests::{software_hal, software_key_ref, TEST_AUTH_KEY, TEST_IV};
    use rand_core::OsRng;

    #[test]
    fn primitives_require_setup() {
        let mut hal = software_hal();
        let mut out = [0u8; 16];
        assert!(matches!(
            hal.aes_cbc_decrypt(&[0u8; 16], &mut out, &TEST_IV),
            Err(Error::NotInitialised)
        ));
        assert!(matches!(
            hal.setup(&software_key_ref()),
            Err(Error::NotInitialised)
        ));

        hal.init().unwrap();
        hal.setup(&software_key_ref()).unwrap();
        assert!(hal.aes_cbc_decrypt(&[0u8; 16], &mut out, &TEST_IV).is_ok());
    }

    #[test]
    fn quiesce_erases_keys() {
        let mut hal = software_hal();
        hal.quiesce();
        hal.init().unwrap();
        hal.setup(&software_key_ref()).unwrap();
        assert!(matches!(
            hal.authenticate(&TEST_IV, b"data"),
            Err(Error::KeyNotLoaded)
        ));
        assert!(matches!(
            hal.regenerate_key(&[], KeyType::Authentication),
            Err(Error::KeyNotLoaded)
        ));

        // Quiescing twice is harmless.
        hal.quiesce();
        hal.quiesce();
    }

    #[test]
    fn authenticate_uses_configured_key_prefix() {
        let keys = SymmetricKeyMaterial::new([0; 16], TEST_IV, TEST_AUTH_KEY);
        let mut hal = SoftwareHal::<_, Cmac128>::new(keys, OsRng);
        hal.init().unwrap();
        hal.setup(&KeyReference::new(
            crate::algorithm::AlgorithmId::aes_128_cbc(),
            crate::algorithm::AlgorithmId::cmac_128(),
            &[],
        ))
        .unwrap();

        let tag = hal.authenticate(&TEST_IV, b"image").unwrap();
        let expected = Cmac128::authenticate(&TEST_AUTH_KEY[..16], &TEST_IV, b"image").unwrap();
        assert_eq!(tag, expected);
    }

    #[test]
    fn load_keys_starts_a_new_session() {
        let key_ref = software_key_ref();
        let mut hal = software_hal();
        hal.quiesce();

        let next = SymmetricKeyMaterial::new([0x61; 16], [0x62; 16], [0x63; 32]);
        hal.load_keys(next);
        hal.init().unwrap();
        hal.setup(&key_ref).unwrap();
        assert_eq!(hal.session_iv().unwrap(), [0x62; 16]);

        let mut ciphertext = [0u8; 32];
        let len =
            cbc_encrypt_padded(&[0x61; 16], &[0x62; 16], b"second session", &mut ciphertext)
                .unwrap();
        let mut out = [0u8; 32];
        let plaintext_len = StreamingDecrypt::new()
            .decrypt_initial(&mut hal, &key_ref, &ciphertext[..len], &mut out, true)
            .unwrap();
        assert_eq!(&out[..plaintext_len], b"second session");
    }
}
