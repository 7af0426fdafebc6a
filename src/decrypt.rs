// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Resumable AES-CBC decryption.
//!
//! Images larger than RAM are decrypted in chunks. The engine keeps the last
//! ciphertext block of each chunk as the IV of the next one, so callers never
//! deal with chaining themselves.
//!
//! Padding is validated on the last segment, but valid padding proves
//! nothing about authenticity: the MAC over the ciphertext has to be checked
//! separately.

use log::{error, warn};
use zeroize::Zeroize;

use crate::{
    block::{strip_pkcs7, AES_BLOCK_LEN},
    hal::CryptoHal,
    key_ref::KeyReference,
    keys::KeyType,
    Error, Result,
};

/// Observable phase of the decrypt session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecryptPhase {
    /// No session started.
    Uninitialized,

    /// Chaining state retained, more segments expected.
    InProgress,

    /// The last segment was processed.
    Closed,
}

enum DecryptState {
    Uninitialized,
    InProgress { chain: [u8; AES_BLOCK_LEN] },
    Closed,
}

/// The single in-flight decryption session.
pub struct StreamingDecrypt {
    state: DecryptState,
}

impl Default for StreamingDecrypt {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingDecrypt {
    /// A session that has not started yet.
    pub const fn new() -> Self {
        StreamingDecrypt {
            state: DecryptState::Uninitialized,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> DecryptPhase {
        match self.state {
            DecryptState::Uninitialized => DecryptPhase::Uninitialized,
            DecryptState::InProgress { .. } => DecryptPhase::InProgress,
            DecryptState::Closed => DecryptPhase::Closed,
        }
    }

    /// Starts a session chained from the IV bound to the encryption key and
    /// decrypts the first segment.
    ///
    /// # Parameters
    /// @hal: The backend executing AES. Provides the session IV.
    /// @key_ref: Names the encryption key.
    /// @ciphertext: A whole number of AES blocks.
    /// @out: Receives the plaintext. Must hold `ciphertext.len()` bytes.
    /// @is_last: Closes the session and strips the padding.
    ///
    /// Returns the number of plaintext bytes produced.
    pub fn decrypt_initial<H: CryptoHal>(
        &mut self,
        hal: &mut H,
        key_ref: &KeyReference<'_>,
        ciphertext: &[u8],
        out: &mut [u8],
        is_last: bool,
    ) -> Result<usize> {
        if let DecryptState::InProgress { .. } = self.state {
            error!("decrypt session restarted while in progress");
            return Err(Error::OutOfSequence);
        }

        let iv = hal.session_iv()?;
        self.segment(hal, key_ref, iv, ciphertext, out, is_last)
    }

    /// Continues the session with the next segment.
    ///
    /// Same rules as [`StreamingDecrypt::decrypt_initial`].
    pub fn decrypt_block<H: CryptoHal>(
        &mut self,
        hal: &mut H,
        key_ref: &KeyReference<'_>,
        ciphertext: &[u8],
        out: &mut [u8],
        is_last: bool,
    ) -> Result<usize> {
        let DecryptState::InProgress { chain } = self.state else {
            error!("decrypt block outside of a session");
            return Err(Error::OutOfSequence);
        };

        self.segment(hal, key_ref, chain, ciphertext, out, is_last)
    }

    fn segment<H: CryptoHal>(
        &mut self,
        hal: &mut H,
        key_ref: &KeyReference<'_>,
        iv: [u8; AES_BLOCK_LEN],
        ciphertext: &[u8],
        out: &mut [u8],
        is_last: bool,
    ) -> Result<usize> {
        let len = ciphertext.len();
        if len % AES_BLOCK_LEN != 0 || (is_last && len == 0) {
            return Err(Error::InvalidLength);
        }
        let out = out.get_mut(..len).ok_or(Error::BufferTooSmall)?;

        let mut chain = iv;
        if len > 0 {
            hal.regenerate_key(key_ref.device_specific(), KeyType::Encryption)?;
            if let Err(e) = hal.aes_cbc_decrypt(ciphertext, out, &iv) {
                // The session is left as it was, so the caller may retry.
                out.zeroize();
                return Err(e);
            }
            chain.copy_from_slice(&ciphertext[len - AES_BLOCK_LEN..]);
        }

        if !is_last {
            self.state = DecryptState::InProgress { chain };
            return Ok(len);
        }

        self.state = DecryptState::Closed;
        match strip_pkcs7(out) {
            Ok(plaintext_len) => Ok(plaintext_len),
            Err(e) => {
                warn!("decrypted image has invalid padding");
                out.zeroize();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{verify_tag, MacTag};
    use crate::block::cbc_encrypt_padded;
    use crate::key_ref::BackendKind;
    use crate::hal::tests::{software_hal, software_key_ref, TEST_AES_KEY, TEST_IV};
    use crate::hal::SoftwareHal;
    use rand_core::OsRng;

    const IMAGE: &[u8] = b"firmware image bytes that span more than four AES blocks!";

    fn ready_hal() -> SoftwareHal<OsRng> {
        let mut hal = software_hal();
        hal.init().unwrap();
        hal.setup(&software_key_ref()).unwrap();
        hal
    }

    fn encrypted_image() -> ([u8; 64], usize) {
        let mut ciphertext = [0u8; 64];
        let len = cbc_encrypt_padded(&TEST_AES_KEY, &TEST_IV, IMAGE, &mut ciphertext).unwrap();
        (ciphertext, len)
    }

    #[test]
    fn single_call_decrypts_and_unpads() {
        let mut hal = ready_hal();
        let (ciphertext, len) = encrypted_image();
        let mut out = [0u8; 64];

        let mut session = StreamingDecrypt::new();
        let key_ref = software_key_ref();
        let plaintext_len = session
            .decrypt_initial(&mut hal, &key_ref, &ciphertext[..len], &mut out, true)
            .unwrap();

        assert_eq!(&out[..plaintext_len], IMAGE);
        assert_eq!(session.phase(), DecryptPhase::Closed);
    }

    #[test]
    fn chunked_matches_single_call() {
        let mut hal = ready_hal();
        let key_ref = software_key_ref();
        let (ciphertext, len) = encrypted_image();
        assert_eq!(len, 64);

        let mut out = [0u8; 64];
        let mut session = StreamingDecrypt::new();
        let mut produced = session
            .decrypt_initial(&mut hal, &key_ref, &ciphertext[..16], &mut out[..16], false)
            .unwrap();
        assert_eq!(session.phase(), DecryptPhase::InProgress);

        produced += session
            .decrypt_block(&mut hal, &key_ref, &ciphertext[16..48], &mut out[16..48], false)
            .unwrap();
        produced += session
            .decrypt_block(&mut hal, &key_ref, &[], &mut out[48..48], false)
            .unwrap();
        produced += session
            .decrypt_block(&mut hal, &key_ref, &ciphertext[48..], &mut out[48..], true)
            .unwrap();

        assert_eq!(produced, IMAGE.len());
        assert_eq!(&out[..IMAGE.len()], IMAGE);
    }

    #[test]
    fn sequence_is_enforced() {
        let mut hal = ready_hal();
        let key_ref = software_key_ref();
        let (ciphertext, _) = encrypted_image();
        let mut out = [0u8; 64];
        let mut session = StreamingDecrypt::new();

        assert!(matches!(
            session.decrypt_block(&mut hal, &key_ref, &ciphertext[..16], &mut out, false),
            Err(Error::OutOfSequence)
        ));

        session
            .decrypt_initial(&mut hal, &key_ref, &ciphertext[..16], &mut out, false)
            .unwrap();
        assert!(matches!(
            session.decrypt_initial(&mut hal, &key_ref, &ciphertext[..16], &mut out, false),
            Err(Error::OutOfSequence)
        ));

        session
            .decrypt_block(&mut hal, &key_ref, &ciphertext[16..], &mut out, true)
            .unwrap();
        assert!(matches!(
            session.decrypt_block(&mut hal, &key_ref, &ciphertext[..16], &mut out, true),
            Err(Error::OutOfSequence)
        ));
    }

    #[test]
    fn shape_and_capacity_are_checked_before_writing() {
        let mut hal = ready_hal();
        let key_ref = software_key_ref();
        let (ciphertext, _) = encrypted_image();
        let mut session = StreamingDecrypt::new();

        let mut out = [0xaau8; 64];
        assert!(matches!(
            session.decrypt_initial(&mut hal, &key_ref, &ciphertext[..20], &mut out, false),
            Err(Error::InvalidLength)
        ));
        assert!(matches!(
            session.decrypt_initial(&mut hal, &key_ref, &ciphertext, &mut out[..48], true),
            Err(Error::BufferTooSmall)
        ));
        assert!(matches!(
            session.decrypt_initial(&mut hal, &key_ref, &[], &mut out, true),
            Err(Error::InvalidLength)
        ));
        assert!(out.iter().all(|&b| b == 0xaa));
        assert_eq!(session.phase(), DecryptPhase::Uninitialized);
    }

    fn genuine() -> [u8; 32] {
        let mut ciphertext = [0u8; 32];
        cbc_encrypt_padded(&TEST_AES_KEY, &TEST_IV, &IMAGE[..31], &mut ciphertext).unwrap();
        ciphertext
    }

    // Flipping a bit of the first ciphertext block flips the same bit of the
    // second plaintext block.
    fn tampered(offset: usize) -> [u8; 32] {
        let mut ciphertext = genuine();
        ciphertext[offset] ^= 0x01;
        ciphertext
    }

    #[test]
    fn corrupted_padding_fails_even_with_valid_mac() {
        let mut hal = ready_hal();
        let key_ref = software_key_ref();

        // The last plaintext byte goes from 0x01 to 0x00.
        let forged = tampered(15);
        let tag = hal.authenticate(&TEST_IV, &forged).unwrap();
        let recomputed = hal.authenticate(&TEST_IV, &forged).unwrap();
        assert!(verify_tag(&recomputed, &tag).is_ok());

        let mut out = [0u8; 32];
        let mut session = StreamingDecrypt::new();
        let result = session.decrypt_initial(&mut hal, &key_ref, &forged, &mut out, true);

        assert!(matches!(result, Err(Error::InvalidPadding)));
        assert_eq!(out, [0u8; 32]);
        assert_eq!(session.phase(), DecryptPhase::Closed);
    }

    #[test]
    fn valid_padding_is_not_authenticity() {
        let mut hal = ready_hal();
        let key_ref = software_key_ref();
        let tag = hal.authenticate(&TEST_IV, &genuine()).unwrap();

        // Only the first byte of the last plaintext block changes.
        let forged = tampered(0);
        let mut out = [0u8; 32];
        let mut session = StreamingDecrypt::new();
        let plaintext_len = session
            .decrypt_initial(&mut hal, &key_ref, &forged, &mut out, true)
            .unwrap();
        assert_eq!(plaintext_len, 31);

        let forged_tag = hal.authenticate(&TEST_IV, &forged).unwrap();
        assert!(matches!(
            verify_tag(&forged_tag, &tag),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn first_segment_chains_from_the_key_iv() {
        let mut hal = ready_hal();
        let key_ref = software_key_ref();
        assert_eq!(hal.session_iv().unwrap(), TEST_IV);

        // Encrypted under an IV the session keys do not carry.
        let mut ciphertext = [0u8; 64];
        let len = cbc_encrypt_padded(&TEST_AES_KEY, &[0u8; 16], IMAGE, &mut ciphertext).unwrap();

        let mut out = [0u8; 64];
        let plaintext_len = StreamingDecrypt::new()
            .decrypt_initial(&mut hal, &key_ref, &ciphertext[..len], &mut out, true)
            .unwrap();
        assert_eq!(plaintext_len, IMAGE.len());
        assert_ne!(out[..16], IMAGE[..16]);
        assert_eq!(out[16..plaintext_len], IMAGE[16..]);
    }

    // Fails the next `failures` AES calls after scribbling over the output.
    struct FailingHal {
        inner: SoftwareHal<OsRng>,
        failures: usize,
    }

    impl CryptoHal for FailingHal {
        fn kind(&self) -> BackendKind {
            self.inner.kind()
        }

        fn init(&mut self) -> Result<()> {
            self.inner.init()
        }

        fn quiesce(&mut self) {
            self.inner.quiesce()
        }

        fn setup(&mut self, key_ref: &KeyReference<'_>) -> Result<()> {
            self.inner.setup(key_ref)
        }

        fn regenerate_key(&mut self, device_specific: &[u8], key_type: KeyType) -> Result<()> {
            self.inner.regenerate_key(device_specific, key_type)
        }

        fn session_iv(&mut self) -> Result<[u8; AES_BLOCK_LEN]> {
            self.inner.session_iv()
        }

        fn aes_cbc_decrypt(
            &mut self,
            ciphertext: &[u8],
            plaintext: &mut [u8],
            iv: &[u8; AES_BLOCK_LEN],
        ) -> Result<()> {
            if self.failures > 0 {
                self.failures -= 1;
                plaintext.fill(0x55);
                return Err(Error::Hardware);
            }
            self.inner.aes_cbc_decrypt(ciphertext, plaintext, iv)
        }

        fn authenticate(&mut self, iv: &[u8], data: &[u8]) -> Result<MacTag> {
            self.inner.authenticate(iv, data)
        }

        fn fill_random(&mut self, buf: &mut [u8]) -> Result<()> {
            self.inner.fill_random(buf)
        }
    }

    #[test]
    fn hardware_failure_is_retryable() {
        let mut hal = FailingHal {
            inner: ready_hal(),
            failures: 0,
        };
        let key_ref = software_key_ref();
        let (ciphertext, len) = encrypted_image();
        let mut out = [0u8; 64];
        let mut session = StreamingDecrypt::new();

        session
            .decrypt_initial(&mut hal, &key_ref, &ciphertext[..16], &mut out[..16], false)
            .unwrap();

        hal.failures = 1;
        assert!(matches!(
            session.decrypt_block(&mut hal, &key_ref, &ciphertext[16..len], &mut out[16..], true),
            Err(Error::Hardware)
        ));
        assert!(out[16..].iter().all(|&b| b == 0));
        assert_eq!(session.phase(), DecryptPhase::InProgress);

        let produced = session
            .decrypt_block(&mut hal, &key_ref, &ciphertext[16..len], &mut out[16..], true)
            .unwrap();
        assert_eq!(16 + produced, IMAGE.len());
        assert_eq!(&out[..IMAGE.len()], IMAGE);
        assert_eq!(session.phase(), DecryptPhase::Closed);
    }
}
