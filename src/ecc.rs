// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use generic_array::GenericArray;
use log::warn;
use p256::{
    ecdsa::{Signature, SigningKey, VerifyingKey},
    elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint},
    EncodedPoint, FieldBytes, PublicKey, SecretKey,
};
use sha2::{Digest, Sha256};
use signature::hazmat::{PrehashSigner, PrehashVerifier};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    hal::CryptoHal,
    hash::Sha256Digest,
    kdf::{kdf_sha256, ASYM_SALT},
    Error, Result,
};

/// P-256 coordinate and scalar length.
pub const ECC_COORD_LEN: usize = 32;

/// Uncompressed public key length, `x || y` without the SEC1 tag.
pub const ECC_PUBLIC_KEY_LEN: usize = 2 * ECC_COORD_LEN;

/// Signature length, `r || s`.
pub const ECC_SIGNATURE_LEN: usize = 2 * ECC_COORD_LEN;

/// A P-256 public key, `x || y`.
pub type EccPublicKey = [u8; ECC_PUBLIC_KEY_LEN];

/// An ECDSA P-256 signature, `r || s`.
pub type EccSignature = [u8; ECC_SIGNATURE_LEN];

// Random scalars outside [1, n) are redrawn. The odds of needing more than a
// couple of draws are negligible.
const MAX_SCALAR_ATTEMPTS: u8 = 16;

/// Key derivation roles.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DerivationTag {
    /// The manufacturer signing key.
    ManufacturingSignature,

    /// The device signing key.
    DeviceSignature,

    /// The device encryption (ECIES) key.
    DeviceEncryption,
}

impl DerivationTag {
    /// Transforms DerivationTag into its provisioning label.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            DerivationTag::ManufacturingSignature => b"mnfSign",
            DerivationTag::DeviceSignature => b"devSign",
            DerivationTag::DeviceEncryption => b"devEnc",
        }
    }
}

/// A P-256 private scalar, erased when dropped.
pub struct EccPrivateKey([u8; ECC_COORD_LEN]);

impl Zeroize for EccPrivateKey {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for EccPrivateKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for EccPrivateKey {}

impl EccPrivateKey {
    /// Wraps a big-endian scalar.
    pub fn from_bytes(bytes: [u8; ECC_COORD_LEN]) -> Self {
        EccPrivateKey(bytes)
    }

    /// The big-endian scalar.
    pub fn as_bytes(&self) -> &[u8; ECC_COORD_LEN] {
        &self.0
    }

    pub(crate) fn secret_key(&self) -> Result<SecretKey> {
        SecretKey::from_bytes(FieldBytes::from_slice(&self.0)).map_err(Error::InvalidKey)
    }
}

/// A P-256 key pair.
pub struct EccKeyPair {
    /// The public key.
    pub public: EccPublicKey,

    /// The private scalar.
    pub private: EccPrivateKey,
}

impl EccKeyPair {
    fn from_secret(secret: &SecretKey) -> Self {
        let mut scalar = secret.to_bytes();
        let mut private = [0u8; ECC_COORD_LEN];
        private.copy_from_slice(&scalar);
        scalar.as_mut_slice().zeroize();

        EccKeyPair {
            public: encode_public_key(&secret.public_key()),
            private: EccPrivateKey(private),
        }
    }
}

pub(crate) fn encode_public_key(public_key: &PublicKey) -> EccPublicKey {
    let point = public_key.to_encoded_point(false);
    let mut public = [0u8; ECC_PUBLIC_KEY_LEN];
    // Skip the SEC1 uncompressed tag.
    public.copy_from_slice(&point.as_bytes()[1..]);
    public
}

pub(crate) fn decode_public_key(public: &EccPublicKey) -> Result<PublicKey> {
    let point = EncodedPoint::from_untagged_bytes(GenericArray::from_slice(public));
    Option::from(PublicKey::from_encoded_point(&point)).ok_or(Error::InvalidPublicKey)
}

/// Generates a uniformly random key pair from the HAL random source.
pub fn make_ecc_keys<H: CryptoHal>(hal: &mut H) -> Result<EccKeyPair> {
    let mut candidate = [0u8; ECC_COORD_LEN];

    for _ in 0..MAX_SCALAR_ATTEMPTS {
        hal.fill_random(&mut candidate)?;
        if let Ok(secret) = SecretKey::from_bytes(FieldBytes::from_slice(&candidate)) {
            candidate.zeroize();
            return Ok(EccKeyPair::from_secret(&secret));
        }
    }

    candidate.zeroize();
    Err(Error::KeyGeneration)
}

/// Deterministically derives a key pair from a device seed and a role.
///
/// The same seed and tag always produce the same pair. Different tags give
/// unrelated pairs.
pub fn derive_ecc_key(seed: &[u8], tag: DerivationTag) -> Result<EccKeyPair> {
    let mut private_key_bytes = [0u8; ECC_COORD_LEN];

    for counter in 0..MAX_SCALAR_ATTEMPTS {
        kdf_sha256(
            seed,
            &ASYM_SALT,
            &[b"Key_Pair", tag.as_bytes(), &[counter]],
            &mut private_key_bytes,
        )?;
        if let Ok(secret) = SecretKey::from_bytes(FieldBytes::from_slice(&private_key_bytes)) {
            private_key_bytes.zeroize();
            return Ok(EccKeyPair::from_secret(&secret));
        }
    }

    private_key_bytes.zeroize();
    Err(Error::KeyGeneration)
}

// SHA-256 over the logical concatenation of both buffers.
fn digest_of(buf1: &[u8], buf2: Option<&[u8]>) -> Sha256Digest {
    let mut sha = Sha256::new();
    sha.update(buf1);
    if let Some(buf2) = buf2 {
        sha.update(buf2);
    }
    sha.finalize().into()
}

/// Signs a pre-computed SHA-256 digest.
pub fn sign_hash(hash: &Sha256Digest, private: &EccPrivateKey) -> Result<EccSignature> {
    let signing_key = SigningKey::from(private.secret_key()?);
    let signature: Signature = signing_key.sign_prehash(hash).map_err(Error::Signature)?;

    let mut out = [0u8; ECC_SIGNATURE_LEN];
    out.copy_from_slice(&signature.to_bytes());
    Ok(out)
}

/// Hashes `buf1 || buf2` and signs the digest.
///
/// `buf2` covers payloads split over two regions, e.g. a code image and its
/// companion key-update blob.
pub fn hash_and_sign(
    buf1: &[u8],
    buf2: Option<&[u8]>,
    private: &EccPrivateKey,
) -> Result<EccSignature> {
    sign_hash(&digest_of(buf1, buf2), private)
}

/// Verifies a signature over a pre-computed SHA-256 digest.
pub fn verify_hash(
    hash: &Sha256Digest,
    public: &EccPublicKey,
    signature: &EccSignature,
) -> Result<()> {
    let verifying_key = VerifyingKey::from(decode_public_key(public)?);
    let signature = Signature::from_slice(signature).map_err(Error::Signature)?;

    verifying_key
        .verify_prehash(hash, &signature)
        .map_err(|e| {
            warn!("signature verification failed");
            Error::Signature(e)
        })
}

/// Hashes `buf1 || buf2` and verifies the signature over the digest.
pub fn hash_and_verify(
    buf1: &[u8],
    buf2: Option<&[u8]>,
    public: &EccPublicKey,
    signature: &EccSignature,
) -> Result<()> {
    verify_hash(&digest_of(buf1, buf2), public, signature)
}

/// Verifies a signature over a single contiguous buffer.
pub fn verify_single_buffer(
    buf: &[u8],
    public: &EccPublicKey,
    signature: &EccSignature,
) -> Result<()> {
    hash_and_verify(buf, None, public, signature)
}
