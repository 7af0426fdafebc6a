// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Pure Rust, heapless cryptographic core for a secure boot manager.
//!
//! Authenticates and decrypts firmware updates streamed through small
//! buffers, using keys that are either held in software or regenerated on
//! demand inside a hardware key unit.
#![no_std]

/// Crypto core errors
#[derive(Debug)]
pub enum Error {
    /// Failed to expand the extracted key
    InvalidExpansion(hkdf::InvalidLength),

    /// Invalid MAC key length
    InvalidKeyLength(digest::InvalidLength),

    /// Invalid ECC private key bytes
    InvalidKey(p256::elliptic_curve::Error),

    /// Malformed or non-verifying signature
    Signature(signature::Error),

    /// The random source failed
    Rng(rand_core::Error),

    /// Output buffer too small, nothing was written
    BufferTooSmall,

    /// Input length is not valid for the operation
    InvalidLength,

    /// Invalid padding on the last decrypted block
    InvalidPadding,

    /// Authentication tag mismatch
    AuthenticationFailed,

    /// Streaming operation called in the wrong state
    OutOfSequence,

    /// Malformed Key Reference
    InvalidKeyReference,

    /// Key Reference does not target this backend
    BackendMismatch,

    /// Key Reference names an algorithm this build does not provide
    AlgorithmMismatch,

    /// Backend not initialised or not set up
    NotInitialised,

    /// No key available for the requested operation
    KeyNotLoaded,

    /// Public key is not a valid curve point
    InvalidPublicKey,

    /// Could not produce a valid ECC scalar
    KeyGeneration,

    /// The hardware unit reported a failure.
    ///
    /// Returned by `CryptoHal` implementations that drive a real crypto
    /// unit. The core propagates it unchanged.
    Hardware,
}

/// Crypto core result.
pub type Result<T> = core::result::Result<T, Error>;

/// Algorithm identifier codec
pub mod algorithm;

/// Symmetric authentication primitives
pub mod auth;

/// AES-CBC block helpers
pub mod block;

/// Streaming decrypt engine
pub mod decrypt;

/// ECC key generation, derivation, signing and verification
pub mod ecc;

/// ECIES encryption
pub mod ecies;

/// The HAL/SoC crypto boundary
pub mod hal;

/// Segmented hash engine
pub mod hash;

/// Key Reference block
pub mod key_ref;

/// Symmetric key material
pub mod keys;

/// Session-level crypto services
pub mod services;

// Key Derivation Function module
mod kdf;

pub use services::CryptoServices;
