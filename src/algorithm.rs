// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use flagset::{flags, FlagSet};

flags! {
    /// Key usage class bits. A key may carry several of them at once.
    pub enum KeyUsage: u8 {
        /// The key encrypts or decrypts.
        Encryption = 0b0001,

        /// The key authenticates (MAC or signature).
        Authentication = 0b0010,

        /// The key is regenerated by the hardware unit and never leaves it.
        DeviceBound = 0b0100,

        /// The key is an ordinary software-visible key.
        GeneralPurpose = 0b1000,
    }
}

const USAGE_SHIFT: u32 = 28;
const USAGE_MASK: u32 = 0xf;
const ORG_SHIFT: u32 = 16;
const ORG_MASK: u32 = 0xff;
const INDIVIDUAL_MASK: u32 = 0xffff;

/// Organisation identifier for the standard algorithm set.
pub const ORG_STANDARD: u8 = 0x00;

/// Individual identifier for AES-128 in CBC mode.
pub const ALG_AES_128_CBC: u16 = 0x0001;

/// Individual identifier for HMAC-SHA256.
pub const ALG_HMAC_SHA256: u16 = 0x0002;

/// Individual identifier for AES-CMAC-128.
pub const ALG_CMAC_128: u16 = 0x0003;

/// Packs a usage nibble, an organisation and an individual algorithm value
/// into the 32-bit wire representation.
///
/// Bits 31..28 carry the usage flags, bits 23..16 the organisation and bits
/// 15..0 the algorithm. Bits 27..24 are reserved and always zero.
pub const fn encode(usage: u8, org_id: u8, individual_id: u16) -> u32 {
    ((usage as u32 & USAGE_MASK) << USAGE_SHIFT)
        | ((org_id as u32) << ORG_SHIFT)
        | individual_id as u32
}

/// The usage nibble of a packed identifier.
pub const fn usage(id: u32) -> u8 {
    ((id >> USAGE_SHIFT) & USAGE_MASK) as u8
}

/// The organisation of a packed identifier.
pub const fn org_id(id: u32) -> u8 {
    ((id >> ORG_SHIFT) & ORG_MASK) as u8
}

/// The individual algorithm value of a packed identifier.
pub const fn individual_id(id: u32) -> u16 {
    (id & INDIVIDUAL_MASK) as u16
}

/// A decoded algorithm identifier.
///
/// The packed `u32` form only exists at serialization boundaries, see
/// [`AlgorithmId::from_raw`] and [`AlgorithmId::to_raw`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AlgorithmId {
    /// Usage class flags.
    pub usage: FlagSet<KeyUsage>,

    /// Owning organisation.
    pub org: u8,

    /// Algorithm within the organisation.
    pub individual: u16,
}

impl AlgorithmId {
    /// Builds an identifier from its fields.
    pub fn new(usage: impl Into<FlagSet<KeyUsage>>, org: u8, individual: u16) -> Self {
        AlgorithmId {
            usage: usage.into(),
            org,
            individual,
        }
    }

    /// Decodes a packed identifier. Reserved bits are ignored.
    pub fn from_raw(raw: u32) -> Self {
        AlgorithmId {
            usage: FlagSet::new_truncated(usage(raw)),
            org: org_id(raw),
            individual: individual_id(raw),
        }
    }

    /// Packs the identifier for the wire.
    pub fn to_raw(&self) -> u32 {
        encode(self.usage.bits(), self.org, self.individual)
    }

    /// Whether the named key is regenerated in hardware.
    pub fn is_device_bound(&self) -> bool {
        self.usage.contains(KeyUsage::DeviceBound)
    }

    /// AES-128-CBC encryption with a software key.
    pub fn aes_128_cbc() -> Self {
        Self::new(
            KeyUsage::GeneralPurpose | KeyUsage::Encryption,
            ORG_STANDARD,
            ALG_AES_128_CBC,
        )
    }

    /// HMAC-SHA256 authentication with a software key.
    pub fn hmac_sha256() -> Self {
        Self::new(
            KeyUsage::GeneralPurpose | KeyUsage::Authentication,
            ORG_STANDARD,
            ALG_HMAC_SHA256,
        )
    }

    /// CMAC-128 authentication with a software key.
    pub fn cmac_128() -> Self {
        Self::new(
            KeyUsage::GeneralPurpose | KeyUsage::Authentication,
            ORG_STANDARD,
            ALG_CMAC_128,
        )
    }

    /// The same algorithm, with the key regenerated by the hardware unit.
    pub fn device_bound(self) -> Self {
        let usage = (self.usage - KeyUsage::GeneralPurpose) | KeyUsage::DeviceBound;
        AlgorithmId { usage, ..self }
    }
}

impl From<u32> for AlgorithmId {
    fn from(raw: u32) -> Self {
        AlgorithmId::from_raw(raw)
    }
}

impl From<AlgorithmId> for u32 {
    fn from(id: AlgorithmId) -> Self {
        id.to_raw()
    }
}
