// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use crate::{algorithm::AlgorithmId, Error, Result};

/// Size of the fixed Key Reference header: two algorithm identifiers and the
/// device-specific payload length, all little-endian `u32`s.
pub const KEY_REFERENCE_HEADER_LEN: usize = 12;

/// Which side of the HAL boundary holds the keys named by a Key Reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// Keys are ordinary buffers held by software.
    Software,

    /// Keys are regenerated inside the hardware unit and never leave it.
    DeviceBound,
}

/// A Key Reference block.
///
/// Names the encryption and authentication algorithms of a device and
/// carries the opaque payload the hardware unit regenerates keys from. The
/// payload is borrowed from the provisioned record, never copied.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KeyReference<'a> {
    /// Encryption algorithm.
    pub encrypt_algorithm: AlgorithmId,

    /// Authentication algorithm.
    pub auth_algorithm: AlgorithmId,

    device_specific: &'a [u8],
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    let field = bytes
        .get(offset..offset + 4)
        .ok_or(Error::InvalidKeyReference)?;
    Ok(u32::from_le_bytes([field[0], field[1], field[2], field[3]]))
}

impl<'a> KeyReference<'a> {
    /// Key Reference constructor.
    ///
    /// # Parameters
    /// @encrypt_algorithm: The encryption algorithm identifier.
    /// @auth_algorithm: The authentication algorithm identifier.
    /// @device_specific: The payload used to regenerate device-bound keys.
    pub fn new(
        encrypt_algorithm: AlgorithmId,
        auth_algorithm: AlgorithmId,
        device_specific: &'a [u8],
    ) -> Self {
        KeyReference {
            encrypt_algorithm,
            auth_algorithm,
            device_specific,
        }
    }

    /// Parses a persisted Key Reference.
    ///
    /// The declared payload length must fit in `bytes`. Anything after the
    /// payload is not part of the block and is ignored.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let encrypt_algorithm = AlgorithmId::from_raw(read_u32(bytes, 0)?);
        let auth_algorithm = AlgorithmId::from_raw(read_u32(bytes, 4)?);
        let len = read_u32(bytes, 8)? as usize;

        let device_specific = bytes
            .get(KEY_REFERENCE_HEADER_LEN..)
            .and_then(|payload| payload.get(..len))
            .ok_or(Error::InvalidKeyReference)?;

        Ok(KeyReference {
            encrypt_algorithm,
            auth_algorithm,
            device_specific,
        })
    }

    /// Writes the persisted layout into `out` and returns its length.
    pub fn encode(&self, out: &mut [u8]) -> Result<usize> {
        let len = self.encoded_len();
        let out = out.get_mut(..len).ok_or(Error::BufferTooSmall)?;
        let payload_len =
            u32::try_from(self.device_specific.len()).map_err(|_| Error::InvalidKeyReference)?;

        out[0..4].copy_from_slice(&self.encrypt_algorithm.to_raw().to_le_bytes());
        out[4..8].copy_from_slice(&self.auth_algorithm.to_raw().to_le_bytes());
        out[8..12].copy_from_slice(&payload_len.to_le_bytes());
        out[KEY_REFERENCE_HEADER_LEN..].copy_from_slice(self.device_specific);

        Ok(len)
    }

    /// Length of the persisted layout.
    pub fn encoded_len(&self) -> usize {
        KEY_REFERENCE_HEADER_LEN + self.device_specific.len()
    }

    /// The opaque device-specific payload.
    pub fn device_specific(&self) -> &'a [u8] {
        self.device_specific
    }

    /// The backend able to serve this reference.
    ///
    /// Both algorithms must agree on whether their key is device-bound.
    pub fn backend(&self) -> Result<BackendKind> {
        match (
            self.encrypt_algorithm.is_device_bound(),
            self.auth_algorithm.is_device_bound(),
        ) {
            (true, true) => Ok(BackendKind::DeviceBound),
            (false, false) => Ok(BackendKind::Software),
            _ => Err(Error::BackendMismatch),
        }
    }
}
