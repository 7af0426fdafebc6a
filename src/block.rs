// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use aes::Aes128;
use cipher::{
    block_padding::{Padding, Pkcs7},
    consts::U16,
    BlockDecryptMut, BlockEncryptMut, KeyIvInit,
};
use generic_array::GenericArray;

use crate::{Error, Result};

/// AES block length.
pub const AES_BLOCK_LEN: usize = 16;

/// AES-128 key length.
pub const AES_KEY_LEN: usize = 16;

type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;

/// Raw AES-128-CBC decryption of whole blocks, no padding handling.
///
/// `plaintext` must be exactly as long as `ciphertext`.
pub(crate) fn cbc_decrypt(
    key: &[u8; AES_KEY_LEN],
    iv: &[u8; AES_BLOCK_LEN],
    ciphertext: &[u8],
    plaintext: &mut [u8],
) -> Result<()> {
    if ciphertext.len() % AES_BLOCK_LEN != 0 || plaintext.len() != ciphertext.len() {
        return Err(Error::InvalidLength);
    }

    let mut decryptor =
        Aes128CbcDec::new(GenericArray::from_slice(key), GenericArray::from_slice(iv));
    for (input, output) in ciphertext
        .chunks_exact(AES_BLOCK_LEN)
        .zip(plaintext.chunks_exact_mut(AES_BLOCK_LEN))
    {
        decryptor.decrypt_block_b2b_mut(
            GenericArray::from_slice(input),
            GenericArray::from_mut_slice(output),
        );
    }

    Ok(())
}

/// AES-128-CBC encryption with PKCS#7 padding into `out`.
///
/// Returns the ciphertext length.
pub(crate) fn cbc_encrypt_padded(
    key: &[u8; AES_KEY_LEN],
    iv: &[u8; AES_BLOCK_LEN],
    plaintext: &[u8],
    out: &mut [u8],
) -> Result<usize> {
    let encryptor =
        Aes128CbcEnc::new(GenericArray::from_slice(key), GenericArray::from_slice(iv));
    let ciphertext = encryptor
        .encrypt_padded_b2b_mut::<Pkcs7>(plaintext, out)
        .map_err(|_| Error::BufferTooSmall)?;

    Ok(ciphertext.len())
}

/// Length of the PKCS#7-padded form of `len` bytes.
pub const fn padded_len(len: usize) -> usize {
    (len / AES_BLOCK_LEN + 1) * AES_BLOCK_LEN
}

/// Validates the PKCS#7 padding of the final block of `plaintext` and returns
/// the unpadded length.
pub(crate) fn strip_pkcs7(plaintext: &[u8]) -> Result<usize> {
    let tail_start = plaintext
        .len()
        .checked_sub(AES_BLOCK_LEN)
        .ok_or(Error::InvalidLength)?;
    let tail = GenericArray::<u8, U16>::from_slice(&plaintext[tail_start..]);
    let kept = <Pkcs7 as Padding<U16>>::unpad(tail)
        .map_err(|_| Error::InvalidPadding)?
        .len();

    Ok(tail_start + kept)
}
