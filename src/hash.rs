// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use log::error;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// SHA-256 digest length.
pub const SHA256_DIGEST_LEN: usize = 32;

/// A SHA-256 digest.
pub type Sha256Digest = [u8; SHA256_DIGEST_LEN];

/// The two independently addressable segmented hash contexts.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HashContext {
    /// Context 1, covering a whole update.
    Update,

    /// Context 2, covering the payload of the command being parsed.
    Command,
}

impl HashContext {
    fn index(self) -> usize {
        match self {
            HashContext::Update => 0,
            HashContext::Command => 1,
        }
    }
}

/// Observable phase of a hash context.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HashPhase {
    /// Never started.
    Idle,

    /// Started and accepting data.
    Accumulating,

    /// A digest was emitted. The context must be started again.
    Finalized,
}

#[derive(Clone)]
enum HashState {
    Idle,
    Accumulating(Sha256),
    Finalized,
}

/// Two incremental SHA-256 computations that progress independently.
///
/// Feeding a message in any number of chunks yields the digest of the
/// concatenated chunks.
pub struct SegmentedHash {
    contexts: [HashState; 2],
}

impl Default for SegmentedHash {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentedHash {
    /// Both contexts start idle.
    pub const fn new() -> Self {
        SegmentedHash {
            contexts: [HashState::Idle, HashState::Idle],
        }
    }

    /// Current phase of `context`.
    pub fn phase(&self, context: HashContext) -> HashPhase {
        match self.contexts[context.index()] {
            HashState::Idle => HashPhase::Idle,
            HashState::Accumulating(_) => HashPhase::Accumulating,
            HashState::Finalized => HashPhase::Finalized,
        }
    }

    /// Starts a digest on `context` and feeds it the first chunk.
    ///
    /// A context that already emitted its digest may be started again. A
    /// context still accumulating may not.
    pub fn start(&mut self, context: HashContext, data: &[u8]) -> Result<()> {
        let state = &mut self.contexts[context.index()];
        if let HashState::Accumulating(_) = state {
            error!("hash context {:?} started while accumulating", context);
            return Err(Error::OutOfSequence);
        }

        let mut sha = Sha256::new();
        sha.update(data);
        *state = HashState::Accumulating(sha);

        Ok(())
    }

    /// Feeds `data` to `context`.
    ///
    /// When `is_final` is set the digest is returned and the context moves to
    /// [`HashPhase::Finalized`]. `data` may be empty, which finalizes without
    /// further input.
    pub fn update(
        &mut self,
        context: HashContext,
        data: &[u8],
        is_final: bool,
    ) -> Result<Option<Sha256Digest>> {
        let state = &mut self.contexts[context.index()];
        let HashState::Accumulating(sha) = state else {
            error!("hash context {:?} updated before start", context);
            return Err(Error::OutOfSequence);
        };

        sha.update(data);
        if !is_final {
            return Ok(None);
        }

        let digest: Sha256Digest = sha.finalize_reset().into();
        *state = HashState::Finalized;

        Ok(Some(digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_of(hex_digest: &str) -> Sha256Digest {
        let mut digest = [0u8; SHA256_DIGEST_LEN];
        hex::decode_to_slice(hex_digest, &mut digest).unwrap();
        digest
    }

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn abc_known_answer() {
        let mut hashes = SegmentedHash::new();
        hashes.start(HashContext::Update, b"abc").unwrap();
        let digest = hashes.update(HashContext::Update, &[], true).unwrap();
        assert_eq!(digest, Some(digest_of(ABC_SHA256)));
        assert_eq!(hashes.phase(HashContext::Update), HashPhase::Finalized);
    }

    #[test]
    fn split_chunks_match_one_shot() {
        let mut hashes = SegmentedHash::new();
        hashes.start(HashContext::Command, b"").unwrap();
        assert_eq!(hashes.update(HashContext::Command, b"a", false).unwrap(), None);
        let digest = hashes.update(HashContext::Command, b"bc", true).unwrap();
        assert_eq!(digest, Some(digest_of(ABC_SHA256)));

        let message = [0x5au8; 1000];
        let expected: Sha256Digest = Sha256::digest(message).into();
        hashes.start(HashContext::Command, &message[..1]).unwrap();
        hashes.update(HashContext::Command, &message[1..63], false).unwrap();
        hashes.update(HashContext::Command, &message[63..640], false).unwrap();
        let digest = hashes.update(HashContext::Command, &message[640..], true).unwrap();
        assert_eq!(digest, Some(expected));
    }

    #[test]
    fn contexts_are_independent() {
        let mut hashes = SegmentedHash::new();
        hashes.start(HashContext::Update, b"a").unwrap();
        hashes.start(HashContext::Command, b"xyz").unwrap();
        hashes.update(HashContext::Update, b"b", false).unwrap();
        let command = hashes.update(HashContext::Command, &[], true).unwrap();
        let update = hashes.update(HashContext::Update, b"c", true).unwrap();

        assert_eq!(update, Some(digest_of(ABC_SHA256)));
        assert_eq!(command, Some(Sha256::digest(b"xyz").into()));
    }

    #[test]
    fn out_of_sequence_calls_fail() {
        let mut hashes = SegmentedHash::new();
        assert!(matches!(
            hashes.update(HashContext::Update, b"a", false),
            Err(Error::OutOfSequence)
        ));

        hashes.start(HashContext::Update, b"a").unwrap();
        assert!(matches!(
            hashes.start(HashContext::Update, b"a"),
            Err(Error::OutOfSequence)
        ));

        hashes.update(HashContext::Update, b"", true).unwrap();
        assert!(matches!(
            hashes.update(HashContext::Update, b"a", true),
            Err(Error::OutOfSequence)
        ));

        // A finalized context can be reused once restarted.
        hashes.start(HashContext::Update, b"abc").unwrap();
        assert_eq!(
            hashes.update(HashContext::Update, &[], true).unwrap(),
            Some(digest_of(ABC_SHA256))
        );
    }
}
