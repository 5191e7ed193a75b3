//! Per-chunk content encryption
//!
//! Encrypted chunk format (binary):
//! ```text
//! [nonce][ciphertext][16 bytes: tag]
//! AAD = chunk_index (8 bytes, big-endian) || header nonce
//! ```
//!
//! The AAD binds each chunk to its position and to its file header, so
//! chunks cannot be reordered, truncated in the middle or moved between files.

use rayon::prelude::*;
use sealfs_core::{Scheme, SealError, SealResult};

use crate::header::FileHeader;
use crate::masterkey::Masterkey;
use crate::sizes::ChunkGeometry;
use crate::{aead, CLEARTEXT_CHUNK_SIZE, TAG_SIZE};

#[derive(Debug, Clone, Copy)]
pub struct FileContentCryptor<'a> {
    masterkey: &'a Masterkey,
    scheme: Scheme,
}

impl<'a> FileContentCryptor<'a> {
    pub(crate) fn new(masterkey: &'a Masterkey, scheme: Scheme) -> Self {
        Self { masterkey, scheme }
    }

    pub fn cleartext_chunk_size(&self) -> usize {
        CLEARTEXT_CHUNK_SIZE
    }

    pub fn ciphertext_chunk_size(&self) -> usize {
        CLEARTEXT_CHUNK_SIZE + self.overhead()
    }

    pub fn geometry(&self) -> ChunkGeometry {
        ChunkGeometry::for_scheme(self.scheme)
    }

    fn overhead(&self) -> usize {
        aead::nonce_size(self.scheme) + TAG_SIZE
    }

    /// Encrypt one chunk of at most `cleartext_chunk_size` bytes.
    ///
    /// Returns `[nonce][ciphertext][tag]`.
    pub fn encrypt_chunk(
        &self,
        cleartext: &[u8],
        chunk_index: u64,
        header: &FileHeader,
    ) -> SealResult<Vec<u8>> {
        if cleartext.is_empty() || cleartext.len() > CLEARTEXT_CHUNK_SIZE {
            return Err(SealError::InvalidArgument(format!(
                "cleartext chunk must be 1..={CLEARTEXT_CHUNK_SIZE} bytes, got {}",
                cleartext.len()
            )));
        }
        self.masterkey.ensure_alive()?;

        let nonce = aead::random_nonce(self.scheme);
        let aad = build_aad(chunk_index, header);
        let sealed = aead::seal(self.scheme, header.content_key(), &nonce, cleartext, &aad)?;

        let mut result = Vec::with_capacity(nonce.len() + sealed.len());
        result.extend_from_slice(&nonce);
        result.extend_from_slice(&sealed);
        Ok(result)
    }

    /// Decrypt one chunk. Nothing is returned unless the tag verifies.
    pub fn decrypt_chunk(
        &self,
        ciphertext: &[u8],
        chunk_index: u64,
        header: &FileHeader,
    ) -> SealResult<Vec<u8>> {
        if ciphertext.len() <= self.overhead() || ciphertext.len() > self.ciphertext_chunk_size() {
            return Err(SealError::InvalidArgument(format!(
                "ciphertext chunk must be {}..={} bytes, got {}",
                self.overhead() + 1,
                self.ciphertext_chunk_size(),
                ciphertext.len()
            )));
        }
        self.masterkey.ensure_alive()?;

        let (nonce, sealed) = ciphertext.split_at(aead::nonce_size(self.scheme));
        let aad = build_aad(chunk_index, header);
        aead::open(
            self.scheme,
            header.content_key(),
            nonce,
            sealed,
            &aad,
            "file content chunk",
        )
    }

    /// Encrypt a whole payload, chunks in parallel. The result excludes the header.
    pub fn encrypt_payload(&self, cleartext: &[u8], header: &FileHeader) -> SealResult<Vec<u8>> {
        let chunks = cleartext
            .par_chunks(CLEARTEXT_CHUNK_SIZE)
            .enumerate()
            .map(|(index, chunk)| self.encrypt_chunk(chunk, index as u64, header))
            .collect::<SealResult<Vec<_>>>()?;
        Ok(chunks.concat())
    }

    /// Decrypt a whole payload produced by [`Self::encrypt_payload`].
    pub fn decrypt_payload(&self, ciphertext: &[u8], header: &FileHeader) -> SealResult<Vec<u8>> {
        // Reject impossible lengths before doing any crypto.
        self.geometry().cleartext_size(ciphertext.len() as u64)?;
        let chunks = ciphertext
            .par_chunks(self.ciphertext_chunk_size())
            .enumerate()
            .map(|(index, chunk)| self.decrypt_chunk(chunk, index as u64, header))
            .collect::<SealResult<Vec<_>>>()?;
        Ok(chunks.concat())
    }
}

/// Build AAD: chunk_index (8 bytes BE) || header nonce
fn build_aad(chunk_index: u64, header: &FileHeader) -> Vec<u8> {
    let mut aad = Vec::with_capacity(8 + header.nonce().len());
    aad.extend_from_slice(&chunk_index.to_be_bytes());
    aad.extend_from_slice(header.nonce());
    aad
}
