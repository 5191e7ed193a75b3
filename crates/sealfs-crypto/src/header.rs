//! Per-file header: a random nonce and a random content key
//!
//! ```text
//! [nonce][AEAD_enc_key(0xFF × 8 ‖ content_key)][tag]
//! ```
//!
//! The nonce doubles as the header's own AEAD nonce and as the file
//! identifier bound into every content chunk.

use rand::RngCore;
use sealfs_core::{AuthFailure, Scheme, SealError, SealResult};
use zeroize::Zeroizing;

use crate::masterkey::Masterkey;
use crate::{aead, KEY_SIZE, TAG_SIZE};

const RESERVED: [u8; 8] = [0xFF; 8];
const PAYLOAD_SIZE: usize = RESERVED.len() + KEY_SIZE;

/// Decrypted file header.
pub struct FileHeader {
    nonce: Vec<u8>,
    content_key: Zeroizing<[u8; KEY_SIZE]>,
}

impl FileHeader {
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    pub(crate) fn content_key(&self) -> &[u8; KEY_SIZE] {
        &self.content_key
    }
}

impl std::fmt::Debug for FileHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHeader")
            .field("nonce", &self.nonce)
            .field("content_key", &"[REDACTED]")
            .finish()
    }
}

/// Creates, encrypts and decrypts file headers under a vault's masterkey.
#[derive(Debug, Clone, Copy)]
pub struct FileHeaderCryptor<'a> {
    masterkey: &'a Masterkey,
    scheme: Scheme,
}

impl<'a> FileHeaderCryptor<'a> {
    pub(crate) fn new(masterkey: &'a Masterkey, scheme: Scheme) -> Self {
        Self { masterkey, scheme }
    }

    /// Encrypted header size in bytes: 68 for SIV_GCM, 80 for SIV_XCHACHA.
    pub fn header_size(&self) -> usize {
        header_size(self.scheme)
    }

    /// A fresh header with random nonce and content key.
    pub fn create(&self) -> SealResult<FileHeader> {
        self.masterkey.ensure_alive()?;
        let mut content_key = Zeroizing::new([0u8; KEY_SIZE]);
        rand::thread_rng().fill_bytes(content_key.as_mut_slice());
        Ok(FileHeader {
            nonce: aead::random_nonce(self.scheme),
            content_key,
        })
    }

    pub fn encrypt_header(&self, header: &FileHeader) -> SealResult<Vec<u8>> {
        if header.nonce.len() != aead::nonce_size(self.scheme) {
            return Err(SealError::InvalidArgument(format!(
                "header nonce has {} bytes, {} expects {}",
                header.nonce.len(),
                self.scheme,
                aead::nonce_size(self.scheme)
            )));
        }

        let mut payload = Zeroizing::new([0u8; PAYLOAD_SIZE]);
        payload[..RESERVED.len()].copy_from_slice(&RESERVED);
        payload[RESERVED.len()..].copy_from_slice(header.content_key());

        let sealed = self.masterkey.with_keys(|keys| {
            aead::seal(
                self.scheme,
                keys.encryption_key(),
                &header.nonce,
                payload.as_slice(),
                b"",
            )
        })?;

        let mut out = Vec::with_capacity(self.header_size());
        out.extend_from_slice(&header.nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    pub fn decrypt_header(&self, ciphertext: &[u8]) -> SealResult<FileHeader> {
        if ciphertext.len() != self.header_size() {
            return Err(SealError::InvalidArgument(format!(
                "file header must be {} bytes, got {}",
                self.header_size(),
                ciphertext.len()
            )));
        }

        let (nonce, sealed) = ciphertext.split_at(aead::nonce_size(self.scheme));
        let payload = Zeroizing::new(self.masterkey.with_keys(|keys| {
            aead::open(
                self.scheme,
                keys.encryption_key(),
                nonce,
                sealed,
                b"",
                "file header",
            )
        })?);

        if payload.len() != PAYLOAD_SIZE || payload[..RESERVED.len()] != RESERVED {
            return Err(SealError::authentication(
                "file header",
                AuthFailure::Unauthentic,
            ));
        }

        let mut content_key = Zeroizing::new([0u8; KEY_SIZE]);
        content_key.copy_from_slice(&payload[RESERVED.len()..]);
        Ok(FileHeader {
            nonce: nonce.to_vec(),
            content_key,
        })
    }
}

pub(crate) fn header_size(scheme: Scheme) -> usize {
    aead::nonce_size(scheme) + PAYLOAD_SIZE + TAG_SIZE
}
