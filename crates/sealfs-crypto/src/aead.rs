//! Nonce-based AEAD shared by file headers and content chunks
//!
//! SIV_GCM and SEED_SIV_GCM use AES-256-GCM with 96-bit nonces, SIV_XCHACHA uses
//! XChaCha20-Poly1305 with 192-bit nonces. Both carry a 128-bit tag.
//! Nonces are always random and never reused by callers.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::RngCore;
use sealfs_core::{AuthFailure, Scheme, SealError, SealResult};

use crate::KEY_SIZE;

pub(crate) const GCM_NONCE_SIZE: usize = 12;
pub(crate) const XCHACHA_NONCE_SIZE: usize = 24;

pub(crate) fn nonce_size(scheme: Scheme) -> usize {
    match scheme {
        Scheme::SivGcm | Scheme::SeedSivGcm => GCM_NONCE_SIZE,
        Scheme::SivXChaCha => XCHACHA_NONCE_SIZE,
    }
}

pub(crate) fn random_nonce(scheme: Scheme) -> Vec<u8> {
    let mut nonce = vec![0u8; nonce_size(scheme)];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Encrypt `msg`, returning `ciphertext ‖ tag` (the nonce is not included).
pub(crate) fn seal(
    scheme: Scheme,
    key: &[u8; KEY_SIZE],
    nonce: &[u8],
    msg: &[u8],
    aad: &[u8],
) -> SealResult<Vec<u8>> {
    check_nonce(scheme, nonce)?;
    let payload = Payload { msg, aad };
    let sealed = match scheme {
        Scheme::SivGcm | Scheme::SeedSivGcm => {
            Aes256Gcm::new(key.into()).encrypt(GenericArray::from_slice(nonce), payload)
        }
        Scheme::SivXChaCha => {
            XChaCha20Poly1305::new(key.into()).encrypt(XNonce::from_slice(nonce), payload)
        }
    };
    sealed.map_err(|e| SealError::Crypto(format!("{scheme} encryption failed: {e}")))
}

/// Decrypt `ciphertext ‖ tag`. Any mismatch is an authentication failure
/// attributed to `context`.
pub(crate) fn open(
    scheme: Scheme,
    key: &[u8; KEY_SIZE],
    nonce: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
    context: &'static str,
) -> SealResult<Vec<u8>> {
    check_nonce(scheme, nonce)?;
    let payload = Payload {
        msg: ciphertext,
        aad,
    };
    let opened = match scheme {
        Scheme::SivGcm | Scheme::SeedSivGcm => {
            Aes256Gcm::new(key.into()).decrypt(GenericArray::from_slice(nonce), payload)
        }
        Scheme::SivXChaCha => {
            XChaCha20Poly1305::new(key.into()).decrypt(XNonce::from_slice(nonce), payload)
        }
    };
    opened.map_err(|_| SealError::authentication(context, AuthFailure::Unauthentic))
}

fn check_nonce(scheme: Scheme, nonce: &[u8]) -> SealResult<()> {
    if nonce.len() != nonce_size(scheme) {
        return Err(SealError::InvalidArgument(format!(
            "{scheme} nonce must be {} bytes, got {}",
            nonce_size(scheme),
            nonce.len()
        )));
    }
    Ok(())
}
