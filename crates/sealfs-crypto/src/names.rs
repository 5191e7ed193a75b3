//! AES-SIV filename encryption
//!
//! Deterministic encryption (same name + key + associated data = same
//! ciphertext) is required for names because directory lookups need a
//! predictable path. AES-SIV (RFC 5297) provides this with authentication.
//!
//! Associated data is passed as a list of byte strings, each one becoming
//! a separate SIV header. Binding a name to its parent directory id means
//! a ciphertext name cannot be moved to another directory.
//!
//! SIV_GCM keys AES-SIV with `mac_key ‖ enc_key` and hashes directory ids as
//! `SHA1(SIV(dir_id))`. The other schemes use HKDF subkeys for both.

use aes_siv::siv::Aes256Siv;
use aes_siv::KeyInit;
use data_encoding::Encoding;
use hmac::{Hmac, Mac};
use sealfs_core::{AuthFailure, Scheme, SealError, SealResult};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::masterkey::{KeyMaterial, Masterkey};

const SIV_KEY_INFO: &[u8] = b"sealfs-names-siv";
const DIR_ID_HMAC_INFO: &[u8] = b"sealfs-dirid-hmac";
const DIR_ID_HASH_LEN: usize = 20;

/// Reversible byte ↔ text encoding used to render encrypted names.
pub trait NameEncoding {
    fn encode(&self, bytes: &[u8]) -> String;
    fn decode(&self, text: &str) -> Result<Vec<u8>, String>;
}

impl NameEncoding for Encoding {
    fn encode(&self, bytes: &[u8]) -> String {
        Encoding::encode(self, bytes)
    }

    fn decode(&self, text: &str) -> Result<Vec<u8>, String> {
        Encoding::decode(self, text.as_bytes()).map_err(|e| e.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FileNameCryptor<'a> {
    masterkey: &'a Masterkey,
    scheme: Scheme,
}

impl<'a> FileNameCryptor<'a> {
    pub(crate) fn new(masterkey: &'a Masterkey, scheme: Scheme) -> Self {
        Self { masterkey, scheme }
    }

    /// Encrypt a name and render it through `encoding`.
    pub fn encrypt_filename<E: NameEncoding + ?Sized>(
        &self,
        encoding: &E,
        cleartext: &str,
        associated_data: &[&[u8]],
    ) -> SealResult<String> {
        let ciphertext = self.masterkey.with_keys(|keys| {
            let mut cipher = self.siv(keys)?;
            cipher
                .encrypt(associated_data, cleartext.as_bytes())
                .map_err(|e| SealError::Crypto(format!("AES-SIV encrypt: {e}")))
        })?;
        Ok(encoding.encode(&ciphertext))
    }

    /// Decrypt a name produced by [`Self::encrypt_filename`] with the same
    /// encoding and associated data.
    pub fn decrypt_filename<E: NameEncoding + ?Sized>(
        &self,
        encoding: &E,
        ciphertext: &str,
        associated_data: &[&[u8]],
    ) -> SealResult<String> {
        self.masterkey.ensure_alive()?;
        let raw = encoding.decode(ciphertext).map_err(|e| {
            SealError::authentication("file name", AuthFailure::MalformedEncoding(e))
        })?;

        let cleartext = self.masterkey.with_keys(|keys| {
            let mut cipher = self.siv(keys)?;
            cipher
                .decrypt(associated_data, &raw)
                .map_err(|_| SealError::authentication("file name", AuthFailure::Unauthentic))
        })?;

        String::from_utf8(cleartext)
            .map_err(|e| SealError::authentication("file name", AuthFailure::InvalidUtf8(e)))
    }

    /// Keyed hash of a directory id: 32 characters of RFC 4648 base32.
    pub fn hash_directory_id(&self, directory_id: &[u8]) -> SealResult<String> {
        let digest = self.masterkey.with_keys(|keys| match self.scheme {
            Scheme::SivGcm => {
                let no_headers: [&[u8]; 0] = [];
                let encrypted = self
                    .siv(keys)?
                    .encrypt(no_headers, directory_id)
                    .map_err(|e| SealError::Crypto(format!("AES-SIV encrypt: {e}")))?;
                Ok(Sha1::digest(&encrypted).to_vec())
            }
            Scheme::SivXChaCha | Scheme::SeedSivGcm => {
                let hmac_key = keys.derive::<32>(DIR_ID_HMAC_INFO)?;
                let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(hmac_key.as_slice())
                    .map_err(|e| SealError::Crypto(format!("HMAC init: {e}")))?;
                mac.update(directory_id);
                Ok(mac.finalize().into_bytes()[..DIR_ID_HASH_LEN].to_vec())
            }
        })?;
        Ok(data_encoding::BASE32.encode(&digest))
    }

    fn siv(&self, keys: &KeyMaterial) -> SealResult<Aes256Siv> {
        let key: Zeroizing<[u8; 64]> = match self.scheme {
            Scheme::SivGcm => keys.concat_mac_enc(),
            Scheme::SivXChaCha | Scheme::SeedSivGcm => keys.derive::<64>(SIV_KEY_INFO)?,
        };
        Aes256Siv::new_from_slice(key.as_slice())
            .map_err(|e| SealError::Crypto(format!("AES-SIV key: {e}")))
    }
}
