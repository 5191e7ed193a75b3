//! Cryptor facade and its factory
//!
//! A `Cryptor` owns one vault's masterkey and hands out borrowed header,
//! content and name cryptors bound to it. Dropping the cryptor destroys the
//! key; so does an explicit `destroy()`, after which every operation fails
//! with `KeyDestroyed`.

use rand::{CryptoRng, RngCore};
use sealfs_core::config::{KdfConfig, SealConfig};
use sealfs_core::{Scheme, SealResult};
use secrecy::SecretString;

use crate::content::FileContentCryptor;
use crate::header::{self, FileHeaderCryptor};
use crate::keyfile::KeyFile;
use crate::masterkey::Masterkey;
use crate::names::FileNameCryptor;
use crate::sizes::ChunkGeometry;

pub struct Cryptor {
    masterkey: Masterkey,
    scheme: Scheme,
}

impl Cryptor {
    pub fn new(masterkey: Masterkey, scheme: Scheme) -> Self {
        tracing::debug!(%scheme, "cryptor created");
        Self { masterkey, scheme }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn masterkey(&self) -> &Masterkey {
        &self.masterkey
    }

    pub fn file_header_cryptor(&self) -> FileHeaderCryptor<'_> {
        FileHeaderCryptor::new(&self.masterkey, self.scheme)
    }

    pub fn file_content_cryptor(&self) -> FileContentCryptor<'_> {
        FileContentCryptor::new(&self.masterkey, self.scheme)
    }

    pub fn file_name_cryptor(&self) -> FileNameCryptor<'_> {
        FileNameCryptor::new(&self.masterkey, self.scheme)
    }

    pub fn geometry(&self) -> ChunkGeometry {
        ChunkGeometry::for_scheme(self.scheme)
    }

    /// Ciphertext file size for `cleartext_size` bytes, header included.
    pub fn ciphertext_size(&self, cleartext_size: u64) -> SealResult<u64> {
        self.geometry()
            .ciphertext_file_size(cleartext_size, header::header_size(self.scheme) as u64)
    }

    /// Cleartext size of a ciphertext file of `ciphertext_size` bytes.
    pub fn cleartext_size(&self, ciphertext_size: u64) -> SealResult<u64> {
        self.geometry()
            .cleartext_file_size(ciphertext_size, header::header_size(self.scheme) as u64)
    }

    /// Wrap this cryptor's masterkey into a serialized key file.
    pub fn write_keys_to_key_file(
        &self,
        passphrase: &SecretString,
        pepper: &[u8],
        version: u32,
        kdf: &KdfConfig,
    ) -> SealResult<Vec<u8>> {
        self.masterkey
            .wrap(passphrase, pepper, version, self.scheme, kdf)?
            .to_bytes()
    }

    pub fn destroy(&self) {
        self.masterkey.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.masterkey.is_destroyed()
    }
}

impl Drop for Cryptor {
    fn drop(&mut self) {
        self.masterkey.destroy();
    }
}

impl std::fmt::Debug for Cryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cryptor")
            .field("scheme", &self.scheme)
            .field("masterkey", &self.masterkey)
            .finish()
    }
}

/// Creates cryptors for one scheme and rotates key-file passphrases.
#[derive(Debug, Clone)]
pub struct CryptorProvider {
    scheme: Scheme,
    kdf: KdfConfig,
}

impl CryptorProvider {
    pub fn new(scheme: Scheme, kdf: KdfConfig) -> Self {
        Self { scheme, kdf }
    }

    pub fn from_config(config: &SealConfig) -> Self {
        Self::new(config.vault.scheme, config.kdf.clone())
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn kdf_config(&self) -> &KdfConfig {
        &self.kdf
    }

    /// A cryptor with a freshly generated masterkey, seed-based if the
    /// scheme asks for one.
    pub fn create_new(&self) -> SealResult<Cryptor> {
        self.create_new_with(&mut rand::thread_rng())
    }

    pub fn create_new_with<R: RngCore + CryptoRng>(&self, rng: &mut R) -> SealResult<Cryptor> {
        let masterkey = if self.scheme.is_seed_based() {
            Masterkey::generate_seeded_with(rng)?
        } else {
            Masterkey::generate_with(rng)
        };
        Ok(Cryptor::new(masterkey, self.scheme))
    }

    /// Unlock a vault. The scheme is taken from the (authenticated) key file.
    pub fn create_from_key_file(
        &self,
        key_file: &KeyFile,
        passphrase: &SecretString,
        pepper: &[u8],
        expected_version: u32,
    ) -> SealResult<Cryptor> {
        let masterkey = Masterkey::unwrap(key_file, passphrase, pepper, expected_version)?;
        Ok(Cryptor::new(masterkey, key_file.scheme))
    }

    /// Re-wrap a serialized key file under a new passphrase with a fresh salt.
    pub fn change_passphrase(
        &self,
        key_file: &[u8],
        old_passphrase: &SecretString,
        new_passphrase: &SecretString,
    ) -> SealResult<Vec<u8>> {
        self.change_passphrase_with_pepper(key_file, b"", old_passphrase, new_passphrase)
    }

    /// Like [`Self::change_passphrase`], for vaults created with a pepper.
    pub fn change_passphrase_with_pepper(
        &self,
        key_file: &[u8],
        pepper: &[u8],
        old_passphrase: &SecretString,
        new_passphrase: &SecretString,
    ) -> SealResult<Vec<u8>> {
        let parsed = KeyFile::from_bytes(key_file)?;
        let masterkey = Masterkey::unwrap(&parsed, old_passphrase, pepper, parsed.version)?;
        let rewrapped = masterkey.wrap(
            new_passphrase,
            pepper,
            parsed.version,
            parsed.scheme,
            &self.kdf,
        )?;
        masterkey.destroy();
        tracing::debug!(version = parsed.version, scheme = %parsed.scheme, "passphrase changed");
        rewrapped.to_bytes()
    }
}
