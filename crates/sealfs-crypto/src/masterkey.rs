//! Vault masterkey: a 256-bit encryption key and a 256-bit MAC key.
//!
//! Seed-based masterkeys hold one 256-bit seed and derive both keys from it
//! with HKDF-SHA256; only the seed is ever wrapped.
//!
//! The key material lives behind a lock. Every cipher operation runs while
//! holding the read guard, and `destroy` zeroes the bytes under the write
//! guard, so an operation either sees intact keys or `KeyDestroyed`.

use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sealfs_core::{SealError, SealResult};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::KEY_SIZE;

const SEED_ENC_INFO: &[u8] = b"sealfs-seed-enc";
const SEED_MAC_INFO: &[u8] = b"sealfs-seed-mac";

/// Raw key bytes. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct KeyMaterial {
    enc: [u8; KEY_SIZE],
    mac: [u8; KEY_SIZE],
    seed: Option<[u8; KEY_SIZE]>,
}

impl KeyMaterial {
    pub(crate) fn zeroed() -> Self {
        Self {
            enc: [0u8; KEY_SIZE],
            mac: [0u8; KEY_SIZE],
            seed: None,
        }
    }

    /// Expand a seed into encryption and MAC keys.
    pub(crate) fn from_seed(seed: &[u8; KEY_SIZE]) -> SealResult<Self> {
        let mut keys = Self::zeroed();
        hkdf_expand(seed, SEED_ENC_INFO, &mut keys.enc)?;
        hkdf_expand(seed, SEED_MAC_INFO, &mut keys.mac)?;
        keys.seed = Some(*seed);
        Ok(keys)
    }

    pub(crate) fn seed(&self) -> Option<&[u8; KEY_SIZE]> {
        self.seed.as_ref()
    }

    pub(crate) fn encryption_key(&self) -> &[u8; KEY_SIZE] {
        &self.enc
    }

    pub(crate) fn mac_key(&self) -> &[u8; KEY_SIZE] {
        &self.mac
    }

    pub(crate) fn encryption_key_mut(&mut self) -> &mut [u8; KEY_SIZE] {
        &mut self.enc
    }

    pub(crate) fn mac_key_mut(&mut self) -> &mut [u8; KEY_SIZE] {
        &mut self.mac
    }

    /// `mac_key ‖ enc_key`, the layout AES-SIV expects for its two subkeys.
    pub(crate) fn concat_mac_enc(&self) -> Zeroizing<[u8; 2 * KEY_SIZE]> {
        let mut out = Zeroizing::new([0u8; 2 * KEY_SIZE]);
        out[..KEY_SIZE].copy_from_slice(&self.mac);
        out[KEY_SIZE..].copy_from_slice(&self.enc);
        out
    }

    /// HKDF-SHA256 subkey with a domain-specific info string. The input key
    /// material is the seed if there is one, otherwise `mac_key ‖ enc_key`.
    pub(crate) fn derive<const N: usize>(&self, info: &[u8]) -> SealResult<Zeroizing<[u8; N]>> {
        let mut okm = Zeroizing::new([0u8; N]);
        match &self.seed {
            Some(seed) => hkdf_expand(seed, info, okm.as_mut_slice())?,
            None => hkdf_expand(self.concat_mac_enc().as_slice(), info, okm.as_mut_slice())?,
        }
        Ok(okm)
    }
}

fn hkdf_expand(ikm: &[u8], info: &[u8], okm: &mut [u8]) -> SealResult<()> {
    Hkdf::<Sha256>::new(None, ikm)
        .expand(info, okm)
        .map_err(|e| SealError::Crypto(format!("HKDF expand failed: {e}")))
}

/// Root key material of one vault.
///
/// Not `Clone`: the only way to get the bytes elsewhere is to wrap them.
pub struct Masterkey {
    keys: RwLock<Option<KeyMaterial>>,
}

impl Masterkey {
    /// Generate a fresh masterkey from the thread-local CSPRNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Generate a fresh masterkey from the given random source.
    pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut keys = KeyMaterial::zeroed();
        rng.fill_bytes(keys.encryption_key_mut());
        rng.fill_bytes(keys.mac_key_mut());
        tracing::debug!("generated new masterkey");
        Self::from_material(keys)
    }

    /// Generate a fresh seed-based masterkey from the thread-local CSPRNG.
    pub fn generate_seeded() -> SealResult<Self> {
        Self::generate_seeded_with(&mut rand::thread_rng())
    }

    pub fn generate_seeded_with<R: RngCore + CryptoRng>(rng: &mut R) -> SealResult<Self> {
        let mut seed = [0u8; KEY_SIZE];
        rng.fill_bytes(&mut seed);
        tracing::debug!("generated new seed-based masterkey");
        Self::from_seed(seed)
    }

    /// Build a seed-based masterkey. The array is wiped after copying.
    pub fn from_seed(mut seed: [u8; KEY_SIZE]) -> SealResult<Self> {
        let keys = KeyMaterial::from_seed(&seed);
        seed.zeroize();
        Ok(Self::from_material(keys?))
    }

    /// Build a masterkey from raw key bytes. The arrays are wiped after copying.
    pub fn from_raw(mut encryption_key: [u8; KEY_SIZE], mut mac_key: [u8; KEY_SIZE]) -> Self {
        let mut keys = KeyMaterial::zeroed();
        keys.encryption_key_mut().copy_from_slice(&encryption_key);
        keys.mac_key_mut().copy_from_slice(&mac_key);
        encryption_key.zeroize();
        mac_key.zeroize();
        Self::from_material(keys)
    }

    pub(crate) fn from_material(keys: KeyMaterial) -> Self {
        Self {
            keys: RwLock::new(Some(keys)),
        }
    }

    /// Copy of the raw key bytes as `enc_key ‖ mac_key`.
    pub fn export_raw(&self) -> SealResult<Zeroizing<[u8; 2 * KEY_SIZE]>> {
        self.with_keys(|keys| {
            let mut out = Zeroizing::new([0u8; 2 * KEY_SIZE]);
            out[..KEY_SIZE].copy_from_slice(keys.encryption_key());
            out[KEY_SIZE..].copy_from_slice(keys.mac_key());
            Ok(out)
        })
    }

    /// Run `f` with the key material while holding the read guard.
    pub(crate) fn with_keys<T>(
        &self,
        f: impl FnOnce(&KeyMaterial) -> SealResult<T>,
    ) -> SealResult<T> {
        match self.read().as_ref() {
            Some(keys) => f(keys),
            None => Err(SealError::KeyDestroyed),
        }
    }

    /// Whether this key was built from a seed. False once destroyed.
    pub fn is_seed_based(&self) -> bool {
        self.read().as_ref().is_some_and(|keys| keys.seed().is_some())
    }

    /// Fail fast if the key has been destroyed.
    pub(crate) fn ensure_alive(&self) -> SealResult<()> {
        self.with_keys(|_| Ok(()))
    }

    /// Overwrite both keys with zeros. Idempotent.
    pub fn destroy(&self) {
        let mut guard = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(keys) = guard.as_mut() {
            keys.zeroize();
            *guard = None;
            tracing::info!("masterkey destroyed");
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.read().is_none()
    }

    // A poisoned lock still holds consistent bytes: writers only zeroize.
    fn read(&self) -> RwLockReadGuard<'_, Option<KeyMaterial>> {
        self.keys.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Masterkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Masterkey")
            .field("keys", &"[REDACTED]")
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
