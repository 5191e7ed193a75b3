//! Masterkey wrapping: passphrase-protected persistence of the raw keys
//!
//! - SIV_GCM: AES-256 key wrap (RFC 3394), 40-byte output per key
//! - SEED_SIV_GCM: AES-256 key wrap of the seed alone
//! - SIV_XCHACHA: XChaCha20-Poly1305, `[24-byte nonce][32-byte key][16-byte tag]`
//!
//! Failure of the KEK to unwrap is reported as `InvalidPassphrase`; a bad
//! version MAC after a successful unwrap is a generic `Crypto` error.

use aes_kw::KekAes256;
use hmac::{Hmac, Mac};
use sealfs_core::config::KdfConfig;
use sealfs_core::{Scheme, SealError, SealResult};
use secrecy::SecretString;
use sha2::Sha256;

use crate::aead;
use crate::kdf::{derive_kek, generate_salt, salt_len, KdfParams};
use crate::keyfile::KeyFile;
use crate::masterkey::{KeyMaterial, Masterkey};
use crate::{KEY_SIZE, TAG_SIZE};
use zeroize::Zeroizing;

const AES_KW_WRAPPED_SIZE: usize = KEY_SIZE + 8;
const XCHACHA_WRAPPED_SIZE: usize = aead::XCHACHA_NONCE_SIZE + KEY_SIZE + TAG_SIZE;

impl Masterkey {
    /// Wrap the key material under a passphrase-derived KEK with a fresh salt.
    pub fn wrap(
        &self,
        passphrase: &SecretString,
        pepper: &[u8],
        version: u32,
        scheme: Scheme,
        kdf: &KdfConfig,
    ) -> SealResult<KeyFile> {
        let salt = generate_salt(salt_len(scheme, kdf));
        self.wrap_with_salt(
            passphrase,
            pepper,
            version,
            scheme,
            KdfParams::for_scheme(scheme, kdf),
            salt,
        )
    }

    pub(crate) fn wrap_with_salt(
        &self,
        passphrase: &SecretString,
        pepper: &[u8],
        version: u32,
        scheme: Scheme,
        kdf: KdfParams,
        kdf_salt: Vec<u8>,
    ) -> SealResult<KeyFile> {
        if !kdf.matches_scheme(scheme) {
            return Err(SealError::InvalidArgument(format!(
                "KDF {kdf:?} cannot be used with scheme {scheme}"
            )));
        }
        // Skip the expensive KDF for a key that is already gone.
        self.ensure_alive()?;

        let kek = derive_kek(passphrase, &kdf_salt, pepper, &kdf)?;
        let key_file = self.with_keys(|keys| {
            let (wrapped_encryption_key, wrapped_mac_key, wrapped_seed) =
                match (scheme.is_seed_based(), keys.seed()) {
                    (true, Some(seed)) => (Vec::new(), Vec::new(), wrap_key(scheme, &kek, seed)?),
                    (false, None) => (
                        wrap_key(scheme, &kek, keys.encryption_key())?,
                        wrap_key(scheme, &kek, keys.mac_key())?,
                        Vec::new(),
                    ),
                    (true, None) => {
                        return Err(SealError::InvalidArgument(format!(
                            "scheme {scheme} needs a seed-based masterkey"
                        )))
                    }
                    (false, Some(_)) => {
                        return Err(SealError::InvalidArgument(format!(
                            "scheme {scheme} cannot wrap a seed-based masterkey"
                        )))
                    }
                };
            Ok(KeyFile {
                version,
                scheme,
                kdf_salt,
                kdf,
                wrapped_encryption_key,
                wrapped_mac_key,
                wrapped_seed,
                version_mac: version_mac(keys.mac_key(), version, scheme)?,
            })
        })?;

        tracing::debug!(version, %scheme, "masterkey wrapped");
        Ok(key_file)
    }

    /// Recover the masterkey from a key file.
    pub fn unwrap(
        key_file: &KeyFile,
        passphrase: &SecretString,
        pepper: &[u8],
        expected_version: u32,
    ) -> SealResult<Masterkey> {
        let scheme = key_file.scheme;
        if !key_file.kdf.matches_scheme(scheme) {
            return Err(SealError::Format(format!(
                "KDF {:?} does not belong to scheme {scheme}",
                key_file.kdf
            )));
        }
        key_file.kdf.check_bounds().map_err(SealError::Format)?;

        let kek = derive_kek(passphrase, &key_file.kdf_salt, pepper, &key_file.kdf)?;

        let keys = match unwrap_material(key_file, &kek) {
            Ok(keys) => keys,
            Err(e) => {
                if matches!(e, SealError::InvalidPassphrase) {
                    tracing::warn!(%scheme, "masterkey unwrap failed: invalid passphrase");
                }
                return Err(e);
            }
        };

        verify_version_mac(
            keys.mac_key(),
            key_file.version,
            scheme,
            &key_file.version_mac,
        )?;
        if key_file.version != expected_version {
            return Err(SealError::UnsupportedVersion {
                expected: expected_version,
                found: key_file.version,
            });
        }

        tracing::debug!(version = key_file.version, %scheme, "masterkey unwrapped");
        Ok(Masterkey::from_material(keys))
    }
}

fn unwrap_material(key_file: &KeyFile, kek: &[u8; KEY_SIZE]) -> SealResult<KeyMaterial> {
    let scheme = key_file.scheme;
    if scheme.is_seed_based() {
        let mut seed = Zeroizing::new([0u8; KEY_SIZE]);
        unwrap_key(scheme, kek, &key_file.wrapped_seed, &mut *seed)?;
        return KeyMaterial::from_seed(&seed);
    }

    let mut keys = KeyMaterial::zeroed();
    unwrap_key(scheme, kek, &key_file.wrapped_encryption_key, keys.encryption_key_mut())?;
    unwrap_key(scheme, kek, &key_file.wrapped_mac_key, keys.mac_key_mut())?;
    Ok(keys)
}

fn wrap_key(scheme: Scheme, kek: &[u8; KEY_SIZE], key: &[u8; KEY_SIZE]) -> SealResult<Vec<u8>> {
    match scheme {
        Scheme::SivGcm | Scheme::SeedSivGcm => {
            let mut out = [0u8; AES_KW_WRAPPED_SIZE];
            KekAes256::from(*kek)
                .wrap(key, &mut out)
                .map_err(|e| SealError::Crypto(format!("AES key wrap failed: {e:?}")))?;
            Ok(out.to_vec())
        }
        Scheme::SivXChaCha => {
            let nonce = aead::random_nonce(scheme);
            let sealed = aead::seal(scheme, kek, &nonce, key, b"")?;
            let mut out = Vec::with_capacity(XCHACHA_WRAPPED_SIZE);
            out.extend_from_slice(&nonce);
            out.extend_from_slice(&sealed);
            Ok(out)
        }
    }
}

fn unwrap_key(
    scheme: Scheme,
    kek: &[u8; KEY_SIZE],
    wrapped: &[u8],
    out: &mut [u8; KEY_SIZE],
) -> SealResult<()> {
    match scheme {
        Scheme::SivGcm | Scheme::SeedSivGcm => {
            if wrapped.len() != AES_KW_WRAPPED_SIZE {
                return Err(SealError::Format(format!(
                    "wrapped key has wrong size: {} bytes (expected {AES_KW_WRAPPED_SIZE})",
                    wrapped.len()
                )));
            }
            KekAes256::from(*kek)
                .unwrap(wrapped, out)
                .map_err(|_| SealError::InvalidPassphrase)
        }
        Scheme::SivXChaCha => {
            if wrapped.len() != XCHACHA_WRAPPED_SIZE {
                return Err(SealError::Format(format!(
                    "wrapped key has wrong size: {} bytes (expected {XCHACHA_WRAPPED_SIZE})",
                    wrapped.len()
                )));
            }
            let (nonce, sealed) = wrapped.split_at(aead::XCHACHA_NONCE_SIZE);
            let plaintext = Zeroizing::new(
                aead::open(scheme, kek, nonce, sealed, b"", "wrapped masterkey")
                    .map_err(|_| SealError::InvalidPassphrase)?,
            );
            if plaintext.len() != KEY_SIZE {
                return Err(SealError::Crypto(format!(
                    "unwrapped key has wrong size: {} bytes (expected {KEY_SIZE})",
                    plaintext.len()
                )));
            }
            out.copy_from_slice(&plaintext);
            Ok(())
        }
    }
}

type HmacSha256 = Hmac<Sha256>;

fn version_mac_input(version: u32, scheme: Scheme) -> [u8; 5] {
    let mut input = [0u8; 5];
    input[..4].copy_from_slice(&version.to_be_bytes());
    input[4] = scheme.id();
    input
}

fn version_mac(mac_key: &[u8; KEY_SIZE], version: u32, scheme: Scheme) -> SealResult<Vec<u8>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|e| SealError::Crypto(format!("HMAC init: {e}")))?;
    mac.update(&version_mac_input(version, scheme));
    Ok(mac.finalize().into_bytes().to_vec())
}

fn verify_version_mac(
    mac_key: &[u8; KEY_SIZE],
    version: u32,
    scheme: Scheme,
    expected: &[u8],
) -> SealResult<()> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|e| SealError::Crypto(format!("HMAC init: {e}")))?;
    mac.update(&version_mac_input(version, scheme));
    mac.verify_slice(expected)
        .map_err(|_| SealError::Crypto("version MAC mismatch: key file has been tampered with".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_kdf() -> KdfConfig {
        KdfConfig {
            scrypt_cost_param: 1024,
            argon2_mem_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..KdfConfig::default()
        }
    }

    fn zero_key() -> Masterkey {
        Masterkey::from_raw([0u8; KEY_SIZE], [0u8; KEY_SIZE])
    }

    fn scrypt_params() -> KdfParams {
        KdfParams::for_scheme(Scheme::SivGcm, &fast_kdf())
    }

    fn fresh_key(scheme: Scheme) -> Masterkey {
        if scheme.is_seed_based() {
            Masterkey::generate_seeded().unwrap()
        } else {
            Masterkey::generate()
        }
    }

    fn b64(bytes: &[u8]) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    // AES-KW of a zero key under scrypt("asd", salt = 0x00 × 8, N = 2^15, r = 8, p = 1)
    const ZERO_KEY_WRAPPED: &str = "bOuDTfSpTHJrM4G321gts1QL+TFAZ3I6S/QHwim39pz+t+/K9IYy6g==";

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let pw = SecretString::from("asd");
        for scheme in Scheme::ALL {
            let key = fresh_key(scheme);
            let key_file = key.wrap(&pw, b"", 3, scheme, &fast_kdf()).unwrap();
            let restored = Masterkey::unwrap(&key_file, &pw, b"", 3).unwrap();

            assert_eq!(*key.export_raw().unwrap(), *restored.export_raw().unwrap());
        }
    }

    #[test]
    fn test_wrap_is_deterministic_for_fixed_salt() {
        let pw = SecretString::from("asd");
        let key = zero_key();
        let kf1 = key
            .wrap_with_salt(&pw, b"", 3, Scheme::SivGcm, scrypt_params(), vec![0u8; 8])
            .unwrap();
        let kf2 = key
            .wrap_with_salt(&pw, b"", 3, Scheme::SivGcm, scrypt_params(), vec![0u8; 8])
            .unwrap();

        assert_eq!(kf1, kf2, "AES key wrap with identical inputs must be reproducible");
        assert_eq!(kf1.wrapped_encryption_key.len(), AES_KW_WRAPPED_SIZE);
        assert_eq!(kf1.version_mac.len(), 32);
    }

    #[test]
    fn test_wrap_with_different_peppers_differs() {
        let pw = SecretString::from("asd");
        let key = zero_key();
        let kf1 = key
            .wrap_with_salt(&pw, &[0x01], 3, Scheme::SivGcm, scrypt_params(), vec![0u8; 8])
            .unwrap();
        let kf2 = key
            .wrap_with_salt(&pw, &[0x02], 3, Scheme::SivGcm, scrypt_params(), vec![0u8; 8])
            .unwrap();

        assert_ne!(kf1.wrapped_encryption_key, kf2.wrapped_encryption_key);
        assert_ne!(kf1.to_bytes().unwrap(), kf2.to_bytes().unwrap());
    }

    #[test]
    fn test_unwrap_wrong_passphrase() {
        for scheme in Scheme::ALL {
            let key_file = fresh_key(scheme)
                .wrap(&SecretString::from("right"), b"", 3, scheme, &fast_kdf())
                .unwrap();
            let err = Masterkey::unwrap(&key_file, &SecretString::from("wrong"), b"", 3).unwrap_err();

            assert!(matches!(err, SealError::InvalidPassphrase), "{scheme}: {err}");
        }
    }

    #[test]
    fn test_unwrap_wrong_pepper() {
        let pw = SecretString::from("asd");
        let key_file = Masterkey::generate()
            .wrap(&pw, b"pepper", 3, Scheme::SivGcm, &fast_kdf())
            .unwrap();
        let err = Masterkey::unwrap(&key_file, &pw, b"salt", 3).unwrap_err();

        assert!(matches!(err, SealError::InvalidPassphrase));
    }

    #[test]
    fn test_unwrap_tampered_version() {
        let pw = SecretString::from("asd");
        for scheme in Scheme::ALL {
            let mut key_file = fresh_key(scheme).wrap(&pw, b"", 3, scheme, &fast_kdf()).unwrap();
            key_file.version = 4;

            let err = Masterkey::unwrap(&key_file, &pw, b"", 4).unwrap_err();
            assert!(matches!(err, SealError::Crypto(_)), "{scheme}: {err}");
        }
    }

    #[test]
    fn test_unwrap_unexpected_version() {
        let pw = SecretString::from("asd");
        let key_file = Masterkey::generate()
            .wrap(&pw, b"", 3, Scheme::SivGcm, &fast_kdf())
            .unwrap();
        let err = Masterkey::unwrap(&key_file, &pw, b"", 8).unwrap_err();

        assert!(matches!(
            err,
            SealError::UnsupportedVersion {
                expected: 8,
                found: 3
            }
        ));
    }

    #[test]
    fn test_unwrap_truncated_wrapped_key() {
        let pw = SecretString::from("asd");
        let mut key_file = Masterkey::generate()
            .wrap(&pw, b"", 3, Scheme::SivGcm, &fast_kdf())
            .unwrap();
        key_file.wrapped_mac_key.truncate(20);

        let err = Masterkey::unwrap(&key_file, &pw, b"", 3).unwrap_err();
        assert!(matches!(err, SealError::Format(_)));
    }

    #[test]
    fn test_wrap_destroyed_key_fails() {
        let key = Masterkey::generate();
        key.destroy();

        let err = key
            .wrap(&SecretString::from("asd"), b"", 3, Scheme::SivGcm, &fast_kdf())
            .unwrap_err();
        assert!(matches!(err, SealError::KeyDestroyed));
    }

    #[test]
    fn test_wrap_rejects_foreign_kdf() {
        let err = zero_key()
            .wrap_with_salt(
                &SecretString::from("asd"),
                b"",
                3,
                Scheme::SivXChaCha,
                scrypt_params(),
                vec![0u8; 16],
            )
            .unwrap_err();
        assert!(matches!(err, SealError::InvalidArgument(_)));
    }

    #[test]
    fn test_wrap_known_answer() {
        let params = KdfParams::for_scheme(Scheme::SivGcm, &KdfConfig::default());
        let key_file = zero_key()
            .wrap_with_salt(&SecretString::from("asd"), b"", 3, Scheme::SivGcm, params, vec![0u8; 8])
            .unwrap();

        assert_eq!(b64(&key_file.wrapped_encryption_key), ZERO_KEY_WRAPPED);
        assert_eq!(b64(&key_file.wrapped_mac_key), ZERO_KEY_WRAPPED);
        assert_eq!(b64(&key_file.version_mac), "9GX8TQD4b+5xpeQuS3bWJl3hhU7m7fYDBpn4gFYzD9Q=");
        assert!(key_file.wrapped_seed.is_empty());
    }

    #[test]
    fn test_seed_wrap_known_answer() {
        let params = KdfParams::for_scheme(Scheme::SeedSivGcm, &KdfConfig::default());
        let pw = SecretString::from("asd");
        let key = Masterkey::from_seed([0u8; KEY_SIZE]).unwrap();
        let key_file = key
            .wrap_with_salt(&pw, b"", 3, Scheme::SeedSivGcm, params, vec![0u8; 8])
            .unwrap();

        assert_eq!(b64(&key_file.wrapped_seed), ZERO_KEY_WRAPPED);
        assert!(key_file.wrapped_encryption_key.is_empty());
        assert!(key_file.wrapped_mac_key.is_empty());
        // Keyed with the HKDF-derived MAC key, not with the seed.
        assert_eq!(b64(&key_file.version_mac), "xLbLqLxBQVj9FU5SiVzeuvjLPnAgJBjzUG+882I2pXk=");

        let restored = Masterkey::unwrap(&key_file, &pw, b"", 3).unwrap();
        assert!(restored.is_seed_based());
        assert_eq!(*key.export_raw().unwrap(), *restored.export_raw().unwrap());
    }

    #[test]
    fn test_version_mac_known_answers() {
        let expected = [
            (Scheme::SivGcm, "9GX8TQD4b+5xpeQuS3bWJl3hhU7m7fYDBpn4gFYzD9Q="),
            (Scheme::SivXChaCha, "xnrCnjVoJkdaxDzgfN7aUbg9C6kaSOXOEODN8rliy+8="),
            (Scheme::SeedSivGcm, "8ImUOKZkLpyKSLafD/VzbfliWL6ZQoq02jyqzDv4CG8="),
        ];
        for (scheme, mac) in expected {
            assert_eq!(b64(&version_mac(&[0u8; KEY_SIZE], 3, scheme).unwrap()), mac, "{scheme}");
        }
    }

    #[test]
    fn test_wrap_rejects_wrong_key_kind() {
        let pw = SecretString::from("asd");
        let plain = Masterkey::generate().wrap(&pw, b"", 3, Scheme::SeedSivGcm, &fast_kdf());
        let seeded = Masterkey::generate_seeded()
            .unwrap()
            .wrap(&pw, b"", 3, Scheme::SivGcm, &fast_kdf());

        assert!(matches!(plain, Err(SealError::InvalidArgument(_))));
        assert!(matches!(seeded, Err(SealError::InvalidArgument(_))));
    }

    #[test]
    fn test_unwrap_oversized_cost_fails_without_deriving() {
        let pw = SecretString::from("asd");
        let mut key_file = Masterkey::generate()
            .wrap(&pw, b"", 3, Scheme::SivGcm, &fast_kdf())
            .unwrap();
        key_file.kdf = KdfParams::Scrypt {
            cost_param: 1 << 40,
            block_size: 8,
            parallelism: 1,
        };

        let err = Masterkey::unwrap(&key_file, &pw, b"", 3).unwrap_err();
        assert!(matches!(err, SealError::Format(_)), "{err}");
    }
}
