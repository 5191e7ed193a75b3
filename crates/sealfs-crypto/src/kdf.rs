//! Key derivation: passphrase (+ pepper) → key-encryption key
//!
//! SIV_GCM and SEED_SIV_GCM vaults use scrypt, SIV_XCHACHA vaults use
//! Argon2id. The pepper is appended to the salt, so a vault opened with a
//! different pepper derives an unrelated KEK.
//!
//! Cost parameters are read back from key files, so they are bounded before
//! any memory is allocated for them.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use sealfs_core::config::KdfConfig;
use sealfs_core::{Scheme, SealError, SealResult};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::KEY_SIZE;

/// Largest accepted scrypt cost parameter N.
pub const MAX_SCRYPT_COST: u64 = 1 << 20;
/// Largest accepted scrypt working set, `128 * N * r` bytes (1 GiB).
pub const MAX_SCRYPT_MEMORY: u64 = 1 << 30;
pub const MAX_SCRYPT_PARALLELISM: u32 = 16;
/// Largest accepted Argon2id memory cost in KiB (1 GiB).
pub const MAX_ARGON2_MEM_KIB: u32 = 1 << 20;
pub const MAX_ARGON2_TIME_COST: u32 = 64;
pub const MAX_ARGON2_PARALLELISM: u32 = 64;

/// KDF algorithm and cost parameters, as persisted in a key file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm")]
pub enum KdfParams {
    #[serde(rename = "scrypt", rename_all = "camelCase")]
    Scrypt {
        /// CPU/memory cost N (power of two)
        cost_param: u64,
        /// Block size r
        block_size: u32,
        /// Parallelism p
        parallelism: u32,
    },
    #[serde(rename = "argon2id", rename_all = "camelCase")]
    Argon2id {
        /// Memory cost in KiB
        mem_cost_kib: u32,
        /// Iterations
        time_cost: u32,
        parallelism: u32,
    },
}

impl KdfParams {
    /// The KDF a scheme uses, with costs taken from the config.
    pub fn for_scheme(scheme: Scheme, config: &KdfConfig) -> Self {
        match scheme {
            Scheme::SivGcm | Scheme::SeedSivGcm => KdfParams::Scrypt {
                cost_param: config.scrypt_cost_param,
                block_size: config.scrypt_block_size,
                parallelism: config.scrypt_parallelism,
            },
            Scheme::SivXChaCha => KdfParams::Argon2id {
                mem_cost_kib: config.argon2_mem_cost_kib,
                time_cost: config.argon2_time_cost,
                parallelism: config.argon2_parallelism,
            },
        }
    }

    pub fn matches_scheme(&self, scheme: Scheme) -> bool {
        matches!(
            (self, scheme),
            (KdfParams::Scrypt { .. }, Scheme::SivGcm | Scheme::SeedSivGcm)
                | (KdfParams::Argon2id { .. }, Scheme::SivXChaCha)
        )
    }

    /// Reject costs that are malformed or would need an unreasonable amount
    /// of memory or time.
    pub fn check_bounds(&self) -> Result<(), String> {
        match *self {
            KdfParams::Scrypt {
                cost_param,
                block_size,
                parallelism,
            } => {
                if cost_param < 2 || !cost_param.is_power_of_two() {
                    return Err(format!(
                        "scrypt cost parameter must be a power of two > 1, got {cost_param}"
                    ));
                }
                if cost_param > MAX_SCRYPT_COST {
                    return Err(format!(
                        "scrypt cost parameter {cost_param} exceeds {MAX_SCRYPT_COST}"
                    ));
                }
                let memory = 128u64
                    .checked_mul(cost_param)
                    .and_then(|m| m.checked_mul(u64::from(block_size)))
                    .filter(|m| *m <= MAX_SCRYPT_MEMORY);
                if block_size == 0 || memory.is_none() {
                    return Err(format!(
                        "scrypt block size {block_size} with cost {cost_param} exceeds {MAX_SCRYPT_MEMORY} bytes"
                    ));
                }
                if parallelism == 0 || parallelism > MAX_SCRYPT_PARALLELISM {
                    return Err(format!(
                        "scrypt parallelism must be 1..={MAX_SCRYPT_PARALLELISM}, got {parallelism}"
                    ));
                }
            }
            KdfParams::Argon2id {
                mem_cost_kib,
                time_cost,
                parallelism,
            } => {
                if mem_cost_kib > MAX_ARGON2_MEM_KIB {
                    return Err(format!(
                        "Argon2id memory cost {mem_cost_kib} KiB exceeds {MAX_ARGON2_MEM_KIB} KiB"
                    ));
                }
                if time_cost == 0 || time_cost > MAX_ARGON2_TIME_COST {
                    return Err(format!(
                        "Argon2id time cost must be 1..={MAX_ARGON2_TIME_COST}, got {time_cost}"
                    ));
                }
                if parallelism == 0 || parallelism > MAX_ARGON2_PARALLELISM {
                    return Err(format!(
                        "Argon2id parallelism must be 1..={MAX_ARGON2_PARALLELISM}, got {parallelism}"
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Salt length configured for a scheme's KDF.
pub fn salt_len(scheme: Scheme, config: &KdfConfig) -> usize {
    match scheme {
        Scheme::SivGcm | Scheme::SeedSivGcm => config.scrypt_salt_len,
        Scheme::SivXChaCha => config.argon2_salt_len,
    }
}

/// Generate a random KDF salt.
pub fn generate_salt(len: usize) -> Vec<u8> {
    let mut salt = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit key-encryption key from a passphrase.
///
/// Deterministic in `(passphrase, salt, pepper, params)`.
pub fn derive_kek(
    passphrase: &SecretString,
    salt: &[u8],
    pepper: &[u8],
    params: &KdfParams,
) -> SealResult<Zeroizing<[u8; KEY_SIZE]>> {
    params.check_bounds().map_err(SealError::InvalidArgument)?;

    let mut salt_and_pepper = Zeroizing::new(Vec::with_capacity(salt.len() + pepper.len()));
    salt_and_pepper.extend_from_slice(salt);
    salt_and_pepper.extend_from_slice(pepper);

    let password = passphrase.expose_secret().as_bytes();
    let mut kek = Zeroizing::new([0u8; KEY_SIZE]);

    match *params {
        KdfParams::Scrypt {
            cost_param,
            block_size,
            parallelism,
        } => {
            let log_n = cost_param.trailing_zeros() as u8;
            let scrypt_params = scrypt::Params::new(log_n, block_size, parallelism, KEY_SIZE)
                .map_err(|e| SealError::InvalidArgument(format!("invalid scrypt params: {e}")))?;
            scrypt::scrypt(password, &salt_and_pepper, &scrypt_params, kek.as_mut_slice())
                .map_err(|e| SealError::Crypto(format!("scrypt KDF failed: {e}")))?;
        }
        KdfParams::Argon2id {
            mem_cost_kib,
            time_cost,
            parallelism,
        } => {
            let argon2_params = Params::new(mem_cost_kib, time_cost, parallelism, Some(KEY_SIZE))
                .map_err(|e| SealError::InvalidArgument(format!("invalid Argon2id params: {e}")))?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params)
                .hash_password_into(password, &salt_and_pepper, kek.as_mut_slice())
                .map_err(|e| SealError::Crypto(format!("Argon2id KDF failed: {e}")))?;
        }
    }

    Ok(kek)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_scrypt() -> KdfParams {
        KdfParams::Scrypt {
            cost_param: 1024,
            block_size: 8,
            parallelism: 1,
        }
    }

    fn fast_argon2() -> KdfParams {
        KdfParams::Argon2id {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_kdf_deterministic() {
        let passphrase = SecretString::from("test-passphrase-123");
        let salt = [1u8; 8];

        for params in [fast_scrypt(), fast_argon2()] {
            let key1 = derive_kek(&passphrase, &salt, b"", &params).unwrap();
            let key2 = derive_kek(&passphrase, &salt, b"", &params).unwrap();
            assert_eq!(*key1, *key2, "KDF must be deterministic ({params:?})");
        }
    }

    #[test]
    fn test_kdf_different_passphrases() {
        let salt = [1u8; 8];
        let key1 = derive_kek(&SecretString::from("passphrase-a"), &salt, b"", &fast_scrypt()).unwrap();
        let key2 = derive_kek(&SecretString::from("passphrase-b"), &salt, b"", &fast_scrypt()).unwrap();

        assert_ne!(*key1, *key2, "different passphrases must produce different keys");
    }

    #[test]
    fn test_kdf_different_salts() {
        let passphrase = SecretString::from("same-passphrase");
        let key1 = derive_kek(&passphrase, &[1u8; 8], b"", &fast_scrypt()).unwrap();
        let key2 = derive_kek(&passphrase, &[2u8; 8], b"", &fast_scrypt()).unwrap();

        assert_ne!(*key1, *key2, "different salts must produce different keys");
    }

    #[test]
    fn test_kdf_different_peppers() {
        let passphrase = SecretString::from("same-passphrase");
        let salt = [3u8; 8];

        for params in [fast_scrypt(), fast_argon2()] {
            let key1 = derive_kek(&passphrase, &salt, &[0x01], &params).unwrap();
            let key2 = derive_kek(&passphrase, &salt, &[0x02], &params).unwrap();
            assert_ne!(*key1, *key2, "different peppers must produce different keys");
        }
    }

    #[test]
    fn test_scrypt_rejects_non_power_of_two_cost() {
        let params = KdfParams::Scrypt {
            cost_param: 1000,
            block_size: 8,
            parallelism: 1,
        };
        let err = derive_kek(&SecretString::from("pw"), &[0u8; 8], b"", &params).unwrap_err();
        assert!(matches!(err, SealError::InvalidArgument(_)));
    }

    #[test]
    fn test_oversized_costs_rejected_before_allocating() {
        let oversized = [
            KdfParams::Scrypt {
                cost_param: 1 << 40,
                block_size: 8,
                parallelism: 1,
            },
            KdfParams::Scrypt {
                cost_param: 1 << 20,
                block_size: 16,
                parallelism: 1,
            },
            KdfParams::Scrypt {
                cost_param: 1024,
                block_size: 8,
                parallelism: 0,
            },
            KdfParams::Argon2id {
                mem_cost_kib: u32::MAX,
                time_cost: 1,
                parallelism: 1,
            },
            KdfParams::Argon2id {
                mem_cost_kib: 1024,
                time_cost: u32::MAX,
                parallelism: 1,
            },
        ];
        for params in oversized {
            assert!(params.check_bounds().is_err(), "{params:?}");
            let err = derive_kek(&SecretString::from("pw"), &[0u8; 8], b"", &params).unwrap_err();
            assert!(matches!(err, SealError::InvalidArgument(_)), "{params:?}");
        }
    }

    #[test]
    fn test_default_costs_within_bounds() {
        for scheme in Scheme::ALL {
            KdfParams::for_scheme(scheme, &KdfConfig::default())
                .check_bounds()
                .unwrap();
        }
    }

    #[test]
    fn test_params_for_scheme() {
        let config = KdfConfig::default();

        let gcm = KdfParams::for_scheme(Scheme::SivGcm, &config);
        assert_eq!(
            gcm,
            KdfParams::Scrypt {
                cost_param: 32768,
                block_size: 8,
                parallelism: 1
            }
        );
        assert!(gcm.matches_scheme(Scheme::SivGcm));
        assert!(!gcm.matches_scheme(Scheme::SivXChaCha));

        let xchacha = KdfParams::for_scheme(Scheme::SivXChaCha, &config);
        assert!(xchacha.matches_scheme(Scheme::SivXChaCha));
        assert_eq!(salt_len(Scheme::SivGcm, &config), 8);
        assert_eq!(salt_len(Scheme::SivXChaCha, &config), 16);
        assert!(KdfParams::for_scheme(Scheme::SeedSivGcm, &config).matches_scheme(Scheme::SeedSivGcm));
        assert_eq!(salt_len(Scheme::SeedSivGcm, &config), 8);
    }

    #[test]
    fn test_params_json_layout() {
        let json = serde_json::to_value(fast_scrypt()).unwrap();
        assert_eq!(json["algorithm"], "scrypt");
        assert_eq!(json["costParam"], 1024);
        assert_eq!(json["blockSize"], 8);

        let back: KdfParams = serde_json::from_value(json).unwrap();
        assert_eq!(back, fast_scrypt());
    }
}
