use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{SealError, SealResult};
use crate::types::Scheme;

/// Top-level configuration (loaded from sealfs.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    pub vault: VaultConfig,
    pub kdf: KdfConfig,
}

impl SealConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> SealResult<Self> {
        if !path.exists() {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| SealError::Config(format!("parsing config {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> SealResult<Self> {
        toml::from_str(content).map_err(|e| SealError::Config(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Cipher suite for newly created vaults (default: SIV_GCM)
    pub scheme: Scheme,
    /// Vault format version written into and expected from key files (default: 8)
    pub format_version: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::default(),
            format_version: 8,
        }
    }
}

/// Passphrase KDF parameters. The scrypt block applies to SIV_GCM vaults,
/// the Argon2id block to SIV_XCHACHA vaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// scrypt CPU/memory cost N, a power of two (default: 32768)
    pub scrypt_cost_param: u64,
    /// scrypt block size r (default: 8)
    pub scrypt_block_size: u32,
    /// scrypt parallelism p (default: 1)
    pub scrypt_parallelism: u32,
    /// scrypt salt length in bytes (default: 8)
    pub scrypt_salt_len: usize,
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost / iterations (default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
    /// Argon2id salt length in bytes (default: 16)
    pub argon2_salt_len: usize,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            scrypt_cost_param: 1 << 15,
            scrypt_block_size: 8,
            scrypt_parallelism: 1,
            scrypt_salt_len: 8,
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
            argon2_salt_len: 16,
        }
    }
}
