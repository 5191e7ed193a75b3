//! Persisted key file format
//!
//! ```text
//! {
//!   "version": 8,
//!   "scheme": "SIV_GCM",
//!   "kdfSalt": "<base64>",
//!   "kdf": { "algorithm": "scrypt", "costParam": 32768, "blockSize": 8, "parallelism": 1 },
//!   "wrappedEncryptionKey": "<base64>",
//!   "wrappedMacKey": "<base64>",
//!   "versionMac": "<base64 HMAC-SHA256(mac_key, version_be32 ‖ scheme_id)>"
//! }
//! ```
//!
//! `SEED_SIV_GCM` key files carry a single `"wrappedSeed"` in place of the
//! two wrapped keys. KDF costs above the limits in [`KdfParams::check_bounds`]
//! are rejected before any key derivation runs.

use sealfs_core::{Scheme, SealError, SealResult};
use serde::{Deserialize, Serialize};

use crate::kdf::KdfParams;

/// Wrapped masterkey plus everything needed to unwrap it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFile {
    /// Vault format version, authenticated by `version_mac`
    pub version: u32,
    /// Cipher suite, authenticated by `version_mac`
    pub scheme: Scheme,
    #[serde(with = "b64")]
    pub kdf_salt: Vec<u8>,
    pub kdf: KdfParams,
    #[serde(with = "b64", default, skip_serializing_if = "Vec::is_empty")]
    pub wrapped_encryption_key: Vec<u8>,
    #[serde(with = "b64", default, skip_serializing_if = "Vec::is_empty")]
    pub wrapped_mac_key: Vec<u8>,
    /// Wrapped 256-bit seed; only present for seed-based schemes
    #[serde(with = "b64", default, skip_serializing_if = "Vec::is_empty")]
    pub wrapped_seed: Vec<u8>,
    #[serde(with = "b64")]
    pub version_mac: Vec<u8>,
}

impl KeyFile {
    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> SealResult<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| SealError::Format(format!("key file serialization: {e}")))
    }

    /// Parse JSON bytes, rejecting malformed or inconsistent key files.
    pub fn from_bytes(data: &[u8]) -> SealResult<Self> {
        let key_file: KeyFile = serde_json::from_slice(data)
            .map_err(|e| SealError::Format(format!("key file deserialization: {e}")))?;
        key_file.validate()?;
        Ok(key_file)
    }

    fn validate(&self) -> SealResult<()> {
        if !self.kdf.matches_scheme(self.scheme) {
            return Err(SealError::Format(format!(
                "KDF {:?} does not belong to scheme {}",
                self.kdf, self.scheme
            )));
        }
        self.kdf.check_bounds().map_err(SealError::Format)?;
        self.check_wrapped_fields()?;
        if self.kdf_salt.is_empty() {
            return Err(SealError::Format("empty KDF salt".into()));
        }
        if self.version_mac.is_empty() {
            return Err(SealError::Format("missing version MAC".into()));
        }
        Ok(())
    }

    fn check_wrapped_fields(&self) -> SealResult<()> {
        let has_keys = !self.wrapped_encryption_key.is_empty() && !self.wrapped_mac_key.is_empty();
        let has_any_key = !self.wrapped_encryption_key.is_empty() || !self.wrapped_mac_key.is_empty();
        let has_seed = !self.wrapped_seed.is_empty();

        match (self.scheme.is_seed_based(), has_seed, has_keys, has_any_key) {
            (true, true, _, false) | (false, false, true, _) => Ok(()),
            (true, ..) => Err(SealError::Format(format!(
                "{} key file must hold exactly one wrapped seed and no wrapped keys",
                self.scheme
            ))),
            (false, ..) => Err(SealError::Format(format!(
                "{} key file must hold both wrapped keys and no wrapped seed",
                self.scheme
            ))),
        }
    }
}

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD
            .decode(s)
            .map_err(|e| serde::de::Error::custom(format!("base64 decode: {e}")))
    }
}
