use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SealError;

/// Cipher suite of a vault. Stored in the key file and covered by its
/// version MAC, so a vault cannot be silently moved to another suite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    /// AES-SIV names, AES-256-GCM content, scrypt + AES key wrap.
    #[default]
    #[serde(rename = "SIV_GCM")]
    SivGcm,
    /// AES-SIV names, XChaCha20-Poly1305 content, Argon2id + XChaCha20-Poly1305 key wrap.
    #[serde(rename = "SIV_XCHACHA")]
    SivXChaCha,
    /// One wrapped 32-byte seed; encryption, MAC, name and directory-hash
    /// keys are all HKDF-SHA256 subkeys of it. AES-256-GCM content, scrypt + AES key wrap.
    #[serde(rename = "SEED_SIV_GCM")]
    SeedSivGcm,
}

impl Scheme {
    pub const ALL: [Scheme; 3] = [Scheme::SivGcm, Scheme::SivXChaCha, Scheme::SeedSivGcm];

    /// Stable one-byte identifier, fed into the version MAC.
    pub fn id(self) -> u8 {
        match self {
            Scheme::SivGcm => 1,
            Scheme::SivXChaCha => 2,
            Scheme::SeedSivGcm => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Scheme::SivGcm => "SIV_GCM",
            Scheme::SivXChaCha => "SIV_XCHACHA",
            Scheme::SeedSivGcm => "SEED_SIV_GCM",
        }
    }

    /// Whether the key file carries a single seed instead of two raw keys.
    pub fn is_seed_based(self) -> bool {
        matches!(self, Scheme::SeedSivGcm)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scheme {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scheme::ALL
            .into_iter()
            .find(|scheme| scheme.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| SealError::InvalidArgument(format!("unknown scheme: {s}")))
    }
}
