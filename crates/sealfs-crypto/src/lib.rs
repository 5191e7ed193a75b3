//! sealfs-crypto: vault cryptography for sealfs
//!
//! Ciphertext file layout: `[header][chunk 0][chunk 1]...`, every chunk but
//! the last exactly `ciphertext_chunk_size` bytes.
//!
//! Key hierarchy:
//! ```text
//! Passphrase (+ pepper) ──KDF──> KEK (scrypt for *_GCM, Argon2id for SIV_XCHACHA)
//!   └── wraps Masterkey { encryption key, MAC key }   (persisted as KeyFile JSON)
//!         (SEED_SIV_GCM wraps only a seed; both keys are HKDF subkeys of it)
//!         ├── File header AEAD (key=encryption key, nonce=header nonce)
//!         │     └── Content key (per-file, random)
//!         │           └── Chunk AEAD (nonce=random, AAD=chunk_idx||header nonce)
//!         └── Names: AES-SIV (SIV_GCM: mac‖enc, others: HKDF "sealfs-names-siv")
//! ```
//!
//! Schemes:
//! - `SIV_GCM`: AES-256-GCM chunks and headers, AES-KW key wrapping, scrypt
//! - `SIV_XCHACHA`: XChaCha20-Poly1305 chunks, headers and key wrapping, Argon2id
//! - `SEED_SIV_GCM`: like `SIV_GCM`, but one wrapped seed with HKDF-derived
//!   keys for content, MACs, names and directory hashes

mod aead;
pub mod content;
pub mod cryptor;
pub mod header;
pub mod kdf;
pub mod keyfile;
pub mod masterkey;
pub mod names;
pub mod sizes;
mod wrap;

pub use content::FileContentCryptor;
pub use cryptor::{Cryptor, CryptorProvider};
pub use data_encoding::{BASE32, BASE64URL};
pub use header::{FileHeader, FileHeaderCryptor};
pub use kdf::KdfParams;
pub use keyfile::KeyFile;
pub use masterkey::Masterkey;
pub use names::{FileNameCryptor, NameEncoding};
pub use sealfs_core::{AuthFailure, Scheme, SealError, SealResult};
pub use sizes::ChunkGeometry;

/// Size of each masterkey half and of a content key (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AEAD authentication tag (GCM and Poly1305 alike)
pub const TAG_SIZE: usize = 16;

/// Cleartext bytes per content chunk
pub const CLEARTEXT_CHUNK_SIZE: usize = 32 * 1024;
