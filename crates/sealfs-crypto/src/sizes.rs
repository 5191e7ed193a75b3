//! Cleartext ↔ ciphertext size accounting for chunked files.
//!
//! Every full cleartext chunk maps to one full ciphertext chunk; a trailing
//! partial chunk costs the same fixed overhead (nonce + tag).

use sealfs_core::{Scheme, SealError, SealResult};

use crate::{aead, CLEARTEXT_CHUNK_SIZE, TAG_SIZE};

/// Chunk sizes of one encryption scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGeometry {
    cleartext_chunk_size: u64,
    ciphertext_chunk_size: u64,
}

impl ChunkGeometry {
    pub fn new(cleartext_chunk_size: u64, ciphertext_chunk_size: u64) -> SealResult<Self> {
        if cleartext_chunk_size == 0 || ciphertext_chunk_size <= cleartext_chunk_size {
            return Err(SealError::InvalidArgument(format!(
                "invalid chunk geometry {cleartext_chunk_size}/{ciphertext_chunk_size}"
            )));
        }
        Ok(Self {
            cleartext_chunk_size,
            ciphertext_chunk_size,
        })
    }

    pub fn for_scheme(scheme: Scheme) -> Self {
        let cleartext = CLEARTEXT_CHUNK_SIZE as u64;
        Self {
            cleartext_chunk_size: cleartext,
            ciphertext_chunk_size: cleartext + (aead::nonce_size(scheme) + TAG_SIZE) as u64,
        }
    }

    pub fn cleartext_chunk_size(&self) -> u64 {
        self.cleartext_chunk_size
    }

    pub fn ciphertext_chunk_size(&self) -> u64 {
        self.ciphertext_chunk_size
    }

    /// Bytes added to every chunk.
    pub fn overhead(&self) -> u64 {
        self.ciphertext_chunk_size - self.cleartext_chunk_size
    }

    /// Ciphertext size of `cleartext_size` bytes of content (header excluded).
    pub fn ciphertext_size(&self, cleartext_size: u64) -> SealResult<u64> {
        let chunks = cleartext_size / self.cleartext_chunk_size;
        let rem = cleartext_size % self.cleartext_chunk_size;
        let full = chunks
            .checked_mul(self.ciphertext_chunk_size)
            .ok_or_else(|| overflow(cleartext_size))?;
        if rem == 0 {
            return Ok(full);
        }
        full.checked_add(self.overhead() + rem)
            .ok_or_else(|| overflow(cleartext_size))
    }

    /// Cleartext size of `ciphertext_size` bytes of content (header excluded).
    ///
    /// Fails for sizes no cleartext can produce, i.e. a trailing chunk that
    /// is not longer than the overhead.
    pub fn cleartext_size(&self, ciphertext_size: u64) -> SealResult<u64> {
        let chunks = ciphertext_size / self.ciphertext_chunk_size;
        let rem = ciphertext_size % self.ciphertext_chunk_size;
        let full = chunks * self.cleartext_chunk_size;
        if rem == 0 {
            Ok(full)
        } else if rem > self.overhead() {
            Ok(full + rem - self.overhead())
        } else {
            Err(SealError::InvalidArgument(format!(
                "{ciphertext_size} is not a valid ciphertext size: trailing chunk of {rem} bytes"
            )))
        }
    }

    /// Ciphertext file size including the header. An empty file still has one.
    pub fn ciphertext_file_size(&self, cleartext_size: u64, header_size: u64) -> SealResult<u64> {
        self.ciphertext_size(cleartext_size)?
            .checked_add(header_size)
            .ok_or_else(|| overflow(cleartext_size))
    }

    /// Cleartext size of a ciphertext file. A zero-length file has no header
    /// yet and is empty.
    pub fn cleartext_file_size(&self, file_size: u64, header_size: u64) -> SealResult<u64> {
        if file_size == 0 {
            return Ok(0);
        }
        let content = file_size.checked_sub(header_size).ok_or_else(|| {
            SealError::InvalidArgument(format!(
                "file of {file_size} bytes is shorter than its {header_size}-byte header"
            ))
        })?;
        self.cleartext_size(content)
    }

    /// `(chunk_index, offset_in_chunk)` of a cleartext offset.
    pub fn chunk_position(&self, cleartext_offset: u64) -> (u64, u64) {
        (
            cleartext_offset / self.cleartext_chunk_size,
            cleartext_offset % self.cleartext_chunk_size,
        )
    }

    /// Byte offset of a chunk within the ciphertext file.
    pub fn ciphertext_chunk_offset(&self, chunk_index: u64, header_size: u64) -> SealResult<u64> {
        chunk_index
            .checked_mul(self.ciphertext_chunk_size)
            .and_then(|offset| offset.checked_add(header_size))
            .ok_or_else(|| SealError::InvalidArgument(format!("chunk index {chunk_index} out of range")))
    }
}

fn overflow(size: u64) -> SealError {
    SealError::InvalidArgument(format!("size {size} overflows ciphertext accounting"))
}
