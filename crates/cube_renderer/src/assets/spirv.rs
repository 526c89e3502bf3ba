//! SPIR-V bytecode loading
//!
//! A blob is accepted only if its first little-endian word is the SPIR-V
//! magic number; the rest is handed to the driver untouched.

use std::path::Path;

use super::{read_file, AssetError, AssetResult};

/// First word of every SPIR-V module
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Validated SPIR-V words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpirvCode {
    words: Vec<u32>,
}

impl SpirvCode {
    /// Check the magic number and repack the bytes as words
    pub fn from_bytes(bytes: &[u8]) -> AssetResult<Self> {
        let magic_bytes: [u8; 4] = bytes
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or(AssetError::Truncated {
                expected: 4,
                actual: bytes.len(),
            })?;
        let found = u32::from_le_bytes(magic_bytes);
        if found != SPIRV_MAGIC {
            return Err(AssetError::BadSpirvMagic { found });
        }
        if bytes.len() % 4 != 0 {
            return Err(AssetError::Decode(format!(
                "SPIR-V length {} is not a multiple of 4",
                bytes.len()
            )));
        }

        let words = bytes
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect();
        Ok(Self { words })
    }

    /// Read and validate a `.spv` file
    pub fn from_file(path: impl AsRef<Path>) -> AssetResult<Self> {
        let path = path.as_ref();
        log::debug!("[SHADER] Loading SPIR-V from {:?}", path);
        let bytes = read_file(path)?;
        let code = Self::from_bytes(&bytes)?;
        log::debug!("[SHADER] {:?}: {} words", path, code.words.len());
        Ok(code)
    }

    /// The module words, magic number included
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Size in bytes
    pub fn byte_len(&self) -> usize {
        self.words.len() * 4
    }
}
