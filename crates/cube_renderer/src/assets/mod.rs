//! Asset loading: texture files and SPIR-V bytecode
//!
//! Textures are sniffed by signature: uncompressed 24-bit BMP goes through
//! the built-in decoder, PNG through the `image` crate.

pub mod bmp;
pub mod image_loader;
pub mod spirv;

pub use image_loader::ImageData;
pub use spirv::SpirvCode;

use std::path::{Path, PathBuf};
use thiserror::Error;

/// PNG file signature
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// File could not be opened or read
    #[error("Cannot read '{path}': {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Leading bytes match no supported format
    #[error("Unrecognized file signature {found:02x?}")]
    UnrecognizedSignature {
        /// First bytes of the file
        found: Vec<u8>,
    },

    /// Bitmap header describes a variant the decoder does not handle
    #[error("Unsupported bitmap: {0}")]
    UnsupportedBitmap(String),

    /// Data ended before the header said it would
    #[error("Truncated data: needed {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// First word of a shader blob is not the SPIR-V magic number
    #[error("Bad SPIR-V magic number 0x{found:08x}")]
    BadSpirvMagic {
        /// Word actually found
        found: u32,
    },

    /// Decoder reported a failure
    #[error("Decode failed: {0}")]
    Decode(String),
}

/// Convenience result for asset loading
pub type AssetResult<T> = Result<T, AssetError>;

/// Read a whole file, attaching the path to any error
pub fn read_file(path: impl AsRef<Path>) -> AssetResult<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a texture file into RGBA8 pixels, picking the decoder from the file signature
pub fn load_texture_file(path: impl AsRef<Path>) -> AssetResult<ImageData> {
    let path = path.as_ref();
    log::debug!("[TEXTURE] Loading texture from {:?}", path);
    let bytes = read_file(path)?;
    let image = decode_texture(&bytes)?;
    log::info!("[TEXTURE] Loaded {}x{} texture from {:?}", image.width, image.height, path);
    Ok(image)
}

/// Decode texture bytes by signature
pub fn decode_texture(bytes: &[u8]) -> AssetResult<ImageData> {
    if bytes.starts_with(&bmp::SIGNATURE.to_le_bytes()) {
        bmp::decode(bytes)
    } else if bytes.starts_with(&PNG_SIGNATURE) {
        ImageData::from_png_bytes(bytes)
    } else {
        Err(AssetError::UnrecognizedSignature {
            found: bytes.iter().take(4).copied().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_signature_is_rejected() {
        let err = decode_texture(b"GIF89a....").unwrap_err();
        match err {
            AssetError::UnrecognizedSignature { found } => assert_eq!(found, b"GIF8".to_vec()),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(
            decode_texture(&[]),
            Err(AssetError::UnrecognizedSignature { .. })
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = load_texture_file("/nonexistent/puppy.bmp").unwrap_err();
        assert!(err.to_string().contains("puppy.bmp"));
    }

    #[test]
    fn test_shipped_texture_decodes() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../resources/textures/puppy.bmp");
        let image = load_texture_file(path).unwrap();
        assert_eq!((image.width, image.height, image.channels), (64, 64, 4));
        assert_eq!(image.data.len(), 64 * 64 * 4);
        assert_eq!(&image.data[..4], &[96, 64, 40, 255]);
    }
}
