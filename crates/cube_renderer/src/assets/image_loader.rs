//! Decoded texture pixels ready for staging

use super::{AssetError, AssetResult};

/// Loaded image data ready for GPU upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Raw RGBA pixel data, tightly packed rows
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Number of color channels (always 4)
    pub channels: u8,
}

impl ImageData {
    /// Decode a PNG held in memory
    pub fn from_png_bytes(bytes: &[u8]) -> AssetResult<Self> {
        let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
            .map_err(|e| AssetError::Decode(format!("PNG: {e}")))?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::debug!("[TEXTURE] Decoded PNG {}x{}", width, height);

        Ok(Self {
            data: rgba.into_raw(),
            width,
            height,
            channels: 4,
        })
    }

    /// Create a solid color image
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = (width * height) as usize;
        Self {
            data: color.repeat(pixel_count),
            width,
            height,
            channels: 4,
        }
    }

    /// Tightly packed bytes per row
    pub fn row_bytes(&self) -> usize {
        self.width as usize * usize::from(self.channels)
    }

    /// Get the size of the image data in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_color_image() {
        let img = ImageData::solid_color(4, 4, [255, 0, 0, 255]);
        assert_eq!(img.width, 4);
        assert_eq!(img.height, 4);
        assert_eq!(img.size_bytes(), 4 * 4 * 4);
        assert_eq!(img.row_bytes(), 16);
        assert_eq!(&img.data[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_png_decodes_to_rgba() {
        let mut encoded = Vec::new();
        let source = image::RgbImage::from_pixel(2, 3, image::Rgb([1, 2, 3]));
        image::DynamicImage::ImageRgb8(source)
            .write_to(&mut std::io::Cursor::new(&mut encoded), image::ImageFormat::Png)
            .unwrap();

        let img = ImageData::from_png_bytes(&encoded).unwrap();
        assert_eq!((img.width, img.height), (2, 3));
        assert_eq!(&img.data[0..4], &[1, 2, 3, 255]);
        assert_eq!(img.size_bytes(), 2 * 3 * 4);
    }

    #[test]
    fn test_corrupt_png_is_a_decode_error() {
        let bytes = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        assert!(matches!(ImageData::from_png_bytes(&bytes), Err(AssetError::Decode(_))));
    }
}
