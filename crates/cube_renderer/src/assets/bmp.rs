//! Uncompressed 24-bit BMP decoder
//!
//! Reads the 14-byte file header and the 40-byte info header, then expands
//! padded BGR rows into an RGBA buffer with alpha forced to 255. Rows keep
//! the file's bottom-up order, so row 0 of the output is the bottom scanline.

use super::{AssetError, AssetResult, ImageData};

/// `"BM"` read as a little-endian u16
pub const SIGNATURE: u16 = 0x4d42;

const FILE_HEADER_SIZE: usize = 14;
const INFO_HEADER_SIZE: usize = 40;
const BI_RGB: u32 = 0;

/// The `BITMAPFILEHEADER` fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Type tag, `SIGNATURE` for bitmaps
    pub type_tag: u16,
    /// Total file size as recorded by the writer
    pub file_size: u32,
    /// First reserved field
    pub reserved1: u16,
    /// Second reserved field
    pub reserved2: u16,
    /// Offset of the pixel array from the start of the file
    pub pixel_offset: u32,
}

/// The `BITMAPINFOHEADER` fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoHeader {
    /// Size of this header
    pub header_size: u32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels; negative means rows are stored top-down
    pub height: i32,
    /// Plane count, always 1
    pub planes: u16,
    /// Bits per pixel
    pub bit_count: u16,
    /// Compression method
    pub compression: u32,
    /// Size of the pixel array, may be 0 for `BI_RGB`
    pub image_size: u32,
    /// Horizontal resolution
    pub x_pixels_per_meter: i32,
    /// Vertical resolution
    pub y_pixels_per_meter: i32,
    /// Colors in the color table
    pub colors_used: u32,
    /// Important colors
    pub colors_important: u32,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> AssetResult<[u8; N]> {
        let end = self.pos + N;
        let slice = self.bytes.get(self.pos..end).ok_or(AssetError::Truncated {
            expected: end,
            actual: self.bytes.len(),
        })?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn u16(&mut self) -> AssetResult<u16> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> AssetResult<u32> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> AssetResult<i32> {
        self.take::<4>().map(i32::from_le_bytes)
    }
}

/// Parse both headers
pub fn read_headers(bytes: &[u8]) -> AssetResult<(FileHeader, InfoHeader)> {
    let mut r = Reader::new(bytes);

    let file = FileHeader {
        type_tag: r.u16()?,
        file_size: r.u32()?,
        reserved1: r.u16()?,
        reserved2: r.u16()?,
        pixel_offset: r.u32()?,
    };
    if file.type_tag != SIGNATURE {
        return Err(AssetError::UnrecognizedSignature {
            found: file.type_tag.to_le_bytes().to_vec(),
        });
    }

    let info = InfoHeader {
        header_size: r.u32()?,
        width: r.i32()?,
        height: r.i32()?,
        planes: r.u16()?,
        bit_count: r.u16()?,
        compression: r.u32()?,
        image_size: r.u32()?,
        x_pixels_per_meter: r.i32()?,
        y_pixels_per_meter: r.i32()?,
        colors_used: r.u32()?,
        colors_important: r.u32()?,
    };

    Ok((file, info))
}

/// Bytes per stored row: three per pixel, padded to a 4-byte boundary
pub const fn row_stride(width: usize) -> usize {
    4 * ((3 * width + 3) / 4)
}

/// Decode an uncompressed 24-bit bitmap into RGBA8
pub fn decode(bytes: &[u8]) -> AssetResult<ImageData> {
    let (file, info) = read_headers(bytes)?;

    if info.compression != BI_RGB {
        return Err(AssetError::UnsupportedBitmap(format!(
            "compression method {} (only uncompressed is supported)",
            info.compression
        )));
    }
    if info.bit_count != 24 {
        return Err(AssetError::UnsupportedBitmap(format!(
            "{} bits per pixel (only 24 is supported)",
            info.bit_count
        )));
    }
    if info.width <= 0 || info.height == 0 {
        return Err(AssetError::UnsupportedBitmap(format!(
            "degenerate size {}x{}",
            info.width, info.height
        )));
    }

    let width = info.width.unsigned_abs() as usize;
    let height = info.height.unsigned_abs() as usize;
    let top_down = info.height < 0;

    // Some writers leave the offset at zero; the pixel array then follows the headers.
    let offset = (file.pixel_offset as usize).max(FILE_HEADER_SIZE + INFO_HEADER_SIZE);
    let stride = row_stride(width);
    let needed = offset + stride * height;
    if bytes.len() < needed {
        return Err(AssetError::Truncated {
            expected: needed,
            actual: bytes.len(),
        });
    }

    log::debug!(
        "[TEXTURE] BMP {}x{} stride {} (padding {}) offset {}",
        width,
        height,
        stride,
        stride - 3 * width,
        offset
    );

    let mut rgba = Vec::with_capacity(width * height * 4);
    for out_row in 0..height {
        let stored_row = if top_down { height - 1 - out_row } else { out_row };
        let start = offset + stored_row * stride;
        for bgr in bytes[start..start + 3 * width].chunks_exact(3) {
            rgba.extend_from_slice(&[bgr[2], bgr[1], bgr[0], 255]);
        }
    }

    Ok(ImageData {
        data: rgba,
        width: width as u32,
        height: height as u32,
        channels: 4,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bottom-up 24-bit bitmap whose pixel at (x, y) is `color(x, y)` in RGB order
    fn encode(width: u32, height: u32, color: impl Fn(u32, u32) -> [u8; 3]) -> Vec<u8> {
        let stride = row_stride(width as usize);
        let pixel_bytes = stride * height as usize;
        let offset = (FILE_HEADER_SIZE + INFO_HEADER_SIZE) as u32;

        let mut out = Vec::new();
        out.extend_from_slice(&SIGNATURE.to_le_bytes());
        out.extend_from_slice(&(offset + pixel_bytes as u32).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());

        out.extend_from_slice(&40u32.to_le_bytes());
        out.extend_from_slice(&(width as i32).to_le_bytes());
        out.extend_from_slice(&(height as i32).to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&24u16.to_le_bytes());
        out.extend_from_slice(&BI_RGB.to_le_bytes());
        out.extend_from_slice(&(pixel_bytes as u32).to_le_bytes());
        out.extend_from_slice(&2835i32.to_le_bytes());
        out.extend_from_slice(&2835i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());

        for y in 0..height {
            let row_start = out.len();
            for x in 0..width {
                let [r, g, b] = color(x, y);
                out.extend_from_slice(&[b, g, r]);
            }
            out.resize(row_start + stride, 0);
        }
        out
    }

    #[test]
    fn test_row_stride_padding() {
        assert_eq!(row_stride(1), 4);
        assert_eq!(row_stride(3), 12);
        assert_eq!(row_stride(4), 12);
        assert_eq!(row_stride(5), 16);
        assert_eq!(row_stride(64), 192);
    }

    #[test]
    fn test_64x64_decodes_to_opaque_rgba() {
        let bytes = encode(64, 64, |x, y| [x as u8, y as u8, 7]);
        let image = decode(&bytes).unwrap();
        assert_eq!(image.width, 64);
        assert_eq!(image.height, 64);
        assert_eq!(image.data.len(), 64 * 64 * 4);
        assert!(image.data.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_channels_are_swapped_to_rgb() {
        let bytes = encode(2, 1, |x, _| if x == 0 { [10, 20, 30] } else { [40, 50, 60] });
        let image = decode(&bytes).unwrap();
        assert_eq!(image.data, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn test_row_padding_is_skipped() {
        // width 3 leaves 3 padding bytes per row
        let bytes = encode(3, 2, |x, y| [x as u8 * 10, y as u8 * 100, 1]);
        let image = decode(&bytes).unwrap();
        assert_eq!(image.data.len(), 3 * 2 * 4);
        // first pixel of the second stored row
        assert_eq!(&image.data[12..16], &[0, 100, 1, 255]);
        assert_eq!(&image.data[20..24], &[20, 100, 1, 255]);
    }

    #[test]
    fn test_top_down_rows_are_flipped_to_bottom_up() {
        let mut bytes = encode(1, 2, |_, y| [y as u8, 0, 0]);
        let height_at = FILE_HEADER_SIZE + 8;
        bytes[height_at..height_at + 4].copy_from_slice(&(-2i32).to_le_bytes());
        let image = decode(&bytes).unwrap();
        assert_eq!(image.data[0], 1);
        assert_eq!(image.data[4], 0);
    }

    #[test]
    fn test_pixel_offset_is_honored() {
        let mut bytes = encode(1, 1, |_, _| [9, 8, 7]);
        // insert 4 gap bytes between the headers and the pixels
        let header_end = FILE_HEADER_SIZE + INFO_HEADER_SIZE;
        bytes.splice(header_end..header_end, [0xAA; 4]);
        bytes[10..14].copy_from_slice(&((header_end + 4) as u32).to_le_bytes());
        let image = decode(&bytes).unwrap();
        assert_eq!(image.data, vec![9, 8, 7, 255]);
    }

    #[test]
    fn test_32_bit_is_rejected() {
        let mut bytes = encode(1, 1, |_, _| [0, 0, 0]);
        bytes[FILE_HEADER_SIZE + 14..FILE_HEADER_SIZE + 16].copy_from_slice(&32u16.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(AssetError::UnsupportedBitmap(_))));
    }

    #[test]
    fn test_compressed_is_rejected() {
        let mut bytes = encode(1, 1, |_, _| [0, 0, 0]);
        bytes[FILE_HEADER_SIZE + 16..FILE_HEADER_SIZE + 20].copy_from_slice(&1u32.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(AssetError::UnsupportedBitmap(_))));
    }

    #[test]
    fn test_truncated_pixels_are_rejected() {
        let mut bytes = encode(4, 4, |_, _| [1, 2, 3]);
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(decode(&bytes), Err(AssetError::Truncated { .. })));
    }

    #[test]
    fn test_headers_round_trip() {
        let bytes = encode(5, 3, |_, _| [0, 0, 0]);
        let (file, info) = read_headers(&bytes).unwrap();
        assert_eq!(file.type_tag, SIGNATURE);
        assert_eq!(file.pixel_offset, 54);
        assert_eq!(info.width, 5);
        assert_eq!(info.height, 3);
        assert_eq!(info.planes, 1);
        assert_eq!(info.bit_count, 24);
        assert_eq!(info.image_size as usize, row_stride(5) * 3);
    }
}
