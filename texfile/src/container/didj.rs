//! Leapster Didj .tex / .texs reader
//!
//! A 36-byte little-endian header followed by a zlib-compressed payload.
//! The decompressed data holds an optional palette and the pixel data; its
//! size must match the format math exactly. A `.texs` file concatenates
//! multiple `.tex` images; only the first is read, so its compressed size
//! may be smaller than the file.

use crate::container::MipmapCache;
use crate::decode::{linear, PixelFormat};
use crate::error::{Result, TextureError};
use crate::image::{TextureImage, MAX_DIMENSION};
use crate::reader::{BinaryReader, ByteOrder};
use crate::source::ByteSource;
use flate2::read::ZlibDecoder;
use std::io::Read;

pub const DIDJ_MAGIC: u32 = 0x0000_0003;

/// Pure header sniff: magic plus the single-image count.
pub fn is_supported(header: &[u8]) -> bool {
    header.len() >= 8
        && u32::from_le_bytes(header[0..4].try_into().unwrap()) == DIDJ_MAGIC
        && u32::from_le_bytes(header[4..8].try_into().unwrap()) == 1
}

const HEADER_SIZE: usize = 36;
const DIDJ_MAX_FILE_SIZE: u64 = 1024 * 1024;
const DIDJ_MAX_UNCOMPRESSED: u32 = 4 * 1024 * 1024;

// px_format values
const PXFMT_RGB565: u32 = 1;
const PXFMT_RGBA4444: u32 = 3;
const PXFMT_8BPP_RGB565: u32 = 4;
const PXFMT_8BPP_RGBA4444: u32 = 6;
const PXFMT_4BPP_RGB565: u32 = 7;
const PXFMT_4BPP_RGBA4444: u32 = 9;

/// Parsed Didj .tex header
#[derive(Debug, Clone)]
pub struct DidjHeader {
    pub magic: u32,
    pub num_images: u32,
    pub width: u32,
    pub height: u32,
    pub width_disp: u32,
    pub height_disp: u32,
    pub px_format: u32,
    pub compr_size: u32,
    pub uncompr_size: u32,
}

impl DidjHeader {
    pub fn parse(data: &[u8]) -> Result<DidjHeader> {
        let mut r = BinaryReader::new(data, ByteOrder::Little);
        Ok(DidjHeader {
            magic: r.read_u32()?,
            num_images: r.read_u32()?,
            width: r.read_u32()?,
            height: r.read_u32()?,
            width_disp: r.read_u32()?,
            height_disp: r.read_u32()?,
            px_format: r.read_u32()?,
            compr_size: r.read_u32()?,
            uncompr_size: r.read_u32()?,
        })
    }
}

/// An opened Didj texture
pub struct DidjFile {
    source: Box<dyn ByteSource>,
    header: DidjHeader,
    /// Multiple concatenated textures (.texs): only the first is read
    is_texs: bool,
    cache: MipmapCache,
}

impl DidjFile {
    /// Open a Didj texture. `is_texs` relaxes the compressed-size check to
    /// allow trailing concatenated textures.
    pub fn open(source: Box<dyn ByteSource>, is_texs: bool) -> Result<DidjFile> {
        let mut source = source;
        let file_size = source.size()?;
        if file_size < HEADER_SIZE as u64 || file_size > DIDJ_MAX_FILE_SIZE {
            return Err(TextureError::UnsupportedFormat);
        }

        let header_bytes = source.read_vec_at(0, HEADER_SIZE)?;
        let header = DidjHeader::parse(&header_bytes)?;

        if header.magic != DIDJ_MAGIC || header.num_images != 1 {
            return Err(TextureError::UnsupportedFormat);
        }
        if header.width == 0
            || header.height == 0
            || header.width > MAX_DIMENSION
            || header.height > MAX_DIMENSION
        {
            return Err(TextureError::invalid_dimensions(header.width, header.height));
        }
        if header.uncompr_size > DIDJ_MAX_UNCOMPRESSED {
            return Err(TextureError::invalid_header(
                "Didj uncompressed size out of range",
            ));
        }

        let total = HEADER_SIZE as u64 + header.compr_size as u64;
        if is_texs {
            if total > file_size {
                return Err(TextureError::truncated(total as usize, file_size as usize));
            }
        } else if total != file_size {
            return Err(TextureError::invalid_header(
                "Didj compressed size does not match the file size",
            ));
        }

        Ok(DidjFile {
            source,
            header,
            is_texs,
            cache: MipmapCache::new(1),
        })
    }

    pub fn header(&self) -> &DidjHeader {
        &self.header
    }

    pub fn texture_format_name(&self) -> &'static str {
        if self.is_texs {
            "Leapster Didj .texs"
        } else {
            "Leapster Didj .tex"
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.header.width, self.header.height)
    }

    pub fn mipmap_count(&self) -> u32 {
        1
    }

    pub fn premultiplied_alpha(&self) -> bool {
        false
    }

    pub fn pixel_format_name(&self) -> Option<String> {
        Some(
            match self.header.px_format {
                PXFMT_RGB565 => "RGB565",
                PXFMT_RGBA4444 => "RGBA4444",
                PXFMT_8BPP_RGB565 => "8bpp with RGB565 palette",
                PXFMT_8BPP_RGBA4444 => "8bpp with RGBA4444 palette",
                PXFMT_4BPP_RGB565 => "4bpp with RGB565 palette",
                PXFMT_4BPP_RGBA4444 => "4bpp with RGBA4444 palette",
                other => return Some(format!("Unknown (0x{other:08X})")),
            }
            .to_string(),
        )
    }

    pub fn mipmap(&mut self, level: u32) -> Result<&TextureImage> {
        if level != 0 {
            return Err(TextureError::invalid_header("Didj textures have no mipmaps"));
        }
        if self.cache.contains(0) {
            return Ok(self.cache.get(0).unwrap());
        }
        let img = self.decode_image()?;
        Ok(self.cache.insert(0, img))
    }

    fn decode_image(&mut self) -> Result<TextureImage> {
        let hdr = self.header.clone();
        let compressed = self
            .source
            .read_vec_at(HEADER_SIZE as u64, hdr.compr_size as usize)?;

        // Inflate the payload. The stream must fill the declared size
        // exactly; a short or overlong stream is a hard error here, not the
        // RLE-style leniency.
        let mut data = vec![0u8; hdr.uncompr_size as usize];
        let mut decoder = ZlibDecoder::new(compressed.as_slice());
        decoder
            .read_exact(&mut data)
            .map_err(|e| TextureError::invalid_header(format!("Didj zlib payload: {e}")))?;

        let (width, height) = (hdr.width, hdr.height);
        let px_count = width as usize * height as usize;

        // Palette formats store the palette first, then the indices. The
        // decompressed size must match the format math exactly.
        match hdr.px_format {
            PXFMT_RGB565 | PXFMT_RGBA4444 => {
                let img_siz = px_count * 2;
                if img_siz != data.len() {
                    return Err(TextureError::truncated(img_siz, data.len()));
                }
                let pxf = if hdr.px_format == PXFMT_RGB565 {
                    PixelFormat::Rgb565
                } else {
                    PixelFormat::Rgba4444
                };
                linear::from_linear16(pxf, width, height, &data, 0)
            }

            PXFMT_8BPP_RGB565 | PXFMT_8BPP_RGBA4444 => {
                let pal_siz = 256 * 2;
                if pal_siz + px_count != data.len() {
                    return Err(TextureError::truncated(pal_siz + px_count, data.len()));
                }
                let pxf = if hdr.px_format == PXFMT_8BPP_RGB565 {
                    PixelFormat::Rgb565
                } else {
                    PixelFormat::Rgba4444
                };
                linear::from_linear_ci8(pxf, width, height, &data[pal_siz..], &data[..pal_siz])
            }

            PXFMT_4BPP_RGB565 | PXFMT_4BPP_RGBA4444 => {
                let pal_siz = 16 * 2;
                let img_siz = px_count / 2;
                if pal_siz + img_siz != data.len() {
                    return Err(TextureError::truncated(pal_siz + img_siz, data.len()));
                }
                let pxf = if hdr.px_format == PXFMT_4BPP_RGB565 {
                    PixelFormat::Rgb565
                } else {
                    PixelFormat::Rgba4444
                };
                linear::from_linear_ci4(
                    pxf,
                    true,
                    width,
                    height,
                    &data[pal_siz..],
                    &data[..pal_siz],
                )
            }

            other => Err(TextureError::invalid_header(format!(
                "unsupported Didj pixel format {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    fn build_didj(px_format: u32, width: u32, height: u32, payload: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut data = Vec::new();
        data.extend_from_slice(&DIDJ_MAGIC.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes()); // num images
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        data.extend_from_slice(&width.to_le_bytes()); // display width
        data.extend_from_slice(&height.to_le_bytes()); // display height
        data.extend_from_slice(&px_format.to_le_bytes());
        data.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&compressed);
        data
    }

    #[test]
    fn test_rgb565_decode() {
        let payload = [0xFF, 0xFF, 0x00, 0x00]; // white, black
        let data = build_didj(PXFMT_RGB565, 2, 1, &payload);
        let mut didj = DidjFile::open(Box::new(Cursor::new(data)), false).unwrap();
        assert_eq!(didj.pixel_format_name().as_deref(), Some("RGB565"));
        let img = didj.mipmap(0).unwrap();
        assert_eq!(img.pixel(0, 0), Some(0xFFFFFFFF));
        assert_eq!(img.pixel(1, 0), Some(0xFF000000));
    }

    #[test]
    fn test_8bpp_palette_decode() {
        // 256-entry RGB565 palette: entry 0 = red, entry 1 = green.
        let mut payload = vec![0u8; 512];
        payload[0..2].copy_from_slice(&0xF800u16.to_le_bytes());
        payload[2..4].copy_from_slice(&0x07E0u16.to_le_bytes());
        payload.extend_from_slice(&[0, 1]); // 2x1 indices
        let data = build_didj(PXFMT_8BPP_RGB565, 2, 1, &payload);
        let mut didj = DidjFile::open(Box::new(Cursor::new(data)), false).unwrap();
        let img = didj.mipmap(0).unwrap().to_argb32().unwrap();
        assert_eq!(img.pixel(0, 0), Some(0xFFFF0000));
        assert_eq!(img.pixel(1, 0), Some(0xFF00FF00));
    }

    #[test]
    fn test_4bpp_palette_decode() {
        let mut payload = vec![0u8; 32];
        payload[0..2].copy_from_slice(&0xF800u16.to_le_bytes());
        payload[2..4].copy_from_slice(&0x07E0u16.to_le_bytes());
        payload.push(0x01); // MSN first: indices 0, 1
        let data = build_didj(PXFMT_4BPP_RGB565, 2, 1, &payload);
        let mut didj = DidjFile::open(Box::new(Cursor::new(data)), false).unwrap();
        let img = didj.mipmap(0).unwrap().to_argb32().unwrap();
        assert_eq!(img.pixel(0, 0), Some(0xFFFF0000));
        assert_eq!(img.pixel(1, 0), Some(0xFF00FF00));
    }

    #[test]
    fn test_size_mismatch_rejected() {
        // Declared dimensions don't match the decompressed size.
        let payload = [0u8; 8];
        let data = build_didj(PXFMT_RGB565, 4, 4, &payload);
        let mut didj = DidjFile::open(Box::new(Cursor::new(data)), false).unwrap();
        assert!(didj.mipmap(0).is_err());
    }

    #[test]
    fn test_tex_size_must_match_exactly() {
        let payload = [0u8; 2];
        let mut data = build_didj(PXFMT_RGB565, 1, 1, &payload);
        data.push(0); // trailing garbage
        assert!(DidjFile::open(Box::new(Cursor::new(data.clone())), false).is_err());
        // .texs allows trailing data (more concatenated textures).
        assert!(DidjFile::open(Box::new(Cursor::new(data)), true).is_ok());
    }

    #[test]
    fn test_wrong_magic() {
        let payload = [0u8; 2];
        let mut data = build_didj(PXFMT_RGB565, 1, 1, &payload);
        data[0] = 0xFF;
        assert!(matches!(
            DidjFile::open(Box::new(Cursor::new(data)), false),
            Err(TextureError::UnsupportedFormat)
        ));
    }
}
