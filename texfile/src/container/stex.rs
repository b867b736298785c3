//! Godot STEX reader (StreamTexture v3 `GDST`, CompressedTexture2D v4 `GST2`)
//!
//! Both versions share the pixel format enum (Godot's `Image::Format`) with
//! flag bits packed into the same word for v3. Instead of a raw payload the
//! container may wrap an embedded PNG or WebP file; PNG is decoded, WebP is
//! recognized and reported unsupported. Neither version stores explicit
//! mipmap offsets: levels are discovered by halving dimensions until the
//! file runs out.

use crate::container::MipmapCache;
use crate::decode::{linear, s3tc, PixelFormat};
use crate::error::{Result, TextureError};
use crate::image::{PixelLayout, TextureImage, MAX_DIMENSION};
use crate::reader::{BinaryReader, ByteOrder};
use crate::source::ByteSource;

pub const STEX3_MAGIC: [u8; 4] = *b"GDST";
pub const STEX4_MAGIC: [u8; 4] = *b"GST2";

/// Pure magic-number sniff; matches both STEX versions.
pub fn is_supported(header: &[u8]) -> bool {
    header.len() >= 4 && (header[0..4] == STEX3_MAGIC || header[0..4] == STEX4_MAGIC)
}

const STEX3_HEADER_SIZE: usize = 20;
const STEX4_HEADER_SIZE: usize = 32;
const STEX_MAX_SIZE: u64 = 128 * 1024 * 1024;
const EMBED_MAX_SIZE: u32 = 16 * 1024 * 1024;

// v3 format word flag bits
const FORMAT_BIT_LOSSLESS: u32 = 1 << 20;
const FORMAT_BIT_LOSSY: u32 = 1 << 21;
const FORMAT_BIT_HAS_MIPMAPS: u32 = 1 << 23;
const FORMAT_MASK: u32 = (1 << 20) - 1;

// v4 data formats
const STEX4_DATA_FORMAT_IMAGE: u32 = 0;
const STEX4_DATA_FORMAT_PNG: u32 = 1;
const STEX4_DATA_FORMAT_WEBP: u32 = 2;

/// Godot pixel formats (Image::Format), the subset this reader decodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StexFormat {
    L8 = 0,
    La8 = 1,
    R8 = 2,
    Rg8 = 3,
    Rgb8 = 4,
    Rgba8 = 5,
    Rgba4444 = 6,
    Rgb565 = 7,
    RgbE9995 = 16,
    Dxt1 = 17,
    Dxt3 = 18,
    Dxt5 = 19,
    RgtcR = 20,
    RgtcRg = 21,
}

impl StexFormat {
    fn from_raw(raw: u32) -> Option<StexFormat> {
        use StexFormat::*;
        Some(match raw {
            0 => L8,
            1 => La8,
            2 => R8,
            3 => Rg8,
            4 => Rgb8,
            5 => Rgba8,
            6 => Rgba4444,
            7 => Rgb565,
            16 => RgbE9995,
            17 => Dxt1,
            18 => Dxt3,
            19 => Dxt5,
            20 => RgtcR,
            21 => RgtcRg,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        use StexFormat::*;
        match self {
            L8 => "L8",
            La8 => "LA8",
            R8 => "R8",
            Rg8 => "RG8",
            Rgb8 => "RGB8",
            Rgba8 => "RGBA8",
            Rgba4444 => "RGBA4444",
            Rgb565 => "RGB565",
            RgbE9995 => "RGBE9995",
            Dxt1 => "DXT1",
            Dxt3 => "DXT3",
            Dxt5 => "DXT5",
            RgtcR => "RGTC_R",
            RgtcRg => "RGTC_RG",
        }
    }

    fn image_size(self, width: u32, height: u32) -> usize {
        use StexFormat::*;
        let (w, h) = (width as usize, height as usize);
        match self {
            L8 | R8 => w * h,
            La8 | Rg8 | Rgba4444 | Rgb565 => w * h * 2,
            Rgb8 => w * h * 3,
            Rgba8 | RgbE9995 => w * h * 4,
            Dxt1 | RgtcR => width.div_ceil(4) as usize * height.div_ceil(4) as usize * 8,
            Dxt3 | Dxt5 | RgtcRg => {
                width.div_ceil(4) as usize * height.div_ceil(4) as usize * 16
            }
        }
    }
}

/// Payload kind: raw pixel data or an embedded image file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    Raw(StexFormat),
    Png,
    Webp,
}

struct MipLevel {
    addr: u64,
    size: usize,
    width: u32,
    height: u32,
}

/// An opened Godot STEX file
pub struct StexFile {
    source: Box<dyn ByteSource>,
    version: u8, // 3 or 4
    width: u32,
    height: u32,
    rescale_width: u32,
    rescale_height: u32,
    payload: Payload,
    levels: Vec<MipLevel>,
    cache: MipmapCache,
}

impl StexFile {
    pub fn open(mut source: Box<dyn ByteSource>) -> Result<StexFile> {
        let file_size = source.size()?;
        if file_size < STEX3_HEADER_SIZE as u64 || file_size > STEX_MAX_SIZE {
            return Err(TextureError::UnsupportedFormat);
        }

        let mut magic = [0u8; 4];
        source.read_exact_at(0, &mut magic)?;
        match magic {
            STEX3_MAGIC => Self::open_v3(source, file_size),
            STEX4_MAGIC => Self::open_v4(source, file_size),
            _ => Err(TextureError::UnsupportedFormat),
        }
    }

    fn open_v3(mut source: Box<dyn ByteSource>, file_size: u64) -> Result<StexFile> {
        let header = source.read_vec_at(0, STEX3_HEADER_SIZE)?;
        let mut r = BinaryReader::new(&header[4..], ByteOrder::Little);
        let width = r.read_u16()? as u32;
        let rescale_width = r.read_u16()? as u32;
        let height = r.read_u16()? as u32;
        let rescale_height = r.read_u16()? as u32;
        let _texture_flags = r.read_u32()?;
        let format_word = r.read_u32()?;

        let payload = if format_word & FORMAT_BIT_LOSSLESS != 0 {
            Payload::Png
        } else if format_word & FORMAT_BIT_LOSSY != 0 {
            Payload::Webp
        } else {
            Payload::Raw(StexFormat::from_raw(format_word & FORMAT_MASK).ok_or_else(|| {
                TextureError::invalid_header(format!(
                    "unsupported STEX pixel format {}",
                    format_word & FORMAT_MASK
                ))
            })?)
        };

        Self::finish(
            source,
            file_size,
            3,
            width,
            height,
            rescale_width,
            rescale_height,
            payload,
            STEX3_HEADER_SIZE as u64,
            format_word & FORMAT_BIT_HAS_MIPMAPS != 0,
        )
    }

    fn open_v4(mut source: Box<dyn ByteSource>, file_size: u64) -> Result<StexFile> {
        if file_size < STEX4_HEADER_SIZE as u64 {
            return Err(TextureError::UnsupportedFormat);
        }
        let header = source.read_vec_at(0, STEX4_HEADER_SIZE)?;
        let mut r = BinaryReader::new(&header[4..], ByteOrder::Little);
        let version = r.read_u32()?;
        if version != 1 {
            return Err(TextureError::invalid_header(format!(
                "unsupported STEX4 version {version}"
            )));
        }
        let width = r.read_u32()?;
        let height = r.read_u32()?;
        let data_format = r.read_u32()?;
        let mipmap_count = r.read_u32()?;
        let pixel_format = r.read_u32()?;

        let payload = match data_format {
            STEX4_DATA_FORMAT_IMAGE => {
                Payload::Raw(StexFormat::from_raw(pixel_format).ok_or_else(|| {
                    TextureError::invalid_header(format!(
                        "unsupported STEX pixel format {pixel_format}"
                    ))
                })?)
            }
            STEX4_DATA_FORMAT_PNG => Payload::Png,
            STEX4_DATA_FORMAT_WEBP => Payload::Webp,
            other => {
                return Err(TextureError::invalid_header(format!(
                    "unsupported STEX4 data format {other}"
                )));
            }
        };

        Self::finish(
            source,
            file_size,
            4,
            width,
            height,
            0,
            0,
            payload,
            STEX4_HEADER_SIZE as u64,
            mipmap_count > 1,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        mut source: Box<dyn ByteSource>,
        file_size: u64,
        version: u8,
        width: u32,
        height: u32,
        rescale_width: u32,
        rescale_height: u32,
        payload: Payload,
        mut addr: u64,
        has_mipmaps: bool,
    ) -> Result<StexFile> {
        if width == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(TextureError::invalid_dimensions(width, height));
        }
        if rescale_width > MAX_DIMENSION || rescale_height > MAX_DIMENSION {
            return Err(TextureError::invalid_dimensions(rescale_width, rescale_height));
        }

        let mut width = width;
        let mut height = height.max(1);
        let mut levels = Vec::new();

        match payload {
            Payload::Png | Payload::Webp => {
                // Embedded file: u32 size (including the fourCC), u32 fourCC,
                // then the file data. v3 stores an extra u32 (the embedded
                // mipmap count) before the header.
                let embed_addr = if version == 3 { addr + 4 } else { addr };
                let mut embed = [0u8; 8];
                source.read_exact_at(embed_addr, &mut embed)?;
                let embed_size = u32::from_le_bytes(embed[0..4].try_into().unwrap());
                if embed_size <= 4 || embed_size >= EMBED_MAX_SIZE {
                    return Err(TextureError::invalid_header(
                        "STEX embedded file size out of range",
                    ));
                }
                let data_addr = embed_addr + 8;
                let data_size = (embed_size - 4) as usize;
                if data_addr + data_size as u64 > file_size {
                    return Err(TextureError::truncated(
                        (data_addr + data_size as u64) as usize,
                        file_size as usize,
                    ));
                }
                levels.push(MipLevel {
                    addr: data_addr,
                    size: data_size,
                    width,
                    height,
                });
            }
            Payload::Raw(format) => {
                let size = format.image_size(width, height);
                if size == 0 || addr + size as u64 > file_size {
                    return Err(TextureError::truncated(
                        (addr + size as u64) as usize,
                        file_size as usize,
                    ));
                }
                levels.push(MipLevel { addr, size, width, height });
                addr += size as u64;

                // No stored offsets: keep halving until the data runs out.
                if has_mipmaps && height > 1 {
                    loop {
                        width /= 2;
                        height /= 2;
                        if width == 0 || height == 0 {
                            break;
                        }
                        let size = format.image_size(width, height);
                        if size == 0 || addr + size as u64 > file_size {
                            break;
                        }
                        levels.push(MipLevel { addr, size, width, height });
                        addr += size as u64;
                    }
                }
            }
        }

        let count = levels.len();
        let (width, height) = (levels[0].width, levels[0].height);
        Ok(StexFile {
            source,
            version,
            width,
            height,
            rescale_width,
            rescale_height,
            payload,
            levels,
            cache: MipmapCache::new(count),
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Display dimensions when the texture is rescaled on load (v3 only)
    pub fn rescale_dimensions(&self) -> Option<(u32, u32)> {
        if self.rescale_width > 0 || self.rescale_height > 0 {
            Some((self.rescale_width, self.rescale_height))
        } else {
            None
        }
    }

    pub fn texture_format_name(&self) -> &'static str {
        match self.version {
            3 => "Godot STEX3",
            _ => "Godot STEX4",
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn mipmap_count(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn premultiplied_alpha(&self) -> bool {
        false
    }

    pub fn pixel_format_name(&self) -> Option<String> {
        Some(match self.payload {
            Payload::Raw(format) => format.name().to_string(),
            Payload::Png => "PNG (embedded)".to_string(),
            Payload::Webp => "WebP (embedded)".to_string(),
        })
    }

    pub fn mipmap(&mut self, level: u32) -> Result<&TextureImage> {
        let idx = level as usize;
        if idx >= self.levels.len() {
            return Err(TextureError::invalid_header(format!(
                "mipmap level {level} out of range (count {})",
                self.levels.len()
            )));
        }
        if self.cache.contains(idx) {
            return Ok(self.cache.get(idx).unwrap());
        }

        let info = &self.levels[idx];
        let buf = self.source.read_vec_at(info.addr, info.size)?;
        let (w, h) = (info.width, info.height);

        let img = match self.payload {
            Payload::Webp => {
                return Err(TextureError::invalid_header(
                    "STEX WebP payloads are not supported",
                ));
            }
            Payload::Png => decode_embedded_png(&buf)?,
            Payload::Raw(format) => {
                use StexFormat::*;
                match format {
                    L8 => linear::from_linear8(PixelFormat::L8, w, h, &buf, 0)?,
                    La8 => linear::from_linear16(PixelFormat::A8L8, w, h, &buf, 0)?,
                    R8 => linear::from_linear8(PixelFormat::R8, w, h, &buf, 0)?,
                    Rg8 => linear::from_linear16(PixelFormat::Gr88, w, h, &buf, 0)?,
                    Rgb8 => linear::from_linear24(PixelFormat::Bgr888, w, h, &buf, 0)?,
                    Rgba8 => linear::from_linear32(PixelFormat::Abgr8888, w, h, &buf, 0)?,
                    Rgba4444 => linear::from_linear16(PixelFormat::Rgba4444, w, h, &buf, 0)?,
                    Rgb565 => linear::from_linear16(PixelFormat::Rgb565, w, h, &buf, 0)?,
                    RgbE9995 => {
                        return Err(TextureError::invalid_header(
                            "STEX RGBE9995 is not supported",
                        ));
                    }
                    Dxt1 => s3tc::from_dxt1_a1(w, h, &buf)?,
                    Dxt3 => s3tc::from_dxt3(w, h, &buf)?,
                    Dxt5 => s3tc::from_dxt5(w, h, &buf)?,
                    RgtcR => s3tc::from_bc4(w, h, &buf)?,
                    RgtcRg => s3tc::from_bc5(w, h, &buf)?,
                }
            }
        };
        Ok(self.cache.insert(idx, img))
    }
}

/// Decode an embedded PNG payload into the canonical image.
fn decode_embedded_png(buf: &[u8]) -> Result<TextureImage> {
    let decoded = image::load_from_memory_with_format(buf, image::ImageFormat::Png)
        .map_err(|e| TextureError::invalid_header(format!("embedded PNG: {e}")))?
        .to_rgba8();

    let (w, h) = decoded.dimensions();
    let mut img = TextureImage::new(w, h, PixelLayout::Argb32)?;
    for y in 0..h {
        let dest = &mut img.scanline_argb_mut(y)?[..w as usize];
        for (d, px) in dest.iter_mut().zip(decoded.rows().nth(y as usize).unwrap()) {
            let [r, g, b, a] = px.0;
            *d = ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32);
        }
    }
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_stex3(
        width: u16,
        height: u16,
        format_word: u32,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&STEX3_MAGIC);
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes()); // rescale width
        data.extend_from_slice(&height.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes()); // rescale height
        data.extend_from_slice(&0u32.to_le_bytes()); // texture flags
        data.extend_from_slice(&format_word.to_le_bytes());
        data.extend_from_slice(payload);
        data
    }

    fn build_stex4(
        width: u32,
        height: u32,
        data_format: u32,
        mipmap_count: u32,
        pixel_format: u32,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&STEX4_MAGIC);
        data.extend_from_slice(&1u32.to_le_bytes()); // version
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        data.extend_from_slice(&data_format.to_le_bytes());
        data.extend_from_slice(&mipmap_count.to_le_bytes());
        data.extend_from_slice(&pixel_format.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes()); // reserved
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn test_stex3_rgba8() {
        let payload = [0x11, 0x22, 0x33, 0xFF]; // memory r,g,b,a
        let data = build_stex3(1, 1, StexFormat::Rgba8 as u32, &payload);
        let mut stex = StexFile::open(Box::new(Cursor::new(data))).unwrap();
        assert_eq!(stex.version(), 3);
        assert_eq!(stex.pixel_format_name().as_deref(), Some("RGBA8"));
        assert_eq!(stex.mipmap(0).unwrap().pixel(0, 0), Some(0xFF112233));
    }

    #[test]
    fn test_stex3_mipmap_discovery() {
        // 2x2 L8 with the mipmap flag: level 0 (4 bytes) + level 1 (1 byte).
        let payload = [0xAA, 0xBB, 0xCC, 0xDD, 0x11];
        let format_word = StexFormat::L8 as u32 | FORMAT_BIT_HAS_MIPMAPS;
        let data = build_stex3(2, 2, format_word, &payload);
        let mut stex = StexFile::open(Box::new(Cursor::new(data))).unwrap();
        assert_eq!(stex.mipmap_count(), 2);
        assert_eq!(stex.mipmap(1).unwrap().pixel(0, 0), Some(0xFF111111));
    }

    #[test]
    fn test_stex4_dxt1() {
        let block = [0u8; 8];
        let data = build_stex4(4, 4, STEX4_DATA_FORMAT_IMAGE, 1, StexFormat::Dxt1 as u32, &block);
        let mut stex = StexFile::open(Box::new(Cursor::new(data))).unwrap();
        assert_eq!(stex.version(), 4);
        assert_eq!(stex.mipmap(0).unwrap().pixel(0, 0), Some(0xFF000000));
    }

    #[test]
    fn test_embedded_png_payload() {
        // Encode a tiny 1x1 red PNG with the image crate, then wrap it.
        let mut png = Vec::new();
        let rgba = image::RgbaImage::from_raw(1, 1, vec![0xFF, 0, 0, 0xFF]).unwrap();
        image::DynamicImage::ImageRgba8(rgba)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        // v4 embed: u32 size (fourCC included) + fourCC + data.
        let mut payload = Vec::new();
        payload.extend_from_slice(&((png.len() as u32 + 4).to_le_bytes()));
        payload.extend_from_slice(b"PNG ");
        payload.extend_from_slice(&png);
        let data = build_stex4(1, 1, STEX4_DATA_FORMAT_PNG, 1, 0, &payload);
        let mut stex = StexFile::open(Box::new(Cursor::new(data))).unwrap();
        assert_eq!(stex.pixel_format_name().as_deref(), Some("PNG (embedded)"));
        assert_eq!(stex.mipmap(0).unwrap().pixel(0, 0), Some(0xFFFF0000));
    }

    #[test]
    fn test_stex3_embedded_png_payload() {
        // v3 stores a mipmap-count word before the embed header.
        let mut png = Vec::new();
        let rgba = image::RgbaImage::from_raw(1, 1, vec![0, 0xFF, 0, 0xFF]).unwrap();
        image::DynamicImage::ImageRgba8(rgba)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let mut payload = Vec::new();
        payload.extend_from_slice(&1u32.to_le_bytes()); // embedded mipmaps
        payload.extend_from_slice(&((png.len() as u32 + 4).to_le_bytes()));
        payload.extend_from_slice(b"PNG ");
        payload.extend_from_slice(&png);
        let data = build_stex3(1, 1, FORMAT_BIT_LOSSLESS, &payload);
        let mut stex = StexFile::open(Box::new(Cursor::new(data))).unwrap();
        assert_eq!(stex.version(), 3);
        assert_eq!(stex.mipmap(0).unwrap().pixel(0, 0), Some(0xFF00FF00));
    }

    #[test]
    fn test_webp_recognized_but_unsupported() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&8u32.to_le_bytes());
        payload.extend_from_slice(b"WEBP");
        payload.extend_from_slice(&[0u8; 4]);
        let data = build_stex4(1, 1, STEX4_DATA_FORMAT_WEBP, 1, 0, &payload);
        let mut stex = StexFile::open(Box::new(Cursor::new(data))).unwrap();
        assert!(stex.mipmap(0).is_err());
    }

    #[test]
    fn test_truncated_raw_payload() {
        let data = build_stex3(2, 2, StexFormat::Rgba8 as u32, &[0u8; 8]);
        assert!(matches!(
            StexFile::open(Box::new(Cursor::new(data))),
            Err(TextureError::TruncatedInput { .. })
        ));
    }
}
