//! Valve VTF3 (PlayStation 3) reader
//!
//! Console texture dumps with a minimal 32-byte big-endian header. Only two
//! pixel formats exist: DXT5 when the alpha flag is set, DXT1 otherwise.
//! Pixel data starts right after the header.

use crate::container::MipmapCache;
use crate::decode::s3tc;
use crate::error::{Result, TextureError};
use crate::image::{TextureImage, MAX_DIMENSION};
use crate::reader::{BinaryReader, ByteOrder};
use crate::source::ByteSource;

pub const VTF3_MAGIC: [u8; 4] = *b"VTF3";

/// Pure magic-number sniff; no I/O, no side effects.
pub fn is_supported(header: &[u8]) -> bool {
    header.len() >= 4 && header[0..4] == VTF3_MAGIC
}

const HEADER_SIZE: usize = 32;
const VTF3_MAX_SIZE: u64 = 128 * 1024 * 1024;

// Alpha flag: DXT5 instead of DXT1.
const VTF3_FLAG_ALPHA: u32 = 0x2000;

/// Parsed VTF3 header
#[derive(Debug, Clone)]
pub struct Vtf3Header {
    pub flags: u32,
    pub width: u16,
    pub height: u16,
}

impl Vtf3Header {
    pub fn parse(data: &[u8]) -> Result<Vtf3Header> {
        if data.len() < HEADER_SIZE || data[0..4] != VTF3_MAGIC {
            return Err(TextureError::UnsupportedFormat);
        }
        let mut r = BinaryReader::new(&data[4..], ByteOrder::Big);
        r.skip(8)?; // unknown
        let flags = r.read_u32()?;
        let width = r.read_u16()?;
        let height = r.read_u16()?;
        Ok(Vtf3Header { flags, width, height })
    }

    pub fn is_dxt5(&self) -> bool {
        self.flags & VTF3_FLAG_ALPHA != 0
    }
}

/// An opened VTF3 file
pub struct Vtf3File {
    source: Box<dyn ByteSource>,
    header: Vtf3Header,
    cache: MipmapCache,
}

impl Vtf3File {
    pub fn open(mut source: Box<dyn ByteSource>) -> Result<Vtf3File> {
        let file_size = source.size()?;
        if file_size < HEADER_SIZE as u64 || file_size > VTF3_MAX_SIZE {
            return Err(TextureError::UnsupportedFormat);
        }

        let header_bytes = source.read_vec_at(0, HEADER_SIZE)?;
        let header = Vtf3Header::parse(&header_bytes)?;

        if header.width == 0
            || header.height == 0
            || header.width as u32 > MAX_DIMENSION
            || header.height as u32 > MAX_DIMENSION
        {
            return Err(TextureError::invalid_dimensions(
                header.width as u32,
                header.height as u32,
            ));
        }

        let block_bytes: usize = if header.is_dxt5() { 16 } else { 8 };
        let expected = (header.width as u32).div_ceil(4) as usize
            * (header.height as u32).div_ceil(4) as usize
            * block_bytes;
        if HEADER_SIZE as u64 + expected as u64 > file_size {
            return Err(TextureError::truncated(
                HEADER_SIZE + expected,
                file_size as usize,
            ));
        }

        Ok(Vtf3File {
            source,
            header,
            cache: MipmapCache::new(1),
        })
    }

    pub fn header(&self) -> &Vtf3Header {
        &self.header
    }

    pub fn texture_format_name(&self) -> &'static str {
        "Valve VTF3 (PS3)"
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.header.width as u32, self.header.height as u32)
    }

    pub fn mipmap_count(&self) -> u32 {
        1
    }

    pub fn premultiplied_alpha(&self) -> bool {
        false
    }

    pub fn pixel_format_name(&self) -> Option<String> {
        Some(if self.header.is_dxt5() { "DXT5" } else { "DXT1" }.to_string())
    }

    pub fn mipmap(&mut self, level: u32) -> Result<&TextureImage> {
        if level != 0 {
            return Err(TextureError::invalid_header("VTF3 has no mipmaps"));
        }
        if self.cache.contains(0) {
            return Ok(self.cache.get(0).unwrap());
        }

        let (w, h) = self.dimensions();
        let block_bytes: usize = if self.header.is_dxt5() { 16 } else { 8 };
        let size = w.div_ceil(4) as usize * h.div_ceil(4) as usize * block_bytes;
        let buf = self.source.read_vec_at(HEADER_SIZE as u64, size)?;

        let img = if self.header.is_dxt5() {
            s3tc::from_dxt5(w, h, &buf)?
        } else {
            s3tc::from_dxt1(w, h, &buf)?
        };
        Ok(self.cache.insert(0, img))
    }
}
