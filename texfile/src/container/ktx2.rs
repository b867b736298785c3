//! Khronos KTX 2.0 reader
//!
//! Shares the first four magic bytes with KTX 1.1; the version suffix in the
//! identifier tells them apart. KTX2 indexes its mipmap levels up front with
//! 64-bit offsets and supports supercompression schemes, which this reader
//! recognizes but does not decode.

use crate::container::MipmapCache;
use crate::decode::{linear, s3tc, PixelFormat};
use crate::error::{Result, TextureError};
use crate::image::{FlipOp, TextureImage, MAX_DIMENSION};
use crate::reader::{BinaryReader, ByteOrder};
use crate::source::ByteSource;

pub const KTX2_IDENTIFIER: [u8; 12] = [
    0xAB, b'K', b'T', b'X', b' ', b'2', b'0', 0xBB, b'\r', b'\n', 0x1A, b'\n',
];

/// Pure identifier sniff; no I/O, no side effects.
pub fn is_supported(header: &[u8]) -> bool {
    header.len() >= 12 && header[0..12] == KTX2_IDENTIFIER
}

const HEADER_SIZE: usize = 80;
const LEVEL_INDEX_ENTRY: usize = 24;
const KTX2_MAX_SIZE: u64 = 128 * 1024 * 1024;

/// Parsed KTX2 header
#[derive(Debug, Clone)]
pub struct Ktx2Header {
    pub vk_format: u32,
    pub type_size: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub pixel_depth: u32,
    pub layer_count: u32,
    pub face_count: u32,
    pub level_count: u32,
    pub supercompression: u32,
    pub kvd_offset: u32,
    pub kvd_length: u32,
}

/// One entry of the mipmap level index
#[derive(Debug, Clone)]
pub struct LevelIndex {
    pub offset: u64,
    pub length: u64,
    pub uncompressed_length: u64,
}

impl Ktx2Header {
    pub fn parse(data: &[u8]) -> Result<Ktx2Header> {
        if data.len() < HEADER_SIZE || data[..12] != KTX2_IDENTIFIER {
            return Err(TextureError::UnsupportedFormat);
        }
        let mut r = BinaryReader::new(&data[12..], ByteOrder::Little);
        let vk_format = r.read_u32()?;
        let type_size = r.read_u32()?;
        let pixel_width = r.read_u32()?;
        let pixel_height = r.read_u32()?;
        let pixel_depth = r.read_u32()?;
        let layer_count = r.read_u32()?;
        let face_count = r.read_u32()?;
        let level_count = r.read_u32()?;
        let supercompression = r.read_u32()?;
        r.skip(8)?; // DFD offset/length
        let kvd_offset = r.read_u32()?;
        let kvd_length = r.read_u32()?;

        Ok(Ktx2Header {
            vk_format,
            type_size,
            pixel_width,
            pixel_height,
            pixel_depth,
            layer_count,
            face_count,
            level_count,
            supercompression,
            kvd_offset,
            kvd_length,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Ktx2Format {
    Linear(PixelFormat),
    Dxt1 { one_bit_alpha: bool },
    Dxt3,
    Dxt5,
    Bc4,
    Bc5,
}

fn resolve_vk_format(vk_format: u32) -> Option<Ktx2Format> {
    use PixelFormat::*;
    Some(match vk_format {
        2 => Ktx2Format::Linear(Rgba4444),
        3 => Ktx2Format::Linear(Bgra4444),
        4 => Ktx2Format::Linear(Rgb565),
        5 => Ktx2Format::Linear(Bgr565),
        6 => Ktx2Format::Linear(Rgba5551),
        7 => Ktx2Format::Linear(Bgra5551),
        8 => Ktx2Format::Linear(Argb1555),
        9..=15 => Ktx2Format::Linear(R8),
        16 | 22 => Ktx2Format::Linear(Gr88),
        23..=29 => Ktx2Format::Linear(Bgr888),
        30..=36 => Ktx2Format::Linear(Rgb888),
        37..=43 => Ktx2Format::Linear(Abgr8888),
        44..=50 => Ktx2Format::Linear(Argb8888),
        58..=60 => Ktx2Format::Linear(A2R10G10B10), // A2R10G10B10 pack32
        64..=66 => Ktx2Format::Linear(A2B10G10R10), // A2B10G10R10 pack32
        131 | 132 => Ktx2Format::Dxt1 { one_bit_alpha: false },
        133 | 134 => Ktx2Format::Dxt1 { one_bit_alpha: true },
        135 | 136 => Ktx2Format::Dxt3,
        137 | 138 => Ktx2Format::Dxt5,
        139 | 140 => Ktx2Format::Bc4,
        141 | 142 => Ktx2Format::Bc5,
        _ => return None,
    })
}

fn vk_format_name(vk_format: u32, format: Option<Ktx2Format>) -> Option<String> {
    match format {
        Some(Ktx2Format::Linear(pxf)) => Some(pxf.name().to_string()),
        Some(Ktx2Format::Dxt1 { .. }) => Some("BC1".to_string()),
        Some(Ktx2Format::Dxt3) => Some("BC2".to_string()),
        Some(Ktx2Format::Dxt5) => Some("BC3".to_string()),
        Some(Ktx2Format::Bc4) => Some("BC4".to_string()),
        Some(Ktx2Format::Bc5) => Some("BC5".to_string()),
        None => Some(format!("VK_FORMAT {vk_format}")),
    }
}

/// An opened KTX 2.0 file
pub struct Ktx2File {
    source: Box<dyn ByteSource>,
    header: Ktx2Header,
    format: Option<Ktx2Format>,
    flip: FlipOp,
    levels: Vec<LevelIndex>,
    cache: MipmapCache,
}

impl Ktx2File {
    pub fn open(mut source: Box<dyn ByteSource>) -> Result<Ktx2File> {
        let file_size = source.size()?;
        if file_size < HEADER_SIZE as u64 || file_size > KTX2_MAX_SIZE {
            return Err(TextureError::UnsupportedFormat);
        }

        let header_bytes = source.read_vec_at(0, HEADER_SIZE)?;
        let header = Ktx2Header::parse(&header_bytes)?;

        if header.pixel_width == 0
            || header.pixel_width > MAX_DIMENSION
            || header.pixel_height > MAX_DIMENSION
        {
            return Err(TextureError::invalid_dimensions(
                header.pixel_width,
                header.pixel_height,
            ));
        }

        // Level index sits right after the header; every entry's byte range
        // must land inside the file.
        let level_count = header.level_count.clamp(1, 32) as usize;
        let index_bytes =
            source.read_vec_at(HEADER_SIZE as u64, level_count * LEVEL_INDEX_ENTRY)?;
        let mut r = BinaryReader::new(&index_bytes, ByteOrder::Little);
        let mut levels = Vec::with_capacity(level_count);
        for _ in 0..level_count {
            let entry = LevelIndex {
                offset: r.read_u64()?,
                length: r.read_u64()?,
                uncompressed_length: r.read_u64()?,
            };
            let end = entry
                .offset
                .checked_add(entry.length)
                .ok_or(TextureError::BufferOverflow)?;
            if end > file_size {
                return Err(TextureError::truncated(end as usize, file_size as usize));
            }
            levels.push(entry);
        }

        let format = resolve_vk_format(header.vk_format);

        // Key/value data: KTX2 orientation uses one character per dimension
        // ("rd" = right, down). Default requires a vertical flip.
        let mut flip = FlipOp::Vertical;
        if header.kvd_length > 0 && header.kvd_length <= 512 * 1024 {
            let kvd_end = header.kvd_offset as u64 + header.kvd_length as u64;
            if header.kvd_offset as usize >= HEADER_SIZE && kvd_end <= file_size {
                let kvd =
                    source.read_vec_at(header.kvd_offset as u64, header.kvd_length as usize)?;
                if let Some(orientation) = parse_kvd_orientation(&kvd) {
                    flip = orientation;
                }
            }
        }

        Ok(Ktx2File {
            source,
            header,
            format,
            flip,
            levels,
            cache: MipmapCache::new(level_count),
        })
    }

    pub fn header(&self) -> &Ktx2Header {
        &self.header
    }

    pub fn flip_op(&self) -> FlipOp {
        self.flip
    }

    pub fn texture_format_name(&self) -> &'static str {
        "Khronos KTX2"
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.header.pixel_width, self.header.pixel_height)
    }

    pub fn mipmap_count(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn premultiplied_alpha(&self) -> bool {
        false
    }

    pub fn pixel_format_name(&self) -> Option<String> {
        vk_format_name(self.header.vk_format, self.format)
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

        if self.header.supercompression != 0 {
            return Err(TextureError::invalid_header(format!(
                "KTX2 supercompression scheme {} is not supported",
                self.header.supercompression
            )));
        }
        let format = self.format.ok_or(TextureError::UnsupportedFormat)?;

        let width = (self.header.pixel_width >> level).max(1);
        let height = (self.header.pixel_height.max(1) >> level).max(1);

        let info = &self.levels[idx];
        let buf = self.source.read_vec_at(info.offset, info.length as usize)?;

        let img = match format {
            Ktx2Format::Linear(pxf) => match pxf.bytes_per_pixel() {
                1 => linear::from_linear8(pxf, width, height, &buf, 0),
                2 => linear::from_linear16(pxf, width, height, &buf, 0),
                3 => linear::from_linear24(pxf, width, height, &buf, 0),
                _ => linear::from_linear32(pxf, width, height, &buf, 0),
            },
            Ktx2Format::Dxt1 { one_bit_alpha: true } => s3tc::from_dxt1_a1(width, height, &buf),
            Ktx2Format::Dxt1 { one_bit_alpha: false } => s3tc::from_dxt1(width, height, &buf),
            Ktx2Format::Dxt3 => s3tc::from_dxt3(width, height, &buf),
            Ktx2Format::Dxt5 => s3tc::from_dxt5(width, height, &buf),
            Ktx2Format::Bc4 => s3tc::from_bc4(width, height, &buf),
            Ktx2Format::Bc5 => s3tc::from_bc5(width, height, &buf),
        }?;

        let img = if self.flip != FlipOp::None {
            img.flip(self.flip)?
        } else {
            img
        };
        Ok(self.cache.insert(idx, img))
    }
}

fn parse_kvd_orientation(kvd: &[u8]) -> Option<FlipOp> {
    let mut r = BinaryReader::new(kvd, ByteOrder::Little);
    while r.has_bytes(4) {
        let len = r.read_u32().ok()? as usize;
        if len == 0 || !r.has_bytes(len) {
            return None;
        }
        let entry = r.read_bytes(len).ok()?;
        r.align_to(4);

        let mut parts = entry.splitn(2, |&b| b == 0);
        let key = parts.next()?;
        let value = parts.next().unwrap_or(&[]);
        if key == b"KTXorientation" {
            let mut flip = FlipOp::None;
            if value.first() == Some(&b'l') {
                flip = flip.combine(FlipOp::Horizontal);
            }
            if value.get(1) != Some(&b'd') {
                flip = flip.combine(FlipOp::Vertical);
            }
            return Some(flip);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_ktx2(
        vk_format: u32,
        width: u32,
        height: u32,
        supercompression: u32,
        kvd: &[u8],
        levels: &[Vec<u8>],
    ) -> Vec<u8> {
        let level_count = levels.len();
        let index_size = level_count * LEVEL_INDEX_ENTRY;
        let kvd_offset = if kvd.is_empty() {
            0
        } else {
            HEADER_SIZE + index_size
        };
        let data_start = HEADER_SIZE + index_size + kvd.len();

        let mut data = Vec::new();
        data.extend_from_slice(&KTX2_IDENTIFIER);
        data.extend_from_slice(&vk_format.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes()); // type size
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes()); // depth
        data.extend_from_slice(&0u32.to_le_bytes()); // layers
        data.extend_from_slice(&1u32.to_le_bytes()); // faces
        data.extend_from_slice(&(level_count as u32).to_le_bytes());
        data.extend_from_slice(&supercompression.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes()); // dfd offset
        data.extend_from_slice(&0u32.to_le_bytes()); // dfd length
        data.extend_from_slice(&(kvd_offset as u32).to_le_bytes());
        data.extend_from_slice(&(kvd.len() as u32).to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes()); // sgd offset
        data.extend_from_slice(&0u64.to_le_bytes()); // sgd length
        assert_eq!(data.len(), HEADER_SIZE);

        let mut offset = data_start as u64;
        for level in levels {
            data.extend_from_slice(&offset.to_le_bytes());
            data.extend_from_slice(&(level.len() as u64).to_le_bytes());
            data.extend_from_slice(&(level.len() as u64).to_le_bytes());
            offset += level.len() as u64;
        }
        data.extend_from_slice(kvd);
        for level in levels {
            data.extend_from_slice(level);
        }
        data
    }

    fn kvd_orientation(value: &str) -> Vec<u8> {
        let mut entry = b"KTXorientation".to_vec();
        entry.push(0);
        entry.extend_from_slice(value.as_bytes());
        entry.push(0);
        let mut out = (entry.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(&entry);
        while out.len() % 4 != 0 {
            out.push(0);
        }
        out
    }

    #[test]
    fn test_rgba_level_index() {
        // 2x1 R8G8B8A8: red, green; top-down orientation.
        let kvd = kvd_orientation("rd");
        let level = vec![0xFF, 0, 0, 0xFF, 0, 0xFF, 0, 0xFF];
        let data = build_ktx2(37, 2, 1, 0, &kvd, &[level]);
        let mut ktx2 = Ktx2File::open(Box::new(Cursor::new(data))).unwrap();
        assert_eq!(ktx2.flip_op(), FlipOp::None);
        let img = ktx2.mipmap(0).unwrap();
        assert_eq!(img.pixel(0, 0), Some(0xFFFF0000));
        assert_eq!(img.pixel(1, 0), Some(0xFF00FF00));
    }

    #[test]
    fn test_supercompression_recognized_but_not_decoded() {
        let kvd = kvd_orientation("rd");
        let data = build_ktx2(37, 1, 1, 1, &kvd, &[vec![0u8; 4]]);
        let mut ktx2 = Ktx2File::open(Box::new(Cursor::new(data))).unwrap();
        // The container opens and reports metadata...
        assert_eq!(ktx2.dimensions(), (1, 1));
        // ...but decoding fails.
        assert!(ktx2.mipmap(0).is_err());
    }

    #[test]
    fn test_bc1_levels() {
        let mut level0 = vec![0u8; 8];
        level0[1] = 0xF8; // red endpoint
        let level1 = vec![0u8; 8];
        let kvd = kvd_orientation("rd");
        let data = build_ktx2(131, 8, 8, 0, &kvd, &[level0.clone(), level1]);
        // 8x8 needs 4 blocks; only 1 supplied -> decode fails cleanly.
        let mut ktx2 = Ktx2File::open(Box::new(Cursor::new(data))).unwrap();
        assert!(matches!(
            ktx2.mipmap(0),
            Err(TextureError::TruncatedInput { .. })
        ));

        // With a full level 0 it decodes.
        let full0 = [level0.as_slice(); 4].concat();
        let data = build_ktx2(131, 8, 8, 0, &kvd, &[full0, vec![0u8; 8]]);
        let mut ktx2 = Ktx2File::open(Box::new(Cursor::new(data))).unwrap();
        assert_eq!(ktx2.mipmap(0).unwrap().pixel(0, 0), Some(0xFFFF0000));
        assert_eq!(ktx2.mipmap(1).unwrap().width(), 4);
    }

    #[test]
    fn test_level_index_out_of_bounds() {
        let mut data = build_ktx2(37, 1, 1, 0, &[], &[vec![0u8; 4]]);
        // Corrupt the level offset to point past EOF.
        let idx = HEADER_SIZE;
        data[idx..idx + 8].copy_from_slice(&(1u64 << 40).to_le_bytes());
        assert!(Ktx2File::open(Box::new(Cursor::new(data))).is_err());
    }
}
