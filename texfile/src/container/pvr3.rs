//! PowerVR 3.0.0 texture reader
//!
//! 52-byte header with a 4-byte magic that exists in both byte orders; the
//! matching variant decides how the whole header is read. The 64-bit pixel
//! format tag is either an enumerated compressed format (high word zero) or
//! four channel-name characters plus four channel depths. Metadata blocks
//! follow the header; the orientation block controls post-decode flips.

use crate::container::MipmapCache;
use crate::decode::{linear, s3tc, PixelFormat};
use crate::error::{Result, TextureError};
use crate::image::{FlipOp, TextureImage, MAX_DIMENSION};
use crate::reader::{BinaryReader, ByteOrder};
use crate::source::ByteSource;

pub const PVR3_MAGIC: [u8; 4] = *b"PVR\x03";
pub const PVR3_MAGIC_SWAPPED: [u8; 4] = *b"\x03RVP";

/// Pure magic-number sniff; both byte-order variants match.
pub fn is_supported(header: &[u8]) -> bool {
    header.len() >= 4 && (header[0..4] == PVR3_MAGIC || header[0..4] == PVR3_MAGIC_SWAPPED)
}

const HEADER_SIZE: usize = 52;
const PVR3_MAX_SIZE: u64 = 128 * 1024 * 1024;

// flags
const FLAG_PREMULTIPLIED: u32 = 0x02;

// metadata keys (fourCC == 'PVR\x03')
const META_KEY_ORIENTATION: u32 = 3;

// channel types accepted for uncompressed data
const CHTYPE_UBYTE_NORM: u32 = 0;
const CHTYPE_UBYTE: u32 = 2;
const CHTYPE_USHORT_NORM: u32 = 4;
const CHTYPE_USHORT: u32 = 6;

/// Parsed PVR3 header, fields in host order
#[derive(Debug, Clone)]
pub struct Pvr3Header {
    pub flags: u32,
    pub pixel_format: u64,
    pub color_space: u32,
    pub channel_type: u32,
    pub height: u32,
    pub width: u32,
    pub depth: u32,
    pub num_surfaces: u32,
    pub num_faces: u32,
    pub mipmap_count: u32,
    pub metadata_size: u32,
}

impl Pvr3Header {
    /// Parse the header; the magic decides the byte order of every field.
    pub fn parse(data: &[u8]) -> Result<(Pvr3Header, ByteOrder)> {
        if data.len() < HEADER_SIZE {
            return Err(TextureError::truncated(HEADER_SIZE, data.len()));
        }
        let order = if data[0..4] == PVR3_MAGIC {
            ByteOrder::Little
        } else if data[0..4] == PVR3_MAGIC_SWAPPED {
            ByteOrder::Big
        } else {
            return Err(TextureError::UnsupportedFormat);
        };

        let mut r = BinaryReader::new(&data[4..], order);
        Ok((
            Pvr3Header {
                flags: r.read_u32()?,
                pixel_format: r.read_u64()?,
                color_space: r.read_u32()?,
                channel_type: r.read_u32()?,
                height: r.read_u32()?,
                width: r.read_u32()?,
                depth: r.read_u32()?,
                num_surfaces: r.read_u32()?,
                num_faces: r.read_u32()?,
                mipmap_count: r.read_u32()?,
                metadata_size: r.read_u32()?,
            },
            order,
        ))
    }
}

#[derive(Debug, Clone, Copy)]
enum Pvr3Format {
    Linear { pxf: PixelFormat, bytespp: usize },
    Dxt1,
    Dxt2,
    Dxt3,
    Dxt4,
    Dxt5,
    Bc4,
    Bc5,
}

/// Uncompressed formats: (channel names, channel depths) -> pixel layout.
/// The first named channel sits in the lowest bit/byte position, so the
/// packed 16-bit layouts come out "reversed" relative to their names:
/// r5g6b5 has red in the low bits, which is a BGR565 value.
const CHANNEL_FMT_TABLE: &[(&[u8; 4], u32, PixelFormat, usize)] = &[
    (b"rgba", 0x08080808, PixelFormat::Abgr8888, 4),
    (b"abgr", 0x08080808, PixelFormat::Rgba8888, 4),
    (b"bgra", 0x08080808, PixelFormat::Argb8888, 4),
    (b"rgb\0", 0x00080808, PixelFormat::Bgr888, 3),
    (b"bgr\0", 0x00080808, PixelFormat::Rgb888, 3),
    (b"rgb\0", 0x00050605, PixelFormat::Bgr565, 2),
    (b"rgba", 0x04040404, PixelFormat::Abgr4444, 2),
    (b"rgba", 0x01050505, PixelFormat::Abgr1555, 2),
    (b"l\0\0\0", 0x00000008, PixelFormat::L8, 1),
    (b"a\0\0\0", 0x00000008, PixelFormat::A8, 1),
    (b"la\0\0", 0x00000808, PixelFormat::A8L8, 2),
    (b"rg\0\0", 0x00000808, PixelFormat::Gr88, 2),
    (b"rg\0\0", 0x00001010, PixelFormat::G16R16, 4),
    (b"r\0\0\0", 0x00000008, PixelFormat::R8, 1),
];

fn resolve_format(header: &Pvr3Header) -> Option<Pvr3Format> {
    if header.pixel_format >> 32 == 0 {
        // Enumerated (compressed) format.
        return Some(match header.pixel_format as u32 {
            7 => Pvr3Format::Dxt1,
            8 => Pvr3Format::Dxt2,
            9 => Pvr3Format::Dxt3,
            10 => Pvr3Format::Dxt4,
            11 => Pvr3Format::Dxt5,
            12 => Pvr3Format::Bc4,
            13 => Pvr3Format::Bc5,
            _ => return None,
        });
    }

    // Channel-name format: only plain unsigned-normalized data.
    if !matches!(
        header.channel_type,
        CHTYPE_UBYTE_NORM | CHTYPE_UBYTE | CHTYPE_USHORT_NORM | CHTYPE_USHORT
    ) {
        return None;
    }
    let names = (header.pixel_format as u32).to_le_bytes();
    let depths = (header.pixel_format >> 32) as u32;
    for &(table_names, table_depths, pxf, bytespp) in CHANNEL_FMT_TABLE {
        if &names == table_names && depths == table_depths {
            return Some(Pvr3Format::Linear { pxf, bytespp });
        }
    }
    None
}

fn level_size(format: Pvr3Format, width: u32, height: u32) -> usize {
    match format {
        Pvr3Format::Linear { bytespp, .. } => width as usize * height as usize * bytespp,
        Pvr3Format::Dxt1 | Pvr3Format::Bc4 => {
            width.div_ceil(4) as usize * height.div_ceil(4) as usize * 8
        }
        _ => width.div_ceil(4) as usize * height.div_ceil(4) as usize * 16,
    }
}

/// An opened PVR3 file
pub struct Pvr3File {
    source: Box<dyn ByteSource>,
    header: Pvr3Header,
    format: Option<Pvr3Format>,
    flip: FlipOp,
    data_start: u64,
    mip_count: u32,
    cache: MipmapCache,
}

impl Pvr3File {
    pub fn open(mut source: Box<dyn ByteSource>) -> Result<Pvr3File> {
        let file_size = source.size()?;
        if file_size < HEADER_SIZE as u64 || file_size > PVR3_MAX_SIZE {
            return Err(TextureError::UnsupportedFormat);
        }

        let header_bytes = source.read_vec_at(0, HEADER_SIZE)?;
        let (header, order) = Pvr3Header::parse(&header_bytes)?;

        let width = header.width;
        let height = header.height.max(1);
        if width == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(TextureError::invalid_dimensions(width, header.height));
        }

        let data_start = HEADER_SIZE as u64 + header.metadata_size as u64;
        if data_start > file_size {
            return Err(TextureError::truncated(data_start as usize, file_size as usize));
        }

        // Metadata blocks: fourCC, key, size, data. Only the orientation
        // block matters for decoding.
        let mut flip = FlipOp::None;
        if header.metadata_size > 0 {
            let meta = source.read_vec_at(HEADER_SIZE as u64, header.metadata_size as usize)?;
            let mut r = BinaryReader::new(&meta, order);
            while r.has_bytes(12) {
                let fourcc = r.read_fourcc()?;
                let key = r.read_u32()?;
                let size = r.read_u32()? as usize;
                if !r.has_bytes(size) {
                    break;
                }
                let payload = r.read_bytes(size)?;
                if fourcc == PVR3_MAGIC && key == META_KEY_ORIENTATION && payload.len() >= 2 {
                    if payload[0] != 0 {
                        flip = flip.combine(FlipOp::Horizontal);
                    }
                    if payload[1] != 0 {
                        flip = flip.combine(FlipOp::Vertical);
                    }
                }
            }
        }

        let format = resolve_format(&header);

        let max_levels = 32 - width.max(height).leading_zeros();
        let mip_count = header.mipmap_count.clamp(1, max_levels);

        if let Some(fmt) = format {
            let level0 = level_size(fmt, width, height);
            if data_start + level0 as u64 > file_size {
                return Err(TextureError::truncated(
                    (data_start + level0 as u64) as usize,
                    file_size as usize,
                ));
            }
        }

        Ok(Pvr3File {
            source,
            header,
            format,
            flip,
            data_start,
            mip_count,
            cache: MipmapCache::new(mip_count as usize),
        })
    }

    pub fn header(&self) -> &Pvr3Header {
        &self.header
    }

    pub fn flip_op(&self) -> FlipOp {
        self.flip
    }

    pub fn texture_format_name(&self) -> &'static str {
        "PowerVR 3.0.0"
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.header.width, self.header.height)
    }

    pub fn mipmap_count(&self) -> u32 {
        self.mip_count
    }

    pub fn premultiplied_alpha(&self) -> bool {
        self.header.flags & FLAG_PREMULTIPLIED != 0
    }

    pub fn pixel_format_name(&self) -> Option<String> {
        match self.format {
            Some(Pvr3Format::Linear { pxf, .. }) => Some(pxf.name().to_string()),
            Some(Pvr3Format::Dxt1) => Some("DXT1".to_string()),
            Some(Pvr3Format::Dxt2) => Some("DXT2".to_string()),
            Some(Pvr3Format::Dxt3) => Some("DXT3".to_string()),
            Some(Pvr3Format::Dxt4) => Some("DXT4".to_string()),
            Some(Pvr3Format::Dxt5) => Some("DXT5".to_string()),
            Some(Pvr3Format::Bc4) => Some("BC4".to_string()),
            Some(Pvr3Format::Bc5) => Some("BC5".to_string()),
            None => {
                if self.header.pixel_format >> 32 == 0 {
                    Some(format!("PVR3 format {}", self.header.pixel_format))
                } else {
                    None
                }
            }
        }
    }

    pub fn mipmap(&mut self, level: u32) -> Result<&TextureImage> {
        if level >= self.mip_count {
            return Err(TextureError::invalid_header(format!(
                "mipmap level {level} out of range (count {})",
                self.mip_count
            )));
        }
        if self.cache.contains(level as usize) {
            return Ok(self.cache.get(level as usize).unwrap());
        }

        let format = self.format.ok_or(TextureError::UnsupportedFormat)?;

        // Mipmaps are stored largest to smallest, all faces/surfaces of one
        // level together; only the first face is decoded.
        let mut offset = self.data_start;
        let faces = self.header.num_faces.max(1) as u64 * self.header.num_surfaces.max(1) as u64;
        for l in 0..level {
            let (w, h) = self.level_dimensions(l);
            offset += level_size(format, w, h) as u64 * faces;
        }
        let (width, height) = self.level_dimensions(level);
        let size = level_size(format, width, height);
        let buf = self.source.read_vec_at(offset, size)?;

        let mut img = match format {
            Pvr3Format::Linear { pxf, bytespp } => match bytespp {
                1 => linear::from_linear8(pxf, width, height, &buf, 0),
                2 => linear::from_linear16(pxf, width, height, &buf, 0),
                3 => linear::from_linear24(pxf, width, height, &buf, 0),
                _ => linear::from_linear32(pxf, width, height, &buf, 0),
            },
            Pvr3Format::Dxt1 => s3tc::from_dxt1_a1(width, height, &buf),
            Pvr3Format::Dxt2 => s3tc::from_dxt2(width, height, &buf),
            Pvr3Format::Dxt3 => s3tc::from_dxt3(width, height, &buf),
            Pvr3Format::Dxt4 => s3tc::from_dxt4(width, height, &buf),
            Pvr3Format::Dxt5 => s3tc::from_dxt5(width, height, &buf),
            Pvr3Format::Bc4 => s3tc::from_bc4(width, height, &buf),
            Pvr3Format::Bc5 => s3tc::from_bc5(width, height, &buf),
        }?;

        if self.flip != FlipOp::None {
            img = img.flip(self.flip)?;
        }
        Ok(self.cache.insert(level as usize, img))
    }

    fn level_dimensions(&self, level: u32) -> (u32, u32) {
        (
            (self.header.width >> level).max(1),
            (self.header.height.max(1) >> level).max(1),
        )
    }
}
