//! DirectDraw Surface (DDS) reader
//!
//! 4-byte `DDS ` magic, fixed 124-byte header, optional DX10 extension
//! header, then block-compressed or raw pixel data. Mipmap levels are stored
//! after the main image, largest first, each level half the size of the
//! previous.

use crate::container::MipmapCache;
use crate::decode::{linear, s3tc, PixelFormat};
use crate::error::{Result, TextureError};
use crate::image::{TextureImage, MAX_DIMENSION};
use crate::reader::{BinaryReader, ByteOrder};
use crate::source::ByteSource;

pub const DDS_MAGIC: [u8; 4] = *b"DDS ";

/// Pure magic-number sniff; no I/O, no side effects.
pub fn is_supported(header: &[u8]) -> bool {
    header.len() >= 4 && header[0..4] == DDS_MAGIC
}

const HEADER_SIZE: usize = 124;
const DX10_HEADER_SIZE: usize = 20;
const DDS_MAX_SIZE: u64 = 128 * 1024 * 1024;

// ddspf.dwFlags
const DDPF_ALPHA: u32 = 0x2;
const DDPF_FOURCC: u32 = 0x4;
const DDPF_RGB: u32 = 0x40;
const DDPF_LUMINANCE: u32 = 0x20000;

// DX10 miscFlags2 alpha modes
const ALPHA_MODE_PREMULTIPLIED: u32 = 0x2;
const ALPHA_MODE_OPAQUE: u32 = 0x3;

/// DDS pixel format block (32 bytes inside the header)
#[derive(Debug, Clone)]
pub struct DdsPixelFormat {
    pub flags: u32,
    pub fourcc: [u8; 4],
    pub rgb_bit_count: u32,
    pub r_mask: u32,
    pub g_mask: u32,
    pub b_mask: u32,
    pub a_mask: u32,
}

/// Parsed DDS header (excluding the magic)
#[derive(Debug, Clone)]
pub struct DdsHeader {
    pub flags: u32,
    pub height: u32,
    pub width: u32,
    pub pitch_or_linear_size: u32,
    pub depth: u32,
    pub mipmap_count: u32,
    pub pixel_format: DdsPixelFormat,
    pub caps: u32,
    pub caps2: u32,
}

/// DX10 extension header, present when the FourCC is `DX10`
#[derive(Debug, Clone)]
pub struct Dx10Header {
    pub dxgi_format: u32,
    pub resource_dimension: u32,
    pub misc_flag: u32,
    pub array_size: u32,
    pub misc_flags2: u32,
}

impl DdsHeader {
    /// Parse and validate the 124-byte header.
    pub fn parse(data: &[u8]) -> Result<DdsHeader> {
        let mut r = BinaryReader::new(data, ByteOrder::Little);
        let size = r.read_u32()?;
        if size as usize != HEADER_SIZE {
            return Err(TextureError::invalid_header(format!(
                "DDS header size {size}, expected {HEADER_SIZE}"
            )));
        }
        let flags = r.read_u32()?;
        let height = r.read_u32()?;
        let width = r.read_u32()?;
        let pitch_or_linear_size = r.read_u32()?;
        let depth = r.read_u32()?;
        let mipmap_count = r.read_u32()?;
        r.skip(11 * 4)?; // reserved (NVTT/GIMP headers live here)

        let pf_size = r.read_u32()?;
        if pf_size != 32 {
            return Err(TextureError::invalid_header(format!(
                "DDS pixel format size {pf_size}, expected 32"
            )));
        }
        let pf_flags = r.read_u32()?;
        let fourcc = r.read_fourcc()?;
        let pixel_format = DdsPixelFormat {
            flags: pf_flags,
            fourcc,
            rgb_bit_count: r.read_u32()?,
            r_mask: r.read_u32()?,
            g_mask: r.read_u32()?,
            b_mask: r.read_u32()?,
            a_mask: r.read_u32()?,
        };

        let caps = r.read_u32()?;
        let caps2 = r.read_u32()?;

        Ok(DdsHeader {
            flags,
            height,
            width,
            pitch_or_linear_size,
            depth,
            mipmap_count,
            pixel_format,
            caps,
            caps2,
        })
    }
}

/// Block-compressed codec selected from the FourCC / DXGI format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockCodec {
    Dxt1 { one_bit_alpha: bool },
    Dxt2,
    Dxt3,
    Dxt4,
    Dxt5,
    Bc4,
    Bc5,
}

impl BlockCodec {
    fn bytes_per_block(self) -> usize {
        match self {
            BlockCodec::Dxt1 { .. } | BlockCodec::Bc4 => 8,
            _ => 16,
        }
    }

    fn name(self) -> &'static str {
        match self {
            BlockCodec::Dxt1 { .. } => "DXT1",
            BlockCodec::Dxt2 => "DXT2",
            BlockCodec::Dxt3 => "DXT3",
            BlockCodec::Dxt4 => "DXT4",
            BlockCodec::Dxt5 => "DXT5",
            BlockCodec::Bc4 => "BC4",
            BlockCodec::Bc5 => "BC5",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ResolvedFormat {
    Uncompressed(PixelFormat),
    Compressed(BlockCodec),
}

/// Uncompressed RGB formats, matched by bit count and channel masks.
const RGB_MASK_TABLE: &[(u32, u32, u32, u32, u32, PixelFormat)] = &[
    // (bit count, R, G, B, A, format)
    (16, 0xF800, 0x07E0, 0x001F, 0x0000, PixelFormat::Rgb565),
    (16, 0x001F, 0x07E0, 0xF800, 0x0000, PixelFormat::Bgr565),
    (16, 0x7C00, 0x03E0, 0x001F, 0x8000, PixelFormat::Argb1555),
    (16, 0x7C00, 0x03E0, 0x001F, 0x0000, PixelFormat::Rgb555),
    (15, 0x7C00, 0x03E0, 0x001F, 0x0000, PixelFormat::Rgb555),
    (16, 0x0F00, 0x00F0, 0x000F, 0xF000, PixelFormat::Argb4444),
    (16, 0x0F00, 0x00F0, 0x000F, 0x0000, PixelFormat::Xrgb4444),
    (16, 0x00E0, 0x001C, 0x0003, 0xFF00, PixelFormat::Argb8332),
    (24, 0xFF0000, 0x00FF00, 0x0000FF, 0x000000, PixelFormat::Rgb888),
    (24, 0x0000FF, 0x00FF00, 0xFF0000, 0x000000, PixelFormat::Bgr888),
    (32, 0x00FF0000, 0x0000FF00, 0x000000FF, 0xFF000000, PixelFormat::Argb8888),
    (32, 0x00FF0000, 0x0000FF00, 0x000000FF, 0x00000000, PixelFormat::Xrgb8888),
    (32, 0x000000FF, 0x0000FF00, 0x00FF0000, 0xFF000000, PixelFormat::Abgr8888),
    (32, 0x000000FF, 0x0000FF00, 0x00FF0000, 0x00000000, PixelFormat::Xbgr8888),
    (32, 0xFF000000, 0x00FF0000, 0x0000FF00, 0x000000FF, PixelFormat::Rgba8888),
    (32, 0x0000FFFF, 0xFFFF0000, 0x00000000, 0x00000000, PixelFormat::G16R16),
    (32, 0x3FF00000, 0x000FFC00, 0x000003FF, 0xC0000000, PixelFormat::A2R10G10B10),
    (32, 0x000003FF, 0x000FFC00, 0x3FF00000, 0xC0000000, PixelFormat::A2B10G10R10),
];

/// Luminance formats (DDPF_LUMINANCE), matched the same way.
const LUMA_MASK_TABLE: &[(u32, u32, u32, PixelFormat)] = &[
    // (bit count, L mask, A mask, format)
    (8, 0xFF, 0x00, PixelFormat::L8),
    (8, 0x0F, 0xF0, PixelFormat::A4L4),
    (16, 0x00FF, 0xFF00, PixelFormat::A8L8),
    (16, 0xFFFF, 0x0000, PixelFormat::L16),
];

fn codec_from_fourcc(fourcc: &[u8; 4]) -> Option<BlockCodec> {
    Some(match fourcc {
        b"DXT1" => BlockCodec::Dxt1 { one_bit_alpha: true },
        b"DXT2" => BlockCodec::Dxt2,
        b"DXT3" => BlockCodec::Dxt3,
        b"DXT4" => BlockCodec::Dxt4,
        b"DXT5" => BlockCodec::Dxt5,
        b"ATI1" | b"BC4U" => BlockCodec::Bc4,
        b"ATI2" | b"BC5U" => BlockCodec::Bc5,
        _ => return None,
    })
}

fn codec_from_dxgi(dxgi: u32, alpha_mode: u32) -> Option<BlockCodec> {
    let premultiplied = alpha_mode == ALPHA_MODE_PREMULTIPLIED;
    Some(match dxgi {
        70..=72 => BlockCodec::Dxt1 {
            one_bit_alpha: alpha_mode != ALPHA_MODE_OPAQUE,
        },
        73..=75 => {
            if premultiplied { BlockCodec::Dxt2 } else { BlockCodec::Dxt3 }
        }
        76..=78 => {
            if premultiplied { BlockCodec::Dxt4 } else { BlockCodec::Dxt5 }
        }
        79..=81 => BlockCodec::Bc4,
        82..=84 => BlockCodec::Bc5,
        _ => return None,
    })
}

fn uncompressed_from_dxgi(dxgi: u32) -> Option<PixelFormat> {
    Some(match dxgi {
        23..=25 => PixelFormat::A2B10G10R10, // R10G10B10A2
        27..=32 => PixelFormat::Abgr8888,    // R8G8B8A8
        33..=38 => PixelFormat::G16R16,      // R16G16
        48..=52 => PixelFormat::Gr88,        // R8G8
        65 => PixelFormat::A8,
        85 => PixelFormat::Rgb565,   // B5G6R5
        86 => PixelFormat::Argb1555, // B5G5R5A1
        87 | 90 | 91 => PixelFormat::Argb8888,
        88 | 92 | 93 => PixelFormat::Xrgb8888,
        115 => PixelFormat::Argb4444, // B4G4R4A4
        _ => return None,
    })
}

/// An opened DDS file
pub struct DdsFile {
    source: Box<dyn ByteSource>,
    header: DdsHeader,
    dx10: Option<Dx10Header>,
    format: Option<ResolvedFormat>,
    data_start: u64,
    mip_count: u32,
    cache: MipmapCache,
}

impl DdsFile {
    /// Open a DDS file: magic, header, optional DX10 header, format
    /// resolution, and a size check for the level-0 payload.
    pub fn open(mut source: Box<dyn ByteSource>) -> Result<DdsFile> {
        let file_size = source.size()?;
        if file_size > DDS_MAX_SIZE {
            return Err(TextureError::invalid_header("DDS file too large"));
        }

        let mut magic = [0u8; 4];
        source.read_exact_at(0, &mut magic)?;
        if magic != DDS_MAGIC {
            return Err(TextureError::UnsupportedFormat);
        }

        let header_bytes = source.read_vec_at(4, HEADER_SIZE)?;
        let header = DdsHeader::parse(&header_bytes)?;

        if header.width == 0
            || header.height == 0
            || header.width > MAX_DIMENSION
            || header.height > MAX_DIMENSION
        {
            return Err(TextureError::invalid_dimensions(header.width, header.height));
        }

        let mut data_start = 4 + HEADER_SIZE as u64;
        let mut dx10 = None;
        if header.pixel_format.flags & DDPF_FOURCC != 0
            && (&header.pixel_format.fourcc == b"DX10" || &header.pixel_format.fourcc == b"XBOX")
        {
            let dx10_bytes = source.read_vec_at(data_start, DX10_HEADER_SIZE)?;
            let mut r = BinaryReader::new(&dx10_bytes, ByteOrder::Little);
            dx10 = Some(Dx10Header {
                dxgi_format: r.read_u32()?,
                resource_dimension: r.read_u32()?,
                misc_flag: r.read_u32()?,
                array_size: r.read_u32()?,
                misc_flags2: r.read_u32()?,
            });
            data_start += DX10_HEADER_SIZE as u64;

            if &header.pixel_format.fourcc == b"XBOX" {
                // Xbox One tiled textures can't be raster-decoded here.
                return Err(TextureError::UnsupportedFormat);
            }
        }

        let format = Self::resolve_format(&header, dx10.as_ref());

        // Mipmap chain is bounded by the header count and by the number of
        // halvings down to 1x1.
        let max_levels = 32 - header.width.max(header.height).leading_zeros();
        let mip_count = header.mipmap_count.clamp(1, max_levels);

        if let Some(fmt) = format {
            let level0 = level_size(fmt, header.width, header.height);
            if data_start + level0 as u64 > file_size {
                return Err(TextureError::truncated(
                    (data_start + level0 as u64) as usize,
                    file_size as usize,
                ));
            }
        }

        Ok(DdsFile {
            source,
            header,
            dx10,
            format,
            data_start,
            mip_count,
            cache: MipmapCache::new(mip_count as usize),
        })
    }

    fn resolve_format(header: &DdsHeader, dx10: Option<&Dx10Header>) -> Option<ResolvedFormat> {
        let pf = &header.pixel_format;

        if pf.flags & DDPF_FOURCC != 0 {
            if let Some(codec) = codec_from_fourcc(&pf.fourcc) {
                return Some(ResolvedFormat::Compressed(codec));
            }
            if let Some(dx10) = dx10 {
                if let Some(pxf) = uncompressed_from_dxgi(dx10.dxgi_format) {
                    return Some(ResolvedFormat::Uncompressed(pxf));
                }
                if let Some(codec) = codec_from_dxgi(dx10.dxgi_format, dx10.misc_flags2 & 0x7) {
                    return Some(ResolvedFormat::Compressed(codec));
                }
            }
            return None;
        }

        if pf.flags & DDPF_RGB != 0 {
            for &(bits, r, g, b, a, pxf) in RGB_MASK_TABLE {
                if pf.rgb_bit_count == bits
                    && pf.r_mask == r
                    && pf.g_mask == g
                    && pf.b_mask == b
                    && pf.a_mask == a
                {
                    return Some(ResolvedFormat::Uncompressed(pxf));
                }
            }
        } else if pf.flags & DDPF_LUMINANCE != 0 {
            for &(bits, l, a, pxf) in LUMA_MASK_TABLE {
                if pf.rgb_bit_count == bits && pf.r_mask == l && pf.a_mask == a {
                    return Some(ResolvedFormat::Uncompressed(pxf));
                }
            }
        } else if pf.flags & DDPF_ALPHA != 0 && pf.rgb_bit_count == 8 {
            return Some(ResolvedFormat::Uncompressed(PixelFormat::A8));
        }
        None
    }

    pub fn header(&self) -> &DdsHeader {
        &self.header
    }

    pub fn dx10_header(&self) -> Option<&Dx10Header> {
        self.dx10.as_ref()
    }

    pub fn texture_format_name(&self) -> &'static str {
        "DirectDraw Surface"
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.header.width, self.header.height)
    }

    pub fn mipmap_count(&self) -> u32 {
        self.mip_count
    }

    pub fn premultiplied_alpha(&self) -> bool {
        matches!(
            self.format,
            Some(ResolvedFormat::Compressed(BlockCodec::Dxt2 | BlockCodec::Dxt4))
        )
    }

    pub fn pixel_format_name(&self) -> Option<String> {
        match self.format {
            Some(ResolvedFormat::Compressed(codec)) => Some(codec.name().to_string()),
            Some(ResolvedFormat::Uncompressed(pxf)) => Some(pxf.name().to_string()),
            None => {
                let pf = &self.header.pixel_format;
                if pf.flags & DDPF_FOURCC != 0 {
                    Some(String::from_utf8_lossy(&pf.fourcc).into_owned())
                } else {
                    None
                }
            }
        }
    }

    /// Decode (or fetch from cache) the main image. Identical to
    /// `mipmap(0)`.
    pub fn image(&mut self) -> Result<&TextureImage> {
        self.mipmap(0)
    }

    /// Decode (or fetch from cache) a mipmap level.
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

        // Levels are stored sequentially after the main image.
        let mut offset = self.data_start;
        for l in 0..level {
            let (w, h) = level_dimensions(self.header.width, self.header.height, l);
            offset += level_size(format, w, h) as u64;
        }
        let (width, height) = level_dimensions(self.header.width, self.header.height, level);
        let size = level_size(format, width, height);
        let buf = self.source.read_vec_at(offset, size)?;

        let img = match format {
            ResolvedFormat::Compressed(codec) => match codec {
                BlockCodec::Dxt1 { one_bit_alpha: true } => s3tc::from_dxt1_a1(width, height, &buf),
                BlockCodec::Dxt1 { one_bit_alpha: false } => s3tc::from_dxt1(width, height, &buf),
                BlockCodec::Dxt2 => s3tc::from_dxt2(width, height, &buf),
                BlockCodec::Dxt3 => s3tc::from_dxt3(width, height, &buf),
                BlockCodec::Dxt4 => s3tc::from_dxt4(width, height, &buf),
                BlockCodec::Dxt5 => s3tc::from_dxt5(width, height, &buf),
                BlockCodec::Bc4 => s3tc::from_bc4(width, height, &buf),
                BlockCodec::Bc5 => s3tc::from_bc5(width, height, &buf),
            },
            ResolvedFormat::Uncompressed(pxf) => match pxf.bytes_per_pixel() {
                1 => linear::from_linear8(pxf, width, height, &buf, 0),
                2 => linear::from_linear16(pxf, width, height, &buf, 0),
                3 => linear::from_linear24(pxf, width, height, &buf, 0),
                _ => linear::from_linear32(pxf, width, height, &buf, 0),
            },
        }?;

        Ok(self.cache.insert(level as usize, img))
    }
}

fn level_dimensions(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}

fn level_size(format: ResolvedFormat, width: u32, height: u32) -> usize {
    match format {
        ResolvedFormat::Compressed(codec) => {
            width.div_ceil(4) as usize * height.div_ceil(4) as usize * codec.bytes_per_block()
        }
        ResolvedFormat::Uncompressed(pxf) => {
            width as usize * height as usize * pxf.bytes_per_pixel()
        }
    }
}
