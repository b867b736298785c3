//! Valve Texture Format (VTF 7.x) reader
//!
//! `VTF\0` magic, little-endian header, optional low-resolution thumbnail,
//! then the high-resolution image. Mipmaps are stored smallest to largest,
//! so level addresses are accumulated from the end of the chain backwards.
//! VTF requires power-of-two dimensions; malformed files with a smaller
//! width keep a power-of-two row pitch.

use crate::container::MipmapCache;
use crate::decode::{linear, s3tc, PixelFormat};
use crate::error::{Result, TextureError};
use crate::image::{TextureImage, MAX_DIMENSION};
use crate::reader::{BinaryReader, ByteOrder};
use crate::source::ByteSource;

pub const VTF_MAGIC: [u8; 4] = *b"VTF\0";

/// Pure magic-number sniff; no I/O, no side effects.
pub fn is_supported(header: &[u8]) -> bool {
    header.len() >= 4 && header[0..4] == VTF_MAGIC
}

const HEADER_MIN_SIZE: usize = 63;
const VTF_MAX_SIZE: u64 = 128 * 1024 * 1024;
const MAX_MIPMAPS: u32 = 128;

/// VTF image data formats (the on-disk enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VtfFormat {
    Rgba8888 = 0,
    Abgr8888 = 1,
    Rgb888 = 2,
    Bgr888 = 3,
    Rgb565 = 4,
    I8 = 5,
    Ia88 = 6,
    P8 = 7,
    A8 = 8,
    Rgb888Bluescreen = 9,
    Bgr888Bluescreen = 10,
    Argb8888 = 11,
    Bgra8888 = 12,
    Dxt1 = 13,
    Dxt3 = 14,
    Dxt5 = 15,
    Bgrx8888 = 16,
    Bgr565 = 17,
    Bgrx5551 = 18,
    Bgra4444 = 19,
    Dxt1OneBitAlpha = 20,
    Bgra5551 = 21,
    Uv88 = 22,
    Uvwq8888 = 23,
    Rgba16161616F = 24,
    Rgba16161616 = 25,
    Uvlx8888 = 26,
}

impl VtfFormat {
    pub fn from_raw(raw: i32) -> Option<VtfFormat> {
        use VtfFormat::*;
        Some(match raw {
            0 => Rgba8888,
            1 => Abgr8888,
            2 => Rgb888,
            3 => Bgr888,
            4 => Rgb565,
            5 => I8,
            6 => Ia88,
            7 => P8,
            8 => A8,
            9 => Rgb888Bluescreen,
            10 => Bgr888Bluescreen,
            11 => Argb8888,
            12 => Bgra8888,
            13 => Dxt1,
            14 => Dxt3,
            15 => Dxt5,
            16 => Bgrx8888,
            17 => Bgr565,
            18 => Bgrx5551,
            19 => Bgra4444,
            20 => Dxt1OneBitAlpha,
            21 => Bgra5551,
            22 => Uv88,
            23 => Uvwq8888,
            24 => Rgba16161616F,
            25 => Rgba16161616,
            26 => Uvlx8888,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use VtfFormat::*;
        match self {
            Rgba8888 => "RGBA8888",
            Abgr8888 => "ABGR8888",
            Rgb888 => "RGB888",
            Bgr888 => "BGR888",
            Rgb565 => "RGB565",
            I8 => "I8",
            Ia88 => "IA88",
            P8 => "P8",
            A8 => "A8",
            Rgb888Bluescreen => "RGB888 (Bluescreen)",
            Bgr888Bluescreen => "BGR888 (Bluescreen)",
            Argb8888 => "ARGB8888",
            Bgra8888 => "BGRA8888",
            Dxt1 => "DXT1",
            Dxt3 => "DXT3",
            Dxt5 => "DXT5",
            Bgrx8888 => "BGRx8888",
            Bgr565 => "BGR565",
            Bgrx5551 => "BGRx5551",
            Bgra4444 => "BGRA4444",
            Dxt1OneBitAlpha => "DXT1_A1",
            Bgra5551 => "BGRA5551",
            Uv88 => "UV88",
            Uvwq8888 => "UVWQ8888",
            Rgba16161616F => "RGBA16161616F",
            Rgba16161616 => "RGBA16161616",
            Uvlx8888 => "UVLX8888",
        }
    }

    /// Image data size for the given dimensions, or `None` for formats
    /// whose size can't be computed.
    fn image_size(self, width: u32, height: u32) -> Option<usize> {
        use VtfFormat::*;
        let (w, h) = (width as usize, height as usize);
        Some(match self {
            Rgba8888 | Abgr8888 | Argb8888 | Bgra8888 | Bgrx8888 | Uvwq8888 | Uvlx8888 => {
                w * h * 4
            }
            Rgb888 | Bgr888 | Rgb888Bluescreen | Bgr888Bluescreen => w * h * 3,
            Rgb565 | Ia88 | Bgr565 | Bgrx5551 | Bgra4444 | Bgra5551 | Uv88 => w * h * 2,
            I8 | P8 | A8 => w * h,
            Rgba16161616F | Rgba16161616 => w * h * 8,
            Dxt1 | Dxt1OneBitAlpha => {
                width.div_ceil(4) as usize * height.div_ceil(4) as usize * 8
            }
            Dxt3 | Dxt5 => width.div_ceil(4) as usize * height.div_ceil(4) as usize * 16,
        })
    }

    /// Minimum data size of one mipmap level: a level can't shrink below
    /// one pixel/block worth of bytes.
    fn min_block_size(self) -> usize {
        use VtfFormat::*;
        match self {
            Rgba8888 | Abgr8888 | Argb8888 | Bgra8888 | Bgrx8888 | Uvwq8888 | Uvlx8888 => 4,
            Rgb888 | Bgr888 | Rgb888Bluescreen | Bgr888Bluescreen => 3,
            Rgb565 | Ia88 | Bgr565 | Bgrx5551 | Bgra4444 | Bgra5551 | Uv88 => 2,
            I8 | P8 | A8 => 1,
            Rgba16161616F | Rgba16161616 => 8,
            Dxt1 | Dxt1OneBitAlpha => 8,
            Dxt3 | Dxt5 => 16,
        }
    }
}

/// Parsed VTF header
#[derive(Debug, Clone)]
pub struct VtfHeader {
    pub version: (u32, u32),
    pub header_size: u32,
    pub width: u16,
    pub height: u16,
    pub flags: u32,
    pub frames: u16,
    pub first_frame: u16,
    pub reflectivity: [f32; 3],
    pub bumpmap_scale: f32,
    pub high_res_format: i32,
    pub mipmap_count: u8,
    pub low_res_format: i32,
    pub low_res_width: u8,
    pub low_res_height: u8,
}

impl VtfHeader {
    pub fn parse(data: &[u8]) -> Result<VtfHeader> {
        if data.len() < 4 || data[0..4] != VTF_MAGIC {
            return Err(TextureError::UnsupportedFormat);
        }
        let mut r = BinaryReader::new(&data[4..], ByteOrder::Little);
        let version = (r.read_u32()?, r.read_u32()?);
        let header_size = r.read_u32()?;
        let width = r.read_u16()?;
        let height = r.read_u16()?;
        let flags = r.read_u32()?;
        let frames = r.read_u16()?;
        let first_frame = r.read_u16()?;
        r.skip(4)?; // padding
        let reflectivity = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
        r.skip(4)?; // padding
        let bumpmap_scale = r.read_f32()?;
        let high_res_format = r.read_i32()?;
        let mipmap_count = r.read_u8()?;
        let low_res_format = r.read_i32()?;
        let low_res_width = r.read_u8()?;
        let low_res_height = r.read_u8()?;

        Ok(VtfHeader {
            version,
            header_size,
            width,
            height,
            flags,
            frames,
            first_frame,
            reflectivity,
            bumpmap_scale,
            high_res_format,
            mipmap_count,
            low_res_format,
            low_res_width,
            low_res_height,
        })
    }
}

struct MipLevel {
    addr: u64,
    size: usize,
    width: u32,
    height: u32,
    row_width: u32, // power-of-two row pitch, in pixels
}

/// An opened VTF file
pub struct VtfFile {
    source: Box<dyn ByteSource>,
    header: VtfHeader,
    format: VtfFormat,
    levels: Vec<MipLevel>,
    cache: MipmapCache,
}

impl VtfFile {
    pub fn open(mut source: Box<dyn ByteSource>) -> Result<VtfFile> {
        let file_size = source.size()?;
        if file_size < HEADER_MIN_SIZE as u64 + 4 || file_size > VTF_MAX_SIZE {
            return Err(TextureError::UnsupportedFormat);
        }

        let header_bytes = source.read_vec_at(0, HEADER_MIN_SIZE + 4)?;
        let header = VtfHeader::parse(&header_bytes)?;

        if header.version.0 != 7 || header.version.1 > 6 {
            return Err(TextureError::invalid_header(format!(
                "unsupported VTF version {}.{}",
                header.version.0, header.version.1
            )));
        }
        if (header.header_size as usize) < HEADER_MIN_SIZE
            || header.header_size as u64 >= file_size
        {
            return Err(TextureError::invalid_header("VTF header size out of range"));
        }

        // height == 0 is allowed (1D texture).
        if header.width == 0
            || header.width as u32 > MAX_DIMENSION
            || header.height as u32 > MAX_DIMENSION
        {
            return Err(TextureError::invalid_dimensions(
                header.width as u32,
                header.height as u32,
            ));
        }

        let format = VtfFormat::from_raw(header.high_res_format)
            .ok_or_else(|| TextureError::invalid_header("invalid VTF image format"))?;

        let levels = compute_mip_levels(&header, format, file_size)?;
        let count = levels.len();

        Ok(VtfFile {
            source,
            header,
            format,
            levels,
            cache: MipmapCache::new(count),
        })
    }

    pub fn header(&self) -> &VtfHeader {
        &self.header
    }

    pub fn format(&self) -> VtfFormat {
        self.format
    }

    pub fn texture_format_name(&self) -> &'static str {
        "Valve VTF"
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.header.width as u32, self.header.height as u32)
    }

    pub fn mipmap_count(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn premultiplied_alpha(&self) -> bool {
        false
    }

    pub fn pixel_format_name(&self) -> Option<String> {
        Some(self.format.name().to_string())
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
        let row = info.row_width as usize;

        use VtfFormat::*;
        let img = match self.format {
            Rgba8888 | Uvwq8888 | Uvlx8888 => {
                linear::from_linear32(PixelFormat::Abgr8888, w, h, &buf, row * 4)?
            }
            Abgr8888 => linear::from_linear32(PixelFormat::Rgba8888, w, h, &buf, row * 4)?,
            // Stored as RABG; appears to be a VTFEdit quirk.
            Argb8888 => linear::from_linear32(PixelFormat::Rabg8888, w, h, &buf, row * 4)?,
            Bgra8888 => linear::from_linear32(PixelFormat::Argb8888, w, h, &buf, row * 4)?,
            Bgrx8888 => linear::from_linear32(PixelFormat::Xrgb8888, w, h, &buf, row * 4)?,
            Rgb888 => linear::from_linear24(PixelFormat::Bgr888, w, h, &buf, row * 3)?,
            Bgr888 => linear::from_linear24(PixelFormat::Rgb888, w, h, &buf, row * 3)?,
            Rgb888Bluescreen => {
                let mut img = linear::from_linear24(PixelFormat::Bgr888, w, h, &buf, row * 3)?;
                img.apply_chroma_key(0xFF0000FF);
                img
            }
            Bgr888Bluescreen => {
                let mut img = linear::from_linear24(PixelFormat::Rgb888, w, h, &buf, row * 3)?;
                img.apply_chroma_key(0xFF0000FF);
                img
            }
            // VTF channel ordering does not match the canonical naming;
            // the 16-bit channels are stored backwards.
            Rgb565 => linear::from_linear16(PixelFormat::Bgr565, w, h, &buf, row * 2)?,
            Bgr565 => linear::from_linear16(PixelFormat::Rgb565, w, h, &buf, row * 2)?,
            Bgrx5551 => linear::from_linear16(PixelFormat::Rgb555, w, h, &buf, row * 2)?,
            Bgra5551 => linear::from_linear16(PixelFormat::Argb1555, w, h, &buf, row * 2)?,
            Bgra4444 => linear::from_linear16(PixelFormat::Argb4444, w, h, &buf, row * 2)?,
            Ia88 => linear::from_linear16(PixelFormat::A8L8, w, h, &buf, row * 2)?,
            Uv88 => linear::from_linear16(PixelFormat::Gr88, w, h, &buf, row * 2)?,
            I8 => linear::from_linear8(PixelFormat::L8, w, h, &buf, row)?,
            A8 => linear::from_linear8(PixelFormat::A8, w, h, &buf, row)?,
            Dxt1 => s3tc::from_dxt1(w, h, &buf)?,
            Dxt1OneBitAlpha => s3tc::from_dxt1_a1(w, h, &buf)?,
            Dxt3 => s3tc::from_dxt3(w, h, &buf)?,
            Dxt5 => s3tc::from_dxt5(w, h, &buf)?,
            P8 | Rgba16161616F | Rgba16161616 => {
                return Err(TextureError::invalid_header(format!(
                    "VTF format {} is not supported",
                    self.format.name()
                )));
            }
        };

        Ok(self.cache.insert(idx, img))
    }
}

/// Compute the address, size and dimensions of every mipmap level.
///
/// The low-resolution thumbnail sits between the header and the mipmap
/// chain; levels are stored smallest first, so addresses accumulate from
/// the last (smallest) level.
fn compute_mip_levels(
    header: &VtfHeader,
    format: VtfFormat,
    file_size: u64,
) -> Result<Vec<MipLevel>> {
    let mipmap_count = (header.mipmap_count as u32).max(1);
    if mipmap_count > MAX_MIPMAPS {
        return Err(TextureError::invalid_header("too many VTF mipmap levels"));
    }

    let mut addr = header.header_size as u64;

    // Skip the low-resolution thumbnail.
    if header.low_res_format >= 0 {
        let low_format = VtfFormat::from_raw(header.low_res_format)
            .ok_or_else(|| TextureError::invalid_header("invalid VTF low-res format"))?;
        let lw = header.low_res_width as u32;
        let lh = (header.low_res_height as u32).max(1);
        if lw > 0 {
            addr += low_format
                .image_size(lw, lh)
                .ok_or_else(|| TextureError::invalid_header("invalid VTF low-res format"))?
                as u64;
        }
    }

    let height = (header.height as u32).max(1);

    // Malformed files may declare a non-power-of-two width; the row pitch
    // stays the next power of two.
    let mut row_width = header.width as u32;
    if !row_width.is_power_of_two() {
        row_width = row_width.next_power_of_two();
    }

    let min_block = format.min_block_size();
    let mut size = format
        .image_size(row_width, height)
        .ok_or_else(|| TextureError::invalid_header("invalid VTF image format"))?;

    let mut levels = Vec::with_capacity(mipmap_count as usize);
    let mut w = header.width as u32;
    let mut h = height;
    let mut rw = row_width;
    for _ in 0..mipmap_count {
        levels.push(MipLevel {
            addr: 0,
            size: size.max(min_block),
            width: w.max(1),
            height: h.max(1),
            row_width: rw.max(1),
        });
        size /= 4;
        w /= 2;
        h /= 2;
        rw /= 2;
        if size < min_block {
            size = min_block;
        }
    }

    // Addresses run from the smallest level to the largest.
    for level in levels.iter_mut().rev() {
        level.addr = addr;
        addr += level.size as u64;
    }

    // The largest level must fit in the file.
    let main = &levels[0];
    if main.addr + main.size as u64 > file_size {
        return Err(TextureError::truncated(
            (main.addr + main.size as u64) as usize,
            file_size as usize,
        ));
    }
    Ok(levels)
}
