//! Khronos KTX 1.1 reader
//!
//! 12-byte identifier, an endianness word that decides how every following
//! field is read, 12 more header words, key/value data (which may carry a
//! `KTXorientation` hint), then one `imageSize`-prefixed data block per
//! mipmap level, each padded to 4 bytes.

use crate::container::MipmapCache;
use crate::decode::{linear, s3tc, PixelFormat};
use crate::error::{Result, TextureError};
use crate::image::{FlipOp, TextureImage, MAX_DIMENSION};
use crate::reader::{BinaryReader, ByteOrder};
use crate::source::ByteSource;

pub const KTX_IDENTIFIER: [u8; 12] = [
    0xAB, b'K', b'T', b'X', b' ', b'1', b'1', 0xBB, b'\r', b'\n', 0x1A, b'\n',
];

/// Pure identifier sniff; no I/O, no side effects.
pub fn is_supported(header: &[u8]) -> bool {
    header.len() >= 12 && header[0..12] == KTX_IDENTIFIER
}

const HEADER_SIZE: usize = 64; // identifier + 13 header words
const KTX_MAX_SIZE: u64 = 128 * 1024 * 1024;
const ENDIAN_SAME: u32 = 0x0403_0201;
const ENDIAN_SWAPPED: u32 = 0x0102_0304;

// GL constants used by the supported subset
const GL_UNSIGNED_BYTE: u32 = 0x1401;
const GL_UNSIGNED_SHORT_5_6_5: u32 = 0x8363;
const GL_RED: u32 = 0x1903;
const GL_RGB: u32 = 0x1907;
const GL_RGBA: u32 = 0x1908;
const GL_LUMINANCE: u32 = 0x1909;
const GL_BGR: u32 = 0x80E0;
const GL_BGRA: u32 = 0x80E1;

const GL_COMPRESSED_RGB_S3TC_DXT1: u32 = 0x83F0;
const GL_COMPRESSED_RGBA_S3TC_DXT1: u32 = 0x83F1;
const GL_COMPRESSED_RGBA_S3TC_DXT3: u32 = 0x83F2;
const GL_COMPRESSED_RGBA_S3TC_DXT5: u32 = 0x83F3;
const GL_COMPRESSED_RED_RGTC1: u32 = 0x8DBB;
const GL_COMPRESSED_RG_RGTC2: u32 = 0x8DBD;

/// Parsed KTX header, fields already in host order
#[derive(Debug, Clone)]
pub struct KtxHeader {
    pub gl_type: u32,
    pub gl_type_size: u32,
    pub gl_format: u32,
    pub gl_internal_format: u32,
    pub gl_base_internal_format: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub pixel_depth: u32,
    pub array_elements: u32,
    pub faces: u32,
    pub mipmap_levels: u32,
    pub kvd_bytes: u32,
}

impl KtxHeader {
    /// Parse the header, selecting the byte order from the endianness word.
    /// Returns the header and the byte order of the rest of the file.
    pub fn parse(data: &[u8]) -> Result<(KtxHeader, ByteOrder)> {
        if data.len() < HEADER_SIZE || data[..12] != KTX_IDENTIFIER {
            return Err(TextureError::UnsupportedFormat);
        }
        let mut r = BinaryReader::new(&data[12..], ByteOrder::Little);
        let endianness = r.read_u32()?;
        let order = match endianness {
            ENDIAN_SAME => ByteOrder::Little,
            ENDIAN_SWAPPED => ByteOrder::Big,
            _ => {
                return Err(TextureError::invalid_header(format!(
                    "KTX endianness word {endianness:#010X}"
                )));
            }
        };
        r.set_byte_order(order);

        Ok((
            KtxHeader {
                gl_type: r.read_u32()?,
                gl_type_size: r.read_u32()?,
                gl_format: r.read_u32()?,
                gl_internal_format: r.read_u32()?,
                gl_base_internal_format: r.read_u32()?,
                pixel_width: r.read_u32()?,
                pixel_height: r.read_u32()?,
                pixel_depth: r.read_u32()?,
                array_elements: r.read_u32()?,
                faces: r.read_u32()?,
                mipmap_levels: r.read_u32()?,
                kvd_bytes: r.read_u32()?,
            },
            order,
        ))
    }
}

#[derive(Debug, Clone, Copy)]
enum KtxFormat {
    Linear {
        pxf: PixelFormat,
        bytespp: usize,
        // GL_UNPACK_ALIGNMENT is 4: row starts align to 4 bytes.
        row_align: usize,
    },
    Dxt1 { one_bit_alpha: bool },
    Dxt3,
    Dxt5,
    Bc4,
    Bc5,
}

struct LevelInfo {
    offset: u64,
    size: usize,
    width: u32,
    height: u32,
}

/// An opened KTX 1.1 file
pub struct KtxFile {
    source: Box<dyn ByteSource>,
    header: KtxHeader,
    format: KtxFormat,
    flip: FlipOp,
    levels: Vec<LevelInfo>,
    cache: MipmapCache,
}

impl KtxFile {
    pub fn open(mut source: Box<dyn ByteSource>) -> Result<KtxFile> {
        let file_size = source.size()?;
        if file_size < HEADER_SIZE as u64 || file_size > KTX_MAX_SIZE {
            return Err(TextureError::UnsupportedFormat);
        }

        let header_bytes = source.read_vec_at(0, HEADER_SIZE)?;
        let (header, order) = KtxHeader::parse(&header_bytes)?;

        let width = header.pixel_width;
        let height = header.pixel_height.max(1); // 1D textures
        if width == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(TextureError::invalid_dimensions(width, header.pixel_height));
        }

        let format = resolve_format(&header)?;

        // Key/value data. Default orientation needs a vertical flip; the
        // KTXorientation key overrides each axis.
        let mut flip = FlipOp::Vertical;
        if header.kvd_bytes > 0 {
            if header.kvd_bytes > 512 * 1024
                || HEADER_SIZE as u64 + header.kvd_bytes as u64 > file_size
            {
                return Err(TextureError::invalid_header("KTX key/value data too large"));
            }
            let kvd = source.read_vec_at(HEADER_SIZE as u64, header.kvd_bytes as usize)?;
            if let Some(orientation) = parse_kvd_orientation(&kvd, order) {
                flip = orientation;
            }
        }

        // Walk the mipmap level table, validating every offset against the
        // file size before it is recorded.
        let level_count = header.mipmap_levels.clamp(1, 32);
        let mut levels = Vec::with_capacity(level_count as usize);
        let mut offset = HEADER_SIZE as u64 + header.kvd_bytes as u64;
        let mut lw = width;
        let mut lh = height;
        for _ in 0..level_count {
            let mut size_buf = [0u8; 4];
            source.read_exact_at(offset, &mut size_buf)?;
            let mut image_size = match order {
                ByteOrder::Little => u32::from_le_bytes(size_buf),
                ByteOrder::Big => u32::from_be_bytes(size_buf),
            };
            offset += 4;

            // For array textures, imageSize covers all elements.
            if header.array_elements > 1 {
                image_size /= header.array_elements;
            }

            let expected = expected_level_size(format, lw, lh);
            if (image_size as usize) < expected {
                return Err(TextureError::truncated(expected, image_size as usize));
            }
            if offset + expected as u64 > file_size {
                return Err(TextureError::truncated(
                    (offset + expected as u64) as usize,
                    file_size as usize,
                ));
            }

            levels.push(LevelInfo {
                offset,
                size: expected,
                width: lw,
                height: lh,
            });

            // Data for all faces/elements plus mip padding to 4 bytes.
            let total = image_size as u64
                * header.array_elements.max(1) as u64
                * header.faces.max(1) as u64;
            offset += (total + 3) & !3;

            lw = (lw / 2).max(1);
            lh = (lh / 2).max(1);
            if offset >= file_size {
                break;
            }
        }
        if levels.is_empty() {
            return Err(TextureError::invalid_header("KTX has no mipmap levels"));
        }

        let count = levels.len();
        Ok(KtxFile {
            source,
            header,
            format,
            flip,
            levels,
            cache: MipmapCache::new(count),
        })
    }

    pub fn header(&self) -> &KtxHeader {
        &self.header
    }

    pub fn flip_op(&self) -> FlipOp {
        self.flip
    }

    pub fn texture_format_name(&self) -> &'static str {
        "Khronos KTX"
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
        Some(
            match self.format {
                KtxFormat::Linear { pxf, .. } => pxf.name(),
                KtxFormat::Dxt1 { .. } => "DXT1",
                KtxFormat::Dxt3 => "DXT3",
                KtxFormat::Dxt5 => "DXT5",
                KtxFormat::Bc4 => "BC4",
                KtxFormat::Bc5 => "BC5",
            }
            .to_string(),
        )
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
        let buf = self.source.read_vec_at(info.offset, info.size)?;
        let (w, h) = (info.width, info.height);

        let img = match self.format {
            KtxFormat::Linear { pxf, bytespp, row_align } => {
                let stride = (w as usize * bytespp + row_align - 1) & !(row_align - 1);
                match bytespp {
                    1 => linear::from_linear8(pxf, w, h, &buf, stride),
                    2 => linear::from_linear16(pxf, w, h, &buf, stride),
                    3 => linear::from_linear24(pxf, w, h, &buf, stride),
                    _ => linear::from_linear32(pxf, w, h, &buf, stride),
                }
            }
            KtxFormat::Dxt1 { one_bit_alpha: true } => s3tc::from_dxt1_a1(w, h, &buf),
            KtxFormat::Dxt1 { one_bit_alpha: false } => s3tc::from_dxt1(w, h, &buf),
            KtxFormat::Dxt3 => s3tc::from_dxt3(w, h, &buf),
            KtxFormat::Dxt5 => s3tc::from_dxt5(w, h, &buf),
            KtxFormat::Bc4 => s3tc::from_bc4(w, h, &buf),
            KtxFormat::Bc5 => s3tc::from_bc5(w, h, &buf),
        }?;

        let img = if self.flip != FlipOp::None {
            img.flip(self.flip)?
        } else {
            img
        };
        Ok(self.cache.insert(idx, img))
    }
}

fn resolve_format(header: &KtxHeader) -> Result<KtxFormat> {
    if header.gl_format == 0 && header.gl_type == 0 {
        // Compressed texture.
        return Ok(match header.gl_internal_format {
            GL_COMPRESSED_RGB_S3TC_DXT1 => KtxFormat::Dxt1 { one_bit_alpha: false },
            GL_COMPRESSED_RGBA_S3TC_DXT1 => KtxFormat::Dxt1 { one_bit_alpha: true },
            GL_COMPRESSED_RGBA_S3TC_DXT3 => KtxFormat::Dxt3,
            GL_COMPRESSED_RGBA_S3TC_DXT5 => KtxFormat::Dxt5,
            GL_COMPRESSED_RED_RGTC1 => KtxFormat::Bc4,
            GL_COMPRESSED_RG_RGTC2 => KtxFormat::Bc5,
            other => {
                return Err(TextureError::invalid_header(format!(
                    "unsupported KTX internal format {other:#06X}"
                )));
            }
        });
    }

    // Uncompressed: memory channel order becomes a little-endian value
    // layout. GL_UNPACK_ALIGNMENT of 4 applies to row starts.
    let fmt = match (header.gl_format, header.gl_type) {
        (GL_RGB, GL_UNSIGNED_BYTE) => KtxFormat::Linear {
            pxf: PixelFormat::Bgr888,
            bytespp: 3,
            row_align: 4,
        },
        (GL_BGR, GL_UNSIGNED_BYTE) => KtxFormat::Linear {
            pxf: PixelFormat::Rgb888,
            bytespp: 3,
            row_align: 4,
        },
        (GL_RGB, GL_UNSIGNED_SHORT_5_6_5) => KtxFormat::Linear {
            pxf: PixelFormat::Rgb565,
            bytespp: 2,
            row_align: 4,
        },
        (GL_RGBA, GL_UNSIGNED_BYTE) => KtxFormat::Linear {
            pxf: PixelFormat::Abgr8888,
            bytespp: 4,
            row_align: 1,
        },
        (GL_BGRA, GL_UNSIGNED_BYTE) => KtxFormat::Linear {
            pxf: PixelFormat::Argb8888,
            bytespp: 4,
            row_align: 1,
        },
        (GL_LUMINANCE, GL_UNSIGNED_BYTE) => KtxFormat::Linear {
            pxf: PixelFormat::L8,
            bytespp: 1,
            row_align: 4,
        },
        (GL_RED, GL_UNSIGNED_BYTE) => KtxFormat::Linear {
            pxf: PixelFormat::R8,
            bytespp: 1,
            row_align: 4,
        },
        (format, gl_type) => {
            return Err(TextureError::invalid_header(format!(
                "unsupported KTX format/type {format:#06X}/{gl_type:#06X}"
            )));
        }
    };
    Ok(fmt)
}

fn expected_level_size(format: KtxFormat, width: u32, height: u32) -> usize {
    match format {
        KtxFormat::Linear { bytespp, row_align, .. } => {
            let stride = (width as usize * bytespp + row_align - 1) & !(row_align - 1);
            stride * height as usize
        }
        KtxFormat::Dxt1 { .. } | KtxFormat::Bc4 => {
            width.div_ceil(4) as usize * height.div_ceil(4) as usize * 8
        }
        KtxFormat::Dxt3 | KtxFormat::Dxt5 | KtxFormat::Bc5 => {
            width.div_ceil(4) as usize * height.div_ceil(4) as usize * 16
        }
    }
}

/// Scan key/value data for `KTXorientation` and translate it into a flip.
/// `S=l` flips horizontally; `T=d` means top-down (no vertical flip), the
/// default `T=u` needs one.
fn parse_kvd_orientation(kvd: &[u8], order: ByteOrder) -> Option<FlipOp> {
    let mut r = BinaryReader::new(kvd, order);
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
            let value = String::from_utf8_lossy(value);
            let mut flip = FlipOp::None;
            if value.contains("S=l") {
                flip = flip.combine(FlipOp::Horizontal);
            }
            if !value.contains("T=d") {
                flip = flip.combine(FlipOp::Vertical);
            }
            return Some(flip);
        }
    }
    None
}
