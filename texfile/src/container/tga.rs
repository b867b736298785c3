//! TrueVision TGA reader
//!
//! TGA has no magic number at offset 0. TGA 2.0 files carry a 26-byte footer
//! whose signature also unlocks the extension area (author, timestamp, gamma,
//! alpha-channel type). Detection for TGA 1.0 relies on header plausibility
//! checks; see [`looks_like_tga`].

use crate::container::MipmapCache;
use crate::decode::{linear, rle, PixelFormat};
use crate::error::{Result, TextureError};
use crate::image::{FlipOp, TextureImage, MAX_DIMENSION};
use crate::reader::{BinaryReader, ByteOrder};
use crate::source::ByteSource;
use once_cell::sync::Lazy;

/// TGA files shouldn't be larger than 16 MB.
const TGA_MAX_SIZE: u64 = 16 * 1024 * 1024;

const HEADER_SIZE: usize = 18;
const FOOTER_SIZE: usize = 26;
const EXT_AREA_SIZE: usize = 495;
const FOOTER_SIGNATURE: &[u8; 18] = b"TRUEVISION-XFILE.\0";

// image_type values
const IMAGETYPE_COLORMAP: u8 = 1;
const IMAGETYPE_TRUECOLOR: u8 = 2;
const IMAGETYPE_GRAYSCALE: u8 = 3;
const IMAGETYPE_RLE_FLAG: u8 = 0x08;
const IMAGETYPE_HUFFMAN_COLORMAP: u8 = 32;
const IMAGETYPE_HUFFMAN_4PASS_COLORMAP: u8 = 33;

// attr_dir bits
const ORIENTATION_X_MASK: u8 = 0x10;
const ORIENTATION_Y_MASK: u8 = 0x20;

/// 256-entry grayscale ramp, as a little-endian ARGB8888 palette buffer.
static GRAY_PALETTE: Lazy<[u8; 1024]> = Lazy::new(|| {
    let mut pal = [0u8; 1024];
    for i in 0..256u32 {
        let px = 0xFF000000 | (i * 0x010101);
        pal[i as usize * 4..i as usize * 4 + 4].copy_from_slice(&px.to_le_bytes());
    }
    pal
});

/// Alpha-channel meaning from the TGA 2.0 extension area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaType {
    NoAlpha,
    UndefinedIgnore,
    UndefinedRetain,
    Present,
    Premultiplied,
}

impl AlphaType {
    fn from_raw(raw: u8) -> AlphaType {
        match raw {
            0 => AlphaType::NoAlpha,
            1 => AlphaType::UndefinedIgnore,
            2 => AlphaType::UndefinedRetain,
            4 => AlphaType::Premultiplied,
            _ => AlphaType::Present,
        }
    }

    fn has_alpha(self) -> bool {
        matches!(self, AlphaType::Present | AlphaType::Premultiplied)
    }
}

/// 18-byte TGA file header
#[derive(Debug, Clone)]
pub struct TgaHeader {
    pub id_length: u8,
    pub color_map_type: u8,
    pub image_type: u8,
    pub cmap_idx0: u16,
    pub cmap_len: u16,
    pub cmap_bpp: u8,
    pub x_origin: u16,
    pub y_origin: u16,
    pub width: u16,
    pub height: u16,
    pub bpp: u8,
    pub attr_dir: u8,
}

impl TgaHeader {
    /// Parse the little-endian header from the front of the file.
    pub fn parse(data: &[u8]) -> Result<TgaHeader> {
        let mut r = BinaryReader::new(data, ByteOrder::Little);
        Ok(TgaHeader {
            id_length: r.read_u8()?,
            color_map_type: r.read_u8()?,
            image_type: r.read_u8()?,
            cmap_idx0: r.read_u16()?,
            cmap_len: r.read_u16()?,
            cmap_bpp: r.read_u8()?,
            x_origin: r.read_u16()?,
            y_origin: r.read_u16()?,
            width: r.read_u16()?,
            height: r.read_u16()?,
            bpp: r.read_u8()?,
            attr_dir: r.read_u8()?,
        })
    }

    fn is_colormap_image(&self) -> bool {
        (self.image_type & !IMAGETYPE_RLE_FLAG) == IMAGETYPE_COLORMAP
            || self.image_type == IMAGETYPE_HUFFMAN_COLORMAP
            || self.image_type == IMAGETYPE_HUFFMAN_4PASS_COLORMAP
    }

    fn is_rle(&self) -> bool {
        self.image_type & IMAGETYPE_RLE_FLAG != 0
            && self.image_type < IMAGETYPE_HUFFMAN_COLORMAP
    }

    fn bytespp(&self) -> usize {
        if self.bpp == 15 { 2 } else { self.bpp as usize / 8 }
    }

    fn cmap_bytespp(&self) -> usize {
        if self.cmap_bpp == 15 { 2 } else { self.cmap_bpp as usize / 8 }
    }
}

/// TGA 2.0 extension area metadata
#[derive(Debug, Clone, Default)]
pub struct TgaExtArea {
    pub author_name: String,
    pub author_comments: Vec<String>,
    /// (year, month, day, hour, minute, second); all-zero when unset
    pub timestamp: (u16, u16, u16, u16, u16, u16),
    pub job_id: String,
    /// (hours, minutes, seconds)
    pub job_time: (u16, u16, u16),
    pub software_id: String,
    /// Version number x100 plus an optional letter suffix
    pub software_version: (u16, char),
    pub key_color: u32,
    pub pixel_aspect_ratio: (u16, u16),
    pub gamma: (u16, u16),
    pub attributes_type: u8,
}

fn read_cp_string(r: &mut BinaryReader<'_>, len: usize) -> Result<String> {
    let bytes = r.read_bytes(len)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    // The extension area is CP1252; ASCII is the overwhelmingly common case.
    Ok(bytes[..end].iter().map(|&b| b as char).collect())
}

impl TgaExtArea {
    fn parse(data: &[u8]) -> Result<TgaExtArea> {
        let mut r = BinaryReader::new(data, ByteOrder::Little);
        let size = r.read_u16()?;
        if size as usize != EXT_AREA_SIZE {
            return Err(TextureError::invalid_header(
                "TGA extension area has the wrong size",
            ));
        }

        let author_name = read_cp_string(&mut r, 41)?;
        let mut author_comments = Vec::new();
        for _ in 0..4 {
            let line = read_cp_string(&mut r, 81)?;
            if !line.is_empty() {
                author_comments.push(line);
            }
        }
        let month = r.read_u16()?;
        let day = r.read_u16()?;
        let year = r.read_u16()?;
        let hour = r.read_u16()?;
        let minute = r.read_u16()?;
        let second = r.read_u16()?;
        let job_id = read_cp_string(&mut r, 41)?;
        let job_time = (r.read_u16()?, r.read_u16()?, r.read_u16()?);
        let software_id = read_cp_string(&mut r, 41)?;
        let sw_number = r.read_u16()?;
        let sw_letter = r.read_u8()? as char;
        let key_color = r.read_u32()?;
        let pixel_aspect_ratio = (r.read_u16()?, r.read_u16()?);
        let gamma = (r.read_u16()?, r.read_u16()?);
        r.skip(12)?; // color correction / postage stamp / scanline offsets
        let attributes_type = r.read_u8()?;

        Ok(TgaExtArea {
            author_name,
            author_comments,
            timestamp: (year, month, day, hour, minute, second),
            job_id,
            job_time,
            software_id,
            software_version: (sw_number, sw_letter),
            key_color,
            pixel_aspect_ratio,
            gamma,
            attributes_type,
        })
    }
}

/// Header plausibility sniff for files with a `.tga` extension (or none).
///
/// There is no reliable magic number, so this rules out the known false
/// positives (MPEG streams, ISO images, compiled terminfo) by checking bit
/// patterns that a real TGA header cannot violate. All conditions must hold.
pub fn looks_like_tga(header: &[u8], ext: Option<&str>) -> bool {
    if header.len() < HEADER_SIZE {
        return false;
    }

    // Extension gate: ".tga", ".tga.gz" seen as ".gz", or no extension.
    let ext_ok = match ext {
        None => true,
        Some(e) => {
            let e = e.to_ascii_lowercase();
            e.is_empty() || e == "tga" || e == "tga.gz"
        }
    };
    if !ext_ok {
        return false;
    }

    // Color map type must be 0 or 1; image type and color-map entry size
    // must match their expected bit masks.
    if header[1] & 0xFE != 0 || header[2] & 0xC4 != 0 || header[7] & 0xC0 != 0 {
        return false;
    }

    let hdr = match TgaHeader::parse(header) {
        Ok(h) => h,
        Err(_) => return false,
    };

    // Skip MPEG sequences and CRI ADX audio with improbable interleave bits,
    // require a positive image type below the Huffman variants, and rule out
    // an alpha-channel depth of 11 (seen in .vob false positives).
    if hdr.attr_dir & 0xC0 == 0xC0
        || hdr.image_type == 0
        || hdr.image_type >= 34
        || hdr.attr_dir & 0x0F == 11
    {
        return false;
    }

    // Only plausible pixel depths.
    matches!(hdr.bpp, 1 | 8 | 15 | 16 | 24 | 32)
}

/// An opened TGA file
pub struct TgaFile {
    source: Box<dyn ByteSource>,
    header: TgaHeader,
    ext_area: Option<TgaExtArea>,
    is_tga2: bool,
    alpha_type: AlphaType,
    flip: FlipOp,
    file_size: u64,
    cache: MipmapCache,
}

impl TgaFile {
    /// Open a TGA file. The caller is expected to have sniffed it first
    /// (footer signature or [`looks_like_tga`]).
    pub fn open(mut source: Box<dyn ByteSource>) -> Result<TgaFile> {
        // The footer read needs at least 26 bytes; a smaller file can't be
        // a valid TGA. Header and footer may overlap in tiny files.
        let file_size = source.size()?;
        if file_size < FOOTER_SIZE as u64 || file_size > TGA_MAX_SIZE {
            return Err(TextureError::UnsupportedFormat);
        }

        // Footer first: its signature decides TGA 1.0 vs 2.0.
        let mut footer = [0u8; FOOTER_SIZE];
        source.read_exact_at(file_size - FOOTER_SIZE as u64, &mut footer)?;
        let is_tga2 = &footer[8..26] == FOOTER_SIGNATURE;

        let mut header_bytes = [0u8; HEADER_SIZE];
        source.read_exact_at(0, &mut header_bytes)?;
        let header = TgaHeader::parse(&header_bytes)?;

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

        // Assume transparency is present unless the extension area says
        // otherwise. TGA 1.0 has no way to declare it either way.
        let mut ext_area = None;
        let mut alpha_type = AlphaType::Present;

        if is_tga2 {
            let ext_offset = u32::from_le_bytes(footer[0..4].try_into().unwrap()) as u64;
            if ext_offset != 0
                && file_size > EXT_AREA_SIZE as u64
                && ext_offset < file_size - EXT_AREA_SIZE as u64
            {
                let buf = source.read_vec_at(ext_offset, EXT_AREA_SIZE)?;
                if let Ok(ext) = TgaExtArea::parse(&buf) {
                    alpha_type = AlphaType::from_raw(ext.attributes_type);
                    ext_area = Some(ext);
                }
            }
        }

        // Orientation: H-flip if the X bit is set; V-flip unless the Y bit
        // is set (origin bottom-left is the default).
        let mut flip = FlipOp::None;
        if header.attr_dir & ORIENTATION_X_MASK != 0 {
            flip = flip.combine(FlipOp::Horizontal);
        }
        if header.attr_dir & ORIENTATION_Y_MASK == 0 {
            flip = flip.combine(FlipOp::Vertical);
        }

        Ok(TgaFile {
            source,
            header,
            ext_area,
            is_tga2,
            alpha_type,
            flip,
            file_size,
            cache: MipmapCache::new(1),
        })
    }

    pub fn header(&self) -> &TgaHeader {
        &self.header
    }

    /// TGA 2.0 extension area, if present
    pub fn ext_area(&self) -> Option<&TgaExtArea> {
        self.ext_area.as_ref()
    }

    pub fn is_tga2(&self) -> bool {
        self.is_tga2
    }

    pub fn alpha_type(&self) -> AlphaType {
        self.alpha_type
    }

    /// Flip applied to reach the canonical top-left origin
    pub fn flip_op(&self) -> FlipOp {
        self.flip
    }

    pub fn texture_format_name(&self) -> &'static str {
        "TrueVision TGA"
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.header.width as u32, self.header.height as u32)
    }

    pub fn mipmap_count(&self) -> u32 {
        1
    }

    pub fn premultiplied_alpha(&self) -> bool {
        self.alpha_type == AlphaType::Premultiplied
    }

    fn has_alpha(&self) -> bool {
        self.alpha_type.has_alpha() && self.header.attr_dir & 0x0F > 0
    }

    pub fn pixel_format_name(&self) -> Option<String> {
        let has_alpha = self.has_alpha();
        let name = match self.header.image_type & !IMAGETYPE_RLE_FLAG {
            IMAGETYPE_COLORMAP => {
                let prefix = if self.header.cmap_len <= 256 { "8bpp" } else { "16bpp" };
                let pal = match self.header.cmap_bpp {
                    15 => "RGB555",
                    16 => {
                        if has_alpha { "ARGB1555" } else { "RGB555" }
                    }
                    24 => "RGB888",
                    32 => {
                        if has_alpha { "ARGB8888" } else { "xRGB8888" }
                    }
                    _ => return None,
                };
                return Some(format!("{prefix} with {pal} palette"));
            }
            IMAGETYPE_TRUECOLOR => match self.header.bpp {
                15 => "RGB555",
                16 => {
                    if has_alpha { "ARGB1555" } else { "RGB555" }
                }
                24 => "RGB888",
                32 => {
                    if has_alpha { "ARGB8888" } else { "xRGB8888" }
                }
                _ => return None,
            },
            IMAGETYPE_GRAYSCALE => match self.header.bpp {
                8 => "8bpp grayscale",
                16 => "IA8",
                _ => return None,
            },
            _ => return None,
        };
        Some(name.to_string())
    }

    /// Decode the image. Only level 0 exists; TGA has no mipmaps.
    pub fn mipmap(&mut self, level: u32) -> Result<&TextureImage> {
        if level != 0 {
            return Err(TextureError::invalid_header("TGA has no mipmaps"));
        }
        if self.cache.contains(0) {
            return Ok(self.cache.get(0).unwrap());
        }

        let img = self.decode_image()?;
        Ok(self.cache.insert(0, img))
    }

    fn decode_image(&mut self) -> Result<TextureImage> {
        let hdr = &self.header;
        let width = hdr.width as u32;
        let height = hdr.height as u32;
        let has_alpha = self.has_alpha();

        if hdr.image_type == IMAGETYPE_HUFFMAN_COLORMAP
            || hdr.image_type == IMAGETYPE_HUFFMAN_4PASS_COLORMAP
        {
            return Err(TextureError::invalid_header(
                "TGA Huffman+Delta compression is not supported",
            ));
        }

        // Image data starts right after the header and image ID.
        let mut offset = (HEADER_SIZE + hdr.id_length as usize) as u64;

        // Color map handling: load it for colormapped images (up to 256
        // colors), skip over it otherwise.
        let mut palette: Option<Vec<u8>> = None;
        let mut cmap_size = 0usize;
        if hdr.color_map_type >= 1 {
            let entry_size = hdr.cmap_bytespp();
            cmap_size = hdr.cmap_len as usize * entry_size;

            if hdr.is_colormap_image() {
                let last = hdr.cmap_idx0 as usize + hdr.cmap_len as usize;
                if last > 256 {
                    return Err(TextureError::palette_too_large(last, 256));
                }
                let mut pal = vec![0u8; 256 * entry_size];
                let raw = self.source.read_vec_at(offset, cmap_size)?;
                pal[hdr.cmap_idx0 as usize * entry_size..][..cmap_size].copy_from_slice(&raw);
                palette = Some(pal);
            }
            offset += cmap_size as u64;
        }

        let bytespp = hdr.bytespp();
        if bytespp == 0 {
            return Err(TextureError::invalid_header("unsupported TGA pixel depth"));
        }
        let img_siz = width as usize * height as usize * bytespp;

        let pixels = if hdr.is_rle() {
            // Compressed: read the rest of the file and expand. A truncated
            // stream zero-fills the remainder rather than failing.
            let min_size = (HEADER_SIZE + hdr.id_length as usize + cmap_size) as u64;
            if self.file_size < min_size {
                return Err(TextureError::truncated(min_size as usize, self.file_size as usize));
            }
            let rle_size = (self.file_size - offset) as usize;
            let rle_data = self.source.read_vec_at(offset, rle_size)?;
            rle::decompress(img_siz, &rle_data, bytespp)?
        } else {
            self.source.read_vec_at(offset, img_siz)?
        };

        let img = match hdr.image_type & !IMAGETYPE_RLE_FLAG {
            IMAGETYPE_COLORMAP => {
                let pal = palette.as_deref().ok_or_else(|| {
                    TextureError::invalid_header("colormapped TGA without a color map")
                })?;
                let px_fmt = match hdr.cmap_bpp {
                    15 => PixelFormat::Rgb555,
                    16 => {
                        if has_alpha { PixelFormat::Argb1555 } else { PixelFormat::Rgb555 }
                    }
                    24 => PixelFormat::Rgb888,
                    32 => {
                        if has_alpha { PixelFormat::Argb8888 } else { PixelFormat::Xrgb8888 }
                    }
                    _ => {
                        return Err(TextureError::invalid_header(
                            "unsupported TGA color map depth",
                        ));
                    }
                };
                linear::from_linear_ci8(px_fmt, width, height, &pixels, pal)?
            }

            IMAGETYPE_TRUECOLOR => match hdr.bpp {
                15 | 16 => linear::from_linear16(
                    if has_alpha { PixelFormat::Argb1555 } else { PixelFormat::Rgb555 },
                    width,
                    height,
                    &pixels,
                    0,
                )?,
                24 => linear::from_linear24(PixelFormat::Rgb888, width, height, &pixels, 0)?,
                32 => linear::from_linear32(
                    if has_alpha { PixelFormat::Argb8888 } else { PixelFormat::Xrgb8888 },
                    width,
                    height,
                    &pixels,
                    0,
                )?,
                _ => {
                    return Err(TextureError::invalid_header("unsupported TGA pixel depth"));
                }
            },

            IMAGETYPE_GRAYSCALE => match hdr.bpp {
                8 => linear::from_linear_ci8(
                    PixelFormat::Argb8888,
                    width,
                    height,
                    &pixels,
                    &*GRAY_PALETTE,
                )?,
                16 => linear::from_linear16(PixelFormat::Ia8, width, height, &pixels, 0)?,
                _ => {
                    return Err(TextureError::invalid_header(
                        "unsupported TGA grayscale depth",
                    ));
                }
            },

            _ => {
                return Err(TextureError::invalid_header("unsupported TGA image type"));
            }
        };

        if self.flip != FlipOp::None {
            return img.flip(self.flip);
        }
        Ok(img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_tga(
        image_type: u8,
        bpp: u8,
        attr_dir: u8,
        width: u16,
        height: u16,
        pixels: &[u8],
    ) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 0, image_type]);
        data.extend_from_slice(&[0, 0, 0, 0, 0]); // color map fields
        data.extend_from_slice(&0u16.to_le_bytes()); // x origin
        data.extend_from_slice(&0u16.to_le_bytes()); // y origin
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        data.push(bpp);
        data.push(attr_dir);
        data.extend_from_slice(pixels);
        // TGA 1.0: no footer signature, just padding so the file is big
        // enough to hold one.
        data.extend_from_slice(&[0u8; FOOTER_SIZE]);
        data
    }

    fn open(data: Vec<u8>) -> TgaFile {
        TgaFile::open(Box::new(Cursor::new(data))).unwrap()
    }

    #[test]
    fn test_default_orientation_is_vflip() {
        // attr_dir 0x00: origin bottom-left, so a vertical flip is assumed.
        let data = build_tga(IMAGETYPE_TRUECOLOR, 24, 0x00, 1, 2, &[1, 2, 3, 4, 5, 6]);
        let tga = open(data);
        assert_eq!(tga.flip_op(), FlipOp::Vertical);
    }

    #[test]
    fn test_y_bit_disables_vflip() {
        // attr_dir 0x20: origin top-left, no flip.
        let data = build_tga(IMAGETYPE_TRUECOLOR, 24, 0x20, 1, 2, &[1, 2, 3, 4, 5, 6]);
        let tga = open(data);
        assert_eq!(tga.flip_op(), FlipOp::None);
    }

    #[test]
    fn test_vflip_applied_to_pixels() {
        // 1x2 RGB888 (bytes are B,G,R): bottom row red, top row blue.
        let data = build_tga(
            IMAGETYPE_TRUECOLOR,
            24,
            0x00,
            1,
            2,
            &[0, 0, 0xFF, 0xFF, 0, 0],
        );
        let mut tga = open(data);
        // Stored first row (red) is the bottom of the image.
        assert_eq!(tga.mipmap(0).unwrap().pixel(0, 1), Some(0xFFFF0000));
        assert_eq!(tga.mipmap(0).unwrap().pixel(0, 0), Some(0xFF0000FF));
    }

    #[test]
    fn test_rle_truecolor_decode() {
        // 2x2, one run packet of 4 red pixels; origin top-left.
        let data = build_tga(
            IMAGETYPE_TRUECOLOR | IMAGETYPE_RLE_FLAG,
            24,
            0x20,
            2,
            2,
            &[0x83, 0, 0, 0xFF],
        );
        let mut tga = open(data);
        let img = tga.mipmap(0).unwrap();
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(img.pixel(x, y), Some(0xFFFF0000));
            }
        }
    }

    #[test]
    fn test_grayscale_palette() {
        let data = build_tga(IMAGETYPE_GRAYSCALE, 8, 0x20, 2, 1, &[0x00, 0x80]);
        let mut tga = open(data);
        let img = tga.mipmap(0).unwrap().to_argb32().unwrap();
        assert_eq!(img.pixel(0, 0), Some(0xFF000000));
        assert_eq!(img.pixel(1, 0), Some(0xFF808080));
    }

    #[test]
    fn test_colormapped_decode() {
        // 2-entry RGB888 color map, 2x1 image.
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 1, IMAGETYPE_COLORMAP]);
        data.extend_from_slice(&0u16.to_le_bytes()); // cmap idx0
        data.extend_from_slice(&2u16.to_le_bytes()); // cmap len
        data.push(24); // cmap bpp
        data.extend_from_slice(&[0, 0, 0, 0]); // origins
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.push(8); // bpp
        data.push(0x20); // top-left
        data.extend_from_slice(&[0x33, 0x22, 0x11, 0x66, 0x55, 0x44]); // map
        data.extend_from_slice(&[0, 1]); // indices
        data.extend_from_slice(&[0u8; FOOTER_SIZE]);

        let mut tga = open(data);
        assert_eq!(
            tga.pixel_format_name().as_deref(),
            Some("8bpp with RGB888 palette")
        );
        let img = tga.mipmap(0).unwrap().to_argb32().unwrap();
        assert_eq!(img.pixel(0, 0), Some(0xFF112233));
        assert_eq!(img.pixel(1, 0), Some(0xFF445566));
    }

    #[test]
    fn test_tga2_footer_and_ext_area() {
        // Truecolor 1x1 + extension area + TGA 2.0 footer.
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 0, IMAGETYPE_TRUECOLOR]);
        data.extend_from_slice(&[0, 0, 0, 0, 0]);
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.push(24);
        data.push(0x20);
        data.extend_from_slice(&[10, 20, 30]);

        let ext_offset = data.len() as u32;
        let mut ext = vec![0u8; EXT_AREA_SIZE];
        ext[0..2].copy_from_slice(&(EXT_AREA_SIZE as u16).to_le_bytes());
        ext[2..7].copy_from_slice(b"moira");
        ext[494] = 3; // alpha present
        data.extend_from_slice(&ext);

        data.extend_from_slice(&ext_offset.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(FOOTER_SIGNATURE);

        let tga = open(data);
        assert!(tga.is_tga2());
        let ext = tga.ext_area().unwrap();
        assert_eq!(ext.author_name, "moira");
        assert_eq!(tga.alpha_type(), AlphaType::Present);
    }

    #[test]
    fn test_looks_like_tga() {
        let data = build_tga(IMAGETYPE_TRUECOLOR, 24, 0, 4, 4, &[0; 48]);
        assert!(looks_like_tga(&data[..HEADER_SIZE], Some("tga")));
        assert!(looks_like_tga(&data[..HEADER_SIZE], None));
        assert!(!looks_like_tga(&data[..HEADER_SIZE], Some("bin")));

        // Bad image type.
        let mut bad = data.clone();
        bad[2] = 0;
        assert!(!looks_like_tga(&bad[..HEADER_SIZE], Some("tga")));

        // Implausible pixel depth.
        let mut bad = data.clone();
        bad[16] = 13;
        assert!(!looks_like_tga(&bad[..HEADER_SIZE], Some("tga")));

        // Alpha depth 11 (MPEG false positive).
        let mut bad = data;
        bad[17] = 0x0B;
        assert!(!looks_like_tga(&bad[..HEADER_SIZE], Some("tga")));
    }
}
