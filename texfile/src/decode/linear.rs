//! Linear packed-pixel and palette-indexed buffer converters
//!
//! Each converter validates its input against the logical dimensions and the
//! (optional) explicit row stride before touching pixel data, then converts
//! one row at a time into a fresh ARGB32 image. The CI4/CI8 converters
//! produce a CI8 image carrying a normalized 256-entry palette instead.

use crate::decode::pixel::*;
use crate::decode::PixelFormat;
use crate::error::{Result, TextureError};
use crate::image::{PixelLayout, TextureImage};

/// Resolve and validate the source row stride in bytes.
/// `stride == 0` means tightly packed rows.
fn resolve_stride(
    width: u32,
    height: u32,
    bytespp: usize,
    buf_len: usize,
    stride: usize,
) -> Result<usize> {
    let min_row = width as usize * bytespp;
    let stride = if stride == 0 { min_row } else { stride };
    if stride < min_row || stride % bytespp != 0 {
        return Err(TextureError::invalid_header(format!(
            "row stride {stride} smaller than row size {min_row} or misaligned"
        )));
    }
    let needed = stride
        .checked_mul(height as usize)
        .ok_or(TextureError::BufferOverflow)?;
    if buf_len < needed {
        return Err(TextureError::truncated(needed, buf_len));
    }
    Ok(stride)
}

fn le16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

fn le32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

/// Convert a linear 8-bit image to ARGB32.
pub fn from_linear8(
    px_format: PixelFormat,
    width: u32,
    height: u32,
    buf: &[u8],
    stride: usize,
) -> Result<TextureImage> {
    let conv: fn(u8) -> u32 = match px_format {
        PixelFormat::L8 => argb32_from_l8,
        PixelFormat::A4L4 => argb32_from_a4l4,
        PixelFormat::A8 => argb32_from_a8,
        PixelFormat::R8 => argb32_from_r8,
        PixelFormat::Rgb332 => argb32_from_rgb332,
        _ => {
            return Err(TextureError::invalid_header(format!(
                "{} is not an 8-bit layout",
                px_format.name()
            )));
        }
    };

    let stride = resolve_stride(width, height, 1, buf.len(), stride)?;
    let mut img = TextureImage::new(width, height, PixelLayout::Argb32)?;
    for y in 0..height {
        let src = &buf[y as usize * stride..][..width as usize];
        let dest = &mut img.scanline_argb_mut(y)?[..width as usize];
        for (d, &s) in dest.iter_mut().zip(src) {
            *d = conv(s);
        }
    }
    Ok(img)
}

/// Convert a linear 16-bit image (little-endian pixels) to ARGB32.
pub fn from_linear16(
    px_format: PixelFormat,
    width: u32,
    height: u32,
    buf: &[u8],
    stride: usize,
) -> Result<TextureImage> {
    let conv = converter16(px_format)?;
    let stride = resolve_stride(width, height, 2, buf.len(), stride)?;
    let mut img = TextureImage::new(width, height, PixelLayout::Argb32)?;
    for y in 0..height {
        let src = &buf[y as usize * stride..][..width as usize * 2];
        let dest = &mut img.scanline_argb_mut(y)?[..width as usize];
        for (d, s) in dest.iter_mut().zip(src.chunks_exact(2)) {
            *d = conv(le16(s));
        }
    }
    Ok(img)
}

fn converter16(px_format: PixelFormat) -> Result<fn(u16) -> u32> {
    let conv: fn(u16) -> u32 = match px_format {
        PixelFormat::Rgb565 => argb32_from_rgb565,
        PixelFormat::Bgr565 => argb32_from_bgr565,
        PixelFormat::Rgb555 => argb32_from_rgb555,
        PixelFormat::Bgr555 => argb32_from_bgr555,
        PixelFormat::Argb1555 => argb32_from_argb1555,
        PixelFormat::Abgr1555 => argb32_from_abgr1555,
        PixelFormat::Rgba5551 => argb32_from_rgba5551,
        PixelFormat::Bgra5551 => argb32_from_bgra5551,
        PixelFormat::Argb4444 => argb32_from_argb4444,
        PixelFormat::Abgr4444 => argb32_from_abgr4444,
        PixelFormat::Rgba4444 => argb32_from_rgba4444,
        PixelFormat::Bgra4444 => argb32_from_bgra4444,
        PixelFormat::Xrgb4444 => argb32_from_xrgb4444,
        PixelFormat::Argb8332 => argb32_from_argb8332,
        PixelFormat::Rg88 => argb32_from_rg88,
        PixelFormat::Gr88 => argb32_from_gr88,
        PixelFormat::Ia8 | PixelFormat::L8A8 => argb32_from_l8a8,
        PixelFormat::A8L8 => argb32_from_a8l8,
        PixelFormat::L16 => argb32_from_l16,
        _ => {
            return Err(TextureError::invalid_header(format!(
                "{} is not a 16-bit layout",
                px_format.name()
            )));
        }
    };
    Ok(conv)
}

/// Convert a linear 24-bit image to ARGB32.
pub fn from_linear24(
    px_format: PixelFormat,
    width: u32,
    height: u32,
    buf: &[u8],
    stride: usize,
) -> Result<TextureImage> {
    // Byte order within one pixel: RGB888 stores blue first (a little-endian
    // xRGB value), BGR888 stores red first.
    let (ri, gi, bi) = match px_format {
        PixelFormat::Rgb888 => (2usize, 1usize, 0usize),
        PixelFormat::Bgr888 => (0, 1, 2),
        _ => {
            return Err(TextureError::invalid_header(format!(
                "{} is not a 24-bit layout",
                px_format.name()
            )));
        }
    };

    let stride = resolve_stride(width, height, 3, buf.len(), stride)?;
    let mut img = TextureImage::new(width, height, PixelLayout::Argb32)?;
    for y in 0..height {
        let src = &buf[y as usize * stride..][..width as usize * 3];
        let dest = &mut img.scanline_argb_mut(y)?[..width as usize];
        for (d, s) in dest.iter_mut().zip(src.chunks_exact(3)) {
            *d = 0xFF000000
                | ((s[ri] as u32) << 16)
                | ((s[gi] as u32) << 8)
                | (s[bi] as u32);
        }
    }
    Ok(img)
}

/// Convert a linear 32-bit image (little-endian pixels) to ARGB32.
pub fn from_linear32(
    px_format: PixelFormat,
    width: u32,
    height: u32,
    buf: &[u8],
    stride: usize,
) -> Result<TextureImage> {
    let conv = converter32(px_format)?;
    let stride = resolve_stride(width, height, 4, buf.len(), stride)?;
    let mut img = TextureImage::new(width, height, PixelLayout::Argb32)?;
    for y in 0..height {
        let src = &buf[y as usize * stride..][..width as usize * 4];
        let dest = &mut img.scanline_argb_mut(y)?[..width as usize];
        for (d, s) in dest.iter_mut().zip(src.chunks_exact(4)) {
            *d = conv(le32(s));
        }
    }
    Ok(img)
}

fn converter32(px_format: PixelFormat) -> Result<fn(u32) -> u32> {
    fn identity(px: u32) -> u32 {
        px
    }
    fn opaque(px: u32) -> u32 {
        px | 0xFF000000
    }
    let conv: fn(u32) -> u32 = match px_format {
        PixelFormat::Argb8888 => identity,
        PixelFormat::Xrgb8888 => opaque,
        PixelFormat::Abgr8888 => argb32_from_abgr8888,
        PixelFormat::Xbgr8888 => argb32_from_xbgr8888,
        PixelFormat::Rgba8888 => argb32_from_rgba8888,
        PixelFormat::Rabg8888 => argb32_from_rabg8888,
        PixelFormat::G16R16 => argb32_from_g16r16,
        PixelFormat::A2R10G10B10 => argb32_from_a2r10g10b10,
        PixelFormat::A2B10G10R10 => argb32_from_a2b10g10r10,
        _ => {
            return Err(TextureError::invalid_header(format!(
                "{} is not a 32-bit layout",
                px_format.name()
            )));
        }
    };
    Ok(conv)
}

/// Palette entry size in bytes for the given palette pixel format.
fn palette_entry_size(pal_format: PixelFormat) -> Result<usize> {
    Ok(match pal_format {
        PixelFormat::Rgb565
        | PixelFormat::Rgb555
        | PixelFormat::Argb1555
        | PixelFormat::Argb4444
        | PixelFormat::Rgba4444 => 2,
        PixelFormat::Rgb888 => 3,
        PixelFormat::Argb8888 | PixelFormat::Xrgb8888 => 4,
        _ => {
            return Err(TextureError::invalid_header(format!(
                "{} is not a palette entry layout",
                pal_format.name()
            )));
        }
    })
}

/// Convert one palette entry to ARGB32.
fn palette_entry(pal_format: PixelFormat, entry: &[u8]) -> u32 {
    match pal_format {
        PixelFormat::Rgb565 => argb32_from_rgb565(le16(entry)),
        PixelFormat::Rgb555 => argb32_from_rgb555(le16(entry)),
        PixelFormat::Argb1555 => argb32_from_argb1555(le16(entry)),
        PixelFormat::Argb4444 => argb32_from_argb4444(le16(entry)),
        PixelFormat::Rgba4444 => argb32_from_rgba4444(le16(entry)),
        PixelFormat::Rgb888 => {
            0xFF000000 | ((entry[2] as u32) << 16) | ((entry[1] as u32) << 8) | (entry[0] as u32)
        }
        PixelFormat::Argb8888 => le32(entry),
        PixelFormat::Xrgb8888 => le32(entry) | 0xFF000000,
        _ => unreachable!("checked by palette_entry_size"),
    }
}

/// Convert the source palette into the image's 256-entry palette and record
/// the first fully transparent index. Entries past the source palette stay
/// zero.
fn fill_palette(
    img: &mut TextureImage,
    pal_format: PixelFormat,
    pal_buf: &[u8],
    max_entries: usize,
) -> Result<()> {
    let entry_size = palette_entry_size(pal_format)?;
    let entries = pal_buf.len() / entry_size;
    if entries > max_entries {
        return Err(TextureError::palette_too_large(entries, max_entries));
    }

    let mut tr_idx = None;
    {
        let palette = img.palette_mut().expect("CI8 image has a palette");
        for (i, entry) in pal_buf.chunks_exact(entry_size).enumerate() {
            palette[i] = palette_entry(pal_format, entry);
            if tr_idx.is_none() && palette[i] >> 24 == 0 {
                tr_idx = Some(i as u8);
            }
        }
    }
    img.set_transparent_index(tr_idx);
    Ok(())
}

/// Convert a linear CI8 image with an accompanying palette to a CI8 image
/// carrying a normalized 256-entry ARGB32 palette.
pub fn from_linear_ci8(
    pal_format: PixelFormat,
    width: u32,
    height: u32,
    img_buf: &[u8],
    pal_buf: &[u8],
) -> Result<TextureImage> {
    let needed = width as usize * height as usize;
    if img_buf.len() < needed {
        return Err(TextureError::truncated(needed, img_buf.len()));
    }

    let mut img = TextureImage::new(width, height, PixelLayout::Ci8)?;
    fill_palette(&mut img, pal_format, pal_buf, 256)?;

    for y in 0..height {
        let src = &img_buf[y as usize * width as usize..][..width as usize];
        img.scanline_ci8_mut(y)?[..width as usize].copy_from_slice(src);
    }
    Ok(img)
}

/// Convert a linear CI4 image (two packed indices per byte) to CI8.
/// `msn_left`: the most significant nybble is the left pixel.
pub fn from_linear_ci4(
    pal_format: PixelFormat,
    msn_left: bool,
    width: u32,
    height: u32,
    img_buf: &[u8],
    pal_buf: &[u8],
) -> Result<TextureImage> {
    if width % 2 != 0 {
        return Err(TextureError::invalid_header(
            "CI4 width must be a multiple of two",
        ));
    }
    let needed = (width as usize * height as usize) / 2;
    if img_buf.len() < needed {
        return Err(TextureError::truncated(needed, img_buf.len()));
    }

    let mut img = TextureImage::new(width, height, PixelLayout::Ci8)?;
    fill_palette(&mut img, pal_format, pal_buf, 16)?;

    let row_bytes = width as usize / 2;
    for y in 0..height {
        let src = &img_buf[y as usize * row_bytes..][..row_bytes];
        let dest = &mut img.scanline_ci8_mut(y)?[..width as usize];
        for (pair, &packed) in dest.chunks_exact_mut(2).zip(src) {
            if msn_left {
                pair[0] = packed >> 4;
                pair[1] = packed & 0x0F;
            } else {
                pair[0] = packed & 0x0F;
                pair[1] = packed >> 4;
            }
        }
    }
    Ok(img)
}
