//! S3TC (DXTn) and BC4/BC5 block decoders
//!
//! All of these codecs store fixed 4x4 pixel tiles. Image dimensions are not
//! required to be multiples of 4: each tile is decoded into a temporary
//! 16-pixel buffer and only the in-bounds pixels are copied into the output,
//! so the canonical image is never written outside width x height.

use crate::decode::pixel::argb32_from_rgb565;
use crate::error::{Result, TextureError};
use crate::image::{PixelLayout, TextureImage};

/// DXT1-style color block: two RGB565 endpoints plus 2-bit indices.
struct Dxt1Block {
    c0: u16,
    c1: u16,
    indices: u32,
}

impl Dxt1Block {
    fn parse(src: &[u8]) -> Self {
        Self {
            c0: u16::from_le_bytes([src[0], src[1]]),
            c1: u16::from_le_bytes([src[2], src[3]]),
            indices: u32::from_le_bytes([src[4], src[5], src[6], src[7]]),
        }
    }
}

/// Decode the 4-entry tile palette from a DXT1-style color block.
///
/// `color3_alpha`: palette index 3 becomes fully transparent in the
/// color0 <= color1 case (the "DXT1 with 1-bit alpha" variant).
/// `color0_gt_color1`: force the 4-color interpolation regardless of the
/// endpoint ordering (DXT2/DXT3 always use it).
fn decode_tile_palette(block: &Dxt1Block, color3_alpha: bool, color0_gt_color1: bool) -> [u32; 4] {
    let mut pal = [0u32; 4];
    pal[0] = argb32_from_rgb565(block.c0);
    pal[1] = argb32_from_rgb565(block.c1);

    let (r0, g0, b0) = split_rgb(pal[0]);
    let (r1, g1, b1) = split_rgb(pal[1]);

    if color0_gt_color1 || block.c0 > block.c1 {
        pal[2] = join_rgb((2 * r0 + r1) / 3, (2 * g0 + g1) / 3, (2 * b0 + b1) / 3);
        pal[3] = join_rgb((2 * r1 + r0) / 3, (2 * g1 + g0) / 3, (2 * b1 + b0) / 3);
    } else {
        pal[2] = join_rgb((r0 + r1) / 2, (g0 + g1) / 2, (b0 + b1) / 2);
        // Black and/or transparent.
        pal[3] = if color3_alpha { 0x00000000 } else { 0xFF000000 };
    }
    pal
}

fn split_rgb(px: u32) -> (u32, u32, u32) {
    ((px >> 16) & 0xFF, (px >> 8) & 0xFF, px & 0xFF)
}

fn join_rgb(r: u32, g: u32, b: u32) -> u32 {
    0xFF000000 | (r << 16) | (g << 8) | b
}

/// Extract the 48-bit selector codes from a DXT5-style alpha block
/// (bytes 2..8 of the 8-byte block).
fn extract48(src: &[u8]) -> u64 {
    u64::from_le_bytes([
        src[0], src[1], src[2], src[3], src[4], src[5], src[6], src[7],
    ]) >> 16
}

/// Decode one DXT5 alpha value from its 3-bit selector and the two
/// endpoint values.
fn decode_dxt5_alpha(a3: u32, a0: u8, a1: u8) -> u8 {
    let (a0, a1) = (a0 as u32, a1 as u32);
    let value = if a0 > a1 {
        match a3 & 7 {
            0 => a0,
            1 => a1,
            2 => (6 * a0 + a1) / 7,
            3 => (5 * a0 + 2 * a1) / 7,
            4 => (4 * a0 + 3 * a1) / 7,
            5 => (3 * a0 + 4 * a1) / 7,
            6 => (2 * a0 + 5 * a1) / 7,
            _ => (a0 + 6 * a1) / 7,
        }
    } else {
        match a3 & 7 {
            0 => a0,
            1 => a1,
            2 => (4 * a0 + a1) / 5,
            3 => (3 * a0 + 2 * a1) / 5,
            4 => (2 * a0 + 3 * a1) / 5,
            5 => (a0 + 4 * a1) / 5,
            6 => 0,
            _ => 255,
        }
    };
    value.min(255) as u8
}

/// Number of 4x4 tiles in each direction.
fn tile_counts(width: u32, height: u32) -> (u32, u32) {
    (width.div_ceil(4), height.div_ceil(4))
}

/// Validate the compressed buffer length for the given block size.
fn check_input(width: u32, height: u32, buf: &[u8], bytes_per_block: usize) -> Result<()> {
    let (tx, ty) = tile_counts(width, height);
    let needed = tx as usize * ty as usize * bytes_per_block;
    if buf.len() < needed {
        return Err(TextureError::truncated(needed, buf.len()));
    }
    Ok(())
}

/// Copy a decoded 4x4 tile into the image, clamped to the image bounds.
fn blit_tile(img: &mut TextureImage, tile: &[u32; 16], tx: u32, ty: u32) -> Result<()> {
    let x0 = tx * 4;
    let y0 = ty * 4;
    let copy_w = (img.width() - x0).min(4) as usize;
    let rows = (img.height() - y0).min(4);
    for py in 0..rows {
        let dest = &mut img.scanline_argb_mut(y0 + py)?[x0 as usize..x0 as usize + copy_w];
        dest.copy_from_slice(&tile[py as usize * 4..py as usize * 4 + copy_w]);
    }
    Ok(())
}

fn decode_dxt1_common(
    width: u32,
    height: u32,
    buf: &[u8],
    color3_alpha: bool,
) -> Result<TextureImage> {
    check_input(width, height, buf, 8)?;
    let mut img = TextureImage::new(width, height, PixelLayout::Argb32)?;
    let (tiles_x, tiles_y) = tile_counts(width, height);

    let mut src = buf.chunks_exact(8);
    let mut tile = [0u32; 16];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let block = Dxt1Block::parse(src.next().ok_or(TextureError::BufferOverflow)?);
            let pal = decode_tile_palette(&block, color3_alpha, false);

            let mut indices = block.indices;
            for px in tile.iter_mut() {
                *px = pal[(indices & 3) as usize];
                indices >>= 2;
            }
            blit_tile(&mut img, &tile, tx, ty)?;
        }
    }
    Ok(img)
}

/// Decode a DXT1 image. Palette index 3 decodes to opaque black in the
/// two-color case.
pub fn from_dxt1(width: u32, height: u32, buf: &[u8]) -> Result<TextureImage> {
    decode_dxt1_common(width, height, buf, false)
}

/// Decode a DXT1 image with 1-bit alpha. Palette index 3 decodes to fully
/// transparent in the two-color case.
pub fn from_dxt1_a1(width: u32, height: u32, buf: &[u8]) -> Result<TextureImage> {
    decode_dxt1_common(width, height, buf, true)
}

/// Decode a DXT3 image (explicit 4-bit alpha).
pub fn from_dxt3(width: u32, height: u32, buf: &[u8]) -> Result<TextureImage> {
    check_input(width, height, buf, 16)?;
    let mut img = TextureImage::new(width, height, PixelLayout::Argb32)?;
    let (tiles_x, tiles_y) = tile_counts(width, height);

    let mut src = buf.chunks_exact(16);
    let mut tile = [0u32; 16];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let block = src.next().ok_or(TextureError::BufferOverflow)?;
            let mut alpha = u64::from_le_bytes(block[..8].try_into().unwrap());
            let colors = Dxt1Block::parse(&block[8..]);
            let pal = decode_tile_palette(&colors, false, true);

            let mut indices = colors.indices;
            for px in tile.iter_mut() {
                let a4 = (alpha & 0xF) as u32;
                *px = (pal[(indices & 3) as usize] & 0x00FFFFFF) | (a4 | (a4 << 4)) << 24;
                indices >>= 2;
                alpha >>= 4;
            }
            blit_tile(&mut img, &tile, tx, ty)?;
        }
    }
    Ok(img)
}

/// Decode a DXT2 image: DXT3 with premultiplied alpha, converted back to
/// straight alpha.
pub fn from_dxt2(width: u32, height: u32, buf: &[u8]) -> Result<TextureImage> {
    let mut img = from_dxt3(width, height, buf)?;
    img.un_premultiply();
    Ok(img)
}

/// Decode a DXT5 image (interpolated 3-bit alpha).
pub fn from_dxt5(width: u32, height: u32, buf: &[u8]) -> Result<TextureImage> {
    check_input(width, height, buf, 16)?;
    let mut img = TextureImage::new(width, height, PixelLayout::Argb32)?;
    let (tiles_x, tiles_y) = tile_counts(width, height);

    let mut src = buf.chunks_exact(16);
    let mut tile = [0u32; 16];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let block = src.next().ok_or(TextureError::BufferOverflow)?;
            let (a0, a1) = (block[0], block[1]);
            let mut alpha48 = extract48(&block[..8]);
            let colors = Dxt1Block::parse(&block[8..]);
            let pal = decode_tile_palette(&colors, false, false);

            let mut indices = colors.indices;
            for px in tile.iter_mut() {
                let a = decode_dxt5_alpha((alpha48 & 7) as u32, a0, a1);
                *px = (pal[(indices & 3) as usize] & 0x00FFFFFF) | ((a as u32) << 24);
                indices >>= 2;
                alpha48 >>= 3;
            }
            blit_tile(&mut img, &tile, tx, ty)?;
        }
    }
    Ok(img)
}

/// Decode a DXT4 image: DXT5 with premultiplied alpha, converted back to
/// straight alpha.
pub fn from_dxt4(width: u32, height: u32, buf: &[u8]) -> Result<TextureImage> {
    let mut img = from_dxt5(width, height, buf)?;
    img.un_premultiply();
    Ok(img)
}

/// Decode a BC4 (ATI1) image. The single channel lands in red; green and
/// blue stay zero.
pub fn from_bc4(width: u32, height: u32, buf: &[u8]) -> Result<TextureImage> {
    check_input(width, height, buf, 8)?;
    let mut img = TextureImage::new(width, height, PixelLayout::Argb32)?;
    let (tiles_x, tiles_y) = tile_counts(width, height);

    let mut src = buf.chunks_exact(8);
    let mut tile = [0u32; 16];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let block = src.next().ok_or(TextureError::BufferOverflow)?;
            let (r0, r1) = (block[0], block[1]);
            let mut red48 = extract48(block);

            for px in tile.iter_mut() {
                let r = decode_dxt5_alpha((red48 & 7) as u32, r0, r1);
                *px = 0xFF000000 | ((r as u32) << 16);
                red48 >>= 3;
            }
            blit_tile(&mut img, &tile, tx, ty)?;
        }
    }
    Ok(img)
}

/// Decode a BC5 (ATI2) image. Channels land in red and green.
pub fn from_bc5(width: u32, height: u32, buf: &[u8]) -> Result<TextureImage> {
    check_input(width, height, buf, 16)?;
    let mut img = TextureImage::new(width, height, PixelLayout::Argb32)?;
    let (tiles_x, tiles_y) = tile_counts(width, height);

    let mut src = buf.chunks_exact(16);
    let mut tile = [0u32; 16];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let block = src.next().ok_or(TextureError::BufferOverflow)?;
            let (r0, r1) = (block[0], block[1]);
            let (g0, g1) = (block[8], block[9]);
            let mut red48 = extract48(&block[..8]);
            let mut green48 = extract48(&block[8..]);

            for px in tile.iter_mut() {
                let r = decode_dxt5_alpha((red48 & 7) as u32, r0, r1);
                let g = decode_dxt5_alpha((green48 & 7) as u32, g0, g1);
                *px = 0xFF000000 | ((r as u32) << 16) | ((g as u32) << 8);
                red48 >>= 3;
                green48 >>= 3;
            }
            blit_tile(&mut img, &tile, tx, ty)?;
        }
    }
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dxt1_all_black_block() {
        // Both endpoints 0x0000, all index bits 0 -> every pixel opaque black.
        let block = [0u8; 8];
        let img = from_dxt1(4, 4, &block).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(img.pixel(x, y), Some(0xFF000000));
            }
        }
    }

    #[test]
    fn test_dxt1_interpolated_colors() {
        // c0 = pure red (0xF800) > c1 = black: index 2 is 2/3 red.
        let mut block = [0u8; 8];
        block[0] = 0x00;
        block[1] = 0xF8;
        block[4..8].copy_from_slice(&u32::to_le_bytes(0xAAAAAAAA)); // all index 2
        let img = from_dxt1(4, 4, &block).unwrap();
        assert_eq!(img.pixel(0, 0), Some(0xFFAA0000));
    }

    #[test]
    fn test_dxt1_a1_transparent_index3() {
        // c0 <= c1 and all indices 3: transparent for the A1 variant,
        // opaque black otherwise.
        let mut block = [0u8; 8];
        block[4..8].copy_from_slice(&u32::to_le_bytes(0xFFFFFFFF));
        let opaque = from_dxt1(4, 4, &block).unwrap();
        assert_eq!(opaque.pixel(0, 0), Some(0xFF000000));
        let alpha = from_dxt1_a1(4, 4, &block).unwrap();
        assert_eq!(alpha.pixel(0, 0), Some(0x00000000));
    }

    #[test]
    fn test_dxt3_alpha_nibble_replication() {
        let mut block = [0u8; 16];
        // First pixel alpha nibble = 0x8 -> 0x88.
        block[0] = 0x08;
        // White endpoints so color is stable.
        block[8..12].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        let img = from_dxt3(4, 4, &block).unwrap();
        assert_eq!(img.pixel(0, 0), Some(0x88FFFFFF));
        // Remaining pixels have alpha nibble 0.
        assert_eq!(img.pixel(1, 0), Some(0x00FFFFFF));
    }

    #[test]
    fn test_dxt5_alpha_endpoints() {
        let mut block = [0u8; 16];
        block[0] = 0xF0; // a0
        block[1] = 0x10; // a1
        // Selector bits zero -> every pixel uses a0.
        block[8..12].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        let img = from_dxt5(4, 4, &block).unwrap();
        assert_eq!(img.pixel(0, 0), Some(0xF0FFFFFF));
    }

    #[test]
    fn test_dxt5_alpha_ramp() {
        // a0 > a1: selector 2 is (6*a0 + a1) / 7.
        assert_eq!(decode_dxt5_alpha(2, 140, 7), ((6u32 * 140 + 7) / 7) as u8);
        // a0 <= a1: selectors 6 and 7 are the constants 0 and 255.
        assert_eq!(decode_dxt5_alpha(6, 10, 20), 0);
        assert_eq!(decode_dxt5_alpha(7, 10, 20), 255);
    }

    #[test]
    fn test_bc4_red_channel() {
        let mut block = [0u8; 8];
        block[0] = 0xCC;
        block[1] = 0x00;
        let img = from_bc4(4, 4, &block).unwrap();
        assert_eq!(img.pixel(0, 0), Some(0xFFCC0000));
    }

    #[test]
    fn test_bc5_red_green_channels() {
        let mut block = [0u8; 16];
        block[0] = 0x40; // red endpoints
        block[8] = 0x80; // green endpoints
        let img = from_bc5(4, 4, &block).unwrap();
        assert_eq!(img.pixel(0, 0), Some(0xFF408000));
    }

    #[test]
    fn test_truncated_buffer_rejected() {
        let buf = [0u8; 7];
        assert!(matches!(
            from_dxt1(4, 4, &buf),
            Err(TextureError::TruncatedInput { expected: 8, actual: 7 })
        ));
        // 5x5 needs 2x2 tiles = 32 bytes.
        let buf = [0u8; 31];
        assert!(from_dxt1(5, 5, &buf).is_err());
    }

    #[test]
    fn test_partial_edge_tiles_stay_in_bounds() {
        // Non-multiple-of-4 dimensions: decode must succeed with the
        // minimum-size buffer and populate exactly width x height pixels.
        for &w in &[1u32, 3, 5, 7, 8, 9] {
            for &h in &[1u32, 3, 5, 7, 8, 9] {
                let blocks = w.div_ceil(4) * h.div_ceil(4);
                let mut buf = vec![0u8; blocks as usize * 8];
                // Red endpoint everywhere so content is recognizable.
                for block in buf.chunks_exact_mut(8) {
                    block[1] = 0xF8;
                }
                let img = from_dxt1(w, h, &buf).unwrap();
                assert_eq!(img.width(), w);
                assert_eq!(img.height(), h);
                assert_eq!(img.pixel(w - 1, h - 1), Some(0xFFFF0000));
                assert_eq!(img.pixel(w, h - 1), None);
                assert_eq!(img.pixel(w - 1, h), None);
            }
        }
    }
}
