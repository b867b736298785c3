//! Canonical decoded image buffer
//!
//! Every decoder in this crate writes into a [`TextureImage`]: either ARGB32
//! (one `u32` per pixel, `0xAARRGGBB`) or CI8 (one palette index per pixel
//! plus an owned 256-entry ARGB32 palette). Rows are stored with a 16-byte
//! aligned stride, so the row pitch may be wider than `width`.

use crate::error::{Result, TextureError};
use serde::{Deserialize, Serialize};

/// Maximum width/height accepted from any header. Bounds worst-case
/// allocation from a malformed file.
pub const MAX_DIMENSION: u32 = 32768;

/// Pixel storage layout of a [`TextureImage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelLayout {
    /// 32-bit ARGB, one `u32` per pixel
    Argb32,
    /// 8-bit palette indices with a 256-entry ARGB32 palette
    Ci8,
}

/// Flip operation applied after decoding
///
/// Some formats store their origin at the bottom-left, so rows (and sometimes
/// columns) have to be reversed to reach the canonical top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlipOp {
    #[default]
    None,
    Horizontal,
    Vertical,
    Both,
}

impl FlipOp {
    /// Combine two flips; flipping the same axis twice cancels out.
    pub fn combine(self, other: FlipOp) -> FlipOp {
        let h = self.horizontal() ^ other.horizontal();
        let v = self.vertical() ^ other.vertical();
        match (h, v) {
            (false, false) => FlipOp::None,
            (true, false) => FlipOp::Horizontal,
            (false, true) => FlipOp::Vertical,
            (true, true) => FlipOp::Both,
        }
    }

    pub fn horizontal(self) -> bool {
        matches!(self, FlipOp::Horizontal | FlipOp::Both)
    }

    pub fn vertical(self) -> bool {
        matches!(self, FlipOp::Vertical | FlipOp::Both)
    }
}

#[derive(Debug)]
enum PixelData {
    Argb32(Vec<u32>),
    Ci8 {
        indices: Vec<u8>,
        palette: Box<[u32; 256]>,
        transparent_idx: Option<u8>,
    },
}

/// Canonical decoded image
#[derive(Debug)]
pub struct TextureImage {
    width: u32,
    height: u32,
    stride: usize, // bytes per row, 16-byte aligned
    data: PixelData,
}

fn align16(n: usize) -> usize {
    (n + 15) & !15
}

impl TextureImage {
    /// Create a zero-filled image of the given dimensions and layout.
    ///
    /// Fails with `InvalidDimensions` if either dimension is zero or exceeds
    /// [`MAX_DIMENSION`].
    pub fn new(width: u32, height: u32, format: PixelLayout) -> Result<Self> {
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(TextureError::invalid_dimensions(width, height));
        }

        let stride = match format {
            PixelLayout::Argb32 => align16(width as usize * 4),
            PixelLayout::Ci8 => align16(width as usize),
        };
        let data = match format {
            PixelLayout::Argb32 => PixelData::Argb32(vec![0u32; (stride / 4) * height as usize]),
            PixelLayout::Ci8 => PixelData::Ci8 {
                indices: vec![0u8; stride * height as usize],
                palette: Box::new([0u32; 256]),
                transparent_idx: None,
            },
        };

        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row pitch in bytes, including padding
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelLayout {
        match self.data {
            PixelData::Argb32(_) => PixelLayout::Argb32,
            PixelData::Ci8 { .. } => PixelLayout::Ci8,
        }
    }

    fn check_row(&self, y: u32) -> Result<usize> {
        if y >= self.height {
            return Err(TextureError::BufferOverflow);
        }
        Ok(y as usize)
    }

    /// ARGB32 scanline, full padded row. Fails for a CI8 image or an
    /// out-of-range row.
    pub fn scanline_argb(&self, y: u32) -> Result<&[u32]> {
        let y = self.check_row(y)?;
        match &self.data {
            PixelData::Argb32(pixels) => {
                let row = self.stride / 4;
                Ok(&pixels[y * row..(y + 1) * row])
            }
            PixelData::Ci8 { .. } => Err(TextureError::BufferOverflow),
        }
    }

    /// Writable ARGB32 scanline
    pub fn scanline_argb_mut(&mut self, y: u32) -> Result<&mut [u32]> {
        let y = self.check_row(y)?;
        let row = self.stride / 4;
        match &mut self.data {
            PixelData::Argb32(pixels) => Ok(&mut pixels[y * row..(y + 1) * row]),
            PixelData::Ci8 { .. } => Err(TextureError::BufferOverflow),
        }
    }

    /// CI8 scanline, full padded row
    pub fn scanline_ci8(&self, y: u32) -> Result<&[u8]> {
        let y = self.check_row(y)?;
        match &self.data {
            PixelData::Ci8 { indices, .. } => {
                Ok(&indices[y * self.stride..(y + 1) * self.stride])
            }
            PixelData::Argb32(_) => Err(TextureError::BufferOverflow),
        }
    }

    /// Writable CI8 scanline
    pub fn scanline_ci8_mut(&mut self, y: u32) -> Result<&mut [u8]> {
        let y = self.check_row(y)?;
        let stride = self.stride;
        match &mut self.data {
            PixelData::Ci8 { indices, .. } => Ok(&mut indices[y * stride..(y + 1) * stride]),
            PixelData::Argb32(_) => Err(TextureError::BufferOverflow),
        }
    }

    /// Palette of a CI8 image
    pub fn palette(&self) -> Option<&[u32; 256]> {
        match &self.data {
            PixelData::Ci8 { palette, .. } => Some(palette),
            PixelData::Argb32(_) => None,
        }
    }

    /// Writable palette of a CI8 image
    pub fn palette_mut(&mut self) -> Option<&mut [u32; 256]> {
        match &mut self.data {
            PixelData::Ci8 { palette, .. } => Some(palette),
            PixelData::Argb32(_) => None,
        }
    }

    /// First fully transparent palette index, if any
    pub fn transparent_index(&self) -> Option<u8> {
        match &self.data {
            PixelData::Ci8 { transparent_idx, .. } => *transparent_idx,
            PixelData::Argb32(_) => None,
        }
    }

    pub fn set_transparent_index(&mut self, idx: Option<u8>) {
        if let PixelData::Ci8 { transparent_idx, .. } = &mut self.data {
            *transparent_idx = idx;
        }
    }

    /// Resolved ARGB32 value at (x, y). CI8 indices resolve through the
    /// palette. Returns `None` out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        match &self.data {
            PixelData::Argb32(pixels) => {
                let row = self.stride / 4;
                Some(pixels[y as usize * row + x as usize])
            }
            PixelData::Ci8 {
                indices, palette, ..
            } => {
                let idx = indices[y as usize * self.stride + x as usize];
                Some(palette[idx as usize])
            }
        }
    }

    /// Return a new image with rows and/or columns reversed.
    pub fn flip(&self, op: FlipOp) -> Result<TextureImage> {
        let mut out = TextureImage::new(self.width, self.height, self.format())?;
        if let (Some(dst), Some(src)) = (out.palette_mut(), self.palette()) {
            dst.copy_from_slice(src);
        }
        out.set_transparent_index(self.transparent_index());

        let w = self.width as usize;
        for y in 0..self.height {
            let src_y = if op.vertical() { self.height - 1 - y } else { y };
            match self.format() {
                PixelLayout::Argb32 => {
                    let src: Vec<u32> = {
                        let row = &self.scanline_argb(src_y)?[..w];
                        if op.horizontal() {
                            row.iter().rev().copied().collect()
                        } else {
                            row.to_vec()
                        }
                    };
                    out.scanline_argb_mut(y)?[..w].copy_from_slice(&src);
                }
                PixelLayout::Ci8 => {
                    let src: Vec<u8> = {
                        let row = &self.scanline_ci8(src_y)?[..w];
                        if op.horizontal() {
                            row.iter().rev().copied().collect()
                        } else {
                            row.to_vec()
                        }
                    };
                    out.scanline_ci8_mut(y)?[..w].copy_from_slice(&src);
                }
            }
        }
        Ok(out)
    }

    /// Produce a new ARGB32 image. For a CI8 image, every index is expanded
    /// through the palette; an ARGB32 image is copied as-is.
    pub fn to_argb32(&self) -> Result<TextureImage> {
        let mut out = TextureImage::new(self.width, self.height, PixelLayout::Argb32)?;
        let w = self.width as usize;
        for y in 0..self.height {
            match &self.data {
                PixelData::Argb32(_) => {
                    let src: Vec<u32> = self.scanline_argb(y)?[..w].to_vec();
                    out.scanline_argb_mut(y)?[..w].copy_from_slice(&src);
                }
                PixelData::Ci8 { .. } => {
                    let palette = *self.palette().expect("CI8 image has a palette");
                    let src: Vec<u32> = self.scanline_ci8(y)?[..w]
                        .iter()
                        .map(|&idx| palette[idx as usize])
                        .collect();
                    out.scanline_argb_mut(y)?[..w].copy_from_slice(&src);
                }
            }
        }
        Ok(out)
    }

    /// Convert premultiplied alpha to straight alpha, in place.
    /// No-op for CI8 images.
    pub fn un_premultiply(&mut self) {
        let w = self.width as usize;
        let row = self.stride / 4;
        if let PixelData::Argb32(pixels) = &mut self.data {
            for y in 0..self.height as usize {
                for px in &mut pixels[y * row..y * row + w] {
                    let a = *px >> 24;
                    if a == 0 {
                        *px = 0;
                        continue;
                    }
                    if a == 0xFF {
                        continue;
                    }
                    let r = ((*px >> 16) & 0xFF) * 0xFF / a;
                    let g = ((*px >> 8) & 0xFF) * 0xFF / a;
                    let b = (*px & 0xFF) * 0xFF / a;
                    *px = (a << 24) | (r.min(0xFF) << 16) | (g.min(0xFF) << 8) | b.min(0xFF);
                }
            }
        }
    }

    /// Replace every pixel equal to `key` with fully transparent black,
    /// in place. No-op for CI8 images.
    pub fn apply_chroma_key(&mut self, key: u32) {
        let w = self.width as usize;
        let row = self.stride / 4;
        if let PixelData::Argb32(pixels) = &mut self.data {
            for y in 0..self.height as usize {
                for px in &mut pixels[y * row..y * row + w] {
                    if *px == key {
                        *px = 0;
                    }
                }
            }
        }
    }

    /// Convert to an `image::RgbaImage` for interchange/export.
    pub fn to_rgba_image(&self) -> Result<image::RgbaImage> {
        let argb = match self.format() {
            PixelLayout::Argb32 => None,
            PixelLayout::Ci8 => Some(self.to_argb32()?),
        };
        let src = argb.as_ref().unwrap_or(self);

        let mut rgba = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            for &px in &src.scanline_argb(y)?[..self.width as usize] {
                rgba.push(((px >> 16) & 0xFF) as u8); // R
                rgba.push(((px >> 8) & 0xFF) as u8); // G
                rgba.push((px & 0xFF) as u8); // B
                rgba.push((px >> 24) as u8); // A
            }
        }

        image::RgbaImage::from_raw(self.width, self.height, rgba)
            .ok_or(TextureError::BufferOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_bounds() {
        assert!(TextureImage::new(0, 4, PixelLayout::Argb32).is_err());
        assert!(TextureImage::new(4, 0, PixelLayout::Argb32).is_err());
        assert!(TextureImage::new(MAX_DIMENSION + 1, 4, PixelLayout::Argb32).is_err());
        assert!(TextureImage::new(MAX_DIMENSION, 1, PixelLayout::Argb32).is_ok());
    }

    #[test]
    fn test_stride_alignment() {
        let img = TextureImage::new(3, 2, PixelLayout::Argb32).unwrap();
        assert_eq!(img.stride(), 16); // 12 bytes rounded up
        let img = TextureImage::new(5, 2, PixelLayout::Ci8).unwrap();
        assert_eq!(img.stride(), 16);
    }

    #[test]
    fn test_scanline_bounds() {
        let mut img = TextureImage::new(4, 4, PixelLayout::Argb32).unwrap();
        assert!(img.scanline_argb(3).is_ok());
        assert!(img.scanline_argb(4).is_err());
        assert!(img.scanline_argb_mut(4).is_err());
        // Wrong-layout access fails too.
        assert!(img.scanline_ci8(0).is_err());
    }

    #[test]
    fn test_flip_vertical() {
        let mut img = TextureImage::new(2, 2, PixelLayout::Argb32).unwrap();
        img.scanline_argb_mut(0).unwrap()[..2].copy_from_slice(&[1, 2]);
        img.scanline_argb_mut(1).unwrap()[..2].copy_from_slice(&[3, 4]);

        let flipped = img.flip(FlipOp::Vertical).unwrap();
        assert_eq!(&flipped.scanline_argb(0).unwrap()[..2], &[3, 4]);
        assert_eq!(&flipped.scanline_argb(1).unwrap()[..2], &[1, 2]);
    }

    #[test]
    fn test_flip_horizontal() {
        let mut img = TextureImage::new(3, 1, PixelLayout::Argb32).unwrap();
        img.scanline_argb_mut(0).unwrap()[..3].copy_from_slice(&[1, 2, 3]);
        let flipped = img.flip(FlipOp::Horizontal).unwrap();
        assert_eq!(&flipped.scanline_argb(0).unwrap()[..3], &[3, 2, 1]);
    }

    #[test]
    fn test_flip_combine() {
        assert_eq!(FlipOp::Vertical.combine(FlipOp::Vertical), FlipOp::None);
        assert_eq!(
            FlipOp::Vertical.combine(FlipOp::Horizontal),
            FlipOp::Both
        );
    }

    #[test]
    fn test_ci8_expansion() {
        let mut img = TextureImage::new(2, 2, PixelLayout::Ci8).unwrap();
        img.palette_mut().unwrap()[0] = 0xFF112233;
        img.palette_mut().unwrap()[1] = 0xFF445566;
        img.scanline_ci8_mut(0).unwrap()[..2].copy_from_slice(&[0, 1]);
        img.scanline_ci8_mut(1).unwrap()[..2].copy_from_slice(&[0, 1]);

        let argb = img.to_argb32().unwrap();
        assert_eq!(argb.pixel(0, 0), Some(0xFF112233));
        assert_eq!(argb.pixel(1, 0), Some(0xFF445566));
        assert_eq!(argb.pixel(0, 1), Some(0xFF112233));
        assert_eq!(argb.pixel(1, 1), Some(0xFF445566));
    }

    #[test]
    fn test_un_premultiply() {
        let mut img = TextureImage::new(1, 1, PixelLayout::Argb32).unwrap();
        // 50% alpha, channels premultiplied to half intensity.
        img.scanline_argb_mut(0).unwrap()[0] = 0x80404040;
        img.un_premultiply();
        let px = img.pixel(0, 0).unwrap();
        assert_eq!(px >> 24, 0x80);
        let r = (px >> 16) & 0xFF;
        assert!((0x7E..=0x82).contains(&r), "r = {r:#x}");
    }

    #[test]
    fn test_rgba_export_channel_order() {
        let mut img = TextureImage::new(1, 1, PixelLayout::Argb32).unwrap();
        img.scanline_argb_mut(0).unwrap()[0] = 0x80112233;
        let rgba = img.to_rgba_image().unwrap();
        assert_eq!(rgba.get_pixel(0, 0).0, [0x11, 0x22, 0x33, 0x80]);
    }
}
