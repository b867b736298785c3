//! Raster decoders
//!
//! Container parsers locate a payload and hand it to one of these decoders:
//! - `linear` — packed-pixel rows (8/16/24/32-bit layouts) and CI4/CI8
//!   palette-indexed buffers
//! - `s3tc` — DXT1/2/3/5 and BC4/BC5 fixed 4x4 block codecs
//! - `rle` — TGA-style packet run-length decompression
//!
//! All decoders produce a [`crate::image::TextureImage`] or fail without
//! writing a partial result.

pub mod linear;
pub mod pixel;
pub mod rle;
pub mod s3tc;

/// Source pixel layout for the linear converters.
///
/// Named by logical channel order, most significant first, of the packed
/// value after byte-order normalization. For example `Argb4444` is
/// `AAAARRRR GGGGBBBB` as a 16-bit value, and `Xrgb8888` is a 32-bit value
/// whose low 24 bits are RGB with an ignored top byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    // 16-bit RGB
    Rgb565,
    Bgr565,
    Rgb555,
    Bgr555,
    Argb1555,
    Abgr1555,
    Rgba5551,
    Bgra5551,
    Argb4444,
    Abgr4444,
    Rgba4444,
    Bgra4444,
    Xrgb4444,
    Argb8332,
    // 16-bit two-channel
    Rg88,
    Gr88,
    Ia8,
    A8L8,
    L8A8,
    L16,
    // 8-bit
    L8,
    A8,
    R8,
    A4L4,
    Rgb332,
    // 24-bit
    Rgb888,
    Bgr888,
    // 32-bit
    Argb8888,
    Abgr8888,
    Xrgb8888,
    Xbgr8888,
    Rgba8888,
    Rabg8888,
    G16R16,
    A2R10G10B10,
    A2B10G10R10,
}

impl PixelFormat {
    /// Bytes per packed source pixel
    pub fn bytes_per_pixel(self) -> usize {
        use PixelFormat::*;
        match self {
            L8 | A8 | R8 | A4L4 | Rgb332 => 1,
            Rgb565 | Bgr565 | Rgb555 | Bgr555 | Argb1555 | Abgr1555 | Rgba5551 | Bgra5551
            | Argb4444 | Abgr4444 | Rgba4444 | Bgra4444 | Xrgb4444 | Argb8332 | Rg88 | Gr88
            | Ia8 | A8L8 | L8A8 | L16 => 2,
            Rgb888 | Bgr888 => 3,
            Argb8888 | Abgr8888 | Xrgb8888 | Xbgr8888 | Rgba8888 | Rabg8888 | G16R16
            | A2R10G10B10 | A2B10G10R10 => 4,
        }
    }

    /// Human-readable name, used for diagnostics only
    pub fn name(self) -> &'static str {
        use PixelFormat::*;
        match self {
            Rgb565 => "RGB565",
            Bgr565 => "BGR565",
            Rgb555 => "RGB555",
            Bgr555 => "BGR555",
            Argb1555 => "ARGB1555",
            Abgr1555 => "ABGR1555",
            Rgba5551 => "RGBA5551",
            Bgra5551 => "BGRA5551",
            Argb4444 => "ARGB4444",
            Abgr4444 => "ABGR4444",
            Rgba4444 => "RGBA4444",
            Bgra4444 => "BGRA4444",
            Xrgb4444 => "xRGB4444",
            Argb8332 => "ARGB8332",
            Rg88 => "RG88",
            Gr88 => "GR88",
            Ia8 => "IA8",
            A8L8 => "A8L8",
            L8A8 => "L8A8",
            L16 => "L16",
            L8 => "L8",
            A8 => "A8",
            R8 => "R8",
            A4L4 => "A4L4",
            Rgb332 => "RGB332",
            Rgb888 => "RGB888",
            Bgr888 => "BGR888",
            Argb8888 => "ARGB8888",
            Abgr8888 => "ABGR8888",
            Xrgb8888 => "xRGB8888",
            Xbgr8888 => "xBGR8888",
            Rgba8888 => "RGBA8888",
            Rabg8888 => "RABG8888",
            G16R16 => "G16R16",
            A2R10G10B10 => "A2R10G10B10",
            A2B10G10R10 => "A2B10G10R10",
        }
    }
}
