//! Container parsers
//!
//! One submodule per texture file format. Every parser follows the same
//! contract: `open` reads and validates the header against the actual source
//! size (failing closed on any inconsistency), accessors never re-validate
//! the cached header but still bounds-check per-call inputs, and decoded
//! mipmap levels are cached for the life of the container.
//!
//! [`TextureContainer`] is a closed enum over the supported formats, so the
//! set is exhaustively matchable in tests and the factory.

pub mod dds;
pub mod didj;
pub mod ktx;
pub mod ktx2;
pub mod pvr3;
pub mod stex;
pub mod tga;
pub mod vtf;
pub mod vtf3;

use crate::error::Result;
use crate::image::TextureImage;
use serde::{Deserialize, Serialize};

/// Serializable metadata snapshot of an opened container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureInfo {
    /// Container format name, e.g. "DirectDraw Surface"
    pub texture_format: String,
    /// Pixel format name, e.g. "DXT1" or "8bpp with RGB888 palette".
    /// Diagnostics only; decoding never consults it.
    pub pixel_format: Option<String>,
    pub width: u32,
    pub height: u32,
    pub mipmap_count: u32,
    /// Pixel data is stored with premultiplied alpha
    pub premultiplied_alpha: bool,
}

/// An opened texture container of any supported format
pub enum TextureContainer {
    Dds(dds::DdsFile),
    Ktx(ktx::KtxFile),
    Ktx2(ktx2::Ktx2File),
    Pvr3(pvr3::Pvr3File),
    Vtf(vtf::VtfFile),
    Vtf3(vtf3::Vtf3File),
    Tga(tga::TgaFile),
    Stex(stex::StexFile),
    Didj(didj::DidjFile),
}

macro_rules! dispatch {
    ($self:ident, $c:ident => $body:expr) => {
        match $self {
            TextureContainer::Dds($c) => $body,
            TextureContainer::Ktx($c) => $body,
            TextureContainer::Ktx2($c) => $body,
            TextureContainer::Pvr3($c) => $body,
            TextureContainer::Vtf($c) => $body,
            TextureContainer::Vtf3($c) => $body,
            TextureContainer::Tga($c) => $body,
            TextureContainer::Stex($c) => $body,
            TextureContainer::Didj($c) => $body,
        }
    };
}

impl TextureContainer {
    /// Container format name
    pub fn texture_format_name(&self) -> &'static str {
        dispatch!(self, c => c.texture_format_name())
    }

    /// Human-readable pixel format tag, for diagnostics/metadata only
    pub fn pixel_format_name(&self) -> Option<String> {
        dispatch!(self, c => c.pixel_format_name())
    }

    /// Logical (width, height) of the main image
    pub fn dimensions(&self) -> (u32, u32) {
        dispatch!(self, c => c.dimensions())
    }

    /// Number of stored mipmap levels, including the main image.
    /// 1 for formats without mipmap support.
    pub fn mipmap_count(&self) -> u32 {
        dispatch!(self, c => c.mipmap_count())
    }

    /// Decode (or fetch from cache) the main image. Identical to
    /// `mipmap(0)`.
    pub fn image(&mut self) -> Result<&TextureImage> {
        self.mipmap(0)
    }

    /// Decode (or fetch from cache) the given mipmap level.
    /// Level 0 is the largest image.
    pub fn mipmap(&mut self, level: u32) -> Result<&TextureImage> {
        dispatch!(self, c => c.mipmap(level))
    }

    /// Metadata snapshot for the consumer layer
    pub fn info(&self) -> TextureInfo {
        TextureInfo {
            texture_format: self.texture_format_name().to_string(),
            pixel_format: self.pixel_format_name(),
            width: self.dimensions().0,
            height: self.dimensions().1,
            mipmap_count: self.mipmap_count(),
            premultiplied_alpha: dispatch!(self, c => c.premultiplied_alpha()),
        }
    }
}

/// Per-level decoded image cache used by every container.
///
/// Lazily filled on first access; this is why a single container instance
/// is not shareable across threads without external locking.
pub(crate) struct MipmapCache {
    levels: Vec<Option<TextureImage>>,
}

impl MipmapCache {
    pub fn new(count: usize) -> Self {
        let mut levels = Vec::with_capacity(count);
        levels.resize_with(count, || None);
        Self { levels }
    }

    pub fn contains(&self, level: usize) -> bool {
        self.levels.get(level).is_some_and(|l| l.is_some())
    }

    pub fn get(&self, level: usize) -> Option<&TextureImage> {
        self.levels.get(level).and_then(|l| l.as_ref())
    }

    pub fn insert(&mut self, level: usize, img: TextureImage) -> &TextureImage {
        self.levels[level] = Some(img);
        self.levels[level].as_ref().unwrap()
    }
}
