//! Texture container parser and decoder
//!
//! This crate parses binary texture containers and raster-decodes their
//! payloads into a uniform in-memory image. Input is always treated as
//! untrusted: every offset and length derived from a header field is
//! validated against the actual source size before it is read, and a file
//! that cannot be fully validated is rejected at open time.
//!
//! # Supported containers
//!
//! - DirectDraw Surface (`.dds`), including the DX10 extension header
//! - Khronos KTX 1.1 and KTX 2.0 (`.ktx`, `.ktx2`)
//! - PowerVR 3.0.0 (`.pvr`), both byte orders
//! - Valve VTF 7.x (`.vtf`) and VTF3 for PS3
//! - TrueVision TGA 1.0/2.0 (`.tga`), detected by header heuristics
//! - Godot STEX3/STEX4 (`.stex`, `.ctex`), including embedded PNG payloads
//! - Leapster Didj (`.tex`, `.texs`), zlib-compressed
//!
//! # Example
//!
//! ```rust,no_run
//! use texfile::factory;
//!
//! let mut container = factory::open_path("example.dds")?;
//! println!("{}: {:?}", container.texture_format_name(), container.dimensions());
//!
//! let image = container.image()?;
//! let rgba = image.to_rgba_image()?;
//! # Ok::<(), texfile::TextureError>(())
//! ```
//!
//! # Concurrency
//!
//! The engine is single-threaded and synchronous. A container instance
//! lazily caches decoded mipmap levels through `&mut self`, so one instance
//! cannot be shared across threads; independent instances need no
//! coordination.

pub mod container;
pub mod decode;
pub mod error;
pub mod factory;
pub mod image;
pub mod reader;
pub mod source;

// Re-export main types for easy access
pub use container::{TextureContainer, TextureInfo};
pub use error::{Result, TextureError};
pub use image::{FlipOp, PixelLayout, TextureImage, MAX_DIMENSION};
pub use reader::{BinaryReader, ByteOrder};
pub use source::ByteSource;

#[cfg(test)]
mod tests {
    #[test]
    fn test_reexports_are_wired() {
        // Compile-time smoke test for the public surface.
        fn assert_send<T: Send>() {}
        assert_send::<crate::TextureError>();
        let _ = crate::MAX_DIMENSION;
    }
}
