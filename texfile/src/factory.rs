//! Container format sniffing and dispatch
//!
//! Reads a fixed 32-byte header window (large enough to cover every
//! supported format's magic location, including the KTX identifier whose
//! first four bytes are shared between KTX 1.1 and KTX 2.0) and instantiates
//! exactly one container parser. A magic match is not trusted on its own:
//! the candidate is opened and validated, and on failure the scan continues
//! with the next table entry.

use crate::container::{dds, didj, ktx, ktx2, pvr3, stex, tga, vtf, vtf3, TextureContainer};
use crate::error::{Result, TextureError};
use crate::source::ByteSource;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

const SNIFF_WINDOW: usize = 32;

/// Formats with a 32-bit magic number at offset 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MagicFormat {
    Dds,
    Stex,
    Pvr3,
    Vtf,
    Vtf3,
    Didj,
}

/// (magic bytes, format). Multiple entries may share a format; the first
/// entry that both matches and validates wins.
const MAGIC_TABLE: &[([u8; 4], MagicFormat)] = &[
    (dds::DDS_MAGIC, MagicFormat::Dds),
    (stex::STEX3_MAGIC, MagicFormat::Stex),
    (stex::STEX4_MAGIC, MagicFormat::Stex),
    (pvr3::PVR3_MAGIC, MagicFormat::Pvr3),
    (pvr3::PVR3_MAGIC_SWAPPED, MagicFormat::Pvr3),
    (vtf::VTF_MAGIC, MagicFormat::Vtf),
    (vtf3::VTF3_MAGIC, MagicFormat::Vtf3),
    // Less common formats.
    ([0x03, 0x00, 0x00, 0x00], MagicFormat::Didj),
];

/// Shared handle that lets the factory hand the same source to several
/// open attempts in sequence. Single-threaded by design, like the rest of
/// the engine.
struct SharedSource(Rc<RefCell<Box<dyn ByteSource>>>);

impl ByteSource for SharedSource {
    fn size(&mut self) -> Result<u64> {
        self.0.borrow_mut().size()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.0.borrow_mut().read_at(offset, buf)
    }
}

impl SharedSource {
    fn handle(rc: &Rc<RefCell<Box<dyn ByteSource>>>) -> Box<dyn ByteSource> {
        Box::new(SharedSource(Rc::clone(rc)))
    }
}

/// Open a texture file from a path, sniffing the format.
pub fn open_path<P: AsRef<Path>>(path: P) -> Result<TextureContainer> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;

    // ".tga.gz" needs the compound extension for the TGA heuristic.
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let ext = if name.ends_with(".tga.gz") {
        Some("tga.gz".to_string())
    } else {
        path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase())
    };

    open(Box::new(file), ext.as_deref())
}

/// Open a texture from any seekable byte source.
///
/// `extension` is the lowercased file extension without the leading dot, if
/// one is known; it gates the TGA heuristic and the Didj `.texs` variant.
pub fn open(source: Box<dyn ByteSource>, extension: Option<&str>) -> Result<TextureContainer> {
    let rc = Rc::new(RefCell::new(source));

    let mut window = [0u8; SNIFF_WINDOW];
    let n = rc.borrow_mut().read_at(0, &mut window)?;
    if n < 4 {
        return Err(TextureError::UnsupportedFormat);
    }

    // KTX and KTX2 share the first four magic bytes; the version suffix in
    // the identifier picks the parser.
    if window[0..4] == ktx::KTX_IDENTIFIER[0..4] {
        if ktx::is_supported(&window[..n]) {
            if let Ok(f) = ktx::KtxFile::open(SharedSource::handle(&rc)) {
                return Ok(TextureContainer::Ktx(f));
            }
        } else if ktx2::is_supported(&window[..n]) {
            if let Ok(f) = ktx2::Ktx2File::open(SharedSource::handle(&rc)) {
                return Ok(TextureContainer::Ktx2(f));
            }
        }
    }

    // TGA has no magic; heuristics plus the extension gate run before the
    // magic table.
    if n >= 18 && tga::looks_like_tga(&window[..n], extension) {
        if let Ok(f) = tga::TgaFile::open(SharedSource::handle(&rc)) {
            return Ok(TextureContainer::Tga(f));
        }
    }

    // Formats with a magic number at offset 0. A failed validation falls
    // through to later entries.
    let magic: [u8; 4] = window[0..4].try_into().unwrap();
    for &(table_magic, format) in MAGIC_TABLE {
        if magic != table_magic {
            continue;
        }
        let src = SharedSource::handle(&rc);
        let opened = match format {
            MagicFormat::Dds => dds::DdsFile::open(src).map(TextureContainer::Dds),
            MagicFormat::Stex => stex::StexFile::open(src).map(TextureContainer::Stex),
            MagicFormat::Pvr3 => pvr3::Pvr3File::open(src).map(TextureContainer::Pvr3),
            MagicFormat::Vtf => vtf::VtfFile::open(src).map(TextureContainer::Vtf),
            MagicFormat::Vtf3 => vtf3::Vtf3File::open(src).map(TextureContainer::Vtf3),
            MagicFormat::Didj => {
                let is_texs = extension == Some("texs");
                didj::DidjFile::open(src, is_texs).map(TextureContainer::Didj)
            }
        };
        if let Ok(container) = opened {
            return Ok(container);
        }
    }

    Err(TextureError::UnsupportedFormat)
}

/// All file extensions any supported container may use, without the dot.
pub fn supported_extensions() -> &'static [&'static str] {
    &[
        "dds", "ktx", "ktx2", "pvr", "vtf", "tga", "stex", "ctex", "tex", "texs",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn mem(data: Vec<u8>) -> Box<dyn ByteSource> {
        Box::new(Cursor::new(data))
    }

    fn minimal_dds() -> Vec<u8> {
        // 4x4 DXT1, built field by field like the DDS unit tests.
        let mut data = Vec::new();
        data.extend_from_slice(b"DDS ");
        data.extend_from_slice(&124u32.to_le_bytes());
        data.extend_from_slice(&0x1007u32.to_le_bytes());
        data.extend_from_slice(&4u32.to_le_bytes()); // height
        data.extend_from_slice(&4u32.to_le_bytes()); // width
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(&1u32.to_le_bytes()); // mipmaps
        data.extend_from_slice(&[0u8; 44]);
        data.extend_from_slice(&32u32.to_le_bytes());
        data.extend_from_slice(&0x4u32.to_le_bytes()); // fourcc flag
        data.extend_from_slice(b"DXT1");
        data.extend_from_slice(&[0u8; 20]);
        data.extend_from_slice(&0x1000u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&[0u8; 8]); // one block
        data
    }

    #[test]
    fn test_dds_dispatch() {
        let container = open(mem(minimal_dds()), Some("dds")).unwrap();
        assert_eq!(container.texture_format_name(), "DirectDraw Surface");
    }

    #[test]
    fn test_dispatch_is_deterministic() {
        // Same bytes, same parser, bit-identical output.
        let mut first = open(mem(minimal_dds()), Some("dds")).unwrap();
        let mut second = open(mem(minimal_dds()), Some("dds")).unwrap();
        assert_eq!(first.texture_format_name(), second.texture_format_name());
        let a = first.image().unwrap();
        let b = second.image().unwrap();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(a.pixel(x, y), b.pixel(x, y));
            }
        }
    }

    #[test]
    fn test_pure_sniffs() {
        assert!(dds::is_supported(b"DDS \0\0\0\0"));
        assert!(!dds::is_supported(b"DDSX\0\0\0\0"));
        assert!(pvr3::is_supported(b"PVR\x03xxxx"));
        assert!(pvr3::is_supported(b"\x03RVPxxxx"));
        assert!(vtf::is_supported(b"VTF\0xxxx"));
        assert!(vtf3::is_supported(b"VTF3xxxx"));
        assert!(stex::is_supported(b"GDSTxxxx"));
        assert!(stex::is_supported(b"GST2xxxx"));
        assert!(didj::is_supported(&[3, 0, 0, 0, 1, 0, 0, 0]));
        assert!(!didj::is_supported(&[3, 0, 0, 0, 2, 0, 0, 0]));
        assert!(ktx::is_supported(&crate::container::ktx::KTX_IDENTIFIER));
        assert!(ktx2::is_supported(&crate::container::ktx2::KTX2_IDENTIFIER));
    }

    #[test]
    fn test_unknown_magic_rejected() {
        let data = vec![0xDEu8, 0xAD, 0xBE, 0xEF, 0, 0, 0, 0];
        assert!(matches!(
            open(mem(data), None),
            Err(TextureError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_tga_requires_extension_match() {
        // A plausible TGA header with a hostile extension isn't TGA.
        let mut data = vec![0u8, 0, 2];
        data.extend_from_slice(&[0, 0, 0, 0, 0]);
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.push(24);
        data.push(0x20);
        data.extend_from_slice(&[1, 2, 3]);
        data.extend_from_slice(&[0u8; 26]);

        assert!(open(mem(data.clone()), Some("bin")).is_err());
        let container = open(mem(data), Some("tga")).unwrap();
        assert_eq!(container.texture_format_name(), "TrueVision TGA");
    }

    #[test]
    fn test_ktx_version_split() {
        // A KTX2 identifier must not be handed to the KTX1 parser: build a
        // tiny KTX2 and check the dispatch.
        let mut data = Vec::new();
        data.extend_from_slice(&crate::container::ktx2::KTX2_IDENTIFIER);
        data.extend_from_slice(&37u32.to_le_bytes()); // vkFormat R8G8B8A8
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes()); // width
        data.extend_from_slice(&1u32.to_le_bytes()); // height
        data.extend_from_slice(&[0u8; 12]); // depth/layers/faces
        data.extend_from_slice(&1u32.to_le_bytes()); // levels
        data.extend_from_slice(&0u32.to_le_bytes()); // supercompression
        data.extend_from_slice(&[0u8; 16]); // dfd/kvd
        data.extend_from_slice(&[0u8; 16]); // sgd
        // level index: offset 104, length 4
        data.extend_from_slice(&104u64.to_le_bytes());
        data.extend_from_slice(&4u64.to_le_bytes());
        data.extend_from_slice(&4u64.to_le_bytes());
        data.extend_from_slice(&[0xFF, 0x00, 0x00, 0xFF]);

        let container = open(mem(data), Some("ktx2")).unwrap();
        assert_eq!(container.texture_format_name(), "Khronos KTX2");
    }

    #[test]
    fn test_vtf3_not_confused_with_vtf() {
        let mut data = Vec::new();
        data.extend_from_slice(b"VTF3");
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(&0u32.to_be_bytes()); // flags: DXT1
        data.extend_from_slice(&4u16.to_be_bytes());
        data.extend_from_slice(&4u16.to_be_bytes());
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(&[0u8; 8]); // one DXT1 block
        let container = open(mem(data), Some("vtf")).unwrap();
        assert_eq!(container.texture_format_name(), "Valve VTF3 (PS3)");
    }
}
