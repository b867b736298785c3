//! End-to-end decode scenarios through the factory.

use std::io::Cursor;
use texfile::decode::{linear, rle, PixelFormat};
use texfile::source::ByteSource;
use texfile::{factory, TextureContainer};

fn mem(data: Vec<u8>) -> Box<dyn ByteSource> {
    Box::new(Cursor::new(data))
}

/// 4x4 DXT1 DDS with a single block.
fn dds_dxt1(block: [u8; 8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"DDS ");
    data.extend_from_slice(&124u32.to_le_bytes());
    data.extend_from_slice(&0x1007u32.to_le_bytes());
    data.extend_from_slice(&4u32.to_le_bytes());
    data.extend_from_slice(&4u32.to_le_bytes());
    data.extend_from_slice(&[0u8; 8]);
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&[0u8; 44]);
    data.extend_from_slice(&32u32.to_le_bytes());
    data.extend_from_slice(&0x4u32.to_le_bytes());
    data.extend_from_slice(b"DXT1");
    data.extend_from_slice(&[0u8; 20]);
    data.extend_from_slice(&0x1000u32.to_le_bytes());
    data.extend_from_slice(&[0u8; 16]);
    data.extend_from_slice(&block);
    data
}

#[test]
fn dxt1_all_black_block_decodes_to_opaque_black() {
    // Both endpoint colors 0x0000, all index bits 0.
    let mut container = factory::open(mem(dds_dxt1([0u8; 8])), Some("dds")).unwrap();
    let img = container.image().unwrap();
    for y in 0..4 {
        for x in 0..4 {
            assert_eq!(img.pixel(x, y), Some(0xFF000000));
        }
    }
}

#[test]
fn rgb565_all_ones_decodes_to_white() {
    // 2x2 of 0xFFFF: every channel replicates to a full 8 bits.
    let buf = [0xFFu8; 8];
    let img = linear::from_linear16(PixelFormat::Rgb565, 2, 2, &buf, 0).unwrap();
    for y in 0..2 {
        for x in 0..2 {
            assert_eq!(img.pixel(x, y), Some(0xFFFFFFFF));
        }
    }
}

fn tga_with_attr_dir(attr_dir: u8) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&[0, 0, 2]); // truecolor
    data.extend_from_slice(&[0, 0, 0, 0, 0]);
    data.extend_from_slice(&[0, 0, 0, 0]);
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&2u16.to_le_bytes());
    data.push(24);
    data.push(attr_dir);
    data.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
    data.extend_from_slice(&[0u8; 26]); // room for a footer, no signature
    data
}

#[test]
fn tga_orientation_defaults() {
    // No footer signature, attribute-direction byte 0x00: origin is assumed
    // bottom-left, so a vertical flip applies.
    let container = factory::open(mem(tga_with_attr_dir(0x00)), Some("tga")).unwrap();
    let TextureContainer::Tga(tga) = &container else {
        panic!("expected TGA dispatch");
    };
    assert_eq!(tga.flip_op(), texfile::FlipOp::Vertical);

    // Y-orientation bit set: no flip at all.
    let container = factory::open(mem(tga_with_attr_dir(0x20)), Some("tga")).unwrap();
    let TextureContainer::Tga(tga) = &container else {
        panic!("expected TGA dispatch");
    };
    assert_eq!(tga.flip_op(), texfile::FlipOp::None);
}

#[test]
fn ci8_two_entry_palette_expansion() {
    // Palette {0xFF112233, 0xFF445566}, indices [0,1,0,1] for a 2x2 image.
    let pal = [
        0x33, 0x22, 0x11, 0xFF, //
        0x66, 0x55, 0x44, 0xFF,
    ];
    let img = linear::from_linear_ci8(PixelFormat::Argb8888, 2, 2, &[0, 1, 0, 1], &pal).unwrap();
    let argb = img.to_argb32().unwrap();
    let expected = [0xFF112233u32, 0xFF445566, 0xFF112233, 0xFF445566];
    let mut actual = Vec::new();
    for y in 0..2 {
        for x in 0..2 {
            actual.push(argb.pixel(x, y).unwrap());
        }
    }
    assert_eq!(actual, expected);
}

#[test]
fn rle_single_run_packet() {
    // Header 0x83 (run of 4), one 24-bit pixel AA BB CC, 12-byte output.
    let stream = hex::decode("83AABBCC").unwrap();
    let out = rle::decompress(12, &stream, 3).unwrap();
    assert_eq!(out, hex::decode("AABBCCAABBCCAABBCCAABBCC").unwrap());
}

#[test]
fn factory_dispatch_is_repeatable() {
    // Repeated opens of the same bytes select the same parser and produce
    // bit-identical output.
    let bytes = dds_dxt1({
        let mut b = [0u8; 8];
        b[0] = 0x00;
        b[1] = 0xF8; // red endpoint
        b
    });
    let mut outputs = Vec::new();
    for _ in 0..3 {
        let mut container = factory::open(mem(bytes.clone()), Some("dds")).unwrap();
        let img = container.image().unwrap();
        let mut pixels = Vec::new();
        for y in 0..4 {
            for x in 0..4 {
                pixels.push(img.pixel(x, y).unwrap());
            }
        }
        outputs.push((container.texture_format_name(), pixels));
    }
    assert!(outputs.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn decoded_image_exports_to_rgba() {
    let mut container = factory::open(mem(dds_dxt1([0u8; 8])), Some("dds")).unwrap();
    let rgba = container.image().unwrap().to_rgba_image().unwrap();
    assert_eq!(rgba.dimensions(), (4, 4));
    assert_eq!(rgba.get_pixel(0, 0).0, [0, 0, 0, 0xFF]);
}

#[test]
fn info_snapshot_matches_accessors() {
    let container = factory::open(mem(dds_dxt1([0u8; 8])), Some("dds")).unwrap();
    let info = container.info();
    assert_eq!(info.texture_format, "DirectDraw Surface");
    assert_eq!(info.pixel_format.as_deref(), Some("DXT1"));
    assert_eq!((info.width, info.height), (4, 4));
    assert_eq!(info.mipmap_count, 1);
    assert!(!info.premultiplied_alpha);
}

#[test]
fn corrupt_header_yields_typed_failure() {
    // A DDS whose header size field is wrong is invalid, not a crash, and
    // not silently misdetected as something else.
    let mut bytes = dds_dxt1([0u8; 8]);
    bytes[4] = 99;
    assert!(factory::open(mem(bytes), Some("dds")).is_err());
}
