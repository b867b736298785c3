//! CLI integration tests: run the built binary against generated fixtures.

use std::process::Command;

fn texfile_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_texfile"))
}

/// 4x4 DXT1 DDS with one all-black block.
fn dds_dxt1() -> Vec<u8> {
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
fn info_prints_format_and_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("block.dds");
    std::fs::write(&path, dds_dxt1()).unwrap();

    let output = texfile_bin().arg("info").arg(&path).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("DirectDraw Surface"));
    assert!(stdout.contains("DXT1"));
    assert!(stdout.contains("4x4"));
}

#[test]
fn export_writes_png() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("block.dds");
    let out_path = dir.path().join("block.png");
    std::fs::write(&input, dds_dxt1()).unwrap();

    let output = texfile_bin()
        .arg("export")
        .arg(&input)
        .arg("--output")
        .arg(&out_path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let png = image::open(&out_path).unwrap().to_rgba8();
    assert_eq!(png.dimensions(), (4, 4));
    assert_eq!(png.get_pixel(0, 0).0, [0, 0, 0, 0xFF]);
}

#[test]
fn unrecognized_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.bin");
    std::fs::write(&path, [0u8; 64]).unwrap();

    let output = texfile_bin().arg("info").arg(&path).output().unwrap();
    assert!(!output.status.success());
}
