//! Texture file CLI
//!
//! Command-line interface for inspecting texture containers and exporting
//! their decoded images.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use texfile::factory;

#[derive(Parser)]
#[command(name = "texfile")]
#[command(about = "Inspect and export texture files (DDS, KTX, PVR, VTF, TGA, STEX, ...)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print container metadata for a texture file
    Info {
        /// Input texture file path
        input: PathBuf,
    },

    /// Decode a texture and export it as PNG/BMP
    Export {
        /// Input texture file path
        input: PathBuf,

        /// Output image path (extension selects the format)
        #[arg(short, long)]
        output: PathBuf,

        /// Mipmap level to export (0 = largest)
        #[arg(short, long, default_value_t = 0)]
        mip: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => info_command(input),
        Commands::Export { input, output, mip } => export_command(input, output, mip),
    }
}

fn info_command(input: PathBuf) -> Result<()> {
    let mut container = factory::open_path(&input)
        .with_context(|| format!("failed to open {}", input.display()))?;
    let info = container.info();

    println!("File:          {}", input.display());
    println!("Format:        {}", info.texture_format);
    if let Some(pixel_format) = &info.pixel_format {
        println!("Pixel format:  {pixel_format}");
    }
    println!("Dimensions:    {}x{}", info.width, info.height);
    println!("Mipmap levels: {}", info.mipmap_count);
    if info.premultiplied_alpha {
        println!("Alpha:         premultiplied");
    }

    // Format-specific extras.
    if let texfile::TextureContainer::Tga(tga) = &container {
        if let Some(ext) = tga.ext_area() {
            if !ext.author_name.is_empty() {
                println!("Author:        {}", ext.author_name);
            }
            if !ext.software_id.is_empty() {
                println!("Software:      {}", ext.software_id);
            }
            let (year, month, day, hour, minute, second) = ext.timestamp;
            if year != 0 {
                println!(
                    "Saved:         {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
                );
            }
            if ext.gamma.1 != 0 {
                println!("Gamma:         {}/{}", ext.gamma.0, ext.gamma.1);
            }
        }
    }
    if let texfile::TextureContainer::Stex(stex) = &container {
        if let Some((w, h)) = stex.rescale_dimensions() {
            println!("Rescaled to:   {w}x{h}");
        }
    }

    Ok(())
}

fn export_command(input: PathBuf, output: PathBuf, mip: u32) -> Result<()> {
    let mut container = factory::open_path(&input)
        .with_context(|| format!("failed to open {}", input.display()))?;

    let image = container
        .mipmap(mip)
        .with_context(|| format!("failed to decode mipmap {mip}"))?;
    let rgba = image.to_rgba_image().context("failed to convert image")?;

    let format = match output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("bmp") => image::ImageFormat::Bmp,
        // Default to PNG for unknown extensions.
        _ => image::ImageFormat::Png,
    };
    rgba.save_with_format(&output, format)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Exported {}x{} image to {}",
        rgba.width(),
        rgba.height(),
        output.display()
    );
    Ok(())
}
