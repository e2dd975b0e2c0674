//! Command implementations

pub mod encode;
pub mod params;
pub mod serve;

use anyhow::{bail, Context, Result};
use dcpenc_core::{ColourLut, Config, Image, Size};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, trace};

/// Loads the configuration file, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Reads an 8-bit PNG as an RGB24 image.
///
/// Palette, 16-bit and grey images are expanded to 8-bit RGB; alpha is
/// dropped.
pub fn load_png(path: &Path) -> Result<Image> {
    trace!(path = %path.display(), "load_png");
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut decoder = png::Decoder::new(BufReader::new(file));
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder
        .read_info()
        .with_context(|| format!("Failed to read PNG header of {}", path.display()))?;

    let buf_size = reader
        .output_buffer_size()
        .context("Cannot determine PNG output buffer size")?;
    let mut buf = vec![0u8; buf_size];
    let info = reader
        .next_frame(&mut buf)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    let pixels = &buf[..info.buffer_size()];

    let rgb: Vec<u8> = match info.color_type {
        png::ColorType::Rgb => pixels.to_vec(),
        png::ColorType::Rgba => pixels.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect(),
        png::ColorType::Grayscale => pixels.iter().flat_map(|&g| [g, g, g]).collect(),
        png::ColorType::GrayscaleAlpha => pixels.chunks_exact(2).flat_map(|p| [p[0], p[0], p[0]]).collect(),
        other => bail!("Unsupported PNG colour type {other:?} in {}", path.display()),
    };

    let size = Size::new(info.width, info.height);
    debug!(path = %path.display(), %size, color = ?info.color_type, "loaded PNG");
    Ok(Image::from_rgb24(size, rgb)?)
}

/// Parses a colour profile given as a name or a LUT index.
pub fn parse_lut(s: &str) -> Result<ColourLut> {
    let lut = match s.to_ascii_lowercase().as_str() {
        "srgb" => ColourLut::Srgb,
        "rec709" | "rec.709" | "bt709" => ColourLut::Rec709,
        other => {
            let index: usize = other
                .parse()
                .with_context(|| format!("Unknown colour profile '{s}'"))?;
            ColourLut::from_index(index)?
        }
    };
    Ok(lut)
}
