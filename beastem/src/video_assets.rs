//! Startup asset loaders for the video coprocessor (§4.8): text-format
//! register and palette dumps, and a raw binary initial VRAM image.
//!
//! The register/palette file formats are simple hex-per-line text, matching
//! what the coprocessor's own register/palette dump tooling produces.

use std::fs;
use std::path::Path;

use crate::error::BeastError;
use crate::video::{VideoCoprocessor, PALETTE_LENGTH, REGISTERS_LENGTH, VIDEO_RAM_LENGTH};

fn parse_hex_line(file: &str, line_no: usize, line: &str, radix: &str) -> Result<u32, BeastError> {
    u32::from_str_radix(line.trim(), 16).map_err(|_| BeastError::VideoAsset {
        file: file.to_string(),
        reason: format!("line {line_no}: '{line}' is not a valid hex {radix}"),
    })
}

/// Registers are listed highest-index-first: the last non-blank,
/// non-comment line in the file lands in register 0.
pub fn load_registers(path: impl AsRef<Path>, video: &mut VideoCoprocessor) -> Result<usize, BeastError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let file = path.to_string_lossy().into_owned();

    let mut idx = REGISTERS_LENGTH - 1;
    let mut count = 0;
    for (line_no, line) in text.lines().enumerate() {
        if line.is_empty() || line.starts_with('-') {
            continue;
        }
        if count >= REGISTERS_LENGTH {
            log::warn!("video: register file '{file}' has more entries than REGISTERS_LENGTH");
            break;
        }
        let value = parse_hex_line(&file, line_no + 1, line, "register value")?;
        video.registers_mut()[idx] = value as u8;
        if idx > 0 {
            idx -= 1;
        }
        count += 1;
    }
    Ok(count)
}

pub fn load_palette(path: impl AsRef<Path>, video: &mut VideoCoprocessor, palette: usize) -> Result<usize, BeastError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let file = path.to_string_lossy().into_owned();

    let mut count = 0;
    for (line_no, line) in text.lines().enumerate() {
        if count >= PALETTE_LENGTH {
            log::warn!("video: palette file '{file}' exceeds PALETTE_LENGTH");
            break;
        }
        let colour555 = parse_hex_line(&file, line_no + 1, line, "RGB555 colour")?;
        video.set_palette_entry(palette, count, colour555 as u16);
        count += 1;
    }
    Ok(count)
}

pub fn load_vram_image(path: impl AsRef<Path>, video: &mut VideoCoprocessor) -> Result<usize, BeastError> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    if data.len() > VIDEO_RAM_LENGTH {
        return Err(BeastError::BinaryTooLarge {
            file: path.to_string_lossy().into_owned(),
            destination: "Video RAM".into(),
            space: VIDEO_RAM_LENGTH,
            actual: data.len(),
        });
    }
    video.mem_mut()[..data.len()].copy_from_slice(&data);
    Ok(data.len())
}
