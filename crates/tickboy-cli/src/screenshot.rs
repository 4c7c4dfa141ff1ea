use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use tickboy_core::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Writes a 0x00RRGGBB frame as an 8-bit RGB PNG.
pub fn save_png(path: &Path, frame: &[u32]) -> io::Result<()> {
    if frame.len() != SCREEN_WIDTH * SCREEN_HEIGHT {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame has {} pixels", frame.len()),
        ));
    }

    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(
        BufWriter::new(file),
        SCREEN_WIDTH as u32,
        SCREEN_HEIGHT as u32,
    );
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);

    let data: Vec<u8> = frame
        .iter()
        .flat_map(|&px| {
            let [_, r, g, b] = px.to_be_bytes();
            [r, g, b]
        })
        .collect();

    let mut writer = encoder.write_header().map_err(io::Error::other)?;
    writer.write_image_data(&data).map_err(io::Error::other)?;
    writer.finish().map_err(io::Error::other)
}
