//! Thumbnails and dominant-color palettes.
//!
//! Both are CPU bound; async callers run them through `spawn_blocking`.

use std::collections::HashMap;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageError, Rgb, RgbImage};
use tracing::warn;

/// Thumbnails are square canvases of this size
pub const THUMBNAIL_SIZE: u32 = 300;

const THUMBNAIL_QUALITY: u8 = 85;

/// Palette extraction works on a bicubic-resampled copy of this size
const PALETTE_SAMPLE_SIZE: u32 = 150;

pub const PALETTE_SIZE: usize = 3;

/// Used to pad palettes of images without enough mid-brightness colors
const FALLBACK_COLORS: [&str; PALETTE_SIZE] = ["#808080", "#ffffff", "#000000"];

/// Shrink to fit (never enlarge) a white square canvas, centred, and encode as JPEG
pub fn create_thumbnail(bytes: &[u8]) -> Result<Vec<u8>, ImageError> {
    let image = image::load_from_memory(bytes)?;
    let fitted = if image.width() > THUMBNAIL_SIZE || image.height() > THUMBNAIL_SIZE {
        image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE).to_rgb8()
    } else {
        image.to_rgb8()
    };

    let mut canvas = RgbImage::from_pixel(THUMBNAIL_SIZE, THUMBNAIL_SIZE, Rgb([255, 255, 255]));
    let x = (THUMBNAIL_SIZE - fitted.width()) / 2;
    let y = (THUMBNAIL_SIZE - fitted.height()) / 2;
    imageops::overlay(&mut canvas, &fitted, x as i64, y as i64);

    let mut output = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut output, THUMBNAIL_QUALITY).encode_image(&canvas)?;

    Ok(output.into_inner())
}

/// Most frequent colors with mean brightness in (30, 220), as lowercase hex.
///
/// Always returns exactly [`PALETTE_SIZE`] colors; undecodable input yields
/// the fallback palette.
pub fn extract_colors(bytes: &[u8]) -> Vec<String> {
    let image = match image::load_from_memory(bytes) {
        Ok(image) => image,
        Err(err) => {
            warn!("Color extraction failed, using fallback palette: {}", err);
            return pad_palette(Vec::new());
        }
    };

    let sample = image
        .resize_exact(PALETTE_SAMPLE_SIZE, PALETTE_SAMPLE_SIZE, FilterType::CatmullRom)
        .to_rgb8();

    let mut counts: HashMap<[u8; 3], usize> = HashMap::new();
    for pixel in sample.pixels() {
        *counts.entry(pixel.0).or_insert(0) += 1;
    }

    let mut ranked: Vec<([u8; 3], usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let colors = ranked
        .into_iter()
        .take(PALETTE_SIZE * 3)
        .filter(|(rgb, _)| {
            let brightness = rgb.iter().map(|c| *c as f32).sum::<f32>() / 3.0;
            brightness > 30.0 && brightness < 220.0
        })
        .take(PALETTE_SIZE)
        .map(|(rgb, _)| to_hex(rgb))
        .collect();

    pad_palette(colors)
}

fn pad_palette(mut colors: Vec<String>) -> Vec<String> {
    while colors.len() < PALETTE_SIZE {
        colors.push(FALLBACK_COLORS[colors.len()].to_string());
    }
    colors
}

pub fn to_hex(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

#[cfg(test)]
pub(crate) mod test_images {
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// PNG bytes of a `width`×`height` image filled by `paint`
    pub fn png(width: u32, height: u32, paint: impl Fn(u32, u32) -> [u8; 3]) -> Vec<u8> {
        let image = RgbImage::from_fn(width, height, |x, y| Rgb(paint(x, y)));
        let mut bytes = Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, ImageFormat::Png)
            .expect("PNG encoding should succeed");
        bytes.into_inner()
    }
}
