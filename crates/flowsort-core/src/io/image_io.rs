use std::path::Path;

use image::{ImageBuffer, ImageFormat, Luma};
use ndarray::Array2;

use crate::error::Result;
use crate::frame::{Frame, Illumination};

/// Raw counts clamped into the 16-bit range.
fn to_u16(v: f32) -> u16 {
    v.round().clamp(0.0, u16::MAX as f32) as u16
}

fn counts_image(data: &Array2<f32>) -> ImageBuffer<Luma<u16>, Vec<u16>> {
    let (h, w) = data.dim();
    ImageBuffer::from_fn(w as u32, h as u32, |x, y| {
        Luma([to_u16(data[[y as usize, x as usize]])])
    })
}

/// Save raw counts as 16-bit grayscale TIFF.
pub fn save_tiff(data: &Array2<f32>, path: &Path) -> Result<()> {
    counts_image(data).save_with_format(path, ImageFormat::Tiff)?;
    Ok(())
}

/// Save raw counts as 16-bit grayscale PNG.
pub fn save_png(data: &Array2<f32>, path: &Path) -> Result<()> {
    counts_image(data).save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Save a frame, choosing format from file extension. Defaults to PNG.
pub fn save_frame(frame: &Frame, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("tiff" | "tif") => save_tiff(frame.data(), path),
        _ => save_png(frame.data(), path),
    }
}

/// Save a binary mask as 8-bit PNG, foreground 255.
pub fn save_mask(mask: &Array2<bool>, path: &Path) -> Result<()> {
    let (h, w) = mask.dim();
    let img: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_fn(w as u32, h as u32, |x, y| {
        Luma([if mask[[y as usize, x as usize]] { 255 } else { 0 }])
    });
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Load a grayscale image as raw 16-bit counts.
pub fn load_counts(path: &Path) -> Result<Array2<f32>> {
    let gray = image::open(path)?.to_luma16();
    let (w, h) = gray.dimensions();
    Ok(Array2::from_shape_fn((h as usize, w as usize), |(row, col)| {
        gray.get_pixel(col as u32, row as u32).0[0] as f32
    }))
}

/// Load a grayscale image file into a frame under `illumination`.
pub fn load_frame(path: &Path, illumination: Illumination) -> Result<Frame> {
    Ok(Frame::new(load_counts(path)?, illumination))
}
