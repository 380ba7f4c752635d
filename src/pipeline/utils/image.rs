use std::path::Path;

use anyhow::Error;
use image::imageops::{resize, FilterType};
use image::{ImageReader, RgbImage};
use ndarray::{Array4, Axis};

use crate::config::settings::{PixelNormalization, TensorLayout};

/// Decodes encoded image bytes (PNG, JPEG, ...) into an RGB buffer.
pub fn byte_data_to_rgb(im_bytes: &[u8]) -> Result<RgbImage, Error> {
    if im_bytes.is_empty() {
        return Err(Error::msg("image is empty"));
    }
    let decoded = image::load_from_memory(im_bytes)?;
    Ok(decoded.to_rgb8())
}

/// Loads an image from disk, sniffing the format from its content rather than
/// trusting the extension.
pub fn load_rgb(path: &Path) -> Result<RgbImage, Error> {
    let decoded = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(decoded.to_rgb8())
}

/// Bilinear resize to `(width, height)`.
pub fn resize_rgb(img: &RgbImage, image_size: (u32, u32)) -> RgbImage {
    if img.dimensions() == image_size {
        return img.clone();
    }
    resize(img, image_size.0, image_size.1, FilterType::Triangle)
}

fn normalize_pixel(p: u8, normalization: PixelNormalization) -> f32 {
    match normalization {
        PixelNormalization::Base => p as f32 / 255.0,
        PixelNormalization::Arcface => (p as f32 - 127.5) * 0.0078125,
    }
}

/// Converts an RGB image to a single-batch tensor in the requested layout.
pub fn rgb_to_tensor(img: &RgbImage, layout: TensorLayout, normalization: PixelNormalization) -> Array4<f32> {
    let (width, height) = img.dimensions();
    let mut im_tensor = Array4::<f32>::zeros((1, height as usize, width as usize, 3));

    for (x, y, pixel) in img.enumerate_pixels() {
        for c in 0..3 {
            im_tensor[[0, y as usize, x as usize, c]] = normalize_pixel(pixel[c], normalization);
        }
    }

    match layout {
        TensorLayout::Nhwc => im_tensor,
        TensorLayout::Nchw => {
            let permuted = im_tensor.permuted_axes([0, 3, 1, 2]);
            permuted.as_standard_layout().into_owned()
        }
    }
}

pub fn tensor_shape(tensor: &Array4<f32>) -> Vec<i64> {
    (0..tensor.ndim()).map(|axis| tensor.len_of(Axis(axis)) as i64).collect()
}
