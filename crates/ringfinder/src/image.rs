//! Conversions from `image` buffers into per-channel scalar fields.

use ::image::{DynamicImage, GenericImageView};

use ringfinder_core::{FieldError, ScalarField};

/// Split `img` into one `[width, height]` field per colour channel.
///
/// Samples keep their native range (0..=255 for 8-bit images, 0..=65535 for
/// 16-bit, raw values for float images). Alpha is treated as a channel.
pub fn channels_from_image(img: &DynamicImage) -> Result<Vec<ScalarField>, FieldError> {
    let (w, h) = img.dimensions();
    let (w, h) = (w as usize, h as usize);
    let count = img.color().channel_count() as usize;
    let (count, samples): (usize, Vec<f64>) = match img {
        DynamicImage::ImageLuma8(b) => (count, widen(b.as_raw())),
        DynamicImage::ImageLumaA8(b) => (count, widen(b.as_raw())),
        DynamicImage::ImageRgb8(b) => (count, widen(b.as_raw())),
        DynamicImage::ImageRgba8(b) => (count, widen(b.as_raw())),
        DynamicImage::ImageLuma16(b) => (count, widen(b.as_raw())),
        DynamicImage::ImageLumaA16(b) => (count, widen(b.as_raw())),
        DynamicImage::ImageRgb16(b) => (count, widen(b.as_raw())),
        DynamicImage::ImageRgba16(b) => (count, widen(b.as_raw())),
        DynamicImage::ImageRgb32F(b) => (count, widen(b.as_raw())),
        DynamicImage::ImageRgba32F(b) => (count, widen(b.as_raw())),
        other => (4, widen(other.to_rgba32f().as_raw())),
    };
    (0..count)
        .map(|c| {
            let data = samples.iter().skip(c).step_by(count).copied().collect();
            ScalarField::from_vec(vec![w, h], data)
        })
        .collect()
}

fn widen<T: Copy + Into<f64>>(raw: &[T]) -> Vec<f64> {
    raw.iter().map(|&v| v.into()).collect()
}

/// Wrap a row-major 8-bit grayscale buffer as a single field.
pub fn field_from_gray(img: &::image::GrayImage) -> Result<ScalarField, FieldError> {
    let dims = vec![img.width() as usize, img.height() as usize];
    ScalarField::from_vec(dims, img.as_raw().iter().map(|&v| v as f64).collect())
}
