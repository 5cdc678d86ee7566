//! Raster access: decoding, byte-index arithmetic, and nearest-neighbor
//! resampling.
//!
//! Every raster in the pipeline is an RGBA buffer stored row-major with
//! four bytes per pixel. The segmentation map and the source image are
//! read-only once captured; resampling always produces a new buffer.

use image::{Rgba, RgbaImage};

use crate::types::{Dimensions, PipelineError, PixelCoord, Rgb};

/// Bytes per pixel of an RGBA buffer.
pub const RGBA_CHANNELS: usize = 4;

/// Decode raw image bytes (PNG, JPEG, BMP, WebP) into an RGBA buffer.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::Image`] if the format is unrecognized or the
/// data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Encode an RGBA buffer as PNG bytes.
///
/// # Errors
///
/// Returns [`PipelineError::Image`] if encoding fails.
pub fn encode_png(raster: &RgbaImage) -> Result<Vec<u8>, PipelineError> {
    use image::ImageEncoder;

    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
    encoder.write_image(
        raster.as_raw(),
        raster.width(),
        raster.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(png_bytes)
}

/// Byte offset of pixel `(x, y)` in a row-major buffer of the given
/// `width` with `channels` bytes per pixel.
#[must_use]
pub const fn xy_to_i(x: u32, y: u32, width: u32, channels: usize) -> usize {
    (y as usize * width as usize + x as usize) * channels
}

/// Pixel coordinate containing byte offset `i`. Offsets inside a pixel
/// (not on a channel-0 boundary) resolve to that pixel.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn i_to_xy(i: usize, width: u32, channels: usize) -> (u32, u32) {
    let pixel = i / channels;
    let width = width as usize;
    ((pixel % width) as u32, (pixel / width) as u32)
}

/// Color of the pixel at `coord`, alpha discarded.
///
/// Coordinates outside the raster are clamped to the nearest edge pixel.
#[must_use]
pub fn sample(raster: &RgbaImage, coord: PixelCoord) -> Rgb {
    let x = coord.x.min(raster.width().saturating_sub(1));
    let y = coord.y.min(raster.height().saturating_sub(1));
    Rgb::from_rgba(*raster.get_pixel(x, y))
}

/// Resample `raster` to `target` dimensions with nearest-neighbor
/// sampling.
///
/// Target pixel `(j, i)` takes the value of source pixel
/// `(floor(j * src_w / target_w), floor(i * src_h / target_h))`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn resize_nearest(raster: &RgbaImage, target: Dimensions) -> RgbaImage {
    let (src_w, src_h) = raster.dimensions();
    if (src_w, src_h) == (target.width, target.height) {
        return raster.clone();
    }
    if src_w == 0 || src_h == 0 {
        return RgbaImage::new(target.width, target.height);
    }
    RgbaImage::from_fn(target.width, target.height, |j, i| {
        let sx = (u64::from(j) * u64::from(src_w) / u64::from(target.width)) as u32;
        let sy = (u64::from(i) * u64::from(src_h) / u64::from(target.height)) as u32;
        *raster.get_pixel(sx, sy)
    })
}

/// Dimensions scaled so the longest axis is at most `max_dimension`,
/// preserving aspect ratio. Dimensions already within the cap are
/// returned unchanged.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn fit_within(dimensions: Dimensions, max_dimension: u32) -> Dimensions {
    let long_axis = dimensions.width.max(dimensions.height);
    if long_axis <= max_dimension || long_axis == 0 {
        return dimensions;
    }
    let scale = f64::from(max_dimension) / f64::from(long_axis);
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).max(1);
    Dimensions {
        width: scaled(dimensions.width),
        height: scaled(dimensions.height),
    }
}

/// Build a raster of `dimensions` where only `coords` are copied from
/// `source` (offset by `origin`) and everything else is transparent.
#[must_use]
pub fn isolate(
    source: &RgbaImage,
    coords: &[PixelCoord],
    origin: PixelCoord,
    dimensions: Dimensions,
) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(dimensions.width, dimensions.height, Rgba([0, 0, 0, 0]));
    for &c in coords {
        let Some(x) = c.x.checked_sub(origin.x) else {
            continue;
        };
        let Some(y) = c.y.checked_sub(origin.y) else {
            continue;
        };
        if x < dimensions.width && y < dimensions.height {
            let Rgb { r, g, b } = sample(source, c);
            out.put_pixel(x, y, Rgba([r, g, b, 255]));
        }
    }
    out
}
