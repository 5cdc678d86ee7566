//! Palette extraction collaborator and a built-in swatch extractor.
//!
//! A [`PaletteExtractor`] receives a PNG-encoded raster in which only
//! one segment's pixels are opaque and returns named swatches as hex
//! strings. The `vibrant` and `muted` color modes look up
//! [`VIBRANT`] and [`MUTED`] in that map.

use std::collections::BTreeMap;

use crate::types::{PipelineError, Rgb};

pub const VIBRANT: &str = "Vibrant";
pub const DARK_VIBRANT: &str = "DarkVibrant";
pub const LIGHT_VIBRANT: &str = "LightVibrant";
pub const MUTED: &str = "Muted";
pub const DARK_MUTED: &str = "DarkMuted";
pub const LIGHT_MUTED: &str = "LightMuted";

/// Swatch name to `#rrggbb` hex string.
pub type Swatches = BTreeMap<String, String>;

/// Extracts a named palette from an encoded image.
///
/// Implementations may omit any swatch they cannot fill. Returned hex
/// strings are parsed by the caller; a malformed value is a defect in
/// the extractor and aborts the render.
pub trait PaletteExtractor {
    /// Extract swatches from PNG-encoded image bytes.
    ///
    /// # Errors
    ///
    /// Implementations return an error when the image cannot be read.
    fn extract(&self, png: &[u8]) -> Result<Swatches, PipelineError>;
}

/// Target ranges for one swatch, in HSL saturation and lightness.
#[derive(Debug, Clone, Copy)]
struct Target {
    name: &'static str,
    luma: (f64, f64, f64),
    saturation: (f64, f64, f64),
}

const TARGETS: [Target; 6] = [
    Target {
        name: VIBRANT,
        luma: (0.3, 0.5, 0.7),
        saturation: (0.35, 1.0, 1.0),
    },
    Target {
        name: LIGHT_VIBRANT,
        luma: (0.55, 0.74, 1.0),
        saturation: (0.35, 1.0, 1.0),
    },
    Target {
        name: DARK_VIBRANT,
        luma: (0.0, 0.26, 0.45),
        saturation: (0.35, 1.0, 1.0),
    },
    Target {
        name: MUTED,
        luma: (0.3, 0.5, 0.7),
        saturation: (0.0, 0.3, 0.4),
    },
    Target {
        name: LIGHT_MUTED,
        luma: (0.55, 0.74, 1.0),
        saturation: (0.0, 0.3, 0.4),
    },
    Target {
        name: DARK_MUTED,
        luma: (0.0, 0.26, 0.45),
        saturation: (0.0, 0.3, 0.4),
    },
];

const WEIGHT_SATURATION: f64 = 3.0;
const WEIGHT_LUMA: f64 = 6.5;
const WEIGHT_POPULATION: f64 = 0.5;

/// Bits kept per channel when bucketing colors.
const QUANTIZE_BITS: u32 = 5;

/// Pixels with alpha below this are ignored.
const MIN_ALPHA: u8 = 125;

/// A quantized color bucket.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    color: Rgb,
    population: u32,
    saturation: f64,
    lightness: f64,
}

/// HSL saturation and lightness of a color, both in `[0, 1]`.
fn saturation_lightness(color: Rgb) -> (f64, f64) {
    let [r, g, b] = color.channels().map(|c| f64::from(c) / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let lightness = f64::midpoint(max, min);
    if (max - min).abs() < f64::EPSILON {
        return (0.0, lightness);
    }
    let delta = max - min;
    let saturation = if lightness > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    };
    (saturation, lightness)
}

/// Built-in extractor producing the six standard swatches by
/// population-weighted scoring of quantized colors.
#[derive(Debug, Clone, Copy, Default)]
pub struct VibrantExtractor;

impl VibrantExtractor {
    #[allow(clippy::cast_possible_truncation)]
    fn buckets(raster: &image::RgbaImage) -> Vec<Bucket> {
        let shift = 8 - QUANTIZE_BITS;
        let mut sums: BTreeMap<(u8, u8, u8), ([u64; 3], u32)> = BTreeMap::new();
        for pixel in raster.pixels() {
            let [r, g, b, a] = pixel.0;
            // Near-white pixels are dropped along with transparent ones.
            if a < MIN_ALPHA || (r > 250 && g > 250 && b > 250) {
                continue;
            }
            let entry = sums
                .entry((r >> shift, g >> shift, b >> shift))
                .or_insert(([0; 3], 0));
            entry.0[0] += u64::from(r);
            entry.0[1] += u64::from(g);
            entry.0[2] += u64::from(b);
            entry.1 += 1;
        }
        sums.into_values()
            .map(|(sum, population)| {
                let n = u64::from(population);
                let color = Rgb::new(
                    ((sum[0] + n / 2) / n) as u8,
                    ((sum[1] + n / 2) / n) as u8,
                    ((sum[2] + n / 2) / n) as u8,
                );
                let (saturation, lightness) = saturation_lightness(color);
                Bucket {
                    color,
                    population,
                    saturation,
                    lightness,
                }
            })
            .collect()
    }

    fn score(bucket: &Bucket, target: &Target, max_population: u32) -> f64 {
        let invert_diff = |value: f64, target: f64| 1.0 - (value - target).abs();
        let total = WEIGHT_SATURATION + WEIGHT_LUMA + WEIGHT_POPULATION;
        let weighted = WEIGHT_POPULATION.mul_add(
            f64::from(bucket.population) / f64::from(max_population.max(1)),
            WEIGHT_SATURATION.mul_add(
                invert_diff(bucket.saturation, target.saturation.1),
                WEIGHT_LUMA * invert_diff(bucket.lightness, target.luma.1),
            ),
        );
        weighted / total
    }

    /// Pick one bucket per target. A bucket is used for at most one
    /// swatch; targets with no bucket in range are omitted.
    fn select(buckets: &[Bucket]) -> Swatches {
        let max_population = buckets.iter().map(|b| b.population).max().unwrap_or(0);
        let mut used = vec![false; buckets.len()];
        let mut swatches = Swatches::new();
        for target in &TARGETS {
            let mut best: Option<(usize, f64)> = None;
            for (i, bucket) in buckets.iter().enumerate() {
                let in_range = (target.saturation.0..=target.saturation.2)
                    .contains(&bucket.saturation)
                    && (target.luma.0..=target.luma.2).contains(&bucket.lightness);
                if used[i] || !in_range {
                    continue;
                }
                let score = Self::score(bucket, target, max_population);
                if best.is_none_or(|(_, s)| score > s) {
                    best = Some((i, score));
                }
            }
            if let Some((i, _)) = best {
                used[i] = true;
                swatches.insert(target.name.to_owned(), buckets[i].color.to_hex());
            }
        }
        swatches
    }
}

impl PaletteExtractor for VibrantExtractor {
    fn extract(&self, png: &[u8]) -> Result<Swatches, PipelineError> {
        let raster = crate::raster::decode(png)?;
        let buckets = Self::buckets(&raster);
        log::trace!("palette extraction: {} color buckets", buckets.len());
        Ok(Self::select(&buckets))
    }
}
