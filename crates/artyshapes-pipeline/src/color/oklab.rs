//! Oklab conversion for perceptual averaging.
//!
//! sRGB samples are linearized, mapped through the Oklab LMS matrices
//! and averaged there; the mean is mapped back and re-encoded.

use crate::types::Rgb;

/// A color in the Oklab perceptual space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Oklab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

fn srgb_to_linear(channel: u8) -> f64 {
    let c = f64::from(channel) / 255.0;
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn linear_to_srgb(linear: f64) -> u8 {
    let c = if linear <= 0.003_130_8 {
        linear * 12.92
    } else {
        1.055f64.mul_add(linear.powf(1.0 / 2.4), -0.055)
    };
    (c * 255.0).round().clamp(0.0, 255.0) as u8
}

impl Oklab {
    /// Convert an 8-bit sRGB color.
    #[must_use]
    pub fn from_rgb(color: Rgb) -> Self {
        let r = srgb_to_linear(color.r);
        let g = srgb_to_linear(color.g);
        let b = srgb_to_linear(color.b);

        let l = 0.051_445_992_9f64
            .mul_add(b, 0.412_221_470_8f64.mul_add(r, 0.536_332_536_3 * g))
            .cbrt();
        let m = 0.107_396_956_6f64
            .mul_add(b, 0.211_903_498_2f64.mul_add(r, 0.680_699_545_1 * g))
            .cbrt();
        let s = 0.629_978_700_5f64
            .mul_add(b, 0.088_302_461_9f64.mul_add(r, 0.281_718_837_6 * g))
            .cbrt();

        Self {
            l: (-0.004_072_046_8f64).mul_add(s, 0.210_454_255_3f64.mul_add(l, 0.793_617_785 * m)),
            a: 0.450_593_709_9f64.mul_add(s, 1.977_998_495_1f64.mul_add(l, -2.428_592_205 * m)),
            b: (-0.808_675_766f64).mul_add(s, 0.025_904_037_1f64.mul_add(l, 0.782_771_766_2 * m)),
        }
    }

    /// Convert back to 8-bit sRGB, clamping out-of-gamut results.
    #[must_use]
    pub fn to_rgb(self) -> Rgb {
        let l = 0.215_803_757_3f64
            .mul_add(self.b, 0.396_337_777_4f64.mul_add(self.a, self.l))
            .powi(3);
        let m = (-0.063_854_172_8f64)
            .mul_add(self.b, (-0.105_561_345_8f64).mul_add(self.a, self.l))
            .powi(3);
        let s = (-1.291_485_548f64)
            .mul_add(self.b, (-0.089_484_177_5f64).mul_add(self.a, self.l))
            .powi(3);

        let r = 0.230_969_929_2f64.mul_add(s, 4.076_741_662_1f64.mul_add(l, -3.307_711_591_3 * m));
        let g = (-0.341_319_396_5f64).mul_add(s, (-1.268_438_004_9f64).mul_add(l, 2.609_757_401_1 * m));
        let b = 1.707_614_701f64.mul_add(s, (-0.004_196_086_3f64).mul_add(l, -0.703_418_614_7 * m));

        Rgb::new(linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(b))
    }
}

/// Running sum of Oklab samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct OklabAccumulator {
    sum: Oklab,
    count: usize,
}

impl OklabAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, color: Rgb) {
        let lab = Oklab::from_rgb(color);
        self.sum.l += lab.l;
        self.sum.a += lab.a;
        self.sum.b += lab.b;
        self.count += 1;
    }

    /// Mean of the accumulated samples, or `None` if nothing was added.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Option<Rgb> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(
            Oklab {
                l: self.sum.l / n,
                a: self.sum.a / n,
                b: self.sum.b / n,
            }
            .to_rgb(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_stable() {
        for color in [
            Rgb::BLACK,
            Rgb::WHITE,
            Rgb::new(255, 0, 0),
            Rgb::new(12, 200, 77),
            Rgb::new(0x30, 0x30, 0x3a),
        ] {
            assert_eq!(Oklab::from_rgb(color).to_rgb(), color);
        }
    }

    #[test]
    fn white_has_unit_lightness() {
        let lab = Oklab::from_rgb(Rgb::WHITE);
        assert!((lab.l - 1.0).abs() < 1e-3);
        assert!(lab.a.abs() < 1e-3);
        assert!(lab.b.abs() < 1e-3);
    }

    #[test]
    fn mean_of_identical_samples_is_that_color() {
        let mut acc = OklabAccumulator::new();
        for _ in 0..5 {
            acc.add(Rgb::new(40, 90, 200));
        }
        assert_eq!(acc.mean().unwrap(), Rgb::new(40, 90, 200));
        assert!(OklabAccumulator::new().mean().is_none());
    }

    #[test]
    fn perceptual_mean_of_black_and_white_is_darker_than_rgb_mean() {
        // Oklab L = 0.5 is linear 0.125, about 99 in sRGB.
        let mut acc = OklabAccumulator::new();
        acc.add(Rgb::BLACK);
        acc.add(Rgb::WHITE);
        let mean = acc.mean().unwrap();
        assert!(mean.r.abs_diff(mean.g) <= 1 && mean.g.abs_diff(mean.b) <= 1);
        assert!((90..110).contains(&mean.g), "got {mean}");
    }
}
