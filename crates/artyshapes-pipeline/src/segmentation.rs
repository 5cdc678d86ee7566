//! Segmentation-model collaborator.
//!
//! A model turns a photograph into a label map: a raster in which every
//! distinct label is painted with its own flat color. The pipeline only
//! consumes that raster, so anything able to produce one can stand in
//! for a neural model. Two such stand-ins ship here: [`Precomputed`],
//! which replays a map produced elsewhere, and [`Posterize`], which
//! flattens the image itself into a few color levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::raster::RGBA_CHANNELS;
use crate::types::{PipelineError, RgbaImage};

/// Pretrained model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// 21 object classes.
    #[default]
    Pascal,
    /// 19 street-scene classes.
    Cityscapes,
    /// 150 indoor and outdoor classes.
    Ade20k,
}

impl ModelVariant {
    pub const ALL: [Self; 3] = [Self::Pascal, Self::Cityscapes, Self::Ade20k];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pascal => "pascal",
            Self::Cityscapes => "cityscapes",
            Self::Ade20k => "ade20k",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelVariant {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| PipelineError::InvalidConfig(format!("unknown model variant {s:?}")))
    }
}

/// Bytes per model weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Quantization {
    One,
    #[default]
    Two,
    Four,
}

impl Quantization {
    #[must_use]
    pub const fn bytes(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
        }
    }
}

impl TryFrom<u8> for Quantization {
    type Error = PipelineError;

    fn try_from(bytes: u8) -> Result<Self, Self::Error> {
        match bytes {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            other => Err(PipelineError::InvalidConfig(format!(
                "quantization must be 1, 2, or 4 bytes, got {other}"
            ))),
        }
    }
}

impl From<Quantization> for u8 {
    fn from(q: Quantization) -> Self {
        q.bytes()
    }
}

/// Caller-supplied model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub variant: ModelVariant,
    pub quantization: Quantization,
}

/// Raw model output: a row-major RGBA label raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMap {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl SegmentationMap {
    /// Check the buffer length and wrap it as an image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Segmentation`] if `data` is not exactly
    /// `width * height * 4` bytes.
    pub fn into_raster(self) -> Result<RgbaImage, PipelineError> {
        let expected = self.width as usize * self.height as usize * RGBA_CHANNELS;
        let actual = self.data.len();
        RgbaImage::from_raw(self.width, self.height, self.data).ok_or_else(|| {
            PipelineError::Segmentation(format!(
                "map of {}x{} needs {expected} bytes, got {actual}",
                self.width, self.height
            ))
        })
    }
}

impl From<RgbaImage> for SegmentationMap {
    fn from(raster: RgbaImage) -> Self {
        let (width, height) = raster.dimensions();
        Self {
            width,
            height,
            data: raster.into_raw(),
        }
    }
}

/// Produces a label map for an image.
pub trait SegmentationModel {
    /// Segment `image` with the model selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Segmentation`] if the model fails.
    fn segment(
        &mut self,
        image: &RgbaImage,
        config: &ModelConfig,
    ) -> Result<SegmentationMap, PipelineError>;
}

/// Replays a map computed ahead of time, ignoring the image.
#[derive(Debug, Clone)]
pub struct Precomputed(pub SegmentationMap);

impl SegmentationModel for Precomputed {
    fn segment(
        &mut self,
        _image: &RgbaImage,
        config: &ModelConfig,
    ) -> Result<SegmentationMap, PipelineError> {
        log::debug!(
            "replaying precomputed {}x{} map (requested {} @ {} bytes)",
            self.0.width,
            self.0.height,
            config.variant,
            config.quantization.bytes()
        );
        Ok(self.0.clone())
    }
}

/// Flat-color quantization of the image itself.
///
/// Each channel is snapped to the center of one of `levels` equal
/// bands, so neighboring pixels of similar color share a label.
/// Alpha is forced opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posterize {
    pub levels: u8,
}

impl Posterize {
    pub const DEFAULT_LEVELS: u8 = 4;

    fn snap(self, channel: u8) -> u8 {
        let levels = u16::from(self.levels);
        let band = u16::from(channel) * levels / 256;
        let center = (band * 256 + 128) / levels;
        u8::try_from(center).unwrap_or(u8::MAX)
    }
}

impl Default for Posterize {
    fn default() -> Self {
        Self {
            levels: Self::DEFAULT_LEVELS,
        }
    }
}

impl SegmentationModel for Posterize {
    fn segment(
        &mut self,
        image: &RgbaImage,
        _config: &ModelConfig,
    ) -> Result<SegmentationMap, PipelineError> {
        if self.levels < 2 {
            return Err(PipelineError::Segmentation(format!(
                "posterize needs at least 2 levels, got {}",
                self.levels
            )));
        }
        let mut out = image.clone();
        for pixel in out.pixels_mut() {
            let [r, g, b, _] = pixel.0;
            pixel.0 = [self.snap(r), self.snap(g), self.snap(b), u8::MAX];
        }
        Ok(out.into())
    }
}
