//! Color assignment: one output color per segment.
//!
//! Segments are never mutated. Each strategy produces a
//! [`SegmentColors`] map from segment id to color; segments with no
//! members are left out of the map and are not drawn.
//!
//! Pixel-sampling strategies read the source raster, which must be
//! aligned to the same grid the segments were labeled on.

pub mod cluster;
pub mod oklab;
pub mod swatch;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::raster;
use crate::render::CancelToken;
use crate::segment::{Segment, SegmentId};
use crate::types::{Dimensions, PipelineError, PixelCoord, Rgb, RgbaImage};

pub use cluster::ClusterParams;
pub use swatch::{PaletteExtractor, Swatches, VibrantExtractor};

/// Assigned color per segment.
pub type SegmentColors = BTreeMap<SegmentId, Rgb>;

/// Palette for the `mondrian` strategy. Off-white is listed three
/// times so it is drawn three times as often.
pub const MONDRIAN_PALETTE: [Rgb; 7] = [
    Rgb::new(0xff, 0xf0, 0x01),
    Rgb::new(0xff, 0x01, 0x01),
    Rgb::new(0x01, 0x01, 0xfd),
    Rgb::new(0xf9, 0xf9, 0xf9),
    Rgb::new(0xf9, 0xf9, 0xf9),
    Rgb::new(0xf9, 0xf9, 0xf9),
    Rgb::new(0x30, 0x30, 0x3a),
];

/// Selects how each segment is colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColorMode {
    /// Per-channel mean of the member pixels, rounded.
    #[default]
    Average,
    /// Mean taken in Oklab space.
    AveragePerceptual,
    /// The pixel at the segment's representative coordinate.
    Root,
    /// The pixel at the floored center of the bounding box.
    Center,
    /// Per-channel histogram mode.
    Representative,
    /// Uniform random pick from [`MONDRIAN_PALETTE`].
    Mondrian,
    /// Mean of the largest DBSCAN color cluster.
    Cluster,
    /// The extractor's vibrant swatch for the isolated segment.
    Vibrant,
    /// The extractor's muted swatch for the isolated segment.
    Muted,
    /// Keep the segmentation map's own color.
    Segmentation,
}

impl ColorMode {
    pub const ALL: [Self; 10] = [
        Self::Average,
        Self::AveragePerceptual,
        Self::Root,
        Self::Center,
        Self::Representative,
        Self::Mondrian,
        Self::Cluster,
        Self::Vibrant,
        Self::Muted,
        Self::Segmentation,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::AveragePerceptual => "average-perceptual",
            Self::Root => "root",
            Self::Center => "center",
            Self::Representative => "representative",
            Self::Mondrian => "mondrian",
            Self::Cluster => "cluster",
            Self::Vibrant => "vibrant",
            Self::Muted => "muted",
            Self::Segmentation => "segmentation",
        }
    }

    /// Returns `true` if the strategy reads the source raster.
    #[must_use]
    pub const fn samples_source(self) -> bool {
        !matches!(self, Self::Mondrian | Self::Segmentation)
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| PipelineError::InvalidColorMode(s.to_owned()))
    }
}

impl TryFrom<String> for ColorMode {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColorMode> for String {
    fn from(mode: ColorMode) -> Self {
        mode.name().to_owned()
    }
}

/// Collaborators and parameters a color strategy may need.
pub struct ColorContext<'a> {
    /// Raster sampled by the pixel-reading strategies.
    pub source: &'a RgbaImage,
    pub cluster: ClusterParams,
    pub rng: &'a mut dyn RngCore,
    pub extractor: &'a dyn PaletteExtractor,
    /// Checked between palette extractions.
    pub cancel: &'a CancelToken,
}

impl fmt::Debug for ColorContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorContext")
            .field("source", &self.source.dimensions())
            .field("cluster", &self.cluster)
            .finish_non_exhaustive()
    }
}

/// Compute one color per non-empty segment under `mode`.
///
/// # Errors
///
/// Returns [`PipelineError::MalformedColor`] if the palette extractor
/// returns a swatch that is not a hex triplet, and
/// [`PipelineError::Superseded`] if `ctx.cancel` fires during palette
/// extraction. A missing swatch or a failed extraction is not an error;
/// the segment is colored white.
pub fn assign(
    segments: &[Segment],
    mode: ColorMode,
    ctx: &mut ColorContext<'_>,
) -> Result<SegmentColors, PipelineError> {
    let mut colors = SegmentColors::new();
    let mut skipped = 0usize;
    for segment in segments {
        if segment.is_empty() {
            skipped += 1;
            continue;
        }
        let color = match mode {
            ColorMode::Average => average(segment, ctx.source),
            ColorMode::AveragePerceptual => average_perceptual(segment, ctx.source),
            ColorMode::Root => raster::sample(ctx.source, segment.root()),
            ColorMode::Center => raster::sample(ctx.source, segment.bounds().center()),
            ColorMode::Representative => representative(segment, ctx.source),
            ColorMode::Mondrian => mondrian(ctx.rng),
            ColorMode::Cluster => cluster(segment, ctx.source, ctx.cluster),
            ColorMode::Vibrant => swatch(segment, ctx, swatch::VIBRANT)?,
            ColorMode::Muted => swatch(segment, ctx, swatch::MUTED)?,
            ColorMode::Segmentation => segment.label_color(),
        };
        log::trace!("segment {:?} -> {color}", segment.id());
        colors.insert(segment.id(), color);
    }
    if skipped > 0 {
        log::debug!("color: skipped {skipped} segments with no members");
    }
    Ok(colors)
}

fn member_colors<'a>(
    segment: &'a Segment,
    source: &'a RgbaImage,
) -> impl Iterator<Item = Rgb> + 'a {
    segment
        .members()
        .iter()
        .map(move |&c| raster::sample(source, c))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn mean_of(colors: impl Iterator<Item = Rgb>) -> Option<Rgb> {
    let mut sum = [0.0f64; 3];
    let mut count = 0usize;
    for color in colors {
        for (acc, channel) in sum.iter_mut().zip(color.channels()) {
            *acc += f64::from(channel);
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let n = count as f64;
    let [r, g, b] = sum.map(|s| (s / n).round().clamp(0.0, 255.0) as u8);
    Some(Rgb::new(r, g, b))
}

/// Per-channel mean over the members, rounded half away from zero.
#[must_use]
pub fn average(segment: &Segment, source: &RgbaImage) -> Rgb {
    mean_of(member_colors(segment, source)).unwrap_or_else(|| segment.label_color())
}

/// Mean over the members taken in Oklab space.
#[must_use]
pub fn average_perceptual(segment: &Segment, source: &RgbaImage) -> Rgb {
    let mut acc = oklab::OklabAccumulator::new();
    for color in member_colors(segment, source) {
        acc.add(color);
    }
    acc.mean().unwrap_or_else(|| segment.label_color())
}

/// Per-channel histogram mode. A channel's mode only changes when a
/// value's count strictly exceeds the current maximum, so ties go to the
/// value that reached the maximum first.
#[must_use]
pub fn representative(segment: &Segment, source: &RgbaImage) -> Rgb {
    let mut histogram = [[0u32; 256]; 3];
    let mut mode = [0u8; 3];
    for color in member_colors(segment, source) {
        for (channel, value) in color.channels().into_iter().enumerate() {
            let bins = &mut histogram[channel];
            bins[usize::from(value)] += 1;
            if bins[usize::from(value)] > bins[usize::from(mode[channel])] {
                mode[channel] = value;
            }
        }
    }
    Rgb::new(mode[0], mode[1], mode[2])
}

/// A uniformly random entry of [`MONDRIAN_PALETTE`].
pub fn mondrian(rng: &mut dyn RngCore) -> Rgb {
    MONDRIAN_PALETTE
        .choose(rng)
        .copied()
        .unwrap_or(Rgb::WHITE)
}

/// Mean color of the largest DBSCAN cluster of member colors. When
/// every member is noise the mean of all members is used.
#[must_use]
pub fn cluster(segment: &Segment, source: &RgbaImage, params: ClusterParams) -> Rgb {
    let colors: Vec<Rgb> = member_colors(segment, source).collect();
    let clusters = cluster::dbscan(&colors, params);
    let chosen = cluster::largest(&clusters)
        .and_then(|i| mean_of(clusters[i].iter().map(|&m| colors[m])));
    log::trace!(
        "segment {:?}: {} clusters over {} members",
        segment.id(),
        clusters.len(),
        colors.len()
    );
    chosen
        .or_else(|| mean_of(colors.iter().copied()))
        .unwrap_or_else(|| segment.label_color())
}

/// The segment's member pixels copied into a transparent raster cropped
/// to its bounding box.
#[must_use]
pub fn isolate_segment(segment: &Segment, source: &RgbaImage) -> RgbaImage {
    let bounds = segment.bounds();
    raster::isolate(
        source,
        segment.members(),
        PixelCoord::new(bounds.west, bounds.north),
        Dimensions {
            width: bounds.width() + 1,
            height: bounds.height() + 1,
        },
    )
}

fn swatch(segment: &Segment, ctx: &ColorContext<'_>, name: &str) -> Result<Rgb, PipelineError> {
    let isolated = isolate_segment(segment, ctx.source);
    let extracted = raster::encode_png(&isolated).and_then(|png| ctx.extractor.extract(&png));
    // A result that arrives after a newer render started is discarded.
    if ctx.cancel.is_cancelled() {
        return Err(PipelineError::Superseded);
    }
    match extracted {
        Ok(swatches) => match swatches.get(name) {
            Some(hex) => Rgb::from_hex(hex),
            None => {
                log::warn!(
                    "segment {:?}: no {name} swatch, using white",
                    segment.id()
                );
                Ok(Rgb::WHITE)
            }
        },
        Err(e) => {
            log::warn!(
                "segment {:?}: palette extraction failed ({e}), using white",
                segment.id()
            );
            Ok(Rgb::WHITE)
        }
    }
}
