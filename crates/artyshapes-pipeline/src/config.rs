//! Render configuration, validated once at the pipeline entry.

use serde::{Deserialize, Serialize};

use crate::boundary::ShapeMode;
use crate::ccl::{Connectivity, LabelOptions};
use crate::color::{ClusterParams, ColorMode};
use crate::types::{PipelineError, Rgb};

/// Every option the orchestrator reads.
///
/// Construct with [`Default`] and adjust fields, or deserialize from
/// JSON; call [`validate`](Self::validate) before use. Missing JSON
/// fields take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How each segment is colored.
    pub color_mode: ColorMode,

    /// Which boundary shape is drawn for each segment.
    pub shape_mode: ShapeMode,

    /// Segments whose bounding-box area is below this fraction of the
    /// image area are not drawn. Range `[0, 0.1]`.
    pub discard_threshold: f64,

    /// Ramer-Douglas-Peucker tolerance in pixels. Range `[0, 100]`;
    /// 0 disables simplification.
    pub simplify_tolerance: f64,

    /// Outline width in pixels. Range `[0, 25]`.
    pub stroke_width: f64,

    /// Outline color, shared by every polygon.
    pub stroke_color: Rgb,

    /// Pixel adjacency used by the labeler.
    pub connectivity: Connectivity,

    /// Segmentation color whose pixels are left unlabeled.
    pub background: Option<Rgb>,

    /// Cap on the longest axis of the working raster. Larger maps are
    /// resampled down with nearest-neighbor sampling.
    pub working_resolution: Option<u32>,

    /// DBSCAN parameters for the `cluster` color mode.
    pub cluster: ClusterParams,

    /// Concavity for the `concave` shape mode. Lower is tighter.
    pub concavity: f64,
}

impl PipelineConfig {
    pub const DEFAULT_DISCARD_THRESHOLD: f64 = 0.0;
    pub const MAX_DISCARD_THRESHOLD: f64 = 0.1;
    pub const DEFAULT_SIMPLIFY_TOLERANCE: f64 = 0.0;
    pub const MAX_SIMPLIFY_TOLERANCE: f64 = 100.0;
    pub const DEFAULT_STROKE_WIDTH: f64 = 1.0;
    pub const MAX_STROKE_WIDTH: f64 = 25.0;
    pub const DEFAULT_STROKE_COLOR: Rgb = Rgb::BLACK;
    pub const DEFAULT_CONCAVITY: f64 = crate::boundary::DEFAULT_CONCAVITY;

    /// Check every numeric option against its range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first field
    /// that is out of range or not finite.
    pub fn validate(&self) -> Result<(), PipelineError> {
        check_range(
            "discard_threshold",
            self.discard_threshold,
            Self::MAX_DISCARD_THRESHOLD,
        )?;
        check_range(
            "simplify_tolerance",
            self.simplify_tolerance,
            Self::MAX_SIMPLIFY_TOLERANCE,
        )?;
        check_range("stroke_width", self.stroke_width, Self::MAX_STROKE_WIDTH)?;
        if self.working_resolution == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "working_resolution must be at least 1".to_owned(),
            ));
        }
        if self.cluster.eps == 0 || self.cluster.min_points == 0 {
            return Err(PipelineError::InvalidConfig(
                "cluster eps and min_points must be at least 1".to_owned(),
            ));
        }
        // Infinity is allowed: it turns the concave hull convex.
        if self.concavity.is_nan() || self.concavity <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "concavity must be positive, got {}",
                self.concavity
            )));
        }
        Ok(())
    }

    /// Options for the labeler.
    #[must_use]
    pub const fn label_options(&self) -> LabelOptions {
        LabelOptions {
            connectivity: self.connectivity,
            background: self.background,
        }
    }
}

fn check_range(field: &str, value: f64, max: f64) -> Result<(), PipelineError> {
    if value.is_finite() && (0.0..=max).contains(&value) {
        Ok(())
    } else {
        Err(PipelineError::InvalidConfig(format!(
            "{field} must be within [0, {max}], got {value}"
        )))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::default(),
            shape_mode: ShapeMode::default(),
            discard_threshold: Self::DEFAULT_DISCARD_THRESHOLD,
            simplify_tolerance: Self::DEFAULT_SIMPLIFY_TOLERANCE,
            stroke_width: Self::DEFAULT_STROKE_WIDTH,
            stroke_color: Self::DEFAULT_STROKE_COLOR,
            connectivity: Connectivity::default(),
            background: None,
            working_resolution: None,
            cluster: ClusterParams::default(),
            concavity: Self::DEFAULT_CONCAVITY,
        }
    }
}
