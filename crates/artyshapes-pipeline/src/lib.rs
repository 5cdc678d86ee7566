//! artyshapes-pipeline: Segmentation-map to vector-shape pipeline (sans-IO).
//!
//! Turns a flat-color label raster into styled polygons through:
//! resize -> connected-component labeling -> area filter ->
//! color assignment -> boundary extraction -> simplification -> draw.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! rasters and byte slices. Drawing goes through the [`Renderer`]
//! trait; SVG and raster renderers live in `artyshapes-export`.

pub mod boundary;
pub mod ccl;
pub mod color;
pub mod config;
pub mod diagnostics;
pub mod pipeline;
pub mod raster;
pub mod render;
pub mod segment;
pub mod segmentation;
pub mod simplify;
pub mod types;
pub mod union_find;

pub use boundary::{BoundaryExtractor, ShapeMode};
pub use ccl::{Connectivity, LabelOptions};
pub use color::{ClusterParams, ColorMode, PaletteExtractor, SegmentColors, VibrantExtractor};
pub use config::PipelineConfig;
pub use pipeline::{Collaborators, Pipeline, RenderSummary, draw_segments};
pub use render::{CancelToken, RenderSession, RenderSurface, Renderer, SessionHandle};
pub use segment::{BoundingBox, Segment, SegmentId};
pub use types::{
    Dimensions, PipelineError, PixelCoord, Point, Polygon, RenderablePolygon, Rgb, RgbaImage,
};
