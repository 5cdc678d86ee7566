//! artyshapes-export: Renderers for styled polygons (sans-IO)
//!
//! Implements the pipeline's [`Renderer`](artyshapes_pipeline::Renderer)
//! and [`RenderSurface`](artyshapes_pipeline::RenderSurface) traits for
//! two targets: an SVG document and an anti-aliased raster preview.

pub mod png;
pub mod svg;

pub use png::{PixmapCanvas, PixmapSurface};
pub use svg::{SvgCanvas, SvgMetadata, SvgSurface, build_path_data, to_svg};
