//! Renderer collaborator traits and render-session lifecycle.
//!
//! A [`RenderSurface`] creates a fresh [`Renderer`] for every run. The
//! [`RenderSession`] owns the surface and the renderer of the last
//! completed run, disposes that renderer before starting a new one, and
//! stamps every run with a generation number. A [`SessionHandle`] can
//! bump the generation from elsewhere; a run whose generation is stale
//! when it finishes discards its output and reports
//! [`PipelineError::Superseded`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::PipelineConfig;
use crate::pipeline::{Collaborators, RenderSummary};
use crate::types::{Dimensions, PipelineError, RenderablePolygon, RgbaImage};

/// Draws styled polygons and exports the result.
pub trait Renderer {
    /// Append one polygon. Later polygons paint over earlier ones.
    fn add_polygon(&mut self, polygon: &RenderablePolygon);

    /// Serialize everything drawn so far as an SVG document.
    fn export_svg(&self) -> String;

    /// Release the drawing and forget all polygons.
    fn dispose(&mut self);
}

/// Creates renderers sized to the working raster.
pub trait RenderSurface {
    type Renderer: Renderer;

    /// Acquire a renderer for a `dimensions`-sized canvas.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::RenderSurfaceUnavailable`] if the surface
    /// cannot draw yet (for example, it has zero size).
    fn create(&mut self, dimensions: Dimensions) -> Result<Self::Renderer, PipelineError>;
}

/// Observes whether the run it was issued for is still current.
#[derive(Debug, Clone)]
pub struct CancelToken {
    current: Arc<AtomicU64>,
    generation: u64,
}

impl CancelToken {
    /// A token that is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        Self {
            current: Arc::new(AtomicU64::new(0)),
            generation: 0,
        }
    }

    /// The generation this token was issued for.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` once a newer run has started.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.current.load(Ordering::Acquire) != self.generation
    }
}

/// Cloneable handle that can supersede a session's in-flight run.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    current: Arc<AtomicU64>,
}

impl SessionHandle {
    /// Mark the in-flight run, if any, as superseded.
    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::AcqRel);
    }
}

/// Owns a surface and the renderer of the most recent successful run.
pub struct RenderSession<S: RenderSurface> {
    surface: S,
    renderer: Option<S::Renderer>,
    current: Arc<AtomicU64>,
}

impl<S: RenderSurface> RenderSession<S> {
    #[must_use]
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            renderer: None,
            current: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            current: Arc::clone(&self.current),
        }
    }

    /// Renderer of the last completed run.
    #[must_use]
    pub const fn renderer(&self) -> Option<&S::Renderer> {
        self.renderer.as_ref()
    }

    #[must_use]
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    /// Dispose the current renderer, if any.
    pub fn dispose(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.dispose();
        }
    }

    /// Start a new generation: the previous output is disposed and any
    /// run still holding an older token is superseded.
    pub fn begin(&mut self) -> CancelToken {
        self.dispose();
        let generation = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        CancelToken {
            current: Arc::clone(&self.current),
            generation,
        }
    }

    /// Run the whole pipeline into a fresh renderer.
    ///
    /// # Errors
    ///
    /// Returns any error from [`draw_segments`](crate::draw_segments),
    /// [`PipelineError::RenderSurfaceUnavailable`] if the surface cannot
    /// create a renderer, and [`PipelineError::Superseded`] if the
    /// session was invalidated before the run finished.
    pub fn render(
        &mut self,
        segmentation: &RgbaImage,
        source: Option<&RgbaImage>,
        config: &PipelineConfig,
        collaborators: &mut Collaborators<'_>,
    ) -> Result<RenderSummary, PipelineError> {
        let token = self.begin();
        let dimensions = crate::pipeline::working_dimensions(segmentation, config);
        let mut renderer = self.surface.create(dimensions)?;

        let outcome = crate::pipeline::draw_segments_cancellable(
            segmentation,
            source,
            config,
            collaborators,
            &mut renderer,
            &token,
        );
        match outcome {
            Ok(summary) if !token.is_cancelled() => {
                self.renderer = Some(renderer);
                Ok(summary)
            }
            Ok(_) => {
                log::debug!("render generation {} superseded", token.generation());
                renderer.dispose();
                Err(PipelineError::Superseded)
            }
            Err(e) => {
                renderer.dispose();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Records polygons in memory.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingRenderer {
        pub polygons: Vec<RenderablePolygon>,
        pub disposed: bool,
    }

    impl Renderer for RecordingRenderer {
        fn add_polygon(&mut self, polygon: &RenderablePolygon) {
            self.polygons.push(polygon.clone());
        }

        fn export_svg(&self) -> String {
            format!("<svg><!-- {} polygons --></svg>", self.polygons.len())
        }

        fn dispose(&mut self) {
            self.polygons.clear();
            self.disposed = true;
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingSurface {
        pub created: usize,
    }

    impl RenderSurface for RecordingSurface {
        type Renderer = RecordingRenderer;

        fn create(&mut self, dimensions: Dimensions) -> Result<RecordingRenderer, PipelineError> {
            if dimensions.is_empty() {
                return Err(PipelineError::RenderSurfaceUnavailable(
                    "canvas not ready yet".to_owned(),
                ));
            }
            self.created += 1;
            Ok(RecordingRenderer::default())
        }
    }

    #[test]
    fn never_token_is_not_cancelled() {
        assert!(!CancelToken::never().is_cancelled());
    }

    #[test]
    fn begin_supersedes_older_tokens() {
        let mut session = RenderSession::new(RecordingSurface::default());
        let first = session.begin();
        assert!(!first.is_cancelled());
        let second = session.begin();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn handle_invalidates_from_another_thread() {
        let mut session = RenderSession::new(RecordingSurface::default());
        let token = session.begin();
        let handle = session.handle();
        std::thread::spawn(move || handle.invalidate()).join().unwrap();
        assert!(token.is_cancelled());
    }
}
