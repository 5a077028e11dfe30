//! The seam between the engine and the underlying map renderer.
//!
//! [`MapSurface`] is deliberately narrow: it is everything the session, the
//! source binder, the layer set and the selection tracker are allowed to do to
//! the map, and nothing else. The browser implementation forwards to
//! `maplibregl.Map`; [`crate::headless::HeadlessSurface`] implements it in
//! memory.
//!
//! All methods return immediately. Answers that the renderer produces later
//! (cluster expansion zoom, the next animation frame) are requested here and
//! delivered back by the host through the engine's `resolve_*` / `tick`
//! entry points.

use serde_json::Value;

use crate::camera::{LngLat, LngLatBounds, Padding, Point};
use crate::error::SurfaceError;
use crate::feature::PointFeature;
use crate::layers::LayerSpec;
use crate::source::SourceSpec;

pub trait MapSurface {
    // --- Controls / lifecycle ---

    /// Attach the navigation (zoom/compass) and scale controls.
    fn add_controls(&mut self);

    /// Detach the controls added by [`MapSurface::add_controls`].
    fn remove_controls(&mut self);

    /// Destroy the underlying map. No method is called afterwards.
    fn dispose(&mut self);

    // --- Sources ---

    fn has_source(&self, id: &str) -> bool;

    /// # Errors
    ///
    /// [`SurfaceError::DuplicateSource`] if the id is taken, or
    /// [`SurfaceError::Rejected`] if the renderer refuses the spec.
    fn add_source(&mut self, id: &str, spec: &SourceSpec) -> Result<(), SurfaceError>;

    /// Replace the data of an existing GeoJSON source in place.
    ///
    /// # Errors
    ///
    /// [`SurfaceError::MissingSource`] or [`SurfaceError::Rejected`].
    fn set_source_data(&mut self, id: &str, data: &Value) -> Result<(), SurfaceError>;

    /// # Errors
    ///
    /// [`SurfaceError::MissingSource`], or [`SurfaceError::Rejected`] while a
    /// layer still references the source.
    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError>;

    // --- Layers ---

    fn has_layer(&self, id: &str) -> bool;

    /// Add a layer on top of the existing ones.
    ///
    /// # Errors
    ///
    /// [`SurfaceError::MissingSource`] if the layer's source does not exist,
    /// [`SurfaceError::DuplicateLayer`] if the id is taken.
    fn add_layer(&mut self, layer: &LayerSpec) -> Result<(), SurfaceError>;

    /// # Errors
    ///
    /// [`SurfaceError::MissingLayer`].
    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError>;

    /// # Errors
    ///
    /// [`SurfaceError::MissingLayer`].
    fn set_filter(&mut self, layer_id: &str, filter: &Value) -> Result<(), SurfaceError>;

    // --- Camera ---

    /// Animated flight to `center` at `zoom`.
    fn fly_to(&mut self, center: LngLat, zoom: f64, duration_ms: u32);

    /// Eased (non-flight) transition to `center` at `zoom`.
    fn ease_to(&mut self, center: LngLat, zoom: f64, duration_ms: u32);

    fn fit_bounds(&mut self, bounds: &LngLatBounds, padding: Padding, max_zoom: f64, duration_ms: u32);

    /// Re-read the container size and resize the drawing buffer.
    fn resize(&mut self);

    /// A user gesture or camera animation is in progress.
    fn is_moving(&self) -> bool;

    // --- Queries ---

    /// Features rendered by `layer_id` under `point`, topmost first.
    fn query_rendered_features(&self, point: Point, layer_id: &str) -> Vec<PointFeature>;

    /// Ask the renderer for the zoom at which `cluster_id` splits apart. The
    /// answer arrives later through `MapEngine::resolve_cluster_expansion`.
    fn request_cluster_expansion_zoom(&mut self, source_id: &str, cluster_id: u64);

    /// Ask the host to call `MapEngine::tick` on the next animation frame.
    fn request_frame(&mut self);
}
