//! Camera framing for a snapshot.
//!
//! One lab plus an active selection flies in close. Anything else non-empty
//! fits the bounding box, capped at `fit_max_zoom`. An empty snapshot leaves
//! the camera alone.

#[cfg(test)]
#[path = "fit_test.rs"]
mod fit_test;

use tracing::debug;

use crate::camera::{LngLat, LngLatBounds, Padding};
use crate::config::{MAX_ZOOM, MapConfig};
use crate::feature::FeatureCollection;
use crate::surface::MapSurface;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraMove {
    FlyTo { center: LngLat, zoom: f64, duration_ms: u32 },
    FitBounds { bounds: LngLatBounds, padding: Padding, max_zoom: f64, duration_ms: u32 },
}

impl CameraMove {
    pub fn apply<S: MapSurface>(&self, surface: &mut S) {
        match *self {
            Self::FlyTo { center, zoom, duration_ms } => surface.fly_to(center, zoom, duration_ms),
            Self::FitBounds { bounds, padding, max_zoom, duration_ms } => {
                surface.fit_bounds(&bounds, padding, max_zoom, duration_ms);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportFitter {
    focus_zoom: f64,
    focus_duration_ms: u32,
    padding: Padding,
    max_zoom: f64,
    fit_duration_ms: u32,
}

impl ViewportFitter {
    #[must_use]
    pub fn new(config: &MapConfig) -> Self {
        Self {
            focus_zoom: usable_zoom(config.focus_zoom),
            focus_duration_ms: config.focus_duration_ms,
            padding: config.padding(),
            max_zoom: usable_zoom(config.fit_max_zoom),
            fit_duration_ms: config.fit_duration_ms,
        }
    }

    /// Decide how to frame `collection`.
    #[must_use]
    pub fn plan(&self, collection: &FeatureCollection, selection_active: bool) -> Option<CameraMove> {
        match collection.features() {
            [] => None,
            [only] if selection_active => Some(CameraMove::FlyTo {
                center: only.coordinates,
                zoom: self.focus_zoom,
                duration_ms: self.focus_duration_ms,
            }),
            _ => collection.bounds().map(|bounds| CameraMove::FitBounds {
                bounds,
                padding: self.padding,
                max_zoom: self.max_zoom,
                duration_ms: self.fit_duration_ms,
            }),
        }
    }

    /// Frame a new snapshot.
    pub fn fit<S: MapSurface>(
        &self,
        surface: &mut S,
        collection: &FeatureCollection,
        selection_active: bool,
    ) -> Option<CameraMove> {
        let planned = self.plan(collection, selection_active)?;
        debug!(?planned, count = collection.len(), "framing snapshot");
        planned.apply(surface);
        Some(planned)
    }

    /// React to a selection change on an unchanged snapshot. Only the
    /// single-lab fly-in applies; a multi-lab view is not re-fitted just
    /// because the outline moved.
    pub fn focus<S: MapSurface>(
        &self,
        surface: &mut S,
        collection: &FeatureCollection,
        selection_active: bool,
    ) -> Option<CameraMove> {
        match self.plan(collection, selection_active)? {
            planned @ CameraMove::FlyTo { .. } => {
                debug!(?planned, "focusing selected lab");
                planned.apply(surface);
                Some(planned)
            }
            CameraMove::FitBounds { .. } => None,
        }
    }
}

/// Pin a configured zoom into `0..=MAX_ZOOM`; NaN becomes zero.
fn usable_zoom(zoom: f64) -> f64 {
    if zoom.is_nan() { 0.0 } else { zoom.clamp(0.0, MAX_ZOOM) }
}
