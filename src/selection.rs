//! Selection state, the selection-layer filter, and click handling.
//!
//! A feature is addressed by its *selection key*: the top-level id, else the
//! `id` property, else the institution name, compared as a string. The key is
//! resolved once by [`PointFeature::selection_key`] and written into the
//! encoded feature, and the filter only reads that property. The renderer's
//! own id handling never enters into it, so what the host selects is exactly
//! what the outline layer draws.
//!
//! Cluster clicks are two-phase. The click asks the surface for the cluster's
//! expansion zoom and records a ticket; the answer comes back through
//! [`SelectionTracker::resolve_expansion`], which drops it if the data changed
//! in between.
//!
//! [`PointFeature::selection_key`]: crate::feature::PointFeature::selection_key

#[cfg(test)]
#[path = "selection_test.rs"]
mod selection_test;

use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::camera::{LngLat, Point};
use crate::consts::{
    CLUSTER_ID_KEY, CLUSTER_LAYER_ID, NO_SELECTION_SENTINEL, POINT_LAYER_ID, SELECTION_KEY_PROP, SELECTION_LAYER_ID,
    SOURCE_ID,
};
use crate::error::SurfaceError;
use crate::feature::FeatureId;
use crate::layers::unclustered_filter;
use crate::surface::MapSurface;

/// Expression reading a feature's precomputed selection key.
#[must_use]
pub fn selection_key_expr() -> Value {
    json!(["get", SELECTION_KEY_PROP])
}

/// Filter for the selection layer. With no selection it compares against a
/// sentinel no feature can carry, so the layer stays declared but empty.
#[must_use]
pub fn selection_filter(selected: Option<&str>) -> Value {
    let key = selected.unwrap_or(NO_SELECTION_SENTINEL);
    json!(["all", unclustered_filter(), ["==", selection_key_expr(), key]])
}

/// Payload of the selection-change callback.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionEvent {
    /// Selection key of the clicked lab, if it has one.
    pub key: Option<String>,
    /// The clicked lab's full property bag.
    pub properties: Map<String, Value>,
}

/// What a click resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// A cluster was hit; its expansion zoom has been requested.
    ExpandCluster { cluster_id: u64 },
    /// An individual lab was hit.
    Selected(SelectionEvent),
    /// Nothing interactive under the pointer.
    Miss,
}

/// What an expansion reply resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpansionOutcome {
    /// The camera eased to the cluster center at `zoom`.
    Eased { center: LngLat, zoom: f64 },
    /// The reply did not match the outstanding request, or the data changed.
    Stale,
    /// The surface could not compute the zoom.
    Failed(SurfaceError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingExpansion {
    cluster_id: u64,
    center: LngLat,
    data_version: u64,
}

/// Tracks the desired selection and the outstanding cluster expansion.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    selected: Option<FeatureId>,
    pending: Option<PendingExpansion>,
}

impl SelectionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn selected(&self) -> Option<&FeatureId> {
        self.selected.as_ref()
    }

    /// Record the desired selection. Returns `false` if it did not change.
    pub fn set(&mut self, selected: Option<FeatureId>) -> bool {
        if self.selected == selected {
            return false;
        }
        self.selected = selected;
        true
    }

    /// Push the desired selection into the selection layer's filter. Returns
    /// `Ok(false)` when the layer does not exist yet; the selection stays
    /// recorded and is applied once the layers are created.
    ///
    /// # Errors
    ///
    /// The surface's error if it refuses the filter.
    pub fn apply<S: MapSurface>(&self, surface: &mut S) -> Result<bool, SurfaceError> {
        if !surface.has_layer(SELECTION_LAYER_ID) {
            debug!(selected = ?self.selected, "selection layer not ready; selection queued");
            return Ok(false);
        }
        let key = self.selected.as_ref().map(FeatureId::key);
        surface.set_filter(SELECTION_LAYER_ID, &selection_filter(key.as_deref()))?;
        Ok(true)
    }

    /// Resolve a click at `point`. Clusters take precedence over labs since
    /// the two never overlap at the same zoom.
    pub fn click<S: MapSurface>(&mut self, surface: &mut S, point: Point, data_version: u64) -> ClickOutcome {
        if surface.has_layer(CLUSTER_LAYER_ID) {
            let hit = surface.query_rendered_features(point, CLUSTER_LAYER_ID).into_iter().find_map(|f| {
                let id = f.properties.get(CLUSTER_ID_KEY).and_then(Value::as_u64)?;
                Some((id, f.coordinates))
            });
            if let Some((cluster_id, center)) = hit {
                self.pending = Some(PendingExpansion { cluster_id, center, data_version });
                surface.request_cluster_expansion_zoom(SOURCE_ID, cluster_id);
                debug!(cluster_id, "cluster expansion requested");
                return ClickOutcome::ExpandCluster { cluster_id };
            }
        }

        if surface.has_layer(POINT_LAYER_ID) {
            if let Some(feature) = surface.query_rendered_features(point, POINT_LAYER_ID).into_iter().next() {
                let key = feature.selection_key();
                info!(key = key.as_deref().unwrap_or("<none>"), "lab clicked");
                let properties = feature.public_properties();
                return ClickOutcome::Selected(SelectionEvent { key, properties });
            }
        }
        ClickOutcome::Miss
    }

    /// Consume the outstanding expansion ticket for `cluster_id`. The camera
    /// eases to the cluster only if the ticket matches and the data has not
    /// changed since the click.
    pub fn resolve_expansion<S: MapSurface>(
        &mut self,
        surface: &mut S,
        cluster_id: u64,
        zoom: Result<f64, SurfaceError>,
        data_version: u64,
        duration_ms: u32,
    ) -> ExpansionOutcome {
        let Some(pending) = self.pending.filter(|p| p.cluster_id == cluster_id) else {
            debug!(cluster_id, "expansion reply without matching request");
            return ExpansionOutcome::Stale;
        };
        self.pending = None;
        if pending.data_version != data_version {
            debug!(cluster_id, clicked = pending.data_version, current = data_version, "expansion reply outdated");
            return ExpansionOutcome::Stale;
        }
        match zoom {
            Ok(zoom) if zoom.is_finite() => {
                surface.ease_to(pending.center, zoom, duration_ms);
                ExpansionOutcome::Eased { center: pending.center, zoom }
            }
            Ok(zoom) => ExpansionOutcome::Failed(SurfaceError::Rejected(format!("non-finite expansion zoom {zoom}"))),
            Err(e) => ExpansionOutcome::Failed(e),
        }
    }

    /// Forget any outstanding expansion ticket.
    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    #[must_use]
    pub fn has_pending_expansion(&self) -> bool {
        self.pending.is_some()
    }
}
