//! In-memory [`MapSurface`] for native hosts and tests.
//!
//! Keeps sources, layers and the camera as plain data and logs every
//! mutation as a [`SurfaceOp`], so callers can assert on ordering. Camera
//! moves complete instantly. Hit-testing projects each feature with the
//! current camera and compares the distance to the radius the layer's
//! `circle-radius` expression yields for that feature.
//!
//! Clustering is not simulated: clusters are injected with
//! [`HeadlessSurface::add_cluster`] and answer expansion requests through
//! [`HeadlessSurface::take_expansion_requests`].

#[cfg(test)]
#[path = "headless_test.rs"]
mod headless_test;

use serde_json::{Map, Value, json};

use crate::camera::{Camera, LngLat, LngLatBounds, Padding, Point, ViewportSize, camera_for_bounds};
use crate::consts::{CLUSTER_ID_KEY, POINT_COUNT_KEY};
use crate::error::SurfaceError;
use crate::feature::{FeatureCollection, FeatureId, PointFeature};
use crate::layers::{LayerKind, LayerSpec};
use crate::source::SourceSpec;
use crate::surface::MapSurface;

/// Hit radius for layers without a `circle-radius` (symbols).
const SYMBOL_HIT_PX: f64 = 8.0;

/// One recorded surface mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    AddControls,
    RemoveControls,
    AddSource(String),
    SetSourceData(String),
    RemoveSource(String),
    AddLayer(String),
    RemoveLayer(String),
    SetFilter(String),
    FlyTo { center: LngLat, zoom: f64 },
    EaseTo { center: LngLat, zoom: f64 },
    FitBounds { bounds: LngLatBounds, padding: Padding },
    Resize,
    RequestExpansion(u64),
    RequestFrame,
    Dispose,
}

/// A synthetic cluster point.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessCluster {
    pub id: u64,
    pub center: LngLat,
    pub point_count: u32,
}

impl HeadlessCluster {
    fn to_feature(&self) -> PointFeature {
        let mut props = Map::new();
        props.insert(POINT_COUNT_KEY.into(), json!(self.point_count));
        props.insert(CLUSTER_ID_KEY.into(), json!(self.id));
        props.insert("cluster".into(), json!(true));
        PointFeature::new(None, self.center, props)
    }
}

#[derive(Debug)]
struct HeadlessSource {
    id: String,
    spec: SourceSpec,
    features: FeatureCollection,
}

#[derive(Debug)]
pub struct HeadlessSurface {
    container: String,
    size: ViewportSize,
    camera: Camera,
    sources: Vec<HeadlessSource>,
    layers: Vec<LayerSpec>,
    clusters: Vec<HeadlessCluster>,
    controls: bool,
    disposed: bool,
    moving: bool,
    reject_data: u32,
    reject_add_source: u32,
    expansion_requests: Vec<u64>,
    frame_requested: bool,
    resizes: usize,
    ops: Vec<SurfaceOp>,
}

impl HeadlessSurface {
    #[must_use]
    pub fn new(container: &str, size: ViewportSize, camera: Camera) -> Self {
        Self {
            container: container.to_string(),
            size,
            camera,
            sources: Vec::new(),
            layers: Vec::new(),
            clusters: Vec::new(),
            controls: false,
            disposed: false,
            moving: false,
            reject_data: 0,
            reject_add_source: 0,
            expansion_requests: Vec::new(),
            frame_requested: false,
            resizes: 0,
            ops: Vec::new(),
        }
    }

    // --- Inspection ---

    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    #[must_use]
    pub fn camera(&self) -> Camera {
        self.camera
    }

    #[must_use]
    pub fn size(&self) -> ViewportSize {
        self.size
    }

    #[must_use]
    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Layer ids in paint order, bottom first.
    #[must_use]
    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    #[must_use]
    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Features currently held by a source.
    #[must_use]
    pub fn source_features(&self, id: &str) -> Option<&FeatureCollection> {
        self.source(id).map(|s| &s.features)
    }

    #[must_use]
    pub fn source_spec(&self, id: &str) -> Option<&SourceSpec> {
        self.source(id).map(|s| &s.spec)
    }

    /// Every source feature (and injected cluster) that passes the layer's
    /// filter, regardless of where it sits on screen.
    #[must_use]
    pub fn rendered(&self, layer_id: &str) -> Vec<PointFeature> {
        let Some(layer) = self.layer(layer_id) else {
            return Vec::new();
        };
        self.candidates(layer).into_iter().filter(|f| layer.matches(f)).collect()
    }

    /// Screen position of a coordinate under the current camera.
    #[must_use]
    pub fn project(&self, p: LngLat) -> Point {
        self.camera.project(p, self.size)
    }

    #[must_use]
    pub fn has_controls(&self) -> bool {
        self.controls
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[must_use]
    pub fn resize_count(&self) -> usize {
        self.resizes
    }

    /// Whether a frame was requested since the last call.
    pub fn take_frame_request(&mut self) -> bool {
        std::mem::take(&mut self.frame_requested)
    }

    /// Cluster expansion requests since the last call, oldest first.
    pub fn take_expansion_requests(&mut self) -> Vec<u64> {
        std::mem::take(&mut self.expansion_requests)
    }

    // --- Test controls ---

    pub fn set_moving(&mut self, moving: bool) {
        self.moving = moving;
    }

    pub fn set_size(&mut self, size: ViewportSize) {
        self.size = size;
    }

    /// Refuse the next `n` in-place data replacements.
    pub fn reject_data_updates(&mut self, n: u32) {
        self.reject_data = n;
    }

    /// Refuse the next `n` source additions.
    pub fn reject_source_adds(&mut self, n: u32) {
        self.reject_add_source = n;
    }

    pub fn add_cluster(&mut self, cluster: HeadlessCluster) {
        self.clusters.push(cluster);
    }

    // --- Internals ---

    fn source(&self, id: &str) -> Option<&HeadlessSource> {
        self.sources.iter().find(|s| s.id == id)
    }

    fn candidates(&self, layer: &LayerSpec) -> Vec<PointFeature> {
        let features = self.source(&layer.source).map(|s| s.features.features()).unwrap_or_default();
        features.iter().cloned().chain(self.clusters.iter().map(HeadlessCluster::to_feature)).collect()
    }

    fn hit_radius(layer: &LayerSpec, feature: &PointFeature) -> f64 {
        match layer.kind {
            LayerKind::Circle => {
                layer.paint_value("circle-radius", feature).and_then(|v| v.as_f64()).unwrap_or(0.0)
            }
            LayerKind::Symbol => SYMBOL_HIT_PX,
        }
    }

    /// Decode source data the way MapLibre's GeoJSON worker sees it: ids
    /// survive only when numeric, truncated to an integer.
    fn decode(data: &Value) -> Result<FeatureCollection, SurfaceError> {
        let collection = FeatureCollection::from_value(data.clone()).map_err(|e| SurfaceError::Rejected(e.to_string()))?;
        Ok(collection
            .iter()
            .map(|f| PointFeature::new(f.id.as_ref().and_then(renderer_id), f.coordinates, f.properties.clone()))
            .collect())
    }
}

impl MapSurface for HeadlessSurface {
    fn add_controls(&mut self) {
        self.controls = true;
        self.ops.push(SurfaceOp::AddControls);
    }

    fn remove_controls(&mut self) {
        self.controls = false;
        self.ops.push(SurfaceOp::RemoveControls);
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.sources.clear();
        self.layers.clear();
        self.ops.push(SurfaceOp::Dispose);
    }

    fn has_source(&self, id: &str) -> bool {
        self.source(id).is_some()
    }

    fn add_source(&mut self, id: &str, spec: &SourceSpec) -> Result<(), SurfaceError> {
        if self.has_source(id) {
            return Err(SurfaceError::DuplicateSource(id.to_string()));
        }
        if self.reject_add_source > 0 {
            self.reject_add_source -= 1;
            return Err(SurfaceError::Rejected(format!("source {id} refused")));
        }
        let features = Self::decode(&spec.data)?;
        self.sources.push(HeadlessSource { id: id.to_string(), spec: spec.clone(), features });
        self.ops.push(SurfaceOp::AddSource(id.to_string()));
        Ok(())
    }

    fn set_source_data(&mut self, id: &str, data: &Value) -> Result<(), SurfaceError> {
        if !self.has_source(id) {
            return Err(SurfaceError::MissingSource(id.to_string()));
        }
        if self.reject_data > 0 {
            self.reject_data -= 1;
            return Err(SurfaceError::Rejected(format!("data for {id} refused")));
        }
        let features = Self::decode(data)?;
        let Some(source) = self.sources.iter_mut().find(|s| s.id == id) else {
            return Err(SurfaceError::MissingSource(id.to_string()));
        };
        source.features = features;
        source.spec.data = data.clone();
        self.ops.push(SurfaceOp::SetSourceData(id.to_string()));
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        if let Some(layer) = self.layers.iter().find(|l| l.source == id) {
            return Err(SurfaceError::Rejected(format!("source {id} is in use by layer {}", layer.id)));
        }
        let before = self.sources.len();
        self.sources.retain(|s| s.id != id);
        if self.sources.len() == before {
            return Err(SurfaceError::MissingSource(id.to_string()));
        }
        self.ops.push(SurfaceOp::RemoveSource(id.to_string()));
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layer(id).is_some()
    }

    fn add_layer(&mut self, layer: &LayerSpec) -> Result<(), SurfaceError> {
        if !self.has_source(&layer.source) {
            return Err(SurfaceError::MissingSource(layer.source.clone()));
        }
        if self.has_layer(&layer.id) {
            return Err(SurfaceError::DuplicateLayer(layer.id.clone()));
        }
        self.layers.push(layer.clone());
        self.ops.push(SurfaceOp::AddLayer(layer.id.clone()));
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        let before = self.layers.len();
        self.layers.retain(|l| l.id != id);
        if self.layers.len() == before {
            return Err(SurfaceError::MissingLayer(id.to_string()));
        }
        self.ops.push(SurfaceOp::RemoveLayer(id.to_string()));
        Ok(())
    }

    fn set_filter(&mut self, layer_id: &str, filter: &Value) -> Result<(), SurfaceError> {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id == layer_id) else {
            return Err(SurfaceError::MissingLayer(layer_id.to_string()));
        };
        layer.filter = filter.clone();
        self.ops.push(SurfaceOp::SetFilter(layer_id.to_string()));
        Ok(())
    }

    fn fly_to(&mut self, center: LngLat, zoom: f64, _duration_ms: u32) {
        self.camera = Camera::new(center, zoom);
        self.ops.push(SurfaceOp::FlyTo { center, zoom });
    }

    fn ease_to(&mut self, center: LngLat, zoom: f64, _duration_ms: u32) {
        self.camera = Camera::new(center, zoom);
        self.ops.push(SurfaceOp::EaseTo { center, zoom });
    }

    fn fit_bounds(&mut self, bounds: &LngLatBounds, padding: Padding, max_zoom: f64, _duration_ms: u32) {
        if let Some(camera) = camera_for_bounds(bounds, padding, self.size, max_zoom) {
            self.camera = camera;
        }
        self.ops.push(SurfaceOp::FitBounds { bounds: *bounds, padding });
    }

    fn resize(&mut self) {
        self.resizes += 1;
        self.ops.push(SurfaceOp::Resize);
    }

    fn is_moving(&self) -> bool {
        self.moving
    }

    fn query_rendered_features(&self, point: Point, layer_id: &str) -> Vec<PointFeature> {
        let Some(layer) = self.layer(layer_id) else {
            return Vec::new();
        };
        if layer.min_zoom.is_some_and(|min| self.camera.zoom < min) {
            return Vec::new();
        }
        let mut hits: Vec<PointFeature> = self
            .candidates(layer)
            .into_iter()
            .filter(|f| layer.matches(f))
            .filter(|f| self.project(f.coordinates).distance(point) <= Self::hit_radius(layer, f))
            .collect();
        // Later features draw on top.
        hits.reverse();
        hits
    }

    fn request_cluster_expansion_zoom(&mut self, _source_id: &str, cluster_id: u64) {
        self.expansion_requests.push(cluster_id);
        self.ops.push(SurfaceOp::RequestExpansion(cluster_id));
    }

    fn request_frame(&mut self) {
        self.frame_requested = true;
        self.ops.push(SurfaceOp::RequestFrame);
    }
}

/// Top-level id as the renderer keeps it: numbers and numeric strings become
/// integers, everything else is dropped.
#[allow(clippy::cast_possible_truncation)]
fn renderer_id(id: &FeatureId) -> Option<FeatureId> {
    let n = match id {
        FeatureId::Number(n) => n.as_f64()?,
        FeatureId::Text(s) => match s.trim().parse::<f64>() {
            Ok(n) => n,
            Err(_) => return None,
        },
    };
    n.is_finite().then(|| FeatureId::from(n.trunc() as i64))
}
