//! The fixed set of visual layers drawn over the lab source.
//!
//! Four layers, created in this order (so later ones paint on top):
//!
//! | Layer | Kind | Shows |
//! |-------|------|-------|
//! | [`CLUSTER_LAYER_ID`] | circle | synthetic cluster points, sized and colored by `point_count` |
//! | [`POINT_LAYER_ID`] | circle | individual labs, sized by evidence, colored by BSL level |
//! | [`LABEL_LAYER_ID`] | symbol | institution names, above the point, from `label_min_zoom` |
//! | [`SELECTION_LAYER_ID`] | circle | outline around the selected lab |
//!
//! Every style decision is a [`serde_json::Value`] holding a MapLibre
//! expression, so the browser and the headless surface read the same thing.

#[cfg(test)]
#[path = "layers_test.rs"]
mod layers_test;

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::config::{ClusterBucket, MapConfig};
use crate::consts::{
    BSL_LEVEL_KEY, CLUSTER_LAYER_ID, EVIDENCE_COUNT_KEY, INSTITUTION_KEY, LABEL_LAYER_ID, POINT_COUNT_KEY,
    POINT_LAYER_ID, SELECTION_LAYER_ID, SOURCE_ID,
};
use crate::error::{LayerError, SurfaceError};
use crate::expr::{EvalContext, evaluate, is_truthy};
use crate::feature::{BslLevel, PointFeature};
use crate::selection::selection_filter;
use crate::surface::MapSurface;

/// Extra pixels the selection ring extends beyond the lab circle.
const SELECTION_RING_PX: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Circle,
    Symbol,
}

impl LayerKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Symbol => "symbol",
        }
    }
}

/// One style layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub kind: LayerKind,
    pub source: String,
    pub filter: Value,
    pub paint: Map<String, Value>,
    pub layout: Map<String, Value>,
    pub min_zoom: Option<f64>,
}

impl LayerSpec {
    fn new(id: &str, kind: LayerKind, filter: Value) -> Self {
        Self {
            id: id.to_string(),
            kind,
            source: SOURCE_ID.to_string(),
            filter,
            paint: Map::new(),
            layout: Map::new(),
            min_zoom: None,
        }
    }

    fn paint(mut self, key: &str, value: Value) -> Self {
        self.paint.insert(key.to_string(), value);
        self
    }

    fn layout(mut self, key: &str, value: Value) -> Self {
        self.layout.insert(key.to_string(), value);
        self
    }

    /// The MapLibre style-spec layer object.
    #[must_use]
    pub fn to_style_json(&self) -> Value {
        let mut layer = json!({
            "id": self.id,
            "type": self.kind.as_str(),
            "source": self.source,
            "filter": self.filter,
            "paint": Value::Object(self.paint.clone()),
            "layout": Value::Object(self.layout.clone()),
        });
        if let (Some(min_zoom), Some(obj)) = (self.min_zoom, layer.as_object_mut()) {
            obj.insert("minzoom".into(), json!(min_zoom));
        }
        layer
    }

    /// Whether `feature` passes this layer's filter.
    #[must_use]
    pub fn matches(&self, feature: &PointFeature) -> bool {
        is_truthy(&evaluate(&self.filter, &context(feature)))
    }

    /// Evaluate a paint property for `feature`. `None` if the layer does not
    /// set it.
    #[must_use]
    pub fn paint_value(&self, key: &str, feature: &PointFeature) -> Option<Value> {
        self.paint.get(key).map(|expr| evaluate(expr, &context(feature)))
    }
}

fn context(feature: &PointFeature) -> EvalContext<'_> {
    EvalContext::new(feature.id.as_ref(), &feature.properties)
}

// ── Expressions ─────────────────────────────────────────────────

fn is_cluster() -> Value {
    json!(["has", POINT_COUNT_KEY])
}

/// Filter that excludes synthetic cluster points.
#[must_use]
pub fn unclustered_filter() -> Value {
    json!(["!", is_cluster()])
}

fn evidence_radius(config: &MapConfig, extra_px: f64) -> Value {
    let mut expr = vec![json!("interpolate"), json!(["linear"]), json!(["to-number", ["get", EVIDENCE_COUNT_KEY], 0])];
    for stop in &config.evidence_radius {
        expr.push(json!(stop.evidence));
        expr.push(json!(stop.radius + extra_px));
    }
    Value::Array(expr)
}

fn bsl_color(config: &MapConfig) -> Value {
    let mut expr = vec![json!("match"), json!(["get", BSL_LEVEL_KEY])];
    for level in BslLevel::KNOWN {
        expr.push(json!(level.as_str()));
        expr.push(json!(config.palette.color(level)));
    }
    expr.push(json!(config.palette.unknown));
    Value::Array(expr)
}

fn cluster_step<F>(config: &MapConfig, pick: F) -> Value
where
    F: Fn(&ClusterBucket) -> Value,
{
    let mut buckets = config.cluster.buckets.iter();
    let mut expr = vec![json!("step"), json!(["get", POINT_COUNT_KEY])];
    if let Some(first) = buckets.next() {
        expr.push(pick(first));
    }
    for bucket in buckets {
        expr.push(json!(bucket.min_count));
        expr.push(pick(bucket));
    }
    Value::Array(expr)
}

// ── Layer builders ──────────────────────────────────────────────

#[must_use]
pub fn cluster_layer(config: &MapConfig) -> LayerSpec {
    LayerSpec::new(CLUSTER_LAYER_ID, LayerKind::Circle, is_cluster())
        .paint("circle-radius", cluster_step(config, |b| json!(b.radius)))
        .paint("circle-color", cluster_step(config, |b| json!(b.color)))
        .paint("circle-opacity", json!(0.85))
        .paint("circle-stroke-width", json!(1))
        .paint("circle-stroke-color", json!("#ffffff"))
}

#[must_use]
pub fn point_layer(config: &MapConfig) -> LayerSpec {
    LayerSpec::new(POINT_LAYER_ID, LayerKind::Circle, unclustered_filter())
        .paint("circle-radius", evidence_radius(config, 0.0))
        .paint("circle-color", bsl_color(config))
        .paint("circle-opacity", json!(0.9))
        .paint("circle-stroke-width", json!(1))
        .paint("circle-stroke-color", json!("#ffffff"))
}

#[must_use]
pub fn label_layer(config: &MapConfig) -> LayerSpec {
    let mut layer = LayerSpec::new(LABEL_LAYER_ID, LayerKind::Symbol, unclustered_filter())
        .layout("text-field", json!(["get", INSTITUTION_KEY]))
        .layout("text-font", json!(["Open Sans Semibold"]))
        .layout("text-size", json!(11))
        .layout("text-anchor", json!("bottom"))
        .layout("text-offset", json!([0, -1.2]))
        .layout("text-optional", json!(true))
        .layout("text-allow-overlap", json!(false))
        .paint("text-color", json!("#263238"))
        .paint("text-halo-color", json!("#ffffff"))
        .paint("text-halo-width", json!(1));
    layer.min_zoom = Some(config.label_min_zoom);
    layer
}

#[must_use]
pub fn selection_layer(config: &MapConfig) -> LayerSpec {
    LayerSpec::new(SELECTION_LAYER_ID, LayerKind::Circle, selection_filter(None))
        .paint("circle-radius", evidence_radius(config, SELECTION_RING_PX))
        .paint("circle-color", json!("rgba(0, 0, 0, 0)"))
        .paint("circle-stroke-color", json!(config.selection_color))
        .paint("circle-stroke-width", json!(config.selection_stroke_width))
}

// ── Layer set ───────────────────────────────────────────────────

/// The declared layers, in paint order.
#[derive(Debug, Clone)]
pub struct LayerSet {
    specs: Vec<LayerSpec>,
}

impl LayerSet {
    #[must_use]
    pub fn new(config: &MapConfig) -> Self {
        Self {
            specs: vec![cluster_layer(config), point_layer(config), label_layer(config), selection_layer(config)],
        }
    }

    #[must_use]
    pub fn specs(&self) -> &[LayerSpec] {
        &self.specs
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&LayerSpec> {
        self.specs.iter().find(|s| s.id == id)
    }

    /// Create every layer that does not exist yet, in paint order. Returns the
    /// number of layers added; calling it again adds nothing.
    ///
    /// # Errors
    ///
    /// [`LayerError::SourceMissing`] if the lab source is not bound, or the
    /// surface's error if it refuses a layer.
    pub fn ensure_layers<S: MapSurface>(&self, surface: &mut S) -> Result<usize, LayerError> {
        if !surface.has_source(SOURCE_ID) {
            return Err(LayerError::SourceMissing { source_id: SOURCE_ID.to_string() });
        }
        let mut added = 0;
        for spec in &self.specs {
            if surface.has_layer(&spec.id) {
                continue;
            }
            surface.add_layer(spec)?;
            added += 1;
        }
        if added > 0 {
            debug!(added, "layers created");
        }
        Ok(added)
    }

    /// All declared layers exist on the surface.
    #[must_use]
    pub fn all_present<S: MapSurface>(&self, surface: &S) -> bool {
        self.specs.iter().all(|s| surface.has_layer(&s.id))
    }

    /// Remove every declared layer that exists, topmost first.
    ///
    /// # Errors
    ///
    /// The first error the surface reports; earlier removals stay removed.
    pub fn remove_all<S: MapSurface>(&self, surface: &mut S) -> Result<usize, SurfaceError> {
        let mut removed = 0;
        for spec in self.specs.iter().rev() {
            if surface.has_layer(&spec.id) {
                surface.remove_layer(&spec.id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
