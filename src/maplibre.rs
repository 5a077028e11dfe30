//! Browser host: [`MapSurface`] over `maplibregl.Map`, and the `LabMap` class
//! the page drives.
//!
//! The engine lives in an `Rc<RefCell<_>>`. Map events, resize observations,
//! animation frames and cluster-expansion promises all re-enter it through a
//! `Weak` handle once the current borrow has ended, so nothing here runs
//! while the engine is mid-call. The page's select callback runs after the
//! engine borrow ends; its error callback is deferred to a fresh task, since
//! errors are reported from inside engine calls. Either way the page may call
//! straight back into `LabMap`.
//!
//! Expects the MapLibre GL JS bundle to be loaded as the `maplibregl` global.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use js_sys::{Array, Function, JSON, Reflect};
use serde_json::{Value, json};
use tracing::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{ResizeObserver, ResizeObserverEntry};

use crate::camera::{LngLat, LngLatBounds, Padding, Point, ViewportSize};
use crate::config::MapConfig;
use crate::engine::MapEngine;
use crate::error::{BindError, SurfaceError};
use crate::feature::{FeatureCollection, FeatureId, PointFeature};
use crate::filter::{LabFilter, pathogen_vocabulary, research_type_vocabulary};
use crate::layers::LayerSpec;
use crate::selection::ClickOutcome;
use crate::source::SourceSpec;
use crate::surface::MapSurface;

mod ffi {
    use js_sys::Function;
    use wasm_bindgen::prelude::*;

    #[wasm_bindgen]
    extern "C" {
        #[wasm_bindgen(js_namespace = maplibregl)]
        pub type Map;

        #[wasm_bindgen(constructor, js_namespace = maplibregl, catch)]
        pub fn new(options: &JsValue) -> Result<Map, JsValue>;

        #[wasm_bindgen(method, js_name = addControl)]
        pub fn add_control(this: &Map, control: &JsValue, position: &str);

        #[wasm_bindgen(method, js_name = removeControl)]
        pub fn remove_control(this: &Map, control: &JsValue);

        #[wasm_bindgen(method)]
        pub fn remove(this: &Map);

        #[wasm_bindgen(method, js_name = getSource)]
        pub fn get_source(this: &Map, id: &str) -> JsValue;

        #[wasm_bindgen(method, catch, js_name = addSource)]
        pub fn add_source(this: &Map, id: &str, spec: &JsValue) -> Result<(), JsValue>;

        #[wasm_bindgen(method, catch, js_name = removeSource)]
        pub fn remove_source(this: &Map, id: &str) -> Result<(), JsValue>;

        #[wasm_bindgen(method, js_name = getLayer)]
        pub fn get_layer(this: &Map, id: &str) -> JsValue;

        #[wasm_bindgen(method, catch, js_name = addLayer)]
        pub fn add_layer(this: &Map, layer: &JsValue) -> Result<(), JsValue>;

        #[wasm_bindgen(method, catch, js_name = removeLayer)]
        pub fn remove_layer(this: &Map, id: &str) -> Result<(), JsValue>;

        #[wasm_bindgen(method, catch, js_name = setFilter)]
        pub fn set_filter(this: &Map, layer_id: &str, filter: &JsValue) -> Result<(), JsValue>;

        #[wasm_bindgen(method, js_name = flyTo)]
        pub fn fly_to(this: &Map, options: &JsValue);

        #[wasm_bindgen(method, js_name = easeTo)]
        pub fn ease_to(this: &Map, options: &JsValue);

        #[wasm_bindgen(method, js_name = fitBounds)]
        pub fn fit_bounds(this: &Map, bounds: &JsValue, options: &JsValue);

        #[wasm_bindgen(method)]
        pub fn resize(this: &Map);

        #[wasm_bindgen(method, js_name = isMoving)]
        pub fn is_moving(this: &Map) -> bool;

        #[wasm_bindgen(method, catch, js_name = queryRenderedFeatures)]
        pub fn query_rendered_features(this: &Map, point: &JsValue, options: &JsValue) -> Result<js_sys::Array, JsValue>;

        #[wasm_bindgen(method)]
        pub fn on(this: &Map, event: &str, listener: &Function);

        #[wasm_bindgen(js_namespace = maplibregl)]
        pub type NavigationControl;

        #[wasm_bindgen(constructor, js_namespace = maplibregl)]
        pub fn new() -> NavigationControl;

        #[wasm_bindgen(js_namespace = maplibregl)]
        pub type ScaleControl;

        #[wasm_bindgen(constructor, js_namespace = maplibregl)]
        pub fn new() -> ScaleControl;

        pub type GeoJsonSource;

        #[wasm_bindgen(method, catch, js_name = setData)]
        pub fn set_data(this: &GeoJsonSource, data: &JsValue) -> Result<(), JsValue>;

        #[wasm_bindgen(method, js_name = getClusterExpansionZoom)]
        pub fn get_cluster_expansion_zoom(this: &GeoJsonSource, cluster_id: f64) -> Pending;

        /// The promise returned by `getClusterExpansionZoom`.
        pub type Pending;

        #[wasm_bindgen(method)]
        pub fn then(this: &Pending, on_ok: &Function, on_err: &Function);
    }
}

type SharedEngine = Rc<RefCell<MapEngine<MaplibreSurface>>>;
type WeakEngine = Weak<RefCell<MapEngine<MaplibreSurface>>>;
type Listener = Closure<dyn FnMut(JsValue)>;

// ── JS interop helpers ──────────────────────────────────────────

fn to_js(value: &Value) -> JsValue {
    match JSON::parse(&value.to_string()) {
        Ok(js) => js,
        Err(e) => {
            warn!(error = %js_error(&e), "json value did not convert to js; passing null");
            JsValue::NULL
        }
    }
}

fn from_js(value: &JsValue) -> Option<Value> {
    if value.is_undefined() {
        return None;
    }
    let text = match JSON::stringify(value) {
        Ok(text) => String::from(text),
        Err(e) => {
            warn!(error = %js_error(&e), "js value is not serializable");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "js value did not convert to json");
            None
        }
    }
}

fn js_error(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        return s;
    }
    if let Ok(message) = Reflect::get(value, &JsValue::from_str("message")) {
        if let Some(s) = message.as_string() {
            return s;
        }
    }
    format!("{value:?}")
}

fn rejected(value: &JsValue) -> SurfaceError {
    SurfaceError::Rejected(js_error(value))
}

/// Run `f` against the engine if it is still alive and not mid-call.
fn with_engine<R>(engine: &WeakEngine, f: impl FnOnce(&mut MapEngine<MaplibreSurface>) -> R) -> Option<R> {
    let rc = engine.upgrade()?;
    let Ok(mut guard) = rc.try_borrow_mut() else {
        warn!("map engine busy; event dropped");
        return None;
    };
    Some(f(&mut guard))
}

/// Run `f` on a fresh task.
fn defer(f: impl FnOnce() + 'static) {
    let callback = Closure::once_into_js(f);
    let Some(window) = web_sys::window() else {
        return;
    };
    if let Err(e) = window.set_timeout_with_callback(callback.unchecked_ref()) {
        warn!(error = %js_error(&e), "failed to schedule callback");
    }
}

// ── Surface ─────────────────────────────────────────────────────

/// [`MapSurface`] backed by a `maplibregl.Map`.
pub struct MaplibreSurface {
    map: ffi::Map,
    controls: Vec<JsValue>,
    engine: WeakEngine,
}

impl MaplibreSurface {
    fn create(container: &str, config: &MapConfig, engine: WeakEngine) -> Result<Self, SurfaceError> {
        let options = json!({
            "container": container,
            "style": config.style_url,
            "center": config.initial_camera.center.to_array(),
            "zoom": config.initial_camera.zoom,
        });
        let map = ffi::Map::new(&to_js(&options)).map_err(|e| SurfaceError::Runtime(js_error(&e)))?;
        Ok(Self { map, controls: Vec::new(), engine })
    }

    fn geojson_source(&self, id: &str) -> Result<ffi::GeoJsonSource, SurfaceError> {
        let source = self.map.get_source(id);
        if source.is_undefined() || source.is_null() {
            return Err(SurfaceError::MissingSource(id.to_string()));
        }
        Ok(source.unchecked_into())
    }
}

impl MapSurface for MaplibreSurface {
    fn add_controls(&mut self) {
        let navigation: JsValue = ffi::NavigationControl::new().into();
        let scale: JsValue = ffi::ScaleControl::new().into();
        self.map.add_control(&navigation, "top-right");
        self.map.add_control(&scale, "bottom-left");
        self.controls = vec![navigation, scale];
    }

    fn remove_controls(&mut self) {
        for control in self.controls.drain(..) {
            self.map.remove_control(&control);
        }
    }

    fn dispose(&mut self) {
        self.map.remove();
    }

    fn has_source(&self, id: &str) -> bool {
        let source = self.map.get_source(id);
        !(source.is_undefined() || source.is_null())
    }

    fn add_source(&mut self, id: &str, spec: &SourceSpec) -> Result<(), SurfaceError> {
        if self.has_source(id) {
            return Err(SurfaceError::DuplicateSource(id.to_string()));
        }
        self.map.add_source(id, &to_js(&spec.to_style_json())).map_err(|e| rejected(&e))
    }

    fn set_source_data(&mut self, id: &str, data: &Value) -> Result<(), SurfaceError> {
        self.geojson_source(id)?.set_data(&to_js(data)).map_err(|e| rejected(&e))
    }

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        if !self.has_source(id) {
            return Err(SurfaceError::MissingSource(id.to_string()));
        }
        self.map.remove_source(id).map_err(|e| rejected(&e))
    }

    fn has_layer(&self, id: &str) -> bool {
        let layer = self.map.get_layer(id);
        !(layer.is_undefined() || layer.is_null())
    }

    fn add_layer(&mut self, layer: &LayerSpec) -> Result<(), SurfaceError> {
        if !self.has_source(&layer.source) {
            return Err(SurfaceError::MissingSource(layer.source.clone()));
        }
        if self.has_layer(&layer.id) {
            return Err(SurfaceError::DuplicateLayer(layer.id.clone()));
        }
        self.map.add_layer(&to_js(&layer.to_style_json())).map_err(|e| rejected(&e))
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        if !self.has_layer(id) {
            return Err(SurfaceError::MissingLayer(id.to_string()));
        }
        self.map.remove_layer(id).map_err(|e| rejected(&e))
    }

    fn set_filter(&mut self, layer_id: &str, filter: &Value) -> Result<(), SurfaceError> {
        if !self.has_layer(layer_id) {
            return Err(SurfaceError::MissingLayer(layer_id.to_string()));
        }
        self.map.set_filter(layer_id, &to_js(filter)).map_err(|e| rejected(&e))
    }

    fn fly_to(&mut self, center: LngLat, zoom: f64, duration_ms: u32) {
        let options = json!({ "center": center.to_array(), "zoom": zoom, "duration": duration_ms, "essential": true });
        self.map.fly_to(&to_js(&options));
    }

    fn ease_to(&mut self, center: LngLat, zoom: f64, duration_ms: u32) {
        let options = json!({ "center": center.to_array(), "zoom": zoom, "duration": duration_ms });
        self.map.ease_to(&to_js(&options));
    }

    fn fit_bounds(&mut self, bounds: &LngLatBounds, padding: Padding, max_zoom: f64, duration_ms: u32) {
        let options = json!({
            "padding": { "top": padding.top, "right": padding.right, "bottom": padding.bottom, "left": padding.left },
            "maxZoom": max_zoom,
            "duration": duration_ms,
        });
        self.map.fit_bounds(&to_js(&json!(bounds.to_array())), &to_js(&options));
    }

    fn resize(&mut self) {
        self.map.resize();
    }

    fn is_moving(&self) -> bool {
        self.map.is_moving()
    }

    fn query_rendered_features(&self, point: Point, layer_id: &str) -> Vec<PointFeature> {
        let options = json!({ "layers": [layer_id] });
        match self.map.query_rendered_features(&to_js(&json!([point.x, point.y])), &to_js(&options)) {
            Ok(features) => features
                .iter()
                .filter_map(|f| from_js(&f))
                .filter_map(|v| PointFeature::from_geojson(&v))
                .collect(),
            Err(e) => {
                warn!(layer_id, error = %js_error(&e), "feature query failed");
                Vec::new()
            }
        }
    }

    fn request_cluster_expansion_zoom(&mut self, source_id: &str, cluster_id: u64) {
        let source = match self.geojson_source(source_id) {
            Ok(source) => source,
            Err(e) => {
                warn!(cluster_id, error = %e, "cannot expand cluster");
                return;
            }
        };

        let engine = self.engine.clone();
        let on_ok = Closure::once_into_js(move |zoom: JsValue| {
            let zoom = zoom
                .as_f64()
                .ok_or_else(|| SurfaceError::Rejected("expansion zoom is not a number".to_string()));
            with_engine(&engine, |e| e.resolve_cluster_expansion(cluster_id, zoom));
        });
        let engine = self.engine.clone();
        let on_err = Closure::once_into_js(move |error: JsValue| {
            let error = SurfaceError::Runtime(js_error(&error));
            with_engine(&engine, |e| e.resolve_cluster_expansion(cluster_id, Err(error)));
        });

        #[allow(clippy::cast_precision_loss)]
        let id = cluster_id as f64;
        source.get_cluster_expansion_zoom(id).then(on_ok.unchecked_ref(), on_err.unchecked_ref());
    }

    fn request_frame(&mut self) {
        let engine = self.engine.clone();
        let callback = Closure::once_into_js(move || {
            with_engine(&engine, MapEngine::tick);
        });
        let Some(window) = web_sys::window() else {
            return;
        };
        if let Err(e) = window.request_animation_frame(callback.unchecked_ref()) {
            warn!(error = %js_error(&e), "failed to request animation frame");
        }
    }
}

// ── Page-facing class ───────────────────────────────────────────

/// A lab map bound to one page element.
///
/// ```js
/// const map = new LabMap("map", "{}");
/// map.onSelect((props) => showDetails(props));
/// map.setData(await (await fetch("/api/labs")).text());
/// map.setSelection("lab-42");
/// ```
#[wasm_bindgen]
pub struct LabMap {
    engine: SharedEngine,
    observer: Option<ResizeObserver>,
    listeners: Vec<Listener>,
    on_select: Rc<RefCell<Option<Function>>>,
    on_error: Rc<RefCell<Option<Function>>>,
}

#[wasm_bindgen]
impl LabMap {
    /// Create the map inside the element with id `container`. `config_json`
    /// may be empty for defaults.
    ///
    /// # Errors
    ///
    /// Throws on invalid config, a missing element, or map creation failure.
    #[wasm_bindgen(constructor)]
    pub fn new(container: &str, config_json: &str) -> Result<LabMap, JsValue> {
        let config = if config_json.trim().is_empty() {
            MapConfig::default()
        } else {
            MapConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?
        };
        let element = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(container))
            .ok_or_else(|| JsValue::from_str(&BindError::MissingContainer.to_string()))?;

        let engine: SharedEngine = Rc::new(RefCell::new(MapEngine::new(config.clone())));
        let weak = Rc::downgrade(&engine);
        engine
            .borrow_mut()
            .acquire(container, |id| MaplibreSurface::create(id, &config, weak.clone()))
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let mut map = Self {
            engine,
            observer: None,
            listeners: Vec::new(),
            on_select: Rc::new(RefCell::new(None)),
            on_error: Rc::new(RefCell::new(None)),
        };
        map.wire_error_channel();
        map.wire_map_events(&weak);
        map.observe_container(&weak, &element);
        Ok(map)
    }

    /// Replace the labs with a GeoJSON `FeatureCollection`.
    ///
    /// # Errors
    ///
    /// Throws if the payload is not a decodable collection.
    #[wasm_bindgen(js_name = setData)]
    pub fn set_data(&self, geojson: &str) -> Result<(), JsValue> {
        let mut engine = self.engine.try_borrow_mut().map_err(|_| JsValue::from_str("map engine busy"))?;
        engine.set_geojson(geojson).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Highlight the lab with this id; `null` clears the highlight.
    ///
    /// # Errors
    ///
    /// Throws if called from inside a map callback.
    #[wasm_bindgen(js_name = setSelection)]
    pub fn set_selection(&self, id: JsValue) -> Result<(), JsValue> {
        let selected = from_js(&id).as_ref().and_then(FeatureId::from_value);
        let mut engine = self.engine.try_borrow_mut().map_err(|_| JsValue::from_str("map engine busy"))?;
        engine.set_selection(selected);
        Ok(())
    }

    /// Show only labs matching `filter_json` (`{"bsl_level", "country",
    /// "pathogen", "research_type"}`, all optional). An empty string or `{}`
    /// shows everything.
    ///
    /// # Errors
    ///
    /// Throws on a malformed filter, or if called from inside a map callback.
    #[wasm_bindgen(js_name = setFilter)]
    pub fn set_filter(&self, filter_json: &str) -> Result<(), JsValue> {
        let filter = if filter_json.trim().is_empty() {
            LabFilter::default()
        } else {
            serde_json::from_str(filter_json).map_err(|e| JsValue::from_str(&e.to_string()))?
        };
        let mut engine = self.engine.try_borrow_mut().map_err(|_| JsValue::from_str("map engine busy"))?;
        engine.set_filter(filter);
        Ok(())
    }

    /// Sorted pathogen tags across the unfiltered labs.
    ///
    /// # Errors
    ///
    /// Throws if called from inside a map callback.
    pub fn pathogens(&self) -> Result<JsValue, JsValue> {
        self.vocabulary(pathogen_vocabulary)
    }

    /// Sorted research-type tags across the unfiltered labs.
    ///
    /// # Errors
    ///
    /// Throws if called from inside a map callback.
    #[wasm_bindgen(js_name = researchTypes)]
    pub fn research_types(&self) -> Result<JsValue, JsValue> {
        self.vocabulary(research_type_vocabulary)
    }

    /// `callback(properties)` when a lab is clicked.
    #[wasm_bindgen(js_name = onSelect)]
    pub fn on_select(&self, callback: Function) {
        *self.on_select.borrow_mut() = Some(callback);
    }

    /// `callback(message)` for non-fatal map errors.
    #[wasm_bindgen(js_name = onError)]
    pub fn on_error(&self, callback: Function) {
        *self.on_error.borrow_mut() = Some(callback);
    }

    /// Tear the map down. Also runs when the object is freed.
    pub fn release(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
        match self.engine.try_borrow_mut() {
            Ok(mut engine) => engine.release(),
            Err(_) => warn!("map engine busy; release skipped"),
        }
        *self.on_select.borrow_mut() = None;
        *self.on_error.borrow_mut() = None;
    }
}

impl LabMap {
    fn vocabulary(&self, tags: fn(&FeatureCollection) -> Vec<String>) -> Result<JsValue, JsValue> {
        let engine = self.engine.try_borrow().map_err(|_| JsValue::from_str("map engine busy"))?;
        let tags = engine.unfiltered().map(tags).unwrap_or_default();
        Ok(to_js(&json!(tags)))
    }

    fn wire_error_channel(&self) {
        let sink = Rc::clone(&self.on_error);
        self.engine.borrow_mut().on_error(move |error| {
            let message = error.to_string();
            let sink = Rc::clone(&sink);
            defer(move || {
                if let Some(callback) = sink.borrow().as_ref() {
                    if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from_str(&message)) {
                        warn!(error = %js_error(&e), "error callback threw");
                    }
                }
            });
        });
    }

    fn wire_map_events(&mut self, weak: &WeakEngine) {
        let engine = weak.clone();
        let load = Closure::<dyn FnMut(JsValue)>::new(move |_event: JsValue| {
            with_engine(&engine, MapEngine::handle_style_load);
        });

        let engine = weak.clone();
        let error = Closure::<dyn FnMut(JsValue)>::new(move |event: JsValue| {
            let inner = Reflect::get(&event, &JsValue::from_str("error")).unwrap_or(event);
            let error = SurfaceError::Runtime(js_error(&inner));
            with_engine(&engine, |e| e.handle_error(error));
        });

        let engine = weak.clone();
        let sink = Rc::clone(&self.on_select);
        let click = Closure::<dyn FnMut(JsValue)>::new(move |event: JsValue| {
            let Some(point) = event_point(&event) else {
                return;
            };
            let Some(ClickOutcome::Selected(selected)) = with_engine(&engine, |e| e.handle_click(point)) else {
                return;
            };
            if let Some(callback) = sink.borrow().as_ref() {
                let props = to_js(&Value::Object(selected.properties));
                if let Err(e) = callback.call1(&JsValue::NULL, &props) {
                    warn!(error = %js_error(&e), "select callback threw");
                }
            }
        });

        if let Some(surface) = self.engine.borrow().surface() {
            surface.map.on("load", load.as_ref().unchecked_ref());
            surface.map.on("error", error.as_ref().unchecked_ref());
            surface.map.on("click", click.as_ref().unchecked_ref());
        }
        self.listeners.extend([load, error, click]);
    }

    fn observe_container(&mut self, weak: &WeakEngine, element: &web_sys::Element) {
        let engine = weak.clone();
        let on_resize = Closure::<dyn FnMut(JsValue)>::new(move |entries: JsValue| {
            let entries: Array = entries.unchecked_into();
            let Ok(entry) = entries.get(0).dyn_into::<ResizeObserverEntry>() else {
                return;
            };
            let rect = entry.content_rect();
            with_engine(&engine, |e| e.handle_resize(ViewportSize::new(rect.width(), rect.height())));
        });
        match ResizeObserver::new(on_resize.as_ref().unchecked_ref()) {
            Ok(observer) => {
                observer.observe(element);
                self.observer = Some(observer);
                self.listeners.push(on_resize);
            }
            Err(e) => warn!(error = %js_error(&e), "resize observer unavailable"),
        }
    }
}

impl Drop for LabMap {
    fn drop(&mut self) {
        self.release();
    }
}

fn event_point(event: &JsValue) -> Option<Point> {
    let point = Reflect::get(event, &JsValue::from_str("point")).unwrap_or(JsValue::UNDEFINED);
    let x = Reflect::get(&point, &JsValue::from_str("x")).unwrap_or(JsValue::UNDEFINED).as_f64()?;
    let y = Reflect::get(&point, &JsValue::from_str("y")).unwrap_or(JsValue::UNDEFINED).as_f64()?;
    Some(Point::new(x, y))
}
