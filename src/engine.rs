//! The map engine: one explicit synchronization entry point over the session,
//! source binder, layer set, selection tracker and viewport fitter.
//!
//! The host owns an engine and forwards everything into it: data and
//! selection from the UI chrome; style load, errors, clicks, resizes, cluster
//! expansion replies and animation frames from the map. Nothing touches the
//! rendering state before the session is ready. Whatever arrived before then
//! is applied in one pass on the ready transition.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use tracing::{debug, warn};

use crate::camera::{Point, ViewportSize};
use crate::config::MapConfig;
use crate::error::{BindError, DataError, EngineError, SurfaceError};
use crate::feature::{FeatureCollection, FeatureId};
use crate::filter::LabFilter;
use crate::fit::ViewportFitter;
use crate::layers::LayerSet;
use crate::selection::{ClickOutcome, ExpansionOutcome, SelectionEvent, SelectionTracker};
use crate::session::{CanvasSession, SessionState};
use crate::source::{RebuildOutcome, Snapshot, SourceBinder, SyncOutcome};
use crate::surface::MapSurface;
use crate::viewport::{ResizeOutcome, ViewportMonitor};

type SelectionCallback = Box<dyn FnMut(&SelectionEvent)>;

/// Composes the map components around a single surface.
pub struct MapEngine<S: MapSurface> {
    config: MapConfig,
    session: CanvasSession<S>,
    monitor: ViewportMonitor,
    binder: SourceBinder,
    tracker: SelectionTracker,
    fitter: ViewportFitter,
    snapshot: Option<Snapshot>,
    /// Newest collection before filtering.
    unfiltered: Option<FeatureCollection>,
    filter: LabFilter,
    next_version: u64,
    selection_callbacks: Vec<SelectionCallback>,
}

impl<S: MapSurface> MapEngine<S> {
    #[must_use]
    pub fn new(config: MapConfig) -> Self {
        if let Err(e) = config.validate() {
            warn!(error = %e, "engine config failed validation; out-of-range zooms are pinned");
        }
        let layers = LayerSet::new(&config);
        let binder = SourceBinder::new(layers, config.cluster.clone(), config.max_rebuild_attempts);
        let fitter = ViewportFitter::new(&config);
        Self {
            config,
            session: CanvasSession::new(),
            monitor: ViewportMonitor::new(),
            binder,
            tracker: SelectionTracker::new(),
            fitter,
            snapshot: None,
            unfiltered: None,
            filter: LabFilter::default(),
            next_version: 1,
            selection_callbacks: Vec::new(),
        }
    }

    // --- Lifecycle ---

    /// Bind to a host container. See [`CanvasSession::acquire`].
    ///
    /// # Errors
    ///
    /// Any [`BindError`]; nothing is created on failure.
    pub fn acquire<F>(&mut self, container: &str, create: F) -> Result<(), BindError>
    where
        F: FnOnce(&str) -> Result<S, SurfaceError>,
    {
        self.session.acquire(container, create)?;
        self.monitor.attach();
        Ok(())
    }

    pub fn on_ready<F>(&mut self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        self.session.on_ready(callback);
    }

    pub fn on_error<F>(&mut self, callback: F)
    where
        F: FnMut(&EngineError) + 'static,
    {
        self.session.on_error(callback);
    }

    pub fn on_selection_change<F>(&mut self, callback: F)
    where
        F: FnMut(&SelectionEvent) + 'static,
    {
        if self.session.state() != SessionState::Disposed {
            self.selection_callbacks.push(Box::new(callback));
        }
    }

    /// The base style finished loading. The first call makes the session
    /// ready and binds whatever snapshot and selection are waiting.
    pub fn handle_style_load(&mut self) {
        if !self.session.mark_style_loaded() {
            return;
        }
        self.synchronize();
    }

    /// Tear everything down: monitor, layers, source, controls, surface.
    /// Idempotent.
    pub fn release(&mut self) {
        if self.session.state() == SessionState::Disposed {
            return;
        }
        self.monitor.detach();
        self.binder.cancel_pending();
        self.tracker.clear_pending();
        if let Some(surface) = self.session.surface_mut() {
            if let Err(error) = self.binder.teardown(surface) {
                warn!(%error, "teardown incomplete; disposing surface anyway");
            }
        }
        self.selection_callbacks.clear();
        self.session.release();
    }

    // --- Data and selection ---

    /// Replace the snapshot. Applied immediately when ready, otherwise on the
    /// ready transition. The active [`LabFilter`] narrows what is bound.
    pub fn set_collection(&mut self, collection: FeatureCollection) {
        debug!(count = collection.len(), "collection received");
        self.unfiltered = Some(collection);
        self.publish();
    }

    /// Replace the active filter and re-bind the newest collection through
    /// it. A filter equal to the current one changes nothing.
    pub fn set_filter(&mut self, filter: LabFilter) {
        if self.filter == filter {
            return;
        }
        debug!(?filter, "filter changed");
        self.filter = filter;
        if self.unfiltered.is_some() {
            self.publish();
        }
    }

    /// Decode a GeoJSON `FeatureCollection` and replace the snapshot with it.
    ///
    /// # Errors
    ///
    /// [`DataError`] if the payload cannot be decoded; the current snapshot
    /// stays in place.
    pub fn set_geojson(&mut self, text: &str) -> Result<(), DataError> {
        let collection = FeatureCollection::from_geojson_str(text)?;
        self.set_collection(collection);
        Ok(())
    }

    /// Set the host's selected id (`None` clears the highlight).
    pub fn set_selection(&mut self, selected: Option<FeatureId>) {
        if !self.tracker.set(selected) {
            return;
        }
        if !self.session.is_ready() {
            return;
        }
        let Some(surface) = self.session.surface_mut() else {
            return;
        };
        let mut failure = None;
        if let Err(e) = self.tracker.apply(surface) {
            failure = Some(EngineError::Surface(e));
        }
        if let Some(snapshot) = &self.snapshot {
            self.fitter.focus(surface, &snapshot.collection, self.tracker.selected().is_some());
        }
        if let Some(error) = failure {
            self.session.report_error(&error);
        }
    }

    // --- Map events ---

    /// A click on the canvas. Lab hits are forwarded to the selection
    /// callbacks; cluster hits request their expansion zoom.
    pub fn handle_click(&mut self, point: Point) -> ClickOutcome {
        if !self.session.is_ready() {
            return ClickOutcome::Miss;
        }
        let version = self.data_version();
        let Some(surface) = self.session.surface_mut() else {
            return ClickOutcome::Miss;
        };
        let outcome = self.tracker.click(surface, point, version);
        if let ClickOutcome::Selected(event) = &outcome {
            for callback in &mut self.selection_callbacks {
                callback(event);
            }
        }
        outcome
    }

    /// The surface answered a cluster expansion request.
    pub fn resolve_cluster_expansion(&mut self, cluster_id: u64, zoom: Result<f64, SurfaceError>) -> ExpansionOutcome {
        if !self.session.is_ready() {
            return ExpansionOutcome::Stale;
        }
        let version = self.data_version();
        let duration = self.config.focus_duration_ms;
        let Some(surface) = self.session.surface_mut() else {
            return ExpansionOutcome::Stale;
        };
        let outcome = self.tracker.resolve_expansion(surface, cluster_id, zoom, version, duration);
        if let ExpansionOutcome::Failed(e) = &outcome {
            self.session.report_error(&EngineError::Surface(e.clone()));
        }
        outcome
    }

    /// The host container changed size.
    pub fn handle_resize(&mut self, size: ViewportSize) -> ResizeOutcome {
        match self.session.surface_mut() {
            Some(surface) => self.monitor.observe(surface, size),
            None => ResizeOutcome::Detached,
        }
    }

    /// The map reported an asynchronous error.
    pub fn handle_error(&mut self, error: SurfaceError) {
        self.session.report_error(&EngineError::Runtime(error));
    }

    /// Animation frame: run a pending source rebuild against the newest
    /// snapshot.
    pub fn tick(&mut self) {
        if !self.session.is_ready() || !self.binder.has_pending_rebuild() {
            return;
        }
        let Some(snapshot) = &self.snapshot else {
            self.binder.cancel_pending();
            return;
        };
        let Some(surface) = self.session.surface_mut() else {
            return;
        };
        let mut failure = None;
        match self.binder.rebuild(surface, snapshot) {
            Ok(RebuildOutcome::Rebuilt { .. }) => {
                if let Err(e) = self.tracker.apply(surface) {
                    failure = Some(EngineError::Surface(e));
                }
            }
            Ok(RebuildOutcome::Retry { .. }) => surface.request_frame(),
            Ok(RebuildOutcome::Idle) => {}
            Err(e) => failure = Some(e),
        }
        if let Some(error) = failure {
            self.session.report_error(&error);
        }
    }

    // --- Accessors ---

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    #[must_use]
    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    #[must_use]
    pub fn surface(&self) -> Option<&S> {
        self.session.surface()
    }

    /// Direct access to the surface, for hosts and tests that drive it.
    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.session.surface_mut()
    }

    #[must_use]
    pub fn collection(&self) -> Option<&FeatureCollection> {
        self.snapshot.as_ref().map(|s| &s.collection)
    }

    /// Newest collection as received, before the filter.
    #[must_use]
    pub fn unfiltered(&self) -> Option<&FeatureCollection> {
        self.unfiltered.as_ref()
    }

    #[must_use]
    pub fn filter(&self) -> &LabFilter {
        &self.filter
    }

    #[must_use]
    pub fn selection(&self) -> Option<&FeatureId> {
        self.tracker.selected()
    }

    #[must_use]
    pub fn layers(&self) -> &LayerSet {
        self.binder.layers()
    }

    /// Version of the newest snapshot (0 before the first).
    #[must_use]
    pub fn data_version(&self) -> u64 {
        self.snapshot.as_ref().map_or(0, |s| s.version)
    }

    /// Version of the snapshot bound to the source, if any.
    #[must_use]
    pub fn bound_version(&self) -> Option<u64> {
        self.binder.bound_version()
    }

    #[must_use]
    pub fn has_pending_rebuild(&self) -> bool {
        self.binder.has_pending_rebuild()
    }

    // --- Internals ---

    /// Turn the newest unfiltered collection into a new versioned snapshot.
    fn publish(&mut self) {
        let Some(unfiltered) = &self.unfiltered else {
            return;
        };
        let collection = if self.filter.is_empty() { unfiltered.clone() } else { self.filter.apply(unfiltered) };
        let version = self.next_version;
        self.next_version += 1;
        debug!(version, count = collection.len(), total = unfiltered.len(), "snapshot published");
        self.snapshot = Some(Snapshot { version, collection });
        self.synchronize();
    }

    /// Bind the newest snapshot, re-apply the selection, and frame the
    /// camera. A no-op until the session is ready.
    fn synchronize(&mut self) {
        if !self.session.is_ready() {
            return;
        }
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        let Some(surface) = self.session.surface_mut() else {
            return;
        };

        let mut failures = Vec::new();
        match self.binder.sync(surface, snapshot) {
            Ok(SyncOutcome::RebuildScheduled) => surface.request_frame(),
            Ok(outcome) => {
                debug!(?outcome, version = snapshot.version, "snapshot synchronized");
                if let Err(e) = self.tracker.apply(surface) {
                    failures.push(EngineError::Surface(e));
                }
            }
            Err(e) => failures.push(e),
        }

        if self.fitter.fit(surface, &snapshot.collection, self.tracker.selected().is_some()).is_none() {
            debug!(version = snapshot.version, "empty snapshot; camera left in place");
        }

        for error in &failures {
            self.session.report_error(error);
        }
    }
}
