//! Binding of the lab snapshot to the single clustered GeoJSON source.
//!
//! The common path replaces the source's data in place. When the surface
//! rejects that, the binder records a versioned pending rebuild and asks for
//! a frame; [`SourceBinder::rebuild`] then tears down layers and source and
//! recreates both from whatever snapshot is newest at that moment. A newer
//! in-place update that succeeds in the meantime cancels the pending rebuild.
//!
//! Dependency order is fixed: layers go before the source on the way down,
//! the source goes before the layers on the way up.

#[cfg(test)]
#[path = "source_test.rs"]
mod source_test;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::ClusterConfig;
use crate::consts::SOURCE_ID;
use crate::error::{EngineError, LayerError, SurfaceError};
use crate::feature::FeatureCollection;
use crate::layers::LayerSet;
use crate::surface::MapSurface;

/// A feature collection tagged with the order it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub version: u64,
    pub collection: FeatureCollection,
}

/// The GeoJSON source declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpec {
    pub data: Value,
    pub cluster: bool,
    pub cluster_max_zoom: u8,
    pub cluster_radius: u32,
}

impl SourceSpec {
    #[must_use]
    pub fn clustered(data: Value, config: &ClusterConfig) -> Self {
        Self { data, cluster: true, cluster_max_zoom: config.max_zoom, cluster_radius: config.radius }
    }

    /// The MapLibre style-spec source object.
    #[must_use]
    pub fn to_style_json(&self) -> Value {
        json!({
            "type": "geojson",
            "data": self.data,
            "cluster": self.cluster,
            "clusterMaxZoom": self.cluster_max_zoom,
            "clusterRadius": self.cluster_radius,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Source and layers were created.
    Created,
    /// Data was replaced in place.
    Updated,
    /// This version is already bound; nothing changed.
    Unchanged,
    /// The surface refused the update; a rebuild is pending.
    RebuildScheduled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// No rebuild was pending.
    Idle,
    /// Source and layers were recreated from `version`.
    Rebuilt { version: u64 },
    /// The attempt failed; another one is pending.
    Retry { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingRebuild {
    version: u64,
    attempts: u32,
    last_error: SurfaceError,
}

/// Owns the reconciliation of the lab source and its layers.
#[derive(Debug)]
pub struct SourceBinder {
    layers: LayerSet,
    cluster: ClusterConfig,
    max_attempts: u32,
    bound_version: Option<u64>,
    pending: Option<PendingRebuild>,
}

impl SourceBinder {
    #[must_use]
    pub fn new(layers: LayerSet, cluster: ClusterConfig, max_attempts: u32) -> Self {
        Self { layers, cluster, max_attempts: max_attempts.max(1), bound_version: None, pending: None }
    }

    #[must_use]
    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    /// Version of the snapshot currently bound, if any.
    #[must_use]
    pub fn bound_version(&self) -> Option<u64> {
        self.bound_version
    }

    #[must_use]
    pub fn has_pending_rebuild(&self) -> bool {
        self.pending.is_some()
    }

    /// Reconcile the surface against `snapshot`. The surface must be ready.
    ///
    /// # Errors
    ///
    /// [`EngineError::Layer`] if the layers cannot be declared after the
    /// source is in place. A rejected data update is not an error.
    pub fn sync<S: MapSurface>(&mut self, surface: &mut S, snapshot: &Snapshot) -> Result<SyncOutcome, EngineError> {
        if !surface.has_source(SOURCE_ID) {
            return match self.create(surface, snapshot) {
                Ok(()) => Ok(SyncOutcome::Created),
                Err(e) => Ok(self.schedule(snapshot.version, e)),
            };
        }

        if self.bound_version == Some(snapshot.version) && self.pending.is_none() {
            self.layers.ensure_layers(surface)?;
            return Ok(SyncOutcome::Unchanged);
        }

        match surface.set_source_data(SOURCE_ID, &snapshot.collection.to_geojson()) {
            Ok(()) => {
                if let Some(stale) = self.pending.take() {
                    debug!(stale = stale.version, current = snapshot.version, "pending rebuild superseded");
                }
                self.bound_version = Some(snapshot.version);
                self.layers.ensure_layers(surface)?;
                debug!(version = snapshot.version, count = snapshot.collection.len(), "source data replaced");
                Ok(SyncOutcome::Updated)
            }
            Err(e) => Ok(self.schedule(snapshot.version, e)),
        }
    }

    /// Run the pending rebuild, if any, against `latest`.
    ///
    /// # Errors
    ///
    /// [`EngineError::RebuildExhausted`] once the configured attempts are
    /// used up. The pending rebuild is dropped; the next snapshot starts over.
    pub fn rebuild<S: MapSurface>(&mut self, surface: &mut S, latest: &Snapshot) -> Result<RebuildOutcome, EngineError> {
        let Some(pending) = self.pending.take() else {
            return Ok(RebuildOutcome::Idle);
        };
        if pending.version != latest.version {
            debug!(scheduled = pending.version, latest = latest.version, "rebuilding from newer snapshot");
        }

        let result = match self.teardown(surface) {
            Ok(()) => self.create(surface, latest),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                info!(version = latest.version, attempts = pending.attempts + 1, "source rebuilt");
                Ok(RebuildOutcome::Rebuilt { version: latest.version })
            }
            Err(e) => {
                let attempts = pending.attempts + 1;
                if attempts >= self.max_attempts {
                    warn!(attempts, error = %e, "giving up on source rebuild");
                    return Err(EngineError::RebuildExhausted { attempts, last: e });
                }
                warn!(attempts, error = %e, "source rebuild failed; retrying");
                self.pending = Some(PendingRebuild { version: latest.version, attempts, last_error: e });
                Ok(RebuildOutcome::Retry { attempts })
            }
        }
    }

    /// Remove the layers, then the source. A no-op if neither exists.
    ///
    /// # Errors
    ///
    /// The first error the surface reports.
    pub fn teardown<S: MapSurface>(&mut self, surface: &mut S) -> Result<(), SurfaceError> {
        self.bound_version = None;
        let removed = self.layers.remove_all(surface)?;
        let had_source = surface.has_source(SOURCE_ID);
        if had_source {
            surface.remove_source(SOURCE_ID)?;
        }
        if removed > 0 || had_source {
            debug!(layers = removed, source = had_source, "rendering state torn down");
        }
        Ok(())
    }

    /// Drop any pending rebuild without running it.
    pub fn cancel_pending(&mut self) {
        self.pending = None;
    }

    /// The error that caused the pending rebuild, if one is pending.
    #[must_use]
    pub fn pending_error(&self) -> Option<&SurfaceError> {
        self.pending.as_ref().map(|p| &p.last_error)
    }

    fn create<S: MapSurface>(&mut self, surface: &mut S, snapshot: &Snapshot) -> Result<(), SurfaceError> {
        let spec = SourceSpec::clustered(snapshot.collection.to_geojson(), &self.cluster);
        surface.add_source(SOURCE_ID, &spec)?;
        self.bound_version = Some(snapshot.version);
        self.pending = None;
        match self.layers.ensure_layers(surface) {
            Ok(added) => {
                info!(version = snapshot.version, count = snapshot.collection.len(), layers = added, "source created");
                Ok(())
            }
            Err(LayerError::Surface(e)) => Err(e),
            Err(LayerError::SourceMissing { source_id }) => Err(SurfaceError::MissingSource(source_id)),
        }
    }

    fn schedule(&mut self, version: u64, error: SurfaceError) -> SyncOutcome {
        warn!(version, error = %error, "source update rejected; scheduling rebuild");
        self.pending = Some(PendingRebuild { version, attempts: 0, last_error: error });
        SyncOutcome::RebuildScheduled
    }
}
