//! Error taxonomy for the map engine.
//!
//! Binding and configuration errors are returned synchronously to the host.
//! Everything that happens after binding (rejected source updates, runtime
//! errors reported by the underlying map, exhausted rebuilds) is reported
//! through the session's error channel as an [`EngineError`] and never
//! terminates the session.

/// Failure to bind a canvas session to a host container.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// The container id was empty.
    #[error("host container is missing")]
    MissingContainer,
    /// A session is already active on a different container.
    #[error("session already bound to container {current:?}; refusing {requested:?}")]
    AlreadyBound { current: String, requested: String },
    /// The session has been released; sessions are single-use.
    #[error("session has been released")]
    Disposed,
    /// The underlying map could not be created.
    #[error("failed to create map surface: {0}")]
    Surface(#[from] SurfaceError),
}

/// Error reported by the underlying map surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    /// The surface refused a data or style mutation.
    #[error("surface rejected operation: {0}")]
    Rejected(String),
    /// A source with this id does not exist.
    #[error("source {0:?} does not exist")]
    MissingSource(String),
    /// A source with this id already exists.
    #[error("source {0:?} already exists")]
    DuplicateSource(String),
    /// A layer with this id does not exist.
    #[error("layer {0:?} does not exist")]
    MissingLayer(String),
    /// A layer with this id already exists.
    #[error("layer {0:?} already exists")]
    DuplicateLayer(String),
    /// A runtime error surfaced by the map engine (tile load, WebGL, etc.).
    #[error("map runtime error: {0}")]
    Runtime(String),
}

/// Failure to declare the layer set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayerError {
    /// Layers reference the source; it must exist first.
    #[error("cannot create layers: source {source_id:?} is not bound")]
    SourceMissing { source_id: String },
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Failure to decode a feature collection payload.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("invalid GeoJSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The payload decoded but is not a `FeatureCollection`.
    #[error("expected a FeatureCollection, found {0:?}")]
    NotFeatureCollection(String),
}

/// Failure to load or validate engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Payload of the session error channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Asynchronous error from the underlying map.
    #[error(transparent)]
    Runtime(SurfaceError),
    /// The source could not be recreated after the allowed attempts.
    #[error("source rebuild abandoned after {attempts} attempts: {last}")]
    RebuildExhausted { attempts: u32, last: SurfaceError },
    /// Layer declaration failed during synchronization.
    #[error(transparent)]
    Layer(#[from] LayerError),
    /// A camera or selection operation was refused by the surface.
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}
