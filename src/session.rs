//! Lifecycle of the map instance bound to a host container.
//!
//! ```text
//! Unbound ──acquire──▶ Initializing ──style load──▶ Ready
//!    │                      │                        │
//!    └──────────────────────┴────────release─────────┴──▶ Disposed
//! ```
//!
//! `Disposed` is terminal. Ready callbacks fire at most once; error callbacks
//! fire any number of times; neither fires after release.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use tracing::{info, warn};

use crate::error::{BindError, EngineError, SurfaceError};
use crate::surface::MapSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unbound,
    Initializing,
    Ready,
    Disposed,
}

type ReadyCallback = Box<dyn FnOnce()>;
type ErrorCallback = Box<dyn FnMut(&EngineError)>;

/// Exclusive owner of the map surface.
pub struct CanvasSession<S: MapSurface> {
    state: SessionState,
    container: Option<String>,
    surface: Option<S>,
    ready_callbacks: Vec<ReadyCallback>,
    error_callbacks: Vec<ErrorCallback>,
}

impl<S: MapSurface> Default for CanvasSession<S> {
    fn default() -> Self {
        Self {
            state: SessionState::Unbound,
            container: None,
            surface: None,
            ready_callbacks: Vec::new(),
            error_callbacks: Vec::new(),
        }
    }
}

impl<S: MapSurface> CanvasSession<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to `container`, creating the surface with `create`. Binding again
    /// to the same container is a no-op and `create` is not called.
    ///
    /// # Errors
    ///
    /// - [`BindError::MissingContainer`] for an empty container id.
    /// - [`BindError::AlreadyBound`] when bound to a different container.
    /// - [`BindError::Disposed`] after [`CanvasSession::release`].
    /// - [`BindError::Surface`] when `create` fails; the session stays unbound.
    pub fn acquire<F>(&mut self, container: &str, create: F) -> Result<(), BindError>
    where
        F: FnOnce(&str) -> Result<S, SurfaceError>,
    {
        match self.state {
            SessionState::Disposed => return Err(BindError::Disposed),
            SessionState::Initializing | SessionState::Ready => {
                let current = self.container.as_deref().unwrap_or_default();
                if current == container {
                    return Ok(());
                }
                return Err(BindError::AlreadyBound { current: current.to_string(), requested: container.to_string() });
            }
            SessionState::Unbound => {}
        }
        if container.trim().is_empty() {
            return Err(BindError::MissingContainer);
        }

        let mut surface = create(container)?;
        surface.add_controls();
        self.surface = Some(surface);
        self.container = Some(container.to_string());
        self.state = SessionState::Initializing;
        info!(container, "map session bound");
        Ok(())
    }

    /// Register a callback for the first style load. Runs immediately if the
    /// session is already ready; dropped if it has been released.
    pub fn on_ready<F>(&mut self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        match self.state {
            SessionState::Ready => callback(),
            SessionState::Disposed => {}
            SessionState::Unbound | SessionState::Initializing => self.ready_callbacks.push(Box::new(callback)),
        }
    }

    pub fn on_error<F>(&mut self, callback: F)
    where
        F: FnMut(&EngineError) + 'static,
    {
        if self.state != SessionState::Disposed {
            self.error_callbacks.push(Box::new(callback));
        }
    }

    /// Record the style-load signal. Returns `true` on the one transition to
    /// `Ready`; later signals (style reloads) return `false`.
    pub fn mark_style_loaded(&mut self) -> bool {
        if self.state != SessionState::Initializing {
            return false;
        }
        self.state = SessionState::Ready;
        info!(container = self.container.as_deref().unwrap_or_default(), "map session ready");
        for callback in std::mem::take(&mut self.ready_callbacks) {
            callback();
        }
        true
    }

    /// Deliver a non-fatal error to the registered observers.
    pub fn report_error(&mut self, error: &EngineError) {
        if self.state == SessionState::Disposed {
            return;
        }
        warn!(%error, state = ?self.state, "map error");
        for callback in &mut self.error_callbacks {
            callback(error);
        }
    }

    /// Dispose the surface and controls. Idempotent.
    pub fn release(&mut self) {
        if self.state == SessionState::Disposed {
            return;
        }
        if let Some(mut surface) = self.surface.take() {
            surface.remove_controls();
            surface.dispose();
        }
        self.ready_callbacks.clear();
        self.error_callbacks.clear();
        self.state = SessionState::Disposed;
        info!(container = self.container.as_deref().unwrap_or_default(), "map session released");
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    #[must_use]
    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    #[must_use]
    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }
}
