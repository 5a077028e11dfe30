//! Keeps the drawing buffer matched to the host container's size.
//!
//! The host feeds every observed container size in. A resize is requested
//! unless the surface is mid-gesture; skipped observations are not queued,
//! the next one retries.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use tracing::debug;

use crate::camera::ViewportSize;
use crate::surface::MapSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    Resized,
    /// The monitor is detached.
    Detached,
    /// The container has no area (hidden, collapsed).
    EmptyContainer,
    /// A pan or zoom is in progress.
    SkippedMoving,
}

#[derive(Debug, Default)]
pub struct ViewportMonitor {
    attached: bool,
    last_size: Option<ViewportSize>,
}

impl ViewportMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self) {
        self.attached = true;
    }

    /// Stop reacting to observations. Nothing resizes after this.
    pub fn detach(&mut self) {
        self.attached = false;
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Last size a resize was issued for.
    #[must_use]
    pub fn last_size(&self) -> Option<ViewportSize> {
        self.last_size
    }

    pub fn observe<S: MapSurface>(&mut self, surface: &mut S, size: ViewportSize) -> ResizeOutcome {
        if !self.attached {
            return ResizeOutcome::Detached;
        }
        if size.is_empty() {
            return ResizeOutcome::EmptyContainer;
        }
        if surface.is_moving() {
            debug!(width = size.width, height = size.height, "resize skipped during gesture");
            return ResizeOutcome::SkippedMoving;
        }
        surface.resize();
        self.last_size = Some(size);
        ResizeOutcome::Resized
    }
}
