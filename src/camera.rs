//! Geographic coordinates, bounds, and the Web-Mercator camera.
//!
//! The camera here is the engine's own model of what the underlying map will
//! do when asked to fly to a point or fit a bounding box. The browser surface
//! delegates the actual animation to MapLibre; the headless surface and the
//! tests use [`camera_for_bounds`] and [`Camera::project`] directly.

#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_MERCATOR_LAT, TILE_SIZE_PX};

/// A point in screen space (CSS pixels, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    #[must_use]
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Finite and within the valid longitude/latitude ranges.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.lng.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lng)
            && (-90.0..=90.0).contains(&self.lat)
    }

    /// As a GeoJSON position (`[lng, lat]`).
    #[must_use]
    pub fn to_array(self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

/// Axis-aligned geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLatBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl LngLatBounds {
    /// Degenerate bounds covering a single coordinate.
    #[must_use]
    pub fn from_point(p: LngLat) -> Self {
        Self { west: p.lng, south: p.lat, east: p.lng, north: p.lat }
    }

    /// Smallest bounds covering every coordinate, or `None` for an empty input.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LngLat>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self::from_point(first);
        for p in iter {
            bounds.extend(p);
        }
        Some(bounds)
    }

    /// Grow to include `p`.
    pub fn extend(&mut self, p: LngLat) {
        self.west = self.west.min(p.lng);
        self.south = self.south.min(p.lat);
        self.east = self.east.max(p.lng);
        self.north = self.north.max(p.lat);
    }

    #[must_use]
    pub fn contains(&self, p: LngLat) -> bool {
        p.lng >= self.west && p.lng <= self.east && p.lat >= self.south && p.lat <= self.north
    }

    #[must_use]
    pub fn center(&self) -> LngLat {
        LngLat::new((self.west + self.east) * 0.5, (self.south + self.north) * 0.5)
    }

    /// As a MapLibre `LngLatBoundsLike` (`[[west, south], [east, north]]`).
    #[must_use]
    pub fn to_array(&self) -> [[f64; 2]; 2] {
        [[self.west, self.south], [self.east, self.north]]
    }
}

/// Pixel padding applied inside the viewport when framing bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Padding {
    /// Same padding on all four sides.
    #[must_use]
    pub fn uniform(px: f64) -> Self {
        Self { top: px, right: px, bottom: px, left: px }
    }
}

/// Size of the rendering surface in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl ViewportSize {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Zero or negative area (e.g. a hidden container).
    #[must_use]
    pub fn is_empty(self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Camera state: geographic center and zoom level (no bearing or pitch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub center: LngLat,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self { center: LngLat::new(0.0, 20.0), zoom: 1.5 }
    }
}

impl Camera {
    #[must_use]
    pub fn new(center: LngLat, zoom: f64) -> Self {
        Self { center, zoom }
    }

    /// World size in pixels at this zoom.
    #[must_use]
    pub fn world_size(&self) -> f64 {
        TILE_SIZE_PX * self.zoom.exp2()
    }

    /// Convert a geographic coordinate to screen space for a viewport of `size`.
    #[must_use]
    pub fn project(&self, p: LngLat, size: ViewportSize) -> Point {
        let world = self.world_size();
        let (cx, cy) = mercator(self.center);
        let (px, py) = mercator(p);
        Point {
            x: (px - cx) * world + size.width * 0.5,
            y: (py - cy) * world + size.height * 0.5,
        }
    }

    /// Convert a screen-space point back to a geographic coordinate.
    #[must_use]
    pub fn unproject(&self, screen: Point, size: ViewportSize) -> LngLat {
        let world = self.world_size();
        let (cx, cy) = mercator(self.center);
        inverse_mercator(
            cx + (screen.x - size.width * 0.5) / world,
            cy + (screen.y - size.height * 0.5) / world,
        )
    }
}

/// Solve the camera that frames `bounds` inside `size` minus `padding`.
///
/// Degenerate (single-point) bounds resolve to `max_zoom`. A negative or
/// non-finite `max_zoom` is treated as zero. Returns `None` when the padding
/// leaves no drawable area.
#[must_use]
pub fn camera_for_bounds(bounds: &LngLatBounds, padding: Padding, size: ViewportSize, max_zoom: f64) -> Option<Camera> {
    let max_zoom = if max_zoom.is_finite() { max_zoom.max(0.0) } else { 0.0 };
    let avail_w = size.width - padding.left - padding.right;
    let avail_h = size.height - padding.top - padding.bottom;
    if avail_w <= 0.0 || avail_h <= 0.0 {
        return None;
    }

    let (x0, y0) = mercator(LngLat::new(bounds.west, bounds.north));
    let (x1, y1) = mercator(LngLat::new(bounds.east, bounds.south));
    let span_x = (x1 - x0).abs() * TILE_SIZE_PX;
    let span_y = (y1 - y0).abs() * TILE_SIZE_PX;

    let scale_x = if span_x > 0.0 { avail_w / span_x } else { f64::INFINITY };
    let scale_y = if span_y > 0.0 { avail_h / span_y } else { f64::INFINITY };
    let scale = scale_x.min(scale_y);
    let zoom = if scale.is_finite() { scale.log2().clamp(0.0, max_zoom) } else { max_zoom };

    // Shift the center so the box lands in the middle of the padded area.
    let world = TILE_SIZE_PX * zoom.exp2();
    let offset_x = (padding.left - padding.right) * 0.5 / world;
    let offset_y = (padding.top - padding.bottom) * 0.5 / world;
    let center = inverse_mercator((x0 + x1) * 0.5 - offset_x, (y0 + y1) * 0.5 - offset_y);

    Some(Camera { center, zoom })
}

/// Normalized Web-Mercator coordinates in `[0, 1]`.
fn mercator(p: LngLat) -> (f64, f64) {
    let lat = p.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (p.lng + 180.0) / 360.0;
    let y = (1.0 - (PI / 4.0 + lat / 2.0).tan().ln() / PI) / 2.0;
    (x, y)
}

fn inverse_mercator(x: f64, y: f64) -> LngLat {
    let lng = x * 360.0 - 180.0;
    let lat = (2.0 * (PI * (1.0 - 2.0 * y)).exp().atan() - PI / 2.0).to_degrees();
    LngLat { lng, lat }
}
