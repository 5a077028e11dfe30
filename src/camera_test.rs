#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-6;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn inside_padded(p: Point, size: ViewportSize, padding: Padding) -> bool {
    let slack = 1e-6;
    p.x >= padding.left - slack
        && p.x <= size.width - padding.right + slack
        && p.y >= padding.top - slack
        && p.y <= size.height - padding.bottom + slack
}

// --- LngLat ---

#[test]
fn lnglat_valid_ranges() {
    assert!(LngLat::new(0.0, 0.0).is_valid());
    assert!(LngLat::new(-180.0, -90.0).is_valid());
    assert!(LngLat::new(180.0, 90.0).is_valid());
}

#[test]
fn lnglat_rejects_out_of_range_and_non_finite() {
    assert!(!LngLat::new(180.5, 0.0).is_valid());
    assert!(!LngLat::new(0.0, -91.0).is_valid());
    assert!(!LngLat::new(f64::NAN, 0.0).is_valid());
    assert!(!LngLat::new(0.0, f64::INFINITY).is_valid());
}

// --- LngLatBounds ---

#[test]
fn bounds_from_empty_is_none() {
    assert!(LngLatBounds::from_points(Vec::new()).is_none());
}

#[test]
fn bounds_cover_all_points() {
    let pts = vec![LngLat::new(10.0, 20.0), LngLat::new(30.0, 40.0), LngLat::new(-5.0, 25.0)];
    let b = LngLatBounds::from_points(pts.clone()).unwrap();
    assert_eq!(b.west, -5.0);
    assert_eq!(b.east, 30.0);
    assert_eq!(b.south, 20.0);
    assert_eq!(b.north, 40.0);
    assert!(pts.iter().all(|p| b.contains(*p)));
}

#[test]
fn bounds_center_is_midpoint() {
    let b = LngLatBounds { west: 10.0, south: 20.0, east: 30.0, north: 40.0 };
    assert_eq!(b.center(), LngLat::new(20.0, 30.0));
    assert_eq!(b.to_array(), [[10.0, 20.0], [30.0, 40.0]]);
}

// --- ViewportSize ---

#[test]
fn viewport_size_empty() {
    assert!(ViewportSize::new(0.0, 100.0).is_empty());
    assert!(ViewportSize::new(100.0, -1.0).is_empty());
    assert!(!ViewportSize::new(1.0, 1.0).is_empty());
}

// --- project / unproject ---

#[test]
fn center_projects_to_viewport_center() {
    let cam = Camera::new(LngLat::new(12.0, 34.0), 5.0);
    let size = ViewportSize::new(800.0, 600.0);
    let p = cam.project(cam.center, size);
    assert!(approx_eq(p.x, 400.0));
    assert!(approx_eq(p.y, 300.0));
}

#[test]
fn unproject_inverts_project() {
    let cam = Camera::new(LngLat::new(-70.0, 45.0), 4.25);
    let size = ViewportSize::new(1024.0, 768.0);
    let original = LngLat::new(-68.5, 47.25);
    let back = cam.unproject(cam.project(original, size), size);
    assert!(approx_eq(back.lng, original.lng));
    assert!(approx_eq(back.lat, original.lat));
}

#[test]
fn east_is_right_and_north_is_up() {
    let cam = Camera::new(LngLat::new(0.0, 0.0), 3.0);
    let size = ViewportSize::new(400.0, 400.0);
    let east = cam.project(LngLat::new(1.0, 0.0), size);
    let north = cam.project(LngLat::new(0.0, 1.0), size);
    assert!(east.x > 200.0);
    assert!(north.y < 200.0);
}

#[test]
fn world_size_doubles_per_zoom_level() {
    let a = Camera::new(LngLat::new(0.0, 0.0), 2.0);
    let b = Camera::new(LngLat::new(0.0, 0.0), 3.0);
    assert!(approx_eq(b.world_size(), a.world_size() * 2.0));
}

// --- camera_for_bounds ---

#[test]
fn fit_contains_every_corner_with_padding() {
    let bounds = LngLatBounds { west: 10.0, south: 20.0, east: 30.0, north: 40.0 };
    let padding = Padding::uniform(50.0);
    let size = ViewportSize::new(800.0, 600.0);
    let cam = camera_for_bounds(&bounds, padding, size, 14.0).unwrap();

    for corner in [
        LngLat::new(10.0, 20.0),
        LngLat::new(30.0, 40.0),
        LngLat::new(10.0, 40.0),
        LngLat::new(30.0, 20.0),
    ] {
        let p = cam.project(corner, size);
        assert!(inside_padded(p, size, padding), "{corner:?} projected outside padded view at {p:?}");
    }
}

#[test]
fn fit_is_tight_along_limiting_axis() {
    let bounds = LngLatBounds { west: -20.0, south: -10.0, east: 20.0, north: 10.0 };
    let padding = Padding::uniform(40.0);
    let size = ViewportSize::new(1000.0, 500.0);
    let cam = camera_for_bounds(&bounds, padding, size, 20.0).unwrap();

    let nw = cam.project(LngLat::new(bounds.west, bounds.north), size);
    let se = cam.project(LngLat::new(bounds.east, bounds.south), size);
    let used_w = se.x - nw.x;
    let used_h = se.y - nw.y;
    let fills_w = approx_eq(used_w, size.width - 80.0);
    let fills_h = approx_eq(used_h, size.height - 80.0);
    assert!(fills_w || fills_h, "neither axis is tight: {used_w} x {used_h}");
}

#[test]
fn fit_honors_asymmetric_padding() {
    let bounds = LngLatBounds { west: 0.0, south: 0.0, east: 10.0, north: 10.0 };
    let padding = Padding { top: 10.0, right: 10.0, bottom: 10.0, left: 300.0 };
    let size = ViewportSize::new(800.0, 600.0);
    let cam = camera_for_bounds(&bounds, padding, size, 14.0).unwrap();
    let west_edge = cam.project(LngLat::new(0.0, 5.0), size);
    assert!(west_edge.x >= 300.0 - 1e-6);
}

#[test]
fn fit_single_point_uses_max_zoom() {
    let bounds = LngLatBounds::from_point(LngLat::new(5.0, 5.0));
    let cam = camera_for_bounds(&bounds, Padding::uniform(50.0), ViewportSize::new(800.0, 600.0), 9.0).unwrap();
    assert_eq!(cam.zoom, 9.0);
}

#[test]
fn fit_clamps_to_max_zoom() {
    let bounds = LngLatBounds { west: 5.0, south: 5.0, east: 5.0001, north: 5.0001 };
    let cam = camera_for_bounds(&bounds, Padding::uniform(10.0), ViewportSize::new(800.0, 600.0), 12.0).unwrap();
    assert_eq!(cam.zoom, 12.0);
}

#[test]
fn fit_with_no_drawable_area_is_none() {
    let bounds = LngLatBounds { west: 0.0, south: 0.0, east: 1.0, north: 1.0 };
    let cam = camera_for_bounds(&bounds, Padding::uniform(300.0), ViewportSize::new(500.0, 500.0), 14.0);
    assert!(cam.is_none());
}

#[test]
fn fit_with_unusable_max_zoom_stays_at_zero() {
    let bounds = LngLatBounds { west: 0.0, south: 0.0, east: 10.0, north: 10.0 };
    let size = ViewportSize::new(800.0, 600.0);
    for max_zoom in [-1.0, f64::NAN, f64::INFINITY] {
        let cam = camera_for_bounds(&bounds, Padding::uniform(10.0), size, max_zoom).unwrap();
        assert_eq!(cam.zoom, 0.0, "max_zoom {max_zoom}");
        assert!(cam.center.is_valid());
    }
}
