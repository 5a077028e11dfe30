#![allow(clippy::float_cmp)]

use serde_json::Map;

use super::*;
use crate::camera::{Camera, Point, ViewportSize};
use crate::feature::PointFeature;
use crate::headless::{HeadlessSurface, SurfaceOp};

fn labs(coords: &[(f64, f64)]) -> FeatureCollection {
    coords.iter().map(|&(lng, lat)| PointFeature::new(None, LngLat::new(lng, lat), Map::new())).collect()
}

fn surface() -> HeadlessSurface {
    HeadlessSurface::new("map", ViewportSize::new(800.0, 600.0), Camera::default())
}

fn inside_padded(p: Point, size: ViewportSize, padding: f64) -> bool {
    let eps = 1e-6;
    p.x >= padding - eps && p.x <= size.width - padding + eps && p.y >= padding - eps && p.y <= size.height - padding + eps
}

// =============================================================
// Planning
// =============================================================

#[test]
fn empty_snapshot_leaves_camera_alone() {
    let config = MapConfig::default();
    let fitter = ViewportFitter::new(&config);
    let mut surface = surface();
    assert_eq!(fitter.fit(&mut surface, &FeatureCollection::default(), true), None);
    assert!(surface.ops().is_empty());
    assert_eq!(surface.camera(), Camera::default());
}

#[test]
fn single_selected_lab_flies_in() {
    let config = MapConfig::default();
    let plan = ViewportFitter::new(&config).plan(&labs(&[(10.0, 20.0)]), true);
    assert_eq!(
        plan,
        Some(CameraMove::FlyTo {
            center: LngLat::new(10.0, 20.0),
            zoom: config.focus_zoom,
            duration_ms: config.focus_duration_ms,
        })
    );
}

#[test]
fn single_unselected_lab_fits_with_cap() {
    let config = MapConfig::default();
    let plan = ViewportFitter::new(&config).plan(&labs(&[(10.0, 20.0)]), false);
    let Some(CameraMove::FitBounds { bounds, max_zoom, .. }) = plan else {
        panic!("expected fit-bounds, got {plan:?}");
    };
    assert_eq!(max_zoom, config.fit_max_zoom);
    assert!(bounds.contains(LngLat::new(10.0, 20.0)));
}

#[test]
fn many_labs_fit_bounds_even_when_selected() {
    let config = MapConfig::default();
    let plan = ViewportFitter::new(&config).plan(&labs(&[(10.0, 20.0), (30.0, 40.0)]), true);
    assert!(matches!(plan, Some(CameraMove::FitBounds { .. })));
}

// =============================================================
// Applying
// =============================================================

#[test]
fn fitted_camera_contains_every_lab_inside_padding() {
    let config = MapConfig::default();
    let fitter = ViewportFitter::new(&config);
    let mut surface = surface();
    let collection = labs(&[(-74.0, 40.7), (2.35, 48.85), (139.7, 35.7), (-43.2, -22.9)]);

    fitter.fit(&mut surface, &collection, false);

    assert!(matches!(surface.ops(), [SurfaceOp::FitBounds { .. }]));
    assert!(surface.camera().zoom <= config.fit_max_zoom);
    for lab in collection.iter() {
        let p = surface.project(lab.coordinates);
        assert!(inside_padded(p, surface.size(), config.fit_padding), "{lab:?} projected to {p:?}");
    }
}

#[test]
fn single_selected_lab_centers_camera() {
    let config = MapConfig::default();
    let fitter = ViewportFitter::new(&config);
    let mut surface = surface();

    fitter.fit(&mut surface, &labs(&[(10.0, 20.0)]), true);

    let camera = surface.camera();
    assert!((camera.center.lng - 10.0).abs() < 1e-9);
    assert!((camera.center.lat - 20.0).abs() < 1e-9);
    assert_eq!(camera.zoom, config.focus_zoom);
}

#[test]
fn focus_does_not_refit_many_labs() {
    let fitter = ViewportFitter::new(&MapConfig::default());
    let mut surface = surface();
    assert_eq!(fitter.focus(&mut surface, &labs(&[(0.0, 0.0), (5.0, 5.0)]), true), None);
    assert!(surface.ops().is_empty());
}

#[test]
fn focus_flies_to_single_lab() {
    let config = MapConfig::default();
    let fitter = ViewportFitter::new(&config);
    let mut surface = surface();
    let moved = fitter.focus(&mut surface, &labs(&[(5.0, 5.0)]), true);
    assert!(matches!(moved, Some(CameraMove::FlyTo { .. })));
    assert_eq!(surface.ops(), [SurfaceOp::FlyTo { center: LngLat::new(5.0, 5.0), zoom: config.focus_zoom }]);
}

#[test]
fn focus_without_selection_does_nothing() {
    let fitter = ViewportFitter::new(&MapConfig::default());
    let mut surface = surface();
    assert_eq!(fitter.focus(&mut surface, &labs(&[(5.0, 5.0)]), false), None);
    assert!(surface.ops().is_empty());
}
