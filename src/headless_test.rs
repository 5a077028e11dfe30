#![allow(clippy::float_cmp)]

use super::*;
use crate::config::{ClusterConfig, MapConfig};
use crate::consts::{LABEL_LAYER_ID, POINT_LAYER_ID, SOURCE_ID};
use crate::feature::FeatureId;
use crate::layers::{label_layer, point_layer};

fn surface() -> HeadlessSurface {
    HeadlessSurface::new("map", ViewportSize::new(800.0, 600.0), Camera::new(LngLat::new(0.0, 0.0), 2.0))
}

fn spec(collection: &FeatureCollection) -> SourceSpec {
    SourceSpec::clustered(collection.to_geojson(), &ClusterConfig::default())
}

fn one_lab() -> FeatureCollection {
    let mut props = Map::new();
    props.insert("institution".into(), json!("Lab"));
    FeatureCollection::new(vec![PointFeature::new(Some(FeatureId::from("a")), LngLat::new(0.0, 0.0), props)])
}

// =============================================================
// Sources and layers
// =============================================================

#[test]
fn duplicate_source_is_refused() {
    let mut surface = surface();
    surface.add_source(SOURCE_ID, &spec(&one_lab())).unwrap();
    assert_eq!(
        surface.add_source(SOURCE_ID, &spec(&one_lab())),
        Err(SurfaceError::DuplicateSource(SOURCE_ID.into()))
    );
    assert_eq!(surface.source_count(), 1);
}

#[test]
fn layer_requires_its_source() {
    let mut surface = surface();
    let layer = point_layer(&MapConfig::default());
    assert_eq!(surface.add_layer(&layer), Err(SurfaceError::MissingSource(SOURCE_ID.into())));
    surface.add_source(SOURCE_ID, &spec(&one_lab())).unwrap();
    surface.add_layer(&layer).unwrap();
    assert_eq!(surface.add_layer(&layer), Err(SurfaceError::DuplicateLayer(POINT_LAYER_ID.into())));
}

#[test]
fn source_in_use_cannot_be_removed() {
    let mut surface = surface();
    surface.add_source(SOURCE_ID, &spec(&one_lab())).unwrap();
    surface.add_layer(&point_layer(&MapConfig::default())).unwrap();
    assert!(matches!(surface.remove_source(SOURCE_ID), Err(SurfaceError::Rejected(_))));
    surface.remove_layer(POINT_LAYER_ID).unwrap();
    surface.remove_source(SOURCE_ID).unwrap();
    assert_eq!(surface.remove_source(SOURCE_ID), Err(SurfaceError::MissingSource(SOURCE_ID.into())));
}

#[test]
fn data_updates_can_be_refused() {
    let mut surface = surface();
    surface.add_source(SOURCE_ID, &spec(&FeatureCollection::default())).unwrap();
    surface.reject_data_updates(1);
    let data = one_lab().to_geojson();
    assert!(matches!(surface.set_source_data(SOURCE_ID, &data), Err(SurfaceError::Rejected(_))));
    surface.set_source_data(SOURCE_ID, &data).unwrap();
    assert_eq!(surface.source_features(SOURCE_ID).map(FeatureCollection::len), Some(1));
    assert_eq!(surface.source_spec(SOURCE_ID).map(|s| &s.data), Some(&data));
}

#[test]
fn malformed_source_data_is_rejected() {
    let mut surface = surface();
    let bad = SourceSpec::clustered(json!({ "type": "Point" }), &ClusterConfig::default());
    assert!(matches!(surface.add_source(SOURCE_ID, &bad), Err(SurfaceError::Rejected(_))));
}

// =============================================================
// Queries
// =============================================================

#[test]
fn query_hits_within_radius_only() {
    let mut surface = surface();
    surface.add_source(SOURCE_ID, &spec(&one_lab())).unwrap();
    surface.add_layer(&point_layer(&MapConfig::default())).unwrap();
    let center = surface.project(LngLat::new(0.0, 0.0));

    assert_eq!(surface.query_rendered_features(center, POINT_LAYER_ID).len(), 1);
    let near = Point::new(center.x + 3.0, center.y);
    assert_eq!(surface.query_rendered_features(near, POINT_LAYER_ID).len(), 1);
    let far = Point::new(center.x + 40.0, center.y);
    assert!(surface.query_rendered_features(far, POINT_LAYER_ID).is_empty());
}

#[test]
fn labels_hidden_below_min_zoom() {
    let config = MapConfig::default();
    let mut surface = surface();
    surface.add_source(SOURCE_ID, &spec(&one_lab())).unwrap();
    surface.add_layer(&label_layer(&config)).unwrap();
    let center = surface.project(LngLat::new(0.0, 0.0));
    assert!(surface.query_rendered_features(center, LABEL_LAYER_ID).is_empty());

    surface.ease_to(LngLat::new(0.0, 0.0), config.label_min_zoom, 0);
    let center = surface.project(LngLat::new(0.0, 0.0));
    assert_eq!(surface.query_rendered_features(center, LABEL_LAYER_ID).len(), 1);
}

#[test]
fn query_unknown_layer_is_empty() {
    let surface = surface();
    assert!(surface.query_rendered_features(Point::new(0.0, 0.0), "nope").is_empty());
}

// =============================================================
// Camera and lifecycle
// =============================================================

#[test]
fn fit_bounds_moves_camera() {
    let mut surface = surface();
    let bounds = LngLatBounds::from_points([LngLat::new(10.0, 10.0), LngLat::new(20.0, 20.0)]).unwrap();
    surface.fit_bounds(&bounds, Padding::uniform(20.0), 12.0, 0);
    assert!(bounds.contains(surface.camera().center));
    assert!(surface.camera().zoom > 2.0);
}

#[test]
fn frame_and_expansion_requests_are_drained() {
    let mut surface = surface();
    surface.request_frame();
    surface.request_cluster_expansion_zoom(SOURCE_ID, 4);
    assert!(surface.take_frame_request());
    assert!(!surface.take_frame_request());
    assert_eq!(surface.take_expansion_requests(), [4]);
    assert!(surface.take_expansion_requests().is_empty());
}

#[test]
fn dispose_clears_everything() {
    let mut surface = surface();
    surface.add_source(SOURCE_ID, &spec(&one_lab())).unwrap();
    surface.add_layer(&point_layer(&MapConfig::default())).unwrap();
    surface.dispose();
    assert!(surface.is_disposed());
    assert_eq!(surface.source_count(), 0);
    assert!(surface.layer_ids().is_empty());
}

#[test]
fn source_keeps_only_numeric_ids() {
    let mut surface = surface();
    let collection = FeatureCollection::new(vec![
        PointFeature::new(Some(FeatureId::from("lab-42")), LngLat::new(0.0, 0.0), Map::new()),
        PointFeature::new(Some(FeatureId::from("12")), LngLat::new(1.0, 1.0), Map::new()),
        PointFeature::new(Some(FeatureId::from(7)), LngLat::new(2.0, 2.0), Map::new()),
    ]);
    surface.add_source(SOURCE_ID, &spec(&collection)).unwrap();
    let ids: Vec<Option<FeatureId>> =
        surface.source_features(SOURCE_ID).unwrap().iter().map(|f| f.id.clone()).collect();
    assert_eq!(ids, [None, Some(FeatureId::from(12)), Some(FeatureId::from(7))]);
}
