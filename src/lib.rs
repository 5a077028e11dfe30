//! Clustered map engine for the biosafety-lab map.
//!
//! Keeps a MapLibre canvas consistent with a stream of lab snapshots:
//! one clustered GeoJSON source, four derived layers, a single highlighted
//! selection and automatic framing. The host forwards map events into
//! [`engine::MapEngine`] and receives selection events back through a
//! callback. In the browser, [`maplibre`] wires all of that up behind the
//! exported `LabMap` class; elsewhere [`headless::HeadlessSurface`] stands in
//! for the map.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level engine; the single synchronization entry point |
//! | [`session`] | Map instance lifecycle and the ready/error channels |
//! | [`viewport`] | Container resize handling |
//! | [`source`] | The lab source: in-place updates and versioned rebuilds |
//! | [`layers`] | Cluster, point, label and selection layer declarations |
//! | [`selection`] | Selection filter, click resolution, cluster expansion |
//! | [`fit`] | Camera framing per snapshot |
//! | [`surface`] | The `MapSurface` trait the components drive |
//! | [`headless`] | In-memory `MapSurface` |
//! | [`maplibre`] | Browser `MapSurface` and `LabMap` (wasm32 only) |
//! | [`feature`] | Lab features, ids and GeoJSON decoding |
//! | [`filter`] | Lab filters and tag vocabularies |
//! | [`camera`] | Coordinates, bounds and Web-Mercator camera math |
//! | [`expr`] | Style-expression evaluator |
//! | [`config`] | `MapConfig` |
//! | [`error`] | Error types |
//! | [`consts`] | Reserved source/layer ids and property keys |

pub mod camera;
pub mod config;
pub mod consts;
pub mod engine;
pub mod error;
pub mod expr;
pub mod feature;
pub mod filter;
pub mod fit;
pub mod headless;
pub mod layers;
#[cfg(target_arch = "wasm32")]
pub mod maplibre;
pub mod selection;
pub mod session;
pub mod source;
pub mod surface;
pub mod viewport;
