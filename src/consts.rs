//! Reserved identifiers and shared numeric constants for the map engine.

// ── Identifiers ─────────────────────────────────────────────────

/// The single GeoJSON source bound to the canvas.
pub const SOURCE_ID: &str = "labs";

/// Circles for synthetic cluster points.
pub const CLUSTER_LAYER_ID: &str = "labs-clusters";

/// Circles for individual (unclustered) labs.
pub const POINT_LAYER_ID: &str = "labs-points";

/// Institution name labels above individual labs.
pub const LABEL_LAYER_ID: &str = "labs-labels";

/// Outline drawn around the selected lab, always on top.
pub const SELECTION_LAYER_ID: &str = "labs-selection";

/// Selection key no real feature can carry; the selection layer matches
/// nothing while this is the filter value.
pub const NO_SELECTION_SENTINEL: &str = "\u{0}__labmap_no_selection__";

// ── Property keys ───────────────────────────────────────────────

/// Property set by the clustering engine on synthetic cluster points.
pub const POINT_COUNT_KEY: &str = "point_count";

/// Property carrying the cluster id on synthetic cluster points.
pub const CLUSTER_ID_KEY: &str = "cluster_id";

pub const INSTITUTION_KEY: &str = "institution";
pub const EVIDENCE_COUNT_KEY: &str = "evidence_count";
pub const BSL_LEVEL_KEY: &str = "bsl_level";
pub const PATHOGENS_KEY: &str = "pathogens";
pub const RESEARCH_TYPES_KEY: &str = "research_types";
pub const COUNTRY_KEY: &str = "country";
pub const ID_KEY: &str = "id";

/// Resolved selection key, written into every encoded feature. The renderer
/// may drop or rewrite top-level ids, so the selection filter reads this.
pub const SELECTION_KEY_PROP: &str = "_labmap_key";

// ── Geometry ────────────────────────────────────────────────────

/// Web-Mercator latitude limit in degrees.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Tile size in pixels at zoom 0.
pub const TILE_SIZE_PX: f64 = 512.0;
