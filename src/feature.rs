//! Data model: laboratory point features and the snapshot collection.
//!
//! A [`FeatureCollection`] is the engine's only data input. It is a snapshot:
//! each new value replaces the previous one wholesale. Features whose geometry
//! is not a finite, in-range point are dropped here, before anything reaches
//! the rendering layer.
//!
//! Properties stay an open-ended JSON bag (`serde_json::Map`) because the
//! upstream pipeline passes CSV columns straight through; [`LabProps`] gives
//! typed access to the handful of keys the engine actually reads.

#[cfg(test)]
#[path = "feature_test.rs"]
mod feature_test;

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::camera::{LngLat, LngLatBounds};
use crate::consts::{
    BSL_LEVEL_KEY, COUNTRY_KEY, EVIDENCE_COUNT_KEY, ID_KEY, INSTITUTION_KEY, PATHOGENS_KEY, RESEARCH_TYPES_KEY,
    SELECTION_KEY_PROP,
};
use crate::error::DataError;
use crate::expr::number_to_string;

/// Identifier of a feature: GeoJSON allows either a string or a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureId {
    Text(String),
    Number(serde_json::Number),
}

impl FeatureId {
    /// Interpret a JSON value as an identifier. Anything other than a
    /// non-empty string or a number is not an identifier.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self::Text(s.clone())),
            Value::Number(n) => Some(Self::Number(n.clone())),
            _ => None,
        }
    }

    /// The identifier compared as a string, the way the selection filter does.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => number_to_string(n),
        }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Number(n) => Value::Number(n.clone()),
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for FeatureId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FeatureId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

/// Biosafety level category. Anything outside the closed set is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BslLevel {
    Bsl1,
    Bsl2,
    Bsl3,
    Bsl4,
    Unknown,
}

impl BslLevel {
    /// Every known level, in ascending containment order.
    pub const KNOWN: [Self; 4] = [Self::Bsl1, Self::Bsl2, Self::Bsl3, Self::Bsl4];

    /// Parse the label used on the wire (`"BSL-3"`). Matching is exact, the
    /// same way the point layer's color lookup matches.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label {
            "BSL-1" => Self::Bsl1,
            "BSL-2" => Self::Bsl2,
            "BSL-3" => Self::Bsl3,
            "BSL-4" => Self::Bsl4,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bsl1 => "BSL-1",
            Self::Bsl2 => "BSL-2",
            Self::Bsl3 => "BSL-3",
            Self::Bsl4 => "BSL-4",
            Self::Unknown => "Unknown",
        }
    }
}

/// Typed access to the property bag of a lab feature.
pub struct LabProps<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> LabProps<'a> {
    /// Wrap a property bag for typed access.
    #[must_use]
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    /// Institution name, if present and non-empty.
    #[must_use]
    pub fn institution(&self) -> Option<&'a str> {
        self.map.get(INSTITUTION_KEY).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// Number of supporting citations. Accepts numbers or numeric strings;
    /// defaults to `0.0`.
    #[must_use]
    pub fn evidence_count(&self) -> f64 {
        match self.map.get(EVIDENCE_COUNT_KEY) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    #[must_use]
    pub fn bsl_level(&self) -> BslLevel {
        self.map.get(BSL_LEVEL_KEY).and_then(Value::as_str).map_or(BslLevel::Unknown, BslLevel::parse)
    }

    #[must_use]
    pub fn country(&self) -> Option<&'a str> {
        self.map.get(COUNTRY_KEY).and_then(Value::as_str)
    }

    /// Pathogen tags. Empty when absent or not an array of strings.
    #[must_use]
    pub fn pathogens(&self) -> Vec<&'a str> {
        self.tags(PATHOGENS_KEY)
    }

    /// Research-type tags. Empty when absent or not an array of strings.
    #[must_use]
    pub fn research_types(&self) -> Vec<&'a str> {
        self.tags(RESEARCH_TYPES_KEY)
    }

    /// Identifier stored inside the property bag (as opposed to the
    /// feature's top-level id).
    #[must_use]
    pub fn id(&self) -> Option<FeatureId> {
        self.map.get(ID_KEY).and_then(FeatureId::from_value)
    }

    fn tags(&self, key: &str) -> Vec<&'a str> {
        self.map
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// One laboratory record.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    /// Top-level GeoJSON id, if the producer set one.
    pub id: Option<FeatureId>,
    pub coordinates: LngLat,
    pub properties: Map<String, Value>,
}

impl PointFeature {
    #[must_use]
    pub fn new(id: Option<FeatureId>, coordinates: LngLat, properties: Map<String, Value>) -> Self {
        Self { id, coordinates, properties }
    }

    #[must_use]
    pub fn props(&self) -> LabProps<'_> {
        LabProps::new(&self.properties)
    }

    /// The key this feature is selected by: top-level id, then property id,
    /// then institution name. `None` if the feature carries none of them.
    ///
    /// A feature read back from a rendered source carries its key in
    /// [`SELECTION_KEY_PROP`]; that value wins, since it is what the
    /// selection filter compares against.
    #[must_use]
    pub fn selection_key(&self) -> Option<String> {
        match self.properties.get(SELECTION_KEY_PROP) {
            Some(Value::String(key)) if !key.is_empty() => Some(key.clone()),
            _ => self.resolved_key(),
        }
    }

    fn resolved_key(&self) -> Option<String> {
        self.id
            .as_ref()
            .map(FeatureId::key)
            .or_else(|| self.props().id().map(|id| id.key()))
            .or_else(|| self.props().institution().map(str::to_string))
    }

    /// Property bag without the engine's reserved keys.
    #[must_use]
    pub fn public_properties(&self) -> Map<String, Value> {
        let mut properties = self.properties.clone();
        properties.remove(SELECTION_KEY_PROP);
        properties
    }

    /// Decode a single GeoJSON `Feature`. `None` unless it has a valid point
    /// geometry.
    #[must_use]
    pub fn from_geojson(value: &Value) -> Option<Self> {
        let coordinates = value.get("geometry").and_then(point_coordinates).filter(|c| c.is_valid())?;
        let id = value.get("id").and_then(FeatureId::from_value);
        let properties = value.get("properties").and_then(Value::as_object).cloned().unwrap_or_default();
        Some(Self::new(id, coordinates, properties))
    }

    /// Encode as a GeoJSON `Feature`, with the selection key stored under
    /// [`SELECTION_KEY_PROP`].
    #[must_use]
    pub fn to_geojson(&self) -> Value {
        let mut properties = self.public_properties();
        if let Some(key) = self.selection_key() {
            properties.insert(SELECTION_KEY_PROP.into(), Value::String(key));
        }
        let mut feature = json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": self.coordinates.to_array() },
            "properties": Value::Object(properties),
        });
        if let (Some(id), Some(obj)) = (&self.id, feature.as_object_mut()) {
            obj.insert("id".into(), id.to_value());
        }
        feature
    }
}

/// Ordered snapshot of point features.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    features: Vec<PointFeature>,
}

#[derive(Deserialize)]
struct RawCollection {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    geometry: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

impl FeatureCollection {
    /// Build a collection, dropping features with invalid coordinates.
    #[must_use]
    pub fn new(features: Vec<PointFeature>) -> Self {
        let total = features.len();
        let features: Vec<PointFeature> = features
            .into_iter()
            .filter(|f| {
                let valid = f.coordinates.is_valid();
                if !valid {
                    warn!(
                        id = ?f.id,
                        lng = f.coordinates.lng,
                        lat = f.coordinates.lat,
                        "dropping feature with invalid coordinates"
                    );
                }
                valid
            })
            .collect();
        if features.len() < total {
            warn!(dropped = total - features.len(), kept = features.len(), "feature collection had invalid features");
        }
        Self { features }
    }

    /// Decode a GeoJSON `FeatureCollection` from text.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Json`] for malformed JSON and
    /// [`DataError::NotFeatureCollection`] for any other GeoJSON type.
    pub fn from_geojson_str(text: &str) -> Result<Self, DataError> {
        let raw: RawCollection = serde_json::from_str(text)?;
        Self::from_raw(raw)
    }

    /// Decode a GeoJSON `FeatureCollection` from an already-parsed value.
    ///
    /// # Errors
    ///
    /// Same as [`FeatureCollection::from_geojson_str`].
    pub fn from_value(value: Value) -> Result<Self, DataError> {
        let raw: RawCollection = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawCollection) -> Result<Self, DataError> {
        match raw.kind.as_deref() {
            Some("FeatureCollection") => {}
            other => return Err(DataError::NotFeatureCollection(other.unwrap_or("<missing>").to_string())),
        }
        let mut features = Vec::with_capacity(raw.features.len());
        for (index, f) in raw.features.into_iter().enumerate() {
            let Some(coordinates) = f.geometry.as_ref().and_then(point_coordinates) else {
                warn!(index, "dropping feature without point geometry");
                continue;
            };
            let id = f.id.as_ref().and_then(FeatureId::from_value);
            features.push(PointFeature::new(id, coordinates, f.properties.unwrap_or_default()));
        }
        Ok(Self::new(features))
    }

    /// Encode as a GeoJSON `FeatureCollection`, preserving order.
    #[must_use]
    pub fn to_geojson(&self) -> Value {
        json!({
            "type": "FeatureCollection",
            "features": self.features.iter().map(PointFeature::to_geojson).collect::<Vec<_>>(),
        })
    }

    #[must_use]
    pub fn features(&self) -> &[PointFeature] {
        &self.features
    }

    pub fn iter(&self) -> impl Iterator<Item = &PointFeature> {
        self.features.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Smallest bounds covering every feature, `None` when empty.
    #[must_use]
    pub fn bounds(&self) -> Option<LngLatBounds> {
        LngLatBounds::from_points(self.features.iter().map(|f| f.coordinates))
    }

    /// Look a feature up by its top-level id.
    #[must_use]
    pub fn find(&self, id: &FeatureId) -> Option<&PointFeature> {
        self.features.iter().find(|f| f.id.as_ref() == Some(id))
    }

    /// Look a feature up by its selection key (see [`PointFeature::selection_key`]).
    #[must_use]
    pub fn find_by_selection_key(&self, key: &str) -> Option<&PointFeature> {
        self.features.iter().find(|f| f.selection_key().as_deref() == Some(key))
    }
}

impl FromIterator<PointFeature> for FeatureCollection {
    fn from_iter<T: IntoIterator<Item = PointFeature>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn point_coordinates(geometry: &Value) -> Option<LngLat> {
    if geometry.get("type").and_then(Value::as_str) != Some("Point") {
        return None;
    }
    let coords = geometry.get("coordinates")?.as_array()?;
    let lng = coords.first()?.as_f64()?;
    let lat = coords.get(1)?.as_f64()?;
    Some(LngLat::new(lng, lat))
}
