//! Engine configuration.
//!
//! The host passes configuration as JSON (a browser has no environment to read
//! from). Every field has a default, so `{}` is a valid config; callers
//! override only what they need.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use serde::{Deserialize, Serialize};

use crate::camera::{Camera, Padding};
use crate::error::ConfigError;
use crate::feature::BslLevel;

pub const DEFAULT_STYLE_URL: &str = "https://demotiles.maplibre.org/style.json";
pub const MAX_ZOOM: f64 = 24.0;

/// One bucket of the cluster `step` expressions. Clusters with at least
/// `min_count` points (and fewer than the next bucket's) use this bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterBucket {
    pub min_count: u32,
    pub radius: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Highest zoom at which points are still clustered.
    pub max_zoom: u8,
    /// Cluster radius in pixels.
    pub radius: u32,
    /// Ascending buckets; the first must start at 0.
    pub buckets: Vec<ClusterBucket>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_zoom: 14,
            radius: 50,
            buckets: vec![
                ClusterBucket { min_count: 0, radius: 18.0, color: "#51bbd6".into() },
                ClusterBucket { min_count: 10, radius: 24.0, color: "#f1f075".into() },
                ClusterBucket { min_count: 50, radius: 32.0, color: "#f28cb1".into() },
            ],
        }
    }
}

/// A stop on the evidence-count → circle-radius curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusStop {
    pub evidence: f64,
    pub radius: f64,
}

/// Fill colors for individual labs, keyed by biosafety level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BslPalette {
    pub bsl1: String,
    pub bsl2: String,
    pub bsl3: String,
    pub bsl4: String,
    pub unknown: String,
}

impl Default for BslPalette {
    fn default() -> Self {
        Self {
            bsl1: "#4caf50".into(),
            bsl2: "#ffc107".into(),
            bsl3: "#ff7043".into(),
            bsl4: "#d32f2f".into(),
            unknown: "#9e9e9e".into(),
        }
    }
}

impl BslPalette {
    #[must_use]
    pub fn color(&self, level: BslLevel) -> &str {
        match level {
            BslLevel::Bsl1 => &self.bsl1,
            BslLevel::Bsl2 => &self.bsl2,
            BslLevel::Bsl3 => &self.bsl3,
            BslLevel::Bsl4 => &self.bsl4,
            BslLevel::Unknown => &self.unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// MapLibre style document for the base map.
    pub style_url: String,
    /// Camera used until the first snapshot frames the data.
    pub initial_camera: Camera,
    pub cluster: ClusterConfig,
    /// Ascending stops; radii are clamped outside the first and last stop.
    pub evidence_radius: Vec<RadiusStop>,
    pub palette: BslPalette,
    pub label_min_zoom: f64,
    pub selection_color: String,
    pub selection_stroke_width: f64,
    /// Zoom used when focusing a single selected lab.
    pub focus_zoom: f64,
    pub focus_duration_ms: u32,
    /// Padding in pixels on all four sides when fitting bounds.
    pub fit_padding: f64,
    /// Upper zoom bound for fit-bounds, so one unselected lab is not framed at street level.
    pub fit_max_zoom: f64,
    pub fit_duration_ms: u32,
    /// Attempts at recreating the source after a rejected update before giving up.
    pub max_rebuild_attempts: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            style_url: DEFAULT_STYLE_URL.into(),
            initial_camera: Camera::default(),
            cluster: ClusterConfig::default(),
            evidence_radius: vec![
                RadiusStop { evidence: 1.0, radius: 6.0 },
                RadiusStop { evidence: 10.0, radius: 9.0 },
                RadiusStop { evidence: 100.0, radius: 13.0 },
                RadiusStop { evidence: 1000.0, radius: 18.0 },
            ],
            palette: BslPalette::default(),
            label_min_zoom: 6.0,
            selection_color: "#1565c0".into(),
            selection_stroke_width: 3.0,
            focus_zoom: 10.0,
            focus_duration_ms: 1200,
            fit_padding: 50.0,
            fit_max_zoom: 12.0,
            fit_duration_ms: 800,
            max_rebuild_attempts: 3,
        }
    }
}

impl MapConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] when [`MapConfig::validate`] fails.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Uniform fit-bounds padding.
    #[must_use]
    pub fn padding(&self) -> Padding {
        Padding::uniform(self.fit_padding)
    }

    /// Check the invariants the layer expressions rely on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let buckets = &self.cluster.buckets;
        match buckets.first() {
            None => return Err(invalid("cluster.buckets must not be empty")),
            Some(first) if first.min_count != 0 => return Err(invalid("cluster.buckets must start at min_count 0")),
            Some(_) => {}
        }
        if buckets.windows(2).any(|w| w[0].min_count >= w[1].min_count) {
            return Err(invalid("cluster.buckets must be strictly ascending by min_count"));
        }
        if buckets.iter().any(|b| !(b.radius > 0.0)) {
            return Err(invalid("cluster bucket radius must be positive"));
        }

        if self.evidence_radius.is_empty() {
            return Err(invalid("evidence_radius must not be empty"));
        }
        if self.evidence_radius.windows(2).any(|w| !(w[0].evidence < w[1].evidence)) {
            return Err(invalid("evidence_radius stops must be strictly ascending"));
        }
        if self.evidence_radius.iter().any(|s| !(s.radius > 0.0)) {
            return Err(invalid("evidence_radius radii must be positive"));
        }

        if !(self.fit_padding >= 0.0) {
            return Err(invalid("fit_padding must be non-negative"));
        }
        for (name, zoom) in [
            ("focus_zoom", self.focus_zoom),
            ("fit_max_zoom", self.fit_max_zoom),
            ("label_min_zoom", self.label_min_zoom),
            ("initial_camera.zoom", self.initial_camera.zoom),
        ] {
            if !(0.0..=MAX_ZOOM).contains(&zoom) {
                return Err(invalid(&format!("{name} must be within 0..={MAX_ZOOM}")));
            }
        }
        if !self.initial_camera.center.is_valid() {
            return Err(invalid("initial_camera.center is not a valid coordinate"));
        }
        if self.max_rebuild_attempts == 0 {
            return Err(invalid("max_rebuild_attempts must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}
