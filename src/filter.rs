//! Lab filters and the tag vocabularies the filter sidebar offers.
//!
//! Semantics match the backend's `/labs` query: every set criterion must
//! hold; an empty string counts as unset. The engine keeps the unfiltered
//! collection and binds [`LabFilter::apply`] of it, see
//! [`MapEngine::set_filter`](crate::engine::MapEngine::set_filter).

#[cfg(test)]
#[path = "filter_test.rs"]
mod filter_test;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::consts::BSL_LEVEL_KEY;
use crate::feature::{FeatureCollection, PointFeature};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabFilter {
    /// Exact, case-sensitive BSL label (`"BSL-3"`).
    pub bsl_level: Option<String>,
    /// Case-insensitive country name.
    pub country: Option<String>,
    /// Case-insensitive membership in `pathogens`.
    pub pathogen: Option<String>,
    /// Case-insensitive membership in `research_types`.
    pub research_type: Option<String>,
}

impl LabFilter {
    /// No criterion is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [&self.bsl_level, &self.country, &self.pathogen, &self.research_type]
            .into_iter()
            .all(|c| set(c.as_deref()).is_none())
    }

    #[must_use]
    pub fn matches(&self, feature: &PointFeature) -> bool {
        let props = feature.props();
        let raw_bsl = feature.properties.get(BSL_LEVEL_KEY).and_then(Value::as_str);
        if let Some(level) = set(self.bsl_level.as_deref()) {
            if raw_bsl != Some(level) {
                return false;
            }
        }
        if let Some(country) = set(self.country.as_deref()) {
            if !same_text(props.country().unwrap_or_default(), country) {
                return false;
            }
        }
        if let Some(pathogen) = set(self.pathogen.as_deref()) {
            if !props.pathogens().iter().any(|p| same_text(p, pathogen)) {
                return false;
            }
        }
        if let Some(kind) = set(self.research_type.as_deref()) {
            if !props.research_types().iter().any(|r| same_text(r, kind)) {
                return false;
            }
        }
        true
    }

    /// The matching labs, in their original order.
    #[must_use]
    pub fn apply(&self, collection: &FeatureCollection) -> FeatureCollection {
        collection.iter().filter(|f| self.matches(f)).cloned().collect()
    }
}

fn set(criterion: Option<&str>) -> Option<&str> {
    criterion.filter(|s| !s.is_empty())
}

fn same_text(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Every pathogen tag in the collection, sorted and deduplicated.
#[must_use]
pub fn pathogen_vocabulary(collection: &FeatureCollection) -> Vec<String> {
    vocabulary(collection, |f| f.props().pathogens())
}

/// Every research-type tag in the collection, sorted and deduplicated.
#[must_use]
pub fn research_type_vocabulary(collection: &FeatureCollection) -> Vec<String> {
    vocabulary(collection, |f| f.props().research_types())
}

fn vocabulary<'a, F>(collection: &'a FeatureCollection, tags: F) -> Vec<String>
where
    F: Fn(&'a PointFeature) -> Vec<&'a str>,
{
    let unique: BTreeSet<&str> = collection.iter().flat_map(tags).collect();
    unique.into_iter().map(str::to_string).collect()
}
