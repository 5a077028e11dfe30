use serde_json::{Map, json};

use super::*;
use crate::camera::LngLat;

fn lab(props: Value) -> PointFeature {
    let map: Map<String, Value> = props.as_object().cloned().unwrap_or_default();
    PointFeature::new(None, LngLat::new(0.0, 0.0), map)
}

fn sample() -> FeatureCollection {
    FeatureCollection::new(vec![
        lab(json!({
            "institution": "Alpha Institute",
            "country": "Germany",
            "bsl_level": "BSL-4",
            "pathogens": ["Ebola", "Marburg"],
            "research_types": ["Vaccine"],
        })),
        lab(json!({
            "institution": "Beta Lab",
            "country": "United States",
            "bsl_level": "BSL-3",
            "pathogens": ["SARS-CoV-2"],
            "research_types": ["Gain of function", "Vaccine"],
        })),
        lab(json!({
            "institution": "Gamma Centre",
            "bsl_level": "BSL-2",
            "pathogens": ["Influenza"],
        })),
    ])
}

fn names(collection: &FeatureCollection) -> Vec<&str> {
    collection.iter().filter_map(|f| f.props().institution()).collect()
}

#[test]
fn empty_filter_keeps_everything() {
    let filter = LabFilter::default();
    assert!(filter.is_empty());
    assert_eq!(filter.apply(&sample()).len(), 3);
}

#[test]
fn empty_strings_count_as_unset() {
    let filter = LabFilter { country: Some(String::new()), pathogen: Some(String::new()), ..LabFilter::default() };
    assert!(filter.is_empty());
    assert_eq!(filter.apply(&sample()).len(), 3);
}

#[test]
fn bsl_level_is_exact() {
    let collection = sample();
    let filter = LabFilter { bsl_level: Some("BSL-4".into()), ..LabFilter::default() };
    let matched = filter.apply(&collection);
    assert_eq!(names(&matched), ["Alpha Institute"]);

    let lower = LabFilter { bsl_level: Some("bsl-4".into()), ..LabFilter::default() };
    assert!(lower.apply(&collection).is_empty());
}

#[test]
fn country_ignores_case_and_requires_presence() {
    let collection = sample();
    let filter = LabFilter { country: Some("united states".into()), ..LabFilter::default() };
    let matched = filter.apply(&collection);
    assert_eq!(names(&matched), ["Beta Lab"]);

    // Gamma has no country at all.
    let any = LabFilter { country: Some("Canada".into()), ..LabFilter::default() };
    assert!(any.apply(&collection).is_empty());
}

#[test]
fn tag_membership_ignores_case() {
    let collection = sample();
    let filter = LabFilter { pathogen: Some("ebola".into()), ..LabFilter::default() };
    let matched = filter.apply(&collection);
    assert_eq!(names(&matched), ["Alpha Institute"]);

    let filter = LabFilter { research_type: Some("VACCINE".into()), ..LabFilter::default() };
    let matched = filter.apply(&collection);
    assert_eq!(names(&matched), ["Alpha Institute", "Beta Lab"]);
}

#[test]
fn criteria_combine() {
    let filter = LabFilter {
        research_type: Some("Vaccine".into()),
        bsl_level: Some("BSL-3".into()),
        ..LabFilter::default()
    };
    let collection = sample();
    let matched = filter.apply(&collection);
    assert_eq!(names(&matched), ["Beta Lab"]);
}

#[test]
fn filter_deserializes_from_partial_json() {
    let filter: LabFilter = serde_json::from_value(json!({ "pathogen": "Influenza" })).unwrap();
    assert_eq!(filter.pathogen.as_deref(), Some("Influenza"));
    assert_eq!(filter.bsl_level, None);
}

#[test]
fn vocabularies_are_sorted_and_unique() {
    let collection = sample();
    assert_eq!(pathogen_vocabulary(&collection), ["Ebola", "Influenza", "Marburg", "SARS-CoV-2"]);
    assert_eq!(research_type_vocabulary(&collection), ["Gain of function", "Vaccine"]);
    assert!(pathogen_vocabulary(&FeatureCollection::default()).is_empty());
}
