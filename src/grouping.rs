//! Grouping of data properties by their declaring class.
//!
//! Partitions the currently filtered property list by the IRI of each
//! property's first listed domain class and merges every property with its
//! current match record, producing the view model behind the match table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{DataProperty, MatchRecord};

/// Label of the bucket for properties that declare no domain class. Distinct
/// from any real IRI.
pub const UNSPECIFIED_CLASS: &str = "unspecified class";

/// A property merged with its current match state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedItem {
    pub property_iri: String,
    pub property_label: String,
    pub table_name: String,
    pub field: String,
    pub score: Option<f64>,
}

/// All properties declared by one class, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyGroup {
    pub class_name: String,
    /// Empty for the unspecified-class bucket.
    pub class_iri: String,
    pub items: Vec<GroupedItem>,
}

/// Group `filtered_properties` by primary domain class and merge in match
/// records by property IRI. Groups keep first-seen order; properties with no
/// match record default to empty selections. The partition is lossless:
/// every property lands in exactly one group. Never fails.
pub fn group(filtered_properties: &[DataProperty], matches: &[MatchRecord]) -> Vec<PropertyGroup> {
    let match_map: HashMap<&str, &MatchRecord> = matches
        .iter()
        .map(|m| (m.property_iri.as_str(), m))
        .collect();

    let mut groups: Vec<PropertyGroup> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();

    for prop in filtered_properties {
        let domain = prop.domains.first().filter(|d| !d.iri.is_empty());
        let (key, class_name, class_iri) = match domain {
            Some(d) => (d.iri.clone(), d.display_label().to_string(), d.iri.clone()),
            None => (
                UNSPECIFIED_CLASS.to_string(),
                UNSPECIFIED_CLASS.to_string(),
                String::new(),
            ),
        };

        let index = *group_index.entry(key).or_insert_with(|| {
            groups.push(PropertyGroup {
                class_name,
                class_iri,
                items: Vec::new(),
            });
            groups.len() - 1
        });

        let record = match_map.get(prop.iri.as_str());
        groups[index].items.push(GroupedItem {
            property_iri: prop.iri.clone(),
            property_label: prop.display_label().to_string(),
            table_name: record.map(|m| m.table_name.clone()).unwrap_or_default(),
            field: record.map(|m| m.field.clone()).unwrap_or_default(),
            score: record.and_then(|m| m.score),
        });
    }

    groups
}
