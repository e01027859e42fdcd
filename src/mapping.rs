//! Projection of match state into the mapping payload.
//!
//! The output generators assume every entry resolves to a concrete column,
//! so only complete match records (table and field both selected) make it
//! into the payload.

use crate::model::{MappingEntry, MatchRecord};

/// Reduce the match set to its complete records and project them into
/// mapping entries, preserving relative order.
pub fn project(matches: &[MatchRecord]) -> Vec<MappingEntry> {
    matches
        .iter()
        .filter(|m| !m.table_name.is_empty() && !m.field.is_empty())
        .map(|m| MappingEntry {
            table_name: m.table_name.clone(),
            field: m.field.clone(),
            property_iri: m.property_iri.clone(),
        })
        .collect()
}

/// Confidence score for display: `0.8` renders as `80%`, absent as `-`.
pub fn format_score(score: Option<f64>) -> String {
    match score {
        Some(value) => format!("{}%", (value * 100.0).round() as i64),
        None => "-".to_string(),
    }
}
