//! Shared data model for the mapping workbench.
//!
//! These types are the wire shapes exchanged with the frontend and between
//! the collaborator services (TBox parse, tabular parse, match run, output
//! generation). Field names are snake_case on the wire.

use serde::{Deserialize, Serialize};

/// A row of tabular data: field name to cell value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A reference to an ontology class or datatype, as it appears in a
/// property's domain or range list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IriRef {
    pub iri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,
}

impl IriRef {
    /// Label shown to the user: label, then local name, then the raw IRI.
    pub fn display_label(&self) -> &str {
        self.label
            .as_deref()
            .or(self.local_name.as_deref())
            .unwrap_or(&self.iri)
    }
}

/// An `owl:DatatypeProperty` (or plain `rdf:Property`) from the TBox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataProperty {
    pub iri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,

    #[serde(default)]
    pub domains: Vec<IriRef>,

    #[serde(default)]
    pub ranges: Vec<IriRef>,

    /// A leaf property has no declared sub-properties.
    #[serde(default = "default_true")]
    pub is_leaf: bool,
}

impl DataProperty {
    pub fn display_label(&self) -> &str {
        self.label
            .as_deref()
            .or(self.local_name.as_deref())
            .unwrap_or(&self.iri)
    }
}

fn default_true() -> bool {
    true
}

/// An `owl:ObjectProperty` from the TBox. Domains and ranges become the
/// relational edges of the class graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperty {
    pub iri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,

    #[serde(default)]
    pub domains: Vec<IriRef>,

    #[serde(default)]
    pub ranges: Vec<IriRef>,
}

/// A parsed data table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,

    #[serde(default)]
    pub fields: Vec<String>,

    /// First few rows, used for match scoring and the preview pane.
    #[serde(default)]
    pub sample_rows: Vec<Row>,

    /// All rows, used for ABox generation.
    #[serde(default)]
    pub rows: Vec<Row>,
}

/// The match state for a single data property: the candidate table/field and
/// an opaque confidence score. Empty strings mean "not selected".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub property_iri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_label: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub table_name: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub field: String,

    #[serde(default)]
    pub score: Option<f64>,
}

impl MatchRecord {
    /// An empty record for a property: no table, no field, no score.
    pub fn empty_for(prop: &DataProperty) -> Self {
        Self {
            property_iri: prop.iri.clone(),
            property_label: prop.label.clone().or_else(|| prop.local_name.clone()),
            table_name: String::new(),
            field: String::new(),
            score: None,
        }
    }
}

/// Tolerate `null` where the original API sends it for unselected values.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

/// A fully resolved (table, field, property) triple ready for output
/// generation. Derived only from complete match records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub table_name: String,
    pub field: String,
    pub property_iri: String,
}

/// Matching strategy requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    Heuristic,
    Llm,
}

/// Response of the TBox parse service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TboxParseResponse {
    #[serde(default)]
    pub properties: Vec<DataProperty>,

    #[serde(default)]
    pub classes: Vec<IriRef>,

    #[serde(default)]
    pub object_properties: Vec<ObjectProperty>,

    /// Turtle serialization of the parsed graph, for display only.
    #[serde(default)]
    pub ttl: String,
}

/// Response of the tabular parse service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataParseResponse {
    #[serde(default)]
    pub tables: Vec<Table>,

    #[serde(default)]
    pub file_count: usize,

    #[serde(default)]
    pub table_count: usize,
}

/// Request for a match run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequest {
    #[serde(default)]
    pub properties: Vec<DataProperty>,

    #[serde(default)]
    pub tables: Vec<Table>,

    #[serde(default = "default_mode")]
    pub mode: MatchMode,

    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_mode() -> MatchMode {
    MatchMode::Heuristic
}

fn default_threshold() -> f64 {
    0.5
}

/// Response of a match run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchResponse {
    #[serde(default)]
    pub matches: Vec<MatchRecord>,
}

/// A generated output artifact (ABox or R2RML text).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub format: String,
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(iri: &str, label: Option<&str>, local: Option<&str>) -> DataProperty {
        DataProperty {
            iri: iri.to_string(),
            label: label.map(str::to_string),
            local_name: local.map(str::to_string),
            domains: vec![],
            ranges: vec![],
            is_leaf: true,
        }
    }

    #[test]
    fn display_label_prefers_label_then_local_name() {
        assert_eq!(
            prop("ex:p", Some("Name"), Some("name")).display_label(),
            "Name"
        );
        assert_eq!(prop("ex:p", None, Some("name")).display_label(), "name");
        assert_eq!(prop("ex:p", None, None).display_label(), "ex:p");
    }

    #[test]
    fn match_record_tolerates_null_selections() {
        let json = r#"{"property_iri":"ex:p","table_name":null,"field":null,"score":null}"#;
        let record: MatchRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.table_name, "");
        assert_eq!(record.field, "");
        assert_eq!(record.score, None);
    }

    #[test]
    fn match_request_defaults() {
        let request: MatchRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.mode, MatchMode::Heuristic);
        assert_eq!(request.threshold, 0.5);
        assert!(request.properties.is_empty());
    }

    #[test]
    fn data_property_is_leaf_defaults_true() {
        let prop: DataProperty = serde_json::from_str(r#"{"iri":"ex:p"}"#).unwrap();
        assert!(prop.is_leaf);
    }

    #[test]
    fn match_mode_wire_names() {
        assert_eq!(serde_json::to_string(&MatchMode::Llm).unwrap(), "\"llm\"");
        let mode: MatchMode = serde_json::from_str("\"heuristic\"").unwrap();
        assert_eq!(mode, MatchMode::Heuristic);
    }
}
