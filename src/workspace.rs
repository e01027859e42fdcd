//! Workbench application state.
//!
//! A single explicit state struct plus pure derivation functions, mutated
//! only through the transition methods below. Collaborator responses are
//! applied wholesale; derived values (grouped view, mapping payload) are
//! recomputed on every read rather than stored.

use thiserror::Error;

use crate::graph::{self, GraphModel};
use crate::grouping::{self, PropertyGroup};
use crate::mapping;
use crate::model::{
    DataParseResponse, DataProperty, IriRef, MappingEntry, MatchMode, MatchRecord, MatchRequest,
    MatchResponse, ObjectProperty, OutputArtifact, Table, TboxParseResponse,
};

/// Precondition failures for user actions. None of these mutate state; all
/// are recoverable by completing the missing step and retrying.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkspaceError {
    #[error("another request is still in flight")]
    Busy,

    #[error("no ontology has been parsed yet")]
    NoOntology,

    #[error("no data tables have been parsed yet")]
    NoTables,

    #[error("no complete mapping entries selected yet")]
    EmptyMapping,
}

/// The whole workbench state.
#[derive(Debug, Default)]
pub struct Workspace {
    properties: Vec<DataProperty>,
    classes: Vec<IriRef>,
    object_properties: Vec<ObjectProperty>,
    ttl: String,
    leaf_only: bool,
    tables: Vec<Table>,
    file_count: usize,
    table_count: usize,
    matches: Vec<MatchRecord>,
    output: OutputArtifact,
    busy: bool,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    // --- busy gate -------------------------------------------------------

    /// Claim the single action slot. While an asynchronous collaborator call
    /// is outstanding, a second submission of any kind is rejected.
    pub fn begin_action(&mut self) -> Result<(), WorkspaceError> {
        if self.busy {
            return Err(WorkspaceError::Busy);
        }
        self.busy = true;
        Ok(())
    }

    /// Release the action slot. Safe to call when not busy.
    pub fn finish_action(&mut self) {
        self.busy = false;
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    // --- collaborator responses ------------------------------------------

    /// Replace the ontology state wholesale and rebuild the match records
    /// with empty selections.
    pub fn apply_tbox_response(&mut self, response: TboxParseResponse) {
        self.properties = response.properties;
        self.classes = response.classes;
        self.object_properties = response.object_properties;
        self.ttl = response.ttl;
        self.rebuild_matches();
    }

    /// Replace the parsed tables and clear every match selection: the field
    /// candidate space just changed under them.
    pub fn apply_data_response(&mut self, response: DataParseResponse) {
        self.table_count = if response.table_count > 0 {
            response.table_count
        } else {
            response.tables.len()
        };
        self.tables = response.tables;
        self.file_count = response.file_count;
        for record in &mut self.matches {
            record.table_name.clear();
            record.field.clear();
            record.score = None;
        }
    }

    /// Replace the match records with a fresh match-run result.
    pub fn apply_match_response(&mut self, response: MatchResponse) {
        self.matches = response.matches;
    }

    pub fn set_output(&mut self, output: OutputArtifact) {
        self.output = output;
    }

    // --- filter and selections -------------------------------------------

    /// Toggle the leaf-only property filter. Rebuilds the match records with
    /// empty selections whenever the filtered view changes; in-progress
    /// selections are not carried over, matching the original workbench.
    pub fn set_leaf_only(&mut self, leaf_only: bool) {
        if self.leaf_only == leaf_only {
            return;
        }
        self.leaf_only = leaf_only;
        self.rebuild_matches();
    }

    pub fn leaf_only(&self) -> bool {
        self.leaf_only
    }

    /// Select a table for a property. Clears any previously selected field:
    /// changing the table invalidates the field choice space.
    pub fn select_table(&mut self, property_iri: &str, table_name: &str) {
        if let Some(record) = self
            .matches
            .iter_mut()
            .find(|m| m.property_iri == property_iri)
        {
            record.table_name = table_name.to_string();
            record.field.clear();
        }
    }

    /// Select a field for a property. Leaves the table selection untouched.
    pub fn select_field(&mut self, property_iri: &str, field: &str) {
        if let Some(record) = self
            .matches
            .iter_mut()
            .find(|m| m.property_iri == property_iri)
        {
            record.field = field.to_string();
        }
    }

    fn rebuild_matches(&mut self) {
        self.matches = self
            .filtered_properties()
            .iter()
            .map(MatchRecord::empty_for)
            .collect();
    }

    // --- derived views ----------------------------------------------------

    /// The property list under the current leaf-only filter.
    pub fn filtered_properties(&self) -> Vec<DataProperty> {
        self.properties
            .iter()
            .filter(|p| !self.leaf_only || p.is_leaf)
            .cloned()
            .collect()
    }

    pub fn leaf_count(&self) -> usize {
        self.properties.iter().filter(|p| p.is_leaf).count()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Number of distinct field names across all tables.
    pub fn field_count(&self) -> usize {
        let mut fields: Vec<&str> = self
            .tables
            .iter()
            .flat_map(|t| t.fields.iter().map(String::as_str))
            .collect();
        fields.sort_unstable();
        fields.dedup();
        fields.len()
    }

    /// Derive the class graph from the current ontology state.
    pub fn build_graph(&self) -> GraphModel {
        graph::build(&self.classes, &self.object_properties)
    }

    /// The grouped match view: filtered properties partitioned by class and
    /// merged with match state.
    pub fn grouped_matches(&self) -> Vec<PropertyGroup> {
        grouping::group(&self.filtered_properties(), &self.matches)
    }

    /// The mapping payload: complete match records only, recomputed on every
    /// read.
    pub fn mapping_payload(&self) -> Vec<MappingEntry> {
        mapping::project(&self.matches)
    }

    pub fn matches(&self) -> &[MatchRecord] {
        &self.matches
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    pub fn table_count(&self) -> usize {
        self.table_count
    }

    pub fn ttl(&self) -> &str {
        &self.ttl
    }

    pub fn output(&self) -> &OutputArtifact {
        &self.output
    }

    // --- action preconditions --------------------------------------------

    /// Assemble a match request, or fail if the upstream parses are missing.
    pub fn match_request(
        &self,
        mode: MatchMode,
        threshold: f64,
    ) -> Result<MatchRequest, WorkspaceError> {
        let properties = self.filtered_properties();
        if properties.is_empty() {
            return Err(WorkspaceError::NoOntology);
        }
        if self.tables.is_empty() {
            return Err(WorkspaceError::NoTables);
        }
        Ok(MatchRequest {
            properties,
            tables: self.tables.clone(),
            mode,
            threshold,
        })
    }

    /// Tables plus mapping payload for ABox generation.
    pub fn abox_payload(&self) -> Result<(Vec<Table>, Vec<MappingEntry>), WorkspaceError> {
        let mapping = self.mapping_payload();
        if mapping.is_empty() {
            return Err(WorkspaceError::EmptyMapping);
        }
        if self.tables.is_empty() {
            return Err(WorkspaceError::NoTables);
        }
        Ok((self.tables.clone(), mapping))
    }

    /// Mapping payload for R2RML generation.
    pub fn r2rml_payload(&self) -> Result<Vec<MappingEntry>, WorkspaceError> {
        let mapping = self.mapping_payload();
        if mapping.is_empty() {
            return Err(WorkspaceError::EmptyMapping);
        }
        Ok(mapping)
    }

    /// Back to the initial state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
