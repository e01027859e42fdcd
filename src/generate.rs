//! Output generation: ABox instance data and R2RML mapping documents.

use std::fs;
use std::path::Path;

use sophia::api::graph::MutableGraph;
use sophia::api::serializer::TripleSerializer;
use sophia::inmem::graph::FastGraph;
use sophia::iri::Iri;
use sophia::turtle::serializer::turtle::TurtleSerializer;
use thiserror::Error;
use tracing::info;

use crate::model::{MappingEntry, OutputArtifact, Table};

/// Base IRI used when a request does not provide one.
pub const DEFAULT_BASE_IRI: &str = "http://example.com/";

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("invalid IRI: {0}")]
    InvalidIri(String),

    #[error("turtle serialization failed: {0}")]
    Serialize(String),

    #[error("failed to write output file")]
    Io(#[from] std::io::Error),
}

/// Generate instance data as Turtle: one subject per row, one triple per
/// mapping entry whose cell is present. When `output_dir` is given the
/// document is also written to a timestamped `.ttl` file there.
pub fn generate_abox(
    tables: &[Table],
    mapping: &[MappingEntry],
    base_iri: &str,
    output_dir: Option<&Path>,
) -> Result<OutputArtifact, GenerateError> {
    let base = normalize_base(base_iri);
    let mut graph = FastGraph::new();

    let predicates: Vec<Iri<String>> = mapping
        .iter()
        .map(|entry| make_iri(&entry.property_iri))
        .collect::<Result<_, _>>()?;

    let mut index = 0usize;
    for table in tables {
        for row in &table.rows {
            index += 1;
            let subject = make_iri(&format!("{base}row/{index}"))?;
            for (entry, predicate) in mapping.iter().zip(&predicates) {
                let Some(value) = row.get(&entry.field) else {
                    continue;
                };
                let Some(literal) = literal_text(value) else {
                    continue;
                };
                graph
                    .insert(&subject, predicate, literal.as_str())
                    .map_err(|e| GenerateError::Serialize(e.to_string()))?;
            }
        }
    }

    let content = serialize_turtle(&graph)?;
    let file_path = match output_dir {
        Some(dir) => Some(write_timestamped(dir, &content)?),
        None => None,
    };

    info!(rows = index, triples = mapping.len() * index, ?file_path, "generated abox");

    Ok(OutputArtifact {
        format: "turtle".to_string(),
        content,
        file_path,
    })
}

/// Generate an R2RML mapping document for a single logical table.
pub fn generate_r2rml(mapping: &[MappingEntry], table_name: &str, base_iri: &str) -> OutputArtifact {
    let base = normalize_base(base_iri);

    let mut lines = vec![
        "@prefix rr: <http://www.w3.org/ns/r2rml#> .".to_string(),
        format!("@prefix ex: <{base}> ."),
        String::new(),
        "ex:TriplesMap1 a rr:TriplesMap ;".to_string(),
        format!("  rr:logicalTable [ rr:tableName \"{table_name}\" ] ;"),
        format!("  rr:subjectMap [ rr:template \"{base}row/{{id}}\" ] ;"),
    ];

    for (index, entry) in mapping.iter().enumerate() {
        let terminator = if index + 1 == mapping.len() { " ." } else { " ;" };
        lines.push("  rr:predicateObjectMap [".to_string());
        lines.push(format!("    rr:predicate <{}> ;", entry.property_iri));
        lines.push(format!("    rr:objectMap [ rr:column \"{}\" ]", entry.field));
        lines.push(format!("  ]{terminator}"));
    }

    OutputArtifact {
        format: "turtle".to_string(),
        content: lines.join("\n"),
        file_path: None,
    }
}

fn make_iri(s: &str) -> Result<Iri<String>, GenerateError> {
    Iri::new(s.to_string()).map_err(|_| GenerateError::InvalidIri(s.to_string()))
}

fn normalize_base(base_iri: &str) -> String {
    if base_iri.ends_with('/') {
        base_iri.to_string()
    } else {
        format!("{base_iri}/")
    }
}

/// Absent, null and empty cells produce no triple; everything else becomes a
/// plain string literal.
fn literal_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn serialize_turtle(graph: &FastGraph) -> Result<String, GenerateError> {
    let mut buffer = Vec::new();
    let mut serializer = TurtleSerializer::new(&mut buffer);
    serializer
        .serialize_graph(graph)
        .map_err(|e| GenerateError::Serialize(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| GenerateError::Serialize(e.to_string()))
}

fn write_timestamped(dir: &Path, content: &str) -> Result<String, GenerateError> {
    fs::create_dir_all(dir)?;
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let target = dir.join(format!("abox-{stamp}.ttl"));
    fs::write(&target, content)?;
    Ok(target.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Row;
    use serde_json::Value;

    fn table_with_rows(name: &str, fields: &[&str], rows: Vec<Vec<Option<&str>>>) -> Table {
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let rows: Vec<Row> = rows
            .into_iter()
            .map(|cells| {
                let mut row = Row::new();
                for (field, cell) in fields.iter().zip(cells) {
                    let value = match cell {
                        Some(text) => Value::String(text.to_string()),
                        None => Value::Null,
                    };
                    row.insert(field.clone(), value);
                }
                row
            })
            .collect();
        Table {
            name: name.to_string(),
            fields,
            sample_rows: Vec::new(),
            rows,
        }
    }

    fn entry(table: &str, field: &str, iri: &str) -> MappingEntry {
        MappingEntry {
            table_name: table.to_string(),
            field: field.to_string(),
            property_iri: iri.to_string(),
        }
    }

    #[test]
    fn abox_emits_one_subject_per_row() {
        let tables = vec![table_with_rows(
            "people",
            &["name"],
            vec![vec![Some("Ada")], vec![Some("Alan")]],
        )];
        let mapping = vec![entry("people", "name", "http://example.org/name")];
        let artifact = generate_abox(&tables, &mapping, "http://example.com", None).unwrap();

        assert_eq!(artifact.format, "turtle");
        assert!(artifact.file_path.is_none());
        assert!(artifact.content.contains("<http://example.com/row/1>"));
        assert!(artifact.content.contains("<http://example.com/row/2>"));
        assert!(artifact.content.contains("Ada"));
        assert!(artifact.content.contains("Alan"));
    }

    #[test]
    fn abox_skips_null_and_missing_cells() {
        let tables = vec![table_with_rows(
            "people",
            &["name", "email"],
            vec![vec![Some("Ada"), None]],
        )];
        let mapping = vec![
            entry("people", "name", "http://example.org/name"),
            entry("people", "email", "http://example.org/email"),
            entry("people", "phone", "http://example.org/phone"),
        ];
        let artifact = generate_abox(&tables, &mapping, "http://example.com/", None).unwrap();
        assert!(artifact.content.contains("Ada"));
        assert!(!artifact.content.contains("email"));
        assert!(!artifact.content.contains("phone"));
    }

    #[test]
    fn abox_numbers_subjects_across_tables() {
        let tables = vec![
            table_with_rows("a", &["x"], vec![vec![Some("1")]]),
            table_with_rows("b", &["x"], vec![vec![Some("2")]]),
        ];
        let mapping = vec![entry("a", "x", "http://example.org/x")];
        let artifact = generate_abox(&tables, &mapping, "http://example.com/", None).unwrap();
        assert!(artifact.content.contains("row/1"));
        assert!(artifact.content.contains("row/2"));
    }

    #[test]
    fn abox_writes_timestamped_file() {
        let dir = tempfile::tempdir().unwrap();
        let tables = vec![table_with_rows("t", &["x"], vec![vec![Some("v")]])];
        let mapping = vec![entry("t", "x", "http://example.org/x")];
        let artifact =
            generate_abox(&tables, &mapping, "http://example.com/", Some(dir.path())).unwrap();

        let path = artifact.file_path.expect("file path");
        assert!(path.contains("abox-"));
        assert!(path.ends_with(".ttl"));
        assert_eq!(fs::read_to_string(path).unwrap(), artifact.content);
    }

    #[test]
    fn abox_rejects_invalid_property_iri() {
        let tables = vec![table_with_rows("t", &["x"], vec![vec![Some("v")]])];
        let mapping = vec![entry("t", "x", "not an iri")];
        assert!(matches!(
            generate_abox(&tables, &mapping, "http://example.com/", None),
            Err(GenerateError::InvalidIri(_))
        ));
    }

    #[test]
    fn r2rml_document_layout() {
        let mapping = vec![
            entry("people", "name", "http://example.org/name"),
            entry("people", "email", "http://example.org/email"),
        ];
        let artifact = generate_r2rml(&mapping, "people", "http://example.com");
        let content = &artifact.content;

        assert!(content.starts_with("@prefix rr: <http://www.w3.org/ns/r2rml#> ."));
        assert!(content.contains("@prefix ex: <http://example.com/> ."));
        assert!(content.contains("rr:logicalTable [ rr:tableName \"people\" ] ;"));
        assert!(content.contains("rr:subjectMap [ rr:template \"http://example.com/row/{id}\" ] ;"));
        assert!(content.contains("rr:predicate <http://example.org/name> ;"));
        assert!(content.contains("rr:objectMap [ rr:column \"email\" ]"));
        // Last predicateObjectMap closes the statement.
        assert!(content.ends_with("  ] ."));
        assert_eq!(content.matches("  ] ;").count(), 1);
    }

    #[test]
    fn base_iri_gains_trailing_slash() {
        let artifact = generate_r2rml(&[], "t", "http://example.com");
        assert!(artifact.content.contains("<http://example.com/>"));
        assert!(artifact.content.contains("http://example.com/row/{id}"));
    }
}
