//! Ontology (TBox) parsing.
//!
//! Parses an uploaded ontology file with sophia and extracts the pieces the
//! workbench consumes: data properties (with domains, ranges and leaf
//! flags), classes, object properties, and a Turtle serialization of the
//! whole graph for the TTL display pane.

use std::collections::{HashMap, HashSet};

use sophia::api::graph::Graph;
use sophia::api::ns::{Namespace, rdf, rdfs};
use sophia::api::prelude::*;
use sophia::api::serializer::TripleSerializer;
use sophia::api::term::SimpleTerm;
use sophia::inmem::graph::FastGraph;
use sophia::turtle::parser::turtle;
use sophia::turtle::serializer::turtle::TurtleSerializer;
use thiserror::Error;

use crate::model::{DataProperty, IriRef, ObjectProperty, TboxParseResponse};

/// OWL namespace
const OWL_NS: &str = "http://www.w3.org/2002/07/owl#";

#[derive(Error, Debug)]
pub enum TboxError {
    #[error("ontology parse error: {0}")]
    Parse(String),

    #[error("ontology serialization error: {0}")]
    Serialize(String),
}

/// Extract the local name (fragment or last path segment) from an IRI.
pub fn local_name_from_iri(iri: &str) -> String {
    if let Some(pos) = iri.rfind('#') {
        return iri[pos + 1..].to_string();
    }
    if let Some(pos) = iri.rfind('/') {
        return iri[pos + 1..].to_string();
    }
    iri.to_string()
}

/// Parse ontology bytes into the TBox response consumed by the workbench.
///
/// The RDF syntax is chosen from the file extension: `.ttl` parses as
/// Turtle, `.rdf`/`.owl`/`.xml` as RDF/XML, anything else as Turtle.
pub fn parse_tbox(content: &[u8], filename: Option<&str>) -> Result<TboxParseResponse, TboxError> {
    let graph = parse_graph(content, filename)?;

    let owl = Namespace::new_unchecked(OWL_NS);
    let owl_datatype_property: SimpleTerm = owl
        .get("DatatypeProperty")
        .map_err(|e| TboxError::Parse(e.to_string()))?
        .into_term();
    let owl_object_property: SimpleTerm = owl
        .get("ObjectProperty")
        .map_err(|e| TboxError::Parse(e.to_string()))?
        .into_term();
    let owl_class: SimpleTerm = owl
        .get("Class")
        .map_err(|e| TboxError::Parse(e.to_string()))?
        .into_term();

    let mut properties = extract_data_properties(&graph, &owl_datatype_property);
    let mut classes = extract_classes(&graph, &owl_class);
    let mut object_properties = extract_object_properties(&graph, &owl_object_property);

    properties.sort_by(|a, b| Ord::cmp(a.display_label(), b.display_label()));
    classes.sort_by(|a, b| Ord::cmp(a.display_label(), b.display_label()));
    object_properties.sort_by(|a, b| {
        let left = a.label.as_deref().or(a.local_name.as_deref()).unwrap_or(&a.iri);
        let right = b.label.as_deref().or(b.local_name.as_deref()).unwrap_or(&b.iri);
        Ord::cmp(left, right)
    });

    let ttl = serialize_turtle(&graph)?;

    Ok(TboxParseResponse {
        properties,
        classes,
        object_properties,
        ttl,
    })
}

fn parse_graph(content: &[u8], filename: Option<&str>) -> Result<FastGraph, TboxError> {
    let lower = filename.unwrap_or_default().to_lowercase();
    if lower.ends_with(".rdf") || lower.ends_with(".owl") || lower.ends_with(".xml") {
        sophia::xml::parser::parse_bufread(content)
            .collect_triples()
            .map_err(|e| TboxError::Parse(e.to_string()))
    } else {
        turtle::parse_bufread(content)
            .collect_triples()
            .map_err(|e| TboxError::Parse(e.to_string()))
    }
}

fn serialize_turtle(graph: &FastGraph) -> Result<String, TboxError> {
    let mut buffer = Vec::new();
    let mut serializer = TurtleSerializer::new(&mut buffer);
    serializer
        .serialize_graph(graph)
        .map_err(|e| TboxError::Serialize(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TboxError::Serialize(e.to_string()))
}

/// Get the first string literal for a predicate.
fn get_literal_value<T: Term>(
    graph: &FastGraph,
    subject: &SimpleTerm,
    predicate: T,
) -> Option<String> {
    graph
        .triples_matching([subject], [predicate], Any)
        .filter_map(Result::ok)
        .filter_map(|t| match t.o() {
            SimpleTerm::LiteralLanguage(lit, _) => Some(lit.to_string()),
            SimpleTerm::LiteralDatatype(lit, _) => Some(lit.to_string()),
            _ => None,
        })
        .next()
}

/// All IRI objects of a predicate, as IriRef entries with labels resolved.
fn iri_objects<T: Term>(graph: &FastGraph, subject: &SimpleTerm, predicate: T) -> Vec<IriRef> {
    graph
        .triples_matching([subject], [predicate], Any)
        .filter_map(Result::ok)
        .filter_map(|t| match t.o() {
            object @ SimpleTerm::Iri(_) => Some(build_iri_ref(graph, object)),
            _ => None,
        })
        .collect()
}

fn build_iri_ref(graph: &FastGraph, term: &SimpleTerm) -> IriRef {
    let iri = match term {
        SimpleTerm::Iri(iri) => iri.to_string(),
        other => format!("{other:?}"),
    };
    IriRef {
        label: get_literal_value(graph, term, rdfs::label),
        local_name: Some(local_name_from_iri(&iri)),
        iri,
    }
}

/// Subjects with `rdf:type` of the given class term, IRIs only.
fn subjects_of_type<'g>(
    graph: &'g FastGraph,
    class_term: &SimpleTerm,
) -> Vec<(String, SimpleTerm<'g>)> {
    graph
        .triples_matching(Any, [rdf::type_], [class_term])
        .filter_map(Result::ok)
        .filter_map(|t| match t.s() {
            SimpleTerm::Iri(iri) => Some((iri.to_string(), t.s().to_owned())),
            _ => None,
        })
        .filter(|(iri, _)| !iri.starts_with(OWL_NS))
        .collect()
}

/// Datatype properties plus untyped `rdf:Property` subjects; the datatype
/// typing wins when a subject carries both.
fn extract_data_properties(
    graph: &FastGraph,
    owl_datatype_property: &SimpleTerm,
) -> Vec<DataProperty> {
    let mut subjects: Vec<(String, SimpleTerm)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (iri, term) in subjects_of_type(graph, owl_datatype_property) {
        if seen.insert(iri.clone()) {
            subjects.push((iri, term));
        }
    }
    let rdf_property: SimpleTerm = rdf::Property.into_term();
    for (iri, term) in subjects_of_type(graph, &rdf_property) {
        if seen.insert(iri.clone()) {
            subjects.push((iri, term));
        }
    }

    let parents = parent_properties(graph, &seen);

    subjects
        .into_iter()
        .map(|(iri, term)| DataProperty {
            label: get_literal_value(graph, &term, rdfs::label),
            local_name: Some(local_name_from_iri(&iri)),
            domains: iri_objects(graph, &term, rdfs::domain),
            ranges: iri_objects(graph, &term, rdfs::range),
            is_leaf: !parents.contains(&iri),
            iri,
        })
        .collect()
}

/// IRIs that appear as the parent in an `rdfs:subPropertyOf` pair whose both
/// ends are known properties. Those are non-leaf.
fn parent_properties(graph: &FastGraph, known: &HashSet<String>) -> HashSet<String> {
    graph
        .triples_matching(Any, [rdfs::subPropertyOf], Any)
        .filter_map(Result::ok)
        .filter_map(|t| match (t.s(), t.o()) {
            (SimpleTerm::Iri(child), SimpleTerm::Iri(parent)) => {
                Some((child.to_string(), parent.to_string()))
            }
            _ => None,
        })
        .filter(|(child, parent)| known.contains(child) && known.contains(parent))
        .map(|(_, parent)| parent)
        .collect()
}

/// `owl:Class` plus `rdfs:Class` subjects, deduplicated.
fn extract_classes(graph: &FastGraph, owl_class: &SimpleTerm) -> Vec<IriRef> {
    let mut seen: HashMap<String, SimpleTerm> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (iri, term) in subjects_of_type(graph, owl_class) {
        if !seen.contains_key(&iri) {
            order.push(iri.clone());
            seen.insert(iri, term);
        }
    }
    let rdfs_class: SimpleTerm = rdfs::Class.into_term();
    for (iri, term) in subjects_of_type(graph, &rdfs_class) {
        if !seen.contains_key(&iri) {
            order.push(iri.clone());
            seen.insert(iri, term);
        }
    }

    order
        .into_iter()
        .map(|iri| {
            let term = &seen[&iri];
            IriRef {
                label: get_literal_value(graph, term, rdfs::label),
                local_name: Some(local_name_from_iri(&iri)),
                iri,
            }
        })
        .collect()
}

fn extract_object_properties(
    graph: &FastGraph,
    owl_object_property: &SimpleTerm,
) -> Vec<ObjectProperty> {
    let mut seen: HashSet<String> = HashSet::new();
    subjects_of_type(graph, owl_object_property)
        .into_iter()
        .filter(|(iri, _)| seen.insert(iri.clone()))
        .map(|(iri, term)| ObjectProperty {
            label: get_literal_value(graph, &term, rdfs::label),
            local_name: Some(local_name_from_iri(&iri)),
            domains: iri_objects(graph, &term, rdfs::domain),
            ranges: iri_objects(graph, &term, rdfs::range),
            iri,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
        @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
        @prefix owl: <http://www.w3.org/2002/07/owl#> .
        @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
        @prefix ex: <http://example.com/onto#> .

        ex:Person a owl:Class ;
            rdfs:label "Person" .

        ex:Company a owl:Class .

        ex:name a owl:DatatypeProperty ;
            rdfs:label "name" ;
            rdfs:domain ex:Person ;
            rdfs:range xsd:string .

        ex:fullName a owl:DatatypeProperty ;
            rdfs:subPropertyOf ex:name ;
            rdfs:domain ex:Person .

        ex:worksFor a owl:ObjectProperty ;
            rdfs:domain ex:Person ;
            rdfs:range ex:Company .
    "#;

    #[test]
    fn local_name_prefers_fragment_over_path() {
        assert_eq!(local_name_from_iri("http://ex.com/onto#Person"), "Person");
        assert_eq!(local_name_from_iri("http://ex.com/onto/Person"), "Person");
        assert_eq!(local_name_from_iri("Person"), "Person");
    }

    #[test]
    fn extracts_classes_with_labels() {
        let response = parse_tbox(FIXTURE.as_bytes(), Some("onto.ttl")).unwrap();
        assert_eq!(response.classes.len(), 2);
        let person = response
            .classes
            .iter()
            .find(|c| c.iri.ends_with("#Person"))
            .unwrap();
        assert_eq!(person.label.as_deref(), Some("Person"));
        assert_eq!(person.local_name.as_deref(), Some("Person"));
    }

    #[test]
    fn extracts_data_properties_with_domains_and_ranges() {
        let response = parse_tbox(FIXTURE.as_bytes(), Some("onto.ttl")).unwrap();
        assert_eq!(response.properties.len(), 2);
        let name = response
            .properties
            .iter()
            .find(|p| p.iri.ends_with("#name"))
            .unwrap();
        assert_eq!(name.domains.len(), 1);
        assert_eq!(name.domains[0].local_name.as_deref(), Some("Person"));
        assert_eq!(name.domains[0].label.as_deref(), Some("Person"));
        assert_eq!(name.ranges.len(), 1);
        assert!(name.ranges[0].iri.ends_with("string"));
    }

    #[test]
    fn leaf_flags_follow_sub_property_declarations() {
        let response = parse_tbox(FIXTURE.as_bytes(), Some("onto.ttl")).unwrap();
        let name = response
            .properties
            .iter()
            .find(|p| p.iri.ends_with("#name"))
            .unwrap();
        let full_name = response
            .properties
            .iter()
            .find(|p| p.iri.ends_with("#fullName"))
            .unwrap();
        assert!(!name.is_leaf, "a property with sub-properties is not a leaf");
        assert!(full_name.is_leaf);
    }

    #[test]
    fn extracts_object_properties() {
        let response = parse_tbox(FIXTURE.as_bytes(), Some("onto.ttl")).unwrap();
        assert_eq!(response.object_properties.len(), 1);
        let works_for = &response.object_properties[0];
        assert_eq!(works_for.domains[0].local_name.as_deref(), Some("Person"));
        assert_eq!(works_for.ranges[0].local_name.as_deref(), Some("Company"));
    }

    #[test]
    fn produces_a_turtle_blob() {
        let response = parse_tbox(FIXTURE.as_bytes(), Some("onto.ttl")).unwrap();
        assert!(response.ttl.contains("Person"));
    }

    #[test]
    fn properties_sorted_by_display_label() {
        let response = parse_tbox(FIXTURE.as_bytes(), Some("onto.ttl")).unwrap();
        let labels: Vec<&str> = response
            .properties
            .iter()
            .map(|p| p.display_label())
            .collect();
        let mut sorted = labels.clone();
        sorted.sort_unstable();
        assert_eq!(labels, sorted);
    }

    #[test]
    fn malformed_input_is_a_parse_error() {
        let result = parse_tbox(b"@prefix broken", Some("onto.ttl"));
        assert!(matches!(result, Err(TboxError::Parse(_))));
    }

    #[test]
    fn unknown_extension_defaults_to_turtle() {
        let response = parse_tbox(FIXTURE.as_bytes(), None).unwrap();
        assert_eq!(response.classes.len(), 2);
    }
}
