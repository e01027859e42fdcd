//! Class graph construction.
//!
//! Derives a node/edge graph from the parsed ontology: one node per distinct
//! class IRI, one edge per (domain, range) pair of each object property.
//! Nodes are stored in an arena indexed by IRI; edges refer to nodes by id,
//! never by pointer.

use std::collections::HashMap;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use crate::model::{IriRef, ObjectProperty};

/// Logical size of the rendering surface, in layout units.
pub const CANVAS_WIDTH: f32 = 800.0;
pub const CANVAS_HEIGHT: f32 = 420.0;

/// Spread of the random jitter applied to initial positions. Coincident
/// points would leave the repulsion force without a direction to push along.
const JITTER: f32 = 120.0;

/// A node in the class graph.
///
/// `fx`/`fy` are the pinned coordinates: while set, the simulation must leave
/// the node exactly there. `vx`/`vy` are simulation state and not part of the
/// wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// The class IRI. Node identity: duplicate IRIs collapse to one node.
    pub id: String,

    pub label: String,

    pub x: f32,
    pub y: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fx: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fy: Option<f32>,

    #[serde(skip)]
    pub vx: f32,

    #[serde(skip)]
    pub vy: f32,
}

impl GraphNode {
    pub fn pinned(&self) -> bool {
        self.fx.is_some() && self.fy.is_some()
    }
}

/// A directed edge between two class nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    /// `propertyIri:domainIri:rangeIri`, unique per (property, pair).
    pub id: String,

    pub source: String,
    pub target: String,

    /// Display label: the domain class label of the originating property.
    pub label: String,
}

/// The derived class graph: node arena plus id lookup.
#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    index: HashMap<String, usize>,
}

impl GraphModel {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.node_index(id).map(|i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        let i = self.node_index(id)?;
        Some(&mut self.nodes[i])
    }
}

/// Build the class graph from ontology classes and object properties.
///
/// Every class registers a node; every domain/range entry of every object
/// property registers a node too (first occurrence wins). One edge is emitted
/// per (domain, range) pair whose both IRIs resolved; entries without an IRI
/// are skipped. Insertion order is preserved. Never fails.
pub fn build(classes: &[IriRef], object_properties: &[ObjectProperty]) -> GraphModel {
    build_with_rng(classes, object_properties, &mut SmallRng::from_os_rng())
}

/// As [`build`], with a caller-supplied jitter source.
pub fn build_with_rng(
    classes: &[IriRef],
    object_properties: &[ObjectProperty],
    rng: &mut impl Rng,
) -> GraphModel {
    let mut model = GraphModel::default();

    for class in classes {
        add_node(&mut model, class, rng);
    }

    for prop in object_properties {
        for domain in &prop.domains {
            add_node(&mut model, domain, rng);
        }
        for range in &prop.ranges {
            add_node(&mut model, range, rng);
        }

        for domain in &prop.domains {
            for range in &prop.ranges {
                if domain.iri.is_empty() || range.iri.is_empty() {
                    continue;
                }
                if model.node_index(&domain.iri).is_none()
                    || model.node_index(&range.iri).is_none()
                {
                    continue;
                }
                model.edges.push(GraphEdge {
                    id: format!("{}:{}:{}", prop.iri, domain.iri, range.iri),
                    source: domain.iri.clone(),
                    target: range.iri.clone(),
                    label: domain.display_label().to_string(),
                });
            }
        }
    }

    model
}

fn add_node(model: &mut GraphModel, item: &IriRef, rng: &mut impl Rng) {
    if item.iri.is_empty() || model.index.contains_key(&item.iri) {
        return;
    }
    let node = GraphNode {
        id: item.iri.clone(),
        label: item.display_label().to_string(),
        x: CANVAS_WIDTH / 2.0 + (rng.random::<f32>() - 0.5) * JITTER,
        y: CANVAS_HEIGHT / 2.0 + (rng.random::<f32>() - 0.5) * JITTER,
        fx: None,
        fy: None,
        vx: 0.0,
        vy: 0.0,
    };
    model.index.insert(node.id.clone(), model.nodes.len());
    model.nodes.push(node);
}
