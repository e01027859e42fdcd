//! ontomap - an interactive workbench for mapping tabular data onto an
//! ontology.
//!
//! The crate parses an OWL/RDFS TBox and a set of CSV tables, suggests
//! property-to-field matches, lets the user refine them, and generates ABox
//! instance data or an R2RML mapping from the result. The class graph is
//! laid out with a force-directed simulation that supports interactive
//! dragging.

pub mod drag;
pub mod generate;
pub mod graph;
pub mod grouping;
pub mod mapping;
pub mod matcher;
pub mod model;
pub mod server;
pub mod simulation;
pub mod tabular;
pub mod tbox;
pub mod ticker;
pub mod workspace;
