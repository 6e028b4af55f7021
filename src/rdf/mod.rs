// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The snapshot's RDF plane:
//! a typed-column triple vocabulary over a named graph.
//!
//! Every record becomes a subject node with one `col:` triple per
//! non-null field, plus an `rdf:type` triple classifying it.
//! Identifier columns emulate relational foreign keys,
//! so the re-serving component can join entities the way the
//! original provider's database would.

pub mod store;

use oxrdf::{BlankNode, NamedNode};
use thiserror::Error;
use uuid::Uuid;

/// Root namespace of entity classes and subject URIs.
pub const SG: &str = "sg://0.99.12/";
/// Namespace of the typed-column vocabulary.
pub const COL: &str = "sg://0.99.12/table/";

/// Thrown when building or persisting the snapshot graph failed.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid IRI: {0}")]
    InvalidIri(#[from] oxrdf::IriParseError),
    #[error("Some I/O problem: '{0}'")]
    Io(#[from] std::io::Error),
    #[error("Record lacks its upstream identifier (kind: {0})")]
    MissingId(&'static str),
}

/// The class IRI of an entity type, e.g. `sg:Account`.
#[must_use]
pub fn class_iri(name: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{SG}{name}"))
}

/// The predicate IRI of a column, e.g. `col:account_id`.
#[must_use]
pub fn column(name: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{COL}{name}"))
}

/// Mints a fresh, UUID-backed subject URI for an entity of `kind`.
#[must_use]
pub fn unique_node(kind: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{SG}{kind}/{}", Uuid::new_v4()))
}

/// Mints a fresh, UUID-backed blank node
/// (used for dependent rows such as tags and join rows).
#[must_use]
pub fn blank_node() -> BlankNode {
    BlankNode::new_unchecked(format!("b{}", Uuid::new_v4().simple()))
}
