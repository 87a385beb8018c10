//! Knowledge graph module: data model, indexed store and scenario-aware queries.
//!
//! A graph is loaded once, indexed by id, name, label, scenario and relation
//! type, and never mutated afterwards. Reloading builds a fresh
//! [`KnowledgeGraph`] and swaps it in through the registry.

mod diagnostics;
mod query;
mod store;

pub use diagnostics::{Diagnostics, PredicateFailure};
pub use query::QueryEngine;
pub use store::{KnowledgeGraph, RelationBuckets, RelationGroup};

use serde::{Deserialize, Serialize};

use crate::error::PropertyError;

/// Attribute value that matches anything on either side of a comparison.
pub const WILDCARD: &str = "ALL";

/// Scalar property carried by a vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexProperty {
    pub name: String,
    pub value: String,
}

/// A node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vertex {
    pub id: String,
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub properties: Vec<VertexProperty>,
    /// Empty means global: the vertex matches any scenario filter.
    #[serde(default)]
    pub scenarios: Vec<String>,
}

impl Vertex {
    /// Value of the property called `name`.
    ///
    /// Repeated names are tolerated when they agree; conflicting values are
    /// an error the caller has to decide about.
    pub fn property_value(&self, name: &str) -> std::result::Result<Option<&str>, PropertyError> {
        let mut values = self
            .properties
            .iter()
            .filter(|p| p.name == name)
            .map(|p| p.value.as_str());

        let first = match values.next() {
            Some(v) => v,
            None => return Ok(None),
        };

        let conflicting = values.filter(|v| *v != first).count();
        if conflicting > 0 {
            return Err(PropertyError::Ambiguous {
                vertex_id: self.id.clone(),
                name: name.to_string(),
                count: conflicting + 1,
            });
        }
        Ok(Some(first))
    }

    /// True if the vertex belongs to `scenario`, or the filter is blank, or the
    /// vertex has no scenario restriction at all.
    pub fn in_scenario(&self, scenario: &str) -> bool {
        scenario_matches(&self.scenarios, scenario)
    }
}

/// Directed, typed connection from `head_vertex_id` to `tail_vertex_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub head_vertex_id: String,
    pub tail_vertex_id: String,
    pub relation_type: String,
    #[serde(default)]
    pub scenarios: Vec<String>,
}

/// Key grouping neighbor sets: relation type plus the scenarios the
/// underlying edges were declared for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationLink {
    pub relation_type: String,
    /// Sorted and deduplicated.
    pub scenarios: Vec<String>,
}

impl RelationLink {
    pub fn new(relation_type: &str, scenarios: &[String]) -> Self {
        let mut scenarios = scenarios.to_vec();
        scenarios.sort();
        scenarios.dedup();
        Self {
            relation_type: relation_type.to_string(),
            scenarios,
        }
    }

    pub fn in_scenario(&self, scenario: &str) -> bool {
        scenario_matches(&self.scenarios, scenario)
    }
}

/// Attribute predicate applied to vertex properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributePair {
    pub attribute_name: String,
    pub attribute_value: String,
}

impl AttributePair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute_name: name.into(),
            attribute_value: value.into(),
        }
    }
}

/// Color assigned to a vertex label for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorConfig {
    pub item_label: String,
    pub color: String,
}

fn scenario_matches(memberships: &[String], scenario: &str) -> bool {
    scenario.trim().is_empty() || memberships.is_empty() || memberships.iter().any(|s| s == scenario)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn vertex(id: &str, name: &str, label: &str, props: &[(&str, &str)], scenarios: &[&str]) -> Vertex {
        Vertex {
            id: id.to_string(),
            name: name.to_string(),
            label: label.to_string(),
            properties: props
                .iter()
                .map(|(n, v)| VertexProperty {
                    name: n.to_string(),
                    value: v.to_string(),
                })
                .collect(),
            scenarios: scenarios.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn edge(head: &str, tail: &str, relation_type: &str) -> Edge {
        Edge {
            head_vertex_id: head.to_string(),
            tail_vertex_id: tail.to_string(),
            relation_type: relation_type.to_string(),
            scenarios: Vec::new(),
        }
    }

    /// Laptop (shopping) --hasSpec--> RAM {size=16GB}, Warranty {years=2}
    pub fn laptop_graph() -> KnowledgeGraph {
        KnowledgeGraph::build(
            vec![
                vertex("v1", "Laptop", "Product", &[("brand", "Contoso")], &["shopping"]),
                vertex("v2", "RAM", "Spec", &[("size", "16GB")], &[]),
                vertex("v3", "Warranty", "Spec", &[("years", "2")], &[]),
            ],
            vec![edge("v1", "v2", "hasSpec"), edge("v1", "v3", "hasSpec")],
        )
        .unwrap()
    }
}
