//! Scenario-aware searches and BFS subgraph extraction over a [`KnowledgeGraph`].

use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::error::QueryOutcome;
use crate::graph::{AttributePair, Diagnostics, KnowledgeGraph, RelationBuckets, Vertex, WILDCARD};
use crate::nlu::NluStore;

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Query engine bound to one graph snapshot and its scenario configuration.
///
/// Every operation is a pure function of the snapshot and the arguments; the
/// only state the engine owns is the [`Diagnostics`] collector.
pub struct QueryEngine<'g> {
    graph: &'g KnowledgeGraph,
    nlu: &'g NluStore,
    diagnostics: Diagnostics,
}

impl<'g> QueryEngine<'g> {
    pub fn new(graph: &'g KnowledgeGraph, nlu: &'g NluStore) -> Self {
        Self {
            graph,
            nlu,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn graph(&self) -> &'g KnowledgeGraph {
        self.graph
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Vertexes with `label`, filtered by scenario and attributes.
    pub fn search_by_label(
        &self,
        label: &str,
        scenario: &str,
        attributes: &[AttributePair],
    ) -> QueryOutcome<Vec<&'g Vertex>> {
        if is_blank(label) {
            return QueryOutcome::invalid("label is empty");
        }

        let candidates = self.graph.vertexes_by_label(label);
        if candidates.is_empty() {
            return QueryOutcome::not_found(format!("no vertex labelled '{}'", label));
        }

        let results = self.filter(candidates, scenario, attributes);
        if results.is_empty() {
            log::info!(
                "label '{}' has no vertex matching scenario '{}' and {} attribute(s)",
                label,
                scenario,
                attributes.len()
            );
            return QueryOutcome::not_found(format!("no vertex labelled '{}' passes the filter", label));
        }
        QueryOutcome::Found(results)
    }

    /// First vertex called `start_name` (or the scenario's root) that passes the filter.
    pub fn search_rooted(
        &self,
        start_name: &str,
        scenario: &str,
        attributes: &[AttributePair],
    ) -> QueryOutcome<&'g Vertex> {
        let start_name = match self.resolve_start_name(start_name, scenario) {
            QueryOutcome::Found(name) => name,
            QueryOutcome::NotFound(m) => return QueryOutcome::NotFound(m),
            QueryOutcome::InvalidInput(m) => return QueryOutcome::InvalidInput(m),
        };

        let candidates = self.graph.vertexes_by_name(start_name);
        if candidates.is_empty() {
            return QueryOutcome::not_found(format!("no vertex named '{}'", start_name));
        }

        match self.filter(candidates, scenario, attributes).into_iter().next() {
            Some(vertex) => QueryOutcome::Found(vertex),
            None => {
                log::info!("'{}' is not selected by scenario '{}' and attributes", start_name, scenario);
                QueryOutcome::not_found(format!("no vertex named '{}' passes the filter", start_name))
            }
        }
    }

    /// Keep candidates in scope for `scenario` that satisfy every attribute predicate.
    /// Input order is preserved.
    pub fn filter(
        &self,
        candidates: Vec<&'g Vertex>,
        scenario: &str,
        attributes: &[AttributePair],
    ) -> Vec<&'g Vertex> {
        candidates
            .into_iter()
            .filter(|v| v.in_scenario(scenario) && self.matches(v, attributes))
            .collect()
    }

    /// True unless some predicate names a property the vertex has, with a
    /// different value, and neither side is the wildcard.
    ///
    /// A missing property never rejects. A property lookup that fails is
    /// recorded in [`Diagnostics`] and does not reject either.
    pub fn matches(&self, vertex: &Vertex, attributes: &[AttributePair]) -> bool {
        for attribute in attributes {
            let requested = attribute.attribute_value.as_str();
            match vertex.property_value(&attribute.attribute_name) {
                Ok(Some(value)) => {
                    if value != WILDCARD && requested != WILDCARD && value != requested {
                        return false;
                    }
                }
                Ok(None) => {}
                Err(e) => self.diagnostics.record(&vertex.id, &attribute.attribute_name, &e),
            }
        }
        true
    }

    /// Leaf descendants of the start vertex, grouped by the relation type of
    /// their direct parent edge.
    ///
    /// Expansion follows only `relation_types` when given (all types
    /// otherwise). Leaves that fail the attribute predicate are dropped;
    /// internal vertexes are expanded regardless. Each vertex is visited at
    /// most once, so cyclic graphs terminate.
    pub fn filter_graph(
        &self,
        start_name: &str,
        scenario: &str,
        relation_types: Option<&[String]>,
        attributes: &[AttributePair],
    ) -> QueryOutcome<RelationBuckets<'g>> {
        let start = match self.search_rooted(start_name, scenario, attributes) {
            QueryOutcome::Found(v) => v,
            QueryOutcome::NotFound(m) => {
                log::info!("filter_graph start '{}' doesn't exist: {}", start_name, m);
                return QueryOutcome::NotFound(m);
            }
            QueryOutcome::InvalidInput(m) => return QueryOutcome::InvalidInput(m),
        };

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&'g Vertex> = VecDeque::new();
        let mut results: RelationBuckets<'g> = BTreeMap::new();

        visited.insert(start.id.as_str());
        queue.push_back(start);

        while let Some(vertex) = queue.pop_front() {
            for (relation_type, children) in self.children_in_scope(vertex, relation_types, scenario) {
                for child in children {
                    if !visited.insert(child.id.as_str()) {
                        continue;
                    }
                    if self.graph.is_leaf(&child.id) {
                        if self.matches(child, attributes) {
                            results.entry(relation_type.clone()).or_default().push(child);
                        }
                    } else {
                        queue.push_back(child);
                    }
                }
            }
        }

        QueryOutcome::Found(results)
    }

    /// Direct children of a non-leaf vertex, grouped by relation type and
    /// filtered by attributes. Relation types whose children are all filtered
    /// out are omitted.
    pub fn get_children(
        &self,
        vertex: &Vertex,
        relation_types: Option<&[String]>,
        attributes: &[AttributePair],
        scenario: &str,
    ) -> QueryOutcome<RelationBuckets<'g>> {
        if self.graph.is_leaf(&vertex.id) {
            log::info!("{} is a leaf, no children to expand", vertex.name);
            return QueryOutcome::not_found(format!("'{}' is a leaf vertex", vertex.name));
        }

        let children = self.children_in_scope(vertex, relation_types, scenario);
        if children.is_empty() {
            log::info!("{} has no child in scope", vertex.name);
            return QueryOutcome::not_found(format!("'{}' has no child in scope", vertex.name));
        }

        let results = children
            .into_iter()
            .filter_map(|(relation_type, vs)| {
                let kept: Vec<&'g Vertex> = vs.into_iter().filter(|v| self.matches(v, attributes)).collect();
                (!kept.is_empty()).then_some((relation_type, kept))
            })
            .collect();
        QueryOutcome::Found(results)
    }

    fn resolve_start_name<'a>(&'a self, start_name: &'a str, scenario: &str) -> QueryOutcome<&'a str> {
        match (is_blank(start_name), is_blank(scenario)) {
            (true, true) => QueryOutcome::invalid("start vertex name and scenario are both empty"),
            (true, false) => match self.nlu.root(scenario) {
                Some(root) => QueryOutcome::Found(root),
                None => QueryOutcome::not_found(format!("scenario '{}' has no root configured", scenario)),
            },
            (false, _) => QueryOutcome::Found(start_name),
        }
    }

    fn children_in_scope(
        &self,
        vertex: &Vertex,
        relation_types: Option<&[String]>,
        scenario: &str,
    ) -> RelationBuckets<'g> {
        match relation_types {
            None => self.graph.children_by_relation(&vertex.id, None, scenario),
            Some(types) => {
                let mut buckets = BTreeMap::new();
                for relation_type in types {
                    buckets.extend(self.graph.children_by_relation(&vertex.id, Some(relation_type), scenario));
                }
                buckets
            }
        }
    }
}
