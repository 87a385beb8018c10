//! Immutable, fully indexed knowledge graph.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{Result, SmartKgError};
use crate::graph::{Edge, RelationLink, Vertex};

/// Neighbors of one vertex grouped by relation type, ordered by relation type.
pub type RelationBuckets<'g> = BTreeMap<String, Vec<&'g Vertex>>;

/// Neighbor set of one vertex under one [`RelationLink`].
#[derive(Debug, Clone)]
pub struct RelationGroup {
    link: RelationLink,
    /// Positions into the vertex table, in edge insertion order.
    neighbors: Vec<usize>,
}

impl RelationGroup {
    pub fn link(&self) -> &RelationLink {
        &self.link
    }

    pub fn relation_type(&self) -> &str {
        &self.link.relation_type
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

/// One loaded graph: vertexes, edges and every lookup structure derived from them.
///
/// Built in one pass over vertexes and one over edges; nothing is mutated after
/// [`KnowledgeGraph::build`] returns.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    vertexes: Vec<Vertex>,
    edges: Vec<Edge>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, Vec<usize>>,
    by_label: HashMap<String, Vec<usize>>,
    by_scenario: HashMap<String, Vec<usize>>,
    /// head -> tails, per vertex position
    children: Vec<Vec<RelationGroup>>,
    /// tail -> heads, per vertex position
    parents: Vec<Vec<RelationGroup>>,
}

/// Build-time helper keeping group lookup and neighbor dedup O(1).
struct AdjacencyBuilder {
    groups: Vec<Vec<RelationGroup>>,
    group_index: HashMap<(usize, RelationLink), usize>,
    seen: HashSet<(usize, usize, usize)>,
}

impl AdjacencyBuilder {
    fn new(vertex_count: usize) -> Self {
        Self {
            groups: vec![Vec::new(); vertex_count],
            group_index: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    fn add(&mut self, from: usize, link: &RelationLink, to: usize) {
        let groups = &mut self.groups[from];
        let group = *self
            .group_index
            .entry((from, link.clone()))
            .or_insert_with(|| {
                groups.push(RelationGroup {
                    link: link.clone(),
                    neighbors: Vec::new(),
                });
                groups.len() - 1
            });

        if self.seen.insert((from, group, to)) {
            self.groups[from][group].neighbors.push(to);
        }
    }
}

impl KnowledgeGraph {
    /// Index `vertexes` and `edges`.
    ///
    /// Fails on a repeated vertex id or on an edge whose endpoint is unknown;
    /// either condition aborts the whole load.
    pub fn build(vertexes: Vec<Vertex>, edges: Vec<Edge>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(vertexes.len());
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_label: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_scenario: HashMap<String, Vec<usize>> = HashMap::new();

        for (pos, vertex) in vertexes.iter().enumerate() {
            if by_id.insert(vertex.id.clone(), pos).is_some() {
                return Err(SmartKgError::DuplicateVertex(vertex.id.clone()));
            }
            by_name.entry(vertex.name.clone()).or_default().push(pos);
            by_label.entry(vertex.label.clone()).or_default().push(pos);

            let mut declared = HashSet::new();
            for scenario in &vertex.scenarios {
                if declared.insert(scenario.as_str()) {
                    by_scenario.entry(scenario.clone()).or_default().push(pos);
                }
            }
        }

        let mut children = AdjacencyBuilder::new(vertexes.len());
        let mut parents = AdjacencyBuilder::new(vertexes.len());

        for edge in &edges {
            let resolve = |id: &str| {
                by_id.get(id).copied().ok_or_else(|| SmartKgError::DanglingEdge {
                    head: edge.head_vertex_id.clone(),
                    tail: edge.tail_vertex_id.clone(),
                    relation_type: edge.relation_type.clone(),
                    missing: id.to_string(),
                })
            };
            let head = resolve(&edge.head_vertex_id)?;
            let tail = resolve(&edge.tail_vertex_id)?;

            let link = RelationLink::new(&edge.relation_type, &edge.scenarios);
            children.add(head, &link, tail);
            parents.add(tail, &link, head);
        }

        Ok(Self {
            vertexes,
            edges,
            by_id,
            by_name,
            by_label,
            by_scenario,
            children: children.groups,
            parents: parents.groups,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.vertexes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertexes(&self) -> &[Vertex] {
        &self.vertexes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn vertex_by_id(&self, id: &str) -> Option<&Vertex> {
        self.by_id.get(id).map(|&pos| &self.vertexes[pos])
    }

    /// All vertexes called `name`, in load order. Names are not unique.
    pub fn vertexes_by_name(&self, name: &str) -> Vec<&Vertex> {
        self.collect(self.by_name.get(name))
    }

    pub fn vertexes_by_label(&self, label: &str) -> Vec<&Vertex> {
        self.collect(self.by_label.get(label))
    }

    /// Vertexes that explicitly declare `scenario`; global vertexes are not included.
    pub fn vertexes_by_scenario(&self, scenario: &str) -> Vec<&Vertex> {
        self.collect(self.by_scenario.get(scenario))
    }

    /// Every scenario named by a vertex or an edge.
    pub fn scenario_names(&self) -> BTreeSet<&str> {
        let mut names: BTreeSet<&str> = self.by_scenario.keys().map(String::as_str).collect();
        for edge in &self.edges {
            names.extend(edge.scenarios.iter().map(String::as_str));
        }
        names
    }

    /// A vertex is a leaf when it has no outgoing relation of any type in any
    /// scenario. Unknown ids have no children and count as leaves.
    pub fn is_leaf(&self, id: &str) -> bool {
        self.child_links(id).is_empty()
    }

    /// Outgoing relation groups of `id` (head -> tail).
    pub fn child_links(&self, id: &str) -> &[RelationGroup] {
        match self.by_id.get(id) {
            Some(&pos) => &self.children[pos],
            None => &[],
        }
    }

    /// Incoming relation groups of `id` (tail <- head).
    pub fn parent_links(&self, id: &str) -> &[RelationGroup] {
        match self.by_id.get(id) {
            Some(&pos) => &self.parents[pos],
            None => &[],
        }
    }

    pub fn neighbors<'g>(&'g self, group: &'g RelationGroup) -> impl Iterator<Item = &'g Vertex> + 'g {
        group.neighbors.iter().map(move |&pos| &self.vertexes[pos])
    }

    /// Children of `id` visible under `scenario`, grouped by relation type.
    ///
    /// `relation_type = None` returns every type present. A child reached
    /// through several links of the same type is listed once.
    pub fn children_by_relation(
        &self,
        id: &str,
        relation_type: Option<&str>,
        scenario: &str,
    ) -> RelationBuckets<'_> {
        let mut buckets: RelationBuckets<'_> = BTreeMap::new();
        let mut seen: HashSet<(&str, usize)> = HashSet::new();

        for group in self.child_links(id) {
            if let Some(wanted) = relation_type {
                if group.relation_type() != wanted {
                    continue;
                }
            }
            if !group.link.in_scenario(scenario) {
                continue;
            }
            for &pos in &group.neighbors {
                if seen.insert((group.relation_type(), pos)) {
                    buckets
                        .entry(group.relation_type().to_string())
                        .or_default()
                        .push(&self.vertexes[pos]);
                }
            }
        }

        buckets
    }

    fn collect(&self, positions: Option<&Vec<usize>>) -> Vec<&Vertex> {
        positions
            .map(|ps| ps.iter().map(|&pos| &self.vertexes[pos]).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::{edge, laptop_graph, vertex};

    fn names(vs: &[&Vertex]) -> Vec<String> {
        vs.iter().map(|v| v.name.clone()).collect()
    }

    #[test]
    fn test_build_indexes() {
        let graph = laptop_graph();
        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.vertex_by_id("v2").unwrap().name, "RAM");
        assert!(graph.vertex_by_id("v9").is_none());
        assert_eq!(names(&graph.vertexes_by_label("Spec")), vec!["RAM", "Warranty"]);
        assert_eq!(names(&graph.vertexes_by_name("Laptop")), vec!["Laptop"]);
        assert_eq!(names(&graph.vertexes_by_scenario("shopping")), vec!["Laptop"]);
        assert!(graph.vertexes_by_label("Nope").is_empty());
    }

    #[test]
    fn test_duplicate_names_keep_load_order() {
        let graph = KnowledgeGraph::build(
            vec![
                vertex("a", "Apple", "Fruit", &[], &[]),
                vertex("b", "Apple", "Company", &[], &[]),
            ],
            vec![],
        )
        .unwrap();
        let found = graph.vertexes_by_name("Apple");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, "a");
        assert_eq!(found[1].id, "b");
    }

    #[test]
    fn test_duplicate_vertex_id_fails() {
        let result = KnowledgeGraph::build(
            vec![
                vertex("a", "Apple", "Fruit", &[], &[]),
                vertex("a", "Pear", "Fruit", &[], &[]),
            ],
            vec![],
        );
        assert!(matches!(result, Err(SmartKgError::DuplicateVertex(id)) if id == "a"));
    }

    #[test]
    fn test_dangling_edge_fails_load() {
        let result = KnowledgeGraph::build(
            vec![vertex("a", "Apple", "Fruit", &[], &[])],
            vec![edge("a", "ghost", "likes")],
        );
        match result {
            Err(SmartKgError::DanglingEdge { missing, .. }) => assert_eq!(missing, "ghost"),
            other => panic!("expected dangling edge error, got {:?}", other),
        }
    }

    #[test]
    fn test_leaf_matches_children() {
        let graph = laptop_graph();
        for v in graph.vertexes() {
            let children = graph.children_by_relation(&v.id, None, "");
            assert_eq!(graph.is_leaf(&v.id), children.is_empty(), "vertex {}", v.id);
        }
        assert!(!graph.is_leaf("v1"));
        assert!(graph.is_leaf("v2"));
    }

    #[test]
    fn test_parent_links() {
        let graph = laptop_graph();
        let parents = graph.parent_links("v2");
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].relation_type(), "hasSpec");
        let heads: Vec<_> = graph.neighbors(&parents[0]).map(|v| v.id.as_str()).collect();
        assert_eq!(heads, vec!["v1"]);
        assert!(graph.parent_links("v1").is_empty());
    }

    #[test]
    fn test_repeated_edges_are_deduplicated() {
        let graph = KnowledgeGraph::build(
            vec![
                vertex("a", "A", "T", &[], &[]),
                vertex("b", "B", "T", &[], &[]),
            ],
            vec![edge("a", "b", "r"), edge("a", "b", "r"), edge("a", "b", "s")],
        )
        .unwrap();
        let links = graph.child_links("a");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].len(), 1);

        let buckets = graph.children_by_relation("a", None, "");
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets["r"].len(), 1);
        assert_eq!(buckets["s"].len(), 1);
    }

    #[test]
    fn test_children_respect_edge_scenarios() {
        let mut scoped = edge("a", "b", "r");
        scoped.scenarios = vec!["travel".to_string()];
        let graph = KnowledgeGraph::build(
            vec![
                vertex("a", "A", "T", &[], &[]),
                vertex("b", "B", "T", &[], &[]),
                vertex("c", "C", "T", &[], &[]),
            ],
            vec![scoped, edge("a", "c", "r")],
        )
        .unwrap();

        assert_eq!(graph.children_by_relation("a", None, "travel")["r"].len(), 2);
        assert_eq!(graph.children_by_relation("a", None, "")["r"].len(), 2);

        let shopping = graph.children_by_relation("a", None, "shopping");
        assert_eq!(names(&shopping["r"]), vec!["C"]);

        assert!(graph.children_by_relation("a", Some("other"), "").is_empty());
    }

    #[test]
    fn test_scenario_names_union() {
        let mut e = edge("a", "b", "r");
        e.scenarios = vec!["travel".to_string()];
        let graph = KnowledgeGraph::build(
            vec![
                vertex("a", "A", "T", &[], &["shopping", "shopping"]),
                vertex("b", "B", "T", &[], &[]),
            ],
            vec![e],
        )
        .unwrap();
        let names: Vec<_> = graph.scenario_names().into_iter().collect();
        assert_eq!(names, vec!["shopping", "travel"]);
        assert_eq!(graph.vertexes_by_scenario("shopping").len(), 1);
    }

    #[test]
    fn test_self_loop_is_not_leaf() {
        let graph = KnowledgeGraph::build(
            vec![vertex("a", "A", "T", &[], &[])],
            vec![edge("a", "a", "r")],
        )
        .unwrap();
        assert!(!graph.is_leaf("a"));
    }
}
