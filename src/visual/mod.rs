//! Presentation-side projection of a knowledge graph: flat vertex/edge shapes,
//! property pseudo-vertexes, one-hop neighborhoods and color configuration.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::QueryOutcome;
use crate::graph::{ColorConfig, Edge, KnowledgeGraph, RelationGroup, Vertex};

/// Label given to synthesized property vertexes.
pub const PROPERTY_LABEL: &str = "Property";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizedVertex {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub label: String,
}

impl From<&Vertex> for VisualizedVertex {
    fn from(vertex: &Vertex) -> Self {
        Self {
            id: vertex.id.clone(),
            name: vertex.name.clone(),
            display_name: vertex.name.clone(),
            label: vertex.label.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizedEdge {
    pub source_id: String,
    pub target_id: String,
    pub value: String,
}

impl From<&Edge> for VisualizedEdge {
    fn from(edge: &Edge) -> Self {
        Self {
            source_id: edge.head_vertex_id.clone(),
            target_id: edge.tail_vertex_id.clone(),
            value: edge.relation_type.clone(),
        }
    }
}

/// Color configuration for one scenario, as it appears in import files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioColorConfig {
    pub scenario: String,
    #[serde(default)]
    pub labels_of_vertexes: Vec<ColorConfig>,
}

/// Color configuration of a datastore, keyed by scenario.
#[derive(Debug, Clone, Default)]
pub struct VisualizationConfig {
    colors: BTreeMap<String, Vec<ColorConfig>>,
}

impl VisualizationConfig {
    /// Entries for a scenario seen twice are appended in file order.
    pub fn new(configs: Vec<ScenarioColorConfig>) -> Self {
        let mut colors: BTreeMap<String, Vec<ColorConfig>> = BTreeMap::new();
        for config in configs {
            colors
                .entry(config.scenario)
                .or_default()
                .extend(config.labels_of_vertexes);
        }
        Self { colors }
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn scenarios(&self) -> impl Iterator<Item = &str> {
        self.colors.keys().map(String::as_str)
    }
}

/// Deterministic id of the pseudo-vertex for property `name` on vertexes labelled `label`.
pub fn property_vertex_id(label: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    hasher.update([0x1fu8]);
    hasher.update(name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("property-{}", &digest[..16])
}

/// Pseudo-vertex standing for one scalar property.
pub fn property_vertex(label: &str, name: &str, value: &str) -> VisualizedVertex {
    VisualizedVertex {
        id: property_vertex_id(label, name),
        name: name.to_string(),
        display_name: value.to_string(),
        label: PROPERTY_LABEL.to_string(),
    }
}

/// Visualization operations against one datastore snapshot.
pub struct GraphExecutor<'d> {
    graph: &'d KnowledgeGraph,
    visual: &'d VisualizationConfig,
}

impl<'d> GraphExecutor<'d> {
    pub fn new(graph: &'d KnowledgeGraph, visual: &'d VisualizationConfig) -> Self {
        Self { graph, visual }
    }

    pub fn vertex_by_id(&self, id: &str) -> QueryOutcome<VisualizedVertex> {
        if id.trim().is_empty() {
            return QueryOutcome::invalid("vertex id is empty");
        }
        match self.graph.vertex_by_id(id) {
            Some(v) => QueryOutcome::Found(v.into()),
            None => QueryOutcome::not_found(format!("no vertex with id '{}'", id)),
        }
    }

    /// Vertexes whose name contains `keyword`, ignoring case.
    pub fn search_vertexes_by_name(&self, keyword: &str) -> QueryOutcome<Vec<VisualizedVertex>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return QueryOutcome::invalid("keyword is empty");
        }
        let needle = keyword.to_lowercase();
        let results: Vec<VisualizedVertex> = self
            .graph
            .vertexes()
            .iter()
            .filter(|v| v.name.to_lowercase().contains(&needle))
            .map(VisualizedVertex::from)
            .collect();

        if results.is_empty() {
            QueryOutcome::not_found(format!("no vertex name contains '{}'", keyword))
        } else {
            QueryOutcome::Found(results)
        }
    }

    /// Vertexes whose non-blank `property_name` equals `property_value` exactly.
    pub fn filter_vertexes_by_property(
        &self,
        property_name: &str,
        property_value: &str,
    ) -> QueryOutcome<Vec<VisualizedVertex>> {
        if property_name.is_empty() {
            log::error!("Invalid input: propertyName is empty.");
            return QueryOutcome::invalid("propertyName is empty");
        }
        if property_value.is_empty() {
            log::error!("Invalid input: propertyValue is empty.");
            return QueryOutcome::invalid("propertyValue is empty");
        }

        let results = self
            .graph
            .vertexes()
            .iter()
            .filter(|v| {
                v.properties
                    .iter()
                    .find(|p| p.name == property_name)
                    .map(|p| !p.value.trim().is_empty() && p.value == property_value)
                    .unwrap_or(false)
            })
            .map(VisualizedVertex::from)
            .collect();
        QueryOutcome::Found(results)
    }

    pub fn scenario_names(&self) -> QueryOutcome<Vec<String>> {
        let names: Vec<String> = self.graph.scenario_names().into_iter().map(String::from).collect();
        if names.is_empty() {
            QueryOutcome::not_found("graph declares no scenario")
        } else {
            QueryOutcome::Found(names)
        }
    }

    /// Color configs of `scenario`, or of every scenario when none is given.
    pub fn color_configs(&self, scenario: Option<&str>) -> QueryOutcome<Vec<ColorConfig>> {
        if self.visual.is_empty() {
            return QueryOutcome::not_found("no color config defined");
        }
        match scenario.map(str::trim).filter(|s| !s.is_empty()) {
            None => QueryOutcome::Found(self.visual.colors.values().flatten().cloned().collect()),
            Some(s) => match self.visual.colors.get(s) {
                Some(configs) => QueryOutcome::Found(configs.clone()),
                None => QueryOutcome::not_found(format!("no color config for scenario '{}'", s)),
            },
        }
    }

    /// Label -> color; the first configuration seen for a label wins.
    pub fn entity_color_map(&self, scenario: Option<&str>) -> QueryOutcome<BTreeMap<String, String>> {
        self.color_configs(scenario).map(|configs| {
            let mut map = BTreeMap::new();
            for config in configs {
                map.entry(config.item_label).or_insert(config.color);
            }
            map
        })
    }

    /// Vertexes declaring any of `scenarios`, and the edges among them.
    ///
    /// An edge is kept when it declares one of the scenarios, or when it is
    /// global and both endpoints were kept.
    pub fn vertexes_and_edges_by_scenarios(
        &self,
        scenarios: &[String],
    ) -> (Vec<VisualizedVertex>, Vec<VisualizedEdge>) {
        let wanted: HashSet<&str> = scenarios.iter().map(String::as_str).collect();

        let vertexes: Vec<&Vertex> = self
            .graph
            .vertexes()
            .iter()
            .filter(|v| v.scenarios.iter().any(|s| wanted.contains(s.as_str())))
            .collect();
        let kept: HashSet<&str> = vertexes.iter().map(|v| v.id.as_str()).collect();

        let edges = self
            .graph
            .edges()
            .iter()
            .filter(|e| {
                if e.scenarios.is_empty() {
                    kept.contains(e.head_vertex_id.as_str()) && kept.contains(e.tail_vertex_id.as_str())
                } else {
                    e.scenarios.iter().any(|s| wanted.contains(s.as_str()))
                }
            })
            .map(VisualizedEdge::from)
            .collect();

        (vertexes.into_iter().map(VisualizedVertex::from).collect(), edges)
    }

    /// Property pseudo-vertexes, children and parents of `id`, with one edge each.
    pub fn first_level_relationships(
        &self,
        id: &str,
    ) -> QueryOutcome<(Vec<VisualizedVertex>, Vec<VisualizedEdge>)> {
        let vertex = match self.graph.vertex_by_id(id) {
            Some(v) => v,
            None if id.trim().is_empty() => return QueryOutcome::invalid("vertex id is empty"),
            None => return QueryOutcome::not_found(format!("no vertex with id '{}'", id)),
        };

        let mut vertexes = Vec::new();
        let mut edges = Vec::new();

        for property in &vertex.properties {
            let pv = property_vertex(&vertex.label, &property.name, &property.value);
            edges.push(VisualizedEdge {
                source_id: vertex.id.clone(),
                target_id: pv.id.clone(),
                value: pv.display_name.clone(),
            });
            vertexes.push(pv);
        }

        self.connect(vertex, self.graph.child_links(id), true, &mut vertexes, &mut edges);
        self.connect(vertex, self.graph.parent_links(id), false, &mut vertexes, &mut edges);

        QueryOutcome::Found((vertexes, edges))
    }

    /// Emit each neighbor once per direction, labelled with the first relation
    /// type it was reached through.
    fn connect(
        &self,
        vertex: &Vertex,
        links: &[RelationGroup],
        vertex_is_source: bool,
        vertexes: &mut Vec<VisualizedVertex>,
        edges: &mut Vec<VisualizedEdge>,
    ) {
        let mut seen: HashSet<&str> = HashSet::new();
        for group in links {
            for neighbor in self.graph.neighbors(group) {
                if !seen.insert(neighbor.id.as_str()) {
                    continue;
                }
                let (source_id, target_id) = if vertex_is_source {
                    (vertex.id.clone(), neighbor.id.clone())
                } else {
                    (neighbor.id.clone(), vertex.id.clone())
                };
                edges.push(VisualizedEdge {
                    source_id,
                    target_id,
                    value: group.relation_type().to_string(),
                });
                vertexes.push(neighbor.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::{edge, laptop_graph, vertex};

    fn colors() -> VisualizationConfig {
        let configs: Vec<ScenarioColorConfig> = serde_json::from_str(
            r##"[
                {"scenario":"shopping","labelsOfVertexes":[
                    {"itemLabel":"Product","color":"#ff0000"},
                    {"itemLabel":"Spec","color":"#00ff00"}]},
                {"scenario":"travel","labelsOfVertexes":[
                    {"itemLabel":"Product","color":"#0000ff"},
                    {"itemLabel":"City","color":"#cccccc"}]}
            ]"##,
        )
        .unwrap();
        VisualizationConfig::new(configs)
    }

    #[test]
    fn test_property_vertex_id_is_deterministic() {
        let a = property_vertex_id("Spec", "size");
        assert_eq!(a, property_vertex_id("Spec", "size"));
        assert_ne!(a, property_vertex_id("Spec", "years"));
        assert_ne!(a, property_vertex_id("Product", "size"));
        assert!(a.starts_with("property-"));
        assert_eq!(a.len(), "property-".len() + 16);
    }

    #[test]
    fn test_vertex_by_id() {
        let graph = laptop_graph();
        let visual = VisualizationConfig::default();
        let executor = GraphExecutor::new(&graph, &visual);

        let v = executor.vertex_by_id("v1").into_option().unwrap();
        assert_eq!(v.display_name, "Laptop");
        assert_eq!(v.label, "Product");
        assert!(executor.vertex_by_id("v9").is_not_found());
        assert!(executor.vertex_by_id("").is_invalid_input());
    }

    #[test]
    fn test_search_vertexes_by_name_case_insensitive() {
        let graph = laptop_graph();
        let visual = VisualizationConfig::default();
        let executor = GraphExecutor::new(&graph, &visual);

        let found = executor.search_vertexes_by_name("lap").into_option().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "v1");
        assert!(executor.search_vertexes_by_name("zzz").is_not_found());
        assert!(executor.search_vertexes_by_name(" ").is_invalid_input());
    }

    #[test]
    fn test_filter_vertexes_by_property() {
        let graph = laptop_graph();
        let visual = VisualizationConfig::default();
        let executor = GraphExecutor::new(&graph, &visual);

        let found = executor.filter_vertexes_by_property("size", "16GB").into_option().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "RAM");
        assert!(executor.filter_vertexes_by_property("size", "8GB").into_option().unwrap().is_empty());
        assert!(executor.filter_vertexes_by_property("", "8GB").is_invalid_input());
        assert!(executor.filter_vertexes_by_property("size", "").is_invalid_input());
    }

    #[test]
    fn test_color_configs() {
        let graph = laptop_graph();
        let visual = colors();
        let executor = GraphExecutor::new(&graph, &visual);

        assert_eq!(executor.color_configs(Some("shopping")).into_option().unwrap().len(), 2);
        assert_eq!(executor.color_configs(None).into_option().unwrap().len(), 4);
        assert_eq!(executor.color_configs(Some("  ")).into_option().unwrap().len(), 4);
        assert!(executor.color_configs(Some("banking")).is_not_found());

        let map = executor.entity_color_map(None).into_option().unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["Product"], "#ff0000");

        let empty = VisualizationConfig::default();
        let executor = GraphExecutor::new(&graph, &empty);
        assert!(executor.color_configs(None).is_not_found());
    }

    #[test]
    fn test_scenario_names() {
        let graph = laptop_graph();
        let visual = VisualizationConfig::default();
        let executor = GraphExecutor::new(&graph, &visual);
        assert_eq!(executor.scenario_names().into_option().unwrap(), vec!["shopping"]);

        let bare = KnowledgeGraph::default();
        assert!(GraphExecutor::new(&bare, &visual).scenario_names().is_not_found());
    }

    #[test]
    fn test_vertexes_and_edges_by_scenarios() {
        let mut travel_edge = edge("a", "x", "near");
        travel_edge.scenarios = vec!["travel".to_string()];
        let graph = KnowledgeGraph::build(
            vec![
                vertex("a", "A", "T", &[], &["shopping"]),
                vertex("b", "B", "T", &[], &["shopping", "travel"]),
                vertex("x", "X", "T", &[], &[]),
            ],
            vec![edge("a", "b", "r"), edge("a", "x", "r"), travel_edge],
        )
        .unwrap();
        let visual = VisualizationConfig::default();
        let executor = GraphExecutor::new(&graph, &visual);

        let (vs, es) = executor.vertexes_and_edges_by_scenarios(&["shopping".to_string()]);
        assert_eq!(vs.len(), 2);
        assert_eq!(es.len(), 1);
        assert_eq!(es[0].target_id, "b");

        let (vs, es) = executor.vertexes_and_edges_by_scenarios(&["travel".to_string()]);
        assert_eq!(vs.len(), 1);
        assert_eq!(es.len(), 1);
        assert_eq!(es[0].value, "near");
    }

    #[test]
    fn test_first_level_relationships() {
        // parent -owns-> laptop -hasSpec-> ram ; laptop -bundles-> ram
        let graph = KnowledgeGraph::build(
            vec![
                vertex("p", "Store", "Shop", &[], &[]),
                vertex("l", "Laptop", "Product", &[("brand", "Contoso"), ("weight", "1kg")], &[]),
                vertex("r", "RAM", "Spec", &[], &[]),
            ],
            vec![edge("p", "l", "owns"), edge("l", "r", "hasSpec"), edge("l", "r", "bundles")],
        )
        .unwrap();
        let visual = VisualizationConfig::default();
        let executor = GraphExecutor::new(&graph, &visual);

        let (vs, es) = executor.first_level_relationships("l").into_option().unwrap();
        // 2 property vertexes + ram once + store
        assert_eq!(vs.len(), 4);
        assert_eq!(es.len(), 4);

        assert_eq!(vs[0].label, PROPERTY_LABEL);
        assert_eq!(vs[0].display_name, "Contoso");
        assert_eq!(es[0].source_id, "l");
        assert_eq!(es[0].value, "Contoso");

        let child = es.iter().find(|e| e.target_id == "r").unwrap();
        assert_eq!(child.source_id, "l");
        assert_eq!(child.value, "hasSpec");

        let parent = es.iter().find(|e| e.source_id == "p").unwrap();
        assert_eq!(parent.target_id, "l");
        assert_eq!(parent.value, "owns");

        assert!(executor.first_level_relationships("zz").is_not_found());
        assert!(executor.first_level_relationships("").is_invalid_input());
    }
}
