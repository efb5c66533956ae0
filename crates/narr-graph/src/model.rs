//! Cytoscape-shaped graph element model
//!
//! Mirrors what the graph endpoint returns and what the chat request sends
//! back: `{graph: {elements: {nodes: [{data}], edges: [{data}]}}, stats}`.
//! Unknown data fields are preserved.

use narr_script::EntityLabel;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Loaded graph plus backend-computed statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Graph elements
    #[serde(default)]
    pub graph: GraphData,
    /// Opaque statistics (node importance, totals, ...)
    #[serde(default)]
    pub stats: Value,
}

/// `{elements: ...}` wrapper
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    /// Nodes and edges
    #[serde(default)]
    pub elements: GraphElements,
}

/// Node and edge lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphElements {
    /// Nodes
    #[serde(default)]
    pub nodes: Vec<NodeElement>,
    /// Edges
    #[serde(default)]
    pub edges: Vec<EdgeElement>,
}

/// Node wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeElement {
    /// Node data
    pub data: NodeData,
}

/// Node payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Element id
    pub id: String,
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Entity type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Edge wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeElement {
    /// Edge data
    pub data: EdgeData,
}

/// Edge payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    /// Element id, if the producer assigned one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    /// Relation label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeElement {
    /// Create a labelled node
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            data: NodeData {
                id: id.into(),
                label: Some(label.into()),
                kind: None,
                extra: Map::new(),
            },
        }
    }
}

impl EdgeElement {
    /// Create an edge
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            data: EdgeData {
                id: None,
                source: source.into(),
                target: target.into(),
                label: None,
                extra: Map::new(),
            },
        }
    }
}

impl EdgeData {
    /// Id used for styling; synthesized from the endpoints when absent
    #[must_use]
    pub fn element_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("{}->{}", self.source, self.target))
    }

    /// Whether the edge joins `a` and `b`, in either direction
    #[inline]
    #[must_use]
    pub fn joins(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}

impl GraphElements {
    /// Find node by id
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&NodeData> {
        self.nodes.iter().map(|n| &n.data).find(|d| d.id == id)
    }

    /// Find edge joining two nodes, preferring the given direction
    #[must_use]
    pub fn edge_between(&self, source: &str, target: &str) -> Option<&EdgeData> {
        let mut edges = self.edges.iter().map(|e| &e.data);
        edges
            .clone()
            .find(|d| d.source == source && d.target == target)
            .or_else(|| edges.find(|d| d.joins(source, target)))
    }

    /// Every element id (nodes then edges)
    pub fn element_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.nodes
            .iter()
            .map(|n| n.data.id.clone())
            .chain(self.edges.iter().map(|e| e.data.element_id()))
    }

    /// Labelled nodes as auto-linker vocabulary
    #[must_use]
    pub fn entity_labels(&self) -> Vec<EntityLabel> {
        self.nodes
            .iter()
            .filter_map(|n| {
                let label = n.data.label.as_deref()?.trim();
                (!label.is_empty()).then(|| EntityLabel::new(n.data.id.clone(), label))
            })
            .collect()
    }

    /// Total element count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }

    /// Whether the graph is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "graph": {"elements": {
            "nodes": [
                {"data": {"id": "n1", "label": "PIB Mensal", "type": "INDICADOR", "weight": 3}},
                {"data": {"id": "n2"}}
            ],
            "edges": [
                {"data": {"source": "n1", "target": "n2", "label": "mede"}}
            ]
        }},
        "stats": {"total_nodes": 2}
    }"#;

    #[test]
    fn parses_snapshot_and_keeps_extra_fields() {
        let snapshot: GraphSnapshot = serde_json::from_str(SNAPSHOT).unwrap();
        let elements = &snapshot.graph.elements;

        assert_eq!(elements.len(), 3);
        let n1 = elements.node("n1").unwrap();
        assert_eq!(n1.kind.as_deref(), Some("INDICADOR"));
        assert_eq!(n1.extra.get("weight"), Some(&Value::from(3)));
        assert_eq!(snapshot.stats["total_nodes"], 2);
    }

    #[test]
    fn edge_lookup_either_direction() {
        let snapshot: GraphSnapshot = serde_json::from_str(SNAPSHOT).unwrap();
        let elements = &snapshot.graph.elements;

        assert_eq!(elements.edge_between("n2", "n1").unwrap().element_id(), "n1->n2");
        assert!(elements.edge_between("n1", "n3").is_none());
    }

    #[test]
    fn entity_labels_skip_unlabelled_nodes() {
        let snapshot: GraphSnapshot = serde_json::from_str(SNAPSHOT).unwrap();
        let labels = snapshot.graph.elements.entity_labels();
        assert_eq!(labels, [EntityLabel::new("n1", "PIB Mensal")]);
    }

    #[test]
    fn missing_sections_default() {
        let snapshot: GraphSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.graph.elements.is_empty());
    }
}
