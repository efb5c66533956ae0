//! Element references, style classes and camera moves

use narr_script::{normalize_element_id, Directive};
use serde::{Deserialize, Serialize};

/// What a directive points at, ids normalized
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphElementRef {
    /// A node by id
    Node(String),
    /// An edge by endpoints
    Edge {
        /// Source node id
        source: String,
        /// Target node id
        target: String,
    },
}

impl GraphElementRef {
    /// Node reference with `ID:` prefixes stripped
    #[must_use]
    pub fn node(id: &str) -> Self {
        Self::Node(normalize_element_id(id).to_string())
    }

    /// Edge reference with `ID:` prefixes stripped
    #[must_use]
    pub fn edge(source: &str, target: &str) -> Self {
        Self::Edge {
            source: normalize_element_id(source).to_string(),
            target: normalize_element_id(target).to_string(),
        }
    }

    /// Kind of element referenced
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Node(_) => ElementKind::Node,
            Self::Edge { .. } => ElementKind::Edge,
        }
    }
}

impl From<&Directive> for GraphElementRef {
    fn from(directive: &Directive) -> Self {
        match directive {
            Directive::FocusNode { node_id } => Self::node(node_id),
            Directive::FocusEdge { source, target } => Self::edge(source, target),
        }
    }
}

impl std::fmt::Display for GraphElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node(id) => write!(f, "node {id}"),
            Self::Edge { source, target } => write!(f, "edge {source} -> {target}"),
        }
    }
}

/// Element kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Node
    Node,
    /// Edge
    Edge,
}

/// A reference resolved against the current element set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Element the reference names (node id or edge element id)
    pub primary: String,
    /// Elements to reveal and frame; includes `primary`
    pub focus: Vec<String>,
    /// Kind of `primary`
    pub kind: ElementKind,
}

/// Style classes toggled by narration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleClass {
    /// Faded into the background
    Dimmed,
    /// Current narration focus
    Highlighted,
    /// Transient attention pulse
    Pulse,
}

impl StyleClass {
    /// Class name on the rendering surface
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dimmed => "dimmed",
            Self::Highlighted => "highlighted",
            Self::Pulse => "pulse",
        }
    }

    /// Classes owned by command-driven focus
    pub const FOCUS: [StyleClass; 3] = [Self::Dimmed, Self::Highlighted, Self::Pulse];
}

/// Camera animation request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraMove {
    /// Target zoom level
    pub zoom: f64,
    /// Animation duration in milliseconds
    pub duration_ms: u64,
    /// Padding around the framed elements in pixels
    pub padding: u32,
}
