//! Headless graph view
//!
//! Keeps style classes, camera framing and selection in memory. Backs the CLI
//! and the tests; a UI embeds its own [`GraphView`].

use crate::element::{CameraMove, ElementKind, GraphElementRef, ResolvedTarget, StyleClass};
use crate::error::GraphViewError;
use crate::model::GraphElements;
use crate::view::GraphView;
use std::collections::{BTreeSet, HashMap};

/// In-memory rendering surface
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphView {
    elements: GraphElements,
    ids: BTreeSet<String>,
    classes: HashMap<String, BTreeSet<StyleClass>>,
    framed: Vec<String>,
    camera: Option<CameraMove>,
    selected: Option<String>,
    camera_moves: usize,
}

impl InMemoryGraphView {
    /// Create view over a graph
    #[must_use]
    pub fn new(elements: GraphElements) -> Self {
        let ids = elements.element_ids().collect();
        Self {
            elements,
            ids,
            ..Self::default()
        }
    }

    /// Loaded elements
    #[inline]
    #[must_use]
    pub fn elements(&self) -> &GraphElements {
        &self.elements
    }

    /// Whether `id` currently carries `class`
    #[must_use]
    pub fn has_class(&self, id: &str, class: StyleClass) -> bool {
        self.classes.get(id).is_some_and(|c| c.contains(&class))
    }

    /// Ids carrying `class`, sorted
    #[must_use]
    pub fn with_class(&self, class: StyleClass) -> Vec<String> {
        let mut ids: Vec<String> = self
            .classes
            .iter()
            .filter(|(_, c)| c.contains(&class))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Elements framed by the last camera move
    #[inline]
    #[must_use]
    pub fn framed(&self) -> &[String] {
        &self.framed
    }

    /// Last camera move
    #[inline]
    #[must_use]
    pub fn camera(&self) -> Option<&CameraMove> {
        self.camera.as_ref()
    }

    /// Number of camera moves so far
    #[inline]
    #[must_use]
    pub fn camera_moves(&self) -> usize {
        self.camera_moves
    }

    /// Currently selected element
    #[inline]
    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    fn check_known(&self, ids: &[String]) -> Result<(), GraphViewError> {
        match ids.iter().find(|id| !self.ids.contains(*id)) {
            Some(missing) => Err(GraphViewError::ElementNotFound(missing.clone())),
            None => Ok(()),
        }
    }
}

impl GraphView for InMemoryGraphView {
    fn load(&mut self, elements: &GraphElements) -> Result<(), GraphViewError> {
        *self = Self::new(elements.clone());
        Ok(())
    }

    fn resolve(&self, target: &GraphElementRef) -> Option<ResolvedTarget> {
        match target {
            GraphElementRef::Node(id) => self.elements.node(id).map(|node| ResolvedTarget {
                primary: node.id.clone(),
                focus: vec![node.id.clone()],
                kind: ElementKind::Node,
            }),
            GraphElementRef::Edge { source, target } => {
                self.elements.edge_between(source, target).map(|edge| {
                    let id = edge.element_id();
                    ResolvedTarget {
                        focus: vec![id.clone(), edge.source.clone(), edge.target.clone()],
                        primary: id,
                        kind: ElementKind::Edge,
                    }
                })
            }
        }
    }

    fn add_class(&mut self, ids: &[String], class: StyleClass) -> Result<(), GraphViewError> {
        self.check_known(ids)?;
        for id in ids {
            self.classes.entry(id.clone()).or_default().insert(class);
        }
        Ok(())
    }

    fn remove_class(&mut self, ids: &[String], class: StyleClass) -> Result<(), GraphViewError> {
        for id in ids {
            if let Some(classes) = self.classes.get_mut(id) {
                classes.remove(&class);
            }
        }
        Ok(())
    }

    fn add_class_all(&mut self, class: StyleClass) -> Result<(), GraphViewError> {
        for id in &self.ids {
            self.classes.entry(id.clone()).or_default().insert(class);
        }
        Ok(())
    }

    fn remove_class_all(&mut self, class: StyleClass) -> Result<(), GraphViewError> {
        for classes in self.classes.values_mut() {
            classes.remove(&class);
        }
        Ok(())
    }

    fn animate_camera(
        &mut self,
        ids: &[String],
        camera: &CameraMove,
    ) -> Result<(), GraphViewError> {
        self.check_known(ids)?;
        if !(camera.zoom.is_finite() && camera.zoom > 0.0) {
            return Err(GraphViewError::Camera(format!("zoom {} out of range", camera.zoom)));
        }
        tracing::debug!(?ids, zoom = camera.zoom, "camera framing");
        self.framed = ids.to_vec();
        self.camera = Some(*camera);
        self.camera_moves += 1;
        Ok(())
    }

    fn select(&mut self, id: &str) -> Result<(), GraphViewError> {
        if !self.ids.contains(id) {
            return Err(GraphViewError::ElementNotFound(id.to_string()));
        }
        self.selected = Some(id.to_string());
        Ok(())
    }
}
