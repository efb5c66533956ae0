//! Rendering surface capability

use crate::element::{CameraMove, GraphElementRef, ResolvedTarget, StyleClass};
use crate::error::GraphViewError;
use crate::model::GraphElements;
use parking_lot::Mutex;
use std::sync::Arc;

/// What narration needs from a rendering surface
///
/// Implementations wrap whatever draws the graph. Layout and drawing stay
/// behind this trait; narration only resolves, styles, frames and selects.
pub trait GraphView: Send {
    /// Replace the element set (layout is the surface's business)
    fn load(&mut self, elements: &GraphElements) -> Result<(), GraphViewError>;

    /// Resolve a reference against the current element set
    ///
    /// Absent elements yield `None`, never an error.
    fn resolve(&self, target: &GraphElementRef) -> Option<ResolvedTarget>;

    /// Add a class to the given elements
    fn add_class(&mut self, ids: &[String], class: StyleClass) -> Result<(), GraphViewError>;

    /// Remove a class from the given elements
    fn remove_class(&mut self, ids: &[String], class: StyleClass) -> Result<(), GraphViewError>;

    /// Add a class to every element
    fn add_class_all(&mut self, class: StyleClass) -> Result<(), GraphViewError>;

    /// Remove a class from every element
    fn remove_class_all(&mut self, class: StyleClass) -> Result<(), GraphViewError>;

    /// Animate the camera to frame the given elements
    fn animate_camera(&mut self, ids: &[String], camera: &CameraMove)
        -> Result<(), GraphViewError>;

    /// Emit a selection as if the user tapped the element
    fn select(&mut self, id: &str) -> Result<(), GraphViewError>;
}

/// Shared handle, so a host can keep inspecting a view it handed over
impl<V: GraphView> GraphView for Arc<Mutex<V>> {
    fn load(&mut self, elements: &GraphElements) -> Result<(), GraphViewError> {
        self.lock().load(elements)
    }

    fn resolve(&self, target: &GraphElementRef) -> Option<ResolvedTarget> {
        self.lock().resolve(target)
    }

    fn add_class(&mut self, ids: &[String], class: StyleClass) -> Result<(), GraphViewError> {
        self.lock().add_class(ids, class)
    }

    fn remove_class(&mut self, ids: &[String], class: StyleClass) -> Result<(), GraphViewError> {
        self.lock().remove_class(ids, class)
    }

    fn add_class_all(&mut self, class: StyleClass) -> Result<(), GraphViewError> {
        self.lock().add_class_all(class)
    }

    fn remove_class_all(&mut self, class: StyleClass) -> Result<(), GraphViewError> {
        self.lock().remove_class_all(class)
    }

    fn animate_camera(
        &mut self,
        ids: &[String],
        camera: &CameraMove,
    ) -> Result<(), GraphViewError> {
        self.lock().animate_camera(ids, camera)
    }

    fn select(&mut self, id: &str) -> Result<(), GraphViewError> {
        self.lock().select(id)
    }
}
