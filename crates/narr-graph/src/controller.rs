//! Single owner of the rendering surface
//!
//! The focus commander, the scheduler and tap handlers all reach the view
//! through a cloned [`GraphController`] rather than a global handle.

use crate::element::{GraphElementRef, ResolvedTarget, StyleClass};
use crate::error::GraphViewError;
use crate::model::GraphElements;
use crate::view::GraphView;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Shared owner of a [`GraphView`]
#[derive(Clone)]
pub struct GraphController {
    view: Arc<Mutex<Box<dyn GraphView>>>,
    /// Bumped by every focus and tap; pending pulse clears compare against it
    pulse_generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for GraphController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphController")
            .field("pulse_generation", &self.pulse_generation())
            .finish_non_exhaustive()
    }
}

impl GraphController {
    /// Take ownership of a view
    #[must_use]
    pub fn new(view: impl GraphView + 'static) -> Self {
        Self {
            view: Arc::new(Mutex::new(Box::new(view))),
            pulse_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run `f` with exclusive access to the view
    pub fn with_view<R>(&self, f: impl FnOnce(&mut dyn GraphView) -> R) -> R {
        let mut view = self.view.lock();
        f(view.as_mut())
    }

    /// Resolve a reference against the current element set
    #[must_use]
    pub fn resolve(&self, target: &GraphElementRef) -> Option<ResolvedTarget> {
        self.view.lock().resolve(target)
    }

    /// Replace the element set, dropping any command-driven styling
    ///
    /// # Errors
    /// Whatever the view reports.
    pub fn load(&self, elements: &GraphElements) -> Result<(), GraphViewError> {
        self.next_pulse_generation();
        self.with_view(|view| view.load(elements))
    }

    /// Start a new pulse generation, superseding pending clears
    pub fn next_pulse_generation(&self) -> u64 {
        self.pulse_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Current pulse generation
    #[inline]
    #[must_use]
    pub fn pulse_generation(&self) -> u64 {
        self.pulse_generation.load(Ordering::SeqCst)
    }

    /// Remove dimmed, highlighted and pulse classes everywhere
    ///
    /// # Errors
    /// First failure reported by the view.
    pub fn clear_focus(&self) -> Result<(), GraphViewError> {
        self.with_view(|view| {
            StyleClass::FOCUS
                .iter()
                .try_for_each(|class| view.remove_class_all(*class))
        })
    }

    /// Handle a direct user tap on an element
    ///
    /// Command-driven highlighting is cleared and pending pulse clears are
    /// invalidated before the element is selected.
    ///
    /// # Errors
    /// `GraphViewError::ElementNotFound` if the element is not in the graph.
    pub fn user_tap(&self, id: &str) -> Result<(), GraphViewError> {
        self.next_pulse_generation();
        debug!(id, "user tap");
        self.with_view(|view| {
            for class in StyleClass::FOCUS {
                view.remove_class_all(class)?;
            }
            view.select(id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryGraphView;
    use crate::model::NodeElement;

    fn shared() -> Arc<Mutex<InMemoryGraphView>> {
        Arc::new(Mutex::new(InMemoryGraphView::new(GraphElements {
            nodes: vec![NodeElement::new("a", "Alfa"), NodeElement::new("b", "Beta")],
            edges: vec![],
        })))
    }

    #[test]
    fn user_tap_clears_command_styling() {
        let view = shared();
        let controller = GraphController::new(Arc::clone(&view));
        controller
            .with_view(|v| {
                v.add_class_all(StyleClass::Dimmed)?;
                v.add_class(&["a".to_string()], StyleClass::Pulse)
            })
            .unwrap();

        let before = controller.pulse_generation();
        controller.user_tap("b").unwrap();

        let view = view.lock();
        assert!(view.with_class(StyleClass::Dimmed).is_empty());
        assert!(view.with_class(StyleClass::Pulse).is_empty());
        assert_eq!(view.selected(), Some("b"));
        assert!(controller.pulse_generation() > before);
    }

    #[test]
    fn tap_on_unknown_element_fails() {
        let controller = GraphController::new(shared());
        assert_eq!(
            controller.user_tap("zz"),
            Err(GraphViewError::ElementNotFound("zz".into()))
        );
    }

    #[test]
    fn load_replaces_elements() {
        let view = shared();
        let controller = GraphController::new(Arc::clone(&view));
        controller
            .load(&GraphElements {
                nodes: vec![NodeElement::new("c", "Gama")],
                edges: vec![],
            })
            .unwrap();

        assert!(controller.resolve(&GraphElementRef::node("c")).is_some());
        assert!(controller.resolve(&GraphElementRef::node("a")).is_none());
    }
}
