//! Graph Focus Commander
//!
//! Executes one directive against the view:
//! - Clear pulse and highlight, dim everything
//! - Resolve the target; a miss stops here without error
//! - Un-dim and frame the target, highlight and pulse it
//! - Select focused nodes so detail panels follow
//! - Clear the pulse after a delay unless something newer superseded it
//!
//! Nothing here propagates an error to the caller.

use crate::controller::GraphController;
use crate::element::{CameraMove, GraphElementRef, ResolvedTarget, StyleClass};
use crate::error::GraphViewError;
use narr_script::Directive;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Focus animation tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Delay before the pulse class is cleared
    pub pulse_clear_ms: u64,
    /// Camera zoom on the focused element
    pub zoom: f64,
    /// Camera animation duration
    pub animation_ms: u64,
    /// Padding around framed elements
    pub padding: u32,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            pulse_clear_ms: 3_000,
            zoom: 1.6,
            animation_ms: 800,
            padding: 80,
        }
    }
}

impl FocusConfig {
    /// Set pulse clear delay
    #[must_use]
    pub fn with_pulse_clear(mut self, delay: Duration) -> Self {
        self.pulse_clear_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set camera zoom
    #[must_use]
    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom;
        self
    }

    /// Set camera animation duration in milliseconds
    #[must_use]
    pub fn with_animation_ms(mut self, ms: u64) -> Self {
        self.animation_ms = ms;
        self
    }

    /// Pulse clear delay
    #[inline]
    #[must_use]
    pub fn pulse_clear_delay(&self) -> Duration {
        Duration::from_millis(self.pulse_clear_ms)
    }

    /// Camera move for a focus
    #[inline]
    #[must_use]
    pub fn camera(&self) -> CameraMove {
        CameraMove {
            zoom: self.zoom,
            duration_ms: self.animation_ms,
            padding: self.padding,
        }
    }
}

/// What happened to a directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusOutcome {
    /// Target found and focused
    Applied(ResolvedTarget),
    /// Target absent; only the dim step ran
    Unresolved,
    /// The view rejected an operation; logged and swallowed
    Failed,
}

impl FocusOutcome {
    /// Whether the target was focused
    #[inline]
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Applies focus directives to the shared view
#[derive(Debug, Clone)]
pub struct FocusCommander {
    graph: GraphController,
    config: FocusConfig,
}

impl FocusCommander {
    /// Create commander
    #[must_use]
    pub fn new(graph: GraphController, config: FocusConfig) -> Self {
        Self { graph, config }
    }

    /// Controller this commander drives
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &GraphController {
        &self.graph
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &FocusConfig {
        &self.config
    }

    /// Execute a directive
    ///
    /// Never fails: view errors are logged and reported as
    /// [`FocusOutcome::Failed`].
    pub fn apply(&self, directive: &Directive) -> FocusOutcome {
        let target = GraphElementRef::from(directive);

        match self.try_apply(directive, &target) {
            Ok(Some((generation, resolved))) => {
                debug!(%target, primary = %resolved.primary, "focus applied");
                self.schedule_pulse_clear(generation, resolved.focus.clone());
                FocusOutcome::Applied(resolved)
            }
            Ok(None) => {
                debug!(%target, "focus target not in graph");
                FocusOutcome::Unresolved
            }
            Err(e) => {
                warn!(%target, error = %e, "focus failed");
                FocusOutcome::Failed
            }
        }
    }

    fn try_apply(
        &self,
        directive: &Directive,
        target: &GraphElementRef,
    ) -> Result<Option<(u64, ResolvedTarget)>, GraphViewError> {
        let generation = self.graph.next_pulse_generation();
        let camera = self.config.camera();

        self.graph.with_view(|view| {
            view.remove_class_all(StyleClass::Pulse)?;
            view.remove_class_all(StyleClass::Highlighted)?;
            view.add_class_all(StyleClass::Dimmed)?;

            let Some(resolved) = view.resolve(target) else {
                return Ok(None);
            };

            view.remove_class(&resolved.focus, StyleClass::Dimmed)?;
            view.animate_camera(&resolved.focus, &camera)?;
            view.add_class(&resolved.focus, StyleClass::Highlighted)?;
            view.add_class(&resolved.focus, StyleClass::Pulse)?;

            if matches!(directive, Directive::FocusNode { .. }) {
                view.select(&resolved.primary)?;
            }

            Ok(Some((generation, resolved)))
        })
    }

    fn schedule_pulse_clear(&self, generation: u64, ids: Vec<String>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no runtime, pulse stays until the next focus");
            return;
        };

        let graph = self.graph.clone();
        let delay = self.config.pulse_clear_delay();

        runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let result = graph.with_view(|view| {
                if graph.pulse_generation() != generation {
                    return Ok(());
                }
                view.remove_class(&ids, StyleClass::Pulse)
            });

            if let Err(e) = result {
                warn!(error = %e, "pulse clear failed");
            }
        });
    }
}
