//! Narrator Graph - the rendering surface as seen by narration
//!
//! The rendering surface is a capability, not a dependency: anything that can
//! resolve elements by id, toggle style classes, move the camera and emit a
//! selection implements [`GraphView`]. One [`GraphController`] owns the view
//! and is shared by reference with everything that mutates it.
//!
//! # Focus sequence
//!
//! ```text
//! clear pulse/highlight → dim all → resolve target ─┬─ miss → done (no-op)
//!                                                    └─ hit  → undim, frame, highlight,
//!                                                              pulse, select node,
//!                                                              clear pulse later
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod commander;
pub mod controller;
pub mod element;
pub mod error;
pub mod memory;
pub mod model;
pub mod view;

pub use commander::{FocusCommander, FocusConfig, FocusOutcome};
pub use controller::GraphController;
pub use element::{CameraMove, ElementKind, GraphElementRef, ResolvedTarget, StyleClass};
pub use error::GraphViewError;
pub use memory::InMemoryGraphView;
pub use model::{
    EdgeData, EdgeElement, GraphData, GraphElements, GraphSnapshot, NodeData, NodeElement,
};
pub use view::GraphView;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
