//! Error types for graph view operations

/// Failure reported by a rendering surface
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphViewError {
    /// Surface not mounted or already torn down
    #[error("graph view unavailable: {0}")]
    Unavailable(String),

    /// Element vanished between resolution and use
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// Camera animation rejected
    #[error("camera animation failed: {0}")]
    Camera(String),
}
