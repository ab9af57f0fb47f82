//! Central error handling for the scatterforge engine.
//!
//! Provides a unified RenderError enum with consistent categorization
//! across both renderer backends and the interaction layer.

/// Centralized error type for all engine operations.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// Contract violations: geometry mismatch, invalid polyline lengths,
    /// negative sizes. These fail loudly and are never recovered from.
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// The surface cannot provide the requested pipeline (adapter or
    /// device acquisition failed). Raised at first render, not at init.
    #[error("Surface error: {0}")]
    Surface(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Readback error: {0}")]
    Readback(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn geometry<T: ToString>(msg: T) -> Self {
        RenderError::Geometry(msg.to_string())
    }

    pub fn surface<T: ToString>(msg: T) -> Self {
        RenderError::Surface(msg.to_string())
    }

    pub fn upload<T: ToString>(msg: T) -> Self {
        RenderError::Upload(msg.to_string())
    }

    pub fn render<T: ToString>(msg: T) -> Self {
        RenderError::Render(msg.to_string())
    }

    pub fn readback<T: ToString>(msg: T) -> Self {
        RenderError::Readback(msg.to_string())
    }
}

/// Result type alias for engine operations.
pub type RenderResult<T> = Result<T, RenderError>;
