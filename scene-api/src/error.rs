//! Error taxonomy shared by the renderer and its backends. The core never
//! terminates the process; it reports the kind and lets the orchestrator
//! decide.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// Unsupported attachment/format/dimension combination. Fatal to the
    /// pipeline: a malformed target set cannot produce a correct scene, so
    /// this is never retried.
    #[error("render target configuration rejected in {stage}: {reason}")]
    Configuration { stage: &'static str, reason: String },

    /// An image or buffer allocation failed. No fallback resolution exists.
    #[error("allocation failed for {what} at {width}x{height}")]
    ResourceExhausted {
        what: &'static str,
        width: u32,
        height: u32,
    },

    /// The presentation surface could not be acquired or configured.
    #[error("surface unavailable: {0}")]
    Surface(String),
}
