//! Generation Engine
//!
//! The token generator behind the chat host. The engine itself is an
//! external collaborator reached through the capability traits in
//! `crate::types`; this module holds the error taxonomy, the cancellable
//! inference loop, and a deterministic scripted engine used for
//! development and tests.

pub mod scripted;
pub mod stream;

use thiserror::Error;

/// Engine failures. Initialization and context-window errors are fatal
/// before the session starts; a generation error is fatal to the current
/// turn only (the engine is stateful and unrecoverable mid-generation).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to initialize model from '{path}': {reason}")]
    Init { path: String, reason: String },

    #[error("max_length {requested} exceeds the model's context window of {window}")]
    ContextWindow { requested: usize, window: usize },

    #[error("token generation failed: {0}")]
    Generation(String),
}
