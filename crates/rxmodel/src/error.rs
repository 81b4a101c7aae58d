//! Error types for rxmodel.
//!
//! The engine is permissive by default: unknown properties are created on
//! first use and cancelling an unknown listener is a no-op. These errors are
//! only produced when a model is built in strict mode.

use thiserror::Error;

use crate::registry::ListenerId;

/// Errors reported by [`Model`](crate::Model) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The property was never declared on a strict model.
    #[error("unknown property '{name}'")]
    UnknownProperty {
        /// The name that was referenced.
        name: String,
    },

    /// The listener is not registered on the property (or on any property).
    #[error("listener {id:?} is not registered")]
    UnknownListener {
        /// The identity that was looked up.
        id: ListenerId,
    },

    /// Every strong handle to the model has been dropped.
    #[error("model has been dropped")]
    ModelDropped,
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
