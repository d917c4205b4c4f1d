//! Error types for the store.
//!
//! Every failure that can surface from a dispatch, a registration or a
//! construction is a [`StoreError`] variant. Reducers are expected to be pure
//! and total; when they are not, the error travels back to the caller of the
//! `dispatch` that triggered the pass.

use thiserror::Error;

use crate::path::Path;

/// Errors produced by the store, its pipeline and its scopes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// A second store was constructed while another one is still live.
    #[error("A store has already been created; only a single live instance is allowed per process")]
    SingleInstance,

    /// A verb addressed an existing value of the wrong kind.
    #[error("Type mismatch at '{path}': expected {expected} but found {found}")]
    TypeMismatch {
        path: Path,
        expected: &'static str,
        found: &'static str,
    },

    /// An async processor is already registered for this action type.
    #[error("An async processor for '{action_type}' has already been registered")]
    Conflict { action_type: String },

    /// A path could not be followed through the tree.
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: Path, reason: String },

    /// A payload could not be interpreted for its action type.
    #[error("Invalid payload for '{action_type}': {reason}")]
    InvalidPayload { action_type: String, reason: String },

    /// A user reducer refused the action.
    #[error("Reducer rejected the action: {0}")]
    Rejected(String),

    /// An async operation was requested outside of a tokio runtime.
    #[error("No tokio runtime available to drive async actions")]
    NoRuntime,

    /// The store has been completed and accepts no more actions.
    #[error("The store has been completed")]
    Completed,

    /// The scope has been completed and accepts no more operations.
    #[error("The scope has been completed")]
    ScopeCompleted,
}

impl StoreError {
    /// Shorthand for [`StoreError::Rejected`] from user reducers.
    pub fn rejected(reason: impl Into<String>) -> Self {
        StoreError::Rejected(reason.into())
    }
}
