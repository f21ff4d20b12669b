//! Core types for the change-request history library
//!
//! This module defines the timestamp alias, the error type, and the two immutable
//! event records that make up an entity's history. Events are only created while
//! the library is being built; afterwards they are read-only.

use crate::users::Owner;
use crate::vocabulary::{ActionKind, State};
use chrono::NaiveDateTime;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Timestamp type used throughout the library (exports carry local, naive times)
pub type Timestamp = NaiveDateTime;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Errors that can occur while building or querying the history index
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("entity {id}: missing field {field}")]
    MalformedCreationRecord { id: String, field: &'static str },

    #[error("Date step resolves to a zero-length interval")]
    InvalidDateStep,

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Failed to load whitelist {path:?}: {source}")]
    WhitelistLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid user directory: {0}")]
    UserDirectory(String),

    #[error("Aggregation run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HistoryError {
    pub(crate) fn missing(id: &str, field: &'static str) -> Self {
        HistoryError::MalformedCreationRecord {
            id: id.to_string(),
            field,
        }
    }
}

/// One lifecycle transition of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeStateEvent {
    pub old_state: State,
    pub new_state: State,
    pub action: ActionKind,
    pub timestamp: Timestamp,
}

impl ChangeStateEvent {
    /// True when the transition actually moves to another state
    pub fn changes_state(&self) -> bool {
        self.old_state != self.new_state
    }
}

impl fmt::Display for ChangeStateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} ({})",
            self.timestamp, self.old_state, self.new_state, self.action
        )
    }
}

/// One change of the entity's current owner
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerChangeEvent {
    pub previous_owner: Arc<Owner>,
    pub new_owner: Arc<Owner>,
    pub timestamp: Timestamp,
}

impl fmt::Display for OwnerChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}",
            self.timestamp, self.previous_owner.full_name, self.new_owner.full_name
        )
    }
}
