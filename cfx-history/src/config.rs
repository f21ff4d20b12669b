//! Library and engine configuration types
//!
//! Only the knobs the core needs live here. Which files to read, which queries to
//! run and how to report them is handled by the application layer (cfx-history-cli).

use serde::{Deserialize, Serialize};

/// Configuration for building a [`HistoryLibrary`](crate::HistoryLibrary)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Record per-entity construction failures in `failed_ids` instead of aborting
    #[serde(default)]
    pub ignore_creation_errors: bool,

    /// Optional: human-readable name of the library, used in reports
    #[serde(default)]
    pub label: Option<String>,
}

impl LibraryConfig {
    /// Create a new library configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: tolerate malformed creation records
    pub fn ignore_creation_errors(mut self, enabled: bool) -> Self {
        self.ignore_creation_errors = enabled;
        self
    }

    /// Builder method: set the library label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Configuration for aggregation runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sample timestamps on the rayon thread pool (results are merged in order)
    #[serde(default = "default_true")]
    pub parallel: bool,
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: default_true(),
        }
    }
}

impl EngineConfig {
    /// Create a new engine configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: enable or disable parallel sampling
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }
}
