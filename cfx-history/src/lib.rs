//! Change-Request History Library
//!
//! An in-memory index of tracked change requests and their histories, able to answer
//! "what was this request's state / owner at date T" and to produce time-bucketed,
//! filtered state counts over thousands of requests.
//!
//! # Architecture
//!
//! - [`HistoryLibrary`] is built once from typed records ([`LibraryInputs`]) and is
//!   read-only afterwards
//! - [`Entity`] owns its state and owner event logs and answers as-of queries
//! - Static filters ([`FieldFilter`], [`WhitelistFilter`]) memoize per entity;
//!   [`CompositeFilter`] adds an optional role-at-date predicate
//! - [`DatesGenerator`] implementations choose the sample timestamps
//! - [`QueryEngine`] samples every timestamp (in parallel) into [`AllResultsPerDates`]
//!
//! The library does NOT read spreadsheets or export files, nor render charts.
//! Loading record files and writing reports is handled by the application layer
//! (cfx-history-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use cfx_history::{
//!     CompositeFilter, DecreasingIntervalGenerator, HistoryLibrary, LibraryConfig,
//!     LibraryInputs, QueryEngine, Role, UserDirectory,
//! };
//! use std::path::Path;
//!
//! let directory = UserDirectory::from_file(Path::new("users.tsv")).unwrap();
//! let inputs: LibraryInputs = LibraryInputs::default();
//!
//! let library = HistoryLibrary::build(&inputs, &directory, &[], &LibraryConfig::new()).unwrap();
//!
//! let filters = [CompositeFilter::new().with_roles([Role::Ats])];
//! let results = QueryEngine::new(&library)
//!     .gather_state_counts_for_each_date(&filters, &DecreasingIntervalGenerator::new())
//!     .unwrap();
//!
//! for result in results.timestamp_results() {
//!     println!("{}: {} requests", result.timestamp, result.total());
//! }
//! ```

// Public modules
pub mod config;
pub mod dates;
pub mod engine;
pub mod entity;
pub mod filters;
pub mod library;
pub mod records;
pub mod results;
pub mod types;
pub mod users;
pub mod vocabulary;

// Re-export main types for convenience
pub use config::{EngineConfig, LibraryConfig};
pub use dates::{
    ConstantIntervalGenerator, DatesGenerator, DecreasingIntervalGenerator, FixedListGenerator, Step,
};
pub use engine::{gather_state_counts_for_each_date, CancellationToken, QueryEngine};
pub use entity::Entity;
pub use filters::{
    CompositeFilter, EntityField, FieldFilter, FieldValue, RoleAtDateFilter, RoleDependingOnDateFilter,
    StaticFilter, WhitelistFilter,
};
pub use library::HistoryLibrary;
pub use records::{CreationRecord, LibraryInputs, OwnerChangeRecord, StateChangeRecord};
pub use results::{AllResultsPerDates, OneTimestampResult};
pub use types::{ChangeStateEvent, HistoryError, OwnerChangeEvent, Result, Timestamp};
pub use users::{Owner, UserDirectory};
pub use vocabulary::{
    ActionKind, Category, Decoded, RejectionCause, RequestType, Role, SecurityRelevance, State,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
