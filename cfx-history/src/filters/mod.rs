//! Entity predicates
//!
//! Static filters only look at immutable entity attributes and memoize their result
//! per entity. A [`CompositeFilter`] combines static filters with an optional
//! role-at-date predicate that is re-evaluated for every sampled timestamp.

mod cache;
mod composite;
mod field;
mod whitelist;

pub use cache::FilterCache;
pub use composite::{CompositeFilter, RoleAtDateFilter, RoleDependingOnDateFilter};
pub use field::{EntityField, FieldFilter, FieldFilterBuilder, FieldValue};
pub use whitelist::WhitelistFilter;

use crate::entity::Entity;

/// Date-independent predicate over an entity
///
/// Implementors provide the raw predicate and their cache; memoization and the
/// diagnostic hit counter come for free. Filters are shared between rayon workers,
/// hence `Send + Sync`.
pub trait StaticFilter: Send + Sync {
    /// Human-readable description used in logs and report titles
    fn label(&self) -> String;

    /// Evaluate the predicate, bypassing the cache
    fn match_without_cache(&self, entity: &Entity) -> bool;

    /// Memoized results of this filter instance
    fn cache(&self) -> &FilterCache;

    /// Evaluate the predicate, memoized per entity instance
    fn match_with_cache(&self, entity: &Entity) -> bool {
        self.cache()
            .get_or_compute(entity.serial(), || self.match_without_cache(entity))
    }

    /// Cheap check on the id alone, run before an entity is even constructed
    ///
    /// Returning `false` guarantees `match_without_cache` would reject the entity.
    fn accepts_id(&self, _id: &str) -> bool {
        true
    }

    /// Number of lookups answered from the cache
    fn cache_hits(&self) -> usize {
        self.cache().hits()
    }
}
