//! Composite filter: static predicates plus an optional role-at-date predicate

use super::{FieldFilter, FilterCache, StaticFilter, WhitelistFilter};
use crate::entity::Entity;
use crate::types::Timestamp;
use crate::vocabulary::Role;
use std::collections::HashSet;

/// Time-dependent predicate: the owner's role at the sampled date must be allowed
#[derive(Debug, Clone)]
pub struct RoleDependingOnDateFilter {
    allowed_roles: HashSet<Role>,
}

impl RoleDependingOnDateFilter {
    pub fn new(allowed_roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed_roles: allowed_roles.into_iter().collect(),
        }
    }

    pub fn allowed_roles(&self) -> &HashSet<Role> {
        &self.allowed_roles
    }

    pub fn matches(&self, entity: &Entity, date: Timestamp) -> bool {
        role_allowed_at(entity, date, &self.allowed_roles)
    }

    pub fn label(&self) -> String {
        format!("Role at date among {}", role_names(&self.allowed_roles))
    }
}

/// Static predicate: the owner's role at one fixed date must be allowed
///
/// Unlike [`RoleDependingOnDateFilter`] the date does not follow the sampled
/// timestamp, so the result is memoized like any other static filter.
#[derive(Debug)]
pub struct RoleAtDateFilter {
    date: Timestamp,
    allowed_roles: HashSet<Role>,
    cache: FilterCache,
}

impl RoleAtDateFilter {
    pub fn new(date: Timestamp, allowed_roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            date,
            allowed_roles: allowed_roles.into_iter().collect(),
            cache: FilterCache::new(),
        }
    }

    pub fn date(&self) -> Timestamp {
        self.date
    }

    pub fn allowed_roles(&self) -> &HashSet<Role> {
        &self.allowed_roles
    }
}

impl StaticFilter for RoleAtDateFilter {
    fn label(&self) -> String {
        format!(
            "Role at {} among {}",
            self.date.format("%Y-%m-%d"),
            role_names(&self.allowed_roles)
        )
    }

    fn match_without_cache(&self, entity: &Entity) -> bool {
        role_allowed_at(entity, self.date, &self.allowed_roles)
    }

    fn cache(&self) -> &FilterCache {
        &self.cache
    }
}

fn role_allowed_at(entity: &Entity, date: Timestamp, allowed_roles: &HashSet<Role>) -> bool {
    entity
        .current_role_at_date(date)
        .is_some_and(|role| allowed_roles.contains(&role))
}

fn role_names(roles: &HashSet<Role>) -> String {
    let mut roles: Vec<Role> = roles.iter().copied().collect();
    roles.sort();
    let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
    names.join(", ")
}

/// AND of a whitelist, field filters, fixed-date role filters and a role-at-date
/// filter, each optional
#[derive(Debug, Default)]
pub struct CompositeFilter {
    role_filter: Option<RoleDependingOnDateFilter>,
    field_filters: Vec<FieldFilter>,
    role_at_date_filters: Vec<RoleAtDateFilter>,
    whitelist: Option<WhitelistFilter>,
    label: Option<String>,
}

impl CompositeFilter {
    /// Create a filter that matches every entity at every date
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: restrict the owner's role at the sampled date
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.role_filter = Some(RoleDependingOnDateFilter::new(roles));
        self
    }

    /// Builder method: add a field filter
    pub fn with_field_filter(mut self, filter: FieldFilter) -> Self {
        self.field_filters.push(filter);
        self
    }

    /// Builder method: require an allowed owner role at a fixed date
    pub fn with_role_at_date(mut self, filter: RoleAtDateFilter) -> Self {
        self.role_at_date_filters.push(filter);
        self
    }

    /// Builder method: restrict to a whitelist
    pub fn with_whitelist(mut self, whitelist: WhitelistFilter) -> Self {
        self.whitelist = Some(whitelist);
        self
    }

    /// Builder method: override the generated label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn role_filter(&self) -> Option<&RoleDependingOnDateFilter> {
        self.role_filter.as_ref()
    }

    /// Whitelist and field filters, short-circuiting on the first rejection
    pub fn match_static(&self, entity: &Entity) -> bool {
        if let Some(whitelist) = &self.whitelist {
            if !whitelist.match_with_cache(entity) {
                return false;
            }
        }
        self.field_filters
            .iter()
            .all(|filter| filter.match_with_cache(entity))
            && self
                .role_at_date_filters
                .iter()
                .all(|filter| filter.match_with_cache(entity))
    }

    pub fn match_role_at_date(&self, entity: &Entity, date: Timestamp) -> bool {
        self.role_filter
            .as_ref()
            .map_or(true, |filter| filter.matches(entity, date))
    }

    pub fn matches(&self, entity: &Entity, date: Timestamp) -> bool {
        self.match_static(entity) && self.match_role_at_date(entity, date)
    }

    pub fn label(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }

        let mut parts = Vec::new();
        if let Some(whitelist) = &self.whitelist {
            parts.push(whitelist.label());
        }
        parts.extend(self.field_filters.iter().map(|filter| filter.label()));
        parts.extend(self.role_at_date_filters.iter().map(|filter| filter.label()));
        if let Some(role_filter) = &self.role_filter {
            parts.push(role_filter.label());
        }

        if parts.is_empty() {
            "All".to_string()
        } else {
            parts.join(" ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{EntityField, FieldValue};
    use crate::records::CreationRecord;
    use crate::types::OwnerChangeEvent;
    use crate::users::UserDirectory;
    use crate::vocabulary::Category;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn entity() -> Entity {
        let directory = UserDirectory::from_tsv("Alice\tATS\nBob\tSW\n").unwrap();
        let record = CreationRecord::new("CFX1", at(2021, 1, 5), "Bob", Role::Ats)
            .with_category(Category::Major);
        let mut entity = Entity::from_record(&record, &directory).unwrap();
        entity.add_owner_change_event(OwnerChangeEvent {
            previous_owner: directory.resolve("Alice"),
            new_owner: directory.resolve("Bob"),
            timestamp: at(2021, 3, 1),
        });
        entity.recompute_chronology();
        entity
    }

    #[test]
    fn test_empty_composite_matches_everything() {
        let filter = CompositeFilter::new();
        assert!(filter.matches(&entity(), at(1990, 1, 1)));
        assert_eq!(filter.label(), "All");
    }

    #[test]
    fn test_role_at_date() {
        let entity = entity();
        let filter = CompositeFilter::new().with_roles([Role::Sw]);

        // Before the submit date there is no owner at all
        assert!(!filter.match_role_at_date(&entity, at(2021, 1, 1)));
        // Owner present at construction until the first change
        assert!(filter.match_role_at_date(&entity, at(2021, 2, 1)));
        assert!(filter.match_role_at_date(&entity, at(2021, 4, 1)));

        let ats = CompositeFilter::new().with_roles([Role::Ats]);
        assert!(!ats.matches(&entity, at(2021, 4, 1)));
        assert!(ats.match_static(&entity));
    }

    #[test]
    fn test_static_part_is_an_and() {
        let entity = entity();
        let major = || {
            FieldFilter::builder(EntityField::Category)
                .accepted_values([FieldValue::Category(Category::Major)])
                .build()
                .unwrap()
        };

        let filter = CompositeFilter::new()
            .with_field_filter(major())
            .with_whitelist(WhitelistFilter::from_ids(["CFX1"]));
        assert!(filter.match_static(&entity));

        let filter = CompositeFilter::new()
            .with_field_filter(major())
            .with_whitelist(WhitelistFilter::from_ids(["CFX2"]));
        assert!(!filter.match_static(&entity));
        assert_eq!(filter.label(), "Whitelist of 1 ids Category among MAJOR");
    }

    #[test]
    fn test_role_at_fixed_date() {
        let entity = entity();

        // Bob (SW) owns it from the submit date; the 2021-03-01 change keeps SW
        let before = RoleAtDateFilter::new(at(2021, 2, 1), [Role::Sw]);
        let after = RoleAtDateFilter::new(at(2021, 4, 1), [Role::Sw, Role::Ats]);
        let not_yet = RoleAtDateFilter::new(at(2020, 12, 1), [Role::Sw]);
        assert!(before.match_with_cache(&entity));
        assert!(after.match_with_cache(&entity));
        assert!(!not_yet.match_with_cache(&entity));
        assert_eq!(after.label(), "Role at 2021-04-01 among SW, ATS");

        // Independent of the sampled date
        let filter = CompositeFilter::new()
            .with_role_at_date(RoleAtDateFilter::new(at(2021, 2, 1), [Role::Sw]));
        assert!(filter.matches(&entity, at(2030, 1, 1)));
        assert!(filter.match_static(&entity));

        let filter = CompositeFilter::new()
            .with_role_at_date(RoleAtDateFilter::new(at(2021, 2, 1), [Role::Ats]));
        assert!(!filter.match_static(&entity));
        assert_eq!(filter.label(), "Role at 2021-02-01 among ATS");
    }
}
