//! One tracked change request and its as-of queries
//!
//! An entity is created from a [`CreationRecord`], receives its events while the
//! library is being built, and is re-indexed once by [`Entity::recompute_chronology`].
//! From then on it is immutable and every query is a binary search over the
//! chronologically sorted event logs.

use crate::records::CreationRecord;
use crate::types::{ChangeStateEvent, HistoryError, OwnerChangeEvent, Result, Timestamp};
use crate::users::{Owner, UserDirectory};
use crate::vocabulary::{
    role_from_config_unit, Category, RejectionCause, RequestType, Role, SecurityRelevance, State,
};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// A tracked change request
#[derive(Debug, Clone)]
pub struct Entity {
    /// Unique per constructed instance, even across libraries sharing ids
    serial: u64,
    id: String,
    alternate_id: Option<String>,
    submit_date: Timestamp,
    project: String,
    category: Category,
    request_type: RequestType,
    safety_relevant: Option<bool>,
    security_relevant: SecurityRelevance,
    rejection_cause: Option<RejectionCause>,
    fixed_in_subsystem: Option<Role>,
    system_structure_subsystem: Role,
    /// Derived once at construction
    subsystem: Role,
    /// Derived once at construction
    config_unit: String,
    current_owner: Arc<Owner>,
    current_state: State,

    /// Sorted by timestamp after `recompute_chronology`; ties keep insertion order
    change_state_events: Vec<ChangeStateEvent>,
    owner_change_events: Vec<OwnerChangeEvent>,
    historical_roles: HashSet<Role>,
    chronology_dirty: bool,
}

impl Entity {
    /// Build an entity from its creation record, validating required fields
    ///
    /// The current owner must be named. When the directory knows at least one owner,
    /// the name must also be one of them.
    pub fn from_record(record: &CreationRecord, directory: &UserDirectory) -> Result<Self> {
        let id = record.id.as_str();

        let submit_date = record
            .submit_date
            .ok_or_else(|| HistoryError::missing(id, "submit_date"))?;

        let system_structure_subsystem = record
            .system_structure_subsystem
            .or_else(|| subsystem_from_text(id, &record.system_structure_config_unit))
            .ok_or_else(|| HistoryError::missing(id, "system_structure_subsystem"))?;

        let fixed_in_subsystem = record
            .fixed_in_subsystem
            .or_else(|| subsystem_from_text(id, &record.fixed_in_config_unit));

        let owner_name = record
            .current_owner
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| HistoryError::missing(id, "current_owner"))?;

        let current_owner = if directory.is_empty() {
            directory.resolve(owner_name)
        } else {
            directory
                .get(owner_name)
                .ok_or_else(|| HistoryError::missing(id, "current_owner"))?
        };

        let subsystem = match record.rejection_cause {
            Some(cause) if cause != RejectionCause::None => system_structure_subsystem,
            _ => fixed_in_subsystem.unwrap_or(current_owner.role),
        };

        let config_unit = if fixed_in_subsystem.is_some() {
            record.fixed_in_config_unit.clone()
        } else {
            record.system_structure_config_unit.clone()
        };

        let mut historical_roles = HashSet::new();
        historical_roles.insert(current_owner.role);

        Ok(Self {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            id: record.id.clone(),
            alternate_id: record.alternate_id.clone(),
            submit_date,
            project: record.project.clone(),
            category: record.category,
            request_type: record.request_type,
            safety_relevant: record.safety_relevant,
            security_relevant: record.security_relevant,
            rejection_cause: record.rejection_cause,
            fixed_in_subsystem,
            system_structure_subsystem,
            subsystem,
            config_unit,
            current_owner,
            current_state: record.state,
            change_state_events: Vec::new(),
            owner_change_events: Vec::new(),
            historical_roles,
            chronology_dirty: false,
        })
    }

    /// Append a state transition; call `recompute_chronology` once all are loaded
    pub fn add_change_state_event(&mut self, event: ChangeStateEvent) {
        self.change_state_events.push(event);
        self.chronology_dirty = true;
    }

    /// Append an owner change; call `recompute_chronology` once all are loaded
    pub fn add_owner_change_event(&mut self, event: OwnerChangeEvent) {
        self.historical_roles.insert(event.previous_owner.role);
        self.historical_roles.insert(event.new_owner.role);
        self.owner_change_events.push(event);
        self.chronology_dirty = true;
    }

    /// Sort both event logs by timestamp (stable: equal timestamps keep insertion order)
    pub fn recompute_chronology(&mut self) {
        self.change_state_events.sort_by_key(|event| event.timestamp);
        self.owner_change_events.sort_by_key(|event| event.timestamp);
        self.chronology_dirty = false;
    }

    /// Lifecycle state at `date`: the new state of the latest transition strictly before it
    ///
    /// Without any such transition the entity did not exist yet at `date`.
    pub fn state_at_date(&self, date: Timestamp) -> State {
        self.latest_change_state_event_before(date)
            .map_or(State::NotCreatedYet, |event| event.new_state)
    }

    /// Owner at `date`; `None` before the submit date
    pub fn current_owner_at_date(&self, date: Timestamp) -> Option<Arc<Owner>> {
        if date < self.submit_date {
            return None;
        }

        let owner = self
            .latest_owner_change_event_before(date)
            .map_or(&self.current_owner, |event| &event.new_owner);
        Some(Arc::clone(owner))
    }

    /// Role of the owner at `date`; `None` before the submit date
    pub fn current_role_at_date(&self, date: Timestamp) -> Option<Role> {
        self.current_owner_at_date(date).map(|owner| owner.role)
    }

    /// Every role the owner of this entity has ever had
    pub fn all_historical_roles(&self) -> &HashSet<Role> {
        &self.historical_roles
    }

    /// Timestamp of the first real transition to `SUBMITTED`, or the submit date
    pub fn earliest_submit_date(&self) -> Timestamp {
        self.change_state_events
            .iter()
            .find(|event| event.new_state == State::Submitted && event.changes_state())
            .map_or(self.submit_date, |event| event.timestamp)
    }

    fn latest_change_state_event_before(&self, date: Timestamp) -> Option<&ChangeStateEvent> {
        debug_assert!(!self.chronology_dirty, "{}: chronology not recomputed", self.id);
        let end = self
            .change_state_events
            .partition_point(|event| event.timestamp < date);
        end.checked_sub(1).map(|index| &self.change_state_events[index])
    }

    fn latest_owner_change_event_before(&self, date: Timestamp) -> Option<&OwnerChangeEvent> {
        debug_assert!(!self.chronology_dirty, "{}: chronology not recomputed", self.id);
        let end = self
            .owner_change_events
            .partition_point(|event| event.timestamp < date);
        end.checked_sub(1).map(|index| &self.owner_change_events[index])
    }

    /// State transitions, oldest first
    pub fn change_state_events(&self) -> &[ChangeStateEvent] {
        &self.change_state_events
    }

    /// State transitions, newest first
    pub fn change_state_events_reversed(&self) -> impl Iterator<Item = &ChangeStateEvent> {
        self.change_state_events.iter().rev()
    }

    /// Owner changes, oldest first
    pub fn owner_change_events(&self) -> &[OwnerChangeEvent] {
        &self.owner_change_events
    }

    /// Owner changes, newest first
    pub fn owner_change_events_reversed(&self) -> impl Iterator<Item = &OwnerChangeEvent> {
        self.owner_change_events.iter().rev()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identity of this instance, used to memoize filter results
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn alternate_id(&self) -> Option<&str> {
        self.alternate_id.as_deref()
    }

    pub fn submit_date(&self) -> Timestamp {
        self.submit_date
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    pub fn safety_relevant(&self) -> Option<bool> {
        self.safety_relevant
    }

    pub fn security_relevant(&self) -> SecurityRelevance {
        self.security_relevant
    }

    pub fn rejection_cause(&self) -> Option<RejectionCause> {
        self.rejection_cause
    }

    pub fn fixed_in_subsystem(&self) -> Option<Role> {
        self.fixed_in_subsystem
    }

    pub fn system_structure_subsystem(&self) -> Role {
        self.system_structure_subsystem
    }

    /// Subsystem responsible for the request
    pub fn subsystem(&self) -> Role {
        self.subsystem
    }

    /// Configuration unit the request applies to
    pub fn config_unit(&self) -> &str {
        &self.config_unit
    }

    pub fn current_owner(&self) -> &Arc<Owner> {
        &self.current_owner
    }

    pub fn current_state(&self) -> State {
        self.current_state
    }
}

/// Subsystem named by a configuration-unit text, when the record left it empty
fn subsystem_from_text(id: &str, config_unit: &str) -> Option<Role> {
    if config_unit.trim().is_empty() {
        return None;
    }
    let role = role_from_config_unit(config_unit);
    match role {
        Some(role) => log::debug!("{}: '{}' read as subsystem {}", id, config_unit, role),
        None => log::warn!("{}: no subsystem matches config unit '{}'", id, config_unit),
    }
    role
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Entity {} state={} owner={}>",
            self.id, self.current_state, self.current_owner.full_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::ActionKind;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn directory() -> UserDirectory {
        UserDirectory::from_tsv("Alice Martin\tATS\nBob Durand\tSW\nCarl Petit\tADONEM\n").unwrap()
    }

    fn transition(old: State, new: State, timestamp: Timestamp) -> ChangeStateEvent {
        ChangeStateEvent {
            old_state: old,
            new_state: new,
            action: ActionKind::Modify,
            timestamp,
        }
    }

    fn owner_change(dir: &UserDirectory, from: &str, to: &str, timestamp: Timestamp) -> OwnerChangeEvent {
        OwnerChangeEvent {
            previous_owner: dir.resolve(from),
            new_owner: dir.resolve(to),
            timestamp,
        }
    }

    fn entity() -> Entity {
        let record = CreationRecord::new("CFX1", at(2020, 1, 10), "Bob Durand", Role::Ats)
            .with_state(State::Resolved);
        Entity::from_record(&record, &directory()).unwrap()
    }

    #[test]
    fn test_missing_fields_are_reported() {
        let dir = directory();

        let mut record = CreationRecord::new("CFX1", at(2020, 1, 10), "Bob Durand", Role::Ats);
        record.submit_date = None;
        let err = Entity::from_record(&record, &dir).unwrap_err();
        assert_eq!(err.to_string(), "entity CFX1: missing field submit_date");

        let mut record = CreationRecord::new("CFX1", at(2020, 1, 10), "Bob Durand", Role::Ats);
        record.system_structure_subsystem = None;
        assert!(Entity::from_record(&record, &dir).is_err());

        let record = CreationRecord::new("CFX1", at(2020, 1, 10), "Nobody Known", Role::Ats);
        let err = Entity::from_record(&record, &dir).unwrap_err();
        assert_eq!(err.to_string(), "entity CFX1: missing field current_owner");
    }

    #[test]
    fn test_empty_directory_accepts_any_owner() {
        let record = CreationRecord::new("CFX1", at(2020, 1, 10), "Nobody Known", Role::Ats);
        let entity = Entity::from_record(&record, &UserDirectory::new()).unwrap();
        assert_eq!(entity.current_owner().role, Role::Tbd);
    }

    #[test]
    fn test_derived_subsystem_and_config_unit() {
        let dir = directory();

        // Fixed somewhere: fixed-in wins
        let record = CreationRecord::new("A", at(2020, 1, 1), "Bob Durand", Role::Ats)
            .with_fixed_in(Some(Role::Reseau), "Commutateur")
            .with_system_structure_config_unit("ATS");
        let entity = Entity::from_record(&record, &dir).unwrap();
        assert_eq!(entity.subsystem(), Role::Reseau);
        assert_eq!(entity.config_unit(), "Commutateur");

        // Rejected: system structure wins
        let record = CreationRecord::new("B", at(2020, 1, 1), "Bob Durand", Role::Adonem)
            .with_fixed_in(Some(Role::Reseau), "Commutateur")
            .with_rejection_cause(RejectionCause::Duplicate);
        let entity = Entity::from_record(&record, &dir).unwrap();
        assert_eq!(entity.subsystem(), Role::Adonem);

        // Nothing fixed, not rejected: owner role
        let record = CreationRecord::new("C", at(2020, 1, 1), "Bob Durand", Role::Adonem)
            .with_rejection_cause(RejectionCause::None)
            .with_system_structure_config_unit("ADONEM");
        let entity = Entity::from_record(&record, &dir).unwrap();
        assert_eq!(entity.subsystem(), Role::Sw);
        assert_eq!(entity.config_unit(), "ADONEM");
    }

    #[test]
    fn test_subsystems_read_from_config_unit_text() {
        let dir = directory();

        let mut record = CreationRecord::new("D", at(2020, 1, 1), "Bob Durand", Role::Ats)
            .with_system_structure_config_unit("S002_Subsystem SECU IHM")
            .with_fixed_in(None, "Baie Centrale Radio");
        record.system_structure_subsystem = None;
        let entity = Entity::from_record(&record, &dir).unwrap();
        assert_eq!(entity.system_structure_subsystem(), Role::Ats);
        assert_eq!(entity.fixed_in_subsystem(), Some(Role::Radio));
        assert_eq!(entity.subsystem(), Role::Radio);
        assert_eq!(entity.config_unit(), "Baie Centrale Radio");

        // Explicit values win over the text
        let record = CreationRecord::new("E", at(2020, 1, 1), "Bob Durand", Role::Saf)
            .with_system_structure_config_unit("ATS");
        let entity = Entity::from_record(&record, &dir).unwrap();
        assert_eq!(entity.system_structure_subsystem(), Role::Saf);

        // Text that names no subsystem leaves the field missing
        let mut record = CreationRecord::new("F", at(2020, 1, 1), "Bob Durand", Role::Ats)
            .with_system_structure_config_unit("Nothing relevant");
        record.system_structure_subsystem = None;
        let err = Entity::from_record(&record, &dir).unwrap_err();
        assert_eq!(err.to_string(), "entity F: missing field system_structure_subsystem");
    }

    #[test]
    fn test_serials_are_unique() {
        let first = entity();
        let second = entity();
        assert_eq!(first.id(), second.id());
        assert_ne!(first.serial(), second.serial());
    }

    #[test]
    fn test_empty_log_is_never_created() {
        let mut entity = entity();
        entity.recompute_chronology();
        assert_eq!(entity.state_at_date(at(2000, 1, 1)), State::NotCreatedYet);
        assert_eq!(entity.state_at_date(at(2020, 1, 11)), State::NotCreatedYet);
        assert_eq!(entity.state_at_date(at(2100, 1, 1)), State::NotCreatedYet);
    }

    #[test]
    fn test_state_at_date_uses_strictly_earlier_events() {
        let mut entity = entity();
        // Appended out of order on purpose
        entity.add_change_state_event(transition(State::Analysed, State::Resolved, at(2020, 3, 1)));
        entity.add_change_state_event(transition(State::NoValue, State::Submitted, at(2020, 1, 10)));
        entity.add_change_state_event(transition(State::Submitted, State::Analysed, at(2020, 2, 1)));
        entity.recompute_chronology();

        assert_eq!(entity.state_at_date(at(2020, 1, 10)), State::NotCreatedYet);
        assert_eq!(entity.state_at_date(at(2020, 1, 11)), State::Submitted);
        assert_eq!(entity.state_at_date(at(2020, 2, 1)), State::Submitted);
        assert_eq!(entity.state_at_date(at(2020, 2, 2)), State::Analysed);
        assert_eq!(entity.state_at_date(at(2021, 1, 1)), State::Resolved);
        assert_eq!(entity.state_at_date(at(2021, 1, 1)), entity.state_at_date(at(2021, 1, 1)));
    }

    #[test]
    fn test_unknown_transition_is_not_conflated_with_not_created() {
        let mut entity = entity();
        entity.add_change_state_event(transition(State::Submitted, State::Unknown, at(2020, 2, 1)));
        entity.recompute_chronology();
        assert_eq!(entity.state_at_date(at(2020, 1, 31)), State::NotCreatedYet);
        assert_eq!(entity.state_at_date(at(2020, 2, 2)), State::Unknown);
    }

    #[test]
    fn test_equal_timestamps_keep_both_events() {
        let mut entity = entity();
        entity.add_change_state_event(transition(State::Submitted, State::Analysed, at(2020, 6, 17)));
        entity.add_change_state_event(transition(State::Analysed, State::Resolved, at(2020, 6, 17)));
        entity.recompute_chronology();

        assert_eq!(entity.change_state_events().len(), 2);
        // The later-inserted event wins among ties
        assert_eq!(entity.state_at_date(at(2020, 6, 18)), State::Resolved);
        assert_eq!(
            entity.change_state_events_reversed().next().map(|e| e.new_state),
            Some(State::Resolved)
        );
    }

    #[test]
    fn test_owner_at_date() {
        let dir = directory();
        let mut entity = entity();
        entity.add_owner_change_event(owner_change(&dir, "Alice Martin", "Carl Petit", at(2020, 2, 1)));
        entity.add_owner_change_event(owner_change(&dir, "Carl Petit", "Bob Durand", at(2020, 3, 1)));
        entity.recompute_chronology();

        assert!(entity.current_owner_at_date(at(2020, 1, 1)).is_none());
        assert_eq!(entity.current_role_at_date(at(2020, 1, 1)), None);
        // Before the first change: the owner present at construction
        assert_eq!(entity.current_role_at_date(at(2020, 1, 15)), Some(Role::Sw));
        assert_eq!(entity.current_role_at_date(at(2020, 2, 15)), Some(Role::Adonem));
        assert_eq!(entity.current_role_at_date(at(2020, 3, 15)), Some(Role::Sw));
        assert_eq!(
            entity.current_owner_at_date(at(2030, 1, 1)).as_deref(),
            Some(entity.current_owner().as_ref())
        );
    }

    #[test]
    fn test_historical_roles() {
        let dir = directory();
        let mut entity = entity();
        assert_eq!(entity.all_historical_roles().len(), 1);
        entity.add_owner_change_event(owner_change(&dir, "Alice Martin", "Carl Petit", at(2020, 2, 1)));
        entity.recompute_chronology();

        let roles = entity.all_historical_roles();
        assert!(roles.contains(&Role::Sw));
        assert!(roles.contains(&Role::Ats));
        assert!(roles.contains(&Role::Adonem));
    }

    #[test]
    fn test_earliest_submit_date() {
        let mut entity = entity();
        assert_eq!(entity.earliest_submit_date(), at(2020, 1, 10));

        entity.add_change_state_event(transition(State::Submitted, State::Submitted, at(2019, 1, 1)));
        entity.add_change_state_event(transition(State::NoValue, State::Submitted, at(2019, 6, 1)));
        entity.recompute_chronology();
        assert_eq!(entity.earliest_submit_date(), at(2019, 6, 1));
    }
}
