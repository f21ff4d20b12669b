//! The library: every entity built from one set of records
//!
//! Construction is strictly sequential and runs in four phases:
//!
//! 1. Entities are created from creation records. Static filters reject ids before
//!    construction when they can (`accepts_id`), and reject built entities otherwise,
//!    so the expensive history work below only touches entities that are kept.
//! 2. State-change records are decoded and appended to their entity.
//! 3. Owner-change records are appended the same way.
//! 4. Every entity is re-indexed chronologically, exactly once.
//!
//! Events referencing an id that was filtered out (or never existed) are ignored.
//! Once built, the library is read-only and can be shared across threads.

use crate::config::LibraryConfig;
use crate::entity::Entity;
use crate::filters::StaticFilter;
use crate::records::{LibraryInputs, OwnerChangeRecord, StateChangeRecord};
use crate::types::{ChangeStateEvent, OwnerChangeEvent, Result};
use crate::users::{clean_owner_name, UserDirectory};
use crate::vocabulary::{ActionKind, State};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

/// Read-only set of entities plus the ids that failed to build
#[derive(Debug)]
pub struct HistoryLibrary {
    entities: Vec<Entity>,
    index_by_id: HashMap<String, usize>,
    failed_ids: Vec<String>,
    label: String,
}

impl HistoryLibrary {
    /// Build a library from typed records
    ///
    /// With `config.ignore_creation_errors` unset, the first malformed creation record
    /// aborts the build. Records rejected by a filter's `accepts_id` are never parsed,
    /// so they cannot fail the build.
    pub fn build(
        inputs: &LibraryInputs,
        directory: &UserDirectory,
        filters: &[Box<dyn StaticFilter>],
        config: &LibraryConfig,
    ) -> Result<Self> {
        let started = Instant::now();

        let label = config.label.clone().unwrap_or_else(|| {
            filters
                .iter()
                .map(|filter| filter.label())
                .collect::<Vec<_>>()
                .join(" ")
        });

        let mut library = Self {
            entities: Vec::new(),
            index_by_id: HashMap::new(),
            failed_ids: Vec::new(),
            label,
        };

        let phase = Instant::now();
        library.create_entities(inputs, directory, filters, config)?;
        log::info!(
            "{} entities created ({} failed) in {:?}",
            library.entities.len(),
            library.failed_ids.len(),
            phase.elapsed()
        );

        let phase = Instant::now();
        let state_changes = library.add_state_changes(&inputs.state_change_records);
        log::info!("{} state changes added in {:?}", state_changes, phase.elapsed());

        let phase = Instant::now();
        let owner_changes = library.add_owner_changes(&inputs.owner_change_records, directory);
        log::info!("{} owner changes added in {:?}", owner_changes, phase.elapsed());

        for entity in &mut library.entities {
            entity.recompute_chronology();
        }

        log::info!(
            "Library '{}' built with {} entities in {:?}",
            library.label,
            library.entities.len(),
            started.elapsed()
        );
        Ok(library)
    }

    fn create_entities(
        &mut self,
        inputs: &LibraryInputs,
        directory: &UserDirectory,
        filters: &[Box<dyn StaticFilter>],
        config: &LibraryConfig,
    ) -> Result<()> {
        for record in &inputs.creation_records {
            if self.index_by_id.contains_key(&record.id) {
                log::debug!("{}: duplicate creation record ignored", record.id);
                continue;
            }

            if !filters.iter().all(|filter| filter.accepts_id(&record.id)) {
                continue;
            }

            let entity = match Entity::from_record(record, directory) {
                Ok(entity) => entity,
                Err(err) if config.ignore_creation_errors => {
                    log::error!("Error when creating {}: {}", record.id, err);
                    self.failed_ids.push(record.id.clone());
                    continue;
                }
                Err(err) => return Err(err),
            };

            if filters.iter().all(|filter| filter.match_with_cache(&entity)) {
                self.index_by_id
                    .insert(entity.id().to_string(), self.entities.len());
                self.entities.push(entity);
            }
        }
        Ok(())
    }

    fn add_state_changes(&mut self, records: &[StateChangeRecord]) -> usize {
        let mut added = 0;

        for record in records {
            let Some(&index) = self.index_by_id.get(&record.entity_id) else {
                continue;
            };

            let old_state_raw = record
                .old_state_raw
                .as_deref()
                .map(str::trim)
                .filter(|raw| !raw.is_empty());
            let Some(old_state_raw) = old_state_raw else {
                log::warn!(
                    "{}: state change at {} has no previous state, skipped",
                    record.entity_id,
                    record.timestamp
                );
                continue;
            };

            let event = ChangeStateEvent {
                old_state: State::decode_or_fallback(old_state_raw),
                new_state: State::decode_or_fallback(&record.new_state_raw),
                action: ActionKind::decode_or_fallback(&record.action),
                timestamp: record.timestamp,
            };
            log::trace!("{}: {}", record.entity_id, event);
            self.entities[index].add_change_state_event(event);
            added += 1;
        }

        added
    }

    fn add_owner_changes(&mut self, records: &[OwnerChangeRecord], directory: &UserDirectory) -> usize {
        let mut added = 0;

        for record in records {
            let Some(&index) = self.index_by_id.get(&record.entity_id) else {
                continue;
            };

            let previous_name = clean_owner_name(&record.previous_owner_name);
            let new_name = clean_owner_name(&record.new_owner_name);
            if previous_name.is_empty() || new_name.is_empty() {
                log::error!(
                    "Invalid current owner change for {} at {}, from '{}' to '{}'",
                    record.entity_id,
                    record.timestamp,
                    previous_name,
                    new_name
                );
            }

            let event = OwnerChangeEvent {
                previous_owner: directory.resolve(previous_name),
                new_owner: directory.resolve(new_name),
                timestamp: record.timestamp,
            };
            log::trace!("{}: {}", record.entity_id, event);
            self.entities[index].add_owner_change_event(event);
            added += 1;
        }

        added
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Entity> {
        self.index_by_id.get(id).map(|&index| &self.entities[index])
    }

    /// Entity ids in insertion order
    pub fn all_ids(&self) -> Vec<&str> {
        self.entities.iter().map(Entity::id).collect()
    }

    /// Entities in insertion order
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Ids of creation records that failed to build (only with `ignore_creation_errors`)
    pub fn failed_ids(&self) -> &[String] {
        &self.failed_ids
    }

    /// Group every entity by its state at `date`
    pub fn by_state_at_date(&self, date: crate::Timestamp) -> BTreeMap<State, Vec<&Entity>> {
        let mut groups: BTreeMap<State, Vec<&Entity>> = BTreeMap::new();
        for entity in &self.entities {
            groups
                .entry(entity.state_at_date(date))
                .or_default()
                .push(entity);
        }
        groups
    }

    /// Entities passing every given static filter (all entities for an empty list)
    pub fn matching_static(&self, filters: &[Box<dyn StaticFilter>]) -> Vec<&Entity> {
        self.entities
            .iter()
            .filter(|entity| filters.iter().all(|filter| filter.match_with_cache(entity)))
            .collect()
    }

    /// Distinct project names
    pub fn projects(&self) -> BTreeSet<&str> {
        self.entities.iter().map(Entity::project).collect()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{EntityField, FieldFilter, FieldValue, WhitelistFilter};
    use crate::records::CreationRecord;
    use crate::vocabulary::Role;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> crate::Timestamp {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn inputs() -> LibraryInputs {
        LibraryInputs::new(
            vec![
                CreationRecord::new("CFX1", at(2020, 1, 1), "Alice", Role::Ats)
                    .with_state(State::Analysed)
                    .with_project("FR_NEXTEO"),
                CreationRecord::new("CFX2", at(2020, 2, 1), "Bob", Role::Sw).with_project("KVB"),
                CreationRecord::new("CFX1", at(2021, 1, 1), "Bob", Role::Sw),
            ],
            vec![
                StateChangeRecord::new("CFX1", "Submitted", "Analysed", "Analyse", at(2020, 1, 5)),
                StateChangeRecord::new("CFX1", "No Value", "Submitted", "Submit", at(2020, 1, 1)),
                StateChangeRecord::new("CFX9", "No Value", "Submitted", "Submit", at(2020, 1, 1)),
                StateChangeRecord {
                    old_state_raw: None,
                    ..StateChangeRecord::new("CFX2", "", "Submitted", "Submit", at(2020, 2, 1))
                },
            ],
            vec![
                OwnerChangeRecord::new("CFX1", "Bob (bd)", "Alice (am)", at(2020, 1, 3)),
                OwnerChangeRecord::new("CFX2", "", "Bob", at(2020, 2, 2)),
            ],
        )
    }

    fn directory() -> UserDirectory {
        UserDirectory::from_tsv("Alice\tATS\nBob\tSW\n").unwrap()
    }

    #[test]
    fn test_build_phases() {
        let library =
            HistoryLibrary::build(&inputs(), &directory(), &[], &LibraryConfig::new()).unwrap();

        assert_eq!(library.len(), 2);
        assert_eq!(library.all_ids(), vec!["CFX1", "CFX2"]);
        assert!(library.failed_ids().is_empty());

        let cfx1 = library.get_by_id("CFX1").unwrap();
        // First creation record wins
        assert_eq!(cfx1.project(), "FR_NEXTEO");
        assert_eq!(cfx1.change_state_events().len(), 2);
        assert_eq!(cfx1.change_state_events()[0].new_state, State::Submitted);
        assert_eq!(cfx1.owner_change_events()[0].new_owner.full_name, "Alice");

        // Missing previous state: skipped. Empty owner name: unknown owner.
        let cfx2 = library.get_by_id("CFX2").unwrap();
        assert!(cfx2.change_state_events().is_empty());
        assert_eq!(cfx2.owner_change_events()[0].previous_owner.role, Role::Tbd);

        assert!(library.get_by_id("CFX9").is_none());
        assert_eq!(library.projects().into_iter().collect::<Vec<_>>(), vec!["FR_NEXTEO", "KVB"]);
    }

    #[test]
    fn test_by_state_at_date() {
        let library =
            HistoryLibrary::build(&inputs(), &directory(), &[], &LibraryConfig::new()).unwrap();
        let groups = library.by_state_at_date(at(2020, 3, 1));

        assert_eq!(groups[&State::Analysed].len(), 1);
        assert_eq!(groups[&State::NotCreatedYet][0].id(), "CFX2");
    }

    #[test]
    fn test_whitelist_and_label() {
        let filters: Vec<Box<dyn StaticFilter>> = vec![Box::new(WhitelistFilter::from_ids(["CFX2"]))];
        let library =
            HistoryLibrary::build(&inputs(), &directory(), &filters, &LibraryConfig::new()).unwrap();

        assert_eq!(library.all_ids(), vec!["CFX2"]);
        assert_eq!(library.label(), "Whitelist of 1 ids");
        assert_eq!(library.matching_static(&filters).len(), 1);
        assert_eq!(library.matching_static(&[]).len(), 1);
    }

    #[test]
    fn test_creation_errors() {
        let mut inputs = inputs();
        inputs.creation_records[1].submit_date = None;

        let err = HistoryLibrary::build(&inputs, &directory(), &[], &LibraryConfig::new()).unwrap_err();
        assert_eq!(err.to_string(), "entity CFX2: missing field submit_date");

        let config = LibraryConfig::new().ignore_creation_errors(true);
        let library = HistoryLibrary::build(&inputs, &directory(), &[], &config).unwrap();
        assert_eq!(library.failed_ids().to_vec(), vec!["CFX2".to_string()]);
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_rejected_duplicate_is_checked_again() {
        let inputs = LibraryInputs::new(
            vec![
                CreationRecord::new("CFX1", at(2020, 1, 1), "Alice", Role::Ats).with_project("FR_NEXTEO"),
                CreationRecord::new("CFX1", at(2020, 1, 1), "Alice", Role::Ats).with_project("KVB"),
            ],
            vec![],
            vec![],
        );
        let kvb = FieldFilter::builder(EntityField::Project)
            .accepted_values([FieldValue::Text("KVB".to_string())])
            .build()
            .unwrap();
        let filters: Vec<Box<dyn StaticFilter>> = vec![Box::new(kvb)];

        let library =
            HistoryLibrary::build(&inputs, &directory(), &filters, &LibraryConfig::new()).unwrap();
        assert_eq!(library.all_ids(), vec!["CFX1"]);
        assert_eq!(library.get_by_id("CFX1").unwrap().project(), "KVB");
        assert_eq!(filters[0].cache_hits(), 0);
    }
}
