//! Typed input records handed over by the ingestion layer
//!
//! Records are already parsed (timestamps, vocabulary values); the library only
//! validates that required fields are present when it builds an entity from them.

use crate::types::Timestamp;
use crate::vocabulary::{Category, RejectionCause, RequestType, Role, SecurityRelevance, State};
use serde::Deserialize;

/// Everything needed to create one entity
#[derive(Debug, Clone, Deserialize)]
pub struct CreationRecord {
    pub id: String,
    #[serde(default)]
    pub alternate_id: Option<String>,
    pub state: State,
    #[serde(default)]
    pub fixed_in_subsystem: Option<Role>,
    #[serde(default)]
    pub fixed_in_config_unit: String,
    #[serde(default)]
    pub system_structure_subsystem: Option<Role>,
    #[serde(default)]
    pub system_structure_config_unit: String,
    #[serde(default)]
    pub submit_date: Option<Timestamp>,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub safety_relevant: Option<bool>,
    #[serde(default = "default_security_relevance")]
    pub security_relevant: SecurityRelevance,
    #[serde(default)]
    pub rejection_cause: Option<RejectionCause>,
    #[serde(default = "default_category")]
    pub category: Category,
    #[serde(default)]
    pub current_owner: Option<String>,
    #[serde(default = "default_request_type")]
    pub request_type: RequestType,
}

impl CreationRecord {
    /// Create a record with the required fields set and neutral defaults elsewhere
    pub fn new(
        id: impl Into<String>,
        submit_date: Timestamp,
        current_owner: impl Into<String>,
        system_structure_subsystem: Role,
    ) -> Self {
        Self {
            id: id.into(),
            alternate_id: None,
            state: State::Submitted,
            fixed_in_subsystem: None,
            fixed_in_config_unit: String::new(),
            system_structure_subsystem: Some(system_structure_subsystem),
            system_structure_config_unit: String::new(),
            submit_date: Some(submit_date),
            project: String::new(),
            safety_relevant: None,
            security_relevant: default_security_relevance(),
            rejection_cause: None,
            category: default_category(),
            current_owner: Some(current_owner.into()),
            request_type: default_request_type(),
        }
    }

    /// Builder method: set the current state
    pub fn with_state(mut self, state: State) -> Self {
        self.state = state;
        self
    }

    /// Builder method: set the project name
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Builder method: set the category
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Builder method: set the request type
    pub fn with_request_type(mut self, request_type: RequestType) -> Self {
        self.request_type = request_type;
        self
    }

    /// Builder method: set where the fix was implemented
    pub fn with_fixed_in(mut self, subsystem: Option<Role>, config_unit: impl Into<String>) -> Self {
        self.fixed_in_subsystem = subsystem;
        self.fixed_in_config_unit = config_unit.into();
        self
    }

    /// Builder method: set the system-structure configuration unit text
    pub fn with_system_structure_config_unit(mut self, config_unit: impl Into<String>) -> Self {
        self.system_structure_config_unit = config_unit.into();
        self
    }

    /// Builder method: set the rejection cause
    pub fn with_rejection_cause(mut self, cause: RejectionCause) -> Self {
        self.rejection_cause = Some(cause);
        self
    }

    /// Builder method: set safety and security classification
    pub fn with_relevance(mut self, safety: Option<bool>, security: SecurityRelevance) -> Self {
        self.safety_relevant = safety;
        self.security_relevant = security;
        self
    }

    /// Builder method: set the legacy identifier
    pub fn with_alternate_id(mut self, alternate_id: impl Into<String>) -> Self {
        self.alternate_id = Some(alternate_id.into());
        self
    }
}

impl StateChangeRecord {
    pub fn new(
        entity_id: impl Into<String>,
        old_state_raw: &str,
        new_state_raw: &str,
        action: &str,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            old_state_raw: Some(old_state_raw.to_string()),
            new_state_raw: new_state_raw.to_string(),
            action: action.to_string(),
            timestamp,
        }
    }
}

impl OwnerChangeRecord {
    pub fn new(
        entity_id: impl Into<String>,
        previous_owner_name: &str,
        new_owner_name: &str,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            previous_owner_name: previous_owner_name.to_string(),
            new_owner_name: new_owner_name.to_string(),
            timestamp,
        }
    }
}

fn default_security_relevance() -> SecurityRelevance {
    SecurityRelevance::Undefined
}

fn default_category() -> Category {
    Category::NoCategoryDefined
}

fn default_request_type() -> RequestType {
    RequestType::ToBeClassified
}

/// One row of the state-change export; states are still export text
#[derive(Debug, Clone, Deserialize)]
pub struct StateChangeRecord {
    pub entity_id: String,
    #[serde(default)]
    pub old_state_raw: Option<String>,
    pub new_state_raw: String,
    pub action: String,
    pub timestamp: Timestamp,
}

/// One current-owner modification from the complete history export
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerChangeRecord {
    pub entity_id: String,
    pub previous_owner_name: String,
    pub new_owner_name: String,
    pub timestamp: Timestamp,
}

/// All records a library is built from
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryInputs {
    #[serde(default)]
    pub creation_records: Vec<CreationRecord>,
    #[serde(default)]
    pub state_change_records: Vec<StateChangeRecord>,
    #[serde(default)]
    pub owner_change_records: Vec<OwnerChangeRecord>,
}

impl LibraryInputs {
    pub fn new(
        creation_records: Vec<CreationRecord>,
        state_change_records: Vec<StateChangeRecord>,
        owner_change_records: Vec<OwnerChangeRecord>,
    ) -> Self {
        Self {
            creation_records,
            state_change_records,
            owner_change_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_record_deserialization() {
        let json = r#"{
            "id": "CFX00427036",
            "state": "Closed",
            "system_structure_subsystem": "ATS",
            "submit_date": "2019-04-08T09:23:09",
            "project": "FR_NEXTEO",
            "security_relevant": "Mitigated",
            "category": "Cosmetic",
            "current_owner": "Alice Martin"
        }"#;

        let record: CreationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.state, State::Closed);
        assert_eq!(record.system_structure_subsystem, Some(Role::Ats));
        assert_eq!(record.security_relevant, SecurityRelevance::Mitigated);
        assert_eq!(record.category, Category::ToBeClassified);
        assert_eq!(record.request_type, RequestType::ToBeClassified);
        assert!(record.fixed_in_subsystem.is_none());
        assert!(record.submit_date.is_some());
    }

    #[test]
    fn test_state_change_without_old_state() {
        let json = r#"{
            "entity_id": "CFX1",
            "new_state_raw": "Submitted",
            "action": "Submit",
            "timestamp": "2019-04-08T09:23:12"
        }"#;
        let record: StateChangeRecord = serde_json::from_str(json).unwrap();
        assert!(record.old_state_raw.is_none());
    }
}
