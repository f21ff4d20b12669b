//! Field filters: membership or containment tests on one typed entity attribute

use super::{FilterCache, StaticFilter};
use crate::entity::Entity;
use crate::types::{HistoryError, Result};
use crate::vocabulary::{Category, Decoded, RejectionCause, RequestType, Role, SecurityRelevance, State};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Entity attributes a field filter can read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityField {
    Project,
    Category,
    RequestType,
    SafetyRelevant,
    SecurityRelevant,
    Subsystem,
    ConfigUnit,
    RejectionCause,
    CurrentState,
}

/// Typed value of an [`EntityField`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    Text(String),
    Category(Category),
    RequestType(RequestType),
    Flag(Option<bool>),
    Security(SecurityRelevance),
    Role(Role),
    RejectionCause(Option<RejectionCause>),
    State(State),
}

impl EntityField {
    pub const ALL: [EntityField; 9] = [
        EntityField::Project,
        EntityField::Category,
        EntityField::RequestType,
        EntityField::SafetyRelevant,
        EntityField::SecurityRelevant,
        EntityField::Subsystem,
        EntityField::ConfigUnit,
        EntityField::RejectionCause,
        EntityField::CurrentState,
    ];

    /// Configuration key of the field
    pub fn name(&self) -> &'static str {
        match self {
            EntityField::Project => "project",
            EntityField::Category => "category",
            EntityField::RequestType => "request_type",
            EntityField::SafetyRelevant => "safety_relevant",
            EntityField::SecurityRelevant => "security_relevant",
            EntityField::Subsystem => "subsystem",
            EntityField::ConfigUnit => "config_unit",
            EntityField::RejectionCause => "rejection_cause",
            EntityField::CurrentState => "current_state",
        }
    }

    /// Read the field from an entity
    pub fn extract(&self, entity: &Entity) -> FieldValue {
        match self {
            EntityField::Project => FieldValue::Text(entity.project().to_string()),
            EntityField::Category => FieldValue::Category(entity.category()),
            EntityField::RequestType => FieldValue::RequestType(entity.request_type()),
            EntityField::SafetyRelevant => FieldValue::Flag(entity.safety_relevant()),
            EntityField::SecurityRelevant => FieldValue::Security(entity.security_relevant()),
            EntityField::Subsystem => FieldValue::Role(entity.subsystem()),
            EntityField::ConfigUnit => FieldValue::Text(entity.config_unit().to_string()),
            EntityField::RejectionCause => FieldValue::RejectionCause(entity.rejection_cause()),
            EntityField::CurrentState => FieldValue::State(entity.current_state()),
        }
    }

    /// Parse configuration text into a value of this field's type
    ///
    /// Unlike record decoding there is no fallback: a typo in a filter is an error.
    pub fn parse_value(&self, text: &str) -> Result<FieldValue> {
        let value = match self {
            EntityField::Project | EntityField::ConfigUnit => FieldValue::Text(text.trim().to_string()),
            EntityField::Category => FieldValue::Category(self.known(Category::decode(text))?),
            EntityField::RequestType => FieldValue::RequestType(self.known(RequestType::decode(text))?),
            EntityField::SafetyRelevant => FieldValue::Flag(self.parse_flag(text)?),
            EntityField::SecurityRelevant => {
                FieldValue::Security(self.known(SecurityRelevance::decode(text))?)
            }
            EntityField::Subsystem => FieldValue::Role(self.known(Role::decode(text))?),
            EntityField::RejectionCause => {
                if text.trim().is_empty() {
                    FieldValue::RejectionCause(None)
                } else {
                    FieldValue::RejectionCause(Some(self.known(RejectionCause::decode(text))?))
                }
            }
            EntityField::CurrentState => FieldValue::State(self.known(State::decode(text))?),
        };
        Ok(value)
    }

    /// True when `value` has the type this field produces
    fn accepts(&self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (EntityField::Project | EntityField::ConfigUnit, FieldValue::Text(_))
                | (EntityField::Category, FieldValue::Category(_))
                | (EntityField::RequestType, FieldValue::RequestType(_))
                | (EntityField::SafetyRelevant, FieldValue::Flag(_))
                | (EntityField::SecurityRelevant, FieldValue::Security(_))
                | (EntityField::Subsystem, FieldValue::Role(_))
                | (EntityField::RejectionCause, FieldValue::RejectionCause(_))
                | (EntityField::CurrentState, FieldValue::State(_))
        )
    }

    fn known<T>(&self, decoded: Decoded<T>) -> Result<T> {
        match decoded {
            Decoded::Known(value) => Ok(value),
            Decoded::Unrecognized(text) => Err(HistoryError::InvalidFilter(format!(
                "'{}' is not a valid {} value",
                text, self
            ))),
        }
    }

    fn parse_flag(&self, text: &str) -> Result<Option<bool>> {
        match text.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            "" | "none" | "unknown" => Ok(None),
            other => Err(HistoryError::InvalidFilter(format!(
                "'{}' is not a valid {} value",
                other, self
            ))),
        }
    }
}

impl fmt::Display for EntityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EntityField::Project => "Project",
            EntityField::Category => "Category",
            EntityField::RequestType => "Request type",
            EntityField::SafetyRelevant => "Safety relevant",
            EntityField::SecurityRelevant => "Security relevant",
            EntityField::Subsystem => "Subsystem",
            EntityField::ConfigUnit => "Config unit",
            EntityField::RejectionCause => "Rejection cause",
            EntityField::CurrentState => "Current state",
        };
        f.write_str(text)
    }
}

impl FromStr for EntityField {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace([' ', '-'], "_");
        EntityField::ALL
            .iter()
            .find(|field| field.name() == wanted)
            .copied()
            .ok_or_else(|| HistoryError::InvalidFilter(format!("unsupported field '{}'", s)))
    }
}

impl FieldValue {
    /// Text form used for substring criteria
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(text) => Cow::Borrowed(text),
            FieldValue::Category(value) => Cow::Borrowed(value.as_str()),
            FieldValue::RequestType(value) => Cow::Borrowed(value.as_str()),
            FieldValue::Flag(Some(flag)) => Cow::Owned(flag.to_string()),
            FieldValue::Flag(None) => Cow::Borrowed(""),
            FieldValue::Security(value) => Cow::Borrowed(value.as_str()),
            FieldValue::Role(value) => Cow::Borrowed(value.as_str()),
            FieldValue::RejectionCause(Some(value)) => Cow::Borrowed(value.as_str()),
            FieldValue::RejectionCause(None) => Cow::Borrowed(""),
            FieldValue::State(value) => Cow::Borrowed(value.as_str()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

#[derive(Debug, Clone)]
enum Criterion {
    AcceptedValues(Vec<FieldValue>),
    ForbiddenValues(Vec<FieldValue>),
    AcceptedSubstrings(Vec<String>),
    ForbiddenSubstrings(Vec<String>),
}

/// Static filter on one entity attribute
#[derive(Debug)]
pub struct FieldFilter {
    field: EntityField,
    criterion: Criterion,
    cache: FilterCache,
}

impl FieldFilter {
    pub fn builder(field: EntityField) -> FieldFilterBuilder {
        FieldFilterBuilder::new(field)
    }

    pub fn field(&self) -> EntityField {
        self.field
    }
}

impl StaticFilter for FieldFilter {
    fn label(&self) -> String {
        let join = |items: Vec<String>| items.join(", ");
        match &self.criterion {
            Criterion::AcceptedValues(values) => format!(
                "{} among {}",
                self.field,
                join(values.iter().map(ToString::to_string).collect())
            ),
            Criterion::ForbiddenValues(values) => format!(
                "{} without {}",
                self.field,
                join(values.iter().map(ToString::to_string).collect())
            ),
            Criterion::AcceptedSubstrings(texts) => {
                format!("{} contains text {}", self.field, join(texts.clone()))
            }
            Criterion::ForbiddenSubstrings(texts) => {
                format!("{} does not contain {}", self.field, join(texts.clone()))
            }
        }
    }

    fn match_without_cache(&self, entity: &Entity) -> bool {
        let value = self.field.extract(entity);
        match &self.criterion {
            Criterion::AcceptedValues(values) => values.contains(&value),
            Criterion::ForbiddenValues(values) => !values.contains(&value),
            Criterion::AcceptedSubstrings(texts) => {
                let haystack = value.text();
                texts.iter().any(|text| haystack.contains(text.as_str()))
            }
            Criterion::ForbiddenSubstrings(texts) => {
                let haystack = value.text();
                !texts.iter().any(|text| haystack.contains(text.as_str()))
            }
        }
    }

    fn cache(&self) -> &FilterCache {
        &self.cache
    }
}

/// Collects the four possible criteria of a [`FieldFilter`]
///
/// Exactly one criterion is expected. If several are given the first non-empty one
/// wins, in the order accepted values, forbidden values, accepted substrings,
/// forbidden substrings.
#[derive(Debug, Clone)]
pub struct FieldFilterBuilder {
    field: EntityField,
    accepted_values: Vec<FieldValue>,
    forbidden_values: Vec<FieldValue>,
    accepted_substrings: Vec<String>,
    forbidden_substrings: Vec<String>,
}

impl FieldFilterBuilder {
    pub fn new(field: EntityField) -> Self {
        Self {
            field,
            accepted_values: Vec::new(),
            forbidden_values: Vec::new(),
            accepted_substrings: Vec::new(),
            forbidden_substrings: Vec::new(),
        }
    }

    pub fn accepted_values(mut self, values: impl IntoIterator<Item = FieldValue>) -> Self {
        self.accepted_values.extend(values);
        self
    }

    pub fn forbidden_values(mut self, values: impl IntoIterator<Item = FieldValue>) -> Self {
        self.forbidden_values.extend(values);
        self
    }

    pub fn accepted_substrings<S: Into<String>>(mut self, texts: impl IntoIterator<Item = S>) -> Self {
        self.accepted_substrings.extend(texts.into_iter().map(Into::into));
        self
    }

    pub fn forbidden_substrings<S: Into<String>>(mut self, texts: impl IntoIterator<Item = S>) -> Self {
        self.forbidden_substrings.extend(texts.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<FieldFilter> {
        let field = self.field;

        let supplied = [
            !self.accepted_values.is_empty(),
            !self.forbidden_values.is_empty(),
            !self.accepted_substrings.is_empty(),
            !self.forbidden_substrings.is_empty(),
        ]
        .iter()
        .filter(|present| **present)
        .count();
        if supplied > 1 {
            log::warn!("{} filter has {} criteria, only the first one is used", field, supplied);
        }

        let criterion = if !self.accepted_values.is_empty() {
            Criterion::AcceptedValues(check_kinds(field, self.accepted_values)?)
        } else if !self.forbidden_values.is_empty() {
            Criterion::ForbiddenValues(check_kinds(field, self.forbidden_values)?)
        } else if !self.accepted_substrings.is_empty() {
            Criterion::AcceptedSubstrings(self.accepted_substrings)
        } else if !self.forbidden_substrings.is_empty() {
            Criterion::ForbiddenSubstrings(self.forbidden_substrings)
        } else {
            return Err(HistoryError::InvalidFilter(format!(
                "{} filter has no criteria",
                field
            )));
        };

        Ok(FieldFilter {
            field,
            criterion,
            cache: FilterCache::new(),
        })
    }
}

fn check_kinds(field: EntityField, values: Vec<FieldValue>) -> Result<Vec<FieldValue>> {
    if let Some(wrong) = values.iter().find(|value| !field.accepts(value)) {
        return Err(HistoryError::InvalidFilter(format!(
            "{:?} cannot be compared with {}",
            wrong, field
        )));
    }
    Ok(values)
}
