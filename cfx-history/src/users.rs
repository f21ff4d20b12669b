//! Owners and the directory resolving owner names to roles

use crate::types::{HistoryError, Result};
use crate::vocabulary::{Decoded, Role};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Name used for owners that could not be identified
pub const UNKNOWN_OWNER_NAME: &str = "Unknown";

/// A person that can own a change request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Owner {
    pub full_name: String,
    pub role: Role,
}

impl Owner {
    pub fn new(full_name: impl Into<String>, role: Role) -> Self {
        Self {
            full_name: full_name.into(),
            role,
        }
    }
}

/// Keep only the display name of a history export owner field (`"Jane Doe (jdoe)"` → `"Jane Doe"`)
pub fn clean_owner_name(raw: &str) -> &str {
    raw.split('(').next().unwrap_or("").trim()
}

/// Case-insensitive directory of known owners
pub struct UserDirectory {
    by_lower_name: HashMap<String, Arc<Owner>>,
    unknown_owner: Arc<Owner>,
}

impl UserDirectory {
    /// Create an empty directory (every name resolves to role `TBD`)
    pub fn new() -> Self {
        Self {
            by_lower_name: HashMap::new(),
            unknown_owner: Arc::new(Owner::new(UNKNOWN_OWNER_NAME, Role::Tbd)),
        }
    }

    /// Parse a directory from tab-separated `name<TAB>subsystem` lines
    pub fn from_tsv(content: &str) -> Result<Self> {
        let mut directory = Self::new();

        for (line_number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let (raw_name, raw_subsystem) = line.split_once('\t').ok_or_else(|| {
                HistoryError::UserDirectory(format!(
                    "line {}: expected 'name<TAB>subsystem', got '{}'",
                    line_number + 1,
                    line
                ))
            })?;

            let role = match Role::decode(&normalize_subsystem_text(raw_subsystem)) {
                Decoded::Known(role) => role,
                Decoded::Unrecognized(text) => {
                    return Err(HistoryError::UserDirectory(format!(
                        "line {}: unknown subsystem '{}'",
                        line_number + 1,
                        text
                    )))
                }
            };

            directory.add(Owner::new(raw_name.trim(), role));
        }

        log::info!("User directory loaded with {} owners", directory.len());
        Ok(directory)
    }

    /// Load a directory from a tab-separated text file
    pub fn from_file(path: &Path) -> Result<Self> {
        log::info!("Loading user directory: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_tsv(&content)
    }

    /// Register an owner, replacing any owner with the same name
    pub fn add(&mut self, owner: Owner) -> Arc<Owner> {
        let owner = Arc::new(owner);
        self.by_lower_name
            .insert(owner.full_name.to_lowercase(), Arc::clone(&owner));
        owner
    }

    /// Look up a known owner by name
    pub fn get(&self, full_name: &str) -> Option<Arc<Owner>> {
        self.by_lower_name.get(&full_name.trim().to_lowercase()).cloned()
    }

    /// Resolve a name, creating a `TBD` owner for names missing from the directory
    pub fn resolve(&self, full_name: &str) -> Arc<Owner> {
        if full_name.trim().is_empty() {
            return self.unknown_owner();
        }
        self.get(full_name).unwrap_or_else(|| {
            log::warn!("Owner '{}' not in user directory, role set to {}", full_name, Role::Tbd);
            Arc::new(Owner::new(full_name.trim(), Role::Tbd))
        })
    }

    /// Sentinel owner used when the export does not name anyone
    pub fn unknown_owner(&self) -> Arc<Owner> {
        Arc::clone(&self.unknown_owner)
    }

    pub fn len(&self) -> usize {
        self.by_lower_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_lower_name.is_empty()
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_subsystem_text(raw: &str) -> String {
    raw.trim()
        .replace(['(', ')'], "")
        .replace(['é', 'è'], "e")
        .replace([' ', '-'], "_")
        .to_uppercase()
}
