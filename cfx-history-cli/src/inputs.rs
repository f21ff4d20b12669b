//! Record and user-directory loading

use anyhow::{Context, Result};
use cfx_history::{LibraryInputs, UserDirectory};
use std::fs;
use std::path::{Path, PathBuf};

/// Read every JSON record file and concatenate their record lists, in file order
pub fn load_inputs(paths: &[PathBuf]) -> Result<LibraryInputs> {
    let mut merged = LibraryInputs::default();

    for path in paths {
        log::info!("Loading records: {:?}", path);
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read record file: {:?}", path))?;
        let inputs: LibraryInputs = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse record file: {:?}", path))?;

        log::debug!(
            "{:?}: {} creation, {} state change, {} owner change records",
            path,
            inputs.creation_records.len(),
            inputs.state_change_records.len(),
            inputs.owner_change_records.len()
        );
        merged.creation_records.extend(inputs.creation_records);
        merged.state_change_records.extend(inputs.state_change_records);
        merged.owner_change_records.extend(inputs.owner_change_records);
    }

    Ok(merged)
}

/// Load the user directory, or an empty one when no file is configured
pub fn load_directory(path: Option<&Path>) -> Result<UserDirectory> {
    match path {
        Some(path) => UserDirectory::from_file(path)
            .with_context(|| format!("Failed to load user directory: {:?}", path)),
        None => {
            log::warn!("No user directory configured, every owner has role TBD");
            Ok(UserDirectory::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfx_history::Role;

    #[test]
    fn test_records_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");
        fs::write(
            &first,
            r#"{"creation_records": [{"id": "CFX1", "state": "Submitted",
                "system_structure_subsystem": "ATS", "submit_date": "2021-01-04T10:00:00",
                "current_owner": "Alice"}]}"#,
        )
        .unwrap();
        fs::write(
            &second,
            r#"{"state_change_records": [{"entity_id": "CFX1", "old_state_raw": "No Value",
                "new_state_raw": "Submitted", "action": "Submit",
                "timestamp": "2021-01-04T10:00:00"}]}"#,
        )
        .unwrap();

        let inputs = load_inputs(&[first, second]).unwrap();
        assert_eq!(inputs.creation_records.len(), 1);
        assert_eq!(inputs.state_change_records.len(), 1);
        assert!(inputs.owner_change_records.is_empty());
    }

    #[test]
    fn test_bad_json_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_inputs(&[path]).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_directory_is_optional() {
        assert!(load_directory(None).unwrap().is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.tsv");
        fs::write(&path, "Alice\tATS\n").unwrap();
        let directory = load_directory(Some(&path)).unwrap();
        assert_eq!(directory.get("alice").unwrap().role, Role::Ats);
    }
}
