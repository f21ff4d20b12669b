//! Whitelist filter: restricts matches to an explicit set of entity ids

use super::{FilterCache, StaticFilter};
use crate::entity::Entity;
use crate::types::{HistoryError, Result};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug)]
pub struct WhitelistFilter {
    ids: HashSet<String>,
    source_name: Option<String>,
    cache: FilterCache,
}

impl WhitelistFilter {
    /// Whitelist from a literal set of ids
    pub fn from_ids<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            source_name: None,
            cache: FilterCache::new(),
        }
    }

    /// Whitelist from a text file with one id per line (blank lines ignored)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| HistoryError::WhitelistLoad {
            path: path.to_path_buf(),
            source,
        })?;

        let ids: HashSet<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        log::info!("Whitelist {:?} loaded with {} ids", path, ids.len());

        let source_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());

        Ok(Self {
            ids,
            source_name,
            cache: FilterCache::new(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> &HashSet<String> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl StaticFilter for WhitelistFilter {
    fn label(&self) -> String {
        match &self.source_name {
            Some(name) => format!("Whitelist {}", name),
            None => format!("Whitelist of {} ids", self.ids.len()),
        }
    }

    fn match_without_cache(&self, entity: &Entity) -> bool {
        self.contains(entity.id())
    }

    fn cache(&self) -> &FilterCache {
        &self.cache
    }

    fn accepts_id(&self, id: &str) -> bool {
        self.contains(id)
    }
}
