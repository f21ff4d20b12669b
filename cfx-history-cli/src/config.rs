//! Configuration loading and parsing

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub library: LibrarySection,
    #[serde(default)]
    pub dates: DatesConfig,
    #[serde(default)]
    pub queries: Vec<QueryConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    /// JSON files holding `creation_records` / `state_change_records` / `owner_change_records`
    pub records: Vec<PathBuf>,
    /// Tab-separated `name<TAB>subsystem` file; every owner gets role TBD without it
    pub users: Option<PathBuf>,
}

/// Static filters applied while the library is built
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LibrarySection {
    #[serde(default)]
    pub ignore_creation_errors: bool,
    pub label: Option<String>,
    pub whitelist: Option<WhitelistConfig>,
    #[serde(default)]
    pub fields: Vec<FieldFilterConfig>,
    #[serde(default)]
    pub role_at: Vec<RoleAtDateConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WhitelistConfig {
    #[serde(default)]
    pub ids: Vec<String>,
    pub file: Option<PathBuf>,
}

/// Owner role required at one fixed date
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoleAtDateConfig {
    pub date: NaiveDateTime,
    pub roles: Vec<String>,
}

/// One field filter; exactly one of the four lists is expected
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldFilterConfig {
    pub field: String,
    #[serde(default)]
    pub accepted: Vec<String>,
    #[serde(default)]
    pub forbidden: Vec<String>,
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(default)]
    pub not_contains: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DatesConfig {
    #[default]
    Decreasing,
    Constant {
        #[serde(default)]
        months: u32,
        #[serde(default)]
        days: u32,
    },
    Fixed {
        dates: Vec<NaiveDateTime>,
    },
}

/// One aggregation run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    pub name: String,
    /// Allowed owner roles at each sampled date (no role filter when empty)
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldFilterConfig>,
    #[serde(default)]
    pub role_at: Vec<RoleAtDateConfig>,
    pub whitelist: Option<WhitelistConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Json => "json",
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
