//! Report generation
//!
//! Renders one aggregation run as a TXT table (one row per timestamp, one column per
//! state observed during the run) or as pretty JSON.

use crate::config::OutputFormat;
use anyhow::{Context, Result};
use cfx_history::AllResultsPerDates;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// One named query result, as rendered in a report
#[derive(Debug, Serialize)]
pub struct QueryReport<'a> {
    pub name: &'a str,
    pub library: &'a str,
    pub results: &'a AllResultsPerDates,
}

impl QueryReport<'_> {
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Txt => Ok(self.render_txt()),
            OutputFormat::Json => {
                serde_json::to_string_pretty(self).context("Failed to serialize report")
            }
        }
    }

    pub fn render_txt(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== {} ===", self.name);
        if !self.library.is_empty() {
            let _ = writeln!(out, "Library: {}", self.library);
        }
        let _ = writeln!(out, "Matched entities: {}", self.results.matched_ids().len());

        let states = self.results.present_states_ordered();
        if self.results.timestamp_results().is_empty() {
            let _ = writeln!(out, "No data");
            return out;
        }

        let widths: Vec<usize> = states
            .iter()
            .map(|state| state.as_str().len().max(5))
            .collect();

        let _ = write!(out, "{:<16}", "Date");
        for (state, width) in states.iter().zip(&widths) {
            let _ = write!(out, " | {:>width$}", state.as_str(), width = width);
        }
        let _ = writeln!(out, " | {:>5}", "Total");

        for result in self.results.timestamp_results() {
            let _ = write!(out, "{:<16}", result.timestamp.format(DATE_FORMAT).to_string());
            for (state, width) in states.iter().zip(&widths) {
                let _ = write!(out, " | {:>width$}", result.count(*state), width = width);
            }
            let _ = writeln!(out, " | {:>5}", result.total());
        }

        out
    }
}

/// Where a report goes: an explicit file, a file in the output directory, or stdout
pub fn destination(
    output_override: Option<&Path>,
    output_dir: Option<&Path>,
    name: &str,
    format: OutputFormat,
) -> Option<PathBuf> {
    if let Some(path) = output_override {
        return Some(path.to_path_buf());
    }
    output_dir.map(|dir| dir.join(format!("{}.{}", file_stem(name), format.extension())))
}

/// Query name reduced to a portable file name
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Write (or print) rendered reports; several reports to one file are concatenated
pub fn write_reports(reports: &[(Option<PathBuf>, String)]) -> Result<()> {
    let mut by_path: Vec<(PathBuf, String)> = Vec::new();

    for (path, content) in reports {
        match path {
            None => println!("{}", content),
            Some(path) => match by_path.iter_mut().find(|(existing, _)| existing == path) {
                Some((_, buffer)) => {
                    buffer.push('\n');
                    buffer.push_str(content);
                }
                None => by_path.push((path.clone(), content.clone())),
            },
        }
    }

    for (path, content) in by_path {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write report: {:?}", path))?;
        log::info!("Report written: {:?}", path);
    }

    Ok(())
}
