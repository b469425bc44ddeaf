//! # Tabulation
//!
//! Flattens extracted modules into one row per module and writes them as a
//! comma-delimited table with a header row.
//!
//! Derived columns:
//!
//! - `module_context_length`: length of the module text in characters
//! - `comments`: the module's comments as a JSON array string

use std::path::Path;

use serde::{Deserialize, Serialize, Serializer};
use tracing::{info, instrument};

use crate::error::Result;
use crate::extract::extract_comments;

/// A downloaded file and the modules found in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFile {
    pub repository: String,
    pub file_name: String,
    pub file_path: String,
    pub html_url: String,
    pub modules: Vec<String>,
}

/// One table row, describing a single module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleRow {
    pub repository: String,
    pub file_name: String,
    pub file_path: String,
    pub html_url: String,
    pub module: String,
    pub module_context_length: usize,
    #[serde(serialize_with = "as_json_array")]
    pub comments: Vec<String>,
}

fn as_json_array<S: Serializer>(comments: &[String], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let json = serde_json::to_string(comments).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&json)
}

/// Column names, in output order
pub const COLUMNS: [&str; 7] = [
    "repository",
    "file_name",
    "file_path",
    "html_url",
    "module",
    "module_context_length",
    "comments",
];

/// Build one row per module, in input order
pub fn make_rows(files: &[ModuleFile]) -> Vec<ModuleRow> {
    files
        .iter()
        .flat_map(|file| {
            file.modules.iter().map(move |module| ModuleRow {
                repository: file.repository.clone(),
                file_name: file.file_name.clone(),
                file_path: file.file_path.clone(),
                html_url: file.html_url.clone(),
                module: module.clone(),
                module_context_length: module.chars().count(),
                comments: extract_comments(module),
            })
        })
        .collect()
}

/// Write rows as CSV, creating parent directories as needed
#[instrument(skip(rows), fields(rows = rows.len()))]
pub fn write_csv(path: &Path, rows: &[ModuleRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}
