use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{LoanbookError, Result};

pub const SETTINGS_FILE: &str = "app_settings.json";
pub const RULES_FILE: &str = "status2_map.json";
pub const DEFAULT_SHEET: &str = "Лист1";

#[derive(Debug, Clone, Deserialize)]
pub struct RunSettings {
    #[serde(default)]
    pub files: Option<Vec<String>>,
    #[serde(default)]
    pub file1: Option<String>,
    #[serde(default)]
    pub file2: Option<String>,
    #[serde(rename = "поточнадата", alias = "reporting_date")]
    pub reporting_date: String,
    #[serde(default = "default_sheet")]
    pub sheet_name: String,
}

fn default_sheet() -> String {
    DEFAULT_SHEET.to_string()
}

impl RunSettings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LoanbookError::SettingsNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(content.trim_start_matches('\u{feff}'))
            .map_err(|e| LoanbookError::InvalidSettings {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        tracing::debug!(path = %path.display(), "loaded run settings");
        Ok(settings)
    }

    /// Input files in configured order. `files` wins over the legacy
    /// `file1`/`file2` pair.
    pub fn input_files(&self) -> Vec<PathBuf> {
        match &self.files {
            Some(files) => files.iter().map(PathBuf::from).collect(),
            None => [&self.file1, &self.file2]
                .into_iter()
                .flatten()
                .filter(|f| !f.trim().is_empty())
                .map(PathBuf::from)
                .collect(),
        }
    }

    pub fn reporting_date(&self) -> Result<NaiveDate> {
        parse_reporting_date(&self.reporting_date)
    }
}

pub fn parse_reporting_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%d.%m.%Y")
        .map_err(|_| LoanbookError::InvalidDate(raw.to_string()))
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("loanbook")
}

/// Explicit path if given, else `name` in the working directory, else
/// `name` under the config directory. When nothing exists the
/// working-directory path is returned so the error names it.
pub fn resolve_config_path(explicit: Option<&Path>, name: &str) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let local = PathBuf::from(name);
    if local.exists() {
        return local;
    }
    let global = config_dir().join(name);
    if global.exists() {
        return global;
    }
    local
}
