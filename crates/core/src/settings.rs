use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_DIR_ENV: &str = "SQLB_CONFIG_DIR";
pub const MAX_RECENT_DATABASES: usize = 10;

const SETTINGS_FILE_NAME: &str = "settings.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FormatterSettings {
    pub indent_width: u8,
    pub uppercase_keywords: bool,
    pub lines_between_queries: u8,
}

impl Default for FormatterSettings {
    fn default() -> Self {
        Self {
            indent_width: 4,
            uppercase_keywords: true,
            lines_between_queries: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppSettings {
    pub preview_limit: usize,
    pub result_buffer_capacity: usize,
    pub rows_per_tick: usize,
    pub safe_mode: bool,
    pub history_limit: Option<usize>,
    pub log_filter: String,
    pub recent_databases: Vec<String>,
    pub formatter: FormatterSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            preview_limit: 200,
            result_buffer_capacity: 5_000,
            rows_per_tick: 250,
            safe_mode: true,
            history_limit: None,
            log_filter: "info".to_string(),
            recent_databases: Vec::new(),
            formatter: FormatterSettings::default(),
        }
    }
}

impl AppSettings {
    /// Moves `database` to the front of the recent list, capped at
    /// [`MAX_RECENT_DATABASES`].
    pub fn remember_database(&mut self, database: impl Into<String>) {
        let database = database.into();
        self.recent_databases.retain(|existing| existing != &database);
        self.recent_databases.insert(0, database);
        self.recent_databases.truncate(MAX_RECENT_DATABASES);
    }

    fn normalize(&mut self) {
        if self.preview_limit == 0 {
            self.preview_limit = Self::default().preview_limit;
        }
        if self.result_buffer_capacity == 0 {
            self.result_buffer_capacity = Self::default().result_buffer_capacity;
        }
        if self.rows_per_tick == 0 {
            self.rows_per_tick = Self::default().rows_per_tick;
        }
        let mut seen = std::collections::HashSet::new();
        self.recent_databases
            .retain(|database| seen.insert(database.clone()));
        self.recent_databases.truncate(MAX_RECENT_DATABASES);
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("config directory is unavailable for this platform")]
    ConfigDirUnavailable,
    #[error("failed to read settings file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to create config directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {source}")]
    Serialize {
        #[source]
        source: toml::ser::Error,
    },
    #[error("failed to write settings file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
    settings: AppSettings,
}

impl FileSettingsStore {
    pub fn load_default() -> Result<Self, SettingsError> {
        Self::load_from_dir(default_config_dir()?)
    }

    pub fn load_from_dir(config_dir: impl AsRef<Path>) -> Result<Self, SettingsError> {
        Self::load_from_path(config_dir.as_ref().join(SETTINGS_FILE_NAME))
    }

    pub fn load_from_path(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                settings: AppSettings::default(),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;

        if raw.trim().is_empty() {
            return Ok(Self {
                path,
                settings: AppSettings::default(),
            });
        }

        let mut settings: AppSettings =
            toml::from_str(&raw).map_err(|source| SettingsError::Parse {
                path: path.clone(),
                source,
            })?;
        settings.normalize();

        Ok(Self { path, settings })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut AppSettings {
        &mut self.settings
    }

    pub fn persist(&self) -> Result<(), SettingsError> {
        if let Some(parent_dir) = self.path.parent() {
            fs::create_dir_all(parent_dir).map_err(|source| SettingsError::CreateDir {
                path: parent_dir.to_path_buf(),
                source,
            })?;
        }

        let rendered = toml::to_string_pretty(&self.settings)
            .map_err(|source| SettingsError::Serialize { source })?;

        fs::write(&self.path, rendered).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), "settings persisted");
        Ok(())
    }
}

/// Resolves the directory holding settings, history, favorites, templates
/// and logs.
pub fn default_config_dir() -> Result<PathBuf, SettingsError> {
    if let Some(custom) = env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(custom));
    }

    let base_dir = if cfg!(target_os = "windows") {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .ok_or(SettingsError::ConfigDirUnavailable)?
    } else if let Some(xdg_config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home)
    } else {
        let home = env::var_os("HOME").ok_or(SettingsError::ConfigDirUnavailable)?;
        PathBuf::from(home).join(".config")
    };

    Ok(base_dir.join("sqlb"))
}
