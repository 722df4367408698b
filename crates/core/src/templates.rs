use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::json_store::{read_document, write_document, JsonStoreError};
use crate::settings::{default_config_dir, SettingsError};

pub const TEMPLATES_FILE_NAME: &str = "templates.json";

const BUILTIN_TEMPLATES: [(&str, &str); 12] = [
    ("Select All", "SELECT * FROM table_name LIMIT 100;"),
    (
        "Select with Where",
        "SELECT column1, column2\nFROM table_name\nWHERE condition;",
    ),
    (
        "Inner Join",
        "SELECT a.*, b.*\nFROM table1 a\nINNER JOIN table2 b ON a.id = b.foreign_id;",
    ),
    (
        "Left Join",
        "SELECT a.*, b.*\nFROM table1 a\nLEFT JOIN table2 b ON a.id = b.foreign_id;",
    ),
    (
        "Group By with Count",
        "SELECT column1, COUNT(*) AS count\nFROM table_name\nGROUP BY column1\nORDER BY count DESC;",
    ),
    (
        "Subquery",
        "SELECT *\nFROM table1\nWHERE column1 IN (\n    SELECT column1 FROM table2 WHERE condition\n);",
    ),
    (
        "Union",
        "SELECT column1 FROM table1\nUNION\nSELECT column1 FROM table2;",
    ),
    (
        "Insert",
        "INSERT INTO table_name (column1, column2)\nVALUES (value1, value2);",
    ),
    (
        "Update",
        "UPDATE table_name\nSET column1 = value1\nWHERE condition;",
    ),
    ("Delete", "DELETE FROM table_name\nWHERE condition;"),
    (
        "Create Table",
        "CREATE TABLE table_name (\n    id INTEGER PRIMARY KEY AUTOINCREMENT,\n    name TEXT NOT NULL,\n    created_at TEXT DEFAULT CURRENT_TIMESTAMP\n);",
    ),
    (
        "Create Index",
        "CREATE INDEX idx_table_column ON table_name (column1);",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateOrigin {
    BuiltIn,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    pub name: String,
    pub sql: String,
    pub origin: TemplateOrigin,
}

#[derive(Debug, Error)]
pub enum TemplatesError {
    #[error("failed to resolve config directory: {0}")]
    Config(#[from] SettingsError),
    #[error("template name cannot be empty")]
    EmptyName,
    #[error("template `{0}` is built in and cannot be deleted")]
    BuiltInTemplate(String),
    #[error("template `{0}` does not exist")]
    UnknownTemplate(String),
    #[error(transparent)]
    Store(#[from] JsonStoreError),
}

/// Built-in templates merged with the user's `templates.json`. User entries
/// shadow built-ins of the same name.
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    path: PathBuf,
    user: BTreeMap<String, String>,
}

impl TemplateLibrary {
    pub fn load_default() -> Result<Self, TemplatesError> {
        Self::load_from_path(default_config_dir()?.join(TEMPLATES_FILE_NAME))
    }

    pub fn load_from_path(path: impl Into<PathBuf>) -> Result<Self, TemplatesError> {
        let path = path.into();
        let user: BTreeMap<String, String> = read_document(&path)?;
        Ok(Self { path, user })
    }

    #[must_use]
    pub fn builtin_only(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            user: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.user.get(name).map(String::as_str).or_else(|| {
            BUILTIN_TEMPLATES
                .iter()
                .find(|(builtin, _)| *builtin == name)
                .map(|(_, sql)| *sql)
        })
    }

    /// All templates sorted by name.
    #[must_use]
    pub fn templates(&self) -> Vec<QueryTemplate> {
        let mut merged = BTreeMap::new();
        for (name, sql) in BUILTIN_TEMPLATES {
            merged.insert(
                name.to_string(),
                QueryTemplate {
                    name: name.to_string(),
                    sql: sql.to_string(),
                    origin: TemplateOrigin::BuiltIn,
                },
            );
        }
        for (name, sql) in &self.user {
            merged.insert(
                name.clone(),
                QueryTemplate {
                    name: name.clone(),
                    sql: sql.clone(),
                    origin: TemplateOrigin::User,
                },
            );
        }
        merged.into_values().collect()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.templates()
            .into_iter()
            .map(|template| template.name)
            .collect()
    }

    pub fn upsert_user(
        &mut self,
        name: impl Into<String>,
        sql: impl Into<String>,
    ) -> Result<(), TemplatesError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TemplatesError::EmptyName);
        }
        self.user.insert(name, sql.into());
        Ok(())
    }

    pub fn delete_user(&mut self, name: &str) -> Result<(), TemplatesError> {
        if self.user.remove(name).is_some() {
            return Ok(());
        }
        if is_builtin(name) {
            return Err(TemplatesError::BuiltInTemplate(name.to_string()));
        }
        Err(TemplatesError::UnknownTemplate(name.to_string()))
    }

    pub fn persist(&self) -> Result<(), TemplatesError> {
        write_document(&self.path, &self.user)?;
        tracing::debug!(path = %self.path.display(), "templates persisted");
        Ok(())
    }
}

fn is_builtin(name: &str) -> bool {
    BUILTIN_TEMPLATES.iter().any(|(builtin, _)| *builtin == name)
}
