use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::json_store::{read_document, write_document, JsonStoreError};
use crate::settings::{default_config_dir, SettingsError};

pub const FAVORITES_FILE_NAME: &str = "favorites.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Favorite {
    pub name: String,
    pub query: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Favorite {
    #[must_use]
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            created_at: Utc::now(),
            description: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FavoritesError {
    #[error("failed to resolve config directory: {0}")]
    Config(#[from] SettingsError),
    #[error("favorite name cannot be empty")]
    EmptyName,
    #[error("favorite query cannot be empty")]
    EmptyQuery,
    #[error(transparent)]
    Store(#[from] JsonStoreError),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FavoritesDocument {
    #[serde(default)]
    favorites: Vec<Favorite>,
}

impl FavoritesDocument {
    fn normalize(&mut self) {
        let mut by_name = BTreeMap::new();
        for favorite in self.favorites.drain(..) {
            by_name.insert(favorite.name.clone(), favorite);
        }
        self.favorites = by_name.into_values().collect();
    }
}

#[derive(Debug, Clone)]
pub struct FileFavoritesStore {
    path: PathBuf,
    favorites: Vec<Favorite>,
}

impl FileFavoritesStore {
    pub fn load_default() -> Result<Self, FavoritesError> {
        Self::load_from_path(default_config_dir()?.join(FAVORITES_FILE_NAME))
    }

    pub fn load_from_path(path: impl Into<PathBuf>) -> Result<Self, FavoritesError> {
        let path = path.into();
        let mut doc: FavoritesDocument = read_document(&path)?;
        doc.normalize();

        Ok(Self {
            path,
            favorites: doc.favorites,
        })
    }

    #[must_use]
    pub fn empty_at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            favorites: Vec::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Favorites sorted by name.
    #[must_use]
    pub fn favorites(&self) -> &[Favorite] {
        &self.favorites
    }

    #[must_use]
    pub fn favorite(&self, name: &str) -> Option<&Favorite> {
        self.favorites.iter().find(|favorite| favorite.name == name)
    }

    pub fn upsert(&mut self, favorite: Favorite) -> Result<(), FavoritesError> {
        if favorite.name.trim().is_empty() {
            return Err(FavoritesError::EmptyName);
        }
        if favorite.query.trim().is_empty() {
            return Err(FavoritesError::EmptyQuery);
        }

        if let Some(existing) = self
            .favorites
            .iter_mut()
            .find(|existing| existing.name == favorite.name)
        {
            *existing = favorite;
        } else {
            self.favorites.push(favorite);
            self.favorites.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        }
        Ok(())
    }

    #[must_use]
    pub fn delete(&mut self, name: &str) -> bool {
        let original_len = self.favorites.len();
        self.favorites.retain(|favorite| favorite.name != name);
        self.favorites.len() != original_len
    }

    /// First `favorite-N` name not already taken.
    #[must_use]
    pub fn next_default_name(&self) -> String {
        (1..)
            .map(|index| format!("favorite-{index}"))
            .find(|candidate| self.favorite(candidate).is_none())
            .unwrap_or_else(|| "favorite".to_string())
    }

    pub fn persist(&self) -> Result<(), FavoritesError> {
        let doc = FavoritesDocument {
            favorites: self.favorites.clone(),
        };
        write_document(&self.path, &doc)?;
        tracing::debug!(path = %self.path.display(), "favorites persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::{Favorite, FavoritesError, FileFavoritesStore};

    fn temp_favorites_path(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join("favorites.json")
    }

    #[test]
    fn missing_favorites_file_loads_empty_store() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let store = FileFavoritesStore::load_from_path(temp_favorites_path(&temp_dir))
            .expect("failed to load store");
        assert!(store.favorites().is_empty());
    }

    #[test]
    fn upsert_persist_reload_and_delete_favorite() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_favorites_path(&temp_dir);

        let mut store = FileFavoritesStore::load_from_path(&path).expect("failed to load");
        let mut favorite = Favorite::new("active-users", "SELECT * FROM \"users\" LIMIT 200");
        favorite.description = Some("users seen this week".to_string());
        store.upsert(favorite.clone()).expect("upsert should succeed");
        store.persist().expect("failed to persist store");

        let mut reloaded = FileFavoritesStore::load_from_path(&path).expect("reload");
        let loaded = reloaded
            .favorite("active-users")
            .expect("missing favorite after save");
        assert_eq!(loaded, &favorite);

        let mut updated = loaded.clone();
        updated.query = "SELECT \"id\" FROM \"users\" LIMIT 20".to_string();
        reloaded.upsert(updated).expect("upsert should succeed");
        reloaded.persist().expect("failed to persist update");

        let mut reloaded = FileFavoritesStore::load_from_path(&path).expect("reload");
        assert_eq!(reloaded.favorites().len(), 1);
        assert_eq!(
            reloaded
                .favorite("active-users")
                .map(|favorite| favorite.query.as_str()),
            Some("SELECT \"id\" FROM \"users\" LIMIT 20")
        );

        assert!(reloaded.delete("active-users"));
        assert!(!reloaded.delete("active-users"));
        reloaded.persist().expect("failed to persist deletion");

        let reloaded = FileFavoritesStore::load_from_path(path).expect("final reload");
        assert!(reloaded.favorites().is_empty());
    }

    #[test]
    fn favorites_are_sorted_by_name() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let mut store = FileFavoritesStore::empty_at(temp_favorites_path(&temp_dir));
        store
            .upsert(Favorite::new("zeta", "SELECT 1"))
            .expect("upsert");
        store
            .upsert(Favorite::new("alpha", "SELECT 2"))
            .expect("upsert");

        let names = store
            .favorites()
            .iter()
            .map(|favorite| favorite.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn rejects_blank_name_or_query() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let mut store = FileFavoritesStore::empty_at(temp_favorites_path(&temp_dir));

        assert!(matches!(
            store.upsert(Favorite::new("  ", "SELECT 1")),
            Err(FavoritesError::EmptyName)
        ));
        assert!(matches!(
            store.upsert(Favorite::new("name", "\n")),
            Err(FavoritesError::EmptyQuery)
        ));
    }

    #[test]
    fn next_default_name_skips_taken_names() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let mut store = FileFavoritesStore::empty_at(temp_favorites_path(&temp_dir));
        assert_eq!(store.next_default_name(), "favorite-1");

        store
            .upsert(Favorite::new("favorite-1", "SELECT 1"))
            .expect("upsert");
        assert_eq!(store.next_default_name(), "favorite-2");
    }
}
