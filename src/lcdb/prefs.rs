use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::error::LcResult;
use crate::lcdb;
use crate::models::UserPreferences;

/// Per-user preferences, persisted as `{ user id: preferences }`.
///
/// Entries are only ever created by [`PreferencesStore::set`]; reads for unknown users return
/// the defaults without storing them.
pub struct PreferencesStore {
    path: PathBuf,
    prefs: RwLock<BTreeMap<String, UserPreferences>>,
}

impl PreferencesStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let prefs: BTreeMap<String, UserPreferences> = lcdb::load_or_default(&path);
        log::info!(
            "[PreferencesStore::open] Loaded preferences for {} user(s) from {}",
            prefs.len(),
            path.display()
        );

        Self { path, prefs: RwLock::new(prefs) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces `user_id`'s preferences wholesale and persists.
    ///
    /// Invalid preferences are rejected before anything is stored. Returns whether the store
    /// was written to disk.
    pub fn set(&self, user_id: &str, prefs: UserPreferences) -> LcResult<bool> {
        prefs.validate()?;

        let mut all = self.prefs.write().unwrap_or_else(PoisonError::into_inner);
        log::info!(
            "[PreferencesStore::set] {user_id}: target {} per day, prefers {}",
            prefs.daily_target,
            prefs.preferred_difficulty
        );
        all.insert(user_id.to_string(), prefs);

        Ok(lcdb::write_json(&self.path, &*all)
            .inspect_err(|err| log::error!("[PreferencesStore::set] Failed to save preferences: {err}"))
            .is_ok())
    }

    /// Stored preferences for `user_id`, or the defaults.
    pub fn get(&self, user_id: &str) -> UserPreferences {
        self.prefs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;

    #[test]
    fn unknown_user_gets_defaults_without_creating_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_preferences.json");
        let store = PreferencesStore::open(&path);

        assert_eq!(store.get("new@example.com"), UserPreferences::default());
        assert!(!path.exists());
    }

    #[test]
    fn set_replaces_and_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_preferences.json");
        let store = PreferencesStore::open(&path);

        store.set("a@example.com", UserPreferences::new(2, Difficulty::Easy).unwrap()).unwrap();
        assert!(store.set("a@example.com", UserPreferences::new(5, Difficulty::Hard).unwrap()).unwrap());

        let reloaded = PreferencesStore::open(&path);
        assert_eq!(reloaded.get("a@example.com"), UserPreferences::new(5, Difficulty::Hard).unwrap());
    }

    #[test]
    fn invalid_preferences_are_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferencesStore::open(dir.path().join("user_preferences.json"));

        let bad = UserPreferences { daily_target: 0, preferred_difficulty: Difficulty::Easy };
        assert!(store.set("a@example.com", bad).unwrap_err().is_config());
        assert_eq!(store.get("a@example.com"), UserPreferences::default());
    }

    #[test]
    fn reads_snake_case_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_preferences.json");
        std::fs::write(
            &path,
            r#"{"a@example.com": {"daily_target": 3, "preferred_difficulty": "Hard"}}"#,
        )
        .unwrap();

        let store = PreferencesStore::open(&path);
        assert_eq!(store.get("a@example.com").daily_target, 3);
        assert_eq!(store.get("a@example.com").preferred_difficulty, Difficulty::Hard);
    }
}
