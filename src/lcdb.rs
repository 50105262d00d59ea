//! Persistent per-user state: activity statistics and preferences.
//!
//! Both stores keep their whole state in memory and write it through to a JSON document after
//! every mutation. A missing or corrupt document loads as an empty store.

pub mod prefs;
pub mod stats;

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{LcError, LcResult};

pub use prefs::PreferencesStore;
pub use stats::{StatisticsStore, UserStatistics};

pub const PREFERENCES_FILE: &str = "user_preferences.json";
pub const STATISTICS_FILE: &str = "daily_stats.json";

/// Loads a JSON document, falling back to `T::default()` when the file is missing or unreadable.
pub(crate) fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match read_json(path) {
        Ok(Some(value)) => {
            log::debug!("[load_or_default] Loaded {}", path.display());
            value
        }
        Ok(None) => {
            log::info!("[load_or_default] {} does not exist yet, starting empty.", path.display());
            T::default()
        }
        Err(err) => {
            log::error!("[load_or_default] Failed to load {}, starting empty: {err}", path.display());
            T::default()
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> LcResult<Option<T>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(LcError::io(path, err)),
    };

    Ok(Some(serde_json::from_str(&raw)?))
}

/// Writes `value` as pretty JSON, creating parent directories as needed.
///
/// The document is written to a sibling temp file first and renamed over the target, so a crash
/// mid-write leaves the previous document intact.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> LcResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| LcError::io(parent, err))?;
    }

    let serialized = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serialized).map_err(|err| LcError::io(&tmp, err))?;
    fs::rename(&tmp, path).map_err(|err| LcError::io(path, err))?;

    Ok(())
}
