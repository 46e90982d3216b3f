//! # State Store
//!
//! Two JSON files per user in the state directory, `<user>` being the user id
//! with unsafe bytes percent-encoded:
//!
//! - `<user>.saved.json`: the [`SavedIndex`](crate::model::SavedIndex),
//!   `{artist: {album: [track, ...]}}`.
//! - `<user>.albums.json`: the [`RecommendationRecord`]: recommendations,
//!   watermark, current selection, and display labels.
//!
//! Every write goes to a temporary file in the same directory that is then
//! renamed over the target, so a crash leaves either the old or the new file,
//! never a torn one.

use crate::error::StoreError;
use crate::model::{LibraryState, RecommendationRecord, SavedIndex};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Persisted state of one user.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
    user: String,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>, user: &str) -> Self {
        Self {
            dir: dir.into(),
            user: file_stem(user),
        }
    }

    #[must_use]
    pub fn saved_path(&self) -> PathBuf {
        self.dir.join(format!("{}.saved.json", self.user))
    }

    #[must_use]
    pub fn record_path(&self) -> PathBuf {
        self.dir.join(format!("{}.albums.json", self.user))
    }

    /// Whether both state files are present.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.saved_path().is_file() && self.record_path().is_file()
    }

    /// # Errors
    ///
    /// [`StoreError::NotInitialized`] if either file is missing, otherwise
    /// any read or parse failure.
    pub fn load(&self) -> Result<LibraryState, StoreError> {
        let saved: SavedIndex = read_json(&self.saved_path())?;
        let record = self.load_record()?;
        Ok(LibraryState { saved, record })
    }

    /// # Errors
    ///
    /// As for [`Self::load`].
    pub fn load_record(&self) -> Result<RecommendationRecord, StoreError> {
        read_json(&self.record_path())
    }

    /// Write both files.
    ///
    /// # Errors
    ///
    /// Any I/O failure; the previous files are left intact.
    pub fn save(&self, state: &LibraryState) -> Result<(), StoreError> {
        write_json(&self.saved_path(), &state.saved)?;
        self.save_record(&state.record)
    }

    /// Write only the recommendation record.
    ///
    /// # Errors
    ///
    /// Any I/O failure; the previous file is left intact.
    pub fn save_record(&self, record: &RecommendationRecord) -> Result<(), StoreError> {
        write_json(&self.record_path(), record)
    }

    /// Write a freshly built state, refusing to replace an existing one
    /// unless `force` is set.
    ///
    /// # Errors
    ///
    /// [`StoreError::AlreadyInitialized`], or any I/O failure.
    pub fn create(&self, state: &LibraryState, force: bool) -> Result<(), StoreError> {
        if !force && self.exists() {
            return Err(StoreError::AlreadyInitialized(self.record_path()));
        }
        self.save(state)
    }
}

/// Encode a user id as a file name.
///
/// ASCII letters, digits, `-`, `_` and `.` are kept; every other byte becomes
/// `%XX`. Ids made only of dots are escaped whole. The mapping is injective,
/// so two users never share a file.
fn file_stem(user: &str) -> String {
    let user = user.trim();
    let only_dots = user.bytes().all(|b| b == b'.');
    let mut stem = String::with_capacity(user.len());
    for byte in user.bytes() {
        let keep = byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') || (byte == b'.' && !only_dots);
        if keep {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{byte:02X}"));
        }
    }
    if stem.is_empty() {
        stem.push('%');
    }
    stem
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotInitialized(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(io_err)?;

    let data = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    temp.write_all(&data).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;

    debug!("Wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlbumRef, ArtistRef, Selection, TrackRef};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_state() -> LibraryState {
        let mut state = LibraryState::new(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        let artist = ArtistRef::new("ar1");
        state.saved.insert(&artist, &AlbumRef::new("al1"), &TrackRef::new("t2"));
        state.saved.insert(&artist, &AlbumRef::new("al1"), &TrackRef::new("t1"));
        state.record.recommendations.add(&artist, &AlbumRef::new("zz"));
        state.record.recommendations.add(&artist, &AlbumRef::new("aa"));
        state.record.selection = Some(Selection {
            album: AlbumRef::new("zz"),
            artist: artist.clone(),
        });
        state.record.labels.name_artist(&artist, Some("Stereolab"));
        state
    }

    #[test]
    fn test_round_trip_preserves_state() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path(), "alice");
        let state = sample_state();

        store.save(&state).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, state);

        let order: Vec<&str> = loaded
            .record
            .recommendations
            .albums(&ArtistRef::new("ar1"))
            .iter()
            .map(AlbumRef::as_str)
            .collect();
        assert_eq!(order, ["zz", "aa"]);
    }

    #[test]
    fn test_missing_state_is_not_initialized() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path(), "nobody");
        assert!(!store.exists());
        assert!(matches!(store.load(), Err(StoreError::NotInitialized(_))));
    }

    #[test]
    fn test_create_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path(), "alice");
        let state = sample_state();

        store.create(&state, false).unwrap();
        assert!(matches!(store.create(&state, false), Err(StoreError::AlreadyInitialized(_))));
        store.create(&LibraryState::new(state.record.watermark), true).unwrap();
        assert!(store.load().unwrap().saved.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path(), "alice");
        store.save(&sample_state()).unwrap();
        fs::write(store.record_path(), "{\"recommendations\": ").unwrap();

        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path(), "alice");
        store.save(&sample_state()).unwrap();
        store.save(&sample_state()).unwrap();

        let files = fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(files, 2);
    }

    #[test]
    fn test_user_ids_become_safe_file_names() {
        assert_eq!(file_stem("alice"), "alice");
        assert_eq!(file_stem("j.doe-1"), "j.doe-1");
        assert_eq!(file_stem("a/b c"), "a%2Fb%20c");
        assert_eq!(file_stem(".."), "%2E%2E");
        assert_eq!(file_stem("100%"), "100%25");
        assert_eq!(file_stem("é"), "%C3%A9");
        let store = StateStore::new("/tmp/state", "spotify:user:42");
        assert!(store.saved_path().ends_with("spotify%3Auser%3A42.saved.json"));
    }

    #[test]
    fn test_distinct_users_keep_separate_state() {
        let ids = ["a/b", "a_b", "a%2Fb", "a b", "..", "_"];
        let stems: std::collections::HashSet<String> = ids.iter().map(|id| file_stem(id)).collect();
        assert_eq!(stems.len(), ids.len());

        let temp = TempDir::new().unwrap();
        StateStore::new(temp.path(), "a/b").save(&sample_state()).unwrap();
        let other = StateStore::new(temp.path(), "a_b");
        assert!(!other.exists());
        assert!(matches!(other.load(), Err(StoreError::NotInitialized(_))));
    }
}
