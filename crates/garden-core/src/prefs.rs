//! Durable user preferences: favorites, listening history, last station.
//!
//! Backed by one JSON file.  Mutations are read-modify-write under a single
//! mutex (no lost updates) and are flushed to disk before the new value is
//! published to watchers.  Write failures are logged, not surfaced —
//! favoriting and history are not correctness-critical to playback, but the
//! in-memory value still advances so the session stays coherent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

/// History keeps at most this many entries, most-recent-first.
pub const HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
struct StoredPrefs {
    #[serde(default)]
    favorites: BTreeSet<String>,
    #[serde(default)]
    history: Vec<String>,
    #[serde(default)]
    last_station_id: Option<String>,
}

pub struct PreferenceStore {
    path: PathBuf,
    state: Mutex<StoredPrefs>,
    favorites_tx: watch::Sender<BTreeSet<String>>,
    history_tx: watch::Sender<Vec<String>>,
    last_station_tx: watch::Sender<Option<String>>,
}

impl PreferenceStore {
    /// Open the store, reading whatever is on disk.  A missing or corrupt
    /// file starts from empty defaults.
    pub async fn open(path: PathBuf) -> Self {
        let stored = Self::load(&path).await;
        let (favorites_tx, _) = watch::channel(stored.favorites.clone());
        let (history_tx, _) = watch::channel(stored.history.clone());
        let (last_station_tx, _) = watch::channel(stored.last_station_id.clone());
        Self {
            path,
            state: Mutex::new(stored),
            favorites_tx,
            history_tx,
            last_station_tx,
        }
    }

    /// Favorites id set.  The receiver observes the on-disk value
    /// immediately and every committed change after that.
    pub fn favorites(&self) -> watch::Receiver<BTreeSet<String>> {
        self.favorites_tx.subscribe()
    }

    /// History ids, most-recent-first, capped at [`HISTORY_LIMIT`].
    pub fn history(&self) -> watch::Receiver<Vec<String>> {
        self.history_tx.subscribe()
    }

    pub fn last_station(&self) -> watch::Receiver<Option<String>> {
        self.last_station_tx.subscribe()
    }

    /// Flip membership of `id` in the favorites set.
    pub async fn toggle_favorite(&self, id: &str) {
        let mut guard = self.state.lock().await;
        if !guard.favorites.remove(id) {
            guard.favorites.insert(id.to_string());
        }
        self.persist(&guard).await;
        self.favorites_tx.send_replace(guard.favorites.clone());
    }

    /// Move `id` to the front of the history, deduplicated and capped.
    pub async fn add_to_history(&self, id: &str) {
        let mut guard = self.state.lock().await;
        guard.history.retain(|h| h != id);
        guard.history.insert(0, id.to_string());
        guard.history.truncate(HISTORY_LIMIT);
        self.persist(&guard).await;
        self.history_tx.send_replace(guard.history.clone());
    }

    pub async fn set_last_station(&self, id: &str) {
        let mut guard = self.state.lock().await;
        if guard.last_station_id.as_deref() == Some(id) {
            return;
        }
        guard.last_station_id = Some(id.to_string());
        self.persist(&guard).await;
        self.last_station_tx
            .send_replace(guard.last_station_id.clone());
    }

    async fn load(path: &Path) -> StoredPrefs {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "settings file corrupt, starting empty");
                    StoredPrefs::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "no settings file yet");
                StoredPrefs::default()
            }
        }
    }

    /// Write-through: temp file then rename, so a crash mid-write never
    /// truncates the previous state.
    async fn persist(&self, prefs: &StoredPrefs) {
        let result: anyhow::Result<()> = async {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let json = serde_json::to_string_pretty(prefs)?;
            let tmp = self.path.with_extension("json.tmp");
            tokio::fs::write(&tmp, json).await?;
            tokio::fs::rename(&tmp, &self.path).await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to persist settings");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_settings_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("radio_settings.json")
    }

    #[tokio::test]
    async fn toggle_favorite_is_its_own_inverse() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::open(temp_settings_path(&dir)).await;

        store.toggle_favorite("x").await;
        assert!(store.favorites().borrow().contains("x"));

        store.toggle_favorite("x").await;
        assert!(store.favorites().borrow().is_empty());
    }

    #[tokio::test]
    async fn history_moves_existing_id_to_front_without_duplication() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::open(temp_settings_path(&dir)).await;

        store.add_to_history("a").await;
        store.add_to_history("b").await;
        store.add_to_history("a").await;

        assert_eq!(*store.history().borrow(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn history_re_adding_front_id_leaves_list_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::open(temp_settings_path(&dir)).await;

        store.add_to_history("a").await;
        store.add_to_history("b").await;
        store.add_to_history("b").await;

        assert_eq!(*store.history().borrow(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn history_never_exceeds_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::open(temp_settings_path(&dir)).await;

        for i in 0..(HISTORY_LIMIT + 5) {
            store.add_to_history(&format!("id-{i}")).await;
        }

        let history = store.history().borrow().clone();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0], format!("id-{}", HISTORY_LIMIT + 4));
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_settings_path(&dir);

        {
            let store = PreferenceStore::open(path.clone()).await;
            store.toggle_favorite("fav").await;
            store.add_to_history("hist").await;
            store.set_last_station("last").await;
        }

        let store = PreferenceStore::open(path).await;
        assert!(store.favorites().borrow().contains("fav"));
        assert_eq!(*store.history().borrow(), vec!["hist"]);
        assert_eq!(store.last_station().borrow().as_deref(), Some("last"));
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_settings_path(&dir);
        tokio::fs::write(&path, "not json{{").await.unwrap();

        let store = PreferenceStore::open(path).await;
        assert!(store.favorites().borrow().is_empty());
        assert!(store.history().borrow().is_empty());
        assert!(store.last_station().borrow().is_none());
    }

    #[tokio::test]
    async fn watchers_see_committed_changes() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::open(temp_settings_path(&dir)).await;

        let mut favorites = store.favorites();
        assert!(favorites.borrow_and_update().is_empty());

        store.toggle_favorite("x").await;
        assert!(favorites.has_changed().unwrap());
        assert!(favorites.borrow_and_update().contains("x"));
    }
}
