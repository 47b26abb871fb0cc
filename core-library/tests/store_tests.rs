//! Behaviour tests for `LibraryStore` over an in-memory settings bridge.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::storage::SettingsStore;
use core_library::{
    Library, LibraryError, LibraryStore, LoadOrigin, RemoteLibrary, Track, TrackId,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Settings bridge whose reads and writes can be made to fail.
#[derive(Default)]
struct MemorySettingsStore {
    values: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemorySettingsStore {
    fn with_value(key: &str, value: &str) -> Self {
        let store = Self::default();
        store.values.lock().insert(key.to_string(), value.to_string());
        store
    }

    fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("disk full".to_string()));
        }
        // Yield so concurrent writers get a chance to interleave.
        tokio::task::yield_now().await;
        self.values.lock().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("storage locked".to_string()));
        }
        Ok(self.values.lock().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.values.lock().keys().cloned().collect())
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        self.values.lock().clear();
        Ok(())
    }
}

#[derive(Default)]
struct RecordingRemote {
    snapshot: Library,
    pushed: Mutex<Vec<TrackId>>,
}

#[async_trait]
impl RemoteLibrary for RecordingRemote {
    async fn fetch_snapshot(&self) -> core_library::Result<Library> {
        Ok(self.snapshot.clone())
    }

    async fn push_track(&self, track: &Track) -> core_library::Result<()> {
        self.pushed.lock().push(track.id.clone());
        Ok(())
    }
}

fn track(id: &str) -> Track {
    Track::new(id, format!("Track {id}"))
        .with_artist("Artist")
        .with_album("Album")
        .with_playback_url(format!("https://cdn.example.com/{id}.mp3"))
}

#[tokio::test]
async fn add_twice_keeps_one_entry() {
    let settings = Arc::new(MemorySettingsStore::default());
    let store = LibraryStore::new(settings.clone(), "library");

    store.add(track("1")).await.unwrap();
    let library = store.add(track("1")).await.unwrap();

    assert_eq!(library.len(), 1);
    assert_eq!(settings.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn remove_absent_leaves_list_unchanged() {
    let store = LibraryStore::new(Arc::new(MemorySettingsStore::default()), "library");
    store.add(track("1")).await.unwrap();
    store.add(track("2")).await.unwrap();
    let before = store.list();

    store.remove(&TrackId::from("missing")).await.unwrap();

    assert_eq!(store.list(), before);
}

#[tokio::test]
async fn added_track_survives_restart() {
    let settings = Arc::new(MemorySettingsStore::default());
    {
        let store = LibraryStore::new(settings.clone(), "library");
        store.load().await;
        store.add(track("1")).await.unwrap();
        store.add(track("2")).await.unwrap();
        store.remove(&"1".into()).await.unwrap();
    }

    let restarted = LibraryStore::new(settings, "library");
    let report = restarted.load().await;

    assert_eq!(report.origin, LoadOrigin::Local);
    assert_eq!(report.library.len(), 1);
    assert!(restarted.contains(&"2".into()));
}

#[tokio::test]
async fn failed_write_leaves_library_unchanged() {
    let settings = Arc::new(MemorySettingsStore::default());
    let store = LibraryStore::new(settings.clone(), "library");
    store.add(track("1")).await.unwrap();

    settings.fail_writes.store(true, Ordering::SeqCst);
    let err = store.add(track("2")).await.unwrap_err();
    assert!(matches!(err, LibraryError::Storage(_)));
    assert!(matches!(
        store.remove(&"1".into()).await,
        Err(LibraryError::Storage(_))
    ));

    assert_eq!(store.len(), 1);
    assert!(store.contains(&"1".into()));
    let persisted = Library::from_blob(&settings.raw("library").unwrap()).unwrap();
    assert_eq!(persisted, store.library());
}

#[tokio::test]
async fn concurrent_adds_are_serialized() {
    let settings = Arc::new(MemorySettingsStore::default());
    let store = Arc::new(LibraryStore::new(settings.clone(), "library"));

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.add(track(&i.to_string())).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.len(), 16);
    let persisted = Library::from_blob(&settings.raw("library").unwrap()).unwrap();
    assert_eq!(persisted.len(), 16);
    assert_eq!(persisted, store.library());
}

#[tokio::test]
async fn corrupt_blob_degrades_to_empty_with_warning() {
    let settings = Arc::new(MemorySettingsStore::with_value("library", "{oops"));
    let store = LibraryStore::new(settings, "library");

    let report = store.load().await;

    assert_eq!(report.origin, LoadOrigin::Empty);
    assert!(report.library.is_empty());
    assert!(report.warning.is_some());
}

#[tokio::test]
async fn read_failure_degrades_to_empty_with_warning() {
    let settings = Arc::new(MemorySettingsStore::default());
    settings.fail_reads.store(true, Ordering::SeqCst);
    let store = LibraryStore::new(settings, "library");

    let report = store.load().await;

    assert_eq!(report.origin, LoadOrigin::Empty);
    assert!(report.warning.unwrap().contains("could not be read"));
}

#[tokio::test]
async fn add_after_failed_read_keeps_stored_tracks() {
    let stored = Library::from_tracks([track("a"), track("b"), track("c")])
        .to_blob()
        .unwrap();
    let settings = Arc::new(MemorySettingsStore::with_value("library", &stored));
    let store = LibraryStore::new(settings.clone(), "library");

    settings.fail_reads.store(true, Ordering::SeqCst);
    let report = store.load().await;
    assert_eq!(report.origin, LoadOrigin::Empty);
    settings.fail_reads.store(false, Ordering::SeqCst);

    let library = store.add(track("new")).await.unwrap();

    let ids: Vec<&str> = library.tracks().iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c", "new"]);
    let persisted = Library::from_blob(&settings.raw("library").unwrap()).unwrap();
    assert_eq!(persisted, library);
    assert_eq!(store.library(), library);
}

#[tokio::test]
async fn writes_refused_while_stored_library_unreadable() {
    let stored = Library::from_tracks([track("a")]).to_blob().unwrap();
    let settings = Arc::new(MemorySettingsStore::with_value("library", &stored));
    settings.fail_reads.store(true, Ordering::SeqCst);
    let store = LibraryStore::new(settings.clone(), "library");
    store.load().await;

    let err = store.add(track("new")).await.unwrap_err();
    assert!(matches!(err, LibraryError::Storage(_)));
    let err = store.remove(&TrackId::from("a")).await.unwrap_err();
    assert!(matches!(err, LibraryError::Storage(_)));

    assert_eq!(settings.raw("library").unwrap(), stored);
    assert_eq!(settings.writes.load(Ordering::SeqCst), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn corrupt_blob_is_backed_up_before_overwrite() {
    let settings = Arc::new(MemorySettingsStore::with_value("library", "{oops"));
    let store = LibraryStore::new(settings.clone(), "library");

    let report = store.load().await;
    assert!(report.warning.unwrap().contains("library.corrupt"));
    assert_eq!(settings.raw("library.corrupt").as_deref(), Some("{oops"));

    store.add(track("1")).await.unwrap();

    assert_eq!(settings.raw("library.corrupt").as_deref(), Some("{oops"));
    let persisted = Library::from_blob(&settings.raw("library").unwrap()).unwrap();
    assert_eq!(persisted.len(), 1);
}

#[tokio::test]
async fn corrupt_blob_backed_up_on_first_write_when_load_could_not() {
    let settings = Arc::new(MemorySettingsStore::with_value("library", "{oops"));
    settings.fail_writes.store(true, Ordering::SeqCst);
    let store = LibraryStore::new(settings.clone(), "library");

    let report = store.load().await;
    assert!(report.warning.unwrap().contains("not backed up"));
    assert!(settings.raw("library.corrupt").is_none());

    // Still cannot back it up, so the blob must stay as it is
    assert!(store.add(track("1")).await.is_err());
    assert_eq!(settings.raw("library").as_deref(), Some("{oops"));

    settings.fail_writes.store(false, Ordering::SeqCst);
    store.add(track("1")).await.unwrap();
    assert_eq!(settings.raw("library.corrupt").as_deref(), Some("{oops"));
    assert!(store.contains(&"1".into()));
}

#[tokio::test]
async fn remote_snapshot_not_stored_over_unreadable_blob() {
    let stored = Library::from_tracks([track("local")]).to_blob().unwrap();
    let settings = Arc::new(MemorySettingsStore::with_value("library", &stored));
    settings.fail_reads.store(true, Ordering::SeqCst);
    let remote = Arc::new(RecordingRemote {
        snapshot: Library::from_tracks([track("remote")]),
        ..Default::default()
    });
    let store = LibraryStore::new(settings.clone(), "library").with_remote(remote);

    let report = store.load().await;

    assert_eq!(report.origin, LoadOrigin::Remote);
    assert!(store.contains(&"remote".into()));
    assert_eq!(settings.raw("library").unwrap(), stored);
    assert_eq!(settings.writes.load(Ordering::SeqCst), 0);

    // Once readable, the stored copy is the base of the next write
    settings.fail_reads.store(false, Ordering::SeqCst);
    let library = store.add(track("new")).await.unwrap();
    let ids: Vec<&str> = library.tracks().iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["local", "new"]);
}

#[tokio::test]
async fn remote_snapshot_used_when_nothing_stored_locally() {
    let settings = Arc::new(MemorySettingsStore::default());
    let remote = Arc::new(RecordingRemote {
        snapshot: Library::from_tracks([track("a"), track("b")]),
        ..Default::default()
    });
    let store = LibraryStore::new(settings.clone(), "library").with_remote(remote);

    let report = store.load().await;

    assert_eq!(report.origin, LoadOrigin::Remote);
    assert_eq!(report.library.len(), 2);
    // Stored locally for the next start
    assert!(settings.raw("library").is_some());
}

#[tokio::test]
async fn local_blob_wins_over_remote() {
    let local = Library::from_tracks([track("local")]).to_blob().unwrap();
    let settings = Arc::new(MemorySettingsStore::with_value("library", &local));
    let remote = Arc::new(RecordingRemote {
        snapshot: Library::from_tracks([track("remote")]),
        ..Default::default()
    });
    let store = LibraryStore::new(settings, "library").with_remote(remote);

    let report = store.load().await;

    assert_eq!(report.origin, LoadOrigin::Local);
    assert!(store.contains(&"local".into()));
    assert!(!store.contains(&"remote".into()));
}

#[tokio::test]
async fn mirror_receives_adds_but_not_removals() {
    let remote = Arc::new(RecordingRemote::default());
    let store = LibraryStore::new(Arc::new(MemorySettingsStore::default()), "library")
        .with_remote(remote.clone());

    store.add(track("1")).await.unwrap();
    store.add(track("1")).await.unwrap();
    store.remove(&"1".into()).await.unwrap();

    assert_eq!(remote.pushed.lock().as_slice(), &[TrackId::from("1")]);
}

#[tokio::test]
async fn replace_keeps_position_and_persists() {
    let settings = Arc::new(MemorySettingsStore::default());
    let store = LibraryStore::new(settings.clone(), "library");
    for id in ["1", "2", "3"] {
        store.add(track(id)).await.unwrap();
    }

    let previous = store
        .replace(track("2").with_album("Deluxe"))
        .await
        .unwrap();

    assert_eq!(previous.unwrap().album, "Album");
    assert_eq!(store.list()[1].album, "Deluxe");
    let persisted = Library::from_blob(&settings.raw("library").unwrap()).unwrap();
    assert_eq!(persisted.tracks()[1].album, "Deluxe");
    assert!(store.replace(track("9")).await.unwrap().is_none());
}

#[tokio::test]
async fn remote_without_mirror_is_load_fallback_only() {
    let remote = Arc::new(RecordingRemote {
        snapshot: Library::from_tracks([track("r")]),
        ..Default::default()
    });
    let store = LibraryStore::new(Arc::new(MemorySettingsStore::default()), "library")
        .with_remote(remote.clone())
        .with_mirror_adds(false);

    assert_eq!(store.load().await.origin, LoadOrigin::Remote);
    store.add(track("new")).await.unwrap();

    assert!(remote.pushed.lock().is_empty());
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn local_only_add_is_not_mirrored() {
    let remote = Arc::new(RecordingRemote::default());
    let store = LibraryStore::new(Arc::new(MemorySettingsStore::default()), "library")
        .with_remote(remote.clone());

    let report = store.add_local_only(track("local-1")).await.unwrap();

    assert!(report.inserted);
    assert!(report.mirror_error.is_none());
    assert!(store.contains(&"local-1".into()));
    assert!(remote.pushed.lock().is_empty());
}
