//! Durable FIFO of undelivered events.
//!
//! Every operation runs as a scoped transaction: take the store lock, load
//! the document if it is not cached, apply the change, persist, release.
//! Persisting writes a sibling temporary file, syncs it and renames it over
//! the document, so after a crash the file holds either the previous or the
//! new queue.
//!
//! The producer pipeline and the sender share one [`QueueStore`] through
//! cheap clones; the lock serializes them.

use crate::config::QueueConfig;
use crate::entry::{QueueDocument, QueueEntry};
use crate::error::{StorageError, StorageResult};
use serde::Serialize;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct StoreState {
    /// `None` after a failed write; the next transaction reloads from disk.
    cached: Option<QueueDocument>,
    /// High-water mark of issued ids. Survives cache drops, so a reload
    /// never reissues the id of an entry removed since the last good write.
    next_id: u64,
}

/// Handle to the queue document.
#[derive(Debug, Clone)]
pub struct QueueStore {
    path: Arc<PathBuf>,
    state: Arc<Mutex<StoreState>>,
}

impl QueueStore {
    /// Open the queue at the configured path, loading any persisted entries.
    ///
    /// A missing document is an empty queue; it is created on first write.
    ///
    /// # Errors
    ///
    /// Fails if the parent directory cannot be created or the existing
    /// document cannot be read or parsed.
    pub async fn open(config: QueueConfig) -> StorageResult<Self> {
        if config.create_dirs
            && let Some(parent) = config.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::Configuration(format!(
                    "failed to create queue directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let document = load(&config.path).await?;
        info!(
            path = %config.path.display(),
            pending = document.events.len(),
            "delivery queue opened"
        );

        Ok(Self {
            path: Arc::new(config.path),
            state: Arc::new(Mutex::new(StoreState {
                next_id: document.next_id(),
                cached: Some(document),
            })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry and persist it before returning.
    pub async fn enqueue<T>(&self, url: &str, payload: &T) -> StorageResult<QueueEntry>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_value(payload)?;
        let entry = self
            .write(|doc| Some(doc.push(url.to_string(), payload)))
            .await?
            .ok_or_else(|| StorageError::Task("enqueue produced no entry".into()))?;

        debug!(entry_id = entry.id, url = %entry.url, "event enqueued");
        Ok(entry)
    }

    /// Oldest entry, without removing it.
    pub async fn peek_front(&self) -> StorageResult<Option<QueueEntry>> {
        self.read(|doc| doc.events.first().cloned()).await
    }

    /// Remove the oldest entry and persist the removal.
    pub async fn dequeue_front(&self) -> StorageResult<Option<QueueEntry>> {
        let removed = self
            .write(|doc| {
                let id = doc.events.first()?.id;
                doc.remove(id)
            })
            .await?;

        if let Some(entry) = &removed {
            debug!(entry_id = entry.id, "front entry dequeued");
        }
        Ok(removed)
    }

    /// Remove the entry with `id`, wherever it sits.
    ///
    /// Returns `false` if no such entry exists; nothing is written then.
    pub async fn remove(&self, id: u64) -> StorageResult<bool> {
        let removed = self.write(|doc| doc.remove(id)).await?.is_some();
        if removed {
            debug!(entry_id = id, "entry removed");
        }
        Ok(removed)
    }

    pub async fn len(&self) -> StorageResult<usize> {
        self.read(|doc| doc.events.len()).await
    }

    pub async fn is_empty(&self) -> StorageResult<bool> {
        self.read(|doc| doc.events.is_empty()).await
    }

    /// Snapshot of every pending entry in delivery order.
    pub async fn entries(&self) -> StorageResult<Vec<QueueEntry>> {
        self.read(|doc| doc.events.clone()).await
    }

    async fn read<R>(&self, f: impl FnOnce(&QueueDocument) -> R) -> StorageResult<R> {
        let mut state = self.state.lock().await;
        let doc = cached_document(&mut state, &self.path).await?;
        Ok(f(doc))
    }

    /// Apply `f` and persist when it returns `Some`.
    async fn write<R>(
        &self,
        f: impl FnOnce(&mut QueueDocument) -> Option<R>,
    ) -> StorageResult<Option<R>> {
        let mut state = self.state.lock().await;
        let doc = cached_document(&mut state, &self.path).await?;

        let Some(result) = f(&mut *doc) else {
            return Ok(None);
        };

        let (bytes, next_id) = (doc.encode(), doc.next_id());
        state.next_id = state.next_id.max(next_id);

        if let Err(e) = persist(&self.path, bytes?).await {
            warn!(
                path = %self.path.display(),
                error = %e,
                "failed to persist queue, discarding cached state"
            );
            state.cached = None;
            return Err(e);
        }
        Ok(Some(result))
    }
}

async fn cached_document<'a>(
    state: &'a mut StoreState,
    path: &Path,
) -> StorageResult<&'a mut QueueDocument> {
    if state.cached.is_none() {
        debug!(path = %path.display(), "reloading queue document");
        let mut doc = load(path).await?;
        doc.reserve_ids_below(state.next_id);
        state.cached = Some(doc);
    }
    state
        .cached
        .as_mut()
        .ok_or_else(|| StorageError::Task("queue cache unavailable".into()))
}

async fn load(path: &Path) -> StorageResult<QueueDocument> {
    match tokio::fs::read(path).await {
        Ok(bytes) => QueueDocument::decode(path, &bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(QueueDocument::empty()),
        Err(e) => Err(e.into()),
    }
}

/// Atomically replace the document at `path` with `bytes`.
async fn persist(path: &Path, bytes: Vec<u8>) -> StorageResult<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> StorageResult<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| StorageError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn open_temp() -> (tempfile::TempDir, QueueStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = QueueStore::open(QueueConfig::new(dir.path().join("queue.json")))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_missing_document_is_empty_queue() {
        let (dir, store) = open_temp().await;
        assert!(store.is_empty().await.unwrap());
        assert_eq!(store.peek_front().await.unwrap(), None);
        assert!(!dir.path().join("queue.json").exists());
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (_dir, store) = open_temp().await;
        for n in 0..3 {
            store.enqueue("http://collector", &json!({"n": n})).await.unwrap();
        }

        assert_eq!(store.len().await.unwrap(), 3);
        assert_eq!(store.peek_front().await.unwrap().unwrap().payload, json!({"n": 0}));
        // Peeking does not consume
        assert_eq!(store.len().await.unwrap(), 3);

        let mut seen = Vec::new();
        while let Some(entry) = store.dequeue_front().await.unwrap() {
            seen.push(entry.payload["n"].as_i64().unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2]);
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_enqueue_persists_before_returning() {
        let (dir, store) = open_temp().await;
        store
            .enqueue("http://collector", &json!({"simbology": "EAN-13", "valid": true}))
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join("queue.json")).unwrap()).unwrap();
        assert_eq!(raw["events"][0]["url"], "http://collector");
        assert_eq!(raw["events"][0]["payload"]["simbology"], "EAN-13");
    }

    #[tokio::test]
    async fn test_remove_by_id() {
        let (_dir, store) = open_temp().await;
        let a = store.enqueue("u", &json!("a")).await.unwrap();
        let b = store.enqueue("u", &json!("b")).await.unwrap();

        assert!(store.remove(b.id).await.unwrap());
        assert!(!store.remove(b.id).await.unwrap());
        assert_eq!(store.entries().await.unwrap(), vec![a]);
    }

    #[tokio::test]
    async fn test_dequeue_empty_writes_nothing() {
        let (dir, store) = open_temp().await;
        assert_eq!(store.dequeue_front().await.unwrap(), None);
        assert!(!dir.path().join("queue.json").exists());
    }

    #[tokio::test]
    async fn test_failed_write_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let queue_dir = dir.path().join("spool");
        let store = QueueStore::open(QueueConfig::new(queue_dir.join("queue.json")))
            .await
            .unwrap();
        store.enqueue("u", &json!(1)).await.unwrap();

        // Temp files can no longer be created next to the document
        std::fs::remove_dir_all(&queue_dir).unwrap();
        assert!(store.enqueue("u", &json!(2)).await.is_err());

        // Cache was dropped; the next read sees the (now missing) document
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_failed_write() {
        let dir = tempfile::tempdir().unwrap();
        let queue_dir = dir.path().join("spool");
        let store = QueueStore::open(QueueConfig::new(queue_dir.join("queue.json")))
            .await
            .unwrap();
        let first = store.enqueue("u", &json!(1)).await.unwrap();
        let second = store.enqueue("u", &json!(2)).await.unwrap();
        assert!(store.remove(second.id).await.unwrap());

        std::fs::remove_dir_all(&queue_dir).unwrap();
        assert!(store.enqueue("u", &json!(3)).await.is_err());

        std::fs::create_dir_all(&queue_dir).unwrap();
        let recovered = store.enqueue("u", &json!(4)).await.unwrap();
        assert!(recovered.id > second.id, "id {} reissued", recovered.id);
        assert_ne!(recovered.id, first.id);
    }

    #[tokio::test]
    async fn test_open_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        std::fs::write(&path, b"not json").unwrap();

        let err = QueueStore::open(QueueConfig::new(&path)).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/queue.json");
        let store = QueueStore::open(QueueConfig::new(&path)).await.unwrap();
        store.enqueue("u", &json!(true)).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let (_dir, store) = open_temp().await;
        let producer = store.clone();
        producer.enqueue("u", &json!(1)).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
    }
}
