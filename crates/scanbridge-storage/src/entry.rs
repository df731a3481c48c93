//! Queue entries and the on-disk document shape.
//!
//! The document is `{"events": [{"id": 1, "url": "...", "payload": {...}}]}`.
//! Older documents without per-entry ids are accepted and renumbered in
//! order when loaded.

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// One undelivered event.
///
/// Entries are never mutated once stored; delivery removes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Insertion-ordered identifier, unique within the document
    pub id: u64,

    /// Destination URL the payload is posted to
    pub url: String,

    /// JSON body to deliver
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StoredEntry {
    #[serde(default)]
    id: Option<u64>,
    url: String,
    payload: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
struct StoredDocument {
    #[serde(default)]
    events: Vec<StoredEntry>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    events: &'a [QueueEntry],
}

/// In-memory image of the queue document.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct QueueDocument {
    pub(crate) events: Vec<QueueEntry>,
    next_id: u64,
}

impl QueueDocument {
    /// Decode a document read from `path`. Empty input is an empty queue.
    pub(crate) fn decode(path: &Path, bytes: &[u8]) -> StorageResult<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::empty());
        }

        let stored: StoredDocument = serde_json::from_slice(bytes)?;

        if stored.events.iter().any(|e| e.id.is_none()) {
            warn!(
                path = %path.display(),
                entries = stored.events.len(),
                "queue document without entry ids, renumbering"
            );
            let events = stored
                .events
                .into_iter()
                .zip(1..)
                .map(|(e, id)| QueueEntry {
                    id,
                    url: e.url,
                    payload: e.payload,
                })
                .collect();
            return Ok(Self::from_events(events));
        }

        let mut events = Vec::with_capacity(stored.events.len());
        let mut last = 0;
        for e in stored.events {
            let id = e.id.unwrap_or_default();
            if id <= last {
                return Err(StorageError::corrupted(
                    path,
                    format!("entry id {id} is not greater than preceding id {last}"),
                ));
            }
            last = id;
            events.push(QueueEntry {
                id,
                url: e.url,
                payload: e.payload,
            });
        }
        Ok(Self::from_events(events))
    }

    pub(crate) fn encode(&self) -> StorageResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&DocumentRef {
            events: &self.events,
        })?)
    }

    pub(crate) fn empty() -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
        }
    }

    fn from_events(events: Vec<QueueEntry>) -> Self {
        let next_id = events.last().map_or(1, |e| e.id + 1);
        Self { events, next_id }
    }

    pub(crate) fn push(&mut self, url: String, payload: serde_json::Value) -> QueueEntry {
        let entry = QueueEntry {
            id: self.next_id,
            url,
            payload,
        };
        self.next_id += 1;
        self.events.push(entry.clone());
        entry
    }

    pub(crate) fn remove(&mut self, id: u64) -> Option<QueueEntry> {
        let pos = self.events.iter().position(|e| e.id == id)?;
        Some(self.events.remove(pos))
    }

    /// Id the next pushed entry will receive.
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Never hand out ids below `floor`.
    pub(crate) fn reserve_ids_below(&mut self, floor: u64) {
        self.next_id = self.next_id.max(floor);
    }
}
