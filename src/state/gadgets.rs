use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::errors::StoreError;
use crate::persistence;

/// JSON keys the server assigns itself. Stripped from create bodies.
pub const SERVER_OWNED_FIELDS: [&str; 5] =
    ["id", "createdAt", "updatedAt", "availability", "rentedBy"];

/// A rentable gadget record.
///
/// `availability == true` exactly when `rented_by` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gadget {
    pub id: String,

    pub availability: bool,

    #[serde(default)]
    pub rented_by: Option<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Caller-supplied attributes (`name`, `type`, `description`,
    /// `pricePerDay`, `owner`, anything else), kept exactly as sent.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Body of `POST /gadgets`. Nothing in it is required or type-checked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewGadget {
    pub details: Map<String, Value>,
}

impl NewGadget {
    /// Read a create body. An empty body, invalid JSON or a JSON value that
    /// is not an object all yield an empty draft.
    pub fn from_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }

        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(details)) => Self { details },
            Ok(other) => {
                tracing::debug!("Create body is not a JSON object ({other}), using no details");
                Self::default()
            }
            Err(e) => {
                tracing::debug!("Create body is not JSON ({e}), using no details");
                Self::default()
            }
        }
    }
}

impl From<Map<String, Value>> for NewGadget {
    fn from(details: Map<String, Value>) -> Self {
        Self { details }
    }
}

impl Gadget {
    /// Build a freshly listed gadget. Server-owned keys in the draft are
    /// dropped so they cannot shadow the assigned values.
    pub fn from_draft(id: String, draft: NewGadget, created_at: DateTime<Utc>) -> Self {
        let mut details = draft.details;
        for key in SERVER_OWNED_FIELDS {
            details.remove(key);
        }

        Self {
            id,
            availability: true,
            rented_by: None,
            created_at,
            updated_at: None,
            details,
        }
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    pub fn name(&self) -> Option<&str> {
        self.detail("name").and_then(Value::as_str)
    }

    pub fn is_rented(&self) -> bool {
        !self.availability
    }
}

/// Ordered id -> gadget map.
pub type GadgetMap = BTreeMap<String, Gadget>;

/// Shared handle to the gadget map and its snapshot file.
///
/// Cloning is cheap; all clones see the same map.
#[derive(Clone)]
pub struct GadgetStore {
    inner: Arc<Inner>,
}

struct Inner {
    map: RwLock<GadgetMap>,
    snapshot_path: Option<PathBuf>,
    dirty: AtomicBool,
    /// Serializes saves so `close` waits for one already in flight.
    save_lock: Mutex<()>,
}

/// Puts the dirty flag back unless the save it guards completed.
/// Covers both a failed write and a save future dropped mid-write.
struct PendingSave<'a> {
    dirty: &'a AtomicBool,
    done: bool,
}

impl Drop for PendingSave<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.dirty.store(true, Ordering::Release);
        }
    }
}

impl GadgetStore {
    /// A store with no backing file. `save` is a no-op.
    pub fn in_memory() -> Self {
        Self::from_parts(GadgetMap::new(), None)
    }

    /// Open the store backed by the snapshot at `path`.
    ///
    /// A missing file yields an empty store. A file that cannot be read or
    /// parsed is an error, so a later save never clobbers it.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let map = persistence::load_snapshot(&path).await?;
        Ok(Self::from_parts(map, Some(path)))
    }

    fn from_parts(map: GadgetMap, snapshot_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                map: RwLock::new(map),
                snapshot_path,
                dirty: AtomicBool::new(false),
                save_lock: Mutex::new(()),
            }),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, GadgetMap> {
        self.inner.map.read().await
    }

    /// Exclusive access. Hold the guard across a check and its write.
    pub async fn write(&self) -> RwLockWriteGuard<'_, GadgetMap> {
        self.inner.map.write().await
    }

    pub fn mark_dirty(&self) {
        self.inner.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::Acquire)
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.inner.snapshot_path.as_deref()
    }

    /// Write the snapshot if anything changed since the last save.
    ///
    /// Returns `true` when a file was written. If the write fails or the
    /// future is dropped before it finishes, the store stays dirty.
    pub async fn save(&self) -> Result<bool, StoreError> {
        let Some(path) = self.snapshot_path() else {
            return Ok(false);
        };

        let _saving = self.inner.save_lock.lock().await;

        if !self.inner.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }

        let mut pending = PendingSave {
            dirty: &self.inner.dirty,
            done: false,
        };

        let json = {
            let map = self.read().await;
            serde_json::to_string_pretty(&*map)?
        };
        persistence::write_snapshot(path, &json).await?;

        pending.done = true;
        Ok(true)
    }

    /// Flush pending changes. Call once on shutdown, after the autosave
    /// task has stopped; a save already in progress is waited for.
    pub async fn close(self) -> Result<(), StoreError> {
        self.save().await?;
        tracing::info!("Gadget store closed");
        Ok(())
    }
}
