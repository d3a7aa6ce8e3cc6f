use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use tracing::{debug, error};
use crate::core::error::{Error, ErrorKind, Result};
use crate::document::assembler::DocumentRecord;
use crate::storage::engine::{StoreEngine, StoredDocument, WritableStore};

/// The single writable store handle, opened on first use.
///
/// Every write or delete takes the mutex for exactly one store call, so
/// concurrent workers and expunges interleave per document.
pub struct SharedWriter {
    engine: Arc<dyn StoreEngine>,
    path: PathBuf,
    handle: Mutex<Option<Box<dyn WritableStore>>>,
    /// Bumped whenever changes reach the store.
    commits: AtomicU64,
}

impl SharedWriter {
    pub fn new(engine: Arc<dyn StoreEngine>, path: impl Into<PathBuf>) -> Self {
        SharedWriter {
            engine,
            path: path.into(),
            handle: Mutex::new(None),
            commits: AtomicU64::new(0),
        }
    }

    /// Changes when committed data may differ from what a reader last loaded.
    pub fn generation(&self) -> u64 {
        self.commits.load(Ordering::Acquire)
    }

    pub fn is_open(&self) -> bool {
        self.handle.lock().is_some()
    }

    fn open_into(&self, slot: &mut Option<Box<dyn WritableStore>>) -> Result<()> {
        if slot.is_none() {
            let opened = self.engine.open_writable(&self.path, true).map_err(|e| {
                error!(path = %self.path.display(), error = %e, "cannot open writable index");
                Error::new(ErrorKind::StoreOpen, format!("{}: {}", self.path.display(), e.context))
            })?;
            debug!(path = %self.path.display(), "writable index opened");
            *slot = Some(opened);
        }
        Ok(())
    }

    pub fn ensure_open(&self) -> Result<()> {
        let mut guard = self.handle.lock();
        self.open_into(&mut guard)
    }

    /// Run one store call under the lock, opening the handle if needed.
    pub fn with_handle<R>(&self, f: impl FnOnce(&mut dyn WritableStore) -> Result<R>) -> Result<R> {
        let mut guard = self.handle.lock();
        self.open_into(&mut guard)?;
        match guard.as_mut() {
            Some(handle) => f(handle.as_mut()),
            None => Err(Error::new(ErrorKind::InvalidState, "writable handle vanished".to_string())),
        }
    }

    pub fn replace(&self, record: DocumentRecord) -> Result<()> {
        let DocumentRecord { key, terms, value, .. } = record;
        self.with_handle(|store| store.replace_document(&key, StoredDocument { terms, value }))
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        self.with_handle(|store| store.delete_document(key))
    }

    pub fn has_pending(&self) -> bool {
        self.handle.lock().as_ref().is_some_and(|h| h.has_pending())
    }

    /// Commit if a handle is open and holds changes. Returns whether it did.
    pub fn commit_pending(&self) -> Result<bool> {
        let mut guard = self.handle.lock();
        match guard.as_mut() {
            Some(handle) if handle.has_pending() => {
                handle.commit()?;
                self.commits.fetch_add(1, Ordering::AcqRel);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Commit and release the handle; the next write reopens it.
    pub fn close(&self) -> Result<()> {
        let taken = self.handle.lock().take();
        match taken {
            Some(handle) => {
                let pending = handle.has_pending();
                handle.close()?;
                if pending {
                    self.commits.fetch_add(1, Ordering::AcqRel);
                }
                debug!(path = %self.path.display(), "writable index closed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}
