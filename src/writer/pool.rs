use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};
use crate::core::error::{ErrorKind, Result};
use crate::document::assembler::DocumentRecord;
use crate::writer::shared::SharedWriter;

/// Attempts per document for errors that may clear up on their own.
const WRITE_ATTEMPTS: usize = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Running,
    Terminated,
}

/// Result of handing a batch to the pool.
#[derive(Debug)]
pub enum PushOutcome {
    Accepted { slot: usize },
    /// Every slot is running; the batch comes back and the caller retries.
    PoolFull(Vec<DocumentRecord>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    pub aborted_batches: usize,
}

struct PoolShared {
    slots: Mutex<Vec<SlotState>>,
    finished: Condvar,
    written: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    aborted: AtomicUsize,
}

/// Marks the slot terminated when the worker exits, panics included.
struct SlotGuard {
    shared: Arc<PoolShared>,
    index: usize,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut slots = self.shared.slots.lock();
        slots[self.index] = SlotState::Terminated;
        self.shared.finished.notify_all();
    }
}

/// Bounded set of background writers sharing one store handle.
pub struct WriterPool {
    pub max_threads: usize,
    shared: Arc<PoolShared>,
    writer: Arc<SharedWriter>,
}

impl WriterPool {
    pub fn new(max_threads: usize, writer: Arc<SharedWriter>) -> Self {
        WriterPool {
            max_threads: max_threads.max(1),
            shared: Arc::new(PoolShared {
                slots: Mutex::new(Vec::with_capacity(max_threads)),
                finished: Condvar::new(),
                written: AtomicUsize::new(0),
                skipped: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
                aborted: AtomicUsize::new(0),
            }),
            writer,
        }
    }

    pub fn writer(&self) -> &Arc<SharedWriter> {
        &self.writer
    }

    /// Start a worker for `batch` in a new or reclaimed slot.
    pub fn push(&self, batch: Vec<DocumentRecord>) -> PushOutcome {
        let index = {
            let mut slots = self.shared.slots.lock();
            if slots.len() < self.max_threads {
                slots.push(SlotState::Running);
                slots.len() - 1
            } else if let Some(free) = slots.iter().position(|s| *s == SlotState::Terminated) {
                slots[free] = SlotState::Running;
                free
            } else {
                return PushOutcome::PoolFull(batch);
            }
        };

        let guard = SlotGuard {
            shared: self.shared.clone(),
            index,
        };
        let writer = self.writer.clone();

        thread::spawn(move || {
            let stats = run_batch(index, batch, &writer);
            let shared = &guard.shared;
            shared.written.fetch_add(stats.written, Ordering::Relaxed);
            shared.skipped.fetch_add(stats.skipped, Ordering::Relaxed);
            shared.failed.fetch_add(stats.failed, Ordering::Relaxed);
            shared.aborted.fetch_add(stats.aborted_batches, Ordering::Relaxed);
            drop(guard);
        });

        PushOutcome::Accepted { slot: index }
    }

    /// Block until some slot can be reclaimed or `timeout` passes.
    pub fn wait_for_slot(&self, timeout: Duration) -> bool {
        let mut slots = self.shared.slots.lock();
        if slots.len() < self.max_threads || slots.iter().any(|s| *s == SlotState::Terminated) {
            return true;
        }
        self.shared.finished.wait_for(&mut slots, timeout);
        slots.iter().any(|s| *s == SlotState::Terminated)
    }

    /// Block until no worker is running.
    pub fn wait_idle(&self) {
        let mut slots = self.shared.slots.lock();
        while slots.iter().any(|s| *s == SlotState::Running) {
            self.shared.finished.wait(&mut slots);
        }
    }

    /// Drain every worker, then commit and release the store handle.
    pub fn shutdown(&self) -> Result<()> {
        self.wait_idle();
        self.writer.close()
    }

    pub fn live_workers(&self) -> usize {
        self.shared.slots.lock().iter().filter(|s| **s == SlotState::Running).count()
    }

    pub fn slot_states(&self) -> Vec<SlotState> {
        self.shared.slots.lock().clone()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            written: self.shared.written.load(Ordering::Relaxed),
            skipped: self.shared.skipped.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            aborted_batches: self.shared.aborted.load(Ordering::Relaxed),
        }
    }
}

/// Write one batch, last-queued document first.
fn run_batch(slot: usize, batch: Vec<DocumentRecord>, writer: &SharedWriter) -> PoolStats {
    let mut stats = PoolStats::default();

    if let Err(e) = writer.ensure_open() {
        error!(slot, docs = batch.len(), error = %e, "dropping batch, index unavailable");
        stats.aborted_batches = 1;
        return stats;
    }

    for record in batch.into_iter().rev() {
        if record.is_empty() {
            stats.skipped += 1;
            continue;
        }

        let uid = record.id.value();
        match write_with_retry(writer, record) {
            Ok(()) => stats.written += 1,
            Err(e) => {
                warn!(slot, uid, error = %e, "document not indexed");
                stats.failed += 1;
            }
        }
    }

    debug!(slot, written = stats.written, skipped = stats.skipped, failed = stats.failed, "batch drained");
    stats
}

fn write_with_retry(writer: &SharedWriter, record: DocumentRecord) -> Result<()> {
    for attempt in 1..WRITE_ATTEMPTS {
        match writer.replace(record.clone()) {
            Ok(()) => return Ok(()),
            Err(e) if matches!(e.kind, ErrorKind::Io | ErrorKind::Locked) => {
                debug!(uid = record.id.value(), attempt, error = %e, "transient write error, retrying");
                thread::sleep(RETRY_BACKOFF * attempt as u32);
            }
            Err(e) => return Err(e),
        }
    }
    writer.replace(record)
}
