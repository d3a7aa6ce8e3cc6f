use std::fs;
use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use crate::analysis::normalizer::Normalizer;
use crate::analysis::tokenizer::{NGramTokenizer, Tokenizer};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::{DocId, FieldSlot, WILDCARD_FIELD};
use crate::document::assembler::{DocumentAssembler, DocumentRecord};
use crate::memory::low_memory::MemoryGate;
use crate::query::ast::BoolOp;
use crate::query::builder::QueryBuilder;
use crate::search::collector::{ResultCollector, ResultSet};
use crate::storage::engine::{NativeQuery, ReadableStore, StoreEngine};
use crate::storage::file_store::FileStoreEngine;
use crate::writer::pool::{PushOutcome, WriterPool};
use crate::writer::shared::SharedWriter;

/// How long one backpressure wait lasts before the slot table is re-checked.
const SLOT_WAIT: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriterionKind {
    Header(String),
    Body,
    /// Any field except the identifier.
    Text,
}

/// One structured search clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    pub kind: CriterionKind,
    pub value: String,
    pub negated: bool,
}

impl Criterion {
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Criterion { kind: CriterionKind::Header(name.into()), value: value.into(), negated: false }
    }

    pub fn body(value: impl Into<String>) -> Self {
        Criterion { kind: CriterionKind::Body, value: value.into(), negated: false }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Criterion { kind: CriterionKind::Text, value: value.into(), negated: false }
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    fn field_name(&self) -> &str {
        match &self.kind {
            CriterionKind::Header(name) => name,
            CriterionKind::Body => FieldSlot::Body.name(),
            CriterionKind::Text => WILDCARD_FIELD,
        }
    }
}

/// Outcome of `enqueue_for_write`.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    Queued,
    /// Memory is low; the record was not buffered and should be offered again later.
    Refused(DocumentRecord),
}

/// Full-text index of one mailbox.
pub struct MailIndex {
    config: Config,
    normalizer: Arc<Normalizer>,
    tokenizer: Arc<dyn Tokenizer>,
    engine: Arc<dyn StoreEngine>,
    pool: WriterPool,
    pending: Mutex<Vec<DocumentRecord>>,
    reader: Mutex<Option<OpenReader>>,
    gate: MemoryGate,
}

/// Read handle plus the writer generation it has loaded.
struct OpenReader {
    store: Box<dyn ReadableStore>,
    generation: u64,
}

impl MailIndex {
    /// Open with the bundled file engine.
    pub fn open_default(config: Config) -> Result<Self> {
        MailIndex::open(config, Arc::new(FileStoreEngine))
    }

    pub fn open(config: Config, engine: Arc<dyn StoreEngine>) -> Result<Self> {
        config.validate()?;

        let normalizer = Arc::new(Normalizer::from_config(&config));
        let tokenizer: Arc<dyn Tokenizer> = Arc::new(NGramTokenizer::new(normalizer.clone()));
        let writer = Arc::new(SharedWriter::new(engine.clone(), config.storage_path.clone()));
        let pool = WriterPool::new(config.max_threads, writer);
        let gate = MemoryGate::new(config.low_memory_floor_mb);

        info!(
            path = %config.storage_path.display(),
            partial = config.partial,
            full = config.full,
            threads = config.max_threads,
            "mail index ready"
        );

        Ok(MailIndex {
            config,
            normalizer,
            tokenizer,
            engine,
            pool,
            pending: Mutex::new(Vec::new()),
            reader: Mutex::new(None),
            gate,
        })
    }

    pub fn with_memory_gate(mut self, gate: MemoryGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &WriterPool {
        &self.pool
    }

    pub fn new_document(&self, id: u64) -> DocumentAssembler {
        DocumentAssembler::new(DocId(id), self.tokenizer.clone())
    }

    /// Buffer `text` for the document. The identifier slot is ignored.
    pub fn index(&self, slot: FieldSlot, text: &str, ctx: &mut DocumentAssembler) {
        ctx.add(slot, text);
    }

    /// Index a header by its mail name. Unknown headers and the identifier
    /// are ignored and reported as `false`.
    pub fn index_header(&self, name: &str, text: &str, ctx: &mut DocumentAssembler) -> bool {
        match FieldSlot::from_header(name) {
            Some(slot) if slot.is_indexable() => {
                ctx.add(slot, text);
                true
            }
            _ => false,
        }
    }

    pub fn finalize_document(&self, mut ctx: DocumentAssembler) -> DocumentRecord {
        ctx.finalize();
        let record = ctx.materialize();

        if self.config.is_verbose() {
            info!(
                uid = record.id.value(),
                stems = record.stats.stems,
                bytes = record.stats.total_bytes,
                max_len = record.stats.max_len,
                "document tokenized"
            );
        }
        record
    }

    /// Buffer a record; full batches go to the writer pool.
    pub fn enqueue_for_write(&self, record: DocumentRecord) -> Admission {
        if self.gate.check() {
            self.push_pending();
            self.gate.release_memory();
            warn!(uid = record.id.value(), "low memory, document refused");
            return Admission::Refused(record);
        }

        let full = {
            let mut pending = self.pending.lock();
            pending.push(record);
            pending.len() >= self.config.batch_size
        };
        if full {
            self.push_pending();
        }
        Admission::Queued
    }

    /// Documents buffered but not yet handed to a worker.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Hand the buffered batch to the pool, waiting while every slot is busy.
    fn push_pending(&self) {
        let mut batch = std::mem::take(&mut *self.pending.lock());
        if batch.is_empty() {
            return;
        }

        loop {
            match self.pool.push(batch) {
                PushOutcome::Accepted { slot } => {
                    debug!(slot, "batch handed to writer");
                    return;
                }
                PushOutcome::PoolFull(returned) => {
                    batch = returned;
                    self.pool.wait_for_slot(SLOT_WAIT);
                }
            }
        }
    }

    /// Delete a message from the index. Buffered copies are discarded too.
    pub fn expunge(&self, uid: u64) -> Result<()> {
        let id = DocId(uid);
        self.pending.lock().retain(|record| record.id != id);
        self.pool.writer().delete(&id.unique_key())?;
        debug!(uid, "expunged");
        Ok(())
    }

    /// Run structured criteria; `and_semantics` joins them with AND instead of OR.
    pub fn search(&self, criteria: &[Criterion], and_semantics: bool) -> ResultSet {
        let op = if and_semantics { BoolOp::And } else { BoolOp::Or };
        let mut builder = QueryBuilder::new(op, self.normalizer.clone());
        for criterion in criteria {
            builder.add(criterion.field_name(), &criterion.value, criterion.negated);
        }

        if self.config.is_verbose() {
            info!(query = %builder.render(), terms = builder.term_count(), "search");
        } else {
            debug!(query = %builder.render(), "search");
        }

        self.run(&builder.compile(), self.config.search_limit)
    }

    /// Execute a native query against the latest committed state.
    fn run(&self, query: &NativeQuery, limit: Option<usize>) -> ResultSet {
        if let Err(e) = self.pool.writer().commit_pending() {
            warn!(error = %e, "commit before search failed, results may be stale");
        }

        let generation = self.pool.writer().generation();
        let mut guard = self.reader.lock();
        if let Some(open) = guard.as_mut() {
            if open.generation != generation {
                match open.store.reopen() {
                    Ok(()) => open.generation = generation,
                    Err(e) => warn!(error = %e, "reader refresh failed, searching previous state"),
                }
            }
        } else {
            match self.engine.open_readable(&self.config.storage_path, true) {
                Ok(store) => *guard = Some(OpenReader { store, generation }),
                Err(e) => {
                    error!(path = %self.config.storage_path.display(), error = %e, "cannot open index for search");
                    return ResultSet::default();
                }
            }
        }

        match guard.as_ref() {
            Some(open) => ResultCollector::execute(query, open.store.as_ref(), self.config.page_size, limit),
            None => ResultSet::default(),
        }
    }

    /// Highest identifier present in the index, 0 when empty.
    pub fn last_uid(&self) -> u64 {
        let all = self.run(&NativeQuery::MatchAll, None);
        all.values().max().unwrap_or(0)
    }

    /// Block until every buffered document is written and committed.
    pub fn flush_and_close(&self) -> Result<()> {
        self.push_pending();
        self.pool.shutdown()?;
        debug!(stats = ?self.pool.stats(), "writer pool drained");
        Ok(())
    }

    /// Drop all index data; the next write starts an empty index.
    pub fn rescan(&self) -> Result<()> {
        self.pending.lock().clear();
        self.pool.shutdown()?;
        *self.reader.lock() = None;

        let path = &self.config.storage_path;
        if path.exists() {
            fs::remove_dir_all(path)?;
        }
        info!(path = %path.display(), "index removed for rescan");
        Ok(())
    }
}

impl Drop for MailIndex {
    fn drop(&mut self) {
        if let Err(e) = self.flush_and_close() {
            error!(error = %e, "index not flushed on shutdown");
        }
    }
}
