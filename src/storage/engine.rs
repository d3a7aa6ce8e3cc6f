use std::path::Path;
use serde::{Serialize, Deserialize};
use crate::core::error::Result;

/// Query in the storage engine's own vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NativeQuery {
    MatchNothing,
    MatchAll,
    /// Documents carrying the term `prefix + phrase`.
    Phrase { prefix: String, phrase: String },
    And(Box<NativeQuery>, Box<NativeQuery>),
    Or(Box<NativeQuery>, Box<NativeQuery>),
    AndNot(Box<NativeQuery>, Box<NativeQuery>),
}

impl NativeQuery {
    pub fn phrase(prefix: &str, phrase: &str) -> Self {
        NativeQuery::Phrase {
            prefix: prefix.to_string(),
            phrase: phrase.to_string(),
        }
    }

    pub fn and(self, other: NativeQuery) -> Self {
        NativeQuery::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: NativeQuery) -> Self {
        NativeQuery::Or(Box::new(self), Box::new(other))
    }

    pub fn and_not(self, other: NativeQuery) -> Self {
        NativeQuery::AndNot(Box::new(self), Box::new(other))
    }

    /// Everything except what `inner` matches.
    pub fn complement(inner: NativeQuery) -> Self {
        NativeQuery::MatchAll.and_not(inner)
    }
}

/// Document as handed to `replace_document`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub terms: Vec<String>,
    pub value: u64,
}

/// One hit: the engine's internal handle and the stored identifier value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub handle: u32,
    pub value: u64,
}

pub trait WritableStore: Send {
    /// Insert, or replace the document already carrying `key`.
    fn replace_document(&mut self, key: &str, doc: StoredDocument) -> Result<()>;

    fn delete_document(&mut self, key: &str) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    /// Changes made since the last commit.
    fn has_pending(&self) -> bool;

    fn close(self: Box<Self>) -> Result<()>;
}

pub trait ReadableStore: Send + Sync {
    /// Matches ordered by descending handle; `offset`/`count` select a page.
    fn execute(&self, query: &NativeQuery, offset: usize, count: usize) -> Result<Vec<Match>>;

    /// Pick up everything committed since the handle was opened.
    fn reopen(&mut self) -> Result<()>;

    fn doc_count(&self) -> u64;
}

/// Entry points of a term-store engine.
pub trait StoreEngine: Send + Sync {
    fn open_writable(&self, path: &Path, create: bool) -> Result<Box<dyn WritableStore>>;

    fn open_readable(&self, path: &Path, create: bool) -> Result<Box<dyn ReadableStore>>;
}
