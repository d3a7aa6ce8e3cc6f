use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use roaring::RoaringBitmap;
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::engine::{Match, NativeQuery, ReadableStore, StoreEngine, StoredDocument, WritableStore};
use crate::storage::file_lock::FileLock;

const MAGIC: &[u8; 4] = b"MGTS";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 12; // magic + version + crc

pub const DB_FILE: &str = "terms.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    handle: u32,
    value: u64,
    terms: Vec<String>,
}

/// On-disk image of one index directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    next_handle: u32,
    committed_at: Option<DateTime<Utc>>,
    documents: BTreeMap<String, Entry>, // unique key -> entry
}

/// In-memory postings rebuilt from a snapshot.
#[derive(Debug, Default)]
struct TermIndex {
    snapshot: Snapshot,
    postings: HashMap<String, RoaringBitmap>,
    all: RoaringBitmap,
    values: HashMap<u32, u64>,
}

impl TermIndex {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut index = TermIndex::default();
        for (key, entry) in &snapshot.documents {
            index.link(key, entry);
        }
        index.snapshot = snapshot;
        index
    }

    fn link(&mut self, key: &str, entry: &Entry) {
        self.all.insert(entry.handle);
        self.values.insert(entry.handle, entry.value);
        self.postings.entry(key.to_string()).or_default().insert(entry.handle);
        for term in &entry.terms {
            self.postings.entry(term.clone()).or_default().insert(entry.handle);
        }
    }

    fn unlink(&mut self, key: &str, entry: &Entry) {
        self.all.remove(entry.handle);
        self.values.remove(&entry.handle);
        for term in entry.terms.iter().map(String::as_str).chain(std::iter::once(key)) {
            if let Some(bitmap) = self.postings.get_mut(term) {
                bitmap.remove(entry.handle);
                if bitmap.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
    }

    fn replace(&mut self, key: &str, doc: StoredDocument) {
        let handle = match self.snapshot.documents.remove(key) {
            Some(old) => {
                self.unlink(key, &old);
                old.handle
            }
            None => {
                self.snapshot.next_handle += 1;
                self.snapshot.next_handle
            }
        };

        let entry = Entry { handle, value: doc.value, terms: doc.terms };
        self.link(key, &entry);
        self.snapshot.documents.insert(key.to_string(), entry);
    }

    fn delete(&mut self, key: &str) -> bool {
        match self.snapshot.documents.remove(key) {
            Some(old) => {
                self.unlink(key, &old);
                true
            }
            None => false,
        }
    }

    fn evaluate(&self, query: &NativeQuery) -> RoaringBitmap {
        match query {
            NativeQuery::MatchNothing => RoaringBitmap::new(),
            NativeQuery::MatchAll => self.all.clone(),
            NativeQuery::Phrase { prefix, phrase } => {
                let term = format!("{}{}", prefix, phrase);
                self.postings.get(&term).cloned().unwrap_or_default()
            }
            NativeQuery::And(a, b) => self.evaluate(a) & self.evaluate(b),
            NativeQuery::Or(a, b) => self.evaluate(a) | self.evaluate(b),
            NativeQuery::AndNot(a, b) => self.evaluate(a) - self.evaluate(b),
        }
    }

    /// Descending-handle slice of `hits`, located by rank so deep pages
    /// cost no more than the first one.
    fn page(&self, hits: &RoaringBitmap, offset: usize, count: usize) -> Vec<Match> {
        let total = hits.len() as usize;
        if offset >= total {
            return Vec::new();
        }

        let top = total - 1 - offset;
        (0..count.min(total - offset))
            .filter_map(|i| hits.select((top - i) as u32))
            .map(|handle| Match {
                handle,
                value: self.values.get(&handle).copied().unwrap_or_default(),
            })
            .collect()
    }
}

fn db_path(dir: &Path) -> PathBuf {
    dir.join(DB_FILE)
}

fn read_snapshot(dir: &Path) -> Result<Snapshot> {
    let path = db_path(dir);
    if !path.exists() {
        return Ok(Snapshot::default());
    }

    let mut raw = Vec::new();
    File::open(&path)?.read_to_end(&mut raw)?;

    if raw.len() < HEADER_LEN || &raw[0..4] != MAGIC {
        return Err(Error::new(ErrorKind::Corrupted, format!("{} is not an index file", path.display())));
    }

    let version = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
    if version != FORMAT_VERSION {
        return Err(Error::new(ErrorKind::Corrupted, format!("unsupported index format version {}", version)));
    }

    let expected = u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]);
    let payload = &raw[HEADER_LEN..];
    if crc32fast::hash(payload) != expected {
        return Err(Error::new(ErrorKind::Corrupted, format!("checksum mismatch in {}", path.display())));
    }

    let decoded = lz4_flex::decompress_size_prepended(payload)?;
    Ok(bincode::deserialize(&decoded)?)
}

fn write_snapshot(dir: &Path, snapshot: &Snapshot) -> Result<()> {
    let encoded = bincode::serialize(snapshot)?;
    let payload = lz4_flex::compress_prepend_size(&encoded);

    let tmp = dir.join(format!("{}.tmp", DB_FILE));
    {
        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&tmp)?;
        file.write_all(MAGIC)?;
        file.write_all(&FORMAT_VERSION.to_le_bytes())?;
        file.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
        file.write_all(&payload)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, db_path(dir))?;
    Ok(())
}

fn prepare_dir(path: &Path, create: bool) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    if !create {
        return Err(Error::new(ErrorKind::StoreOpen, format!("no index at {}", path.display())));
    }
    fs::create_dir_all(path).map_err(|e| {
        Error::new(ErrorKind::StoreOpen, format!("cannot create {}: {}", path.display(), e))
    })
}

/// Bundled engine: one snapshot file per index directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStoreEngine;

impl StoreEngine for FileStoreEngine {
    fn open_writable(&self, path: &Path, create: bool) -> Result<Box<dyn WritableStore>> {
        prepare_dir(path, create)?;
        let lock = FileLock::acquire(path)?;
        let snapshot = read_snapshot(path)?;

        debug!(path = %path.display(), docs = snapshot.documents.len(), "opened writable index");

        Ok(Box::new(FileWriter {
            dir: path.to_path_buf(),
            index: TermIndex::from_snapshot(snapshot),
            dirty: false,
            _lock: lock,
        }))
    }

    fn open_readable(&self, path: &Path, create: bool) -> Result<Box<dyn ReadableStore>> {
        prepare_dir(path, create)?;
        let snapshot = read_snapshot(path)?;

        Ok(Box::new(FileReader {
            dir: path.to_path_buf(),
            index: TermIndex::from_snapshot(snapshot),
            last: Mutex::new(None),
        }))
    }
}

pub struct FileWriter {
    dir: PathBuf,
    index: TermIndex,
    dirty: bool,
    _lock: FileLock,
}

impl WritableStore for FileWriter {
    fn replace_document(&mut self, key: &str, doc: StoredDocument) -> Result<()> {
        if key.is_empty() {
            return Err(Error::store("empty unique key"));
        }
        self.index.replace(key, doc);
        self.dirty = true;
        Ok(())
    }

    fn delete_document(&mut self, key: &str) -> Result<()> {
        if self.index.delete(key) {
            self.dirty = true;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.index.snapshot.committed_at = Some(Utc::now());
        write_snapshot(&self.dir, &self.index.snapshot)?;
        self.dirty = false;
        Ok(())
    }

    fn has_pending(&self) -> bool {
        self.dirty
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.commit()
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = write_snapshot(&self.dir, &self.index.snapshot) {
                warn!(path = %self.dir.display(), error = %e, "uncommitted changes lost");
            }
        }
    }
}

pub struct FileReader {
    dir: PathBuf,
    index: TermIndex,
    last: Mutex<Option<(NativeQuery, RoaringBitmap)>>, // hits of the query being paged
}

impl ReadableStore for FileReader {
    fn execute(&self, query: &NativeQuery, offset: usize, count: usize) -> Result<Vec<Match>> {
        let mut last = self.last.lock();
        let cached = matches!(last.as_ref(), Some((q, _)) if q == query);
        if !cached {
            *last = Some((query.clone(), self.index.evaluate(query)));
        }

        Ok(match last.as_ref() {
            Some((_, hits)) => self.index.page(hits, offset, count),
            None => Vec::new(),
        })
    }

    fn reopen(&mut self) -> Result<()> {
        let snapshot = read_snapshot(&self.dir)?;
        self.index = TermIndex::from_snapshot(snapshot);
        *self.last.get_mut() = None;
        Ok(())
    }

    fn doc_count(&self) -> u64 {
        self.index.all.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(index: &TermIndex, query: &NativeQuery, offset: usize, count: usize) -> Vec<u64> {
        index.page(&index.evaluate(query), offset, count).iter().map(|m| m.value).collect()
    }

    fn doc(value: u64, terms: &[&str]) -> StoredDocument {
        StoredDocument {
            value,
            terms: terms.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn committed_documents_are_visible_to_readers() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FileStoreEngine;

        let mut writer = engine.open_writable(dir.path(), true).unwrap();
        writer.replace_document("Q1", doc(1, &["Shello"])).unwrap();
        writer.replace_document("Q2", doc(2, &["Shello", "Sworld"])).unwrap();
        assert!(writer.has_pending());
        writer.commit().unwrap();
        assert!(!writer.has_pending());

        let reader = engine.open_readable(dir.path(), false).unwrap();
        let hits = reader.execute(&NativeQuery::phrase("S", "hello"), 0, 10).unwrap();
        let values: Vec<u64> = hits.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![2, 1]);
        assert_eq!(reader.doc_count(), 2);
    }

    #[test]
    fn replace_keeps_handle_and_drops_old_terms() {
        let mut index = TermIndex::default();
        index.replace("Q5", doc(5, &["Sold"]));
        let first = index.snapshot.documents["Q5"].handle;
        index.replace("Q5", doc(5, &["Snew"]));

        assert_eq!(index.snapshot.documents["Q5"].handle, first);
        assert!(index.evaluate(&NativeQuery::phrase("S", "old")).is_empty());
        assert_eq!(index.evaluate(&NativeQuery::phrase("S", "new")).len(), 1);
    }

    #[test]
    fn boolean_operators_combine_postings() {
        let mut index = TermIndex::default();
        index.replace("Q1", doc(1, &["Sa", "Sb"]));
        index.replace("Q2", doc(2, &["Sa"]));
        index.replace("Q3", doc(3, &["Sb"]));

        let a = NativeQuery::phrase("S", "a");
        let b = NativeQuery::phrase("S", "b");
        let values = |q: &NativeQuery| values(&index, q, 0, 10);

        assert_eq!(values(&a.clone().and(b.clone())), vec![1]);
        assert_eq!(values(&a.clone().or(b.clone())), vec![3, 2, 1]);
        assert_eq!(values(&a.clone().and_not(b.clone())), vec![2]);
        assert_eq!(values(&NativeQuery::complement(a)), vec![3]);
        assert!(values(&NativeQuery::MatchNothing).is_empty());
    }

    #[test]
    fn pages_run_in_descending_handle_order() {
        let mut index = TermIndex::default();
        for uid in 1..=5 {
            index.replace(&format!("Q{uid}"), doc(uid, &["Sx"]));
        }
        assert_eq!(values(&index, &NativeQuery::MatchAll, 1, 2), vec![4, 3]);
        assert_eq!(values(&index, &NativeQuery::MatchAll, 4, 2), vec![1]);
        assert!(values(&index, &NativeQuery::MatchAll, 5, 2).is_empty());
    }

    #[test]
    fn delete_removes_document_and_key_term() {
        let mut index = TermIndex::default();
        index.replace("Q1", doc(1, &["Shi"]));
        assert!(index.delete("Q1"));
        assert!(!index.delete("Q1"));
        assert!(index.evaluate(&NativeQuery::MatchAll).is_empty());
        assert!(index.postings.is_empty());
    }

    #[test]
    fn readable_open_without_create_fails_on_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = FileStoreEngine.open_readable(&missing, false).err().unwrap();
        assert_eq!(err.kind, ErrorKind::StoreOpen);
    }

    #[test]
    fn corrupted_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut writer = FileStoreEngine.open_writable(dir.path(), true).unwrap();
            writer.replace_document("Q1", doc(1, &["Sabc"])).unwrap();
            writer.close().unwrap();
        }

        let path = dir.path().join(DB_FILE);
        let mut raw = fs::read(&path).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        fs::write(&path, raw).unwrap();

        let err = FileStoreEngine.open_readable(dir.path(), false).err().unwrap();
        assert_eq!(err.kind, ErrorKind::Corrupted);
    }

    #[test]
    fn reader_reopen_sees_later_commits() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = FileStoreEngine.open_readable(dir.path(), true).unwrap();
        assert_eq!(reader.doc_count(), 0);

        let mut writer = FileStoreEngine.open_writable(dir.path(), true).unwrap();
        writer.replace_document("Q1", doc(1, &["Sabc"])).unwrap();
        writer.commit().unwrap();

        assert_eq!(reader.doc_count(), 0);
        reader.reopen().unwrap();
        assert_eq!(reader.doc_count(), 1);
    }

    #[test]
    fn deep_pages_stay_consistent_over_a_large_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FileStoreEngine.open_writable(dir.path(), true).unwrap();
        for uid in 1..=3000u64 {
            let parity = if uid % 2 == 0 { "Seven" } else { "Sodd" };
            writer.replace_document(&format!("Q{uid}"), doc(uid, &[parity])).unwrap();
        }
        for uid in (3..=3000u64).step_by(3) {
            writer.delete_document(&format!("Q{uid}")).unwrap();
        }
        writer.close().unwrap();

        let reader = FileStoreEngine.open_readable(dir.path(), false).unwrap();
        let expected: Vec<u64> = (1..=3000u64).rev().filter(|uid| uid % 3 != 0).collect();
        let even = NativeQuery::phrase("S", "even");

        let mut paged = Vec::new();
        let mut offset = 0;
        loop {
            let page = reader.execute(&NativeQuery::MatchAll, offset, 97).unwrap();
            // Another query in between must not disturb the paging.
            assert!(!reader.execute(&even, 0, 1).unwrap().is_empty());

            offset += page.len();
            paged.extend(page.iter().map(|m| m.value));
            if page.len() < 97 {
                break;
            }
        }

        assert_eq!(paged, expected);
        assert_eq!(reader.execute(&even, 0, 3).unwrap().iter().map(|m| m.value).collect::<Vec<_>>(), vec![2998, 2996, 2992]);
    }
}
