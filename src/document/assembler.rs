use std::sync::Arc;
use serde::{Serialize, Deserialize};
use tracing::debug;
use crate::analysis::token::insert_sorted;
use crate::analysis::tokenizer::Tokenizer;
use crate::core::types::{DocId, FieldSlot};

/// Size counters accumulated over all fields of one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub stems: usize,
    pub total_bytes: usize,
    pub max_len: usize,
}

/// Fully tokenized mailbox item, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocId,
    pub key: String,         // `Q<id>`, the replace/delete handle
    pub terms: Vec<String>,  // field-prefixed stems, sorted, unique
    pub value: u64,          // stored sort value (the identifier)
    pub stats: DocumentStats,
}

impl DocumentRecord {
    pub fn stem_count(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Collects `(field, text)` pairs for one document and merges their stems.
pub struct DocumentAssembler {
    pub id: DocId,
    pending: Vec<(FieldSlot, String)>,
    terms: Vec<String>,
    stats: DocumentStats,
    tokenizer: Arc<dyn Tokenizer>,
}

impl DocumentAssembler {
    pub fn new(id: DocId, tokenizer: Arc<dyn Tokenizer>) -> Self {
        DocumentAssembler {
            id,
            pending: Vec::new(),
            terms: Vec::new(),
            stats: DocumentStats::default(),
            tokenizer,
        }
    }

    /// Queue `text` for `slot`. Returns false when nothing was queued:
    /// empty text, or the identifier slot, whose key is written separately.
    pub fn add(&mut self, slot: FieldSlot, text: &str) -> bool {
        if text.is_empty() || !slot.is_indexable() {
            return false;
        }
        self.pending.push((slot, text.to_string()));
        true
    }

    pub fn pending_fields(&self) -> usize {
        self.pending.len()
    }

    /// Tokenize every pending field and merge the prefixed stems.
    pub fn finalize(&mut self) {
        // Order is irrelevant to the final set; drain from the back.
        while let Some((slot, text)) = self.pending.pop() {
            let stems = self.tokenizer.generate(slot, &text);
            let prefix = slot.prefix();

            self.stats.total_bytes += stems.total_bytes;
            self.stats.max_len = self.stats.max_len.max(stems.max_len);

            for stem in stems.iter() {
                if insert_sorted(&mut self.terms, format!("{}{}", prefix, stem)) {
                    self.stats.stems += 1;
                }
            }
        }

        debug!(uid = self.id.0, stems = self.stats.stems, "document finalized");
    }

    /// Produce the immutable record; finalizes first if fields are still pending.
    pub fn materialize(mut self) -> DocumentRecord {
        if !self.pending.is_empty() {
            self.finalize();
        }

        DocumentRecord {
            id: self.id,
            key: self.id.unique_key(),
            terms: self.terms,
            value: self.id.value(),
            stats: self.stats,
        }
    }
}
