use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;
use crate::analysis::normalizer::Normalizer;
use crate::analysis::token::StemSet;
use crate::core::types::FieldSlot;

pub trait Tokenizer: Send + Sync {
    /// Turn raw field text into the stems stored for `slot`.
    fn generate(&self, slot: FieldSlot, text: &str) -> StemSet;

    fn name(&self) -> &str;
}

/// Partial-word tokenizer: every substring of `partial..=full` characters,
/// plus the whole word when it is longer than `full`.
#[derive(Debug, Clone)]
pub struct NGramTokenizer {
    pub normalizer: Arc<Normalizer>,
}

impl NGramTokenizer {
    pub fn new(normalizer: Arc<Normalizer>) -> Self {
        NGramTokenizer { normalizer }
    }

    fn add_word(&self, slot: FieldSlot, raw: &str, stems: &mut StemSet) {
        let word = self.normalizer.normalize_word(raw);

        if slot.is_single_token() {
            self.push(slot, &word, stems);
            return;
        }

        let units: Vec<&str> = word.graphemes(true).collect();
        let count = units.len();
        let partial = self.normalizer.partial;
        let full = self.normalizer.full;

        if count < partial {
            return;
        }

        for len in partial..=full.min(count) {
            for start in 0..=count - len {
                self.push(slot, &units[start..start + len].concat(), stems);
            }
        }

        if count > full {
            self.push(slot, &word, stems);
        }
    }

    fn push(&self, slot: FieldSlot, candidate: &str, stems: &mut StemSet) {
        if let Some(stem) = self.normalizer.accept_stem(slot, candidate) {
            stems.insert(stem);
        }
    }
}

impl Tokenizer for NGramTokenizer {
    fn generate(&self, slot: FieldSlot, text: &str) -> StemSet {
        let mut stems = StemSet::new();

        let cleaned = self.normalizer.clean(text);
        if !self.normalizer.is_indexable(&cleaned) {
            return stems;
        }

        for word in self.normalizer.split_words(&cleaned) {
            self.add_word(slot, word, &mut stems);
        }

        stems
    }

    fn name(&self) -> &str {
        "ngram"
    }
}
