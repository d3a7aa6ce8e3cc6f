use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;
use unicode_segmentation::UnicodeSegmentation;
use crate::core::config::Config;
use crate::core::types::FieldSlot;

/// Replaces in-word punctuation so `john.doe@x.org` stays one word.
pub const MARKER: char = '_';

/// Characters that split text into words.
const SEPARATORS: &[char] = &[
    '\'', '"', '`', '<', '>', '(', ')', '[', ']', '{', '}', '|', '\\', '/',
    '!', '?', ';', ':', ',',
    '\u{00AB}', '\u{00BB}',             // « »
    '\u{2018}', '\u{2019}', '\u{201A}', // ‘ ’ ‚
    '\u{201C}', '\u{201D}', '\u{201E}', // “ ” „
    '\u{2039}', '\u{203A}',             // ‹ ›
    '\u{200B}', '\u{FEFF}',             // zero width space, BOM
];

/// Characters folded into `MARKER` inside a word.
const PUNCTUATION: &[char] = &[
    '.', '-', '@', '#', '&', '+', '=', '~', '*', '%', '$', '^',
    '\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}', // hyphens and dashes
    '\u{2026}',                                                   // …
];

/// Text normalization shared by the indexing and the query side.
///
/// Both sides must agree on every rule here: a word the indexer never
/// stored must never turn into a searchable leaf.
#[derive(Debug, Clone)]
pub struct Normalizer {
    pub partial: usize,
    pub full: usize,
}

impl Normalizer {
    pub fn new(partial: usize, full: usize) -> Self {
        Normalizer { partial, full }
    }

    pub fn from_config(config: &Config) -> Self {
        Normalizer::new(config.partial, config.full)
    }

    /// Length in user-perceived characters.
    pub fn unit_len(text: &str) -> usize {
        text.graphemes(true).count()
    }

    /// Lower-case, turn separators and whitespace into single spaces, trim.
    pub fn clean(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last_space = true;

        for c in text.chars().flat_map(char::to_lowercase) {
            if c.is_whitespace() || SEPARATORS.contains(&c) {
                if !last_space {
                    out.push(' ');
                    last_space = true;
                }
            } else {
                out.push(c);
                last_space = false;
            }
        }

        if out.ends_with(' ') {
            out.pop();
        }
        out
    }

    /// Whether cleaned text is long enough to produce anything at all.
    pub fn is_indexable(&self, cleaned: &str) -> bool {
        Self::unit_len(cleaned) >= self.partial
    }

    /// Words of cleaned text, right to left.
    pub fn split_words<'a>(&self, cleaned: &'a str) -> impl Iterator<Item = &'a str> {
        cleaned.rsplit(' ').filter(|w| !w.is_empty())
    }

    /// Fold punctuation into the marker and strip diacritics.
    pub fn normalize_word(&self, word: &str) -> String {
        let marked: String = word
            .chars()
            .map(|c| if PUNCTUATION.contains(&c) { MARKER } else { c })
            .collect();

        marked.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
    }

    /// Trim marker/space edges and check the size window for `slot`.
    /// Returns the stem that would be stored, if any.
    pub fn accept_stem(&self, slot: FieldSlot, candidate: &str) -> Option<String> {
        let trimmed = candidate.trim_matches(|c: char| c == MARKER || c == ' ');

        if Self::unit_len(trimmed) < self.partial {
            return None;
        }
        if trimmed.len() > slot.stem_size_limit() {
            return None;
        }
        Some(trimmed.to_string())
    }

    /// The single term a query word maps to, mirroring what indexing keeps.
    pub fn query_term(&self, slot: FieldSlot, word: &str) -> Option<String> {
        let normalized = self.normalize_word(word);
        self.accept_stem(slot, &normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new(3, 10)
    }

    #[test]
    fn clean_lowercases_and_collapses_separators() {
        let n = normalizer();
        assert_eq!(n.clean("Re: Hello  World"), "re hello world");
        assert_eq!(n.clean("  \"Quoted\"\r\n(text) "), "quoted text");
        assert_eq!(n.clean("\u{201C}smart\u{201D}\u{00A0}quotes"), "smart quotes");
    }

    #[test]
    fn split_words_runs_right_to_left() {
        let n = normalizer();
        let words: Vec<_> = n.split_words("re hello world").collect();
        assert_eq!(words, vec!["world", "hello", "re"]);
    }

    #[test]
    fn normalize_word_strips_accents_and_marks_punctuation() {
        let n = normalizer();
        assert_eq!(n.normalize_word("café"), "cafe");
        assert_eq!(n.normalize_word("zoë"), "zoe");
        assert_eq!(n.normalize_word("john.doe@example.com"), "john_doe_example_com");
        assert_eq!(n.normalize_word("e-mail"), "e_mail");
    }

    #[test]
    fn accept_stem_trims_markers_and_checks_length() {
        let n = normalizer();
        assert_eq!(n.accept_stem(FieldSlot::Subject, "_abc_"), Some("abc".to_string()));
        assert_eq!(n.accept_stem(FieldSlot::Subject, "_ab"), None);
        assert_eq!(n.accept_stem(FieldSlot::Subject, "  "), None);
    }

    #[test]
    fn accept_stem_drops_oversized() {
        let n = normalizer();
        let long = "a".repeat(FieldSlot::Body.stem_size_limit() + 1);
        assert_eq!(n.accept_stem(FieldSlot::Body, &long), None);

        let fits = "a".repeat(FieldSlot::Body.stem_size_limit());
        assert_eq!(n.accept_stem(FieldSlot::Body, &fits), Some(fits.clone()));
    }

    #[test]
    fn unit_len_counts_graphemes() {
        assert_eq!(Normalizer::unit_len("héllo"), 5);
        assert_eq!(Normalizer::unit_len("e\u{0301}"), 1);
    }

    #[test]
    fn query_term_mirrors_index_side() {
        let n = normalizer();
        assert_eq!(n.query_term(FieldSlot::Subject, "-hello-"), Some("hello".to_string()));
        assert_eq!(n.query_term(FieldSlot::Subject, "re"), None);
    }
}
