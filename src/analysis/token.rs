use serde::{Serialize, Deserialize};

/// Insert `value` keeping `items` sorted; duplicates are rejected.
/// Returns true when the value was new.
pub fn insert_sorted<T: Ord>(items: &mut Vec<T>, value: T) -> bool {
    match items.binary_search(&value) {
        Ok(_) => false,
        Err(pos) => {
            items.insert(pos, value);
            true
        }
    }
}

/// Sorted, de-duplicated stems of one field text plus size counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemSet {
    stems: Vec<String>,
    pub total_bytes: usize,
    pub max_len: usize,
}

impl StemSet {
    pub fn new() -> Self {
        StemSet::default()
    }

    pub fn insert(&mut self, stem: String) -> bool {
        let len = stem.len();
        if insert_sorted(&mut self.stems, stem) {
            self.total_bytes += len;
            self.max_len = self.max_len.max(len);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }

    pub fn contains(&self, stem: &str) -> bool {
        self.stems.binary_search_by(|s| s.as_str().cmp(stem)).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.stems.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_sorted_keeps_order_and_rejects_duplicates() {
        let mut items = vec![];
        assert!(insert_sorted(&mut items, 5));
        assert!(insert_sorted(&mut items, 1));
        assert!(insert_sorted(&mut items, 3));
        assert!(!insert_sorted(&mut items, 3));
        assert_eq!(items, vec![1, 3, 5]);
    }

    #[test]
    fn stem_set_tracks_counters_for_new_stems_only() {
        let mut set = StemSet::new();
        set.insert("hello".to_string());
        set.insert("hel".to_string());
        set.insert("hello".to_string());

        assert_eq!(set.len(), 2);
        assert_eq!(set.total_bytes, 8);
        assert_eq!(set.max_len, 5);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["hel", "hello"]);
        assert!(set.contains("hel"));
        assert!(!set.contains("he"));
    }
}
