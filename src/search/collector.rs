use tracing::{debug, warn};
use crate::core::types::DocId;
use crate::storage::engine::{NativeQuery, ReadableStore};

/// Identifiers of matching documents, newest handle first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub ids: Vec<DocId>,
    /// False when a store error cut collection short.
    pub complete: bool,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: DocId) -> bool {
        self.ids.contains(&id)
    }

    pub fn values(&self) -> impl Iterator<Item = u64> + '_ {
        self.ids.iter().map(|id| id.value())
    }
}

pub struct ResultCollector;

impl ResultCollector {
    /// Page through `query` until a short page comes back or `limit` is reached.
    pub fn execute(
        query: &NativeQuery,
        store: &dyn ReadableStore,
        page_size: usize,
        limit: Option<usize>,
    ) -> ResultSet {
        let page_size = page_size.max(1);
        let mut result = ResultSet { ids: Vec::new(), complete: true };
        let mut offset = 0;

        loop {
            let want = match limit {
                Some(limit) => page_size.min(limit.saturating_sub(result.ids.len())),
                None => page_size,
            };
            if want == 0 {
                break;
            }

            let page = match store.execute(query, offset, want) {
                Ok(page) => page,
                Err(e) => {
                    warn!(offset, collected = result.ids.len(), error = %e, "query aborted, returning partial results");
                    result.complete = false;
                    break;
                }
            };

            let got = page.len();
            result.ids.extend(page.into_iter().map(|m| DocId(m.value)));
            offset += got;

            if got < want {
                break;
            }
        }

        debug!(hits = result.ids.len(), "collection finished");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use crate::core::error::{Error, ErrorKind, Result};
    use crate::storage::engine::Match;

    /// Store with `total` matches (values descending) that fails from `fail_at` on.
    struct PagedStore {
        total: usize,
        fail_at: Option<usize>,
        calls: Mutex<Vec<(usize, usize)>>,
    }

    impl PagedStore {
        fn new(total: usize) -> Self {
            PagedStore { total, fail_at: None, calls: Mutex::new(Vec::new()) }
        }
    }

    impl ReadableStore for PagedStore {
        fn execute(&self, _query: &NativeQuery, offset: usize, count: usize) -> Result<Vec<Match>> {
            self.calls.lock().push((offset, count));
            if self.fail_at.is_some_and(|at| offset >= at) {
                return Err(Error::new(ErrorKind::Store, "page unreadable".to_string()));
            }
            let end = (offset + count).min(self.total);
            Ok((offset..end)
                .map(|i| {
                    let handle = (self.total - i) as u32;
                    Match { handle, value: handle as u64 * 10 }
                })
                .collect())
        }

        fn reopen(&mut self) -> Result<()> {
            Ok(())
        }

        fn doc_count(&self) -> u64 {
            self.total as u64
        }
    }

    #[test]
    fn collects_every_page_until_a_short_one() {
        let store = PagedStore::new(250);
        let result = ResultCollector::execute(&NativeQuery::MatchAll, &store, 100, None);

        assert_eq!(result.len(), 250);
        assert!(result.complete);
        assert_eq!(result.ids[0], DocId(2500));
        assert_eq!(*store.calls.lock(), vec![(0, 100), (100, 100), (200, 100)]);
    }

    #[test]
    fn exact_multiple_needs_one_empty_page() {
        let store = PagedStore::new(200);
        let result = ResultCollector::execute(&NativeQuery::MatchAll, &store, 100, None);
        assert_eq!(result.len(), 200);
        assert_eq!(store.calls.lock().len(), 3);
    }

    #[test]
    fn limit_caps_the_last_page() {
        let store = PagedStore::new(500);
        let result = ResultCollector::execute(&NativeQuery::MatchAll, &store, 100, Some(150));

        assert_eq!(result.len(), 150);
        assert_eq!(*store.calls.lock(), vec![(0, 100), (100, 50)]);
    }

    #[test]
    fn store_error_returns_partial_set() {
        let store = PagedStore { fail_at: Some(100), ..PagedStore::new(300) };
        let result = ResultCollector::execute(&NativeQuery::MatchAll, &store, 100, None);

        assert_eq!(result.len(), 100);
        assert!(!result.complete);
    }

    #[test]
    fn no_matches_is_an_empty_complete_set() {
        let store = PagedStore::new(0);
        let result = ResultCollector::execute(&NativeQuery::MatchNothing, &store, 100, None);
        assert!(result.is_empty());
        assert!(result.complete);
    }
}
