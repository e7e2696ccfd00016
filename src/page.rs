use serde::Serialize;

/// Sentinel `total` for queries that do not project a count column.
pub const UNKNOWN_TOTAL: i64 = -1;

/// One page of mapped rows, as returned by [`crate::QueryOps::query_page`].
///
/// `total` is read from the query's count column; it is [`UNKNOWN_TOTAL`] when the
/// query has no such column or returned no rows. The sentinel assumes the query
/// never computes a negative count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    items: Vec<T>,
    total: i64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: i64) -> Self {
        Self { items, total }
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    pub fn total(&self) -> i64 {
        self.total
    }

    /// `total` without the sentinel.
    #[must_use]
    pub fn total_if_known(&self) -> Option<u64> {
        u64::try_from(self.total).ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Transform the items, keeping `total`.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_total_has_no_known_value() {
        let page: Page<i32> = Page::new(vec![], UNKNOWN_TOTAL);
        assert_eq!(page.total_if_known(), None);
        assert!(page.is_empty());
    }

    #[test]
    fn map_keeps_total() {
        let page = Page::new(vec![1, 2], 9).map(|n| n * 10);
        assert_eq!(page.items(), [10, 20]);
        assert_eq!(page.total_if_known(), Some(9));
    }

    #[test]
    fn serializes_items_and_total() {
        let json = serde_json::to_value(Page::new(vec!["a"], 1)).unwrap();
        assert_eq!(json, serde_json::json!({ "items": ["a"], "total": 1 }));
    }
}
