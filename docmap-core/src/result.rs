//! Ordered query results.

use std::ops::Deref;

use crate::document::Record;

/// The ordered, read-only result of a lookup.
///
/// Results keep the order the backend returned them in and dereference to a slice.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T = Record> {
    items: Vec<T>,
}

impl<T> QueryResult<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn first_or_none(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn last_or_none(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn into_first(self) -> Option<T> {
        self.items.into_iter().next()
    }

    pub fn into_last(mut self) -> Option<T> {
        self.items.pop()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T> Default for QueryResult<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Deref for QueryResult<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> From<Vec<T>> for QueryResult<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> FromIterator<T> for QueryResult<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self { items: iter.into_iter().collect() }
    }
}

impl<T> IntoIterator for QueryResult<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a QueryResult<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_results_have_no_ends() {
        let result = QueryResult::<u32>::default();

        assert!(result.is_empty());
        assert_eq!(result.first_or_none(), None);
        assert_eq!(result.last_or_none(), None);
        assert_eq!(result.into_first(), None);
    }

    #[test]
    fn ends_follow_result_order() {
        let result: QueryResult<u32> = [3, 1, 2].into_iter().collect();

        assert_eq!(result.len(), 3);
        assert_eq!(result.first_or_none(), Some(&3));
        assert_eq!(result.last_or_none(), Some(&2));
        assert_eq!(result[1], 1);
        assert_eq!(result.clone().into_last(), Some(2));
        assert_eq!(result.into_vec(), vec![3, 1, 2]);
    }
}
