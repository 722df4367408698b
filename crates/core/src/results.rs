use std::collections::VecDeque;

use crate::query_runner::QueryRow;

#[derive(Debug, Clone)]
pub struct ResultsRingBuffer<T> {
    capacity: usize,
    rows: VecDeque<T>,
    total_rows_seen: u64,
}

impl<T> ResultsRingBuffer<T> {
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            rows: VecDeque::with_capacity(capacity.min(4096)),
            total_rows_seen: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn total_rows_seen(&self) -> u64 {
        self.total_rows_seen
    }

    #[must_use]
    pub fn earliest_buffered_index(&self) -> u64 {
        self.total_rows_seen.saturating_sub(self.rows.len() as u64)
    }

    pub fn push(&mut self, row: T) {
        if self.rows.len() == self.capacity {
            self.rows.pop_front();
        }
        self.rows.push_back(row);
        self.total_rows_seen += 1;
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.total_rows_seen = 0;
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.iter()
    }

    #[must_use]
    pub fn visible_rows(&self, start: usize, limit: usize) -> Vec<&T> {
        if limit == 0 || start >= self.rows.len() {
            return Vec::new();
        }

        self.rows.iter().skip(start).take(limit).collect()
    }
}

/// Columns plus the buffered rows of the last executed statement.
#[derive(Debug, Clone)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: ResultsRingBuffer<QueryRow>,
}

impl ResultSet {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            columns: Vec::new(),
            rows: ResultsRingBuffer::new(capacity),
        }
    }

    pub fn reset(&mut self, columns: Vec<String>) {
        self.columns = columns;
        self.rows.clear();
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.rows.capacity()
    }

    #[must_use]
    pub fn total_rows_seen(&self) -> u64 {
        self.rows.total_rows_seen()
    }

    /// Rows that were streamed but evicted from the buffer.
    #[must_use]
    pub fn dropped_rows(&self) -> u64 {
        self.rows.earliest_buffered_index()
    }

    pub fn push_row(&mut self, row: QueryRow) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&QueryRow> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> impl Iterator<Item = &QueryRow> {
        self.rows.iter()
    }

    #[must_use]
    pub fn visible_rows(&self, start: usize, limit: usize) -> Vec<&QueryRow> {
        self.rows.visible_rows(start, limit)
    }

    /// Next row after `after` (wrapping) with a cell containing `needle`,
    /// compared case-insensitively.
    #[must_use]
    pub fn find_next(&self, needle: &str, after: Option<usize>) -> Option<usize> {
        let needle = needle.trim().to_lowercase();
        let len = self.rows.len();
        if needle.is_empty() || len == 0 {
            return None;
        }

        let start = after.map_or(0, |index| (index + 1) % len);
        (0..len).map(|offset| (start + offset) % len).find(|&index| {
            self.rows.get(index).is_some_and(|row| {
                (0..row.values.len()).any(|column| row.display(column).to_lowercase().contains(&needle))
            })
        })
    }

    #[must_use]
    pub fn null_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.columns.len()];
        for row in self.rows.iter() {
            for (count, value) in counts.iter_mut().zip(&row.values) {
                if value.is_none() {
                    *count += 1;
                }
            }
        }
        counts
    }

    /// Display width per column: the widest of header and buffered cells,
    /// capped at `max_width`.
    #[must_use]
    pub fn column_widths(&self, max_width: usize) -> Vec<usize> {
        let mut widths = self
            .columns
            .iter()
            .map(|column| column.chars().count())
            .collect::<Vec<_>>();
        for row in self.rows.iter() {
            for (index, width) in widths.iter_mut().enumerate() {
                *width = (*width).max(row.display(index).chars().count());
            }
        }
        widths
            .into_iter()
            .map(|width| width.clamp(1, max_width.max(1)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{ResultSet, ResultsRingBuffer};
    use crate::query_runner::QueryRow;

    fn sample_results() -> ResultSet {
        let mut results = ResultSet::new(10);
        results.reset(vec!["id".to_string(), "email".to_string()]);
        results.push_row(QueryRow::from_text(["1", "ann@example.com"]));
        results.push_row(QueryRow::new(vec![Some("2".to_string()), None]));
        results.push_row(QueryRow::from_text(["3", "Bob@Example.com"]));
        results
    }

    #[test]
    fn keeps_memory_bounded_to_capacity() {
        let mut buffer = ResultsRingBuffer::new(3);
        buffer.push("r1");
        buffer.push("r2");
        buffer.push("r3");
        buffer.push("r4");

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.total_rows_seen(), 4);
        assert_eq!(buffer.earliest_buffered_index(), 1);
        assert_eq!(buffer.get(0), Some(&"r2"));
        assert_eq!(buffer.get(2), Some(&"r4"));
    }

    #[test]
    fn visible_rows_returns_requested_window() {
        let mut buffer = ResultsRingBuffer::new(5);
        for value in [10, 20, 30, 40] {
            buffer.push(value);
        }

        assert_eq!(buffer.visible_rows(1, 2), vec![&20, &30]);
        assert_eq!(buffer.visible_rows(3, 10), vec![&40]);
        assert!(buffer.visible_rows(4, 1).is_empty());
    }

    #[test]
    fn reset_replaces_columns_and_clears_rows() {
        let mut results = sample_results();
        results.reset(vec!["count".to_string()]);

        assert_eq!(results.columns(), ["count".to_string()]);
        assert!(results.is_empty());
        assert_eq!(results.total_rows_seen(), 0);
    }

    #[test]
    fn search_is_case_insensitive_and_wraps() {
        let results = sample_results();

        assert_eq!(results.find_next("example.com", None), Some(0));
        assert_eq!(results.find_next("EXAMPLE", Some(0)), Some(2));
        assert_eq!(results.find_next("example", Some(2)), Some(0));
        assert_eq!(results.find_next("null", None), Some(1));
        assert_eq!(results.find_next("missing", None), None);
        assert_eq!(results.find_next("  ", None), None);
    }

    #[test]
    fn column_stats_cover_nulls_and_widths() {
        let results = sample_results();

        assert_eq!(results.null_counts(), vec![0, 1]);
        assert_eq!(results.column_widths(40), vec![2, 15]);
        assert_eq!(results.column_widths(8), vec![2, 8]);
    }
}
