//! Append-only result table shared by the workers of one batch.
//!
//! Appends take a single mutex covering both the rows and the set of codes
//! already present, so a row is either fully inserted or rejected, and a
//! code can appear at most once. Reading requires ownership
//! ([`ResultTable::into_rows`]), which the dispatch engine only regains
//! after every worker has joined.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use pricespan_core::domain::AggregateRow;

/// Result of one append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    Inserted,
    /// A row with this code is already in the table; the new row was dropped.
    Duplicate,
}

#[derive(Debug, Default)]
struct Rows {
    rows: Vec<AggregateRow>,
    codes: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct ResultTable {
    inner: Mutex<Rows>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty table sized for `capacity` rows.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Rows {
                rows: Vec::with_capacity(capacity),
                codes: HashSet::with_capacity(capacity),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Rows> {
        // rows are pushed whole; a poisoned guard never holds a torn row
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert `row` unless its code is already present.
    pub fn append(&self, row: AggregateRow) -> Append {
        let mut inner = self.lock();
        if !inner.codes.insert(row.code.clone()) {
            return Append::Duplicate;
        }
        inner.rows.push(row);
        Append::Inserted
    }

    /// Rows inserted so far.
    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the table, yielding rows in insertion order.
    pub fn into_rows(self) -> Vec<AggregateRow> {
        self.inner
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn row(code: &str) -> AggregateRow {
        AggregateRow {
            code: code.into(),
            display_name: format!("name-{code}"),
            last_price: Some(1.0),
            period_max: 2.0,
            period_min: 0.5,
        }
    }

    #[test]
    fn append_and_drain() {
        let table = ResultTable::new();
        assert!(table.is_empty());
        assert_eq!(table.append(row("600000")), Append::Inserted);
        assert_eq!(table.append(row("000001")), Append::Inserted);
        let rows = table.into_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].code, "600000");
    }

    #[test]
    fn duplicate_code_rejected() {
        let table = ResultTable::new();
        assert_eq!(table.append(row("600000")), Append::Inserted);
        assert_eq!(table.append(row("600000")), Append::Duplicate);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn concurrent_appends_lose_nothing() {
        let table = Arc::new(ResultTable::with_capacity(800));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for i in 0..100 {
                        table.append(row(&format!("{:06}", t * 100 + i)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let rows = Arc::try_unwrap(table).unwrap().into_rows();
        assert_eq!(rows.len(), 800);
        let unique: HashSet<_> = rows.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(unique.len(), 800);
    }

    #[test]
    fn concurrent_duplicates_insert_once() {
        let table = Arc::new(ResultTable::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                thread::spawn(move || table.append(row("600000")))
            })
            .collect();
        let inserted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|a| *a == Append::Inserted)
            .count();
        assert_eq!(inserted, 1);
        assert_eq!(table.len(), 1);
    }
}
