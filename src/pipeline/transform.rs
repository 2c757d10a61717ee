//! Silver transform: first-occurrence deduplication
//!
//! Two rows are duplicates iff all five business fields are equal.
//! Survivors keep the order of their first occurrence.

use super::types::SalesRow;
use std::collections::HashSet;

/// Drop every row that repeats an earlier row
pub fn dedupe_rows(rows: &[SalesRow]) -> Vec<SalesRow> {
    let mut seen: HashSet<&SalesRow> = HashSet::with_capacity(rows.len());
    rows.iter()
        .filter(|row| seen.insert(*row))
        .cloned()
        .collect()
}
