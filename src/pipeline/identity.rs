//! Row identity assigned at write time
//!
//! `Random` gives every written record a fresh v4 UUID, so the bronze and
//! silver copies of one source line are unrelated and a re-run writes new ids.
//!
//! `ContentHash` derives a v5 UUID from the business fields plus the row's
//! occurrence index among identical rows. The first occurrence of a line in
//! bronze and its silver copy share an id, and re-runs reproduce the same ids.

use super::types::{SalesRecord, SalesRow};
use std::collections::HashMap;
use uuid::Uuid;

/// Namespace for content-derived sales ids
const SALES_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6d65_6461_6c6c_696f_6e2d_7361_6c65_7301);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdStrategy {
    #[default]
    Random,
    ContentHash,
}

impl IdStrategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "random" => Some(IdStrategy::Random),
            "content" | "content_hash" => Some(IdStrategy::ContentHash),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IdStrategy::Random => "random",
            IdStrategy::ContentHash => "content",
        }
    }
}

/// Attach an id to every row, preserving order and duplicates
pub fn assign_ids(rows: &[SalesRow], strategy: IdStrategy) -> Vec<SalesRecord> {
    match strategy {
        IdStrategy::Random => rows
            .iter()
            .map(|row| SalesRecord {
                id: Uuid::new_v4(),
                row: row.clone(),
            })
            .collect(),
        IdStrategy::ContentHash => {
            let mut occurrences: HashMap<&SalesRow, u32> = HashMap::new();
            rows.iter()
                .map(|row| {
                    let seen = occurrences.entry(row).or_insert(0);
                    let id = content_id(row, *seen);
                    *seen += 1;
                    SalesRecord {
                        id,
                        row: row.clone(),
                    }
                })
                .collect()
        }
    }
}

fn content_id(row: &SalesRow, occurrence: u32) -> Uuid {
    // Unit separator keeps field boundaries unambiguous
    let key = format!(
        "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
        row.customer_name,
        row.product_name,
        row.sales_amount.normalize(),
        row.sales_date_str(),
        row.region,
        occurrence
    );
    Uuid::new_v5(&SALES_ID_NAMESPACE, key.as_bytes())
}
