//! Gold aggregation: group-by-sum over silver rows
//!
//! Keys compare as exact strings (case-sensitive, untrimmed). Totals use
//! `Decimal` checked addition, so the result does not depend on row order.
//! Output is sorted by key.

use super::error::PipelineError;
use super::types::{AggregateRecord, GoldDimension, SalesRow};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Sum `sales_amount` per key of `dimension`
///
/// Fails with `PipelineError::Validation` if a total overflows `Decimal`.
pub fn aggregate_by(
    rows: &[SalesRow],
    dimension: GoldDimension,
) -> Result<Vec<AggregateRecord>, PipelineError> {
    let mut totals: BTreeMap<&str, Decimal> = BTreeMap::new();

    for row in rows {
        let key = dimension.key_of(row);
        let total = totals.entry(key).or_insert(Decimal::ZERO);
        *total = total.checked_add(row.sales_amount).ok_or_else(|| {
            PipelineError::Validation(format!(
                "{} total for '{}' overflows decimal range",
                dimension.as_str(),
                key
            ))
        })?;
    }

    Ok(totals
        .into_iter()
        .map(|(key, total)| AggregateRecord::new(key, total))
        .collect())
}

/// The three gold reductions of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GoldAggregates {
    pub by_region: Vec<AggregateRecord>,
    pub by_product: Vec<AggregateRecord>,
    pub by_customer: Vec<AggregateRecord>,
}

impl GoldAggregates {
    pub fn compute(rows: &[SalesRow]) -> Result<Self, PipelineError> {
        Ok(Self {
            by_region: aggregate_by(rows, GoldDimension::Region)?,
            by_product: aggregate_by(rows, GoldDimension::Product)?,
            by_customer: aggregate_by(rows, GoldDimension::Customer)?,
        })
    }

    pub fn get(&self, dimension: GoldDimension) -> &[AggregateRecord] {
        match dimension {
            GoldDimension::Region => &self.by_region,
            GoldDimension::Product => &self.by_product,
            GoldDimension::Customer => &self.by_customer,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_region.is_empty() && self.by_product.is_empty() && self.by_customer.is_empty()
    }
}
