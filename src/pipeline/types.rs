//! Core data structures for the medallion layers
//!
//! - `SalesRow` - business fields of one source line (no identity)
//! - `SalesRecord` - a `SalesRow` with the id assigned at write time
//! - `AggregateRecord` - one (group key, total) pair of a gold table
//!
//! Table names match the migrations in `/sql/`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Date format of `SalesDate` in the source file and `sales_date` at rest
pub const SALES_DATE_FORMAT: &str = "%Y-%m-%d";

/// One sales line, compared by all five business fields
///
/// `sales_amount` compares numerically, so `10.0` and `10.00` are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SalesRow {
    pub customer_name: String,
    pub product_name: String,
    pub sales_amount: Decimal,
    pub sales_date: NaiveDate,
    pub region: String,
}

impl SalesRow {
    /// `sales_date` rendered as stored (`YYYY-MM-DD`)
    pub fn sales_date_str(&self) -> String {
        self.sales_date.format(SALES_DATE_FORMAT).to_string()
    }
}

/// A sales row as persisted in `bronze_sales` / `silver_sales`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub id: Uuid,
    pub row: SalesRow,
}

/// One row of a gold table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub group_key: String,
    pub total: Decimal,
}

impl AggregateRecord {
    pub fn new(group_key: impl Into<String>, total: Decimal) -> Self {
        Self {
            group_key: group_key.into(),
            total,
        }
    }
}

/// Row-level layers (one row per sales line)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SalesLayer {
    Bronze,
    Silver,
}

impl SalesLayer {
    pub fn table(&self) -> &'static str {
        match self {
            SalesLayer::Bronze => "bronze_sales",
            SalesLayer::Silver => "silver_sales",
        }
    }
}

/// Analytical dimension of a gold table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoldDimension {
    Region,
    Product,
    Customer,
}

impl GoldDimension {
    /// All gold dimensions in write order
    pub const ALL: [GoldDimension; 3] = [
        GoldDimension::Region,
        GoldDimension::Product,
        GoldDimension::Customer,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            GoldDimension::Region => "gold_sales_by_region",
            GoldDimension::Product => "gold_product_performance",
            GoldDimension::Customer => "gold_customer_purchases",
        }
    }

    pub fn key_column(&self) -> &'static str {
        match self {
            GoldDimension::Region => "region",
            GoldDimension::Product => "product_name",
            GoldDimension::Customer => "customer_name",
        }
    }

    pub fn total_column(&self) -> &'static str {
        match self {
            GoldDimension::Region | GoldDimension::Product => "total_sales",
            GoldDimension::Customer => "total_spent",
        }
    }

    /// Grouping key of `row` for this dimension
    pub fn key_of<'a>(&self, row: &'a SalesRow) -> &'a str {
        match self {
            GoldDimension::Region => &row.region,
            GoldDimension::Product => &row.product_name,
            GoldDimension::Customer => &row.customer_name,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GoldDimension::Region => "region",
            GoldDimension::Product => "product",
            GoldDimension::Customer => "customer",
        }
    }
}
