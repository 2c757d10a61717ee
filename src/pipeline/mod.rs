//! # Medallion Pipeline
//!
//! One-shot batch ETL that refines a sales CSV through three layers:
//!
//! 1. **Bronze** - every source row, verbatim, with a generated id
//! 2. **Silver** - rows deduplicated on all five business fields
//! 3. **Gold** - sales totals per region, per product and per customer
//!
//! ## Architecture
//!
//! ```text
//! loader → bronze write → transform → silver write → aggregate → gold writes
//! ```
//!
//! Every stage runs once, in order, against a single datastore handle.
//! The first failure aborts the run (no retries, no rollback of stages that
//! already committed).
//!
//! ## Schema Reference
//!
//! Tables are created by the migrations in `/sql/`:
//! - `bronze_sales`, `silver_sales` → `SalesRecord`
//! - `gold_sales_by_region`, `gold_product_performance`,
//!   `gold_customer_purchases` → `AggregateRecord`
//!
//! ## Module Organization
//!
//! - `types` - Core data structures (SalesRow, SalesRecord, AggregateRecord)
//! - `error` - Error taxonomy and stage tagging
//! - `config` - Environment configuration
//! - `loader` - CSV source loader
//! - `transform` - Silver deduplication
//! - `aggregate` - Gold reductions
//! - `identity` - Id generation strategies
//! - `db` - Batched SQLite writer and reader
//! - `report` - Gold table rendering
//! - `engine` - Stage orchestration

pub mod types;
pub mod error;
pub mod config;
pub mod loader;
pub mod transform;
pub mod aggregate;
pub mod identity;
pub mod db;
pub mod report;
pub mod engine;

// Re-export commonly used types
pub use types::{AggregateRecord, GoldDimension, SalesLayer, SalesRecord, SalesRow};
pub use error::{ConfigError, PipelineError, Stage, StageError};
pub use config::PipelineConfig;
pub use aggregate::GoldAggregates;
pub use identity::IdStrategy;
pub use db::{MedallionReader, MedallionWriter, SqliteMedallionStore};
pub use engine::{MedallionPipeline, RunSummary};
