//! Pipeline Engine - fixed medallion run
//!
//! ```text
//! sales CSV
//!     ↓  load_sales_csv()
//! Vec<SalesRow> ──→ bronze_sales        (every row, fresh ids)
//!     ↓  dedupe_rows()
//! Vec<SalesRow> ──→ silver_sales        (first occurrences, fresh ids)
//!     ↓  GoldAggregates::compute()
//! 3 × Vec<AggregateRecord> ──→ gold_sales_by_region
//!                           ──→ gold_product_performance
//!                           ──→ gold_customer_purchases
//! ```
//!
//! Stages run strictly in sequence. The first error stops the run and is
//! returned as a `StageError` naming the stage. Stages that already
//! committed are left in place: a failed gold write keeps bronze and silver,
//! and a re-run with random ids appends a second bronze/silver copy.

use super::aggregate::GoldAggregates;
use super::db::MedallionWriter;
use super::error::{PipelineError, Stage, StageError};
use super::identity::{assign_ids, IdStrategy};
use super::loader::load_sales_csv;
use super::transform::dedupe_rows;
use super::types::{GoldDimension, SalesLayer, SalesRow};
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

/// Row counts of one completed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub rows_loaded: usize,
    pub bronze_rows: usize,
    pub silver_rows: usize,
    pub duplicates_dropped: usize,
    pub gold_region_rows: usize,
    pub gold_product_rows: usize,
    pub gold_customer_rows: usize,
    pub id_strategy: &'static str,
    pub elapsed_ms: u64,
}

impl RunSummary {
    fn record_gold(&mut self, dimension: GoldDimension, rows: usize) {
        match dimension {
            GoldDimension::Region => self.gold_region_rows = rows,
            GoldDimension::Product => self.gold_product_rows = rows,
            GoldDimension::Customer => self.gold_customer_rows = rows,
        }
    }
}

/// Medallion pipeline bound to one datastore handle
///
/// The handle is borrowed: the caller opens it before the run and closes it
/// afterwards.
pub struct MedallionPipeline<'a, W: MedallionWriter + ?Sized> {
    writer: &'a W,
    id_strategy: IdStrategy,
    stage_timeout: Option<Duration>,
}

impl<'a, W: MedallionWriter + ?Sized> MedallionPipeline<'a, W> {
    pub fn new(writer: &'a W) -> Self {
        Self {
            writer,
            id_strategy: IdStrategy::default(),
            stage_timeout: None,
        }
    }

    pub fn with_id_strategy(mut self, id_strategy: IdStrategy) -> Self {
        self.id_strategy = id_strategy;
        self
    }

    /// Bound each write stage by `timeout` (None disables)
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Load `source_path` and run every stage
    pub async fn run(&self, source_path: impl AsRef<Path>) -> Result<RunSummary, StageError> {
        let source_path = source_path.as_ref();
        log::info!("📥 [{}] Reading {}", Stage::Load, source_path.display());

        let rows = load_sales_csv(source_path).map_err(|e| fail(Stage::Load, e))?;
        self.run_rows(&rows).await
    }

    /// Run bronze → silver → gold over already-loaded rows
    pub async fn run_rows(&self, rows: &[SalesRow]) -> Result<RunSummary, StageError> {
        let started = Instant::now();
        let mut summary = RunSummary {
            rows_loaded: rows.len(),
            id_strategy: self.id_strategy.as_str(),
            ..RunSummary::default()
        };

        log::info!(
            "🥉 [{}] Writing {} rows via {}",
            Stage::Bronze,
            rows.len(),
            self.writer.backend_type()
        );
        let bronze = assign_ids(rows, self.id_strategy);
        summary.bronze_rows = self
            .guarded(Stage::Bronze, self.writer.write_sales(SalesLayer::Bronze, &bronze))
            .await?;

        let silver_rows = dedupe_rows(rows);
        summary.duplicates_dropped = rows.len() - silver_rows.len();
        log::info!(
            "🧹 [{}] {} unique rows ({} duplicates dropped)",
            Stage::Transform,
            silver_rows.len(),
            summary.duplicates_dropped
        );

        log::info!("🥈 [{}] Writing {} rows", Stage::Silver, silver_rows.len());
        let silver = assign_ids(&silver_rows, self.id_strategy);
        summary.silver_rows = self
            .guarded(Stage::Silver, self.writer.write_sales(SalesLayer::Silver, &silver))
            .await?;

        let gold = GoldAggregates::compute(&silver_rows).map_err(|e| fail(Stage::Aggregate, e))?;
        log::info!(
            "📊 [{}] {} regions, {} products, {} customers",
            Stage::Aggregate,
            gold.by_region.len(),
            gold.by_product.len(),
            gold.by_customer.len()
        );

        for dimension in GoldDimension::ALL {
            let records = gold.get(dimension);
            log::info!(
                "🥇 [{}] Writing {} rows to {}",
                Stage::Gold,
                records.len(),
                dimension.table()
            );
            let written = self
                .guarded(Stage::Gold, self.writer.write_aggregates(dimension, records))
                .await?;
            summary.record_gold(dimension, written);
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        log::info!("✅ Medallion run completed in {}ms", summary.elapsed_ms);

        Ok(summary)
    }

    async fn guarded<F>(&self, stage: Stage, write: F) -> Result<usize, StageError>
    where
        F: Future<Output = Result<usize, PipelineError>>,
    {
        let result = match self.stage_timeout {
            Some(limit) => match tokio::time::timeout(limit, write).await {
                Ok(result) => result,
                Err(_) => {
                    self.writer.interrupt();
                    Err(PipelineError::Timeout {
                        stage,
                        secs: limit.as_secs(),
                    })
                }
            },
            None => write.await,
        };

        result.map_err(|e| fail(stage, e))
    }
}

fn fail(stage: Stage, err: PipelineError) -> StageError {
    log::error!("❌ [{}] {}", stage, err);
    StageError::new(stage, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{AggregateRecord, SalesRecord};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory writer recording every call
    #[derive(Default)]
    struct RecordingWriter {
        sales: Mutex<Vec<(SalesLayer, Vec<SalesRecord>)>>,
        gold: Mutex<Vec<(GoldDimension, Vec<AggregateRecord>)>>,
        fail_gold: Option<GoldDimension>,
        delay: Option<Duration>,
        interrupted: AtomicBool,
    }

    #[async_trait]
    impl MedallionWriter for RecordingWriter {
        async fn write_sales(
            &self,
            layer: SalesLayer,
            records: &[SalesRecord],
        ) -> Result<usize, PipelineError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.sales.lock().unwrap().push((layer, records.to_vec()));
            Ok(records.len())
        }

        async fn write_aggregates(
            &self,
            dimension: GoldDimension,
            records: &[AggregateRecord],
        ) -> Result<usize, PipelineError> {
            if self.fail_gold == Some(dimension) {
                return Err(PipelineError::Write {
                    table: dimension.table(),
                    batch: 1,
                    message: "node unavailable".to_string(),
                });
            }
            self.gold.lock().unwrap().push((dimension, records.to_vec()));
            Ok(records.len())
        }

        fn interrupt(&self) {
            self.interrupted.store(true, Ordering::SeqCst);
        }

        fn backend_type(&self) -> &'static str {
            "Recording"
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn row(customer: &str, product: &str, amount: &str, day: u32, region: &str) -> SalesRow {
        SalesRow {
            customer_name: customer.to_string(),
            product_name: product.to_string(),
            sales_amount: dec(amount),
            sales_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            region: region.to_string(),
        }
    }

    fn scenario_rows() -> Vec<SalesRow> {
        vec![
            row("A", "P1", "10.00", 1, "East"),
            row("A", "P1", "10.00", 1, "East"),
            row("B", "P2", "5.00", 2, "West"),
        ]
    }

    #[tokio::test]
    async fn test_scenario_counts_and_gold() {
        let writer = RecordingWriter::default();
        let summary = MedallionPipeline::new(&writer)
            .run_rows(&scenario_rows())
            .await
            .unwrap();

        assert_eq!(summary.rows_loaded, 3);
        assert_eq!(summary.bronze_rows, 3);
        assert_eq!(summary.silver_rows, 2);
        assert_eq!(summary.duplicates_dropped, 1);
        assert_eq!(summary.gold_region_rows, 2);

        let sales = writer.sales.lock().unwrap();
        assert_eq!(sales[0].0, SalesLayer::Bronze);
        assert_eq!(sales[0].1.len(), 3);
        assert_eq!(sales[1].0, SalesLayer::Silver);
        assert_eq!(sales[1].1.len(), 2);

        let gold = writer.gold.lock().unwrap();
        let order: Vec<GoldDimension> = gold.iter().map(|(d, _)| *d).collect();
        assert_eq!(order, GoldDimension::ALL.to_vec());
        assert_eq!(
            gold[0].1,
            vec![
                AggregateRecord::new("East", dec("10.00")),
                AggregateRecord::new("West", dec("5.00")),
            ]
        );
        assert_eq!(
            gold[1].1,
            vec![AggregateRecord::new("P1", dec("10.00")), AggregateRecord::new("P2", dec("5.00"))]
        );
        assert_eq!(
            gold[2].1,
            vec![AggregateRecord::new("A", dec("10.00")), AggregateRecord::new("B", dec("5.00"))]
        );
    }

    #[tokio::test]
    async fn test_random_ids_differ_between_layers() {
        let writer = RecordingWriter::default();
        MedallionPipeline::new(&writer)
            .run_rows(&scenario_rows())
            .await
            .unwrap();

        let sales = writer.sales.lock().unwrap();
        let bronze = &sales[0].1;
        let silver = &sales[1].1;
        assert!(silver.iter().all(|s| bronze.iter().all(|b| b.id != s.id)));
    }

    #[tokio::test]
    async fn test_content_ids_link_layers() {
        let writer = RecordingWriter::default();
        MedallionPipeline::new(&writer)
            .with_id_strategy(IdStrategy::ContentHash)
            .run_rows(&scenario_rows())
            .await
            .unwrap();

        let sales = writer.sales.lock().unwrap();
        assert_eq!(sales[0].1[0].id, sales[1].1[0].id);
        assert_eq!(sales[0].1[2].id, sales[1].1[1].id);
    }

    #[tokio::test]
    async fn test_empty_input_runs_clean() {
        let writer = RecordingWriter::default();
        let summary = MedallionPipeline::new(&writer).run_rows(&[]).await.unwrap();

        assert_eq!(summary.bronze_rows, 0);
        assert_eq!(summary.silver_rows, 0);
        assert_eq!(summary.gold_customer_rows, 0);
        assert!(writer.gold.lock().unwrap().iter().all(|(_, r)| r.is_empty()));
    }

    #[tokio::test]
    async fn test_gold_failure_names_stage_and_stops() {
        let writer = RecordingWriter {
            fail_gold: Some(GoldDimension::Product),
            ..RecordingWriter::default()
        };

        let err = MedallionPipeline::new(&writer)
            .run_rows(&scenario_rows())
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Gold);
        assert!(err.to_string().contains("gold_product_performance"));

        // Region written before the failure, customer never attempted
        let gold = writer.gold.lock().unwrap();
        assert_eq!(gold.len(), 1);
        assert_eq!(gold[0].0, GoldDimension::Region);
        assert_eq!(writer.sales.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stage_timeout_interrupts_writer() {
        let writer = RecordingWriter {
            delay: Some(Duration::from_secs(5)),
            ..RecordingWriter::default()
        };

        let err = MedallionPipeline::new(&writer)
            .with_stage_timeout(Some(Duration::from_millis(20)))
            .run_rows(&scenario_rows())
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Bronze);
        assert!(matches!(err.source, PipelineError::Timeout { stage: Stage::Bronze, .. }));
        assert!(writer.interrupted.load(Ordering::SeqCst));
        assert!(writer.sales.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_source_fails_load_without_writes() {
        let writer = RecordingWriter::default();
        let err = MedallionPipeline::new(&writer)
            .run("/nonexistent/sales.csv")
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Load);
        assert!(matches!(err.source, PipelineError::NotFound(_)));
        assert!(writer.sales.lock().unwrap().is_empty());
        assert!(writer.gold.lock().unwrap().is_empty());
    }
}
