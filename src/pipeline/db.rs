//! Medallion datastore on SQLite
//!
//! Tables (see `/sql/` directory):
//! - `bronze_sales`, `silver_sales` - INSERT, one row per record; an id that
//!   is already stored is skipped (content-derived ids make re-runs no-ops)
//! - `gold_sales_by_region`, `gold_product_performance`,
//!   `gold_customer_purchases` - UPSERT on the group key
//!
//! Every write call is one transaction. Inside it, records are sent as
//! multi-row INSERT statements of `batch_size` rows each. A failing batch
//! rolls back the whole call, so a stage is either fully written or not at
//! all. Earlier stages are never rolled back.

use super::error::PipelineError;
use super::types::{
    AggregateRecord, GoldDimension, SalesLayer, SalesRecord, SalesRow, SALES_DATE_FORMAT,
};
use crate::sqlite_pragma::apply_optimized_pragmas;
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params_from_iter, Connection, InterruptHandle, Transaction};
use rust_decimal::Decimal;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// SQLite bound-parameter limit (SQLITE_MAX_VARIABLE_NUMBER, 3.32+)
pub const MAX_SQL_VARIABLES: usize = 32_766;

/// How long `close()` waits for an abandoned write to finish
const CLOSE_WAIT: Duration = Duration::from_secs(5);
const CLOSE_POLL: Duration = Duration::from_millis(10);

const SALES_COLUMNS: [&str; 6] = [
    "id",
    "customer_name",
    "product_name",
    "sales_amount",
    "sales_date",
    "region",
];

/// Batched-write seam used by the pipeline engine
///
/// Implementations must write all records of one call as a single unit:
/// either every record is persisted or the call fails.
#[async_trait]
pub trait MedallionWriter: Send + Sync {
    /// Insert bronze or silver records
    ///
    /// Returns the number of rows written.
    async fn write_sales(
        &self,
        layer: SalesLayer,
        records: &[SalesRecord],
    ) -> Result<usize, PipelineError>;

    /// Upsert one gold table
    ///
    /// Returns the number of rows written.
    async fn write_aggregates(
        &self,
        dimension: GoldDimension,
        records: &[AggregateRecord],
    ) -> Result<usize, PipelineError>;

    /// Abort the in-flight write, if any
    fn interrupt(&self) {}

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

/// Read-back used by the reporter and verification
#[async_trait]
pub trait MedallionReader: Send + Sync {
    /// Gold rows ordered by group key
    async fn read_gold(&self, dimension: GoldDimension)
        -> Result<Vec<AggregateRecord>, PipelineError>;

    /// Sales rows in insertion order
    async fn read_sales(&self, layer: SalesLayer) -> Result<Vec<SalesRecord>, PipelineError>;
}

/// Run schema migrations from SQL files
///
/// Reads all .sql files from `schema_dir` and executes them in file-name
/// order (00_, 01_, 02_, ...). All files must use `IF NOT EXISTS` clauses.
///
/// Returns the number of files executed.
pub fn run_schema_migrations(
    conn: &Connection,
    schema_dir: impl AsRef<Path>,
) -> Result<usize, PipelineError> {
    let schema_path = schema_dir.as_ref();

    if !schema_path.is_dir() {
        return Err(PipelineError::Connection(format!(
            "Schema directory not found: {}",
            schema_path.display()
        )));
    }

    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();

    sql_files.sort();

    log::info!("🔧 Running schema migrations from: {}", schema_path.display());

    for path in &sql_files {
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();

        log::info!("   ├─ Executing: {}", filename);

        let sql_content = fs::read_to_string(path)?;
        conn.execute_batch(&sql_content).map_err(|e| {
            PipelineError::Connection(format!("Migration {} failed: {}", filename, e))
        })?;
    }

    log::info!("   └─ ✅ {} schema files applied", sql_files.len());

    Ok(sql_files.len())
}

/// SQLite implementation of the medallion store
///
/// Owns the single process-wide connection. Open it once at startup, pass
/// it by reference to every stage, and `close()` it at shutdown.
pub struct SqliteMedallionStore {
    conn: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
    cancelled: Arc<AtomicBool>,
    batch_size: usize,
}

impl SqliteMedallionStore {
    /// Open (or create) the database file and apply PRAGMAs
    ///
    /// Does NOT create tables; call `migrate()` afterwards.
    pub fn open(db_path: impl AsRef<Path>, batch_size: usize) -> Result<Self, PipelineError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                PipelineError::Connection(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| {
            PipelineError::Connection(format!("Failed to open {}: {}", db_path.display(), e))
        })?;
        apply_optimized_pragmas(&conn)?;

        let interrupt = Arc::new(conn.get_interrupt_handle());

        log::info!("✅ SQLite medallion store opened: {}", db_path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
            cancelled: Arc::new(AtomicBool::new(false)),
            batch_size: batch_size.max(1),
        })
    }

    /// Apply the `*.sql` files in `schema_dir`
    pub fn migrate(&self, schema_dir: impl AsRef<Path>) -> Result<usize, PipelineError> {
        let conn = lock(&self.conn)?;
        run_schema_migrations(&conn, schema_dir)
    }

    /// Row count of one of the medallion tables
    pub fn count_rows(&self, table: &'static str) -> Result<i64, PipelineError> {
        let conn = lock(&self.conn)?;
        let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    /// Release the connection
    ///
    /// A write abandoned by a stage timeout keeps running on the blocking
    /// pool until its interrupt lands; wait up to `CLOSE_WAIT` for it to
    /// hand the connection back.
    pub async fn close(self) -> Result<(), PipelineError> {
        let deadline = Instant::now() + CLOSE_WAIT;
        let mut shared = self.conn;

        let conn = loop {
            match Arc::try_unwrap(shared) {
                Ok(conn) => break conn,
                Err(still_shared) => {
                    if Instant::now() >= deadline {
                        return Err(PipelineError::Connection(
                            "store connection still in use".to_string(),
                        ));
                    }
                    shared = still_shared;
                    tokio::time::sleep(CLOSE_POLL).await;
                }
            }
        };

        let conn = conn
            .into_inner()
            .map_err(|_| PipelineError::Connection("connection mutex poisoned".to_string()))?;

        conn.close()
            .map_err(|(_, e)| PipelineError::Connection(format!("Failed to close: {}", e)))?;

        log::info!("🔌 SQLite medallion store closed");
        Ok(())
    }

    fn begin_write(&self) -> WriteContext {
        self.cancelled.store(false, Ordering::SeqCst);
        WriteContext {
            conn: Arc::clone(&self.conn),
            cancelled: Arc::clone(&self.cancelled),
            batch_size: self.batch_size,
        }
    }
}

/// Everything a blocking write task needs
struct WriteContext {
    conn: Arc<Mutex<Connection>>,
    cancelled: Arc<AtomicBool>,
    batch_size: usize,
}

#[async_trait]
impl MedallionWriter for SqliteMedallionStore {
    async fn write_sales(
        &self,
        layer: SalesLayer,
        records: &[SalesRecord],
    ) -> Result<usize, PipelineError> {
        let ctx = self.begin_write();
        let records = records.to_vec();

        tokio::task::spawn_blocking(move || -> Result<usize, PipelineError> {
            let mut conn = lock(&ctx.conn)?;
            let tx = conn.transaction()?;
            let table = layer.table();

            let chunk_rows = rows_per_statement(ctx.batch_size, SALES_COLUMNS.len());
            let sql = |rows: usize| {
                format!(
                    "INSERT INTO {} ({}) VALUES {} ON CONFLICT(id) DO NOTHING",
                    table,
                    SALES_COLUMNS.join(", "),
                    placeholders(rows, SALES_COLUMNS.len())
                )
            };

            let batches = write_chunks(&tx, table, &records, chunk_rows, &ctx.cancelled, sql, |r| {
                sales_values(r).to_vec()
            })?;
            commit(tx, table, batches)?;

            log::debug!(
                "✅ Flushed {} rows to {} in {} batches",
                records.len(),
                table,
                batches
            );
            Ok(records.len())
        })
        .await
        .map_err(|e| PipelineError::Connection(format!("write task failed: {}", e)))?
    }

    async fn write_aggregates(
        &self,
        dimension: GoldDimension,
        records: &[AggregateRecord],
    ) -> Result<usize, PipelineError> {
        let ctx = self.begin_write();
        let records = records.to_vec();

        tokio::task::spawn_blocking(move || -> Result<usize, PipelineError> {
            let mut conn = lock(&ctx.conn)?;
            let tx = conn.transaction()?;
            let table = dimension.table();
            let key = dimension.key_column();
            let total = dimension.total_column();

            let chunk_rows = rows_per_statement(ctx.batch_size, 2);
            let sql = |rows: usize| {
                format!(
                    "INSERT INTO {table} ({key}, {total}) VALUES {values}
                     ON CONFLICT({key}) DO UPDATE SET {total} = excluded.{total}",
                    values = placeholders(rows, 2)
                )
            };

            let batches = write_chunks(&tx, table, &records, chunk_rows, &ctx.cancelled, sql, |r| {
                vec![r.group_key.clone(), r.total.to_string()]
            })?;
            commit(tx, table, batches)?;

            log::debug!(
                "✅ Upserted {} rows to {} in {} batches",
                records.len(),
                table,
                batches
            );
            Ok(records.len())
        })
        .await
        .map_err(|e| PipelineError::Connection(format!("write task failed: {}", e)))?
    }

    fn interrupt(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.interrupt.interrupt();
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}

#[async_trait]
impl MedallionReader for SqliteMedallionStore {
    async fn read_gold(
        &self,
        dimension: GoldDimension,
    ) -> Result<Vec<AggregateRecord>, PipelineError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {key}, {total} FROM {table} ORDER BY {key}",
            key = dimension.key_column(),
            total = dimension.total_column(),
            table = dimension.table(),
        ))?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (group_key, total) = row?;
            records.push(AggregateRecord {
                total: parse_stored(dimension.table(), "total", &total, |s| {
                    Decimal::from_str(s).ok()
                })?,
                group_key,
            });
        }

        Ok(records)
    }

    async fn read_sales(&self, layer: SalesLayer) -> Result<Vec<SalesRecord>, PipelineError> {
        let table = layer.table();
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY rowid",
            SALES_COLUMNS.join(", "),
            table
        ))?;

        let rows = stmt.query_map([], |row| {
            let mut values: [String; 6] = Default::default();
            for (i, value) in values.iter_mut().enumerate() {
                *value = row.get(i)?;
            }
            Ok(values)
        })?;

        let mut records = Vec::new();
        for row in rows {
            let [id, customer_name, product_name, amount, date, region] = row?;
            records.push(SalesRecord {
                id: parse_stored(table, "id", &id, |s| Uuid::parse_str(s).ok())?,
                row: SalesRow {
                    customer_name,
                    product_name,
                    sales_amount: parse_stored(table, "sales_amount", &amount, |s| {
                        Decimal::from_str(s).ok()
                    })?,
                    sales_date: parse_stored(table, "sales_date", &date, |s| {
                        NaiveDate::parse_from_str(s, SALES_DATE_FORMAT).ok()
                    })?,
                    region,
                },
            });
        }

        Ok(records)
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, PipelineError> {
    conn.lock()
        .map_err(|_| PipelineError::Connection("connection mutex poisoned".to_string()))
}

/// Rows per multi-row INSERT, capped by the bound-parameter limit
fn rows_per_statement(batch_size: usize, columns: usize) -> usize {
    batch_size.clamp(1, MAX_SQL_VARIABLES / columns)
}

/// `(?, ?), (?, ?)` for `rows` rows of `columns` values
fn placeholders(rows: usize, columns: usize) -> String {
    let row = format!("({})", vec!["?"; columns].join(", "));
    vec![row; rows].join(", ")
}

fn sales_values(record: &SalesRecord) -> [String; 6] {
    [
        record.id.to_string(),
        record.row.customer_name.clone(),
        record.row.product_name.clone(),
        record.row.sales_amount.to_string(),
        record.row.sales_date_str(),
        record.row.region.clone(),
    ]
}

/// Execute `records` in chunks inside `tx`; returns the number of batches
fn write_chunks<T>(
    tx: &Transaction<'_>,
    table: &'static str,
    records: &[T],
    chunk_rows: usize,
    cancelled: &AtomicBool,
    sql: impl Fn(usize) -> String,
    values: impl Fn(&T) -> Vec<String>,
) -> Result<usize, PipelineError> {
    let mut batches = 0;

    for (idx, chunk) in records.chunks(chunk_rows).enumerate() {
        let batch = idx + 1;

        if cancelled.load(Ordering::SeqCst) {
            return Err(write_error(table, batch, "write interrupted"));
        }

        let mut stmt = tx
            .prepare_cached(&sql(chunk.len()))
            .map_err(|e| write_error(table, batch, e))?;
        stmt.execute(params_from_iter(chunk.iter().flat_map(&values)))
            .map_err(|e| write_error(table, batch, e))?;

        log::debug!("   ├─ {} batch {}: {} rows", table, batch, chunk.len());
        batches = batch;
    }

    Ok(batches)
}

fn commit(tx: Transaction<'_>, table: &'static str, batches: usize) -> Result<(), PipelineError> {
    tx.commit()
        .map_err(|e| write_error(table, batches, format!("commit failed: {}", e)))
}

fn write_error(table: &'static str, batch: usize, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Write {
        table,
        batch,
        message: err.to_string(),
    }
}

fn parse_stored<T>(
    table: &str,
    column: &str,
    raw: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<T, PipelineError> {
    parse(raw).ok_or_else(|| {
        PipelineError::Validation(format!("{}.{} holds unparseable value '{}'", table, column, raw))
    })
}
