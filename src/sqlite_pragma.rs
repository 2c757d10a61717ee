//! Shared SQLite PRAGMA configuration
//!
//! Applied once when the medallion store opens its connection.

use rusqlite::Connection;

/// WAL checkpoint threshold in pages
pub const WAL_AUTOCHECKPOINT_PAGES: i64 = 1000;

/// Apply optimized PRAGMAs for bulk loads
///
/// - `journal_mode = WAL`
/// - `synchronous = NORMAL` (safe with WAL)
/// - `temp_store = MEMORY`
/// - `mmap_size = 256MB`
/// - `cache_size = -64000` (64MB)
/// - `wal_autocheckpoint = 1000`
/// - `foreign_keys = ON`
pub fn apply_optimized_pragmas(conn: &Connection) -> Result<(), rusqlite::Error> {
    // journal_mode returns a row, pragma_update handles that
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "mmap_size", 268_435_456i64)?;
    conn.pragma_update(None, "cache_size", -64_000i64)?;
    conn.pragma_update(None, "wal_autocheckpoint", WAL_AUTOCHECKPOINT_PAGES)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    log::debug!("🔧 SQLite PRAGMAs applied (WAL, NORMAL, MEMORY)");
    Ok(())
}
