//! # Coinview Warehouse
//!
//! DuckDB-backed record store for the coinview data layer.
//!
//! ## Overview
//!
//! The warehouse persists two record kinds:
//!
//! - **Asset records** keyed by `asset_id`, holding the server-owned fields of
//!   an asset plus the user-owned favorite flag and the cache timestamp
//! - **One preferences record** with the user's search text and
//!   favorites-only flag
//!
//! All statements are parameterized. Bulk writes run inside one transaction.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coinview_warehouse::{AssetRecord, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!
//!     let report = warehouse.upsert_assets(&[AssetRecord::new("BTC")])?;
//!     println!("inserted {} updated {}", report.inserted, report.updated);
//!
//!     for record in warehouse.load_assets()? {
//!         println!("{:?}", record.asset_id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `assets` | Cached asset records |
//! | `user_preferences` | Single-row filter preferences |
//! | `schema_migrations` | Applied migration versions |

pub mod duckdb;
pub mod migrations;

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::PathBuf;

use ::duckdb::{params_from_iter, Connection, Row, ToSql};
use thiserror::Error;

pub use duckdb::{ConnectionPool, PooledConnection};

/// Upper bound on bind parameters per `IN (...)` lookup.
const LOOKUP_CHUNK: usize = 500;

const PREFERENCES_ROW_ID: i32 = 1;

const ASSET_COLUMNS: &str = "asset_id, name, type_is_crypto, \
     data_quote_start, data_quote_end, data_orderbook_start, data_orderbook_end, \
     data_trade_start, data_trade_end, data_symbols_count, \
     volume_1hrs_usd, volume_1day_usd, volume_1mth_usd, price_usd, \
     is_favorite, last_fetched";

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (creating the data directory).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A record cannot be stored as given.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for coinview data.
    pub coinview_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let coinview_home = resolve_coinview_home();
        let db_path = coinview_home.join("cache").join("coinview.duckdb");
        Self {
            coinview_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// Storage representation of an asset.
///
/// Timestamps are kept as RFC 3339 strings; conversion to typed values is the
/// caller's concern. `asset_id` is optional because rows written by older
/// schemas or external tools may lack it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetRecord {
    pub asset_id: Option<String>,
    pub name: Option<String>,
    pub type_is_crypto: i32,
    pub data_quote_start: Option<String>,
    pub data_quote_end: Option<String>,
    pub data_orderbook_start: Option<String>,
    pub data_orderbook_end: Option<String>,
    pub data_trade_start: Option<String>,
    pub data_trade_end: Option<String>,
    pub data_symbols_count: Option<i64>,
    pub volume_1hrs_usd: Option<f64>,
    pub volume_1day_usd: Option<f64>,
    pub volume_1mth_usd: Option<f64>,
    pub price_usd: Option<f64>,
    pub is_favorite: bool,
    pub last_fetched: Option<String>,
}

impl AssetRecord {
    /// Empty record with only the key set.
    pub fn new(asset_id: impl Into<String>) -> Self {
        Self {
            asset_id: Some(asset_id.into()),
            ..Self::default()
        }
    }
}

/// Persisted filter preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferencesRecord {
    pub search_text: String,
    pub favorites_only: bool,
}

/// Outcome of a bulk upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub inserted: usize,
    pub updated: usize,
}

/// The record store for cached assets and preferences.
#[derive(Clone)]
pub struct Warehouse {
    pool: ConnectionPool,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::open(config.db_path, config.max_pool_size)?;
        let warehouse = Self { pool };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Open a throwaway in-memory warehouse.
    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        let warehouse = Self {
            pool: ConnectionPool::open_in_memory(2)?,
        };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply pending schema migrations.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.checkout()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// The connection pool backing this warehouse.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Every stored asset record, in insertion order.
    pub fn load_assets(&self) -> Result<Vec<AssetRecord>, WarehouseError> {
        let connection = self.pool.checkout()?;
        let sql = format!("SELECT {ASSET_COLUMNS} FROM assets ORDER BY rowid");
        let mut statement = connection.prepare(&sql)?;
        let rows = statement.query_map([], read_asset_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Point lookup by asset identifier.
    pub fn find_asset(&self, asset_id: &str) -> Result<Option<AssetRecord>, WarehouseError> {
        let ids = [asset_id.to_owned()];
        let mut found = self.find_assets(&ids)?;
        Ok(found.pop())
    }

    /// Set lookup by asset identifiers. Unknown identifiers are ignored.
    pub fn find_assets(&self, asset_ids: &[String]) -> Result<Vec<AssetRecord>, WarehouseError> {
        if asset_ids.is_empty() {
            return Ok(Vec::new());
        }

        let connection = self.pool.checkout()?;
        let mut records = Vec::with_capacity(asset_ids.len());
        for chunk in asset_ids.chunks(LOOKUP_CHUNK) {
            let sql = format!(
                "SELECT {ASSET_COLUMNS} FROM assets WHERE asset_id IN ({}) ORDER BY rowid",
                placeholders(chunk.len())
            );
            let mut statement = connection.prepare(&sql)?;
            let rows = statement.query_map(params_from_iter(chunk.iter()), read_asset_row)?;
            for row in rows {
                records.push(row?);
            }
        }
        Ok(records)
    }

    /// Insert or update every record in one transaction.
    ///
    /// Existing identifiers are fetched in bulk before the write loop, so the
    /// cost is one lookup per chunk rather than one per record. Every column
    /// of an existing row is overwritten, including the favorite flag and the
    /// cache timestamp.
    pub fn upsert_assets(&self, records: &[AssetRecord]) -> Result<UpsertReport, WarehouseError> {
        if records.is_empty() {
            return Ok(UpsertReport::default());
        }

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            match record.asset_id.as_deref() {
                Some(id) if !id.is_empty() => ids.push(id.to_owned()),
                _ => {
                    return Err(WarehouseError::InvalidRecord(String::from(
                        "asset record is missing asset_id",
                    )))
                }
            }
        }

        let connection = self.pool.checkout()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<UpsertReport, WarehouseError> {
            let mut existing = existing_ids(&connection, &ids)?;
            let mut report = UpsertReport::default();

            for (record, id) in records.iter().zip(&ids) {
                if existing.contains(id) {
                    update_asset(&connection, id, record)?;
                    report.updated += 1;
                } else {
                    insert_asset(&connection, id, record)?;
                    existing.insert(id.clone());
                    report.inserted += 1;
                }
            }

            Ok(report)
        })();

        let report = finalize_transaction(&connection, result)?;
        tracing::debug!(
            inserted = report.inserted,
            updated = report.updated,
            "committed asset upsert"
        );
        Ok(report)
    }

    /// Update only the favorite flag. Returns `false` when no row matched.
    pub fn set_favorite(&self, asset_id: &str, is_favorite: bool) -> Result<bool, WarehouseError> {
        let connection = self.pool.checkout()?;
        let params: [&dyn ToSql; 2] = [&is_favorite, &asset_id];
        let changed = connection.execute(
            "UPDATE assets SET is_favorite = ?, updated_at = CURRENT_TIMESTAMP WHERE asset_id = ?",
            params.as_slice(),
        )?;
        Ok(changed > 0)
    }

    /// The stored preferences, if any were ever saved.
    pub fn load_preferences(&self) -> Result<Option<PreferencesRecord>, WarehouseError> {
        let connection = self.pool.checkout()?;
        let mut statement = connection
            .prepare("SELECT search_text, favorites_only FROM user_preferences WHERE id = ?")?;
        let mut rows = statement.query_map([PREFERENCES_ROW_ID], |row| {
            Ok(PreferencesRecord {
                search_text: row.get(0)?,
                favorites_only: row.get(1)?,
            })
        })?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Replace the single preferences row.
    pub fn save_preferences(&self, preferences: &PreferencesRecord) -> Result<(), WarehouseError> {
        let connection = self.pool.checkout()?;
        let params: [&dyn ToSql; 3] = [
            &PREFERENCES_ROW_ID,
            &preferences.search_text,
            &preferences.favorites_only,
        ];
        connection.execute(
            "INSERT OR REPLACE INTO user_preferences (id, search_text, favorites_only, updated_at) \
             VALUES (?, ?, ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        )?;
        Ok(())
    }
}

fn existing_ids(connection: &Connection, ids: &[String]) -> Result<HashSet<String>, WarehouseError> {
    let mut existing = HashSet::with_capacity(ids.len());
    for chunk in ids.chunks(LOOKUP_CHUNK) {
        let sql = format!(
            "SELECT asset_id FROM assets WHERE asset_id IN ({})",
            placeholders(chunk.len())
        );
        let mut statement = connection.prepare(&sql)?;
        let rows = statement.query_map(params_from_iter(chunk.iter()), |row| {
            row.get::<_, String>(0)
        })?;
        for row in rows {
            existing.insert(row?);
        }
    }
    Ok(existing)
}

fn insert_asset(connection: &Connection, id: &str, record: &AssetRecord) -> Result<(), WarehouseError> {
    let params: [&dyn ToSql; 16] = [
        &id,
        &record.name,
        &record.type_is_crypto,
        &record.data_quote_start,
        &record.data_quote_end,
        &record.data_orderbook_start,
        &record.data_orderbook_end,
        &record.data_trade_start,
        &record.data_trade_end,
        &record.data_symbols_count,
        &record.volume_1hrs_usd,
        &record.volume_1day_usd,
        &record.volume_1mth_usd,
        &record.price_usd,
        &record.is_favorite,
        &record.last_fetched,
    ];
    let sql = format!(
        "INSERT INTO assets ({ASSET_COLUMNS}, updated_at) \
         VALUES ({}, CURRENT_TIMESTAMP)",
        placeholders(params.len())
    );
    connection.execute(&sql, params.as_slice())?;
    Ok(())
}

fn update_asset(connection: &Connection, id: &str, record: &AssetRecord) -> Result<(), WarehouseError> {
    let params: [&dyn ToSql; 16] = [
        &record.name,
        &record.type_is_crypto,
        &record.data_quote_start,
        &record.data_quote_end,
        &record.data_orderbook_start,
        &record.data_orderbook_end,
        &record.data_trade_start,
        &record.data_trade_end,
        &record.data_symbols_count,
        &record.volume_1hrs_usd,
        &record.volume_1day_usd,
        &record.volume_1mth_usd,
        &record.price_usd,
        &record.is_favorite,
        &record.last_fetched,
        &id,
    ];
    connection.execute(
        "UPDATE assets SET name = ?, type_is_crypto = ?, \
         data_quote_start = ?, data_quote_end = ?, \
         data_orderbook_start = ?, data_orderbook_end = ?, \
         data_trade_start = ?, data_trade_end = ?, data_symbols_count = ?, \
         volume_1hrs_usd = ?, volume_1day_usd = ?, volume_1mth_usd = ?, price_usd = ?, \
         is_favorite = ?, last_fetched = ?, updated_at = CURRENT_TIMESTAMP \
         WHERE asset_id = ?",
        params.as_slice(),
    )?;
    Ok(())
}

fn read_asset_row(row: &Row<'_>) -> Result<AssetRecord, ::duckdb::Error> {
    Ok(AssetRecord {
        asset_id: row.get(0)?,
        name: row.get(1)?,
        type_is_crypto: row.get(2)?,
        data_quote_start: row.get(3)?,
        data_quote_end: row.get(4)?,
        data_orderbook_start: row.get(5)?,
        data_orderbook_end: row.get(6)?,
        data_trade_start: row.get(7)?,
        data_trade_end: row.get(8)?,
        data_symbols_count: row.get(9)?,
        volume_1hrs_usd: row.get(10)?,
        volume_1day_usd: row.get(11)?,
        volume_1mth_usd: row.get(12)?,
        price_usd: row.get(13)?,
        is_favorite: row.get(14)?,
        last_fetched: row.get(15)?,
    })
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// Resolve the coinview home directory from environment or default.
fn resolve_coinview_home() -> PathBuf {
    if let Some(path) = env::var_os("COINVIEW_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".coinview");
    }

    PathBuf::from(".coinview")
}
