//! Persistent asset cache and filter preferences.
//!
//! Controllers talk to an [`AssetStore`]; the DuckDB implementation lives in
//! `coinview-warehouse` and is adapted here by [`WarehouseAssetStore`].
//! Store calls are blocking and are run on blocking workers by callers.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use coinview_warehouse::{AssetRecord, PreferencesRecord, UpsertReport, Warehouse, WarehouseError};
use time::OffsetDateTime;

use crate::domain::{format_rfc3339, parse_rfc3339, Asset};

/// Search and filter state restored at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPreferences {
    pub search_text: String,
    pub favorites_only: bool,
}

/// Record store keyed by asset identifier.
pub trait AssetStore: Send + Sync {
    /// Every cached asset. Records without an identifier are skipped.
    fn load_all(&self) -> Result<Vec<Asset>, WarehouseError>;

    fn find(&self, asset_id: &str) -> Result<Option<Asset>, WarehouseError>;

    /// Assets for the given identifiers; unknown identifiers are ignored.
    fn find_many(&self, asset_ids: &[String]) -> Result<Vec<Asset>, WarehouseError>;

    /// Insert new assets and overwrite existing ones as one unit.
    fn upsert_all(&self, assets: &[Asset]) -> Result<UpsertReport, WarehouseError>;

    /// Returns whether a stored asset was changed.
    fn set_favorite(&self, asset_id: &str, is_favorite: bool) -> Result<bool, WarehouseError>;

    fn load_preferences(&self) -> Result<Option<UserPreferences>, WarehouseError>;

    fn save_preferences(&self, preferences: &UserPreferences) -> Result<(), WarehouseError>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct InMemoryAssetStore {
    assets: Mutex<IndexedAssets>,
    preferences: Mutex<Option<UserPreferences>>,
}

/// Assets in insertion order with a position index by identifier.
#[derive(Debug, Default)]
struct IndexedAssets {
    ordered: Vec<Asset>,
    positions: HashMap<String, usize>,
}

impl IndexedAssets {
    fn get(&self, asset_id: &str) -> Option<&Asset> {
        self.positions.get(asset_id).map(|&index| &self.ordered[index])
    }

    fn get_mut(&mut self, asset_id: &str) -> Option<&mut Asset> {
        let index = *self.positions.get(asset_id)?;
        Some(&mut self.ordered[index])
    }

    /// Returns `true` when an existing asset was replaced.
    fn upsert(&mut self, asset: Asset) -> bool {
        match self.positions.get(&asset.asset_id) {
            Some(&index) => {
                self.ordered[index] = asset;
                true
            }
            None => {
                self.positions.insert(asset.asset_id.clone(), self.ordered.len());
                self.ordered.push(asset);
                false
            }
        }
    }
}

impl InMemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `assets`; later duplicates replace earlier ones.
    pub fn with_assets(assets: Vec<Asset>) -> Self {
        let mut indexed = IndexedAssets::default();
        for asset in assets {
            indexed.upsert(asset);
        }
        Self {
            assets: Mutex::new(indexed),
            preferences: Mutex::new(None),
        }
    }

    pub fn with_preferences(self, preferences: UserPreferences) -> Self {
        *self
            .preferences
            .lock()
            .expect("preferences lock should not be poisoned") = Some(preferences);
        self
    }
}

impl AssetStore for InMemoryAssetStore {
    fn load_all(&self) -> Result<Vec<Asset>, WarehouseError> {
        Ok(self
            .assets
            .lock()
            .expect("asset lock should not be poisoned")
            .ordered
            .clone())
    }

    fn find(&self, asset_id: &str) -> Result<Option<Asset>, WarehouseError> {
        Ok(self
            .assets
            .lock()
            .expect("asset lock should not be poisoned")
            .get(asset_id)
            .cloned())
    }

    fn find_many(&self, asset_ids: &[String]) -> Result<Vec<Asset>, WarehouseError> {
        let stored = self.assets.lock().expect("asset lock should not be poisoned");
        let mut seen = HashSet::with_capacity(asset_ids.len());
        Ok(asset_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| stored.get(id).cloned())
            .collect())
    }

    fn upsert_all(&self, assets: &[Asset]) -> Result<UpsertReport, WarehouseError> {
        let mut stored = self.assets.lock().expect("asset lock should not be poisoned");
        let mut report = UpsertReport::default();
        for asset in assets {
            if stored.upsert(asset.clone()) {
                report.updated += 1;
            } else {
                report.inserted += 1;
            }
        }
        Ok(report)
    }

    fn set_favorite(&self, asset_id: &str, is_favorite: bool) -> Result<bool, WarehouseError> {
        let mut stored = self.assets.lock().expect("asset lock should not be poisoned");
        match stored.get_mut(asset_id) {
            Some(asset) => {
                asset.is_favorite = is_favorite;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn load_preferences(&self) -> Result<Option<UserPreferences>, WarehouseError> {
        Ok(self
            .preferences
            .lock()
            .expect("preferences lock should not be poisoned")
            .clone())
    }

    fn save_preferences(&self, preferences: &UserPreferences) -> Result<(), WarehouseError> {
        *self
            .preferences
            .lock()
            .expect("preferences lock should not be poisoned") = Some(preferences.clone());
        Ok(())
    }
}

// ============================================================================
// Warehouse-backed store
// ============================================================================

/// [`AssetStore`] over the DuckDB warehouse.
#[derive(Clone)]
pub struct WarehouseAssetStore {
    warehouse: Warehouse,
}

impl WarehouseAssetStore {
    pub fn new(warehouse: Warehouse) -> Self {
        Self { warehouse }
    }

    /// Open the warehouse at its default location.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Ok(Self::new(Warehouse::open_default()?))
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }
}

impl AssetStore for WarehouseAssetStore {
    fn load_all(&self) -> Result<Vec<Asset>, WarehouseError> {
        Ok(records_to_assets(self.warehouse.load_assets()?))
    }

    fn find(&self, asset_id: &str) -> Result<Option<Asset>, WarehouseError> {
        Ok(self
            .warehouse
            .find_asset(asset_id)?
            .and_then(record_to_asset))
    }

    fn find_many(&self, asset_ids: &[String]) -> Result<Vec<Asset>, WarehouseError> {
        Ok(records_to_assets(self.warehouse.find_assets(asset_ids)?))
    }

    fn upsert_all(&self, assets: &[Asset]) -> Result<UpsertReport, WarehouseError> {
        let records: Vec<AssetRecord> = assets.iter().map(asset_to_record).collect();
        self.warehouse.upsert_assets(&records)
    }

    fn set_favorite(&self, asset_id: &str, is_favorite: bool) -> Result<bool, WarehouseError> {
        self.warehouse.set_favorite(asset_id, is_favorite)
    }

    fn load_preferences(&self) -> Result<Option<UserPreferences>, WarehouseError> {
        Ok(self
            .warehouse
            .load_preferences()?
            .map(|record| UserPreferences {
                search_text: record.search_text,
                favorites_only: record.favorites_only,
            }))
    }

    fn save_preferences(&self, preferences: &UserPreferences) -> Result<(), WarehouseError> {
        self.warehouse.save_preferences(&PreferencesRecord {
            search_text: preferences.search_text.clone(),
            favorites_only: preferences.favorites_only,
        })
    }
}

fn records_to_assets(records: Vec<AssetRecord>) -> Vec<Asset> {
    records.into_iter().filter_map(record_to_asset).collect()
}

fn record_to_asset(record: AssetRecord) -> Option<Asset> {
    let Some(asset_id) = record.asset_id.filter(|id| !id.is_empty()) else {
        tracing::warn!("skipping cached asset record without asset_id");
        return None;
    };

    Some(Asset {
        name: record.name,
        type_is_crypto: record.type_is_crypto,
        data_quote_start: stored_time(&asset_id, record.data_quote_start),
        data_quote_end: stored_time(&asset_id, record.data_quote_end),
        data_orderbook_start: stored_time(&asset_id, record.data_orderbook_start),
        data_orderbook_end: stored_time(&asset_id, record.data_orderbook_end),
        data_trade_start: stored_time(&asset_id, record.data_trade_start),
        data_trade_end: stored_time(&asset_id, record.data_trade_end),
        data_symbols_count: record.data_symbols_count,
        volume_1hrs_usd: record.volume_1hrs_usd,
        volume_1day_usd: record.volume_1day_usd,
        volume_1mth_usd: record.volume_1mth_usd,
        price_usd: record.price_usd,
        is_favorite: record.is_favorite,
        last_fetched: stored_time(&asset_id, record.last_fetched),
        asset_id,
    })
}

/// Unreadable stored timestamps are dropped rather than failing the record.
fn stored_time(asset_id: &str, value: Option<String>) -> Option<OffsetDateTime> {
    let value = value?;
    match parse_rfc3339(&value) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            tracing::warn!(asset_id, %error, "ignoring unreadable cached timestamp");
            None
        }
    }
}

fn asset_to_record(asset: &Asset) -> AssetRecord {
    AssetRecord {
        asset_id: Some(asset.asset_id.clone()),
        name: asset.name.clone(),
        type_is_crypto: asset.type_is_crypto,
        data_quote_start: asset.data_quote_start.map(format_rfc3339),
        data_quote_end: asset.data_quote_end.map(format_rfc3339),
        data_orderbook_start: asset.data_orderbook_start.map(format_rfc3339),
        data_orderbook_end: asset.data_orderbook_end.map(format_rfc3339),
        data_trade_start: asset.data_trade_start.map(format_rfc3339),
        data_trade_end: asset.data_trade_end.map(format_rfc3339),
        data_symbols_count: asset.data_symbols_count,
        volume_1hrs_usd: asset.volume_1hrs_usd,
        volume_1day_usd: asset.volume_1day_usd,
        volume_1mth_usd: asset.volume_1mth_usd,
        price_usd: asset.price_usd,
        is_favorite: asset.is_favorite,
        last_fetched: asset.last_fetched.map(format_rfc3339),
    }
}
