//! # Coinview Core
//!
//! Client-side data layer for a crypto asset viewer.
//!
//! ## Overview
//!
//! Asset listings, icons and exchange-rate history are fetched from a
//! market-data REST API, merged with locally cached user state (favorites,
//! fetch timestamps, search and filter preferences) and exposed as
//! observable view state.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Asset store trait with in-memory and DuckDB implementations |
//! | [`config`] | Client configuration from `COINVIEW_*` environment variables |
//! | [`connectivity`] | Reachability status used as a request precondition |
//! | [`controller`] | Observable asset-list and time-series state |
//! | [`decoder`] | Strict JSON decoding of API payloads |
//! | [`domain`] | Asset, icon, exchange-rate and time-series models |
//! | [`error`] | Network and configuration error types |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`network`] | Authenticated API client with retry and error classification |
//! | [`reconcile`] | Merge of fetched assets with held user state |
//! | [`retry`] | Bounded retry with backoff |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use coinview_core::{
//!     AssetListController, ClientConfig, NetworkClient, SharedConnectivity, WarehouseAssetStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connectivity = Arc::new(SharedConnectivity::default());
//!     let client = NetworkClient::with_reqwest(connectivity, ClientConfig::from_env()?);
//!     let store = Arc::new(WarehouseAssetStore::open_default()?);
//!
//!     let controller = AssetListController::new(client, store);
//!     controller.restore_preferences().await;
//!     controller.load().await;
//!
//!     for asset in controller.snapshot().filtered_assets {
//!         println!("{} {}", asset.asset_id, asset.display_name());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! controller.load()
//!     │
//!     ├──▶ AssetStore::load_all ──▶ publish cached snapshot
//!     │
//!     ├──▶ NetworkClient::fetch_assets ──▶ decoder
//!     │
//!     ├──▶ reconcile (keep favorites, stamp last_fetched)
//!     │
//!     ├──▶ publish merged, filtered state
//!     │
//!     └──▶ AssetStore::upsert_all
//! ```
//!
//! ## Error Handling
//!
//! Fetches return [`NetworkError`]; controllers turn failures into
//! `is_offline` / `last_error` state and keep the displayed assets.
//!
//! ```rust
//! use coinview_core::{NetworkError, ServerErrorKind};
//!
//! fn describe(error: &NetworkError) -> &'static str {
//!     match error.server_kind() {
//!         Some(ServerErrorKind::Unauthorized) => "check the API key",
//!         Some(ServerErrorKind::TooManyRequests) => "slow down",
//!         _ if error.is_offline() => "no connection",
//!         _ => "try again later",
//!     }
//! }
//! ```

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod controller;
pub mod decoder;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod network;
pub mod reconcile;
pub mod retry;

// Cache store
pub use cache::{AssetStore, InMemoryAssetStore, UserPreferences, WarehouseAssetStore};

// Configuration
pub use config::{ClientConfig, API_KEY_HEADER, DEFAULT_BASE_URL, QUOTE_CURRENCY};

// Connectivity
pub use connectivity::{
    ConnectivityMonitor, ConnectivityStatus, SharedConnectivity, StaticConnectivity,
};

// Controllers
pub use controller::{
    AssetListController, AssetListState, TimeSeriesController, TimeSeriesState,
    DEFAULT_WINDOW_DAYS,
};

// Decoding
pub use decoder::ApiRecord;

// Domain models
pub use domain::{
    rate_range, Asset, AssetIcon, ExchangeRate, IconIndex, ServerErrorEnvelope, TimeSeriesData,
};

// Error types
pub use error::{ConfigError, NetworkError, ServerErrorKind};

// HTTP client types
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

// Network client
pub use network::NetworkClient;

// Reconciliation
pub use reconcile::{reconcile, reconcile_at, Clock, FixedClock, SystemClock};

// Retry logic
pub use retry::{Backoff, RetryConfig, RetryMode};

// Warehouse (re-exported from coinview-warehouse)
pub use coinview_warehouse::{UpsertReport, Warehouse, WarehouseConfig, WarehouseError};
