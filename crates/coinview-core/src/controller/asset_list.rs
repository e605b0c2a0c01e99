use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex, OwnedMutexGuard};

use crate::cache::{AssetStore, UserPreferences};
use crate::domain::{Asset, IconIndex};
use crate::error::NetworkError;
use crate::network::NetworkClient;
use crate::reconcile::{reconcile_at, Clock, SystemClock};

use super::{run_store, LoadingGuard};

/// Everything the asset list screen renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetListState {
    /// Full collection in display order.
    pub assets: Vec<Asset>,
    /// `assets` after the search and favorites filters.
    pub filtered_assets: Vec<Asset>,
    pub search_text: String,
    pub favorites_only: bool,
    pub is_loading: bool,
    pub is_offline: bool,
    pub last_error: Option<String>,
    pub icons: IconIndex,
}

impl AssetListState {
    /// Rebuild `filtered_assets`. Call after any change to the collection
    /// or the filters.
    pub fn recompute_filter(&mut self) {
        self.filtered_assets = self
            .assets
            .iter()
            .filter(|asset| asset.matches_search(&self.search_text))
            .filter(|asset| !self.favorites_only || asset.is_favorite)
            .cloned()
            .collect();
    }

    fn loading_flag(&mut self) -> &mut bool {
        &mut self.is_loading
    }

    fn record_failure(&mut self, error: &NetworkError) {
        self.is_offline = error.is_offline();
        self.last_error = Some(error.to_string());
    }

    fn preferences(&self) -> UserPreferences {
        UserPreferences {
            search_text: self.search_text.clone(),
            favorites_only: self.favorites_only,
        }
    }

    fn favorite_flag(&self, asset_id: &str) -> Option<bool> {
        self.assets
            .iter()
            .find(|asset| asset.asset_id == asset_id)
            .map(|asset| asset.is_favorite)
    }
}

/// Owner of the asset list state.
pub struct AssetListController {
    client: NetworkClient,
    store: Arc<dyn AssetStore>,
    clock: Arc<dyn Clock>,
    state: watch::Sender<AssetListState>,
    /// Held for the duration of every store write, including on the
    /// blocking worker.
    writes: Arc<Mutex<()>>,
    /// Bumped on every user change to the filters.
    preference_edits: AtomicU64,
}

impl AssetListController {
    pub fn new(client: NetworkClient, store: Arc<dyn AssetStore>) -> Self {
        let (state, _) = watch::channel(AssetListState::default());
        Self {
            client,
            store,
            clock: Arc::new(SystemClock),
            state,
            writes: Arc::new(Mutex::new(())),
            preference_edits: AtomicU64::new(0),
        }
    }

    /// Replace the clock used to stamp reconciled assets.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current state.
    pub fn snapshot(&self) -> AssetListState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every publication.
    pub fn subscribe(&self) -> watch::Receiver<AssetListState> {
        self.state.subscribe()
    }

    /// Show cached assets, then refresh them from the network.
    ///
    /// Does nothing while another load is in flight. A failed refresh keeps
    /// whatever is displayed and records the error. Dropping the future
    /// clears `is_loading`.
    pub async fn load(&self) {
        let Some(loading) = LoadingGuard::acquire(&self.state, AssetListState::loading_flag) else {
            tracing::debug!("asset load already in flight");
            return;
        };

        if let Some(cached) = run_store(&self.store, "load_all", |store| store.load_all()).await {
            if !cached.is_empty() {
                tracing::debug!(count = cached.len(), "publishing cached assets");
                self.state.send_modify(|state| {
                    state.assets = cached;
                    state.recompute_filter();
                });
            }
        }

        match self.client.fetch_assets().await {
            Ok(fresh) => {
                let now = self.clock.now();
                let mut count = 0;
                loading.finish(|state| {
                    state.assets = reconcile_at(fresh, &state.assets, now);
                    state.is_offline = false;
                    state.last_error = None;
                    state.recompute_filter();
                    count = state.assets.len();
                });
                tracing::info!(count, "asset list refreshed");

                let permit = self.write_permit().await;
                let assets = self.state.borrow().assets.clone();
                if let Some(report) = run_store(&self.store, "upsert_all", move |store| {
                    let _permit = permit;
                    store.upsert_all(&assets)
                })
                .await
                {
                    tracing::debug!(inserted = report.inserted, updated = report.updated, "persisted assets");
                }
            }
            Err(error) => {
                tracing::warn!(code = error.code(), %error, "asset list refresh failed");
                loading.finish(|state| state.record_failure(&error));
            }
        }
    }

    /// Fetch the icon set for `size` pixels and publish it.
    pub async fn load_icons(&self, size: u32) {
        match self.client.fetch_asset_icons(size).await {
            Ok(icons) => {
                let index = IconIndex::from_icons(icons);
                tracing::debug!(size, count = index.len(), "asset icons loaded");
                self.state.send_modify(|state| {
                    state.icons = index;
                    state.is_offline = false;
                    state.last_error = None;
                });
            }
            Err(error) => {
                tracing::warn!(size, code = error.code(), %error, "asset icon fetch failed");
                self.state.send_modify(|state| state.record_failure(&error));
            }
        }
    }

    /// Flip the favorite flag of `asset_id` and persist it.
    ///
    /// Returns the new flag, or `None` when the asset is not held.
    pub async fn toggle_favorite(&self, asset_id: &str) -> Option<bool> {
        let mut toggled = None;
        self.state.send_if_modified(|state| {
            let Some(asset) = state.assets.iter_mut().find(|asset| asset.asset_id == asset_id) else {
                return false;
            };
            asset.is_favorite = !asset.is_favorite;
            toggled = Some(asset.is_favorite);
            state.recompute_filter();
            true
        });
        let toggled = toggled?;

        // Write whatever the flag is once the permit is held; a later toggle
        // or load may have changed it meanwhile.
        let permit = self.write_permit().await;
        let Some(is_favorite) = self.state.borrow().favorite_flag(asset_id) else {
            return Some(toggled);
        };
        let id = asset_id.to_owned();
        let stored = run_store(&self.store, "set_favorite", move |store| {
            let _permit = permit;
            store.set_favorite(&id, is_favorite)
        })
        .await;
        if stored == Some(false) {
            tracing::debug!(asset_id, "favorite changed for an asset not yet cached");
        }
        Some(toggled)
    }

    pub async fn set_search_text(&self, search_text: impl Into<String>) {
        let search_text = search_text.into();
        self.preference_edits.fetch_add(1, Ordering::SeqCst);
        self.state.send_modify(|state| {
            state.search_text = search_text;
            state.recompute_filter();
        });
        self.save_preferences().await;
    }

    pub async fn set_favorites_only(&self, favorites_only: bool) {
        self.preference_edits.fetch_add(1, Ordering::SeqCst);
        self.state.send_modify(|state| {
            state.favorites_only = favorites_only;
            state.recompute_filter();
        });
        self.save_preferences().await;
    }

    /// Apply stored preferences without writing them back.
    ///
    /// Skipped when the user changed a filter while the preferences were
    /// being read.
    pub async fn restore_preferences(&self) {
        let edits = self.preference_edits.load(Ordering::SeqCst);
        let Some(Some(preferences)) =
            run_store(&self.store, "load_preferences", |store| store.load_preferences()).await
        else {
            return;
        };

        let applied = self.state.send_if_modified(|state| {
            if self.preference_edits.load(Ordering::SeqCst) != edits {
                return false;
            }
            state.search_text = preferences.search_text;
            state.favorites_only = preferences.favorites_only;
            state.recompute_filter();
            true
        });
        if applied {
            tracing::debug!("preferences restored");
        } else {
            tracing::debug!("preferences changed during restore, keeping user values");
        }
    }

    async fn save_preferences(&self) {
        let permit = self.write_permit().await;
        let preferences = self.state.borrow().preferences();
        run_store(&self.store, "save_preferences", move |store| {
            let _permit = permit;
            store.save_preferences(&preferences)
        })
        .await;
    }

    async fn write_permit(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.writes).lock_owned().await
    }
}

impl std::fmt::Debug for AssetListController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetListController")
            .field("client", &self.client)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
